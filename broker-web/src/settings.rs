//! Environment-variable driven configuration.
use std::{
    fmt::Debug,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    str::FromStr,
};

/// Get an environment variable.
///
/// # Panics
///
/// If the environment variable isn't set or cannot be parsed.
#[track_caller]
pub fn env<T>(key: &str) -> T
where
    T: FromStr,
    <T as FromStr>::Err: Debug,
{
    env_opt(key).unwrap_or_else(|| panic!("`{key}` was not set"))
}

/// Get an environment variable, or `None` if it isn't set.
///
/// # Panics
///
/// If the environment variable exists but cannot be parsed.
#[track_caller]
pub fn env_opt<T>(key: &str) -> Option<T>
where
    T: FromStr,
    <T as FromStr>::Err: Debug,
{
    dotenv::var(key).ok().map(|s| {
        s.parse()
            .unwrap_or_else(|e| panic!("`{key}` was defined but could not be parsed: {e:?}"))
    })
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 8080)
}

/// The broker's runtime configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Public hostname, used to expand `%OAUTH_CALLBACK_URI%`/`%HOSTNAME%`.
    pub hostname: String,
    /// Shown in user-facing error messages ("you must de-authorize `AppName`").
    pub app_name: String,
    /// Shown in the page title/header; falls back to `app_name`.
    pub display_name: String,
    /// Comma-separated list restricting the index page to these service ids.
    pub services_filter: Option<String>,
    /// Path or `base64:<...>` document containing `%<NAME>%` secret values.
    pub secrets: Option<String>,
    /// AES passphrase the secrets document is encrypted under, if any.
    pub secrets_passphrase: Option<String>,
    /// Path or `base64:<...>` document overriding the built-in service catalog.
    pub config_file: Option<String>,
    /// Directory the encrypted blob store writes V1 credentials to. `None`
    /// disables the store entirely, forcing every login into V2 mode.
    pub storage: Option<String>,
    /// External URL `/privacy-policy` redirects to, if configured.
    pub privacy_policy_url: Option<String>,
    /// Address the HTTP server binds to.
    pub bind_addr: SocketAddr,
}

impl Settings {
    /// Read settings from the process environment (after `dotenv` has had a
    /// chance to load a `.env` file).
    #[must_use]
    pub fn from_env() -> Self {
        let app_name: String = env("APPNAME");
        let display_name = env_opt("DISPLAYNAME").unwrap_or_else(|| app_name.clone());

        Self {
            hostname: env("HOSTNAME"),
            app_name,
            display_name,
            services_filter: env_opt("SERVICES"),
            secrets: env_opt("SECRETS"),
            secrets_passphrase: env_opt("SECRETS_PASSPHRASE"),
            config_file: env_opt("CONFIGFILE"),
            storage: env_opt("STORAGE"),
            privacy_policy_url: env_opt("PRIVACY_POLICY_URL"),
            bind_addr: env_opt("BIND_ADDR").unwrap_or_else(default_bind_addr),
        }
    }
}
