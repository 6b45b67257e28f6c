//! Read-only lookup from service id to provider descriptor.
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Behavioral flags carried by a [`ServiceConfig`]. Grouped separately so the
/// common case (all `false`) can derive `Default`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceFlags {
    /// Don't list this service on the index page unless `type` filters to it.
    pub hidden: bool,
    /// Omit `state` from the token-exchange request body.
    pub no_state_for_token_request: bool,
    /// Omit `redirect_uri` from the refresh request body.
    pub no_redirect_uri_for_refresh_request: bool,
    /// This service uses the resource-owner password flow (`/cli-token`).
    pub cli_token: bool,
    /// Prefer V2 (stateless) AuthIds even when a blob store is configured.
    pub prefer_v2: bool,
    /// The token exchange response carries only `access_token`, no refresh token.
    pub access_token_only: bool,
    /// Replace the AuthUrl host with the callback's `hostname` query parameter.
    pub use_hostname_from_callback: bool,
}

/// Immutable, process-local descriptor for one third-party provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Primary key, e.g. `"gd"`.
    pub id: String,
    /// Human-readable label, e.g. `"Google Drive"`.
    pub name: String,
    pub client_id: String,
    pub client_secret: String,
    /// Token endpoint.
    pub auth_url: String,
    /// Authorization endpoint.
    pub login_url: String,
    pub scope: String,
    pub redirect_uri: String,
    /// Literal, pre-encoded suffix appended raw to the login URL.
    #[serde(default)]
    pub extra_url: String,
    #[serde(default)]
    pub service_link: Option<String>,
    #[serde(default)]
    pub de_auth_link: Option<String>,
    #[serde(default)]
    pub brand_image: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    /// Comma-list of callback query-parameter names to echo back to the browser.
    #[serde(default)]
    pub additional_elements: String,

    #[serde(flatten)]
    pub flags: ServiceFlags,
}

impl ServiceConfig {
    /// Parsed [`Self::additional_elements`].
    pub fn additional_element_names(&self) -> impl Iterator<Item = &str> {
        self.additional_elements
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// Placeholder substitution applied to string fields after default
/// resolution and before the catalog is considered final.
///
/// `%OAUTH_CALLBACK_URI%` -> `https://<hostname>/logged-in`
/// `%HOSTNAME%` -> `<hostname>`
/// `%<NAME>%` -> looked up in `secrets`
pub fn expand_placeholders(input: &str, hostname: &str, secrets: &HashMap<String, String>) -> String {
    let callback_uri = format!("https://{hostname}/logged-in");
    let mut out = input
        .replace("%OAUTH_CALLBACK_URI%", &callback_uri)
        .replace("%HOSTNAME%", hostname);

    for (name, value) in secrets {
        out = out.replace(&format!("%{name}%"), value);
    }

    out
}

/// Read-only map from service id to [`ServiceConfig`], built once at startup.
#[derive(Debug, Clone, Default)]
pub struct ServiceCatalog {
    services: HashMap<String, ServiceConfig>,
}

impl ServiceCatalog {
    /// Build a catalog from already-resolved service configs.
    #[must_use]
    pub fn new(services: Vec<ServiceConfig>) -> Self {
        Self {
            services: services.into_iter().map(|s| (s.id.clone(), s)).collect(),
        }
    }

    /// Parse a JSON array of [`ServiceConfig`] (placeholders already expanded
    /// by the caller, per §9 of the design notes -- this function does not
    /// apply `%...%` substitution itself).
    pub fn from_json(data: &str) -> Result<Self> {
        let services: Vec<ServiceConfig> = serde_json::from_str(data)?;
        Ok(Self::new(services))
    }

    /// Look up a service by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&ServiceConfig> {
        self.services.get(id)
    }

    /// Look up a service by id, or [`Error::UnknownService`].
    pub fn require(&self, id: &str) -> Result<&ServiceConfig> {
        self.get(id).ok_or_else(|| Error::UnknownService(id.to_owned()))
    }

    /// Iterate all services, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &ServiceConfig> {
        self.services.values()
    }

    /// Iterate services visible on the index page: all of them if `filter`
    /// names one, otherwise every non-hidden service.
    pub fn listed<'a>(&'a self, filter: Option<&'a str>) -> impl Iterator<Item = &'a ServiceConfig> {
        self.services.values().filter(move |s| match filter {
            Some(id) => s.id == id,
            None => !s.flags.hidden,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ServiceConfig {
        ServiceConfig {
            id: "gd".into(),
            name: "Google Drive".into(),
            client_id: "client".into(),
            client_secret: "secret".into(),
            auth_url: "https://oauth2.googleapis.com/token".into(),
            login_url: "https://accounts.google.com/o/oauth2/auth".into(),
            scope: "drive".into(),
            redirect_uri: "%OAUTH_CALLBACK_URI%".into(),
            extra_url: "&access_type=offline&approval_prompt=force".into(),
            service_link: None,
            de_auth_link: Some("https://myaccount.google.com/permissions".into()),
            brand_image: None,
            notes: None,
            additional_elements: String::new(),
            flags: ServiceFlags::default(),
        }
    }

    #[test]
    fn unknown_service_is_reported() {
        let catalog = ServiceCatalog::new(vec![]);
        assert!(matches!(catalog.require("gd"), Err(Error::UnknownService(_))));
    }

    #[test]
    fn hidden_services_excluded_without_filter() {
        let mut hidden = sample();
        hidden.id = "hidden-one".into();
        hidden.flags.hidden = true;
        let catalog = ServiceCatalog::new(vec![sample(), hidden]);

        let listed: Vec<_> = catalog.listed(None).map(|s| s.id.clone()).collect();
        assert_eq!(listed, vec!["gd".to_string()]);
    }

    #[test]
    fn filter_overrides_hidden() {
        let mut hidden = sample();
        hidden.id = "hidden-one".into();
        hidden.flags.hidden = true;
        let catalog = ServiceCatalog::new(vec![hidden]);

        let listed: Vec<_> = catalog.listed(Some("hidden-one")).collect();
        assert_eq!(listed.len(), 1);
    }

    #[test]
    fn placeholder_expansion() {
        let mut secrets = HashMap::new();
        secrets.insert("GD_SECRET".to_string(), "shh".to_string());

        let out = expand_placeholders("%OAUTH_CALLBACK_URI% on %HOSTNAME% with %GD_SECRET%", "example.com", &secrets);
        assert_eq!(out, "https://example.com/logged-in on example.com with shh");
    }

    #[test]
    fn additional_element_names_split_and_trim() {
        let mut svc = sample();
        svc.additional_elements = " hostname, region ,".into();
        assert_eq!(
            svc.additional_element_names().collect::<Vec<_>>(),
            vec!["hostname", "region"]
        );
    }
}
