//! The `Renderer` trait: six typed render methods consumed by the route
//! handlers, plus a minimal built-in implementation so the service runs
//! standalone without a templating dependency.
use std::collections::BTreeMap;

/// One row on the index page.
pub struct ServiceLink<'a> {
    pub id: &'a str,
    pub name: &'a str,
    pub href: String,
    pub brand_image: Option<&'a str>,
}

pub struct IndexContext<'a> {
    pub display_name: &'a str,
    pub services: Vec<ServiceLink<'a>>,
    /// Opaque value from the `redir` query parameter, passed through untouched.
    pub redir: Option<&'a str>,
}

pub struct LoggedInContext<'a> {
    pub service_name: &'a str,
    pub auth_id: Option<&'a str>,
    pub de_auth_link: Option<&'a str>,
    pub error_message: Option<&'a str>,
    pub additional_data: &'a BTreeMap<String, String>,
}

pub struct CliTokenFormContext<'a> {
    pub service_id: &'a str,
    pub fetch_token: Option<&'a str>,
}

pub struct RevokeResultContext<'a> {
    pub message: &'a str,
}

/// Opaque HTML rendering, kept as a trait boundary so a real templating
/// engine can be swapped in without touching the route handlers.
pub trait Renderer: Send + Sync {
    fn index(&self, ctx: &IndexContext<'_>) -> String;
    fn logged_in(&self, ctx: &LoggedInContext<'_>) -> String;
    fn cli_token_form(&self, ctx: &CliTokenFormContext<'_>) -> String;
    fn privacy_policy(&self) -> String;
    fn revoke_form(&self) -> String;
    fn revoke_result(&self, ctx: &RevokeResultContext<'_>) -> String;
}

/// Minimal string-formatting implementation. No escaping beyond what's
/// strictly necessary is performed; service-catalog fields are operator
/// controlled, not end-user input.
#[derive(Debug, Default)]
pub struct SimpleRenderer;

impl Renderer for SimpleRenderer {
    fn index(&self, ctx: &IndexContext<'_>) -> String {
        let rows: String = ctx
            .services
            .iter()
            .map(|s| {
                let href = match ctx.redir {
                    Some(redir) => format!("{}&redir={redir}", s.href),
                    None => s.href.clone(),
                };
                format!("<li><a href=\"{href}\">{}</a></li>", s.name)
            })
            .collect();

        format!("<html><head><title>{}</title></head><body><ul>{rows}</ul></body></html>", ctx.display_name)
    }

    fn logged_in(&self, ctx: &LoggedInContext<'_>) -> String {
        if let Some(message) = ctx.error_message {
            let link = ctx
                .de_auth_link
                .map(|l| format!("<p><a href=\"{l}\">De-authorize {}</a></p>", ctx.service_name))
                .unwrap_or_default();
            return format!("<html><body><p>{message}</p>{link}</body></html>");
        }

        let extra: String = ctx
            .additional_data
            .iter()
            .map(|(k, v)| format!("<dt>{k}</dt><dd>{v}</dd>"))
            .collect();

        format!(
            "<html><body><h1>{}</h1><p>Your AuthId:</p><pre>{}</pre><dl>{extra}</dl></body></html>",
            ctx.service_name,
            ctx.auth_id.unwrap_or_default()
        )
    }

    fn cli_token_form(&self, ctx: &CliTokenFormContext<'_>) -> String {
        format!(
            "<html><body><form method=\"post\" action=\"/cli-token-login\">\
             <input type=\"hidden\" name=\"id\" value=\"{}\">\
             <input type=\"hidden\" name=\"fetchtoken\" value=\"{}\">\
             <input name=\"token\" placeholder=\"credential\">\
             <button type=\"submit\">Log in</button></form></body></html>",
            ctx.service_id,
            ctx.fetch_token.unwrap_or_default()
        )
    }

    fn privacy_policy(&self) -> String {
        "<html><body><h1>Privacy policy</h1><p>This service stores only what is needed to refresh access tokens on your behalf.</p></body></html>".to_string()
    }

    fn revoke_form(&self) -> String {
        "<html><body><form method=\"post\" action=\"/revoked\">\
         <input name=\"authid\" placeholder=\"AuthId\">\
         <button type=\"submit\">Revoke</button></form></body></html>"
            .to_string()
    }

    fn revoke_result(&self, ctx: &RevokeResultContext<'_>) -> String {
        format!("<html><body><p>{}</p></body></html>", ctx.message)
    }
}
