use actix_web::{
    web::{Data, Query},
    HttpResponse,
};
use broker_core::Broker;
use serde::Deserialize;

use crate::{
    render::{IndexContext, Renderer, ServiceLink},
    settings::Settings,
    AppResult,
};

#[derive(Debug, Deserialize)]
pub struct IndexQuery {
    token: Option<String>,
    #[serde(rename = "type")]
    type_filter: Option<String>,
    /// Opaque, passed through to the template untouched.
    redir: Option<String>,
}

pub async fn index(
    broker: Data<Broker>,
    settings: Data<Settings>,
    renderer: Data<Box<dyn Renderer>>,
    query: Query<IndexQuery>,
) -> AppResult<HttpResponse> {
    if let Some(token) = &query.token {
        broker.register_fetch_token(token);
    }

    let services: Vec<_> = broker
        .catalog()
        .listed(query.type_filter.as_deref())
        .map(|svc| {
            let entry_point = if svc.flags.cli_token { "cli-token" } else { "login" };
            let mut href = format!("/{entry_point}?id={}", svc.id);
            if let Some(token) = &query.token {
                href.push_str(&format!("&token={token}"));
            }
            ServiceLink {
                id: &svc.id,
                name: &svc.name,
                href,
                brand_image: svc.brand_image.as_deref(),
            }
        })
        .collect();

    let ctx = IndexContext {
        display_name: &settings.display_name,
        services,
        redir: query.redir.as_deref(),
    };

    Ok(HttpResponse::Ok().content_type("text/html").body(renderer.index(&ctx)))
}
