use actix_web::{
    web::{Data, Query},
    HttpResponse,
};
use broker_core::{flow::FetchOutcome, Broker};
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Deserialize)]
pub struct FetchQuery {
    token: Option<String>,
    callback: Option<String>,
    jsonp: Option<String>,
}

pub async fn fetch(broker: Data<Broker>, query: Query<FetchQuery>) -> HttpResponse {
    let body = match broker.fetch(query.token.as_deref()) {
        FetchOutcome::MissingToken => json!({"error": "Missing token"}),
        FetchOutcome::NoSuchEntry => json!({"error": "No such entry"}),
        FetchOutcome::NotReady => json!({"wait": "Not ready"}),
        FetchOutcome::Error(message) => json!({"error": message}),
        FetchOutcome::AuthId(id) => json!({"authid": id}),
    };

    match query.callback.as_deref().or(query.jsonp.as_deref()) {
        Some(name) => HttpResponse::Ok()
            .content_type("application/javascript")
            .body(format!("{name}({body})")),
        None => HttpResponse::Ok().content_type("application/json").body(body.to_string()),
    }
}
