use actix_web::{
    http::StatusCode,
    web::{Data, Form},
    HttpRequest, HttpResponse,
};
use broker_core::{flow::RevokeOutcome, Broker};
use serde::Deserialize;

use crate::render::{Renderer, RevokeResultContext};

pub async fn revoke_form(renderer: Data<Box<dyn Renderer>>) -> HttpResponse {
    HttpResponse::Ok().content_type("text/html").body(renderer.revoke_form())
}

#[derive(Debug, Deserialize, Default)]
pub struct RevokeSubmission {
    authid: Option<String>,
}

/// The upstream design this broker reimplements returns HTTP 400 even on a
/// successful revoke. Preserved deliberately; see the design notes.
const REVOKE_STATUS: StatusCode = StatusCode::BAD_REQUEST;

pub async fn revoked(
    broker: Data<Broker>,
    renderer: Data<Box<dyn Renderer>>,
    req: HttpRequest,
    form: Form<RevokeSubmission>,
) -> HttpResponse {
    let auth_id = form.authid.clone().or_else(|| {
        req.headers()
            .get("X-AuthID")
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned)
    });

    let Some(auth_id) = auth_id else {
        return HttpResponse::build(REVOKE_STATUS)
            .content_type("text/html")
            .body(renderer.revoke_result(&RevokeResultContext { message: "Missing AuthId" }));
    };

    let message = match broker.revoke(&auth_id).await {
        RevokeOutcome::V2Rejected => {
            "This is a stateless credential; de-authorize the application on the storage providers website."
        }
        RevokeOutcome::Malformed | RevokeOutcome::NoStore | RevokeOutcome::InvalidAuthId => "Invalid AuthId",
        RevokeOutcome::InternalError => "Internal error, failed to revoke token",
        RevokeOutcome::Revoked => "Token is revoked",
    };

    HttpResponse::build(REVOKE_STATUS)
        .content_type("text/html")
        .body(renderer.revoke_result(&RevokeResultContext { message }))
}
