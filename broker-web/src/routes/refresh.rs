use actix_web::{
    web::{Data, Form, Query},
    HttpRequest, HttpResponse,
};
use broker_core::{flow::RefreshOutcome, Broker};
use serde::Deserialize;

use crate::{errors::AppError, AppResult};

#[derive(Debug, Deserialize, Default)]
pub struct RefreshParams {
    authid: Option<String>,
}

fn extract_auth_id(req: &HttpRequest, query: &RefreshParams, form: Option<&RefreshParams>) -> Option<String> {
    form.and_then(|f| f.authid.clone())
        .or_else(|| query.authid.clone())
        .or_else(|| {
            req.headers()
                .get("X-AuthID")
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned)
        })
}

pub async fn refresh_get(
    broker: Data<Broker>,
    req: HttpRequest,
    query: Query<RefreshParams>,
) -> AppResult<HttpResponse> {
    let auth_id = extract_auth_id(&req, &query, None).ok_or(AppError::BadRequest)?;
    respond(&broker, &auth_id).await
}

pub async fn refresh_post(
    broker: Data<Broker>,
    req: HttpRequest,
    query: Query<RefreshParams>,
    form: Form<RefreshParams>,
) -> AppResult<HttpResponse> {
    let auth_id = extract_auth_id(&req, &query, Some(&form)).ok_or(AppError::BadRequest)?;
    respond(&broker, &auth_id).await
}

async fn respond(broker: &Broker, auth_id: &str) -> AppResult<HttpResponse> {
    match broker.refresh(auth_id).await? {
        RefreshOutcome::Success(reply) => Ok(HttpResponse::Ok().json(reply)),
        RefreshOutcome::InvalidKeyOrPassword => Ok(HttpResponse::Unauthorized()
            .insert_header(("X-Reason", "Invalid key or password"))
            .finish()),
    }
}
