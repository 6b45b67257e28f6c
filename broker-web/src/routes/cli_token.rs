use actix_web::{
    web::{Data, Form, Query},
    HttpResponse,
};
use broker_core::{flow::CliTokenLoginParams, Broker};
use serde::Deserialize;

use crate::{
    render::{CliTokenFormContext, LoggedInContext, Renderer},
    AppResult,
};

#[derive(Debug, Deserialize)]
pub struct CliTokenQuery {
    id: String,
    token: Option<String>,
}

pub async fn cli_token_form(renderer: Data<Box<dyn Renderer>>, query: Query<CliTokenQuery>) -> HttpResponse {
    let ctx = CliTokenFormContext {
        service_id: &query.id,
        fetch_token: query.token.as_deref(),
    };

    HttpResponse::Ok()
        .content_type("text/html")
        .body(renderer.cli_token_form(&ctx))
}

#[derive(Debug, Deserialize)]
pub struct CliTokenSubmission {
    id: String,
    token: String,
    fetchtoken: Option<String>,
}

pub async fn cli_token_login(
    broker: Data<Broker>,
    renderer: Data<Box<dyn Renderer>>,
    form: Form<CliTokenSubmission>,
) -> AppResult<HttpResponse> {
    let outcome = broker
        .cli_token_login(CliTokenLoginParams {
            service_id: &form.id,
            raw_token: &form.token,
            fetch_token_key: form.fetchtoken.as_deref(),
        })
        .await?;

    let ctx = LoggedInContext {
        service_name: &outcome.service_name,
        auth_id: outcome.auth_id.as_deref(),
        de_auth_link: outcome.de_auth_link.as_deref(),
        error_message: outcome.error_message.as_deref(),
        additional_data: &outcome.additional_data,
    };

    Ok(HttpResponse::Ok().content_type("text/html").body(renderer.logged_in(&ctx)))
}
