use std::collections::{BTreeMap, HashMap};

use actix_web::{
    web::{Data, Query},
    HttpResponse,
};
use broker_core::{flow::CompleteLoginParams, Broker};

use crate::{
    errors::AppError,
    render::{LoggedInContext, Renderer},
    AppResult,
};

pub async fn complete_login(
    broker: Data<Broker>,
    renderer: Data<Box<dyn Renderer>>,
    query: Query<HashMap<String, String>>,
) -> AppResult<HttpResponse> {
    let state = query.get("state").ok_or(AppError::BadRequest)?;
    let code = query.get("code").ok_or(AppError::BadRequest)?;
    let token = query.get("token").map(String::as_str);

    let raw_query: BTreeMap<String, String> = query.iter().map(|(k, v)| (k.clone(), v.clone())).collect();

    let outcome = broker
        .complete_login(CompleteLoginParams {
            state,
            code,
            token,
            query: &raw_query,
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
