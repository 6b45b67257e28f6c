use actix_web::{
    web::{Data, Query},
    HttpResponse,
};
use broker_core::Broker;
use serde::Deserialize;

use crate::AppResult;

#[derive(Debug, Deserialize)]
pub struct LoginQuery {
    id: String,
    token: Option<String>,
}

pub async fn start_login(broker: Data<Broker>, query: Query<LoginQuery>) -> AppResult<HttpResponse> {
    let redirect = broker.start_login(&query.id, query.token.as_deref())?;
    Ok(HttpResponse::Found().insert_header(("Location", redirect.location)).finish())
}
