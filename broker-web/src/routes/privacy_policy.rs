use actix_web::{web::Data, HttpResponse};

use crate::{render::Renderer, settings::Settings};

pub async fn privacy_policy(settings: Data<Settings>, renderer: Data<Box<dyn Renderer>>) -> HttpResponse {
    match &settings.privacy_policy_url {
        Some(url) => HttpResponse::Found().insert_header(("Location", url.clone())).finish(),
        None => HttpResponse::Ok().content_type("text/html").body(renderer.privacy_policy()),
    }
}
