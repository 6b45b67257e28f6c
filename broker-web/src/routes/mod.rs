use actix_web::web::{self, ServiceConfig};

pub mod cli_token;
pub mod fetch;
pub mod index;
pub mod login;
pub mod logged_in;
pub mod privacy_policy;
pub mod refresh;
pub mod revoke;

pub fn config(cfg: &mut ServiceConfig) {
    cfg.service(web::resource("/").route(web::get().to(index::index)))
        .service(web::resource("/login").route(web::get().to(login::start_login)))
        .service(web::resource("/logged-in").route(web::get().to(logged_in::complete_login)))
        .service(web::resource("/cli-token").route(web::get().to(cli_token::cli_token_form)))
        .service(web::resource("/cli-token-login").route(web::post().to(cli_token::cli_token_login)))
        .service(web::resource("/fetch").route(web::get().to(fetch::fetch)))
        .service(web::resource("/privacy-policy").route(web::get().to(privacy_policy::privacy_policy)))
        .service(web::resource("/revoke").route(web::get().to(revoke::revoke_form)))
        .service(web::resource("/revoked").route(web::post().to(revoke::revoked)))
        .service(
            web::resource("/refresh")
                .route(web::get().to(refresh::refresh_get))
                .route(web::post().to(refresh::refresh_post)),
        );
}
