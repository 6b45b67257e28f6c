use std::sync::Arc;

use actix_web::{middleware, web::Data, App, HttpServer};
use broker_core::{Broker, ClientPool, EncryptedStore};
use broker_web::{
    catalog_loader,
    render::{Renderer, SimpleRenderer},
    routes,
    settings::Settings,
};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt::init();

    let settings = Settings::from_env();
    let catalog = catalog_loader::load_catalog(&settings).expect("failed to load service catalog");

    let store = settings.storage.as_ref().map(|dir| {
        std::fs::create_dir_all(dir).expect("failed to create STORAGE directory");
        EncryptedStore::new(dir.clone())
    });

    let client_pool = Arc::new(ClientPool::new());
    client_pool.spawn_recycler();

    let broker = Data::new(Broker::new(catalog, store, Arc::clone(&client_pool), settings.app_name.clone()));
    let settings_data = Data::new(settings.clone());
    let renderer: Data<Box<dyn Renderer>> = Data::new(Box::new(SimpleRenderer));

    let bind_addr = settings.bind_addr;
    eprintln!("binding {bind_addr}");

    HttpServer::new(move || {
        App::new()
            .app_data(broker.clone())
            .app_data(settings_data.clone())
            .app_data(renderer.clone())
            .wrap(middleware::NormalizePath::trim())
            .wrap(middleware::Logger::default())
            .configure(routes::config)
    })
    .bind(bind_addr)?
    .run()
    .await
}
