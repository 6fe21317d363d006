use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use dotenvy::dotenv;
use insuite_bridge::api::configure_routes;
use insuite_bridge::api::customer_controller::{AppState, USE_INTERNAL_HEADER};
use insuite_bridge::config::{BridgeConfig, DEFAULT_SERVICE_HEADER};
use insuite_bridge::models::field_map::FieldMap;
use insuite_bridge::services::insuite_service::InsuiteClient;
use insuite_bridge::services::middleware::{InboundGuard, InboundGuardConfig};
use log::{info, warn};
use std::io;

fn startup_error(e: impl std::fmt::Display) -> io::Error {
    io::Error::new(io::ErrorKind::Other, e.to_string())
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    // Load .env file
    dotenv().ok();
    // Initialize logger
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let config = BridgeConfig::from_env().map_err(startup_error)?;
    info!("Loaded configuration: {:?}", config);

    let field_map = match &config.field_map_path {
        Some(path) => FieldMap::load(path),
        None => FieldMap::embedded(),
    }
    .map_err(startup_error)?;
    info!("Field map has {} entries", field_map.len());

    let guard = match &config.inbound_guard {
        Some(settings) => {
            let guard = InboundGuardConfig::from_settings(settings).map_err(startup_error)?;
            guard.start_cleanup_task();
            Some(guard)
        }
        None => {
            warn!("BRIDGE_SERVICE_KEY not set, inbound API is unauthenticated");
            None
        }
    };

    let guard_header = config
        .inbound_guard
        .as_ref()
        .map(|settings| settings.header_name.clone())
        .unwrap_or_else(|| DEFAULT_SERVICE_HEADER.to_string());

    let client = InsuiteClient::new(&config).map_err(startup_error)?;
    let (host, port) = (config.host.clone(), config.port);

    info!(
        "inSuite gateway: {} ({} network by default)",
        config.endpoint_url(config.default_network),
        config.default_network
    );
    info!("Starting server at {}:{}", host, port);

    let state = web::Data::new(AppState {
        config,
        client,
        field_map,
    });

    HttpServer::new(move || {
        let inbound = match &guard {
            Some(guard) => InboundGuard::new(guard.clone()),
            None => InboundGuard::disabled(),
        };

        App::new()
            .app_data(state.clone())
            .wrap(inbound)
            .wrap(middleware::Logger::default())
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allowed_methods(vec!["GET", "POST", "OPTIONS"])
                    .allowed_headers(vec![
                        actix_web::http::header::ACCEPT,
                        actix_web::http::header::CONTENT_TYPE,
                    ])
                    .allowed_header(USE_INTERNAL_HEADER)
                    .allowed_header(guard_header.as_str())
                    .max_age(3600),
            )
            .configure(configure_routes)
    })
    .bind((host, port))?
    .run()
    .await
}
