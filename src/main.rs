use std::io;
use std::path::Path;

use actix_files::Files;
use actix_web::{middleware::Logger, web, App, HttpServer};

use inbox_digest::config::{self, AppConfig};
use inbox_digest::routes::app_state::AppState;
use inbox_digest::routes::{chat_routes, summary_routes};
use inbox_digest::services::llm_service;

#[actix_web::main]
async fn main() -> io::Result<()> {
    let app_config = AppConfig::from_env().map_err(|e| {
        // Logging starts after .env is loaded so RUST_LOG from it applies.
        eprintln!("Configuration error: {}", e);
        io::Error::new(io::ErrorKind::InvalidInput, e.to_string())
    })?;
    config::init_logging();

    let backend = llm_service::build_backend(&app_config.completion);
    let state = web::Data::new(AppState::from_config(&app_config, backend));

    let static_dir = app_config.static_dir.clone();
    let serve_static = Path::new(&static_dir).is_dir();
    if !serve_static {
        log::info!("Static directory {} not found; serving API only", static_dir);
    }

    log::info!("Starting server on http://{}", app_config.bind_addr);
    HttpServer::new(move || {
        let app = App::new()
            .wrap(Logger::default())
            .app_data(state.clone())
            .configure(summary_routes::init_routes)
            .configure(chat_routes::init_routes);
        if serve_static {
            app.service(Files::new("/", static_dir.clone()).index_file("index.html"))
        } else {
            app
        }
    })
    .bind(app_config.bind_addr.as_str())?
    .run()
    .await
}
