//! ChatDKU Web Frontend Server
//!
//! Entry point for the university chatbot web frontend.

use std::sync::Arc;

use dotenvy::dotenv;
use mimalloc::MiMalloc;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use chatdku_web::config::AppConfig;
use chatdku_web::server::start_server;

/// Global allocator for improved performance (M-MIMALLOC-APPS).
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() {
    // Initialize tracing (M-LOG-STRUCTURED)
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .init();

    // Load .env (if present)
    let _ = dotenv();

    let config = match AppConfig::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            std::process::exit(1);
        }
    };

    tracing::info!(
        name: "config.loaded",
        backend_internal_url = %config.backend.internal_url,
        api_base_url = %config.backend.api_base_url,
        dev_mode = config.ui.dev_mode,
        "Configuration loaded"
    );

    if let Err(e) = start_server(Arc::new(config)).await {
        eprintln!("Server error: {e}");
        std::process::exit(1);
    }
}
