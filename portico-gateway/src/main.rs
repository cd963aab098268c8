//! Entry point for the `portico-gateway` HTTP server.

use std::path::Path;

use portico_gateway::config::{GatewayConfig, CONFIG_ENV};
use portico_gateway::http::build_app;
use tracing::info;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let config = match std::env::var(CONFIG_ENV) {
        Ok(path) => match GatewayConfig::from_file(Path::new(&path)) {
            Ok(config) => config,
            Err(e) => {
                tracing::error!(path = %path, error = %e, "failed to load config");
                std::process::exit(1);
            }
        },
        Err(_) => GatewayConfig::default(),
    };

    if config.services.is_empty() {
        tracing::warn!("no services configured; every init will be rejected");
    }

    let addr = config.listen_addr.clone();
    let app = build_app(&config);

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!(addr = %addr, error = %e, "failed to bind");
            std::process::exit(1);
        }
    };

    info!(addr = %addr, "portico-gateway listening");

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!(error = %e, "server error");
        std::process::exit(1);
    }
}
