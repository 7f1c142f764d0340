//! Shift Optimizer - Axum Server
//!
//! Run with: cargo run
//! Then open: http://localhost:8000/q/swagger-ui

use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

use shift_optimizer::api;
use shift_optimizer::config::OptimizerConfig;
use shift_optimizer::console;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("shift_optimizer=info".parse()?))
        .init();

    let config = OptimizerConfig::load()?;
    console::print_banner();

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = Arc::new(api::AppState::new(config));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = api::router(state).layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(cors));

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "Server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
