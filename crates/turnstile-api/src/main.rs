//! # turnstile-demo
//!
//! Serves the demo router. See [`turnstile_api::demo`] for routes and
//! environment variables.

use turnstile_api::demo::{self, DemoConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = DemoConfig::from_env();
    let port = config.port;

    let app = demo::router(config).map_err(|e| {
        tracing::error!("Route configuration failed: {e}");
        e
    })?;

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("turnstile demo listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
