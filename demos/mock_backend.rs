//! Stand-in auth, user and product services for running the gateway locally.
//!
//! ```text
//! cargo run --example mock_backend
//! AUTH_SERVICE_URL=http://127.0.0.1:8081 USER_SERVICE_URL=http://127.0.0.1:8082 \
//!     PRODUCT_SERVICE_URL=http://127.0.0.1:8083 PORT=8080 cargo run
//! ```

use std::net::SocketAddr;

use axum::{extract::Request, Json, Router};
use serde_json::json;

async fn serve(name: &'static str, port: u16) -> std::io::Result<()> {
    let app = Router::new().fallback(move |request: Request| async move {
        tracing::info!(service = name, method = %request.method(), path = %request.uri().path(), "Handled");
        Json(json!({
            "service": name,
            "method": request.method().as_str(),
            "path": request.uri().path(),
        }))
    });

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(service = name, address = %addr, "Mock service listening");
    axum::serve(listener, app).await
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    tokio::try_join!(
        serve("auth", 8081),
        serve("users", 8082),
        serve("products", 8083),
    )?;
    Ok(())
}
