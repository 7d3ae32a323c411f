//! Stand-in backend for trying the gateway locally.
//!
//! Answers every request with a JSON echo of the method, path and the headers
//! the gateway forwarded, so `X-User-*` enrichment can be inspected by hand:
//!
//! ```text
//! cargo run --example echo_backend -- 127.0.0.1:8083
//! ```

use std::net::SocketAddr;

use axum::{
    http::{HeaderMap, Method, Uri},
    routing::any,
    Json, Router,
};
use tokio::net::TcpListener;

async fn echo(method: Method, uri: Uri, headers: HeaderMap) -> Json<serde_json::Value> {
    let headers: serde_json::Map<String, serde_json::Value> = headers
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or("<binary>").into()))
        .collect();

    Json(serde_json::json!({
        "method": method.as_str(),
        "uri": uri.to_string(),
        "headers": headers,
    }))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let addr: SocketAddr = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "127.0.0.1:8083".to_string())
        .parse()?;

    let app = Router::new().route("/", any(echo)).route("/{*path}", any(echo));
    let listener = TcpListener::bind(addr).await?;
    println!("echo backend listening on {addr}");
    axum::serve(listener, app).await?;
    Ok(())
}
