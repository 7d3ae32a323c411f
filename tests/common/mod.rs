//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use api_gateway::config::schema::{AuthPolicy, BackendConfig, GatewayConfig, RetryConfig, RouteConfig};
use api_gateway::security::token::{TokenIssuer, TokenKind};
use api_gateway::{HttpServer, Shutdown};
use axum::{
    http::{HeaderMap, Method, StatusCode, Uri},
    routing::any,
    Json, Router,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

pub const SECRET: &str = "integration-secret-integration-secret";
pub const ORIGIN: &str = "http://localhost:5173";

async fn echo(method: Method, uri: Uri, headers: HeaderMap) -> Json<serde_json::Value> {
    let headers: serde_json::Map<String, serde_json::Value> = headers
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or("").into()))
        .collect();
    Json(serde_json::json!({
        "method": method.as_str(),
        "uri": uri.to_string(),
        "headers": headers,
    }))
}

async fn serve(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

/// Backend answering every request with a JSON echo of what it received.
pub async fn start_echo_backend() -> SocketAddr {
    serve(Router::new().route("/", any(echo)).route("/{*path}", any(echo))).await
}

/// Start a programmable mock backend with async support.
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, HeaderMap, String)> + Send + 'static,
{
    let f = Arc::new(f);
    let app = Router::new().fallback(move || {
        let f = f.clone();
        async move {
            let (status, headers, body) = f().await;
            (StatusCode::from_u16(status).unwrap(), headers, body)
        }
    });
    serve(app).await
}

/// Backend that reads the whole request body before answering with its length.
pub async fn start_body_reading_backend() -> SocketAddr {
    serve(Router::new().fallback(|body: axum::body::Bytes| async move { body.len().to_string() })).await
}

/// An address with nothing listening on it.
pub async fn closed_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

pub fn route(id: &str, paths: &[&str], methods: &[&str], auth: AuthPolicy) -> RouteConfig {
    RouteConfig {
        id: id.to_string(),
        paths: paths.iter().map(|s| s.to_string()).collect(),
        methods: methods.iter().map(|s| s.to_string()).collect(),
        backend: "shop".to_string(),
        auth,
        required_roles: Vec::new(),
        timeout_ms: None,
        retry: None,
    }
}

/// The shop route table, every route pointing at `backend`.
pub fn shop_config(backend: SocketAddr) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.jwt.secret = SECRET.to_string();
    config.cors.allowed_origins = vec![ORIGIN.to_string()];
    config.backends.push(BackendConfig {
        name: "shop".to_string(),
        url: format!("http://{backend}"),
    });

    let mut admin = route("admin", &["/api/admin/**"], &[], AuthPolicy::Required);
    admin.required_roles = vec!["ADMIN".to_string()];

    config.routes = vec![
        route("auth-public", &["/api/auth/login", "/api/auth/register"], &[], AuthPolicy::None),
        route("catalog-read", &["/api/products/**"], &["GET"], AuthPolicy::None),
        route("cart-current", &["/api/carts/current"], &["GET"], AuthPolicy::Optional),
        route("carts", &["/api/carts/**"], &[], AuthPolicy::Required),
        route("orders", &["/api/orders/**"], &[], AuthPolicy::Required),
        admin,
        route("users", &["/api/users/**", "/api/auth/**"], &[], AuthPolicy::Required),
    ];
    config
}

/// Single catch-all public route with a retry policy and short timeout.
pub fn flaky_config(backend: SocketAddr, timeout_ms: u64, retry: Option<RetryConfig>) -> GatewayConfig {
    let mut config = shop_config(backend);
    let mut public = route("public", &["/**"], &[], AuthPolicy::None);
    public.timeout_ms = Some(timeout_ms);
    public.retry = retry;
    config.routes = vec![public];
    config
}

/// Spawn the gateway on a free local port.
pub async fn start_gateway(config: GatewayConfig) -> (SocketAddr, Shutdown) {
    let server = HttpServer::new(config).unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let rx = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, rx).await;
    });
    (addr, shutdown)
}

/// Write `request` verbatim and read the response head plus its
/// `Content-Length` body. For requests `reqwest` would rewrite.
pub async fn raw_request(addr: SocketAddr, request: &[u8]) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(request).await.unwrap();

    let mut response = Vec::new();
    let mut chunk = [0u8; 4096];
    let read = async {
        loop {
            match stream.read(&mut chunk).await {
                Ok(0) | Err(_) => break,
                Ok(n) => response.extend_from_slice(&chunk[..n]),
            }
            if response_complete(&response) {
                break;
            }
        }
    };
    tokio::time::timeout(Duration::from_secs(5), read).await.unwrap();
    String::from_utf8_lossy(&response).into_owned()
}

fn response_complete(bytes: &[u8]) -> bool {
    let text = String::from_utf8_lossy(bytes);
    let Some(head_end) = text.find("\r\n\r\n") else {
        return false;
    };
    let length = text[..head_end]
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            name.eq_ignore_ascii_case("content-length").then(|| value.trim().parse::<usize>().ok())?
        })
        .unwrap_or(0);
    bytes.len() >= head_end + 4 + length
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

pub fn access_token(user_id: &str, roles: &[&str]) -> String {
    let roles: Vec<String> = roles.iter().map(|s| s.to_string()).collect();
    TokenIssuer::new(SECRET, 3600, 3600)
        .issue(TokenKind::Access, "shopper@example.com", Some(user_id), &roles)
        .unwrap()
}

pub fn expired_token() -> String {
    let now = jsonwebtoken::get_current_timestamp();
    TokenIssuer::new(SECRET, 3600, 3600)
        .issue_at(
            TokenKind::Access,
            "shopper@example.com",
            Some("7"),
            &["CUSTOMER".to_string()],
            now - 7200,
            now - 3600,
        )
        .unwrap()
}
