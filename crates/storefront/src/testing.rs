//! Router test harness: in-memory sessions, inline content and a lazily
//! connected pool that the tests never touch.

use std::net::{IpAddr, Ipv4Addr};

use axum::{
    Router,
    body::Body,
    http::{Request, header},
    response::Response,
};
use secrecy::SecretString;
use sqlx::postgres::PgPoolOptions;
use tower_sessions::MemoryStore;

use zeaver_core::PricingPolicy;

use crate::backend::BackendClient;
use crate::config::{BackendConfig, StorefrontConfig};
use crate::content::ContentStore;
use crate::middleware::session_layer;
use crate::state::AppState;

/// Nothing listens on the discard port, so backend calls fail fast.
const UNREACHABLE_BACKEND: &str = "http://127.0.0.1:9";

const SHIPPING_PAGE: &str = "---\ntitle: Shipping Policy\nupdated_at: 2026-01-12\n---\nOrders ship in 3 to 5 days.\n";
const ABOUT_PAGE: &str = "---\ntitle: About Zeaver\n---\nMade by hand in Jaipur.\n";

pub fn test_config(backend_url: &str) -> StorefrontConfig {
    StorefrontConfig {
        database_url: SecretString::from("postgres://localhost/zeaver_test"),
        host: IpAddr::V4(Ipv4Addr::LOCALHOST),
        port: 3000,
        base_url: "http://localhost:3000".to_string(),
        session_secret: SecretString::from("k8Jq2mZx7Rv4Tn9Wc3Lp6Hs1Fd5Gb0Ya"),
        backend: BackendConfig {
            url: backend_url.to_string(),
            anon_key: "test-anon-key".to_string(),
            service_role_key: None,
        },
        pricing: PricingPolicy::default(),
        default_country: "India".to_string(),
        sentry_dsn: None,
        sentry_environment: "test".to_string(),
        sentry_sample_rate: 0.0,
        sentry_traces_sample_rate: 0.0,
    }
}

/// State whose backend lives at `backend_url`.
///
/// # Panics
///
/// If the placeholder database URL fails to parse.
pub fn test_state(backend_url: &str) -> AppState {
    let config = test_config(backend_url);
    let pool = PgPoolOptions::new()
        .connect_lazy("postgres://localhost/zeaver_test")
        .expect("lazy pool");
    let backend = BackendClient::new(&config.backend);
    let content = ContentStore::from_documents([("shipping", SHIPPING_PAGE), ("about", ABOUT_PAGE)])
        .expect("test content parses");
    AppState::from_parts(config, pool, backend, content)
}

/// The full router, with a backend that refuses connections.
pub fn test_app() -> Router {
    test_app_with_backend(UNREACHABLE_BACKEND.to_string())
}

/// The full router against a fake backend.
pub fn test_app_with_backend(backend_url: String) -> Router {
    let state = test_state(&backend_url);
    let key = state.config().session_key();
    crate::app(state, session_layer(MemoryStore::default(), key, false))
}

/// A form POST from a fixed client address, so rate limiting can key it.
///
/// # Panics
///
/// If the request can't be built.
pub fn form_post(uri: &str, body: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .header("x-forwarded-for", "203.0.113.10");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body.to_string())).expect("request")
}

/// Collect a response body as text.
///
/// # Panics
///
/// If the body can't be read or isn't UTF-8.
pub async fn body_text(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    String::from_utf8(bytes.to_vec()).expect("utf-8 body")
}
