//! Zeaver Storefront library.
//!
//! The storefront is built as a library so the router can be driven
//! in-process by tests; `main.rs` only wires configuration, telemetry and the
//! listener around [`app`].

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod backend;
pub mod config;
pub mod content;
pub mod db;
pub mod error;
pub mod filters;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;

#[cfg(test)]
mod testing;

use axum::{Router, middleware::from_fn, middleware::from_fn_with_state};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tower_sessions::service::SignedCookie;
use tower_sessions::{SessionManagerLayer, SessionStore};

use crate::middleware::{
    csp_nonce_middleware, make_request_span, request_id_middleware, security_headers_middleware,
};
use crate::state::AppState;

/// Static assets, relative to the workspace root.
pub const STATIC_DIR: &str = "crates/storefront/static";

/// Markdown content, relative to the workspace root.
pub const CONTENT_DIR: &str = "crates/storefront/content";

/// Build the storefront router with its middleware stack.
///
/// Layers, outermost first: request tracing, request id, session, CSP nonce,
/// security headers. Rate limits sit on the individual form routes.
pub fn app<S>(state: AppState, session_layer: SessionManagerLayer<S, SignedCookie>) -> Router
where
    S: SessionStore + Clone,
{
    Router::new()
        .merge(routes::routes())
        .nest_service("/static", ServeDir::new(STATIC_DIR))
        .layer(from_fn_with_state(state.clone(), security_headers_middleware))
        .layer(from_fn(csp_nonce_middleware))
        .layer(session_layer)
        .layer(from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(make_request_span))
        .with_state(state)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use axum::{
        Json, Router as FakeRouter,
        body::Body,
        http::{HeaderValue, Request, StatusCode, header},
        response::Response,
        routing::{get, post},
    };
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use crate::backend::testing::spawn_backend;
    use crate::testing::{body_text, form_post, test_app, test_app_with_backend};

    const PRODUCT_ID: &str = "3f0e8a52-4d7f-4a7b-9a51-0a4c8a8b2c11";

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let response = test_app().oneshot(get_request("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "ok");
    }

    #[tokio::test]
    async fn test_home_survives_backend_outage() {
        let response = test_app().oneshot(get_request("/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let headers = response.headers();
        let csp = headers
            .get(header::CONTENT_SECURITY_POLICY)
            .unwrap()
            .to_str()
            .unwrap();
        assert!(csp.contains("'nonce-"));
        assert_eq!(headers.get(header::X_FRAME_OPTIONS).unwrap(), "DENY");
        assert!(headers.contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn test_upstream_request_id_is_echoed() {
        let request = Request::builder()
            .uri("/health")
            .header("x-request-id", "edge-42")
            .body(Body::empty())
            .unwrap();
        let response = test_app().oneshot(request).await.unwrap();
        assert_eq!(response.headers().get("x-request-id").unwrap(), "edge-42");
    }

    #[tokio::test]
    async fn test_empty_cart_page() {
        let response = test_app().oneshot(get_request("/cart")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("Your bag is empty"));
    }

    #[tokio::test]
    async fn test_checkout_with_empty_cart_goes_to_cart() {
        let response = test_app().oneshot(get_request("/checkout")).await.unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers().get(header::LOCATION).unwrap(), "/cart");
    }

    #[tokio::test]
    async fn test_account_requires_login() {
        let response = test_app().oneshot(get_request("/account")).await.unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers().get(header::LOCATION).unwrap(),
            "/auth/login?next=%2Faccount"
        );
    }

    #[tokio::test]
    async fn test_policy_pages() {
        let app = test_app();
        let response = app.clone().oneshot(get_request("/policies/shipping")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("Shipping Policy"));

        let response = app.oneshot(get_request("/policies/secret")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_blank_search_shows_prompt() {
        let response = test_app().oneshot(get_request("/search?q=%20")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("Type a name"));
    }

    #[tokio::test]
    async fn test_contact_form() {
        let app = test_app();
        let response = app
            .clone()
            .oneshot(form_post(
                "/contact",
                "name=Anika&email=anika%40example.com&subject=Sizing&message=Do+rings+run+small%3F",
                None,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers().get(header::LOCATION).unwrap(), "/contact");

        let response = app
            .oneshot(form_post("/contact", "name=Anika&email=nope&message=Hi", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body_text(response).await.contains("valid email"));
    }

    #[tokio::test]
    async fn test_add_unknown_product_redirects_with_flash() {
        let response = test_app()
            .oneshot(form_post("/cart/add", "product_id=not-a-uuid&quantity=1", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers().get(header::LOCATION).unwrap(), "/cart");
    }

    #[tokio::test]
    async fn test_cart_persists_in_session() {
        let backend = FakeRouter::new().route(
            "/rest/v1/products",
            get(|| async {
                Json(json!({
                    "id": PRODUCT_ID,
                    "name": "Lotus Pendant",
                    "price": "1299.00",
                    "stock_quantity": 4,
                    "created_at": "2026-01-05T10:00:00Z"
                }))
            }),
        );
        let app = test_app_with_backend(spawn_backend(backend).await);

        let body = format!("product_id={PRODUCT_ID}&quantity=2");
        let response = app
            .clone()
            .oneshot(form_post("/cart/add", &body, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .unwrap()
            .to_str()
            .unwrap()
            .split(';')
            .next()
            .unwrap()
            .to_string();

        let request = Request::builder()
            .uri("/cart/count")
            .header(header::COOKIE, &cookie)
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(body_text(response).await.trim(), "2");

        let response = app
            .clone()
            .oneshot(form_post("/cart/clear", "", Some(&cookie)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);

        let request = Request::builder()
            .uri("/cart/count")
            .header(header::COOKIE, &cookie)
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(body_text(response).await.trim(), "");
    }

    #[tokio::test]
    async fn test_htmx_add_returns_drawer() {
        let backend = FakeRouter::new().route(
            "/rest/v1/products",
            get(|| async {
                Json(json!({
                    "id": PRODUCT_ID,
                    "name": "Lotus Pendant",
                    "price": "1299.00",
                    "stock_quantity": 4,
                    "created_at": "2026-01-05T10:00:00Z"
                }))
            }),
        );
        let app = test_app_with_backend(spawn_backend(backend).await);

        let mut request = form_post("/cart/add", &format!("product_id={PRODUCT_ID}"), None);
        request
            .headers_mut()
            .insert("hx-request", HeaderValue::from_static("true"));
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers().get("hx-trigger").unwrap(), "cart-updated");
        let body = body_text(response).await;
        assert!(body.contains("Lotus Pendant"));
        assert!(body.contains("Your bag (1)"));
    }

    const ORDER_ID: &str = "9b2f7c1e-1111-4c3b-8a8a-2b7d9f0e1a22";

    const SHIPPING_BODY: &str = "first_name=Meera&last_name=Iyer&email=meera%40example.com&phone=&address=12+MG+Road&city=Bengaluru&state=Karnataka&postal_code=560001&country=India";

    const PAYMENT_BODY: &str = "card_name=Meera+Iyer&card_number=4242+4242+4242+4242&card_expiry=12%2F40&card_cvc=123";

    fn product_route(backend: FakeRouter) -> FakeRouter {
        backend.route(
            "/rest/v1/products",
            get(|| async {
                Json(json!({
                    "id": PRODUCT_ID,
                    "name": "Lotus Pendant",
                    "price": "1299.00",
                    "stock_quantity": 4,
                    "created_at": "2026-01-05T10:00:00Z"
                }))
            }),
        )
    }

    fn session_cookie(response: &Response) -> String {
        response
            .headers()
            .get(header::SET_COOKIE)
            .unwrap()
            .to_str()
            .unwrap()
            .split(';')
            .next()
            .unwrap()
            .to_string()
    }

    fn get_with_cookie(uri: &str, cookie: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header(header::COOKIE, cookie)
            .body(Body::empty())
            .unwrap()
    }

    fn location(response: &Response) -> &str {
        response.headers().get(header::LOCATION).unwrap().to_str().unwrap()
    }

    /// Put two pendants in a fresh bag and return the session cookie.
    async fn cart_with_pendants(app: &axum::Router) -> String {
        let body = format!("product_id={PRODUCT_ID}&quantity=2");
        let response = app
            .clone()
            .oneshot(form_post("/cart/add", &body, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        session_cookie(&response)
    }

    async fn post_step(app: &axum::Router, uri: &str, body: &str, cookie: &str) -> Response {
        app.clone()
            .oneshot(form_post(uri, body, Some(cookie)))
            .await
            .unwrap()
    }

    fn stored_order(number: &str) -> Value {
        json!({
            "id": ORDER_ID,
            "user_id": null,
            "order_number": number,
            "status": "pending",
            "subtotal": 2598,
            "shipping_cost": 0,
            "tax": 207.84,
            "total": 2805.84,
            "shipping_name": "Meera Iyer",
            "shipping_email": "meera@example.com",
            "shipping_address": "12 MG Road",
            "shipping_city": "Bengaluru",
            "shipping_state": "Karnataka",
            "shipping_postal_code": "560001",
            "shipping_country": "India",
            "payment_status": "pending",
            "created_at": "2026-02-01T12:00:00+00:00"
        })
    }

    #[tokio::test]
    async fn test_invalid_shipping_rerenders_with_errors() {
        let app = test_app_with_backend(spawn_backend(product_route(FakeRouter::new())).await);
        let cookie = cart_with_pendants(&app).await;

        let response = post_step(
            &app,
            "/checkout/shipping",
            "first_name=Meera&last_name=&email=nope&address=12+MG+Road&city=Bengaluru&state=Karnataka&postal_code=560001",
            &cookie,
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = body_text(response).await;
        assert!(body.contains("Enter a valid email address"));
        assert!(body.contains("Last name is required"));
        assert!(body.contains("Meera"));

        // Nothing was stored, so payment still sends the shopper back.
        let response = app
            .oneshot(get_with_cookie("/checkout/payment", &cookie))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/checkout/shipping");
    }

    #[tokio::test]
    async fn test_invalid_card_rerenders_payment() {
        let app = test_app_with_backend(spawn_backend(product_route(FakeRouter::new())).await);
        let cookie = cart_with_pendants(&app).await;

        let response = post_step(&app, "/checkout/shipping", SHIPPING_BODY, &cookie).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/checkout/payment");

        let response = post_step(
            &app,
            "/checkout/payment",
            "card_name=Meera+Iyer&card_number=4242+4242+4242+4241&card_expiry=13%2F40&card_cvc=12",
            &cookie,
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = body_text(response).await;
        assert!(body.contains("Enter a valid card number"));
        assert!(body.contains("Use MM/YY"));

        let response = app
            .oneshot(get_with_cookie("/checkout/review", &cookie))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/checkout/payment");
    }

    #[tokio::test]
    async fn test_place_order_clears_bag() {
        let items: Arc<Mutex<Vec<Value>>> = Arc::default();
        let captured = items.clone();
        let backend = product_route(FakeRouter::new())
            .route(
                "/rest/v1/rpc/generate_order_number",
                post(|| async { Json(json!("ZV20260101")) }),
            )
            .route(
                "/rest/v1/orders",
                post(|Json(row): Json<Value>| async move {
                    assert_eq!(row["shipping_email"], "meera@example.com");
                    (StatusCode::CREATED, Json(stored_order("ZV20260101")))
                }),
            )
            .route(
                "/rest/v1/order_items",
                post(move |Json(rows): Json<Vec<Value>>| async move {
                    captured.lock().unwrap().extend(rows);
                    StatusCode::CREATED
                }),
            );
        let app = test_app_with_backend(spawn_backend(backend).await);
        let cookie = cart_with_pendants(&app).await;

        let response = post_step(&app, "/checkout/shipping", SHIPPING_BODY, &cookie).await;
        assert_eq!(location(&response), "/checkout/payment");
        let response = post_step(&app, "/checkout/payment", PAYMENT_BODY, &cookie).await;
        assert_eq!(location(&response), "/checkout/review");

        let response = post_step(&app, "/checkout/place", "", &cookie).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            location(&response),
            format!("/order-confirmation?order_id={ORDER_ID}")
        );

        {
            let items = items.lock().unwrap();
            assert_eq!(items.len(), 1);
            assert_eq!(items[0]["order_id"], ORDER_ID);
            assert_eq!(items[0]["quantity"], 2);
        }

        let response = app
            .clone()
            .oneshot(get_with_cookie(&format!("/order-confirmation?order_id={ORDER_ID}"), &cookie))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("ZV20260101"));

        let response = app
            .clone()
            .oneshot(get_with_cookie("/cart/count", &cookie))
            .await
            .unwrap();
        assert_eq!(body_text(response).await.trim(), "");

        let response = app
            .oneshot(get_with_cookie("/checkout", &cookie))
            .await
            .unwrap();
        assert_eq!(location(&response), "/cart");
    }

    #[tokio::test]
    async fn test_place_drops_promo_that_no_longer_applies() {
        let lookups = Arc::new(AtomicUsize::new(0));
        let counter = lookups.clone();
        let inserts = Arc::new(AtomicUsize::new(0));
        let insert_counter = inserts.clone();
        let backend = product_route(FakeRouter::new())
            .route(
                "/rest/v1/promo_codes",
                get(move || {
                    // Used up between applying the code and placing the order.
                    let current_uses = if counter.fetch_add(1, Ordering::SeqCst) == 0 { 3 } else { 50 };
                    async move {
                        Json(json!([{
                            "id": "8e5d3fa7-9c24-4fc0-8fa6-5f9b3f3a7b66",
                            "code": "FESTIVE20",
                            "discount_type": "percentage",
                            "discount_value": 20,
                            "min_purchase": 1000,
                            "max_uses": 50,
                            "current_uses": current_uses,
                            "valid_until": null,
                            "is_active": true
                        }]))
                    }
                }),
            )
            .route(
                "/rest/v1/orders",
                post(move || {
                    insert_counter.fetch_add(1, Ordering::SeqCst);
                    async { StatusCode::INTERNAL_SERVER_ERROR }
                }),
            );
        let app = test_app_with_backend(spawn_backend(backend).await);
        let cookie = cart_with_pendants(&app).await;

        post_step(&app, "/checkout/shipping", SHIPPING_BODY, &cookie).await;
        post_step(&app, "/checkout/payment", PAYMENT_BODY, &cookie).await;

        let response = post_step(&app, "/checkout/promo", "code=festive20", &cookie).await;
        assert_eq!(location(&response), "/checkout/review");
        let response = app
            .clone()
            .oneshot(get_with_cookie("/checkout/review", &cookie))
            .await
            .unwrap();
        let body = body_text(response).await;
        assert!(body.contains("FESTIVE20"));

        let response = post_step(&app, "/checkout/place", "", &cookie).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/checkout/review");
        assert_eq!(inserts.load(Ordering::SeqCst), 0);
        assert_eq!(lookups.load(Ordering::SeqCst), 2);

        let response = app
            .oneshot(get_with_cookie("/checkout/review", &cookie))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_text(response).await;
        assert!(body.contains("Promo code FESTIVE20 was removed: Promo code has reached maximum uses."));
    }
}
