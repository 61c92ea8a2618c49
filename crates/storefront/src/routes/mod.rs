//! HTTP route handlers for the storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /                        - Home page
//! GET  /health                  - Liveness check
//! GET  /health/ready            - Readiness check (session database)
//!
//! # Catalog
//! GET  /catalog                 - Filtered, sorted, paginated product grid
//! GET  /products/{id}           - Product detail
//! POST /products/{id}/reviews   - Submit a review (requires auth)
//! GET  /search?q=               - Product search
//!
//! # Cart (HTMX fragments when `HX-Request` is set)
//! GET  /cart                    - Cart page
//! GET  /cart/drawer             - Cart drawer fragment
//! GET  /cart/count              - Cart count badge fragment
//! POST /cart/add                - Add a product
//! POST /cart/update             - Set a line quantity
//! POST /cart/increment          - Quantity + 1
//! POST /cart/decrement          - Quantity - 1 (removes at zero)
//! POST /cart/remove             - Remove a line
//! POST /cart/clear              - Empty the cart
//!
//! # Checkout
//! GET  /checkout                - Redirect to the first incomplete step
//! GET  /checkout/shipping       - Shipping form
//! POST /checkout/shipping       - Validate and store shipping
//! GET  /checkout/payment        - Payment form
//! POST /checkout/payment        - Validate and store payment
//! GET  /checkout/review         - Review order
//! POST /checkout/promo          - Apply a promo code
//! POST /checkout/promo/remove   - Remove the promo code
//! POST /checkout/place          - Place the order
//! GET  /order-confirmation      - Order summary
//!
//! # Auth
//! GET  /auth/login              - Login page
//! POST /auth/login              - Password sign-in
//! GET  /auth/signup             - Signup page
//! POST /auth/signup             - Create account
//! POST /auth/logout             - Sign out
//! GET  /auth/forgot-password    - Password reset page
//! POST /auth/forgot-password    - Send reset email
//! GET  /auth/google             - Start Google sign-in (PKCE)
//! GET  /auth/callback           - PKCE code exchange
//!
//! # Account (requires auth)
//! GET  /account?tab=            - Account tabs
//! POST /account/profile         - Update profile
//! POST /account/password        - Change password
//! POST /wishlist/add            - Save a product
//! POST /wishlist/remove         - Unsave a product
//!
//! # Content
//! POST /newsletter              - Newsletter signup
//! GET  /about                   - About page
//! GET  /policies/{slug}         - Policy pages
//! GET  /contact                 - Contact form
//! POST /contact                 - Submit contact form
//! ```

pub mod account;
pub mod auth;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod contact;
pub mod health;
pub mod home;
pub mod newsletter;
pub mod orders;
pub mod pages;
pub mod products;
pub mod search;
pub mod wishlist;

use axum::{
    Router,
    routing::{get, post},
};
use rust_decimal::Decimal;

use zeaver_core::PricingPolicy;

use crate::middleware::{auth_rate_limiter, form_rate_limiter};
use crate::state::AppState;

/// Format an amount in the store currency, e.g. `₹1299.00`.
pub(crate) fn format_money(pricing: &PricingPolicy, amount: Decimal) -> String {
    pricing.money(amount).to_string()
}

/// Resolve a user-supplied redirect target.
///
/// Only same-site absolute paths are honored; anything else (including
/// protocol-relative `//host` URLs) falls back to `default`.
pub(crate) fn safe_redirect(target: Option<&str>, default: &str) -> String {
    match target.map(str::trim) {
        Some(t) if t.starts_with('/') && !t.starts_with("//") && !t.contains('\\') => t.to_string(),
        _ => default.to_string(),
    }
}

/// Pages and fragments that only read.
fn page_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(home::home))
        .route("/catalog", get(catalog::index))
        .route("/products/{id}", get(products::show))
        .route("/search", get(search::search))
        .route("/cart", get(cart::show))
        .route("/cart/drawer", get(cart::drawer))
        .route("/cart/count", get(cart::count))
        .route("/checkout", get(checkout::start))
        .route("/checkout/shipping", get(checkout::shipping_page))
        .route("/checkout/payment", get(checkout::payment_page))
        .route("/checkout/review", get(checkout::review_page))
        .route("/order-confirmation", get(orders::confirmation))
        .route("/auth/login", get(auth::login_page))
        .route("/auth/signup", get(auth::signup_page))
        .route("/auth/forgot-password", get(auth::forgot_password_page))
        .route("/auth/google", get(auth::google))
        .route("/auth/callback", get(auth::callback))
        .route("/auth/logout", post(auth::logout))
        .route("/account", get(account::index))
        .route("/about", get(pages::about))
        .route("/policies/{slug}", get(pages::policy))
        .route("/contact", get(contact::show))
        .route("/health", get(health::live))
        .route("/health/ready", get(health::ready))
}

/// Credential endpoints, limited to ~10 requests per minute per IP.
fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/login", post(auth::login))
        .route("/auth/signup", post(auth::signup))
        .route("/auth/forgot-password", post(auth::forgot_password))
        .layer(auth_rate_limiter())
}

/// Shopper form posts, limited to ~100 requests per minute per IP.
fn form_routes() -> Router<AppState> {
    Router::new()
        .route("/products/{id}/reviews", post(products::add_review))
        .route("/cart/add", post(cart::add))
        .route("/cart/update", post(cart::update))
        .route("/cart/increment", post(cart::increment))
        .route("/cart/decrement", post(cart::decrement))
        .route("/cart/remove", post(cart::remove))
        .route("/cart/clear", post(cart::clear))
        .route("/checkout/shipping", post(checkout::shipping))
        .route("/checkout/payment", post(checkout::payment))
        .route("/checkout/promo", post(checkout::apply_promo))
        .route("/checkout/promo/remove", post(checkout::remove_promo))
        .route("/checkout/place", post(checkout::place))
        .route("/account/profile", post(account::update_profile))
        .route("/account/password", post(account::change_password))
        .route("/wishlist/add", post(wishlist::add))
        .route("/wishlist/remove", post(wishlist::remove))
        .route("/newsletter", post(newsletter::subscribe))
        .route("/contact", post(contact::submit))
        .layer(form_rate_limiter())
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    page_routes().merge(auth_routes()).merge(form_routes())
}
