//! Integration tests for Zeaver.
//!
//! These run against a live storefront connected to a seeded backend and are
//! `#[ignore]`d by default.
//!
//! # Running Tests
//!
//! ```bash
//! cargo run -p zeaver-storefront &
//! STOREFRONT_BASE_URL=http://localhost:3000 \
//!     cargo test -p zeaver-integration-tests -- --ignored
//! ```
//!
//! # Test Categories
//!
//! - `storefront_pages` - Public pages, health and security headers
//! - `storefront_cart` - Session cart and HTMX fragments
//! - `storefront_checkout` - Checkout steps through order confirmation

use reqwest::{Client, redirect};

/// Base URL of the storefront under test.
#[must_use]
pub fn storefront_base_url() -> String {
    std::env::var("STOREFRONT_BASE_URL").unwrap_or_else(|_| "http://localhost:3000".to_string())
}

/// A shopper with their own cookie jar. Redirects are not followed so tests
/// can assert on `303`s and `Location`.
///
/// # Panics
///
/// Panics if the HTTP client cannot be built.
#[must_use]
#[allow(clippy::expect_used)]
pub fn shopper() -> Client {
    Client::builder()
        .cookie_store(true)
        .redirect(redirect::Policy::none())
        .build()
        .expect("Failed to create HTTP client")
}

/// First product id linked from an HTML page, if any.
#[must_use]
pub fn first_product_id(html: &str) -> Option<String> {
    const MARKER: &str = "/products/";
    const UUID_LEN: usize = 36;

    html.match_indices(MARKER).find_map(|(at, _)| {
        let start = at + MARKER.len();
        let candidate = html.get(start..start + UUID_LEN)?;
        candidate
            .chars()
            .all(|c| c.is_ascii_hexdigit() || c == '-')
            .then(|| candidate.to_string())
    })
}

/// `Location` header of a redirect.
#[must_use]
pub fn location(resp: &reqwest::Response) -> Option<&str> {
    resp.headers()
        .get(reqwest::header::LOCATION)
        .and_then(|v| v.to_str().ok())
}
