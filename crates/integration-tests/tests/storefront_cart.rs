//! Session cart against a running storefront.
//!
//! These tests require:
//! - The storefront running (cargo run -p zeaver-storefront)
//! - A backend with at least one active, in-stock product without sizes
//!
//! Run with: cargo test -p zeaver-integration-tests -- --ignored

use reqwest::{Client, StatusCode};
use zeaver_integration_tests::{first_product_id, shopper, storefront_base_url};

async fn any_product_id(client: &Client) -> String {
    let html = client
        .get(format!("{}/catalog?category=necklaces", storefront_base_url()))
        .send()
        .await
        .expect("Failed to get catalog")
        .text()
        .await
        .expect("Failed to read catalog");
    first_product_id(&html).expect("Catalog has no products")
}

async fn cart_count(client: &Client) -> String {
    client
        .get(format!("{}/cart/count", storefront_base_url()))
        .send()
        .await
        .expect("Failed to get cart count")
        .text()
        .await
        .expect("Failed to read cart count")
}

#[tokio::test]
#[ignore = "Requires running storefront and backend"]
async fn test_add_and_clear_cart() {
    let client = shopper();
    let base_url = storefront_base_url();
    let product_id = any_product_id(&client).await;

    let resp = client
        .post(format!("{base_url}/cart/add"))
        .form(&[("product_id", product_id.as_str()), ("quantity", "2")])
        .send()
        .await
        .expect("Failed to add to cart");
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert!(cart_count(&client).await.contains('2'));

    let resp = client
        .post(format!("{base_url}/cart/clear"))
        .send()
        .await
        .expect("Failed to clear cart");
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert!(!cart_count(&client).await.contains('2'));
}

#[tokio::test]
#[ignore = "Requires running storefront and backend"]
async fn test_htmx_add_returns_drawer() {
    let client = shopper();
    let product_id = any_product_id(&client).await;

    let resp = client
        .post(format!("{}/cart/add", storefront_base_url()))
        .header("HX-Request", "true")
        .form(&[("product_id", product_id.as_str()), ("quantity", "1")])
        .send()
        .await
        .expect("Failed to add to cart");

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()["hx-trigger"], "cart-updated");
    let body = resp.text().await.expect("Failed to read drawer");
    assert!(body.contains("Your bag (1)"));
}

#[tokio::test]
#[ignore = "Requires running storefront and backend"]
async fn test_carts_are_per_session() {
    let alice = shopper();
    let bob = shopper();
    let product_id = any_product_id(&alice).await;

    alice
        .post(format!("{}/cart/add", storefront_base_url()))
        .form(&[("product_id", product_id.as_str()), ("quantity", "3")])
        .send()
        .await
        .expect("Failed to add to cart");

    assert!(cart_count(&alice).await.contains('3'));
    assert!(!cart_count(&bob).await.contains('3'));
}
