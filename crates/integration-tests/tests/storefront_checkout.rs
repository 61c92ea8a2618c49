//! Checkout flow against a running storefront.
//!
//! These tests require:
//! - The storefront running (cargo run -p zeaver-storefront)
//! - A backend with an active, in-stock product without sizes
//! - Guest order inserts allowed (check with `zv-cli check orders`)
//!
//! Run with: cargo test -p zeaver-integration-tests -- --ignored

use reqwest::{Client, StatusCode};
use zeaver_integration_tests::{first_product_id, location, shopper, storefront_base_url};

const SHIPPING: [(&str, &str); 9] = [
    ("first_name", "Anika"),
    ("last_name", "Rao"),
    ("email", "anika.integration@example.com"),
    ("phone", "9876543210"),
    ("address", "12 MG Road"),
    ("city", "Bengaluru"),
    ("state", "Karnataka"),
    ("postal_code", "560001"),
    ("country", "India"),
];

const PAYMENT: [(&str, &str); 4] = [
    ("card_name", "Anika Rao"),
    ("card_number", "4242 4242 4242 4242"),
    ("card_expiry", "12/35"),
    ("card_cvc", "123"),
];

async fn fill_cart(client: &Client) {
    let base_url = storefront_base_url();
    let html = client
        .get(format!("{base_url}/catalog?category=necklaces"))
        .send()
        .await
        .expect("Failed to get catalog")
        .text()
        .await
        .expect("Failed to read catalog");
    let product_id = first_product_id(&html).expect("Catalog has no products");

    client
        .post(format!("{base_url}/cart/add"))
        .form(&[("product_id", product_id.as_str()), ("quantity", "1")])
        .send()
        .await
        .expect("Failed to add to cart");
}

#[tokio::test]
#[ignore = "Requires running storefront and backend"]
async fn test_steps_cannot_be_skipped() {
    let client = shopper();
    let base_url = storefront_base_url();
    fill_cart(&client).await;

    let resp = client
        .get(format!("{base_url}/checkout/review"))
        .send()
        .await
        .expect("Failed to get review step");
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), Some("/checkout/shipping"));
}

#[tokio::test]
#[ignore = "Requires running storefront and backend"]
async fn test_invalid_shipping_is_rerendered() {
    let client = shopper();
    fill_cart(&client).await;

    let resp = client
        .post(format!("{}/checkout/shipping", storefront_base_url()))
        .form(&[("first_name", "Anika"), ("email", "not-an-email")])
        .send()
        .await
        .expect("Failed to post shipping");
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
#[ignore = "Requires running storefront and backend"]
async fn test_guest_checkout_places_order() {
    let client = shopper();
    let base_url = storefront_base_url();
    fill_cart(&client).await;

    let resp = client
        .post(format!("{base_url}/checkout/shipping"))
        .form(&SHIPPING)
        .send()
        .await
        .expect("Failed to post shipping");
    assert_eq!(location(&resp), Some("/checkout/payment"));

    let resp = client
        .post(format!("{base_url}/checkout/payment"))
        .form(&PAYMENT)
        .send()
        .await
        .expect("Failed to post payment");
    assert_eq!(location(&resp), Some("/checkout/review"));

    let resp = client
        .post(format!("{base_url}/checkout/place"))
        .send()
        .await
        .expect("Failed to place order");
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    let confirmation = location(&resp)
        .expect("No confirmation redirect")
        .to_string();
    assert!(confirmation.starts_with("/order-confirmation?order_id="));

    let body = client
        .get(format!("{base_url}{confirmation}"))
        .send()
        .await
        .expect("Failed to get confirmation")
        .text()
        .await
        .expect("Failed to read confirmation");
    assert!(body.contains("ZV"));
    assert!(!body.contains("4242 4242"));
}
