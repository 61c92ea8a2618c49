//! Backend diagnostics.
//!
//! Read-only checks of the data API, except `check orders`, which inserts and
//! then deletes a single canary row.
//!
//! # Environment Variables
//!
//! - `BACKEND_URL`, `BACKEND_ANON_KEY` - required
//! - `BACKEND_SERVICE_ROLE_KEY` - optional; lets the checks see inactive rows

#![allow(clippy::print_stdout)]

use chrono::Utc;
use serde_json::{Value, json};

use zeaver_storefront::backend::{Auth, BackendClient, Product, Query};

use super::{CommandError, backend};

/// Rows shown per table.
const SAMPLE_SIZE: u32 = 5;

/// Service key when configured, so checks see past row-level security.
fn check_auth(client: &BackendClient) -> Auth<'static> {
    if client.has_service_key() {
        Auth::Service
    } else {
        Auth::Anon
    }
}

/// List the first products regardless of `is_active`, then run the
/// storefront's detail query on the first one.
pub async fn products() -> Result<(), CommandError> {
    let client = backend()?;
    let query = Query::table("products").select("*").limit(SAMPLE_SIZE);
    let products: Vec<Product> = client.fetch_all(&query, check_auth(&client)).await?;

    println!("{} product(s):", products.len());
    for p in &products {
        println!(
            "  {}  {:<32} {:>10}  stock {:>4}  {}",
            p.id,
            p.name,
            p.price,
            p.stock_quantity,
            if p.is_active { "active" } else { "INACTIVE" }
        );
    }

    let Some(first) = products.first() else {
        println!("No products found. Is the products table empty or hidden by a policy?");
        return Ok(());
    };

    match client.get_product(first.id).await {
        Ok(product) => println!("Detail query OK for {:?}", product.name),
        Err(e) if e.is_not_found() => {
            println!("Detail query found nothing for {} (inactive products are hidden)", first.id);
        }
        Err(e) => println!("Detail query FAILED: {e}"),
    }
    match client.get_product_reviews(first.id).await {
        Ok(reviews) => println!("Reviews query OK: {} approved review(s)", reviews.len()),
        Err(e) => println!("Reviews query FAILED: {e}"),
    }
    Ok(())
}

/// Print the columns and a sample row of the tables the storefront reads
/// loosely.
pub async fn schema() -> Result<(), CommandError> {
    let client = backend()?;
    for table in ["reviews", "user_profiles"] {
        let query = Query::table(table).select("*").limit(SAMPLE_SIZE);
        match client.fetch_all::<Value>(&query, check_auth(&client)).await {
            Ok(rows) => print_sample(table, &rows),
            Err(e) => println!("{table}: FAILED ({e})"),
        }
    }
    Ok(())
}

fn print_sample(table: &str, rows: &[Value]) {
    println!("{table}: {} row(s)", rows.len());
    let Some(Value::Object(first)) = rows.first() else {
        return;
    };
    let columns: Vec<&str> = first.keys().map(String::as_str).collect();
    println!("  columns: {}", columns.join(", "));
    match serde_json::to_string_pretty(first) {
        Ok(pretty) => println!("  sample: {pretty}"),
        Err(e) => println!("  sample: unprintable ({e})"),
    }
}

/// Canary row for `check orders`.
fn canary_order(order_number: &str) -> Value {
    json!({
        "user_id": null,
        "order_number": order_number,
        "status": "pending",
        "payment_status": "pending",
        "subtotal": "0.00",
        "shipping_cost": "0.00",
        "tax": "0.00",
        "total": "0.00",
        "shipping_name": "Guest Canary",
        "shipping_email": "canary@example.com",
        "shipping_address": "1 Canary Street",
        "shipping_city": "Jaipur",
        "shipping_state": "Rajasthan",
        "shipping_postal_code": "302001",
        "shipping_country": "India"
    })
}

/// Check whether an anonymous visitor may insert an order, then clean up.
pub async fn orders() -> Result<(), CommandError> {
    let client = backend()?;
    let order_number = format!("CANARY-{}", Utc::now().format("%Y%m%d%H%M%S"));

    match client
        .insert::<Value, _>("orders", &canary_order(&order_number), Auth::Anon)
        .await
    {
        Ok(_) => println!("Guest checkout supported: anonymous order insert succeeded"),
        Err(e) => {
            println!("Guest checkout NOT supported: {e}");
            println!("Signed-in checkout still works; guests will see an error at the place-order step.");
            return Ok(());
        }
    }

    let cleanup = Query::table("orders").eq("order_number", &order_number);
    let auth = check_auth(&client);
    match client.delete(&cleanup, auth).await {
        Ok(()) => println!("Canary order {order_number} deleted"),
        Err(e) => println!("Could not delete canary order {order_number}: {e}. Remove it by hand."),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canary_order_is_a_guest_order() {
        let row = canary_order("CANARY-1");
        assert!(row["user_id"].is_null());
        assert_eq!(row["order_number"], "CANARY-1");
        assert_eq!(row["status"], "pending");
    }
}
