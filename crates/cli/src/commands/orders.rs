//! Order status updates.
//!
//! These bypass row-level security and need `BACKEND_SERVICE_ROLE_KEY`.

#![allow(clippy::print_stdout)]

use zeaver_core::{OrderStatus, PaymentStatus};

use super::{CommandError, service_backend};

/// Set an order's fulfillment status.
pub async fn set_status(order_number: &str, status: OrderStatus) -> Result<(), CommandError> {
    let client = service_backend()?;
    let order = client.update_order_status(order_number, status).await?;
    tracing::info!(order_number, %status, "Order status updated");
    println!("{} is now {}", order.order_number, order.status.label());
    Ok(())
}

/// Set an order's payment status, optionally recording the processor reference.
pub async fn set_payment(
    order_number: &str,
    status: PaymentStatus,
    intent: Option<&str>,
) -> Result<(), CommandError> {
    let client = service_backend()?;
    let order = client
        .update_payment_status(order_number, status, intent)
        .await?;
    tracing::info!(order_number, %status, "Payment status updated");
    println!("{} payment is now {}", order.order_number, order.payment_status);
    Ok(())
}
