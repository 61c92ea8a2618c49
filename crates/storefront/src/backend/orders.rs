//! Orders and promo codes.

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use tracing::{error, info, instrument, warn};

use zeaver_core::checkout::{ShippingAddress, fallback_order_number};
use zeaver_core::{
    AppliedPromo, CartItem, OrderId, OrderStatus, OrderTotals, PaymentStatus, ProductId,
    PromoCode, PromoError, UserId,
};

use crate::backend::client::{Auth, BackendClient};
use crate::backend::query::{Direction, Query};
use crate::backend::types::Order;
use crate::backend::BackendError;

const ORDER_WITH_ITEMS: &str = "*,order_items(*)";

/// Everything needed to place an order.
#[derive(Debug, Clone)]
pub struct NewOrder {
    /// `None` for guest checkout.
    pub user_id: Option<UserId>,
    pub totals: OrderTotals,
    pub promo: Option<AppliedPromo>,
    pub shipping: ShippingAddress,
    /// Set only when a payment processor has confirmed a charge.
    pub payment_intent_id: Option<String>,
    pub items: Vec<NewOrderItem>,
}

/// One purchased line, snapshotting name and price.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrderItem {
    pub product_id: ProductId,
    pub product_name: String,
    pub product_price: Decimal,
    pub quantity: u32,
    pub size: Option<String>,
}

impl From<&CartItem> for NewOrderItem {
    fn from(line: &CartItem) -> Self {
        Self {
            product_id: line.product_id,
            product_name: line.name.clone(),
            product_price: line.price,
            quantity: line.quantity,
            size: line.size.clone(),
        }
    }
}

#[derive(Serialize)]
struct OrderRow<'a> {
    user_id: Option<UserId>,
    order_number: &'a str,
    status: OrderStatus,
    subtotal: Decimal,
    shipping_cost: Decimal,
    tax: Decimal,
    total: Decimal,
    // Only sent when a promo applies, so stores without these columns still accept orders
    #[serde(skip_serializing_if = "Option::is_none")]
    discount: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    promo_code: Option<&'a str>,
    shipping_name: String,
    shipping_email: &'a str,
    shipping_phone: Option<&'a str>,
    shipping_address: &'a str,
    shipping_city: &'a str,
    shipping_state: &'a str,
    shipping_postal_code: &'a str,
    shipping_country: &'a str,
    payment_status: PaymentStatus,
    stripe_payment_intent_id: Option<&'a str>,
}

impl<'a> OrderRow<'a> {
    fn new(order: &'a NewOrder, order_number: &'a str) -> Self {
        let ship = &order.shipping;
        Self {
            user_id: order.user_id,
            order_number,
            status: OrderStatus::Pending,
            subtotal: order.totals.subtotal,
            shipping_cost: order.totals.shipping,
            tax: order.totals.tax,
            total: order.totals.total,
            discount: order.promo.as_ref().map(|_| order.totals.discount),
            promo_code: order.promo.as_ref().map(|p| p.code.as_str()),
            shipping_name: ship.full_name(),
            shipping_email: ship.email.as_str(),
            shipping_phone: ship.phone.as_deref(),
            shipping_address: &ship.address,
            shipping_city: &ship.city,
            shipping_state: &ship.state,
            shipping_postal_code: &ship.postal_code,
            shipping_country: &ship.country,
            payment_status: if order.payment_intent_id.is_some() {
                PaymentStatus::Paid
            } else {
                PaymentStatus::Pending
            },
            stripe_payment_intent_id: order.payment_intent_id.as_deref(),
        }
    }
}

#[derive(Serialize)]
struct OrderItemRow<'a> {
    order_id: OrderId,
    product_id: ProductId,
    product_name: &'a str,
    product_price: Decimal,
    quantity: u32,
    size: Option<&'a str>,
    subtotal: Decimal,
}

impl<'a> OrderItemRow<'a> {
    fn new(order_id: OrderId, item: &'a NewOrderItem) -> Self {
        Self {
            order_id,
            product_id: item.product_id,
            product_name: &item.product_name,
            product_price: item.product_price,
            quantity: item.quantity,
            size: item.size.as_deref(),
            subtotal: item.product_price * Decimal::from(item.quantity),
        }
    }
}

/// Why a promo code could not be applied.
#[derive(Debug, Error)]
pub enum PromoLookupError {
    /// The code exists but can't be used (or doesn't exist).
    #[error(transparent)]
    Rejected(#[from] PromoError),
    /// The backend couldn't be reached.
    #[error(transparent)]
    Backend(#[from] BackendError),
}

fn user_or_anon(access_token: Option<&str>) -> Auth<'_> {
    access_token.map_or(Auth::Anon, Auth::User)
}

impl BackendClient {
    // =========================================================================
    // Order Methods
    // =========================================================================

    /// Place an order and its line items.
    ///
    /// The order number comes from the `generate_order_number` function,
    /// falling back to a timestamp-based number if that call fails.
    ///
    /// # Errors
    ///
    /// Returns an error if either insert is rejected. When the items are
    /// rejected the order row is deleted again so no empty order remains.
    #[instrument(skip(self, access_token, order), fields(items = order.items.len()))]
    pub async fn create_order(
        &self,
        access_token: Option<&str>,
        order: &NewOrder,
    ) -> Result<Order, BackendError> {
        let auth = user_or_anon(access_token);

        let order_number = match self
            .rpc::<String, _>("generate_order_number", &json!({}), auth)
            .await
        {
            Ok(number) => number,
            Err(e) => {
                warn!(error = %e, "generate_order_number failed, using fallback");
                fallback_order_number(Utc::now())
            }
        };

        let created: Order = self
            .insert("orders", &OrderRow::new(order, &order_number), auth)
            .await?;

        let rows: Vec<OrderItemRow<'_>> = order
            .items
            .iter()
            .map(|item| OrderItemRow::new(created.id, item))
            .collect();
        if let Err(e) = self.insert_many("order_items", &rows, auth).await {
            error!(error = %e, order_number = %created.order_number, "Order items rejected, removing order");
            let orphan = Query::table("orders").eq("id", created.id);
            if let Err(cleanup) = self.delete(&orphan, auth).await {
                warn!(error = %cleanup, order_id = %created.id, "Failed to remove order without items");
            }
            return Err(e);
        }

        info!(order_number = %created.order_number, total = %created.total, "Order placed");
        Ok(created)
    }

    /// A shopper's orders with their items, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self, access_token))]
    pub async fn get_orders(&self, access_token: &str, user_id: UserId) -> Result<Vec<Order>, BackendError> {
        let query = Query::table("orders")
            .select(ORDER_WITH_ITEMS)
            .eq("user_id", user_id)
            .order("created_at", Direction::Desc);
        self.fetch_all(&query, Auth::User(access_token)).await
    }

    /// An order with its items.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::NotFound` if no visible order has this id.
    #[instrument(skip(self, auth))]
    pub async fn get_order(&self, id: OrderId, auth: Auth<'_>) -> Result<Order, BackendError> {
        let query = Query::table("orders").select(ORDER_WITH_ITEMS).eq("id", id);
        self.fetch_one(&query, auth).await
    }

    /// An order with its items, by its public number.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::NotFound` if no visible order has this number.
    #[instrument(skip(self, auth))]
    pub async fn get_order_by_number(&self, order_number: &str, auth: Auth<'_>) -> Result<Order, BackendError> {
        let query = Query::table("orders")
            .select(ORDER_WITH_ITEMS)
            .eq("order_number", order_number);
        self.fetch_one(&query, auth).await
    }

    /// Set an order's fulfillment status. Requires the service key.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::NotFound` if no order has this number.
    #[instrument(skip(self))]
    pub async fn update_order_status(
        &self,
        order_number: &str,
        status: OrderStatus,
    ) -> Result<Order, BackendError> {
        self.patch_order(order_number, &json!({ "status": status }))
            .await
    }

    /// Set an order's payment status. Requires the service key.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::NotFound` if no order has this number.
    #[instrument(skip(self))]
    pub async fn update_payment_status(
        &self,
        order_number: &str,
        status: PaymentStatus,
        payment_intent_id: Option<&str>,
    ) -> Result<Order, BackendError> {
        let mut patch = json!({ "payment_status": status });
        if let Some(intent) = payment_intent_id {
            patch["stripe_payment_intent_id"] = json!(intent);
        }
        self.patch_order(order_number, &patch).await
    }

    async fn patch_order(&self, order_number: &str, patch: &serde_json::Value) -> Result<Order, BackendError> {
        let query = Query::table("orders").eq("order_number", order_number);
        self.update::<Order, _>(&query, patch, Auth::Service)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| BackendError::NotFound(format!("Order not found: {order_number}")))
    }

    // =========================================================================
    // Promo Code Methods
    // =========================================================================

    /// Look up an active code and check it can still be used.
    ///
    /// # Errors
    ///
    /// Returns `PromoLookupError::Rejected` for unknown, expired or used-up codes.
    #[instrument(skip(self))]
    pub async fn validate_promo_code(&self, code: &str) -> Result<PromoCode, PromoLookupError> {
        let code = PromoCode::normalize(code);
        if code.is_empty() {
            return Err(PromoError::Invalid.into());
        }
        let query = Query::table("promo_codes")
            .select("*")
            .eq("code", &code)
            .eq("is_active", true);
        let promo: PromoCode = self
            .fetch_maybe(&query, Auth::Anon)
            .await?
            .ok_or(PromoError::Invalid)?;
        promo.validate(Utc::now())?;
        Ok(promo)
    }

    /// Validate a code and compute its discount on `subtotal`.
    ///
    /// # Errors
    ///
    /// Returns `PromoLookupError::Rejected` if the code can't be used or the
    /// subtotal is below its minimum.
    pub async fn apply_promo_code(&self, code: &str, subtotal: Decimal) -> Result<AppliedPromo, PromoLookupError> {
        let promo = self.validate_promo_code(code).await?;
        Ok(promo.apply(subtotal, Utc::now())?)
    }

    /// Count one use of a code. Failures are logged, never returned.
    #[instrument(skip(self))]
    pub async fn increment_promo_usage(&self, code: &str) {
        let args = json!({
            "table_name": "promo_codes",
            "row_id": code,
            "column_name": "current_uses",
        });
        if let Err(e) = self
            .rpc::<Option<serde_json::Value>, _>("increment", &args, Auth::Anon)
            .await
        {
            tracing::error!(error = %e, code = %code, "Failed to increment promo code usage");
        }
    }
}
