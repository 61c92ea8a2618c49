//! Order confirmation and order display data.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Query, State},
    response::IntoResponse,
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use zeaver_core::checkout::delivery_estimate;
use zeaver_core::{OrderId, PricingPolicy};

use crate::backend::{Auth, Order};
use crate::filters;
use crate::middleware::{OptionalAuth, PageContext};
use crate::models::session_keys;
use crate::routes::format_money;
use crate::state::AppState;

/// Order line display data.
#[derive(Debug, Clone)]
pub struct OrderLineView {
    pub name: String,
    pub size: Option<String>,
    pub quantity: i32,
    pub price: String,
    pub subtotal: String,
}

/// Order display data, shared by the confirmation page and order history.
#[derive(Debug, Clone)]
pub struct OrderView {
    pub id: String,
    pub number: String,
    pub placed_on: String,
    pub status: &'static str,
    pub item_count: i32,
    pub items: Vec<OrderLineView>,
    pub subtotal: String,
    pub discount: Option<String>,
    pub promo_code: Option<String>,
    pub shipping: String,
    pub tax: String,
    pub total: String,
    pub ship_to: Vec<String>,
    pub email: String,
    /// Estimated delivery window, e.g. "Mar 6 - Mar 8".
    pub delivery_window: String,
}

impl OrderView {
    #[must_use]
    pub fn new(order: &Order, pricing: &PricingPolicy) -> Self {
        let (earliest, latest) = delivery_estimate(order.created_at);
        let city_line = format!(
            "{}, {} {}",
            order.shipping_city, order.shipping_state, order.shipping_postal_code
        );

        Self {
            id: order.id.to_string(),
            number: order.order_number.clone(),
            placed_on: order.created_at.format("%B %-d, %Y").to_string(),
            status: order.status.label(),
            item_count: order.item_count(),
            items: order
                .order_items
                .iter()
                .map(|item| OrderLineView {
                    name: item.product_name.clone(),
                    size: item.size.clone(),
                    quantity: item.quantity,
                    price: format_money(pricing, item.product_price),
                    subtotal: format_money(pricing, item.subtotal),
                })
                .collect(),
            subtotal: format_money(pricing, order.subtotal),
            discount: (!order.discount.is_zero()).then(|| format_money(pricing, order.discount)),
            promo_code: order.promo_code.clone(),
            shipping: format_money(pricing, order.shipping_cost),
            tax: format_money(pricing, order.tax),
            total: format_money(pricing, order.total),
            ship_to: vec![
                order.shipping_name.clone(),
                order.shipping_address.clone(),
                city_line,
                order.shipping_country.clone(),
            ],
            email: order.shipping_email.clone(),
            delivery_window: format!("{} - {}", earliest.format("%b %-d"), latest.format("%b %-d")),
        }
    }
}

/// Confirmation query parameters.
#[derive(Debug, Deserialize)]
pub struct ConfirmationQuery {
    #[serde(default)]
    pub order_id: Option<String>,
}

/// Order confirmation page template. `order` is `None` for the not-found state.
#[derive(Template, WebTemplate)]
#[template(path = "orders/confirmation.html")]
pub struct ConfirmationTemplate {
    pub ctx: PageContext,
    pub order: Option<OrderView>,
}

/// Look up an order visible to the caller, falling back to the one this
/// session just placed.
async fn find_order(
    state: &AppState,
    session: &Session,
    user: Option<&crate::models::CurrentUser>,
    id: OrderId,
) -> Option<Order> {
    let auth = user.map_or(Auth::Anon, |u| Auth::User(&u.access_token));
    match state.backend().get_order(id, auth).await {
        Ok(order) => return Some(order),
        Err(e) if e.is_not_found() => {}
        Err(e) => tracing::warn!(error = %e, "Failed to load order"),
    }

    session
        .get::<Order>(session_keys::LAST_ORDER)
        .await
        .ok()
        .flatten()
        .filter(|order| order.id == id)
}

/// Display the order confirmation.
#[instrument(skip(state, session, user, ctx))]
pub async fn confirmation(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
    ctx: PageContext,
    Query(query): Query<ConfirmationQuery>,
) -> impl IntoResponse {
    let order = match query.order_id.as_deref().map(str::parse::<OrderId>) {
        Some(Ok(id)) => find_order(&state, &session, user.as_ref(), id).await,
        _ => None,
    };

    if order.is_none() {
        tracing::info!(order_id = ?query.order_id, "Order confirmation not found");
    }

    ConfirmationTemplate {
        ctx,
        order: order.map(|o| OrderView::new(&o, &state.config().pricing)),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;
    use zeaver_core::{OrderItemId, OrderStatus, PaymentStatus, ProductId};

    use super::*;
    use crate::backend::OrderItem;

    fn order() -> Order {
        let id = OrderId::generate();
        Order {
            id,
            user_id: None,
            order_number: "ZV-1042".to_string(),
            status: OrderStatus::Pending,
            subtotal: Decimal::from(50),
            shipping_cost: Decimal::from(10),
            tax: Decimal::from(4),
            discount: Decimal::ZERO,
            promo_code: None,
            total: Decimal::from(64),
            shipping_name: "Anika Rao".to_string(),
            shipping_email: "anika@example.com".to_string(),
            shipping_phone: None,
            shipping_address: "12 MG Road".to_string(),
            shipping_city: "Bengaluru".to_string(),
            shipping_state: "KA".to_string(),
            shipping_postal_code: "560001".to_string(),
            shipping_country: "India".to_string(),
            payment_status: PaymentStatus::Pending,
            stripe_payment_intent_id: None,
            created_at: Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).unwrap(),
            order_items: vec![OrderItem {
                id: OrderItemId::generate(),
                order_id: id,
                product_id: Some(ProductId::generate()),
                product_name: "Aria Ring".to_string(),
                product_price: Decimal::from(25),
                quantity: 2,
                size: Some("7".to_string()),
                subtotal: Decimal::from(50),
            }],
        }
    }

    #[test]
    fn test_order_view() {
        let view = OrderView::new(&order(), &PricingPolicy::default());
        assert_eq!(view.number, "ZV-1042");
        assert_eq!(view.placed_on, "March 1, 2025");
        assert_eq!(view.status, "Pending");
        assert_eq!(view.item_count, 2);
        assert_eq!(view.total, "₹64.00");
        assert_eq!(view.discount, None);
        assert_eq!(view.delivery_window, "Mar 6 - Mar 8");
        assert_eq!(
            view.ship_to.get(2).map(String::as_str),
            Some("Bengaluru, KA 560001")
        );
    }

    #[test]
    fn test_discount_shown_when_applied() {
        let mut order = order();
        order.discount = Decimal::from(5);
        order.promo_code = Some("WELCOME10".to_string());
        let view = OrderView::new(&order, &PricingPolicy::default());
        assert_eq!(view.discount.as_deref(), Some("₹5.00"));
    }
}
