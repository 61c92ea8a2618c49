//! Cart route handlers.
//!
//! The cart lives in the session. Mutations redirect back with a flash
//! message; HTMX requests get the drawer fragment and a `cart-updated`
//! trigger instead.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    http::HeaderMap,
    response::{AppendHeaders, IntoResponse, Redirect, Response},
};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use zeaver_core::{
    AddOutcome, Cart, CartError, CartItem, CartLineId, NewCartItem, PricingPolicy, ProductId,
    QuantityChange,
};

use crate::backend::BackendError;
use crate::error::add_breadcrumb;
use crate::filters;
use crate::middleware::PageContext;
use crate::models::Flash;
use crate::models::session::{load_cart, save_cart, set_flash};
use crate::routes::{format_money, safe_redirect};
use crate::state::AppState;

/// Cart line display data.
#[derive(Debug, Clone)]
pub struct CartLineView {
    pub id: String,
    pub product_id: String,
    pub name: String,
    pub size: Option<String>,
    pub price: String,
    pub original_price: Option<String>,
    pub quantity: u32,
    pub line_total: String,
    pub image: Option<String>,
    pub at_max: bool,
}

impl CartLineView {
    #[must_use]
    pub fn new(line: &CartItem, pricing: &PricingPolicy) -> Self {
        Self {
            id: line.id.to_string(),
            product_id: line.product_id.to_string(),
            name: line.name.clone(),
            size: line.size.clone(),
            price: format_money(pricing, line.price),
            original_price: line
                .original_price
                .filter(|original| *original > line.price)
                .map(|original| format_money(pricing, original)),
            quantity: line.quantity,
            line_total: format_money(pricing, line.line_total()),
            image: line.image.clone(),
            at_max: line.at_max(),
        }
    }
}

/// Cart display data with the pricing breakdown.
#[derive(Debug, Clone)]
pub struct CartView {
    pub items: Vec<CartLineView>,
    pub item_count: u32,
    pub subtotal: String,
    pub shipping: String,
    pub tax: String,
    pub total: String,
    pub ships_free: bool,
    /// Spend still needed for free shipping.
    pub free_shipping_remaining: Option<String>,
    /// Progress toward free shipping, 0 to 100.
    pub progress_percent: u32,
}

impl CartView {
    #[must_use]
    pub fn new(cart: &Cart, pricing: &PricingPolicy) -> Self {
        let subtotal = cart.subtotal_amount();
        let totals = pricing.totals(subtotal, Decimal::ZERO);
        let remaining = if cart.is_empty() {
            None
        } else {
            pricing.remaining_for_free_shipping(subtotal)
        };
        let progress_percent = if pricing.free_shipping_threshold <= Decimal::ZERO {
            100
        } else {
            (subtotal * Decimal::ONE_HUNDRED / pricing.free_shipping_threshold)
                .min(Decimal::ONE_HUNDRED)
                .floor()
                .to_u32()
                .unwrap_or(0)
        };

        Self {
            items: cart
                .lines()
                .iter()
                .map(|line| CartLineView::new(line, pricing))
                .collect(),
            item_count: cart.item_count(),
            subtotal: format_money(pricing, totals.subtotal),
            shipping: format_money(pricing, totals.shipping),
            tax: format_money(pricing, totals.tax),
            total: format_money(pricing, totals.total),
            ships_free: remaining.is_none() && !cart.is_empty(),
            free_shipping_remaining: remaining.map(|r| format_money(pricing, r)),
            progress_percent,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Cart page template.
#[derive(Template, WebTemplate)]
#[template(path = "cart/show.html")]
pub struct CartShowTemplate {
    pub ctx: PageContext,
    pub cart: CartView,
}

/// Cart drawer fragment template (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/cart_drawer.html")]
pub struct CartDrawerTemplate {
    pub cart: CartView,
    pub notice: Option<Flash>,
}

/// Cart count badge fragment template (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/cart_count.html")]
pub struct CartCountTemplate {
    pub count: u32,
}

/// Add to cart form data.
#[derive(Debug, Deserialize)]
pub struct AddToCartForm {
    pub product_id: String,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub redirect_to: Option<String>,
}

const fn default_quantity() -> u32 {
    1
}

/// Update quantity form data.
#[derive(Debug, Deserialize)]
pub struct UpdateCartForm {
    pub line_id: String,
    pub quantity: i64,
    #[serde(default)]
    pub redirect_to: Option<String>,
}

/// Form naming a single cart line.
#[derive(Debug, Deserialize)]
pub struct LineForm {
    pub line_id: String,
    #[serde(default)]
    pub redirect_to: Option<String>,
}

/// Form carrying only a return path.
#[derive(Debug, Default, Deserialize)]
pub struct ReturnForm {
    #[serde(default)]
    pub redirect_to: Option<String>,
}

fn is_htmx(headers: &HeaderMap) -> bool {
    headers.contains_key("hx-request")
}

/// Respond to a cart mutation: the drawer fragment for HTMX, otherwise a
/// flash message and a redirect.
async fn respond(
    state: &AppState,
    session: &Session,
    headers: &HeaderMap,
    cart: &Cart,
    flash: Flash,
    redirect_to: Option<&str>,
) -> Response {
    if is_htmx(headers) {
        return (
            AppendHeaders([("HX-Trigger", "cart-updated")]),
            CartDrawerTemplate {
                cart: CartView::new(cart, &state.config().pricing),
                notice: Some(flash),
            },
        )
            .into_response();
    }
    set_flash(session, flash).await;
    Redirect::to(&safe_redirect(redirect_to, "/cart")).into_response()
}

/// Persist the cart, turning a store failure into the flash to show.
async fn store(session: &Session, cart: &Cart, flash: Flash) -> Flash {
    match save_cart(session, cart).await {
        Ok(()) => flash,
        Err(e) => {
            tracing::error!(error = %e, "Failed to save cart to session");
            Flash::error("We couldn't update your cart. Please try again.")
        }
    }
}

fn added_message(outcome: AddOutcome, name: &str) -> Flash {
    match outcome {
        AddOutcome::Added(_) => Flash::success(format!("{name} added to your cart.")),
        AddOutcome::Updated(_) => Flash::success(format!("Updated {name} in your cart.")),
        AddOutcome::Capped { max, .. } => {
            Flash::info(format!("Only {max} of {name} available. Your cart holds all of them."))
        }
    }
}

fn change_message(change: QuantityChange, name: &str) -> Flash {
    match change {
        QuantityChange::Updated => Flash::success("Cart updated."),
        QuantityChange::Removed => Flash::success(format!("{name} removed from your cart.")),
        QuantityChange::Capped { max } => Flash::info(format!("Only {max} of {name} available.")),
    }
}

fn cart_error_message(err: &CartError) -> Flash {
    match err {
        CartError::InvalidQuantity => Flash::error("Please choose a quantity of at least 1."),
        CartError::OutOfStock { .. } => Flash::error(err.to_string()),
        CartError::LineNotFound(_) => Flash::error(LINE_MISSING),
    }
}

const LINE_MISSING: &str = "That item is no longer in your cart.";

/// Display cart page.
#[instrument(skip(state, session, ctx))]
pub async fn show(State(state): State<AppState>, session: Session, ctx: PageContext) -> impl IntoResponse {
    let cart = load_cart(&session).await;
    CartShowTemplate {
        ctx,
        cart: CartView::new(&cart, &state.config().pricing),
    }
}

/// Cart drawer fragment (HTMX).
#[instrument(skip(state, session))]
pub async fn drawer(State(state): State<AppState>, session: Session) -> impl IntoResponse {
    let cart = load_cart(&session).await;
    CartDrawerTemplate {
        cart: CartView::new(&cart, &state.config().pricing),
        notice: None,
    }
}

/// Cart count badge (HTMX).
#[instrument(skip(session))]
pub async fn count(session: Session) -> impl IntoResponse {
    CartCountTemplate {
        count: load_cart(&session).await.item_count(),
    }
}

/// Add a product to the cart.
///
/// The product is re-fetched so the line snapshots its current name, price,
/// stock and image rather than trusting the form.
#[instrument(skip(state, session, headers, form), fields(product_id = %form.product_id))]
pub async fn add(
    State(state): State<AppState>,
    session: Session,
    headers: HeaderMap,
    Form(form): Form<AddToCartForm>,
) -> Response {
    let mut cart = load_cart(&session).await;
    let redirect_to = form.redirect_to.as_deref();

    let product = match form.product_id.parse::<ProductId>() {
        Ok(id) => state.backend().get_product(id).await,
        Err(_) => Err(BackendError::NotFound(form.product_id.clone())),
    };
    let product = match product {
        Ok(product) => product,
        Err(e) => {
            tracing::warn!(error = %e, "Add to cart for unavailable product");
            let flash = Flash::error("That piece is no longer available.");
            return respond(&state, &session, &headers, &cart, flash, redirect_to).await;
        }
    };

    let size = form
        .size
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());
    if !product.sizes.is_empty() && !size.as_ref().is_some_and(|s| product.sizes.contains(s)) {
        let flash = Flash::error("Please choose a size.");
        return respond(&state, &session, &headers, &cart, flash, redirect_to).await;
    }

    let item = NewCartItem {
        product_id: product.id,
        name: product.name.clone(),
        price: product.price,
        original_price: product.original_price,
        quantity: form.quantity,
        max_quantity: product.max_quantity(),
        size,
        image: product.primary_image().map(String::from),
    };

    let flash = match cart.add_item(item) {
        Ok(outcome) => {
            add_breadcrumb(
                "cart",
                "Added to cart",
                Some(&[("product_id", form.product_id.as_str())]),
            );
            store(&session, &cart, added_message(outcome, &product.name)).await
        }
        Err(e) => cart_error_message(&e),
    };
    respond(&state, &session, &headers, &cart, flash, redirect_to).await
}

/// Apply a quantity change to one line and respond.
async fn change_line(
    state: &AppState,
    session: &Session,
    headers: &HeaderMap,
    line_id: &str,
    redirect_to: Option<&str>,
    op: impl FnOnce(&mut Cart, CartLineId) -> Result<QuantityChange, CartError>,
) -> Response {
    let mut cart = load_cart(session).await;
    let Ok(id) = line_id.parse::<CartLineId>() else {
        let flash = Flash::error(LINE_MISSING);
        return respond(state, session, headers, &cart, flash, redirect_to).await;
    };

    let name = cart.line(id).map(|l| l.name.clone()).unwrap_or_default();
    let flash = match op(&mut cart, id) {
        Ok(change) => store(session, &cart, change_message(change, &name)).await,
        Err(e) => cart_error_message(&e),
    };
    respond(state, session, headers, &cart, flash, redirect_to).await
}

/// Set a line's quantity. Zero or less removes it.
#[instrument(skip(state, session, headers, form), fields(quantity = form.quantity))]
pub async fn update(
    State(state): State<AppState>,
    session: Session,
    headers: HeaderMap,
    Form(form): Form<UpdateCartForm>,
) -> Response {
    let quantity = form.quantity;
    change_line(
        &state,
        &session,
        &headers,
        &form.line_id,
        form.redirect_to.as_deref(),
        |cart, id| cart.update_quantity(id, quantity),
    )
    .await
}

/// Add one unit to a line.
#[instrument(skip(state, session, headers, form))]
pub async fn increment(
    State(state): State<AppState>,
    session: Session,
    headers: HeaderMap,
    Form(form): Form<LineForm>,
) -> Response {
    change_line(
        &state,
        &session,
        &headers,
        &form.line_id,
        form.redirect_to.as_deref(),
        Cart::increment,
    )
    .await
}

/// Take one unit off a line.
#[instrument(skip(state, session, headers, form))]
pub async fn decrement(
    State(state): State<AppState>,
    session: Session,
    headers: HeaderMap,
    Form(form): Form<LineForm>,
) -> Response {
    change_line(
        &state,
        &session,
        &headers,
        &form.line_id,
        form.redirect_to.as_deref(),
        Cart::decrement,
    )
    .await
}

/// Remove a line.
#[instrument(skip(state, session, headers, form))]
pub async fn remove(
    State(state): State<AppState>,
    session: Session,
    headers: HeaderMap,
    Form(form): Form<LineForm>,
) -> Response {
    change_line(
        &state,
        &session,
        &headers,
        &form.line_id,
        form.redirect_to.as_deref(),
        |cart, id| {
            if cart.remove_item(id) {
                Ok(QuantityChange::Removed)
            } else {
                Err(CartError::LineNotFound(id))
            }
        },
    )
    .await
}

/// Empty the cart.
#[instrument(skip(state, session, headers, form))]
pub async fn clear(
    State(state): State<AppState>,
    session: Session,
    headers: HeaderMap,
    Form(form): Form<ReturnForm>,
) -> Response {
    let mut cart = load_cart(&session).await;
    cart.clear();
    let flash = store(&session, &cart, Flash::success("Your cart is empty.")).await;
    respond(&state, &session, &headers, &cart, flash, form.redirect_to.as_deref()).await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn item(price: i64, quantity: u32, max: u32) -> NewCartItem {
        NewCartItem {
            product_id: ProductId::generate(),
            name: "Aria Ring".to_string(),
            price: Decimal::from(price),
            original_price: Some(Decimal::from(price + 10)),
            quantity,
            max_quantity: max,
            size: Some("7".to_string()),
            image: None,
        }
    }

    #[test]
    fn test_empty_cart_view() {
        let view = CartView::new(&Cart::new(), &PricingPolicy::default());
        assert!(view.is_empty());
        assert_eq!(view.shipping, "₹0.00");
        assert_eq!(view.free_shipping_remaining, None);
        assert!(!view.ships_free);
        assert_eq!(view.progress_percent, 0);
    }

    #[test]
    fn test_cart_view_below_threshold() {
        let mut cart = Cart::new();
        cart.add_item(item(25, 2, 5)).unwrap();
        let view = CartView::new(&cart, &PricingPolicy::default());

        assert_eq!(view.item_count, 2);
        assert_eq!(view.subtotal, "₹50.00");
        assert_eq!(view.shipping, "₹10.00");
        assert_eq!(view.tax, "₹4.00");
        assert_eq!(view.total, "₹64.00");
        assert_eq!(view.free_shipping_remaining.as_deref(), Some("₹50.01"));
        assert_eq!(view.progress_percent, 50);

        let line = view.items.first().unwrap();
        assert_eq!(line.line_total, "₹50.00");
        assert_eq!(line.original_price.as_deref(), Some("₹35.00"));
        assert!(!line.at_max);
    }

    #[test]
    fn test_cart_view_ships_free_above_threshold() {
        let mut cart = Cart::new();
        cart.add_item(item(150, 1, 1)).unwrap();
        let view = CartView::new(&cart, &PricingPolicy::default());

        assert!(view.ships_free);
        assert_eq!(view.shipping, "₹0.00");
        assert_eq!(view.progress_percent, 100);
        assert!(view.items.first().unwrap().at_max);
    }

    #[test]
    fn test_capped_add_is_informational() {
        let flash = added_message(
            AddOutcome::Capped {
                id: CartLineId::generate(),
                max: 3,
            },
            "Aria Ring",
        );
        assert_eq!(flash.kind, crate::models::FlashKind::Info);
        assert!(flash.message.contains("Only 3"));
    }

    #[test]
    fn test_htmx_detection() {
        let mut headers = HeaderMap::new();
        assert!(!is_htmx(&headers));
        headers.insert("hx-request", "true".parse().unwrap());
        assert!(is_htmx(&headers));
    }
}
