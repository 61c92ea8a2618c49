//! Checkout route handlers.
//!
//! Three steps (shipping, payment, review) backed by a [`CheckoutDraft`] in
//! the session. Each step redirects back to the first incomplete one, and an
//! empty cart always goes back to `/cart`.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use zeaver_core::checkout::{CheckoutError, CheckoutStep, PaymentForm, ShippingForm};
use zeaver_core::{AppliedPromo, Cart, PricingPolicy};

use crate::backend::{NewOrder, NewOrderItem, PromoLookupError};
use crate::error::add_breadcrumb;
use crate::filters;
use crate::middleware::{OptionalAuth, PageContext};
use crate::models::session::{load_cart, load_draft, save_cart, save_draft, set_flash};
use crate::models::{CheckoutDraft, CurrentUser, Flash, session_keys};
use crate::routes::cart::CartLineView;
use crate::routes::format_money;
use crate::state::AppState;

/// Progress indicator entry.
#[derive(Debug, Clone)]
pub struct StepView {
    pub number: usize,
    pub label: &'static str,
    pub path: &'static str,
    pub done: bool,
    pub current: bool,
}

fn steps(current: CheckoutStep) -> Vec<StepView> {
    CheckoutStep::all()
        .into_iter()
        .map(|step| StepView {
            number: step.index() + 1,
            label: step.label(),
            path: step.path(),
            done: step.is_complete_before(current),
            current: step == current,
        })
        .collect()
}

/// Order summary shown beside every step.
#[derive(Debug, Clone)]
pub struct SummaryView {
    pub items: Vec<CartLineView>,
    pub subtotal: String,
    pub discount: Option<String>,
    pub promo_code: Option<String>,
    pub promo_description: Option<String>,
    pub shipping: String,
    pub tax: String,
    pub total: String,
}

impl SummaryView {
    #[must_use]
    pub fn new(cart: &Cart, promo: Option<&AppliedPromo>, pricing: &PricingPolicy) -> Self {
        let discount = promo.map_or(Decimal::ZERO, |p| p.discount);
        let totals = pricing.totals(cart.subtotal_amount(), discount);
        Self {
            items: cart
                .lines()
                .iter()
                .map(|line| CartLineView::new(line, pricing))
                .collect(),
            subtotal: format_money(pricing, totals.subtotal),
            discount: (!totals.discount.is_zero()).then(|| format_money(pricing, totals.discount)),
            promo_code: promo.map(|p| p.code.clone()),
            promo_description: promo.map(|p| p.describe(pricing.currency.symbol())),
            shipping: format_money(pricing, totals.shipping),
            tax: format_money(pricing, totals.tax),
            total: format_money(pricing, totals.total),
        }
    }
}

/// Shipping step template.
#[derive(Template, WebTemplate)]
#[template(path = "checkout/shipping.html")]
pub struct ShippingTemplate {
    pub ctx: PageContext,
    pub steps: Vec<StepView>,
    pub form: ShippingForm,
    pub errors: CheckoutError,
    pub summary: SummaryView,
}

/// Payment step template. Card details are never echoed back.
#[derive(Template, WebTemplate)]
#[template(path = "checkout/payment.html")]
pub struct PaymentTemplate {
    pub ctx: PageContext,
    pub steps: Vec<StepView>,
    pub card_name: String,
    pub saved_card: Option<String>,
    pub errors: CheckoutError,
    pub summary: SummaryView,
}

/// Review step template.
#[derive(Template, WebTemplate)]
#[template(path = "checkout/review.html")]
pub struct ReviewTemplate {
    pub ctx: PageContext,
    pub steps: Vec<StepView>,
    pub ship_to: Vec<String>,
    pub email: String,
    pub payment: String,
    pub summary: SummaryView,
}

/// Promo code form data.
#[derive(Debug, Deserialize)]
pub struct PromoForm {
    #[serde(default)]
    pub code: String,
}

/// First step the draft hasn't completed.
fn first_incomplete(draft: &CheckoutDraft) -> CheckoutStep {
    match (&draft.shipping, &draft.payment) {
        (None, _) => CheckoutStep::Shipping,
        (Some(_), None) => CheckoutStep::Payment,
        (Some(_), Some(_)) => CheckoutStep::Review,
    }
}

/// The cart, or a redirect to `/cart` when it's empty.
async fn require_cart(session: &Session) -> Result<Cart, Response> {
    let cart = load_cart(session).await;
    if cart.is_empty() {
        Err(Redirect::to("/cart").into_response())
    } else {
        Ok(cart)
    }
}

/// Redirect to the first incomplete step if it comes before `step`.
fn guard_step(draft: &CheckoutDraft, step: CheckoutStep) -> Result<(), Response> {
    let pending = first_incomplete(draft);
    if pending.is_complete_before(step) {
        Err(Redirect::to(pending.path()).into_response())
    } else {
        Ok(())
    }
}

async fn store_draft(session: &Session, draft: &CheckoutDraft) -> Result<(), Response> {
    save_draft(session, draft).await.map_err(|e| {
        tracing::error!(error = %e, "Failed to save checkout draft");
        StatusCode::INTERNAL_SERVER_ERROR.into_response()
    })
}

/// Pre-fill the shipping form from the signed-in shopper.
fn prefill_shipping(user: Option<&CurrentUser>, default_country: &str) -> ShippingForm {
    let mut form = ShippingForm {
        country: default_country.to_string(),
        ..ShippingForm::default()
    };
    if let Some(user) = user {
        let (first, last) = user.name.split_once(' ').unwrap_or((&user.name, ""));
        let named = user.email.split('@').next() != Some(user.name.as_str());
        if named {
            form.first_name = first.to_string();
            form.last_name = last.trim().to_string();
        }
        form.email.clone_from(&user.email);
    }
    form
}

/// Start or resume checkout.
#[instrument(skip(session))]
pub async fn start(session: Session) -> Response {
    if let Err(redirect) = require_cart(&session).await {
        return redirect;
    }
    let draft = load_draft(&session).await;
    Redirect::to(first_incomplete(&draft).path()).into_response()
}

/// Display the shipping step.
#[instrument(skip(state, session, user, ctx))]
pub async fn shipping_page(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
    ctx: PageContext,
) -> Response {
    let cart = match require_cart(&session).await {
        Ok(cart) => cart,
        Err(redirect) => return redirect,
    };
    let draft = load_draft(&session).await;
    let config = state.config();

    let form = draft.shipping.as_ref().map_or_else(
        || prefill_shipping(user.as_ref(), &config.default_country),
        |address| address.to_form(),
    );

    ShippingTemplate {
        ctx,
        steps: steps(CheckoutStep::Shipping),
        form,
        errors: CheckoutError(Vec::new()),
        summary: SummaryView::new(&cart, draft.promo.as_ref(), &config.pricing),
    }
    .into_response()
}

/// Save the shipping step.
#[instrument(skip(state, session, ctx, form))]
pub async fn shipping(
    State(state): State<AppState>,
    session: Session,
    ctx: PageContext,
    Form(form): Form<ShippingForm>,
) -> Response {
    let cart = match require_cart(&session).await {
        Ok(cart) => cart,
        Err(redirect) => return redirect,
    };
    let mut draft = load_draft(&session).await;
    let config = state.config();

    match form.validate(&config.default_country) {
        Ok(address) => {
            draft.shipping = Some(address);
            if let Err(response) = store_draft(&session, &draft).await {
                return response;
            }
            Redirect::to(CheckoutStep::Payment.path()).into_response()
        }
        Err(errors) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            ShippingTemplate {
                ctx,
                steps: steps(CheckoutStep::Shipping),
                form,
                errors,
                summary: SummaryView::new(&cart, draft.promo.as_ref(), &config.pricing),
            },
        )
            .into_response(),
    }
}

/// Display the payment step.
#[instrument(skip(state, session, ctx))]
pub async fn payment_page(State(state): State<AppState>, session: Session, ctx: PageContext) -> Response {
    let cart = match require_cart(&session).await {
        Ok(cart) => cart,
        Err(redirect) => return redirect,
    };
    let draft = load_draft(&session).await;
    if let Err(redirect) = guard_step(&draft, CheckoutStep::Payment) {
        return redirect;
    }

    PaymentTemplate {
        ctx,
        steps: steps(CheckoutStep::Payment),
        card_name: draft
            .payment
            .as_ref()
            .map(|p| p.card_name.clone())
            .unwrap_or_default(),
        saved_card: draft.payment.as_ref().map(zeaver_core::checkout::PaymentSummary::display),
        errors: CheckoutError(Vec::new()),
        summary: SummaryView::new(&cart, draft.promo.as_ref(), &state.config().pricing),
    }
    .into_response()
}

/// Save the payment step. Only the card's brand and last four digits are kept.
#[instrument(skip(state, session, ctx, form))]
pub async fn payment(
    State(state): State<AppState>,
    session: Session,
    ctx: PageContext,
    Form(form): Form<PaymentForm>,
) -> Response {
    let cart = match require_cart(&session).await {
        Ok(cart) => cart,
        Err(redirect) => return redirect,
    };
    let mut draft = load_draft(&session).await;
    if let Err(redirect) = guard_step(&draft, CheckoutStep::Payment) {
        return redirect;
    }

    match form.validate(Utc::now().date_naive()) {
        Ok(summary) => {
            draft.payment = Some(summary);
            if let Err(response) = store_draft(&session, &draft).await {
                return response;
            }
            Redirect::to(CheckoutStep::Review.path()).into_response()
        }
        Err(errors) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            PaymentTemplate {
                ctx,
                steps: steps(CheckoutStep::Payment),
                card_name: form.card_name.trim().to_string(),
                saved_card: None,
                errors,
                summary: SummaryView::new(&cart, draft.promo.as_ref(), &state.config().pricing),
            },
        )
            .into_response(),
    }
}

/// Display the review step.
#[instrument(skip(state, session, ctx))]
pub async fn review_page(State(state): State<AppState>, session: Session, ctx: PageContext) -> Response {
    let cart = match require_cart(&session).await {
        Ok(cart) => cart,
        Err(redirect) => return redirect,
    };
    let draft = load_draft(&session).await;
    let (Some(address), Some(payment)) = (&draft.shipping, &draft.payment) else {
        return Redirect::to(first_incomplete(&draft).path()).into_response();
    };

    ReviewTemplate {
        ctx,
        steps: steps(CheckoutStep::Review),
        ship_to: vec![
            address.full_name(),
            address.address.clone(),
            format!("{}, {} {}", address.city, address.state, address.postal_code),
            address.country.clone(),
        ],
        email: address.email.to_string(),
        payment: payment.display(),
        summary: SummaryView::new(&cart, draft.promo.as_ref(), &state.config().pricing),
    }
    .into_response()
}

/// Apply a promo code to the draft.
#[instrument(skip(state, session, form))]
pub async fn apply_promo(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<PromoForm>,
) -> Response {
    let cart = match require_cart(&session).await {
        Ok(cart) => cart,
        Err(redirect) => return redirect,
    };
    let mut draft = load_draft(&session).await;
    let symbol = state.config().pricing.currency.symbol();

    let flash = match state
        .backend()
        .apply_promo_code(&form.code, cart.subtotal_amount())
        .await
    {
        Ok(promo) => {
            let flash = Flash::success(format!(
                "Promo code {} applied: {}.",
                promo.code,
                promo.describe(symbol)
            ));
            draft.promo = Some(promo);
            if let Err(response) = store_draft(&session, &draft).await {
                return response;
            }
            flash
        }
        Err(PromoLookupError::Rejected(e)) => Flash::error(e.to_string()),
        Err(PromoLookupError::Backend(e)) => {
            tracing::error!(error = %e, "Promo code lookup failed");
            Flash::error("We couldn't check that code. Please try again.")
        }
    };

    set_flash(&session, flash).await;
    Redirect::to(CheckoutStep::Review.path()).into_response()
}

/// Remove the applied promo code.
#[instrument(skip(session))]
pub async fn remove_promo(session: Session) -> Response {
    let mut draft = load_draft(&session).await;
    if draft.promo.take().is_some() {
        if let Err(response) = store_draft(&session, &draft).await {
            return response;
        }
        set_flash(&session, Flash::info("Promo code removed.")).await;
    }
    Redirect::to(CheckoutStep::Review.path()).into_response()
}

/// Place the order.
///
/// The promo code is re-validated against the current subtotal. If it no
/// longer applies it is dropped and the shopper goes back to review the new
/// total.
#[instrument(skip(state, session, user))]
pub async fn place(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
) -> Response {
    let mut cart = match require_cart(&session).await {
        Ok(cart) => cart,
        Err(redirect) => return redirect,
    };
    let mut draft = load_draft(&session).await;
    let Some(address) = draft.shipping.clone() else {
        return Redirect::to(CheckoutStep::Shipping.path()).into_response();
    };
    if draft.payment.is_none() {
        return Redirect::to(CheckoutStep::Payment.path()).into_response();
    }

    let backend = state.backend();
    let subtotal = cart.subtotal_amount();

    let promo = match draft.promo.take() {
        None => None,
        Some(applied) => match backend.apply_promo_code(&applied.code, subtotal).await {
            Ok(fresh) => Some(fresh),
            Err(PromoLookupError::Rejected(e)) => {
                tracing::info!(code = %applied.code, reason = %e, "Dropping promo code at checkout");
                if let Err(response) = store_draft(&session, &draft).await {
                    return response;
                }
                set_flash(
                    &session,
                    Flash::info(format!("Promo code {} was removed: {e}.", applied.code)),
                )
                .await;
                return Redirect::to(CheckoutStep::Review.path()).into_response();
            }
            Err(PromoLookupError::Backend(e)) => {
                tracing::error!(error = %e, "Promo code re-check failed");
                set_flash(
                    &session,
                    Flash::error("We couldn't place your order. Please try again."),
                )
                .await;
                return Redirect::to(CheckoutStep::Review.path()).into_response();
            }
        },
    };

    let pricing = &state.config().pricing;
    let order = NewOrder {
        user_id: user.as_ref().map(|u| u.id),
        totals: pricing.totals(subtotal, promo.as_ref().map_or(Decimal::ZERO, |p| p.discount)),
        promo,
        shipping: address,
        payment_intent_id: None,
        items: cart.lines().iter().map(NewOrderItem::from).collect(),
    };

    let access_token = user.as_ref().map(|u| u.access_token.as_str());
    let created = match backend.create_order(access_token, &order).await {
        Ok(created) => created,
        Err(e) => {
            tracing::error!(error = %e, "Failed to place order");
            set_flash(
                &session,
                Flash::error("We couldn't place your order. Please try again."),
            )
            .await;
            return Redirect::to(CheckoutStep::Review.path()).into_response();
        }
    };

    if let Some(promo) = &order.promo {
        backend.increment_promo_usage(&promo.code).await;
    }

    add_breadcrumb(
        "checkout",
        "Order placed",
        Some(&[("order_number", created.order_number.as_str())]),
    );

    cart.clear();
    let empty_draft = CheckoutDraft::default();
    let cleared = tokio::try_join!(
        save_cart(&session, &cart),
        save_draft(&session, &empty_draft),
        session.insert(session_keys::LAST_ORDER, &created),
    );
    if let Err(e) = cleared {
        tracing::error!(error = %e, order_number = %created.order_number, "Failed to clear checkout session");
    }

    Redirect::to(&format!("/order-confirmation?order_id={}", created.id)).into_response()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use zeaver_core::checkout::{CardBrand, PaymentSummary, ShippingAddress};
    use zeaver_core::{DiscountType, Email, NewCartItem, ProductId, UserId};

    use super::*;

    fn address() -> ShippingAddress {
        ShippingAddress {
            first_name: "Anika".into(),
            last_name: "Rao".into(),
            email: Email::parse("anika@example.com").unwrap(),
            phone: None,
            address: "12 MG Road".into(),
            city: "Bengaluru".into(),
            state: "KA".into(),
            postal_code: "560001".into(),
            country: "India".into(),
        }
    }

    fn payment() -> PaymentSummary {
        PaymentSummary {
            card_name: "Anika Rao".into(),
            brand: CardBrand::Visa,
            last4: "4242".into(),
        }
    }

    #[test]
    fn test_first_incomplete_step() {
        let mut draft = CheckoutDraft::default();
        assert_eq!(first_incomplete(&draft), CheckoutStep::Shipping);
        draft.shipping = Some(address());
        assert_eq!(first_incomplete(&draft), CheckoutStep::Payment);
        draft.payment = Some(payment());
        assert_eq!(first_incomplete(&draft), CheckoutStep::Review);
    }

    #[test]
    fn test_guard_blocks_skipping_ahead() {
        let draft = CheckoutDraft::default();
        assert!(guard_step(&draft, CheckoutStep::Shipping).is_ok());
        let redirect = guard_step(&draft, CheckoutStep::Payment).unwrap_err();
        assert_eq!(redirect.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            redirect.headers().get("location").unwrap(),
            "/checkout/shipping"
        );
    }

    #[test]
    fn test_steps_mark_progress() {
        let views = steps(CheckoutStep::Payment);
        let flags: Vec<(bool, bool)> = views.iter().map(|s| (s.done, s.current)).collect();
        assert_eq!(flags, vec![(true, false), (false, true), (false, false)]);
        assert_eq!(views.last().unwrap().number, 3);
    }

    #[test]
    fn test_summary_applies_promo_discount() {
        let mut cart = Cart::new();
        cart.add_item(NewCartItem {
            product_id: ProductId::generate(),
            name: "Aria Ring".into(),
            price: Decimal::from(50),
            original_price: None,
            quantity: 1,
            max_quantity: 3,
            size: None,
            image: None,
        })
        .unwrap();
        let promo = AppliedPromo {
            code: "WELCOME10".into(),
            discount: Decimal::from(5),
            discount_type: DiscountType::Percentage,
            discount_value: Decimal::from(10),
        };

        let summary = SummaryView::new(&cart, Some(&promo), &PricingPolicy::default());
        assert_eq!(summary.subtotal, "₹50.00");
        assert_eq!(summary.discount.as_deref(), Some("₹5.00"));
        assert_eq!(summary.promo_description.as_deref(), Some("10% off"));
        assert_eq!(summary.total, "₹59.00");
    }

    #[test]
    fn test_prefill_from_user() {
        let user = CurrentUser {
            id: UserId::generate(),
            email: "anika@example.com".into(),
            name: "Anika Rao Menon".into(),
            access_token: String::new(),
            refresh_token: String::new(),
            expires_at: 0,
        };
        let form = prefill_shipping(Some(&user), "India");
        assert_eq!(form.first_name, "Anika");
        assert_eq!(form.last_name, "Rao Menon");
        assert_eq!(form.email, "anika@example.com");
        assert_eq!(form.country, "India");

        let guest = prefill_shipping(None, "India");
        assert!(guest.email.is_empty());
    }
}
