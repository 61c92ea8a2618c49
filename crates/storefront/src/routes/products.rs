//! Product route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, State},
    response::{IntoResponse, Redirect, Response},
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use zeaver_core::{PricingPolicy, ProductId};

use crate::backend::{NewReview, Product, Review};
use crate::error::{AppError, add_breadcrumb};
use crate::filters;
use crate::middleware::{OptionalAuth, PageContext, RequireAuth};
use crate::models::Flash;
use crate::models::session::set_flash;
use crate::routes::format_money;
use crate::state::AppState;

/// Related products shown under the detail view.
const RELATED_LIMIT: u32 = 3;

/// Product card display data, shared by every product grid.
#[derive(Debug, Clone)]
pub struct ProductCardView {
    pub id: String,
    pub name: String,
    pub price: String,
    pub original_price: Option<String>,
    pub discount_percent: Option<u32>,
    pub image: Option<String>,
    pub tag: Option<String>,
    pub is_new: bool,
    pub in_stock: bool,
    pub rating: Option<String>,
    pub review_count: i32,
}

impl ProductCardView {
    #[must_use]
    pub fn new(product: &Product, pricing: &PricingPolicy, now: DateTime<Utc>) -> Self {
        Self {
            id: product.id.to_string(),
            name: product.name.clone(),
            price: format_money(pricing, product.price),
            original_price: product
                .discount_percent()
                .and(product.original_price)
                .map(|p| format_money(pricing, p)),
            discount_percent: product.discount_percent(),
            image: product.primary_image().map(String::from),
            tag: product.tag.clone(),
            is_new: product.is_new(now),
            in_stock: product.in_stock(),
            rating: product.rating.map(|r| format!("{r:.1}")),
            review_count: product.review_count,
        }
    }

    /// Cards for a list of products.
    #[must_use]
    pub fn list(products: &[Product], pricing: &PricingPolicy) -> Vec<Self> {
        let now = Utc::now();
        products.iter().map(|p| Self::new(p, pricing, now)).collect()
    }
}

/// Product detail display data.
#[derive(Debug, Clone)]
pub struct ProductDetailView {
    pub card: ProductCardView,
    pub description: String,
    pub category: Option<String>,
    pub gallery: Vec<String>,
    pub sizes: Vec<String>,
    pub sku: Option<String>,
    pub max_quantity: u32,
    pub stock_label: String,
}

impl ProductDetailView {
    fn new(product: &Product, pricing: &PricingPolicy) -> Self {
        let stock_label = match product.stock_quantity {
            n if n <= 0 => "Out of stock".to_string(),
            n if n <= 5 => format!("Only {n} left"),
            _ => "In stock".to_string(),
        };
        Self {
            card: ProductCardView::new(product, pricing, Utc::now()),
            description: product.description.clone().unwrap_or_default(),
            category: product.category.clone(),
            gallery: product.gallery().into_iter().map(String::from).collect(),
            sizes: product.sizes.clone(),
            sku: product.sku.clone(),
            max_quantity: product.max_quantity(),
            stock_label,
        }
    }
}

/// Review display data.
#[derive(Debug, Clone)]
pub struct ReviewView {
    pub rating: i16,
    pub title: String,
    pub comment: String,
    pub date: String,
}

impl From<&Review> for ReviewView {
    fn from(review: &Review) -> Self {
        Self {
            rating: review.rating,
            title: review.title.clone().unwrap_or_default(),
            comment: review.comment.clone().unwrap_or_default(),
            date: review.created_at.format("%B %-d, %Y").to_string(),
        }
    }
}

/// Product detail page template.
#[derive(Template, WebTemplate)]
#[template(path = "products/show.html")]
pub struct ProductShowTemplate {
    pub ctx: PageContext,
    pub product: ProductDetailView,
    pub reviews: Vec<ReviewView>,
    pub related: Vec<ProductCardView>,
    pub in_wishlist: bool,
}

/// Review form data.
#[derive(Debug, Deserialize)]
pub struct ReviewForm {
    pub rating: i16,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub comment: String,
}

impl ReviewForm {
    fn validate(&self) -> Result<(), &'static str> {
        if !(1..=5).contains(&self.rating) {
            return Err("Please choose a rating from 1 to 5 stars.");
        }
        if self.title.trim().is_empty() {
            return Err("Please give your review a title.");
        }
        if self.comment.trim().is_empty() {
            return Err("Please write a few words about the piece.");
        }
        Ok(())
    }
}

/// Parse a product id from the path, treating garbage as not found.
fn parse_product_id(raw: &str) -> Result<ProductId, AppError> {
    raw.parse()
        .map_err(|_| AppError::NotFound(format!("product {raw}")))
}

/// Display the product detail page.
///
/// # Errors
///
/// Returns 404 if the product doesn't exist or is inactive.
#[instrument(skip(state, ctx, user))]
pub async fn show(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    ctx: PageContext,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let id = parse_product_id(&id)?;
    let backend = state.backend();
    let product = backend.get_product(id).await?;

    let in_wishlist = async {
        match &user {
            Some(u) => backend.is_in_wishlist(&u.access_token, u.id, id).await,
            None => false,
        }
    };
    let (reviews, related, in_wishlist) = tokio::join!(
        backend.get_product_reviews(id),
        backend.get_related_products(&product, RELATED_LIMIT),
        in_wishlist,
    );

    let reviews = reviews.unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Failed to load reviews");
        Vec::new()
    });
    let related = related.unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Failed to load related products");
        Vec::new()
    });

    let pricing = &state.config().pricing;
    Ok(ProductShowTemplate {
        ctx,
        product: ProductDetailView::new(&product, pricing),
        reviews: reviews.iter().map(ReviewView::from).collect(),
        related: ProductCardView::list(&related, pricing),
        in_wishlist,
    })
}

/// Submit a review. Reviews appear once approved.
#[instrument(skip(state, session, user, form), fields(rating = form.rating))]
pub async fn add_review(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    Path(id): Path<String>,
    Form(form): Form<ReviewForm>,
) -> Response {
    let Ok(product_id) = parse_product_id(&id) else {
        return Redirect::to("/catalog").into_response();
    };
    let back = format!("/products/{product_id}#reviews");

    if let Err(message) = form.validate() {
        set_flash(&session, Flash::error(message)).await;
        return Redirect::to(&back).into_response();
    }

    let review = NewReview {
        user_id: user.id,
        product_id,
        rating: form.rating,
        title: form.title.trim().to_string(),
        comment: form.comment.trim().to_string(),
    };

    match state.backend().add_review(&user.access_token, &review).await {
        Ok(_) => {
            add_breadcrumb("review", "Submitted review", Some(&[("product_id", id.as_str())]));
            set_flash(
                &session,
                Flash::success("Thanks! Your review will appear once it's approved."),
            )
            .await;
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to submit review");
            set_flash(
                &session,
                Flash::error("We couldn't save your review. Please try again."),
            )
            .await;
        }
    }
    Redirect::to(&back).into_response()
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;

    fn product(price: i64, original: Option<i64>, stock: i32) -> Product {
        Product {
            id: ProductId::generate(),
            name: "Luna Hoops".to_string(),
            description: None,
            price: Decimal::from(price),
            original_price: original.map(Decimal::from),
            category: Some("earrings".to_string()),
            images: vec!["https://cdn.test/luna.jpg".to_string()],
            image: None,
            stock_quantity: stock,
            rating: Some(Decimal::new(45, 1)),
            review_count: 12,
            sku: None,
            tag: None,
            sizes: Vec::new(),
            is_featured: true,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_card_shows_discount_only_when_cheaper() {
        let pricing = PricingPolicy::default();
        let card = ProductCardView::new(&product(1500, Some(2000), 3), &pricing, Utc::now());
        assert_eq!(card.price, "₹1500.00");
        assert_eq!(card.original_price.as_deref(), Some("₹2000.00"));
        assert_eq!(card.discount_percent, Some(25));
        assert!(card.is_new);
        assert_eq!(card.rating.as_deref(), Some("4.5"));

        let card = ProductCardView::new(&product(1500, Some(1200), 3), &pricing, Utc::now());
        assert_eq!(card.original_price, None);
    }

    #[test]
    fn test_stock_label() {
        let pricing = PricingPolicy::default();
        assert_eq!(ProductDetailView::new(&product(10, None, 0), &pricing).stock_label, "Out of stock");
        assert_eq!(ProductDetailView::new(&product(10, None, 2), &pricing).stock_label, "Only 2 left");
        assert_eq!(ProductDetailView::new(&product(10, None, 40), &pricing).stock_label, "In stock");
    }

    #[test]
    fn test_review_form_validation() {
        let form = |rating, title: &str, comment: &str| ReviewForm {
            rating,
            title: title.to_string(),
            comment: comment.to_string(),
        };
        assert!(form(0, "Lovely", "Wear it daily").validate().is_err());
        assert!(form(6, "Lovely", "Wear it daily").validate().is_err());
        assert!(form(5, " ", "Wear it daily").validate().is_err());
        assert!(form(5, "Lovely", "").validate().is_err());
        assert!(form(4, "Lovely", "Wear it daily").validate().is_ok());
    }

    #[test]
    fn test_bad_product_id_is_not_found() {
        assert!(matches!(parse_product_id("nope"), Err(AppError::NotFound(_))));
    }
}
