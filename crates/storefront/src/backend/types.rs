//! Rows returned by the backend's REST data API.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Deserializer, Serialize};

use zeaver_core::{
    CategoryId, OrderId, OrderItemId, OrderStatus, PaymentStatus, ProductId, ReviewId, UserId,
    WishlistId,
};

/// Products newer than this are badged "New".
pub const NEW_PRODUCT_DAYS: i64 = 30;

/// Treat an explicit JSON `null` the same as a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

const fn default_true() -> bool {
    true
}

// =============================================================================
// Catalog
// =============================================================================

/// A row of `products`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: Decimal,
    #[serde(default)]
    pub original_price: Option<Decimal>,
    /// Category slug.
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub images: Vec<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub stock_quantity: i32,
    #[serde(default)]
    pub rating: Option<Decimal>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub review_count: i32,
    #[serde(default)]
    pub sku: Option<String>,
    /// Merchandising label such as "Bestseller".
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub sizes: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_featured: bool,
    #[serde(default = "default_true")]
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Product {
    /// First gallery image, falling back to the single `image` column.
    #[must_use]
    pub fn primary_image(&self) -> Option<&str> {
        self.images
            .first()
            .map(String::as_str)
            .or(self.image.as_deref())
    }

    /// All images, with the single `image` column used when the gallery is empty.
    #[must_use]
    pub fn gallery(&self) -> Vec<&str> {
        if self.images.is_empty() {
            self.image.as_deref().into_iter().collect()
        } else {
            self.images.iter().map(String::as_str).collect()
        }
    }

    /// Whole-number percentage off the original price, if discounted.
    #[must_use]
    pub fn discount_percent(&self) -> Option<u32> {
        let original = self.original_price?;
        if original <= Decimal::ZERO || original <= self.price {
            return None;
        }
        ((original - self.price) / original * Decimal::from(100))
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .to_u32()
            .filter(|pct| *pct > 0)
    }

    /// Created within the last [`NEW_PRODUCT_DAYS`] days.
    #[must_use]
    pub fn is_new(&self, now: DateTime<Utc>) -> bool {
        now - self.created_at < Duration::days(NEW_PRODUCT_DAYS)
    }

    #[must_use]
    pub const fn in_stock(&self) -> bool {
        self.stock_quantity > 0
    }

    /// Stock as a cart cap. Negative stock counts as none.
    #[must_use]
    pub fn max_quantity(&self) -> u32 {
        u32::try_from(self.stock_quantity).unwrap_or(0)
    }
}

/// A row of `categories`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub display_order: i32,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

// =============================================================================
// Reviews
// =============================================================================

/// A row of `reviews`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    pub id: ReviewId,
    pub product_id: ProductId,
    #[serde(default)]
    pub user_id: Option<UserId>,
    pub rating: i16,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_approved: bool,
    pub created_at: DateTime<Utc>,
}

/// Insert payload for `reviews`. New reviews await moderation.
#[derive(Debug, Clone, Serialize)]
pub struct NewReview {
    pub user_id: UserId,
    pub product_id: ProductId,
    pub rating: i16,
    pub title: String,
    pub comment: String,
}

// =============================================================================
// Orders
// =============================================================================

/// A row of `orders`, with `order_items` embedded when selected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    #[serde(default)]
    pub user_id: Option<UserId>,
    pub order_number: String,
    pub status: OrderStatus,
    pub subtotal: Decimal,
    #[serde(default, deserialize_with = "null_as_default")]
    pub shipping_cost: Decimal,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tax: Decimal,
    #[serde(default, deserialize_with = "null_as_default")]
    pub discount: Decimal,
    #[serde(default)]
    pub promo_code: Option<String>,
    pub total: Decimal,
    pub shipping_name: String,
    pub shipping_email: String,
    #[serde(default)]
    pub shipping_phone: Option<String>,
    pub shipping_address: String,
    pub shipping_city: String,
    pub shipping_state: String,
    pub shipping_postal_code: String,
    pub shipping_country: String,
    pub payment_status: PaymentStatus,
    #[serde(default)]
    pub stripe_payment_intent_id: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub order_items: Vec<OrderItem>,
}

impl Order {
    #[must_use]
    pub fn item_count(&self) -> i32 {
        self.order_items.iter().map(|i| i.quantity).sum()
    }
}

/// A row of `order_items`. Product name and price are snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    #[serde(default)]
    pub product_id: Option<ProductId>,
    pub product_name: String,
    pub product_price: Decimal,
    pub quantity: i32,
    #[serde(default)]
    pub size: Option<String>,
    pub subtotal: Decimal,
}

// =============================================================================
// Accounts
// =============================================================================

/// A row of `user_profiles`, keyed by the auth user's id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: UserId,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_admin: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// A row of `wishlists` with the product embedded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WishlistEntry {
    pub id: WishlistId,
    pub user_id: UserId,
    pub product_id: ProductId,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    /// Embedded via `select=*,products(*)`. Null when the product was deleted.
    #[serde(default, rename = "products")]
    pub product: Option<Product>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    const PRODUCT_ROW: &str = r#"{
        "id": "3f0e8a52-4d7f-4a7b-9a51-0a4c8a8b2c11",
        "name": "Lotus Gold Pendant",
        "description": "18k gold-plated pendant",
        "price": 1499,
        "original_price": 1999.00,
        "category": "necklaces",
        "images": null,
        "image": "https://cdn.zeaver.in/lotus.jpg",
        "stock_quantity": 7,
        "rating": 4.5,
        "review_count": null,
        "sku": "ZV-NK-001",
        "tag": "Bestseller",
        "is_featured": true,
        "is_active": true,
        "created_at": "2026-01-10T09:30:00.123456+00:00"
    }"#;

    fn product() -> Product {
        serde_json::from_str(PRODUCT_ROW).unwrap()
    }

    #[test]
    fn test_product_row_with_nulls() {
        let p = product();
        assert_eq!(p.price, Decimal::from(1499));
        assert!(p.images.is_empty());
        assert_eq!(p.review_count, 0);
        assert!(p.sizes.is_empty());
        assert_eq!(p.primary_image(), Some("https://cdn.zeaver.in/lotus.jpg"));
        assert_eq!(p.gallery(), vec!["https://cdn.zeaver.in/lotus.jpg"]);
    }

    #[test]
    fn test_discount_percent() {
        // (1999 - 1499) / 1999 = 25.01%
        assert_eq!(product().discount_percent(), Some(25));

        let mut p = product();
        p.original_price = Some(Decimal::from(1000));
        assert_eq!(p.discount_percent(), None);
        p.original_price = None;
        assert_eq!(p.discount_percent(), None);
    }

    #[test]
    fn test_is_new() {
        let p = product();
        let soon = Utc.with_ymd_and_hms(2026, 1, 20, 0, 0, 0).unwrap();
        let later = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
        assert!(p.is_new(soon));
        assert!(!p.is_new(later));
    }

    #[test]
    fn test_max_quantity_never_negative() {
        let mut p = product();
        assert_eq!(p.max_quantity(), 7);
        p.stock_quantity = -3;
        assert_eq!(p.max_quantity(), 0);
        assert!(!p.in_stock());
    }

    #[test]
    fn test_order_with_embedded_items() {
        let row = r#"{
            "id": "9b2f7c1e-1111-4c3b-8a8a-2b7d9f0e1a22",
            "user_id": null,
            "order_number": "ZV20260001",
            "status": "pending",
            "subtotal": 2998,
            "shipping_cost": 0,
            "tax": 239.84,
            "total": 3237.84,
            "shipping_name": "Meera Iyer",
            "shipping_email": "meera@example.com",
            "shipping_phone": null,
            "shipping_address": "12 MG Road",
            "shipping_city": "Bengaluru",
            "shipping_state": "Karnataka",
            "shipping_postal_code": "560001",
            "shipping_country": "India",
            "payment_status": "pending",
            "created_at": "2026-02-01T12:00:00+00:00",
            "order_items": [{
                "id": "c6a1d0a4-2222-4f7e-9d7e-5b6a8c9d0e33",
                "order_id": "9b2f7c1e-1111-4c3b-8a8a-2b7d9f0e1a22",
                "product_id": "3f0e8a52-4d7f-4a7b-9a51-0a4c8a8b2c11",
                "product_name": "Lotus Gold Pendant",
                "product_price": 1499,
                "quantity": 2,
                "size": null,
                "subtotal": 2998
            }]
        }"#;
        let order: Order = serde_json::from_str(row).unwrap();
        assert!(order.user_id.is_none());
        assert_eq!(order.discount, Decimal::ZERO);
        assert_eq!(order.item_count(), 2);
        assert_eq!(order.status, OrderStatus::Pending);
    }

    #[test]
    fn test_wishlist_entry_embeds_product() {
        let row = format!(
            r#"{{"id":"5d8e1f2a-3333-4a1b-8c2d-3e4f5a6b7c44","user_id":"1a2b3c4d-4444-4e5f-8a9b-0c1d2e3f4a55","product_id":"3f0e8a52-4d7f-4a7b-9a51-0a4c8a8b2c11","products":{PRODUCT_ROW}}}"#
        );
        let entry: WishlistEntry = serde_json::from_str(&row).unwrap();
        assert_eq!(entry.product.unwrap().name, "Lotus Gold Pendant");
    }
}
