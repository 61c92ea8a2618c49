//! The visitor's shopping cart.
//!
//! The cart lives entirely in session state; nothing here talks to the
//! backend. Each line snapshots the product's name, price and stock at the
//! time it was added, and every mutation keeps `1 <= quantity <= max_quantity`.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{CartLineId, CurrencyCode, Money, ProductId};

/// Errors from cart mutations.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CartError {
    /// Requested quantity was zero.
    #[error("quantity must be at least 1")]
    InvalidQuantity,
    /// Product has no stock.
    #[error("{name} is out of stock")]
    OutOfStock {
        /// Product name for the user-facing message.
        name: String,
    },
    /// No line with this id exists in the cart.
    #[error("cart line not found: {0}")]
    LineNotFound(CartLineId),
}

/// One product/size/quantity entry in the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub id: CartLineId,
    pub product_id: ProductId,
    pub name: String,
    /// Unit price at the time the line was added.
    pub price: Decimal,
    pub original_price: Option<Decimal>,
    pub quantity: u32,
    /// Stock available when the line was last touched.
    pub max_quantity: u32,
    pub size: Option<String>,
    pub image: Option<String>,
}

impl CartItem {
    /// `price * quantity` for this line.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.price * Decimal::from(self.quantity)
    }

    /// Whether this line already holds all available stock.
    #[must_use]
    pub const fn at_max(&self) -> bool {
        self.quantity >= self.max_quantity
    }

    fn matches(&self, product_id: ProductId, size: Option<&str>) -> bool {
        self.product_id == product_id && self.size.as_deref() == size
    }
}

/// Input for [`Cart::add_item`].
#[derive(Debug, Clone)]
pub struct NewCartItem {
    pub product_id: ProductId,
    pub name: String,
    pub price: Decimal,
    pub original_price: Option<Decimal>,
    pub quantity: u32,
    pub max_quantity: u32,
    pub size: Option<String>,
    pub image: Option<String>,
}

/// Result of adding a product to the cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// A new line was appended.
    Added(CartLineId),
    /// An existing line's quantity was increased.
    Updated(CartLineId),
    /// The requested quantity exceeded stock and was clamped to `max`.
    Capped {
        /// The affected line.
        id: CartLineId,
        /// Quantity the line now holds.
        max: u32,
    },
}

impl AddOutcome {
    /// The line the product landed on.
    #[must_use]
    pub const fn line_id(&self) -> CartLineId {
        match self {
            Self::Added(id) | Self::Updated(id) | Self::Capped { id, .. } => *id,
        }
    }
}

/// Result of changing a line's quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantityChange {
    Updated,
    /// The quantity fell below 1 and the line was deleted.
    Removed,
    /// The requested quantity exceeded stock and was clamped to `max`.
    Capped {
        /// Quantity the line now holds.
        max: u32,
    },
}

/// A cart of line items.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    items: Vec<CartItem>,
}

impl Cart {
    /// An empty cart.
    #[must_use]
    pub const fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Add a product, merging with an existing line of the same product and size.
    ///
    /// An empty size is treated as no size. The resulting quantity is clamped
    /// to the product's stock, and the line's stock snapshot is refreshed from
    /// `item.max_quantity`.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::InvalidQuantity`] when `item.quantity` is zero and
    /// [`CartError::OutOfStock`] when `item.max_quantity` is zero.
    pub fn add_item(&mut self, item: NewCartItem) -> Result<AddOutcome, CartError> {
        if item.quantity == 0 {
            return Err(CartError::InvalidQuantity);
        }
        if item.max_quantity == 0 {
            return Err(CartError::OutOfStock { name: item.name });
        }

        let size = item
            .size
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty());
        let max = item.max_quantity;

        if let Some(existing) = self
            .items
            .iter_mut()
            .find(|line| line.matches(item.product_id, size.as_deref()))
        {
            let wanted = existing.quantity.saturating_add(item.quantity);
            existing.max_quantity = max;
            existing.quantity = wanted.min(max);
            return Ok(if wanted > max {
                AddOutcome::Capped {
                    id: existing.id,
                    max,
                }
            } else {
                AddOutcome::Updated(existing.id)
            });
        }

        let id = CartLineId::generate();
        self.items.push(CartItem {
            id,
            product_id: item.product_id,
            name: item.name,
            price: item.price,
            original_price: item.original_price,
            quantity: item.quantity.min(max),
            max_quantity: max,
            size,
            image: item.image,
        });

        Ok(if item.quantity > max {
            AddOutcome::Capped { id, max }
        } else {
            AddOutcome::Added(id)
        })
    }

    /// Set a line's quantity. Anything below 1 deletes the line.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::LineNotFound`] when `id` is not in the cart.
    pub fn update_quantity(
        &mut self,
        id: CartLineId,
        quantity: i64,
    ) -> Result<QuantityChange, CartError> {
        let pos = self
            .items
            .iter()
            .position(|line| line.id == id)
            .ok_or(CartError::LineNotFound(id))?;

        if quantity < 1 {
            self.items.remove(pos);
            return Ok(QuantityChange::Removed);
        }

        let Some(line) = self.items.get_mut(pos) else {
            return Err(CartError::LineNotFound(id));
        };
        let max = line.max_quantity;
        let wanted = u32::try_from(quantity).unwrap_or(u32::MAX);
        line.quantity = wanted.min(max);

        Ok(if wanted > max {
            QuantityChange::Capped { max }
        } else {
            QuantityChange::Updated
        })
    }

    /// Add one unit to a line.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::LineNotFound`] when `id` is not in the cart.
    pub fn increment(&mut self, id: CartLineId) -> Result<QuantityChange, CartError> {
        let current = self.line(id).ok_or(CartError::LineNotFound(id))?.quantity;
        self.update_quantity(id, i64::from(current) + 1)
    }

    /// Take one unit off a line, deleting it when the last unit goes.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::LineNotFound`] when `id` is not in the cart.
    pub fn decrement(&mut self, id: CartLineId) -> Result<QuantityChange, CartError> {
        let current = self.line(id).ok_or(CartError::LineNotFound(id))?.quantity;
        self.update_quantity(id, i64::from(current) - 1)
    }

    /// Delete a line. Returns whether anything was removed.
    pub fn remove_item(&mut self, id: CartLineId) -> bool {
        let before = self.items.len();
        self.items.retain(|line| line.id != id);
        self.items.len() != before
    }

    /// Remove every line.
    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Total number of units across all lines.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.items.iter().map(|line| line.quantity).sum()
    }

    /// Sum of `price * quantity` over all lines.
    #[must_use]
    pub fn subtotal_amount(&self) -> Decimal {
        self.items.iter().map(CartItem::line_total).sum()
    }

    /// [`Self::subtotal_amount`] as money in the given currency.
    #[must_use]
    pub fn subtotal(&self, currency: CurrencyCode) -> Money {
        Money::new(self.subtotal_amount(), currency)
    }

    #[must_use]
    pub fn lines(&self) -> &[CartItem] {
        &self.items
    }

    #[must_use]
    pub fn line(&self, id: CartLineId) -> Option<&CartItem> {
        self.items.iter().find(|line| line.id == id)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
