//! Zeaver Core - Domain types and storefront rules.
//!
//! This crate provides the types and rules shared by the Zeaver components:
//! - `storefront` - Public-facing jewelry storefront
//! - `cli` - Command-line tools for migrations, diagnostics and order updates
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no HTTP
//! clients, no session access. Everything here is deterministic given its
//! inputs, which keeps the cart and pricing arithmetic easy to test.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for IDs, money, emails, and statuses
//! - [`cart`] - The visitor's cart and its line-item operations
//! - [`pricing`] - Shipping, tax and order totals
//! - [`promo`] - Promo code validation and discounts
//! - [`checkout`] - Checkout steps and form validation

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod checkout;
pub mod pricing;
pub mod promo;
pub mod types;

pub use cart::{AddOutcome, Cart, CartError, CartItem, NewCartItem, QuantityChange};
pub use pricing::{OrderTotals, PricingPolicy};
pub use promo::{AppliedPromo, PromoCode, PromoError};
pub use types::*;
