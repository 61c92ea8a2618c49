//! Domain models for storefront.
//!
//! Backend rows live in [`crate::backend::types`]; this module holds what the
//! storefront keeps in the visitor's session.

pub mod session;

pub use session::{CheckoutDraft, CurrentUser, Flash, FlashKind, keys as session_keys};
