//! Business logic services for storefront.
//!
//! # Services
//!
//! - `auth` - Signup, login, password changes and PKCE sign-in flows

pub mod auth;

pub use auth::{AuthError, AuthService};
