//! HTTP middleware stack for the storefront.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (capture errors, transactions)
//! 2. `TraceLayer` (request span)
//! 3. Request ID (recorded on the span)
//! 4. Session layer (tower-sessions)
//! 5. CSP nonce (per-request nonce for inline scripts)
//! 6. Security headers (CSP, frame denial, etc.)
//! 7. Rate limiting (governor, on auth and form routes only)

pub mod auth;
pub mod csp;
pub mod page_context;
pub mod rate_limit;
pub mod request_id;
pub mod security_headers;
pub mod session;

pub use auth::{OptionalAuth, RequireAuth, clear_current_user, login_url, set_current_user};
pub use csp::{CspNonce, csp_nonce_middleware};
pub use page_context::PageContext;
pub use rate_limit::{auth_rate_limiter, form_rate_limiter};
pub use request_id::{make_request_span, request_id_middleware};
pub use security_headers::security_headers_middleware;
pub use session::{create_session_layer, session_layer};
