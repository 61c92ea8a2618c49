//! Wishlist route handlers (require auth).

use axum::{
    Form,
    extract::State,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use zeaver_core::ProductId;

use crate::middleware::RequireAuth;
use crate::models::Flash;
use crate::models::session::set_flash;
use crate::routes::safe_redirect;
use crate::state::AppState;

/// Wishlist form data.
#[derive(Debug, Deserialize)]
pub struct WishlistForm {
    pub product_id: String,
    #[serde(default)]
    pub redirect_to: Option<String>,
}

impl WishlistForm {
    fn back(&self) -> String {
        safe_redirect(self.redirect_to.as_deref(), "/account?tab=wishlist")
    }
}

/// Save a product.
#[instrument(skip(state, session, user, form), fields(product_id = %form.product_id))]
pub async fn add(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    Form(form): Form<WishlistForm>,
) -> Response {
    let flash = match form.product_id.parse::<ProductId>() {
        Ok(product_id) => match state
            .backend()
            .add_to_wishlist(&user.access_token, user.id, product_id)
            .await
        {
            Ok(()) => Flash::success("Saved to your wishlist."),
            Err(e) => {
                tracing::error!(error = %e, "Failed to add to wishlist");
                Flash::error("We couldn't save that piece. Please try again.")
            }
        },
        Err(_) => Flash::error("That piece is no longer available."),
    };
    set_flash(&session, flash).await;
    Redirect::to(&form.back()).into_response()
}

/// Remove a saved product.
#[instrument(skip(state, session, user, form), fields(product_id = %form.product_id))]
pub async fn remove(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    Form(form): Form<WishlistForm>,
) -> Response {
    let flash = match form.product_id.parse::<ProductId>() {
        Ok(product_id) => match state
            .backend()
            .remove_from_wishlist(&user.access_token, user.id, product_id)
            .await
        {
            Ok(()) => Flash::info("Removed from your wishlist."),
            Err(e) => {
                tracing::error!(error = %e, "Failed to remove from wishlist");
                Flash::error("We couldn't update your wishlist. Please try again.")
            }
        },
        Err(_) => Flash::error("That piece is no longer available."),
    };
    set_flash(&session, flash).await;
    Redirect::to(&form.back()).into_response()
}
