//! Newsletter subscription route handler.

use axum::{
    Form,
    extract::State,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use zeaver_core::Email;

use crate::models::Flash;
use crate::models::session::set_flash;
use crate::routes::safe_redirect;
use crate::state::AppState;

/// Newsletter subscription form data.
#[derive(Debug, Deserialize)]
pub struct SubscribeForm {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub redirect_to: Option<String>,
}

/// Subscribe to the newsletter.
///
/// A repeat signup is reported as "already subscribed" rather than an error.
#[instrument(skip(state, session, form))]
pub async fn subscribe(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<SubscribeForm>,
) -> Response {
    let flash = match Email::parse(&form.email) {
        Err(_) => Flash::error("Please enter a valid email address."),
        Ok(email) => match state.backend().subscribe_to_newsletter(&email).await {
            Ok(()) => Flash::success("Thanks for subscribing! Watch your inbox for new collections."),
            Err(e) if e.is_conflict() => Flash::info("You're already subscribed."),
            Err(e) => {
                tracing::error!(error = %e, "Newsletter signup failed");
                Flash::error("We couldn't subscribe you right now. Please try again.")
            }
        },
    };

    set_flash(&session, flash).await;
    Redirect::to(&safe_redirect(form.redirect_to.as_deref(), "/")).into_response()
}
