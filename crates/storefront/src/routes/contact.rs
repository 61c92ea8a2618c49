//! Contact form route handlers.
//!
//! Messages are logged for the support team; there is no outbound mail.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use zeaver_core::Email;

use crate::filters;
use crate::middleware::PageContext;
use crate::models::Flash;
use crate::models::session::set_flash;

/// Longest message accepted.
const MAX_MESSAGE_LENGTH: usize = 5000;

/// Contact form data.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ContactForm {
    pub name: String,
    pub email: String,
    pub subject: String,
    pub message: String,
}

impl ContactForm {
    fn validate(&self) -> Result<Email, &'static str> {
        if self.name.trim().is_empty() {
            return Err("Please tell us your name.");
        }
        let email = Email::parse(&self.email).map_err(|_| "Please enter a valid email address.")?;
        if self.message.trim().is_empty() {
            return Err("Please write a message.");
        }
        if self.message.chars().count() > MAX_MESSAGE_LENGTH {
            return Err("Your message is too long. Please keep it under 5000 characters.");
        }
        Ok(email)
    }
}

/// Contact page template.
#[derive(Template, WebTemplate)]
#[template(path = "contact.html")]
pub struct ContactTemplate {
    pub ctx: PageContext,
    pub form: ContactForm,
    pub error: Option<String>,
}

/// Display the contact page.
pub async fn show(ctx: PageContext) -> impl IntoResponse {
    ContactTemplate {
        ctx,
        form: ContactForm::default(),
        error: None,
    }
}

/// Submit the contact form.
#[instrument(skip(session, ctx, form))]
pub async fn submit(session: Session, ctx: PageContext, Form(form): Form<ContactForm>) -> Response {
    let email = match form.validate() {
        Ok(email) => email,
        Err(message) => {
            return (
                StatusCode::UNPROCESSABLE_ENTITY,
                ContactTemplate {
                    ctx,
                    form,
                    error: Some(message.to_string()),
                },
            )
                .into_response();
        }
    };

    tracing::info!(
        name = %form.name.trim(),
        email = %email,
        subject = %form.subject.trim(),
        message = %form.message.trim(),
        "Contact form submitted"
    );

    set_flash(
        &session,
        Flash::success("Thanks for reaching out! We'll get back to you within two business days."),
    )
    .await;
    Redirect::to("/contact").into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(name: &str, email: &str, message: &str) -> ContactForm {
        ContactForm {
            name: name.into(),
            email: email.into(),
            subject: "Sizing".into(),
            message: message.into(),
        }
    }

    #[test]
    fn test_contact_validation() {
        assert!(form("Anika", "anika@example.com", "Do rings run small?").validate().is_ok());
        assert!(form("", "anika@example.com", "Hi").validate().is_err());
        assert!(form("Anika", "not-an-email", "Hi").validate().is_err());
        assert!(form("Anika", "anika@example.com", "   ").validate().is_err());
        assert!(
            form("Anika", "anika@example.com", &"x".repeat(MAX_MESSAGE_LENGTH + 1))
                .validate()
                .is_err()
        );
    }
}
