//! Values every full page renders in its layout.

use axum::{extract::FromRequestParts, http::request::Parts};
use tower_sessions::Session;

use crate::content::POLICY_SLUGS;
use crate::middleware::csp::CspNonce;
use crate::models::session::{load_cart, take_flash};
use crate::models::{CurrentUser, Flash, session_keys};
use crate::state::AppState;

/// A footer link to a policy page.
#[derive(Debug, Clone)]
pub struct FooterLink {
    pub href: String,
    pub title: String,
}

/// Layout data: cart badge, greeting, flash toast and script nonce.
///
/// Extracting this consumes the pending flash, so only full-page handlers
/// should use it.
#[derive(Debug, Clone, Default)]
pub struct PageContext {
    pub cart_count: u32,
    /// First name of the signed-in shopper.
    pub user_name: Option<String>,
    pub flash: Option<Flash>,
    pub nonce: String,
    pub policies: Vec<FooterLink>,
}

impl PageContext {
    #[must_use]
    pub const fn signed_in(&self) -> bool {
        self.user_name.is_some()
    }
}

impl FromRequestParts<AppState> for PageContext {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let CspNonce(nonce) = CspNonce::from_request_parts(parts, state).await?;
        let policies = footer_links(state);

        let Some(session) = parts.extensions.get::<Session>().cloned() else {
            return Ok(Self {
                nonce,
                policies,
                ..Self::default()
            });
        };

        let cart_count = load_cart(&session).await.item_count();
        let user_name = session
            .get::<CurrentUser>(session_keys::CURRENT_USER)
            .await
            .ok()
            .flatten()
            .map(|u| u.first_name().to_string());
        let flash = take_flash(&session).await;

        Ok(Self {
            cart_count,
            user_name,
            flash,
            nonce,
            policies,
        })
    }
}

fn footer_links(state: &AppState) -> Vec<FooterLink> {
    let loaded: Vec<FooterLink> = state
        .content()
        .policies()
        .map(|page| FooterLink {
            href: format!("/policies/{}", page.slug),
            title: page.meta.title.clone(),
        })
        .collect();
    if !loaded.is_empty() {
        return loaded;
    }
    POLICY_SLUGS
        .iter()
        .map(|slug| FooterLink {
            href: format!("/policies/{slug}"),
            title: capitalize(slug),
        })
        .collect()
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("returns"), "Returns");
        assert_eq!(capitalize(""), "");
    }
}
