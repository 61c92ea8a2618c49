//! Profiles, wishlists and newsletter signups.

use serde::Serialize;
use serde_json::json;
use tracing::{info, instrument};

use zeaver_core::{Email, ProductId, UserId};

use crate::backend::client::{Auth, BackendClient};
use crate::backend::query::{Direction, Query};
use crate::backend::types::{UserProfile, WishlistEntry};
use crate::backend::BackendError;

/// Editable profile fields. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

impl ProfileUpdate {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.full_name.is_none() && self.phone.is_none() && self.avatar_url.is_none()
    }
}

impl BackendClient {
    // =========================================================================
    // Profile Methods
    // =========================================================================

    /// # Errors
    ///
    /// Returns `BackendError::NotFound` if the shopper has no profile row.
    #[instrument(skip(self, access_token))]
    pub async fn get_user_profile(&self, access_token: &str, user_id: UserId) -> Result<UserProfile, BackendError> {
        let query = Query::table("user_profiles").select("*").eq("id", user_id);
        self.fetch_one(&query, Auth::User(access_token)).await
    }

    /// Apply `update` and return the stored profile.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::NotFound` if the shopper has no profile row.
    #[instrument(skip(self, access_token, update))]
    pub async fn update_user_profile(
        &self,
        access_token: &str,
        user_id: UserId,
        update: &ProfileUpdate,
    ) -> Result<UserProfile, BackendError> {
        if update.is_empty() {
            return self.get_user_profile(access_token, user_id).await;
        }
        let query = Query::table("user_profiles").eq("id", user_id);
        self.update::<UserProfile, _>(&query, update, Auth::User(access_token))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| BackendError::NotFound(format!("Profile not found: {user_id}")))
    }

    /// Whether the shopper is flagged as an admin. Lookup failures count as no.
    #[instrument(skip(self, access_token))]
    pub async fn is_admin(&self, access_token: &str, user_id: UserId) -> bool {
        match self.get_user_profile(access_token, user_id).await {
            Ok(profile) => profile.is_admin,
            Err(e) => {
                tracing::warn!(error = %e, "Admin check failed");
                false
            }
        }
    }

    // =========================================================================
    // Wishlist Methods
    // =========================================================================

    /// The shopper's saved products, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self, access_token))]
    pub async fn get_wishlist(&self, access_token: &str, user_id: UserId) -> Result<Vec<WishlistEntry>, BackendError> {
        let query = Query::table("wishlists")
            .select("*,products(*)")
            .eq("user_id", user_id)
            .order("created_at", Direction::Desc);
        self.fetch_all(&query, Auth::User(access_token)).await
    }

    /// Save a product. Saving one that's already saved is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert is rejected for any other reason.
    #[instrument(skip(self, access_token))]
    pub async fn add_to_wishlist(
        &self,
        access_token: &str,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<(), BackendError> {
        let row = json!({ "user_id": user_id, "product_id": product_id });
        match self
            .insert_many("wishlists", std::slice::from_ref(&row), Auth::User(access_token))
            .await
        {
            Ok(()) => Ok(()),
            Err(e) if e.is_conflict() => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// # Errors
    ///
    /// Returns an error if the delete is rejected.
    #[instrument(skip(self, access_token))]
    pub async fn remove_from_wishlist(
        &self,
        access_token: &str,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<(), BackendError> {
        let query = Query::table("wishlists")
            .eq("user_id", user_id)
            .eq("product_id", product_id);
        self.delete(&query, Auth::User(access_token)).await
    }

    /// Whether the product is saved. Lookup failures count as no.
    #[instrument(skip(self, access_token))]
    pub async fn is_in_wishlist(&self, access_token: &str, user_id: UserId, product_id: ProductId) -> bool {
        let query = Query::table("wishlists")
            .select("id")
            .eq("user_id", user_id)
            .eq("product_id", product_id);
        self.fetch_maybe::<serde_json::Value>(&query, Auth::User(access_token))
            .await
            .is_ok_and(|row| row.is_some())
    }

    // =========================================================================
    // Newsletter
    // =========================================================================

    /// # Errors
    ///
    /// Returns `BackendError::Conflict("Email already subscribed")` for a
    /// repeat signup.
    #[instrument(skip(self))]
    pub async fn subscribe_to_newsletter(&self, email: &Email) -> Result<(), BackendError> {
        let row = json!({ "email": email.as_str() });
        self.insert_many("newsletter_subscribers", std::slice::from_ref(&row), Auth::Anon)
            .await
            .map_err(|e| {
                if e.is_conflict() {
                    BackendError::Conflict("Email already subscribed".to_string())
                } else {
                    e
                }
            })?;
        info!("Newsletter signup");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use std::sync::{Arc, Mutex};

    use axum::extract::RawQuery;
    use axum::http::StatusCode;
    use axum::routing::{delete, get, patch, post};
    use axum::{Json, Router};
    use serde_json::Value;

    use super::*;
    use crate::backend::testing::{spawn_backend, test_client};

    const USER: &str = "5a1c2e7d-6b9f-4e3a-9c1d-8f7e6d5c4b3a";
    const PRODUCT: &str = "3f0e8a52-4d7f-4a7b-9a51-0a4c8a8b2c11";

    fn user() -> UserId {
        USER.parse().unwrap()
    }

    fn product() -> ProductId {
        PRODUCT.parse().unwrap()
    }

    #[test]
    fn test_profile_update_skips_unset_fields() {
        let update = ProfileUpdate {
            phone: Some("+91 98450 00000".into()),
            ..ProfileUpdate::default()
        };
        assert_eq!(
            serde_json::to_value(&update).unwrap(),
            json!({ "phone": "+91 98450 00000" })
        );
        assert!(ProfileUpdate::default().is_empty());
    }

    #[tokio::test]
    async fn test_update_profile_returns_stored_row() {
        let app = Router::new().route(
            "/rest/v1/user_profiles",
            patch(|Json(body): Json<Value>| async move {
                Json(json!([{ "id": USER, "full_name": body["full_name"], "is_admin": null }]))
            }),
        );
        let client = test_client(spawn_backend(app).await);
        let update = ProfileUpdate {
            full_name: Some("Meera Iyer".into()),
            ..ProfileUpdate::default()
        };
        let profile = client.update_user_profile("jwt", user(), &update).await.unwrap();
        assert_eq!(profile.full_name.as_deref(), Some("Meera Iyer"));
        assert!(!profile.is_admin);
    }

    #[tokio::test]
    async fn test_is_admin_false_on_error() {
        let app = Router::new().route(
            "/rest/v1/user_profiles",
            get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
        );
        let client = test_client(spawn_backend(app).await);
        assert!(!client.is_admin("jwt", user()).await);
    }

    #[tokio::test]
    async fn test_wishlist_embeds_products() {
        let app = Router::new().route(
            "/rest/v1/wishlists",
            get(|| async {
                Json(json!([{
                    "id": "0c7b1d2e-3f4a-4b5c-8d6e-7f8091a2b3c4",
                    "user_id": USER,
                    "product_id": PRODUCT,
                    "products": null
                }]))
            }),
        );
        let client = test_client(spawn_backend(app).await);
        let entries = client.get_wishlist("jwt", user()).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].product.is_none());
    }

    #[tokio::test]
    async fn test_duplicate_wishlist_add_is_ok() {
        let app = Router::new().route(
            "/rest/v1/wishlists",
            post(|| async {
                (StatusCode::CONFLICT, Json(json!({"code": "23505", "message": "duplicate key"})))
            }),
        );
        let client = test_client(spawn_backend(app).await);
        client.add_to_wishlist("jwt", user(), product()).await.unwrap();
    }

    #[tokio::test]
    async fn test_remove_from_wishlist_filters_by_user_and_product() {
        let seen: Arc<Mutex<Option<String>>> = Arc::default();
        let captured = seen.clone();
        let app = Router::new().route(
            "/rest/v1/wishlists",
            delete(move |RawQuery(query): RawQuery| async move {
                *captured.lock().unwrap() = query;
                StatusCode::NO_CONTENT
            }),
        );
        let client = test_client(spawn_backend(app).await);
        client.remove_from_wishlist("jwt", user(), product()).await.unwrap();

        let query = seen.lock().unwrap().clone().unwrap();
        assert!(query.contains(&format!("user_id=eq.{USER}")));
        assert!(query.contains(&format!("product_id=eq.{PRODUCT}")));
    }

    #[tokio::test]
    async fn test_is_in_wishlist() {
        let app = Router::new().route(
            "/rest/v1/wishlists",
            get(|| async { Json(json!([{ "id": "0c7b1d2e-3f4a-4b5c-8d6e-7f8091a2b3c4" }])) }),
        );
        let client = test_client(spawn_backend(app).await);
        assert!(client.is_in_wishlist("jwt", user(), product()).await);
    }

    #[tokio::test]
    async fn test_repeat_newsletter_signup() {
        let app = Router::new().route(
            "/rest/v1/newsletter_subscribers",
            post(|| async {
                (StatusCode::CONFLICT, Json(json!({"code": "23505", "message": "duplicate key"})))
            }),
        );
        let client = test_client(spawn_backend(app).await);
        let email = Email::parse("meera@example.com").unwrap();
        let err = client.subscribe_to_newsletter(&email).await.unwrap_err();
        assert_eq!(err.to_string(), "Conflict: Email already subscribed");
    }
}
