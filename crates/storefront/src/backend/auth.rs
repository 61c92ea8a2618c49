//! Auth API client.
//!
//! Accounts, passwords and sessions are owned by the backend's auth
//! service. Password sign-in goes straight to the token endpoint; Google
//! sign-in and password recovery use PKCE.
//!
//! # Google Sign-in
//!
//! 1. Create a [`Pkce`] pair and keep the verifier in the session
//! 2. Redirect to [`BackendClient::google_authorize_url`]
//! 3. The auth service redirects back to `/auth/callback?code=...`
//! 4. Trade the code and verifier with [`BackendClient::exchange_code_for_session`]

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::Utc;
use rand::Rng;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::{Digest, Sha256};
use tracing::{info, instrument};

use zeaver_core::{Email, UserId};

use crate::backend::client::{Auth, BackendClient, parse_body};
use crate::backend::BackendError;

/// Seconds before expiry at which a session counts as expired.
const EXPIRY_BUFFER_SECS: i64 = 60;

/// A signed-in shopper's tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    pub refresh_token: String,
    /// Lifetime in seconds.
    pub expires_in: i64,
    /// Unix timestamp when the access token expires.
    #[serde(default)]
    pub expires_at: Option<i64>,
    pub user: AuthUser,
}

impl AuthSession {
    /// Whether the access token has expired (with a 60s buffer).
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires_at
            .is_some_and(|at| Utc::now().timestamp() >= at - EXPIRY_BUFFER_SECS)
    }

    fn stamped(mut self) -> Self {
        if self.expires_at.is_none() {
            self.expires_at = Some(Utc::now().timestamp() + self.expires_in);
        }
        self
    }
}

/// An account as reported by the auth service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: UserId,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: UserMetadata,
}

/// Free-form profile data stored with the account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserMetadata {
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

impl AuthUser {
    /// Full name if set, else the email's local part.
    #[must_use]
    pub fn display_name(&self) -> String {
        if let Some(name) = self
            .user_metadata
            .full_name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
        {
            return name.to_string();
        }
        self.email
            .as_deref()
            .and_then(|e| e.split('@').next())
            .unwrap_or("there")
            .to_string()
    }
}

/// Result of a signup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignUpOutcome {
    /// Email confirmation is off; the shopper is signed in.
    SignedIn(AuthSession),
    /// A confirmation email was sent.
    ConfirmationRequired(AuthUser),
}

/// A PKCE verifier and its S256 challenge.
#[derive(Debug, Clone)]
pub struct Pkce {
    pub verifier: String,
    pub challenge: String,
}

impl Pkce {
    /// Generate a fresh 64-character verifier.
    #[must_use]
    pub fn generate() -> Self {
        const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-._~";
        let mut rng = rand::rng();
        let verifier: String = (0..64)
            .filter_map(|_| CHARSET.get(rng.random_range(0..CHARSET.len())))
            .map(|&b| char::from(b))
            .collect();
        Self::from_verifier(verifier)
    }

    #[must_use]
    pub fn from_verifier(verifier: String) -> Self {
        let challenge = URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()));
        Self {
            verifier,
            challenge,
        }
    }
}

impl BackendClient {
    fn auth_endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.auth_url())
    }

    async fn token_grant(&self, grant_type: &str, body: &serde_json::Value) -> Result<AuthSession, BackendError> {
        let url = self.auth_endpoint("token");
        let request = self
            .request(Method::POST, &url, Auth::Anon)?
            .query(&[("grant_type", grant_type)])
            .json(body);
        let body = self.send(request).await?;
        Ok(parse_body::<AuthSession>(&body)?.stamped())
    }

    /// Create an account. `full_name` is stored in the user metadata.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::Api` with the auth service's message, e.g. for a
    /// registered email or a weak password.
    #[instrument(skip(self, password))]
    pub async fn sign_up(
        &self,
        email: &Email,
        password: &str,
        full_name: Option<&str>,
        redirect_to: &str,
    ) -> Result<SignUpOutcome, BackendError> {
        let url = self.auth_endpoint("signup");
        let request = self
            .request(Method::POST, &url, Auth::Anon)?
            .query(&[("redirect_to", redirect_to)])
            .json(&json!({
                "email": email.as_str(),
                "password": password,
                "data": { "full_name": full_name },
            }));
        let body = self.send(request).await?;

        let value: serde_json::Value = parse_body(&body)?;
        if value.get("access_token").is_some() {
            let session: AuthSession = serde_json::from_value(value)?;
            info!(user_id = %session.user.id, "Account created");
            Ok(SignUpOutcome::SignedIn(session.stamped()))
        } else {
            // Without a session the body is the user, or wraps it
            let user = value.get("user").cloned().unwrap_or(value);
            let user: AuthUser = serde_json::from_value(user)?;
            info!(user_id = %user.id, "Account created, confirmation pending");
            Ok(SignUpOutcome::ConfirmationRequired(user))
        }
    }

    /// # Errors
    ///
    /// Returns `BackendError::Api` for wrong credentials or an unconfirmed email.
    #[instrument(skip(self, password))]
    pub async fn sign_in_with_password(&self, email: &Email, password: &str) -> Result<AuthSession, BackendError> {
        self.token_grant(
            "password",
            &json!({ "email": email.as_str(), "password": password }),
        )
        .await
    }

    /// Trade a refresh token for a new session.
    ///
    /// # Errors
    ///
    /// Returns an error if the refresh token was revoked or already used.
    #[instrument(skip_all)]
    pub async fn refresh_session(&self, refresh_token: &str) -> Result<AuthSession, BackendError> {
        self.token_grant("refresh_token", &json!({ "refresh_token": refresh_token }))
            .await
    }

    /// Revoke the session's refresh tokens.
    ///
    /// # Errors
    ///
    /// Returns an error if the auth service rejects the call.
    #[instrument(skip_all)]
    pub async fn sign_out(&self, access_token: &str) -> Result<(), BackendError> {
        let url = self.auth_endpoint("logout");
        let request = self.request(Method::POST, &url, Auth::User(access_token))?;
        self.send(request).await?;
        Ok(())
    }

    /// The account behind an access token.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::Unauthorized` for an invalid or expired token.
    #[instrument(skip_all)]
    pub async fn get_user(&self, access_token: &str) -> Result<AuthUser, BackendError> {
        let url = self.auth_endpoint("user");
        let request = self.request(Method::GET, &url, Auth::User(access_token))?;
        let body = self.send(request).await?;
        parse_body(&body)
    }

    /// Email a password reset link that lands on `redirect_to`.
    ///
    /// # Errors
    ///
    /// Returns an error if the auth service rejects the call.
    #[instrument(skip(self, pkce))]
    pub async fn reset_password_for_email(
        &self,
        email: &Email,
        redirect_to: &str,
        pkce: &Pkce,
    ) -> Result<(), BackendError> {
        let url = self.auth_endpoint("recover");
        let request = self
            .request(Method::POST, &url, Auth::Anon)?
            .query(&[("redirect_to", redirect_to)])
            .json(&json!({
                "email": email.as_str(),
                "code_challenge": pkce.challenge,
                "code_challenge_method": "s256",
            }));
        self.send(request).await?;
        Ok(())
    }

    /// Set a new password for the signed-in shopper.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::Api` if the password is rejected.
    #[instrument(skip_all)]
    pub async fn update_password(&self, access_token: &str, new_password: &str) -> Result<AuthUser, BackendError> {
        let url = self.auth_endpoint("user");
        let request = self
            .request(Method::PUT, &url, Auth::User(access_token))?
            .json(&json!({ "password": new_password }));
        let body = self.send(request).await?;
        parse_body(&body)
    }

    /// Where to send the browser to start Google sign-in.
    #[must_use]
    pub fn google_authorize_url(&self, redirect_to: &str, pkce: &Pkce) -> String {
        format!(
            "{}?provider=google&redirect_to={}&code_challenge={}&code_challenge_method=s256",
            self.auth_endpoint("authorize"),
            urlencoding::encode(redirect_to),
            urlencoding::encode(&pkce.challenge),
        )
    }

    /// Finish a PKCE flow (Google sign-in or password recovery).
    ///
    /// # Errors
    ///
    /// Returns an error if the code is unknown, expired or the verifier
    /// doesn't match.
    #[instrument(skip_all)]
    pub async fn exchange_code_for_session(&self, auth_code: &str, code_verifier: &str) -> Result<AuthSession, BackendError> {
        self.token_grant(
            "pkce",
            &json!({ "auth_code": auth_code, "code_verifier": code_verifier }),
        )
        .await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::extract::Query as QueryParams;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use serde_json::Value;
    use std::collections::HashMap;

    use super::*;
    use crate::backend::testing::{spawn_backend, test_client};

    const USER: &str = "5a1c2e7d-6b9f-4e3a-9c1d-8f7e6d5c4b3a";

    fn session_body() -> Value {
        json!({
            "access_token": "access-1",
            "token_type": "bearer",
            "expires_in": 3600,
            "refresh_token": "refresh-1",
            "user": { "id": USER, "email": "meera@example.com", "user_metadata": { "full_name": "Meera Iyer" } }
        })
    }

    fn email() -> Email {
        Email::parse("meera@example.com").unwrap()
    }

    #[test]
    fn test_pkce_challenge() {
        // RFC 7636 appendix B
        let pkce = Pkce::from_verifier("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk".to_string());
        assert_eq!(pkce.challenge, "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM");

        let fresh = Pkce::generate();
        assert_eq!(fresh.verifier.len(), 64);
        assert_ne!(fresh.verifier, Pkce::generate().verifier);
    }

    #[test]
    fn test_session_expiry() {
        let mut session: AuthSession = serde_json::from_value(session_body()).unwrap();
        session = session.stamped();
        assert!(!session.is_expired());

        session.expires_at = Some(Utc::now().timestamp() + 30);
        assert!(session.is_expired());
    }

    #[test]
    fn test_display_name() {
        let session: AuthSession = serde_json::from_value(session_body()).unwrap();
        assert_eq!(session.user.display_name(), "Meera Iyer");

        let bare = AuthUser {
            id: USER.parse().unwrap(),
            email: Some("meera@example.com".into()),
            user_metadata: UserMetadata::default(),
        };
        assert_eq!(bare.display_name(), "meera");
    }

    #[tokio::test]
    async fn test_password_sign_in() {
        let app = Router::new().route(
            "/auth/v1/token",
            post(
                |QueryParams(params): QueryParams<HashMap<String, String>>, Json(body): Json<Value>| async move {
                    assert_eq!(params.get("grant_type").map(String::as_str), Some("password"));
                    if body["password"] == "correct horse" {
                        (StatusCode::OK, Json(session_body()))
                    } else {
                        (
                            StatusCode::BAD_REQUEST,
                            Json(json!({"code": 400, "error_code": "invalid_credentials", "msg": "Invalid login credentials"})),
                        )
                    }
                },
            ),
        );
        let client = test_client(spawn_backend(app).await);

        let session = client.sign_in_with_password(&email(), "correct horse").await.unwrap();
        assert_eq!(session.access_token, "access-1");
        assert!(session.expires_at.is_some());

        let err = client.sign_in_with_password(&email(), "wrong").await.unwrap_err();
        assert!(matches!(
            err,
            BackendError::Api { code: Some(ref c), ref message, .. }
                if c == "invalid_credentials" && message == "Invalid login credentials"
        ));
    }

    #[tokio::test]
    async fn test_sign_up_needing_confirmation() {
        let app = Router::new().route(
            "/auth/v1/signup",
            post(|Json(body): Json<Value>| async move {
                assert_eq!(body["data"]["full_name"], "Meera Iyer");
                Json(json!({ "id": USER, "email": "meera@example.com", "user_metadata": {} }))
            }),
        );
        let client = test_client(spawn_backend(app).await);
        let outcome = client
            .sign_up(&email(), "correct horse", Some("Meera Iyer"), "http://localhost/auth/login")
            .await
            .unwrap();
        assert!(matches!(outcome, SignUpOutcome::ConfirmationRequired(u) if u.id.to_string() == USER));
    }

    #[tokio::test]
    async fn test_sign_up_signed_in() {
        let app = Router::new().route("/auth/v1/signup", post(|| async { Json(session_body()) }));
        let client = test_client(spawn_backend(app).await);
        let outcome = client
            .sign_up(&email(), "correct horse", None, "http://localhost/auth/login")
            .await
            .unwrap();
        assert!(matches!(outcome, SignUpOutcome::SignedIn(s) if s.refresh_token == "refresh-1"));
    }

    #[tokio::test]
    async fn test_get_user_sends_access_token() {
        let app = Router::new().route(
            "/auth/v1/user",
            get(|headers: HeaderMap| async move {
                let auth = headers.get("authorization").and_then(|v| v.to_str().ok());
                if auth == Some("Bearer access-1") {
                    (StatusCode::OK, Json(json!({ "id": USER, "email": "meera@example.com" })))
                } else {
                    (StatusCode::UNAUTHORIZED, Json(json!({"msg": "invalid JWT"})))
                }
            }),
        );
        let client = test_client(spawn_backend(app).await);
        let user = client.get_user("access-1").await.unwrap();
        assert_eq!(user.email.as_deref(), Some("meera@example.com"));

        let err = client.get_user("stale").await.unwrap_err();
        assert!(matches!(err, BackendError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_recover_sends_challenge() {
        let app = Router::new().route(
            "/auth/v1/recover",
            post(|Json(body): Json<Value>| async move {
                assert_eq!(body["code_challenge_method"], "s256");
                assert!(body["code_challenge"].as_str().is_some_and(|c| !c.is_empty()));
                Json(json!({}))
            }),
        );
        let client = test_client(spawn_backend(app).await);
        client
            .reset_password_for_email(&email(), "http://localhost/auth/reset-password", &Pkce::generate())
            .await
            .unwrap();
    }

    #[test]
    fn test_google_authorize_url() {
        let client = test_client("https://abc.supabase.co".to_string());
        let pkce = Pkce::from_verifier("verifier".to_string());
        let url = client.google_authorize_url("https://zeaver.in/auth/callback", &pkce);
        assert!(url.starts_with("https://abc.supabase.co/auth/v1/authorize?provider=google&"));
        assert!(url.contains("redirect_to=https%3A%2F%2Fzeaver.in%2Fauth%2Fcallback"));
        assert!(url.contains(&format!("code_challenge={}", pkce.challenge)));
    }
}
