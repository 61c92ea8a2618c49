//! HTTP plumbing shared by every backend call.
//!
//! Every request carries the `apikey` header. The bearer token is the anon
//! key for public reads, the shopper's access token for row-level-secured
//! tables, or the service key for maintenance commands.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use reqwest::{Method, RequestBuilder, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Serialize, de::DeserializeOwned};
use tracing::instrument;

use crate::backend::cache::CacheValue;
use crate::backend::query::Query;
use crate::backend::{ApiErrorBody, BackendError, NO_SINGLE_ROW, UNIQUE_VIOLATION};
use crate::config::BackendConfig;

/// Media type asking the REST API for a single object instead of an array.
const SINGLE_OBJECT: &str = "application/vnd.pgrst.object+json";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Credentials to send with a request.
#[derive(Debug, Clone, Copy)]
pub enum Auth<'a> {
    /// Public anon key only.
    Anon,
    /// A signed-in shopper's access token.
    User(&'a str),
    /// Service-role key. Bypasses row-level security.
    Service,
}

/// Client for the managed backend's REST and auth APIs.
///
/// Cheap to clone. Catalog reads are cached for 5 minutes.
#[derive(Clone)]
pub struct BackendClient {
    inner: Arc<BackendClientInner>,
}

struct BackendClientInner {
    client: reqwest::Client,
    rest_url: String,
    auth_url: String,
    anon_key: String,
    service_key: Option<SecretString>,
    cache: Cache<String, CacheValue>,
}

impl BackendClient {
    /// Create a new backend client.
    #[must_use]
    pub fn new(config: &BackendConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(1000)
            .time_to_live(Duration::from_secs(300)) // 5 minutes
            .build();

        let base = config.url.trim_end_matches('/');

        Self {
            inner: Arc::new(BackendClientInner {
                client: reqwest::Client::new(),
                rest_url: format!("{base}/rest/v1"),
                auth_url: format!("{base}/auth/v1"),
                anon_key: config.anon_key.clone(),
                service_key: config.service_role_key.clone(),
                cache,
            }),
        }
    }

    /// Base URL of the auth API, e.g. `https://xyz.supabase.co/auth/v1`.
    #[must_use]
    pub fn auth_url(&self) -> &str {
        &self.inner.auth_url
    }

    #[must_use]
    pub fn has_service_key(&self) -> bool {
        self.inner.service_key.is_some()
    }

    pub(crate) fn cache(&self) -> &Cache<String, CacheValue> {
        &self.inner.cache
    }

    /// Start a request with the right `apikey` and bearer headers.
    pub(crate) fn request(
        &self,
        method: Method,
        url: &str,
        auth: Auth<'_>,
    ) -> Result<RequestBuilder, BackendError> {
        let (apikey, bearer) = match auth {
            Auth::Anon => (self.inner.anon_key.as_str(), self.inner.anon_key.as_str()),
            Auth::User(token) => (self.inner.anon_key.as_str(), token),
            Auth::Service => {
                let key = self
                    .inner
                    .service_key
                    .as_ref()
                    .ok_or(BackendError::MissingServiceKey)?
                    .expose_secret();
                (key, key)
            }
        };

        Ok(self
            .inner
            .client
            .request(method, url)
            .timeout(REQUEST_TIMEOUT)
            .header("apikey", apikey)
            .bearer_auth(bearer))
    }

    /// Send a request and return the body of a successful response.
    pub(crate) async fn send(&self, request: RequestBuilder) -> Result<String, BackendError> {
        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(1);
            return Err(BackendError::RateLimited(retry_after));
        }

        // Get response body as text first for better error diagnostics
        let body = response.text().await?;

        if !status.is_success() {
            return Err(error_from_response(status, &body));
        }

        Ok(body)
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/{table}", self.inner.rest_url)
    }

    // =========================================================================
    // REST Operations
    // =========================================================================

    /// Fetch every row matching a query.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or rows don't match `T`.
    #[instrument(skip(self, query, auth), fields(table = %query.table_name()))]
    pub async fn fetch_all<T: DeserializeOwned>(
        &self,
        query: &Query,
        auth: Auth<'_>,
    ) -> Result<Vec<T>, BackendError> {
        let request = self
            .request(Method::GET, &self.table_url(query.table_name()), auth)?
            .query(query.params());
        let body = self.send(request).await?;
        parse_body(&body)
    }

    /// Fetch exactly one row.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::NotFound` when no row (or more than one) matches.
    #[instrument(skip(self, query, auth), fields(table = %query.table_name()))]
    pub async fn fetch_one<T: DeserializeOwned>(
        &self,
        query: &Query,
        auth: Auth<'_>,
    ) -> Result<T, BackendError> {
        let request = self
            .request(Method::GET, &self.table_url(query.table_name()), auth)?
            .header("Accept", SINGLE_OBJECT)
            .query(query.params());
        let body = self.send(request).await.map_err(|e| match e {
            BackendError::NotFound(_) => {
                BackendError::NotFound(format!("{} row", query.table_name()))
            }
            other => other,
        })?;
        parse_body(&body)
    }

    /// Fetch the first matching row, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn fetch_maybe<T: DeserializeOwned>(
        &self,
        query: &Query,
        auth: Auth<'_>,
    ) -> Result<Option<T>, BackendError> {
        let rows = self.fetch_all(&query.clone().limit(1), auth).await?;
        Ok(rows.into_iter().next())
    }

    /// Insert one row and return it as stored.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::Conflict` on a unique violation.
    #[instrument(skip(self, row, auth))]
    pub async fn insert<T, B>(&self, table: &str, row: &B, auth: Auth<'_>) -> Result<T, BackendError>
    where
        T: DeserializeOwned,
        B: Serialize + Sync,
    {
        let request = self
            .request(Method::POST, &self.table_url(table), auth)?
            .header("Prefer", "return=representation")
            .header("Accept", SINGLE_OBJECT)
            .json(row);
        let body = self.send(request).await?;
        parse_body(&body)
    }

    /// Insert many rows without reading them back.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert is rejected.
    #[instrument(skip(self, rows, auth), fields(count = rows.len()))]
    pub async fn insert_many<B>(&self, table: &str, rows: &[B], auth: Auth<'_>) -> Result<(), BackendError>
    where
        B: Serialize + Sync,
    {
        if rows.is_empty() {
            return Ok(());
        }
        let request = self
            .request(Method::POST, &self.table_url(table), auth)?
            .header("Prefer", "return=minimal")
            .json(rows);
        self.send(request).await?;
        Ok(())
    }

    /// Patch matching rows and return them as stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the update is rejected.
    #[instrument(skip(self, query, patch, auth), fields(table = %query.table_name()))]
    pub async fn update<T, B>(&self, query: &Query, patch: &B, auth: Auth<'_>) -> Result<Vec<T>, BackendError>
    where
        T: DeserializeOwned,
        B: Serialize + Sync,
    {
        let request = self
            .request(Method::PATCH, &self.table_url(query.table_name()), auth)?
            .header("Prefer", "return=representation")
            .query(query.params())
            .json(patch);
        let body = self.send(request).await?;
        parse_body(&body)
    }

    /// Delete matching rows.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete is rejected.
    #[instrument(skip(self, query, auth), fields(table = %query.table_name()))]
    pub async fn delete(&self, query: &Query, auth: Auth<'_>) -> Result<(), BackendError> {
        let request = self
            .request(Method::DELETE, &self.table_url(query.table_name()), auth)?
            .header("Prefer", "return=minimal")
            .query(query.params());
        self.send(request).await?;
        Ok(())
    }

    /// Call a database function.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails or the result doesn't match `T`.
    #[instrument(skip(self, args, auth))]
    pub async fn rpc<T, B>(&self, function: &str, args: &B, auth: Auth<'_>) -> Result<T, BackendError>
    where
        T: DeserializeOwned,
        B: Serialize + Sync,
    {
        let url = format!("{}/rpc/{function}", self.inner.rest_url);
        let request = self.request(Method::POST, &url, auth)?.json(args);
        let body = self.send(request).await?;
        // Void functions answer with an empty body
        if body.trim().is_empty() {
            return parse_body("null");
        }
        parse_body(&body)
    }
}

/// Parse a JSON body, logging a prefix of it on failure.
pub(crate) fn parse_body<T: DeserializeOwned>(body: &str) -> Result<T, BackendError> {
    serde_json::from_str(body).map_err(|e| {
        tracing::error!(
            error = %e,
            body = %body.chars().take(500).collect::<String>(),
            "Failed to parse backend response"
        );
        BackendError::Parse(e)
    })
}

/// Map a non-success response onto a `BackendError`.
pub(crate) fn error_from_response(status: StatusCode, body: &str) -> BackendError {
    let parsed = ApiErrorBody::parse(body);
    let code = parsed.code();
    let message = parsed.message();

    match (status, code.as_deref()) {
        (StatusCode::NOT_ACCEPTABLE, _) | (_, Some(NO_SINGLE_ROW)) => BackendError::NotFound(message),
        (StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN, _) => BackendError::Unauthorized(message),
        (_, Some(UNIQUE_VIOLATION)) | (StatusCode::CONFLICT, _) => BackendError::Conflict(message),
        _ => {
            if status.is_server_error() {
                tracing::error!(
                    status = %status,
                    body = %body.chars().take(500).collect::<String>(),
                    "Backend returned server error"
                );
            } else {
                tracing::warn!(status = %status, code = ?code, message = %message, "Backend rejected request");
            }
            BackendError::Api {
                status: status.as_u16(),
                code,
                message,
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::Json;
    use axum::Router;
    use axum::http::HeaderMap;
    use axum::routing::{get, post};
    use serde_json::{Value, json};

    use super::*;
    use crate::backend::testing::{spawn_backend, test_client};

    #[test]
    fn test_error_mapping() {
        assert!(matches!(
            error_from_response(StatusCode::NOT_ACCEPTABLE, "{}"),
            BackendError::NotFound(_)
        ));
        assert!(matches!(
            error_from_response(
                StatusCode::BAD_REQUEST,
                r#"{"code":"PGRST116","message":"JSON object requested, multiple (or no) rows returned"}"#
            ),
            BackendError::NotFound(_)
        ));
        assert!(matches!(
            error_from_response(StatusCode::CONFLICT, r#"{"code":"23505","message":"dup"}"#),
            BackendError::Conflict(_)
        ));
        assert!(matches!(
            error_from_response(StatusCode::UNAUTHORIZED, r#"{"message":"JWT expired"}"#),
            BackendError::Unauthorized(m) if m == "JWT expired"
        ));
        assert!(matches!(
            error_from_response(StatusCode::BAD_REQUEST, r#"{"code":"22P02","message":"bad uuid"}"#),
            BackendError::Api { status: 400, code: Some(c), .. } if c == "22P02"
        ));
    }

    #[tokio::test]
    async fn test_headers_for_each_auth_mode() {
        let app = Router::new().route(
            "/rest/v1/echo",
            get(|headers: HeaderMap| async move {
                Json(json!([{
                    "apikey": headers.get("apikey").and_then(|v| v.to_str().ok()),
                    "authorization": headers.get("authorization").and_then(|v| v.to_str().ok()),
                }]))
            }),
        );
        let client = test_client(spawn_backend(app).await);
        let q = Query::table("echo");

        let anon: Vec<Value> = client.fetch_all(&q, Auth::Anon).await.unwrap();
        assert_eq!(anon[0]["apikey"], "test-anon-key");
        assert_eq!(anon[0]["authorization"], "Bearer test-anon-key");

        let user: Vec<Value> = client.fetch_all(&q, Auth::User("user-jwt")).await.unwrap();
        assert_eq!(user[0]["apikey"], "test-anon-key");
        assert_eq!(user[0]["authorization"], "Bearer user-jwt");

        let service: Vec<Value> = client.fetch_all(&q, Auth::Service).await.unwrap();
        assert_eq!(service[0]["authorization"], "Bearer test-service-key");
    }

    #[tokio::test]
    async fn test_service_auth_without_key() {
        let config = BackendConfig {
            url: "http://127.0.0.1:9".to_string(),
            anon_key: "anon".to_string(),
            service_role_key: None,
        };
        let client = BackendClient::new(&config);
        let err = client
            .fetch_all::<Value>(&Query::table("orders"), Auth::Service)
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::MissingServiceKey));
    }

    #[tokio::test]
    async fn test_fetch_one_not_found() {
        let app = Router::new().route(
            "/rest/v1/products",
            get(|| async {
                (
                    StatusCode::NOT_ACCEPTABLE,
                    Json(json!({"code": "PGRST116", "message": "0 rows"})),
                )
            }),
        );
        let client = test_client(spawn_backend(app).await);
        let err = client
            .fetch_one::<Value>(&Query::table("products"), Auth::Anon)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_rate_limited_reads_retry_after() {
        let app = Router::new().route(
            "/rest/v1/products",
            get(|| async { (StatusCode::TOO_MANY_REQUESTS, [("Retry-After", "42")], "slow down") }),
        );
        let client = test_client(spawn_backend(app).await);
        let err = client
            .fetch_all::<Value>(&Query::table("products"), Auth::Anon)
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::RateLimited(42)));
    }

    #[tokio::test]
    async fn test_rpc_void_result() {
        let app = Router::new().route("/rest/v1/rpc/increment", post(|| async { "" }));
        let client = test_client(spawn_backend(app).await);
        let out: Option<Value> = client
            .rpc("increment", &json!({}), Auth::Anon)
            .await
            .unwrap();
        assert!(out.is_none());
    }
}
