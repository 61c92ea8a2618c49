//! In-process fake of the backend for client tests.

use axum::Router;
use secrecy::SecretString;
use tokio::net::TcpListener;

use crate::backend::BackendClient;
use crate::config::BackendConfig;

/// Serve `app` on an ephemeral local port and return its base URL.
pub async fn spawn_backend(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("fake backend");
    });
    format!("http://{addr}")
}

/// A client pointed at a fake backend, with both keys configured.
pub fn test_client(base_url: String) -> BackendClient {
    BackendClient::new(&BackendConfig {
        url: base_url,
        anon_key: "test-anon-key".to_string(),
        service_role_key: Some(SecretString::from("test-service-key")),
    })
}
