//! services/api/src/adapters/notifier.rs
//!
//! Adapters for the `NotificationService` port: a `reqwest` client that
//! invokes hosted functions over HTTP, and a log-only fallback for local runs.

use async_trait::async_trait;
use connection_hub_core::ports::{NotificationService, PortError, PortResult};
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Invokes hosted functions at `{base_url}/functions/v1/{name}`.
pub struct HttpFunctionNotifier {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpFunctionNotifier {
    pub fn new(base_url: &str, api_key: Option<String>) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn function_url(&self, function_name: &str) -> String {
        format!("{}/functions/v1/{}", self.base_url, function_name)
    }
}

#[async_trait]
impl NotificationService for HttpFunctionNotifier {
    async fn invoke(
        &self,
        function_name: &str,
        payload: serde_json::Value,
    ) -> PortResult<serde_json::Value> {
        let mut request = self.client.post(self.function_url(function_name)).json(&payload);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| PortError::Unexpected(format!("{} request failed: {}", function_name, e)))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        if !status.is_success() {
            return Err(PortError::Unexpected(format!(
                "{} returned {}: {}",
                function_name,
                status,
                String::from_utf8_lossy(&body)
            )));
        }
        debug!("Function {} returned {}.", function_name, status);

        if body.is_empty() {
            return Ok(serde_json::Value::Null);
        }
        serde_json::from_slice(&body)
            .map_err(|e| PortError::Unexpected(format!("{} returned invalid JSON: {}", function_name, e)))
    }
}

/// Logs the invocation instead of sending it.
#[derive(Default)]
pub struct LogNotifier;

#[async_trait]
impl NotificationService for LogNotifier {
    async fn invoke(
        &self,
        function_name: &str,
        payload: serde_json::Value,
    ) -> PortResult<serde_json::Value> {
        info!("No functions URL configured; skipping {}: {}", function_name, payload);
        Ok(serde_json::Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::HeaderMap, http::StatusCode, routing::post, Json, Router};
    use serde_json::json;

    async fn spawn(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn posts_payload_with_bearer_key() {
        let router = Router::new().route(
            "/functions/v1/send-booking-confirmation",
            post(|headers: HeaderMap, Json(body): Json<serde_json::Value>| async move {
                let auth = headers
                    .get("authorization")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string();
                Json(json!({ "auth": auth, "echo": body }))
            }),
        );
        let base = spawn(router).await;
        let notifier = HttpFunctionNotifier::new(&format!("{}/", base), Some("secret".into())).unwrap();

        let reply = notifier
            .invoke("send-booking-confirmation", json!({ "slot_id": "2025-01-06-0900" }))
            .await
            .unwrap();

        assert_eq!(reply["auth"], "Bearer secret");
        assert_eq!(reply["echo"]["slot_id"], "2025-01-06-0900");
    }

    #[tokio::test]
    async fn error_status_is_a_failure() {
        let router = Router::new().route(
            "/functions/v1/send-booking-confirmation",
            post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "mail provider down") }),
        );
        let base = spawn(router).await;
        let notifier = HttpFunctionNotifier::new(&base, None).unwrap();

        let err = notifier
            .invoke("send-booking-confirmation", json!({}))
            .await
            .unwrap_err();

        match err {
            PortError::Unexpected(message) => assert!(message.contains("mail provider down")),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_success_body_is_null() {
        let router = Router::new().route("/functions/v1/ping", post(|| async { StatusCode::NO_CONTENT }));
        let base = spawn(router).await;
        let notifier = HttpFunctionNotifier::new(&base, None).unwrap();

        assert_eq!(
            notifier.invoke("ping", json!({})).await.unwrap(),
            serde_json::Value::Null
        );
    }
}
