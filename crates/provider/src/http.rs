//! REST client for a remote serverless compute endpoint.
//!
//! Posts the job as `{"input": {...}}` to a single run endpoint using
//! [`reqwest`]. The endpoint's JSON reply is passed back untouched as the
//! job's dispatch info.
//!
//! No provider-level `webhook` is sent. The runner inside the job reports
//! to `input.callback_url` itself; a provider webhook would post its own
//! status envelope to the same route without the callback secret.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::ProviderError;
use crate::request::DispatchRequest;
use crate::ComputeProvider;

/// Default per-request timeout for the run endpoint.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client for one serverless run endpoint.
pub struct HttpProvider {
    client: reqwest::Client,
    endpoint_url: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl HttpProvider {
    /// Create a provider for `endpoint_url`, e.g. `https://host/v2/<id>/run`.
    pub fn new(endpoint_url: String) -> Self {
        Self::with_client(reqwest::Client::new(), endpoint_url)
    }

    /// Create a provider reusing an existing [`reqwest::Client`]
    /// (useful for connection pooling).
    pub fn with_client(client: reqwest::Client, endpoint_url: String) -> Self {
        Self {
            client,
            endpoint_url,
            api_key: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Send `Authorization: Bearer <api_key>` with every dispatch.
    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key.filter(|k| !k.is_empty());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn endpoint_url(&self) -> &str {
        &self.endpoint_url
    }

    /// The JSON body sent to the run endpoint.
    pub fn payload(request: &DispatchRequest) -> serde_json::Value {
        serde_json::json!({ "input": request })
    }

    // ---- private helpers ----

    /// Ensure the response has a success status code. Returns the
    /// response unchanged on success, or a [`ProviderError::Api`]
    /// containing the status and body text on failure.
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, ProviderError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ProviderError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Read a successful body as JSON. Bodies that are not JSON are
    /// recorded as `{"status": <code>}`.
    async fn parse_response(
        response: reqwest::Response,
    ) -> Result<serde_json::Value, ProviderError> {
        let response = Self::ensure_success(response).await?;
        let status = response.status().as_u16();
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes).unwrap_or_else(|_| serde_json::json!({ "status": status })))
    }
}

#[async_trait]
impl ComputeProvider for HttpProvider {
    async fn dispatch(&self, request: &DispatchRequest) -> Result<serde_json::Value, ProviderError> {
        let mut builder = self
            .client
            .post(&self.endpoint_url)
            .timeout(self.timeout)
            .json(&Self::payload(request));
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        tracing::debug!(
            job_id = %request.job_id,
            endpoint = %self.endpoint_url,
            "Posting job to compute provider",
        );

        let response = builder.send().await?;
        Self::parse_response(response).await
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_wraps_request_in_input_without_webhook() {
        let request = DispatchRequest {
            job_id: "E1".into(),
            folder_id: "F1".into(),
            event_name: "E1".into(),
            owner_id: "public".into(),
            callback_url: "http://coord/api/v1/callback".into(),
        };
        let payload = HttpProvider::payload(&request);
        assert_eq!(payload["input"]["drive_folder_id"], "F1");
        assert_eq!(payload["input"]["event_name"], "E1");
        assert_eq!(payload["input"]["owner_id"], "public");
        assert_eq!(payload["input"]["callback_url"], "http://coord/api/v1/callback");
        assert!(payload.get("webhook").is_none());
    }

    #[test]
    fn empty_api_key_is_ignored() {
        let provider = HttpProvider::new("http://x/run".into()).with_api_key(Some(String::new()));
        assert!(provider.api_key.is_none());
    }
}
