//! Delivery of the job result to the coordinator.

use std::time::Duration;

use pixeltrace_core::callback::{CallbackPayload, CALLBACK_SECRET_HEADER};

use crate::error::RunnerError;

/// Attempts before giving up on transport errors and 5xx responses.
pub const MAX_ATTEMPTS: u32 = 3;

/// Posts one [`CallbackPayload`] to the coordinator's callback URL.
pub struct CallbackClient {
    client: reqwest::Client,
    url: String,
    secret: Option<String>,
    /// Delay after attempt `n` is `backoff_unit * 2^n`.
    backoff_unit: Duration,
}

impl CallbackClient {
    pub fn new(url: String, secret: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url,
            secret,
            backoff_unit: Duration::from_secs(1),
        }
    }

    pub fn with_backoff_unit(mut self, unit: Duration) -> Self {
        self.backoff_unit = unit;
        self
    }

    /// Send `payload`, retrying transport failures and 5xx responses.
    ///
    /// A 4xx answer is final: the coordinator understood the request and
    /// refused it. Returns the accepting status code.
    pub async fn deliver(&self, payload: &CallbackPayload) -> Result<u16, RunnerError> {
        let mut attempt = 1;
        loop {
            let mut request = self.client.post(&self.url).json(payload);
            if let Some(secret) = &self.secret {
                request = request.header(CALLBACK_SECRET_HEADER, secret);
            }

            let retry_reason = match request.send().await {
                Ok(response) if response.status().is_success() => {
                    let status = response.status().as_u16();
                    tracing::info!(status, attempt, "Callback delivered");
                    return Ok(status);
                }
                Ok(response) => {
                    let status = response.status().as_u16();
                    let body = response.text().await.unwrap_or_default();
                    if status < 500 || attempt >= MAX_ATTEMPTS {
                        return Err(RunnerError::CallbackRejected { status, body });
                    }
                    format!("status {status}")
                }
                Err(e) => {
                    if attempt >= MAX_ATTEMPTS {
                        return Err(RunnerError::CallbackTransport {
                            attempts: attempt,
                            source: e,
                        });
                    }
                    e.to_string()
                }
            };

            let delay = self.backoff_unit * 2u32.pow(attempt);
            tracing::warn!(
                attempt,
                reason = %retry_reason,
                delay_ms = delay.as_millis() as u64,
                "Callback failed, retrying",
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}
