//! HTTP transport for subscriber notifications.
//!
//! The dispatcher only knows the [`Transport`] trait: one call in, success or
//! error out. [`HttpTransport`] is the reqwest implementation; request
//! timeouts live here, not in the dispatcher.

use std::{fmt, time::Duration};

use async_trait::async_trait;
use reqwest::Request;
use serde::{Deserialize, Serialize};
use tracing::{debug, info_span, warn, Instrument};

use crate::error::{DeliveryError, Result};

/// Performs one outbound call.
#[async_trait]
pub trait Transport: Send + Sync + fmt::Debug {
    /// Sends a fully built request.
    ///
    /// # Errors
    ///
    /// Returns `DeliveryError::Transport` when the call fails.
    async fn send(&self, request: Request) -> Result<()>;
}

/// Configuration for the HTTP transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Timeout for a whole request.
    pub timeout: Duration,
    /// User agent string for requests.
    pub user_agent: String,
    /// Maximum number of redirects to follow.
    pub max_redirects: u32,
    /// Whether to verify TLS certificates.
    pub verify_tls: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(crate::DEFAULT_TIMEOUT_SECONDS),
            user_agent: "Beagle-Notifier/1.0".to_string(),
            max_redirects: 3,
            verify_tls: true,
        }
    }
}

/// reqwest backed transport.
///
/// Any response outside 2xx counts as a failed delivery.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    config: ClientConfig,
}

impl HttpTransport {
    /// Creates a transport with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns `DeliveryError::Configuration` if the HTTP client cannot be
    /// built from the provided settings.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects as usize))
            .danger_accept_invalid_certs(!config.verify_tls)
            .build()
            .map_err(|e| {
                DeliveryError::configuration(format!("failed to build HTTP client: {e}"))
            })?;

        Ok(Self { client, config })
    }

    /// Creates a transport with default configuration.
    pub fn with_defaults() -> Result<Self> {
        Self::new(ClientConfig::default())
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: Request) -> Result<()> {
        let span = info_span!(
            "subscriber_call",
            method = %request.method(),
            url = %request.url(),
        );

        async move {
            let start_time = std::time::Instant::now();

            let response = match self.client.execute(request).await {
                Ok(response) => response,
                Err(e) => {
                    let duration = start_time.elapsed();
                    warn!(duration_ms = duration.as_millis(), "request failed: {}", e);

                    if e.is_timeout() {
                        return Err(DeliveryError::transport(format!(
                            "request timeout after {}s",
                            self.config.timeout.as_secs()
                        )));
                    }
                    if e.is_connect() {
                        return Err(DeliveryError::transport(format!("connection failed: {e}")));
                    }
                    return Err(DeliveryError::transport(e.to_string()));
                },
            };

            let status = response.status();
            debug!(
                status = status.as_u16(),
                duration_ms = start_time.elapsed().as_millis(),
                "received response"
            );

            if status.is_success() {
                Ok(())
            } else {
                Err(DeliveryError::http_status(status.as_u16()))
            }
        }
        .instrument(span)
        .await
    }
}
