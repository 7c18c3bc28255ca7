//! In-memory transport that records requests instead of sending them.

use std::{collections::HashMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use beagle_delivery::{DeliveryError, Transport};
use parking_lot::Mutex;
use reqwest::Request;
use serde_json::Value;
use tokio::sync::Semaphore;

use crate::events::DEFAULT_EVENT_TIMEOUT;

/// Captured copy of an outbound request.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    /// Upper-case HTTP method.
    pub method: String,
    /// Full URL including the query.
    pub url: String,
    /// Raw query string, if any.
    pub query: Option<String>,
    /// Headers with lower-case names.
    pub headers: HashMap<String, String>,
    /// Body bytes, if any.
    pub body: Option<Vec<u8>>,
}

impl RecordedRequest {
    fn capture(request: &Request) -> Self {
        let headers = request
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.to_string(), v.to_string())))
            .collect();

        Self {
            method: request.method().to_string(),
            url: request.url().to_string(),
            query: request.url().query().map(str::to_string),
            headers,
            body: request.body().and_then(|b| b.as_bytes()).map(<[u8]>::to_vec),
        }
    }

    /// Header value by lower-case name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    /// Body parsed as JSON.
    ///
    /// Panics if there is no body or it is not JSON.
    pub fn body_json(&self) -> Value {
        let body = self.body.as_deref().expect("request has no body");
        serde_json::from_slice(body).expect("request body is not JSON")
    }
}

#[derive(Debug, Default)]
struct Inner {
    requests: Mutex<Vec<RecordedRequest>>,
    failures: Mutex<HashMap<String, DeliveryError>>,
    default_failure: Mutex<Option<DeliveryError>>,
    gate: Option<Semaphore>,
}

/// Transport double.
///
/// Records each request, optionally fails by URL, and can be paused so
/// calls block until [`RecordingTransport::resume`]. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct RecordingTransport {
    inner: Arc<Inner>,
}

impl RecordingTransport {
    /// Creates a transport where every call succeeds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a transport whose calls block until `resume` is called.
    pub fn paused() -> Self {
        Self { inner: Arc::new(Inner { gate: Some(Semaphore::new(0)), ..Inner::default() }) }
    }

    /// Creates a transport where every call fails with `error`.
    pub fn failing(error: DeliveryError) -> Self {
        let transport = Self::new();
        *transport.inner.default_failure.lock() = Some(error);
        transport
    }

    /// Makes calls to `url` (without query) fail with `error`.
    pub fn fail_url(&self, url: impl Into<String>, error: DeliveryError) {
        self.inner.failures.lock().insert(url.into(), error);
    }

    /// Releases blocked and future calls of a paused transport.
    pub fn resume(&self) {
        if let Some(gate) = &self.inner.gate {
            gate.close();
        }
    }

    /// Requests recorded so far.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.inner.requests.lock().clone()
    }

    /// Number of calls started so far.
    pub fn request_count(&self) -> usize {
        self.inner.requests.lock().len()
    }

    /// Waits until at least `count` calls started.
    ///
    /// Panics after [`DEFAULT_EVENT_TIMEOUT`].
    pub async fn wait_for_requests(&self, count: usize) {
        let result = tokio::time::timeout(DEFAULT_EVENT_TIMEOUT, async {
            while self.request_count() < count {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await;

        assert!(
            result.is_ok(),
            "transport did not receive requests in time. Expected: {}, Actual: {}",
            count,
            self.request_count()
        );
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send(&self, request: Request) -> Result<(), DeliveryError> {
        let recorded = RecordedRequest::capture(&request);
        let mut base = request.url().clone();
        base.set_query(None);

        self.inner.requests.lock().push(recorded);

        if let Some(gate) = &self.inner.gate {
            // Closed once resumed; the error just means "go".
            let _ = gate.acquire().await;
        }

        if let Some(error) = self.inner.failures.lock().get(base.as_str()).cloned() {
            return Err(error);
        }
        match self.inner.default_failure.lock().clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}
