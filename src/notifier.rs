//! Best-effort delivery of article text to the classification endpoint.
//!
//! The notifier is called after an article has been upserted. Whatever
//! happens here is logged and reported back as a [`DeliveryOutcome`]; it is
//! never retried and never touches the store.

use reqwest::{Client, StatusCode};
use serde::Serialize;
use std::time::{Duration as StdDuration, Instant};
use tracing::{info, instrument, warn};

/// Default classification endpoint.
pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:8000/predict";

/// Default bound on a single delivery.
pub const DEFAULT_DELIVERY_TIMEOUT: StdDuration = StdDuration::from_secs(60);

/// JSON body expected by the endpoint.
#[derive(Debug, Serialize)]
struct DeliveryRequest<'a> {
    text: &'a str,
    url: &'a str,
}

/// What happened to one delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// The endpoint answered 200.
    Delivered,
    /// The endpoint answered with another status.
    Rejected { status: u16 },
    /// The request never got an answer (connect error, timeout).
    Failed,
}

impl DeliveryOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, DeliveryOutcome::Delivered)
    }
}

/// Posts article text to the classification endpoint.
#[derive(Debug, Clone)]
pub struct DeliveryNotifier {
    client: Client,
    endpoint: String,
    timeout: StdDuration,
}

impl DeliveryNotifier {
    pub fn new(client: Client, endpoint: impl Into<String>, timeout: StdDuration) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            timeout,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Send `content` for analysis. Never fails; see [`DeliveryOutcome`].
    #[instrument(level = "info", skip_all, fields(%url))]
    pub async fn notify(&self, content: &str, url: &str) -> DeliveryOutcome {
        let t0 = Instant::now();
        let body = DeliveryRequest { text: content, url };

        let response = self
            .client
            .post(&self.endpoint)
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await;
        let elapsed_ms = t0.elapsed().as_millis();

        match response {
            Ok(r) if r.status() == StatusCode::OK => {
                info!(elapsed_ms, "Analysis recorded");
                DeliveryOutcome::Delivered
            }
            Ok(r) => {
                let status = r.status().as_u16();
                let detail = r.text().await.unwrap_or_default();
                warn!(
                    status,
                    elapsed_ms,
                    response_preview = %truncate_for_log(&detail, 300),
                    "Analysis endpoint rejected article"
                );
                DeliveryOutcome::Rejected { status }
            }
            Err(e) => {
                warn!(elapsed_ms, error = %e, "Could not reach analysis endpoint");
                DeliveryOutcome::Failed
            }
        }
    }
}

/// Truncate a string for logging purposes.
///
/// Long strings are cut at a character boundary at or before `max` bytes
/// and get `"…(+N bytes)"` appended.
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…(+{} bytes)", &s[..end], s.len() - end)
}
