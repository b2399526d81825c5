// Copyright 2026-Present the hec-sender authors.
// SPDX-License-Identifier: Apache-2.0

//! Delivery engine: wire serialization, the HTTP exchange, and retry with
//! exponential backoff.
//!
//! A batch is serialized as newline-delimited JSON documents, one per
//! record, in input order. The exchange retries transport failures and
//! transient statuses (5xx, 429, 408) up to the configured attempt budget,
//! waiting `backoff_factor * 2^(attempt-1)` between attempts; every other
//! non-2xx status is terminal on first sight. The per-attempt timeout lives
//! on the HTTP client itself.

use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use flate2::write::GzEncoder;
use flate2::Compression;
use reqwest::header::{AUTHORIZATION, CONTENT_ENCODING, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use tokio::time::sleep;
use tracing::{debug, error, warn};

use crate::config::{ChannelLocation, Config};
use crate::error::SenderError;
use crate::event::Record;
use crate::http;

pub(crate) const EVENT_PATH: &str = "/services/collector/event";
pub(crate) const ACK_PATH: &str = "/services/collector/ack";
pub(crate) const HEALTH_PATH: &str = "/services/collector/health";

const CHANNEL_HEADER: &str = "X-Splunk-Request-Channel";

/// Outcome of one accepted client operation.
#[derive(Debug, Clone)]
pub enum DeliveryOutcome {
    /// A batch went out and the endpoint answered in the 200 class.
    Delivered(Delivery),
    /// Records were buffered; no network call was made.
    Buffered { pending: usize },
    /// Nothing to do: empty flush, or a send whose events were all skipped.
    Noop,
}

/// Successful delivery summary.
#[derive(Debug, Clone)]
pub struct Delivery {
    /// HTTP status of the accepted response.
    pub status: u16,
    /// Acknowledgement id, when the endpoint issued one.
    pub ack_id: Option<u64>,
    /// Parsed response body (`Value::Null` when the body was not JSON).
    pub body: Value,
}

/// Retry schedule: attempt `n` (1-based) sleeps `backoff_factor * 2^(n-1)`
/// before the next attempt.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RetryPolicy {
    pub(crate) max_attempts: usize,
    pub(crate) backoff_factor: f64,
}

impl RetryPolicy {
    pub(crate) fn delay(&self, attempt: usize) -> Duration {
        // Exponent capped so powi cannot overflow; with any realistic
        // attempt budget the cap is never reached.
        let exponent = attempt.saturating_sub(1).min(32) as i32;
        Duration::from_secs_f64((self.backoff_factor * 2f64.powi(exponent)).max(0.0))
    }
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Disposition {
    Retry,
    Terminal,
}

/// Classifies a non-2xx status: server errors and transient request
/// conditions (rate limiting, request timeout) are retried, the rest of the
/// client-error class is terminal.
pub(crate) fn classify_status(status: StatusCode) -> Disposition {
    if status.is_server_error()
        || status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
    {
        Disposition::Retry
    } else {
        Disposition::Terminal
    }
}

/// Event-submission response body.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct HecResponse {
    pub(crate) code: Option<i64>,
    #[serde(rename = "ackId")]
    pub(crate) ack_id: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct AckStatusResponse {
    acks: HashMap<String, bool>,
}

/// Serializes a batch as newline-delimited JSON documents, input order
/// preserved.
pub(crate) fn serialize_batch(records: &[Record]) -> Result<String, SenderError> {
    let mut lines = Vec::with_capacity(records.len());
    for record in records {
        lines.push(serde_json::to_string(record)?);
    }
    Ok(lines.join("\n"))
}

fn gzip(payload: &[u8]) -> Result<Vec<u8>, SenderError> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(payload)?;
    Ok(encoder.finish()?)
}

/// Owns the HTTP client and performs all exchanges with the endpoint.
#[derive(Debug, Clone)]
pub(crate) struct Transport {
    client: reqwest::Client,
    config: Arc<Config>,
    retry: RetryPolicy,
}

impl Transport {
    pub(crate) fn new(config: Arc<Config>) -> Result<Self, SenderError> {
        let client = http::build_client(&config)?;
        let retry = RetryPolicy {
            max_attempts: config.retry_count,
            backoff_factor: config.retry_backoff,
        };
        Ok(Self {
            client,
            config,
            retry,
        })
    }

    /// Delivers one batch and returns the parsed response summary.
    pub(crate) async fn send_events(&self, records: &[Record]) -> Result<Delivery, SenderError> {
        let payload = serialize_batch(records)?;
        debug!(
            records = records.len(),
            bytes = payload.len(),
            "delivering event batch"
        );
        if self.config.enable_debug {
            debug!(payload = %payload, "event batch payload");
        }

        let body = if self.config.use_compression {
            gzip(payload.as_bytes())?
        } else {
            payload.into_bytes()
        };

        let url = self.event_url();
        let response = self
            .execute(|| {
                let mut request = self
                    .client
                    .post(&url)
                    .header(AUTHORIZATION, self.auth_header())
                    .header(CONTENT_TYPE, "application/json");
                if self.config.use_compression {
                    request = request.header(CONTENT_ENCODING, "gzip");
                }
                self.apply_channel(request).body(body.clone())
            })
            .await?;

        let status = response.status().as_u16();
        let body: Value = response.json().await.unwrap_or(Value::Null);
        let parsed: HecResponse = serde_json::from_value(body.clone()).unwrap_or_default();
        if let Some(code) = parsed.code {
            if let Some(message) = splunk_status_message(status, code) {
                debug!(status, code, message, "endpoint response");
            }
        }
        if let Some(ack_id) = parsed.ack_id {
            debug!(ack_id, "endpoint issued acknowledgement id");
        }
        Ok(Delivery {
            status,
            ack_id: parsed.ack_id,
            body,
        })
    }

    /// Queries indexing status for the given acknowledgement ids.
    pub(crate) async fn check_acks(
        &self,
        ack_ids: &[u64],
    ) -> Result<HashMap<u64, bool>, SenderError> {
        if self.config.channel.is_none() {
            return Err(SenderError::AckNotEnabled);
        }
        let payload = serde_json::json!({ "acks": ack_ids });
        let url = self.ack_url();
        let response = self
            .execute(|| {
                let request = self
                    .client
                    .post(&url)
                    .header(AUTHORIZATION, self.auth_header());
                self.apply_channel(request).json(&payload)
            })
            .await?;

        let parsed: AckStatusResponse = response.json().await?;
        let mut statuses = HashMap::with_capacity(parsed.acks.len());
        for (id, indexed) in parsed.acks {
            match id.parse::<u64>() {
                Ok(id) => {
                    statuses.insert(id, indexed);
                }
                Err(_) => warn!(id = %id, "ignoring non-numeric ack id in response"),
            }
        }
        Ok(statuses)
    }

    /// Single-attempt liveness probe. 2xx means healthy; the documented
    /// unhealthy statuses are logged with their meanings.
    pub(crate) async fn health(&self) -> Result<bool, SenderError> {
        let url = self.health_url();
        debug!(url = %url, "probing endpoint health");
        let response = self
            .client
            .get(&url)
            .header(AUTHORIZATION, self.auth_header())
            .send()
            .await?;
        let status = response.status().as_u16();
        let healthy = (200..300).contains(&status);
        match health_status_message(status) {
            Some(message) if healthy => debug!(status, message, "health probe"),
            Some(message) => error!(status, message, "health probe"),
            None => warn!(status, "health probe returned unrecognized status"),
        }
        Ok(healthy)
    }

    /// Sends a request with the retry/backoff policy applied. Returns the
    /// response only for 2xx statuses; transient failures are retried until
    /// the attempt budget runs out, terminal statuses fail immediately.
    async fn execute<F>(&self, build: F) -> Result<reqwest::Response, SenderError>
    where
        F: Fn() -> reqwest::RequestBuilder,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match build().send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(response);
                    }
                    let retryable = classify_status(status) == Disposition::Retry;
                    if retryable && attempt < self.retry.max_attempts {
                        let delay = self.retry.delay(attempt);
                        warn!(
                            status = status.as_u16(),
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            "transient endpoint error, backing off"
                        );
                        sleep(delay).await;
                        continue;
                    }
                    let status = status.as_u16();
                    let body = response.text().await.unwrap_or_default();
                    log_rejection(status, &body);
                    return Err(SenderError::Rejected { status, body });
                }
                Err(err) => {
                    if attempt < self.retry.max_attempts {
                        let delay = self.retry.delay(attempt);
                        warn!(
                            error = %err,
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            "transport error, backing off"
                        );
                        sleep(delay).await;
                        continue;
                    }
                    error!(error = %err, attempts = attempt, "delivery failed after all attempts");
                    return Err(SenderError::Transport(err));
                }
            }
        }
    }

    fn base_url(&self) -> String {
        format!(
            "{}://{}:{}",
            self.config.protocol, self.config.endpoint, self.config.port
        )
    }

    fn event_url(&self) -> String {
        let mut url = format!("{}{EVENT_PATH}", self.base_url());
        if let Some(version) = &self.config.api_version {
            url.push('/');
            url.push_str(version);
        }
        self.with_url_channel(url)
    }

    // The ack path is unversioned.
    fn ack_url(&self) -> String {
        self.with_url_channel(format!("{}{ACK_PATH}", self.base_url()))
    }

    fn health_url(&self) -> String {
        format!("{}{HEALTH_PATH}", self.base_url())
    }

    fn with_url_channel(&self, mut url: String) -> String {
        if self.config.channel_location == ChannelLocation::Url {
            if let Some(channel) = &self.config.channel {
                url.push_str("?channel=");
                url.push_str(channel);
            }
        }
        url
    }

    fn auth_header(&self) -> String {
        format!("Splunk {}", self.config.token)
    }

    fn apply_channel(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match (&self.config.channel, self.config.channel_location) {
            (Some(channel), ChannelLocation::Header) => request.header(CHANNEL_HEADER, channel),
            _ => request,
        }
    }
}

fn log_rejection(status: u16, body: &str) {
    let code = serde_json::from_str::<HecResponse>(body)
        .ok()
        .and_then(|response| response.code);
    match code.and_then(|code| splunk_status_message(status, code)) {
        Some(message) => error!(status, message, "endpoint rejected request"),
        None => error!(status, body = %body, "endpoint rejected request"),
    }
}

/// Documented endpoint status codes, keyed by HTTP status and the `code`
/// field of the response body.
fn splunk_status_message(http_status: u16, code: i64) -> Option<&'static str> {
    match (http_status, code) {
        (200, 0) => Some("Success"),
        (400, 5) => Some("No data"),
        (400, 6) => Some("Invalid data format"),
        (400, 7) => Some("Incorrect index"),
        (400, 10) => Some("Data channel is missing"),
        (400, 11) => Some("Invalid data channel"),
        (400, 12) => Some("Event field is required"),
        (400, 13) => Some("Event field cannot be blank"),
        (400, 14) => Some("ACK is disabled"),
        (400, 15) => Some("Error in handling indexed fields"),
        (400, 16) => Some("Query string authorization is not enabled"),
        (401, 2) => Some("Token is required"),
        (401, 3) => Some("Invalid authorization"),
        (403, 1) => Some("Token disabled"),
        (403, 4) => Some("Invalid token"),
        (500, 8) => Some("Internal server error"),
        (503, 9) => Some("Server is busy"),
        _ => None,
    }
}

/// Documented health-probe statuses.
fn health_status_message(status: u16) -> Option<&'static str> {
    match status {
        200 => Some("HEC is available and accepting input"),
        400 => Some("Invalid HEC token"),
        503 => Some("HEC is unhealthy, queues are full"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Number};

    fn test_config() -> Config {
        Config {
            endpoint: "splunk.example.com".to_string(),
            token: "secret-token".to_string(),
            protocol: crate::config::Protocol::Https,
            ..Default::default()
        }
    }

    fn record(label: &str) -> Record {
        Record {
            time: Number::from(1_700_000_000),
            host: "host".to_string(),
            source: "source".to_string(),
            sourcetype: "generic_single_line".to_string(),
            index: "main".to_string(),
            event: json!(label),
            fields: None,
        }
    }

    #[test]
    fn test_retry_policy_delay_sequence() {
        // Backoff factor B yields B*2^0, B*2^1, ... between attempts.
        let policy = RetryPolicy {
            max_attempts: 5,
            backoff_factor: 0.5,
        };
        assert_eq!(policy.delay(1), Duration::from_secs_f64(0.5));
        assert_eq!(policy.delay(2), Duration::from_secs_f64(1.0));
        assert_eq!(policy.delay(3), Duration::from_secs_f64(2.0));
        assert_eq!(policy.delay(4), Duration::from_secs_f64(4.0));
    }

    #[test]
    fn test_retry_policy_zero_backoff() {
        let policy = RetryPolicy {
            max_attempts: 3,
            backoff_factor: 0.0,
        };
        assert_eq!(policy.delay(1), Duration::ZERO);
        assert_eq!(policy.delay(10), Duration::ZERO);
    }

    #[test]
    fn test_classify_status() {
        assert_eq!(
            classify_status(StatusCode::INTERNAL_SERVER_ERROR),
            Disposition::Retry
        );
        assert_eq!(classify_status(StatusCode::BAD_GATEWAY), Disposition::Retry);
        assert_eq!(
            classify_status(StatusCode::SERVICE_UNAVAILABLE),
            Disposition::Retry
        );
        assert_eq!(
            classify_status(StatusCode::TOO_MANY_REQUESTS),
            Disposition::Retry
        );
        assert_eq!(
            classify_status(StatusCode::REQUEST_TIMEOUT),
            Disposition::Retry
        );
        assert_eq!(
            classify_status(StatusCode::BAD_REQUEST),
            Disposition::Terminal
        );
        assert_eq!(
            classify_status(StatusCode::UNAUTHORIZED),
            Disposition::Terminal
        );
        assert_eq!(classify_status(StatusCode::FORBIDDEN), Disposition::Terminal);
    }

    #[test]
    fn test_serialize_batch_is_ordered_ndjson() {
        let batch = vec![record("one"), record("two"), record("three")];
        let payload = serialize_batch(&batch).unwrap();

        let lines: Vec<&str> = payload.split('\n').collect();
        assert_eq!(lines.len(), 3);
        for (line, label) in lines.iter().zip(["one", "two", "three"]) {
            let value: Value = serde_json::from_str(line).unwrap();
            assert_eq!(value["event"], json!(label));
        }
    }

    #[test]
    fn test_serialize_batch_empty() {
        assert_eq!(serialize_batch(&[]).unwrap(), "");
    }

    #[test]
    fn test_gzip_round_trip() {
        let payload = b"{\"event\":\"compress me\"}";
        let compressed = gzip(payload).unwrap();
        assert_ne!(compressed, payload);

        let mut decoder = flate2::read::GzDecoder::new(&compressed[..]);
        let mut decompressed = Vec::new();
        std::io::Read::read_to_end(&mut decoder, &mut decompressed).unwrap();
        assert_eq!(decompressed, payload);
    }

    #[test]
    fn test_event_url_with_version_and_url_channel() {
        let config = Config {
            api_version: Some("1.0".to_string()),
            channel: Some("11111111-2222-3333-4444-555555555555".to_string()),
            channel_location: ChannelLocation::Url,
            ..test_config()
        };
        let transport = Transport::new(Arc::new(config)).unwrap();

        assert_eq!(
            transport.event_url(),
            "https://splunk.example.com:8088/services/collector/event/1.0\
             ?channel=11111111-2222-3333-4444-555555555555"
        );
        // Version never applies to the ack path.
        assert_eq!(
            transport.ack_url(),
            "https://splunk.example.com:8088/services/collector/ack\
             ?channel=11111111-2222-3333-4444-555555555555"
        );
        // Health probes carry no channel.
        assert_eq!(
            transport.health_url(),
            "https://splunk.example.com:8088/services/collector/health"
        );
    }

    #[test]
    fn test_header_channel_leaves_urls_untouched() {
        let config = Config {
            channel: Some("guid".to_string()),
            ..test_config()
        };
        let transport = Transport::new(Arc::new(config)).unwrap();
        assert_eq!(
            transport.event_url(),
            "https://splunk.example.com:8088/services/collector/event"
        );
    }

    #[tokio::test]
    async fn test_check_acks_requires_channel() {
        let transport = Transport::new(Arc::new(test_config())).unwrap();
        let result = transport.check_acks(&[1, 2]).await;
        assert!(matches!(result, Err(SenderError::AckNotEnabled)));
    }

    #[test]
    fn test_splunk_status_messages() {
        assert_eq!(splunk_status_message(200, 0), Some("Success"));
        assert_eq!(splunk_status_message(400, 6), Some("Invalid data format"));
        assert_eq!(splunk_status_message(403, 4), Some("Invalid token"));
        assert_eq!(splunk_status_message(503, 9), Some("Server is busy"));
        assert_eq!(splunk_status_message(200, 99), None);
    }

    #[test]
    fn test_health_status_messages() {
        assert_eq!(
            health_status_message(200),
            Some("HEC is available and accepting input")
        );
        assert_eq!(health_status_message(400), Some("Invalid HEC token"));
        assert_eq!(
            health_status_message(503),
            Some("HEC is unhealthy, queues are full")
        );
        assert_eq!(health_status_message(418), None);
    }

    #[test]
    fn test_hec_response_parses_ack_id() {
        let parsed: HecResponse =
            serde_json::from_str("{\"text\":\"Success\",\"code\":0,\"ackId\":7}").unwrap();
        assert_eq!(parsed.code, Some(0));
        assert_eq!(parsed.ack_id, Some(7));
    }
}
