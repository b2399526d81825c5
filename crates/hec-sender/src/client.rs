// Copyright 2026-Present the hec-sender authors.
// SPDX-License-Identifier: Apache-2.0

//! The public client facade.
//!
//! [`HecSender`] wires the pipeline together: events are normalized, then
//! either delivered immediately (`max_buf_size == 0`) or appended to the
//! buffer, which flushes as a single ordered batch when capacity is reached
//! or on an explicit [`HecSender::flush`].
//!
//! All operations take `&mut self`, so one flush is in flight per instance
//! at a time and appends cannot interleave with a draining flush. Wrap the
//! sender in a mutex to share it across tasks; independent instances share
//! nothing.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::ack::AckTracker;
use crate::buffer::Buffer;
use crate::config::Config;
use crate::delivery::{Delivery, DeliveryOutcome, Transport};
use crate::error::{EventError, SenderError};
use crate::event::{self, RawEvent, Record};
use crate::hostname;

/// Result of one `send` call: the delivery outcome plus any events that
/// were skipped because they are not expressible as text or a mapping.
/// Skipped events never abort their siblings.
#[derive(Debug)]
pub struct SendOutcome {
    pub delivery: DeliveryOutcome,
    pub skipped: Vec<EventError>,
}

/// Client for a single HEC endpoint.
///
/// Delivery is best-effort: a failed flush surfaces its error and the batch
/// is discarded rather than re-queued, so a dead endpoint cannot grow the
/// buffer without bound. Buffered events that never reach capacity are lost
/// on drop unless the caller flushes first; both are caller responsibility.
#[derive(Debug)]
pub struct HecSender {
    config: Arc<Config>,
    transport: Transport,
    buffer: Buffer,
    acks: AckTracker,
    hostname: String,
}

impl HecSender {
    /// Builds a client from a validated configuration. The default host is
    /// resolved once, here, unless the configuration supplies one.
    pub fn new(config: Config) -> Result<Self, SenderError> {
        config.validate()?;
        let hostname = config.hostname.clone().unwrap_or_else(hostname::resolve);
        let config = Arc::new(config);
        let transport = Transport::new(Arc::clone(&config))?;
        let buffer = Buffer::new(config.max_buf_size);
        debug!(config = ?config, hostname = %hostname, "client initialized");
        Ok(Self {
            config,
            transport,
            buffer,
            acks: AckTracker::new(),
            hostname,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Ships one event or a sequence of events.
    ///
    /// Blocks until the HTTP exchange (including retries) completes when the
    /// call triggers a delivery; otherwise returns after buffering.
    pub async fn send(
        &mut self,
        events: impl Into<RawEvent>,
    ) -> Result<SendOutcome, SenderError> {
        self.dispatch(vec![events.into()], Vec::new()).await
    }

    /// Ships events supplied as a dynamic JSON value. Strings, objects, and
    /// (nested) arrays of those are accepted; other values are skipped and
    /// reported in the outcome without aborting their siblings.
    pub async fn send_value(&mut self, value: Value) -> Result<SendOutcome, SenderError> {
        let (events, skipped) = event::partition_value(value);
        self.dispatch(events, skipped).await
    }

    /// Delivers the buffered records as one batch. Flushing an empty buffer
    /// is a no-op and makes no network call.
    pub async fn flush(&mut self) -> Result<DeliveryOutcome, SenderError> {
        if self.buffer.is_empty() {
            debug!("flush requested on empty buffer, nothing to do");
            return Ok(DeliveryOutcome::Noop);
        }
        Ok(DeliveryOutcome::Delivered(self.flush_buffer().await?))
    }

    /// Queries indexing status for the given ack ids. Confirmed ids are
    /// removed from the pending set.
    pub async fn check_acks(
        &mut self,
        ack_ids: &[u64],
    ) -> Result<HashMap<u64, bool>, SenderError> {
        let statuses = self.transport.check_acks(ack_ids).await?;
        for (id, indexed) in &statuses {
            if *indexed {
                self.acks.resolve(*id);
            }
        }
        Ok(statuses)
    }

    /// Probes the endpoint health interface. `Ok(false)` means the endpoint
    /// answered but is not accepting input.
    pub async fn get_health(&self) -> Result<bool, SenderError> {
        self.transport.health().await
    }

    /// Ack ids issued to this client and not yet confirmed indexed.
    pub fn pending_acks(&self) -> Vec<u64> {
        self.acks.pending()
    }

    async fn dispatch(
        &mut self,
        events: Vec<RawEvent>,
        skipped: Vec<EventError>,
    ) -> Result<SendOutcome, SenderError> {
        let default_time = event::observed_time();
        let mut records = Vec::new();
        for raw in events {
            records.extend(event::normalize(
                raw,
                &self.config,
                &self.hostname,
                &default_time,
            ));
        }

        if records.is_empty() {
            return Ok(SendOutcome {
                delivery: DeliveryOutcome::Noop,
                skipped,
            });
        }

        if self.config.max_buf_size == 0 {
            let delivery = self.deliver(&records).await?;
            return Ok(SendOutcome {
                delivery: DeliveryOutcome::Delivered(delivery),
                skipped,
            });
        }

        let mut last_delivery = None;
        for record in records {
            if self.buffer.append(record) {
                last_delivery = Some(self.flush_buffer().await?);
            }
        }
        let delivery = match last_delivery {
            Some(delivery) => DeliveryOutcome::Delivered(delivery),
            None => DeliveryOutcome::Buffered {
                pending: self.buffer.len(),
            },
        };
        Ok(SendOutcome { delivery, skipped })
    }

    // The buffer is drained before the exchange: a failed delivery discards
    // the batch instead of re-queueing it.
    async fn flush_buffer(&mut self) -> Result<Delivery, SenderError> {
        let batch = self.buffer.drain();
        self.deliver(&batch).await
    }

    async fn deliver(&mut self, records: &[Record]) -> Result<Delivery, SenderError> {
        let delivery = self.transport.send_events(records).await?;
        if let Some(ack_id) = delivery.ack_id {
            self.acks.record(ack_id);
        }
        Ok(delivery)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> Config {
        Config {
            endpoint: "splunk.example.com".to_string(),
            token: "token".to_string(),
            hostname: Some("test-host".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_new_validates_config() {
        let config = Config {
            endpoint: String::new(),
            ..test_config()
        };
        assert!(matches!(
            HecSender::new(config),
            Err(SenderError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_new_uses_injected_hostname() {
        let sender = HecSender::new(test_config()).unwrap();
        assert_eq!(sender.hostname, "test-host");
    }

    #[tokio::test]
    async fn test_flush_on_empty_buffer_is_noop() {
        let config = Config {
            max_buf_size: 4,
            ..test_config()
        };
        let mut sender = HecSender::new(config).unwrap();
        // No mock endpoint exists; a network call here would error out.
        assert!(matches!(
            sender.flush().await,
            Ok(DeliveryOutcome::Noop)
        ));
    }

    #[tokio::test]
    async fn test_send_of_only_unsupported_events_is_noop() {
        let mut sender = HecSender::new(test_config()).unwrap();
        let outcome = sender
            .send_value(serde_json::json!([true, 17]))
            .await
            .unwrap();

        assert!(matches!(outcome.delivery, DeliveryOutcome::Noop));
        assert_eq!(outcome.skipped.len(), 2);
    }

    #[tokio::test]
    async fn test_buffered_send_reports_pending() {
        let config = Config {
            max_buf_size: 3,
            ..test_config()
        };
        let mut sender = HecSender::new(config).unwrap();
        let outcome = sender.send("first").await.unwrap();

        assert!(matches!(
            outcome.delivery,
            DeliveryOutcome::Buffered { pending: 1 }
        ));
    }

    #[tokio::test]
    async fn test_check_acks_without_channel_fails_locally() {
        let mut sender = HecSender::new(test_config()).unwrap();
        assert!(matches!(
            sender.check_acks(&[1]).await,
            Err(SenderError::AckNotEnabled)
        ));
    }
}
