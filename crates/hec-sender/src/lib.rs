// Copyright 2026-Present the hec-sender authors.
// SPDX-License-Identifier: Apache-2.0

//! Event shipping to a Splunk HTTP Event Collector (HEC) endpoint.
//!
//! This crate normalizes raw application events (free text, structured
//! mappings, or sequences of either) into the HEC wire schema, optionally
//! batches them, and delivers them over HTTP(S) with retry/backoff and
//! acknowledgement tracking.
//!
//! # Architecture
//!
//! ```text
//!    Raw Event (text | mapping | sequence)
//!         │
//!         v
//!   ┌──────────────┐
//!   │  Normalizer  │  (reserved-key extraction, override resolution,
//!   └──────┬───────┘   field routing)
//!          │
//!          v
//!   ┌──────────────┐
//!   │    Buffer    │  (optional, capacity-bounded, ordered)
//!   └──────┬───────┘
//!          │
//!          v
//!   ┌──────────────┐
//!   │   Delivery   │  (NDJSON batch, HTTP POST, retry/backoff)
//!   └──────┬───────┘
//!          │
//!          v
//!   ┌──────────────┐
//!   │ Ack Tracker  │  (optional, channel-scoped indexing status)
//!   └──────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use hec_sender::{Config, HecSender};
//!
//! # async fn example() -> Result<(), hec_sender::SenderError> {
//! let config = Config {
//!     endpoint: "splunk.example.com".to_string(),
//!     token: "11111111-2222-3333-4444-555555555555".to_string(),
//!     ..Default::default()
//! };
//! let mut sender = HecSender::new(config)?;
//!
//! sender.send("service started").await?;
//! sender.send_value(serde_json::json!({"msg": "login", "user": "ada"})).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Delivery Semantics
//!
//! Delivery is **best-effort**. A failed flush returns its error and the
//! batch is discarded, not re-queued; re-queueing would grow the buffer
//! without bound while the endpoint is down. Buffered events are only sent
//! when capacity is reached or [`HecSender::flush`] is called; events still
//! buffered when the sender is dropped are lost. Callers needing
//! at-least-once delivery must layer a durable queue on top.
//!
//! Each `send`/`flush` call blocks until its HTTP exchange, including all
//! retries, completes or fails terminally. Every attempt is bounded by the
//! configured request timeout; there is no cross-attempt cancellation.

mod ack;
mod buffer;
mod client;
mod config;
mod delivery;
mod error;
mod event;
mod hostname;
mod http;

pub use client::{HecSender, SendOutcome};
pub use config::{ChannelLocation, Config, FormatHook, Protocol, JSON_SOURCETYPE};
pub use delivery::{Delivery, DeliveryOutcome};
pub use error::{EventError, SenderError};
pub use event::{RawEvent, Record};
