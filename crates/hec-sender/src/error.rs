// Copyright 2026-Present the hec-sender authors.
// SPDX-License-Identifier: Apache-2.0

//! Error taxonomy for the client.
//!
//! Two layers: [`EventError`] covers failures local to a single event
//! (the sibling events in the same call are unaffected), while
//! [`SenderError`] covers whole-call failures (configuration, transport,
//! endpoint rejection).

/// Failure local to one event. Never aborts sibling events in the same
/// `send` call; surfaced through `SendOutcome::skipped` or recovered from
/// in place with a logged warning.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EventError {
    /// The raw value is neither text, a mapping, nor a sequence of those.
    #[error("unsupported event type: {kind} is not expressible as text or a mapping")]
    UnsupportedEventType {
        /// JSON kind of the offending value (`"null"`, `"bool"`, `"number"`).
        kind: &'static str,
    },

    /// A reserved-key override was present but ill-typed. The event is
    /// still delivered with the configured default in place.
    #[error("malformed {key} override, falling back to default: {value}")]
    MalformedOverride {
        /// Reserved key the candidate was supplied for.
        key: &'static str,
        /// Rendering of the rejected candidate value.
        value: String,
    },
}

/// Failure of a whole client operation (construction, delivery, ack check,
/// health probe). Batch failures carry the terminal HTTP status and body;
/// the buffered records of a failed flush are already discarded by then.
#[derive(Debug, thiserror::Error)]
pub enum SenderError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Network/connection-level failure, surfaced once retries are exhausted.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The endpoint answered outside the 200 class and the status was either
    /// terminal or retries ran out.
    #[error("endpoint rejected request: status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("failed to serialize record: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("failed to compress payload: {0}")]
    Compression(#[from] std::io::Error),

    /// An acknowledgement operation was attempted without a configured
    /// channel. Detected locally, no network call is made.
    #[error("acknowledgements are not enabled: no channel configured")]
    AckNotEnabled,
}
