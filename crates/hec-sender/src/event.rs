// Copyright 2026-Present the hec-sender authors.
// SPDX-License-Identifier: Apache-2.0

//! Event normalization: raw events in, wire-ready records out.
//!
//! A raw event is resolved once at this boundary into the [`RawEvent`] sum
//! type; the rest of the pipeline never inspects shapes again. Normalization
//! runs in three steps per event:
//!
//! 1. **Extraction**: reserved keys (`time`, `host`, `source`, `sourcetype`,
//!    `index`, plus `event`/`fields`) are pulled out of mapping events as
//!    override candidates, but only when `allow_overrides` is set.
//! 2. **Resolution**: each reserved key takes the candidate when present and
//!    well-typed, else the configured default. Ill-typed candidates are
//!    dropped with a warning; the event still ships.
//! 3. **Routing**: with the `_json` sourcetype, custom keys move to the
//!    indexed `fields` side-channel; otherwise they stay in the event body.
//!
//! Records are immutable once built; the buffer and delivery engine only
//! move them around.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use serde_json::{Map, Number, Value};
use tracing::{debug, warn};

use crate::config::{Config, JSON_SOURCETYPE};
use crate::error::EventError;

/// Reserved top-level keys with indexer-defined meaning.
const OVERRIDE_KEYS: [&str; 5] = ["time", "host", "source", "sourcetype", "index"];

/// Keys that never route to `fields`, even in `_json` mode.
const BODY_KEYS: [&str; 2] = ["message", "msg"];

fn is_reserved(key: &str) -> bool {
    OVERRIDE_KEYS.contains(&key) || key == "event" || key == "fields"
}

/// One raw application event, resolved from whatever the caller handed us.
#[derive(Debug, Clone, PartialEq)]
pub enum RawEvent {
    /// Free text; shipped verbatim as the event body.
    Text(String),
    /// Structured mapping; subject to override extraction and field routing.
    Structured(Map<String, Value>),
    /// A sequence of events, flattened recursively before normalization.
    Sequence(Vec<RawEvent>),
}

impl From<&str> for RawEvent {
    fn from(text: &str) -> Self {
        RawEvent::Text(text.to_string())
    }
}

impl From<String> for RawEvent {
    fn from(text: String) -> Self {
        RawEvent::Text(text)
    }
}

impl From<Map<String, Value>> for RawEvent {
    fn from(map: Map<String, Value>) -> Self {
        RawEvent::Structured(map)
    }
}

impl<T: Into<RawEvent>> From<Vec<T>> for RawEvent {
    fn from(events: Vec<T>) -> Self {
        RawEvent::Sequence(events.into_iter().map(Into::into).collect())
    }
}

impl TryFrom<Value> for RawEvent {
    type Error = EventError;

    /// Strings become text, objects become structured events, arrays become
    /// sequences. Anything else is not expressible as an event.
    fn try_from(value: Value) -> Result<Self, EventError> {
        match value {
            Value::String(text) => Ok(RawEvent::Text(text)),
            Value::Object(map) => Ok(RawEvent::Structured(map)),
            Value::Array(items) => Ok(RawEvent::Sequence(
                items
                    .into_iter()
                    .map(RawEvent::try_from)
                    .collect::<Result<_, _>>()?,
            )),
            other => Err(EventError::UnsupportedEventType {
                kind: json_kind(&other),
            }),
        }
    }
}

impl RawEvent {
    fn flatten_into(self, out: &mut Vec<RawEvent>) {
        match self {
            RawEvent::Sequence(items) => {
                for item in items {
                    item.flatten_into(out);
                }
            }
            event => out.push(event),
        }
    }
}

/// Splits a dynamic JSON value into individual events, skipping (not
/// aborting on) elements that are not expressible as events.
pub(crate) fn partition_value(value: Value) -> (Vec<RawEvent>, Vec<EventError>) {
    let mut events = Vec::new();
    let mut skipped = Vec::new();
    partition_into(value, &mut events, &mut skipped);
    (events, skipped)
}

fn partition_into(value: Value, events: &mut Vec<RawEvent>, skipped: &mut Vec<EventError>) {
    match value {
        Value::Array(items) => {
            for item in items {
                partition_into(item, events, skipped);
            }
        }
        other => match RawEvent::try_from(other) {
            Ok(event) => events.push(event),
            Err(err) => {
                warn!(%err, "skipping event");
                skipped.push(err);
            }
        },
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// A normalized, wire-ready record. Every reserved key is resolved; `fields`
/// is present only for the `_json` sourcetype.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    /// Unix timestamp in seconds; fractional part allowed. Kept as a raw
    /// JSON number so supplied overrides round-trip without precision loss.
    pub time: Number,
    pub host: String,
    pub source: String,
    pub sourcetype: String,
    pub index: String,
    /// The payload body: verbatim text, or the mapping minus whatever was
    /// extracted and routed away.
    pub event: Value,
    /// Indexer-only metadata keys, `_json` sourcetype only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<Map<String, Value>>,
}

/// Client-observed send time.
pub(crate) fn observed_time() -> Number {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    Number::from_f64(now.as_secs_f64()).unwrap_or_else(|| Number::from(0))
}

/// Normalizes one raw event into records, flattening sequences. Infallible:
/// type mismatches inside a mapping recover locally to defaults.
pub(crate) fn normalize(
    raw: RawEvent,
    config: &Config,
    default_host: &str,
    default_time: &Number,
) -> Vec<Record> {
    let mut flat = Vec::new();
    raw.flatten_into(&mut flat);
    flat.into_iter()
        .map(|event| match event {
            RawEvent::Text(text) => normalize_text(text, config, default_host, default_time),
            RawEvent::Structured(map) => {
                normalize_structured(map, config, default_host, default_time)
            }
            RawEvent::Sequence(_) => unreachable!("sequences are flattened"),
        })
        .collect()
}

fn normalize_text(
    text: String,
    config: &Config,
    default_host: &str,
    default_time: &Number,
) -> Record {
    finish(
        Record {
            time: default_time.clone(),
            host: default_host.to_string(),
            source: config.default_source().to_string(),
            sourcetype: config.sourcetype.clone(),
            index: config.index.clone(),
            event: Value::String(text),
            fields: None,
        },
        config,
    )
}

fn normalize_structured(
    mut map: Map<String, Value>,
    config: &Config,
    default_host: &str,
    default_time: &Number,
) -> Record {
    let mut candidates = Map::new();
    let mut explicit_event = None;

    if config.allow_overrides {
        for key in OVERRIDE_KEYS {
            if let Some(value) = map.remove(key) {
                candidates.insert(key.to_string(), value);
            }
        }
        // A nested key literally named `event` provides the payload body
        // explicitly, superseding key/value flattening.
        explicit_event = map.remove("event");
    }

    let time = resolve_time(&mut candidates, default_time);
    let host = resolve_string(&mut candidates, "host", default_host);
    let source = resolve_string(&mut candidates, "source", config.default_source());
    let sourcetype = resolve_string(&mut candidates, "sourcetype", &config.sourcetype);
    let index = resolve_string(&mut candidates, "index", &config.index);

    // Routing follows the *resolved* sourcetype, so a per-event sourcetype
    // override can switch the wire variant.
    let json_mode = sourcetype == JSON_SOURCETYPE;

    let mut fields = Map::new();
    if config.allow_overrides && json_mode {
        if let Some(value) = map.remove("fields") {
            match value {
                Value::Object(supplied) => fields = supplied,
                other => {
                    let err = EventError::MalformedOverride {
                        key: "fields",
                        value: other.to_string(),
                    };
                    warn!(%err, "keeping fields candidate in the event body");
                    map.insert("fields".to_string(), other);
                }
            }
        }
    }

    let mut body = Map::new();
    for (key, value) in map {
        let keep_in_body =
            is_reserved(&key) || (explicit_event.is_none() && BODY_KEYS.contains(&key.as_str()));
        if json_mode && !keep_in_body {
            fields.insert(key, value);
        } else {
            body.insert(key, value);
        }
    }

    let event = match explicit_event {
        Some(value) => {
            if !json_mode && !body.is_empty() {
                debug!(
                    dropped = body.len(),
                    "explicit event body supersedes remaining keys"
                );
            }
            value
        }
        None => Value::Object(body),
    };

    finish(
        Record {
            time,
            host,
            source,
            sourcetype,
            index,
            event,
            fields: if json_mode && !fields.is_empty() {
                Some(fields)
            } else {
                None
            },
        },
        config,
    )
}

/// Applies the payload encoder hook, if any.
fn finish(mut record: Record, config: &Config) -> Record {
    if let Some(hook) = &config.format_hook {
        record.event = hook(std::mem::take(&mut record.event));
    }
    record
}

fn resolve_string(candidates: &mut Map<String, Value>, key: &'static str, default: &str) -> String {
    match candidates.remove(key) {
        None => default.to_string(),
        Some(Value::String(value)) => value,
        Some(other) => {
            let err = EventError::MalformedOverride {
                key,
                value: other.to_string(),
            };
            warn!(%err, "using default value");
            default.to_string()
        }
    }
}

fn resolve_time(candidates: &mut Map<String, Value>, default: &Number) -> Number {
    let candidate = match candidates.remove("time") {
        None => return default.clone(),
        Some(candidate) => candidate,
    };
    match candidate {
        Value::Number(number) => number,
        // Numeric strings are common from loosely-typed producers; parse
        // integers before floats so large timestamps keep full precision.
        Value::String(ref text) => {
            if let Ok(int) = text.parse::<i64>() {
                Number::from(int)
            } else if let Some(number) = text.parse::<f64>().ok().and_then(Number::from_f64) {
                number
            } else {
                malformed_time(&candidate, default)
            }
        }
        other => malformed_time(&other, default),
    }
}

fn malformed_time(candidate: &Value, default: &Number) -> Number {
    let err = EventError::MalformedOverride {
        key: "time",
        value: candidate.to_string(),
    };
    warn!(%err, "using observed send time");
    default.clone()
}
