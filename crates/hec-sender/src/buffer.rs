// Copyright 2026-Present the hec-sender authors.
// SPDX-License-Identifier: Apache-2.0

//! Bounded, ordered record accumulator.
//!
//! The buffer never talks to the network: `append` signals when capacity is
//! reached and the client performs the flush. A drain hands back the entire
//! ordered contents and leaves the buffer empty regardless of what delivery
//! later does with them.

use crate::event::Record;

#[derive(Debug)]
pub(crate) struct Buffer {
    records: Vec<Record>,
    capacity: usize,
}

impl Buffer {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            records: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Appends one record. Returns `true` when the buffer has reached
    /// capacity and must be flushed; the triggering record is included, so
    /// the length never exceeds capacity by more than that one record.
    pub(crate) fn append(&mut self, record: Record) -> bool {
        self.records.push(record);
        self.records.len() >= self.capacity
    }

    /// Hands back the entire ordered contents, leaving the buffer empty.
    pub(crate) fn drain(&mut self) -> Vec<Record> {
        std::mem::take(&mut self.records)
    }

    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::{json, Number};

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
    fn test_append_signals_at_capacity() {
        let mut buffer = Buffer::new(3);
        assert!(!buffer.append(record("1")));
        assert!(!buffer.append(record("2")));
        assert!(buffer.append(record("3")));
        assert_eq!(buffer.len(), 3);
    }

    #[test]
    fn test_drain_empties_and_preserves_order() {
        let mut buffer = Buffer::new(10);
        buffer.append(record("first"));
        buffer.append(record("second"));
        buffer.append(record("third"));

        let drained = buffer.drain();
        let bodies: Vec<_> = drained.iter().map(|r| r.event.clone()).collect();
        assert_eq!(bodies, vec![json!("first"), json!("second"), json!("third")]);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_drain_empty_buffer_is_empty() {
        let mut buffer = Buffer::new(2);
        assert!(buffer.drain().is_empty());
    }

    #[test]
    fn test_length_grows_by_one_per_append() {
        let mut buffer = Buffer::new(10);
        for expected in 1..=5 {
            buffer.append(record("x"));
            assert_eq!(buffer.len(), expected);
        }
    }

    proptest! {
        /// Draining whenever append signals keeps the length bounded by
        /// capacity at all times, and nothing is lost or reordered.
        #[test]
        fn buffer_invariants_hold(capacity in 1usize..16, count in 0usize..64) {
            let mut buffer = Buffer::new(capacity);
            let mut drained = Vec::new();
            for i in 0..count {
                let triggered = buffer.append(record(&i.to_string()));
                prop_assert!(buffer.len() <= capacity);
                if triggered {
                    prop_assert_eq!(buffer.len(), capacity);
                    drained.extend(buffer.drain());
                    prop_assert!(buffer.is_empty());
                }
            }
            drained.extend(buffer.drain());
            let bodies: Vec<_> = drained.iter().map(|r| r.event.clone()).collect();
            let expected: Vec<_> = (0..count).map(|i| json!(i.to_string())).collect();
            prop_assert_eq!(bodies, expected);
        }
    }
}
