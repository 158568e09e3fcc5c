// Copyright 2025 Lorelog (https://github.com/lorelog)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Classified journal events
//!
//! The immutable output of the classifier. A [`ClassifiedEvent`] is created
//! once, appended once to the event buffer, and never mutated afterward.

use crate::category::EventCategory;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A decoded record after classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedEvent {
    /// Content fingerprint of (timestamp, tag, raw fields).
    ///
    /// Stable across process restarts, so a backfill replay produces the
    /// same ids as the original live ingestion. The projector uses this to
    /// recognize duplicate delivery.
    pub id: u64,
    /// Record timestamp (UTC).
    pub timestamp: DateTime<Utc>,
    /// Type tag exactly as written in the journal, preserved even when the
    /// taxonomy does not know it.
    pub event_type: String,
    /// Category from the closed taxonomy.
    pub category: EventCategory,
    /// Short human-readable description of the event.
    pub summary: String,
    /// Per-type subset of the record's fields relevant to consumers.
    pub key_fields: Map<String, Value>,
    /// Whether the record satisfied its type's validation rules.
    pub valid: bool,
    /// Reasons the event was marked invalid; empty when `valid`.
    pub validation_errors: Vec<String>,
}

impl ClassifiedEvent {
    /// Compute the content fingerprint for a record.
    ///
    /// Hashes the normalized timestamp, the tag, and the serialized field
    /// map. Two journal lines with identical content (a duplicate flush)
    /// fingerprint identically; any field difference diverges.
    pub fn fingerprint(
        timestamp: DateTime<Utc>,
        event_type: &str,
        fields: &Map<String, Value>,
    ) -> u64 {
        let mut buf = Vec::with_capacity(64);
        buf.extend_from_slice(&timestamp.timestamp_micros().to_le_bytes());
        buf.push(0);
        buf.extend_from_slice(event_type.as_bytes());
        buf.push(0);
        // Map serialization is deterministic with preserve_order, and a
        // journal line always presents its fields in written order.
        if let Ok(body) = serde_json::to_vec(fields) {
            buf.extend_from_slice(&body);
        }
        seahash::hash(&buf)
    }

    /// Whether this event fell outside the closed taxonomy.
    pub fn is_unclassified(&self) -> bool {
        self.category == EventCategory::Unclassified
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fields(pairs: &[(&str, Value)]) -> Map<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_fingerprint_is_stable_for_identical_content() {
        let ts = Utc.with_ymd_and_hms(2026, 8, 1, 10, 0, 0).unwrap();
        let f = fields(&[("system", Value::from("Vega"))]);
        let a = ClassifiedEvent::fingerprint(ts, "jump", &f);
        let b = ClassifiedEvent::fingerprint(ts, "jump", &f);
        assert_eq!(a, b);
    }

    #[test]
    fn test_fingerprint_diverges_on_any_difference() {
        let ts = Utc.with_ymd_and_hms(2026, 8, 1, 10, 0, 0).unwrap();
        let f = fields(&[("system", Value::from("Vega"))]);
        let base = ClassifiedEvent::fingerprint(ts, "jump", &f);
        assert_ne!(
            base,
            ClassifiedEvent::fingerprint(ts, "dock", &f),
            "tag must participate"
        );
        assert_ne!(
            base,
            ClassifiedEvent::fingerprint(ts, "jump", &fields(&[("system", Value::from("Sol"))])),
            "fields must participate"
        );
        let later = ts + chrono::Duration::seconds(1);
        assert_ne!(
            base,
            ClassifiedEvent::fingerprint(later, "jump", &f),
            "timestamp must participate"
        );
    }
}
