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

//! Record classification
//!
//! Turns a [`DecodedRecord`] into a [`ClassifiedEvent`]: category lookup,
//! a per-type human-readable summary, extraction of the type's key fields,
//! and per-type validation. Classification is total; it never errors and
//! never panics. An invalid record still produces an event, flagged with
//! its validation failures, so filtering stays a downstream decision.

use crate::category::category_for_tag;
use crate::event::ClassifiedEvent;
use crate::record::DecodedRecord;
use serde_json::{Map, Value};

/// Expected shape of a required field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldShape {
    /// Non-empty string.
    Text,
    /// Integer (i64-representable).
    Integer,
    /// Any JSON number.
    Number,
}

impl FieldShape {
    fn matches(self, value: &Value) -> bool {
        match self {
            FieldShape::Text => value.as_str().is_some_and(|s| !s.trim().is_empty()),
            FieldShape::Integer => value.as_i64().is_some(),
            FieldShape::Number => value.as_f64().is_some(),
        }
    }

    fn describe(self) -> &'static str {
        match self {
            FieldShape::Text => "a non-empty string",
            FieldShape::Integer => "an integer",
            FieldShape::Number => "a number",
        }
    }
}

/// Per-type classification rule: which fields must be present and
/// well-shaped, and which fields are copied into the key-field extract.
struct TypeRule {
    required: &'static [(&'static str, FieldShape)],
    copied: &'static [&'static str],
}

const GENERIC_RULE: TypeRule = TypeRule {
    required: &[],
    copied: &[],
};

fn rule_for(tag: &str) -> TypeRule {
    use FieldShape::*;
    match tag {
        "session_start" => TypeRule {
            required: &[("commander", Text)],
            copied: &["commander", "game_mode", "build"],
        },
        "session_end" => TypeRule {
            required: &[],
            copied: &["commander", "play_time_s"],
        },
        "location" => TypeRule {
            required: &[("system", Text)],
            copied: &["system", "body", "station", "docked"],
        },
        "jump" => TypeRule {
            required: &[("system", Text), ("distance_ly", Number)],
            copied: &["system", "distance_ly", "fuel_used"],
        },
        "dock" => TypeRule {
            required: &[("station", Text)],
            copied: &["station", "system", "pad"],
        },
        "undock" => TypeRule {
            required: &[("station", Text)],
            copied: &["station", "system"],
        },
        "resource_collected" | "resource_consumed" => TypeRule {
            required: &[("name", Text), ("count", Integer)],
            copied: &["name", "count", "grade"],
        },
        "cargo_transfer" => TypeRule {
            required: &[("name", Text), ("count", Integer), ("direction", Text)],
            copied: &["name", "count", "direction"],
        },
        "market_buy" | "market_sell" => TypeRule {
            required: &[("name", Text), ("count", Integer), ("price", Number)],
            copied: &["name", "count", "price", "station"],
        },
        "bounty" => TypeRule {
            required: &[("reward", Integer)],
            copied: &["reward", "target", "faction"],
        },
        "damage_taken" => TypeRule {
            required: &[("amount", Number)],
            copied: &["amount", "source", "hull_remaining"],
        },
        "shield_down" => TypeRule {
            required: &[],
            copied: &["source"],
        },
        "discovery_scan" => TypeRule {
            required: &[("body", Text)],
            copied: &["body", "body_type", "terraformable"],
        },
        "mission_accepted" => TypeRule {
            required: &[("mission", Text)],
            copied: &["mission", "faction", "reward", "expiry"],
        },
        "mission_completed" => TypeRule {
            required: &[("mission", Text)],
            copied: &["mission", "faction", "reward"],
        },
        "chat" => TypeRule {
            required: &[("from", Text), ("text", Text)],
            copied: &["from", "text", "channel"],
        },
        _ => GENERIC_RULE,
    }
}

/// Classify a decoded record. Total: every record yields an event.
pub fn classify(record: &DecodedRecord) -> ClassifiedEvent {
    let tag = record.event_type.as_str();
    let category = category_for_tag(tag);
    let rule = rule_for(tag);

    let validation_errors = validate(record, &rule);
    let valid = validation_errors.is_empty();
    if !valid {
        tracing::debug!(
            event_type = tag,
            errors = ?validation_errors,
            "record failed validation, keeping as invalid event"
        );
    }

    ClassifiedEvent {
        id: ClassifiedEvent::fingerprint(record.timestamp, tag, &record.fields),
        timestamp: record.timestamp,
        event_type: record.event_type.clone(),
        category,
        summary: summarize(record),
        key_fields: extract_key_fields(record, &rule),
        valid,
        validation_errors,
    }
}

fn validate(record: &DecodedRecord, rule: &TypeRule) -> Vec<String> {
    let mut errors = Vec::new();
    for (key, shape) in rule.required {
        match record.fields.get(*key) {
            None => errors.push(format!("missing required field '{key}'")),
            Some(value) if !shape.matches(value) => {
                errors.push(format!("field '{key}' must be {}", shape.describe()))
            }
            Some(_) => {}
        }
    }
    errors
}

/// Copy the rule's key fields, omitting whatever is absent. Never fails.
fn extract_key_fields(record: &DecodedRecord, rule: &TypeRule) -> Map<String, Value> {
    let mut out = Map::new();
    for key in rule.copied {
        if let Some(value) = record.fields.get(*key) {
            out.insert((*key).to_string(), value.clone());
        }
    }
    out
}

/// Best-effort one-line summary. Types without a specific rule get the
/// generic fallback; missing fields degrade to placeholders, never errors.
fn summarize(record: &DecodedRecord) -> String {
    let s = |key: &str| record.str_field(key).unwrap_or("unknown").to_string();
    let n = |key: &str| {
        record
            .fields
            .get(key)
            .and_then(Value::as_f64)
            .map(|v| format!("{v}"))
            .unwrap_or_else(|| "?".to_string())
    };

    match record.event_type.as_str() {
        "session_start" => format!("Commander {} started a session", s("commander")),
        "session_end" => "Session ended".to_string(),
        "location" => match record.str_field("station") {
            Some(station) => format!("In {} at {}", s("system"), station),
            None => format!("In {}", s("system")),
        },
        "jump" => format!("Jumped to {} ({} ly)", s("system"), n("distance_ly")),
        "dock" => format!("Docked at {}", s("station")),
        "undock" => format!("Departed {}", s("station")),
        "resource_collected" => format!("Collected {} x {}", n("count"), s("name")),
        "resource_consumed" => format!("Used {} x {}", n("count"), s("name")),
        "cargo_transfer" => format!(
            "Transferred {} x {} ({})",
            n("count"),
            s("name"),
            s("direction")
        ),
        "market_buy" => format!("Bought {} x {} for {} cr", n("count"), s("name"), n("price")),
        "market_sell" => format!("Sold {} x {} for {} cr", n("count"), s("name"), n("price")),
        "bounty" => format!("Claimed a {} cr bounty", n("reward")),
        "damage_taken" => format!("Took {} damage", n("amount")),
        "shield_down" => "Shields offline".to_string(),
        "discovery_scan" => format!("Scanned {}", s("body")),
        "mission_accepted" => format!("Accepted mission: {}", s("mission")),
        "mission_completed" => format!("Completed mission: {}", s("mission")),
        "chat" => format!("{}: {}", s("from"), s("text")),
        // Unmapped tags keep a usable summary; the tag itself is preserved
        // on the event for later analysis.
        other => format!("{other} event occurred"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::EventCategory;
    use crate::record::{decode_line, RawRecord};
    use proptest::prelude::*;

    fn decoded(line: &str) -> DecodedRecord {
        decode_line(&RawRecord::new("journal.log", 0, line.as_bytes().to_vec()))
            .unwrap()
            .unwrap()
    }

    #[test]
    fn test_classify_jump() {
        let event = classify(&decoded(
            r#"{"timestamp":"2026-08-01T10:00:00Z","event":"jump","system":"Vega","distance_ly":12.4,"fuel_used":1.2,"extra":"ignored"}"#,
        ));
        assert_eq!(event.category, EventCategory::Travel);
        assert!(event.valid);
        assert_eq!(event.summary, "Jumped to Vega (12.4 ly)");
        assert_eq!(event.key_fields.get("system"), Some(&Value::from("Vega")));
        assert!(event.key_fields.get("extra").is_none());
    }

    #[test]
    fn test_unknown_tag_is_unclassified_and_preserved() {
        let event = classify(&decoded(
            r#"{"timestamp":"2026-08-01T10:00:00Z","event":"warp_core_breach","severity":9}"#,
        ));
        assert_eq!(event.category, EventCategory::Unclassified);
        assert_eq!(event.event_type, "warp_core_breach");
        assert!(event.valid, "unknown types have no validation rules");
        assert_eq!(event.summary, "warp_core_breach event occurred");
    }

    #[test]
    fn test_missing_required_field_flags_invalid() {
        let event = classify(&decoded(
            r#"{"timestamp":"2026-08-01T10:00:00Z","event":"jump","distance_ly":5.0}"#,
        ));
        assert!(!event.valid);
        assert_eq!(
            event.validation_errors,
            vec!["missing required field 'system'".to_string()]
        );
        // still classified and summarized best-effort
        assert_eq!(event.category, EventCategory::Travel);
        assert_eq!(event.summary, "Jumped to unknown (5 ly)");
    }

    #[test]
    fn test_wrong_shape_flags_invalid() {
        let event = classify(&decoded(
            r#"{"timestamp":"2026-08-01T10:00:00Z","event":"bounty","reward":"lots"}"#,
        ));
        assert!(!event.valid);
        assert_eq!(
            event.validation_errors,
            vec!["field 'reward' must be an integer".to_string()]
        );
    }

    #[test]
    fn test_optional_fields_are_omitted_not_failed() {
        let event = classify(&decoded(
            r#"{"timestamp":"2026-08-01T10:00:00Z","event":"dock","station":"Obsidian Orbital"}"#,
        ));
        assert!(event.valid);
        assert!(event.key_fields.get("pad").is_none());
        assert!(event.key_fields.get("system").is_none());
    }

    #[test]
    fn test_chat_summary() {
        let event = classify(&decoded(
            r#"{"timestamp":"2026-08-01T10:00:00Z","event":"chat","from":"Ada","text":"o7","channel":"local"}"#,
        ));
        assert_eq!(event.category, EventCategory::Social);
        assert_eq!(event.summary, "Ada: o7");
    }

    #[test]
    fn test_duplicate_records_share_a_fingerprint() {
        let line = r#"{"timestamp":"2026-08-01T10:00:00Z","event":"resource_collected","name":"iron","count":3}"#;
        assert_eq!(classify(&decoded(line)).id, classify(&decoded(line)).id);
    }

    proptest! {
        // Unknown-type safety: classification never panics for arbitrary
        // tags and the tag always survives on the event.
        #[test]
        fn prop_arbitrary_tags_never_panic(tag in "[a-zA-Z0-9_\\-]{1,32}") {
            let line = format!(
                r#"{{"timestamp":"2026-08-01T10:00:00Z","event":"{tag}","payload":1}}"#
            );
            let event = classify(&decoded(&line));
            prop_assert_eq!(event.event_type, tag);
        }
    }
}
