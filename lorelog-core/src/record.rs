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

//! Raw and decoded journal records
//!
//! A journal line is a self-describing JSON object: a required `timestamp`
//! (RFC 3339) and a required type tag under `event` (or `type` in older
//! journal versions), plus arbitrary free-form fields. Decoding is
//! stateless; a line either becomes a [`DecodedRecord`], is skipped as
//! blank, or is captured as a [`DecodeFailure`]. Nothing here panics on
//! hostile input.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::PathBuf;

/// Maximum number of snippet bytes preserved on a decode failure.
const FAILURE_SNIPPET_LEN: usize = 120;

/// A single line lifted out of a journal file, not yet decoded.
///
/// Ephemeral: dropped as soon as decoding produces a record or a failure.
/// Carries raw bytes rather than a `String` because journal writers have
/// been observed to emit non-UTF8 sequences in free-text fields.
#[derive(Debug, Clone)]
pub struct RawRecord {
    /// File the line came from.
    pub source: PathBuf,
    /// Byte offset of the start of the line within the source file.
    pub offset: u64,
    /// Line content without the trailing newline.
    pub bytes: Vec<u8>,
}

impl RawRecord {
    pub fn new(source: impl Into<PathBuf>, offset: u64, bytes: Vec<u8>) -> Self {
        Self {
            source: source.into(),
            offset,
            bytes,
        }
    }

    /// Lossy text view of the line, for logging and failure snippets.
    pub fn text_lossy(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }
}

/// A structurally valid journal record.
///
/// `fields` holds every key except the consumed `timestamp` and type tag,
/// in journal-written order. Extraction sites must use get-with-default
/// access; presence of any particular field is never guaranteed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodedRecord {
    /// Record timestamp, normalized to UTC.
    pub timestamp: DateTime<Utc>,
    /// Type tag exactly as written in the journal.
    pub event_type: String,
    /// All remaining fields of the record.
    pub fields: Map<String, Value>,
}

impl DecodedRecord {
    /// String field accessor; `None` when absent or not a string.
    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    /// Integer field accessor; `None` when absent or not an integer.
    pub fn int_field(&self, key: &str) -> Option<i64> {
        self.fields.get(key).and_then(Value::as_i64)
    }
}

/// A line that could not be decoded.
///
/// Failures are first-class data: the tailer counts them, the store
/// surfaces them through statistics, and the poll loop keeps going.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodeFailure {
    /// File the line came from.
    pub source: PathBuf,
    /// Byte offset of the start of the line.
    pub offset: u64,
    /// What went wrong.
    pub reason: String,
    /// Truncated lossy text of the offending line.
    pub snippet: String,
}

impl DecodeFailure {
    fn new(raw: &RawRecord, reason: impl Into<String>) -> Self {
        let mut snippet = raw.text_lossy();
        if snippet.len() > FAILURE_SNIPPET_LEN {
            let mut cut = FAILURE_SNIPPET_LEN;
            while !snippet.is_char_boundary(cut) {
                cut -= 1;
            }
            snippet.truncate(cut);
        }
        Self {
            source: raw.source.clone(),
            offset: raw.offset,
            reason: reason.into(),
            snippet,
        }
    }
}

/// Decode a raw journal line.
///
/// Returns `Ok(None)` for blank lines (skipped, not failures), `Ok(Some)`
/// for a structurally valid record, and `Err` for everything else. Invalid
/// UTF-8 falls back to lossy conversion before JSON parsing; the line only
/// fails if the lossy text still does not parse.
pub fn decode_line(raw: &RawRecord) -> std::result::Result<Option<DecodedRecord>, DecodeFailure> {
    let text = match std::str::from_utf8(&raw.bytes) {
        Ok(s) => s.to_string(),
        Err(_) => {
            tracing::debug!(
                source = %raw.source.display(),
                offset = raw.offset,
                "journal line is not valid UTF-8, falling back to lossy decoding"
            );
            raw.text_lossy()
        }
    };

    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    let value: Value = serde_json::from_str(trimmed)
        .map_err(|e| DecodeFailure::new(raw, format!("not valid JSON: {e}")))?;
    let mut fields = match value {
        Value::Object(map) => map,
        other => {
            return Err(DecodeFailure::new(
                raw,
                format!("expected a JSON object, got {}", json_type_name(&other)),
            ))
        }
    };

    let timestamp = match fields.remove("timestamp") {
        Some(Value::String(s)) => parse_timestamp(&s)
            .ok_or_else(|| DecodeFailure::new(raw, format!("unparseable timestamp '{s}'")))?,
        Some(other) => {
            return Err(DecodeFailure::new(
                raw,
                format!("timestamp must be a string, got {}", json_type_name(&other)),
            ))
        }
        None => return Err(DecodeFailure::new(raw, "missing timestamp")),
    };

    // "event" is the documented tag key; "type" appears in older journals.
    let event_type = match fields.remove("event").or_else(|| fields.remove("type")) {
        Some(Value::String(s)) if !s.trim().is_empty() => s,
        Some(Value::String(_)) => return Err(DecodeFailure::new(raw, "empty type tag")),
        Some(other) => {
            return Err(DecodeFailure::new(
                raw,
                format!("type tag must be a string, got {}", json_type_name(&other)),
            ))
        }
        None => return Err(DecodeFailure::new(raw, "missing type tag")),
    };

    Ok(Some(DecodedRecord {
        timestamp,
        event_type,
        fields,
    }))
}

/// Parse an RFC 3339 timestamp, with a plain `YYYY-MM-DD HH:MM:SS` UTC
/// fallback seen in hand-edited journals.
fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}

fn json_type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
