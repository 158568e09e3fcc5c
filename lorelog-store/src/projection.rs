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

//! Live state projection
//!
//! Folds the classified event stream into a mutable aggregate: current
//! location, last known resource levels, net credit movement, and the
//! active session marker. One reducer per affecting event type; types
//! without a reducer leave state unchanged.
//!
//! Reducer contract:
//! - pure in (event, prior state): no clock reads, no I/O;
//! - invalid events are never applied;
//! - an immediate duplicate delivery of the same event is a no-op, so the
//!   cumulative reducers (resources, credits) tolerate at-least-once
//!   slips from the tailer;
//! - scalar fields (location, session marker) are last-write-wins by
//!   event timestamp, not arrival time;
//! - per-key resource adjustments commute, so logically-independent event
//!   types converge regardless of arrival order.

use chrono::{DateTime, Utc};
use lorelog_core::ClassifiedEvent;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Where the player currently is, as far as the journal has said.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationState {
    pub system: String,
    pub station: Option<String>,
    pub docked: bool,
    /// Timestamp of the event that last set this location.
    pub updated_at: DateTime<Utc>,
}

/// Marker for an in-progress play session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionMarker {
    pub commander: Option<String>,
    pub started_at: DateTime<Utc>,
}

/// The mutable aggregate view. Consumers receive copy-on-read snapshots
/// via [`crate::store::LoreStore::current_state`]; only the tailer thread
/// mutates the live instance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateProjection {
    /// Current location, if any location event has been seen.
    pub location: Option<LocationState>,
    /// Last known resource levels by name. Net of collection, consumption,
    /// transfers, and market movement; may go negative when consumption is
    /// observed without the matching acquisition.
    pub resources: BTreeMap<String, i64>,
    /// Net credit movement observed this run (bounties, missions, trade).
    pub credits_delta: i64,
    /// Active session marker; `None` outside a session.
    pub session: Option<SessionMarker>,
    /// Timestamp of the event that last changed the session marker.
    pub session_updated_at: Option<DateTime<Utc>>,
    /// Timestamp of the newest event applied.
    pub last_updated: Option<DateTime<Utc>>,
    /// Count of valid events folded in.
    pub events_applied: u64,
    /// Fingerprint of the most recently applied event, for duplicate
    /// delivery detection.
    pub last_applied_id: Option<u64>,
}

impl StateProjection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one classified event into the projection.
    ///
    /// Returns `true` when the event was consumed (valid and not an
    /// immediate duplicate), whether or not any reducer changed state.
    pub fn apply(&mut self, event: &ClassifiedEvent) -> bool {
        if !event.valid {
            return false;
        }
        if self.last_applied_id == Some(event.id) {
            tracing::debug!(id = event.id, event_type = %event.event_type,
                "skipping duplicate delivery");
            return false;
        }

        match event.event_type.as_str() {
            "session_start" => self.reduce_session_start(event),
            "session_end" => self.reduce_session_end(event),
            "location" | "jump" => self.reduce_location(event),
            "dock" => self.reduce_dock(event),
            "undock" => self.reduce_undock(event),
            "resource_collected" => self.adjust_resource(event, 1),
            "resource_consumed" => self.adjust_resource(event, -1),
            "cargo_transfer" => self.reduce_cargo_transfer(event),
            "market_buy" => self.reduce_market(event, true),
            "market_sell" => self.reduce_market(event, false),
            "bounty" => self.credits_delta += int(&event.key_fields, "reward"),
            "mission_completed" => self.credits_delta += int(&event.key_fields, "reward"),
            // No reducer: chat, scans, damage, mission_accepted, unknown tags.
            _ => {}
        }

        self.events_applied += 1;
        self.last_applied_id = Some(event.id);
        self.last_updated = Some(match self.last_updated {
            Some(prev) => prev.max(event.timestamp),
            None => event.timestamp,
        });
        true
    }

    fn reduce_session_start(&mut self, event: &ClassifiedEvent) {
        if self.session_is_newer_than(event.timestamp) {
            return;
        }
        self.session = Some(SessionMarker {
            commander: str_opt(&event.key_fields, "commander"),
            started_at: event.timestamp,
        });
        self.session_updated_at = Some(event.timestamp);
    }

    fn reduce_session_end(&mut self, event: &ClassifiedEvent) {
        if self.session_is_newer_than(event.timestamp) {
            return;
        }
        self.session = None;
        self.session_updated_at = Some(event.timestamp);
    }

    fn session_is_newer_than(&self, ts: DateTime<Utc>) -> bool {
        self.session_updated_at.is_some_and(|at| at > ts)
    }

    fn location_is_newer_than(&self, ts: DateTime<Utc>) -> bool {
        self.location.as_ref().is_some_and(|loc| loc.updated_at > ts)
    }

    fn reduce_location(&mut self, event: &ClassifiedEvent) {
        if self.location_is_newer_than(event.timestamp) {
            return;
        }
        let station = str_opt(&event.key_fields, "station");
        self.location = Some(LocationState {
            system: str_or(&event.key_fields, "system", "unknown"),
            docked: station.is_some(),
            station,
            updated_at: event.timestamp,
        });
    }

    fn reduce_dock(&mut self, event: &ClassifiedEvent) {
        if self.location_is_newer_than(event.timestamp) {
            return;
        }
        let system = str_opt(&event.key_fields, "system")
            .or_else(|| self.location.as_ref().map(|loc| loc.system.clone()))
            .unwrap_or_else(|| "unknown".to_string());
        self.location = Some(LocationState {
            system,
            station: str_opt(&event.key_fields, "station"),
            docked: true,
            updated_at: event.timestamp,
        });
    }

    fn reduce_undock(&mut self, event: &ClassifiedEvent) {
        if self.location_is_newer_than(event.timestamp) {
            return;
        }
        let system = str_opt(&event.key_fields, "system")
            .or_else(|| self.location.as_ref().map(|loc| loc.system.clone()))
            .unwrap_or_else(|| "unknown".to_string());
        self.location = Some(LocationState {
            system,
            station: None,
            docked: false,
            updated_at: event.timestamp,
        });
    }

    fn adjust_resource(&mut self, event: &ClassifiedEvent, sign: i64) {
        if let Some(name) = str_opt(&event.key_fields, "name") {
            let count = int(&event.key_fields, "count");
            *self.resources.entry(name).or_insert(0) += sign * count;
        }
    }

    fn reduce_cargo_transfer(&mut self, event: &ClassifiedEvent) {
        let sign = match event.key_fields.get("direction").and_then(Value::as_str) {
            Some("to_ship") => 1,
            Some("from_ship") => -1,
            other => {
                tracing::debug!(direction = ?other, "unrecognized transfer direction, ignoring");
                return;
            }
        };
        self.adjust_resource(event, sign);
    }

    fn reduce_market(&mut self, event: &ClassifiedEvent, buying: bool) {
        let count = int(&event.key_fields, "count");
        let price = event
            .key_fields
            .get("price")
            .and_then(Value::as_f64)
            .unwrap_or(0.0);
        let total = (count as f64 * price).round() as i64;
        if let Some(name) = str_opt(&event.key_fields, "name") {
            let sign = if buying { 1 } else { -1 };
            *self.resources.entry(name).or_insert(0) += sign * count;
        }
        if buying {
            self.credits_delta -= total;
        } else {
            self.credits_delta += total;
        }
    }
}

fn str_opt(fields: &Map<String, Value>, key: &str) -> Option<String> {
    fields.get(key).and_then(Value::as_str).map(str::to_string)
}

fn str_or(fields: &Map<String, Value>, key: &str, default: &str) -> String {
    str_opt(fields, key).unwrap_or_else(|| default.to_string())
}

fn int(fields: &Map<String, Value>, key: &str) -> i64 {
    fields.get(key).and_then(Value::as_i64).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lorelog_core::{classify, decode_line, RawRecord};

    fn event(line: &str) -> ClassifiedEvent {
        let raw = RawRecord::new("journal.log", 0, line.as_bytes().to_vec());
        classify(&decode_line(&raw).unwrap().unwrap())
    }

    fn ts(line: &str, secs: u32) -> String {
        line.replace("{TS}", &format!("2026-08-01T10:00:{secs:02}Z"))
    }

    #[test]
    fn test_location_follows_jumps_and_docking() {
        let mut state = StateProjection::new();
        state.apply(&event(&ts(
            r#"{"timestamp":"{TS}","event":"jump","system":"Vega","distance_ly":9.1}"#,
            1,
        )));
        state.apply(&event(&ts(
            r#"{"timestamp":"{TS}","event":"dock","station":"Obsidian Orbital"}"#,
            2,
        )));
        let loc = state.location.as_ref().unwrap();
        assert_eq!(loc.system, "Vega");
        assert_eq!(loc.station.as_deref(), Some("Obsidian Orbital"));
        assert!(loc.docked);

        state.apply(&event(&ts(
            r#"{"timestamp":"{TS}","event":"undock","station":"Obsidian Orbital"}"#,
            3,
        )));
        let loc = state.location.as_ref().unwrap();
        assert_eq!(loc.system, "Vega");
        assert!(!loc.docked);
        assert!(loc.station.is_none());
    }

    #[test]
    fn test_stale_location_event_loses_to_newer() {
        let mut state = StateProjection::new();
        state.apply(&event(&ts(
            r#"{"timestamp":"{TS}","event":"jump","system":"Sol","distance_ly":4.0}"#,
            30,
        )));
        // Arrives later but stamped earlier: last-write-wins by event time.
        state.apply(&event(&ts(
            r#"{"timestamp":"{TS}","event":"jump","system":"Vega","distance_ly":2.0}"#,
            10,
        )));
        assert_eq!(state.location.as_ref().unwrap().system, "Sol");
    }

    #[test]
    fn test_resources_accumulate_and_commute() {
        let collect = event(&ts(
            r#"{"timestamp":"{TS}","event":"resource_collected","name":"iron","count":5}"#,
            1,
        ));
        let consume = event(&ts(
            r#"{"timestamp":"{TS}","event":"resource_consumed","name":"iron","count":2}"#,
            2,
        ));

        let mut forward = StateProjection::new();
        forward.apply(&collect);
        forward.apply(&consume);

        let mut reversed = StateProjection::new();
        reversed.apply(&consume);
        reversed.apply(&collect);

        assert_eq!(forward.resources.get("iron"), Some(&3));
        assert_eq!(forward.resources, reversed.resources);
    }

    #[test]
    fn test_duplicate_delivery_is_idempotent() {
        let collect = event(&ts(
            r#"{"timestamp":"{TS}","event":"resource_collected","name":"iron","count":5}"#,
            1,
        ));
        let mut once = StateProjection::new();
        once.apply(&collect);
        let mut twice = StateProjection::new();
        twice.apply(&collect);
        assert!(!twice.apply(&collect), "immediate duplicate must be skipped");
        assert_eq!(once, twice);
    }

    #[test]
    fn test_invalid_events_are_not_applied() {
        let mut state = StateProjection::new();
        let bad = event(&ts(r#"{"timestamp":"{TS}","event":"jump","distance_ly":1.0}"#, 1));
        assert!(!bad.valid);
        assert!(!state.apply(&bad));
        assert_eq!(state, StateProjection::new());
    }

    #[test]
    fn test_market_moves_credits_and_cargo() {
        let mut state = StateProjection::new();
        state.apply(&event(&ts(
            r#"{"timestamp":"{TS}","event":"market_buy","name":"fuel","count":10,"price":25.5}"#,
            1,
        )));
        state.apply(&event(&ts(
            r#"{"timestamp":"{TS}","event":"market_sell","name":"fuel","count":4,"price":30.0}"#,
            2,
        )));
        assert_eq!(state.resources.get("fuel"), Some(&6));
        assert_eq!(state.credits_delta, -255 + 120);
    }

    #[test]
    fn test_bounty_and_mission_rewards() {
        let mut state = StateProjection::new();
        state.apply(&event(&ts(
            r#"{"timestamp":"{TS}","event":"bounty","reward":5000}"#,
            1,
        )));
        state.apply(&event(&ts(
            r#"{"timestamp":"{TS}","event":"mission_completed","mission":"Haul tea","reward":12000}"#,
            2,
        )));
        assert_eq!(state.credits_delta, 17_000);
    }

    #[test]
    fn test_session_lifecycle() {
        let mut state = StateProjection::new();
        state.apply(&event(&ts(
            r#"{"timestamp":"{TS}","event":"session_start","commander":"Ada"}"#,
            1,
        )));
        assert_eq!(
            state.session.as_ref().unwrap().commander.as_deref(),
            Some("Ada")
        );
        state.apply(&event(&ts(r#"{"timestamp":"{TS}","event":"session_end"}"#, 50)));
        assert!(state.session.is_none());

        // A stale start arriving after the end must not resurrect it.
        state.apply(&event(&ts(
            r#"{"timestamp":"{TS}","event":"session_start","commander":"Ada"}"#,
            20,
        )));
        assert!(state.session.is_none());
    }

    #[test]
    fn test_unaffecting_types_leave_state_unchanged() {
        let mut state = StateProjection::new();
        state.apply(&event(&ts(
            r#"{"timestamp":"{TS}","event":"chat","from":"Ada","text":"o7"}"#,
            1,
        )));
        assert!(state.location.is_none());
        assert!(state.resources.is_empty());
        assert_eq!(state.credits_delta, 0);
        // but the event still counts as delivered
        assert_eq!(state.events_applied, 1);
    }
}
