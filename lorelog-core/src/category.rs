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

//! Event Category Taxonomy
//!
//! Closed classification of journal event types. The category set is
//! versioned with the crate; adding a variant is a schema change. Type tags
//! the map does not know about land in [`EventCategory::Unclassified`] with
//! the original tag preserved on the event.

use crate::error::QueryError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Categories of journal events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    /// Game session lifecycle (start, end, pause).
    Session,
    /// Movement between locations, docking, jumps.
    Travel,
    /// Damage, shields, bounties.
    Combat,
    /// Market transactions, cargo and resource movement.
    Trade,
    /// Scans, discoveries, resource collection in the field.
    Exploration,
    /// Mission and progression bookkeeping.
    Status,
    /// Chat and other player-to-player events.
    Social,
    /// Reserved category for type tags the taxonomy does not know.
    Unclassified,
}

impl EventCategory {
    /// All categories in declaration order, Unclassified last.
    pub const ALL: [EventCategory; 8] = [
        EventCategory::Session,
        EventCategory::Travel,
        EventCategory::Combat,
        EventCategory::Trade,
        EventCategory::Exploration,
        EventCategory::Status,
        EventCategory::Social,
        EventCategory::Unclassified,
    ];

    /// Stable lowercase name used in query payloads and statistics keys.
    pub fn as_str(self) -> &'static str {
        match self {
            EventCategory::Session => "session",
            EventCategory::Travel => "travel",
            EventCategory::Combat => "combat",
            EventCategory::Trade => "trade",
            EventCategory::Exploration => "exploration",
            EventCategory::Status => "status",
            EventCategory::Social => "social",
            EventCategory::Unclassified => "unclassified",
        }
    }
}

impl fmt::Display for EventCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventCategory {
    type Err = QueryError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "session" => Ok(EventCategory::Session),
            "travel" => Ok(EventCategory::Travel),
            "combat" => Ok(EventCategory::Combat),
            "trade" => Ok(EventCategory::Trade),
            "exploration" => Ok(EventCategory::Exploration),
            "status" => Ok(EventCategory::Status),
            "social" => Ok(EventCategory::Social),
            "unclassified" => Ok(EventCategory::Unclassified),
            other => Err(QueryError::UnknownCategory {
                got: other.to_string(),
                expected: EventCategory::ALL
                    .iter()
                    .map(|c| c.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
            }),
        }
    }
}

/// Static type-tag to category map.
///
/// Exhaustive over the tags the journal format documents today; anything
/// else is `Unclassified`. The tag string itself always survives on the
/// classified event, so an unmapped tag is analyzable later.
pub fn category_for_tag(tag: &str) -> EventCategory {
    match tag {
        "session_start" | "session_end" => EventCategory::Session,
        "location" | "jump" | "dock" | "undock" => EventCategory::Travel,
        "damage_taken" | "shield_down" | "bounty" => EventCategory::Combat,
        "market_buy" | "market_sell" | "cargo_transfer" => EventCategory::Trade,
        "resource_collected" | "resource_consumed" | "discovery_scan" => {
            EventCategory::Exploration
        }
        "mission_accepted" | "mission_completed" => EventCategory::Status,
        "chat" => EventCategory::Social,
        _ => EventCategory::Unclassified,
    }
}
