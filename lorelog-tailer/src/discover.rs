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

//! Journal file discovery
//!
//! Lists candidate journal files oldest to newest. Filenames commonly
//! embed an ordering counter (`journal.0002.log`); that counter is parsed
//! as a *sort hint only*, with modification time as the fallback and the
//! tie-breaker. File identity, handled in [`crate::position`], remains the
//! authoritative rotation signal.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Extensions considered journal files.
const JOURNAL_EXTENSIONS: [&str; 2] = ["log", "jsonl"];

/// Longest digit run honored as an ordering hint; longer runs would not
/// fit u64 and are ignored.
const MAX_HINT_DIGITS: usize = 18;

/// A discovered candidate file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalFile {
    pub path: PathBuf,
    pub modified: SystemTime,
    /// Numeric ordering hint parsed from the filename, if any.
    pub order_hint: Option<u64>,
}

/// List journal files in `dir`, sorted oldest to newest.
///
/// An absent or empty directory yields an empty list, never an error; a
/// single unreadable entry is skipped without blocking the others.
pub fn discover(dir: &Path) -> Vec<JournalFile> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::debug!(dir = %dir.display(), error = %e,
                "journal directory not readable, treating as empty");
            return Vec::new();
        }
    };

    let mut files = Vec::new();
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(dir = %dir.display(), error = %e, "skipping unreadable entry");
                continue;
            }
        };
        let path = entry.path();
        if !is_journal_file(&path) {
            continue;
        }
        let meta = match entry.metadata() {
            Ok(meta) if meta.is_file() => meta,
            Ok(_) => continue,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e,
                    "cannot stat journal file, skipping this pass");
                continue;
            }
        };
        let modified = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        files.push(JournalFile {
            order_hint: order_hint(&path),
            path,
            modified,
        });
    }

    sort_oldest_first(&mut files);
    files
}

/// The newest file by the discovery order is the active file.
pub fn select_active(files: &[JournalFile]) -> Option<&JournalFile> {
    files.last()
}

fn is_journal_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| JOURNAL_EXTENSIONS.contains(&ext))
}

/// Oldest first. Hints are honored only when every candidate carries one:
/// a hint key and an mtime key can disagree, and mixing them per-pair
/// would not give a total order. Within a hint-keyed sort, mtime breaks
/// ties, so of two files claiming the same counter the most recently
/// modified sorts newest.
fn sort_oldest_first(files: &mut [JournalFile]) {
    if files.iter().all(|f| f.order_hint.is_some()) {
        files.sort_by_key(|f| (f.order_hint, f.modified));
    } else {
        files.sort_by_key(|f| f.modified);
    }
}

/// Parse the last digit run of the file stem as the ordering hint.
///
/// `journal.0002.log` → 2; `journal.2026-08-01.log` → 1 (the day field) is
/// harmless because all files written the same day carry the same pattern
/// and fall through to mtime ordering.
fn order_hint(path: &Path) -> Option<u64> {
    let stem = path.file_stem()?.to_str()?;
    let mut runs = Vec::new();
    let mut current = String::new();
    for c in stem.chars() {
        if c.is_ascii_digit() {
            current.push(c);
        } else if !current.is_empty() {
            runs.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        runs.push(current);
    }
    let last = runs.last()?;
    if last.len() > MAX_HINT_DIGITS {
        return None;
    }
    last.parse().ok()
}
