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

//! File identity and byte-offset tracking
//!
//! File identity is the authoritative rotation signal; filename patterns
//! are only a sort-order hint in discovery. Identity combines the inode
//! (unix only) with the creation timestamp; inode numbers get recycled, so
//! the creation time is what catches a delete-and-recreate at the same
//! path. Either way a truncate-and-reuse of the same path is detected.
//!
//! Positions are private to the tailer: nothing else reads or writes them.

use lorelog_core::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::Metadata;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Identity of a journal file, independent of its name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileIdentity {
    pub path: PathBuf,
    /// Inode number on unix; `None` elsewhere.
    pub inode: Option<u64>,
    /// Creation time fallback for filesystems without inode visibility.
    pub created: Option<SystemTime>,
}

impl FileIdentity {
    pub fn from_metadata(path: &Path, meta: &Metadata) -> Self {
        Self {
            path: path.to_path_buf(),
            inode: inode_of(meta),
            created: meta.created().ok(),
        }
    }

    /// Whether `meta` still describes the same underlying file.
    ///
    /// A writer that closes a journal and reopens a fresh file at the same
    /// path changes the creation time and usually the inode; either
    /// mismatch, not any filename heuristic, is what flags a rotation.
    /// Both signals are checked when available because the filesystem can
    /// hand a freshly recreated file the inode number just freed by the
    /// deleted one.
    pub fn same_file(&self, meta: &Metadata) -> bool {
        let inode_matches = match (self.inode, inode_of(meta)) {
            (Some(a), Some(b)) => a == b,
            _ => true,
        };
        let created_matches = match (self.created, meta.created().ok()) {
            (Some(a), Some(b)) => a == b,
            // No identity source at all: assume unchanged and rely on the
            // truncation check.
            _ => true,
        };
        inode_matches && created_matches
    }

    /// Stable ledger key for persistence.
    pub fn ledger_key(&self) -> String {
        match self.inode {
            Some(ino) => format!("{}#{}", self.path.display(), ino),
            None => self.path.display().to_string(),
        }
    }
}

#[cfg(unix)]
fn inode_of(meta: &Metadata) -> Option<u64> {
    use std::os::unix::fs::MetadataExt;
    Some(meta.ino())
}

#[cfg(not(unix))]
fn inode_of(_meta: &Metadata) -> Option<u64> {
    None
}

/// Identity plus the byte offset of the next unread byte.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilePosition {
    pub identity: FileIdentity,
    pub offset: u64,
}

impl FilePosition {
    pub fn start_of(identity: FileIdentity) -> Self {
        Self {
            identity,
            offset: 0,
        }
    }

    /// Whether the file has shrunk below the stored offset.
    pub fn truncated_by(&self, meta: &Metadata) -> bool {
        meta.len() < self.offset
    }
}

/// Offset ledger keyed by file identity, optionally persisted as a plain
/// JSON key→offset map. Absence of the ledger file just means a fresh
/// backfill; persistence is never required for single-run correctness.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct PositionLedger {
    offsets: HashMap<String, u64>,
}

impl PositionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn offset_for(&self, identity: &FileIdentity) -> u64 {
        self.offsets
            .get(&identity.ledger_key())
            .copied()
            .unwrap_or(0)
    }

    pub fn set(&mut self, identity: &FileIdentity, offset: u64) {
        self.offsets.insert(identity.ledger_key(), offset);
    }

    /// Explicit reset, used for full re-ingestion of a file.
    pub fn reset(&mut self, identity: &FileIdentity) {
        self.offsets.remove(&identity.ledger_key());
    }

    /// Load a persisted ledger; a missing file yields an empty ledger.
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(text) => Ok(serde_json::from_str(&text)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Persist the ledger as JSON.
    pub fn persist(&self, path: &Path) -> Result<()> {
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_identity_survives_append_but_not_replace() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("journal.0001.log");
        std::fs::write(&path, b"one\n").unwrap();
        let identity = FileIdentity::from_metadata(&path, &std::fs::metadata(&path).unwrap());

        // append: same file
        let mut f = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(f, "two").unwrap();
        drop(f);
        assert!(identity.same_file(&std::fs::metadata(&path).unwrap()));

        // remove and recreate at the same path: different file
        std::fs::remove_file(&path).unwrap();
        std::fs::write(&path, b"fresh\n").unwrap();
        assert!(!identity.same_file(&std::fs::metadata(&path).unwrap()));
    }

    #[test]
    fn test_truncation_detected_via_offset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("journal.log");
        std::fs::write(&path, b"a long line of content\n").unwrap();
        let meta = std::fs::metadata(&path).unwrap();
        let pos = FilePosition {
            identity: FileIdentity::from_metadata(&path, &meta),
            offset: meta.len(),
        };
        std::fs::write(&path, b"x\n").unwrap();
        assert!(pos.truncated_by(&std::fs::metadata(&path).unwrap()));
    }

    #[test]
    fn test_ledger_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let journal = dir.path().join("journal.log");
        std::fs::write(&journal, b"line\n").unwrap();
        let identity =
            FileIdentity::from_metadata(&journal, &std::fs::metadata(&journal).unwrap());

        let mut ledger = PositionLedger::new();
        assert_eq!(ledger.offset_for(&identity), 0);
        ledger.set(&identity, 42);

        let ledger_path = dir.path().join("positions.json");
        ledger.persist(&ledger_path).unwrap();
        let reloaded = PositionLedger::load(&ledger_path).unwrap();
        assert_eq!(reloaded.offset_for(&identity), 42);
    }

    #[test]
    fn test_missing_ledger_file_is_empty_not_error() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = PositionLedger::load(&dir.path().join("absent.json")).unwrap();
        assert!(ledger.offsets.is_empty());
    }

    #[test]
    fn test_reset_forgets_offset() {
        let dir = tempfile::tempdir().unwrap();
        let journal = dir.path().join("journal.log");
        std::fs::write(&journal, b"line\n").unwrap();
        let identity =
            FileIdentity::from_metadata(&journal, &std::fs::metadata(&journal).unwrap());
        let mut ledger = PositionLedger::new();
        ledger.set(&identity, 99);
        ledger.reset(&identity);
        assert_eq!(ledger.offset_for(&identity), 0);
    }
}
