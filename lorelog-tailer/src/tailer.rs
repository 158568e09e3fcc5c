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

//! The tailer poll loop
//!
//! One dedicated OS thread owns this loop and is the sole writer to file
//! positions, the event buffer, and the state projection. Each pass:
//! discover journal files, resolve the active file (draining a rotated-out
//! predecessor first), read complete new lines, and feed each through
//! decode → classify → store.
//!
//! Startup performs a backfill: historical files inside the lookback
//! window replay oldest-first through the same pipeline before live
//! polling begins, so the projection and buffer are populated without the
//! process having been running continuously.
//!
//! Nothing below this loop propagates an error into callers: per-line
//! failures become decode-failure records, per-file I/O problems are
//! logged and retried on the next pass. The only fatal conditions are
//! configuration errors raised from [`JournalTailer::new`] before the
//! loop exists.

use crate::discover::{discover, select_active, JournalFile};
use crate::position::{FileIdentity, FilePosition, PositionLedger};
use crate::reader::read_new_lines;
use lorelog_core::{classify, decode_line, RawRecord, Result, WatchConfig};
use lorelog_store::LoreStore;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, SystemTime};

/// Granularity at which the inter-pass sleep rechecks the shutdown flag.
const SHUTDOWN_POLL: Duration = Duration::from_millis(25);

/// Tailer over a journal directory, feeding a [`LoreStore`].
pub struct JournalTailer {
    config: WatchConfig,
    store: Arc<LoreStore>,
    ledger: PositionLedger,
    active: Option<FilePosition>,
    backfilled: bool,
}

impl JournalTailer {
    /// Validate configuration and build a tailer. This is the last point
    /// where an error can abort the subsystem; everything after is
    /// absorbed by the loop.
    pub fn new(config: WatchConfig, store: Arc<LoreStore>) -> Result<Self> {
        config.validate()?;
        config.journal_dir()?;

        let ledger = match &config.position_ledger {
            Some(path) => match PositionLedger::load(path) {
                Ok(ledger) => ledger,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e,
                        "position ledger unreadable, starting fresh");
                    PositionLedger::new()
                }
            },
            None => PositionLedger::new(),
        };

        Ok(Self {
            config,
            store,
            ledger,
            active: None,
            backfilled: false,
        })
    }

    /// Spawn the poll loop on its own thread.
    pub fn spawn(config: WatchConfig, store: Arc<LoreStore>) -> Result<TailerHandle> {
        let mut tailer = Self::new(config, store)?;
        let shutdown = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&shutdown);
        let join = std::thread::Builder::new()
            .name("lorelog-tailer".to_string())
            .spawn(move || tailer.run(&flag))?;
        Ok(TailerHandle {
            shutdown,
            join: Some(join),
        })
    }

    /// The loop: one backfill, then poll passes until shutdown.
    pub fn run(&mut self, shutdown: &AtomicBool) {
        tracing::info!(
            dir = %self.dir().display(),
            interval_ms = self.config.poll_interval_ms,
            "tailer starting"
        );
        while !shutdown.load(Ordering::Relaxed) {
            self.poll();
            sleep_interruptibly(self.config.poll_interval(), shutdown);
        }
        self.persist_ledger();
        tracing::info!("tailer stopped");
    }

    /// One polling pass. Returns the number of lines processed. All I/O
    /// problems are absorbed; the next pass retries.
    pub fn poll(&mut self) -> usize {
        if !self.backfilled {
            return self.backfill();
        }

        let files = discover(&self.dir());
        let Some(newest) = select_active(&files) else {
            return 0;
        };
        let newest = newest.clone();

        let mut processed = self.resolve_active(&newest);
        processed += self.read_active();
        self.persist_ledger();
        processed
    }

    /// Replay historical journal files inside the lookback window, oldest
    /// first, then begin tracking the active file. Runs the same pipeline
    /// as live polling.
    pub fn backfill(&mut self) -> usize {
        let dir = self.dir();
        let files = discover(&dir);
        let cutoff = SystemTime::now().checked_sub(self.config.backfill_window());
        let active_path = select_active(&files).map(|f| f.path.clone());

        let mut processed = 0;
        for file in &files {
            let is_active = Some(&file.path) == active_path.as_ref();
            let in_window = cutoff.is_none_or(|cutoff| file.modified >= cutoff);
            if !is_active && !in_window {
                tracing::debug!(path = %file.path.display(),
                    "outside backfill window, skipping");
                continue;
            }
            // Historical files are finalized: drain them fully, including
            // an unterminated last line. The active file keeps live
            // partial-line semantics.
            processed += self.ingest_file(&file.path, !is_active);
            if is_active {
                if let Ok(meta) = std::fs::metadata(&file.path) {
                    let identity = FileIdentity::from_metadata(&file.path, &meta);
                    let offset = self.ledger.offset_for(&identity);
                    self.active = Some(FilePosition { identity, offset });
                }
            }
        }

        self.backfilled = true;
        self.persist_ledger();
        tracing::info!(files = files.len(), lines = processed, "backfill complete");
        processed
    }

    /// Reconcile the tracked active file with discovery's newest file.
    /// Returns lines processed while draining a rotated-out predecessor.
    fn resolve_active(&mut self, newest: &JournalFile) -> usize {
        let mut drained = 0;

        let rotated_away = match &self.active {
            Some(pos) => pos.identity.path != newest.path,
            None => false,
        };
        if rotated_away {
            // The writer moved on to a new file. Finish the old one first
            // so its tail is never lost, then switch at offset zero.
            if let Some(pos) = self.active.take() {
                tracing::info!(
                    from = %pos.identity.path.display(),
                    to = %newest.path.display(),
                    "journal rotated, draining finalized file"
                );
                drained = self.ingest_file(&pos.identity.path, true);
            }
        }

        match std::fs::metadata(&newest.path) {
            Ok(meta) => match &mut self.active {
                Some(pos) if pos.identity.same_file(&meta) => {
                    if pos.truncated_by(&meta) {
                        tracing::warn!(path = %newest.path.display(),
                            offset = pos.offset, len = meta.len(),
                            "active file truncated, re-ingesting from start");
                        self.ledger.reset(&pos.identity);
                        pos.offset = 0;
                    }
                }
                Some(pos) => {
                    // Same path, different file: the position counter was
                    // reused. The old content is unreachable through this
                    // path, so tracking restarts at zero.
                    tracing::warn!(path = %newest.path.display(),
                        "active file replaced in place, restarting at offset 0");
                    self.ledger.reset(&pos.identity);
                    let identity = FileIdentity::from_metadata(&newest.path, &meta);
                    *pos = FilePosition::start_of(identity);
                }
                None => {
                    let identity = FileIdentity::from_metadata(&newest.path, &meta);
                    let offset = self.ledger.offset_for(&identity);
                    self.active = Some(FilePosition { identity, offset });
                }
            },
            Err(e) => {
                tracing::warn!(path = %newest.path.display(), error = %e,
                    "cannot stat active file, retrying next pass");
            }
        }

        drained
    }

    /// Read new complete lines from the tracked active file. Live reads
    /// never drain: a trailing fragment waits for the writer's next flush.
    fn read_active(&mut self) -> usize {
        let Some(pos) = &self.active else { return 0 };
        let (path, offset) = (pos.identity.path.clone(), pos.offset);
        match read_new_lines(&path, offset, false) {
            Ok(batch) => {
                let processed = self.pipeline(batch.records);
                if let Some(pos) = &mut self.active {
                    pos.offset = batch.new_offset;
                    let identity = pos.identity.clone();
                    self.ledger.set(&identity, batch.new_offset);
                }
                processed
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e,
                    "read failed, retrying next pass");
                0
            }
        }
    }

    /// Fully ingest one file from its ledger offset. Used for backfill and
    /// for draining rotated-out files.
    fn ingest_file(&mut self, path: &Path, drain: bool) -> usize {
        let meta = match std::fs::metadata(path) {
            Ok(meta) => meta,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e,
                    "cannot read journal file, skipping");
                return 0;
            }
        };
        let identity = FileIdentity::from_metadata(path, &meta);
        let mut offset = self.ledger.offset_for(&identity);
        if meta.len() < offset {
            tracing::warn!(path = %path.display(), offset, len = meta.len(),
                "stored offset beyond file end, re-ingesting from start");
            offset = 0;
        }
        match read_new_lines(path, offset, drain) {
            Ok(batch) => {
                let processed = self.pipeline(batch.records);
                self.ledger.set(&identity, batch.new_offset);
                processed
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e,
                    "cannot read journal file, skipping");
                0
            }
        }
    }

    /// Decode → classify → store, one line at a time. Failures become
    /// decode-failure records; the pipeline never stops mid-batch.
    fn pipeline(&self, records: Vec<RawRecord>) -> usize {
        let mut processed = 0;
        for raw in records {
            processed += 1;
            match decode_line(&raw) {
                Ok(Some(record)) => self.store.ingest(classify(&record)),
                Ok(None) => {}
                Err(failure) => self.store.record_decode_failure(failure),
            }
        }
        processed
    }

    fn persist_ledger(&self) {
        if let Some(path) = &self.config.position_ledger {
            if let Err(e) = self.ledger.persist(path) {
                tracing::warn!(path = %path.display(), error = %e,
                    "could not persist position ledger");
            }
        }
    }

    fn dir(&self) -> std::path::PathBuf {
        // new() verified presence; an empty default only appears in tests
        // that construct the tailer directly.
        self.config
            .journal_dir
            .clone()
            .unwrap_or_default()
    }
}

/// Handle to a running tailer thread.
pub struct TailerHandle {
    shutdown: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl TailerHandle {
    /// Request cooperative shutdown and wait for the in-flight pass to
    /// finish.
    pub fn shutdown(mut self) -> Result<()> {
        self.shutdown.store(true, Ordering::Relaxed);
        match self.join.take() {
            Some(join) => join
                .join()
                .map_err(|_| lorelog_core::LorelogError::TailerPanicked),
            None => Ok(()),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.join.as_ref().is_none_or(|j| j.is_finished())
    }
}

impl Drop for TailerHandle {
    fn drop(&mut self) {
        // Signal shutdown but do not block the dropping thread; the loop
        // notices the flag within one sleep granule.
        self.shutdown.store(true, Ordering::Relaxed);
    }
}

fn sleep_interruptibly(total: Duration, shutdown: &AtomicBool) {
    let mut remaining = total;
    while !remaining.is_zero() && !shutdown.load(Ordering::Relaxed) {
        let step = remaining.min(SHUTDOWN_POLL);
        std::thread::sleep(step);
        remaining -= step;
    }
}
