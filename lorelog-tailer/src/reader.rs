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

//! Incremental line reads
//!
//! Reads the bytes appended to a journal file since a stored offset and
//! splits them into complete lines. The returned offset only ever advances
//! past the last complete line boundary: a trailing fragment the writer
//! has not finished flushing stays unread and is picked up whole on a
//! later pass. Advancing past an incomplete line would lose that record
//! permanently, which is the primary correctness hazard of tailing.

use lorelog_core::RawRecord;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

/// Result of one incremental read.
#[derive(Debug)]
pub struct ReadBatch {
    /// Complete lines, in file order, with their starting byte offsets.
    pub records: Vec<RawRecord>,
    /// Offset of the first unconsumed byte; the caller stores this as the
    /// file's new position.
    pub new_offset: u64,
}

impl ReadBatch {
    fn empty(offset: u64) -> Self {
        Self {
            records: Vec::new(),
            new_offset: offset,
        }
    }
}

/// Read the complete lines appended past `start`.
///
/// With `drain` set the file is treated as finalized (rotated out): a
/// trailing line without a newline is emitted anyway, because no writer
/// will ever complete it.
pub fn read_new_lines(path: &Path, start: u64, drain: bool) -> std::io::Result<ReadBatch> {
    let mut file = File::open(path)?;
    let len = file.metadata()?.len();
    if len <= start {
        return Ok(ReadBatch::empty(start));
    }

    file.seek(SeekFrom::Start(start))?;
    let mut buf = Vec::with_capacity((len - start) as usize);
    file.take(len - start).read_to_end(&mut buf)?;

    let mut records = Vec::new();
    let mut line_start = 0usize;
    for (i, byte) in buf.iter().enumerate() {
        if *byte == b'\n' {
            records.push(make_record(path, start, &buf, line_start, i));
            line_start = i + 1;
        }
    }

    let mut new_offset = start + line_start as u64;
    if drain && line_start < buf.len() {
        records.push(make_record(path, start, &buf, line_start, buf.len()));
        new_offset = start + buf.len() as u64;
    }

    Ok(ReadBatch {
        records,
        new_offset,
    })
}

fn make_record(path: &Path, base: u64, buf: &[u8], from: usize, to: usize) -> RawRecord {
    let mut end = to;
    if end > from && buf[end - 1] == b'\r' {
        end -= 1;
    }
    RawRecord::new(path, base + from as u64, buf[from..end].to_vec())
}
