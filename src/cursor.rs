// SPDX-License-Identifier: Apache-2.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::input::{CandidateFile, FileId};

/// Read position within one monitored file.
///
/// Cursors are owned by the caller: each invocation receives the previous
/// cursor and returns the next one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileCursor {
    /// Bytes consumed so far.
    pub size_processed: u64,
    /// Modification time seen at the last read, Unix seconds.
    pub last_modified_time: i64,
    /// Start at the end of the file on the next read instead of at 0.
    pub skip_old_data: bool,
    /// Identity of the file the offset belongs to.
    pub file_id: Option<FileId>,
    /// The offset is inside an oversized line whose rest is being skipped.
    pub in_big_record: bool,
}

impl FileCursor {
    pub fn new(skip_old_data: bool) -> Self {
        Self {
            skip_old_data,
            ..Default::default()
        }
    }

    /// Forget the position, e.g. after truncation.
    pub(crate) fn rewind(&mut self) {
        self.size_processed = 0;
        self.in_big_record = false;
    }
}

/// A file followed by a rotating item together with its cursor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedFile {
    /// Path the file was last seen at.
    pub path: PathBuf,
    pub cursor: FileCursor,
}

impl TrackedFile {
    /// Start following a newly found file.
    pub fn start(candidate: &CandidateFile, skip_old_data: bool) -> Self {
        let mut cursor = FileCursor::new(false);
        cursor.file_id = Some(candidate.file_id);
        cursor.last_modified_time = DateTime::<Utc>::from(candidate.modified).timestamp();
        if skip_old_data {
            cursor.size_processed = candidate.size;
        }
        Self {
            path: candidate.path.clone(),
            cursor,
        }
    }

    pub fn file_id(&self) -> Option<FileId> {
        self.cursor.file_id
    }
}
