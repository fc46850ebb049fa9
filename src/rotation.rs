// SPDX-License-Identifier: Apache-2.0

//! Deciding which file of a rotating set is followed.
//!
//! Files are recognized by identity, never by name. A rotated-away file keeps
//! its identity under whatever name it was given, so it can still be drained
//! before it is forgotten.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use tracing::info;

use crate::cursor::TrackedFile;
use crate::input::{CandidateFile, FileId, Scan};

/// Persisted state of a rotating item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RotationState {
    /// Start at the end of the first file found instead of at 0.
    pub skip_old_data: bool,
    /// File currently being followed.
    pub active: Option<TrackedFile>,
    /// Rotated-away files with unread data, oldest first.
    pub pending_drain: Vec<TrackedFile>,
    /// Files read to their end. They are not picked up again while they exist.
    pub retired: Vec<FileId>,
    /// Modification time of the last file rotated away, Unix seconds. Older
    /// candidates are history and never become active.
    pub rotated_at: i64,
}

impl RotationState {
    pub fn new(skip_old_data: bool) -> Self {
        Self {
            skip_old_data,
            ..Default::default()
        }
    }

    fn is_known(&self, id: FileId) -> bool {
        self.retired.contains(&id)
            || self.pending_drain.iter().any(|t| t.file_id() == Some(id))
            || self.active.as_ref().and_then(TrackedFile::file_id) == Some(id)
    }

    /// Update the state with the outcome of [`resolve`].
    pub fn apply(&mut self, resolution: Resolution) {
        match resolution {
            Resolution::Same | Resolution::NotFound => {}
            Resolution::Start { next } => {
                info!(
                    path = ?next.path,
                    file_id = %next.file_id,
                    skip_old_data = self.skip_old_data,
                    "Started following file"
                );
                self.active = Some(TrackedFile::start(&next, self.skip_old_data));
                self.skip_old_data = false;
            }
            Resolution::Rotated { drain, next } => {
                if let Some(previous) = &self.active {
                    self.rotated_at = self.rotated_at.max(previous.cursor.last_modified_time);
                }
                for tracked in drain {
                    info!(
                        path = ?tracked.path,
                        offset = tracked.cursor.size_processed,
                        "File rotated, draining remaining data"
                    );
                    self.pending_drain.push(tracked);
                }
                self.active = next.map(|next| {
                    info!(path = ?next.path, file_id = %next.file_id, "Following rotated-in file");
                    TrackedFile::start(&next, false)
                });
            }
        }
    }
}

/// Outcome of comparing the state against a directory scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Nothing to change: the active file, if any, is still in place.
    Same,
    /// No file was followed; start with `next`.
    Start { next: CandidateFile },
    /// The active file left its path. It is drained if it still exists, along
    /// with files that were rotated in and out again since the last
    /// invocation, oldest first. `next` takes over when there is one.
    Rotated {
        drain: Vec<TrackedFile>,
        next: Option<CandidateFile>,
    },
    /// No file matches and the active file is gone.
    NotFound,
}

/// Work out what happened to the rotating set since the last invocation.
pub fn resolve(state: &RotationState, scan: &Scan) -> Resolution {
    let best = best_candidate(state, scan);

    let Some(active) = &state.active else {
        return match best {
            Some(next) => Resolution::Start { next },
            None if scan.candidates.is_empty() => Resolution::NotFound,
            None => Resolution::Same,
        };
    };

    let current = scan.identity_at(&active.path);
    let Some(id) = active.file_id() else {
        // a cursor that never saw its file adopts whatever is at the path
        return match current {
            Some(_) => Resolution::Same,
            None if best.is_none() => Resolution::NotFound,
            None => Resolution::Rotated {
                drain: Vec::new(),
                next: best,
            },
        };
    };

    if current == Some(id) {
        return Resolution::Same;
    }

    let mut drain: Vec<TrackedFile> = scan
        .locate(id)
        .map(|path| TrackedFile {
            path: path.to_path_buf(),
            cursor: active.cursor.clone(),
        })
        .into_iter()
        .collect();
    if drain.is_empty() && best.is_none() {
        return Resolution::NotFound;
    }

    // Files written after the active file was last seen, other than the new
    // active one, came and went between two invocations.
    let next_id = best.as_ref().map(|c| c.file_id);
    drain.extend(
        scan.candidates
            .iter()
            .filter(|c| !state.is_known(c.file_id) && Some(c.file_id) != next_id)
            .filter(|c| unix_seconds(c.modified) >= active.cursor.last_modified_time)
            .map(|c| TrackedFile::start(c, false)),
    );

    Resolution::Rotated { drain, next: best }
}

fn unix_seconds(time: SystemTime) -> i64 {
    DateTime::<Utc>::from(time).timestamp()
}

/// Newest candidate that is not already tracked and not older than the file
/// it would replace. Ties on modification time go to the lexicographically
/// largest path.
fn best_candidate(state: &RotationState, scan: &Scan) -> Option<CandidateFile> {
    let since = state
        .active
        .as_ref()
        .map_or(state.rotated_at, |active| {
            state.rotated_at.max(active.cursor.last_modified_time)
        });
    scan.candidates
        .iter()
        .filter(|c| !state.is_known(c.file_id))
        .filter(|c| unix_seconds(c.modified) >= since)
        .max_by(|a, b| (a.modified, &a.path).cmp(&(b.modified, &b.path)))
        .cloned()
}
