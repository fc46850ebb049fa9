// SPDX-License-Identifier: Apache-2.0

//! One invocation over a rotating set of files.

use tracing::{debug, info, warn};

use crate::budget::{Budget, ProcessStatus, Tally};
use crate::emitter::{EmitterTarget, ValueEmitter};
use crate::error::Result;
use crate::input::{CandidateFinder, FilePattern, Scan};
use crate::reader::{Pass, ReadMode};
use crate::rotation::{self, Resolution, RotationState};
use crate::source::LogSource;

/// Result of [`process_logrt`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRtOutcome {
    pub state: RotationState,
    pub parsed: u64,
    pub sent: u64,
    pub status: ProcessStatus,
}

/// Follow a rotating set of files matched by `pattern`.
///
/// Rotated-away files that still hold unread data are drained first, oldest
/// first, then the active file is read. All of them share `budget`. The
/// returned state replaces `state` for the next call.
///
/// Calls for the same item must not run concurrently.
pub fn process_logrt(
    pattern: &FilePattern,
    state: &RotationState,
    source: &LogSource,
    budget: Budget,
    target: &EmitterTarget,
    emitter: &mut dyn ValueEmitter,
) -> Result<LogRtOutcome> {
    let scan = CandidateFinder::new(pattern).scan()?;
    let resolution = rotation::resolve(state, &scan);
    let not_found = resolution == Resolution::NotFound;
    if not_found {
        debug!(pattern = pattern.as_str(), "No file matches the pattern");
    }

    let mut next = state.clone();
    next.apply(resolution);

    let mut tally = Tally::new(budget);
    {
        let mut pass = Pass::new(source, target, emitter, &mut tally);
        drain_pending(&mut pass, &mut next, &scan);
        // the active file is gone and nothing replaced it, keep its cursor
        let active = if not_found {
            Ok(())
        } else {
            read_active(&mut pass, &mut next)
        };
        if let Err(e) = active {
            if next == *state {
                return Err(e);
            }
            warn!(error = %e, "Active file unavailable, keeping progress on other files");
        }
    }

    next.retired.retain(|id| scan.contains(*id));

    let status = match tally.status() {
        ProcessStatus::UpToDate if not_found => ProcessStatus::NotFound,
        status => status,
    };
    Ok(LogRtOutcome {
        state: next,
        parsed: tally.parsed,
        sent: tally.sent,
        status,
    })
}

fn drain_pending(pass: &mut Pass<'_>, state: &mut RotationState, scan: &Scan) {
    let mut remaining = Vec::with_capacity(state.pending_drain.len());

    for mut tracked in std::mem::take(&mut state.pending_drain) {
        if pass.stopped() {
            remaining.push(tracked);
            continue;
        }

        let Some(id) = tracked.file_id() else {
            warn!(path = ?tracked.path, "Dropping rotated file without identity");
            continue;
        };
        let Some(path) = scan.locate(id) else {
            warn!(
                path = ?tracked.path,
                offset = tracked.cursor.size_processed,
                "Rotated file disappeared before it was fully read"
            );
            continue;
        };
        tracked.path = path.to_path_buf();

        match pass.read_file(&tracked.path, &tracked.cursor, ReadMode::Drain) {
            Ok(read) => {
                tracked.cursor = read.cursor;
                if read.reached_end {
                    info!(path = ?tracked.path, file_id = %id, "Rotated file fully read");
                    state.retired.push(id);
                } else {
                    remaining.push(tracked);
                }
            }
            Err(e) => {
                warn!(path = ?tracked.path, error = %e, "Cannot drain rotated file, will retry");
                remaining.push(tracked);
            }
        }
    }

    state.pending_drain = remaining;
}

fn read_active(pass: &mut Pass<'_>, state: &mut RotationState) -> Result<()> {
    if pass.stopped() {
        return Ok(());
    }
    let Some(active) = state.active.as_mut() else {
        return Ok(());
    };

    let read = pass.read_file(&active.path, &active.cursor, ReadMode::Active)?;
    active.cursor = read.cursor;
    Ok(())
}
