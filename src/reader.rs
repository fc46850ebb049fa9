// SPDX-License-Identifier: Apache-2.0

//! Incremental reading of one file from a persisted cursor.

use chrono::{DateTime, Utc};
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;
use tracing::{debug, info, warn};

use crate::budget::{Budget, ProcessStatus, Tally};
use crate::cursor::FileCursor;
use crate::emitter::{EmitterTarget, LogValue, ValueEmitter};
use crate::encoding::MAX_BOM_LEN;
use crate::error::{Error, Result};
use crate::input::FileId;
use crate::source::LogSource;
use crate::splitter::{LineSplitter, RecordKind};

/// Lower bound of the read chunk size.
const MIN_CHUNK_SIZE: usize = 64 * 1024;

/// Result of [`process_log`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogOutcome {
    pub cursor: FileCursor,
    pub parsed: u64,
    pub sent: u64,
    pub status: ProcessStatus,
}

/// Read new lines of a single file and send the matching values.
///
/// The returned cursor replaces `cursor` for the next call. When the file
/// cannot be opened an [`Error::Access`] is returned and the caller should
/// keep the old cursor.
///
/// Calls for the same item must not run concurrently.
pub fn process_log(
    path: &Path,
    cursor: &FileCursor,
    source: &LogSource,
    budget: Budget,
    target: &EmitterTarget,
    emitter: &mut dyn ValueEmitter,
) -> Result<LogOutcome> {
    let mut tally = Tally::new(budget);
    let read = Pass::new(source, target, emitter, &mut tally).read_file(
        path,
        cursor,
        ReadMode::Single,
    )?;

    Ok(LogOutcome {
        cursor: read.cursor,
        parsed: tally.parsed,
        sent: tally.sent,
        status: tally.status(),
    })
}

/// How a file is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReadMode {
    /// A fixed path. A different file at the path restarts from 0.
    Single,
    /// The active file of a rotating item. The identity must match.
    Active,
    /// A rotated-away file read to its very end, last unterminated line
    /// included.
    Drain,
}

impl ReadMode {
    fn strict_identity(self) -> bool {
        !matches!(self, ReadMode::Single)
    }

    fn flush_at_end(self) -> bool {
        matches!(self, ReadMode::Drain)
    }
}

#[derive(Debug)]
pub(crate) struct FileRead {
    pub cursor: FileCursor,
    /// Every byte of the file up to its size at open time was consumed.
    pub reached_end: bool,
}

/// Reading context of one invocation. The tally is shared by every file the
/// invocation reads.
pub(crate) struct Pass<'a> {
    source: &'a LogSource,
    target: &'a EmitterTarget,
    emitter: &'a mut dyn ValueEmitter,
    tally: &'a mut Tally,
}

impl<'a> Pass<'a> {
    pub(crate) fn new(
        source: &'a LogSource,
        target: &'a EmitterTarget,
        emitter: &'a mut dyn ValueEmitter,
        tally: &'a mut Tally,
    ) -> Self {
        Self {
            source,
            target,
            emitter,
            tally,
        }
    }

    pub(crate) fn stopped(&self) -> bool {
        self.tally.stopped()
    }

    pub(crate) fn read_file(
        &mut self,
        path: &Path,
        cursor: &FileCursor,
        mode: ReadMode,
    ) -> Result<FileRead> {
        let mut file = File::open(path).map_err(|e| Error::access(path, e))?;
        let metadata = file.metadata().map_err(|e| Error::access(path, e))?;
        let file_id = FileId::from_file(&file).map_err(|e| Error::access(path, e))?;
        let size = metadata.len();
        let mtime = metadata
            .modified()
            .map(|t| DateTime::<Utc>::from(t).timestamp())
            .unwrap_or(cursor.last_modified_time);

        let mut next = cursor.clone();
        match next.file_id {
            Some(id) if id != file_id => {
                if mode.strict_identity() {
                    return Err(Error::access(
                        path,
                        io::Error::new(io::ErrorKind::NotFound, "file was replaced"),
                    ));
                }
                info!(
                    path = ?path,
                    old = %id,
                    new = %file_id,
                    "Path now refers to a different file, reading from the start"
                );
                next.rewind();
            }
            _ => {}
        }
        next.file_id = Some(file_id);

        if size < next.size_processed {
            info!(
                path = ?path,
                offset = next.size_processed,
                size,
                "File was truncated, reading from the start"
            );
            next.rewind();
        }

        next.last_modified_time = mtime;

        if next.skip_old_data {
            debug!(path = ?path, size, "Skipping existing data");
            next.skip_old_data = false;
            next.size_processed = size;
            next.in_big_record = false;
            return Ok(FileRead {
                cursor: next,
                reached_end: true,
            });
        }

        if next.size_processed >= size {
            return Ok(FileRead {
                cursor: next,
                reached_end: true,
            });
        }

        let mut prefix = [0u8; MAX_BOM_LEN];
        let prefix_len = read_prefix(&mut file, &mut prefix).map_err(|e| Error::access(path, e))?;
        let (encoding, bom_len) = self.source.encoding().resolve(&prefix[..prefix_len]);
        if next.size_processed < bom_len as u64 {
            next.size_processed = bom_len as u64;
        }

        let splitter = LineSplitter::new(encoding, self.source.max_line_len());
        let start = next.size_processed;
        match self.read_lines(&mut file, path, &splitter, &mut next, size, mtime, mode) {
            Ok(()) => {}
            Err(e) if next.size_processed > start => {
                warn!(
                    path = ?path,
                    offset = next.size_processed,
                    error = %e,
                    "Read failed part way, keeping progress"
                );
            }
            Err(e) => return Err(Error::access(path, e)),
        }

        Ok(FileRead {
            reached_end: next.size_processed >= size,
            cursor: next,
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn read_lines(
        &mut self,
        file: &mut File,
        path: &Path,
        splitter: &LineSplitter,
        cursor: &mut FileCursor,
        mut size: u64,
        mtime: i64,
        mode: ReadMode,
    ) -> io::Result<()> {
        let chunk_len = MIN_CHUNK_SIZE.max(2 * splitter.max_line_len());
        let mut buf: Vec<u8> = Vec::with_capacity(chunk_len);
        // File offset of buf[0].
        let mut offset = cursor.size_processed;
        file.seek(SeekFrom::Start(offset))?;

        loop {
            let file_pos = offset + buf.len() as u64;
            let want = ((chunk_len - buf.len()) as u64).min(size - file_pos);
            if want > 0 {
                let got = fill(file, &mut buf, want as usize)?;
                if got < want as usize {
                    // shrank while reading, the next call sees the truncation
                    size = offset + buf.len() as u64;
                }
            }
            if buf.is_empty() {
                break;
            }

            let at_end = mode.flush_at_end() && offset + buf.len() as u64 >= size;
            let mut consumed = 0;
            for record in splitter.split(&buf, cursor.in_big_record, at_end) {
                if record.is_line() {
                    if !self.tally.admit() {
                        break;
                    }
                    let lastlogsize = offset + record.next as u64;
                    self.handle_line(
                        path,
                        splitter,
                        record.bytes,
                        record.is_truncated(),
                        lastlogsize,
                        mtime,
                    );
                }

                consumed = record.next;
                cursor.size_processed = offset + consumed as u64;
                cursor.in_big_record = matches!(
                    record.kind,
                    RecordKind::Oversized { continues: true }
                        | RecordKind::Remainder { finished: false }
                );

                if self.tally.emitter_failed {
                    break;
                }
            }

            buf.drain(..consumed);
            offset += consumed as u64;

            if self.tally.stopped() || offset + buf.len() as u64 >= size || consumed == 0 {
                break;
            }
        }

        Ok(())
    }

    fn handle_line(
        &mut self,
        path: &Path,
        splitter: &LineSplitter,
        bytes: &[u8],
        truncated: bool,
        lastlogsize: u64,
        mtime: i64,
    ) {
        self.tally.parsed += 1;

        if truncated {
            debug!(
                path = ?path,
                offset = lastlogsize,
                max_line_len = splitter.max_line_len(),
                "Line exceeds maximum length, truncated"
            );
        }

        let (text, had_errors) = splitter.encoding().decode(bytes);
        if had_errors {
            debug!(
                path = ?path,
                offset = lastlogsize,
                encoding = splitter.encoding().name(),
                "Malformed bytes replaced while decoding line"
            );
        }

        let Some(extracted) = self.source.matcher().apply(&text) else {
            return;
        };

        let value = LogValue {
            target: self.target,
            value: &extracted,
            lastlogsize,
            mtime,
            timestamp: Utc::now(),
            truncated,
        };
        match self.emitter.send(&value) {
            Ok(()) => self.tally.sent += 1,
            Err(e) => {
                warn!(
                    path = ?path,
                    key = %self.target.key,
                    offset = lastlogsize,
                    error = %e,
                    "Failed to send value"
                );
                self.tally.emitter_failed = true;
            }
        }
    }
}

/// Read the first bytes of the file for byte-order mark detection.
fn read_prefix(file: &mut File, prefix: &mut [u8; MAX_BOM_LEN]) -> io::Result<usize> {
    file.seek(SeekFrom::Start(0))?;
    let mut len = 0;
    while len < prefix.len() {
        match file.read(&mut prefix[len..]) {
            Ok(0) => break,
            Ok(n) => len += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(len)
}

/// Append up to `want` bytes to `buf`. Returns fewer only at end of file.
fn fill(file: &mut File, buf: &mut Vec<u8>, want: usize) -> io::Result<usize> {
    file.by_ref().take(want as u64).read_to_end(buf)
}
