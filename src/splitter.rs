// SPDX-License-Identifier: Apache-2.0

//! Splitting of raw file bytes into log lines.
//!
//! The splitter works on undecoded bytes so that every record can report
//! exactly how far into the buffer it reaches. The reader advances the file
//! cursor by those offsets only, which keeps it on line boundaries.

use crate::encoding::Encoding;

/// What a record represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    /// A complete line, terminator and trailing carriage return removed.
    Line,
    /// The head of a line longer than the maximum length. When `continues` is
    /// set the terminator has not been seen yet and the rest of the line must
    /// be skipped on later reads.
    Oversized { continues: bool },
    /// Bytes of an oversized line that are skipped. `finished` is set once the
    /// terminator was consumed.
    Remainder { finished: bool },
}

/// One record found in a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Record<'a> {
    pub bytes: &'a [u8],
    /// Buffer offset where the record starts.
    pub start: usize,
    /// Buffer offset right after the record, including its terminator.
    pub next: usize,
    pub kind: RecordKind,
}

impl Record<'_> {
    /// Whether this record produces a value for the matcher.
    pub fn is_line(&self) -> bool {
        !matches!(self.kind, RecordKind::Remainder { .. })
    }

    pub fn is_truncated(&self) -> bool {
        matches!(self.kind, RecordKind::Oversized { .. })
    }
}

#[derive(Debug, Clone)]
pub struct LineSplitter {
    encoding: Encoding,
    max_line_len: usize,
}

impl LineSplitter {
    /// Create a splitter. The maximum length is rounded down to a whole number
    /// of code units, and is at least one unit.
    pub fn new(encoding: Encoding, max_line_len: usize) -> Self {
        let width = encoding.unit_width();
        let max_line_len = (max_line_len / width * width).max(width);
        Self {
            encoding,
            max_line_len,
        }
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    pub fn max_line_len(&self) -> usize {
        self.max_line_len
    }

    /// Iterate over the records of `buf`.
    ///
    /// `in_big_record` states that `buf` starts in the middle of an oversized
    /// line. With `at_end` set, `buf` holds the final bytes the file will ever
    /// have, so an unterminated last line is returned instead of being left
    /// for a later read.
    pub fn split<'s, 'a>(
        &'s self,
        buf: &'a [u8],
        in_big_record: bool,
        at_end: bool,
    ) -> Records<'s, 'a> {
        Records {
            splitter: self,
            buf,
            pos: 0,
            in_big_record,
            at_end,
            done: false,
        }
    }

    /// Position of the next line feed at or after `from`, on unit boundaries.
    fn find_lf(&self, buf: &[u8], from: usize) -> Option<usize> {
        let lf = self.encoding.lf();
        if lf.len() == 1 {
            return buf[from..]
                .iter()
                .position(|b| *b == lf[0])
                .map(|i| from + i);
        }

        let width = lf.len();
        let mut i = from;
        while i + width <= buf.len() {
            if &buf[i..i + width] == lf {
                return Some(i);
            }
            i += width;
        }
        None
    }

    fn strip_cr<'a>(&self, line: &'a [u8]) -> &'a [u8] {
        line.strip_suffix(self.encoding.cr()).unwrap_or(line)
    }
}

/// Lazy iterator over the records of one buffer.
pub struct Records<'s, 'a> {
    splitter: &'s LineSplitter,
    buf: &'a [u8],
    pos: usize,
    in_big_record: bool,
    at_end: bool,
    done: bool,
}

impl Records<'_, '_> {
    /// Bytes of the buffer covered by the records returned so far.
    pub fn consumed(&self) -> usize {
        self.pos
    }

    /// Whether the buffer ended inside an oversized line.
    pub fn in_big_record(&self) -> bool {
        self.in_big_record
    }
}

impl<'a> Iterator for Records<'_, 'a> {
    type Item = Record<'a>;

    fn next(&mut self) -> Option<Record<'a>> {
        if self.done {
            return None;
        }

        let width = self.splitter.encoding.unit_width();
        let max = self.splitter.max_line_len;
        let start = self.pos;
        // A trailing partial code unit can only be part of a line once nothing
        // more will be written.
        let end = if self.at_end {
            self.buf.len()
        } else {
            start + (self.buf.len() - start) / width * width
        };

        if start >= end {
            self.done = true;
            return None;
        }

        let lf = self.splitter.find_lf(&self.buf[..end], start);

        if self.in_big_record {
            let (next, finished) = match lf {
                Some(i) => (i + width, true),
                None => (end, self.at_end),
            };
            self.pos = next;
            self.in_big_record = !finished;
            if !finished {
                self.done = true;
            }
            return Some(Record {
                bytes: &self.buf[start..lf.unwrap_or(end)],
                start,
                next,
                kind: RecordKind::Remainder { finished },
            });
        }

        let record = match lf {
            Some(i) if i - start > max => Record {
                bytes: &self.buf[start..start + max],
                start,
                next: i + width,
                kind: RecordKind::Oversized { continues: false },
            },
            Some(i) => Record {
                bytes: self.splitter.strip_cr(&self.buf[start..i]),
                start,
                next: i + width,
                kind: RecordKind::Line,
            },
            None if end - start > max => {
                self.in_big_record = !self.at_end;
                Record {
                    bytes: &self.buf[start..start + max],
                    start,
                    next: end,
                    kind: RecordKind::Oversized {
                        continues: !self.at_end,
                    },
                }
            }
            None if self.at_end => Record {
                bytes: self.splitter.strip_cr(&self.buf[start..end]),
                start,
                next: end,
                kind: RecordKind::Line,
            },
            None => {
                // incomplete line, wait for more data
                self.done = true;
                return None;
            }
        };

        self.pos = record.next;
        Some(record)
    }
}
