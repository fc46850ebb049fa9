// SPDX-License-Identifier: Apache-2.0

use crate::encoding::EncodingSpec;
use crate::matcher::Matcher;

/// Default maximum line length in bytes.
pub const DEFAULT_MAX_LINE_LEN: usize = 256 * 1024;
/// Smallest accepted maximum line length.
pub const MIN_MAX_LINE_LEN: usize = 16;

/// Compiled settings of one monitored item, shared by every file it reads.
#[derive(Debug, Clone)]
pub struct LogSource {
    encoding: EncodingSpec,
    matcher: Matcher,
    max_line_len: usize,
}

impl Default for LogSource {
    fn default() -> Self {
        Self {
            encoding: EncodingSpec::Auto,
            matcher: Matcher::pass_all(),
            max_line_len: DEFAULT_MAX_LINE_LEN,
        }
    }
}

impl LogSource {
    pub fn new(encoding: EncodingSpec, matcher: Matcher) -> Self {
        Self {
            encoding,
            matcher,
            ..Default::default()
        }
    }

    pub fn with_max_line_len(mut self, max_line_len: usize) -> Self {
        self.max_line_len = max_line_len.max(MIN_MAX_LINE_LEN);
        self
    }

    pub fn encoding(&self) -> EncodingSpec {
        self.encoding
    }

    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    pub fn max_line_len(&self) -> usize {
        self.max_line_len
    }
}
