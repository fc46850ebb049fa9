// SPDX-License-Identifier: Apache-2.0

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// The monitored file could not be opened or inspected. The cursor is left
    /// untouched and the caller retries on its next poll.
    #[error("cannot access {path:?}: {source}")]
    Access {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid file pattern: {0}")]
    InvalidPattern(String),

    #[error("Unsupported encoding: {0}")]
    UnsupportedEncoding(String),

    #[error("Regex error: {0}")]
    Regex(String),
}

impl Error {
    pub(crate) fn access(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Access {
            path: path.into(),
            source,
        }
    }

    /// True when the error is a transient file access problem rather than a
    /// configuration mistake.
    pub fn is_access(&self) -> bool {
        matches!(self, Error::Access { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
