// SPDX-License-Identifier: Apache-2.0

//! Boundary between the engine and whatever forwards values to the collector.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Where values of an item are reported to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmitterTarget {
    pub server: String,
    pub port: u16,
    pub hostname: String,
    pub key: String,
}

impl EmitterTarget {
    pub fn new(
        server: impl Into<String>,
        port: u16,
        hostname: impl Into<String>,
        key: impl Into<String>,
    ) -> Self {
        Self {
            server: server.into(),
            port,
            hostname: hostname.into(),
            key: key.into(),
        }
    }
}

/// One extracted value with the metadata the transport needs.
#[derive(Debug, Clone)]
pub struct LogValue<'a> {
    pub target: &'a EmitterTarget,
    pub value: &'a str,
    /// File offset right after the line this value came from.
    pub lastlogsize: u64,
    /// Modification time of the file, Unix seconds.
    pub mtime: i64,
    pub timestamp: DateTime<Utc>,
    /// The line exceeded the maximum length and was cut.
    pub truncated: bool,
}

#[derive(Error, Debug)]
pub enum EmitError {
    #[error("value rejected: {0}")]
    Rejected(String),

    #[error("transport unavailable: {0}")]
    Unavailable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Receives values as they are extracted.
///
/// A failure ends the current invocation. The line that failed is still
/// counted as consumed.
pub trait ValueEmitter {
    fn send(&mut self, value: &LogValue<'_>) -> Result<(), EmitError>;
}

impl<F> ValueEmitter for F
where
    F: FnMut(&LogValue<'_>) -> Result<(), EmitError>,
{
    fn send(&mut self, value: &LogValue<'_>) -> Result<(), EmitError> {
        self(value)
    }
}

/// Owned copy of a value, as kept by [`MemoryEmitter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmittedValue {
    pub key: String,
    pub value: String,
    pub lastlogsize: u64,
    pub mtime: i64,
    pub truncated: bool,
}

/// Emitter that stores values in memory, optionally failing after a number
/// of accepted values.
#[derive(Debug, Default)]
pub struct MemoryEmitter {
    values: Vec<EmittedValue>,
    fail_after: Option<usize>,
}

impl MemoryEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept `n` values, then reject every value after them.
    pub fn fail_after(n: usize) -> Self {
        Self {
            values: Vec::new(),
            fail_after: Some(n),
        }
    }

    pub fn values(&self) -> &[EmittedValue] {
        &self.values
    }

    /// Just the value strings, in order.
    pub fn texts(&self) -> Vec<&str> {
        self.values.iter().map(|v| v.value.as_str()).collect()
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }
}

impl ValueEmitter for MemoryEmitter {
    fn send(&mut self, value: &LogValue<'_>) -> Result<(), EmitError> {
        if self.fail_after.is_some_and(|n| self.values.len() >= n) {
            return Err(EmitError::Unavailable("memory emitter limit reached".into()));
        }
        self.values.push(EmittedValue {
            key: value.target.key.clone(),
            value: value.value.to_string(),
            lastlogsize: value.lastlogsize,
            mtime: value.mtime,
            truncated: value.truncated,
        });
        Ok(())
    }
}
