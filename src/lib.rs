// SPDX-License-Identifier: Apache-2.0

//! Incremental log file monitoring.
//!
//! [`process_log`] follows a single file and [`process_logrt`] follows a set of
//! rotating files. Both are called once per poll with the state returned by
//! the previous call, read whatever was appended since, and hand matching
//! lines to a [`ValueEmitter`].

pub mod budget;
pub mod config;
pub mod controller;
pub mod cursor;
pub mod emitter;
pub mod encoding;
pub mod error;
pub mod input;
pub mod matcher;
pub mod persistence;
pub mod reader;
pub mod rotation;
pub mod source;
pub mod splitter;

pub use budget::{Budget, ProcessStatus};
pub use config::{LogSourceConfig, RuleConfig};
pub use controller::{LogRtOutcome, process_logrt};
pub use cursor::{FileCursor, TrackedFile};
pub use emitter::{EmitError, EmitterTarget, LogValue, MemoryEmitter, ValueEmitter};
pub use encoding::{Encoding, EncodingSpec};
pub use error::{Error, Result};
pub use input::{FileId, FilePattern, PatternSyntax};
pub use matcher::{Disposition, ExtractionSpec, MatchRule, Matcher, RuleAction};
pub use persistence::{CursorStore, ItemState};
pub use reader::{LogOutcome, process_log};
pub use rotation::RotationState;
pub use source::LogSource;
