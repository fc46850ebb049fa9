// SPDX-License-Identifier: Apache-2.0

//! On-disk layout of the cursor store.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::cursor::FileCursor;
use crate::rotation::RotationState;

/// Current schema version of the state document
pub const STATE_VERSION: u8 = 1;

/// Saved state of one item, tagged with the kind of item it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ItemState {
    /// A single fixed file
    Log(FileCursor),
    /// A rotating set of files
    Logrt(RotationState),
}

impl ItemState {
    pub fn as_log(&self) -> Option<&FileCursor> {
        match self {
            ItemState::Log(cursor) => Some(cursor),
            ItemState::Logrt(_) => None,
        }
    }

    pub fn as_logrt(&self) -> Option<&RotationState> {
        match self {
            ItemState::Logrt(state) => Some(state),
            ItemState::Log(_) => None,
        }
    }
}

/// The whole state document, keyed by item key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedState {
    pub version: u8,
    #[serde(default)]
    pub items: BTreeMap<String, ItemState>,
}

impl Default for PersistedState {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            items: BTreeMap::new(),
        }
    }
}
