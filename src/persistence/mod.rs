// SPDX-License-Identifier: Apache-2.0

//! Persistence of item state between agent runs.
//!
//! Uses JSON file storage with atomic writes.

mod schema;
mod store;

pub use schema::{ItemState, PersistedState, STATE_VERSION};
pub use store::CursorStore;
