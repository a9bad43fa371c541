// SPDX-License-Identifier: Apache-2.0

//! Persistence for per-path read positions.

mod json_file;
mod schema;

pub use json_file::JsonStateStore;
pub use schema::{FileState, StateMap};
