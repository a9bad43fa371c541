// SPDX-License-Identifier: Apache-2.0

pub mod agent;
pub mod args;
pub mod config;
pub mod forward;
pub mod logfile_check;
pub mod parse;
pub mod registry;
pub mod scheduler;
pub mod wait;
