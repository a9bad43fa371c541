// SPDX-License-Identifier: Apache-2.0

pub mod checks;
pub mod event;
pub mod event_queue;
pub mod filter;
pub mod init;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;
