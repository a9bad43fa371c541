// SPDX-License-Identifier: Apache-2.0

pub mod logfile;

use crate::BoxError;
use crate::event_queue::EventSender;

/// A periodically gathered host check.
///
/// Implementations are shared between the scheduler task and the blocking
/// pool, so every method takes `&self` and any mutable state lives behind
/// the implementation's own lock.
pub trait Check: Send + Sync {
    /// Plugin name, used for logging and as the `check` field of events
    fn name(&self) -> &str;

    /// Validate configuration and load persisted state. An instance that
    /// fails here is never scheduled.
    fn init(&self) -> Result<(), BoxError>;

    /// Run one cycle, pushing results to `queue`.
    fn gather(&self, queue: &EventSender);

    /// Called once when the agent stops.
    fn shutdown(&self);
}
