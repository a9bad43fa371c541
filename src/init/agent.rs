// SPDX-License-Identifier: Apache-2.0

use std::io::Write;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::BoxError;
use crate::event_queue;
use crate::init::config::AgentConfig;
use crate::init::forward::forward_events;
use crate::init::registry::Registry;
use crate::init::scheduler::Scheduler;

pub struct Agent {
    config: AgentConfig,
    registry: Registry,
}

impl Agent {
    pub fn new(config: AgentConfig, registry: Registry) -> Self {
        Self { config, registry }
    }

    /// Run all configured checks until `agent_cancel` fires, writing events
    /// to `out` as JSON lines.
    pub async fn run<W>(self, out: W, agent_cancel: CancellationToken) -> Result<(), BoxError>
    where
        W: Write + Send + 'static,
    {
        let instances = self.config.build_instances(&self.registry)?;
        if instances.is_empty() {
            return Err("no checks configured".into());
        }

        info!(instances = instances.len(), "Starting hostcheck.");

        let (queue_tx, queue_rx) = event_queue::unbounded();
        let forwarder: JoinHandle<Result<usize, BoxError>> =
            tokio::task::spawn_blocking(move || forward_events(queue_rx, out));

        let shutdown_timeout = self.config.agent.shutdown_timeout;
        let result = Scheduler::new(instances, shutdown_timeout)
            .run(queue_tx, agent_cancel)
            .await;

        // the scheduler has dropped every sender, so the forwarder drains and exits
        match tokio::time::timeout(shutdown_timeout, forwarder).await {
            Err(_) => warn!("Timed out waiting for event forwarder to exit."),
            Ok(Err(e)) => warn!(error = ?e, "Failed to join event forwarder."),
            Ok(Ok(Err(e))) => warn!(error = %e, "Event forwarder failed."),
            Ok(Ok(Ok(n))) => info!(events = n, "Event forwarder finished."),
        }

        result
    }
}
