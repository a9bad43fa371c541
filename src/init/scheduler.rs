// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;
use std::time::Duration;
use tokio::select;
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::BoxError;
use crate::checks::Check;
use crate::event_queue::EventSender;
use crate::init::registry::Instance;
use crate::init::wait;

/// Runs every check instance on its own interval until cancelled.
pub struct Scheduler {
    instances: Vec<Instance>,
    shutdown_timeout: Duration,
}

impl Scheduler {
    pub fn new(instances: Vec<Instance>, shutdown_timeout: Duration) -> Self {
        Self {
            instances,
            shutdown_timeout,
        }
    }

    /// Initialize all instances, then gather until `cancel` fires. Instances
    /// that fail to initialize are logged and skipped. `queue` is dropped
    /// once every instance task has exited.
    pub async fn run(self, queue: EventSender, cancel: CancellationToken) -> Result<(), BoxError> {
        let mut tasks = JoinSet::new();

        for (n, instance) in self.instances.into_iter().enumerate() {
            let check = instance.check;
            let id = format!("{}#{}", check.name(), n);

            let init_check = check.clone();
            match tokio::task::spawn_blocking(move || init_check.init()).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    error!(check = %id, error = %e, "Failed to initialize check, skipping");
                    continue;
                }
                Err(e) => {
                    error!(check = %id, error = ?e, "Check panicked during init, skipping");
                    continue;
                }
            }

            info!(check = %id, interval = ?instance.interval, "Scheduling check");
            tasks.spawn(run_instance(
                id,
                check,
                instance.interval,
                queue.clone(),
                cancel.clone(),
            ));
        }
        drop(queue);

        if tasks.is_empty() {
            return Err("no check could be initialized".into());
        }

        let mut result = Ok(());
        select! {
            _ = cancel.cancelled() => {
                debug!("Scheduler cancellation signaled.");
            },
            e = wait::wait_for_any_task(&mut tasks) => {
                match e {
                    Ok(()) => warn!("Unexpected early exit of check task."),
                    Err(e) => result = Err(e),
                }
                cancel.cancel();
            }
        }

        wait::wait_for_tasks_with_timeout(&mut tasks, self.shutdown_timeout).await?;
        result
    }
}

async fn run_instance(
    id: String,
    check: Arc<dyn Check>,
    period: Duration,
    queue: EventSender,
    cancel: CancellationToken,
) -> Result<(), BoxError> {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        select! {
            _ = ticker.tick() => {
                let c = check.clone();
                let q = queue.clone();
                if let Err(e) = tokio::task::spawn_blocking(move || c.gather(&q)).await {
                    error!(check = %id, error = ?e, "Check panicked during gather");
                }
            },
            _ = cancel.cancelled() => break,
        }
    }

    let c = check.clone();
    tokio::task::spawn_blocking(move || c.shutdown())
        .await
        .map_err(|e| format!("{}: failed to shut down: {}", id, e))?;
    debug!(check = %id, "Check stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Event, Severity};
    use crate::event_queue;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingCheck {
        fail_init: bool,
        gathers: AtomicUsize,
        shut_down: AtomicBool,
    }

    impl Check for CountingCheck {
        fn name(&self) -> &str {
            "counting"
        }

        fn init(&self) -> Result<(), BoxError> {
            if self.fail_init {
                return Err("broken".into());
            }
            Ok(())
        }

        fn gather(&self, queue: &EventSender) {
            self.gathers.fetch_add(1, Ordering::SeqCst);
            queue.send(Event::new("counting", "self", Severity::Ok, "tick"));
        }

        fn shutdown(&self) {
            self.shut_down.store(true, Ordering::SeqCst);
        }
    }

    fn instance(check: Arc<CountingCheck>) -> Instance {
        Instance {
            check,
            interval: Duration::from_millis(10),
        }
    }

    #[tokio::test]
    async fn test_gathers_until_cancelled() {
        let good = Arc::new(CountingCheck::default());
        let bad = Arc::new(CountingCheck {
            fail_init: true,
            ..Default::default()
        });

        let (tx, rx) = event_queue::unbounded();
        let cancel = CancellationToken::new();
        let scheduler = Scheduler::new(
            vec![instance(good.clone()), instance(bad.clone())],
            Duration::from_secs(1),
        );

        let handle = tokio::spawn(scheduler.run(tx, cancel.clone()));
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();
        handle.await.unwrap().unwrap();

        assert!(good.gathers.load(Ordering::SeqCst) >= 1);
        assert!(good.shut_down.load(Ordering::SeqCst));
        assert_eq!(bad.gathers.load(Ordering::SeqCst), 0);
        assert!(!bad.shut_down.load(Ordering::SeqCst));

        // all senders are gone once the scheduler returns
        let events = rx.drain();
        assert_eq!(events.len(), good.gathers.load(Ordering::SeqCst));
        assert!(rx.recv_blocking().is_none());
    }

    #[tokio::test]
    async fn test_no_initialized_check_is_an_error() {
        let bad = Arc::new(CountingCheck {
            fail_init: true,
            ..Default::default()
        });
        let (tx, _rx) = event_queue::unbounded();

        let result = Scheduler::new(vec![instance(bad)], Duration::from_secs(1))
            .run(tx, CancellationToken::new())
            .await;
        assert!(result.is_err());
    }
}
