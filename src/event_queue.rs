// SPDX-License-Identifier: Apache-2.0

//! Unbounded, thread-safe result queue shared by all check instances.

use flume::{Receiver, Sender};

use crate::event::Event;

#[derive(Clone)]
pub struct EventSender {
    tx: Sender<Event>,
}

impl EventSender {
    /// Never blocks. Events are dropped (with a debug log) only when every
    /// receiver is gone, which happens during shutdown.
    pub fn send(&self, event: Event) {
        if let Err(e) = self.tx.send(event) {
            tracing::debug!(target = %e.0.target, "event queue closed, dropping event");
        }
    }

    pub fn len(&self) -> usize {
        self.tx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tx.is_empty()
    }
}

pub struct EventReceiver {
    rx: Receiver<Event>,
}

impl EventReceiver {
    pub async fn next(&mut self) -> Option<Event> {
        self.rx.recv_async().await.ok()
    }

    /// Blocking receive. Returns None once all senders are dropped.
    pub fn recv_blocking(&self) -> Option<Event> {
        self.rx.recv().ok()
    }

    /// Take everything currently queued without waiting.
    pub fn drain(&self) -> Vec<Event> {
        self.rx.try_iter().collect()
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

pub fn unbounded() -> (EventSender, EventReceiver) {
    let (tx, rx) = flume::unbounded::<Event>();
    (EventSender { tx }, EventReceiver { rx })
}
