// SPDX-FileCopyrightText: 2026 Holdfast Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Collects queue events for assertions.

use std::time::Duration;

use holdfast_bus::{BusEvent, EventBus, EventName, QueueEvent};
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};

pub struct EventRecorder {
    rx: broadcast::Receiver<BusEvent>,
    seen: Vec<QueueEvent>,
}

impl EventRecorder {
    pub fn attach(bus: &EventBus) -> Self {
        Self {
            rx: bus.subscribe(),
            seen: Vec::new(),
        }
    }

    /// Everything received so far, oldest first.
    pub fn events(&mut self) -> &[QueueEvent] {
        self.pull();
        &self.seen
    }

    pub fn names(&mut self) -> Vec<EventName> {
        self.events().iter().map(QueueEvent::name).collect()
    }

    pub fn count(&mut self, name: EventName) -> usize {
        self.events().iter().filter(|e| e.name() == name).count()
    }

    pub fn clear(&mut self) {
        self.pull();
        self.seen.clear();
    }

    /// Wait until an event named `name` arrives, recording everything
    /// received on the way. Returns `None` on timeout.
    pub async fn wait_for(&mut self, name: EventName, timeout: Duration) -> Option<QueueEvent> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let received = tokio::time::timeout_at(deadline, self.rx.recv()).await.ok()?;
            match received {
                Ok(envelope) => {
                    self.seen.push(envelope.event.clone());
                    if envelope.event.name() == name {
                        return Some(envelope.event);
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "event recorder lagged");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    fn pull(&mut self) {
        loop {
            match self.rx.try_recv() {
                Ok(envelope) => self.seen.push(envelope.event),
                Err(TryRecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "event recorder lagged");
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => break,
            }
        }
    }
}
