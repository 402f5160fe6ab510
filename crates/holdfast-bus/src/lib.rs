// SPDX-FileCopyrightText: 2026 Holdfast Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed event bus for the Holdfast offline queue.
//!
//! Two delivery paths share one [`EventBus`]:
//! - named handlers registered with [`EventBus::on`], called synchronously
//!   in registration order on the emitting task;
//! - a `tokio::sync::broadcast` stream from [`EventBus::subscribe`] for
//!   async consumers. Slow receivers lag and lose events rather than
//!   blocking the queue.

pub mod events;

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use tokio::sync::broadcast;
use tracing::{error, trace};

pub use events::{BusEvent, EventName, PruneReason, QueueEvent};

/// Capacity of the broadcast channel.
const BROADCAST_CAPACITY: usize = 256;

type Handler = Arc<dyn Fn(&QueueEvent) + Send + Sync>;

struct Registration {
    id: u64,
    name: EventName,
    handler: Handler,
}

struct BusInner {
    handlers: Mutex<Vec<Registration>>,
    next_id: AtomicU64,
    tx: broadcast::Sender<BusEvent>,
}

/// Cheaply cloneable handle to a queue's event bus.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            inner: Arc::new(BusInner {
                handlers: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(1),
                tx,
            }),
        }
    }

    /// Register `handler` for every event named `name`.
    ///
    /// The handler stays registered until [`Subscription::unsubscribe`] is
    /// called; dropping the subscription does not remove it.
    pub fn on<F>(&self, name: EventName, handler: F) -> Subscription
    where
        F: Fn(&QueueEvent) + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Registration {
                id,
                name,
                handler: Arc::new(handler),
            });
        Subscription {
            id,
            bus: Arc::downgrade(&self.inner),
        }
    }

    /// Receive every event as a [`BusEvent`] envelope.
    pub fn subscribe(&self) -> broadcast::Receiver<BusEvent> {
        self.inner.tx.subscribe()
    }

    /// Number of registered named handlers.
    pub fn handler_count(&self) -> usize {
        self.inner
            .handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Publish an event to named handlers and broadcast subscribers.
    ///
    /// A panicking handler is logged and skipped; it never reaches the
    /// emitter.
    pub fn emit(&self, event: QueueEvent) {
        let name = event.name();
        // Snapshot so handlers may register or unsubscribe while running.
        let matching: Vec<Handler> = self
            .inner
            .handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|r| r.name == name)
            .map(|r| Arc::clone(&r.handler))
            .collect();

        for handler in matching {
            if catch_unwind(AssertUnwindSafe(|| handler(&event))).is_err() {
                error!(event = %name, "event handler panicked");
            }
        }

        if self.inner.tx.send(BusEvent::new(event)).is_err() {
            trace!(event = %name, "no broadcast subscribers");
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("handlers", &self.handler_count())
            .field("receivers", &self.inner.tx.receiver_count())
            .finish()
    }
}

/// Handle returned by [`EventBus::on`].
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    bus: Weak<BusInner>,
}

impl Subscription {
    /// Remove the handler. Returns `false` if it was already gone.
    pub fn unsubscribe(self) -> bool {
        let Some(inner) = self.bus.upgrade() else {
            return false;
        };
        let mut handlers = inner.handlers.lock().unwrap_or_else(PoisonError::into_inner);
        let before = handlers.len();
        handlers.retain(|r| r.id != self.id);
        handlers.len() != before
    }
}
