// SPDX-FileCopyrightText: 2026 Holdfast Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The [`OfflineQueue`] facade: enqueueing, draining, and the background
//! worker that reacts to connectivity, wake-ups and the retry timer.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use chrono::Utc;
use holdfast_bus::{BusEvent, EventBus, EventName, PruneReason, QueueEvent, Subscription};
use holdfast_config::HoldfastConfig;
use holdfast_core::{
    ExecutionError, HoldfastError, NewOperation, Operation, OperationId, OperationStatus,
    PendingMessage, Persistence, SubjectId,
};
use serde::Serialize;
use tokio::sync::{Mutex, Notify, broadcast};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::backoff::BackoffPolicy;
use crate::connectivity::ConnectivityMonitor;
use crate::executor::{Executor, Outcome};
use crate::store::{QueueStore, StoreLimits};

/// Tunables for one queue instance.
#[derive(Debug, Clone)]
pub struct QueueSettings {
    pub limits: StoreLimits,
    /// Age after which terminal operations are removed by cleanup.
    pub retention: chrono::Duration,
    pub storage_key: String,
    pub cascade_dependency_failures: bool,
    pub backoff: BackoffPolicy,
}

impl QueueSettings {
    pub fn from_config(config: &HoldfastConfig) -> Self {
        let queue = &config.queue;
        Self {
            limits: StoreLimits {
                max_size: queue.max_size,
                eviction_target: queue.eviction_target(),
                max_retries: queue.max_retries,
            },
            retention: queue.retention(),
            storage_key: queue.storage_key.clone(),
            cascade_dependency_failures: queue.cascade_dependency_failures,
            backoff: BackoffPolicy::from_config(&config.backoff),
        }
    }
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self::from_config(&HoldfastConfig::default())
    }
}

/// Tally of one drain pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DrainReport {
    pub attempted: usize,
    pub completed: usize,
    pub retried: usize,
    pub failed: usize,
    pub conflicted: usize,
    /// Dependents failed because a dependency failed or conflicted.
    pub cascaded: usize,
    /// Operations still owed an attempt after the pass.
    pub remaining: usize,
    pub next_retry_ms: Option<u64>,
    /// The pass stopped early because of an offline transition or stop.
    pub interrupted: bool,
}

pub struct OfflineQueueBuilder {
    settings: QueueSettings,
    persistence: Option<Arc<dyn Persistence>>,
    executor: Executor,
    connectivity: Option<ConnectivityMonitor>,
    bus: Option<EventBus>,
}

impl OfflineQueueBuilder {
    fn new() -> Self {
        Self {
            settings: QueueSettings::default(),
            persistence: None,
            executor: Executor::new(),
            connectivity: None,
            bus: None,
        }
    }

    pub fn settings(mut self, settings: QueueSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn persistence(mut self, persistence: Arc<dyn Persistence>) -> Self {
        self.persistence = Some(persistence);
        self
    }

    pub fn executor(mut self, executor: Executor) -> Self {
        self.executor = executor;
        self
    }

    /// Defaults to always online when unset.
    pub fn connectivity(mut self, monitor: ConnectivityMonitor) -> Self {
        self.connectivity = Some(monitor);
        self
    }

    /// Use an existing bus, so handlers registered on it see the `loaded`
    /// event emitted during [`build`](Self::build).
    pub fn event_bus(mut self, bus: EventBus) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Load the persisted queue and assemble the instance.
    ///
    /// The worker is not running yet; call [`OfflineQueue::start`].
    pub async fn build(self) -> Result<OfflineQueue, HoldfastError> {
        let persistence = self.persistence.ok_or_else(|| {
            HoldfastError::Config("offline queue requires a persistence backend".to_string())
        })?;
        let bus = self.bus.unwrap_or_default();
        let connectivity = self
            .connectivity
            .unwrap_or_else(ConnectivityMonitor::always_online);

        let (store, report) = QueueStore::load(
            persistence,
            self.settings.storage_key.clone(),
            self.settings.limits,
        )
        .await?;

        info!(
            key = %store.key(),
            loaded = report.loaded,
            reset = report.reset,
            dropped = report.dropped.len(),
            "queue loaded"
        );

        let queue = OfflineQueue {
            inner: Arc::new(Inner {
                settings: self.settings,
                store: Mutex::new(store),
                executor: self.executor,
                bus,
                connectivity,
                draining: AtomicBool::new(false),
                wake_seq: AtomicU64::new(0),
                drained_seq: AtomicU64::new(0),
                retry_at: StdMutex::new(None),
                wake: Notify::new(),
                reschedule: Notify::new(),
                shutdown: CancellationToken::new(),
                worker: StdMutex::new(None),
            }),
        };

        if report.needs_persist() {
            let store = queue.inner.store.lock().await;
            queue.persist(&store).await;
        }
        if !report.dropped.is_empty() {
            queue.inner.bus.emit(QueueEvent::QueuePruned {
                removed: report.dropped.clone(),
                reason: PruneReason::Exhausted,
            });
        }
        queue.inner.bus.emit(QueueEvent::Loaded {
            count: report.loaded,
            dropped: report.dropped.len(),
        });

        Ok(queue)
    }
}

struct Inner {
    settings: QueueSettings,
    store: Mutex<QueueStore>,
    executor: Executor,
    bus: EventBus,
    connectivity: ConnectivityMonitor,
    draining: AtomicBool,
    /// Bumped by every enqueue.
    wake_seq: AtomicU64,
    /// `wake_seq` as seen when the latest pass began.
    drained_seq: AtomicU64,
    retry_at: StdMutex<Option<Instant>>,
    /// Run a drain pass now.
    wake: Notify,
    /// The retry deadline changed; re-read it without draining.
    reschedule: Notify,
    shutdown: CancellationToken,
    worker: StdMutex<Option<JoinHandle<()>>>,
}

/// Durable queue of deferred operations.
///
/// Cloning is cheap; all clones share one store and one worker. The worker
/// keeps a clone alive until [`stop`](Self::stop) or
/// [`shutdown`](Self::shutdown) is called.
#[derive(Clone)]
pub struct OfflineQueue {
    inner: Arc<Inner>,
}

impl OfflineQueue {
    pub fn builder() -> OfflineQueueBuilder {
        OfflineQueueBuilder::new()
    }

    pub fn settings(&self) -> &QueueSettings {
        &self.inner.settings
    }

    /// Add an operation and return its id.
    ///
    /// Never fails: a persistence error is logged and reported through
    /// `persist-failed` while the operation stays queued in memory.
    pub async fn enqueue(&self, request: NewOperation) -> OperationId {
        let (operation, evicted) = {
            let mut store = self.inner.store.lock().await;
            let mut operation = Operation::from_request(request, Utc::now());
            while store.contains(&operation.id) {
                operation.id = OperationId::generate();
            }
            let evicted = store.insert(operation.clone());
            self.persist(&store).await;
            (operation, evicted)
        };

        if !evicted.is_empty() {
            info!(count = evicted.len(), "evicted operations to stay under the size cap");
            self.inner.bus.emit(QueueEvent::QueuePruned {
                removed: evicted,
                reason: PruneReason::Evicted,
            });
        }
        debug!(
            operation_id = %operation.id,
            kind = %operation.kind,
            priority = %operation.priority,
            "operation enqueued"
        );
        let id = operation.id.clone();
        self.inner.bus.emit(QueueEvent::Added { operation });

        self.inner.wake_seq.fetch_add(1, Ordering::SeqCst);
        if self.is_online() {
            self.inner.wake.notify_one();
        }
        id
    }

    /// Operations still owed an attempt.
    pub async fn pending_count(&self) -> usize {
        self.inner.store.lock().await.pending_count()
    }

    pub async fn list_by_subject(&self, subject: &SubjectId) -> Vec<Operation> {
        self.inner.store.lock().await.list_by_subject(subject)
    }

    pub async fn pending_messages_for_subject(&self, subject: &SubjectId) -> Vec<PendingMessage> {
        self.inner
            .store
            .lock()
            .await
            .pending_messages_for_subject(subject)
    }

    /// Every operation in processing order.
    pub async fn snapshot(&self) -> Vec<Operation> {
        self.inner.store.lock().await.operations().to_vec()
    }

    pub async fn remove(&self, id: &OperationId) -> bool {
        let mut store = self.inner.store.lock().await;
        if store.remove(id).is_none() {
            return false;
        }
        self.persist(&store).await;
        debug!(operation_id = %id, "operation removed");
        true
    }

    /// Remove every operation for `subject`, e.g. when its session is deleted.
    pub async fn remove_by_subject(&self, subject: &SubjectId) -> usize {
        let removed = {
            let mut store = self.inner.store.lock().await;
            let removed = store.remove_by_subject(subject);
            if removed > 0 {
                self.persist(&store).await;
            }
            removed
        };
        debug!(subject_id = %subject, removed, "subject cleared");
        self.inner.bus.emit(QueueEvent::SessionCleared {
            subject_id: subject.clone(),
            removed,
        });
        removed
    }

    /// Drop terminal operations older than the configured retention.
    pub async fn cleanup(&self) -> usize {
        self.cleanup_older_than(self.inner.settings.retention).await
    }

    pub async fn cleanup_older_than(&self, retention: chrono::Duration) -> usize {
        let expired = {
            let mut store = self.inner.store.lock().await;
            let expired = store.cleanup(retention, Utc::now());
            if !expired.is_empty() {
                self.persist(&store).await;
            }
            expired
        };
        if expired.is_empty() {
            return 0;
        }
        let count = expired.len();
        info!(count, "expired terminal operations removed");
        self.inner.bus.emit(QueueEvent::QueuePruned {
            removed: expired,
            reason: PruneReason::Expired,
        });
        count
    }

    pub fn is_online(&self) -> bool {
        self.inner.connectivity.is_online()
    }

    pub fn is_draining(&self) -> bool {
        self.inner.draining.load(Ordering::Acquire)
    }

    /// Run a drain pass now if online and no pass is running.
    ///
    /// Returns `None` when the pass was skipped.
    pub async fn force_process(&self) -> Option<DrainReport> {
        self.drain().await
    }

    /// Register a named event handler.
    pub fn on<F>(&self, name: EventName, handler: F) -> Subscription
    where
        F: Fn(&QueueEvent) + Send + Sync + 'static,
    {
        self.inner.bus.on(name, handler)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BusEvent> {
        self.inner.bus.subscribe()
    }

    pub fn events(&self) -> &EventBus {
        &self.inner.bus
    }

    /// Spawn the background worker. Calling it again is a no-op.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) {
        let mut worker = self
            .inner
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if worker.is_some() || self.inner.shutdown.is_cancelled() {
            return;
        }
        let queue = self.clone();
        *worker = Some(tokio::spawn(async move { queue.run_worker().await }));
    }

    /// Cancel the retry timer and stop the worker from starting new passes.
    ///
    /// An in-flight operation is allowed to finish. A stopped queue cannot
    /// be restarted.
    pub fn stop(&self) {
        self.inner.shutdown.cancel();
        self.set_retry_at(None);
    }

    /// [`stop`](Self::stop), then wait for the worker to exit.
    pub async fn shutdown(&self) {
        self.stop();
        let handle = self
            .inner
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(error = %e, "queue worker ended abnormally");
            }
        }
    }

    async fn run_worker(self) {
        let inner = &self.inner;
        let mut connectivity = inner.connectivity.receiver();
        let mut signal_open = true;
        info!(online = self.is_online(), "queue worker started");

        if self.is_online() {
            self.drain().await;
        }

        loop {
            let deadline = self.retry_at();
            tokio::select! {
                biased;
                _ = inner.shutdown.cancelled() => break,
                changed = connectivity.changed(), if signal_open => {
                    if changed.is_err() {
                        debug!("connectivity signal closed");
                        signal_open = false;
                        continue;
                    }
                    let online = *connectivity.borrow_and_update();
                    if online {
                        info!("connectivity restored");
                        inner.bus.emit(QueueEvent::Online);
                    } else {
                        info!("connectivity lost");
                        self.set_retry_at(None);
                        inner.bus.emit(QueueEvent::Offline);
                        continue;
                    }
                }
                _ = inner.wake.notified() => {
                    // A pass that began after the enqueue already saw it.
                    if inner.wake_seq.load(Ordering::Acquire)
                        <= inner.drained_seq.load(Ordering::Acquire)
                    {
                        continue;
                    }
                }
                _ = inner.reschedule.notified() => continue,
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    trace!("retry timer fired");
                }
            }
            self.drain().await;
        }

        info!("queue worker stopped");
    }

    async fn drain(&self) -> Option<DrainReport> {
        let inner = &self.inner;
        if inner.shutdown.is_cancelled() {
            return None;
        }
        if !self.is_online() {
            debug!("offline, drain skipped");
            return None;
        }
        if inner.draining.swap(true, Ordering::SeqCst) {
            trace!("drain already running");
            return None;
        }
        let guard = DrainGuard(&inner.draining);
        inner
            .drained_seq
            .store(inner.wake_seq.load(Ordering::SeqCst), Ordering::SeqCst);
        self.set_retry_at(None);

        let pending = inner.store.lock().await.pending_count();
        inner.bus.emit(QueueEvent::ProcessingStart { pending });
        debug!(pending, "drain started");

        let mut report = DrainReport::default();
        let mut attempted: HashSet<OperationId> = HashSet::new();

        loop {
            if inner.shutdown.is_cancelled() || !self.is_online() {
                report.interrupted = true;
                break;
            }
            let Some(operation) = self.begin_next(&attempted).await else {
                break;
            };
            attempted.insert(operation.id.clone());
            report.attempted += 1;
            debug!(
                operation_id = %operation.id,
                kind = %operation.kind,
                retry_count = operation.retry_count,
                "executing operation"
            );
            inner.bus.emit(QueueEvent::OperationStart {
                operation: operation.clone(),
            });

            let result = inner.executor.execute(&operation).await;
            let outcome = inner.executor.classify(
                result,
                operation.retry_count,
                inner.settings.limits.max_retries,
            );
            self.finish(&operation.id, outcome, &mut report).await;
        }

        let (remaining, max_retry_count) = {
            let store = inner.store.lock().await;
            (store.pending_count(), store.max_active_retry_count())
        };
        report.remaining = remaining;
        inner.bus.emit(QueueEvent::ProcessingEnd { pending: remaining });

        if remaining > 0 && self.is_online() && !inner.shutdown.is_cancelled() {
            let delay = inner.settings.backoff.delay(max_retry_count);
            self.set_retry_at(Some(Instant::now() + delay));
            inner.reschedule.notify_one();
            let delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
            report.next_retry_ms = Some(delay_ms);
            debug!(
                delay_ms,
                remaining,
                retry_count = max_retry_count,
                "retry scheduled"
            );
        }

        info!(
            attempted = report.attempted,
            completed = report.completed,
            retried = report.retried,
            failed = report.failed,
            conflicted = report.conflicted,
            remaining,
            "drain finished"
        );
        drop(guard);
        self.rerun_if_woken();
        Some(report)
    }

    /// Wake the worker again if an enqueue landed after this pass started.
    ///
    /// That enqueue's wake-up may have been spent on a drain call that was
    /// turned away while this pass still held the flag.
    fn rerun_if_woken(&self) {
        let inner = &self.inner;
        if inner.shutdown.is_cancelled() || !self.is_online() {
            return;
        }
        if inner.wake_seq.load(Ordering::SeqCst) > inner.drained_seq.load(Ordering::SeqCst) {
            trace!("operations enqueued during the pass, waking worker");
            inner.wake.notify_one();
        }
    }

    /// Pick the next eligible operation and mark it in flight.
    async fn begin_next(&self, attempted: &HashSet<OperationId>) -> Option<Operation> {
        let mut store = self.inner.store.lock().await;
        let id = store.next_eligible(attempted)?.id.clone();
        let now = Utc::now();
        let operation = store.update(&id, |op| {
            op.status = OperationStatus::Retrying;
            op.last_attempt_at = Some(now);
            op.retry_count += 1;
        })?;
        self.persist(&store).await;
        Some(operation)
    }

    /// Record the outcome of an attempt, persist, then publish.
    async fn finish(&self, id: &OperationId, outcome: Outcome, report: &mut DrainReport) {
        let mut events = Vec::new();
        {
            let mut store = self.inner.store.lock().await;
            match outcome {
                Outcome::Completed => {
                    let Some(mut operation) = store.remove(id) else {
                        debug!(operation_id = %id, "operation removed while in flight");
                        return;
                    };
                    operation.status = OperationStatus::Completed;
                    report.completed += 1;
                    debug!(operation_id = %id, "operation completed");
                    events.push(QueueEvent::OperationCompleted { operation });
                }
                Outcome::Conflict(error) => {
                    let Some(operation) = store.update(id, |op| {
                        op.status = OperationStatus::Conflicted;
                        op.last_error = Some(error.message.clone());
                    }) else {
                        debug!(operation_id = %id, "operation removed while in flight");
                        return;
                    };
                    report.conflicted += 1;
                    warn!(
                        operation_id = %id,
                        kind = %operation.kind,
                        status = ?error.status,
                        error = %error.message,
                        "operation conflicted"
                    );
                    events.push(QueueEvent::OperationConflict { operation, error });
                    self.cascade(&mut store, id, &mut events, report);
                }
                Outcome::Failed(error) => {
                    let Some(operation) = store.update(id, |op| {
                        op.status = OperationStatus::Failed;
                        op.last_error = Some(error.message.clone());
                    }) else {
                        debug!(operation_id = %id, "operation removed while in flight");
                        return;
                    };
                    report.failed += 1;
                    warn!(
                        operation_id = %id,
                        kind = %operation.kind,
                        retry_count = operation.retry_count,
                        error = %error.message,
                        "operation failed"
                    );
                    events.push(QueueEvent::OperationFailed { operation, error });
                    self.cascade(&mut store, id, &mut events, report);
                }
                Outcome::Retry(error) => {
                    let Some(operation) = store.update(id, |op| {
                        op.status = OperationStatus::Pending;
                        op.last_error = Some(error.message.clone());
                    }) else {
                        debug!(operation_id = %id, "operation removed while in flight");
                        return;
                    };
                    report.retried += 1;
                    debug!(
                        operation_id = %id,
                        retry_count = operation.retry_count,
                        error = %error.message,
                        "operation will be retried"
                    );
                    events.push(QueueEvent::OperationRetry { operation, error });
                }
            }
            self.persist(&store).await;
        }

        for event in events {
            self.inner.bus.emit(event);
        }
    }

    /// Fail pending operations that can no longer have their dependency
    /// satisfied.
    fn cascade(
        &self,
        store: &mut QueueStore,
        dependency: &OperationId,
        events: &mut Vec<QueueEvent>,
        report: &mut DrainReport,
    ) {
        if !self.inner.settings.cascade_dependency_failures {
            return;
        }
        for dependent in store.pending_dependents(dependency) {
            let message = format!("dependency {dependency} did not complete");
            let Some(operation) = store.update(&dependent, |op| {
                op.status = OperationStatus::Failed;
                op.last_error = Some(message.clone());
            }) else {
                continue;
            };
            report.cascaded += 1;
            warn!(
                operation_id = %dependent,
                dependency = %dependency,
                "dependent operation failed"
            );
            events.push(QueueEvent::OperationFailed {
                operation,
                error: ExecutionError::terminal(message),
            });
        }
    }

    async fn persist(&self, store: &QueueStore) {
        if let Err(e) = store.persist().await {
            error!(key = %store.key(), error = %e, "failed to persist queue");
            self.inner.bus.emit(QueueEvent::PersistFailed {
                message: e.to_string(),
            });
        }
    }

    fn retry_at(&self) -> Option<Instant> {
        *self
            .inner
            .retry_at
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn set_retry_at(&self, at: Option<Instant>) {
        *self
            .inner
            .retry_at
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = at;
    }
}

impl std::fmt::Debug for OfflineQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OfflineQueue")
            .field("settings", &self.inner.settings)
            .field("online", &self.is_online())
            .field("draining", &self.is_draining())
            .finish()
    }
}

struct DrainGuard<'a>(&'a AtomicBool);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}
