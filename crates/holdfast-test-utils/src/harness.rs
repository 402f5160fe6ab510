// SPDX-FileCopyrightText: 2026 Holdfast Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end queue tests.
//!
//! `TestHarness` assembles an [`OfflineQueue`] over in-memory persistence,
//! a manually driven connectivity signal and a [`ScriptedHandler`] for
//! every operation kind. The persisted slot survives
//! [`restart`](TestHarness::restart), so recovery can be exercised.

use std::sync::Arc;

use holdfast_bus::EventBus;
use holdfast_core::{HoldfastError, NewOperation, OperationKind, Priority};
use holdfast_queue::{
    BackoffPolicy, Executor, ManualConnectivity, OfflineQueue, QueueSettings, codec,
};

use crate::events::EventRecorder;
use crate::mock_handler::ScriptedHandler;
use crate::mock_persistence::FlakyStore;

/// Builder for [`TestHarness`].
pub struct TestHarnessBuilder {
    settings: QueueSettings,
    online: bool,
    handler: ScriptedHandler,
    start_worker: bool,
    store: FlakyStore,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        let settings = QueueSettings {
            backoff: BackoffPolicy::default().without_jitter(),
            ..QueueSettings::default()
        };
        Self {
            settings,
            online: true,
            handler: ScriptedHandler::new(),
            start_worker: false,
            store: FlakyStore::default(),
        }
    }

    pub fn settings(mut self, settings: QueueSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.settings.limits.max_retries = max_retries;
        self
    }

    pub fn max_size(mut self, max_size: usize, eviction_target: usize) -> Self {
        self.settings.limits.max_size = max_size;
        self.settings.limits.eviction_target = eviction_target;
        self
    }

    pub fn cascade(mut self, enabled: bool) -> Self {
        self.settings.cascade_dependency_failures = enabled;
        self
    }

    pub fn online(mut self, online: bool) -> Self {
        self.online = online;
        self
    }

    /// Handler used for every operation kind.
    pub fn handler(mut self, handler: ScriptedHandler) -> Self {
        self.handler = handler;
        self
    }

    /// Spawn the background worker after building.
    pub fn started(mut self) -> Self {
        self.start_worker = true;
        self
    }

    /// Reuse persisted state, e.g. slots seeded before the queue exists.
    pub fn store(mut self, store: FlakyStore) -> Self {
        self.store = store;
        self
    }

    pub async fn build(self) -> Result<TestHarness, HoldfastError> {
        let connectivity = Arc::new(ManualConnectivity::new(self.online));
        let bus = EventBus::new();
        let recorder = EventRecorder::attach(&bus);
        let queue = build_queue(
            &self.settings,
            &self.store,
            &connectivity,
            &self.handler,
            bus,
        )
        .await?;
        if self.start_worker {
            queue.start();
        }
        Ok(TestHarness {
            queue,
            connectivity,
            handler: self.handler,
            store: self.store,
            recorder,
            settings: self.settings,
        })
    }
}

async fn build_queue(
    settings: &QueueSettings,
    store: &FlakyStore,
    connectivity: &ManualConnectivity,
    handler: &ScriptedHandler,
    bus: EventBus,
) -> Result<OfflineQueue, HoldfastError> {
    let mut executor = Executor::new();
    for kind in OperationKind::ALL {
        executor.register(kind, Arc::new(handler.clone()));
    }
    OfflineQueue::builder()
        .settings(settings.clone())
        .persistence(Arc::new(store.clone()))
        .executor(executor)
        .connectivity(connectivity.monitor())
        .event_bus(bus)
        .build()
        .await
}

/// A queue plus handles on every collaborator it was built with.
pub struct TestHarness {
    pub queue: OfflineQueue,
    pub connectivity: Arc<ManualConnectivity>,
    pub handler: ScriptedHandler,
    pub store: FlakyStore,
    pub recorder: EventRecorder,
    settings: QueueSettings,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    pub async fn new() -> Result<Self, HoldfastError> {
        Self::builder().build().await
    }

    pub fn settings(&self) -> &QueueSettings {
        &self.settings
    }

    /// Enqueue a medium priority `update-session` for `subject`.
    pub async fn enqueue_update(&self, subject: &str) -> holdfast_core::OperationId {
        self.queue
            .enqueue(NewOperation::new(
                OperationKind::UpdateSession,
                subject,
                serde_json::json!({"title": format!("title for {subject}")}),
            ))
            .await
    }

    pub async fn enqueue_with_priority(
        &self,
        kind: OperationKind,
        subject: &str,
        priority: Priority,
    ) -> holdfast_core::OperationId {
        self.queue
            .enqueue(NewOperation::new(kind, subject, serde_json::json!({})).priority(priority))
            .await
    }

    /// Raw persisted slot as JSON.
    pub async fn persisted(&self) -> Option<serde_json::Value> {
        let bytes = self
            .store
            .memory()
            .get(&self.settings.storage_key)
            .await?;
        serde_json::from_slice(&bytes).ok()
    }

    /// Operations decoded from the persisted slot.
    pub async fn persisted_operations(&self) -> Vec<holdfast_core::Operation> {
        match self.store.memory().get(&self.settings.storage_key).await {
            Some(bytes) => codec::decode(&bytes)
                .map(|d| d.operations)
                .unwrap_or_default(),
            None => Vec::new(),
        }
    }

    /// Stop the current queue and build a fresh one over the same storage,
    /// connectivity and handler, as a process restart would.
    pub async fn restart(&mut self) -> Result<(), HoldfastError> {
        self.queue.shutdown().await;
        let bus = EventBus::new();
        self.recorder = EventRecorder::attach(&bus);
        self.queue = build_queue(
            &self.settings,
            &self.store,
            &self.connectivity,
            &self.handler,
            bus,
        )
        .await?;
        Ok(())
    }
}

impl Drop for TestHarness {
    fn drop(&mut self) {
        self.queue.stop();
    }
}
