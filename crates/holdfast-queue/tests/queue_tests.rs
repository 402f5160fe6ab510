// SPDX-FileCopyrightText: 2026 Holdfast Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the offline queue.
//!
//! Each test builds an isolated TestHarness over in-memory storage with a
//! manually driven connectivity signal. Tests that involve timers run on
//! paused tokio time.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use holdfast_bus::{EventName, PruneReason, QueueEvent};
use holdfast_core::{
    ErrorKind, ExecutionError, HttpMethod, NewOperation, Operation, OperationId, OperationKind,
    OperationStatus, Priority, SubjectId,
};
use holdfast_http::BearerAuth;
use holdfast_queue::{
    ApiClient, Executor, ManualConnectivity, OfflineQueue, OperationHandler, QueueSettings,
    chat_executor, codec,
};
use holdfast_storage::MemoryStore;
use holdfast_test_utils::{FlakyStore, MockTransport, ScriptedHandler, TestHarness};

const WAIT: Duration = Duration::from_secs(120);

fn stored_operation(kind: OperationKind, subject: &str, age: chrono::Duration) -> Operation {
    Operation::from_request(
        NewOperation::new(kind, subject, serde_json::json!({})),
        Utc::now() - age,
    )
}

async fn seeded_store(operations: &[Operation]) -> FlakyStore {
    let memory = MemoryStore::new();
    memory
        .put(
            &QueueSettings::default().storage_key,
            codec::encode(operations).unwrap(),
        )
        .await;
    FlakyStore::new(memory)
}

// ---- Test 1: Identity ----

#[tokio::test]
async fn test_enqueued_ids_are_unique() {
    let harness = TestHarness::builder().online(false).build().await.unwrap();

    let mut ids = HashSet::new();
    for i in 0..50 {
        ids.insert(harness.enqueue_update(&format!("s-{i}")).await);
    }

    assert_eq!(ids.len(), 50);
    assert_eq!(harness.queue.pending_count().await, 50);
}

// ---- Test 2: Ordering and dependencies ----

#[tokio::test]
async fn test_drain_follows_priority_order() {
    let harness = TestHarness::new().await.unwrap();
    let low = harness
        .enqueue_with_priority(OperationKind::PinSession, "s", Priority::Low)
        .await;
    let medium = harness
        .enqueue_with_priority(OperationKind::PinSession, "s", Priority::Medium)
        .await;
    let high = harness
        .enqueue_with_priority(OperationKind::PinSession, "s", Priority::High)
        .await;

    let report = harness.queue.force_process().await.unwrap();

    assert_eq!(report.completed, 3);
    assert_eq!(harness.handler.executed_ids(), vec![high, medium, low]);
    assert!(harness.queue.snapshot().await.is_empty());
}

#[tokio::test]
async fn test_dependent_runs_after_its_dependency() {
    let harness = TestHarness::new().await.unwrap();
    let parent = harness
        .queue
        .enqueue(NewOperation::new(
            OperationKind::CreateSession,
            "s-1",
            serde_json::json!({"title": "new chat"}),
        ))
        .await;
    let child = harness
        .queue
        .enqueue(
            NewOperation::new(
                OperationKind::SendMessage,
                "s-1",
                serde_json::json!({"content": "first!"}),
            )
            .priority(Priority::High)
            .depends_on([parent.clone()]),
        )
        .await;

    harness.queue.force_process().await.unwrap();

    assert_eq!(harness.handler.executed_ids(), vec![parent, child]);
}

#[tokio::test]
async fn test_failed_dependency_cascades_to_dependents() {
    let mut harness = TestHarness::builder()
        .handler(ScriptedHandler::with_script(vec![Err(
            ExecutionError::terminal("rejected").with_status(400),
        )]))
        .build()
        .await
        .unwrap();
    let parent = harness.enqueue_update("s-1").await;
    let child = harness
        .queue
        .enqueue(
            NewOperation::new(OperationKind::PinSession, "s-1", serde_json::json!({}))
                .depends_on([parent.clone()]),
        )
        .await;
    let grandchild = harness
        .queue
        .enqueue(
            NewOperation::new(OperationKind::ArchiveSession, "s-1", serde_json::json!({}))
                .depends_on([child.clone()]),
        )
        .await;

    let report = harness.queue.force_process().await.unwrap();

    assert_eq!(report.failed, 1);
    assert_eq!(report.cascaded, 2);
    assert_eq!(harness.handler.executed_ids(), vec![parent.clone()]);
    let snapshot = harness.queue.snapshot().await;
    for id in [&child, &grandchild] {
        let op = snapshot.iter().find(|op| &op.id == id).unwrap();
        assert_eq!(op.status, OperationStatus::Failed);
        assert_eq!(op.retry_count, 0);
    }
    let child_op = snapshot.iter().find(|op| op.id == child).unwrap();
    assert!(child_op.last_error.as_deref().unwrap().contains(parent.as_str()));
    assert_eq!(harness.recorder.count(EventName::OperationFailed), 3);
}

#[tokio::test]
async fn test_without_cascade_dependents_stay_blocked() {
    let harness = TestHarness::builder()
        .cascade(false)
        .handler(ScriptedHandler::with_script(vec![Err(
            ExecutionError::conflict("stale").with_status(409),
        )]))
        .build()
        .await
        .unwrap();
    let parent = harness.enqueue_update("s-1").await;
    let child = harness
        .queue
        .enqueue(
            NewOperation::new(OperationKind::PinSession, "s-1", serde_json::json!({}))
                .depends_on([parent.clone()]),
        )
        .await;

    let first = harness.queue.force_process().await.unwrap();
    let second = harness.queue.force_process().await.unwrap();

    assert_eq!(first.conflicted, 1);
    assert_eq!(first.remaining, 1);
    assert!(first.next_retry_ms.is_some());
    assert_eq!(second.attempted, 0);
    assert_eq!(harness.handler.executed_ids(), vec![parent]);
    let snapshot = harness.queue.snapshot().await;
    let blocked = snapshot.iter().find(|op| op.id == child).unwrap();
    assert_eq!(blocked.status, OperationStatus::Pending);
}

// ---- Test 3: Retry ceiling ----

#[tokio::test]
async fn test_transient_failures_stop_at_max_retries() {
    let harness = TestHarness::builder()
        .max_retries(3)
        .handler(ScriptedHandler::always_fail(ExecutionError::transient(
            "connection reset",
        )))
        .build()
        .await
        .unwrap();
    let id = harness.enqueue_update("s-1").await;

    for expected in 1..=2u32 {
        let report = harness.queue.force_process().await.unwrap();
        assert_eq!(report.attempted, 1, "one attempt per pass");
        assert_eq!(report.retried, 1);
        let op = &harness.queue.snapshot().await[0];
        assert_eq!(op.status, OperationStatus::Pending);
        assert_eq!(op.retry_count, expected);
        assert_eq!(op.last_error.as_deref(), Some("connection reset"));
    }

    let report = harness.queue.force_process().await.unwrap();
    assert_eq!(report.failed, 1);
    assert_eq!(report.remaining, 0);
    assert_eq!(report.next_retry_ms, None);

    let after = harness.queue.force_process().await.unwrap();
    assert_eq!(after.attempted, 0);
    assert_eq!(harness.handler.call_count(), 3);

    let op = &harness.queue.snapshot().await[0];
    assert_eq!(op.id, id);
    assert_eq!(op.status, OperationStatus::Failed);
    assert_eq!(op.retry_count, 3);
}

#[tokio::test]
async fn test_terminal_error_fails_without_retry() {
    let harness = TestHarness::builder()
        .handler(ScriptedHandler::always_fail(
            ExecutionError::terminal("bad request").with_status(400),
        ))
        .build()
        .await
        .unwrap();
    harness.enqueue_update("s-1").await;

    let report = harness.queue.force_process().await.unwrap();

    assert_eq!(report.failed, 1);
    let op = &harness.queue.snapshot().await[0];
    assert_eq!(op.status, OperationStatus::Failed);
    assert_eq!(op.retry_count, 1);
}

// ---- Test 4: Conflict isolation ----

#[tokio::test]
async fn test_conflict_does_not_block_other_operations() {
    let mut harness = TestHarness::builder()
        .handler(ScriptedHandler::with_script(vec![
            Err(ExecutionError::conflict("version mismatch").with_status(409)),
            Ok(()),
        ]))
        .build()
        .await
        .unwrap();
    let conflicting = harness
        .enqueue_with_priority(OperationKind::UpdateSession, "s-1", Priority::High)
        .await;
    let other = harness
        .enqueue_with_priority(OperationKind::PinSession, "s-2", Priority::Low)
        .await;

    let report = harness.queue.force_process().await.unwrap();

    assert_eq!(report.conflicted, 1);
    assert_eq!(report.completed, 1);
    let snapshot = harness.queue.snapshot().await;
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].id, conflicting);
    assert_eq!(snapshot[0].status, OperationStatus::Conflicted);
    assert!(snapshot.iter().all(|op| op.id != other));
    assert_eq!(harness.queue.pending_count().await, 0);

    let conflict = harness
        .recorder
        .events()
        .iter()
        .find_map(|e| match e {
            QueueEvent::OperationConflict { operation, error } => {
                Some((operation.id.clone(), error.clone()))
            }
            _ => None,
        })
        .unwrap();
    assert_eq!(conflict.0, conflicting);
    assert_eq!(conflict.1.status, Some(409));
    assert_eq!(harness.recorder.count(EventName::OperationCompleted), 1);
}

#[tokio::test]
async fn test_http_conflict_status_is_classified_as_conflict() {
    let transport = MockTransport::new();
    transport
        .push_error(ErrorKind::Conflict, Some(409), "version mismatch")
        .await;
    let client = ApiClient::new(
        Arc::new(transport.clone()),
        Arc::new(BearerAuth::new(Some("tok-123".to_string()))),
        "http://api.test",
    );
    let queue = OfflineQueue::builder()
        .persistence(Arc::new(MemoryStore::new()))
        .executor(chat_executor(Arc::new(client)))
        .build()
        .await
        .unwrap();
    let id = queue
        .enqueue(NewOperation::new(
            OperationKind::UpdateSession,
            "s-1",
            serde_json::json!({"title": "renamed"}),
        ))
        .await;

    queue.force_process().await.unwrap();

    let snapshot = queue.snapshot().await;
    assert_eq!(snapshot[0].id, id);
    assert_eq!(snapshot[0].status, OperationStatus::Conflicted);
    assert_eq!(snapshot[0].last_error.as_deref(), Some("version mismatch"));

    let requests = transport.requests().await;
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, HttpMethod::Patch);
    assert_eq!(requests[0].url, "http://api.test/sessions/s-1");
    assert_eq!(requests[0].headers["authorization"], "Bearer tok-123");
}

// ---- Test 5: Persistence ----

#[tokio::test]
async fn test_every_mutation_is_written_through() {
    let harness = TestHarness::builder().online(false).build().await.unwrap();
    harness.enqueue_update("s-1").await;
    harness.enqueue_update("s-2").await;

    assert_eq!(
        harness.persisted_operations().await,
        harness.queue.snapshot().await
    );
    let persisted = harness.persisted().await.unwrap();
    assert_eq!(persisted["schema_version"], 1);

    harness.queue.remove_by_subject(&SubjectId::from("s-1")).await;
    assert_eq!(harness.persisted_operations().await.len(), 1);
}

#[tokio::test]
async fn test_persist_failure_is_reported_not_raised() {
    let mut harness = TestHarness::builder().online(false).build().await.unwrap();
    harness.store.set_failing(true);

    let id = harness.enqueue_update("s-1").await;

    assert_eq!(harness.queue.snapshot().await[0].id, id);
    assert!(harness.persisted().await.is_none());
    assert_eq!(harness.recorder.count(EventName::PersistFailed), 1);
    assert_eq!(harness.recorder.count(EventName::Added), 1);
}

#[tokio::test]
async fn test_restart_recovers_queue() {
    let mut harness = TestHarness::builder().online(false).build().await.unwrap();
    harness.enqueue_update("s-1").await;
    harness
        .queue
        .enqueue(NewOperation::new(
            OperationKind::SendMessage,
            "s-1",
            serde_json::json!({"content": "still here"}),
        ))
        .await;
    let before = harness.queue.snapshot().await;

    harness.restart().await.unwrap();

    assert_eq!(harness.queue.snapshot().await, before);
    let messages = harness
        .queue
        .pending_messages_for_subject(&SubjectId::from("s-1"))
        .await;
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].content, "still here");
}

#[tokio::test]
async fn test_load_resets_in_flight_and_drops_exhausted() {
    let mut in_flight = stored_operation(
        OperationKind::SendMessage,
        "s-1",
        chrono::Duration::minutes(5),
    );
    in_flight.status = OperationStatus::Retrying;
    in_flight.retry_count = 2;
    let mut exhausted = stored_operation(
        OperationKind::PinSession,
        "s-1",
        chrono::Duration::minutes(4),
    );
    exhausted.retry_count = 3;
    let store = seeded_store(&[in_flight.clone(), exhausted.clone()]).await;

    let mut harness = TestHarness::builder()
        .online(false)
        .store(store)
        .build()
        .await
        .unwrap();

    let snapshot = harness.queue.snapshot().await;
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].id, in_flight.id);
    assert_eq!(snapshot[0].status, OperationStatus::Pending);
    assert_eq!(snapshot[0].retry_count, 2);
    assert_eq!(harness.persisted_operations().await, snapshot);

    let events = harness.recorder.events().to_vec();
    assert!(events.contains(&QueueEvent::QueuePruned {
        removed: vec![exhausted.id.clone()],
        reason: PruneReason::Exhausted,
    }));
    assert!(events.contains(&QueueEvent::Loaded {
        count: 1,
        dropped: 1,
    }));
}

#[tokio::test]
async fn test_unversioned_array_is_migrated() {
    let op = stored_operation(OperationKind::UpdateSession, "s-9", chrono::Duration::hours(1));
    let memory = MemoryStore::new();
    memory
        .put(
            &QueueSettings::default().storage_key,
            serde_json::to_vec(&vec![op.clone()]).unwrap(),
        )
        .await;

    let harness = TestHarness::builder()
        .online(false)
        .store(FlakyStore::new(memory))
        .build()
        .await
        .unwrap();

    assert_eq!(harness.queue.snapshot().await, vec![op]);
    let persisted = harness.persisted().await.unwrap();
    assert_eq!(persisted["schema_version"], 1);
}

// ---- Test 6: Capacity and retention ----

#[tokio::test]
async fn test_overflow_evicts_down_to_target_keeping_high_priority() {
    let mut harness = TestHarness::builder().online(false).build().await.unwrap();
    let mut high = Vec::new();
    for i in 0..100 {
        let priority = match i % 3 {
            0 => Priority::High,
            1 => Priority::Medium,
            _ => Priority::Low,
        };
        let id = harness
            .enqueue_with_priority(OperationKind::UpdateSession, &format!("s-{i}"), priority)
            .await;
        if priority == Priority::High {
            high.push(id);
        }
    }
    assert_eq!(harness.queue.snapshot().await.len(), 100);

    harness.enqueue_update("s-overflow").await;

    let snapshot = harness.queue.snapshot().await;
    assert_eq!(snapshot.len(), 90);
    let kept: HashSet<OperationId> = snapshot.iter().map(|op| op.id.clone()).collect();
    assert!(high.iter().all(|id| kept.contains(id)));

    let evicted = harness
        .recorder
        .events()
        .iter()
        .find_map(|e| match e {
            QueueEvent::QueuePruned {
                removed,
                reason: PruneReason::Evicted,
            } => Some(removed.clone()),
            _ => None,
        })
        .unwrap();
    assert_eq!(evicted.len(), 11);
    assert!(evicted.iter().all(|id| !kept.contains(id)));
}

#[tokio::test]
async fn test_cleanup_removes_only_old_terminal_operations() {
    let mut old_failed = stored_operation(
        OperationKind::UpdateSession,
        "s-1",
        chrono::Duration::days(10),
    );
    old_failed.status = OperationStatus::Failed;
    old_failed.retry_count = 3;
    let old_pending = stored_operation(
        OperationKind::UpdateSession,
        "s-2",
        chrono::Duration::days(10),
    );
    let mut recent_conflict = stored_operation(
        OperationKind::UpdateSession,
        "s-3",
        chrono::Duration::days(1),
    );
    recent_conflict.status = OperationStatus::Conflicted;
    let store = seeded_store(&[
        old_failed.clone(),
        old_pending.clone(),
        recent_conflict.clone(),
    ])
    .await;
    let mut harness = TestHarness::builder()
        .online(false)
        .store(store)
        .build()
        .await
        .unwrap();

    assert_eq!(harness.queue.cleanup().await, 1);
    assert_eq!(harness.queue.cleanup().await, 0);

    let ids: HashSet<OperationId> = harness
        .queue
        .snapshot()
        .await
        .into_iter()
        .map(|op| op.id)
        .collect();
    assert_eq!(ids, HashSet::from([old_pending.id, recent_conflict.id]));
    assert_eq!(harness.recorder.count(EventName::QueuePruned), 1);
}

// ---- Test 7: Subject queries ----

#[tokio::test]
async fn test_remove_by_subject_reports_count() {
    let mut harness = TestHarness::builder().online(false).build().await.unwrap();
    harness.enqueue_update("s-1").await;
    harness.enqueue_update("s-1").await;
    let keep = harness.enqueue_update("s-2").await;

    let removed = harness
        .queue
        .remove_by_subject(&SubjectId::from("s-1"))
        .await;

    assert_eq!(removed, 2);
    let remaining = harness.queue.list_by_subject(&SubjectId::from("s-2")).await;
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, keep);
    assert!(harness.recorder.events().contains(&QueueEvent::SessionCleared {
        subject_id: SubjectId::from("s-1"),
        removed: 2,
    }));

    assert!(harness.queue.remove(&keep).await);
    assert!(!harness.queue.remove(&keep).await);
}

#[tokio::test]
async fn test_named_handlers_can_unsubscribe() {
    let harness = TestHarness::builder().online(false).build().await.unwrap();
    let added = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&added);
    let sub = harness.queue.on(EventName::Added, move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    harness.enqueue_update("s-1").await;
    assert!(sub.unsubscribe());
    harness.enqueue_update("s-1").await;

    assert_eq!(added.load(Ordering::SeqCst), 1);
}

// ---- Test 8: Connectivity and the worker ----

#[tokio::test(start_paused = true)]
async fn test_offline_enqueue_drains_when_online() {
    let mut harness = TestHarness::builder()
        .online(false)
        .started()
        .build()
        .await
        .unwrap();

    harness.enqueue_update("s-1").await;
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(harness.handler.call_count(), 0);
    assert!(harness.queue.force_process().await.is_none());

    harness.connectivity.set_online(true);
    let end = harness
        .recorder
        .wait_for(EventName::ProcessingEnd, WAIT)
        .await;

    assert_eq!(end, Some(QueueEvent::ProcessingEnd { pending: 0 }));
    assert_eq!(harness.handler.call_count(), 1);
    assert_eq!(harness.queue.pending_count().await, 0);
    assert_eq!(harness.recorder.count(EventName::Online), 1);
}

#[tokio::test(start_paused = true)]
async fn test_transient_failure_is_retried_after_backoff() {
    let mut harness = TestHarness::builder()
        .handler(ScriptedHandler::with_script(vec![Err(
            ExecutionError::transient("503 from upstream").with_status(503),
        )]))
        .started()
        .build()
        .await
        .unwrap();
    let started = tokio::time::Instant::now();

    let id = harness.enqueue_update("s-1").await;
    let completed = harness
        .recorder
        .wait_for(EventName::OperationCompleted, WAIT)
        .await
        .unwrap();

    assert_eq!(completed.operation().unwrap().id, id);
    assert_eq!(completed.operation().unwrap().retry_count, 2);
    assert_eq!(harness.handler.call_count(), 2);
    // One retry at retry_count 1: 1000ms * 1.5.
    assert!(started.elapsed() >= Duration::from_millis(1500));
    assert!(started.elapsed() < Duration::from_secs(3));
}

#[tokio::test(start_paused = true)]
async fn test_going_offline_cancels_retry_timer() {
    let mut harness = TestHarness::builder()
        .max_retries(10)
        .handler(ScriptedHandler::always_fail(ExecutionError::transient(
            "timeout",
        )))
        .started()
        .build()
        .await
        .unwrap();

    harness.enqueue_update("s-1").await;
    harness
        .recorder
        .wait_for(EventName::OperationRetry, WAIT)
        .await
        .unwrap();
    harness.connectivity.set_online(false);
    harness
        .recorder
        .wait_for(EventName::Offline, WAIT)
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_secs(300)).await;
    assert_eq!(harness.handler.call_count(), 1);

    harness.connectivity.set_online(true);
    harness
        .recorder
        .wait_for(EventName::OperationRetry, WAIT)
        .await
        .unwrap();
    assert_eq!(harness.handler.call_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_stopped_queue_does_not_drain() {
    let harness = TestHarness::builder().started().build().await.unwrap();

    harness.queue.shutdown().await;
    harness.enqueue_update("s-1").await;
    tokio::time::sleep(Duration::from_secs(60)).await;

    assert_eq!(harness.handler.call_count(), 0);
    assert!(harness.queue.force_process().await.is_none());
    assert_eq!(harness.queue.pending_count().await, 1);
}

/// Completes every operation but drops connectivity while doing so.
struct DisconnectingHandler {
    connectivity: Arc<ManualConnectivity>,
    calls: AtomicUsize,
}

#[async_trait]
impl OperationHandler for DisconnectingHandler {
    async fn execute(&self, _operation: &Operation) -> Result<(), ExecutionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.connectivity.set_online(false);
        Ok(())
    }
}

#[tokio::test(start_paused = true)]
async fn test_going_offline_mid_pass_finishes_in_flight_operation() {
    let connectivity = Arc::new(ManualConnectivity::new(true));
    let handler = Arc::new(DisconnectingHandler {
        connectivity: Arc::clone(&connectivity),
        calls: AtomicUsize::new(0),
    });
    let queue = OfflineQueue::builder()
        .persistence(Arc::new(MemoryStore::new()))
        .executor(Executor::new().with_handler(OperationKind::UpdateSession, handler.clone()))
        .connectivity(connectivity.monitor())
        .build()
        .await
        .unwrap();
    let update = |subject: &str| {
        NewOperation::new(OperationKind::UpdateSession, subject, serde_json::json!({}))
    };
    let first = queue.enqueue(update("s-1")).await;
    let second = queue.enqueue(update("s-2")).await;

    let report = queue.force_process().await.unwrap();

    assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
    assert_eq!(report.attempted, 1);
    assert_eq!(report.completed, 1);
    assert!(report.interrupted);
    assert_eq!(report.remaining, 1);
    assert_eq!(report.next_retry_ms, None);

    let left = queue.snapshot().await;
    assert_eq!(left.len(), 1);
    assert_ne!(left[0].id, first);
    assert_eq!(left[0].id, second);
    assert_eq!(left[0].status, OperationStatus::Pending);
    assert_eq!(left[0].retry_count, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_enqueue_while_another_pass_finishes_still_drains() {
    let mut harness = TestHarness::builder().started().build().await.unwrap();
    // The worker's startup pass over the empty queue.
    harness
        .recorder
        .wait_for(EventName::ProcessingEnd, Duration::from_secs(5))
        .await
        .unwrap();

    // Hold the next pass at its end, while it still owns the draining flag.
    let armed = Arc::new(AtomicBool::new(true));
    let (held_tx, held_rx) = std::sync::mpsc::channel::<()>();
    let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();
    let held_tx = Mutex::new(held_tx);
    let release_rx = Mutex::new(release_rx);
    let gate = Arc::clone(&armed);
    let _hold = harness.queue.on(EventName::ProcessingEnd, move |_| {
        if gate.swap(false, Ordering::SeqCst) {
            let _ = held_tx.lock().unwrap().send(());
            let _ = release_rx.lock().unwrap().recv();
        }
    });

    let queue = harness.queue.clone();
    let forced = tokio::spawn(async move { queue.force_process().await });
    tokio::task::spawn_blocking(move || held_rx.recv())
        .await
        .unwrap()
        .unwrap();

    harness.enqueue_update("s-1").await;
    // Let the worker react to the enqueue and be turned away by the held pass.
    tokio::time::sleep(Duration::from_millis(200)).await;
    release_tx.send(()).unwrap();

    let report = forced.await.unwrap().unwrap();
    assert_eq!(report.attempted, 0);
    assert_eq!(report.next_retry_ms, None);

    let completed = harness
        .recorder
        .wait_for(EventName::OperationCompleted, Duration::from_secs(5))
        .await;
    assert!(completed.is_some(), "operation enqueued during a pass was never run");
    assert_eq!(harness.handler.call_count(), 1);
    assert_eq!(harness.queue.pending_count().await, 0);
}
