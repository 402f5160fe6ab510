// SPDX-FileCopyrightText: 2026 Holdfast Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory operation list backed by a write-through persisted slot.
//!
//! [`QueueStore`] only mutates memory; every mutating method leaves the list
//! sorted, and the owner calls [`QueueStore::persist`] after each mutation.

use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use holdfast_core::{
    HoldfastError, Operation, OperationId, OperationKind, OperationStatus, PendingMessage,
    Persistence, Priority, SubjectId,
};
use tracing::{debug, error, warn};

use crate::codec;

/// Size and retry limits the store enforces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreLimits {
    pub max_size: usize,
    pub eviction_target: usize,
    pub max_retries: u32,
}

impl Default for StoreLimits {
    fn default() -> Self {
        Self {
            max_size: 100,
            eviction_target: 90,
            max_retries: 3,
        }
    }
}

/// What normalization did to the persisted list on load.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Operations kept.
    pub loaded: usize,
    /// `retrying` operations reset to `pending`.
    pub reset: usize,
    /// Non-terminal operations dropped because their retries were used up.
    pub dropped: Vec<OperationId>,
    /// The slot was unreadable and the queue started empty.
    pub discarded_corrupt: bool,
    /// The slot was written by an older schema and needs rewriting.
    pub migrated: bool,
}

impl LoadReport {
    /// Whether memory differs from what was read and should be saved back.
    pub fn needs_persist(&self) -> bool {
        self.reset > 0 || !self.dropped.is_empty() || self.migrated
    }
}

pub struct QueueStore {
    operations: Vec<Operation>,
    persistence: Arc<dyn Persistence>,
    key: String,
    limits: StoreLimits,
}

impl QueueStore {
    /// An empty store writing to `key`.
    pub fn new(
        persistence: Arc<dyn Persistence>,
        key: impl Into<String>,
        limits: StoreLimits,
    ) -> Self {
        Self {
            operations: Vec::new(),
            persistence,
            key: key.into(),
            limits,
        }
    }

    /// Read the persisted slot and normalize it.
    ///
    /// A storage read failure or a slot written by a newer schema is an
    /// error, so the caller never overwrites data it could not read. A slot
    /// that is not valid JSON is logged and replaced by an empty queue.
    pub async fn load(
        persistence: Arc<dyn Persistence>,
        key: impl Into<String>,
        limits: StoreLimits,
    ) -> Result<(Self, LoadReport), HoldfastError> {
        let mut store = Self::new(persistence, key, limits);
        let mut report = LoadReport::default();

        let Some(bytes) = store.persistence.load(&store.key).await? else {
            debug!(key = %store.key, "no persisted queue");
            return Ok((store, report));
        };

        let decoded = match codec::decode(&bytes) {
            Ok(decoded) => decoded,
            Err(e @ codec::DecodeError::UnsupportedVersion { .. }) => return Err(e.into()),
            Err(e @ codec::DecodeError::Malformed(_)) => {
                error!(key = %store.key, error = %e, "persisted queue unreadable, starting empty");
                report.discarded_corrupt = true;
                return Ok((store, report));
            }
        };
        report.migrated = decoded.schema_version < codec::SCHEMA_VERSION;

        let mut seen = HashSet::new();
        for mut op in decoded.operations {
            if !seen.insert(op.id.clone()) {
                warn!(operation_id = %op.id, "duplicate operation id in persisted queue, keeping first");
                continue;
            }
            if op.status.is_active() && op.retry_count >= limits.max_retries {
                warn!(
                    operation_id = %op.id,
                    kind = %op.kind,
                    retry_count = op.retry_count,
                    "dropping operation with exhausted retries"
                );
                report.dropped.push(op.id);
                continue;
            }
            if op.status == OperationStatus::Retrying {
                op.status = OperationStatus::Pending;
                report.reset += 1;
            }
            store.operations.push(op);
        }

        store.sort();
        report.loaded = store.operations.len();
        Ok((store, report))
    }

    /// Save the current list to the persisted slot.
    pub async fn persist(&self) -> Result<(), HoldfastError> {
        let bytes = codec::encode(&self.operations)?;
        self.persistence.save(&self.key, &bytes).await
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn limits(&self) -> StoreLimits {
        self.limits
    }

    /// All operations in processing order.
    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn get(&self, id: &OperationId) -> Option<&Operation> {
        self.operations.iter().find(|op| &op.id == id)
    }

    pub fn contains(&self, id: &OperationId) -> bool {
        self.get(id).is_some()
    }

    /// Operations still owed an attempt.
    pub fn pending_count(&self) -> usize {
        self.operations.iter().filter(|op| op.status.is_active()).count()
    }

    /// Highest retry count among operations still owed an attempt.
    pub fn max_active_retry_count(&self) -> u32 {
        self.operations
            .iter()
            .filter(|op| op.status.is_active())
            .map(|op| op.retry_count)
            .max()
            .unwrap_or(0)
    }

    pub fn list_by_subject(&self, subject: &SubjectId) -> Vec<Operation> {
        self.operations
            .iter()
            .filter(|op| &op.subject_id == subject)
            .cloned()
            .collect()
    }

    /// Undelivered `send-message` operations for `subject`, with the
    /// payload's `content` string.
    pub fn pending_messages_for_subject(&self, subject: &SubjectId) -> Vec<PendingMessage> {
        self.operations
            .iter()
            .filter(|op| {
                &op.subject_id == subject
                    && op.kind == OperationKind::SendMessage
                    && op.status.is_active()
            })
            .map(|op| PendingMessage {
                id: op.id.clone(),
                content: op
                    .payload
                    .get("content")
                    .and_then(|c| c.as_str())
                    .unwrap_or_default()
                    .to_string(),
                timestamp: op.created_at,
            })
            .collect()
    }

    /// Append `op`, evicting first if the store is full.
    ///
    /// Returns the ids evicted to make room.
    pub fn insert(&mut self, op: Operation) -> Vec<OperationId> {
        let evicted = if self.operations.len() >= self.limits.max_size {
            let keep = self
                .limits
                .eviction_target
                .min(self.limits.max_size)
                .saturating_sub(1);
            self.evict_down_to(keep)
        } else {
            Vec::new()
        };
        self.operations.push(op);
        self.sort();
        evicted
    }

    /// Remove least relevant entries until at most `keep` remain.
    ///
    /// Terminal entries go first, oldest first; then pending entries,
    /// lowest priority and oldest first. In-flight and pending high
    /// priority entries are never chosen.
    fn evict_down_to(&mut self, keep: usize) -> Vec<OperationId> {
        let excess = self.operations.len().saturating_sub(keep);
        if excess == 0 {
            return Vec::new();
        }

        let mut candidates: Vec<&Operation> = self
            .operations
            .iter()
            .filter(|op| match op.status {
                OperationStatus::Retrying => false,
                OperationStatus::Pending => op.priority != Priority::High,
                _ => true,
            })
            .collect();
        candidates.sort_by_key(|op| {
            let group = u8::from(op.status.is_active());
            let priority = if op.status.is_active() {
                Reverse(op.priority)
            } else {
                Reverse(Priority::Low)
            };
            (group, priority, op.created_at, op.id.clone())
        });

        let victims: HashSet<OperationId> = candidates
            .into_iter()
            .take(excess)
            .map(|op| op.id.clone())
            .collect();
        if victims.len() < excess {
            warn!(
                size = self.operations.len() - victims.len() + 1,
                max_size = self.limits.max_size,
                "queue over capacity; remaining entries are in flight or high priority"
            );
        }

        let mut evicted = Vec::with_capacity(victims.len());
        self.operations.retain(|op| {
            if victims.contains(&op.id) {
                evicted.push(op.id.clone());
                false
            } else {
                true
            }
        });
        evicted
    }

    pub fn remove(&mut self, id: &OperationId) -> Option<Operation> {
        let index = self.operations.iter().position(|op| &op.id == id)?;
        let removed = self.operations.remove(index);
        self.sort();
        Some(removed)
    }

    pub fn remove_by_subject(&mut self, subject: &SubjectId) -> usize {
        let before = self.operations.len();
        self.operations.retain(|op| &op.subject_id != subject);
        let removed = before - self.operations.len();
        if removed > 0 {
            self.sort();
        }
        removed
    }

    /// Drop terminal operations created before `now - retention`.
    pub fn cleanup(&mut self, retention: chrono::Duration, now: DateTime<Utc>) -> Vec<OperationId> {
        let cutoff = now - retention;
        let mut expired = Vec::new();
        self.operations.retain(|op| {
            if op.status.is_terminal() && op.created_at < cutoff {
                expired.push(op.id.clone());
                false
            } else {
                true
            }
        });
        if !expired.is_empty() {
            self.sort();
        }
        expired
    }

    /// Apply `f` to the operation `id`, re-sort, and return its new state.
    pub fn update<F>(&mut self, id: &OperationId, f: F) -> Option<Operation>
    where
        F: FnOnce(&mut Operation),
    {
        let op = self.operations.iter_mut().find(|op| &op.id == id)?;
        f(op);
        let updated = op.clone();
        self.sort();
        Some(updated)
    }

    /// Every id in `depends_on` is absent or completed.
    pub fn dependencies_fulfilled(&self, op: &Operation) -> bool {
        op.depends_on.iter().all(|dep| {
            self.get(dep)
                .is_none_or(|d| d.status == OperationStatus::Completed)
        })
    }

    /// First operation in order that is owed an attempt, has its
    /// dependencies fulfilled, and is not in `skip`.
    pub fn next_eligible(&self, skip: &HashSet<OperationId>) -> Option<&Operation> {
        self.operations.iter().find(|op| {
            op.status.is_active() && !skip.contains(&op.id) && self.dependencies_fulfilled(op)
        })
    }

    /// Pending operations that depend on `id`, directly or transitively.
    pub fn pending_dependents(&self, id: &OperationId) -> Vec<OperationId> {
        let mut found: Vec<OperationId> = Vec::new();
        let mut seen: HashSet<&OperationId> = HashSet::from([id]);
        let mut frontier = vec![id];

        while let Some(current) = frontier.pop() {
            for op in &self.operations {
                if op.status == OperationStatus::Pending
                    && op.depends_on.contains(current)
                    && seen.insert(&op.id)
                {
                    found.push(op.id.clone());
                    frontier.push(&op.id);
                }
            }
        }
        found
    }

    fn sort(&mut self) {
        let statuses: HashMap<&OperationId, OperationStatus> =
            self.operations.iter().map(|op| (&op.id, op.status)).collect();
        let blocked: HashSet<OperationId> = self
            .operations
            .iter()
            .filter(|op| {
                op.depends_on.iter().any(|dep| {
                    statuses
                        .get(dep)
                        .is_some_and(|s| *s != OperationStatus::Completed)
                })
            })
            .map(|op| op.id.clone())
            .collect();

        self.operations.sort_by_cached_key(|op| {
            (
                status_rank(op.status),
                op.priority,
                blocked.contains(&op.id),
                op.created_at,
                op.id.clone(),
            )
        });
    }
}

impl std::fmt::Debug for QueueStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueStore")
            .field("key", &self.key)
            .field("len", &self.operations.len())
            .field("limits", &self.limits)
            .finish()
    }
}

fn status_rank(status: OperationStatus) -> u8 {
    match status {
        OperationStatus::Pending => 0,
        OperationStatus::Retrying => 1,
        _ => 2,
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use chrono::TimeZone;
    use holdfast_core::NewOperation;
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    struct SlotStore {
        slot: Mutex<Option<Vec<u8>>>,
    }

    #[async_trait]
    impl Persistence for SlotStore {
        async fn load(&self, _key: &str) -> Result<Option<Vec<u8>>, HoldfastError> {
            Ok(self.slot.lock().unwrap().clone())
        }

        async fn save(&self, _key: &str, bytes: &[u8]) -> Result<(), HoldfastError> {
            *self.slot.lock().unwrap() = Some(bytes.to_vec());
            Ok(())
        }
    }

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 4, 10, minute, 0).unwrap()
    }

    fn op(id: &str, priority: Priority, minute: u32) -> Operation {
        let mut op = Operation::from_request(
            NewOperation::new(OperationKind::UpdateSession, "s-1", serde_json::json!({}))
                .priority(priority),
            at(minute),
        );
        op.id = OperationId::from(id);
        op
    }

    fn store_with(limits: StoreLimits) -> QueueStore {
        QueueStore::new(Arc::new(SlotStore::default()), "k", limits)
    }

    fn ids(store: &QueueStore) -> Vec<&str> {
        store.operations().iter().map(|op| op.id.as_str()).collect()
    }

    #[test]
    fn orders_by_status_priority_then_age() {
        let mut store = store_with(StoreLimits::default());
        store.insert(op("low-old", Priority::Low, 0));
        store.insert(op("high-new", Priority::High, 9));
        store.insert(op("med", Priority::Medium, 5));
        let mut failed = op("failed-high", Priority::High, 1);
        failed.status = OperationStatus::Failed;
        store.insert(failed);

        assert_eq!(ids(&store), vec!["high-new", "med", "low-old", "failed-high"]);
    }

    #[test]
    fn blocked_operations_sort_after_unblocked_peers() {
        let mut store = store_with(StoreLimits::default());
        store.insert(op("parent", Priority::Medium, 5));
        store.insert(Operation {
            depends_on: vec![OperationId::from("parent")],
            ..op("child", Priority::High, 0)
        });
        store.insert(op("peer", Priority::High, 8));

        assert_eq!(ids(&store), vec!["peer", "child", "parent"]);
        let next = store.next_eligible(&HashSet::new()).unwrap();
        assert_eq!(next.id.as_str(), "peer");
    }

    #[test]
    fn missing_dependency_counts_as_fulfilled() {
        let mut store = store_with(StoreLimits::default());
        store.insert(Operation {
            depends_on: vec![OperationId::from("gone")],
            ..op("child", Priority::Medium, 0)
        });
        let child = store.get(&OperationId::from("child")).unwrap();
        assert!(store.dependencies_fulfilled(child));
    }

    #[test]
    fn next_eligible_honours_skip_set() {
        let mut store = store_with(StoreLimits::default());
        store.insert(op("a", Priority::High, 0));
        store.insert(op("b", Priority::Low, 0));
        let skip = HashSet::from([OperationId::from("a")]);
        assert_eq!(store.next_eligible(&skip).unwrap().id.as_str(), "b");
    }

    #[test]
    fn eviction_prefers_terminal_then_low_priority() {
        let limits = StoreLimits {
            max_size: 4,
            eviction_target: 3,
            max_retries: 3,
        };
        let mut store = store_with(limits);
        let mut done = op("failed", Priority::High, 9);
        done.status = OperationStatus::Failed;
        store.insert(done);
        store.insert(op("low", Priority::Low, 5));
        store.insert(op("med", Priority::Medium, 0));
        store.insert(op("high", Priority::High, 0));

        let evicted = store.insert(op("new", Priority::Medium, 10));

        let mut evicted = evicted;
        evicted.sort();
        assert_eq!(
            evicted,
            vec![OperationId::from("failed"), OperationId::from("low")]
        );
        assert_eq!(store.len(), 3);
        assert!(store.contains(&OperationId::from("high")));
        assert!(store.contains(&OperationId::from("med")));
        assert!(store.contains(&OperationId::from("new")));
    }

    #[test]
    fn eviction_never_removes_pending_high_priority() {
        let limits = StoreLimits {
            max_size: 2,
            eviction_target: 1,
            max_retries: 3,
        };
        let mut store = store_with(limits);
        store.insert(op("h1", Priority::High, 0));
        store.insert(op("h2", Priority::High, 1));

        let evicted = store.insert(op("h3", Priority::High, 2));

        assert!(evicted.is_empty());
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn cleanup_only_touches_old_terminal_entries() {
        let mut store = store_with(StoreLimits::default());
        let mut old_failed = op("old-failed", Priority::Medium, 0);
        old_failed.status = OperationStatus::Failed;
        let mut old_conflict = op("old-conflict", Priority::Medium, 0);
        old_conflict.status = OperationStatus::Conflicted;
        store.insert(old_failed);
        store.insert(old_conflict);
        store.insert(op("old-pending", Priority::Medium, 0));
        let mut fresh_failed = op("fresh-failed", Priority::Medium, 59);
        fresh_failed.status = OperationStatus::Failed;
        store.insert(fresh_failed);

        let now = at(59) + chrono::Duration::days(7) - chrono::Duration::minutes(30);
        let mut expired = store.cleanup(chrono::Duration::days(7), now);
        expired.sort();

        assert_eq!(
            expired,
            vec![OperationId::from("old-conflict"), OperationId::from("old-failed")]
        );
        assert!(store.contains(&OperationId::from("old-pending")));
        assert!(store.contains(&OperationId::from("fresh-failed")));
    }

    #[test]
    fn pending_dependents_are_transitive() {
        let mut store = store_with(StoreLimits::default());
        store.insert(op("root", Priority::Medium, 0));
        store.insert(Operation {
            depends_on: vec![OperationId::from("root")],
            ..op("mid", Priority::Medium, 1)
        });
        store.insert(Operation {
            depends_on: vec![OperationId::from("mid")],
            ..op("leaf", Priority::Medium, 2)
        });
        store.insert(op("unrelated", Priority::Medium, 3));

        let mut deps = store.pending_dependents(&OperationId::from("root"));
        deps.sort();
        assert_eq!(deps, vec![OperationId::from("leaf"), OperationId::from("mid")]);
    }

    #[test]
    fn pending_messages_read_content() {
        let mut store = store_with(StoreLimits::default());
        let mut msg = Operation::from_request(
            NewOperation::new(
                OperationKind::SendMessage,
                "s-1",
                serde_json::json!({"content": "hi there"}),
            ),
            at(3),
        );
        msg.id = OperationId::from("m1");
        store.insert(msg);
        store.insert(op("u1", Priority::Medium, 1));

        let messages = store.pending_messages_for_subject(&SubjectId::from("s-1"));
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].content, "hi there");
        assert_eq!(messages[0].timestamp, at(3));
    }

    #[tokio::test]
    async fn load_resets_retrying_and_drops_exhausted() {
        let persistence = Arc::new(SlotStore::default());
        let mut retrying = op("retrying", Priority::Medium, 0);
        retrying.status = OperationStatus::Retrying;
        retrying.retry_count = 1;
        let mut exhausted = op("exhausted", Priority::Medium, 1);
        exhausted.retry_count = 3;
        let mut failed = op("failed", Priority::Medium, 2);
        failed.status = OperationStatus::Failed;
        failed.retry_count = 3;
        *persistence.slot.lock().unwrap() =
            Some(codec::encode(&[retrying, exhausted, failed]).unwrap());

        let (store, report) = QueueStore::load(persistence, "k", StoreLimits::default())
            .await
            .unwrap();

        assert_eq!(report.loaded, 2);
        assert_eq!(report.reset, 1);
        assert_eq!(report.dropped, vec![OperationId::from("exhausted")]);
        assert!(report.needs_persist());
        let reset = store.get(&OperationId::from("retrying")).unwrap();
        assert_eq!(reset.status, OperationStatus::Pending);
        assert_eq!(reset.retry_count, 1);
        assert!(store.contains(&OperationId::from("failed")));
    }

    #[tokio::test]
    #[tracing_test::traced_test]
    async fn exhausted_drop_is_logged() {
        let persistence = Arc::new(SlotStore::default());
        let mut exhausted = op("spent", Priority::Low, 0);
        exhausted.retry_count = 5;
        *persistence.slot.lock().unwrap() = Some(codec::encode(&[exhausted]).unwrap());

        let (store, _) = QueueStore::load(persistence, "k", StoreLimits::default())
            .await
            .unwrap();

        assert!(store.is_empty());
        assert!(logs_contain("dropping operation with exhausted retries"));
    }

    #[tokio::test]
    async fn corrupt_slot_starts_empty() {
        let persistence = Arc::new(SlotStore::default());
        *persistence.slot.lock().unwrap() = Some(b"{oops".to_vec());

        let (store, report) = QueueStore::load(persistence, "k", StoreLimits::default())
            .await
            .unwrap();

        assert!(store.is_empty());
        assert!(report.discarded_corrupt);
    }

    #[tokio::test]
    async fn newer_schema_refuses_to_load() {
        let persistence = Arc::new(SlotStore::default());
        *persistence.slot.lock().unwrap() =
            Some(br#"{"schema_version": 2, "operations": []}"#.to_vec());

        let result = QueueStore::load(persistence, "k", StoreLimits::default()).await;
        assert!(matches!(result, Err(HoldfastError::Codec { .. })));
    }
}
