//! Snapshot store
//!
//! One store per data set. The only mutations are "replace the whole
//! collection" and "record that the last poll failed"; both are applied
//! atomically through a `watch` channel so readers always see a complete
//! snapshot. Every mutation carries the poll's cancellation token and is
//! dropped once that token has been cancelled.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::gateway::GatewayError;
use crate::models::Record;

/// The result of the most recent polls for one data set.
pub struct Snapshot<T> {
    records: Arc<Vec<T>>,
    loaded_at: Option<DateTime<Utc>>,
    last_error: Option<String>,
    version: u64,
}

/// What a view should show for a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SnapshotStatus {
    /// Nothing has arrived yet.
    Loading,
    /// Nothing has ever arrived and the last poll failed.
    Failed { error: String },
    /// Records are available; `stale` is set when the latest poll failed.
    Ready { stale: bool },
}

impl<T> Snapshot<T> {
    fn empty() -> Self {
        Self {
            records: Arc::new(Vec::new()),
            loaded_at: None,
            last_error: None,
            version: 0,
        }
    }

    pub fn records(&self) -> &[T] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded_at.is_some()
    }

    pub fn loaded_at(&self) -> Option<DateTime<Utc>> {
        self.loaded_at
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Number of successful replacements so far.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn is_stale(&self) -> bool {
        self.is_loaded() && self.last_error.is_some()
    }

    pub fn status(&self) -> SnapshotStatus {
        match (&self.loaded_at, &self.last_error) {
            (None, None) => SnapshotStatus::Loading,
            (None, Some(error)) => SnapshotStatus::Failed {
                error: error.clone(),
            },
            (Some(_), error) => SnapshotStatus::Ready {
                stale: error.is_some(),
            },
        }
    }
}

impl<T: Record> Snapshot<T> {
    pub fn find(&self, id: i64) -> Option<&T> {
        self.records.iter().find(|r| r.id() == id)
    }

    /// An id-keyed selection survives only while the id is still present.
    pub fn retain_selection(&self, selected: Option<i64>) -> Option<i64> {
        selected.filter(|id| self.find(*id).is_some())
    }
}

impl<T> Clone for Snapshot<T> {
    fn clone(&self) -> Self {
        Self {
            records: Arc::clone(&self.records),
            loaded_at: self.loaded_at,
            last_error: self.last_error.clone(),
            version: self.version,
        }
    }
}

impl<T> fmt::Debug for Snapshot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Snapshot")
            .field("len", &self.records.len())
            .field("loaded_at", &self.loaded_at)
            .field("last_error", &self.last_error)
            .field("version", &self.version)
            .finish()
    }
}

/// Holds the current snapshot for one data set.
pub struct SnapshotStore<T> {
    name: &'static str,
    tx: watch::Sender<Snapshot<T>>,
}

impl<T> SnapshotStore<T> {
    pub fn new(name: &'static str) -> Self {
        let (tx, _rx) = watch::channel(Snapshot::empty());
        Self { name, tx }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn current(&self) -> Snapshot<T> {
        self.tx.borrow().clone()
    }

    /// Receiver that wakes on every committed change.
    pub fn subscribe(&self) -> watch::Receiver<Snapshot<T>> {
        self.tx.subscribe()
    }

    /// Swap in a new collection. Returns `false` if the poll that produced
    /// it has been cancelled.
    pub fn replace(&self, records: Vec<T>, token: &CancellationToken) -> bool {
        let count = records.len();
        let committed = self.tx.send_if_modified(|snapshot| {
            if token.is_cancelled() {
                return false;
            }
            snapshot.records = Arc::new(records);
            snapshot.loaded_at = Some(Utc::now());
            snapshot.last_error = None;
            snapshot.version += 1;
            true
        });

        if committed {
            tracing::debug!(store = self.name, count, "Snapshot replaced");
        } else {
            tracing::debug!(store = self.name, "Discarded response from cancelled poll");
        }
        committed
    }

    /// Keep the current collection and flag the failure.
    pub fn record_failure(&self, error: impl Into<String>, token: &CancellationToken) -> bool {
        let error = error.into();
        self.tx.send_if_modified(|snapshot| {
            if token.is_cancelled() {
                return false;
            }
            snapshot.last_error = Some(error);
            true
        })
    }

    /// Apply one fetch outcome.
    pub fn commit(&self, outcome: Result<Vec<T>, GatewayError>, token: &CancellationToken) -> bool {
        match outcome {
            Ok(records) => self.replace(records, token),
            Err(e) => {
                tracing::warn!(store = self.name, error = %e, "Poll failed, keeping last snapshot");
                self.record_failure(e.to_string(), token)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[derive(Debug, Clone, PartialEq)]
    struct Row(i64);

    impl Record for Row {
        fn id(&self) -> i64 {
            self.0
        }
    }

    fn ids(snapshot: &Snapshot<Row>) -> Vec<i64> {
        snapshot.records().iter().map(|r| r.0).collect()
    }

    #[test]
    fn test_new_store_is_loading() {
        let store: SnapshotStore<Row> = SnapshotStore::new("rows");
        let snapshot = store.current();
        assert!(snapshot.is_empty());
        assert_eq!(snapshot.status(), SnapshotStatus::Loading);
        assert_eq!(snapshot.version(), 0);
    }

    #[test]
    fn test_replace_discards_previous_records() {
        let store = SnapshotStore::new("rows");
        let token = CancellationToken::new();

        store.replace(vec![Row(1), Row(2)], &token);
        store.replace(vec![Row(2), Row(3)], &token);

        let snapshot = store.current();
        assert_eq!(ids(&snapshot), vec![2, 3]);
        assert!(snapshot.find(1).is_none());
        assert_eq!(snapshot.version(), 2);
    }

    #[test]
    fn test_failure_before_first_load_is_failed() {
        let store: SnapshotStore<Row> = SnapshotStore::new("rows");
        let token = CancellationToken::new();

        store.record_failure("connection refused", &token);
        assert_eq!(
            store.current().status(),
            SnapshotStatus::Failed {
                error: "connection refused".to_string()
            }
        );
    }

    #[test]
    fn test_failure_after_load_keeps_records_and_marks_stale() {
        let store = SnapshotStore::new("rows");
        let token = CancellationToken::new();

        store.replace(vec![Row(1)], &token);
        store.commit(
            Err(GatewayError::Api {
                code: 502,
                message: "bad gateway".to_string(),
            }),
            &token,
        );

        let snapshot = store.current();
        assert_eq!(ids(&snapshot), vec![1]);
        assert_eq!(snapshot.status(), SnapshotStatus::Ready { stale: true });
        assert!(snapshot.last_error().unwrap().contains("bad gateway"));

        store.replace(vec![Row(4)], &token);
        assert_eq!(store.current().status(), SnapshotStatus::Ready { stale: false });
    }

    #[test]
    fn test_cancelled_token_blocks_commits() {
        let store = SnapshotStore::new("rows");
        let token = CancellationToken::new();
        store.replace(vec![Row(1)], &token);

        token.cancel();
        assert!(!store.replace(vec![Row(9)], &token));
        assert!(!store.record_failure("late", &token));

        let snapshot = store.current();
        assert_eq!(ids(&snapshot), vec![1]);
        assert!(snapshot.last_error().is_none());
    }

    #[test]
    fn test_retain_selection_by_id() {
        let store = SnapshotStore::new("rows");
        let token = CancellationToken::new();
        store.replace(vec![Row(1), Row(2)], &token);
        let selected = store.current().retain_selection(Some(2));
        assert_eq!(selected, Some(2));

        store.replace(vec![Row(3)], &token);
        assert_eq!(store.current().retain_selection(selected), None);
        assert_eq!(store.current().retain_selection(None), None);
    }

    #[tokio::test]
    async fn test_subscribers_see_each_commit() {
        let store = SnapshotStore::new("rows");
        let token = CancellationToken::new();
        let mut rx = store.subscribe();

        store.replace(vec![Row(5)], &token);
        rx.changed().await.unwrap();
        assert_eq!(ids(&rx.borrow_and_update()), vec![5]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_latest_completion_wins_over_latest_issue() {
        let store = Arc::new(SnapshotStore::new("rows"));
        let token = CancellationToken::new();

        // A is issued first but completes last.
        let a = {
            let store = Arc::clone(&store);
            let token = token.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(200)).await;
                store.replace(vec![Row(100)], &token);
            })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        let b = {
            let store = Arc::clone(&store);
            let token = token.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                store.replace(vec![Row(200)], &token);
            })
        };

        b.await.unwrap();
        assert_eq!(ids(&store.current()), vec![200]);
        a.await.unwrap();
        assert_eq!(ids(&store.current()), vec![100]);
    }
}
