//! Session state for the dashboard client.

use crate::backend::AppQueue;
use crate::stats::GetMetricsResponse;

use tokio::sync::watch;

/// Snapshot of everything the dashboard knows.
///
/// `None` means "not loaded yet", distinct from an empty list.
#[derive(Debug, Clone, PartialEq)]
pub struct QueuesState {
    pub queues: Option<Vec<AppQueue>>,
    pub metrics: Option<GetMetricsResponse>,
    /// True until the first queue list arrives.
    pub loading: bool,
}

impl Default for QueuesState {
    fn default() -> Self {
        Self {
            queues: None,
            metrics: None,
            loading: true,
        }
    }
}

/// State container shared by pollers and views.
///
/// Each update replaces a whole field; subscribers see every change through a
/// `watch` channel.
pub struct QueuesStore {
    tx: watch::Sender<QueuesState>,
}

impl Default for QueuesStore {
    fn default() -> Self {
        Self::new()
    }
}

impl QueuesStore {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(QueuesState::default());
        Self { tx }
    }

    pub fn snapshot(&self) -> QueuesState {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<QueuesState> {
        self.tx.subscribe()
    }

    pub fn update_queues(&self, queues: Vec<AppQueue>) {
        self.tx.send_modify(|state| {
            state.queues = Some(queues);
            state.loading = false;
        });
    }

    pub fn update_metrics(&self, metrics: GetMetricsResponse) {
        self.tx.send_modify(|state| state.metrics = Some(metrics));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{JobCounts, Pagination};
    use crate::stats::QueueMetrics;

    fn queue(name: &str) -> AppQueue {
        AppQueue {
            name: name.to_string(),
            counts: JobCounts::default(),
            jobs: Vec::new(),
            status: None,
            is_paused: false,
            pagination: Pagination::default(),
        }
    }

    #[test]
    fn test_initial_state() {
        let store = QueuesStore::new();
        let state = store.snapshot();
        assert!(state.loading);
        assert!(state.queues.is_none());
        assert!(state.metrics.is_none());
    }

    #[test]
    fn test_empty_list_is_loaded() {
        let store = QueuesStore::new();
        store.update_queues(Vec::new());

        let state = store.snapshot();
        assert!(!state.loading);
        assert_eq!(state.queues, Some(Vec::new()));
    }

    #[test]
    fn test_updates_replace_whole_field() {
        let store = QueuesStore::new();
        store.update_queues(vec![queue("emails"), queue("reports")]);
        store.update_queues(vec![queue("billing")]);

        let names: Vec<String> = store.snapshot().queues.unwrap().into_iter().map(|q| q.name).collect();
        assert_eq!(names, vec!["billing"]);

        store.update_metrics(GetMetricsResponse { queues: vec![QueueMetrics::empty("billing")] });
        store.update_metrics(GetMetricsResponse::default());
        assert_eq!(store.snapshot().metrics, Some(GetMetricsResponse::default()));
    }

    #[tokio::test]
    async fn test_subscribers_see_changes() {
        let store = QueuesStore::new();
        let mut rx = store.subscribe();

        store.update_metrics(GetMetricsResponse::default());
        rx.changed().await.unwrap();
        assert!(rx.borrow_and_update().metrics.is_some());

        store.update_queues(vec![queue("emails")]);
        rx.changed().await.unwrap();
        assert!(!rx.borrow().loading);
    }
}
