//! Queue list assembly for the dashboard.

use super::{AppQueue, BackendError, JobStatus, ListQueuesQuery, PageRange, Pagination, QueuePair};

use futures::future::try_join_all;

/// Status shown for the active queue when none is selected.
pub const DEFAULT_STATUS: JobStatus = JobStatus::Active;

/// Build the queue list for the given filters.
///
/// Every queue reports counts and its paused flag; only the active queue
/// carries a page of jobs.
pub async fn list_queues(
    pairs: &[QueuePair],
    query: &ListQueuesQuery,
) -> Result<Vec<AppQueue>, BackendError> {
    try_join_all(pairs.iter().map(|(name, queue)| async move {
        let counts = queue.get_job_counts().await?;
        let is_paused = queue.is_paused().await?;

        let mut app_queue = AppQueue {
            name: name.clone(),
            counts,
            jobs: Vec::new(),
            status: None,
            is_paused,
            pagination: Pagination::default(),
        };

        if query.active_queue.as_deref() == Some(name.as_str()) {
            let status = query.status.unwrap_or(DEFAULT_STATUS);
            let (page_count, range) = paginate(app_queue.counts.get(status), query);
            app_queue.jobs = queue.get_jobs(status, range.start, range.end).await?;
            app_queue.status = Some(status);
            app_queue.pagination = Pagination { page_count, range };
        }

        Ok::<_, BackendError>(app_queue)
    }))
    .await
}

/// Page count and inclusive index window for a status holding `total` jobs.
fn paginate(total: u64, query: &ListQueuesQuery) -> (u64, PageRange) {
    let per_page = query.jobs_per_page.max(1);
    let page = query.page.max(1);
    let page_count = total.div_ceil(per_page).max(1);

    // Out-of-range pages clamp to the end of the index space and read nothing.
    let start = (page - 1).saturating_mul(per_page);
    let end = start.saturating_add(per_page - 1);

    (page_count, PageRange { start, end })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{MemoryQueue, QueueAdapter};
    use serde_json::json;
    use std::sync::Arc;

    async fn pairs() -> Vec<QueuePair> {
        let emails = Arc::new(MemoryQueue::new("emails"));
        for i in 0..25 {
            emails.add_job(&format!("send-{}", i), json!({}), json!({})).await.unwrap();
        }
        let reports = Arc::new(MemoryQueue::new("reports"));
        reports.pause().await.unwrap();

        vec![
            ("emails".to_string(), emails as Arc<dyn QueueAdapter>),
            ("reports".to_string(), reports as Arc<dyn QueueAdapter>),
        ]
    }

    #[test]
    fn test_paginate() {
        let query = ListQueuesQuery { page: 3, jobs_per_page: 10, ..Default::default() };
        let (count, range) = paginate(25, &query);
        assert_eq!(count, 3);
        assert_eq!(range, PageRange { start: 20, end: 29 });

        let (count, range) = paginate(0, &ListQueuesQuery::default());
        assert_eq!(count, 1);
        assert_eq!(range, PageRange { start: 0, end: 9 });
    }

    #[tokio::test]
    async fn test_list_without_active_queue() {
        let queues = list_queues(&pairs().await, &ListQueuesQuery::default()).await.unwrap();
        assert_eq!(queues.len(), 2);
        assert!(queues.iter().all(|q| q.jobs.is_empty() && q.status.is_none()));
        assert_eq!(queues[0].counts.waiting, 25);
        assert!(queues[1].is_paused);
    }

    #[tokio::test]
    async fn test_list_active_queue_page() {
        let query = ListQueuesQuery {
            active_queue: Some("emails".to_string()),
            status: Some(JobStatus::Waiting),
            page: 3,
            jobs_per_page: 10,
        };
        let queues = list_queues(&pairs().await, &query).await.unwrap();

        let emails = &queues[0];
        assert_eq!(emails.status, Some(JobStatus::Waiting));
        assert_eq!(emails.jobs.len(), 5);
        assert_eq!(emails.pagination.page_count, 3);
        assert!(queues[1].jobs.is_empty());
    }

    #[test]
    fn test_paginate_huge_values() {
        let query = ListQueuesQuery { page: u64::MAX, jobs_per_page: 10, ..Default::default() };
        let (count, range) = paginate(25, &query);
        assert_eq!(count, 3);
        assert_eq!(range, PageRange { start: u64::MAX, end: u64::MAX });

        let query = ListQueuesQuery { page: 2, jobs_per_page: u64::MAX, ..Default::default() };
        let (count, range) = paginate(25, &query);
        assert_eq!(count, 1);
        assert_eq!(range, PageRange { start: u64::MAX, end: u64::MAX });
    }

    #[tokio::test]
    async fn test_list_page_out_of_range() {
        let pairs = pairs().await;
        for (page, jobs_per_page) in [(u64::MAX, 10), (2, u64::MAX), (1, u64::MAX)] {
            let query = ListQueuesQuery {
                active_queue: Some("emails".to_string()),
                status: Some(JobStatus::Waiting),
                page,
                jobs_per_page,
            };
            let queues = list_queues(&pairs, &query).await.unwrap();
            let emails = &queues[0];
            assert_eq!(emails.status, Some(JobStatus::Waiting));
            assert!(emails.pagination.page_count >= 1);
            if page == 1 {
                assert_eq!(emails.jobs.len(), 25);
            } else {
                assert!(emails.jobs.is_empty());
            }
        }
    }

    #[tokio::test]
    async fn test_list_empty_registry() {
        let queues = list_queues(&[], &ListQueuesQuery::default()).await.unwrap();
        assert!(queues.is_empty());
    }
}
