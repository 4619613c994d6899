//! Queue list and metrics polling for the dashboard.

use super::api::{ApiError, DashboardApi};
use super::poller::{spawn_poll, PollHandle};
use super::store::QueuesStore;
use crate::backend::{JobStatus, ListQueuesQuery};
use crate::config::DashboardSettings;
use crate::stats::{StatsQuery, TimeUnit};

use std::collections::HashMap;
use std::sync::Arc;

/// What the user is currently looking at.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueueView {
    pub active_queue: Option<String>,
    /// Selected job status per queue name.
    pub selected_statuses: HashMap<String, JobStatus>,
    pub page: Option<u64>,
}

/// Drives the fetch paths that feed a [`QueuesStore`].
#[derive(Clone)]
pub struct QueuesController {
    api: Arc<dyn DashboardApi>,
    store: Arc<QueuesStore>,
    settings: DashboardSettings,
    view: QueueView,
}

impl QueuesController {
    pub fn new(
        api: Arc<dyn DashboardApi>,
        store: Arc<QueuesStore>,
        settings: DashboardSettings,
        view: QueueView,
    ) -> Self {
        Self {
            api,
            store,
            settings,
            view,
        }
    }

    pub fn store(&self) -> &Arc<QueuesStore> {
        &self.store
    }

    pub fn settings(&self) -> &DashboardSettings {
        &self.settings
    }

    /// Filters for the queue list, from the current view.
    pub fn list_query(&self) -> ListQueuesQuery {
        let status = self
            .view
            .active_queue
            .as_ref()
            .and_then(|name| self.view.selected_statuses.get(name))
            .copied();

        ListQueuesQuery {
            active_queue: self.view.active_queue.clone(),
            status,
            page: self.view.page.unwrap_or(1),
            jobs_per_page: self.settings.jobs_per_page,
        }
    }

    /// Fetch the queue list once and publish it.
    ///
    /// Failures are logged and leave the store untouched.
    pub async fn update_queues(&self) {
        match self.api.get_queues(&self.list_query()).await {
            Ok(queues) => self.store.update_queues(queues),
            Err(e) => tracing::error!("Queues: Failed to fetch queue list: {}", e),
        }
    }

    /// Fetch normalized metrics for every queue and publish them.
    pub async fn get_queue_stats(
        &self,
        timeframe: TimeUnit,
        start: Option<i64>,
        end: Option<i64>,
    ) -> Result<(), ApiError> {
        let query = StatsQuery {
            start,
            end,
            timeframe,
        };

        match self.api.get_queue_stats(&query).await {
            Ok(metrics) => {
                self.store.update_metrics(metrics);
                Ok(())
            }
            Err(e) => {
                tracing::error!("Queues: Failed to fetch queue stats: {}", e);
                Err(e)
            }
        }
    }

    /// Keep the queue list fresh until the handle is released.
    pub fn poll_queues(&self) -> PollHandle {
        let controller = self.clone();
        spawn_poll("queues", self.settings.polling_period(), move || {
            let controller = controller.clone();
            async move { controller.update_queues().await }
        })
    }

    /// Keep the metrics fresh until the handle is released.
    pub fn pull_metrics(&self, start: Option<i64>, end: Option<i64>, timeframe: TimeUnit) -> PollHandle {
        let controller = self.clone();
        spawn_poll("metrics", self.settings.polling_period(), move || {
            let controller = controller.clone();
            async move {
                let _ = controller.get_queue_stats(timeframe, start, end).await;
            }
        })
    }
}
