//! Confirmation-gated queue actions.

use super::api::{ApiError, DashboardApi};
use super::queues::QueuesController;
use crate::backend::JobStatus;

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// A mutating queue action with its payload.
#[derive(Debug, Clone, PartialEq)]
pub enum QueueCommand {
    RetryAll { queue: String, status: JobStatus },
    PromoteAll { queue: String },
    CleanAll { queue: String, status: JobStatus },
    PauseQueue { queue: String },
    ResumeQueue { queue: String },
    EmptyQueue { queue: String },
    AddJob {
        queue: String,
        name: String,
        data: serde_json::Value,
        options: serde_json::Value,
    },
}

impl QueueCommand {
    pub fn queue(&self) -> &str {
        match self {
            QueueCommand::RetryAll { queue, .. }
            | QueueCommand::PromoteAll { queue }
            | QueueCommand::CleanAll { queue, .. }
            | QueueCommand::PauseQueue { queue }
            | QueueCommand::ResumeQueue { queue }
            | QueueCommand::EmptyQueue { queue }
            | QueueCommand::AddJob { queue, .. } => queue,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            QueueCommand::RetryAll { .. } => "retryAll",
            QueueCommand::PromoteAll { .. } => "promoteAll",
            QueueCommand::CleanAll { .. } => "cleanAll",
            QueueCommand::PauseQueue { .. } => "pauseQueue",
            QueueCommand::ResumeQueue { .. } => "resumeQueue",
            QueueCommand::EmptyQueue { .. } => "emptyQueue",
            QueueCommand::AddJob { .. } => "addJob",
        }
    }

    /// Message shown to the user before the action runs.
    pub fn confirm_message(&self) -> String {
        match self {
            QueueCommand::RetryAll { queue, status } => {
                format!("Are you sure that you want to retry all {} jobs in {}?", status, queue)
            }
            QueueCommand::PromoteAll { queue } => {
                format!("Are you sure that you want to promote all delayed jobs in {}?", queue)
            }
            QueueCommand::CleanAll { queue, status } => {
                format!("Are you sure that you want to clean all {} jobs in {}?", status, queue)
            }
            QueueCommand::PauseQueue { queue } => {
                format!("Are you sure that you want to pause {}?", queue)
            }
            QueueCommand::ResumeQueue { queue } => {
                format!("Are you sure that you want to resume {}?", queue)
            }
            QueueCommand::EmptyQueue { queue } => {
                format!("Are you sure that you want to empty {}?", queue)
            }
            QueueCommand::AddJob { queue, name, .. } => {
                format!("Add job {} to {}?", name, queue)
            }
        }
    }

    /// Adding a job never asks.
    pub fn requires_confirmation(&self, confirm_queue_actions: bool) -> bool {
        confirm_queue_actions && !matches!(self, QueueCommand::AddJob { .. })
    }

    async fn execute(&self, api: &dyn DashboardApi) -> Result<(), ApiError> {
        match self {
            QueueCommand::RetryAll { queue, status } => api.retry_all(queue, *status).await,
            QueueCommand::PromoteAll { queue } => api.promote_all(queue).await,
            QueueCommand::CleanAll { queue, status } => api.clean_all(queue, *status).await,
            QueueCommand::PauseQueue { queue } => api.pause_queue(queue).await,
            QueueCommand::ResumeQueue { queue } => api.resume_queue(queue).await,
            QueueCommand::EmptyQueue { queue } => api.empty_queue(queue).await,
            QueueCommand::AddJob {
                queue,
                name,
                data,
                options,
            } => api.add_job(queue, name, data.clone(), options.clone()).await,
        }
    }
}

impl fmt::Display for QueueCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind(), self.queue())
    }
}

/// Asks the user to approve an action.
#[async_trait]
pub trait Confirm: Send + Sync {
    async fn confirm(&self, message: &str) -> bool;
}

/// Approves everything.
pub struct AutoConfirm;

#[async_trait]
impl Confirm for AutoConfirm {
    async fn confirm(&self, _message: &str) -> bool {
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Executed,
    Cancelled,
}

/// Runs [`QueueCommand`]s against the API, then refreshes the queue list.
pub struct ActionDispatcher {
    api: Arc<dyn DashboardApi>,
    controller: QueuesController,
    confirm: Arc<dyn Confirm>,
}

impl ActionDispatcher {
    pub fn new(
        api: Arc<dyn DashboardApi>,
        controller: QueuesController,
        confirm: Arc<dyn Confirm>,
    ) -> Self {
        Self {
            api,
            controller,
            confirm,
        }
    }

    /// Submit one command.
    ///
    /// A denied confirmation runs nothing. Otherwise the queue list is
    /// refreshed after the mutation settles, and the mutation's own result is
    /// returned.
    pub async fn dispatch(&self, command: QueueCommand) -> Result<DispatchOutcome, ApiError> {
        let confirm_queue_actions = self.controller.settings().confirm_queue_actions;
        if command.requires_confirmation(confirm_queue_actions)
            && !self.confirm.confirm(&command.confirm_message()).await
        {
            tracing::info!("Actions: Cancelled {}", command);
            return Ok(DispatchOutcome::Cancelled);
        }

        tracing::info!("Actions: Running {}", command);
        let result = command.execute(self.api.as_ref()).await;
        if let Err(e) = &result {
            tracing::error!("Actions: {} failed: {}", command, e);
        }

        self.controller.update_queues().await;

        result.map(|_| DispatchOutcome::Executed)
    }
}
