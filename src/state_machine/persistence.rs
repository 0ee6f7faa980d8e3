use crate::error::{Result, WorkflowError};
use crate::models::Order;
use crate::repository::{OrderRepository, TransitionCommit};
use async_trait::async_trait;
use std::sync::Arc;

/// Trait for persisting state transitions
#[async_trait]
pub trait TransitionPersistence: Send + Sync {
    /// Commit a transition. `false` when the order moved underneath us.
    async fn persist_transition(&self, commit: &TransitionCommit) -> Result<bool>;

    /// Current stored record, `NotFound` if it does not exist
    async fn resolve_current(&self, order_id: i64) -> Result<Order>;
}

/// Persists transitions through the order repository
#[derive(Clone)]
pub struct OrderTransitionPersistence {
    repository: Arc<dyn OrderRepository>,
}

impl OrderTransitionPersistence {
    pub fn new(repository: Arc<dyn OrderRepository>) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl TransitionPersistence for OrderTransitionPersistence {
    async fn persist_transition(&self, commit: &TransitionCommit) -> Result<bool> {
        let committed = self.repository.commit_transition(commit).await?;
        if !committed {
            tracing::debug!(
                order_id = commit.order_id,
                expected_status = %commit.expected.status,
                expected_step = commit.expected.step,
                expected_revision = commit.expected.revision,
                "Compare-and-swap lost, order changed concurrently"
            );
        }
        Ok(committed)
    }

    async fn resolve_current(&self, order_id: i64) -> Result<Order> {
        self.repository
            .load(order_id)
            .await?
            .ok_or_else(|| WorkflowError::order_not_found(order_id))
    }
}
