//! Workflow events published after every committed transition.

use crate::constants::events;
use crate::state_machine::states::{AuditAction, OrderStatus, StatusLabel};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowEventKind {
    OrderCreated,
    OrderEdited,
    StepCompleted,
    OrderRejected,
    OrderExecuted,
    OrderCancelled,
    OrderDeleted,
    OrderClosed,
}

impl WorkflowEventKind {
    pub fn for_action(action: AuditAction) -> Self {
        match action {
            AuditAction::Create => Self::OrderCreated,
            AuditAction::Edit => Self::OrderEdited,
            AuditAction::Agree => Self::StepCompleted,
            AuditAction::Reject => Self::OrderRejected,
            AuditAction::Execute => Self::OrderExecuted,
            AuditAction::Cancel => Self::OrderCancelled,
            AuditAction::Delete => Self::OrderDeleted,
            AuditAction::Close => Self::OrderClosed,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::OrderCreated => events::ORDER_CREATED,
            Self::OrderEdited => events::ORDER_EDITED,
            Self::StepCompleted => events::STEP_COMPLETED,
            Self::OrderRejected => events::ORDER_REJECTED,
            Self::OrderExecuted => events::ORDER_EXECUTED,
            Self::OrderCancelled => events::ORDER_CANCELLED,
            Self::OrderDeleted => events::ORDER_DELETED,
            Self::OrderClosed => events::ORDER_CLOSED,
        }
    }
}

/// Notification payload for one transition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowEvent {
    pub kind: WorkflowEventKind,
    pub order_id: i64,
    pub work_id: String,
    pub actor: String,
    pub owner: String,
    /// Who has to act next; empty once the order leaves review
    pub next_actors: Vec<String>,
    pub status: OrderStatus,
    pub step: u32,
    pub label: StatusLabel,
    pub comment: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

impl WorkflowEvent {
    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    /// Owner plus next actors, deduplicated, in a stable order
    pub fn recipients(&self) -> Vec<String> {
        let mut recipients = Vec::with_capacity(self.next_actors.len() + 1);
        recipients.push(self.owner.clone());
        for actor in &self.next_actors {
            if !recipients.contains(actor) {
                recipients.push(actor.clone());
            }
        }
        recipients
    }
}
