use crate::state_machine::states::{AuditAction, OrderStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One recorded transition in an order's history. Never updated or deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: i64,
    pub order_id: i64,
    pub revision: u32,
    pub step: u32,
    pub actor: String,
    pub action: AuditAction,
    /// `None` only for the creation entry
    pub from_status: Option<OrderStatus>,
    pub to_status: OrderStatus,
    pub from_step: u32,
    pub to_step: u32,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Audit entry before the store assigns its id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAuditEntry {
    pub order_id: i64,
    pub revision: u32,
    pub step: u32,
    pub actor: String,
    pub action: AuditAction,
    pub from_status: Option<OrderStatus>,
    pub to_status: OrderStatus,
    pub from_step: u32,
    pub to_step: u32,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Retried writes with the same key are dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AuditKey {
    pub order_id: i64,
    pub revision: u32,
    pub step: u32,
    pub action: AuditAction,
}

impl NewAuditEntry {
    pub fn key(&self) -> AuditKey {
        AuditKey {
            order_id: self.order_id,
            revision: self.revision,
            step: self.step,
            action: self.action,
        }
    }

    pub fn into_entry(self, id: i64) -> AuditEntry {
        AuditEntry {
            id,
            order_id: self.order_id,
            revision: self.revision,
            step: self.step,
            actor: self.actor,
            action: self.action,
            from_status: self.from_status,
            to_status: self.to_status,
            from_step: self.from_step,
            to_step: self.to_step,
            comment: self.comment,
            created_at: self.created_at,
        }
    }

    /// Creation entry written together with a freshly inserted order
    pub fn creation(order_id: i64, owner: &str, created_at: DateTime<Utc>) -> Self {
        Self {
            order_id,
            revision: 0,
            step: 0,
            actor: owner.to_string(),
            action: AuditAction::Create,
            from_status: None,
            to_status: OrderStatus::Created,
            from_step: 0,
            to_step: 0,
            comment: None,
            created_at,
        }
    }
}

impl AuditEntry {
    pub fn key(&self) -> AuditKey {
        AuditKey {
            order_id: self.order_id,
            revision: self.revision,
            step: self.step,
            action: self.action,
        }
    }
}
