//! # Audit Trail
//!
//! Append-only history of every transition applied to an order. Appends
//! are idempotent on `(order_id, revision, step, action)` so a retried write
//! never duplicates an entry.

use crate::error::Result;
use crate::models::{AuditEntry, NewAuditEntry, Order};
use crate::repository::OrderRepository;
use crate::state_machine::states::{AuditAction, OrderStatus};
use std::sync::Arc;
use thiserror::Error;

/// A break in an order's recorded history
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContinuityError {
    #[error("history is empty")]
    Empty,

    #[error("first entry is '{action}', expected a creation entry")]
    MissingCreation { action: AuditAction },

    #[error("entry {index} starts from {from:?}/{from_step} but the previous entry ended at {previous}/{previous_step}")]
    Gap {
        index: usize,
        from: Option<OrderStatus>,
        from_step: u32,
        previous: OrderStatus,
        previous_step: u32,
    },

    #[error("history ends at {recorded} but the order is {actual}")]
    StatusMismatch {
        recorded: OrderStatus,
        actual: OrderStatus,
    },
}

#[derive(Clone)]
pub struct AuditTrail {
    repository: Arc<dyn OrderRepository>,
}

impl std::fmt::Debug for AuditTrail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditTrail").finish_non_exhaustive()
    }
}

impl AuditTrail {
    pub fn new(repository: Arc<dyn OrderRepository>) -> Self {
        Self { repository }
    }

    /// `false` when an entry with the same key is already recorded
    pub async fn append(&self, entry: &NewAuditEntry) -> Result<bool> {
        let appended = self.repository.append_audit(entry).await?;
        if !appended {
            tracing::debug!(
                order_id = entry.order_id,
                revision = entry.revision,
                step = entry.step,
                action = %entry.action,
                "Duplicate audit entry ignored"
            );
        }
        Ok(appended)
    }

    pub async fn history(&self, order_id: i64) -> Result<Vec<AuditEntry>> {
        self.repository.history(order_id).await
    }

    /// Each entry must start where the previous one ended
    pub fn verify(history: &[AuditEntry]) -> std::result::Result<(), ContinuityError> {
        let first = history.first().ok_or(ContinuityError::Empty)?;
        if first.action != AuditAction::Create || first.from_status.is_some() {
            return Err(ContinuityError::MissingCreation {
                action: first.action,
            });
        }

        for (index, pair) in history.windows(2).enumerate() {
            let (previous, entry) = (&pair[0], &pair[1]);
            if entry.from_status != Some(previous.to_status) || entry.from_step != previous.to_step
            {
                return Err(ContinuityError::Gap {
                    index: index + 1,
                    from: entry.from_status,
                    from_step: entry.from_step,
                    previous: previous.to_status,
                    previous_step: previous.to_step,
                });
            }
        }
        Ok(())
    }

    /// [`AuditTrail::verify`] plus the latest entry agreeing with the stored order
    pub fn verify_order(
        order: &Order,
        history: &[AuditEntry],
    ) -> std::result::Result<(), ContinuityError> {
        Self::verify(history)?;
        match history.last() {
            Some(last) if last.to_status != order.status => Err(ContinuityError::StatusMismatch {
                recorded: last.to_status,
                actual: order.status,
            }),
            _ => Ok(()),
        }
    }
}
