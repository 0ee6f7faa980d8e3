use super::states::AuditAction;
use crate::assignment::{AssignmentResolver, ScopeTarget};
use crate::error::{Result, WorkflowError};
use crate::models::{Account, Order};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Who is attempting a transition, and when
#[derive(Debug, Clone, Copy)]
pub struct GuardContext<'a> {
    pub actor: &'a Account,
    pub action: AuditAction,
    pub now: DateTime<Utc>,
}

/// Trait for implementing state transition guards
#[async_trait]
pub trait StateGuard<T: Sync>: Send + Sync {
    /// `Ok(())` when the transition may proceed
    async fn check(&self, entity: &T, context: &GuardContext<'_>) -> Result<()>;

    /// Get a description of this guard for logging
    fn description(&self) -> &'static str;
}

/// Owner or an admin; anyone else is `Forbidden`
pub struct OwnerOrAdminGuard;

#[async_trait]
impl StateGuard<Order> for OwnerOrAdminGuard {
    async fn check(&self, order: &Order, context: &GuardContext<'_>) -> Result<()> {
        if order.is_owned_by(&context.actor.username) || context.actor.is_admin() {
            return Ok(());
        }
        Err(WorkflowError::Forbidden {
            actor: context.actor.username.clone(),
            action: context.action.to_string(),
            work_id: order.work_id.clone(),
        })
    }

    fn description(&self) -> &'static str {
        "Actor must own the order or be an admin"
    }
}

/// Actor must be in the eligible set of the current step
pub struct AssignedReviewerGuard;

#[async_trait]
impl StateGuard<Order> for AssignedReviewerGuard {
    async fn check(&self, order: &Order, context: &GuardContext<'_>) -> Result<()> {
        if order.is_assigned_to(&context.actor.username) {
            return Ok(());
        }
        Err(not_eligible(order, context))
    }

    fn description(&self) -> &'static str {
        "Actor must be an eligible reviewer for the current step"
    }
}

/// Final-step reviewer or an admin
pub struct ExecutorGuard;

#[async_trait]
impl StateGuard<Order> for ExecutorGuard {
    async fn check(&self, order: &Order, context: &GuardContext<'_>) -> Result<()> {
        if order.is_assigned_to(&context.actor.username) || context.actor.is_admin() {
            return Ok(());
        }
        Err(not_eligible(order, context))
    }

    fn description(&self) -> &'static str {
        "Executor must be a final-step reviewer or an admin"
    }
}

/// Scheduled orders cannot run before their `delay_until`
pub struct ExecutionWindowGuard;

#[async_trait]
impl StateGuard<Order> for ExecutionWindowGuard {
    async fn check(&self, order: &Order, context: &GuardContext<'_>) -> Result<()> {
        match order.delay_until {
            Some(not_before) if context.now < not_before => Err(WorkflowError::validation(
                format!(
                    "order {} is scheduled for {}",
                    order.work_id,
                    not_before.to_rfc3339()
                ),
            )),
            _ => Ok(()),
        }
    }

    fn description(&self) -> &'static str {
        "Execution must not start before the scheduled time"
    }
}

/// Actor must still hold the scope grant of `step`. Grants can be revoked
/// after a step opened, so the stored assignment alone is not enough.
pub struct CurrentGrantGuard<'r> {
    resolver: &'r AssignmentResolver,
    step: u32,
    admin_exempt: bool,
}

impl<'r> CurrentGrantGuard<'r> {
    /// For decisions on the step under review
    pub fn reviewer(resolver: &'r AssignmentResolver, step: u32) -> Self {
        Self {
            resolver,
            step,
            admin_exempt: false,
        }
    }

    /// For execution by a final-step reviewer; admins need no grant
    pub fn executor(resolver: &'r AssignmentResolver, final_step: u32) -> Self {
        Self {
            resolver,
            step: final_step,
            admin_exempt: true,
        }
    }
}

#[async_trait]
impl<'r> StateGuard<Order> for CurrentGrantGuard<'r> {
    async fn check(&self, order: &Order, context: &GuardContext<'_>) -> Result<()> {
        if self.admin_exempt && context.actor.is_admin() {
            return Ok(());
        }
        let eligible = self
            .resolver
            .is_eligible(&context.actor.username, self.step, ScopeTarget::from(order))
            .await?;
        if eligible {
            return Ok(());
        }
        Err(WorkflowError::NotEligible {
            actor: context.actor.username.clone(),
            action: context.action.to_string(),
            work_id: order.work_id.clone(),
            step: self.step,
        })
    }

    fn description(&self) -> &'static str {
        "Actor must currently hold the step's scope grant"
    }
}

fn not_eligible(order: &Order, context: &GuardContext<'_>) -> WorkflowError {
    WorkflowError::NotEligible {
        actor: context.actor.username.clone(),
        action: context.action.to_string(),
        work_id: order.work_id.clone(),
        step: order.current_step,
    }
}
