use super::{
    actions::{LogTransitionAction, PublishTransitionEventAction, StateAction},
    events::OrderEvent,
    guards::{
        AssignedReviewerGuard, CurrentGrantGuard, ExecutionWindowGuard, ExecutorGuard,
        GuardContext, OwnerOrAdminGuard, StateGuard,
    },
    persistence::{OrderTransitionPersistence, TransitionPersistence},
    states::{OrderStatus, StatusLabel},
    work_ids::{TimestampWorkIds, WorkIdSource},
};
use crate::assignment::{AssignmentResolver, ScopeTarget};
use crate::config::WorkflowConfig;
use crate::error::{Result, WorkflowError};
use crate::events::EventPublisher;
use crate::identity::IdentityProvider;
use crate::logging::log_workflow_rejection;
use crate::models::{
    Account, NewAuditEntry, NewOrder, Order, OrderKind, OrderSubmission, OrderUpdate,
};
use crate::repository::{InsertOutcome, OrderRepository, TransitionCommit};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Drives orders through the approval state machine.
///
/// Every transition is planned against a snapshot of the order, then
/// committed with a compare-and-swap on `(status, current_step, revision)`
/// together with its audit entry. A lost race reloads the order: an
/// unchanged key is retried, a moved key is a `Conflict` (cancel re-plans
/// instead, so it stays idempotent).
#[derive(Clone)]
pub struct WorkflowEngine {
    repository: Arc<dyn OrderRepository>,
    identity: Arc<dyn IdentityProvider>,
    resolver: AssignmentResolver,
    persistence: OrderTransitionPersistence,
    publisher: EventPublisher,
    config: Arc<WorkflowConfig>,
    work_ids: Arc<dyn WorkIdSource>,
}

impl std::fmt::Debug for WorkflowEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowEngine")
            .field("config", &self.config)
            .field("resolver", &self.resolver)
            .field("publisher", &self.publisher)
            .finish_non_exhaustive()
    }
}

impl WorkflowEngine {
    pub fn new(
        config: Arc<WorkflowConfig>,
        repository: Arc<dyn OrderRepository>,
        identity: Arc<dyn IdentityProvider>,
        publisher: EventPublisher,
    ) -> Self {
        Self {
            resolver: AssignmentResolver::new(config.clone(), identity.clone()),
            persistence: OrderTransitionPersistence::new(repository.clone()),
            repository,
            identity,
            publisher,
            config,
            work_ids: Arc::new(TimestampWorkIds),
        }
    }

    /// Replace the work id generator
    pub fn with_work_ids(mut self, work_ids: Arc<dyn WorkIdSource>) -> Self {
        self.work_ids = work_ids;
        self
    }

    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    pub fn resolver(&self) -> &AssignmentResolver {
        &self.resolver
    }

    pub fn publisher(&self) -> &EventPublisher {
        &self.publisher
    }

    /// Current stored record
    pub async fn load(&self, order_id: i64) -> Result<Order> {
        self.persistence.resolve_current(order_id).await
    }

    /// Submit a new order; it starts in `Created` at step 0
    pub async fn create(&self, actor: &str, submission: OrderSubmission) -> Result<Order> {
        let result = self.create_order(actor, submission).await;
        if let Err(err) = &result {
            log_workflow_rejection("create", None, actor, &err.to_string());
        }
        result
    }

    pub async fn edit(&self, order_id: i64, actor: &str, text: impl Into<String>) -> Result<Order> {
        self.transition(order_id, actor, OrderEvent::Edit { text: text.into() })
            .await
    }

    pub async fn delete(&self, order_id: i64, actor: &str) -> Result<Order> {
        self.transition(order_id, actor, OrderEvent::Delete).await
    }

    pub async fn approve(
        &self,
        order_id: i64,
        actor: &str,
        comment: Option<String>,
    ) -> Result<Order> {
        self.transition(order_id, actor, OrderEvent::Approve { comment })
            .await
    }

    pub async fn reject(
        &self,
        order_id: i64,
        actor: &str,
        comment: impl Into<String>,
    ) -> Result<Order> {
        self.transition(
            order_id,
            actor,
            OrderEvent::Reject {
                comment: comment.into(),
            },
        )
        .await
    }

    pub async fn execute(&self, order_id: i64, executor: &str) -> Result<Order> {
        self.transition(order_id, executor, OrderEvent::Execute)
            .await
    }

    /// Succeeds without a new audit entry when the order is already cancelled
    pub async fn cancel(&self, order_id: i64, actor: &str) -> Result<Order> {
        self.transition(order_id, actor, OrderEvent::Cancel).await
    }

    pub async fn close(&self, order_id: i64, actor: &str) -> Result<Order> {
        self.transition(order_id, actor, OrderEvent::Close).await
    }

    /// Apply an event to an existing order
    pub async fn transition(&self, order_id: i64, actor: &str, event: OrderEvent) -> Result<Order> {
        let result = self.apply_event(order_id, actor, &event).await;
        if let Err(err) = &result {
            log_workflow_rejection(event.event_type(), Some(order_id), actor, &err.to_string());
        }
        result
    }

    async fn create_order(&self, actor: &str, submission: OrderSubmission) -> Result<Order> {
        submission.validate().map_err(WorkflowError::Validation)?;
        let account = self.identity.resolve(actor).await?;

        let mut assigned = self
            .resolver
            .eligible_for(0, ScopeTarget::from(&submission))
            .await?;
        if let Some(preferred) = submission.preferred_assignee.as_deref() {
            if !assigned.iter().any(|reviewer| reviewer == preferred) {
                return Err(WorkflowError::NotEligible {
                    actor: preferred.to_string(),
                    action: "review".to_string(),
                    work_id: "new".to_string(),
                    step: 0,
                });
            }
            assigned = vec![preferred.to_string()];
        }

        let attempts = self.config.work_id_attempts;
        for attempt in 1..=attempts {
            let new_order = self.new_order(&account, &submission, assigned.clone());
            match self
                .repository
                .insert_order(&new_order, self.config.reject_duplicates)
                .await?
            {
                InsertOutcome::Inserted(order) => {
                    let creation =
                        NewAuditEntry::creation(order.id, &order.owner, order.created_at);
                    self.execute_actions(&order, &creation).await;
                    return Ok(order);
                }
                InsertOutcome::DuplicateOpen => {
                    info!(
                        owner = %new_order.owner,
                        source = %new_order.source,
                        database = %new_order.database,
                        label = %StatusLabel::DuplicateRejected,
                        "Duplicate submission refused"
                    );
                    return Err(WorkflowError::validation(
                        "an identical order from this owner is still open",
                    ));
                }
                InsertOutcome::WorkIdTaken => warn!(
                    work_id = %new_order.work_id,
                    attempt = attempt,
                    "Work id already taken, regenerating"
                ),
            }
        }

        Err(WorkflowError::validation(format!(
            "could not allocate a unique work id after {attempts} attempts"
        )))
    }

    fn new_order(
        &self,
        account: &Account,
        submission: &OrderSubmission,
        assigned: Vec<String>,
    ) -> NewOrder {
        NewOrder {
            work_id: self.work_ids.next_work_id(),
            kind: submission.kind,
            owner: account.username.clone(),
            real_name: account.real_name.clone(),
            department: account.department.clone(),
            text: submission.text.clone(),
            source: submission.source.trim().to_string(),
            idc: submission.idc.trim().to_string(),
            database: submission.database.trim().to_string(),
            table: submission.table.clone(),
            change_type: submission.change_type,
            backup: submission.backup,
            assigned,
            delay_until: submission.delay_until,
            relevant: submission.relevant.clone(),
        }
    }

    async fn apply_event(&self, order_id: i64, actor: &str, event: &OrderEvent) -> Result<Order> {
        Self::validate_event(event)?;
        let account = self.identity.resolve(actor).await?;
        let mut order = self.persistence.resolve_current(order_id).await?;
        let mut attempts = 0;

        loop {
            let Some(commit) = self.plan_transition(&order, &account, event).await? else {
                return Ok(order);
            };

            if self.persistence.persist_transition(&commit).await? {
                order.apply(&commit.update);
                self.execute_actions(&order, &commit.audit).await;
                return Ok(order);
            }

            attempts += 1;
            let fresh = self.persistence.resolve_current(order_id).await?;
            let moved = fresh.transition_key() != order.transition_key();
            let replans = matches!(event, OrderEvent::Cancel);
            if attempts >= self.config.conflict_retries || (moved && !replans) {
                return Err(WorkflowError::Conflict { order_id });
            }

            debug!(
                order_id = order_id,
                attempt = attempts,
                moved = moved,
                "Retrying transition against a fresh read"
            );
            order = fresh;
        }
    }

    /// Payload checks that do not depend on the order's state
    fn validate_event(event: &OrderEvent) -> Result<()> {
        match event {
            OrderEvent::Edit { text } if text.trim().is_empty() => {
                Err(WorkflowError::validation("order text must not be empty"))
            }
            OrderEvent::Reject { comment } if comment.trim().is_empty() => {
                Err(WorkflowError::validation("a rejection reason is required"))
            }
            _ => Ok(()),
        }
    }

    /// `None` means the event is already satisfied and nothing is written
    async fn plan_transition(
        &self,
        order: &Order,
        actor: &Account,
        event: &OrderEvent,
    ) -> Result<Option<TransitionCommit>> {
        let now = Utc::now();
        let action = event.audit_action();
        let context = GuardContext { actor, action, now };

        if matches!(event, OrderEvent::Cancel) {
            OwnerOrAdminGuard.check(order, &context).await?;
            if order.status.is_cancelled() {
                debug!(order_id = order.id, status = %order.status, "Order already cancelled");
                return Ok(None);
            }
        }

        let target_state = self.determine_target_state(order, event)?;
        self.check_guards(order, event, &context).await?;
        let update = self
            .build_update(order, event, target_state, &actor.username, now)
            .await?;

        let audit = NewAuditEntry {
            order_id: order.id,
            revision: update.revision,
            step: order.current_step,
            actor: actor.username.clone(),
            action,
            from_status: Some(order.status),
            to_status: update.status,
            from_step: order.current_step,
            to_step: update.current_step,
            comment: event.comment().map(str::to_string),
            created_at: now,
        };

        Ok(Some(TransitionCommit {
            order_id: order.id,
            expected: order.transition_key(),
            update,
            audit,
        }))
    }

    /// Determine the target state based on current state and event
    fn determine_target_state(&self, order: &Order, event: &OrderEvent) -> Result<OrderStatus> {
        use OrderStatus::*;

        let last_step = order.current_step + 1 >= self.config.chain_len();
        let target = match (order.status, event) {
            (Created | Reviewing | Rejected, OrderEvent::Edit { .. }) => Created,
            (Created | Reviewing | Rejected, OrderEvent::Delete) => Deleted,

            (Created | Reviewing, OrderEvent::Approve { .. }) if last_step => AllEnded,
            (Created | Reviewing, OrderEvent::Approve { .. }) => Reviewing,
            (Created | Reviewing, OrderEvent::Reject { .. }) => Rejected,

            (AllEnded, OrderEvent::Execute) if order.kind == OrderKind::Execution => Ended,
            (AllEnded, OrderEvent::Close) if order.kind == OrderKind::Query => Ended,

            (Created | Reviewing | Rejected, OrderEvent::Cancel) => Cancelled,
            (AllEnded, OrderEvent::Cancel) => AllCancelled,

            (from, _) => {
                return Err(WorkflowError::InvalidTransition {
                    from,
                    action: event.event_type().to_string(),
                })
            }
        };

        Ok(target)
    }

    /// Check guard conditions for the transition
    async fn check_guards(
        &self,
        order: &Order,
        event: &OrderEvent,
        context: &GuardContext<'_>,
    ) -> Result<()> {
        let final_step = self.config.chain_len().saturating_sub(1);
        let guards: Vec<Box<dyn StateGuard<Order> + '_>> = match event {
            OrderEvent::Edit { .. } | OrderEvent::Delete | OrderEvent::Close => {
                vec![Box::new(OwnerOrAdminGuard)]
            }
            // Assignment narrows the set; grants must still hold today
            OrderEvent::Approve { .. } | OrderEvent::Reject { .. } => vec![
                Box::new(AssignedReviewerGuard),
                Box::new(CurrentGrantGuard::reviewer(&self.resolver, order.current_step)),
            ],
            OrderEvent::Execute => vec![
                Box::new(ExecutorGuard),
                Box::new(CurrentGrantGuard::executor(&self.resolver, final_step)),
                Box::new(ExecutionWindowGuard),
            ],
            // Checked before the already-cancelled short circuit
            OrderEvent::Cancel => Vec::new(),
        };

        for guard in guards {
            if let Err(err) = guard.check(order, context).await {
                debug!(
                    order_id = order.id,
                    guard = guard.description(),
                    "Transition guard refused"
                );
                return Err(err);
            }
        }

        Ok(())
    }

    async fn build_update(
        &self,
        order: &Order,
        event: &OrderEvent,
        target_state: OrderStatus,
        actor: &str,
        now: DateTime<Utc>,
    ) -> Result<OrderUpdate> {
        let mut update = OrderUpdate::from_order(order, now);
        update.status = target_state;

        match event {
            OrderEvent::Edit { text } => {
                update.current_step = 0;
                update.revision = order.revision + 1;
                update.text = Some(text.clone());
                update.assigned = self
                    .resolver
                    .eligible_for(0, ScopeTarget::from(order))
                    .await?;
            }
            OrderEvent::Approve { .. } => {
                update.current_step = order.current_step + 1;
                // Final-step reviewers stay assigned as the executors
                if target_state == OrderStatus::Reviewing {
                    update.assigned = self
                        .resolver
                        .eligible_for(update.current_step, ScopeTarget::from(order))
                        .await?;
                }
            }
            OrderEvent::Execute => {
                update.executor = Some(actor.to_string());
                update.execute_time = Some(now);
                update.assigned.clear();
            }
            OrderEvent::Delete
            | OrderEvent::Reject { .. }
            | OrderEvent::Cancel
            | OrderEvent::Close => update.assigned.clear(),
        }

        Ok(update)
    }

    /// Execute actions after a committed transition; failures are only logged
    async fn execute_actions(&self, order: &Order, transition: &NewAuditEntry) {
        let actions: Vec<Box<dyn StateAction<Order>>> = vec![
            Box::new(PublishTransitionEventAction::new(self.publisher.clone())),
            Box::new(LogTransitionAction),
        ];

        for action in actions {
            if let Err(err) = action.execute(order, transition).await {
                warn!(
                    order_id = order.id,
                    action = action.description(),
                    error = %err,
                    "Post-transition action failed"
                );
            }
        }
    }
}
