use super::states::StatusLabel;
use crate::error::Result;
use crate::events::{EventPublisher, WorkflowEvent, WorkflowEventKind};
use crate::logging::log_order_operation;
use crate::models::{NewAuditEntry, Order};
use async_trait::async_trait;

/// Trait for implementing post-commit transition actions
#[async_trait]
pub trait StateAction<T: Sync>: Send + Sync {
    /// Run after `transition` has been committed for `entity`
    async fn execute(&self, entity: &T, transition: &NewAuditEntry) -> Result<()>;

    /// Get a description of this action for logging
    fn description(&self) -> &'static str;
}

/// Action to publish workflow events when state transitions occur
pub struct PublishTransitionEventAction {
    event_publisher: EventPublisher,
}

impl PublishTransitionEventAction {
    pub fn new(event_publisher: EventPublisher) -> Self {
        Self { event_publisher }
    }
}

#[async_trait]
impl StateAction<Order> for PublishTransitionEventAction {
    async fn execute(&self, order: &Order, transition: &NewAuditEntry) -> Result<()> {
        let event = build_workflow_event(order, transition);
        let receivers = self.event_publisher.publish(event);
        tracing::trace!(
            order_id = order.id,
            action = %transition.action,
            receivers = receivers,
            "Workflow event published"
        );
        Ok(())
    }

    fn description(&self) -> &'static str {
        "Publish workflow event for order transition"
    }
}

/// Action to write the structured operation log line
pub struct LogTransitionAction;

#[async_trait]
impl StateAction<Order> for LogTransitionAction {
    async fn execute(&self, order: &Order, transition: &NewAuditEntry) -> Result<()> {
        let details = transition.comment.as_deref();
        log_order_operation(
            transition.action.as_str(),
            Some(order.id),
            Some(&order.work_id),
            &transition.actor,
            order.status.as_str(),
            Some(order.current_step),
            details,
        );
        Ok(())
    }

    fn description(&self) -> &'static str {
        "Log order transition"
    }
}

/// Event payload for a committed transition of `order`
pub fn build_workflow_event(order: &Order, transition: &NewAuditEntry) -> WorkflowEvent {
    WorkflowEvent {
        kind: WorkflowEventKind::for_action(transition.action),
        order_id: order.id,
        work_id: order.work_id.clone(),
        actor: transition.actor.clone(),
        owner: order.owner.clone(),
        next_actors: order.assigned.clone(),
        status: order.status,
        step: order.current_step,
        label: StatusLabel::for_transition(transition.action, transition.to_status),
        comment: transition.comment.clone(),
        occurred_at: transition.created_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewOrder, OrderKind};
    use crate::state_machine::states::{AuditAction, OrderStatus};
    use chrono::Utc;

    #[tokio::test]
    async fn test_publish_action_emits_event() {
        let order = NewOrder {
            work_id: "W1".into(),
            kind: OrderKind::Query,
            owner: "alice".into(),
            real_name: "Alice".into(),
            department: "ops".into(),
            text: "select * from t".into(),
            source: "s1".into(),
            idc: "dc1".into(),
            database: "d1".into(),
            table: None,
            change_type: None,
            backup: false,
            assigned: vec!["bob".into()],
            delay_until: None,
            relevant: None,
        }
        .into_order(3, Utc::now());

        let publisher = EventPublisher::new(8);
        let mut receiver = publisher.subscribe();
        let action = PublishTransitionEventAction::new(publisher);

        let creation = NewAuditEntry::creation(order.id, &order.owner, order.created_at);
        action.execute(&order, &creation).await.unwrap();

        let event = receiver.recv().await.unwrap();
        assert_eq!(event.kind, WorkflowEventKind::OrderCreated);
        assert_eq!(event.label, StatusLabel::Created);
        assert_eq!(event.next_actors, vec!["bob"]);
        assert_eq!(event.status, OrderStatus::Created);
        assert_eq!(creation.action, AuditAction::Create);
    }
}
