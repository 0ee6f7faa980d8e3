//! Audit trail continuity and idempotent appends

mod common;

use chrono::Utc;
use common::*;
use order_workflow::audit::ContinuityError;
use order_workflow::models::NewAuditEntry;
use order_workflow::{AuditAction, AuditTrail, OrderStatus};

#[tokio::test]
async fn test_history_is_continuous_through_a_full_lifecycle() {
    let harness = Harness::new(two_step());
    let order = harness.engine.create("alice", submission("select 1")).await.unwrap();
    harness.engine.approve(order.id, "bob", None).await.unwrap();
    harness.engine.reject(order.id, "dan", "wrong database").await.unwrap();
    harness.engine.edit(order.id, "alice", "select 2").await.unwrap();
    harness.engine.approve(order.id, "erin", None).await.unwrap();
    harness.engine.approve(order.id, "dan", None).await.unwrap();
    let order = harness.engine.execute(order.id, "dan").await.unwrap();

    let history = harness.history(order.id).await;
    let actions: Vec<AuditAction> = history.iter().map(|entry| entry.action).collect();
    assert_eq!(
        actions,
        vec![
            AuditAction::Create,
            AuditAction::Agree,
            AuditAction::Reject,
            AuditAction::Edit,
            AuditAction::Agree,
            AuditAction::Agree,
            AuditAction::Execute,
        ]
    );
    assert!(history.windows(2).all(|pair| pair[0].id < pair[1].id));
    assert_eq!(AuditTrail::verify_order(&order, &history), Ok(()));

    // the edit opened revision 1; everything after it carries that revision
    assert_eq!(history[3].revision, 1);
    assert_eq!(history[3].from_status, Some(OrderStatus::Rejected));
    assert_eq!(history[3].to_step, 0);
    assert!(history[4..].iter().all(|entry| entry.revision == 1));
}

#[tokio::test]
async fn test_append_ignores_repeated_key() {
    let harness = Harness::new(single_step());
    let trail = AuditTrail::new(harness.repository.clone());
    let order = harness.engine.create("alice", submission("select 1")).await.unwrap();

    let creation = NewAuditEntry::creation(order.id, "alice", Utc::now());
    assert!(!trail.append(&creation).await.unwrap());

    let history = trail.history(order.id).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].actor, "alice");
}

#[tokio::test]
async fn test_verify_reports_status_mismatch() {
    let harness = Harness::new(single_step());
    let order = harness.engine.create("alice", submission("select 1")).await.unwrap();
    let history = harness.history(order.id).await;

    let mut moved = order.clone();
    moved.status = OrderStatus::Rejected;
    assert_eq!(
        AuditTrail::verify_order(&moved, &history),
        Err(ContinuityError::StatusMismatch {
            recorded: OrderStatus::Created,
            actual: OrderStatus::Rejected,
        })
    );
    assert_eq!(AuditTrail::verify(&[]), Err(ContinuityError::Empty));
}
