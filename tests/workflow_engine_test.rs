//! End-to-end transitions through the workflow engine on the in-memory store

mod common;

use chrono::{Duration, Utc};
use common::*;
use order_workflow::models::OrderSubmission;
use order_workflow::scopes::OrderScope;
use order_workflow::{
    AuditAction, ErrorKind, OrderRepository, OrderStatus, WorkflowError, WorkflowEventKind,
};
use std::sync::Arc;
use tokio_test::{assert_err, assert_ok};

#[tokio::test]
async fn test_single_step_approval_ends_review() {
    let harness = Harness::new(single_step());

    let order = assert_ok!(harness.engine.create("alice", submission("update t set a = 1")).await);
    assert_eq!(order.status, OrderStatus::Created);
    assert_eq!(order.current_step, 0);
    assert_eq!(order.revision, 0);
    assert_eq!(order.assigned, vec!["bob", "erin"]);
    assert_eq!(order.work_id.len(), 20);

    let order = assert_ok!(harness.engine.approve(order.id, "bob", None).await);
    assert_eq!(order.status, OrderStatus::AllEnded);
    assert_eq!(order.current_step, 1);
    // the last step's reviewers stay on as executors
    assert_eq!(order.assigned, vec!["bob", "erin"]);

    let history = harness.history(order.id).await;
    let actions: Vec<AuditAction> = history.iter().map(|entry| entry.action).collect();
    assert_eq!(actions, vec![AuditAction::Create, AuditAction::Agree]);
    assert_eq!(history[1].from_status, Some(OrderStatus::Created));
    assert_eq!(history[1].to_status, OrderStatus::AllEnded);
    assert_eq!(history[1].to_step, 1);

    let err = assert_err!(harness.engine.approve(order.id, "erin", None).await);
    assert!(matches!(
        err,
        WorkflowError::InvalidTransition {
            from: OrderStatus::AllEnded,
            ..
        }
    ));
    assert_eq!(harness.history(order.id).await.len(), 2);
}

#[tokio::test]
async fn test_multi_step_chain_reassigns_each_step() {
    let harness = Harness::new(two_step());

    let order = harness
        .engine
        .create("alice", submission("alter table t add c int"))
        .await
        .unwrap();
    let order = harness.engine.approve(order.id, "bob", Some("ok".into())).await.unwrap();
    assert_eq!(order.status, OrderStatus::Reviewing);
    assert_eq!(order.current_step, 1);
    assert_eq!(order.assigned, vec!["dan"]);

    // bob was only eligible for the first step
    let err = harness.engine.approve(order.id, "bob", None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotEligible);

    let order = harness.engine.approve(order.id, "dan", None).await.unwrap();
    assert_eq!(order.status, OrderStatus::AllEnded);
    assert_eq!(order.current_step, 2);

    let history = harness.history(order.id).await;
    assert_eq!(history.len(), 3);
    assert_eq!(history[1].comment.as_deref(), Some("ok"));
    assert_eq!(harness.stored(order.id).await, order);
}

#[tokio::test]
async fn test_multi_approver_disabled_uses_first_step_only() {
    let mut config = two_step();
    config.multi_approver = false;
    let harness = Harness::new(config);

    let order = harness.engine.create("alice", submission("select 1")).await.unwrap();
    let order = harness.engine.approve(order.id, "erin", None).await.unwrap();
    assert_eq!(order.status, OrderStatus::AllEnded);
}

#[tokio::test]
async fn test_edit_by_non_owner_is_forbidden() {
    let harness = Harness::new(single_step());
    let order = harness.engine.create("alice", submission("select 1")).await.unwrap();

    let err = harness.engine.edit(order.id, "carol", "select 2").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);

    let stored = harness.stored(order.id).await;
    assert_eq!(stored.text, "select 1");
    assert_eq!(stored.revision, 0);
    assert_eq!(harness.history(order.id).await.len(), 1);
}

#[tokio::test]
async fn test_edit_restarts_the_chain() {
    let harness = Harness::new(two_step());
    let order = harness.engine.create("alice", submission("select 1")).await.unwrap();
    let order = harness.engine.approve(order.id, "bob", None).await.unwrap();
    assert_eq!(order.current_step, 1);

    let order = harness.engine.edit(order.id, "alice", "select 2").await.unwrap();
    assert_eq!(order.status, OrderStatus::Created);
    assert_eq!(order.current_step, 0);
    assert_eq!(order.revision, 1);
    assert_eq!(order.text, "select 2");
    assert_eq!(order.assigned, vec!["bob", "erin"]);

    let err = harness.engine.edit(order.id, "alice", "  ").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    // admins may edit on the owner's behalf
    let order = harness.engine.edit(order.id, "root", "select 3").await.unwrap();
    assert_eq!(order.revision, 2);
}

#[tokio::test]
async fn test_reject_requires_reason_and_edit_reopens() {
    let harness = Harness::new(single_step());
    let order = harness.engine.create("alice", submission("delete from t")).await.unwrap();

    let err = harness.engine.reject(order.id, "bob", "").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(harness.history(order.id).await.len(), 1);

    let err = harness.engine.reject(order.id, "dan", "no").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotEligible);

    let order = harness
        .engine
        .reject(order.id, "bob", "missing where clause")
        .await
        .unwrap();
    assert_eq!(order.status, OrderStatus::Rejected);
    assert!(order.assigned.is_empty());

    let history = harness.history(order.id).await;
    assert_eq!(history.last().unwrap().action, AuditAction::Reject);
    assert_eq!(
        history.last().unwrap().comment.as_deref(),
        Some("missing where clause")
    );

    let err = harness.engine.approve(order.id, "bob", None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidTransition);

    let order = harness
        .engine
        .edit(order.id, "alice", "delete from t where id = 1")
        .await
        .unwrap();
    assert_eq!(order.status, OrderStatus::Created);
    assert_eq!(order.revision, 1);
    assert_eq!(order.assigned, vec!["bob", "erin"]);
}

#[tokio::test]
async fn test_execute_only_after_full_approval() {
    let harness = Harness::new(single_step());
    let order = harness.engine.create("alice", submission("update t set a = 1")).await.unwrap();

    let err = harness.engine.execute(order.id, "bob").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidTransition);

    harness.engine.approve(order.id, "bob", None).await.unwrap();

    let err = harness.engine.execute(order.id, "carol").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotEligible);

    let order = harness.engine.execute(order.id, "erin").await.unwrap();
    assert_eq!(order.status, OrderStatus::Ended);
    assert_eq!(order.executor.as_deref(), Some("erin"));
    assert!(order.execute_time.is_some());
    assert!(order.assigned.is_empty());

    let err = harness.engine.execute(order.id, "erin").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidTransition);
}

#[tokio::test]
async fn test_revoked_grant_stops_assigned_reviewer() {
    let harness = Harness::new(single_step());
    let order = harness.engine.create("alice", submission("select 1")).await.unwrap();
    assert_eq!(order.assigned, vec!["bob", "erin"]);

    harness.directory.revoke("bob", "dba:dc1");
    let err = harness.engine.approve(order.id, "bob", None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotEligible);
    let err = harness.engine.reject(order.id, "bob", "no").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotEligible);
    assert_eq!(harness.stored(order.id).await.status, OrderStatus::Created);
    assert_eq!(harness.history(order.id).await.len(), 1);

    harness.engine.approve(order.id, "erin", None).await.unwrap();
    harness.directory.revoke("erin", "dba:dc1");
    let err = harness.engine.execute(order.id, "erin").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotEligible);

    let order = harness.engine.execute(order.id, "root").await.unwrap();
    assert_eq!(order.executor.as_deref(), Some("root"));
}

#[tokio::test]
async fn test_execute_waits_for_delay() {
    let harness = Harness::new(single_step());
    let delayed = submission("update t set a = 1").delayed_until(Utc::now() + Duration::hours(1));
    let order = harness.engine.create("alice", delayed).await.unwrap();
    harness.engine.approve(order.id, "bob", None).await.unwrap();

    let err = harness.engine.execute(order.id, "bob").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(harness.stored(order.id).await.status, OrderStatus::AllEnded);

    let past = submission("update t set a = 2").delayed_until(Utc::now() - Duration::minutes(5));
    let order = harness.engine.create("alice", past).await.unwrap();
    harness.engine.approve(order.id, "bob", None).await.unwrap();
    // admins can always execute
    let order = harness.engine.execute(order.id, "root").await.unwrap();
    assert_eq!(order.status, OrderStatus::Ended);
}

#[tokio::test]
async fn test_query_orders_close_instead_of_execute() {
    let harness = Harness::new(single_step());
    let order = harness.engine.create("alice", query_submission("select * from t")).await.unwrap();
    harness.engine.approve(order.id, "bob", None).await.unwrap();

    let err = harness.engine.execute(order.id, "bob").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidTransition);

    let err = harness.engine.close(order.id, "carol").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);

    let order = harness.engine.close(order.id, "alice").await.unwrap();
    assert_eq!(order.status, OrderStatus::Ended);
    assert_eq!(
        harness.history(order.id).await.last().unwrap().action,
        AuditAction::Close
    );

    let execution = harness.engine.create("alice", submission("select 1")).await.unwrap();
    harness.engine.approve(execution.id, "bob", None).await.unwrap();
    let err = harness.engine.close(execution.id, "alice").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidTransition);
}

#[tokio::test]
async fn test_cancel_is_idempotent() {
    let harness = Harness::new(single_step());
    let order = harness.engine.create("alice", submission("select 1")).await.unwrap();

    let err = harness.engine.cancel(order.id, "carol").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);

    let first = harness.engine.cancel(order.id, "alice").await.unwrap();
    assert_eq!(first.status, OrderStatus::Cancelled);
    let second = harness.engine.cancel(order.id, "alice").await.unwrap();
    assert_eq!(second.status, OrderStatus::Cancelled);

    let cancels = harness
        .history(order.id)
        .await
        .iter()
        .filter(|entry| entry.action == AuditAction::Cancel)
        .count();
    assert_eq!(cancels, 1);

    // already cancelled does not bypass the owner check
    let err = harness.engine.cancel(order.id, "carol").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);
}

#[tokio::test]
async fn test_cancel_after_approval() {
    let harness = Harness::new(single_step());
    let order = harness.engine.create("alice", submission("select 1")).await.unwrap();
    harness.engine.approve(order.id, "bob", None).await.unwrap();

    let order = harness.engine.cancel(order.id, "root").await.unwrap();
    assert_eq!(order.status, OrderStatus::AllCancelled);

    let err = harness.engine.execute(order.id, "bob").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidTransition);

    let ended = harness.engine.create("alice", submission("select 2")).await.unwrap();
    harness.engine.approve(ended.id, "bob", None).await.unwrap();
    harness.engine.execute(ended.id, "bob").await.unwrap();
    let err = harness.engine.cancel(ended.id, "alice").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidTransition);
}

#[tokio::test]
async fn test_delete_keeps_history() {
    let harness = Harness::new(single_step());
    let order = harness.engine.create("alice", submission("select 1")).await.unwrap();

    let err = harness.engine.delete(order.id, "bob").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);

    let order = harness.engine.delete(order.id, "alice").await.unwrap();
    assert_eq!(order.status, OrderStatus::Deleted);
    assert!(order.assigned.is_empty());
    assert_eq!(harness.history(order.id).await.len(), 2);

    let err = harness.engine.approve(order.id, "bob", None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidTransition);
}

#[tokio::test]
async fn test_create_without_reviewers_stores_nothing() {
    let harness = Harness::new(single_step());

    let err = harness
        .engine
        .create("alice", OrderSubmission::execution("s1", "d1", "select 1").in_idc("dc9"))
        .await
        .unwrap_err();
    match err {
        WorkflowError::NoReviewerAvailable { step, scope } => {
            assert_eq!(step, 0);
            assert_eq!(scope, "dba:dc9");
        }
        other => panic!("unexpected error: {other}"),
    }

    let page = harness
        .repository
        .query(&OrderScope::unrestricted(), 0, 15)
        .await
        .unwrap();
    assert_eq!(page.total_count, 0);
}

#[tokio::test]
async fn test_create_rejects_bad_input() {
    let harness = Harness::new(single_step());

    let err = harness
        .engine
        .create("alice", OrderSubmission::execution("", "d1", "select 1"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let err = harness.engine.create("mallory", submission("select 1")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let err = harness.engine.approve(404, "bob", None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_preferred_assignee_must_be_eligible() {
    let harness = Harness::new(single_step());

    let order = harness
        .engine
        .create("alice", submission("select 1").assigned_to("erin"))
        .await
        .unwrap();
    assert_eq!(order.assigned, vec!["erin"]);

    let err = harness.engine.approve(order.id, "bob", None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotEligible);

    let err = harness
        .engine
        .create("alice", submission("select 2").assigned_to("dan"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotEligible);
}

#[tokio::test]
async fn test_duplicate_open_submission_refused() {
    let mut config = single_step();
    config.reject_duplicates = true;
    let harness = Harness::new(config);

    let first = harness.engine.create("alice", submission("select 1")).await.unwrap();
    let err = harness.engine.create("alice", submission("select 1")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    // another owner or a closed original is fine
    harness.engine.create("carol", submission("select 1")).await.unwrap();
    harness.engine.cancel(first.id, "alice").await.unwrap();
    harness.engine.create("alice", submission("select 1")).await.unwrap();
}

#[tokio::test]
async fn test_work_id_collision_regenerates() {
    let harness = Harness::new(single_step());
    let engine = harness
        .engine
        .clone()
        .with_work_ids(Arc::new(FixedWorkIds::new(&["W1", "W1", "W2"])));

    let first = engine.create("alice", submission("select 1")).await.unwrap();
    assert_eq!(first.work_id, "W1");
    let second = engine.create("alice", submission("select 2")).await.unwrap();
    assert_eq!(second.work_id, "W2");

    // only W2 is left and it is taken
    let err = engine.create("alice", submission("select 3")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[tokio::test]
async fn test_committed_transitions_are_published() {
    let harness = Harness::new(two_step());
    let mut events = harness.publisher.subscribe();

    let order = harness.engine.create("alice", submission("select 1")).await.unwrap();
    harness.engine.approve(order.id, "bob", None).await.unwrap();
    let _ = harness.engine.approve(order.id, "bob", None).await;

    let created = events.recv().await.unwrap();
    assert_eq!(created.kind, WorkflowEventKind::OrderCreated);
    assert_eq!(created.next_actors, vec!["bob", "erin"]);

    let approved = events.recv().await.unwrap();
    assert_eq!(approved.kind, WorkflowEventKind::StepCompleted);
    assert_eq!(approved.actor, "bob");
    assert_eq!(approved.next_actors, vec!["dan"]);

    // the refused second approval published nothing
    assert!(events.try_recv().is_err());
}
