//! # Order Repository
//!
//! Storage seam for orders and their audit trail. The engine relies on two
//! guarantees from every implementation:
//!
//! - `commit_transition` applies the compare-and-swap and appends the audit
//!   entry atomically, or does neither.
//! - `insert_order` writes the creation entry together with the order and
//!   reports a `work_id` collision as `InsertOutcome::WorkIdTaken`. With
//!   `reject_duplicates` the open-duplicate check happens in the same unit
//!   as the insert.

pub mod memory;
pub mod postgres;

use crate::error::Result;
use crate::models::{AuditEntry, NewAuditEntry, NewOrder, Order, OrderUpdate, TransitionKey};
use crate::scopes::OrderScope;
use async_trait::async_trait;

pub use memory::InMemoryOrderRepository;
pub use postgres::PgOrderRepository;

/// One state change plus the audit entry describing it
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionCommit {
    pub order_id: i64,
    pub expected: TransitionKey,
    pub update: OrderUpdate,
    pub audit: NewAuditEntry,
}

/// Result of inserting a new order
#[derive(Debug, Clone, PartialEq)]
pub enum InsertOutcome {
    Inserted(Order),
    WorkIdTaken,
    /// The owner already has an open order with the same target and text
    DuplicateOpen,
}

/// Rows of one page plus the total across all pages
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryPage {
    pub rows: Vec<Order>,
    pub total_count: u64,
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Insert a new order and its creation entry
    async fn insert_order(
        &self,
        order: &NewOrder,
        reject_duplicates: bool,
    ) -> Result<InsertOutcome>;

    async fn load(&self, order_id: i64) -> Result<Option<Order>>;

    async fn load_by_work_id(&self, work_id: &str) -> Result<Option<Order>>;

    /// Write `update` only if the stored key still equals `expected`
    async fn compare_and_swap(
        &self,
        order_id: i64,
        expected: TransitionKey,
        update: &OrderUpdate,
    ) -> Result<bool>;

    /// Append unless an entry with the same key exists
    async fn append_audit(&self, entry: &NewAuditEntry) -> Result<bool>;

    /// Compare-and-swap plus audit append as one unit
    async fn commit_transition(&self, commit: &TransitionCommit) -> Result<bool>;

    /// Audit entries in insertion order
    async fn history(&self, order_id: i64) -> Result<Vec<AuditEntry>>;

    /// Newest first
    async fn query(&self, scope: &OrderScope, offset: u64, limit: u64) -> Result<QueryPage>;
}
