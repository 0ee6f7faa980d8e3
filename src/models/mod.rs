//! # Models
//!
//! Orders, their audit entries, the accounts read from the identity
//! subsystem, and the search request/response shapes.

pub mod account;
pub mod audit_entry;
pub mod order;
pub mod search;

pub use account::{Account, GroupGrant, Role};
pub use audit_entry::{AuditEntry, AuditKey, NewAuditEntry};
pub use order::{
    ChangeType, NewOrder, Order, OrderKind, OrderSubmission, OrderUpdate, TransitionKey,
};
pub use search::{OrderList, Pagination, Search, SearchPage, SearchRequest};
