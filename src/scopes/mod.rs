//! # Query Scopes
//!
//! Worklist filters expressed as a value object and rendered per store.
//!
//! ```rust
//! use order_workflow::models::OrderKind;
//! use order_workflow::scopes::{OrderScope, OrderScopeQuery, Visibility};
//!
//! let scope = OrderScope::new(Visibility::Owner("alice".to_string()))
//!     .of_kind(OrderKind::Query)
//!     .in_idc("dc-east");
//! let query = OrderScopeQuery::count(&scope);
//! assert!(query.sql().starts_with("SELECT COUNT(*) FROM orders WHERE"));
//! ```

pub mod order;

pub use order::{OrderScope, OrderScopeQuery, Visibility};
