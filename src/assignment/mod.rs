//! # Assignment
//!
//! Maps an approval step of an order to the accounts allowed to decide it,
//! using the configured chain and the identity subsystem's label grants.

pub mod resolver;

pub use resolver::{AssignmentResolver, ScopeTarget};
