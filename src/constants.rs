//! # System Constants
//!
//! Fixed limits and grouped status sets shared by the engine, the search
//! layer and the SQL scopes.

/// Worklist page size
pub const PAGE_SIZE: u32 = 15;

/// Compare-and-swap retries when the order key did not change underneath us
pub const DEFAULT_CONFLICT_RETRIES: u32 = 3;

/// Attempts at generating a fresh work id before giving up
pub const DEFAULT_WORK_ID_ATTEMPTS: u32 = 3;

/// Broadcast capacity of the workflow event channel
pub const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Workflow event names as published to subscribers
pub mod events {
    pub const ORDER_CREATED: &str = "order.created";
    pub const ORDER_EDITED: &str = "order.edited";
    pub const STEP_COMPLETED: &str = "order.step_completed";
    pub const ORDER_REJECTED: &str = "order.rejected";
    pub const ORDER_EXECUTED: &str = "order.executed";
    pub const ORDER_CANCELLED: &str = "order.cancelled";
    pub const ORDER_DELETED: &str = "order.deleted";
    pub const ORDER_CLOSED: &str = "order.closed";
}

/// Status groupings used when building filters
pub mod status_groups {
    use crate::state_machine::states::OrderStatus;

    /// Statuses that still count as an open submission for duplicate detection
    pub const OPEN_STATUSES: [OrderStatus; 4] = [
        OrderStatus::Created,
        OrderStatus::Reviewing,
        OrderStatus::Rejected,
        OrderStatus::AllEnded,
    ];
}

#[cfg(test)]
mod tests {
    use super::status_groups::*;
    use crate::state_machine::states::OrderStatus;

    #[test]
    fn test_open_statuses_agree_with_state_predicate() {
        for status in OPEN_STATUSES {
            assert!(status.is_open());
        }
        assert_eq!(
            OrderStatus::ALL.iter().filter(|status| status.is_open()).count(),
            OPEN_STATUSES.len()
        );
    }
}
