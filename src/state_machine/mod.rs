// Order approval state machine
//
// States and verbs live in `states`, requested changes in `events`. The
// engine plans a transition, checks its guards, persists it through
// `persistence` and then runs the post-commit `actions`.

pub mod actions;
pub mod engine;
pub mod events;
pub mod guards;
pub mod persistence;
pub mod states;
pub mod work_ids;

// Re-export main types for convenient access
pub use engine::WorkflowEngine;
pub use events::OrderEvent;
pub use states::{AuditAction, OrderStatus, StatusLabel};
pub use work_ids::{TimestampWorkIds, WorkIdSource};

// Common traits
pub use actions::StateAction;
pub use guards::StateGuard;
pub use persistence::TransitionPersistence;
