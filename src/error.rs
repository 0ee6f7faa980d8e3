//! # Workflow Errors
//!
//! Domain errors surfaced by the workflow engine, the assignment resolver and
//! scoped search. Validation and eligibility errors are terminal for a call;
//! `Conflict` is the only retryable kind. Store failures are reported as
//! `Infrastructure` so callers can tell them apart from workflow decisions.

use crate::state_machine::states::OrderStatus;
use thiserror::Error;

/// Errors returned by workflow operations
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid transition: cannot {action} an order in state {from}")]
    InvalidTransition { from: OrderStatus, action: String },

    #[error("{actor} is not eligible to {action} order {work_id} at step {step}")]
    NotEligible {
        actor: String,
        action: String,
        work_id: String,
        step: u32,
    },

    #[error("{actor} is not allowed to {action} order {work_id}")]
    Forbidden {
        actor: String,
        action: String,
        work_id: String,
    },

    #[error("No reviewer available for step {step} (scope '{scope}')")]
    NoReviewerAvailable { step: u32, scope: String },

    #[error("Order {order_id} was modified concurrently, reload and retry")]
    Conflict { order_id: i64 },

    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    #[error("Infrastructure error: {0}")]
    Infrastructure(String),
}

/// Flat classification of [`WorkflowError`] for callers that map errors to responses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    InvalidTransition,
    NotEligible,
    Forbidden,
    NoReviewerAvailable,
    Conflict,
    NotFound,
    Infrastructure,
}

impl WorkflowError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::InvalidTransition { .. } => ErrorKind::InvalidTransition,
            Self::NotEligible { .. } => ErrorKind::NotEligible,
            Self::Forbidden { .. } => ErrorKind::Forbidden,
            Self::NoReviewerAvailable { .. } => ErrorKind::NoReviewerAvailable,
            Self::Conflict { .. } => ErrorKind::Conflict,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Infrastructure(_) => ErrorKind::Infrastructure,
        }
    }

    /// Only a lost compare-and-swap race is safe to retry with a fresh read
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation(reason.into())
    }

    pub fn order_not_found(key: impl ToString) -> Self {
        Self::NotFound {
            entity: "order",
            key: key.to_string(),
        }
    }

    pub fn account_not_found(username: impl Into<String>) -> Self {
        Self::NotFound {
            entity: "account",
            key: username.into(),
        }
    }
}

impl From<sqlx::Error> for WorkflowError {
    fn from(err: sqlx::Error) -> Self {
        Self::Infrastructure(format!("database error: {err}"))
    }
}

impl From<sqlx::migrate::MigrateError> for WorkflowError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        Self::Infrastructure(format!("migration error: {err}"))
    }
}

impl From<serde_json::Error> for WorkflowError {
    fn from(err: serde_json::Error) -> Self {
        Self::Infrastructure(format!("serialization error: {err}"))
    }
}

pub type Result<T> = std::result::Result<T, WorkflowError>;
