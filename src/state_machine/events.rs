use super::states::AuditAction;
use serde::{Deserialize, Serialize};

/// Requests that can move an existing order through its lifecycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum OrderEvent {
    /// Replace the statement text and restart the approval chain
    Edit { text: String },
    /// Soft-delete the order
    Delete,
    /// Approve the current step
    Approve { comment: Option<String> },
    /// Reject at the current step; a reason is mandatory
    Reject { comment: String },
    /// Run an approved execution order
    Execute,
    /// Withdraw the order
    Cancel,
    /// Close an approved query order
    Close,
}

impl OrderEvent {
    /// Get a string representation of the event type for logging
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Edit { .. } => "edit",
            Self::Delete => "delete",
            Self::Approve { .. } => "approve",
            Self::Reject { .. } => "reject",
            Self::Execute => "execute",
            Self::Cancel => "cancel",
            Self::Close => "close",
        }
    }

    /// Verb recorded in the audit trail
    pub fn audit_action(&self) -> AuditAction {
        match self {
            Self::Edit { .. } => AuditAction::Edit,
            Self::Delete => AuditAction::Delete,
            Self::Approve { .. } => AuditAction::Agree,
            Self::Reject { .. } => AuditAction::Reject,
            Self::Execute => AuditAction::Execute,
            Self::Cancel => AuditAction::Cancel,
            Self::Close => AuditAction::Close,
        }
    }

    /// Comment carried into the audit entry and the published event
    pub fn comment(&self) -> Option<&str> {
        match self {
            Self::Approve { comment } => comment.as_deref(),
            Self::Reject { comment } => Some(comment),
            _ => None,
        }
    }
}
