use serde::{Deserialize, Serialize};
use std::fmt;

/// Order lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Submitted (or edited) and waiting for the step 0 decision
    Created,
    /// Approved up to `current_step - 1`, waiting for the decision at `current_step`
    Reviewing,
    /// Rejected by a reviewer; the owner may edit to restart the chain
    Rejected,
    /// Every step approved; waiting for execution (or close, for query orders)
    AllEnded,
    /// Executed or closed
    Ended,
    /// Cancelled after full approval but before execution
    AllCancelled,
    /// Cancelled before full approval
    Cancelled,
    /// Soft-deleted; history is kept
    Deleted,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 8] = [
        Self::Created,
        Self::Reviewing,
        Self::Rejected,
        Self::AllEnded,
        Self::Ended,
        Self::AllCancelled,
        Self::Cancelled,
        Self::Deleted,
    ];

    /// Terminal for the review workflow. `AllEnded` still accepts the
    /// completion transitions (execute, close, cancel).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Ended | Self::AllEnded | Self::Cancelled | Self::AllCancelled | Self::Deleted
        )
    }

    /// A reviewer decision (approve/reject) is pending
    pub fn is_under_review(&self) -> bool {
        matches!(self, Self::Created | Self::Reviewing)
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled | Self::AllCancelled)
    }

    /// Still needs someone's attention
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Created | Self::Reviewing | Self::Rejected | Self::AllEnded)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Reviewing => "reviewing",
            Self::Rejected => "rejected",
            Self::AllEnded => "all_ended",
            Self::Ended => "ended",
            Self::AllCancelled => "all_cancelled",
            Self::Cancelled => "cancelled",
            Self::Deleted => "deleted",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("Invalid order status: {s}"))
    }
}

impl Default for OrderStatus {
    fn default() -> Self {
        Self::Created
    }
}

/// Verb recorded in an audit entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Create,
    Edit,
    Delete,
    Agree,
    Reject,
    Execute,
    Cancel,
    Close,
}

impl AuditAction {
    pub const ALL: [AuditAction; 8] = [
        Self::Create,
        Self::Edit,
        Self::Delete,
        Self::Agree,
        Self::Reject,
        Self::Execute,
        Self::Cancel,
        Self::Close,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Edit => "edit",
            Self::Delete => "delete",
            Self::Agree => "agree",
            Self::Reject => "reject",
            Self::Execute => "execute",
            Self::Cancel => "cancel",
            Self::Close => "close",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AuditAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|action| action.as_str() == s)
            .ok_or_else(|| format!("Invalid audit action: {s}"))
    }
}

/// Status vocabulary shown to users. Codes map 1:1 to UI labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StatusLabel {
    Created,
    DuplicateRejected,
    Edited,
    Deleted,
    Cleared,
    Agreed,
    Rejected,
    AllEnded,
    Ended,
    AllCancelled,
    DataDeleted,
    DataEdited,
    DataUpdated,
}

impl StatusLabel {
    pub const ALL: [StatusLabel; 13] = [
        Self::Created,
        Self::DuplicateRejected,
        Self::Edited,
        Self::Deleted,
        Self::Cleared,
        Self::Agreed,
        Self::Rejected,
        Self::AllEnded,
        Self::Ended,
        Self::AllCancelled,
        Self::DataDeleted,
        Self::DataEdited,
        Self::DataUpdated,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::DuplicateRejected => "duplicate-rejected",
            Self::Edited => "edited",
            Self::Deleted => "deleted",
            Self::Cleared => "cleared",
            Self::Agreed => "agreed",
            Self::Rejected => "rejected",
            Self::AllEnded => "all-ended",
            Self::Ended => "ended",
            Self::AllCancelled => "all-cancelled",
            Self::DataDeleted => "data-deleted",
            Self::DataEdited => "data-edited",
            Self::DataUpdated => "data-updated",
        }
    }

    /// Human-readable text used in notifications and list views
    pub fn display_text(&self) -> &'static str {
        match self {
            Self::Created => "Order submitted",
            Self::DuplicateRejected => "Duplicate submission refused",
            Self::Edited => "Order edited",
            Self::Deleted => "Order deleted",
            Self::Cleared => "Order cleared",
            Self::Agreed => "Step approved",
            Self::Rejected => "Order rejected",
            Self::AllEnded => "All steps approved",
            Self::Ended => "Order finished",
            Self::AllCancelled => "Order cancelled",
            Self::DataDeleted => "Data deleted",
            Self::DataEdited => "Data edited",
            Self::DataUpdated => "Data updated",
        }
    }

    /// Label for a transition, given the verb and where it landed
    pub fn for_transition(action: AuditAction, to_status: OrderStatus) -> Self {
        match (action, to_status) {
            (AuditAction::Create, _) => Self::Created,
            (AuditAction::Edit, _) => Self::Edited,
            (AuditAction::Delete, _) => Self::Deleted,
            (AuditAction::Agree, OrderStatus::AllEnded) => Self::AllEnded,
            (AuditAction::Agree, _) => Self::Agreed,
            (AuditAction::Reject, _) => Self::Rejected,
            (AuditAction::Execute | AuditAction::Close, _) => Self::Ended,
            (AuditAction::Cancel, _) => Self::AllCancelled,
        }
    }
}

impl fmt::Display for StatusLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}
