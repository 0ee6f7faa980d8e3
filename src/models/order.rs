use crate::state_machine::states::OrderStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which flavour of order this is. Both share the approval state machine;
/// only execution orders can reach `Execute`, only query orders can `Close`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderKind {
    Execution,
    Query,
}

impl OrderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Execution => "execution",
            Self::Query => "query",
        }
    }
}

impl fmt::Display for OrderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "execution" => Ok(Self::Execution),
            "query" => Ok(Self::Query),
            _ => Err(format!("Invalid order kind: {s}")),
        }
    }
}

/// Statement class declared by the submitter of an execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    Ddl,
    Dml,
}

impl ChangeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ddl => "ddl",
            Self::Dml => "dml",
        }
    }
}

impl std::str::FromStr for ChangeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ddl" => Ok(Self::Ddl),
            "dml" => Ok(Self::Dml),
            _ => Err(format!("Invalid change type: {s}")),
        }
    }
}

/// A submitted SQL execution or query request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub work_id: String,
    pub kind: OrderKind,
    pub owner: String,
    pub real_name: String,
    pub department: String,
    pub text: String,
    pub source: String,
    pub idc: String,
    pub database: String,
    pub table: Option<String>,
    pub change_type: Option<ChangeType>,
    pub backup: bool,
    pub status: OrderStatus,
    pub current_step: u32,
    pub revision: u32,
    /// Eligible actors for `current_step`, sorted
    pub assigned: Vec<String>,
    pub executor: Option<String>,
    pub delay_until: Option<DateTime<Utc>>,
    pub execute_time: Option<DateTime<Utc>>,
    pub relevant: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Optimistic-lock key checked by every compare-and-swap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransitionKey {
    pub status: OrderStatus,
    pub step: u32,
    pub revision: u32,
}

impl Order {
    pub fn transition_key(&self) -> TransitionKey {
        TransitionKey {
            status: self.status,
            step: self.current_step,
            revision: self.revision,
        }
    }

    pub fn is_owned_by(&self, username: &str) -> bool {
        self.owner == username
    }

    pub fn is_assigned_to(&self, username: &str) -> bool {
        self.assigned.iter().any(|assignee| assignee == username)
    }

    /// Apply the field changes of a committed transition
    pub fn apply(&mut self, update: &OrderUpdate) {
        self.status = update.status;
        self.current_step = update.current_step;
        self.revision = update.revision;
        self.assigned = update.assigned.clone();
        if let Some(text) = &update.text {
            self.text = text.clone();
        }
        if let Some(executor) = &update.executor {
            self.executor = Some(executor.clone());
        }
        if let Some(execute_time) = update.execute_time {
            self.execute_time = Some(execute_time);
        }
        self.updated_at = update.updated_at;
    }
}

/// Fields for a new order; ids and workflow fields are filled by the engine/store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewOrder {
    pub work_id: String,
    pub kind: OrderKind,
    pub owner: String,
    pub real_name: String,
    pub department: String,
    pub text: String,
    pub source: String,
    pub idc: String,
    pub database: String,
    pub table: Option<String>,
    pub change_type: Option<ChangeType>,
    pub backup: bool,
    pub assigned: Vec<String>,
    pub delay_until: Option<DateTime<Utc>>,
    pub relevant: Option<String>,
}

impl NewOrder {
    /// Materialize the stored record once the store has assigned an id
    pub fn into_order(self, id: i64, now: DateTime<Utc>) -> Order {
        Order {
            id,
            work_id: self.work_id,
            kind: self.kind,
            owner: self.owner,
            real_name: self.real_name,
            department: self.department,
            text: self.text,
            source: self.source,
            idc: self.idc,
            database: self.database,
            table: self.table,
            change_type: self.change_type,
            backup: self.backup,
            status: OrderStatus::Created,
            current_step: 0,
            revision: 0,
            assigned: self.assigned,
            executor: None,
            delay_until: self.delay_until,
            execute_time: None,
            relevant: self.relevant,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Caller-supplied submission for `Create`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderSubmission {
    #[serde(default)]
    pub kind: OrderKind,
    pub text: String,
    pub source: String,
    #[serde(default)]
    pub idc: String,
    pub database: String,
    #[serde(default)]
    pub table: Option<String>,
    #[serde(default)]
    pub change_type: Option<ChangeType>,
    #[serde(default)]
    pub backup: bool,
    /// Reviewer the submitter wants for step 0; must be eligible
    #[serde(default)]
    pub preferred_assignee: Option<String>,
    #[serde(default)]
    pub delay_until: Option<DateTime<Utc>>,
    #[serde(default)]
    pub relevant: Option<String>,
}

impl Default for OrderKind {
    fn default() -> Self {
        Self::Execution
    }
}

impl OrderSubmission {
    pub fn execution(
        source: impl Into<String>,
        database: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            kind: OrderKind::Execution,
            text: text.into(),
            source: source.into(),
            database: database.into(),
            ..Default::default()
        }
    }

    pub fn query(
        source: impl Into<String>,
        database: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            kind: OrderKind::Query,
            ..Self::execution(source, database, text)
        }
    }

    pub fn in_idc(mut self, idc: impl Into<String>) -> Self {
        self.idc = idc.into();
        self
    }

    pub fn assigned_to(mut self, reviewer: impl Into<String>) -> Self {
        self.preferred_assignee = Some(reviewer.into());
        self
    }

    pub fn delayed_until(mut self, at: DateTime<Utc>) -> Self {
        self.delay_until = Some(at);
        self
    }

    /// Required coordinates and text must be present
    pub fn validate(&self) -> Result<(), String> {
        let missing: Vec<&str> = [
            ("source", self.source.trim()),
            ("database", self.database.trim()),
            ("text", self.text.trim()),
        ]
        .iter()
        .filter(|(_, value)| value.is_empty())
        .map(|(field, _)| *field)
        .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(format!("missing required fields: {}", missing.join(", ")))
        }
    }
}

/// Field changes written by a compare-and-swap
#[derive(Debug, Clone, PartialEq)]
pub struct OrderUpdate {
    pub status: OrderStatus,
    pub current_step: u32,
    pub revision: u32,
    pub assigned: Vec<String>,
    pub text: Option<String>,
    pub executor: Option<String>,
    pub execute_time: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl OrderUpdate {
    /// Start from the order's current values
    pub fn from_order(order: &Order, now: DateTime<Utc>) -> Self {
        Self {
            status: order.status,
            current_step: order.current_step,
            revision: order.revision,
            assigned: order.assigned.clone(),
            text: None,
            executor: None,
            execute_time: None,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_submission_validation_lists_missing_fields() {
        let submission = OrderSubmission::execution("", " ", "select 1");
        let err = submission.validate().unwrap_err();
        assert_eq!(err, "missing required fields: source, database");

        assert!(OrderSubmission::execution("s1", "d1", "select 1")
            .validate()
            .is_ok());
    }

    #[test]
    fn test_apply_update_keeps_immutable_fields() {
        let now = Utc::now();
        let new_order = NewOrder {
            work_id: "W1".into(),
            kind: OrderKind::Execution,
            owner: "alice".into(),
            real_name: "Alice".into(),
            department: "ops".into(),
            text: "update t set a = 1".into(),
            source: "s1".into(),
            idc: "dc1".into(),
            database: "d1".into(),
            table: None,
            change_type: Some(ChangeType::Dml),
            backup: true,
            assigned: vec!["bob".into()],
            delay_until: None,
            relevant: None,
        };
        let mut order = new_order.into_order(1, now);

        let mut update = OrderUpdate::from_order(&order, now);
        update.status = OrderStatus::AllEnded;
        update.current_step = 1;
        order.apply(&update);

        assert_eq!(order.status, OrderStatus::AllEnded);
        assert_eq!(order.current_step, 1);
        assert_eq!(order.work_id, "W1");
        assert_eq!(order.owner, "alice");
        assert_eq!(order.text, "update t set a = 1");
    }

    #[test]
    fn test_kind_parsing() {
        assert_eq!("query".parse::<OrderKind>().unwrap(), OrderKind::Query);
        assert!("report".parse::<OrderKind>().is_err());
        assert_eq!("ddl".parse::<ChangeType>().unwrap(), ChangeType::Ddl);
    }
}
