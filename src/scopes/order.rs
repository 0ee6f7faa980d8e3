//! # Order Scopes
//!
//! [`OrderScope`] is a plain value describing which orders a worklist
//! request may see and which criteria narrow it. Each repository interprets
//! it once: the in-memory store through [`OrderScope::matches`], PostgreSQL
//! through [`OrderScopeQuery`].

use crate::models::{Account, ChangeType, Order, OrderKind, Role, Search};
use crate::state_machine::states::OrderStatus;
use chrono::{NaiveDate, NaiveTime};
use sqlx::{Postgres, QueryBuilder};

/// Row-level visibility derived from the requester's role
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Visibility {
    /// Only orders owned by this user
    Owner(String),
    /// Orders assigned to, acted on by, or owned by this user
    Auditor(String),
    All,
}

impl Visibility {
    pub fn for_account(account: &Account) -> Self {
        match account.role {
            Role::Guest => Self::Owner(account.username.clone()),
            Role::Dba => Self::Auditor(account.username.clone()),
            Role::Admin => Self::All,
        }
    }

    /// Username the audit lookup needs, if any
    pub fn auditor(&self) -> Option<&str> {
        match self {
            Self::Auditor(username) => Some(username),
            _ => None,
        }
    }
}

/// Visibility plus optional criteria for one worklist query
#[derive(Debug, Clone, PartialEq)]
pub struct OrderScope {
    pub visibility: Visibility,
    pub kind: Option<OrderKind>,
    pub work_id: Option<String>,
    pub status: Option<OrderStatus>,
    pub change_type: Option<ChangeType>,
    pub idc: Option<String>,
    pub source: Option<String>,
    pub owner: Option<String>,
    pub department: Option<String>,
    /// Substring of the statement text
    pub text: Option<String>,
    /// Inclusive creation date range, UTC
    pub created_between: Option<(NaiveDate, NaiveDate)>,
}

impl OrderScope {
    pub fn new(visibility: Visibility) -> Self {
        Self {
            visibility,
            kind: None,
            work_id: None,
            status: None,
            change_type: None,
            idc: None,
            source: None,
            owner: None,
            department: None,
            text: None,
            created_between: None,
        }
    }

    pub fn unrestricted() -> Self {
        Self::new(Visibility::All)
    }

    pub fn of_kind(mut self, kind: OrderKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn with_work_id(mut self, work_id: impl Into<String>) -> Self {
        self.work_id = Some(work_id.into());
        self
    }

    pub fn with_status(mut self, status: OrderStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_change_type(mut self, change_type: ChangeType) -> Self {
        self.change_type = Some(change_type);
        self
    }

    pub fn in_idc(mut self, idc: impl Into<String>) -> Self {
        self.idc = Some(idc.into());
        self
    }

    pub fn for_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn owned_by(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    pub fn in_department(mut self, department: impl Into<String>) -> Self {
        self.department = Some(department.into());
        self
    }

    pub fn containing_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn created_between(mut self, from: NaiveDate, to: NaiveDate) -> Self {
        self.created_between = Some((from.min(to), from.max(to)));
        self
    }

    /// Copy the criteria of a search form. Blank strings are ignored and
    /// nothing is applied while the valve is closed.
    pub fn with_search(mut self, find: &Search) -> Self {
        if !find.valve {
            return self;
        }

        self.work_id = non_blank(&find.work_id);
        self.status = find.status;
        self.change_type = find.change_type;
        self.idc = non_blank(&find.idc);
        self.source = non_blank(&find.source);
        self.owner = non_blank(&find.username);
        self.department = non_blank(&find.department);
        self.text = non_blank(&find.text);
        self.created_between = match (find.picker.first(), find.picker.last()) {
            (Some(from), Some(to)) => Some((*from.min(to), *from.max(to))),
            _ => None,
        };
        self
    }

    /// Whether an order passes this scope. `acted_on` reports whether the
    /// auditor has an entry in the order's audit trail.
    pub fn matches(&self, order: &Order, acted_on: bool) -> bool {
        let visible = match &self.visibility {
            Visibility::Owner(username) => order.is_owned_by(username),
            Visibility::Auditor(username) => {
                order.is_assigned_to(username) || order.is_owned_by(username) || acted_on
            }
            Visibility::All => true,
        };
        if !visible {
            return false;
        }

        if self.kind.is_some_and(|kind| order.kind != kind)
            || self.status.is_some_and(|status| order.status != status)
            || self.change_type.is_some_and(|ct| order.change_type != Some(ct))
        {
            return false;
        }

        let equals = |criterion: &Option<String>, value: &str| {
            criterion.as_deref().map_or(true, |wanted| wanted == value)
        };
        if !equals(&self.work_id, &order.work_id)
            || !equals(&self.idc, &order.idc)
            || !equals(&self.source, &order.source)
            || !equals(&self.owner, &order.owner)
            || !equals(&self.department, &order.department)
        {
            return false;
        }

        if let Some(text) = &self.text {
            if !order.text.contains(text.as_str()) {
                return false;
            }
        }

        if let Some((from, to)) = self.created_between {
            let created = order.created_at.date_naive();
            if created < from || created > to {
                return false;
            }
        }

        true
    }
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// SQL rendering of an [`OrderScope`] against the `orders` table
pub struct OrderScopeQuery {
    query: QueryBuilder<'static, Postgres>,
    has_conditions: bool,
}

impl OrderScopeQuery {
    /// `SELECT orders.* ...` for the scope, without ordering or paging
    pub fn select(scope: &OrderScope) -> Self {
        Self::build("SELECT orders.* FROM orders", scope)
    }

    /// `SELECT COUNT(*) ...` for the scope
    pub fn count(scope: &OrderScope) -> Self {
        Self::build("SELECT COUNT(*) FROM orders", scope)
    }

    fn build(prefix: &str, scope: &OrderScope) -> Self {
        let mut this = Self {
            query: QueryBuilder::new(prefix),
            has_conditions: false,
        };
        this.push_visibility(&scope.visibility);

        if let Some(kind) = scope.kind {
            this.add_condition("orders.kind = ");
            this.query.push_bind(kind.as_str());
        }
        if let Some(work_id) = &scope.work_id {
            this.add_condition("orders.work_id = ");
            this.query.push_bind(work_id.clone());
        }
        if let Some(status) = scope.status {
            this.add_condition("orders.status = ");
            this.query.push_bind(status.as_str());
        }
        if let Some(change_type) = scope.change_type {
            this.add_condition("orders.change_type = ");
            this.query.push_bind(change_type.as_str());
        }
        if let Some(idc) = &scope.idc {
            this.add_condition("orders.idc = ");
            this.query.push_bind(idc.clone());
        }
        if let Some(source) = &scope.source {
            this.add_condition("orders.source = ");
            this.query.push_bind(source.clone());
        }
        if let Some(owner) = &scope.owner {
            this.add_condition("orders.owner = ");
            this.query.push_bind(owner.clone());
        }
        if let Some(department) = &scope.department {
            this.add_condition("orders.department = ");
            this.query.push_bind(department.clone());
        }
        if let Some(text) = &scope.text {
            this.add_condition("strpos(orders.text, ");
            this.query.push_bind(text.clone());
            this.query.push(") > 0");
        }
        if let Some((from, to)) = scope.created_between {
            this.add_condition("orders.created_at >= ");
            this.query.push_bind(from.and_time(NaiveTime::MIN).and_utc());
            // Exclusive upper bound at the start of the following day
            if let Some(next_day) = to.succ_opt() {
                this.add_condition("orders.created_at < ");
                this.query.push_bind(next_day.and_time(NaiveTime::MIN).and_utc());
            }
        }

        this
    }

    fn add_condition(&mut self, condition: &str) {
        if self.has_conditions {
            self.query.push(" AND ");
        } else {
            self.query.push(" WHERE ");
            self.has_conditions = true;
        }
        self.query.push(condition);
    }

    fn push_visibility(&mut self, visibility: &Visibility) {
        match visibility {
            Visibility::Owner(username) => {
                self.add_condition("orders.owner = ");
                self.query.push_bind(username.clone());
            }
            Visibility::Auditor(username) => {
                self.add_condition("(");
                self.query.push_bind(username.clone());
                self.query.push(" = ANY(orders.assigned) OR orders.owner = ");
                self.query.push_bind(username.clone());
                self.query.push(
                    " OR EXISTS (SELECT 1 FROM order_audit_entries a \
                     WHERE a.order_id = orders.id AND a.actor = ",
                );
                self.query.push_bind(username.clone());
                self.query.push("))");
            }
            Visibility::All => {}
        }
    }

    /// Append newest-first ordering and paging
    pub fn page(mut self, offset: u64, limit: u64) -> Self {
        self.query.push(" ORDER BY orders.id DESC");
        self.query.push(" LIMIT ");
        self.query.push_bind(i64::try_from(limit).unwrap_or(i64::MAX));
        self.query.push(" OFFSET ");
        self.query.push_bind(i64::try_from(offset).unwrap_or(i64::MAX));
        self
    }

    pub fn sql(&self) -> &str {
        self.query.sql()
    }

    pub fn into_builder(self) -> QueryBuilder<'static, Postgres> {
        self.query
    }
}
