//! In-process order store.
//!
//! Orders and audit entries live under one `RwLock` so a transition and its
//! audit entry are committed in the same critical section. The work id and
//! actor indexes are concurrent maps that readers consult without the lock.

use super::{InsertOutcome, OrderRepository, QueryPage, TransitionCommit};
use crate::error::Result;
use crate::models::{
    AuditEntry, AuditKey, NewAuditEntry, NewOrder, Order, OrderUpdate, TransitionKey,
};
use crate::scopes::OrderScope;
use async_trait::async_trait;
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::{DashMap, DashSet};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicI64, Ordering};

#[derive(Debug, Default)]
struct MemoryState {
    orders: BTreeMap<i64, Order>,
    audit: HashMap<i64, Vec<AuditEntry>>,
    audit_keys: HashSet<AuditKey>,
}

#[derive(Debug)]
pub struct InMemoryOrderRepository {
    state: RwLock<MemoryState>,
    work_ids: DashMap<String, i64>,
    /// Orders each user has an audit entry on
    acted_on: DashMap<String, DashSet<i64>>,
    next_order_id: AtomicI64,
    next_audit_id: AtomicI64,
}

impl Default for InMemoryOrderRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryOrderRepository {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(MemoryState::default()),
            work_ids: DashMap::new(),
            acted_on: DashMap::new(),
            next_order_id: AtomicI64::new(1),
            next_audit_id: AtomicI64::new(1),
        }
    }

    pub fn order_count(&self) -> usize {
        self.state.read().orders.len()
    }

    fn has_acted_on(&self, username: &str, order_id: i64) -> bool {
        self.acted_on
            .get(username)
            .is_some_and(|orders| orders.contains(&order_id))
    }

    /// Caller holds the write lock
    fn push_audit(&self, state: &mut MemoryState, entry: &NewAuditEntry) -> bool {
        if !state.audit_keys.insert(entry.key()) {
            return false;
        }
        let id = self.next_audit_id.fetch_add(1, Ordering::SeqCst);
        self.acted_on
            .entry(entry.actor.clone())
            .or_default()
            .insert(entry.order_id);
        state
            .audit
            .entry(entry.order_id)
            .or_default()
            .push(entry.clone().into_entry(id));
        true
    }

    /// An open order from the same owner with the same target and text
    fn has_open_duplicate(state: &MemoryState, candidate: &NewOrder) -> bool {
        state.orders.values().any(|order| {
            order.status.is_open()
                && order.owner == candidate.owner
                && order.source == candidate.source
                && order.database == candidate.database
                && order.text == candidate.text
        })
    }
}

#[async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn insert_order(
        &self,
        order: &NewOrder,
        reject_duplicates: bool,
    ) -> Result<InsertOutcome> {
        // Duplicate check and insert share the write lock
        let mut state = self.state.write();
        if reject_duplicates && Self::has_open_duplicate(&state, order) {
            return Ok(InsertOutcome::DuplicateOpen);
        }

        let id = match self.work_ids.entry(order.work_id.clone()) {
            Entry::Occupied(_) => return Ok(InsertOutcome::WorkIdTaken),
            Entry::Vacant(slot) => {
                let id = self.next_order_id.fetch_add(1, Ordering::SeqCst);
                slot.insert(id);
                id
            }
        };

        let stored = order.clone().into_order(id, Utc::now());
        self.push_audit(
            &mut state,
            &NewAuditEntry::creation(id, &stored.owner, stored.created_at),
        );
        state.orders.insert(id, stored.clone());
        Ok(InsertOutcome::Inserted(stored))
    }

    async fn load(&self, order_id: i64) -> Result<Option<Order>> {
        Ok(self.state.read().orders.get(&order_id).cloned())
    }

    async fn load_by_work_id(&self, work_id: &str) -> Result<Option<Order>> {
        let Some(id) = self.work_ids.get(work_id).map(|id| *id) else {
            return Ok(None);
        };
        self.load(id).await
    }

    async fn compare_and_swap(
        &self,
        order_id: i64,
        expected: TransitionKey,
        update: &OrderUpdate,
    ) -> Result<bool> {
        let mut state = self.state.write();
        match state.orders.get_mut(&order_id) {
            Some(order) if order.transition_key() == expected => {
                order.apply(update);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn append_audit(&self, entry: &NewAuditEntry) -> Result<bool> {
        let mut state = self.state.write();
        Ok(self.push_audit(&mut state, entry))
    }

    async fn commit_transition(&self, commit: &TransitionCommit) -> Result<bool> {
        let mut state = self.state.write();

        let key_matches = state
            .orders
            .get(&commit.order_id)
            .is_some_and(|order| order.transition_key() == commit.expected);
        if !key_matches || state.audit_keys.contains(&commit.audit.key()) {
            return Ok(false);
        }

        if let Some(order) = state.orders.get_mut(&commit.order_id) {
            order.apply(&commit.update);
        }
        Ok(self.push_audit(&mut state, &commit.audit))
    }

    async fn history(&self, order_id: i64) -> Result<Vec<AuditEntry>> {
        Ok(self
            .state
            .read()
            .audit
            .get(&order_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn query(&self, scope: &OrderScope, offset: u64, limit: u64) -> Result<QueryPage> {
        let state = self.state.read();
        let auditor = scope.visibility.auditor();

        let rows: Vec<&Order> = state
            .orders
            .values()
            .rev()
            .filter(|order| {
                let acted_on =
                    auditor.is_some_and(|username| self.has_acted_on(username, order.id));
                scope.matches(order, acted_on)
            })
            .collect();

        let total_count = rows.len() as u64;
        let offset = usize::try_from(offset).unwrap_or(usize::MAX);
        let limit = usize::try_from(limit).unwrap_or(usize::MAX);
        let page = rows
            .into_iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect();

        Ok(QueryPage {
            rows: page,
            total_count,
        })
    }
}
