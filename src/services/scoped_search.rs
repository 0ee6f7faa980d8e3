use crate::config::{SearchConfig, WorkflowConfig};
use crate::error::{Result, WorkflowError};
use crate::identity::IdentityProvider;
use crate::models::{AuditEntry, Order, OrderList, Pagination, SearchPage, SearchRequest};
use crate::repository::OrderRepository;
use crate::scopes::{OrderScope, Visibility};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// One order with its full history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderDetail {
    pub order: Order,
    pub history: Vec<AuditEntry>,
}

/// Role-scoped worklist queries
///
/// Visibility always follows the requester's role; search criteria only
/// narrow it further.
#[derive(Clone)]
pub struct ScopedSearch {
    repository: Arc<dyn OrderRepository>,
    identity: Arc<dyn IdentityProvider>,
    idc: Vec<String>,
    multi_approver: bool,
}

impl std::fmt::Debug for ScopedSearch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopedSearch")
            .field("idc", &self.idc)
            .field("multi_approver", &self.multi_approver)
            .finish_non_exhaustive()
    }
}

impl ScopedSearch {
    pub fn new(
        repository: Arc<dyn OrderRepository>,
        identity: Arc<dyn IdentityProvider>,
        search: &SearchConfig,
        workflow: &WorkflowConfig,
    ) -> Self {
        Self {
            repository,
            identity,
            idc: search.idc.clone(),
            multi_approver: workflow.multi_approver,
        }
    }

    /// Scope a request resolves to for `requester`
    pub async fn scope_for(&self, requester: &str, request: &SearchRequest) -> Result<OrderScope> {
        let account = self.identity.resolve(requester).await?;
        Ok(OrderScope::new(Visibility::for_account(&account))
            .of_kind(request.kind)
            .with_search(&request.find))
    }

    /// One page of matching orders, newest first
    pub async fn search(&self, requester: &str, request: &SearchRequest) -> Result<SearchPage> {
        let scope = self.scope_for(requester, request).await?;
        let pagination = Pagination::new(request.page);

        let page = self
            .repository
            .query(&scope, pagination.offset(), pagination.limit())
            .await?;

        debug!(
            requester = %requester,
            kind = %request.kind,
            page = pagination.page,
            rows = page.rows.len(),
            total = page.total_count,
            "Worklist query"
        );

        Ok(SearchPage {
            page: pagination.page,
            page_size: pagination.page_size,
            total_count: page.total_count,
            rows: page.rows,
        })
    }

    /// Worklist response as the UI consumes it
    pub async fn worklist(&self, requester: &str, request: &SearchRequest) -> Result<OrderList> {
        let page = self.search(requester, request).await?;
        Ok(page.into_list(self.idc.clone(), self.multi_approver))
    }

    /// An order plus its history. Orders the requester cannot see are `NotFound`.
    pub async fn detail(&self, requester: &str, work_id: &str) -> Result<OrderDetail> {
        let account = self.identity.resolve(requester).await?;
        let order = self
            .repository
            .load_by_work_id(work_id)
            .await?
            .ok_or_else(|| WorkflowError::order_not_found(work_id))?;
        let history = self.repository.history(order.id).await?;

        let acted_on = history.iter().any(|entry| entry.actor == account.username);
        if !OrderScope::new(Visibility::for_account(&account)).matches(&order, acted_on) {
            return Err(WorkflowError::order_not_found(work_id));
        }

        Ok(OrderDetail { order, history })
    }
}
