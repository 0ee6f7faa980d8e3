use async_trait::async_trait;
use order_workflow::config::{ChainStep, NotificationConfig, SearchConfig, WorkflowConfig};
use order_workflow::models::{
    Account, AuditEntry, NewAuditEntry, NewOrder, Order, OrderSubmission, OrderUpdate, Role,
    TransitionKey,
};
use order_workflow::notification::{MessageChannel, NotifyError};
use order_workflow::repository::{InsertOutcome, QueryPage, TransitionCommit};
use order_workflow::scopes::OrderScope;
use order_workflow::state_machine::WorkIdSource;
use order_workflow::{
    EventPublisher, InMemoryDirectory, InMemoryOrderRepository, OrderRepository, Result,
    ScopedSearch, WorkflowEngine,
};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Barrier;

/// Directory used across the suite
///
/// - alice, carol: guests in `ops`
/// - bob, erin: DBAs for `dc1`
/// - dan: lead for source `s1`
/// - root: admin
pub fn directory() -> InMemoryDirectory {
    InMemoryDirectory::new()
        .with_account(Account::new("alice", Role::Guest).in_department("ops"), &[])
        .with_account(Account::new("carol", Role::Guest).in_department("ops"), &[])
        .with_account(Account::new("bob", Role::Dba), &["dba:dc1"])
        .with_account(Account::new("erin", Role::Dba), &["dba:dc1"])
        .with_account(Account::new("dan", Role::Dba), &["lead:s1"])
        .with_account(Account::new("root", Role::Admin), &[])
}

/// One review step: a DBA of the target IDC
pub fn single_step() -> WorkflowConfig {
    WorkflowConfig::with_chain(false, vec![ChainStep::new("dba", "dba:{idc}")])
}

/// DBA of the target IDC, then the lead of the source
pub fn two_step() -> WorkflowConfig {
    WorkflowConfig::with_chain(
        true,
        vec![
            ChainStep::new("dba", "dba:{idc}"),
            ChainStep::new("lead", "lead:{source}"),
        ],
    )
}

pub fn submission(text: &str) -> OrderSubmission {
    OrderSubmission::execution("s1", "d1", text).in_idc("dc1")
}

pub fn query_submission(text: &str) -> OrderSubmission {
    OrderSubmission::query("s1", "d1", text).in_idc("dc1")
}

pub struct Harness {
    pub engine: WorkflowEngine,
    pub search: ScopedSearch,
    pub repository: Arc<dyn OrderRepository>,
    pub directory: Arc<InMemoryDirectory>,
    pub publisher: EventPublisher,
}

impl Harness {
    pub fn new(config: WorkflowConfig) -> Self {
        Self::with_repository(config, Arc::new(InMemoryOrderRepository::new()))
    }

    pub fn with_repository(config: WorkflowConfig, repository: Arc<dyn OrderRepository>) -> Self {
        let config = Arc::new(config);
        let directory = Arc::new(directory());
        let publisher = EventPublisher::default();
        let engine = WorkflowEngine::new(
            config.clone(),
            repository.clone(),
            directory.clone(),
            publisher.clone(),
        );
        let search_config = SearchConfig {
            idc: vec!["dc1".to_string(), "dc2".to_string()],
        };
        let search = ScopedSearch::new(
            repository.clone(),
            directory.clone(),
            &search_config,
            &config,
        );

        Self {
            engine,
            search,
            repository,
            directory,
            publisher,
        }
    }

    pub async fn history(&self, order_id: i64) -> Vec<AuditEntry> {
        self.repository.history(order_id).await.unwrap()
    }

    pub async fn stored(&self, order_id: i64) -> Order {
        self.repository.load(order_id).await.unwrap().unwrap()
    }
}

/// Hands out a fixed sequence of work ids, then repeats the last one
pub struct FixedWorkIds {
    ids: Mutex<VecDeque<String>>,
    last: Mutex<String>,
}

impl FixedWorkIds {
    pub fn new(ids: &[&str]) -> Self {
        Self {
            ids: Mutex::new(ids.iter().map(|id| id.to_string()).collect()),
            last: Mutex::new(ids.last().map(|id| id.to_string()).unwrap_or_default()),
        }
    }
}

impl WorkIdSource for FixedWorkIds {
    fn next_work_id(&self) -> String {
        match self.ids.lock().pop_front() {
            Some(id) => id,
            None => self.last.lock().clone(),
        }
    }
}

/// In-memory store whose first `parties` loads or inserts after
/// [`BarrierRepository::arm`] meet at a barrier, so concurrent calls plan
/// against the same snapshot
pub struct BarrierRepository {
    inner: InMemoryOrderRepository,
    barrier: Barrier,
    parties: usize,
    arrivals: AtomicUsize,
}

impl BarrierRepository {
    pub fn new(parties: usize) -> Self {
        Self {
            inner: InMemoryOrderRepository::new(),
            barrier: Barrier::new(parties),
            parties,
            arrivals: AtomicUsize::new(parties),
        }
    }

    pub fn arm(&self) {
        self.arrivals.store(0, Ordering::SeqCst);
    }

    async fn meet(&self) {
        if self.arrivals.fetch_add(1, Ordering::SeqCst) < self.parties {
            self.barrier.wait().await;
        }
    }
}

#[async_trait]
impl OrderRepository for BarrierRepository {
    async fn insert_order(
        &self,
        order: &NewOrder,
        reject_duplicates: bool,
    ) -> Result<InsertOutcome> {
        self.meet().await;
        self.inner.insert_order(order, reject_duplicates).await
    }

    async fn load(&self, order_id: i64) -> Result<Option<Order>> {
        let order = self.inner.load(order_id).await?;
        self.meet().await;
        Ok(order)
    }

    async fn load_by_work_id(&self, work_id: &str) -> Result<Option<Order>> {
        self.inner.load_by_work_id(work_id).await
    }

    async fn compare_and_swap(
        &self,
        order_id: i64,
        expected: TransitionKey,
        update: &OrderUpdate,
    ) -> Result<bool> {
        self.inner.compare_and_swap(order_id, expected, update).await
    }

    async fn append_audit(&self, entry: &NewAuditEntry) -> Result<bool> {
        self.inner.append_audit(entry).await
    }

    async fn commit_transition(&self, commit: &TransitionCommit) -> Result<bool> {
        self.inner.commit_transition(commit).await
    }

    async fn history(&self, order_id: i64) -> Result<Vec<AuditEntry>> {
        self.inner.history(order_id).await
    }

    async fn query(&self, scope: &OrderScope, offset: u64, limit: u64) -> Result<QueryPage> {
        self.inner.query(scope, offset, limit).await
    }
}

/// Message channel that keeps everything it is asked to send
#[derive(Default)]
pub struct RecordingChannel {
    pub sent: Mutex<Vec<SentMessage>>,
}

#[derive(Debug, Clone)]
pub struct SentMessage {
    pub recipients: Vec<String>,
    pub title: String,
    pub body: String,
}

impl RecordingChannel {
    pub fn messages(&self) -> Vec<SentMessage> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl MessageChannel for RecordingChannel {
    async fn send_markdown(
        &self,
        recipients: &[String],
        title: &str,
        body: &str,
    ) -> std::result::Result<(), NotifyError> {
        self.sent.lock().push(SentMessage {
            recipients: recipients.to_vec(),
            title: title.to_string(),
            body: body.to_string(),
        });
        Ok(())
    }
}

/// Message channel that is always down
pub struct UnavailableChannel;

#[async_trait]
impl MessageChannel for UnavailableChannel {
    async fn send_markdown(
        &self,
        _recipients: &[String],
        _title: &str,
        _body: &str,
    ) -> std::result::Result<(), NotifyError> {
        Err(NotifyError::Unavailable("webhook down".to_string()))
    }
}

pub fn notification_config(recipients: &[(&str, &str)]) -> NotificationConfig {
    NotificationConfig {
        enabled: true,
        recipients: recipients
            .iter()
            .map(|(user, id)| (user.to_string(), id.to_string()))
            .collect(),
        ..Default::default()
    }
}
