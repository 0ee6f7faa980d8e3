//! # Order Workflow Bootstrap
//!
//! Wires configuration, the order store, the identity provider, the event
//! publisher and (optionally) the notification bridge into one handle, for
//! either an in-memory or a PostgreSQL deployment.

use crate::audit::AuditTrail;
use crate::config::{AppConfig, ConfigManager};
use crate::database::{DatabaseConnection, DatabaseMigrations};
use crate::error::Result;
use crate::events::EventPublisher;
use crate::identity::IdentityProvider;
use crate::notification::{MessageChannel, NotificationBridge};
use crate::repository::{InMemoryOrderRepository, OrderRepository, PgOrderRepository};
use crate::services::ScopedSearch;
use crate::state_machine::WorkflowEngine;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;

/// Running order workflow with its collaborators
pub struct OrderWorkflowSystem {
    pub engine: WorkflowEngine,
    pub search: ScopedSearch,
    pub audit: AuditTrail,
    pub config_manager: Arc<ConfigManager>,
    repository: Arc<dyn OrderRepository>,
    notification_handle: Option<JoinHandle<()>>,
}

impl OrderWorkflowSystem {
    /// Build against any repository. The notification bridge is spawned when
    /// a channel is given and notifications are enabled, which needs a Tokio
    /// runtime.
    pub fn build(
        config_manager: Arc<ConfigManager>,
        repository: Arc<dyn OrderRepository>,
        identity: Arc<dyn IdentityProvider>,
        channel: Option<Arc<dyn MessageChannel>>,
    ) -> Self {
        let config: &AppConfig = config_manager.config();
        let workflow = Arc::new(config.workflow.clone());
        let publisher = EventPublisher::new(config.notification.channel_capacity);

        let notification_handle = match channel {
            Some(channel) if config.notification.enabled => {
                Some(NotificationBridge::new(channel, &config.notification).spawn(&publisher))
            }
            _ => None,
        };

        let engine = WorkflowEngine::new(
            workflow.clone(),
            repository.clone(),
            identity.clone(),
            publisher,
        );
        let search = ScopedSearch::new(repository.clone(), identity, &config.search, &workflow);
        let audit = AuditTrail::new(repository.clone());

        info!(
            environment = %config_manager.environment(),
            chain_len = workflow.chain_len(),
            notifications = notification_handle.is_some(),
            "Order workflow system ready"
        );

        Self {
            engine,
            search,
            audit,
            config_manager,
            repository,
            notification_handle,
        }
    }

    /// In-process store; nothing survives a restart
    pub fn in_memory(
        config_manager: Arc<ConfigManager>,
        identity: Arc<dyn IdentityProvider>,
        channel: Option<Arc<dyn MessageChannel>>,
    ) -> Self {
        Self::build(
            config_manager,
            Arc::new(InMemoryOrderRepository::new()),
            identity,
            channel,
        )
    }

    /// Connect to PostgreSQL, applying migrations when configured to
    pub async fn postgres(
        config_manager: Arc<ConfigManager>,
        identity: Arc<dyn IdentityProvider>,
        channel: Option<Arc<dyn MessageChannel>>,
    ) -> Result<Self> {
        let database = &config_manager.config().database;
        let connection = DatabaseConnection::new(database).await?;
        if database.run_migrations {
            DatabaseMigrations::run_all(connection.pool()).await?;
        }

        let repository = Arc::new(PgOrderRepository::new(connection.pool().clone()));
        Ok(Self::build(config_manager, repository, identity, channel))
    }

    pub fn repository(&self) -> &Arc<dyn OrderRepository> {
        &self.repository
    }

    pub fn notifications_running(&self) -> bool {
        self.notification_handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Stop the notification bridge
    pub fn shutdown(mut self) {
        if let Some(handle) = self.notification_handle.take() {
            handle.abort();
            info!("Notification bridge stopped");
        }
    }
}
