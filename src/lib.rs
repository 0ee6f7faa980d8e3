#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, SQLx in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Order Workflow
//!
//! Approval workflow engine for database change management. Users submit SQL
//! execution or query orders; each order walks a configured chain of reviewer
//! steps before it can be executed (or, for query orders, closed).
//!
//! ## Module Organization
//!
//! - [`state_machine`] - Order states, guards and the [`WorkflowEngine`]
//! - [`assignment`] - Eligible reviewers per approval step
//! - [`audit`] - Append-only transition history
//! - [`services`] - Role-scoped worklist search
//! - [`notification`] - Markdown notifications for workflow events
//! - [`repository`] - In-memory and PostgreSQL order stores
//! - [`config`] - Layered YAML/environment configuration
//! - [`logging`] - Structured logging setup
//!
//! ## Quick Start
//!
//! ```rust
//! use order_workflow::config::{AppConfig, ChainStep, ConfigManager, WorkflowConfig};
//! use order_workflow::identity::InMemoryDirectory;
//! use order_workflow::models::{Account, OrderSubmission, Role};
//! use order_workflow::{OrderStatus, OrderWorkflowSystem};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AppConfig {
//!     workflow: WorkflowConfig::with_chain(false, vec![ChainStep::new("dba", "dba:{idc}")]),
//!     ..AppConfig::default()
//! };
//! let directory = InMemoryDirectory::new()
//!     .with_account(Account::new("alice", Role::Guest), &[])
//!     .with_account(Account::new("bob", Role::Dba), &["dba:dc1"]);
//!
//! let system = OrderWorkflowSystem::in_memory(
//!     ConfigManager::from_config(config, "development")?,
//!     Arc::new(directory),
//!     None,
//! );
//!
//! let order = system
//!     .engine
//!     .create("alice", OrderSubmission::execution("s1", "d1", "select 1").in_idc("dc1"))
//!     .await?;
//! let order = system.engine.approve(order.id, "bob", None).await?;
//! assert_eq!(order.status, OrderStatus::AllEnded);
//! # Ok(())
//! # }
//! ```

#[macro_use]
mod macros;

pub mod assignment;
pub mod audit;
pub mod bootstrap;
pub mod config;
pub mod constants;
pub mod database;
pub mod error;
pub mod events;
pub mod identity;
pub mod logging;
pub mod models;
pub mod notification;
pub mod repository;
pub mod scopes;
pub mod services;
pub mod state_machine;

pub use assignment::AssignmentResolver;
pub use audit::AuditTrail;
pub use bootstrap::OrderWorkflowSystem;
pub use config::{AppConfig, ConfigManager, WorkflowConfig};
pub use error::{ErrorKind, Result, WorkflowError};
pub use events::{EventPublisher, WorkflowEvent, WorkflowEventKind};
pub use identity::{IdentityProvider, InMemoryDirectory};
pub use logging::init_structured_logging;
pub use models::{Order, OrderKind, OrderSubmission};
pub use repository::{InMemoryOrderRepository, OrderRepository, PgOrderRepository};
pub use services::ScopedSearch;
pub use state_machine::{AuditAction, OrderStatus, StatusLabel, WorkflowEngine};
