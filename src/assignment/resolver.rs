use crate::config::{ChainStep, WorkflowConfig};
use crate::error::{Result, WorkflowError};
use crate::identity::IdentityProvider;
use crate::models::{Order, OrderSubmission};
use std::sync::Arc;
use tracing::debug;

/// Order coordinates a scope template can reference
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScopeTarget<'a> {
    pub source: &'a str,
    pub idc: &'a str,
    pub database: &'a str,
}

impl<'a> From<&'a Order> for ScopeTarget<'a> {
    fn from(order: &'a Order) -> Self {
        Self {
            source: &order.source,
            idc: &order.idc,
            database: &order.database,
        }
    }
}

impl<'a> From<&'a OrderSubmission> for ScopeTarget<'a> {
    fn from(submission: &'a OrderSubmission) -> Self {
        Self {
            source: submission.source.trim(),
            idc: submission.idc.trim(),
            database: submission.database.trim(),
        }
    }
}

/// Computes who may act at a given approval step. Read-only.
#[derive(Clone)]
pub struct AssignmentResolver {
    config: Arc<WorkflowConfig>,
    identity: Arc<dyn IdentityProvider>,
}

impl std::fmt::Debug for AssignmentResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssignmentResolver")
            .field("config", &self.config)
            .field("identity", &"IdentityProvider")
            .finish()
    }
}

impl AssignmentResolver {
    pub fn new(config: Arc<WorkflowConfig>, identity: Arc<dyn IdentityProvider>) -> Self {
        Self { config, identity }
    }

    /// Number of steps in the enforced chain
    pub fn chain_len(&self) -> u32 {
        self.config.chain_len()
    }

    /// Fill the placeholders of a step's scope template
    pub fn render_scope(step: &ChainStep, target: ScopeTarget<'_>) -> String {
        step.scope
            .replace("{source}", target.source)
            .replace("{idc}", target.idc)
            .replace("{database}", target.database)
    }

    /// Eligible actors for `step`, sorted and deduplicated. An empty set is
    /// `NoReviewerAvailable`.
    pub async fn eligible_for(&self, step: u32, target: ScopeTarget<'_>) -> Result<Vec<String>> {
        let chain_step = self.config.step(step).ok_or_else(|| {
            WorkflowError::validation(format!(
                "approval step {step} is outside a chain of {}",
                self.chain_len()
            ))
        })?;

        let label = Self::render_scope(chain_step, target);
        let mut holders = self.identity.holders_of(&label).await?;
        holders.sort();
        holders.dedup();

        debug!(
            step = step,
            step_name = %chain_step.name,
            scope = %label,
            eligible = holders.len(),
            "Resolved eligible reviewers"
        );

        if holders.is_empty() {
            return Err(WorkflowError::NoReviewerAvailable { step, scope: label });
        }
        Ok(holders)
    }

    /// Whether `username` is eligible at `step`, without failing on an empty set
    pub async fn is_eligible(
        &self,
        username: &str,
        step: u32,
        target: ScopeTarget<'_>,
    ) -> Result<bool> {
        match self.eligible_for(step, target).await {
            Ok(holders) => Ok(holders.iter().any(|holder| holder == username)),
            Err(WorkflowError::NoReviewerAvailable { .. }) => Ok(false),
            Err(err) => Err(err),
        }
    }
}
