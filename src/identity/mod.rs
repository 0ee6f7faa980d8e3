//! # Identity
//!
//! Accounts and scope-label grants come from an external identity
//! subsystem. The engine only reads them through [`IdentityProvider`].

use crate::error::{Result, WorkflowError};
use crate::models::{Account, GroupGrant};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap};

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Look up an account; unknown usernames are `NotFound`
    async fn resolve(&self, username: &str) -> Result<Account>;

    /// Scope labels granted to an account
    async fn grants_for(&self, username: &str) -> Result<BTreeSet<String>>;

    /// Accounts holding a label, sorted
    async fn holders_of(&self, label: &str) -> Result<Vec<String>>;
}

/// Directory kept in memory, for embedding and tests
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    accounts: RwLock<HashMap<String, Account>>,
    grants: RwLock<HashMap<String, GroupGrant>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_account(&self, account: Account) {
        self.accounts
            .write()
            .insert(account.username.clone(), account);
    }

    /// Grant a scope label, e.g. `dba:dc-east`
    pub fn grant(&self, username: &str, label: impl Into<String>) {
        self.grants
            .write()
            .entry(username.to_string())
            .or_insert_with(|| GroupGrant::new(username))
            .labels
            .insert(label.into());
    }

    pub fn revoke(&self, username: &str, label: &str) {
        if let Some(grant) = self.grants.write().get_mut(username) {
            grant.labels.remove(label);
        }
    }

    /// Builder-style helper used when wiring fixtures
    pub fn with_account(self, account: Account, labels: &[&str]) -> Self {
        let username = account.username.clone();
        self.add_account(account);
        for label in labels {
            self.grant(&username, *label);
        }
        self
    }
}

#[async_trait]
impl IdentityProvider for InMemoryDirectory {
    async fn resolve(&self, username: &str) -> Result<Account> {
        self.accounts
            .read()
            .get(username)
            .cloned()
            .ok_or_else(|| WorkflowError::account_not_found(username))
    }

    async fn grants_for(&self, username: &str) -> Result<BTreeSet<String>> {
        Ok(self
            .grants
            .read()
            .get(username)
            .map(|grant| grant.labels.clone())
            .unwrap_or_default())
    }

    async fn holders_of(&self, label: &str) -> Result<Vec<String>> {
        let accounts = self.accounts.read();
        let mut holders: Vec<String> = self
            .grants
            .read()
            .values()
            .filter(|grant| grant.grants(label) && accounts.contains_key(&grant.username))
            .map(|grant| grant.username.clone())
            .collect();
        holders.sort();
        Ok(holders)
    }
}
