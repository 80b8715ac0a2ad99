//! Access-grant population.
//!
//! Cases are materialized from the grants an [`AccessGrantSource`] returns.
//! A grant is identified by its subject and target, which is how
//! reiteration recognizes that a reviewed grant still exists.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::Result;

/// A subject holding access to a target (e.g. user X holds role Y).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AccessGrant {
    /// Holder of the access.
    pub subject_id: Uuid,
    /// Role, entitlement or resource held.
    pub target_id: Uuid,
}

impl AccessGrant {
    /// Create a grant.
    #[must_use]
    pub fn new(subject_id: Uuid, target_id: Uuid) -> Self {
        Self {
            subject_id,
            target_id,
        }
    }
}

/// Which grants a campaign reviews. Empty lists mean "any".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantScope {
    /// Only grants held by these subjects.
    #[serde(default)]
    pub subject_ids: Vec<Uuid>,
    /// Only grants to these targets.
    #[serde(default)]
    pub target_ids: Vec<Uuid>,
}

impl GrantScope {
    /// Whether a grant falls within the scope.
    #[must_use]
    pub fn matches(&self, grant: &AccessGrant) -> bool {
        (self.subject_ids.is_empty() || self.subject_ids.contains(&grant.subject_id))
            && (self.target_ids.is_empty() || self.target_ids.contains(&grant.target_id))
    }
}

/// Source of the access grants under review.
#[async_trait::async_trait]
pub trait AccessGrantSource: Send + Sync {
    /// List the grants within a scope, in a stable order.
    async fn list_grants(&self, tenant_id: Uuid, scope: &GrantScope) -> Result<Vec<AccessGrant>>;

    /// Remove a grant. Returns whether it existed.
    async fn remove_grant(&self, tenant_id: Uuid, grant: &AccessGrant) -> Result<bool>;
}

/// In-memory grant source for testing.
#[derive(Debug, Default)]
pub struct InMemoryAccessGrantSource {
    grants: Arc<RwLock<HashMap<Uuid, Vec<AccessGrant>>>>,
}

impl InMemoryAccessGrantSource {
    /// Create an empty grant source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a grant; duplicates are ignored.
    pub async fn add_grant(&self, tenant_id: Uuid, grant: AccessGrant) {
        let mut grants = self.grants.write().await;
        let tenant = grants.entry(tenant_id).or_default();
        if !tenant.contains(&grant) {
            tenant.push(grant);
        }
    }

    /// Whether a grant currently exists.
    pub async fn has_grant(&self, tenant_id: Uuid, grant: &AccessGrant) -> bool {
        self.grants
            .read()
            .await
            .get(&tenant_id)
            .is_some_and(|g| g.contains(grant))
    }
}

#[async_trait::async_trait]
impl AccessGrantSource for InMemoryAccessGrantSource {
    async fn list_grants(&self, tenant_id: Uuid, scope: &GrantScope) -> Result<Vec<AccessGrant>> {
        let grants = self.grants.read().await;
        Ok(grants
            .get(&tenant_id)
            .map(|g| g.iter().filter(|g| scope.matches(g)).copied().collect())
            .unwrap_or_default())
    }

    async fn remove_grant(&self, tenant_id: Uuid, grant: &AccessGrant) -> Result<bool> {
        let mut grants = self.grants.write().await;
        let Some(tenant) = grants.get_mut(&tenant_id) else {
            return Ok(false);
        };
        let before = tenant.len();
        tenant.retain(|g| g != grant);
        Ok(tenant.len() != before)
    }
}
