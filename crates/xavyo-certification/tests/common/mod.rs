//! Common test utilities for xavyo-certification integration tests.
//!
//! All tests run against in-memory stores and directories, one isolated set
//! per test.

#![allow(dead_code)]

pub mod fixtures;

use std::collections::BTreeSet;
use std::sync::Arc;

use uuid::Uuid;
use xavyo_certification::audit::InMemoryAuditStore;
use xavyo_certification::definition::StageDefinition;
use xavyo_certification::error::{CertificationError, Result};
use xavyo_certification::events::BroadcastNotificationSink;
use xavyo_certification::model::CertificationCase;
use xavyo_certification::services::{
    CaseFilter, CertificationCampaignService, DirectoryReviewerResolver, GrantRemovalExecutor,
    InMemoryAccessGrantSource, InMemoryCertificationStore, RemediationExecutor, ReviewerResolver,
};
use xavyo_certification::types::CampaignId;
use xavyo_certification::{AccessGrant, EngineConfig};

/// In-memory collaborators shared by the service under test.
#[derive(Clone)]
pub struct TestStores {
    pub store: Arc<InMemoryCertificationStore>,
    pub audit_store: Arc<InMemoryAuditStore>,
    pub grants: Arc<InMemoryAccessGrantSource>,
    pub directory: Arc<DirectoryReviewerResolver>,
    pub events: Arc<BroadcastNotificationSink>,
}

impl TestStores {
    pub fn new() -> Self {
        Self {
            store: Arc::new(InMemoryCertificationStore::new()),
            audit_store: Arc::new(InMemoryAuditStore::new()),
            grants: Arc::new(InMemoryAccessGrantSource::new()),
            directory: Arc::new(DirectoryReviewerResolver::new()),
            events: Arc::new(BroadcastNotificationSink::from_config(&EngineConfig::default())),
        }
    }
}

/// Test context containing stores, the service and tenant/actor IDs.
pub struct TestContext {
    pub stores: TestStores,
    pub service: CertificationCampaignService,
    pub tenant_a: Uuid,
    pub tenant_b: Uuid,
    pub actor_id: Uuid,
}

impl TestContext {
    /// Context using the directory resolver and grant-removal remediation.
    pub fn new() -> Self {
        let stores = TestStores::new();
        let reviewers: Arc<dyn ReviewerResolver> = stores.directory.clone();
        let remediation: Arc<dyn RemediationExecutor> =
            Arc::new(GrantRemovalExecutor::new(stores.grants.clone()));
        Self::build(stores, reviewers, remediation)
    }

    /// Context with a custom reviewer resolver.
    pub fn with_resolver(reviewers: Arc<dyn ReviewerResolver>) -> Self {
        let stores = TestStores::new();
        let remediation: Arc<dyn RemediationExecutor> =
            Arc::new(GrantRemovalExecutor::new(stores.grants.clone()));
        Self::build(stores, reviewers, remediation)
    }

    /// Context with a custom remediation executor.
    pub fn with_executor(remediation: Arc<dyn RemediationExecutor>) -> Self {
        let stores = TestStores::new();
        let reviewers: Arc<dyn ReviewerResolver> = stores.directory.clone();
        Self::build(stores, reviewers, remediation)
    }

    fn build(
        stores: TestStores,
        reviewers: Arc<dyn ReviewerResolver>,
        remediation: Arc<dyn RemediationExecutor>,
    ) -> Self {
        let config = EngineConfig::builder()
            .remediation_concurrency(2)
            .max_cases_per_campaign(1_000)
            .build()
            .expect("valid test config");
        let service = CertificationCampaignService::new(
            stores.store.clone(),
            stores.audit_store.clone(),
            stores.grants.clone(),
            reviewers,
            remediation,
        )
        .with_notifications(stores.events.clone())
        .with_config(config);

        Self {
            stores,
            service,
            tenant_a: Uuid::new_v4(),
            tenant_b: Uuid::new_v4(),
            actor_id: Uuid::new_v4(),
        }
    }

    /// Register a grant for tenant A.
    pub async fn grant(&self, subject_id: Uuid, target_id: Uuid) -> AccessGrant {
        let grant = AccessGrant::new(subject_id, target_id);
        self.stores.grants.add_grant(self.tenant_a, grant).await;
        grant
    }

    /// Find the tenant A case reviewing a grant.
    pub async fn case_for(&self, campaign_id: CampaignId, grant: AccessGrant) -> CertificationCase {
        let filter = CaseFilter {
            subject_id: Some(grant.subject_id),
            target_id: Some(grant.target_id),
            live_only: true,
            ..Default::default()
        };
        self.service
            .search_cases(self.tenant_a, campaign_id, filter)
            .await
            .expect("search cases")
            .into_iter()
            .next()
            .expect("case for grant")
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolver failing for every case whose subject is in `failing_subjects`
/// and delegating to a directory otherwise.
pub struct FailingResolver {
    pub inner: Arc<DirectoryReviewerResolver>,
    pub failing_subjects: BTreeSet<Uuid>,
}

#[async_trait::async_trait]
impl ReviewerResolver for FailingResolver {
    async fn resolve_reviewers(
        &self,
        tenant_id: Uuid,
        case: &CertificationCase,
        stage: &StageDefinition,
    ) -> Result<BTreeSet<Uuid>> {
        if self.failing_subjects.contains(&case.grant.subject_id) {
            return Err(CertificationError::ReviewerResolution {
                case_id: case.id.into_inner(),
                message: "directory unavailable".to_string(),
            });
        }
        self.inner.resolve_reviewers(tenant_id, case, stage).await
    }
}

/// Executor failing for cases whose subject is in `failing_subjects`.
pub struct SelectiveExecutor {
    pub failing_subjects: BTreeSet<Uuid>,
}

#[async_trait::async_trait]
impl RemediationExecutor for SelectiveExecutor {
    async fn remediate(&self, _tenant_id: Uuid, case: &CertificationCase) -> Result<()> {
        if self.failing_subjects.contains(&case.grant.subject_id) {
            return Err(CertificationError::Remediation {
                case_id: case.id.into_inner(),
                message: "connector rejected the request".to_string(),
            });
        }
        Ok(())
    }
}

/// Executor whose actions wait until the test releases a permit each.
pub struct GatedExecutor {
    pub gate: Arc<tokio::sync::Semaphore>,
}

#[async_trait::async_trait]
impl RemediationExecutor for GatedExecutor {
    async fn remediate(&self, _tenant_id: Uuid, _case: &CertificationCase) -> Result<()> {
        self.gate.acquire().await.expect("gate open").forget();
        Ok(())
    }
}
