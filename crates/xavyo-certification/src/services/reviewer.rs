//! Reviewer resolution.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use tokio::sync::RwLock;
use uuid::Uuid;

use crate::definition::StageDefinition;
use crate::error::Result;
use crate::model::CertificationCase;

/// Determines who reviews a case at a stage.
///
/// Implementations may consult organizational data; the result must be
/// deterministic for a given case, stage and point in time. Failures should
/// be reported as [`CertificationError::ReviewerResolution`] so they stay
/// scoped to the case.
///
/// [`CertificationError::ReviewerResolution`]: crate::error::CertificationError::ReviewerResolution
#[async_trait::async_trait]
pub trait ReviewerResolver: Send + Sync {
    /// Resolve the reviewer set for a case at a stage.
    async fn resolve_reviewers(
        &self,
        tenant_id: Uuid,
        case: &CertificationCase,
        stage: &StageDefinition,
    ) -> Result<BTreeSet<Uuid>>;
}

type DirectoryKey = (Uuid, Uuid);

/// Resolver backed by in-memory ownership and reporting lines.
#[derive(Debug, Default)]
pub struct DirectoryReviewerResolver {
    target_owners: Arc<RwLock<HashMap<DirectoryKey, Vec<Uuid>>>>,
    subject_managers: Arc<RwLock<HashMap<DirectoryKey, Vec<Uuid>>>>,
}

impl DirectoryReviewerResolver {
    /// Create an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an owner of a target.
    pub async fn add_target_owner(&self, tenant_id: Uuid, target_id: Uuid, owner_id: Uuid) {
        self.target_owners
            .write()
            .await
            .entry((tenant_id, target_id))
            .or_default()
            .push(owner_id);
    }

    /// Register a manager of a subject.
    pub async fn add_subject_manager(&self, tenant_id: Uuid, subject_id: Uuid, manager_id: Uuid) {
        self.subject_managers
            .write()
            .await
            .entry((tenant_id, subject_id))
            .or_default()
            .push(manager_id);
    }
}

#[async_trait::async_trait]
impl ReviewerResolver for DirectoryReviewerResolver {
    async fn resolve_reviewers(
        &self,
        tenant_id: Uuid,
        case: &CertificationCase,
        stage: &StageDefinition,
    ) -> Result<BTreeSet<Uuid>> {
        let spec = &stage.reviewers;
        let mut reviewers = BTreeSet::new();

        if spec.use_target_owner {
            if let Some(owners) = self
                .target_owners
                .read()
                .await
                .get(&(tenant_id, case.grant.target_id))
            {
                reviewers.extend(owners.iter().copied());
            }
        }
        if spec.use_subject_manager {
            if let Some(managers) = self
                .subject_managers
                .read()
                .await
                .get(&(tenant_id, case.grant.subject_id))
            {
                reviewers.extend(managers.iter().copied());
            }
        }
        reviewers.extend(spec.additional_reviewers.iter().copied());

        if reviewers.is_empty() {
            reviewers.extend(spec.default_reviewers.iter().copied());
        }
        Ok(reviewers)
    }
}
