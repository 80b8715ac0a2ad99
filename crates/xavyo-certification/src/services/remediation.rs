//! Remediation execution.
//!
//! Remediation actions are independent external side effects, one per case
//! with a revoking overall outcome. They run as spawned tasks bounded by a
//! semaphore; the caller gets back one result per case once all of them have
//! reported.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{CertificationError, Result};
use crate::model::CertificationCase;
use crate::result::{OperationResult, OperationStatus};
use crate::services::grants::AccessGrantSource;
use crate::types::CaseId;

/// Applies the real-world side effect of a revoking outcome.
#[async_trait::async_trait]
pub trait RemediationExecutor: Send + Sync {
    /// Remediate one case. Failures stay scoped to the case.
    async fn remediate(&self, tenant_id: Uuid, case: &CertificationCase) -> Result<()>;
}

/// Executor removing the reviewed grant from its source.
pub struct GrantRemovalExecutor {
    grants: Arc<dyn AccessGrantSource>,
}

impl GrantRemovalExecutor {
    /// Create an executor over a grant source.
    pub fn new(grants: Arc<dyn AccessGrantSource>) -> Self {
        Self { grants }
    }
}

#[async_trait::async_trait]
impl RemediationExecutor for GrantRemovalExecutor {
    async fn remediate(&self, tenant_id: Uuid, case: &CertificationCase) -> Result<()> {
        let removed = self
            .grants
            .remove_grant(tenant_id, &case.grant)
            .await
            .map_err(|e| CertificationError::Remediation {
                case_id: case.id.into_inner(),
                message: e.to_string(),
            })?;
        if !removed {
            return Err(CertificationError::Remediation {
                case_id: case.id.into_inner(),
                message: "access grant no longer exists".to_string(),
            });
        }
        debug!(case_id = %case.id, "Removed access grant");
        Ok(())
    }
}

/// Run remediation for every case on a bounded pool of tasks.
///
/// Results come back in the order of `cases`.
pub(crate) async fn run_remediation_pool(
    executor: Arc<dyn RemediationExecutor>,
    tenant_id: Uuid,
    cases: Vec<CertificationCase>,
    concurrency: usize,
) -> Vec<(CaseId, Result<()>)> {
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut handles = Vec::with_capacity(cases.len());

    for case in cases {
        let case_id = case.id;
        let executor = executor.clone();
        let semaphore = semaphore.clone();
        let handle = tokio::spawn(async move {
            let _permit = semaphore
                .acquire_owned()
                .await
                .map_err(|e| CertificationError::Remediation {
                    case_id: case.id.into_inner(),
                    message: e.to_string(),
                })?;
            executor.remediate(tenant_id, &case).await
        });
        handles.push((case_id, handle));
    }

    let mut results = Vec::with_capacity(handles.len());
    for (case_id, handle) in handles {
        let result = handle.await.unwrap_or_else(|e| {
            Err(CertificationError::Remediation {
                case_id: case_id.into_inner(),
                message: format!("remediation task failed: {e}"),
            })
        });
        if let Err(e) = &result {
            warn!(case_id = %case_id, error = %e, "Remediation failed");
        }
        results.push((case_id, result));
    }
    results
}

/// Handle on remediation started by a campaign.
#[derive(Debug)]
pub enum RemediationHandle {
    /// Nothing was dispatched; the campaign already closed.
    Ready(OperationResult),
    /// Remediation is running in the background.
    Pending(JoinHandle<OperationResult>),
}

impl RemediationHandle {
    /// Whether all remediation actions have reported.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        match self {
            Self::Ready(_) => true,
            Self::Pending(handle) => handle.is_finished(),
        }
    }

    /// Wait for the campaign to close and return the final result.
    pub async fn wait(self) -> OperationResult {
        match self {
            Self::Ready(result) => result,
            Self::Pending(handle) => handle.await.unwrap_or_else(|e| {
                OperationResult::new("remediation")
                    .with_status(OperationStatus::FatalError)
                    .with_message(format!("remediation supervisor failed: {e}"))
            }),
        }
    }
}
