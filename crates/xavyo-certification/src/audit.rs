//! Audit logging for certification campaigns.
//!
//! Every campaign command records what it changed as a
//! [`CertificationAuditEvent`]. Storage is pluggable through [`AuditStore`];
//! [`InMemoryAuditStore`] backs tests and embedded use.
//!
//! # Example
//!
//! ```rust,ignore
//! use xavyo_certification::audit::{AuditStore, CertificationAuditAction, CertificationAuditEventInput, InMemoryAuditStore};
//!
//! let store = InMemoryAuditStore::new();
//! let event = store
//!     .log_event(CertificationAuditEventInput {
//!         tenant_id,
//!         campaign_id,
//!         action: CertificationAuditAction::StageOpened,
//!         actor_id,
//!         ..Default::default()
//!     })
//!     .await?;
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::Result;
use crate::types::{CampaignId, CaseId};

/// Action performed on a campaign or one of its cases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CertificationAuditAction {
    /// Campaign was created.
    #[default]
    CampaignCreated,
    /// A review stage was opened.
    StageOpened,
    /// A review stage was closed.
    StageClosed,
    /// No remaining stage produced work items; review finished.
    StagesSkipped,
    /// A reviewer recorded a decision.
    DecisionRecorded,
    /// A work item moved to another reviewer.
    WorkItemEscalated,
    /// Remediation was started.
    RemediationStarted,
    /// A case's access grant was removed.
    CaseRemedied,
    /// Removing a case's access grant failed.
    RemediationFailed,
    /// Campaign reached its terminal state.
    CampaignClosed,
    /// Campaign started a new iteration.
    CampaignReiterated,
}

impl std::fmt::Display for CertificationAuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CampaignCreated => write!(f, "campaign_created"),
            Self::StageOpened => write!(f, "stage_opened"),
            Self::StageClosed => write!(f, "stage_closed"),
            Self::StagesSkipped => write!(f, "stages_skipped"),
            Self::DecisionRecorded => write!(f, "decision_recorded"),
            Self::WorkItemEscalated => write!(f, "work_item_escalated"),
            Self::RemediationStarted => write!(f, "remediation_started"),
            Self::CaseRemedied => write!(f, "case_remedied"),
            Self::RemediationFailed => write!(f, "remediation_failed"),
            Self::CampaignClosed => write!(f, "campaign_closed"),
            Self::CampaignReiterated => write!(f, "campaign_reiterated"),
        }
    }
}

/// An audit event for certification operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertificationAuditEvent {
    /// Unique identifier for the event.
    pub id: Uuid,
    /// Tenant this event belongs to.
    pub tenant_id: Uuid,
    /// The campaign involved.
    pub campaign_id: CampaignId,
    /// The case involved (if any).
    pub case_id: Option<CaseId>,
    /// Action performed.
    pub action: CertificationAuditAction,
    /// User (or system principal) who performed the action.
    pub actor_id: Uuid,
    /// Stage number at the time of the action.
    pub stage_number: u32,
    /// Campaign iteration at the time of the action.
    pub iteration: u32,
    /// When the event occurred.
    pub timestamp: DateTime<Utc>,
    /// Action-specific details.
    pub details: Option<serde_json::Value>,
}

/// Input for creating an audit event.
#[derive(Debug, Clone, Default)]
pub struct CertificationAuditEventInput {
    /// Tenant this event belongs to.
    pub tenant_id: Uuid,
    /// The campaign involved.
    pub campaign_id: CampaignId,
    /// The case involved (if any).
    pub case_id: Option<CaseId>,
    /// Action performed.
    pub action: CertificationAuditAction,
    /// User who performed the action.
    pub actor_id: Uuid,
    /// Stage number at the time of the action.
    pub stage_number: u32,
    /// Campaign iteration at the time of the action.
    pub iteration: u32,
    /// Action-specific details.
    pub details: Option<serde_json::Value>,
}

/// Filter for querying audit events.
#[derive(Debug, Clone, Default)]
pub struct AuditEventFilter {
    /// Filter by campaign ID.
    pub campaign_id: Option<CampaignId>,
    /// Filter by case ID.
    pub case_id: Option<CaseId>,
    /// Filter by actor ID.
    pub actor_id: Option<Uuid>,
    /// Filter by action type.
    pub action: Option<CertificationAuditAction>,
    /// Filter by events after this date.
    pub from_date: Option<DateTime<Utc>>,
    /// Filter by events before this date.
    pub to_date: Option<DateTime<Utc>>,
    /// Maximum number of results.
    pub limit: Option<usize>,
    /// Number of results to skip.
    pub offset: Option<usize>,
}

/// Trait for audit event storage backends.
#[async_trait::async_trait]
pub trait AuditStore: Send + Sync {
    /// Log an audit event.
    async fn log_event(&self, input: CertificationAuditEventInput)
        -> Result<CertificationAuditEvent>;

    /// Query audit events, most recent first.
    async fn query_events(
        &self,
        tenant_id: Uuid,
        filter: AuditEventFilter,
    ) -> Result<Vec<CertificationAuditEvent>>;
}

/// In-memory audit store for testing.
#[derive(Debug, Default)]
pub struct InMemoryAuditStore {
    events: Arc<RwLock<Vec<CertificationAuditEvent>>>,
}

impl InMemoryAuditStore {
    /// Create a new in-memory audit store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the count of events in the store.
    pub async fn count(&self) -> usize {
        self.events.read().await.len()
    }

    /// Count events per action for one campaign.
    pub async fn count_by_action(&self, campaign_id: CampaignId) -> HashMap<CertificationAuditAction, usize> {
        let events = self.events.read().await;
        let mut counts = HashMap::new();
        for event in events.iter().filter(|e| e.campaign_id == campaign_id) {
            *counts.entry(event.action).or_insert(0) += 1;
        }
        counts
    }
}

#[async_trait::async_trait]
impl AuditStore for InMemoryAuditStore {
    async fn log_event(
        &self,
        input: CertificationAuditEventInput,
    ) -> Result<CertificationAuditEvent> {
        let event = CertificationAuditEvent {
            id: Uuid::new_v4(),
            tenant_id: input.tenant_id,
            campaign_id: input.campaign_id,
            case_id: input.case_id,
            action: input.action,
            actor_id: input.actor_id,
            stage_number: input.stage_number,
            iteration: input.iteration,
            timestamp: Utc::now(),
            details: input.details,
        };

        self.events.write().await.push(event.clone());
        Ok(event)
    }

    async fn query_events(
        &self,
        tenant_id: Uuid,
        filter: AuditEventFilter,
    ) -> Result<Vec<CertificationAuditEvent>> {
        let events = self.events.read().await;
        // Newest first.
        let results: Vec<_> = events
            .iter()
            .rev()
            .filter(|e| e.tenant_id == tenant_id)
            .filter(|e| filter.campaign_id.is_none_or(|id| e.campaign_id == id))
            .filter(|e| filter.case_id.is_none_or(|id| e.case_id == Some(id)))
            .filter(|e| filter.actor_id.is_none_or(|id| e.actor_id == id))
            .filter(|e| filter.action.is_none_or(|a| e.action == a))
            .filter(|e| filter.from_date.is_none_or(|d| e.timestamp >= d))
            .filter(|e| filter.to_date.is_none_or(|d| e.timestamp <= d))
            .cloned()
            .collect();

        let offset = filter.offset.unwrap_or(0);
        let limit = filter.limit.unwrap_or(usize::MAX);

        Ok(results.into_iter().skip(offset).take(limit).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_log_event() {
        let store = InMemoryAuditStore::new();
        let tenant_id = Uuid::new_v4();
        let campaign_id = CampaignId::new();
        let actor_id = Uuid::new_v4();

        let event = store
            .log_event(CertificationAuditEventInput {
                tenant_id,
                campaign_id,
                action: CertificationAuditAction::StageOpened,
                actor_id,
                stage_number: 1,
                iteration: 1,
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(event.tenant_id, tenant_id);
        assert_eq!(event.campaign_id, campaign_id);
        assert_eq!(event.action, CertificationAuditAction::StageOpened);
        assert_eq!(store.count().await, 1);
    }

    #[tokio::test]
    async fn test_query_filters_and_tenant_isolation() {
        let store = InMemoryAuditStore::new();
        let tenant_id = Uuid::new_v4();
        let campaign_id = CampaignId::new();
        let case_id = CaseId::new();

        for action in [
            CertificationAuditAction::StageOpened,
            CertificationAuditAction::DecisionRecorded,
            CertificationAuditAction::StageClosed,
        ] {
            store
                .log_event(CertificationAuditEventInput {
                    tenant_id,
                    campaign_id,
                    case_id: (action == CertificationAuditAction::DecisionRecorded)
                        .then_some(case_id),
                    action,
                    ..Default::default()
                })
                .await
                .unwrap();
        }
        store
            .log_event(CertificationAuditEventInput {
                tenant_id: Uuid::new_v4(),
                campaign_id,
                ..Default::default()
            })
            .await
            .unwrap();

        let all = store
            .query_events(tenant_id, AuditEventFilter::default())
            .await
            .unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].action, CertificationAuditAction::StageClosed);

        let by_case = store
            .query_events(
                tenant_id,
                AuditEventFilter {
                    case_id: Some(case_id),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(by_case.len(), 1);
        assert_eq!(by_case[0].action, CertificationAuditAction::DecisionRecorded);

        let paged = store
            .query_events(
                tenant_id,
                AuditEventFilter {
                    offset: Some(1),
                    limit: Some(1),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(paged.len(), 1);
        assert_eq!(paged[0].action, CertificationAuditAction::DecisionRecorded);
    }

    #[tokio::test]
    async fn test_count_by_action() {
        let store = InMemoryAuditStore::new();
        let campaign_id = CampaignId::new();
        for _ in 0..2 {
            store
                .log_event(CertificationAuditEventInput {
                    campaign_id,
                    action: CertificationAuditAction::CaseRemedied,
                    ..Default::default()
                })
                .await
                .unwrap();
        }
        let counts = store.count_by_action(campaign_id).await;
        assert_eq!(counts.get(&CertificationAuditAction::CaseRemedied), Some(&2));
    }
}
