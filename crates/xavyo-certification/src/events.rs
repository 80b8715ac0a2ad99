//! Certification domain events.
//!
//! Events are published fire-and-forget after a transition commits:
//! - Stage opened and closed
//! - Reviewer decision recorded
//! - Remediation completed
//! - Campaign reiterated

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::result::OperationStatus;
use crate::types::{CampaignId, CaseId, CertificationResponse};

/// An event emitted by the campaign engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum CertificationEvent {
    /// A review stage opened.
    StageOpened {
        tenant_id: Uuid,
        campaign_id: CampaignId,
        stage_number: u32,
        iteration: u32,
        /// Reviewers holding at least one work item at the stage.
        reviewer_ids: Vec<Uuid>,
        work_item_count: usize,
        opened_at: DateTime<Utc>,
    },
    /// A review stage closed.
    StageClosed {
        tenant_id: Uuid,
        campaign_id: CampaignId,
        stage_number: u32,
        iteration: u32,
        /// Cases frozen by a stop-on outcome at this stage.
        stopped_cases: usize,
        closed_at: DateTime<Utc>,
    },
    /// A reviewer recorded a decision.
    DecisionRecorded {
        tenant_id: Uuid,
        campaign_id: CampaignId,
        case_id: CaseId,
        reviewer_id: Uuid,
        response: CertificationResponse,
        current_stage_outcome: CertificationResponse,
    },
    /// All remediation actions finished and the campaign closed.
    RemediationCompleted {
        tenant_id: Uuid,
        campaign_id: CampaignId,
        remedied: usize,
        failed: usize,
        status: OperationStatus,
        completed_at: DateTime<Utc>,
    },
    /// A closed campaign started a new iteration.
    CampaignReiterated {
        tenant_id: Uuid,
        campaign_id: CampaignId,
        iteration: u32,
        carried_forward: usize,
        created: usize,
        retired: usize,
    },
}

impl CertificationEvent {
    /// Fully qualified event type name.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::StageOpened { .. } => "xavyo.governance.certification.stage_opened",
            Self::StageClosed { .. } => "xavyo.governance.certification.stage_closed",
            Self::DecisionRecorded { .. } => "xavyo.governance.certification.decision_recorded",
            Self::RemediationCompleted { .. } => {
                "xavyo.governance.certification.remediation_completed"
            }
            Self::CampaignReiterated { .. } => "xavyo.governance.certification.campaign_reiterated",
        }
    }

    /// Campaign the event belongs to.
    #[must_use]
    pub fn campaign_id(&self) -> CampaignId {
        match self {
            Self::StageOpened { campaign_id, .. }
            | Self::StageClosed { campaign_id, .. }
            | Self::DecisionRecorded { campaign_id, .. }
            | Self::RemediationCompleted { campaign_id, .. }
            | Self::CampaignReiterated { campaign_id, .. } => *campaign_id,
        }
    }
}

/// Receiver of domain events.
///
/// Publishing must not block; the engine never waits on delivery.
pub trait NotificationSink: Send + Sync {
    /// Publish an event.
    fn publish(&self, event: CertificationEvent);
}

/// Sink that drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotificationSink;

impl NotificationSink for NoopNotificationSink {
    fn publish(&self, _event: CertificationEvent) {}
}

/// Sink fanning events out over a tokio broadcast channel.
#[derive(Debug, Clone)]
pub struct BroadcastNotificationSink {
    sender: broadcast::Sender<CertificationEvent>,
}

impl BroadcastNotificationSink {
    /// Create a sink buffering up to `capacity` events per subscriber.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Create a sink sized by the engine configuration.
    #[must_use]
    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.event_channel_capacity)
    }

    /// Subscribe to events published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<CertificationEvent> {
        self.sender.subscribe()
    }
}

impl NotificationSink for BroadcastNotificationSink {
    fn publish(&self, event: CertificationEvent) {
        let event_type = event.event_type();
        if self.sender.send(event).is_err() {
            debug!(event_type, "No subscribers for certification event");
        }
    }
}
