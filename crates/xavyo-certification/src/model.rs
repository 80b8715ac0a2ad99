//! Campaign, case and work-item records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::definition::CampaignDefinition;
use crate::services::grants::AccessGrant;
use crate::types::{CampaignId, CampaignState, CaseId, CertificationResponse, WorkItemId};

// ============================================================================
// Campaign
// ============================================================================

/// A certification campaign.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Campaign {
    /// Unique identifier.
    pub id: CampaignId,
    /// Tenant this campaign belongs to.
    pub tenant_id: Uuid,
    /// Display name, copied from the definition.
    pub name: String,
    /// Template the campaign runs.
    pub definition: CampaignDefinition,
    /// Lifecycle state.
    pub state: CampaignState,
    /// Current or last stage; 0 before the first stage opens.
    pub stage_number: u32,
    /// 1-based iteration, incremented on reiteration.
    pub iteration: u32,
    /// Opened stages, across iterations.
    pub stages: Vec<StageRecord>,
    /// When the first stage of the current iteration opened.
    pub started_at: Option<DateTime<Utc>>,
    /// When the campaign closed.
    pub ended_at: Option<DateTime<Utc>>,
    /// Who created the campaign.
    pub created_by: Uuid,
    /// When created.
    pub created_at: DateTime<Utc>,
    /// When last updated.
    pub updated_at: DateTime<Utc>,
}

impl Campaign {
    /// Stage record of the current stage in the current iteration.
    #[must_use]
    pub fn current_stage_record(&self) -> Option<&StageRecord> {
        self.stages
            .iter()
            .find(|s| s.number == self.stage_number && s.iteration == self.iteration)
    }

    pub(crate) fn current_stage_record_mut(&mut self) -> Option<&mut StageRecord> {
        let (number, iteration) = (self.stage_number, self.iteration);
        self.stages
            .iter_mut()
            .find(|s| s.number == number && s.iteration == iteration)
    }

    /// Whether the last configured stage has been reached.
    #[must_use]
    pub fn is_at_last_stage(&self) -> bool {
        self.stage_number >= self.definition.last_stage_number()
    }
}

/// Record of an opened review stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageRecord {
    /// Stage number.
    pub number: u32,
    /// Campaign iteration the stage ran in.
    pub iteration: u32,
    /// When the stage opened.
    pub started_at: DateTime<Utc>,
    /// When the stage closed.
    pub ended_at: Option<DateTime<Utc>>,
}

// ============================================================================
// Case
// ============================================================================

/// One reviewable access grant within a campaign.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertificationCase {
    /// Unique identifier.
    pub id: CaseId,
    /// Tenant this case belongs to.
    pub tenant_id: Uuid,
    /// Owning campaign.
    pub campaign_id: CampaignId,
    /// The grant under review.
    pub grant: AccessGrant,
    /// Iteration that created or last carried the case.
    pub iteration: u32,
    /// Last stage the case was reviewed in.
    pub stage_number: u32,
    /// Outcome at the current (or freezing) stage.
    pub current_stage_outcome: Option<CertificationResponse>,
    /// Overall outcome, derived from the current-iteration trail.
    pub overall_outcome: CertificationResponse,
    /// One entry per closed stage, across iterations.
    pub historic_outcomes: Vec<HistoricOutcome>,
    /// Reviewer work items, across stages and iterations.
    pub work_items: Vec<WorkItem>,
    /// Whether a stop-on outcome froze the case.
    pub review_stopped: bool,
    /// Stage at which the case was frozen.
    pub stopped_at_stage: Option<u32>,
    /// False once the underlying grant disappeared at reiteration.
    pub live: bool,
    /// When remediation succeeded.
    pub remedied_at: Option<DateTime<Utc>>,
    /// Last remediation failure.
    pub remediation_error: Option<String>,
    /// When created.
    pub created_at: DateTime<Utc>,
}

impl CertificationCase {
    /// Create a fresh case for a grant.
    #[must_use]
    pub fn new(tenant_id: Uuid, campaign_id: CampaignId, grant: AccessGrant, iteration: u32) -> Self {
        Self {
            id: CaseId::new(),
            tenant_id,
            campaign_id,
            grant,
            iteration,
            stage_number: 0,
            current_stage_outcome: None,
            overall_outcome: CertificationResponse::NoResponse,
            historic_outcomes: Vec::new(),
            work_items: Vec::new(),
            review_stopped: false,
            stopped_at_stage: None,
            live: true,
            remedied_at: None,
            remediation_error: None,
            created_at: Utc::now(),
        }
    }

    /// Whether the case takes part in the given iteration.
    #[must_use]
    pub fn is_active_in(&self, iteration: u32) -> bool {
        self.live && self.iteration == iteration
    }

    /// Whether the case is being reviewed at the given stage.
    #[must_use]
    pub fn is_under_review(&self, stage_number: u32, iteration: u32) -> bool {
        stage_number > 0
            && self.is_active_in(iteration)
            && !self.review_stopped
            && self.stage_number == stage_number
    }

    /// Work items of one stage and iteration.
    pub fn work_items_for(&self, stage_number: u32, iteration: u32) -> impl Iterator<Item = &WorkItem> {
        self.work_items
            .iter()
            .filter(move |w| w.stage_number == stage_number && w.iteration == iteration)
    }

    /// The work item a reviewer holds at one stage and iteration.
    pub fn work_item_mut(
        &mut self,
        reviewer_id: Uuid,
        stage_number: u32,
        iteration: u32,
    ) -> Option<&mut WorkItem> {
        self.work_items.iter_mut().find(|w| {
            w.reviewer_id == reviewer_id && w.stage_number == stage_number && w.iteration == iteration
        })
    }

    /// Closed-stage outcomes of one iteration, in stage order.
    pub fn trail(&self, iteration: u32) -> impl Iterator<Item = CertificationResponse> + '_ {
        self.historic_outcomes
            .iter()
            .filter(move |h| h.iteration == iteration)
            .map(|h| h.outcome)
    }
}

/// Outcome of a case at a closed stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoricOutcome {
    /// Stage number.
    pub stage_number: u32,
    /// Iteration the stage ran in.
    pub iteration: u32,
    /// Frozen stage outcome.
    pub outcome: CertificationResponse,
}

// ============================================================================
// Work items
// ============================================================================

/// One reviewer's decision slot for a case at a stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkItem {
    /// Unique identifier.
    pub id: WorkItemId,
    /// Current reviewer.
    pub reviewer_id: Uuid,
    /// Reviewer the item was first assigned to.
    pub original_reviewer_id: Uuid,
    /// Stage the item belongs to.
    pub stage_number: u32,
    /// Iteration the item belongs to.
    pub iteration: u32,
    /// Whether the item was escalated to another reviewer.
    pub escalated: bool,
    /// When created.
    pub created_at: DateTime<Utc>,
    /// When the stage closed over the item.
    pub closed_at: Option<DateTime<Utc>>,
    /// Decision progress.
    pub state: WorkItemState,
}

impl WorkItem {
    /// Create a pending work item.
    #[must_use]
    pub fn new(reviewer_id: Uuid, stage_number: u32, iteration: u32) -> Self {
        Self {
            id: WorkItemId::new(),
            reviewer_id,
            original_reviewer_id: reviewer_id,
            stage_number,
            iteration,
            escalated: false,
            created_at: Utc::now(),
            closed_at: None,
            state: WorkItemState::Pending,
        }
    }

    /// Response held by the item, NO_RESPONSE unless decided.
    #[must_use]
    pub fn response(&self) -> CertificationResponse {
        match &self.state {
            WorkItemState::Decided(decision) => decision.response,
            WorkItemState::Pending | WorkItemState::Defaulted => CertificationResponse::NoResponse,
        }
    }

    /// Whether the item holds an actual response.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.response() != CertificationResponse::NoResponse
    }

    /// The decision, if any.
    #[must_use]
    pub fn decision(&self) -> Option<&Decision> {
        match &self.state {
            WorkItemState::Decided(decision) => Some(decision),
            _ => None,
        }
    }
}

/// Decision progress of a work item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum WorkItemState {
    /// Waiting for the reviewer.
    Pending,
    /// The reviewer decided.
    Decided(Decision),
    /// The stage closed before the reviewer decided.
    Defaulted,
}

/// A reviewer's decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    /// Response given.
    pub response: CertificationResponse,
    /// Optional free-text justification.
    pub comment: Option<String>,
    /// When decided.
    pub decided_at: DateTime<Utc>,
    /// Reviewer that decided.
    pub decided_by: Uuid,
    /// Whether the work item had been escalated.
    pub escalated: bool,
}
