//! Error types for the certification engine.

use thiserror::Error;
use uuid::Uuid;

use crate::strategy::OutcomeStrategy;
use crate::types::{CampaignState, CertificationResponse};

/// Errors that can occur while driving certification campaigns.
#[derive(Debug, Error)]
pub enum CertificationError {
    /// The campaign does not exist (or belongs to another tenant).
    #[error("Certification campaign not found: {0}")]
    CampaignNotFound(Uuid),

    /// The case does not exist or is not part of the campaign.
    #[error("Certification case not found: {0}")]
    CaseNotFound(Uuid),

    /// The reviewer holds no work item for the case at the current stage.
    #[error("No work item for reviewer {reviewer_id} in case {case_id}")]
    WorkItemNotFound {
        /// Case the decision was addressed to.
        case_id: Uuid,
        /// Reviewer that attempted the decision.
        reviewer_id: Uuid,
    },

    /// The escalation target already reviews the case at this stage.
    #[error("Reviewer {reviewer_id} already holds a work item in case {case_id}")]
    DuplicateReviewer {
        /// Affected case.
        case_id: Uuid,
        /// Escalation target.
        reviewer_id: Uuid,
    },

    /// A transition was attempted from a state that does not allow it.
    #[error("Cannot {operation} campaign in state {state} (stage {stage_number})")]
    InvalidState {
        /// The attempted transition.
        operation: &'static str,
        /// Actual campaign state.
        state: CampaignState,
        /// Actual stage number.
        stage_number: u32,
    },

    /// The campaign has no stage left to open.
    #[error("No more stages to open in campaign {0}")]
    NoMoreStages(Uuid),

    /// An outcome strategy was applied to an empty response summary.
    #[error("Outcome strategy {0} invoked without any responses")]
    NoResponses(OutcomeStrategy),

    /// The response is not in the campaign's set of available responses.
    #[error("Response {0} is not available in this campaign")]
    ResponseNotAllowed(CertificationResponse),

    /// The campaign definition is malformed.
    #[error("Invalid campaign definition: {0}")]
    DefinitionInvalid(String),

    /// Reviewers for a case could not be resolved.
    #[error("Reviewer resolution failed for case {case_id}: {message}")]
    ReviewerResolution {
        /// Affected case.
        case_id: Uuid,
        /// Collaborator-provided reason.
        message: String,
    },

    /// Remediation of a case failed.
    #[error("Remediation failed for case {case_id}: {message}")]
    Remediation {
        /// Affected case.
        case_id: Uuid,
        /// Collaborator-provided reason.
        message: String,
    },

    /// The access-grant population could not be read.
    #[error("Access grant source failed: {0}")]
    GrantSource(String),

    /// Storage backend failure.
    #[error("Store error: {0}")]
    Store(String),

    /// Configuration value could not be parsed.
    #[error("Invalid configuration {var}: {reason}")]
    ConfigInvalid {
        /// Environment variable name.
        var: String,
        /// Why the value was rejected.
        reason: String,
    },

    /// JSON serialization failure.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CertificationError {
    /// Whether the failure is scoped to a single case.
    ///
    /// Per-case failures are recorded in that case's sub-result and the
    /// surrounding loop continues; all other failures abort the operation.
    #[must_use]
    pub fn is_per_case(&self) -> bool {
        matches!(self, Self::ReviewerResolution { .. } | Self::Remediation { .. })
    }
}

/// Convenience Result type for the certification engine.
pub type Result<T> = std::result::Result<T, CertificationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_per_case_classification() {
        let resolution = CertificationError::ReviewerResolution {
            case_id: Uuid::new_v4(),
            message: "directory offline".to_string(),
        };
        let remediation = CertificationError::Remediation {
            case_id: Uuid::new_v4(),
            message: "grant already gone".to_string(),
        };
        let state = CertificationError::InvalidState {
            operation: "close stage of",
            state: CampaignState::Created,
            stage_number: 0,
        };

        assert!(resolution.is_per_case());
        assert!(remediation.is_per_case());
        assert!(!state.is_per_case());
        assert!(!CertificationError::Store("down".to_string()).is_per_case());
    }

    #[test]
    fn test_invalid_state_message_names_transition() {
        let err = CertificationError::InvalidState {
            operation: "open next stage of",
            state: CampaignState::InRemediation,
            stage_number: 3,
        };
        assert_eq!(
            err.to_string(),
            "Cannot open next stage of campaign in state in_remediation (stage 3)"
        );
    }
}
