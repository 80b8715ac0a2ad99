//! Campaign definitions.
//!
//! A definition is the immutable template a campaign is created from: the
//! ordered review stages, the overall outcome strategy and the remediation
//! policy. Definitions are plain serde structs so they can be stored next to
//! the campaign or loaded from configuration.

use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CertificationError, Result};
use crate::services::grants::GrantScope;
use crate::strategy::OutcomeStrategy;
use crate::types::CertificationResponse;

/// Template for a certification campaign.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignDefinition {
    /// Campaign display name.
    pub name: String,
    /// Optional description.
    #[serde(default)]
    pub description: Option<String>,
    /// Review stages, numbered 1..=n.
    pub stages: Vec<StageDefinition>,
    /// Strategy folding closed-stage outcomes into the overall outcome.
    pub overall_strategy: OutcomeStrategy,
    /// What happens after the last stage.
    #[serde(default)]
    pub remediation: RemediationDefinition,
    /// Responses reviewers may give; empty means all.
    #[serde(default)]
    pub available_responses: BTreeSet<CertificationResponse>,
    /// Which access grants become cases.
    #[serde(default)]
    pub scope: GrantScope,
}

impl CampaignDefinition {
    /// Check structural validity.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(CertificationError::DefinitionInvalid(
                "campaign name must not be empty".to_string(),
            ));
        }
        if self.stages.is_empty() {
            return Err(CertificationError::DefinitionInvalid(
                "campaign must define at least one stage".to_string(),
            ));
        }

        for (index, stage) in self.stages.iter().enumerate() {
            let expected = u32::try_from(index + 1).map_err(|_| {
                CertificationError::DefinitionInvalid("too many stages".to_string())
            })?;
            if stage.number != expected {
                return Err(CertificationError::DefinitionInvalid(format!(
                    "stage numbers must be contiguous from 1: expected {expected}, found {}",
                    stage.number
                )));
            }
        }

        if self.remediation.revoke_on.is_empty() {
            return Err(CertificationError::DefinitionInvalid(
                "remediation must trigger on at least one outcome".to_string(),
            ));
        }

        Ok(())
    }

    /// Number of the last stage.
    #[must_use]
    pub fn last_stage_number(&self) -> u32 {
        self.stages.last().map_or(0, |s| s.number)
    }

    /// Look up a stage by number.
    #[must_use]
    pub fn stage(&self, number: u32) -> Option<&StageDefinition> {
        self.stages.iter().find(|s| s.number == number)
    }

    /// Whether reviewers may give this response.
    #[must_use]
    pub fn allows_response(&self, response: CertificationResponse) -> bool {
        self.available_responses.is_empty() || self.available_responses.contains(&response)
    }
}

/// One sequential review stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageDefinition {
    /// 1-based stage number.
    pub number: u32,
    /// Stage display name.
    pub name: String,
    /// Strategy folding reviewer responses into the stage outcome.
    pub outcome_strategy: OutcomeStrategy,
    /// Stage outcome of a case that got no reviewers.
    #[serde(default)]
    pub outcome_if_no_reviewers: CertificationResponse,
    /// Explicit stop set; overrides everything else.
    #[serde(default)]
    pub stop_review_on: Option<BTreeSet<CertificationResponse>>,
    /// Outcomes that let a case advance; the rest stop it.
    #[serde(default)]
    pub advance_to_next_stage_on: Option<BTreeSet<CertificationResponse>>,
    /// Reviewer selection.
    #[serde(default)]
    pub reviewers: ReviewerSpec,
}

impl StageDefinition {
    /// Create a stage using the strategy's default stop set and no reviewers.
    #[must_use]
    pub fn new(number: u32, name: impl Into<String>, outcome_strategy: OutcomeStrategy) -> Self {
        Self {
            number,
            name: name.into(),
            outcome_strategy,
            outcome_if_no_reviewers: CertificationResponse::NoResponse,
            stop_review_on: None,
            advance_to_next_stage_on: None,
            reviewers: ReviewerSpec::default(),
        }
    }

    /// Stage outcomes that freeze a case at this stage.
    #[must_use]
    pub fn effective_stop_on(&self) -> BTreeSet<CertificationResponse> {
        if let Some(stop) = &self.stop_review_on {
            return stop.clone();
        }
        if let Some(advance) = &self.advance_to_next_stage_on {
            return CertificationResponse::ALL
                .into_iter()
                .filter(|r| !advance.contains(r))
                .collect();
        }
        self.outcome_strategy.outcomes_to_stop_on()
    }
}

/// How reviewers are selected for a case at a stage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewerSpec {
    /// Owner of the reviewed target.
    #[serde(default)]
    pub use_target_owner: bool,
    /// Manager of the reviewed subject.
    #[serde(default)]
    pub use_subject_manager: bool,
    /// Fixed reviewers added to every case.
    #[serde(default)]
    pub additional_reviewers: Vec<Uuid>,
    /// Used when nothing else resolves.
    #[serde(default)]
    pub default_reviewers: Vec<Uuid>,
}

/// Remediation behaviour after the last stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemediationDefinition {
    /// Overall outcomes that trigger remediation.
    pub revoke_on: HashSet<CertificationResponse>,
    /// Whether removals are executed.
    pub style: RemediationStyle,
}

impl Default for RemediationDefinition {
    fn default() -> Self {
        Self {
            revoke_on: HashSet::from([CertificationResponse::Revoke]),
            style: RemediationStyle::Automated,
        }
    }
}

impl RemediationDefinition {
    /// Whether an overall outcome triggers remediation.
    #[must_use]
    pub fn is_revoke(&self, outcome: CertificationResponse) -> bool {
        self.revoke_on.contains(&outcome)
    }
}

/// Remediation execution style.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemediationStyle {
    /// Remove the access grant through the remediation executor.
    #[default]
    Automated,
    /// Only report; the campaign closes without removing anything.
    ReportOnly,
}
