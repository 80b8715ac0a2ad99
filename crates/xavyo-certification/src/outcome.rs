//! Per-case outcome computation.
//!
//! [`CaseOutcomeComputer`] turns work-item responses into the current stage
//! outcome and folds the closed-stage trail into the overall outcome. It only
//! mutates the case it is handed; committing the result is up to the caller.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::definition::{CampaignDefinition, StageDefinition};
use crate::error::Result;
use crate::model::{Campaign, CertificationCase, HistoricOutcome, WorkItemState};
use crate::strategy::ResponsesSummary;
use crate::types::{CampaignState, CertificationResponse};

/// Computes stage and overall outcomes for the cases of one campaign.
#[derive(Debug, Clone, Copy)]
pub struct CaseOutcomeComputer<'a> {
    definition: &'a CampaignDefinition,
}

impl<'a> CaseOutcomeComputer<'a> {
    /// Create a computer for a campaign definition.
    #[must_use]
    pub fn new(definition: &'a CampaignDefinition) -> Self {
        Self { definition }
    }

    /// Stage outcome for a summary of current-stage responses.
    ///
    /// An empty summary means the case got no reviewers and yields the
    /// stage's `outcome_if_no_reviewers`.
    pub fn stage_outcome(
        &self,
        stage: &StageDefinition,
        summary: &ResponsesSummary,
    ) -> Result<CertificationResponse> {
        if summary.is_empty() {
            return Ok(stage.outcome_if_no_reviewers);
        }
        stage.outcome_strategy.compute_outcome(summary)
    }

    /// Overall outcome from the case's trail in one iteration.
    #[must_use]
    pub fn overall_outcome(&self, case: &CertificationCase, iteration: u32) -> CertificationResponse {
        let summary: ResponsesSummary = case.trail(iteration).collect();
        self.definition.overall_strategy.compute_overall_outcome(&summary)
    }

    /// Recompute `current_stage_outcome` from the case's work items.
    ///
    /// Cases without work items at the stage keep the outcome assigned when
    /// the stage opened.
    pub fn refresh_current_outcome(
        &self,
        case: &mut CertificationCase,
        stage: &StageDefinition,
        iteration: u32,
    ) -> Result<CertificationResponse> {
        let summary: ResponsesSummary = case
            .work_items_for(stage.number, iteration)
            .map(crate::model::WorkItem::response)
            .collect();

        let outcome = if summary.is_empty() {
            CertificationResponse::normalize(case.current_stage_outcome)
        } else {
            self.stage_outcome(stage, &summary)?
        };

        debug!(
            case_id = %case.id,
            stage_number = stage.number,
            outcome = %outcome,
            "Recomputed current stage outcome"
        );
        case.current_stage_outcome = Some(outcome);
        Ok(outcome)
    }

    /// Close the stage for a case under review.
    ///
    /// Pending work items become defaulted, the stage outcome is appended to
    /// the trail, the overall outcome is recomputed and the case is frozen if
    /// the outcome is in the stage's stop set. Returns whether it froze.
    pub fn close_stage(
        &self,
        case: &mut CertificationCase,
        stage: &StageDefinition,
        iteration: u32,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        for item in case
            .work_items
            .iter_mut()
            .filter(|w| w.stage_number == stage.number && w.iteration == iteration)
        {
            if item.state == WorkItemState::Pending {
                item.state = WorkItemState::Defaulted;
            }
            item.closed_at.get_or_insert(now);
        }

        let outcome = self.refresh_current_outcome(case, stage, iteration)?;
        case.historic_outcomes.push(HistoricOutcome {
            stage_number: stage.number,
            iteration,
            outcome,
        });
        case.overall_outcome = self.overall_outcome(case, iteration);

        let stop = stage.effective_stop_on().contains(&outcome);
        if stop {
            case.review_stopped = true;
            case.stopped_at_stage = Some(stage.number);
        }
        debug!(
            case_id = %case.id,
            stage_number = stage.number,
            outcome = %outcome,
            overall = %case.overall_outcome,
            stopped = stop,
            "Closed stage for case"
        );
        Ok(stop)
    }

    /// Overall outcome the case would have if the open stage closed now.
    #[must_use]
    pub fn projected_overall_outcome(
        &self,
        case: &CertificationCase,
        campaign: &Campaign,
    ) -> CertificationResponse {
        let reviewing = campaign.state == CampaignState::InReviewStage
            && case.is_under_review(campaign.stage_number, campaign.iteration);
        if !reviewing {
            return case.overall_outcome;
        }

        let mut summary: ResponsesSummary = case.trail(campaign.iteration).collect();
        summary.add_optional(case.current_stage_outcome);
        self.definition.overall_strategy.compute_overall_outcome(&summary)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use chrono::Utc;
    use uuid::Uuid;

    use super::*;
    use crate::definition::RemediationDefinition;
    use crate::model::{Decision, WorkItem};
    use crate::services::grants::{AccessGrant, GrantScope};
    use crate::strategy::OutcomeStrategy;
    use crate::types::CampaignId;
    use CertificationResponse::{Accept, NoResponse, NotDecided, Revoke};

    fn definition() -> CampaignDefinition {
        let mut first = StageDefinition::new(1, "first", OutcomeStrategy::OneAcceptAccepts);
        first.outcome_if_no_reviewers = Accept;
        CampaignDefinition {
            name: "test".to_string(),
            description: None,
            stages: vec![
                first,
                StageDefinition::new(2, "second", OutcomeStrategy::OneDenyDenies),
            ],
            overall_strategy: OutcomeStrategy::AllMustAccept,
            remediation: RemediationDefinition::default(),
            available_responses: BTreeSet::new(),
            scope: GrantScope::default(),
        }
    }

    fn case_at(stage: u32) -> CertificationCase {
        let mut case = CertificationCase::new(
            Uuid::new_v4(),
            CampaignId::new(),
            AccessGrant::new(Uuid::new_v4(), Uuid::new_v4()),
            1,
        );
        case.stage_number = stage;
        case
    }

    fn decide(item: &mut WorkItem, response: CertificationResponse) {
        item.state = WorkItemState::Decided(Decision {
            response,
            comment: None,
            decided_at: Utc::now(),
            decided_by: item.reviewer_id,
            escalated: false,
        });
    }

    #[test]
    fn test_stage_outcome_without_reviewers_uses_default() {
        let def = definition();
        let computer = CaseOutcomeComputer::new(&def);
        let outcome = computer
            .stage_outcome(&def.stages[0], &ResponsesSummary::new())
            .unwrap();
        assert_eq!(outcome, Accept);
    }

    #[test]
    fn test_close_stage_defaults_pending_and_appends_trail() {
        let def = definition();
        let computer = CaseOutcomeComputer::new(&def);
        let mut case = case_at(2);
        case.historic_outcomes.push(HistoricOutcome {
            stage_number: 1,
            iteration: 1,
            outcome: Accept,
        });
        case.work_items.push(WorkItem::new(Uuid::new_v4(), 2, 1));
        let mut decided = WorkItem::new(Uuid::new_v4(), 2, 1);
        decide(&mut decided, Accept);
        case.work_items.push(decided);

        let stopped = computer
            .close_stage(&mut case, &def.stages[1], 1, Utc::now())
            .unwrap();

        assert!(!stopped);
        assert_eq!(case.work_items[0].state, WorkItemState::Defaulted);
        assert!(case.work_items.iter().all(|w| w.closed_at.is_some()));
        assert_eq!(case.current_stage_outcome, Some(Accept));
        assert_eq!(case.historic_outcomes.len(), 2);
        assert_eq!(case.overall_outcome, Accept);
    }

    #[test]
    fn test_close_stage_freezes_on_stop_outcome() {
        let def = definition();
        let computer = CaseOutcomeComputer::new(&def);
        let mut case = case_at(2);
        let mut item = WorkItem::new(Uuid::new_v4(), 2, 1);
        decide(&mut item, NotDecided);
        case.work_items.push(item);

        let stopped = computer
            .close_stage(&mut case, &def.stages[1], 1, Utc::now())
            .unwrap();

        assert!(stopped);
        assert!(case.review_stopped);
        assert_eq!(case.stopped_at_stage, Some(2));
        assert_eq!(case.overall_outcome, NotDecided);
    }

    #[test]
    fn test_overall_outcome_is_recomputed_from_trail() {
        let def = definition();
        let computer = CaseOutcomeComputer::new(&def);
        let mut case = case_at(1);
        case.historic_outcomes = vec![
            HistoricOutcome {
                stage_number: 1,
                iteration: 1,
                outcome: Revoke,
            },
            HistoricOutcome {
                stage_number: 1,
                iteration: 2,
                outcome: Accept,
            },
        ];
        assert_eq!(computer.overall_outcome(&case, 1), Revoke);
        assert_eq!(computer.overall_outcome(&case, 2), Accept);
        assert_eq!(computer.overall_outcome(&case, 3), NoResponse);
    }
}
