//! Campaign statistics.

use serde::{Deserialize, Serialize};

use crate::model::{Campaign, CertificationCase};
use crate::outcome::CaseOutcomeComputer;
use crate::types::CertificationResponse;

/// Outcome counts and progress percentages for a campaign.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignStatistics {
    /// Whether counts are over overall outcomes rather than current-stage ones.
    pub all_stages: bool,
    /// Live cases of the current iteration.
    pub case_count: usize,
    pub accept_count: usize,
    pub revoke_count: usize,
    pub revoke_and_remedied_count: usize,
    pub reduce_count: usize,
    pub reduce_and_remedied_count: usize,
    pub not_decided_count: usize,
    pub no_response_count: usize,
    /// Cases with nothing left to decide at the current stage.
    pub percent_complete: u32,
    /// Cases whose (projected) overall outcome is a real decision.
    pub percent_decided: u32,
    /// Cases counted as ACCEPT.
    pub percent_approved: u32,
    /// Current-stage work items holding a response.
    pub percent_decisions_done: u32,
}

/// Read-only aggregation over a campaign's cases.
#[derive(Debug, Clone, Copy)]
pub struct StatisticsAggregator<'a> {
    campaign: &'a Campaign,
}

impl<'a> StatisticsAggregator<'a> {
    /// Create an aggregator for a campaign snapshot.
    #[must_use]
    pub fn new(campaign: &'a Campaign) -> Self {
        Self { campaign }
    }

    /// Compute statistics over the live cases of the current iteration.
    #[must_use]
    pub fn compute(&self, cases: &[CertificationCase], all_stages: bool) -> CampaignStatistics {
        let campaign = self.campaign;
        let computer = CaseOutcomeComputer::new(&campaign.definition);

        let mut stats = CampaignStatistics {
            all_stages,
            ..CampaignStatistics::default()
        };
        let mut complete = 0;
        let mut decided = 0;
        let mut items_total = 0;
        let mut items_done = 0;

        for case in cases.iter().filter(|c| c.is_active_in(campaign.iteration)) {
            stats.case_count += 1;

            let counted = if all_stages {
                case.overall_outcome
            } else {
                CertificationResponse::normalize(case.current_stage_outcome)
            };
            let remedied = case.remedied_at.is_some();
            match counted {
                CertificationResponse::Accept => stats.accept_count += 1,
                CertificationResponse::Revoke => {
                    stats.revoke_count += 1;
                    if remedied {
                        stats.revoke_and_remedied_count += 1;
                    }
                }
                CertificationResponse::Reduce => {
                    stats.reduce_count += 1;
                    if remedied {
                        stats.reduce_and_remedied_count += 1;
                    }
                }
                CertificationResponse::NotDecided => stats.not_decided_count += 1,
                CertificationResponse::NoResponse => stats.no_response_count += 1,
            }

            if computer.projected_overall_outcome(case, campaign).is_decided() {
                decided += 1;
            }

            if campaign.stage_number == 0 {
                continue;
            }
            if case.is_under_review(campaign.stage_number, campaign.iteration) {
                let mut all_done = true;
                for item in case.work_items_for(campaign.stage_number, campaign.iteration) {
                    items_total += 1;
                    if item.is_done() {
                        items_done += 1;
                    } else {
                        all_done = false;
                    }
                }
                if all_done {
                    complete += 1;
                }
            } else {
                complete += 1;
            }
        }

        stats.percent_complete = percentage(complete, stats.case_count);
        stats.percent_decided = percentage(decided, stats.case_count);
        stats.percent_approved = percentage(stats.accept_count, stats.case_count);
        stats.percent_decisions_done = percentage(items_done, items_total);
        stats
    }
}

/// Integer percentage rounded half up; 0 when `whole` is 0.
#[must_use]
pub fn percentage(part: usize, whole: usize) -> u32 {
    if whole == 0 {
        return 0;
    }
    let rounded = (200 * part + whole) / (2 * whole);
    u32::try_from(rounded).unwrap_or(u32::MAX)
}
