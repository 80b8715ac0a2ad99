//! Certification campaign service.
//!
//! Drives the campaign lifecycle:
//!
//! ```text
//! CREATED -> IN_REVIEW_STAGE(n) -> REVIEW_STAGE_DONE(n) -> ... -> IN_REMEDIATION -> CLOSED
//!    ^                                                                               |
//!    +------------------------------- reiterate ------------------------------------+
//! ```
//!
//! Every transition loads the campaign under its exclusive lock, stages all
//! changes in memory and commits campaign and cases in one store call, so a
//! failed transition leaves nothing behind. Decisions take the campaign lock
//! shared and the case lock exclusively. While remediation actions run the
//! lock is free; the IN_REMEDIATION state alone keeps other transitions out.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::audit::{AuditStore, CertificationAuditAction, CertificationAuditEventInput};
use crate::config::EngineConfig;
use crate::definition::{CampaignDefinition, RemediationStyle, StageDefinition};
use crate::error::{CertificationError, Result};
use crate::events::{CertificationEvent, NoopNotificationSink, NotificationSink};
use crate::model::{Campaign, CertificationCase, Decision, StageRecord, WorkItem, WorkItemState};
use crate::outcome::CaseOutcomeComputer;
use crate::result::{OperationResult, OperationStatus};
use crate::services::grants::{AccessGrant, AccessGrantSource};
use crate::services::locks::CampaignLocks;
use crate::services::remediation::{run_remediation_pool, RemediationExecutor, RemediationHandle};
use crate::services::reviewer::ReviewerResolver;
use crate::services::store::{CaseFilter, CertificationStore};
use crate::statistics::{CampaignStatistics, StatisticsAggregator};
use crate::types::{CampaignId, CampaignState, CaseId, CertificationResponse};

// ============================================================================
// Inputs
// ============================================================================

/// Input for creating a campaign.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCampaignInput {
    /// Template to run.
    pub definition: CampaignDefinition,
    /// Who is creating the campaign.
    pub created_by: Uuid,
}

/// Input for recording a reviewer decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordDecisionInput {
    /// Reviewer deciding.
    pub reviewer_id: Uuid,
    /// Response given.
    pub response: CertificationResponse,
    /// Optional justification.
    pub comment: Option<String>,
}

// ============================================================================
// Service
// ============================================================================

/// Service driving certification campaigns.
pub struct CertificationCampaignService {
    store: Arc<dyn CertificationStore>,
    audit_store: Arc<dyn AuditStore>,
    grants: Arc<dyn AccessGrantSource>,
    reviewers: Arc<dyn ReviewerResolver>,
    remediation: Arc<dyn RemediationExecutor>,
    notifications: Arc<dyn NotificationSink>,
    locks: Arc<CampaignLocks>,
    config: EngineConfig,
}

/// Outcome of resolving reviewers for one case at one stage.
enum Resolution {
    Reviewers(BTreeSet<Uuid>),
    Failed,
}

impl CertificationCampaignService {
    /// Create a new campaign service.
    pub fn new(
        store: Arc<dyn CertificationStore>,
        audit_store: Arc<dyn AuditStore>,
        grants: Arc<dyn AccessGrantSource>,
        reviewers: Arc<dyn ReviewerResolver>,
        remediation: Arc<dyn RemediationExecutor>,
    ) -> Self {
        Self {
            store,
            audit_store,
            grants,
            reviewers,
            remediation,
            notifications: Arc::new(NoopNotificationSink),
            locks: Arc::new(CampaignLocks::new()),
            config: EngineConfig::default(),
        }
    }

    /// Publish domain events to a sink.
    #[must_use]
    pub fn with_notifications(mut self, notifications: Arc<dyn NotificationSink>) -> Self {
        self.notifications = notifications;
        self
    }

    /// Use a specific engine configuration.
    #[must_use]
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    /// Get a campaign by ID.
    pub async fn get_campaign(&self, tenant_id: Uuid, campaign_id: CampaignId) -> Result<Campaign> {
        self.store
            .get_campaign(tenant_id, campaign_id)
            .await?
            .ok_or(CertificationError::CampaignNotFound(campaign_id.into_inner()))
    }

    /// List the campaigns of a tenant.
    pub async fn list_campaigns(&self, tenant_id: Uuid) -> Result<Vec<Campaign>> {
        self.store.list_campaigns(tenant_id).await
    }

    /// Search the cases of a campaign.
    pub async fn search_cases(
        &self,
        tenant_id: Uuid,
        campaign_id: CampaignId,
        filter: CaseFilter,
    ) -> Result<Vec<CertificationCase>> {
        self.get_campaign(tenant_id, campaign_id).await?;
        self.store.search_cases(tenant_id, campaign_id, &filter).await
    }

    /// Compute campaign statistics.
    ///
    /// With `all_stages` the counts are over overall outcomes, otherwise over
    /// current stage outcomes.
    #[instrument(skip(self))]
    pub async fn get_campaign_statistics(
        &self,
        tenant_id: Uuid,
        campaign_id: CampaignId,
        all_stages: bool,
    ) -> Result<CampaignStatistics> {
        let _guard = self.locks.read(campaign_id).await;
        let campaign = self.get_campaign(tenant_id, campaign_id).await?;
        let cases = self.store.list_cases(tenant_id, campaign_id).await?;
        Ok(StatisticsAggregator::new(&campaign).compute(&cases, all_stages))
    }

    // ------------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------------

    /// Create a campaign in CREATED state with one case per access grant.
    #[instrument(skip(self, input), fields(name = %input.definition.name))]
    pub async fn create_campaign(
        &self,
        tenant_id: Uuid,
        input: CreateCampaignInput,
    ) -> Result<(Campaign, OperationResult)> {
        input.definition.validate()?;

        let grants = self.grants_in_scope(tenant_id, &input.definition).await?;

        let now = Utc::now();
        let campaign = Campaign {
            id: CampaignId::new(),
            tenant_id,
            name: input.definition.name.clone(),
            definition: input.definition,
            state: CampaignState::Created,
            stage_number: 0,
            iteration: 1,
            stages: Vec::new(),
            started_at: None,
            ended_at: None,
            created_by: input.created_by,
            created_at: now,
            updated_at: now,
        };
        let cases: Vec<_> = grants
            .into_iter()
            .map(|grant| CertificationCase::new(tenant_id, campaign.id, grant, 1))
            .collect();

        self.store.commit(&campaign, &cases).await?;

        info!(
            campaign_id = %campaign.id,
            case_count = cases.len(),
            stage_count = campaign.definition.stages.len(),
            "Created certification campaign"
        );
        self.audit(
            &campaign,
            None,
            CertificationAuditAction::CampaignCreated,
            input.created_by,
            serde_json::json!({ "case_count": cases.len() }),
        )
        .await;

        let result = OperationResult::new("create_campaign")
            .with_message(format!("Created campaign with {} cases", cases.len()));
        Ok((campaign, result))
    }

    /// Open the next review stage that produces at least one work item.
    ///
    /// Stages for which no case gets a reviewer are skipped. If every
    /// remaining stage is empty the campaign moves straight to
    /// REVIEW_STAGE_DONE at the last stage.
    #[instrument(skip(self))]
    pub async fn open_next_stage(
        &self,
        tenant_id: Uuid,
        campaign_id: CampaignId,
        actor_id: Uuid,
    ) -> Result<(Campaign, OperationResult)> {
        let _guard = self.locks.write(campaign_id).await;
        let mut campaign = self.get_campaign(tenant_id, campaign_id).await?;
        require_state(
            &campaign,
            &[CampaignState::Created, CampaignState::ReviewStageDone],
            "open next stage of",
        )?;
        let last_stage = campaign.definition.last_stage_number();
        if campaign.stage_number >= last_stage {
            return Err(CertificationError::NoMoreStages(campaign_id.into_inner()));
        }

        let iteration = campaign.iteration;
        let mut cases: Vec<_> = self
            .store
            .list_cases(tenant_id, campaign_id)
            .await?
            .into_iter()
            .filter(|c| c.is_active_in(iteration) && !c.review_stopped)
            .collect();
        let mut result = OperationResult::new("open_next_stage");

        for number in (campaign.stage_number + 1)..=last_stage {
            let stage = stage_definition(&campaign.definition, number)?.clone();
            let (resolutions, failures) = self.resolve_stage(tenant_id, &cases, &stage).await?;

            let work_item_count: usize = resolutions
                .iter()
                .map(|r| match r {
                    Resolution::Reviewers(reviewers) => reviewers.len(),
                    Resolution::Failed => 0,
                })
                .sum();

            if work_item_count == 0 {
                info!(
                    campaign_id = %campaign_id,
                    stage_number = number,
                    iteration,
                    "Skipping stage without reviewers"
                );
                let mut skipped = OperationResult::new("skip_stage")
                    .with_message(format!("Stage {number} produced no work items"));
                for failure in failures {
                    skipped.add_subresult(failure);
                }
                result.add_subresult(skipped);
                continue;
            }

            let now = Utc::now();
            let computer = CaseOutcomeComputer::new(&campaign.definition);
            let mut reviewer_ids = BTreeSet::new();
            for (case, resolution) in cases.iter_mut().zip(resolutions) {
                case.stage_number = number;
                match resolution {
                    Resolution::Reviewers(reviewers) if !reviewers.is_empty() => {
                        for reviewer_id in &reviewers {
                            case.work_items.push(WorkItem::new(*reviewer_id, number, iteration));
                        }
                        reviewer_ids.extend(reviewers);
                        computer.refresh_current_outcome(case, &stage, iteration)?;
                    }
                    Resolution::Reviewers(_) => {
                        case.current_stage_outcome = Some(stage.outcome_if_no_reviewers);
                    }
                    Resolution::Failed => {
                        case.current_stage_outcome = Some(CertificationResponse::NoResponse);
                    }
                }
            }
            for failure in failures {
                result.add_subresult(failure);
            }

            campaign.stage_number = number;
            campaign.state = CampaignState::InReviewStage;
            campaign.stages.push(StageRecord {
                number,
                iteration,
                started_at: now,
                ended_at: None,
            });
            campaign.started_at.get_or_insert(now);
            campaign.updated_at = now;

            self.store.commit(&campaign, &cases).await?;

            info!(
                campaign_id = %campaign_id,
                stage_number = number,
                iteration,
                case_count = cases.len(),
                work_item_count,
                "Opened review stage"
            );
            self.audit(
                &campaign,
                None,
                CertificationAuditAction::StageOpened,
                actor_id,
                serde_json::json!({
                    "stage_name": stage.name,
                    "case_count": cases.len(),
                    "work_item_count": work_item_count,
                }),
            )
            .await;
            self.notifications.publish(CertificationEvent::StageOpened {
                tenant_id,
                campaign_id,
                stage_number: number,
                iteration,
                reviewer_ids: reviewer_ids.into_iter().collect(),
                work_item_count,
                opened_at: now,
            });

            let result = result.with_message(format!("Opened stage {number}")).finish();
            return Ok((campaign, result));
        }

        // Every remaining stage was empty.
        campaign.stage_number = last_stage;
        campaign.state = CampaignState::ReviewStageDone;
        campaign.updated_at = Utc::now();
        self.store.commit(&campaign, &[]).await?;

        info!(
            campaign_id = %campaign_id,
            stage_number = last_stage,
            iteration,
            "No remaining stage produced work items"
        );
        self.audit(
            &campaign,
            None,
            CertificationAuditAction::StagesSkipped,
            actor_id,
            serde_json::json!({ "skipped_to_stage": last_stage }),
        )
        .await;

        let result = result
            .with_message("No remaining stage produced work items")
            .finish();
        Ok((campaign, result))
    }

    /// Close the open stage, freezing stage outcomes into case history.
    #[instrument(skip(self))]
    pub async fn close_current_stage(
        &self,
        tenant_id: Uuid,
        campaign_id: CampaignId,
        actor_id: Uuid,
    ) -> Result<(Campaign, OperationResult)> {
        let _guard = self.locks.write(campaign_id).await;
        let mut campaign = self.get_campaign(tenant_id, campaign_id).await?;
        require_state(&campaign, &[CampaignState::InReviewStage], "close stage of")?;

        let (number, iteration) = (campaign.stage_number, campaign.iteration);
        let stage = stage_definition(&campaign.definition, number)?;
        let computer = CaseOutcomeComputer::new(&campaign.definition);
        let now = Utc::now();

        let mut cases: Vec<_> = self
            .store
            .list_cases(tenant_id, campaign_id)
            .await?
            .into_iter()
            .filter(|c| c.is_under_review(number, iteration))
            .collect();
        let mut stopped_cases = 0;
        for case in &mut cases {
            if computer.close_stage(case, stage, iteration, now)? {
                stopped_cases += 1;
            }
        }

        campaign.state = CampaignState::ReviewStageDone;
        if let Some(record) = campaign.current_stage_record_mut() {
            record.ended_at = Some(now);
        }
        campaign.updated_at = now;

        self.store.commit(&campaign, &cases).await?;

        info!(
            campaign_id = %campaign_id,
            stage_number = number,
            iteration,
            reviewed_cases = cases.len(),
            stopped_cases,
            "Closed review stage"
        );
        self.audit(
            &campaign,
            None,
            CertificationAuditAction::StageClosed,
            actor_id,
            serde_json::json!({
                "reviewed_cases": cases.len(),
                "stopped_cases": stopped_cases,
            }),
        )
        .await;
        self.notifications.publish(CertificationEvent::StageClosed {
            tenant_id,
            campaign_id,
            stage_number: number,
            iteration,
            stopped_cases,
            closed_at: now,
        });

        let result = OperationResult::new("close_current_stage").with_message(format!(
            "Closed stage {number}; {stopped_cases} cases stopped"
        ));
        Ok((campaign, result))
    }

    /// Record (or replace) a reviewer's decision on a case.
    #[instrument(skip(self, input), fields(reviewer_id = %input.reviewer_id, response = %input.response))]
    pub async fn record_decision(
        &self,
        tenant_id: Uuid,
        campaign_id: CampaignId,
        case_id: CaseId,
        input: RecordDecisionInput,
    ) -> Result<(CertificationCase, OperationResult)> {
        let _campaign_guard = self.locks.read(campaign_id).await;
        let campaign = self.get_campaign(tenant_id, campaign_id).await?;
        require_state(&campaign, &[CampaignState::InReviewStage], "record decision in")?;
        if !campaign.definition.allows_response(input.response) {
            return Err(CertificationError::ResponseNotAllowed(input.response));
        }

        let _case_guard = self.locks.case(case_id).await;
        let mut case = self.get_case(tenant_id, campaign_id, case_id).await?;
        let (number, iteration) = (campaign.stage_number, campaign.iteration);
        let stage = stage_definition(&campaign.definition, number)?;

        let work_item_not_found = || CertificationError::WorkItemNotFound {
            case_id: case_id.into_inner(),
            reviewer_id: input.reviewer_id,
        };
        if !case.is_under_review(number, iteration) {
            return Err(work_item_not_found());
        }
        let item = case
            .work_item_mut(input.reviewer_id, number, iteration)
            .ok_or_else(work_item_not_found)?;
        let escalated = item.escalated;
        item.state = WorkItemState::Decided(Decision {
            response: input.response,
            comment: input.comment.clone(),
            decided_at: Utc::now(),
            decided_by: input.reviewer_id,
            escalated,
        });

        let outcome = CaseOutcomeComputer::new(&campaign.definition)
            .refresh_current_outcome(&mut case, stage, iteration)?;
        self.store.save_case(&case).await?;

        debug!(
            campaign_id = %campaign_id,
            case_id = %case_id,
            current_stage_outcome = %outcome,
            "Recorded decision"
        );
        self.audit(
            &campaign,
            Some(case_id),
            CertificationAuditAction::DecisionRecorded,
            input.reviewer_id,
            serde_json::json!({
                "response": input.response,
                "comment": input.comment,
                "current_stage_outcome": outcome,
            }),
        )
        .await;
        self.notifications.publish(CertificationEvent::DecisionRecorded {
            tenant_id,
            campaign_id,
            case_id,
            reviewer_id: input.reviewer_id,
            response: input.response,
            current_stage_outcome: outcome,
        });

        Ok((case, OperationResult::new("record_decision")))
    }

    /// Hand a pending work item over to another reviewer.
    #[instrument(skip(self))]
    pub async fn escalate_work_item(
        &self,
        tenant_id: Uuid,
        campaign_id: CampaignId,
        case_id: CaseId,
        from_reviewer_id: Uuid,
        to_reviewer_id: Uuid,
    ) -> Result<(CertificationCase, OperationResult)> {
        let _campaign_guard = self.locks.read(campaign_id).await;
        let campaign = self.get_campaign(tenant_id, campaign_id).await?;
        require_state(&campaign, &[CampaignState::InReviewStage], "escalate work item in")?;

        let _case_guard = self.locks.case(case_id).await;
        let mut case = self.get_case(tenant_id, campaign_id, case_id).await?;
        let (number, iteration) = (campaign.stage_number, campaign.iteration);

        let pending = case.is_under_review(number, iteration)
            && case
                .work_items_for(number, iteration)
                .any(|w| w.reviewer_id == from_reviewer_id && w.state == WorkItemState::Pending);
        if !pending {
            return Err(CertificationError::WorkItemNotFound {
                case_id: case_id.into_inner(),
                reviewer_id: from_reviewer_id,
            });
        }
        if case
            .work_items_for(number, iteration)
            .any(|w| w.reviewer_id == to_reviewer_id)
        {
            return Err(CertificationError::DuplicateReviewer {
                case_id: case_id.into_inner(),
                reviewer_id: to_reviewer_id,
            });
        }

        if let Some(item) = case.work_item_mut(from_reviewer_id, number, iteration) {
            item.reviewer_id = to_reviewer_id;
            item.escalated = true;
        }
        self.store.save_case(&case).await?;

        info!(
            campaign_id = %campaign_id,
            case_id = %case_id,
            from_reviewer_id = %from_reviewer_id,
            to_reviewer_id = %to_reviewer_id,
            "Escalated work item"
        );
        self.audit(
            &campaign,
            Some(case_id),
            CertificationAuditAction::WorkItemEscalated,
            from_reviewer_id,
            serde_json::json!({ "to_reviewer_id": to_reviewer_id }),
        )
        .await;

        Ok((case, OperationResult::new("escalate_work_item")))
    }

    /// Start remediating cases whose overall outcome is revoking.
    ///
    /// Returns once remediation is scheduled. The campaign is IN_REMEDIATION
    /// until every action has reported, then CLOSED; the returned handle
    /// resolves to the final result. The campaign lock is only held while
    /// committing, so queries proceed while actions run.
    #[instrument(skip(self))]
    pub async fn start_remediation(
        &self,
        tenant_id: Uuid,
        campaign_id: CampaignId,
        actor_id: Uuid,
    ) -> Result<(RemediationHandle, OperationResult)> {
        let guard = self.locks.write(campaign_id).await;
        let mut campaign = self.get_campaign(tenant_id, campaign_id).await?;
        if campaign.state != CampaignState::ReviewStageDone || !campaign.is_at_last_stage() {
            return Err(invalid_state(&campaign, "start remediation of"));
        }

        let iteration = campaign.iteration;
        let remediation = campaign.definition.remediation.clone();
        let targets: Vec<_> = self
            .store
            .list_cases(tenant_id, campaign_id)
            .await?
            .into_iter()
            .filter(|c| {
                c.is_active_in(iteration)
                    && c.remedied_at.is_none()
                    && remediation.is_revoke(c.overall_outcome)
            })
            .collect();

        campaign.state = CampaignState::InRemediation;
        campaign.updated_at = Utc::now();
        self.store.commit(&campaign, &[]).await?;
        drop(guard);

        info!(
            campaign_id = %campaign_id,
            iteration,
            case_count = targets.len(),
            style = ?remediation.style,
            "Started remediation"
        );
        self.audit(
            &campaign,
            None,
            CertificationAuditAction::RemediationStarted,
            actor_id,
            serde_json::json!({
                "case_count": targets.len(),
                "style": remediation.style,
            }),
        )
        .await;

        let supervisor = RemediationSupervisor {
            store: self.store.clone(),
            audit_store: self.audit_store.clone(),
            notifications: self.notifications.clone(),
            executor: self.remediation.clone(),
            locks: self.locks.clone(),
            concurrency: self.config.remediation_concurrency,
            actor_id,
        };

        if targets.is_empty() || remediation.style == RemediationStyle::ReportOnly {
            let result = supervisor.finish(campaign, Vec::new()).await?;
            return Ok((RemediationHandle::Ready(result.clone()), result));
        }

        let scheduled = targets.len();
        let handle = tokio::spawn(async move { supervisor.run(campaign, targets).await });

        let result = OperationResult::new("start_remediation")
            .with_status(OperationStatus::InProgress)
            .with_message(format!("Scheduled remediation of {scheduled} cases"));
        Ok((RemediationHandle::Pending(handle), result))
    }

    /// Restart a closed campaign as a new iteration over the live grants.
    #[instrument(skip(self))]
    pub async fn reiterate_campaign(
        &self,
        tenant_id: Uuid,
        campaign_id: CampaignId,
        actor_id: Uuid,
    ) -> Result<(Campaign, OperationResult)> {
        let _guard = self.locks.write(campaign_id).await;
        let mut campaign = self.get_campaign(tenant_id, campaign_id).await?;
        require_state(&campaign, &[CampaignState::Closed], "reiterate")?;

        let grants = self.grants_in_scope(tenant_id, &campaign.definition).await?;
        let existing: HashSet<AccessGrant> = grants.iter().copied().collect();
        let previous = campaign.iteration;
        let iteration = previous + 1;

        let mut changed = Vec::new();
        let mut carried: HashSet<AccessGrant> = HashSet::new();
        let mut retired = 0;
        for mut case in self.store.list_cases(tenant_id, campaign_id).await? {
            if !case.is_active_in(previous) {
                continue;
            }
            if existing.contains(&case.grant) {
                carried.insert(case.grant);
                case.iteration = iteration;
                case.stage_number = 0;
                case.current_stage_outcome = None;
                case.overall_outcome = CertificationResponse::NoResponse;
                case.review_stopped = false;
                case.stopped_at_stage = None;
                case.remedied_at = None;
                case.remediation_error = None;
            } else {
                case.live = false;
                retired += 1;
            }
            changed.push(case);
        }
        let carried_forward = carried.len();

        let mut created = 0;
        for grant in grants.into_iter().filter(|g| !carried.contains(g)) {
            changed.push(CertificationCase::new(tenant_id, campaign_id, grant, iteration));
            created += 1;
        }

        campaign.iteration = iteration;
        campaign.stage_number = 0;
        campaign.state = CampaignState::Created;
        campaign.started_at = None;
        campaign.ended_at = None;
        campaign.updated_at = Utc::now();

        self.store.commit(&campaign, &changed).await?;

        info!(
            campaign_id = %campaign_id,
            iteration,
            carried_forward,
            created,
            retired,
            "Reiterated campaign"
        );
        self.audit(
            &campaign,
            None,
            CertificationAuditAction::CampaignReiterated,
            actor_id,
            serde_json::json!({
                "carried_forward": carried_forward,
                "created": created,
                "retired": retired,
            }),
        )
        .await;
        self.notifications.publish(CertificationEvent::CampaignReiterated {
            tenant_id,
            campaign_id,
            iteration,
            carried_forward,
            created,
            retired,
        });

        let result = OperationResult::new("reiterate_campaign").with_message(format!(
            "Iteration {iteration}: {carried_forward} carried forward, {created} new, {retired} retired"
        ));
        Ok((campaign, result))
    }

    // ------------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------------

    async fn get_case(
        &self,
        tenant_id: Uuid,
        campaign_id: CampaignId,
        case_id: CaseId,
    ) -> Result<CertificationCase> {
        self.store
            .get_case(tenant_id, campaign_id, case_id)
            .await?
            .ok_or(CertificationError::CaseNotFound(case_id.into_inner()))
    }

    async fn grants_in_scope(
        &self,
        tenant_id: Uuid,
        definition: &CampaignDefinition,
    ) -> Result<Vec<AccessGrant>> {
        let grants = self.grants.list_grants(tenant_id, &definition.scope).await?;
        if grants.len() > self.config.max_cases_per_campaign {
            return Err(CertificationError::DefinitionInvalid(format!(
                "grant population of {} exceeds the limit of {} cases",
                grants.len(),
                self.config.max_cases_per_campaign
            )));
        }
        Ok(grants)
    }

    /// Resolve reviewers for every case, in case order. Per-case failures
    /// come back as sub-results; anything else aborts.
    async fn resolve_stage(
        &self,
        tenant_id: Uuid,
        cases: &[CertificationCase],
        stage: &StageDefinition,
    ) -> Result<(Vec<Resolution>, Vec<OperationResult>)> {
        let mut resolutions = Vec::with_capacity(cases.len());
        let mut failures = Vec::new();
        for case in cases {
            match self.reviewers.resolve_reviewers(tenant_id, case, stage).await {
                Ok(reviewers) => resolutions.push(Resolution::Reviewers(reviewers)),
                Err(e) if e.is_per_case() => {
                    warn!(
                        case_id = %case.id,
                        stage_number = stage.number,
                        error = %e,
                        "Reviewer resolution failed"
                    );
                    failures.push(
                        OperationResult::partial("resolve_reviewers", &e)
                            .with_message(format!("Case {}: {e}", case.id)),
                    );
                    resolutions.push(Resolution::Failed);
                }
                Err(e) => return Err(e),
            }
        }
        Ok((resolutions, failures))
    }

    async fn audit(
        &self,
        campaign: &Campaign,
        case_id: Option<CaseId>,
        action: CertificationAuditAction,
        actor_id: Uuid,
        details: serde_json::Value,
    ) {
        log_audit(
            self.audit_store.as_ref(),
            campaign,
            case_id,
            action,
            actor_id,
            details,
        )
        .await;
    }
}

// ============================================================================
// Remediation supervisor
// ============================================================================

/// Background task running a campaign's remediation actions and closing it.
struct RemediationSupervisor {
    store: Arc<dyn CertificationStore>,
    audit_store: Arc<dyn AuditStore>,
    notifications: Arc<dyn NotificationSink>,
    executor: Arc<dyn RemediationExecutor>,
    locks: Arc<CampaignLocks>,
    concurrency: usize,
    actor_id: Uuid,
}

impl RemediationSupervisor {
    async fn run(
        self,
        campaign: Campaign,
        targets: Vec<CertificationCase>,
    ) -> OperationResult {
        let campaign_id = campaign.id;
        let results = run_remediation_pool(
            self.executor.clone(),
            campaign.tenant_id,
            targets.clone(),
            self.concurrency,
        )
        .await;

        let now = Utc::now();
        let outcomes = targets
            .into_iter()
            .zip(results)
            .map(|(mut case, (_, outcome))| {
                match &outcome {
                    Ok(()) => {
                        case.remedied_at = Some(now);
                        case.remediation_error = None;
                    }
                    Err(e) => case.remediation_error = Some(e.to_string()),
                }
                (case, outcome)
            })
            .collect();

        match self.finish(campaign, outcomes).await {
            Ok(result) => result,
            Err(e) => {
                error!(campaign_id = %campaign_id, error = %e, "Failed to close campaign after remediation");
                OperationResult::fatal("remediation", &e)
            }
        }
    }

    /// Commit remediation outcomes and close the campaign.
    async fn finish(
        &self,
        mut campaign: Campaign,
        outcomes: Vec<(CertificationCase, Result<()>)>,
    ) -> Result<OperationResult> {
        let now = Utc::now();
        campaign.state = CampaignState::Closed;
        campaign.ended_at = Some(now);
        campaign.updated_at = now;

        let cases: Vec<_> = outcomes.iter().map(|(case, _)| case.clone()).collect();
        let guard = self.locks.write(campaign.id).await;
        self.store.commit(&campaign, &cases).await?;
        drop(guard);

        let mut result = OperationResult::new("remediation");
        let mut remedied = 0;
        let mut failed = 0;
        for (case, outcome) in &outcomes {
            let (action, subresult) = match outcome {
                Ok(()) => {
                    remedied += 1;
                    (
                        CertificationAuditAction::CaseRemedied,
                        OperationResult::new("remediate_case")
                            .with_message(format!("Case {} remedied", case.id)),
                    )
                }
                Err(e) => {
                    failed += 1;
                    (
                        CertificationAuditAction::RemediationFailed,
                        OperationResult::partial("remediate_case", e),
                    )
                }
            };
            result.add_subresult(subresult);
            log_audit(
                self.audit_store.as_ref(),
                &campaign,
                Some(case.id),
                action,
                self.actor_id,
                serde_json::json!({ "error": case.remediation_error }),
            )
            .await;
        }
        let result = result
            .with_message(format!("{remedied} cases remedied, {failed} failed"))
            .finish();

        info!(
            campaign_id = %campaign.id,
            iteration = campaign.iteration,
            remedied,
            failed,
            "Closed campaign"
        );
        log_audit(
            self.audit_store.as_ref(),
            &campaign,
            None,
            CertificationAuditAction::CampaignClosed,
            self.actor_id,
            serde_json::json!({ "remedied": remedied, "failed": failed }),
        )
        .await;
        self.notifications
            .publish(CertificationEvent::RemediationCompleted {
                tenant_id: campaign.tenant_id,
                campaign_id: campaign.id,
                remedied,
                failed,
                status: result.status,
                completed_at: now,
            });

        Ok(result)
    }
}

// ============================================================================
// Free helpers
// ============================================================================

/// Write an audit event for a committed transition. Failures are logged only.
async fn log_audit(
    audit_store: &dyn AuditStore,
    campaign: &Campaign,
    case_id: Option<CaseId>,
    action: CertificationAuditAction,
    actor_id: Uuid,
    details: serde_json::Value,
) {
    let input = CertificationAuditEventInput {
        tenant_id: campaign.tenant_id,
        campaign_id: campaign.id,
        case_id,
        action,
        actor_id,
        stage_number: campaign.stage_number,
        iteration: campaign.iteration,
        details: Some(details),
    };
    if let Err(e) = audit_store.log_event(input).await {
        warn!(campaign_id = %campaign.id, action = %action, error = %e, "Failed to log audit event");
    }
}

fn invalid_state(campaign: &Campaign, operation: &'static str) -> CertificationError {
    CertificationError::InvalidState {
        operation,
        state: campaign.state,
        stage_number: campaign.stage_number,
    }
}

fn require_state(
    campaign: &Campaign,
    allowed: &[CampaignState],
    operation: &'static str,
) -> Result<()> {
    if allowed.contains(&campaign.state) {
        Ok(())
    } else {
        Err(invalid_state(campaign, operation))
    }
}

fn stage_definition(definition: &CampaignDefinition, number: u32) -> Result<&StageDefinition> {
    definition.stage(number).ok_or_else(|| {
        CertificationError::DefinitionInvalid(format!("stage {number} is not defined"))
    })
}
