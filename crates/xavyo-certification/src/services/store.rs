//! Campaign and case storage.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{CertificationError, Result};
use crate::model::{Campaign, CertificationCase};
use crate::types::{CampaignId, CaseId, CertificationResponse};

// ============================================================================
// Filter
// ============================================================================

/// Filter for searching the cases of a campaign.
#[derive(Debug, Clone, Default)]
pub struct CaseFilter {
    /// Cases with a work item for this reviewer at their current stage.
    pub reviewer_id: Option<Uuid>,
    /// Filter by subject holding the grant.
    pub subject_id: Option<Uuid>,
    /// Filter by granted target.
    pub target_id: Option<Uuid>,
    /// Filter by current stage outcome.
    pub current_outcome: Option<CertificationResponse>,
    /// Filter by overall outcome.
    pub overall_outcome: Option<CertificationResponse>,
    /// Only cases whose grant still exists.
    pub live_only: bool,
    /// Filter by the stage the case was last reviewed in.
    pub stage_number: Option<u32>,
    /// Maximum number of results.
    pub limit: Option<usize>,
    /// Number of results to skip.
    pub offset: Option<usize>,
}

impl CaseFilter {
    /// Whether a case passes the filter (paging aside).
    #[must_use]
    pub fn matches(&self, case: &CertificationCase) -> bool {
        self.reviewer_id.is_none_or(|r| {
            case.work_items_for(case.stage_number, case.iteration)
                .any(|w| w.reviewer_id == r)
        }) && self.subject_id.is_none_or(|s| case.grant.subject_id == s)
            && self.target_id.is_none_or(|t| case.grant.target_id == t)
            && self
                .current_outcome
                .is_none_or(|o| CertificationResponse::normalize(case.current_stage_outcome) == o)
            && self.overall_outcome.is_none_or(|o| case.overall_outcome == o)
            && (!self.live_only || case.live)
            && self.stage_number.is_none_or(|n| case.stage_number == n)
    }
}

// ============================================================================
// Store Trait
// ============================================================================

/// Trait for campaign storage backends.
#[async_trait::async_trait]
pub trait CertificationStore: Send + Sync {
    /// Get a campaign by ID.
    async fn get_campaign(&self, tenant_id: Uuid, id: CampaignId) -> Result<Option<Campaign>>;

    /// List all campaigns of a tenant, oldest first.
    async fn list_campaigns(&self, tenant_id: Uuid) -> Result<Vec<Campaign>>;

    /// List all cases of a campaign in creation order.
    async fn list_cases(&self, tenant_id: Uuid, campaign_id: CampaignId)
        -> Result<Vec<CertificationCase>>;

    /// Get one case of a campaign.
    async fn get_case(
        &self,
        tenant_id: Uuid,
        campaign_id: CampaignId,
        case_id: CaseId,
    ) -> Result<Option<CertificationCase>>;

    /// Search the cases of a campaign, in creation order.
    async fn search_cases(
        &self,
        tenant_id: Uuid,
        campaign_id: CampaignId,
        filter: &CaseFilter,
    ) -> Result<Vec<CertificationCase>>;

    /// Upsert a campaign together with the given cases, atomically.
    async fn commit(&self, campaign: &Campaign, cases: &[CertificationCase]) -> Result<()>;

    /// Upsert one case of an existing campaign.
    async fn save_case(&self, case: &CertificationCase) -> Result<()>;
}

// ============================================================================
// In-Memory Store (for testing)
// ============================================================================

#[derive(Debug, Default)]
struct StoreState {
    campaigns: HashMap<CampaignId, Campaign>,
    campaign_order: Vec<CampaignId>,
    cases: HashMap<CaseId, CertificationCase>,
    case_order: HashMap<CampaignId, Vec<CaseId>>,
}

impl StoreState {
    fn upsert_case(&mut self, case: &CertificationCase) {
        if self.cases.insert(case.id, case.clone()).is_none() {
            self.case_order
                .entry(case.campaign_id)
                .or_default()
                .push(case.id);
        }
    }

    fn cases_of(&self, tenant_id: Uuid, campaign_id: CampaignId) -> impl Iterator<Item = &CertificationCase> {
        self.case_order
            .get(&campaign_id)
            .into_iter()
            .flatten()
            .filter_map(|id| self.cases.get(id))
            .filter(move |c| c.tenant_id == tenant_id)
    }
}

/// In-memory campaign store for testing.
#[derive(Debug, Default)]
pub struct InMemoryCertificationStore {
    state: Arc<RwLock<StoreState>>,
}

impl InMemoryCertificationStore {
    /// Create a new in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored cases across campaigns (for testing).
    pub async fn case_count(&self) -> usize {
        self.state.read().await.cases.len()
    }
}

#[async_trait::async_trait]
impl CertificationStore for InMemoryCertificationStore {
    async fn get_campaign(&self, tenant_id: Uuid, id: CampaignId) -> Result<Option<Campaign>> {
        let state = self.state.read().await;
        Ok(state
            .campaigns
            .get(&id)
            .filter(|c| c.tenant_id == tenant_id)
            .cloned())
    }

    async fn list_campaigns(&self, tenant_id: Uuid) -> Result<Vec<Campaign>> {
        let state = self.state.read().await;
        Ok(state
            .campaign_order
            .iter()
            .filter_map(|id| state.campaigns.get(id))
            .filter(|c| c.tenant_id == tenant_id)
            .cloned()
            .collect())
    }

    async fn list_cases(
        &self,
        tenant_id: Uuid,
        campaign_id: CampaignId,
    ) -> Result<Vec<CertificationCase>> {
        let state = self.state.read().await;
        Ok(state.cases_of(tenant_id, campaign_id).cloned().collect())
    }

    async fn get_case(
        &self,
        tenant_id: Uuid,
        campaign_id: CampaignId,
        case_id: CaseId,
    ) -> Result<Option<CertificationCase>> {
        let state = self.state.read().await;
        Ok(state
            .cases
            .get(&case_id)
            .filter(|c| c.tenant_id == tenant_id && c.campaign_id == campaign_id)
            .cloned())
    }

    async fn search_cases(
        &self,
        tenant_id: Uuid,
        campaign_id: CampaignId,
        filter: &CaseFilter,
    ) -> Result<Vec<CertificationCase>> {
        let state = self.state.read().await;
        let offset = filter.offset.unwrap_or(0);
        let limit = filter.limit.unwrap_or(usize::MAX);

        Ok(state
            .cases_of(tenant_id, campaign_id)
            .filter(|c| filter.matches(c))
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn commit(&self, campaign: &Campaign, cases: &[CertificationCase]) -> Result<()> {
        if let Some(case) = cases
            .iter()
            .find(|c| c.campaign_id != campaign.id || c.tenant_id != campaign.tenant_id)
        {
            return Err(CertificationError::Store(format!(
                "case {} does not belong to campaign {}",
                case.id, campaign.id
            )));
        }

        let mut state = self.state.write().await;
        if state.campaigns.insert(campaign.id, campaign.clone()).is_none() {
            state.campaign_order.push(campaign.id);
        }
        for case in cases {
            state.upsert_case(case);
        }
        Ok(())
    }

    async fn save_case(&self, case: &CertificationCase) -> Result<()> {
        let mut state = self.state.write().await;
        let known = state
            .campaigns
            .get(&case.campaign_id)
            .is_some_and(|c| c.tenant_id == case.tenant_id);
        if !known {
            return Err(CertificationError::Store(format!(
                "campaign {} not found for case {}",
                case.campaign_id, case.id
            )));
        }
        state.upsert_case(case);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use chrono::Utc;

    use super::*;
    use crate::definition::{CampaignDefinition, RemediationDefinition, StageDefinition};
    use crate::model::WorkItem;
    use crate::services::grants::{AccessGrant, GrantScope};
    use crate::strategy::OutcomeStrategy;
    use crate::types::CampaignState;

    fn campaign(tenant_id: Uuid) -> Campaign {
        let now = Utc::now();
        Campaign {
            id: CampaignId::new(),
            tenant_id,
            name: "store".to_string(),
            definition: CampaignDefinition {
                name: "store".to_string(),
                description: None,
                stages: vec![StageDefinition::new(1, "s", OutcomeStrategy::OneAcceptAccepts)],
                overall_strategy: OutcomeStrategy::OneAcceptAccepts,
                remediation: RemediationDefinition::default(),
                available_responses: BTreeSet::new(),
                scope: GrantScope::default(),
            },
            state: CampaignState::Created,
            stage_number: 0,
            iteration: 1,
            stages: Vec::new(),
            started_at: None,
            ended_at: None,
            created_by: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
        }
    }

    fn case(campaign: &Campaign) -> CertificationCase {
        CertificationCase::new(
            campaign.tenant_id,
            campaign.id,
            AccessGrant::new(Uuid::new_v4(), Uuid::new_v4()),
            1,
        )
    }

    #[tokio::test]
    async fn test_commit_and_tenant_isolation() {
        let store = InMemoryCertificationStore::new();
        let tenant = Uuid::new_v4();
        let c = campaign(tenant);
        let cases = vec![case(&c), case(&c)];
        store.commit(&c, &cases).await.unwrap();

        assert!(store.get_campaign(tenant, c.id).await.unwrap().is_some());
        assert!(store
            .get_campaign(Uuid::new_v4(), c.id)
            .await
            .unwrap()
            .is_none());
        let listed = store.list_cases(tenant, c.id).await.unwrap();
        assert_eq!(
            listed.iter().map(|c| c.id).collect::<Vec<_>>(),
            cases.iter().map(|c| c.id).collect::<Vec<_>>()
        );
        assert!(store.list_cases(Uuid::new_v4(), c.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_commit_rejects_foreign_cases() {
        let store = InMemoryCertificationStore::new();
        let c = campaign(Uuid::new_v4());
        let other = campaign(c.tenant_id);
        let result = store.commit(&c, &[case(&other)]).await;
        assert!(matches!(result, Err(CertificationError::Store(_))));
        assert_eq!(store.case_count().await, 0);
    }

    #[tokio::test]
    async fn test_save_case_requires_campaign() {
        let store = InMemoryCertificationStore::new();
        let c = campaign(Uuid::new_v4());
        assert!(store.save_case(&case(&c)).await.is_err());

        store.commit(&c, &[]).await.unwrap();
        let mut k = case(&c);
        store.save_case(&k).await.unwrap();
        k.live = false;
        store.save_case(&k).await.unwrap();
        let stored = store.get_case(c.tenant_id, c.id, k.id).await.unwrap().unwrap();
        assert!(!stored.live);
        assert_eq!(store.case_count().await, 1);
    }

    #[tokio::test]
    async fn test_search_filters_and_pages() {
        let store = InMemoryCertificationStore::new();
        let c = campaign(Uuid::new_v4());
        let reviewer = Uuid::new_v4();
        let mut reviewed = case(&c);
        reviewed.stage_number = 1;
        reviewed.work_items.push(WorkItem::new(reviewer, 1, 1));
        let mut gone = case(&c);
        gone.live = false;
        let plain = case(&c);
        store
            .commit(&c, &[reviewed.clone(), gone.clone(), plain.clone()])
            .await
            .unwrap();

        let by_reviewer = store
            .search_cases(
                c.tenant_id,
                c.id,
                &CaseFilter {
                    reviewer_id: Some(reviewer),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(by_reviewer.len(), 1);
        assert_eq!(by_reviewer[0].id, reviewed.id);

        let live = store
            .search_cases(
                c.tenant_id,
                c.id,
                &CaseFilter {
                    live_only: true,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(live.len(), 2);

        let page = store
            .search_cases(
                c.tenant_id,
                c.id,
                &CaseFilter {
                    offset: Some(1),
                    limit: Some(1),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(page[0].id, gone.id);

        let by_subject = store
            .search_cases(
                c.tenant_id,
                c.id,
                &CaseFilter {
                    subject_id: Some(plain.grant.subject_id),
                    overall_outcome: Some(CertificationResponse::NoResponse),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(by_subject.len(), 1);
    }
}
