//! Test fixtures for integration tests.
//!
//! [`CriticalRoles`] models a small company: three critical roles held by
//! five users, with ownership and reporting lines feeding reviewer
//! resolution.

use std::collections::{BTreeSet, HashMap};

use uuid::Uuid;
use xavyo_certification::definition::{
    CampaignDefinition, RemediationDefinition, ReviewerSpec, StageDefinition,
};
use xavyo_certification::services::{CreateCampaignInput, GrantScope};
use xavyo_certification::strategy::OutcomeStrategy;
use xavyo_certification::types::CertificationResponse::{Accept, NotDecided};
use xavyo_certification::AccessGrant;

use super::TestContext;

/// Users, roles and grants of the critical-roles company.
#[derive(Debug, Default)]
pub struct CriticalRoles {
    pub users: HashMap<&'static str, Uuid>,
    pub roles: HashMap<&'static str, Uuid>,
    pub grants: HashMap<&'static str, AccessGrant>,
}

impl CriticalRoles {
    /// Register users, roles, grants, owners and managers in tenant A.
    ///
    /// Grants, in creation order: elaine-ceo, guybrush-coo, admin-coo,
    /// admin-ceo, jack-ceo, jack-cto. The CEO role is owned by elaine, COO
    /// by admin and CTO by nobody; cheese manages guybrush.
    pub async fn setup(ctx: &TestContext) -> Self {
        let mut fixtures = Self::default();
        for name in ["elaine", "guybrush", "admin", "jack", "cheese"] {
            fixtures.users.insert(name, Uuid::new_v4());
        }
        for name in ["ceo", "coo", "cto"] {
            fixtures.roles.insert(name, Uuid::new_v4());
        }

        for (key, user, role) in [
            ("elaine-ceo", "elaine", "ceo"),
            ("guybrush-coo", "guybrush", "coo"),
            ("admin-coo", "admin", "coo"),
            ("admin-ceo", "admin", "ceo"),
            ("jack-ceo", "jack", "ceo"),
            ("jack-cto", "jack", "cto"),
        ] {
            let grant = ctx.grant(fixtures.user(user), fixtures.role(role)).await;
            fixtures.grants.insert(key, grant);
        }

        let directory = &ctx.stores.directory;
        directory
            .add_target_owner(ctx.tenant_a, fixtures.role("ceo"), fixtures.user("elaine"))
            .await;
        directory
            .add_target_owner(ctx.tenant_a, fixtures.role("coo"), fixtures.user("admin"))
            .await;
        directory
            .add_subject_manager(ctx.tenant_a, fixtures.user("guybrush"), fixtures.user("cheese"))
            .await;

        fixtures
    }

    pub fn user(&self, name: &str) -> Uuid {
        *self
            .users
            .get(name)
            .unwrap_or_else(|| panic!("User '{name}' not found in fixtures"))
    }

    pub fn role(&self, name: &str) -> Uuid {
        *self
            .roles
            .get(name)
            .unwrap_or_else(|| panic!("Role '{name}' not found in fixtures"))
    }

    pub fn grant(&self, key: &str) -> AccessGrant {
        *self
            .grants
            .get(key)
            .unwrap_or_else(|| panic!("Grant '{key}' not found in fixtures"))
    }

    /// Four-stage definition: managers, role owners, auditors, then a final
    /// sign-off by cheese.
    pub fn definition(&self) -> CampaignDefinition {
        let mut managers = StageDefinition::new(1, "Manager review", OutcomeStrategy::OneAcceptAccepts);
        managers.outcome_if_no_reviewers = Accept;
        managers.reviewers = ReviewerSpec {
            use_subject_manager: true,
            ..Default::default()
        };

        let mut owners = StageDefinition::new(2, "Role owner review", OutcomeStrategy::AllMustAccept);
        owners.outcome_if_no_reviewers = Accept;
        owners.advance_to_next_stage_on = Some(BTreeSet::from([Accept]));
        owners.reviewers = ReviewerSpec {
            use_target_owner: true,
            ..Default::default()
        };

        let mut auditors = StageDefinition::new(3, "Audit", OutcomeStrategy::OneDenyDenies);
        auditors.stop_review_on = Some(BTreeSet::from([NotDecided]));
        auditors.reviewers = ReviewerSpec {
            additional_reviewers: vec![self.user("elaine"), self.user("admin")],
            ..Default::default()
        };

        let mut sign_off = StageDefinition::new(4, "Sign-off", OutcomeStrategy::AllMustAccept);
        sign_off.reviewers = ReviewerSpec {
            additional_reviewers: vec![self.user("cheese")],
            ..Default::default()
        };

        CampaignDefinition {
            name: "Critical roles".to_string(),
            description: Some("Quarterly review of C-level roles".to_string()),
            stages: vec![managers, owners, auditors, sign_off],
            overall_strategy: OutcomeStrategy::AllMustAccept,
            remediation: RemediationDefinition::default(),
            available_responses: BTreeSet::new(),
            scope: GrantScope::default(),
        }
    }

    pub fn create_input(&self, created_by: Uuid) -> CreateCampaignInput {
        CreateCampaignInput {
            definition: self.definition(),
            created_by,
        }
    }
}

/// Single-stage definition reviewed by a fixed set of reviewers.
pub fn single_stage_definition(
    strategy: OutcomeStrategy,
    reviewers: Vec<Uuid>,
) -> CampaignDefinition {
    let mut stage = StageDefinition::new(1, "Review", strategy);
    stage.reviewers = ReviewerSpec {
        additional_reviewers: reviewers,
        ..Default::default()
    };
    CampaignDefinition {
        name: "Single stage".to_string(),
        description: None,
        stages: vec![stage],
        overall_strategy: strategy,
        remediation: RemediationDefinition::default(),
        available_responses: BTreeSet::new(),
        scope: GrantScope::default(),
    }
}
