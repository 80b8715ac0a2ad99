//! Access certification campaign engine.
//!
//! Runs periodic reviews of access grants. A campaign instantiates one case
//! per grant in scope and walks the cases through ordered review stages.
//! Reviewers record responses on work items; per-stage strategies fold those
//! responses into a stage outcome, and an overall strategy folds the stage
//! trail into the case's overall outcome. Revoking outcomes are remediated
//! once the last stage closes, and closed campaigns can be reiterated over
//! the grants that still exist.
//!
//! # Features
//!
//! - Multi-stage review with stop-review and advance-on rules
//! - Closed set of outcome strategies ([`OutcomeStrategy`])
//! - Automatic skipping of stages without reviewers
//! - Reviewer escalation of pending work items
//! - Bounded, concurrent remediation with per-case error reporting
//! - Campaign reiteration with carry-forward of live cases
//! - Completion and decision statistics
//! - Audit logging and domain events for every transition
//!
//! # Services
//!
//! The [`services`] module provides:
//! - [`services::CertificationCampaignService`] - campaign lifecycle commands and queries
//! - [`services::CertificationStore`] - campaign and case persistence
//! - [`services::AccessGrantSource`] - the grant population under review
//! - [`services::ReviewerResolver`] - reviewer assignment per case and stage
//! - [`services::RemediationExecutor`] - side effects of revoking outcomes
//!
//! # Audit
//!
//! The [`audit`] module records every transition:
//! - [`audit::AuditStore`] trait for pluggable storage backends
//! - [`audit::InMemoryAuditStore`] for testing
//! - [`audit::CertificationAuditEvent`] for tracking changes

pub mod audit;
pub mod config;
pub mod definition;
pub mod error;
pub mod events;
pub mod model;
pub mod outcome;
pub mod result;
pub mod services;
pub mod statistics;
pub mod strategy;
pub mod types;

// Re-export commonly used types
pub use config::{EngineConfig, EngineConfigBuilder};
pub use definition::{
    CampaignDefinition, RemediationDefinition, RemediationStyle, ReviewerSpec, StageDefinition,
};
pub use error::{CertificationError, Result};
pub use events::{
    BroadcastNotificationSink, CertificationEvent, NoopNotificationSink, NotificationSink,
};
pub use model::{
    Campaign, CertificationCase, Decision, HistoricOutcome, StageRecord, WorkItem, WorkItemState,
};
pub use outcome::CaseOutcomeComputer;
pub use result::{OperationResult, OperationStatus};
pub use statistics::{CampaignStatistics, StatisticsAggregator};
pub use strategy::{OutcomeStrategy, ResponsesSummary};
pub use types::{CampaignId, CampaignState, CaseId, CertificationResponse, WorkItemId};

// Re-export service types
pub use services::{
    AccessGrant, AccessGrantSource, CaseFilter, CertificationCampaignService, CertificationStore,
    CreateCampaignInput, DirectoryReviewerResolver, GrantRemovalExecutor, GrantScope,
    InMemoryAccessGrantSource, InMemoryCertificationStore, RecordDecisionInput,
    RemediationExecutor, RemediationHandle, ReviewerResolver,
};
