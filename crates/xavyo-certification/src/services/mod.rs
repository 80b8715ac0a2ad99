//! Service layer for certification campaigns.
//!
//! [`CertificationCampaignService`] drives the campaign lifecycle. The other
//! modules define the seams it depends on: where grants come from, who
//! reviews a case, how revoking outcomes are applied and where campaigns
//! and cases are persisted.

pub mod campaign;
pub mod grants;
pub(crate) mod locks;
pub mod remediation;
pub mod reviewer;
pub mod store;

pub use campaign::{CertificationCampaignService, CreateCampaignInput, RecordDecisionInput};
pub use grants::{AccessGrant, AccessGrantSource, GrantScope, InMemoryAccessGrantSource};
pub use remediation::{GrantRemovalExecutor, RemediationExecutor, RemediationHandle};
pub use reviewer::{DirectoryReviewerResolver, ReviewerResolver};
pub use store::{CaseFilter, CertificationStore, InMemoryCertificationStore};
