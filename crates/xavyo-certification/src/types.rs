//! Type definitions for the certification domain.
//!
//! Includes newtype wrappers for IDs and enums for domain values.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::{CertificationError, Result};

// ============================================================================
// ID Types (Newtype Pattern)
// ============================================================================

/// Unique identifier for a certification campaign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CampaignId(pub Uuid);

impl CampaignId {
    /// Create a new random `CampaignId`.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the inner UUID.
    pub fn into_inner(self) -> Uuid {
        self.0
    }
}

impl Default for CampaignId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CampaignId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for CampaignId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl From<CampaignId> for Uuid {
    fn from(id: CampaignId) -> Self {
        id.0
    }
}

/// Unique identifier for a certification case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CaseId(pub Uuid);

impl CaseId {
    /// Create a new random `CaseId`.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the inner UUID.
    pub fn into_inner(self) -> Uuid {
        self.0
    }
}

impl Default for CaseId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for CaseId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl From<CaseId> for Uuid {
    fn from(id: CaseId) -> Self {
        id.0
    }
}

/// Unique identifier for a reviewer work item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkItemId(pub Uuid);

impl WorkItemId {
    /// Create a new random `WorkItemId`.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for WorkItemId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for WorkItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Enums
// ============================================================================

const OUTCOME_URI_PREFIX: &str = "urn:xavyo:certification:outcome:";

/// A reviewer response, also used as stage and overall outcome.
///
/// Declaration order is the severity order used when sorting sets of
/// responses; aggregation precedence lives in the outcome strategies.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CertificationResponse {
    /// Keep the access.
    Accept,
    /// Remove the access.
    Revoke,
    /// Keep a reduced form of the access.
    Reduce,
    /// Reviewer looked at the case but did not decide.
    NotDecided,
    /// No response was given.
    #[default]
    NoResponse,
}

impl CertificationResponse {
    /// All responses, in declaration order.
    pub const ALL: [Self; 5] = [
        Self::Accept,
        Self::Revoke,
        Self::Reduce,
        Self::NotDecided,
        Self::NoResponse,
    ];

    /// Map an optional response to a concrete one (`None` means no response).
    #[must_use]
    pub fn normalize(value: Option<Self>) -> Self {
        value.unwrap_or(Self::NoResponse)
    }

    /// Whether this response counts as an actual decision for statistics.
    #[must_use]
    pub fn is_decided(self) -> bool {
        !matches!(self, Self::NoResponse | Self::NotDecided)
    }

    /// Stable outcome URI for this response.
    #[must_use]
    pub fn as_uri(self) -> String {
        let fragment = match self {
            Self::Accept => "accept",
            Self::Revoke => "revoke",
            Self::Reduce => "reduce",
            Self::NotDecided => "notDecided",
            Self::NoResponse => "noResponse",
        };
        format!("{OUTCOME_URI_PREFIX}{fragment}")
    }

    /// Parse an outcome URI; the bare fragment (e.g. `accept`) is accepted too.
    pub fn from_uri(uri: &str) -> Result<Self> {
        let fragment = uri.strip_prefix(OUTCOME_URI_PREFIX).unwrap_or(uri);
        match fragment {
            "accept" => Ok(Self::Accept),
            "revoke" => Ok(Self::Revoke),
            "reduce" => Ok(Self::Reduce),
            "notDecided" => Ok(Self::NotDecided),
            "noResponse" => Ok(Self::NoResponse),
            _ => Err(CertificationError::DefinitionInvalid(format!(
                "Unrecognized outcome URI: {uri}"
            ))),
        }
    }
}

impl fmt::Display for CertificationResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Accept => write!(f, "ACCEPT"),
            Self::Revoke => write!(f, "REVOKE"),
            Self::Reduce => write!(f, "REDUCE"),
            Self::NotDecided => write!(f, "NOT_DECIDED"),
            Self::NoResponse => write!(f, "NO_RESPONSE"),
        }
    }
}

/// Campaign lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignState {
    /// Created (or reiterated) and not yet opened.
    #[default]
    Created,
    /// A review stage is open and accepting decisions.
    InReviewStage,
    /// The current stage was closed.
    ReviewStageDone,
    /// Remediation actions are being executed.
    InRemediation,
    /// Terminal state, retained for audit.
    Closed,
}

impl fmt::Display for CampaignState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::InReviewStage => write!(f, "in_review_stage"),
            Self::ReviewStageDone => write!(f, "review_stage_done"),
            Self::InRemediation => write!(f, "in_remediation"),
            Self::Closed => write!(f, "closed"),
        }
    }
}
