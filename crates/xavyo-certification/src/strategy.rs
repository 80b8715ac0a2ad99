//! Outcome strategies.
//!
//! A strategy folds the responses given for one case (at one stage, or
//! across all closed stages) into a single outcome. Strategies form a closed
//! set selected by the campaign definition; each is a pure function of a
//! [`ResponsesSummary`], so the result never depends on the order in which
//! responses were recorded.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{CertificationError, Result};
use crate::types::CertificationResponse;

use CertificationResponse::{Accept, NoResponse, NotDecided, Reduce, Revoke};

/// Tally of responses for a single case.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResponsesSummary {
    counts: [usize; 5],
}

impl ResponsesSummary {
    /// Create an empty summary.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(response: CertificationResponse) -> usize {
        match response {
            Accept => 0,
            Revoke => 1,
            Reduce => 2,
            NotDecided => 3,
            NoResponse => 4,
        }
    }

    /// Add one response.
    pub fn add(&mut self, response: CertificationResponse) {
        self.counts[Self::slot(response)] += 1;
    }

    /// Add an optional response, counting `None` as no response.
    pub fn add_optional(&mut self, response: Option<CertificationResponse>) {
        self.add(CertificationResponse::normalize(response));
    }

    /// Whether at least one response of the given kind is present.
    #[must_use]
    pub fn has(&self, response: CertificationResponse) -> bool {
        self.count(response) > 0
    }

    /// Number of responses of the given kind.
    #[must_use]
    pub fn count(&self, response: CertificationResponse) -> usize {
        self.counts[Self::slot(response)]
    }

    /// Total number of responses.
    #[must_use]
    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }

    /// Whether no response at all was added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

impl FromIterator<CertificationResponse> for ResponsesSummary {
    fn from_iter<I: IntoIterator<Item = CertificationResponse>>(iter: I) -> Self {
        let mut summary = Self::new();
        for response in iter {
            summary.add(response);
        }
        summary
    }
}

/// Outcome computation strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStrategy {
    /// A single ACCEPT is enough to accept.
    OneAcceptAccepts,
    /// Every response must be ACCEPT; anything else dominates.
    AllMustAccept,
    /// A single negative response decides.
    OneDenyDenies,
    /// ACCEPT unless somebody revoked or reduced.
    AcceptedIfNotDenied,
}

impl OutcomeStrategy {
    /// Compute the outcome for a non-empty summary.
    ///
    /// Every strategy fails with [`CertificationError::NoResponses`] on an
    /// empty summary. Stage callers substitute the stage's
    /// `outcome_if_no_reviewers` before getting here; overall callers go
    /// through [`OutcomeStrategy::compute_overall_outcome`].
    pub fn compute_outcome(self, summary: &ResponsesSummary) -> Result<CertificationResponse> {
        if summary.is_empty() {
            return Err(CertificationError::NoResponses(self));
        }

        let outcome = match self {
            Self::OneAcceptAccepts => first_present(summary, &[Accept, Revoke, Reduce, NotDecided])
                .unwrap_or(NoResponse),
            Self::AllMustAccept => {
                first_present(summary, &[Revoke, Reduce, NotDecided, NoResponse]).unwrap_or(Accept)
            }
            Self::OneDenyDenies => first_present(summary, &[Revoke, Reduce, NotDecided, Accept])
                .unwrap_or(NoResponse),
            Self::AcceptedIfNotDenied => first_present(summary, &[Revoke, Reduce]).unwrap_or(Accept),
        };
        Ok(outcome)
    }

    /// Compute an overall outcome from closed-stage outcomes.
    ///
    /// An empty trail yields NO_RESPONSE instead of failing.
    #[must_use]
    pub fn compute_overall_outcome(self, summary: &ResponsesSummary) -> CertificationResponse {
        self.compute_outcome(summary).unwrap_or(NoResponse)
    }

    /// Stage outcomes that stop a case from entering further stages.
    ///
    /// One-deny-denies stops only on NOT_DECIDED; a revoking or reducing
    /// stage outcome still lets the case continue unless the stage
    /// overrides the set.
    #[must_use]
    pub fn outcomes_to_stop_on(self) -> BTreeSet<CertificationResponse> {
        match self {
            Self::OneAcceptAccepts => BTreeSet::from([Revoke]),
            Self::AllMustAccept => BTreeSet::from([Revoke, Reduce, NotDecided, NoResponse]),
            Self::OneDenyDenies => BTreeSet::from([NotDecided]),
            Self::AcceptedIfNotDenied => BTreeSet::from([Revoke, Reduce]),
        }
    }
}

fn first_present(
    summary: &ResponsesSummary,
    precedence: &[CertificationResponse],
) -> Option<CertificationResponse> {
    precedence.iter().copied().find(|r| summary.has(*r))
}

impl fmt::Display for OutcomeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OneAcceptAccepts => write!(f, "one_accept_accepts"),
            Self::AllMustAccept => write!(f, "all_must_accept"),
            Self::OneDenyDenies => write!(f, "one_deny_denies"),
            Self::AcceptedIfNotDenied => write!(f, "accepted_if_not_denied"),
        }
    }
}
