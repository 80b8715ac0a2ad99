//! Operation results returned by campaign commands.
//!
//! Every command reports what it did as an [`OperationResult`] tree: the
//! top-level entry names the command, sub-results record per-case work
//! (reviewer resolution, remediation), and the top-level status is the worst
//! status found anywhere below it.

use serde::{Deserialize, Serialize};

use crate::error::CertificationError;

/// Status of an operation or sub-operation.
///
/// Variants are ordered by severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationStatus {
    /// Completed successfully.
    #[default]
    Success,
    /// Work is still running in the background.
    InProgress,
    /// Some per-case work failed.
    PartialError,
    /// The whole operation failed.
    FatalError,
}

/// Diagnostic record of a command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationResult {
    /// Operation name, e.g. `open_next_stage`.
    pub operation: String,
    /// Own status; see [`OperationResult::compute_status`].
    pub status: OperationStatus,
    /// Human-readable summary.
    pub message: Option<String>,
    /// Nested sub-operations in execution order.
    pub subresults: Vec<OperationResult>,
    /// Error text of a failure.
    pub cause: Option<String>,
}

impl OperationResult {
    /// Start a successful result.
    #[must_use]
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            status: OperationStatus::Success,
            message: None,
            subresults: Vec::new(),
            cause: None,
        }
    }

    /// Result for a failed command.
    #[must_use]
    pub fn fatal(operation: impl Into<String>, error: &CertificationError) -> Self {
        Self {
            status: OperationStatus::FatalError,
            message: Some(error.to_string()),
            cause: Some(format!("{error:?}")),
            ..Self::new(operation)
        }
    }

    /// Per-case failure entry.
    #[must_use]
    pub fn partial(operation: impl Into<String>, error: &CertificationError) -> Self {
        Self {
            status: OperationStatus::PartialError,
            message: Some(error.to_string()),
            cause: Some(format!("{error:?}")),
            ..Self::new(operation)
        }
    }

    /// Set the message.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Set the own status.
    #[must_use]
    pub fn with_status(mut self, status: OperationStatus) -> Self {
        self.status = status;
        self
    }

    /// Append a sub-result.
    pub fn add_subresult(&mut self, subresult: OperationResult) {
        self.subresults.push(subresult);
    }

    /// Worst status of this result and everything below it.
    #[must_use]
    pub fn compute_status(&self) -> OperationStatus {
        self.subresults
            .iter()
            .map(OperationResult::compute_status)
            .fold(self.status, Ord::max)
    }

    /// Roll the worst status up into `status`.
    #[must_use]
    pub fn finish(mut self) -> Self {
        self.status = self.compute_status();
        self
    }

    /// Whether the rolled-up status is `Success`.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.compute_status() == OperationStatus::Success
    }
}
