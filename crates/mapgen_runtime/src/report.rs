//! Per-step outcomes and the run report.

use crate::monitor::Metrics;
use mapgen_core::{Hash, StepId};
use serde::Serialize;

/// Terminal state of one step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    /// Ran and every provided tag holds
    Succeeded,
    /// Missing requires, a failing body, or unmet provides
    Failed,
    /// Run condition was false
    Skipped,
}

impl StepStatus {
    /// Status name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result record for one plan node
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepOutcome {
    /// Step id
    pub step_id: StepId,
    /// Terminal status
    pub status: StepStatus,
    /// False only for failed steps
    pub success: bool,
    /// Failure message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StepOutcome {
    /// A successful step
    #[must_use]
    pub fn succeeded(step_id: StepId) -> Self {
        Self {
            step_id,
            status: StepStatus::Succeeded,
            success: true,
            error: None,
        }
    }

    /// A skipped step
    #[must_use]
    pub fn skipped(step_id: StepId) -> Self {
        Self {
            step_id,
            status: StepStatus::Skipped,
            success: true,
            error: None,
        }
    }

    /// A failed step
    #[must_use]
    pub fn failed(step_id: StepId, error: impl Into<String>) -> Self {
        Self {
            step_id,
            status: StepStatus::Failed,
            success: false,
            error: Some(error.into()),
        }
    }
}

/// Outcome of one run
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    /// AND of every step's success
    pub success: bool,
    /// Outcomes in plan order
    pub per_step: Vec<StepOutcome>,
    /// Step counters
    pub metrics: Metrics,
    /// Digest of the execution trace
    pub trace_digest: Hash,
}

impl RunReport {
    /// Outcome for a step
    #[must_use]
    pub fn outcome(&self, step_id: &StepId) -> Option<&StepOutcome> {
        self.per_step.iter().find(|o| &o.step_id == step_id)
    }

    /// Failed outcomes in plan order
    pub fn failures(&self) -> impl Iterator<Item = &StepOutcome> {
        self.per_step.iter().filter(|o| !o.success)
    }
}
