//! Per-run execution trace.
//!
//! Each event is hashed and folded into a running BLAKE3 chain, so two
//! runs of the same plan with the same seed end on the same digest.
//! Events carry no wall-clock time.

use mapgen_core::{Hash, StepId};
use serde::Serialize;

/// Kind of trace event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TraceEventKind {
    /// Execution began
    RunStarted,
    /// A step's run body is about to be invoked
    StepStarted,
    /// A step reached a terminal state after being considered for running
    StepFinished,
    /// A step's run condition was false
    StepSkipped,
    /// Execution ended
    RunFinished,
}

impl TraceEventKind {
    /// Stable name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RunStarted => "run-started",
            Self::StepStarted => "step-started",
            Self::StepFinished => "step-finished",
            Self::StepSkipped => "step-skipped",
            Self::RunFinished => "run-finished",
        }
    }
}

/// One trace event
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TraceEvent {
    /// Position in the log
    pub sequence: u64,
    /// Event kind
    pub kind: TraceEventKind,
    /// Step the event concerns
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step_id: Option<StepId>,
    /// Outcome, for terminal events
    pub success: bool,
    /// Free-form detail
    #[serde(skip_serializing_if = "String::is_empty")]
    pub detail: String,
}

impl TraceEvent {
    fn hash(&self) -> Hash {
        let step = self.step_id.as_ref().map_or("", StepId::as_str);
        let line = format!(
            "{}\u{1f}{}\u{1f}{}\u{1f}{}\u{1f}{}",
            self.sequence,
            self.kind.as_str(),
            step,
            self.success,
            self.detail
        );
        Hash::compute(line.as_bytes())
    }
}

/// Append-only, hash-chained event log
#[derive(Debug, Clone, Default)]
pub struct TraceLog {
    events: Vec<TraceEvent>,
    digest: Hash,
    disabled: bool,
}

impl TraceLog {
    /// Create an enabled log
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a log that records nothing
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            disabled: true,
            ..Self::default()
        }
    }

    /// Check if recording
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        !self.disabled
    }

    /// Append an event
    pub fn record(
        &mut self,
        kind: TraceEventKind,
        step_id: Option<&StepId>,
        success: bool,
        detail: impl Into<String>,
    ) {
        if self.disabled {
            return;
        }
        let event = TraceEvent {
            sequence: self.events.len() as u64,
            kind,
            step_id: step_id.cloned(),
            success,
            detail: detail.into(),
        };
        self.digest = self.digest.chain(&event.hash());
        self.events.push(event);
    }

    /// Recorded events
    #[must_use]
    pub fn events(&self) -> &[TraceEvent] {
        &self.events
    }

    /// Digest of everything recorded so far
    #[must_use]
    pub fn digest(&self) -> Hash {
        self.digest
    }

    /// Number of events
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Check if empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
