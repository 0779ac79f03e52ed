//! Dispatch decisions.

use crate::params::{ResolvedParameterSet, serialize_masked};
use serde::{Deserialize, Serialize};

/// Outcome of the dispatch policy for one matched trigger.
///
/// Serialized parameters are masked; the raw set travels to the engine
/// through `ExecutionRequest` only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum DispatchDecision {
    Proceed {
        #[serde(serialize_with = "serialize_masked")]
        parameters: ResolvedParameterSet,
    },
    /// Deferred until capacity frees up. Not an error.
    Queued { reason: String },
    Rejected { reason: String },
}

impl DispatchDecision {
    pub fn queued(reason: impl Into<String>) -> Self {
        DispatchDecision::Queued {
            reason: reason.into(),
        }
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        DispatchDecision::Rejected {
            reason: reason.into(),
        }
    }

    pub fn is_proceed(&self) -> bool {
        matches!(self, DispatchDecision::Proceed { .. })
    }

    pub fn is_queued(&self) -> bool {
        matches!(self, DispatchDecision::Queued { .. })
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, DispatchDecision::Rejected { .. })
    }

    pub fn kind(&self) -> DecisionKind {
        match self {
            DispatchDecision::Proceed { .. } => DecisionKind::Proceed,
            DispatchDecision::Queued { .. } => DecisionKind::Queued,
            DispatchDecision::Rejected { .. } => DecisionKind::Rejected,
        }
    }

    /// Short human-readable reason for status reporting.
    pub fn reason(&self) -> &str {
        match self {
            DispatchDecision::Proceed { .. } => "build dispatched",
            DispatchDecision::Queued { reason } | DispatchDecision::Rejected { reason } => reason,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionKind {
    Proceed,
    Queued,
    Rejected,
}

impl std::fmt::Display for DecisionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DecisionKind::Proceed => "proceed",
            DecisionKind::Queued => "queued",
            DecisionKind::Rejected => "rejected",
        };
        f.write_str(s)
    }
}
