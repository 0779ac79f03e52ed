//! Port traits (hexagonal architecture).
//!
//! These traits define the interfaces between the dispatch core and the
//! external collaborators it feeds.

use crate::events::StatusEvent;
use crate::ids::{BuildId, TriggerName};
use crate::params::ResolvedParameterSet;
use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Everything the execution engine needs to run an approved build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionRequest {
    pub build_id: BuildId,
    pub pipeline: String,
    pub trigger: TriggerName,
    pub branch: String,
    pub attempt: u32,
    pub resolved_parameters: ResolvedParameterSet,
    /// Advisory wall-clock budget; enforced by the engine.
    pub timeout_minutes: Option<u32>,
    /// Verbatim artifact rules, not interpreted here.
    pub artifact_rules: Vec<String>,
}

/// External engine that runs builds.
#[async_trait]
pub trait ExecutionEngine: Send + Sync {
    /// Hand a build off. Fire-and-forget: returns once the engine accepted it,
    /// not when the build completes.
    async fn dispatch(&self, request: &ExecutionRequest) -> Result<()>;
}

/// Publishes dispatch outcomes to the source-control platform.
#[async_trait]
pub trait StatusPublisher: Send + Sync {
    async fn publish(&self, event: &StatusEvent) -> Result<()>;
}
