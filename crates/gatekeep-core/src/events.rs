//! Status events reported to the source-control platform.

use crate::decision::DecisionKind;
use crate::ids::{BuildId, TriggerName};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A dispatch outcome, surfaced on the originating source-control platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusEvent {
    pub build_id: BuildId,
    pub pipeline: String,
    pub trigger: TriggerName,
    pub branch: String,
    #[serde(default)]
    pub commit_sha: Option<String>,
    pub decision: DecisionKind,
    pub reason: String,
    pub attempt: u32,
    pub reported_at: DateTime<Utc>,
}

impl StatusEvent {
    /// Subject under which the event is published, e.g. `build.queued.release`.
    pub fn subject(&self) -> String {
        format!("build.{}.{}", self.decision, self.trigger)
    }
}
