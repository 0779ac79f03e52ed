//! Dispatch policy: pausing, freeze windows and per-branch concurrency ceilings.

use crate::triggers::{MatchedTrigger, match_branch};
use chrono::{DateTime, Utc};
use gatekeep_config::{BranchLimit, CompiledDefinition, CompiledFreezeWindow};
use gatekeep_core::decision::DispatchDecision;
use gatekeep_core::params::ResolvedParameterSet;
use gatekeep_core::pipeline::RetryConfig;

pub const CONCURRENCY_LIMIT_REASON: &str = "branch concurrency limit reached";
pub const PAUSED_REASON: &str = "build configuration paused";

/// Decides whether a matched, resolved build may start now.
#[derive(Debug, Clone, Default)]
pub struct DispatchPolicy {
    paused: bool,
    max_running_per_branch: Option<usize>,
    branch_limits: Vec<BranchLimit>,
    timeout_minutes: Option<u32>,
    retry: Option<RetryConfig>,
    freeze_windows: Vec<CompiledFreezeWindow>,
    default_branch: Option<String>,
}

impl DispatchPolicy {
    pub fn from_definition(definition: &CompiledDefinition) -> Self {
        let policy = definition.policy();
        Self {
            paused: policy.paused,
            max_running_per_branch: policy
                .max_running_builds_per_branch
                .filter(|max| *max > 0)
                .map(|max| max as usize),
            branch_limits: definition.branch_limits().to_vec(),
            timeout_minutes: policy.execution_timeout_min,
            retry: policy.retry.clone(),
            freeze_windows: definition.freeze_windows().to_vec(),
            default_branch: definition.default_branch().map(str::to_string),
        }
    }

    pub fn with_concurrency_limit(mut self, max: usize) -> Self {
        self.max_running_per_branch = (max > 0).then_some(max);
        self
    }

    pub fn with_branch_limits(mut self, limits: Vec<BranchLimit>) -> Self {
        self.branch_limits = limits;
        self
    }

    pub fn paused(mut self, paused: bool) -> Self {
        self.paused = paused;
        self
    }

    /// Ceiling for `branch`; `None` is unlimited. The last matching branch
    /// limit wins over the uniform ceiling.
    pub fn concurrency_limit(&self, branch: &str) -> Option<usize> {
        self.branch_limits
            .iter()
            .rev()
            .find(|l| l.pattern().matches(branch, self.default_branch.as_deref()))
            .map(|l| (l.max() > 0).then_some(l.max() as usize))
            .unwrap_or(self.max_running_per_branch)
    }

    pub fn timeout_minutes(&self) -> Option<u32> {
        self.timeout_minutes
    }

    pub fn retry(&self) -> Option<&RetryConfig> {
        self.retry.as_ref()
    }

    /// Whether another build on `branch`, which has `running` builds, fits
    /// under its ceiling.
    pub fn has_capacity(&self, branch: &str, running: usize) -> bool {
        self.concurrency_limit(branch).is_none_or(|max| running < max)
    }

    pub fn decide(
        &self,
        matched: &MatchedTrigger,
        resolved: ResolvedParameterSet,
        running_on_branch: usize,
    ) -> DispatchDecision {
        self.decide_at(matched, resolved, running_on_branch, Utc::now())
    }

    /// Decide against an explicit clock. A paused configuration rejects
    /// everything; active freeze windows reject before the concurrency
    /// ceiling is considered.
    pub fn decide_at(
        &self,
        matched: &MatchedTrigger,
        resolved: ResolvedParameterSet,
        running_on_branch: usize,
        now: DateTime<Utc>,
    ) -> DispatchDecision {
        if self.paused {
            return DispatchDecision::rejected(PAUSED_REASON);
        }
        if let Some(window) = self.active_freeze(&matched.branch, now) {
            return DispatchDecision::rejected(format!("branch frozen: {}", window.window.name));
        }
        if !self.has_capacity(&matched.branch, running_on_branch) {
            return DispatchDecision::queued(CONCURRENCY_LIMIT_REASON);
        }
        DispatchDecision::Proceed {
            parameters: resolved,
        }
    }

    fn active_freeze(&self, branch: &str, now: DateTime<Utc>) -> Option<&CompiledFreezeWindow> {
        self.freeze_windows.iter().find(|w| {
            w.window.is_active(now)
                && match_branch(&w.branches, branch, self.default_branch.as_deref())
        })
    }
}
