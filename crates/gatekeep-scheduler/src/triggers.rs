//! Trigger matching and evaluation.

use gatekeep_config::{BranchPattern, CommentRule, CompiledDefinition, CompiledTrigger};
use gatekeep_core::event::{VcsEvent, VcsEventKind};
use gatekeep_core::ids::TriggerName;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

/// A trigger that fired for an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchedTrigger {
    pub name: TriggerName,
    /// Logical branch of the event, without `refs/heads/`.
    pub branch: String,
    pub build_params: BTreeMap<String, String>,
}

impl MatchedTrigger {
    pub fn new(trigger: &CompiledTrigger, branch: &str) -> Self {
        Self {
            name: trigger.name().clone(),
            branch: branch.to_string(),
            build_params: trigger.build_params().clone(),
        }
    }
}

/// Why a trigger did not fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    Disabled,
    EventKind,
    BranchExcluded,
    CommitMessageVetoed,
    AuthorRole,
    DraftPullRequest,
    TargetBranchExcluded,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SkipReason::Disabled => "trigger disabled",
            SkipReason::EventKind => "event kind not handled",
            SkipReason::BranchExcluded => "branch excluded",
            SkipReason::CommitMessageVetoed => "commit message excluded",
            SkipReason::AuthorRole => "pull request author role not allowed",
            SkipReason::DraftPullRequest => "draft pull request",
            SkipReason::TargetBranchExcluded => "pull request target branch excluded",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerVerdict {
    Matched(MatchedTrigger),
    Skipped(SkipReason),
}

/// Ordered include/exclude evaluation: starts excluded, the last matching
/// pattern decides.
pub fn match_branch(patterns: &[BranchPattern], branch: &str, default_branch: Option<&str>) -> bool {
    patterns.iter().fold(false, |included, pattern| {
        if pattern.matches(branch, default_branch) {
            pattern.polarity().is_include()
        } else {
            included
        }
    })
}

/// Whether commit-message rules allow the build. Starts allowed unless the
/// rules contain an include; the last matching rule decides.
pub fn commit_allowed(rules: &[CommentRule], message: &str, changed_paths: &[String]) -> bool {
    let initial = !rules.iter().any(|r| r.polarity().is_include());
    rules.iter().fold(initial, |allowed, rule| {
        if rule.matches(message, changed_paths) {
            rule.polarity().is_include()
        } else {
            allowed
        }
    })
}

/// Matcher for determining which triggers fire for an event.
pub struct TriggerMatcher;

impl TriggerMatcher {
    pub fn new() -> Self {
        Self
    }

    /// Every enabled trigger of the definition that fires for `event`.
    pub fn evaluate(&self, event: &VcsEvent, definition: &CompiledDefinition) -> Vec<MatchedTrigger> {
        self.evaluate_rules(event, definition.triggers(), definition.default_branch())
    }

    /// Evaluate an ordered rule set. All matching rules fire; no dedup.
    pub fn evaluate_rules(
        &self,
        event: &VcsEvent,
        rules: &[CompiledTrigger],
        default_branch: Option<&str>,
    ) -> Vec<MatchedTrigger> {
        rules
            .iter()
            .filter_map(|rule| match self.check(event, rule, default_branch) {
                TriggerVerdict::Matched(m) => Some(m),
                TriggerVerdict::Skipped(reason) => {
                    debug!(
                        trigger = %rule.name(),
                        branch = %event.logical_branch(),
                        %reason,
                        "Trigger skipped"
                    );
                    None
                }
            })
            .collect()
    }

    /// Evaluate one rule against one event.
    pub fn check(
        &self,
        event: &VcsEvent,
        rule: &CompiledTrigger,
        default_branch: Option<&str>,
    ) -> TriggerVerdict {
        if !rule.is_enabled() {
            return TriggerVerdict::Skipped(SkipReason::Disabled);
        }
        if !rule.listens_to(event.kind()) {
            return TriggerVerdict::Skipped(SkipReason::EventKind);
        }

        let branch = event.logical_branch();
        if !match_branch(rule.branch_filter(), branch, default_branch) {
            return TriggerVerdict::Skipped(SkipReason::BranchExcluded);
        }

        if event.kind() == VcsEventKind::PullRequest
            && let Some(reason) = self.pull_request_skip(event, rule, default_branch)
        {
            return TriggerVerdict::Skipped(reason);
        }

        if !commit_allowed(rule.comment_rules(), &event.commit_message, &event.changed_paths) {
            return TriggerVerdict::Skipped(SkipReason::CommitMessageVetoed);
        }

        TriggerVerdict::Matched(MatchedTrigger::new(rule, branch))
    }

    fn pull_request_skip(
        &self,
        event: &VcsEvent,
        rule: &CompiledTrigger,
        default_branch: Option<&str>,
    ) -> Option<SkipReason> {
        let filter = rule.pull_requests();
        if !filter.author_roles.contains(&event.author_role) {
            return Some(SkipReason::AuthorRole);
        }
        if filter.ignore_drafts && event.is_draft {
            return Some(SkipReason::DraftPullRequest);
        }
        if !rule.target_branches().is_empty() {
            let target = event.target_branch.as_deref().unwrap_or_default();
            if !match_branch(rule.target_branches(), target, default_branch) {
                return Some(SkipReason::TargetBranchExcluded);
            }
        }
        None
    }
}

impl Default for TriggerMatcher {
    fn default() -> Self {
        Self::new()
    }
}
