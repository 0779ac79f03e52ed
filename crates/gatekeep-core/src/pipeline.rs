//! Pipeline definition types.
//!
//! These types represent the user-authored pipeline YAML configuration.
//! A definition is loaded once, compiled, and never mutated; patches produce
//! a new definition.

use crate::event::{AuthorRole, VcsEventKind};
use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PipelineDefinition {
    pub version: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Branch matched by the `<default>` pattern token.
    #[serde(default)]
    pub default_branch: Option<String>,
    #[serde(default)]
    pub parameters: Vec<ParameterSpec>,
    #[serde(default)]
    pub triggers: Vec<TriggerConfig>,
    #[serde(default)]
    pub policy: DispatchPolicyConfig,
    /// Passed through verbatim to the execution engine, e.g. `+:archive/** => archive.zip`.
    #[serde(default)]
    pub artifact_rules: Vec<String>,
}

impl PipelineDefinition {
    pub fn trigger(&self, name: &str) -> Option<&TriggerConfig> {
        self.triggers.iter().find(|t| t.name == name)
    }

    pub fn parameter(&self, name: &str) -> Option<&ParameterSpec> {
        self.parameters.iter().find(|p| p.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TriggerConfig {
    pub name: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Event kinds this trigger listens to.
    #[serde(default = "default_event_kinds")]
    pub events: Vec<VcsEventKind>,
    /// Ordered `+:`/`-:` branch patterns; the last matching pattern wins.
    #[serde(default = "default_branch_filter")]
    pub branch_filter: Vec<String>,
    /// Ordered `+:comment=<glob>:<path-glob>` rules.
    #[serde(default)]
    pub trigger_rules: Vec<String>,
    #[serde(default)]
    pub pull_requests: PullRequestFilter,
    #[serde(default)]
    pub build_params: BTreeMap<String, String>,
}

fn default_true() -> bool {
    true
}

fn default_event_kinds() -> Vec<VcsEventKind> {
    vec![VcsEventKind::Push, VcsEventKind::PullRequest]
}

fn default_branch_filter() -> Vec<String> {
    vec!["+:*".to_string()]
}

impl TriggerConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            enabled: true,
            events: default_event_kinds(),
            branch_filter: default_branch_filter(),
            trigger_rules: vec![],
            pull_requests: PullRequestFilter::default(),
            build_params: BTreeMap::new(),
        }
    }
}

/// Additional constraints applied to pull request events only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PullRequestFilter {
    #[serde(default = "default_author_roles")]
    pub author_roles: Vec<AuthorRole>,
    #[serde(default = "default_true")]
    pub ignore_drafts: bool,
    /// Patterns evaluated against the PR target branch. Empty accepts any target.
    #[serde(default)]
    pub target_branches: Vec<String>,
}

fn default_author_roles() -> Vec<AuthorRole> {
    vec![AuthorRole::Member]
}

impl Default for PullRequestFilter {
    fn default() -> Self {
        Self {
            author_roles: default_author_roles(),
            ignore_drafts: true,
            target_branches: vec![],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ParameterSpec {
    pub name: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub default: String,
    #[serde(default)]
    pub display: DisplayMode,
    /// When false, resolving to an empty value is an error.
    #[serde(default = "default_true")]
    pub allow_empty: bool,
    /// When true, user overrides are refused; triggers may still set it.
    #[serde(default)]
    pub read_only: bool,
    #[serde(flatten)]
    pub kind: ParameterKind,
}

impl ParameterSpec {
    pub fn text(name: impl Into<String>, default: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            label: None,
            description: None,
            default: default.into(),
            display: DisplayMode::Normal,
            allow_empty: true,
            read_only: false,
            kind: ParameterKind::Text,
        }
    }

    pub fn is_secret(&self) -> bool {
        matches!(self.kind, ParameterKind::Password)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ParameterKind {
    Text,
    Checkbox {
        #[serde(default = "default_checked")]
        checked_value: String,
        #[serde(default = "default_unchecked")]
        unchecked_value: String,
    },
    Select {
        options: Vec<String>,
    },
    /// Value is an opaque credential reference resolved by the external vault.
    Password,
}

fn default_checked() -> String {
    "true".to_string()
}

fn default_unchecked() -> String {
    "false".to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum DisplayMode {
    Hidden,
    #[default]
    Normal,
    Prompt,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct DispatchPolicyConfig {
    /// A paused configuration rejects every build.
    #[serde(default)]
    pub paused: bool,
    /// Ceiling on running builds per branch. `None` or zero means unlimited.
    #[serde(default)]
    pub max_running_builds_per_branch: Option<u32>,
    /// Pattern-keyed ceilings as `<branch-pattern>:<max>`. The last matching
    /// entry wins over `max_running_builds_per_branch`.
    #[serde(default)]
    pub branch_limits: Vec<String>,
    #[serde(default)]
    pub execution_timeout_min: Option<u32>,
    #[serde(default)]
    pub retry: Option<RetryConfig>,
    #[serde(default)]
    pub freeze_windows: Vec<FreezeWindow>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RetryConfig {
    #[serde(default = "default_attempts")]
    pub attempts: u32,
    #[serde(default)]
    pub move_to_the_queue_top: bool,
}

fn default_attempts() -> u32 {
    1
}

/// A period during which builds for matching branches are rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FreezeWindow {
    pub name: String,
    #[serde(default = "default_branch_filter")]
    pub branches: Vec<String>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
}

impl FreezeWindow {
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.starts_at <= now && now < self.ends_at
    }
}
