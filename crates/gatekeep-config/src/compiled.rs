//! Compiled, immutable pipeline definitions.

use crate::patterns::{
    BranchLimit, BranchPattern, CommentRule, parse_branch_limits, parse_branch_patterns,
    parse_comment_rules,
};
use crate::validation::validate;
use gatekeep_core::event::VcsEventKind;
use gatekeep_core::ids::TriggerName;
use gatekeep_core::pipeline::{
    DispatchPolicyConfig, FreezeWindow, ParameterSpec, PipelineDefinition, PullRequestFilter,
    TriggerConfig,
};
use gatekeep_core::{Error, Result};
use std::collections::BTreeMap;
use std::sync::Arc;

/// A trigger with its patterns compiled.
#[derive(Debug, Clone)]
pub struct CompiledTrigger {
    name: TriggerName,
    enabled: bool,
    events: Vec<VcsEventKind>,
    branch_filter: Vec<BranchPattern>,
    comment_rules: Vec<CommentRule>,
    pull_requests: PullRequestFilter,
    target_branches: Vec<BranchPattern>,
    build_params: BTreeMap<String, String>,
}

impl CompiledTrigger {
    pub fn compile(config: &TriggerConfig) -> Result<Self> {
        Ok(Self {
            name: TriggerName::new(&config.name),
            enabled: config.enabled,
            events: config.events.clone(),
            branch_filter: parse_branch_patterns(&config.branch_filter)?,
            comment_rules: parse_comment_rules(&config.trigger_rules)?,
            pull_requests: config.pull_requests.clone(),
            target_branches: parse_branch_patterns(&config.pull_requests.target_branches)?,
            build_params: config.build_params.clone(),
        })
    }

    pub fn name(&self) -> &TriggerName {
        &self.name
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn listens_to(&self, kind: VcsEventKind) -> bool {
        self.events.contains(&kind)
    }

    pub fn branch_filter(&self) -> &[BranchPattern] {
        &self.branch_filter
    }

    pub fn comment_rules(&self) -> &[CommentRule] {
        &self.comment_rules
    }

    pub fn pull_requests(&self) -> &PullRequestFilter {
        &self.pull_requests
    }

    pub fn target_branches(&self) -> &[BranchPattern] {
        &self.target_branches
    }

    pub fn build_params(&self) -> &BTreeMap<String, String> {
        &self.build_params
    }
}

#[derive(Debug, Clone)]
pub struct CompiledFreezeWindow {
    pub window: FreezeWindow,
    pub branches: Vec<BranchPattern>,
}

/// A validated definition with every pattern compiled.
///
/// Pattern errors surface here, at load time, never per event.
#[derive(Debug, Clone)]
pub struct CompiledDefinition {
    definition: Arc<PipelineDefinition>,
    triggers: Vec<CompiledTrigger>,
    freeze_windows: Vec<CompiledFreezeWindow>,
    branch_limits: Vec<BranchLimit>,
}

impl CompiledDefinition {
    pub fn compile(definition: PipelineDefinition) -> Result<Self> {
        let triggers = definition
            .triggers
            .iter()
            .map(CompiledTrigger::compile)
            .collect::<Result<Vec<_>>>()?;

        let freeze_windows = definition
            .policy
            .freeze_windows
            .iter()
            .map(|w| {
                Ok(CompiledFreezeWindow {
                    window: w.clone(),
                    branches: parse_branch_patterns(&w.branches)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let branch_limits = parse_branch_limits(&definition.policy.branch_limits)?;

        let report = validate(&definition);
        if !report.is_valid() {
            return Err(Error::InvalidDefinition(report.errors.join("; ")));
        }

        Ok(Self {
            definition: Arc::new(definition),
            triggers,
            freeze_windows,
            branch_limits,
        })
    }

    pub fn definition(&self) -> &PipelineDefinition {
        &self.definition
    }

    pub fn name(&self) -> &str {
        &self.definition.name
    }

    pub fn default_branch(&self) -> Option<&str> {
        self.definition.default_branch.as_deref()
    }

    pub fn triggers(&self) -> &[CompiledTrigger] {
        &self.triggers
    }

    pub fn trigger(&self, name: &str) -> Option<&CompiledTrigger> {
        self.triggers.iter().find(|t| t.name.as_str() == name)
    }

    pub fn parameters(&self) -> &[ParameterSpec] {
        &self.definition.parameters
    }

    pub fn policy(&self) -> &DispatchPolicyConfig {
        &self.definition.policy
    }

    pub fn freeze_windows(&self) -> &[CompiledFreezeWindow] {
        &self.freeze_windows
    }

    pub fn branch_limits(&self) -> &[BranchLimit] {
        &self.branch_limits
    }

    pub fn artifact_rules(&self) -> &[String] {
        &self.definition.artifact_rules
    }
}
