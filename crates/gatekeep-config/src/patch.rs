//! Patches over pipeline definitions.
//!
//! A patch never mutates its base: `apply` returns a new definition, so
//! applying the same patches to the same base always yields the same result.

use gatekeep_core::event::VcsEventKind;
use gatekeep_core::pipeline::{
    DisplayMode, FreezeWindow, ParameterSpec, PipelineDefinition, PullRequestFilter,
    RetryConfig, TriggerConfig,
};
use gatekeep_core::{Error, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PipelinePatch {
    #[serde(default)]
    pub remove_triggers: Vec<String>,
    #[serde(default)]
    pub triggers: Vec<TriggerPatch>,
    #[serde(default)]
    pub add_triggers: Vec<TriggerConfig>,
    #[serde(default)]
    pub parameters: Vec<ParameterPatch>,
    #[serde(default)]
    pub add_parameters: Vec<ParameterSpec>,
    #[serde(default)]
    pub policy: Option<PolicyPatch>,
    #[serde(default)]
    pub artifact_rules: Option<Vec<String>>,
}

/// Edits to an existing trigger, addressed by name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TriggerPatch {
    pub name: String,
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub events: Option<Vec<VcsEventKind>>,
    #[serde(default)]
    pub branch_filter: Option<Vec<String>>,
    #[serde(default)]
    pub trigger_rules: Option<Vec<String>>,
    #[serde(default)]
    pub pull_requests: Option<PullRequestFilter>,
    /// Merged into the trigger's overrides; a null value removes the key.
    #[serde(default)]
    pub build_params: BTreeMap<String, Option<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ParameterPatch {
    pub name: String,
    #[serde(default)]
    pub default: Option<String>,
    #[serde(default)]
    pub display: Option<DisplayMode>,
}

/// Policy edits. For the optional settings an absent key leaves the base
/// value alone and an explicit null clears it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PolicyPatch {
    #[serde(default)]
    pub paused: Option<bool>,
    #[serde(
        default,
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub max_running_builds_per_branch: Option<Option<u32>>,
    #[serde(default)]
    pub branch_limits: Option<Vec<String>>,
    #[serde(
        default,
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub execution_timeout_min: Option<Option<u32>>,
    #[serde(
        default,
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub retry: Option<Option<RetryConfig>>,
    #[serde(default)]
    pub freeze_windows: Option<Vec<FreezeWindow>>,
}

/// Present keys deserialize to `Some`, so a null becomes `Some(None)`.
fn double_option<'de, D, T>(deserializer: D) -> std::result::Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Apply `patch` to `base`, returning the patched definition.
///
/// Removals run first, then edits, then additions. Edits or removals that
/// name a missing trigger or parameter fail with `Error::PatchTarget`.
pub fn apply(base: &PipelineDefinition, patch: &PipelinePatch) -> Result<PipelineDefinition> {
    let mut next = base.clone();

    for name in &patch.remove_triggers {
        let before = next.triggers.len();
        next.triggers.retain(|t| &t.name != name);
        if next.triggers.len() == before {
            return Err(target_missing("trigger", name));
        }
    }

    for edit in &patch.triggers {
        let trigger = next
            .triggers
            .iter_mut()
            .find(|t| t.name == edit.name)
            .ok_or_else(|| target_missing("trigger", &edit.name))?;

        if let Some(enabled) = edit.enabled {
            trigger.enabled = enabled;
        }
        if let Some(events) = &edit.events {
            trigger.events = events.clone();
        }
        if let Some(filter) = &edit.branch_filter {
            trigger.branch_filter = filter.clone();
        }
        if let Some(rules) = &edit.trigger_rules {
            trigger.trigger_rules = rules.clone();
        }
        if let Some(pr) = &edit.pull_requests {
            trigger.pull_requests = pr.clone();
        }
        for (key, value) in &edit.build_params {
            match value {
                Some(v) => {
                    trigger.build_params.insert(key.clone(), v.clone());
                }
                None => {
                    trigger.build_params.remove(key);
                }
            }
        }
        debug!(trigger = %edit.name, "Patched trigger");
    }

    for added in &patch.add_triggers {
        if next.triggers.iter().any(|t| t.name == added.name) {
            return Err(Error::InvalidDefinition(format!(
                "Patch adds trigger '{}' which already exists",
                added.name
            )));
        }
        next.triggers.push(added.clone());
    }

    for edit in &patch.parameters {
        let spec = next
            .parameters
            .iter_mut()
            .find(|p| p.name == edit.name)
            .ok_or_else(|| target_missing("parameter", &edit.name))?;
        if let Some(default) = &edit.default {
            spec.default = default.clone();
        }
        if let Some(display) = edit.display {
            spec.display = display;
        }
    }

    for added in &patch.add_parameters {
        if next.parameters.iter().any(|p| p.name == added.name) {
            return Err(Error::InvalidDefinition(format!(
                "Patch adds parameter '{}' which already exists",
                added.name
            )));
        }
        next.parameters.push(added.clone());
    }

    if let Some(policy) = &patch.policy {
        if let Some(paused) = policy.paused {
            next.policy.paused = paused;
        }
        if let Some(max) = policy.max_running_builds_per_branch {
            next.policy.max_running_builds_per_branch = max;
        }
        if let Some(limits) = &policy.branch_limits {
            next.policy.branch_limits = limits.clone();
        }
        if let Some(timeout) = policy.execution_timeout_min {
            next.policy.execution_timeout_min = timeout;
        }
        if let Some(retry) = &policy.retry {
            next.policy.retry = retry.clone();
        }
        if let Some(windows) = &policy.freeze_windows {
            next.policy.freeze_windows = windows.clone();
        }
    }

    if let Some(rules) = &patch.artifact_rules {
        next.artifact_rules = rules.clone();
    }

    Ok(next)
}

/// Apply patches in order.
pub fn apply_all<'a>(
    base: &PipelineDefinition,
    patches: impl IntoIterator<Item = &'a PipelinePatch>,
) -> Result<PipelineDefinition> {
    patches
        .into_iter()
        .try_fold(base.clone(), |def, patch| apply(&def, patch))
}

fn target_missing(kind: &str, name: &str) -> Error {
    Error::PatchTarget {
        kind: kind.to_string(),
        name: name.to_string(),
    }
}
