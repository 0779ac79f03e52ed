//! Command handlers.

use crate::commands::{DefinitionArgs, EventArgs};
use crate::config::OutputFormat;
use crate::output::{
    EvaluationReport, ParamRow, ParamsReport, TriggerReport, evaluation_table, params_table,
    render,
};
use anyhow::{Context, bail};
use console::style;
use gatekeep_config::{CompiledDefinition, apply_all, load, read_definition, read_patch};
use gatekeep_core::Error;
use gatekeep_core::event::VcsEvent;
use gatekeep_core::pipeline::{DisplayMode, ParameterKind};
use gatekeep_scheduler::{
    DispatchPolicy, MatchedTrigger, ParameterResolver, TriggerMatcher, TriggerVerdict,
};
use std::collections::BTreeMap;
use std::fmt::Write;
use tracing::debug;

/// Validate a pipeline definition with its patches.
pub fn validate(source: &DefinitionArgs) -> anyhow::Result<String> {
    let base = read_definition(&source.definition)?;
    let patches = source
        .patches
        .iter()
        .map(|p| read_patch(p))
        .collect::<Result<Vec<_>, _>>()?;
    let definition = apply_all(&base, &patches)?;

    let report = gatekeep_config::validate(&definition);
    if !report.is_valid() {
        bail!(
            "Pipeline \"{}\" is invalid:\n  - {}",
            definition.name,
            report.errors.join("\n  - ")
        );
    }
    let compiled = CompiledDefinition::compile(definition)?;

    let mut out = format!(
        "{} Pipeline \"{}\" is valid\n",
        style("✓").green(),
        compiled.name()
    );
    let _ = writeln!(out, "  Triggers: {}", compiled.triggers().len());
    for trigger in compiled.triggers() {
        let state = if trigger.is_enabled() { "" } else { " (disabled)" };
        let _ = writeln!(out, "    - {}{}", trigger.name(), state);
    }
    let _ = writeln!(out, "  Parameters: {}", compiled.parameters().len());
    if !compiled.branch_limits().is_empty() {
        let _ = writeln!(out, "  Branch limits: {}", compiled.branch_limits().len());
    }
    if !patches.is_empty() {
        let _ = writeln!(out, "  Patches applied: {}", patches.len());
    }
    for warning in &report.warnings {
        let _ = writeln!(out, "  {} {}", style("!").yellow(), warning);
    }
    Ok(out)
}

/// Evaluate an event and render the decision of every trigger.
pub fn evaluate(
    source: &DefinitionArgs,
    event: &EventArgs,
    params: &[(String, String)],
    running: usize,
    format: OutputFormat,
) -> anyhow::Result<String> {
    let definition = load(&source.definition, &source.patches)?;
    let event = build_event(event)?;
    let overrides: BTreeMap<_, _> = params.iter().cloned().collect();

    let report = evaluate_event(&definition, &event, &overrides, running)?;
    render(&report, format, evaluation_table)
}

/// Run matcher, resolver and policy without dispatching anything.
///
/// Resolution is all-or-nothing across the matched triggers.
pub fn evaluate_event(
    definition: &CompiledDefinition,
    event: &VcsEvent,
    overrides: &BTreeMap<String, String>,
    running: usize,
) -> anyhow::Result<EvaluationReport> {
    let matcher = TriggerMatcher::new();
    let resolver = ParameterResolver::new();
    let policy = DispatchPolicy::from_definition(definition);

    let mut triggers = Vec::with_capacity(definition.triggers().len());
    for trigger in definition.triggers() {
        let row = match matcher.check(event, trigger, definition.default_branch()) {
            TriggerVerdict::Matched(matched) => {
                let resolved = resolver.resolve(&matched, definition.parameters(), overrides)?;
                let decision = policy.decide(&matched, resolved, running);
                TriggerReport::decided(matched.name.as_str(), &decision)
            }
            TriggerVerdict::Skipped(reason) => {
                debug!(trigger = %trigger.name(), %reason, "Trigger skipped");
                TriggerReport::skipped(trigger.name().as_str(), reason)
            }
        };
        triggers.push(row);
    }

    Ok(EvaluationReport {
        pipeline: definition.name().to_string(),
        branch: event.logical_branch().to_string(),
        kind: event.kind(),
        triggers,
    })
}

/// Resolve and render the parameters a trigger would build with.
pub fn params(
    source: &DefinitionArgs,
    trigger: &str,
    branch: Option<&str>,
    params: &[(String, String)],
    format: OutputFormat,
) -> anyhow::Result<String> {
    let definition = load(&source.definition, &source.patches)?;
    let overrides: BTreeMap<_, _> = params.iter().cloned().collect();
    let report = resolve_params(&definition, trigger, branch, &overrides)?;
    render(&report, format, params_table)
}

pub fn resolve_params(
    definition: &CompiledDefinition,
    trigger: &str,
    branch: Option<&str>,
    overrides: &BTreeMap<String, String>,
) -> anyhow::Result<ParamsReport> {
    let compiled = definition
        .trigger(trigger)
        .ok_or_else(|| Error::TriggerNotFound(trigger.to_string()))?;
    let branch = branch.or(definition.default_branch()).unwrap_or_default();
    let matched = MatchedTrigger::new(compiled, branch);
    let resolved = ParameterResolver::new().resolve(&matched, definition.parameters(), overrides)?;

    let masked = resolved.masked();
    let parameters = definition
        .parameters()
        .iter()
        .map(|spec| ParamRow {
            name: spec.name.clone(),
            kind: kind_label(&spec.kind).to_string(),
            display: display_label(spec.display).to_string(),
            value: masked.get(&spec.name).cloned().unwrap_or_default(),
        })
        .collect();

    Ok(ParamsReport {
        pipeline: definition.name().to_string(),
        trigger: trigger.to_string(),
        parameters,
    })
}

/// JSON Schema of the definition format.
pub fn schema() -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(
        &gatekeep_config::definition_schema(),
    )?)
}

fn build_event(args: &EventArgs) -> anyhow::Result<VcsEvent> {
    if let Some(path) = &args.event {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read event {}", path.display()))?;
        // YAML is a superset of JSON, so one parser covers both.
        return serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse event {}", path.display()));
    }

    let branch = args
        .branch
        .clone()
        .context("--branch is required without --event")?;
    Ok(VcsEvent {
        commit_message: args.message.clone(),
        is_pull_request: args.pr,
        author_role: args.author_role,
        target_branch: args.target_branch.clone(),
        is_draft: args.draft,
        changed_paths: args.paths.clone(),
        ..VcsEvent::push(branch, "")
    })
}

fn kind_label(kind: &ParameterKind) -> &'static str {
    match kind {
        ParameterKind::Text => "text",
        ParameterKind::Checkbox { .. } => "checkbox",
        ParameterKind::Select { .. } => "select",
        ParameterKind::Password => "password",
    }
}

fn display_label(display: DisplayMode) -> &'static str {
    match display {
        DisplayMode::Hidden => "hidden",
        DisplayMode::Normal => "normal",
        DisplayMode::Prompt => "prompt",
    }
}
