//! Report types and their table/JSON/YAML rendering.

use crate::config::OutputFormat;
use console::style;
use gatekeep_core::decision::DispatchDecision;
use gatekeep_core::event::VcsEventKind;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write;

#[derive(Debug, Serialize)]
pub struct EvaluationReport {
    pub pipeline: String,
    pub branch: String,
    pub kind: VcsEventKind,
    pub triggers: Vec<TriggerReport>,
}

impl EvaluationReport {
    pub fn matched(&self) -> impl Iterator<Item = &TriggerReport> {
        self.triggers.iter().filter(|t| t.outcome != "skipped")
    }
}

#[derive(Debug, Serialize)]
pub struct TriggerReport {
    pub trigger: String,
    pub outcome: String,
    pub reason: String,
    /// Masked values; present only when the build may proceed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<BTreeMap<String, String>>,
}

impl TriggerReport {
    pub fn decided(trigger: &str, decision: &DispatchDecision) -> Self {
        let parameters = match decision {
            DispatchDecision::Proceed { parameters } => Some(parameters.masked()),
            _ => None,
        };
        Self {
            trigger: trigger.to_string(),
            outcome: decision.kind().to_string(),
            reason: decision.reason().to_string(),
            parameters,
        }
    }

    pub fn skipped(trigger: &str, reason: impl ToString) -> Self {
        Self {
            trigger: trigger.to_string(),
            outcome: "skipped".to_string(),
            reason: reason.to_string(),
            parameters: None,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ParamsReport {
    pub pipeline: String,
    pub trigger: String,
    pub parameters: Vec<ParamRow>,
}

#[derive(Debug, Serialize)]
pub struct ParamRow {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub display: String,
    pub value: String,
}

/// Serialize `value` in the requested format, using `table` for table output.
pub fn render<T: Serialize>(
    value: &T,
    format: OutputFormat,
    table: impl FnOnce(&T) -> String,
) -> anyhow::Result<String> {
    Ok(match format {
        OutputFormat::Table => table(value),
        OutputFormat::Json => serde_json::to_string_pretty(value)?,
        OutputFormat::Yaml => serde_yaml::to_string(value)?,
    })
}

pub fn evaluation_table(report: &EvaluationReport) -> String {
    let kind = match report.kind {
        VcsEventKind::Push => "push",
        VcsEventKind::PullRequest => "pull request",
    };
    let mut out = format!(
        "Pipeline {} ({} on {})\n\n",
        style(&report.pipeline).bold(),
        kind,
        style(&report.branch).dim()
    );
    let _ = writeln!(out, "{:<24} {:<10} REASON", "TRIGGER", "OUTCOME");
    for row in &report.triggers {
        let outcome = match row.outcome.as_str() {
            "proceed" => style(&row.outcome).green(),
            "queued" => style(&row.outcome).yellow(),
            "rejected" => style(&row.outcome).red(),
            _ => style(&row.outcome).dim(),
        };
        let _ = writeln!(
            out,
            "{:<24} {:<10} {}",
            row.trigger,
            outcome.to_string(),
            row.reason
        );
        for (name, value) in row.parameters.iter().flatten() {
            let _ = writeln!(out, "    {} = {}", name, value);
        }
    }
    if report.matched().next().is_none() {
        let _ = writeln!(out, "\n{} No build", style("i").blue());
    }
    out
}

pub fn params_table(report: &ParamsReport) -> String {
    let mut out = format!(
        "Parameters for {} / {}\n\n",
        style(&report.pipeline).bold(),
        style(&report.trigger).bold()
    );
    let _ = writeln!(out, "{:<32} {:<10} {:<8} VALUE", "NAME", "TYPE", "DISPLAY");
    for row in &report.parameters {
        let _ = writeln!(
            out,
            "{:<32} {:<10} {:<8} {}",
            row.name, row.kind, row.display, row.value
        );
    }
    out
}
