//! Structural validation of pipeline definitions.

use crate::patterns::{BranchLimit, BranchPattern, CommentRule};
use gatekeep_core::pipeline::{ParameterKind, ParameterSpec, PipelineDefinition};
use std::collections::HashSet;

/// Result of validating a definition.
///
/// Errors make the definition unloadable; warnings describe configuration
/// that loads but will fail or never fire at evaluation time.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ValidationReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Validate a definition without compiling it.
pub fn validate(definition: &PipelineDefinition) -> ValidationReport {
    let mut report = ValidationReport::default();

    if definition.name.trim().is_empty() {
        report.errors.push("Pipeline name must not be empty".to_string());
    }

    let mut parameter_names = HashSet::new();
    for spec in &definition.parameters {
        if !parameter_names.insert(spec.name.as_str()) {
            report
                .errors
                .push(format!("Duplicate parameter name: {}", spec.name));
        }
        validate_parameter(spec, &mut report);
    }

    let mut trigger_names = HashSet::new();
    for trigger in &definition.triggers {
        if !trigger_names.insert(trigger.name.as_str()) {
            report
                .errors
                .push(format!("Duplicate trigger name: {}", trigger.name));
        }

        for pattern in trigger
            .branch_filter
            .iter()
            .chain(&trigger.pull_requests.target_branches)
        {
            if let Err(e) = BranchPattern::parse(pattern) {
                report
                    .errors
                    .push(format!("Trigger '{}': {}", trigger.name, e));
            }
        }
        for rule in &trigger.trigger_rules {
            if let Err(e) = CommentRule::parse(rule) {
                report
                    .errors
                    .push(format!("Trigger '{}': {}", trigger.name, e));
            }
        }

        for name in trigger.build_params.keys() {
            if !parameter_names.contains(name.as_str()) {
                report.warnings.push(format!(
                    "Trigger '{}' overrides undeclared parameter '{}'; resolution will fail",
                    trigger.name, name
                ));
            }
        }

        if trigger.events.is_empty() {
            report.warnings.push(format!(
                "Trigger '{}' listens to no event kinds",
                trigger.name
            ));
        }

        if trigger.pull_requests.author_roles.is_empty() {
            report.warnings.push(format!(
                "Trigger '{}' accepts no pull request author roles",
                trigger.name
            ));
        }
    }

    if !definition.triggers.is_empty() && definition.triggers.iter().all(|t| !t.enabled) {
        report
            .warnings
            .push("All triggers are disabled; no event will start a build".to_string());
    }

    let policy = &definition.policy;
    if policy.paused {
        report
            .warnings
            .push("Pipeline is paused; every build will be rejected".to_string());
    }
    for limit in &policy.branch_limits {
        if let Err(e) = BranchLimit::parse(limit) {
            report.errors.push(format!("Branch limit: {}", e));
        }
    }
    if policy.execution_timeout_min == Some(0) {
        report
            .errors
            .push("execution_timeout_min must be greater than zero".to_string());
    }
    if let Some(retry) = &policy.retry
        && retry.attempts == 0
    {
        report
            .warnings
            .push("Retry configured with zero attempts; failed builds are not retried".to_string());
    }
    for window in &policy.freeze_windows {
        if window.ends_at <= window.starts_at {
            report.errors.push(format!(
                "Freeze window '{}' ends before it starts",
                window.name
            ));
        }
        for pattern in &window.branches {
            if let Err(e) = BranchPattern::parse(pattern) {
                report
                    .errors
                    .push(format!("Freeze window '{}': {}", window.name, e));
            }
        }
    }

    report
}

fn validate_parameter(spec: &ParameterSpec, report: &mut ValidationReport) {
    if spec.name.trim().is_empty() {
        report.errors.push("Parameter name must not be empty".to_string());
        return;
    }

    if !spec.allow_empty && spec.default.is_empty() {
        report.warnings.push(format!(
            "Parameter '{}' does not allow empty values and has no default",
            spec.name
        ));
    }

    match &spec.kind {
        ParameterKind::Text => {}
        ParameterKind::Checkbox {
            checked_value,
            unchecked_value,
        } => {
            if checked_value == unchecked_value {
                report.errors.push(format!(
                    "Checkbox '{}' uses the same value for checked and unchecked",
                    spec.name
                ));
            }
            let default_ok = spec.default.is_empty()
                || spec.default == *checked_value
                || spec.default == *unchecked_value
                || spec.default == "true"
                || spec.default == "false";
            if !default_ok {
                report.errors.push(format!(
                    "Checkbox '{}' default '{}' is neither '{}' nor '{}'",
                    spec.name, spec.default, checked_value, unchecked_value
                ));
            }
        }
        ParameterKind::Select { options } => {
            if options.is_empty() {
                report
                    .errors
                    .push(format!("Select '{}' declares no options", spec.name));
            }
            let unique: HashSet<_> = options.iter().collect();
            if unique.len() != options.len() {
                report
                    .errors
                    .push(format!("Select '{}' declares duplicate options", spec.name));
            }
            if spec.default.is_empty() {
                report.warnings.push(format!(
                    "Select '{}' has no default; a value must be supplied at invocation",
                    spec.name
                ));
            } else if !options.contains(&spec.default) {
                report.errors.push(format!(
                    "Select '{}' default '{}' is not one of its options",
                    spec.name, spec.default
                ));
            }
        }
        ParameterKind::Password => {
            if spec.default.is_empty() {
                report.warnings.push(format!(
                    "Password '{}' has no credential reference",
                    spec.name
                ));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatekeep_core::pipeline::{DisplayMode, TriggerConfig};

    fn definition() -> PipelineDefinition {
        serde_yaml::from_str(
            r#"
version: "1"
name: ios-app
parameters:
  - name: env.CONFIGURATION
    type: select
    options: [Debug, Release]
    default: Debug
triggers:
  - name: develop
    branch_filter: ["+:develop"]
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_valid_definition() {
        let report = validate(&definition());
        assert!(report.is_valid(), "{:?}", report.errors);
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn test_select_default_outside_options() {
        let mut def = definition();
        def.parameters[0].default = "Profile".to_string();
        let report = validate(&def);
        assert!(!report.is_valid());
        assert!(report.errors[0].contains("not one of its options"));
    }

    #[test]
    fn test_checkbox_literals_must_differ() {
        let mut def = definition();
        def.parameters.push(ParameterSpec {
            display: DisplayMode::Prompt,
            kind: ParameterKind::Checkbox {
                checked_value: "on".to_string(),
                unchecked_value: "on".to_string(),
            },
            ..ParameterSpec::text("env.SKIP_TESTS", "on")
        });
        let report = validate(&def);
        assert!(report.errors.iter().any(|e| e.contains("same value")));
    }

    #[test]
    fn test_pattern_errors_reported() {
        let mut def = definition();
        def.triggers[0].trigger_rules = vec!["-:comment=nobuild".to_string()];
        let report = validate(&def);
        assert!(report.errors.iter().any(|e| e.contains("Trigger 'develop'")));
    }

    #[test]
    fn test_unknown_build_param_is_warning() {
        let mut def = definition();
        def.triggers[0]
            .build_params
            .insert("env.MISSING".to_string(), "x".to_string());
        let report = validate(&def);
        assert!(report.is_valid());
        assert_eq!(report.warnings.len(), 1);
    }

    #[test]
    fn test_policy_checks() {
        let mut def = definition();
        def.policy.paused = true;
        def.policy.branch_limits = vec!["*:2".to_string(), "-:release/*:1".to_string()];
        let report = validate(&def);
        assert!(report.warnings.iter().any(|w| w.contains("paused")));
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].starts_with("Branch limit:"));
    }

    #[test]
    fn test_required_parameter_without_default() {
        let mut def = definition();
        def.parameters.push(ParameterSpec {
            allow_empty: false,
            ..ParameterSpec::text("env.BUNDLE_ID", "")
        });
        let report = validate(&def);
        assert!(report.is_valid());
        assert!(report.warnings[0].contains("does not allow empty values"));
    }

    #[test]
    fn test_all_disabled_warning() {
        let mut def = definition();
        let mut disabled = TriggerConfig::new("nightly");
        disabled.enabled = false;
        def.triggers = vec![disabled];
        let report = validate(&def);
        assert!(report.warnings.iter().any(|w| w.contains("All triggers are disabled")));
    }
}
