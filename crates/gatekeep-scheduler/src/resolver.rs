//! Layered parameter resolution.
//!
//! Values are applied in order of increasing precedence: declared defaults,
//! the matched trigger's overrides, then user-supplied overrides. Resolution
//! is all-or-nothing; a single bad override fails the whole set.
//!
//! Read-only parameters refuse user overrides but still take trigger
//! overrides. Parameters that disallow empty values fail when every layer
//! leaves them empty.

use crate::triggers::MatchedTrigger;
use gatekeep_core::ids::ParameterName;
use gatekeep_core::params::{CredentialRef, ParameterValue, ResolvedParameterSet};
use gatekeep_core::pipeline::{ParameterKind, ParameterSpec};
use gatekeep_core::{Error, Result};
use std::collections::BTreeMap;
use tracing::debug;

/// Label used for the user override layer in errors.
pub const USER_LAYER: &str = "user overrides";

pub struct ParameterResolver;

impl ParameterResolver {
    pub fn new() -> Self {
        Self
    }

    /// Resolve parameters for a matched trigger.
    pub fn resolve(
        &self,
        matched: &MatchedTrigger,
        specs: &[ParameterSpec],
        user_overrides: &BTreeMap<String, String>,
    ) -> Result<ResolvedParameterSet> {
        self.resolve_layers(
            &format!("trigger '{}'", matched.name),
            &matched.build_params,
            specs,
            user_overrides,
        )
    }

    /// Resolve with an explicit trigger layer. `trigger_layer` names that
    /// layer in `UnknownParameter` errors.
    pub fn resolve_layers(
        &self,
        trigger_layer: &str,
        trigger_overrides: &BTreeMap<String, String>,
        specs: &[ParameterSpec],
        user_overrides: &BTreeMap<String, String>,
    ) -> Result<ResolvedParameterSet> {
        check_declared(trigger_overrides, specs, trigger_layer)?;
        check_declared(user_overrides, specs, USER_LAYER)?;
        check_read_only(user_overrides, specs)?;

        let mut values = BTreeMap::new();
        for spec in specs {
            let raw = user_overrides
                .get(&spec.name)
                .or_else(|| trigger_overrides.get(&spec.name))
                .unwrap_or(&spec.default);
            let value = normalize(spec, raw)?;
            if !spec.allow_empty && value.is_empty() {
                return Err(Error::EmptyParameter(spec.name.clone()));
            }
            values.insert(ParameterName::new(&spec.name), value);
        }

        let resolved = ResolvedParameterSet::new(values);
        debug!(
            layer = trigger_layer,
            parameters = resolved.len(),
            "Resolved parameters"
        );
        Ok(resolved)
    }
}

impl Default for ParameterResolver {
    fn default() -> Self {
        Self::new()
    }
}

fn check_declared(
    overrides: &BTreeMap<String, String>,
    specs: &[ParameterSpec],
    layer: &str,
) -> Result<()> {
    match overrides
        .keys()
        .find(|name| !specs.iter().any(|s| &s.name == *name))
    {
        Some(name) => Err(Error::unknown_parameter(name, layer)),
        None => Ok(()),
    }
}

fn check_read_only(overrides: &BTreeMap<String, String>, specs: &[ParameterSpec]) -> Result<()> {
    match specs
        .iter()
        .find(|s| s.read_only && overrides.contains_key(&s.name))
    {
        Some(spec) => Err(Error::ReadOnlyParameter(spec.name.clone())),
        None => Ok(()),
    }
}

/// Coerce a raw value to its declared type.
fn normalize(spec: &ParameterSpec, raw: &str) -> Result<ParameterValue> {
    match &spec.kind {
        ParameterKind::Text => Ok(ParameterValue::Text(raw.to_string())),
        ParameterKind::Checkbox {
            checked_value,
            unchecked_value,
        } => {
            // Configured literals take precedence over the boolean aliases.
            let value = if raw == checked_value {
                checked_value
            } else if raw == unchecked_value {
                unchecked_value
            } else if raw == "true" {
                checked_value
            } else if raw == "false" || raw.is_empty() {
                unchecked_value
            } else {
                return Err(invalid_option(
                    spec,
                    raw,
                    vec![checked_value.clone(), unchecked_value.clone()],
                ));
            };
            Ok(ParameterValue::Text(value.clone()))
        }
        ParameterKind::Select { options } => {
            if options.iter().any(|o| o == raw) {
                Ok(ParameterValue::Text(raw.to_string()))
            } else {
                Err(invalid_option(spec, raw, options.clone()))
            }
        }
        ParameterKind::Password => Ok(ParameterValue::Credential(CredentialRef::new(raw))),
    }
}

fn invalid_option(spec: &ParameterSpec, raw: &str, allowed: Vec<String>) -> Error {
    // Never echo the rejected value of a secret parameter.
    let value = if spec.is_secret() { "******" } else { raw };
    Error::InvalidOption {
        parameter: spec.name.clone(),
        value: value.to_string(),
        allowed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatekeep_core::ids::TriggerName;
    use gatekeep_core::pipeline::DisplayMode;
    use pretty_assertions::assert_eq;

    fn checkbox(name: &str, default: &str) -> ParameterSpec {
        ParameterSpec {
            display: DisplayMode::Prompt,
            kind: ParameterKind::Checkbox {
                checked_value: "1".to_string(),
                unchecked_value: "0".to_string(),
            },
            ..ParameterSpec::text(name, default)
        }
    }

    fn select(name: &str, options: &[&str], default: &str) -> ParameterSpec {
        ParameterSpec {
            kind: ParameterKind::Select {
                options: options.iter().map(|o| o.to_string()).collect(),
            },
            ..ParameterSpec::text(name, default)
        }
    }

    fn password(name: &str, reference: &str) -> ParameterSpec {
        ParameterSpec {
            display: DisplayMode::Hidden,
            kind: ParameterKind::Password,
            ..ParameterSpec::text(name, reference)
        }
    }

    fn specs() -> Vec<ParameterSpec> {
        vec![
            select("env.CONFIGURATION", &["Debug", "Release"], "Debug"),
            checkbox("env.SKIP_TESTS", "0"),
            ParameterSpec::text("env.SIMULATOR", "iPhone 15"),
            password("env.APPSTORE_KEY", "credentialsJSON:4a1f"),
        ]
    }

    fn matched(params: &[(&str, &str)]) -> MatchedTrigger {
        MatchedTrigger {
            name: TriggerName::from("release"),
            branch: "release/15.6".to_string(),
            build_params: params
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    fn overrides(params: &[(&str, &str)]) -> BTreeMap<String, String> {
        params
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults_only() {
        let resolved = ParameterResolver::new()
            .resolve(&matched(&[]), &specs(), &BTreeMap::new())
            .unwrap();
        assert_eq!(resolved.len(), 4);
        assert_eq!(resolved.text("env.CONFIGURATION"), Some("Debug"));
        assert_eq!(resolved.text("env.SKIP_TESTS"), Some("0"));
        assert_eq!(resolved.text("env.SIMULATOR"), Some("iPhone 15"));
        assert!(resolved.get("env.APPSTORE_KEY").unwrap().is_secret());
    }

    #[test]
    fn test_precedence() {
        let resolver = ParameterResolver::new();
        let trigger = matched(&[("env.CONFIGURATION", "Release"), ("env.SIMULATOR", "iPad")]);

        let resolved = resolver
            .resolve(&trigger, &specs(), &BTreeMap::new())
            .unwrap();
        assert_eq!(resolved.text("env.CONFIGURATION"), Some("Release"));
        assert_eq!(resolved.text("env.SIMULATOR"), Some("iPad"));

        let resolved = resolver
            .resolve(&trigger, &specs(), &overrides(&[("env.CONFIGURATION", "Debug")]))
            .unwrap();
        assert_eq!(resolved.text("env.CONFIGURATION"), Some("Debug"));
        assert_eq!(resolved.text("env.SIMULATOR"), Some("iPad"));
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let resolver = ParameterResolver::new();
        let trigger = matched(&[("env.SKIP_TESTS", "true")]);
        let user = overrides(&[("env.SIMULATOR", "iPhone SE")]);
        let first = resolver.resolve(&trigger, &specs(), &user).unwrap();
        let second = resolver.resolve(&trigger, &specs(), &user).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_checkbox_normalization() {
        let resolver = ParameterResolver::new();
        for (raw, expected) in [("true", "1"), ("1", "1"), ("false", "0"), ("0", "0"), ("", "0")] {
            let resolved = resolver
                .resolve(&matched(&[]), &specs(), &overrides(&[("env.SKIP_TESTS", raw)]))
                .unwrap();
            assert_eq!(resolved.text("env.SKIP_TESTS"), Some(expected), "raw {raw:?}");
        }
    }

    #[test]
    fn test_trigger_checks_boolean_checkbox() {
        let specs = vec![ParameterSpec {
            kind: ParameterKind::Checkbox {
                checked_value: "true".to_string(),
                unchecked_value: "false".to_string(),
            },
            ..checkbox("env.SKIP_TESTS", "")
        }];

        let resolver = ParameterResolver::new();
        let unchecked = resolver
            .resolve(&matched(&[]), &specs, &BTreeMap::new())
            .unwrap();
        assert_eq!(unchecked.text("env.SKIP_TESTS"), Some("false"));

        let checked = resolver
            .resolve(&matched(&[("env.SKIP_TESTS", "true")]), &specs, &BTreeMap::new())
            .unwrap();
        assert_eq!(checked.text("env.SKIP_TESTS"), Some("true"));
    }

    #[test]
    fn test_inverted_checkbox_literals() {
        let specs = vec![ParameterSpec {
            kind: ParameterKind::Checkbox {
                checked_value: "false".to_string(),
                unchecked_value: "true".to_string(),
            },
            ..checkbox("env.SKIP_SIGNING", "true")
        }];

        let resolver = ParameterResolver::new();
        let by_default = resolver
            .resolve(&matched(&[]), &specs, &BTreeMap::new())
            .unwrap();
        assert_eq!(by_default.text("env.SKIP_SIGNING"), Some("true"));

        let checked = resolver
            .resolve(&matched(&[]), &specs, &overrides(&[("env.SKIP_SIGNING", "false")]))
            .unwrap();
        assert_eq!(checked.text("env.SKIP_SIGNING"), Some("false"));

        let cleared = resolver
            .resolve(&matched(&[]), &specs, &overrides(&[("env.SKIP_SIGNING", "")]))
            .unwrap();
        assert_eq!(cleared.text("env.SKIP_SIGNING"), Some("true"));
    }

    #[test]
    fn test_checkbox_rejects_other_values() {
        let err = ParameterResolver::new()
            .resolve(&matched(&[]), &specs(), &overrides(&[("env.SKIP_TESTS", "yes")]))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidOption { parameter, value, allowed }
                if parameter == "env.SKIP_TESTS" && value == "yes" && allowed == vec!["1", "0"]
        ));
    }

    #[test]
    fn test_select_rejects_unknown_option() {
        let err = ParameterResolver::new()
            .resolve(&matched(&[("env.CONFIGURATION", "Profile")]), &specs(), &BTreeMap::new())
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid value 'Profile' for parameter 'env.CONFIGURATION', expected one of: Debug, Release"
        );
    }

    #[test]
    fn test_unknown_parameter_names_layer() {
        let resolver = ParameterResolver::new();

        let err = resolver
            .resolve(&matched(&[("env.MISSING", "x")]), &specs(), &BTreeMap::new())
            .unwrap_err();
        assert!(matches!(
            err,
            Error::UnknownParameter { parameter, source_layer }
                if parameter == "env.MISSING" && source_layer == "trigger 'release'"
        ));

        let err = resolver
            .resolve(&matched(&[]), &specs(), &overrides(&[("env.MISSING", "x")]))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::UnknownParameter { source_layer, .. } if source_layer == USER_LAYER
        ));
    }

    #[test]
    fn test_password_override_stays_masked() {
        let resolved = ParameterResolver::new()
            .resolve(
                &matched(&[]),
                &specs(),
                &overrides(&[("env.APPSTORE_KEY", "credentialsJSON:9c2e")]),
            )
            .unwrap();
        let value = resolved.get("env.APPSTORE_KEY").unwrap();
        assert_eq!(value.as_text(), None);
        assert_eq!(value.to_string(), "******");
        assert!(!format!("{resolved:?}").contains("9c2e"));
    }

    #[test]
    fn test_read_only_refuses_user_override() {
        let mut specs = specs();
        specs[3].read_only = true;
        let resolver = ParameterResolver::new();

        let err = resolver
            .resolve(
                &matched(&[]),
                &specs,
                &overrides(&[("env.APPSTORE_KEY", "credentialsJSON:9c2e")]),
            )
            .unwrap_err();
        assert!(matches!(err, Error::ReadOnlyParameter(name) if name == "env.APPSTORE_KEY"));

        let resolved = resolver
            .resolve(
                &matched(&[("env.APPSTORE_KEY", "credentialsJSON:77d0")]),
                &specs,
                &BTreeMap::new(),
            )
            .unwrap();
        assert_eq!(
            resolved.get("env.APPSTORE_KEY").unwrap(),
            &ParameterValue::Credential(CredentialRef::new("credentialsJSON:77d0"))
        );
    }

    #[test]
    fn test_disallowed_empty_value() {
        let mut specs = specs();
        specs.push(ParameterSpec {
            allow_empty: false,
            ..ParameterSpec::text("env.BUNDLE_ID", "com.example.ios")
        });
        let resolver = ParameterResolver::new();

        let resolved = resolver
            .resolve(&matched(&[]), &specs, &BTreeMap::new())
            .unwrap();
        assert_eq!(resolved.text("env.BUNDLE_ID"), Some("com.example.ios"));

        let err = resolver
            .resolve(&matched(&[]), &specs, &overrides(&[("env.BUNDLE_ID", "")]))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Parameter 'env.BUNDLE_ID' does not allow an empty value"
        );
    }

    #[test]
    fn test_empty_specs() {
        let resolved = ParameterResolver::new()
            .resolve(&matched(&[]), &[], &BTreeMap::new())
            .unwrap();
        assert!(resolved.is_empty());
    }
}
