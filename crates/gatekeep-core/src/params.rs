//! Resolved build parameter values.

use crate::ids::ParameterName;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

const MASK: &str = "******";

/// Opaque reference to a credential held by the external vault.
///
/// The reference itself is never printed; only the execution engine hands it
/// to the credential store.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CredentialRef(String);

impl CredentialRef {
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    /// Raw reference, for the engine handoff only.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for CredentialRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(MASK)
    }
}

impl fmt::Display for CredentialRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(MASK)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ParameterValue {
    Text(String),
    Credential(CredentialRef),
}

impl ParameterValue {
    /// The literal value, or `None` for credential references.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ParameterValue::Text(s) => Some(s),
            ParameterValue::Credential(_) => None,
        }
    }

    pub fn is_secret(&self) -> bool {
        matches!(self, ParameterValue::Credential(_))
    }

    pub fn is_empty(&self) -> bool {
        match self {
            ParameterValue::Text(s) => s.is_empty(),
            ParameterValue::Credential(c) => c.expose().is_empty(),
        }
    }
}

impl fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterValue::Text(s) => f.write_str(s),
            ParameterValue::Credential(c) => write!(f, "{}", c),
        }
    }
}

/// Final parameter values for one build invocation, keyed and ordered by name.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResolvedParameterSet(BTreeMap<ParameterName, ParameterValue>);

impl ResolvedParameterSet {
    pub fn new(values: BTreeMap<ParameterName, ParameterValue>) -> Self {
        Self(values)
    }

    pub fn get(&self, name: &str) -> Option<&ParameterValue> {
        self.0.get(&ParameterName::from(name))
    }

    /// Literal value of a non-secret parameter.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(ParameterValue::as_text)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ParameterName, &ParameterValue)> {
        self.0.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(ParameterName::as_str)
    }

    /// Name → printable value, with credentials masked.
    pub fn masked(&self) -> BTreeMap<String, String> {
        self.0
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }
}

/// `serialize_with` helper for report types: writes the masked name → value
/// map so credential references never leave through a report.
pub fn serialize_masked<S: Serializer>(
    parameters: &ResolvedParameterSet,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    parameters.masked().serialize(serializer)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ResolvedParameterSet {
        let mut values = BTreeMap::new();
        values.insert(
            ParameterName::from("env.APPSTORE_PASSWORD"),
            ParameterValue::Credential(CredentialRef::new("credentialsJSON:4a1f")),
        );
        values.insert(
            ParameterName::from("env.CONFIGURATION"),
            ParameterValue::Text("Release".to_string()),
        );
        ResolvedParameterSet::new(values)
    }

    #[test]
    fn test_credential_never_formatted() {
        let set = sample();
        let debug = format!("{:?}", set);
        assert!(!debug.contains("4a1f"));
        assert_eq!(set.masked()["env.APPSTORE_PASSWORD"], "******");
        assert_eq!(set.masked()["env.CONFIGURATION"], "Release");
    }

    #[test]
    fn test_text_skips_credentials() {
        let set = sample();
        assert_eq!(set.text("env.CONFIGURATION"), Some("Release"));
        assert_eq!(set.text("env.APPSTORE_PASSWORD"), None);
        assert!(set.get("env.APPSTORE_PASSWORD").unwrap().is_secret());
    }

    #[test]
    fn test_empty_values() {
        assert!(ParameterValue::Text(String::new()).is_empty());
        assert!(ParameterValue::Credential(CredentialRef::new("")).is_empty());
        assert!(!ParameterValue::Credential(CredentialRef::new("credentialsJSON:4a1f")).is_empty());
    }

    #[test]
    fn test_serialization_is_ordered() {
        let json = serde_json::to_string(&sample()).unwrap();
        let password_at = json.find("env.APPSTORE_PASSWORD").unwrap();
        let config_at = json.find("env.CONFIGURATION").unwrap();
        assert!(password_at < config_at);
    }
}
