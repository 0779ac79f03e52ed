//! CLI configuration helpers.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
    Yaml,
}

/// Parse a `key=value` argument.
pub fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("Invalid parameter '{}', expected key=value", raw)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_key_value() {
        assert_eq!(
            parse_key_value("env.CONFIGURATION=Release").unwrap(),
            ("env.CONFIGURATION".to_string(), "Release".to_string())
        );
        assert_eq!(
            parse_key_value("env.ARGS=a=b").unwrap(),
            ("env.ARGS".to_string(), "a=b".to_string())
        );
        assert_eq!(
            parse_key_value("env.EMPTY=").unwrap(),
            ("env.EMPTY".to_string(), String::new())
        );
        assert!(parse_key_value("no-separator").is_err());
        assert!(parse_key_value("=value").is_err());
    }
}
