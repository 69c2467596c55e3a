//! Parsing for a charm's config.yaml file

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use ex::fs::read;
use serde_derive::{Deserialize, Serialize};
use serde_yaml::{from_slice, from_str};

use crate::error::LintError;
use crate::report::{Issue, Report};

/// Represents a YAML value that doesn't have a pre-determined type
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Value {
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
    None,
}

impl Value {
    /// Name of the value's type, as it would be written in config.yaml
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Boolean(_) => "boolean",
            Value::Integer(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::None => "null",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(v) => write!(f, "{}", v),
            Value::String(s) => f.write_str(s),
            Value::None => f.write_str("null"),
        }
    }
}

/// Config option as defined in config.yaml
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields, tag = "type", rename_all = "kebab-case")]
pub enum ConfigOption {
    /// String config option
    String {
        default: Option<String>,
        description: Option<String>,
    },

    /// Integer config option
    #[serde(rename = "int")]
    Integer {
        default: Option<i64>,
        description: Option<String>,
    },

    /// Floating point config option
    Float {
        default: Option<f64>,
        description: Option<String>,
    },

    /// Boolean config option
    Boolean {
        default: Option<bool>,
        description: Option<String>,
    },
}

impl ConfigOption {
    pub fn type_name(&self) -> &'static str {
        match self {
            ConfigOption::String { .. } => "string",
            ConfigOption::Integer { .. } => "int",
            ConfigOption::Float { .. } => "float",
            ConfigOption::Boolean { .. } => "boolean",
        }
    }

    /// Whether `value` can be given for this option
    ///
    /// Integers are fine for float options, and null unsets any option.
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::None) => true,
            (ConfigOption::String { .. }, Value::String(_)) => true,
            (ConfigOption::Integer { .. }, Value::Integer(_)) => true,
            (ConfigOption::Float { .. }, Value::Float(_)) => true,
            (ConfigOption::Float { .. }, Value::Integer(_)) => true,
            (ConfigOption::Boolean { .. }, Value::Boolean(_)) => true,
            _ => false,
        }
    }
}

/// A charm's config.yaml file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct Config {
    #[serde(default)]
    pub options: BTreeMap<String, ConfigOption>,
}

impl Config {
    pub fn load<P: Into<PathBuf>>(path: P) -> Result<Self, LintError> {
        Ok(from_slice(&read(path.into())?)?)
    }

    /// Check a set of option values, e.g. from a bundle, against this config
    pub fn check_options(&self, options: &BTreeMap<String, Value>) -> Vec<Issue> {
        options
            .iter()
            .filter_map(|(key, value)| match self.options.get(key) {
                None => Some(Issue::Reference(format!("unknown option `{}`", key))),
                Some(option) if !option.accepts(value) => Some(Issue::Type(format!(
                    "option `{}` expects {}, got {} `{}`",
                    key,
                    option.type_name(),
                    value.type_name(),
                    value
                ))),
                Some(_) => None,
            })
            .collect()
    }
}

impl FromStr for Config {
    type Err = LintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(from_str(s)?)
    }
}

/// Parse config.yaml text and check that the option names are sane
pub fn validate_config(text: &str) -> Result<Config, Report> {
    let config: Config = from_str(text)
        .map_err(|err| Report::structural(format!("invalid config.yaml: {}", err)))?;

    let mut report = Report::new();
    for key in config.options.keys() {
        if key.trim().is_empty() || key.chars().any(char::is_whitespace) {
            report.push(Issue::Structural(format!(
                "`{}` is not a valid option name",
                key
            )));
        }
    }

    report.into_result(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::IssueKind;

    const CONFIG: &str = r#"
options:
  server.log-level:
    type: string
    default: info
    description: Log level
  server.burst-limit:
    type: int
    default: 500
  patch-sync.enabled:
    type: boolean
    default: false
  patch-cache.cache-ttl:
    type: float
"#;

    #[test]
    fn test_parse() {
        let config = validate_config(CONFIG).unwrap();
        assert_eq!(config.options.len(), 4);
        assert_eq!(
            config.options["server.burst-limit"],
            ConfigOption::Integer {
                default: Some(500),
                description: None,
            }
        );
    }

    #[test]
    fn test_values() {
        let values: BTreeMap<String, Value> =
            serde_yaml::from_str("a: true\nb: 3\nc: 1.5\nd: text\ne: ~\nf: 'true'").unwrap();

        assert_eq!(values["a"], Value::Boolean(true));
        assert_eq!(values["b"], Value::Integer(3));
        assert_eq!(values["c"], Value::Float(1.5));
        assert_eq!(values["d"], Value::String("text".into()));
        assert_eq!(values["e"], Value::None);
        assert_eq!(values["f"], Value::String("true".into()));
    }

    #[test]
    fn test_check_options() {
        let config = validate_config(CONFIG).unwrap();
        let options: BTreeMap<String, Value> = serde_yaml::from_str(
            "server.log-level: debug\nserver.burst-limit: lots\npatch-cache.cache-ttl: 60\nnope: 1",
        )
        .unwrap();

        let issues = config.check_options(&options);
        let kinds: Vec<_> = issues.iter().map(Issue::kind).collect();
        assert_eq!(kinds, vec![IssueKind::Reference, IssueKind::Type]);
    }

    #[test]
    fn test_unknown_type() {
        let report = validate_config("options:\n  foo:\n    type: list\n").unwrap_err();
        assert_eq!(report.count(IssueKind::Structural), 1);
    }
}
