//! Parsing for a charm's actions.yaml file, and checking of action invocations

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use ex::fs::read;
use serde_derive::{Deserialize, Serialize};
use serde_yaml::{from_slice, from_str};
use tracing::debug;

use crate::config::Value;
use crate::error::LintError;
use crate::report::{Issue, Report};

/// Type of an action parameter
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub enum ParamType {
    String,
    Boolean,
    Integer,
    Number,
}

impl ParamType {
    /// Check a supplied value, returning it normalized if it fits
    ///
    /// Any scalar is taken as text for string params. Text typed on a command
    /// line should go through [`ParamType::read`] first so it isn't reformatted.
    pub fn normalize(self, value: &Value) -> Option<Value> {
        match (self, value) {
            (_, Value::None) => None,
            (ParamType::String, Value::String(_)) => Some(value.clone()),
            (ParamType::String, other) => Some(Value::String(other.to_string())),
            (ParamType::Boolean, Value::Boolean(_)) => Some(value.clone()),
            (ParamType::Integer, Value::Integer(_)) => Some(value.clone()),
            (ParamType::Number, Value::Integer(i)) => Some(Value::Float(*i as f64)),
            (ParamType::Number, Value::Float(_)) => Some(value.clone()),
            _ => None,
        }
    }

    /// Read a value as typed on a command line
    ///
    /// String params take the text exactly as given, so `token=1.0` stays `1.0`.
    pub fn read(self, raw: &str) -> Value {
        match self {
            ParamType::String => Value::String(raw.to_string()),
            _ => read_scalar(raw),
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            ParamType::String => "string",
            ParamType::Boolean => "boolean",
            ParamType::Integer => "integer",
            ParamType::Number => "number",
        })
    }
}

/// A parameter an action takes
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct Param {
    #[serde(rename = "type")]
    pub kind: ParamType,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub default: Option<Value>,
}

/// An operator-invocable action
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "kebab-case")]
pub struct Action {
    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub params: BTreeMap<String, Param>,

    /// Names of params that must be given
    #[serde(default)]
    pub required: Vec<String>,
}

impl Action {
    fn validate(&self) -> Vec<Issue> {
        let mut issues = Vec::new();

        for name in &self.required {
            if !self.params.contains_key(name) {
                issues.push(Issue::Reference(format!(
                    "required param `{}` is not declared",
                    name
                )));
            }
        }

        for (name, param) in &self.params {
            if let Some(default) = &param.default {
                if param.kind.normalize(default).is_none() {
                    issues.push(Issue::Type(format!(
                        "param `{}` is {}, but its default is `{}`",
                        name, param.kind, default
                    )));
                }
            }
        }

        issues
    }

    /// Check parameters given to this action, returning them normalized
    pub fn check_params(
        &self,
        params: &BTreeMap<String, Value>,
    ) -> Result<BTreeMap<String, Value>, Report> {
        let mut report = Report::new();
        let mut accepted = BTreeMap::new();

        for name in &self.required {
            if !params.contains_key(name) {
                report.push(Issue::Structural(format!(
                    "missing required param `{}`",
                    name
                )));
            }
        }

        for (name, value) in params {
            match self.params.get(name) {
                None => report.push(Issue::Reference(format!("unknown param `{}`", name))),
                Some(param) => match param.kind.normalize(value) {
                    Some(normalized) => {
                        accepted.insert(name.clone(), normalized);
                    }
                    None => report.push(Issue::Type(format!(
                        "param `{}` expects {}, got {} `{}`",
                        name,
                        param.kind,
                        value.type_name(),
                        value
                    ))),
                },
            }
        }

        report.into_result(accepted)
    }

    /// Check `key=value` arguments given to this action, reading each value by
    /// the type of the param it's for
    pub fn check_args<S: AsRef<str>>(
        &self,
        args: &[S],
    ) -> Result<BTreeMap<String, Value>, Report> {
        let mut report = Report::new();
        let mut params = BTreeMap::new();

        for arg in args {
            match split_param(arg.as_ref()) {
                Ok((key, raw)) => {
                    let value = match self.params.get(&key) {
                        Some(param) => param.kind.read(&raw),
                        None => read_scalar(&raw),
                    };
                    params.insert(key, value);
                }
                Err(err) => report.push(Issue::Structural(err)),
            }
        }

        match self.check_params(&params) {
            Ok(accepted) => report.into_result(accepted),
            Err(issues) => {
                report.extend(issues);
                Err(report)
            }
        }
    }
}

/// A charm's actions.yaml file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(transparent)]
pub struct Actions(pub BTreeMap<String, Action>);

impl Actions {
    pub fn load<P: Into<PathBuf>>(path: P) -> Result<Self, LintError> {
        Ok(from_slice(&read(path.into())?)?)
    }

    pub fn get(&self, name: &str) -> Option<&Action> {
        self.0.get(name)
    }

    /// Check the descriptor itself
    pub fn validate(&self) -> Report {
        let mut report = Report::new();
        for (name, action) in &self.0 {
            let context = format!("action `{}`", name);
            report.extend(action.validate().into_iter().map(|i| i.within(&context)));
        }
        report
    }

    fn action(&self, name: &str) -> Result<&Action, Report> {
        self.get(name).ok_or_else(|| {
            let mut report = Report::new();
            report.push(Issue::Reference(format!("unknown action `{}`", name)));
            report
        })
    }

    /// Check an invocation of the named action
    pub fn check_call(
        &self,
        name: &str,
        params: &BTreeMap<String, Value>,
    ) -> Result<BTreeMap<String, Value>, Report> {
        debug!(action = name, params = params.len(), "Checking action call");
        self.action(name)?
            .check_params(params)
            .map_err(|report| within_action(name, report))
    }

    /// Check an invocation of the named action given as `key=value` arguments
    pub fn check_args<S: AsRef<str>>(
        &self,
        name: &str,
        args: &[S],
    ) -> Result<BTreeMap<String, Value>, Report> {
        debug!(action = name, args = args.len(), "Checking action arguments");
        self.action(name)?
            .check_args(args)
            .map_err(|report| within_action(name, report))
    }
}

fn within_action(name: &str, report: Report) -> Report {
    let context = format!("action `{}`", name);
    let mut wrapped = Report::new();
    wrapped.extend(report.into_iter().map(|i| i.within(&context)));
    wrapped
}

impl FromStr for Actions {
    type Err = LintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(from_str(s)?)
    }
}

/// Parse and check actions.yaml text in one go
pub fn validate_actions(text: &str) -> Result<Actions, Report> {
    let actions: Actions = from_str(text)
        .map_err(|err| Report::structural(format!("invalid actions.yaml: {}", err)))?;
    let report = actions.validate();
    report.into_result(actions)
}

/// Split a `key=value` command line argument, keeping the value as typed
pub fn split_param(arg: &str) -> Result<(String, String), String> {
    let mut split = arg.splitn(2, '=');
    let key = split.next().unwrap_or("").trim();
    let raw = split
        .next()
        .ok_or_else(|| format!("`{}` is not in the form key=value", arg))?;

    if key.is_empty() {
        return Err(format!("`{}` has an empty key", arg));
    }

    Ok((key.to_string(), raw.to_string()))
}

/// Read text as a YAML scalar, the way `juju run` does. Anything that isn't a
/// scalar is kept as text.
fn read_scalar(raw: &str) -> Value {
    if raw.is_empty() {
        return Value::String(String::new());
    }
    serde_yaml::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::IssueKind;

    const ACTIONS: &str = r#"
enable:
  description: Enable Livepatch on-prem via Ubuntu Pro
  params:
    token:
      type: string
      description: Ubuntu Pro token
  required: [token]
restart:
  description: Restart the server
set-basic-users:
  params:
    users:
      type: string
    append:
      type: boolean
      default: false
  required: [users]
"#;

    fn params(args: &[&str]) -> BTreeMap<String, Value> {
        args.iter()
            .map(|a| {
                let (key, raw) = split_param(a).unwrap();
                (key, read_scalar(&raw))
            })
            .collect()
    }

    #[test]
    fn test_descriptor() {
        let actions = validate_actions(ACTIONS).unwrap();
        assert_eq!(actions.0.len(), 3);
        assert_eq!(actions.get("enable").unwrap().required, vec!["token"]);
    }

    #[test]
    fn test_bad_descriptor() {
        let text = r#"
enable:
  params:
    token:
      type: string
  required: [token, contract]
toggle:
  params:
    on:
      type: boolean
      default: maybe
"#;
        let report = validate_actions(text).unwrap_err();
        assert_eq!(report.count(IssueKind::Reference), 1);
        assert_eq!(report.count(IssueKind::Type), 1);
        assert!(report.issues()[0].message().contains("contract"));
    }

    #[test]
    fn test_split_param() {
        assert_eq!(
            split_param("users=alice:pw1,bob:pw2").unwrap(),
            ("users".into(), "alice:pw1,bob:pw2".into())
        );
        assert_eq!(split_param("a=b=c").unwrap(), ("a".into(), "b=c".into()));
        assert_eq!(split_param("token=").unwrap(), ("token".into(), "".into()));
        assert!(split_param("token").is_err());
        assert!(split_param("=abc").is_err());

        assert_eq!(read_scalar("true"), Value::Boolean(true));
        assert_eq!(read_scalar(""), Value::String("".into()));
    }

    #[test]
    fn test_normalize() {
        let actions = validate_actions(ACTIONS).unwrap();
        let accepted = actions.check_call("enable", &params(&["token=1234"])).unwrap();
        assert_eq!(accepted["token"], Value::String("1234".into()));
    }

    #[test]
    fn test_string_args_kept_as_typed() {
        let actions = validate_actions(ACTIONS).unwrap();

        for token in &["1.0", "1e3", "0x1F", "007", "true", "~"] {
            let accepted = actions
                .check_args("enable", &[format!("token={}", token)])
                .unwrap();
            assert_eq!(accepted["token"], Value::String(token.to_string()));
        }
    }

    #[test]
    fn test_typed_args() {
        let actions = validate_actions(ACTIONS).unwrap();

        let accepted = actions
            .check_args("set-basic-users", &["users=a:b", "append=true"])
            .unwrap();
        assert_eq!(accepted["users"], Value::String("a:b".into()));
        assert_eq!(accepted["append"], Value::Boolean(true));

        let report = actions
            .check_args("set-basic-users", &["users", "append=sometimes"])
            .unwrap_err();
        assert_eq!(report.count(IssueKind::Structural), 2);
        assert_eq!(report.count(IssueKind::Type), 1);
    }

    #[test]
    fn test_mistyped() {
        let actions = validate_actions(ACTIONS).unwrap();
        let report = actions
            .check_call("set-basic-users", &params(&["users=a:b", "append=sometimes"]))
            .unwrap_err();
        assert_eq!(report.len(), 1);
        assert_eq!(report.count(IssueKind::Type), 1);
    }

    #[test]
    fn test_unknown() {
        let actions = validate_actions(ACTIONS).unwrap();

        let report = actions.check_call("reboot", &params(&[])).unwrap_err();
        assert_eq!(report.count(IssueKind::Reference), 1);

        let report = actions
            .check_call("restart", &params(&["force=true"]))
            .unwrap_err();
        assert_eq!(report.count(IssueKind::Reference), 1);
        assert!(report.issues()[0].message().contains("force"));
    }
}
