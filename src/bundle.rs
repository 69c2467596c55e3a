//! Parsing for bundle.yaml files

use std::collections::BTreeMap;
use std::fs::write;
use std::path::PathBuf;
use std::str::FromStr;

use ex::fs::read;
use serde_derive::{Deserialize, Serialize};
use serde_yaml::{from_slice, from_str, to_vec};

use crate::config::Value;
use crate::error::LintError;

/// An application within the bundle
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct Application {
    /// Where the charm comes from
    ///
    /// Either a store name such as `postgresql` or `ch:haproxy`, or a path to a
    /// local charm. Paths starting with `.` are relative to the bundle itself.
    /// Kept as text so that a bad value is reported along with everything else.
    pub charm: String,

    /// Store channel, e.g. `14/stable`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,

    /// Pinned store revision
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub series: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base: Option<String>,

    /// How many units to use for the application
    ///
    /// Subordinates leave this out. Untyped so that a count like `-1` or `three`
    /// gets reported instead of failing the parse.
    #[serde(
        default,
        rename = "num_units",
        alias = "scale",
        skip_serializing_if = "Option::is_none"
    )]
    pub num_units: Option<Value>,

    /// Constraints such as `cores=2 mem=4G`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraints: Option<String>,

    /// Config options, keyed by the charm's option names
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub options: BTreeMap<String, Value>,

    /// Whether to expose the application externally
    #[serde(default)]
    pub expose: bool,

    #[serde(default)]
    pub trust: bool,

    /// Resources to make available to the application, by revision or path
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub resources: BTreeMap<String, Value>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub storage: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub bindings: BTreeMap<String, String>,

    /// Machine placement directives
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub to: Vec<String>,

    /// Arbitrary annotations intepreted by things other than Juju itself
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

/// A machine declared for placement
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct Machine {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub series: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraints: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

/// Represents a `bundle.yaml` file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct Bundle {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Long-form description of the bundle
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// `kubernetes` for bundles targeting Kubernetes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bundle: Option<String>,

    /// Default OS series for the bundle's applications
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub series: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_base: Option<String>,

    /// The applications in the bundle
    #[serde(alias = "services")]
    pub applications: BTreeMap<String, Application>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub machines: BTreeMap<String, Option<Machine>>,

    /// Pairs of endpoint references that require a relation between them
    ///
    /// Each pair should have exactly two entries, which isn't enforced while
    /// parsing so that it can be reported per relation.
    #[serde(default)]
    pub relations: Vec<Vec<String>>,
}

impl Bundle {
    /// Load a bundle from the given path
    pub fn load<P: Into<PathBuf>>(path: P) -> Result<Self, LintError> {
        Ok(from_slice(&read(path.into())?)?)
    }

    /// Save this bundle to the given path
    pub fn save<P: Into<PathBuf>>(&self, path: P) -> Result<(), LintError> {
        write(path.into(), to_vec(self)?)?;
        Ok(())
    }

    /// Names of applications referenced by relations but not declared
    pub fn undeclared_applications(&self) -> Vec<String> {
        let mut missing: Vec<String> = self
            .relations
            .iter()
            .flatten()
            .map(|r| r.split(':').next().unwrap_or(r.as_str()).to_string())
            .filter(|app| !self.applications.contains_key(app))
            .collect();
        missing.sort();
        missing.dedup();
        missing
    }
}

impl FromStr for Bundle {
    type Err = LintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(from_str(s)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_services_alias() {
        let bundle: Bundle = r#"
services:
  livepatch:
    charm: canonical-livepatch-server
    scale: 2
relations: []
"#
        .parse()
        .unwrap();

        assert_eq!(
            bundle.applications["livepatch"].num_units,
            Some(Value::Integer(2))
        );
    }

    #[test]
    fn test_unknown_field() {
        let parsed: Result<Bundle, _> = "applications: {}\nflavour: spicy\n".parse();
        assert!(parsed.is_err());
    }

    #[test]
    fn test_undeclared() {
        let bundle: Bundle = r#"
applications:
  livepatch:
    charm: canonical-livepatch-server
relations:
  - [livepatch:database, postgresql:database]
  - [livepatch:database-legacy, postgresql:db]
  - [livepatch:website, haproxy]
"#
        .parse()
        .unwrap();

        assert_eq!(bundle.undeclared_applications(), vec!["haproxy", "postgresql"]);
    }
}
