//! Parsing and validation for a charm's metadata.yaml file
//!
//! See https://juju.is/docs/sdk/metadata-reference

use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use ex::fs::read;
use serde::de::{Deserializer, MapAccess, Visitor};
use serde::ser::{SerializeMap, Serializer};
use serde_derive::{Deserialize, Serialize};
use serde_yaml::{from_slice, from_str};
use tracing::debug;

use crate::config::Value;
use crate::error::LintError;
use crate::report::{Issue, Report};

/// Name and interface of the endpoint every charm provides without declaring it
pub const JUJU_INFO: &str = "juju-info";

/// Which side of a relation an endpoint sits on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Direction {
    Provides,
    Requires,
    Peer,
}

impl Direction {
    /// Whether an endpoint on this side can be related to one on `other`
    pub fn pairs_with(self, other: Direction) -> bool {
        match (self, other) {
            (Direction::Provides, Direction::Requires) => true,
            (Direction::Requires, Direction::Provides) => true,
            (Direction::Peer, Direction::Peer) => true,
            _ => false,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Direction::Provides => "provides",
            Direction::Requires => "requires",
            Direction::Peer => "peers",
        })
    }
}

/// Scope of a given relation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub enum RelationScope {
    Global,
    Container,
}

impl Default for RelationScope {
    fn default() -> Self {
        Self::Global
    }
}

fn is_false(b: &bool) -> bool {
    !*b
}

/// An endpoint as written under `requires`, `provides` or `peers`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "kebab-case")]
pub struct RelationSpec {
    /// The interface protocol that this endpoint speaks
    #[serde(default)]
    pub interface: String,

    /// Maximum number of supported connections to this endpoint
    ///
    /// Kept untyped so that nonsensical values get reported rather than failing the parse.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<Value>,

    /// Defines if the relation is required
    ///
    /// Informational only.
    #[serde(default, skip_serializing_if = "is_false")]
    pub optional: bool,

    /// The scope of the relation. Defaults to "global"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<RelationScope>,
}

/// Endpoints in the order they were declared
///
/// Duplicated names are kept, so that they can be reported instead of silently
/// replacing each other.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EndpointMap(pub Vec<(String, RelationSpec)>);

impl EndpointMap {
    pub fn iter(&self) -> impl Iterator<Item = &(String, RelationSpec)> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl serde::Serialize for EndpointMap {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, spec) in &self.0 {
            map.serialize_entry(name, spec)?;
        }
        map.end()
    }
}

struct EndpointMapVisitor;

impl<'de> Visitor<'de> for EndpointMapVisitor {
    type Value = EndpointMap;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a map of endpoint names to endpoint definitions")
    }

    // `requires:` with nothing under it
    fn visit_unit<E>(self) -> Result<Self::Value, E> {
        Ok(EndpointMap::default())
    }

    fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut entries = Vec::new();
        while let Some((name, spec)) = access.next_entry::<String, Option<RelationSpec>>()? {
            entries.push((name, spec.unwrap_or_default()));
        }
        Ok(EndpointMap(entries))
    }
}

impl<'de> serde::Deserialize<'de> for EndpointMap {
    fn deserialize<D>(deserializer: D) -> Result<EndpointMap, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(EndpointMapVisitor)
    }
}

/// A charm's metadata.yaml file
///
/// Only the keys that matter for wiring applications together are modelled,
/// anything else in the file is ignored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct Metadata {
    /// The name of the charm
    pub name: String,

    /// A short, one-line description of the charm
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,

    /// A full description of the charm
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// True if the charm is meant to be deployed as a subordinate to a principal charm
    #[serde(default, skip_serializing_if = "is_false")]
    pub subordinate: bool,

    /// Relations required by this charm
    #[serde(default, skip_serializing_if = "EndpointMap::is_empty")]
    pub requires: EndpointMap,

    /// Relations provided by this charm
    #[serde(default, skip_serializing_if = "EndpointMap::is_empty")]
    pub provides: EndpointMap,

    /// Mutual relations between units of this charm
    #[serde(default, skip_serializing_if = "EndpointMap::is_empty")]
    pub peers: EndpointMap,
}

impl Metadata {
    pub fn load<P: Into<PathBuf>>(path: P) -> Result<Self, LintError> {
        Ok(from_slice(&read(path.into())?)?)
    }

    pub fn to_yaml(&self) -> Result<String, LintError> {
        Ok(serde_yaml::to_string(self)?)
    }

    fn groups(&self) -> [(Direction, &EndpointMap); 3] {
        [
            (Direction::Requires, &self.requires),
            (Direction::Provides, &self.provides),
            (Direction::Peer, &self.peers),
        ]
    }

    /// Check every endpoint, returning the full set of problems if there are any
    pub fn validate(&self) -> Result<CharmEndpoints, Report> {
        let mut report = Report::new();
        let mut endpoints = Vec::new();

        if self.name.trim().is_empty() {
            report.push(Issue::Structural("charm name is empty".into()));
        }

        for (direction, group) in self.groups().iter() {
            let mut seen = HashSet::new();

            for (name, spec) in group.iter() {
                let context = format!("{} endpoint `{}`", direction, name);

                if !seen.insert(name.as_str()) {
                    report.push(Issue::Conflict(format!(
                        "{} is declared more than once",
                        context
                    )));
                    continue;
                }

                if spec.interface.trim().is_empty() {
                    report.push(Issue::Structural(format!(
                        "{} has no interface",
                        context
                    )));
                }

                let limit = match &spec.limit {
                    None | Some(Value::None) => None,
                    Some(Value::Integer(l)) if *l > 0 && *l <= i64::from(u32::max_value()) => {
                        Some(*l as u32)
                    }
                    Some(other) => {
                        report.push(Issue::Type(format!(
                            "{} has limit `{}`, which isn't a positive integer",
                            context, other
                        )));
                        None
                    }
                };

                endpoints.push(Endpoint {
                    name: name.clone(),
                    direction: *direction,
                    interface: spec.interface.clone(),
                    limit,
                    optional: spec.optional,
                    scope: spec.scope.unwrap_or_default(),
                    implicit: false,
                });
            }
        }

        if !endpoints.iter().any(|e| e.name == JUJU_INFO) {
            endpoints.push(Endpoint::juju_info());
        }

        debug!(
            charm = self.name.as_str(),
            endpoints = endpoints.len(),
            issues = report.len(),
            "Validated metadata"
        );

        report.into_result(CharmEndpoints {
            charm: self.name.clone(),
            subordinate: self.subordinate,
            endpoints,
        })
    }
}

impl FromStr for Metadata {
    type Err = LintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(from_str(s)?)
    }
}

/// Parse and validate metadata.yaml text in one go
pub fn validate_metadata(text: &str) -> Result<CharmEndpoints, Report> {
    let metadata: Metadata = from_str(text)
        .map_err(|err| Report::structural(format!("invalid metadata.yaml: {}", err)))?;
    metadata.validate()
}

/// A named point of integration on a charm, after validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub name: String,
    pub direction: Direction,
    pub interface: String,
    pub limit: Option<u32>,
    pub optional: bool,
    pub scope: RelationScope,

    /// Not written in metadata.yaml, Juju adds it to every charm
    pub implicit: bool,
}

impl Endpoint {
    fn juju_info() -> Self {
        Endpoint {
            name: JUJU_INFO.into(),
            direction: Direction::Provides,
            interface: JUJU_INFO.into(),
            limit: None,
            optional: true,
            scope: RelationScope::Global,
            implicit: true,
        }
    }

    /// Whether this endpoint can be related to `other`
    pub fn compatible_with(&self, other: &Endpoint) -> bool {
        self.interface == other.interface && self.direction.pairs_with(other.direction)
    }
}

/// The validated endpoints of one charm
#[derive(Debug, Clone, PartialEq)]
pub struct CharmEndpoints {
    pub charm: String,
    pub subordinate: bool,
    endpoints: Vec<Endpoint>,
}

impl CharmEndpoints {
    pub fn get(&self, name: &str) -> Option<&Endpoint> {
        self.endpoints.iter().find(|e| e.name == name)
    }

    /// All endpoints, including implicit ones
    pub fn iter(&self) -> impl Iterator<Item = &Endpoint> {
        self.endpoints.iter()
    }

    /// Endpoints as written in metadata.yaml
    pub fn declared(&self) -> impl Iterator<Item = &Endpoint> {
        self.endpoints.iter().filter(|e| !e.implicit)
    }

    /// Rebuild the metadata this was validated from, minus anything not wiring related
    pub fn to_metadata(&self) -> Metadata {
        let mut metadata = Metadata {
            name: self.charm.clone(),
            summary: None,
            description: None,
            subordinate: self.subordinate,
            requires: EndpointMap::default(),
            provides: EndpointMap::default(),
            peers: EndpointMap::default(),
        };

        for endpoint in self.declared() {
            let spec = RelationSpec {
                interface: endpoint.interface.clone(),
                limit: endpoint.limit.map(|l| Value::Integer(i64::from(l))),
                optional: endpoint.optional,
                scope: match endpoint.scope {
                    RelationScope::Global => None,
                    RelationScope::Container => Some(RelationScope::Container),
                },
            };
            let group = match endpoint.direction {
                Direction::Requires => &mut metadata.requires,
                Direction::Provides => &mut metadata.provides,
                Direction::Peer => &mut metadata.peers,
            };
            group.0.push((endpoint.name.clone(), spec));
        }

        metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::IssueKind;

    const LIVEPATCH: &str = r#"
name: canonical-livepatch-server
summary: Livepatch on-prem server
requires:
  database:
    interface: postgresql_client
    limit: 1
  database-legacy:
    interface: pgsql
    limit: 1
provides:
  website:
    interface: http
peers:
  livepatch:
    interface: livepatch
"#;

    #[test]
    fn test_valid() {
        let endpoints = validate_metadata(LIVEPATCH).unwrap();

        assert_eq!(endpoints.charm, "canonical-livepatch-server");
        assert_eq!(endpoints.declared().count(), 4);

        let database = endpoints.get("database").unwrap();
        assert_eq!(database.direction, Direction::Requires);
        assert_eq!(database.interface, "postgresql_client");
        assert_eq!(database.limit, Some(1));

        let info = endpoints.get(JUJU_INFO).unwrap();
        assert!(info.implicit);
        assert_eq!(info.direction, Direction::Provides);
    }

    #[test]
    fn test_reports_every_problem() {
        let text = r#"
name: broken
requires:
  database:
    interface: ""
  cache:
    interface: redis
    limit: 0
  database:
    interface: pgsql
provides:
  metrics: {}
"#;
        let report = validate_metadata(text).unwrap_err();

        assert_eq!(report.len(), 4);
        assert_eq!(report.count(IssueKind::Structural), 2);
        assert_eq!(report.count(IssueKind::Type), 1);
        assert_eq!(report.count(IssueKind::Conflict), 1);
    }

    #[test]
    fn test_untyped_limit_reported_with_the_rest() {
        let text = r#"
name: sloppy
requires:
  a:
    interface: ""
  b:
    interface: http
    limit: two
  c:
    interface: http
    limit: 1.5
"#;
        let report = validate_metadata(text).unwrap_err();

        assert_eq!(report.len(), 3);
        assert_eq!(report.count(IssueKind::Structural), 1);
        assert_eq!(report.count(IssueKind::Type), 2);
        assert!(report.issues()[1].message().contains("`two`"));
    }

    #[test]
    fn test_same_name_in_different_groups() {
        let text = r#"
name: twin
requires:
  link:
    interface: link
provides:
  link:
    interface: link
"#;
        assert!(validate_metadata(text).is_ok());
    }

    #[test]
    fn test_empty_groups() {
        let text = "name: bare\nrequires:\nprovides:\n";
        let endpoints = validate_metadata(text).unwrap();
        assert_eq!(endpoints.declared().count(), 0);
        assert_eq!(endpoints.iter().count(), 1);
    }

    #[test]
    fn test_unparseable() {
        let report = validate_metadata("requires: [1, 2]").unwrap_err();
        assert_eq!(report.len(), 1);
        assert_eq!(report.count(IssueKind::Structural), 1);
    }

    #[test]
    fn test_round_trip() {
        let endpoints = validate_metadata(LIVEPATCH).unwrap();
        let text = endpoints.to_metadata().to_yaml().unwrap();
        let again = validate_metadata(&text).unwrap();

        assert_eq!(again, endpoints);
    }

    #[test]
    fn test_compatible() {
        let endpoints = validate_metadata(LIVEPATCH).unwrap();
        let website = endpoints.get("website").unwrap();

        let mut reverseproxy = website.clone();
        reverseproxy.name = "reverseproxy".into();
        reverseproxy.direction = Direction::Requires;

        assert!(website.compatible_with(&reverseproxy));
        assert!(!website.compatible_with(website));
    }
}
