//! Validation of a bundle against itself and, where available, its charms

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::bundle::Bundle;
use crate::charm_ref::CharmRef;
use crate::charm_source::CharmSource;
use crate::config::{Config, Value};
use crate::constraints;
use crate::endpoint::EndpointRef;
use crate::graph::{RelationEdge, RelationGraph};
use crate::metadata::{CharmEndpoints, Direction, Endpoint};
use crate::paths::resolve_charm_path;
use crate::report::{Issue, Report};
use crate::settings::Settings;

/// What is known about a charm used by a bundle
#[derive(Debug, Clone, PartialEq)]
pub struct CharmInfo {
    pub endpoints: CharmEndpoints,
    pub config: Option<Config>,
}

impl CharmInfo {
    pub fn new(endpoints: CharmEndpoints) -> Self {
        CharmInfo {
            endpoints,
            config: None,
        }
    }

    pub fn with_config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    pub fn from_source(source: &CharmSource) -> Result<Self, Report> {
        Ok(CharmInfo {
            endpoints: source.metadata.validate()?,
            config: source.config.clone(),
        })
    }
}

/// Charms available for cross-checking, by charm name or by the application using them
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    by_charm: HashMap<String, CharmInfo>,
    by_application: HashMap<String, CharmInfo>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_charm(&mut self, info: CharmInfo) {
        self.by_charm.insert(info.endpoints.charm.clone(), info);
    }

    pub fn insert_application(&mut self, application: &str, info: CharmInfo) {
        self.by_application.insert(application.to_string(), info);
    }

    pub fn is_empty(&self) -> bool {
        self.by_charm.is_empty() && self.by_application.is_empty()
    }

    pub fn lookup(&self, application: &str, charm: Option<&CharmRef>) -> Option<&CharmInfo> {
        self.by_application.get(application).or_else(|| {
            charm
                .and_then(CharmRef::store_name)
                .and_then(|name| self.by_charm.get(name))
        })
    }

    /// Load a charm directory into the catalog, logging rather than failing if it can't be used
    fn load_dir(&mut self, path: &Path, application: Option<&str>) {
        let info = match CharmSource::load(path) {
            Ok(source) => CharmInfo::from_source(&source),
            Err(err) => {
                warn!(path = %path.display(), "Couldn't load charm: {}", err);
                return;
            }
        };

        match (info, application) {
            (Ok(info), Some(app)) => self.insert_application(app, info),
            (Ok(info), None) => self.insert_charm(info),
            (Err(report), _) => warn!(
                path = %path.display(),
                issues = report.len(),
                "Charm metadata is invalid, not using it for cross-checks"
            ),
        }
    }

    /// Gather the charms a bundle on disk refers to
    ///
    /// Local charms are resolved relative to the bundle, and `charm_dirs` from the
    /// settings plus `extra_dirs` are loaded by charm name.
    pub fn for_bundle(
        bundle: &Bundle,
        bundle_path: &Path,
        settings: &Settings,
        extra_dirs: &[PathBuf],
    ) -> Self {
        let mut catalog = Catalog::new();

        for dir in settings.charm_dirs.values().chain(extra_dirs) {
            catalog.load_dir(dir, None);
        }

        for (name, app) in &bundle.applications {
            if let Ok(CharmRef::Local(source)) = CharmRef::parse(&app.charm) {
                catalog.load_dir(&resolve_charm_path(bundle_path, &source), Some(name));
            }
        }

        catalog
    }
}

/// Checks bundles for consistency
#[derive(Debug, Clone)]
pub struct BundleValidator<'a> {
    settings: &'a Settings,
    catalog: Catalog,
}

fn endpoint_candidates<'c>(
    reference: &EndpointRef,
    info: &'c CharmInfo,
) -> Result<Vec<&'c Endpoint>, Issue> {
    match &reference.endpoint {
        Some(name) => info.endpoints.get(name).map(|e| vec![e]).ok_or_else(|| {
            Issue::Reference(format!(
                "application `{}` (charm `{}`) has no endpoint `{}`",
                reference.application, info.endpoints.charm, name
            ))
        }),
        None => Ok(info
            .endpoints
            .iter()
            .filter(|e| e.direction != Direction::Peer)
            .collect()),
    }
}

/// Pick the endpoints a relation binds, when both charms are known
fn resolve_known(
    a: &EndpointRef,
    b: &EndpointRef,
    info_a: &CharmInfo,
    info_b: &CharmInfo,
) -> Result<RelationEdge, Issue> {
    let candidates_a = endpoint_candidates(a, info_a)?;
    let candidates_b = endpoint_candidates(b, info_b)?;

    let mut pairs: Vec<(&Endpoint, &Endpoint)> = candidates_a
        .iter()
        .flat_map(|ea| candidates_b.iter().map(move |eb| (*ea, *eb)))
        .filter(|(ea, eb)| ea.direction != Direction::Peer && ea.compatible_with(eb))
        .collect();

    // Juju only falls back to juju-info if nothing else fits
    if pairs.len() > 1 && pairs.iter().any(|(ea, eb)| !ea.implicit && !eb.implicit) {
        pairs.retain(|(ea, eb)| !ea.implicit && !eb.implicit);
    }

    match pairs.as_slice() {
        [(ea, eb)] => Ok(RelationEdge {
            a: EndpointRef::new(a.application.as_str(), Some(ea.name.as_str())),
            b: EndpointRef::new(b.application.as_str(), Some(eb.name.as_str())),
            interface: Some(ea.interface.clone()),
        }),
        [] => match (&a.endpoint, &b.endpoint) {
            (Some(_), Some(_)) if candidates_a[0].interface != candidates_b[0].interface => {
                Err(Issue::Type(format!(
                    "`{}` speaks `{}` but `{}` speaks `{}`",
                    a, candidates_a[0].interface, b, candidates_b[0].interface
                )))
            }
            _ => Err(Issue::Reference(format!(
                "no compatible endpoints between `{}` and `{}`",
                a, b
            ))),
        },
        many => Err(Issue::Conflict(format!(
            "ambiguous relation, could be any of {}",
            many.iter()
                .map(|(ea, eb)| format!(
                    "{}:{} <-> {}:{}",
                    a.application, ea.name, b.application, eb.name
                ))
                .collect::<Vec<_>>()
                .join(", ")
        ))),
    }
}

/// Check what can be checked when at most one side's charm is known
fn resolve_partial(
    a: &EndpointRef,
    b: &EndpointRef,
    info_a: Option<&CharmInfo>,
    info_b: Option<&CharmInfo>,
) -> Result<RelationEdge, Issue> {
    let mut interface = None;

    for (reference, info) in [(a, info_a), (b, info_b)].iter() {
        if let (Some(info), Some(_)) = (info, &reference.endpoint) {
            let endpoint = endpoint_candidates(reference, info)?;
            interface = Some(endpoint[0].interface.clone());
        }
    }

    Ok(RelationEdge {
        a: a.clone(),
        b: b.clone(),
        interface,
    })
}

impl<'a> BundleValidator<'a> {
    pub fn new(settings: &'a Settings) -> Self {
        BundleValidator {
            settings,
            catalog: Catalog::new(),
        }
    }

    pub fn with_catalog(mut self, catalog: Catalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// Make a charm available for cross-checking applications that use it
    pub fn with_charm(mut self, info: CharmInfo) -> Self {
        self.catalog.insert_charm(info);
        self
    }

    /// Parse and validate bundle.yaml text
    pub fn validate_str(&self, text: &str) -> Result<RelationGraph, Report> {
        let bundle: Bundle = serde_yaml::from_str(text)
            .map_err(|err| Report::structural(format!("invalid bundle.yaml: {}", err)))?;
        self.validate(&bundle)
    }

    /// Validate a bundle, returning its relation graph or every issue found
    pub fn validate(&self, bundle: &Bundle) -> Result<RelationGraph, Report> {
        let mut report = Report::new();
        let mut graph = RelationGraph::new();
        let mut known: HashMap<&str, &CharmInfo> = HashMap::new();

        for (name, app) in &bundle.applications {
            let context = format!("application `{}`", name);
            graph.add_application(name);

            let charm = match CharmRef::parse(&app.charm) {
                Ok(charm) => Some(charm),
                Err(err) => {
                    report.push(Issue::Structural(err).within(&context));
                    None
                }
            };

            if let Some(c) = &app.constraints {
                let issues = constraints::check(c, &self.settings.extra_constraint_keys);
                report.extend(issues.into_iter().map(|i| i.within(&context)));
            }

            let units = match &app.num_units {
                None | Some(Value::None) => None,
                Some(Value::Integer(n)) if *n >= 0 => Some(*n),
                Some(other) => {
                    report.push(
                        Issue::Type(format!(
                            "num_units is `{}`, which isn't a non-negative integer",
                            other
                        ))
                        .within(&context),
                    );
                    None
                }
            };

            match self.catalog.lookup(name, charm.as_ref()) {
                Some(info) => {
                    if info.endpoints.subordinate && units.unwrap_or(0) > 0 {
                        report.push(
                            Issue::Conflict(format!(
                                "charm `{}` is a subordinate, but units are declared",
                                info.endpoints.charm
                            ))
                            .within(&context),
                        );
                    }

                    if let Some(config) = &info.config {
                        let issues = config.check_options(&app.options);
                        report.extend(issues.into_iter().map(|i| i.within(&context)));
                    }

                    known.insert(name.as_str(), info);
                }
                None => {
                    if !self.catalog.is_empty() {
                        warn!(
                            application = name.as_str(),
                            charm = app.charm.as_str(),
                            "No metadata for charm, skipping endpoint checks"
                        );
                    }
                }
            }
        }

        // Number of relations per endpoint, by application
        let mut wired: BTreeMap<String, BTreeMap<String, u32>> = BTreeMap::new();

        for (i, pair) in bundle.relations.iter().enumerate() {
            let context = format!("relation #{} [{}]", i + 1, pair.join(", "));

            if pair.len() != 2 {
                report.push(
                    Issue::Structural(format!("has {} entries instead of 2", pair.len()))
                        .within(&context),
                );
                continue;
            }

            let parsed: Vec<Result<EndpointRef, String>> =
                pair.iter().map(|r| EndpointRef::parse(r)).collect();
            if parsed.iter().any(Result::is_err) {
                for err in parsed.into_iter().filter_map(Result::err) {
                    report.push(Issue::Structural(err).within(&context));
                }
                continue;
            }
            let mut refs = parsed.into_iter().filter_map(Result::ok);
            let (a, b) = match (refs.next(), refs.next()) {
                (Some(a), Some(b)) => (a, b),
                _ => continue,
            };

            let mut missing: Vec<&str> = vec![a.application.as_str(), b.application.as_str()];
            missing.dedup();
            missing.retain(|app| !bundle.applications.contains_key(*app));
            if !missing.is_empty() {
                for app in missing {
                    report.push(
                        Issue::Reference(format!("application `{}` is not in the bundle", app))
                            .within(&context),
                    );
                }
                continue;
            }

            let info_a = known.get(a.application.as_str()).copied();
            let info_b = known.get(b.application.as_str()).copied();
            let resolved = match (info_a, info_b) {
                (Some(ia), Some(ib)) => resolve_known(&a, &b, ia, ib),
                _ => resolve_partial(&a, &b, info_a, info_b),
            };

            let edge = match resolved {
                Ok(edge) => edge,
                Err(issue) => {
                    report.push(issue.within(&context));
                    continue;
                }
            };

            debug!(relation = %context, resolved = %edge, "Resolved relation");

            let sides = [
                (edge.a.application.clone(), edge.a.endpoint.clone()),
                (edge.b.application.clone(), edge.b.endpoint.clone()),
            ];

            if !graph.add_relation(edge) {
                report.push(Issue::Conflict("duplicates an earlier relation".into()).within(&context));
                continue;
            }

            for (app, endpoint) in sides.iter() {
                if let Some(endpoint) = endpoint {
                    *wired
                        .entry(app.clone())
                        .or_default()
                        .entry(endpoint.clone())
                        .or_default() += 1;
                }
            }
        }

        for (app, endpoints) in &wired {
            let context = format!("application `{}`", app);
            let info = known.get(app.as_str()).copied();

            // Exclusivity binds requirers only. Without metadata every endpoint counts.
            let requires = |name: &str| match info.and_then(|i| i.endpoints.get(name)) {
                Some(endpoint) => endpoint.direction == Direction::Requires,
                None => info.is_none(),
            };

            for group in &self.settings.exclusive_endpoints {
                let present: Vec<&str> = group
                    .iter()
                    .map(String::as_str)
                    .filter(|name| endpoints.contains_key(*name) && requires(name))
                    .collect();

                if present.len() > 1 {
                    report.push(
                        Issue::Conflict(format!(
                            "endpoints `{}` can't be related at the same time",
                            present.join("`, `")
                        ))
                        .within(&context),
                    );
                }
            }

            if let Some(info) = info {
                for (name, count) in endpoints {
                    let limit = info.endpoints.get(name).and_then(|e| e.limit);
                    if let Some(limit) = limit {
                        if *count > limit {
                            report.push(
                                Issue::Conflict(format!(
                                    "endpoint `{}` has {} relations, but its limit is {}",
                                    name, count, limit
                                ))
                                .within(&context),
                            );
                        }
                    }
                }
            }
        }

        info!(
            applications = graph.application_count(),
            relations = graph.relation_count(),
            issues = report.len(),
            "Validated bundle"
        );

        report.into_result(graph)
    }
}
