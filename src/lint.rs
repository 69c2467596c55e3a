//! Linting of descriptor files on disk, one at a time or in bulk

use std::path::{Path, PathBuf};

use ex::fs::read_to_string;
use rayon::prelude::*;
use tracing::{debug, info};

use crate::actions::validate_actions;
use crate::bundle::Bundle;
use crate::config::validate_config;
use crate::graph::RelationGraph;
use crate::metadata::validate_metadata;
use crate::report::Report;
use crate::settings::Settings;
use crate::validate::{BundleValidator, Catalog};

/// What sort of descriptor a file holds, judging by its name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorKind {
    Metadata,
    Actions,
    Config,
    Bundle,
}

impl DescriptorKind {
    pub fn detect<P: AsRef<Path>>(path: P) -> Self {
        match path.as_ref().file_name().and_then(|n| n.to_str()) {
            Some("metadata.yaml") | Some("metadata.yml") => DescriptorKind::Metadata,
            Some("actions.yaml") | Some("actions.yml") => DescriptorKind::Actions,
            Some("config.yaml") | Some("config.yml") => DescriptorKind::Config,
            _ => DescriptorKind::Bundle,
        }
    }
}

/// Validate bundle text read from `path`, cross-checking charms found next to
/// it and in `extra_dirs`
///
/// Text that isn't a bundle at all gives a single structural issue.
pub fn validate_bundle_text(
    text: &str,
    path: &Path,
    settings: &Settings,
    extra_dirs: &[PathBuf],
) -> Result<RelationGraph, Report> {
    let bundle: Bundle = serde_yaml::from_str(text)
        .map_err(|err| Report::structural(format!("invalid bundle.yaml: {}", err)))?;

    let catalog = Catalog::for_bundle(&bundle, path, settings, extra_dirs);
    BundleValidator::new(settings)
        .with_catalog(catalog)
        .validate(&bundle)
}

/// Lint a single descriptor file
///
/// A file that can't be read is reported as a structural issue, so that one bad
/// path doesn't hide the results for the rest.
pub fn lint_file<P: AsRef<Path>>(path: P, settings: &Settings) -> Report {
    let path = path.as_ref();
    let text = match read_to_string(path) {
        Ok(text) => text,
        Err(err) => return Report::structural(format!("couldn't read file: {}", err)),
    };

    let kind = DescriptorKind::detect(path);
    debug!(path = %path.display(), kind = ?kind, "Linting");

    match kind {
        DescriptorKind::Metadata => validate_metadata(&text).err().unwrap_or_default(),
        DescriptorKind::Actions => validate_actions(&text).err().unwrap_or_default(),
        DescriptorKind::Config => validate_config(&text).err().unwrap_or_default(),
        DescriptorKind::Bundle => validate_bundle_text(&text, path, settings, &[])
            .err()
            .unwrap_or_default(),
    }
}

/// Lint every given file in parallel, returning their reports in the same order
pub fn lint_paths(paths: &[PathBuf], settings: &Settings) -> Vec<(PathBuf, Report)> {
    let results: Vec<(PathBuf, Report)> = paths
        .par_iter()
        .map(|path| (path.clone(), lint_file(path, settings)))
        .collect();

    info!(
        files = results.len(),
        failed = results.iter().filter(|(_, r)| !r.is_ok()).count(),
        "Linted files"
    );

    results
}
