//! A charm, as represented by its source directory

use std::path::PathBuf;

use ex::fs::read;
use serde_yaml::from_slice;
use tracing::debug;

use crate::actions::Actions;
use crate::config::Config;
use crate::error::LintError;
use crate::metadata::Metadata;

#[derive(Debug, Clone, PartialEq)]
pub struct CharmSource {
    /// The path to the charm's source code
    pub source: PathBuf,

    /// The charm's metadata.yaml file
    pub metadata: Metadata,

    /// The charm's config.yaml file
    pub config: Option<Config>,

    /// The charm's actions.yaml file
    pub actions: Option<Actions>,
}

impl CharmSource {
    /// Load a charm from its source directory
    ///
    /// Only metadata.yaml is required.
    pub fn load<P: Into<PathBuf>>(source: P) -> Result<Self, LintError> {
        let source = source.into();
        let metadata = from_slice(&read(source.join("metadata.yaml"))?)?;
        let config: Option<Config> = read(source.join("config.yaml"))
            .map(|bytes| from_slice(&bytes))
            .unwrap_or(Ok(None))?;
        let actions: Option<Actions> = read(source.join("actions.yaml"))
            .map(|bytes| from_slice(&bytes))
            .unwrap_or(Ok(None))?;

        debug!(
            source = %source.display(),
            config = config.is_some(),
            actions = actions.is_some(),
            "Loaded charm"
        );

        Ok(Self {
            source,
            metadata,
            config,
            actions,
        })
    }
}
