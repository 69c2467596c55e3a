//! Lint settings, read from `$CHARM_LINT_CONFIG` or the user's config dir

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use ex::fs::read;
use serde_derive::{Deserialize, Serialize};
use serde_yaml::from_slice;
use tracing::debug;

use crate::error::LintError;
use crate::paths::settings_path;

/// Endpoints that can't be wired at the same time on one application
pub const DATABASE_ENDPOINTS: [&str; 2] = ["database", "database-legacy"];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct Settings {
    /// Groups of endpoint names of which only one may be related per application
    pub exclusive_endpoints: Vec<Vec<String>>,

    /// Constraint keys to accept on top of the ones Juju knows about
    pub extra_constraint_keys: Vec<String>,

    /// Local checkouts of store charms, by charm name
    ///
    /// Used to cross-check bundles against charm metadata and config.
    pub charm_dirs: BTreeMap<String, PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            exclusive_endpoints: vec![DATABASE_ENDPOINTS.iter().map(|s| s.to_string()).collect()],
            extra_constraint_keys: vec![],
            charm_dirs: BTreeMap::new(),
        }
    }
}

impl Settings {
    /// Load settings from the default location, falling back to the defaults
    pub fn load() -> Result<Self, LintError> {
        Self::load_from(settings_path())
    }

    /// Load settings from the given path, falling back to the defaults if it doesn't exist
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, LintError> {
        let path = path.as_ref();
        if !path.exists() {
            debug!(path = %path.display(), "No settings file, using defaults");
            return Ok(Self::default());
        }

        let bytes = read(path)?;
        from_slice(&bytes)
            .map_err(|err| LintError::SettingsError(path.display().to_string(), err.to_string()))
    }
}
