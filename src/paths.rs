//! Presents functions related to locating charm sources and lint settings

use std::env;
use std::path::{Path, PathBuf};

use dirs::{config_dir, home_dir};

/// Get a dir from an env var and subpath
fn dir_from_env(env_var: &str, base: Option<PathBuf>, suffix: PathBuf) -> PathBuf {
    env::var(env_var).map(PathBuf::from).unwrap_or_else(|_| {
        base.or_else(home_dir)
            .unwrap_or_else(|| PathBuf::from("/root"))
            .join(suffix)
    })
}

/// Where charms referenced by a bare local name live
pub fn charm_source_dir() -> PathBuf {
    dir_from_env("CHARM_SOURCE_DIR", None, "charms/source/".into())
}

/// Location of the lint settings file
pub fn settings_path() -> PathBuf {
    dir_from_env(
        "CHARM_LINT_CONFIG",
        config_dir(),
        PathBuf::from("charm-lint").join("config.yaml"),
    )
}

/// Resolve the path of a local charm referenced from a bundle
///
/// If the path starts with `.`, it's a relative path from the bundle. Otherwise,
/// look in `CHARM_SOURCE_DIR` for it. Absolute paths are taken as-is.
pub fn resolve_charm_path<P: AsRef<Path>>(bundle_path: P, source: &str) -> PathBuf {
    if source.starts_with('.') {
        bundle_path
            .as_ref()
            .parent()
            .map(|p| p.join(source))
            .unwrap_or_else(|| PathBuf::from(source))
    } else {
        charm_source_dir().join(source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_to_bundle() {
        let path = resolve_charm_path("deploy/bundle.yaml", "./charms/livepatch");
        assert_eq!(path, PathBuf::from("deploy/./charms/livepatch"));
    }

    #[test]
    fn test_absolute() {
        let path = resolve_charm_path("deploy/bundle.yaml", "/srv/charms/livepatch");
        assert_eq!(path, PathBuf::from("/srv/charms/livepatch"));
    }
}
