//! Migration of legacy Livepatch server config to the dotted option names

use std::collections::BTreeMap;
use std::fs::write;
use std::path::Path;

use ex::fs::read;
use serde_derive::Serialize;
use serde_yaml::{from_slice, to_vec, Mapping, Value};
use tracing::{debug, info};

use crate::error::LintError;

/// Legacy option name to its new name, or `None` if the option is gone
const RENAMED: &[(&str, Option<&str>)] = &[
    ("auth_basic_users", Some("auth.basic.users")),
    ("auth_lp_teams", Some("auth.sso.teams")),
    ("auth_sso_location", Some("auth.sso.url")),
    ("auth_sso_public_key", Some("auth.sso.public-key")),
    ("blocklist_cache_refresh", Some("patch-blocklist.refresh-interval")),
    ("burst_limit", Some("server.burst-limit")),
    ("cloud_delay_default_delay_hours", Some("cloud_delay.default_delay_hours")),
    ("concurrency_limit", Some("server.concurrency-limit")),
    ("contract_server_password", Some("contracts.password")),
    ("contract_server_url", Some("contracts.url")),
    ("contract_server_user", Some("contracts.user")),
    ("dbconn_max_lifetime", Some("database.connection-lifetime-max")),
    ("dbconn_max", Some("database.connection-pool-max")),
    ("event_bus_brokers", Some("machine-reports.event-bus.brokers")),
    ("event_bus_ca_cert", Some("machine-reports.event-bus.ca-cert")),
    ("event_bus_client_cert", Some("machine-reports.event-bus.client-cert")),
    ("event_bus_client_key", Some("machine-reports.event-bus.client-key")),
    ("http_proxy", Some("patch-sync.proxy.http")),
    ("https_proxy", Some("patch-sync.proxy.https")),
    ("influxdb_bucket", Some("influx.bucket")),
    ("influxdb_organization", Some("influx.organization")),
    ("influxdb_token", Some("influx.token")),
    ("influxdb_url", Some("influx.url")),
    ("is_cloud_delay_enabled", Some("cloud_delay.enabled")),
    ("kpi_reports", Some("kpi-reports.interval")),
    ("log_level", Some("server.log-level")),
    ("no_proxy", Some("patch-sync.proxy.no-proxy")),
    ("patch_cache_on", Some("patch-cache.enabled")),
    ("patch_cache_size", Some("patch-cache.cache-size")),
    ("patch_cache_ttl", Some("patch-cache.cache-ttl")),
    ("patch_sync_enabled", Some("patch-sync.enabled")),
    ("patchstore", Some("patch-storage.type")),
    ("profiler_block_profile_rate", Some("profiler.block_profile_rate")),
    ("profiler_enabled", Some("profiler.enabled")),
    ("profiler_hostname", Some("profiler.hostname")),
    ("profiler_mutex_profile_fraction", Some("profiler.mutex_profile_fraction")),
    ("profiler_profile_allocations", Some("profiler.profile_allocations")),
    ("profiler_profile_blocks", Some("profiler.profile_blocks")),
    ("profiler_profile_goroutines", Some("profiler.profile_goroutine")),
    ("profiler_profile_inuse", Some("profiler.profile_inuse")),
    ("profiler_profile_mutexes", Some("profiler.profile_mutexes")),
    ("profiler_sample_rate", Some("profiler.sample_rate")),
    ("profiler_server_address", Some("profiler.server_address")),
    ("profiler_upload_rate", Some("profiler.upload_rate")),
    ("psql_dbname", Some("database.name")),
    ("psql_roles", None),
    ("report_cleanup_interval", Some("machine-reports.database.cleanup-interval")),
    ("report_cleanup_row_limit", Some("machine-reports.database.cleanup-row-limit")),
    ("report_retention", Some("machine-reports.database.retention-days")),
    ("s3_access_key_id", Some("patch-storage.s3-access-key")),
    ("s3_bucket", Some("patch-storage.s3-bucket")),
    ("s3_endpoint", Some("patch-storage.s3-endpoint")),
    ("s3_region", Some("patch-storage.s3-region")),
    ("s3_secret_key", Some("patch-storage.s3-secret-key")),
    ("s3_secure", Some("patch-storage.s3-secure")),
    ("storage_path", Some("patch-storage.filesystem-path")),
    ("swift_apikey", Some("patch-storage.swift-api-key")),
    ("swift_auth_url", Some("patch-storage.swift-auth-url")),
    ("swift_container_name", Some("patch-storage.swift-container")),
    ("swift_domain_name", Some("patch-storage.swift-domain")),
    ("swift_region_name", Some("patch-storage.swift-region")),
    ("swift_tenant_name", Some("patch-storage.swift-tenant")),
    ("swift_username", Some("patch-storage.swift-username")),
    ("sync_flavors", Some("patch-sync.flavors")),
    ("sync_identity", None),
    ("sync_interval", Some("patch-sync.interval")),
    ("sync_minimum_kernel_version", Some("patch-sync.minimum-kernel-version")),
    ("sync_tier", None),
    ("sync_token", Some("patch-sync.token")),
    ("sync_upstream_tier", None),
    ("sync_upstream", Some("patch-sync.upstream-url")),
    ("url_template", Some("server.url-template")),
];

/// What setting a legacy option turns on alongside its own value
#[derive(Debug, Clone, Copy, PartialEq)]
enum Companion {
    Enabled(&'static str),
    Set(&'static str, &'static str),
}

const COMPANIONS: &[(&str, Companion)] = &[
    ("auth_basic_users", Companion::Enabled("auth.basic.enabled")),
    ("auth_lp_teams", Companion::Enabled("auth.sso.enabled")),
    ("auth_sso_location", Companion::Enabled("auth.sso.enabled")),
    ("auth_sso_public_key", Companion::Enabled("auth.sso.enabled")),
    ("blocklist_cache_refresh", Companion::Enabled("patch-blocklist.enabled")),
    ("contract_server_password", Companion::Enabled("contracts.enabled")),
    ("contract_server_user", Companion::Enabled("contracts.enabled")),
    ("event_bus_brokers", Companion::Enabled("machine-reports.event-bus.enabled")),
    ("event_bus_ca_cert", Companion::Enabled("machine-reports.event-bus.enabled")),
    ("event_bus_client_cert", Companion::Enabled("machine-reports.event-bus.enabled")),
    ("event_bus_client_key", Companion::Enabled("machine-reports.event-bus.enabled")),
    ("filebacked", Companion::Set("patch-storage.type", "filesystem")),
    ("http_proxy", Companion::Enabled("patch-sync.proxy.enabled")),
    ("https_proxy", Companion::Enabled("patch-sync.proxy.enabled")),
    ("kpi_reports", Companion::Enabled("kpi-reports.enabled")),
    ("no_proxy", Companion::Enabled("patch-sync.proxy.enabled")),
    ("sync_architectures", Companion::Enabled("patch-sync.enabled")),
    ("sync_flavors", Companion::Enabled("patch-sync.enabled")),
    ("sync_interval", Companion::Enabled("patch-sync.enabled")),
    ("sync_minimum_kernel_version", Companion::Enabled("patch-sync.enabled")),
    ("sync_token", Companion::Enabled("patch-sync.enabled")),
    ("sync_upstream", Companion::Enabled("patch-sync.enabled")),
];

fn renamed(key: &str) -> Option<Option<&'static str>> {
    RENAMED.iter().find(|(k, _)| *k == key).map(|(_, v)| *v)
}

fn companion(key: &str) -> Option<Companion> {
    COMPANIONS.iter().find(|(k, _)| *k == key).map(|(_, c)| *c)
}

/// Result of migrating a legacy config document
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Migration {
    /// The new options, by dotted name
    pub options: BTreeMap<String, Value>,

    /// Legacy keys that no longer have a counterpart
    #[serde(skip)]
    pub removed: Vec<String>,

    /// Keys that aren't legacy options at all
    #[serde(skip)]
    pub unrecognized: Vec<String>,
}

impl Migration {
    /// Write the migrated options out as `{options: ...}`
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), LintError> {
        write(path.as_ref(), to_vec(self)?)?;
        Ok(())
    }
}

/// Pick out the legacy settings, which live under `options` or `settings`
fn legacy_settings(document: &Value) -> Option<&Mapping> {
    ["options", "settings"]
        .iter()
        .filter_map(|key| document.get(*key).and_then(Value::as_mapping))
        .find(|mapping| !mapping.is_empty())
}

/// Migrate a legacy config document, e.g. the output of `juju config`
///
/// `source` names the document in errors.
pub fn migrate(document: &Value, source: &str) -> Result<Migration, LintError> {
    let settings =
        legacy_settings(document).ok_or_else(|| LintError::NoLegacySettings(source.into()))?;
    let mut migration = Migration::default();

    for (key, setting) in settings.iter() {
        let key = match key.as_str() {
            Some(key) => key,
            None => {
                migration
                    .unrecognized
                    .push(serde_yaml::to_string(key)?.trim_start_matches("---").trim().into());
                continue;
            }
        };

        let extra = companion(key);
        match extra {
            Some(Companion::Enabled(name)) => {
                migration.options.insert(name.into(), Value::Bool(true));
            }
            Some(Companion::Set(name, value)) => {
                migration.options.insert(name.into(), Value::String(value.into()));
            }
            None => {}
        }

        match renamed(key) {
            Some(Some(name)) => {
                let value = setting
                    .get("value")
                    .ok_or_else(|| LintError::MissingLegacyValue(key.into()))?;
                debug!(from = key, to = name, "Migrating option");
                migration.options.insert(name.into(), value.clone());
            }
            Some(None) => migration.removed.push(key.into()),
            None if extra.is_none() => migration.unrecognized.push(key.into()),
            None => {}
        }
    }

    info!(
        options = migration.options.len(),
        removed = migration.removed.len(),
        unrecognized = migration.unrecognized.len(),
        "Migrated legacy config"
    );

    Ok(migration)
}

/// Migrate the legacy config document at the given path
pub fn migrate_file<P: AsRef<Path>>(path: P) -> Result<Migration, LintError> {
    let path = path.as_ref();
    let document: Value = from_slice(&read(path)?)?;
    migrate(&document, &path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(text: &str) -> Value {
        serde_yaml::from_str(text).unwrap()
    }

    #[test]
    fn test_migrate() {
        let migration = migrate(
            &doc(r#"
application: livepatch
settings:
  sync_token:
    value: abc123
  log_level:
    value: debug
  psql_roles:
    value: admin
  colour:
    value: blue
  filebacked:
    value: true
"#),
            "test",
        )
        .unwrap();

        assert_eq!(migration.options["patch-sync.token"], Value::String("abc123".into()));
        assert_eq!(migration.options["patch-sync.enabled"], Value::Bool(true));
        assert_eq!(migration.options["server.log-level"], Value::String("debug".into()));
        assert_eq!(
            migration.options["patch-storage.type"],
            Value::String("filesystem".into())
        );
        assert_eq!(migration.options.len(), 4);
        assert_eq!(migration.removed, vec!["psql_roles"]);
        assert_eq!(migration.unrecognized, vec!["colour"]);
    }

    #[test]
    fn test_options_preferred() {
        let migration = migrate(
            &doc("options:\n  burst_limit:\n    value: 10\nsettings:\n  log_level:\n    value: info\n"),
            "test",
        )
        .unwrap();

        assert_eq!(migration.options.len(), 1);
        assert!(migration.options.contains_key("server.burst-limit"));
    }

    #[test]
    fn test_later_value_wins() {
        let migration = migrate(
            &doc("options:\n  filebacked:\n    value: true\n  patchstore:\n    value: s3\n"),
            "test",
        )
        .unwrap();

        assert_eq!(migration.options["patch-storage.type"], Value::String("s3".into()));
    }

    #[test]
    fn test_missing_value() {
        let err = migrate(&doc("options:\n  sync_token:\n    default: ''\n"), "test").unwrap_err();
        assert_eq!(err.to_string(), "sync_token doesn't have a set value for it");
    }

    #[test]
    fn test_no_settings() {
        assert!(migrate(&doc("application: livepatch\n"), "test").is_err());
        assert!(migrate(&doc("options: {}\nsettings: {}\n"), "test").is_err());
    }

    #[test]
    fn test_document() {
        let migration = migrate(&doc("options:\n  log_level:\n    value: warn\n"), "test").unwrap();
        let text = serde_yaml::to_string(&migration).unwrap();
        let back: Value = serde_yaml::from_str(&text).unwrap();

        assert_eq!(
            back["options"]["server.log-level"],
            Value::String("warn".into())
        );
        assert!(back.get("removed").is_none());
    }
}
