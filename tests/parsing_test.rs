use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use charm_lint::actions::{Actions, ParamType};
use charm_lint::bundle::{Application, Bundle};
use charm_lint::charm_ref::CharmRef;
use charm_lint::charm_source::CharmSource;
use charm_lint::config::{ConfigOption, Value};
use charm_lint::metadata::{validate_metadata, Direction, Metadata, JUJU_INFO};
use charm_lint::migrate::migrate_file;

#[test]
fn parse_bundle() {
    let bundle = Bundle::load(PathBuf::from("tests/examples/bundle-livepatch.yaml")).unwrap();

    let mut options = BTreeMap::new();
    options.insert("server.log-level".to_string(), Value::String("debug".into()));
    options.insert("patch-sync.enabled".to_string(), Value::Boolean(true));

    assert_eq!(bundle.name, Some("livepatch-on-prem".into()));
    assert_eq!(bundle.applications.len(), 4);
    assert_eq!(
        bundle.applications["livepatch"],
        Application {
            charm: "./charms/livepatch".into(),
            num_units: Some(Value::Integer(1)),
            constraints: Some("cores=2 mem=4G root-disk=20G".into()),
            options,
            ..Default::default()
        }
    );
    assert_eq!(
        bundle.applications["postgresql"].channel,
        Some("14/stable".into())
    );
    assert!(bundle.applications["haproxy"].expose);
    assert_eq!(bundle.applications["ubuntu-advantage"].num_units, None);
    assert_eq!(bundle.relations.len(), 5);
    assert_eq!(
        bundle.relations[0],
        vec!["livepatch:database".to_string(), "postgresql:database".to_string()]
    );
}

#[test]
fn save_and_load_bundle() {
    let bundle = Bundle::load("tests/examples/bundle-store.yaml").unwrap();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bundle.yaml");

    bundle.save(&path).unwrap();
    assert_eq!(Bundle::load(&path).unwrap(), bundle);
}

#[test]
fn parse_charm_refs() {
    let bundle = Bundle::load("tests/examples/bundle-store.yaml").unwrap();
    let names: Vec<Option<String>> = bundle
        .applications
        .values()
        .map(|app| {
            CharmRef::parse(&app.charm)
                .unwrap()
                .store_name()
                .map(String::from)
        })
        .collect();

    assert_eq!(
        names,
        vec![
            Some("haproxy".to_string()),
            Some("canonical-livepatch-server".to_string()),
            Some("postgresql".to_string()),
            Some("ubuntu-advantage".to_string()),
        ]
    );
}

#[test]
fn parse_metadata() {
    let metadata = Metadata::load("tests/examples/charms/livepatch/metadata.yaml").unwrap();
    assert_eq!(metadata.name, "canonical-livepatch-server");
    assert!(!metadata.subordinate);

    let endpoints = metadata.validate().unwrap();
    let database = endpoints.get("database").unwrap();
    assert_eq!(database.direction, Direction::Requires);
    assert_eq!(database.interface, "postgresql_client");
    assert_eq!(database.limit, Some(1));
    assert!(endpoints.get("database-legacy").unwrap().optional);
    assert_eq!(endpoints.get("livepatch").unwrap().direction, Direction::Peer);
    assert!(endpoints.get(JUJU_INFO).unwrap().implicit);
    assert_eq!(endpoints.declared().count(), 4);
}

#[test]
fn metadata_round_trip() {
    for charm in &["livepatch", "postgresql", "haproxy", "ubuntu-advantage"] {
        let text =
            fs::read_to_string(format!("tests/examples/charms/{}/metadata.yaml", charm)).unwrap();
        let validated = validate_metadata(&text).unwrap();

        let yaml = validated.to_metadata().to_yaml().unwrap();
        let revalidated = validate_metadata(&yaml).unwrap();

        assert_eq!(revalidated, validated, "{} didn't survive a round trip", charm);
    }
}

#[test]
fn subordinate_keeps_its_juju_info() {
    let metadata = Metadata::load("tests/examples/charms/ubuntu-advantage/metadata.yaml").unwrap();
    assert!(metadata.subordinate);

    let endpoints = metadata.validate().unwrap();
    let juju_info = endpoints.get(JUJU_INFO).unwrap();
    assert_eq!(juju_info.direction, Direction::Requires);
    assert!(!juju_info.implicit);
    assert_eq!(endpoints.iter().count(), 1);
}

#[test]
fn parse_charm_source() {
    let charm = CharmSource::load("tests/examples/charms/livepatch").unwrap();

    let config = charm.config.unwrap();
    assert_eq!(
        config.options["server.burst-limit"],
        ConfigOption::Integer {
            default: Some(500),
            description: Some("Number of requests allowed in a burst".into()),
        }
    );

    let actions: Actions = charm.actions.unwrap();
    assert_eq!(actions.0.len(), 4);
    assert!(actions.validate().is_ok());

    let set_basic_users = actions.get("set-basic-users").unwrap();
    assert_eq!(set_basic_users.required, vec!["users"]);
    assert_eq!(set_basic_users.params["append"].kind, ParamType::Boolean);
    assert_eq!(
        set_basic_users.params["append"].default,
        Some(Value::Boolean(false))
    );

    let bare = CharmSource::load("tests/examples/charms/haproxy").unwrap();
    assert!(bare.config.is_none());
    assert!(bare.actions.is_none());
}

#[test]
fn migrate_legacy_config() {
    let migration = migrate_file("tests/examples/legacy-config.yaml").unwrap();

    assert_eq!(migration.removed, vec!["psql_roles"]);
    assert_eq!(migration.unrecognized, vec!["colour"]);
    assert_eq!(
        migration.options["server.log-level"],
        serde_yaml::Value::String("debug".into())
    );
    assert_eq!(
        migration.options["patch-sync.token"],
        serde_yaml::Value::String("0123456789abcdef".into())
    );
    assert_eq!(
        migration.options["patch-sync.enabled"],
        serde_yaml::Value::Bool(true)
    );
    assert_eq!(
        migration.options["patch-storage.type"],
        serde_yaml::Value::String("filesystem".into())
    );
    assert_eq!(
        migration.options["database.connection-pool-max"],
        serde_yaml::Value::Number(16.into())
    );

    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("config.yaml");
    migration.save(&out).unwrap();

    let written: serde_yaml::Value = serde_yaml::from_slice(&fs::read(&out).unwrap()).unwrap();
    assert_eq!(
        written["options"].as_mapping().unwrap().len(),
        migration.options.len()
    );
}
