//! Juju plugin for statically checking charms and bundles

use std::path::{Path, PathBuf};

use ex::fs;
use failure::{format_err, Error};
use structopt::{self, clap::AppSettings, StructOpt};
use tracing_subscriber::EnvFilter;

use charm_lint::actions::Actions;
use charm_lint::graph::RelationGraph;
use charm_lint::lint::{lint_paths, validate_bundle_text};
use charm_lint::metadata::validate_metadata;
use charm_lint::migrate::migrate_file;
use charm_lint::report::Report;
use charm_lint::settings::Settings;

/// CLI arguments for the `metadata` subcommand.
#[derive(StructOpt, Debug)]
struct MetadataConfig {
    #[structopt(default_value = "metadata.yaml")]
    #[structopt(help = "The metadata.yaml file to check")]
    file: PathBuf,
}

/// CLI arguments for the `bundle` subcommand.
#[derive(StructOpt, Debug)]
struct BundleConfig {
    #[structopt(short = "b", long = "bundle", default_value = "bundle.yaml")]
    #[structopt(help = "The bundle file to check")]
    bundle: PathBuf,

    #[structopt(short = "c", long = "charm")]
    #[structopt(help = "Charm source directories to cross-check applications against")]
    charms: Vec<PathBuf>,
}

/// CLI arguments for the `action` subcommand.
#[derive(StructOpt, Debug)]
struct ActionConfig {
    #[structopt(short = "f", long = "file", default_value = "actions.yaml")]
    #[structopt(help = "The actions.yaml file declaring the action")]
    file: PathBuf,

    #[structopt(help = "Name of the action to invoke")]
    name: String,

    #[structopt(name = "params")]
    #[structopt(help = "Parameters to pass to the action, as key=value")]
    params: Vec<String>,
}

/// CLI arguments for the `export` subcommand.
#[derive(StructOpt, Debug)]
struct ExportConfig {
    #[structopt(short = "b", long = "bundle", default_value = "bundle.yaml")]
    #[structopt(help = "The bundle file to export")]
    bundle: PathBuf,

    #[structopt(short = "c", long = "charm")]
    #[structopt(help = "Charm source directories to resolve endpoints with")]
    charms: Vec<PathBuf>,

    #[structopt(long = "no-labels")]
    #[structopt(help = "Leave endpoint names off the graph's edges")]
    no_labels: bool,

    #[structopt(short = "o", long = "out")]
    #[structopt(help = "Where to write the exported graph")]
    out: Option<PathBuf>,
}

/// CLI arguments for the `migrate-config` subcommand.
#[derive(StructOpt, Debug)]
struct MigrateConfig {
    #[structopt(short = "i", long = "input-file")]
    #[structopt(help = "The legacy config, e.g. as output by `juju config`")]
    input: PathBuf,

    #[structopt(short = "o", long = "output-file")]
    #[structopt(help = "Where to write the migrated config")]
    output: PathBuf,
}

/// CLI arguments for the `check` subcommand.
#[derive(StructOpt, Debug)]
struct CheckConfig {
    #[structopt(required = true)]
    #[structopt(help = "Descriptor files to check. Kind is judged by file name")]
    files: Vec<PathBuf>,
}

#[derive(StructOpt, Debug)]
enum Command {
    /// Checks a charm's metadata.yaml
    #[structopt(name = "metadata")]
    Metadata(MetadataConfig),

    /// Checks a bundle, and its relations against charm metadata where available
    ///
    /// Local charms referenced by the bundle are loaded automatically, as are
    /// the `charm-dirs` from the settings file.
    #[structopt(name = "bundle")]
    Bundle(BundleConfig),

    /// Checks an invocation of an action against its declaration
    #[structopt(name = "action")]
    Action(ActionConfig),

    /// Exports a bundle's relation graph to graphviz
    #[structopt(name = "export")]
    Export(ExportConfig),

    /// Migrates legacy Livepatch server config to the current option names
    #[structopt(name = "migrate-config")]
    MigrateConfig(MigrateConfig),

    /// Checks any number of descriptors in parallel
    #[structopt(name = "check")]
    Check(CheckConfig),
}

/// Statically check charm and bundle descriptors.
#[derive(StructOpt, Debug)]
#[structopt(setting = AppSettings::SubcommandRequiredElseHelp)]
struct Config {
    #[structopt(short = "v", long = "verbose", parse(from_occurrences))]
    #[structopt(help = "Log more. Can be given twice. Overridden by RUST_LOG")]
    verbose: u8,

    #[structopt(long = "settings")]
    #[structopt(help = "Settings file to use instead of the default")]
    settings: Option<PathBuf>,

    #[structopt(subcommand)]
    command: Command,
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Print the outcome of checking `what`, failing if anything was found
fn finish(what: &str, report: Report) -> Result<(), Error> {
    if report.is_ok() {
        println!("{}: OK", what);
        return Ok(());
    }

    eprintln!("{}: {}", what, report);
    Err(format_err!("{} has {} issue(s)", what, report.len()))
}

fn validate_bundle(
    path: &Path,
    charms: &[PathBuf],
    settings: &Settings,
) -> Result<Result<RelationGraph, Report>, Error> {
    let text = fs::read_to_string(path)?;
    Ok(validate_bundle_text(&text, path, settings, charms))
}

/// Run `metadata` subcommand
fn metadata(c: MetadataConfig) -> Result<(), Error> {
    let what = c.file.display().to_string();
    let text = fs::read_to_string(&c.file)?;
    let report = match validate_metadata(&text) {
        Ok(endpoints) => {
            println!(
                "{} declares {} endpoint(s)",
                endpoints.charm,
                endpoints.declared().count()
            );
            Report::new()
        }
        Err(report) => report,
    };

    finish(&what, report)
}

/// Run `bundle` subcommand
fn bundle(c: BundleConfig, settings: &Settings) -> Result<(), Error> {
    let what = c.bundle.display().to_string();
    let report = match validate_bundle(&c.bundle, &c.charms, settings)? {
        Ok(graph) => {
            println!(
                "{} applications, {} relations",
                graph.application_count(),
                graph.relation_count()
            );
            Report::new()
        }
        Err(report) => report,
    };

    finish(&what, report)
}

/// Run `action` subcommand
fn action(c: ActionConfig) -> Result<(), Error> {
    let actions = Actions::load(&c.file)?;

    match actions.check_args(&c.name, &c.params) {
        Ok(accepted) => {
            print!("{}", serde_yaml::to_string(&accepted)?);
            Ok(())
        }
        Err(report) => finish(&c.name, report),
    }
}

/// Run `export` subcommand
fn export(c: ExportConfig, settings: &Settings) -> Result<(), Error> {
    let graph = match validate_bundle(&c.bundle, &c.charms, settings)? {
        Ok(graph) => graph,
        Err(report) => return finish(&c.bundle.display().to_string(), report),
    };

    let output = if c.no_labels {
        graph.to_dot()
    } else {
        graph.to_labelled_dot()
    };

    match c.out {
        Some(out) => fs::write(out, output)?,
        None => println!("{}", output),
    }

    Ok(())
}

/// Run `migrate-config` subcommand
fn migrate_config(c: MigrateConfig) -> Result<(), Error> {
    let migration = migrate_file(&c.input)?;

    if !migration.removed.is_empty() {
        println!(
            "These keys were present in your configuration but are removed for the new config: {}",
            migration.removed.join(", ")
        );
    }
    if !migration.unrecognized.is_empty() {
        println!("Unrecognized keys: {}", migration.unrecognized.join(", "));
    }

    migration.save(&c.output)?;
    println!(
        "Wrote {} option(s) to {}",
        migration.options.len(),
        c.output.display()
    );

    Ok(())
}

/// Run `check` subcommand
fn check(c: CheckConfig, settings: &Settings) -> Result<(), Error> {
    let results = lint_paths(&c.files, settings);
    let failed: Vec<String> = results
        .iter()
        .filter(|(_, report)| !report.is_ok())
        .map(|(path, _)| path.display().to_string())
        .collect();

    for (path, report) in results {
        if report.is_ok() {
            println!("{}: OK", path.display());
        } else {
            eprintln!("{}: {}", path.display(), report);
        }
    }

    if failed.is_empty() {
        Ok(())
    } else {
        Err(format_err!("Issues found in {}", failed.join(", ")))
    }
}

fn main() -> Result<(), Error> {
    let config = Config::from_args();
    init_logging(config.verbose);

    let settings = match &config.settings {
        Some(path) => Settings::load_from(path)?,
        None => Settings::load()?,
    };

    match config.command {
        Command::Metadata(c) => metadata(c),
        Command::Bundle(c) => bundle(c, &settings),
        Command::Action(c) => action(c),
        Command::Export(c) => export(c, &settings),
        Command::MigrateConfig(c) => migrate_config(c),
        Command::Check(c) => check(c, &settings),
    }
}
