//! Static validation for the descriptors a Juju deployment is built from:
//! charm `metadata.yaml`, `config.yaml` and `actions.yaml`, and `bundle.yaml`.
//!
//! Validation never stops at the first problem. Each validator returns either
//! the validated model or a [`Report`](report::Report) listing every issue found.

pub mod actions;
pub mod bundle;
pub mod charm_ref;
pub mod charm_source;
pub mod config;
pub mod constraints;
pub mod endpoint;
pub mod error;
pub mod graph;
pub mod lint;
pub mod metadata;
pub mod migrate;
pub mod paths;
pub mod report;
pub mod settings;
pub mod validate;
