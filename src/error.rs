//! Errors for charm-lint
//!
//! These are fatal errors, i.e. ones that keep a descriptor from being looked
//! at at all. Problems found in a descriptor are reported through
//! [`Report`](crate::report::Report) instead.

use std::io::Error as IOError;

use ex::io::Error as ExIOError;
use failure::Fail;
use serde_yaml::Error as YamlError;

#[derive(Debug, Fail)]
pub enum LintError {
    #[fail(display = "I/O error: {}", _0)]
    IOError(#[fail(cause)] IOError),

    #[fail(display = "I/O error: {}", _0)]
    ExIOError(#[fail(cause)] ExIOError),

    #[fail(display = "YAML Error: {}", _0)]
    YamlError(#[fail(cause)] YamlError),

    #[fail(display = "Invalid settings file {}: {}", _0, _1)]
    SettingsError(String, String),

    #[fail(display = "No `options` or `settings` found in {}", _0)]
    NoLegacySettings(String),

    #[fail(display = "{} doesn't have a set value for it", _0)]
    MissingLegacyValue(String),
}

impl From<IOError> for LintError {
    fn from(err: IOError) -> Self {
        LintError::IOError(err)
    }
}

impl From<ExIOError> for LintError {
    fn from(err: ExIOError) -> Self {
        LintError::ExIOError(err)
    }
}

impl From<YamlError> for LintError {
    fn from(err: YamlError) -> Self {
        LintError::YamlError(err)
    }
}

impl From<LintError> for String {
    fn from(err: LintError) -> Self {
        format!("{}", err)
    }
}
