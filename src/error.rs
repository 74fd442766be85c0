use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Where a rejected value came from: the dotted key and the value source name.
#[derive(Debug, Clone, PartialEq)]
pub struct Origin {
    pub key: String,
    pub source: String,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, " for '{}' from {}", self.key, self.source)
    }
}

fn origin_suffix(origin: &Option<Origin>) -> String {
    origin.as_ref().map(ToString::to_string).unwrap_or_default()
}

#[derive(Debug, Error)]
pub enum NestfigError {
    #[error("Cannot convert '{value}' to {target}{}: {reason}", origin_suffix(.origin))]
    CannotConvert {
        value: String,
        target: String,
        reason: String,
        origin: Option<Origin>,
    },

    #[error("'{key}' from {source_name} is not an option")]
    NotAnOption { key: String, source_name: String },

    #[error("Option '{name}': {reason}")]
    OptionError { name: String, reason: String },

    #[error("Conflicting definitions for '{path}': {reason}")]
    DefinitionConflict { path: String, reason: String },

    #[error("Name '{name}' is already in use")]
    DuplicateName { name: String },

    #[error("Short form '-{short_form}' is claimed by both '{first}' and '{second}'")]
    DuplicateShortForm {
        short_form: char,
        first: String,
        second: String,
    },

    #[error("Aggregation '{name}' failed: {reason}")]
    AggregationFailed { name: String, reason: String },

    #[error("Failed to read {path}: {source}")]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Command line error: {0}")]
    CommandLine(String),

    #[error("A converter registry is already installed for this process")]
    RegistryAlreadyInstalled,
}

impl NestfigError {
    /// Attach the key and source to a conversion failure that has none yet.
    pub(crate) fn with_origin(self, key: &str, source: &str) -> Self {
        match self {
            NestfigError::CannotConvert {
                value,
                target,
                reason,
                origin: None,
            } => NestfigError::CannotConvert {
                value,
                target,
                reason,
                origin: Some(Origin {
                    key: key.to_string(),
                    source: source.to_string(),
                }),
            },
            other => other,
        }
    }
}
