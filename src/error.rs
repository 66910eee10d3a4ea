//! Fatal error types.
//!
//! Lint violations are not errors (see [`crate::lint::LintDiagnostic`]) and an
//! unprovable guard is a verdict, not an error. Everything here aborts the
//! operation it was raised from.

use std::path::PathBuf;
use thiserror::Error;

/// Malformed rule or transform options. Raised at construction time, never
/// recovered.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown rule \"{0}\"")]
    UnknownRule(String),

    #[error("rule \"{rule}\" does not accept options")]
    UnexpectedOptions { rule: String },

    #[error("invalid severity {value} for rule \"{rule}\"")]
    InvalidSeverity { rule: String, value: String },

    #[error("invalid lint configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid options for \"{target}\": {source}")]
    InvalidOptions {
        target: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Catalog invariant violations and persistence failures.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("template \"{template}\" has {expected} placeholder(s) but {found} argument(s) were supplied")]
    ArityMismatch {
        template: String,
        expected: usize,
        found: usize,
    },

    #[error("codes {first} and {second} map to the same template \"{template}\"")]
    DuplicateTemplate {
        first: u32,
        second: u32,
        template: String,
    },

    #[error("code {code} is already assigned to \"{existing}\"")]
    CodeTaken { code: u32, existing: String },

    #[error("no code is assigned to \"{template}\"")]
    MissingCode { template: String },

    #[error("unknown error code {0}")]
    UnknownCode(u32),

    #[error("catalog file {path} is malformed: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize catalog: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("catalog io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failure of a single file's transform or lint run.
#[derive(Debug, Error)]
pub enum TransformError {
    #[error("failed to parse {file}: {}", .messages.join("; "))]
    Parse { file: String, messages: Vec<String> },

    #[error("{file}:{line}:{column}: {source}")]
    Catalog {
        file: String,
        line: u32,
        column: u32,
        #[source]
        source: CatalogError,
    },
}

/// Failure of a whole build. Per-file failures are collected so every broken
/// file is reported in one run.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error("{} file(s) failed to transform", .0.len())]
    Files(Vec<TransformError>),

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
