//! Error types.
//!
//! Extraction itself never fails on script content; the errors here cover
//! reading input, building the command table from configuration, reading
//! the companion job records, and parsing rendered rankings back.

use std::path::PathBuf;
use thiserror::Error;

/// A script whose text could not be obtained.
#[derive(Debug, Error)]
pub enum ScriptError {
    /// The file could not be read (missing, permissions, I/O failure).
    #[error("cannot read script {}: {source}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Invalid extractor configuration.
#[derive(Debug, Error)]
pub enum ExtractorError {
    /// A configured regular expression does not compile.
    #[error("invalid pattern `{pattern}`: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// A toolchain pattern has no `year` capture group.
    #[error("pattern `{0}` has no named `year` group")]
    MissingYearGroup(String),

    /// A verb is listed under more than one operation kind.
    #[error("verb `{0}` is assigned to more than one operation")]
    DuplicateVerb(String),
}

/// Errors reading a scheduler job record (`.JB`).
#[derive(Debug, Error)]
pub enum JobXmlError {
    #[error("script {} has no .SC extension", .0.display())]
    NotAScript(PathBuf),

    #[error("cannot read job record {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed job record {}: {source}", path.display())]
    Xml {
        path: PathBuf,
        #[source]
        source: roxmltree::Error,
    },

    /// The `nodes` resource has more pieces than `nodes:ppn=N:machine`.
    #[error("unexpected nodes specification `{0}`")]
    InvalidNodes(String),
}

/// Errors parsing the plain `identifier count` ranking form.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReportError {
    #[error("line {line}: expected `<module> <count>`, got `{content}`")]
    MalformedLine { line: usize, content: String },

    #[error("line {line}: invalid count `{count}`")]
    InvalidCount { line: usize, count: String },
}
