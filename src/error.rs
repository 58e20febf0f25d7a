//! Error types for the Vine compiler.
//!
//! Domain-rule violations in user code are never errors here: they are reported as
//! [`Diagnostic`](crate::diagnostics::Diagnostic)s through the compiler hooks. These types
//! cover setup failures and the fatal signals raised by the entry points.

use std::path::PathBuf;

/// Malformed rule catalog or compiler configuration. Raised before any file is processed.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("rule `{0}` is defined more than once")]
    DuplicateRule(String),

    #[error("rule `{rule}` references unknown rule `{reference}`")]
    UnknownReference { rule: String, reference: String },

    #[error("rule `{rule}` has no matcher (at least one of kind, regex, matches, has, inside, not, any, all)")]
    EmptyRule { rule: String },

    #[error("rule `{rule}` uses `{key}` outside of a `has` or `inside` relation")]
    MisplacedRelationKey { rule: String, key: &'static str },

    #[error("rule `{rule}` has an invalid regex: {source}")]
    InvalidRegex {
        rule: String,
        #[source]
        source: regex::Error,
    },

    #[error("circular rule reference: {0}")]
    CircularReference(String),

    #[error("unknown rule `{0}`")]
    UnknownRule(String),

    #[error("malformed rule definitions: {0}")]
    MalformedRules(#[source] serde_json::Error),

    #[error("built-in rule catalog failed to load: {0}")]
    InvalidCatalog(String),

    #[error("invalid compiler options: {0}")]
    InvalidOptions(#[source] serde_json::Error),
}

/// Overlapping or out-of-range edit on a [`SpliceBuffer`](crate::splice::SpliceBuffer).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SpliceError {
    #[error("edit {start}..{end} is outside the source (length {len})")]
    OutOfBounds { start: u32, end: u32, len: usize },

    #[error("edit {start}..{end} does not fall on character boundaries")]
    NotCharBoundary { start: u32, end: u32 },

    #[error("edit {start}..{end} overlaps an existing edit {other_start}..{other_end}")]
    Overlap {
        start: u32,
        end: u32,
        other_start: u32,
        other_end: u32,
    },
}

/// Failure reported by a [`TemplateCompiler`](crate::template::TemplateCompiler).
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct TemplateError {
    pub message: String,
}

impl TemplateError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Fatal outcome of compiling one file.
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    /// Aggregate of every error diagnostic collected before analysis.
    #[error("Vue Vine compilation failed:\n{0}")]
    Validation(String),

    #[error("template compilation failed for component `{component}`: {source}")]
    Template {
        component: String,
        #[source]
        source: TemplateError,
    },

    #[error("style scope `{0}` is referenced but never defined")]
    MissingStyle(String),

    #[error(transparent)]
    Splice(#[from] SpliceError),

    #[error("failed to encode style request id: {0}")]
    VirtualId(#[from] serde_urlencoded::ser::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
