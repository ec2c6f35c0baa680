//! Typed errors for selector translation, extraction and result access.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while translating selectors, running extraction strategies,
/// or reading typed values back out of an [`ExtractionResult`](crate::ExtractionResult).
#[derive(Debug, Error)]
pub enum ExtractError {
    /// A bracket filter matched none of the supported forms
    #[error("no transformation for filter `[{filter}]` in step `{step}`")]
    Grammar { step: String, filter: String },

    /// The CSS strategy could not evaluate a selector
    #[error("CSS evaluation of `{selector}` failed: {reason}")]
    Css { selector: String, reason: String },

    /// The native path engine could not evaluate a query
    #[error("XPath evaluation of `{query}` failed: {reason}")]
    XPath { query: String, reason: String },

    /// A JSON path did not parse
    #[error("invalid JSON path `{path}`: {reason}")]
    JsonPath { path: String, reason: String },

    /// JSON content did not parse
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// Typed accessor called with a key that is not in the result
    #[error("key `{0}` is not present in the extraction result")]
    MissingKey(String),

    /// Typed accessor could not convert the stored value
    #[error("cannot read `{key}` as {expected}: found {found}")]
    Coercion {
        key: String,
        expected: &'static str,
        found: String,
    },

    /// Batch entry point called with something that is neither a file nor a directory
    #[error("`{}` is neither an existing file nor a directory", .0.display())]
    InvalidPath(PathBuf),

    /// Reading an input file failed
    #[error("failed to read `{}`: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A batch worker task died before producing a result
    #[error("extraction task failed: {0}")]
    Task(String),
}

impl ExtractError {
    pub(crate) fn css(selector: &str, reason: impl Into<String>) -> Self {
        Self::Css {
            selector: selector.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn xpath(query: &str, reason: impl Into<String>) -> Self {
        Self::XPath {
            query: query.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn json_path(path: &str, reason: impl Into<String>) -> Self {
        Self::JsonPath {
            path: path.to_string(),
            reason: reason.into(),
        }
    }

    /// Grammar errors describe a selector that can never be valid, so the
    /// orchestrator never hides them behind a fallback strategy.
    pub fn is_grammar(&self) -> bool {
        matches!(self, Self::Grammar { .. } | Self::JsonPath { .. })
    }
}

pub type Result<T> = std::result::Result<T, ExtractError>;
