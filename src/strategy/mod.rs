//! Extraction strategies
//!
//! A strategy evaluates one selector against a parsed document and returns
//! the raw match sequence. Normalization into scalars, lists and `NotFound`
//! happens in the orchestrator so every strategy collapses results the same
//! way.

mod css;
mod xpath;

pub use css::CssStrategy;
pub use xpath::XPathStrategy;

use crate::document::Document;
use crate::error::Result;
use crate::value::Value;

pub trait Strategy: Send + Sync {
    /// Short name used in log fields.
    fn name(&self) -> &'static str;

    fn evaluate(&self, document: &Document, selector: &str) -> Result<Vec<Value>>;
}
