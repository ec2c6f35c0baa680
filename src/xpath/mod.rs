//! Native location-path engine
//!
//! scraper only speaks CSS, so the fallback strategy evaluates path queries
//! here, directly over the scraper tree. The engine covers the XPath 1.0
//! location-path subset that page selectors use in practice: the element
//! axes, name tests, positional and boolean predicates, and the common
//! string functions.

mod eval;
mod lexer;
mod parser;

use scraper::ElementRef;

use crate::document::Document;
use crate::error::{ExtractError, Result};

use eval::Evaluator;
use parser::{Expr, Parser};

/// A compiled path query that selects elements.
#[derive(Debug, Clone)]
pub struct PathQuery {
    raw: String,
    expr: Expr,
}

impl PathQuery {
    /// Compile `query`. Relative queries match anywhere in the document, as
    /// if written with a leading `//`.
    pub fn parse(query: &str) -> Result<Self> {
        let tokens = lexer::tokenize(query)?;
        let mut expr = Parser::new(query, tokens).parse()?;

        let paths = match &mut expr {
            Expr::Path(path) => std::slice::from_mut(path),
            Expr::Union(paths) => paths.as_mut_slice(),
            _ => return Err(ExtractError::xpath(query, "query does not select elements")),
        };
        for path in paths {
            if path.value.is_some() {
                return Err(ExtractError::xpath(query, "query must end with an element step"));
            }
            path.anchor_anywhere();
        }

        Ok(Self {
            raw: query.to_string(),
            expr,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Selected elements, deduplicated, in document order.
    pub fn evaluate<'a>(&self, document: &'a Document) -> Result<Vec<ElementRef<'a>>> {
        Evaluator::new(document, &self.raw).select(&self.expr)
    }
}
