//! Whole-selector translation

use crate::error::{ExtractError, Result};

use super::descendant::{Descendant, StepNode, Terminal};
use super::steps::split_steps;

/// A selector tokenized into element-selecting steps plus an optional
/// trailing value accessor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Translation {
    selector: String,
    path: Vec<Descendant>,
    terminal: Option<Terminal>,
}

impl Translation {
    pub fn parse(selector: &str) -> Result<Self> {
        let steps = split_steps(selector);
        if steps.is_empty() {
            return Err(ExtractError::css(selector, "empty selector"));
        }

        let mut parsed = Vec::with_capacity(steps.len());
        let mut first_error = None;
        for step in &steps {
            match Descendant::parse(step) {
                Ok(step) => parsed.push(step),
                Err(e) if e.is_grammar() => return Err(e),
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }
        if let Some(e) = first_error {
            return Err(e);
        }

        let terminal = match parsed.last().and_then(Descendant::terminal) {
            Some(t) => {
                let t = t.clone();
                parsed.pop();
                Some(t)
            }
            None => None,
        };
        if let Some(step) = parsed.iter().find(|s| s.is_terminal()) {
            return Err(ExtractError::css(
                selector,
                format!("value accessor `{}` must be the last step", step.raw().trim_start_matches('/')),
            ));
        }

        Ok(Self {
            selector: selector.to_string(),
            path: parsed,
            terminal,
        })
    }

    pub fn selector(&self) -> &str {
        &self.selector
    }

    /// Element-selecting steps, in order.
    pub fn path(&self) -> &[Descendant] {
        &self.path
    }

    pub fn terminal(&self) -> Option<&Terminal> {
        self.terminal.as_ref()
    }

    /// jsoup-style CSS rendering of the element path.
    pub fn to_css(&self) -> String {
        let mut css = String::new();
        for step in &self.path {
            if matches!(step.node(), StepNode::SelfNode) {
                continue;
            }
            if !css.is_empty() {
                css.push_str(step.combinator());
            }
            css.push_str(&step.to_css());
        }
        css
    }
}

/// Translate a selector into its CSS form and value accessor.
pub fn to_css(selector: &str) -> Result<(String, Option<Terminal>)> {
    let translation = Translation::parse(selector)?;
    Ok((translation.to_css(), translation.terminal))
}
