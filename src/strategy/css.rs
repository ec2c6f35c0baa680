//! Primary strategy: selector steps executed as CSS through scraper

use std::collections::HashMap;

use scraper::{ElementRef, Selector};

use crate::document::{extract_terminal, own_text, Document};
use crate::error::{ExtractError, Result};
use crate::selector::{Axis, Descendant, Filter, StepNode, Translation};
use crate::value::Value;

use super::Strategy;

/// Runs each step's compiled CSS compound against the elements selected by
/// the previous step.
///
/// `:matchesOwn` and `:eq` have no scraper counterpart and are applied after
/// matching, in the order they appear in the step.
#[derive(Debug, Clone, Copy, Default)]
pub struct CssStrategy;

impl Strategy for CssStrategy {
    fn name(&self) -> &'static str {
        "css"
    }

    fn evaluate(&self, document: &Document, selector: &str) -> Result<Vec<Value>> {
        let translation = Translation::parse(selector)?;

        let mut scope = Scope::Document;
        for step in translation.path() {
            scope = apply_step(document, scope, step, selector)?;
        }

        let elements = match scope {
            Scope::Document => document.elements().collect(),
            Scope::Elements(elements) => elements,
        };
        Ok(extract_terminal(&elements, translation.terminal()))
    }
}

/// Context a step is evaluated against.
enum Scope<'a> {
    Document,
    Elements(Vec<ElementRef<'a>>),
}

fn apply_step<'a>(
    document: &'a Document,
    scope: Scope<'a>,
    step: &Descendant,
    selector: &str,
) -> Result<Scope<'a>> {
    let matched = match step.node() {
        StepNode::SelfNode => return Ok(scope),
        StepNode::Parent => match scope {
            Scope::Document => Vec::new(),
            Scope::Elements(elements) => elements
                .iter()
                .filter_map(|e| e.parent().and_then(ElementRef::wrap))
                .collect(),
        },
        StepNode::Terminal(t) => {
            return Err(ExtractError::css(selector, format!("`{t}` must be the last step")));
        }
        StepNode::Element { .. } | StepNode::FollowingSibling { .. } => select(document, &scope, step, selector)?,
    };
    Ok(Scope::Elements(document.in_document_order(matched)))
}

fn select<'a>(
    document: &'a Document,
    scope: &Scope<'a>,
    step: &Descendant,
    selector: &str,
) -> Result<Vec<ElementRef<'a>>> {
    let css = step.compound_css().unwrap_or_else(|| "*".to_string());
    let compiled = Selector::parse(&css).map_err(|e| ExtractError::css(selector, format!("`{css}`: {e}")))?;

    let sibling = matches!(step.node(), StepNode::FollowingSibling { .. });
    let groups: Vec<Vec<ElementRef<'a>>> = match (scope, sibling, step.axis()) {
        (Scope::Document, true, _) => Vec::new(),
        (Scope::Elements(context), true, _) => context
            .iter()
            .map(|e| e.next_siblings().filter_map(ElementRef::wrap).collect())
            .collect(),
        (Scope::Document, false, Axis::Child) => vec![document.top_level().collect()],
        (Scope::Elements(context), false, Axis::Child) => context
            .iter()
            .map(|e| e.children().filter_map(ElementRef::wrap).collect())
            .collect(),
        (Scope::Document, false, Axis::Descendant) => vec![document.elements().collect()],
        (Scope::Elements(context), false, Axis::Descendant) => {
            let below = context
                .iter()
                .flat_map(|e| e.descendants().skip(1).filter_map(ElementRef::wrap))
                .collect();
            vec![document.in_document_order(below)]
        }
    };

    // Descendant matches are indexed per parent; child and sibling matches
    // per context element.
    let per_parent = !sibling && step.axis() == Axis::Descendant;

    let mut matched = Vec::new();
    for group in groups {
        let mut group: Vec<_> = group.into_iter().filter(|e| compiled.matches(e)).collect();
        for filter in step.filters() {
            match filter {
                Filter::TextContains(needle) => group.retain(|e| own_text(e).contains(needle.as_str())),
                Filter::Index(n) => group = nth(group, *n, per_parent),
                Filter::AttrEquals { .. } | Filter::AttrContains { .. } | Filter::AttrExists(_) => {}
            }
        }
        matched.extend(group);
    }
    Ok(matched)
}

fn nth(group: Vec<ElementRef<'_>>, n: usize, per_parent: bool) -> Vec<ElementRef<'_>> {
    if !per_parent {
        return group.into_iter().nth(n).into_iter().collect();
    }
    let mut seen = HashMap::new();
    group
        .into_iter()
        .filter(|e| {
            let count = seen.entry(e.parent().map(|p| p.id())).or_insert(0usize);
            let keep = *count == n;
            *count += 1;
            keep
        })
        .collect()
}
