//! JSONPath evaluation

use std::cmp::Ordering;

use serde_json::Value as Json;

use super::parser::{CompareOp, FilterExpr, PathKey, Segment, Selector};

pub(crate) fn evaluate<'j>(segments: &[Segment], root: &'j Json) -> Vec<&'j Json> {
    let mut nodes = vec![root];
    for segment in segments {
        nodes = match segment {
            Segment::Child(selector) => nodes.into_iter().flat_map(|n| select(selector, n)).collect(),
            Segment::Descendant(selector) => nodes
                .into_iter()
                .flat_map(descendants_or_self)
                .flat_map(|n| select(selector, n))
                .collect(),
        };
    }
    nodes
}

fn select<'j>(selector: &Selector, node: &'j Json) -> Vec<&'j Json> {
    match selector {
        Selector::Name(name) => node.get(name).into_iter().collect(),
        Selector::Wildcard => children(node),
        Selector::Index(i) => match node {
            Json::Array(items) => resolve_index(*i, items.len()).and_then(|i| items.get(i)).into_iter().collect(),
            _ => Vec::new(),
        },
        Selector::Slice { start, end, step } => match node {
            Json::Array(items) => slice(items, *start, *end, *step),
            _ => Vec::new(),
        },
        Selector::Union(selectors) => selectors.iter().flat_map(|s| select(s, node)).collect(),
        Selector::Filter(filter) => children(node).into_iter().filter(|c| matches(filter, c)).collect(),
    }
}

fn children(node: &Json) -> Vec<&Json> {
    match node {
        Json::Array(items) => items.iter().collect(),
        Json::Object(map) => map.values().collect(),
        _ => Vec::new(),
    }
}

/// Pre-order walk including `node` itself.
fn descendants_or_self(node: &Json) -> Vec<&Json> {
    fn walk<'j>(node: &'j Json, out: &mut Vec<&'j Json>) {
        out.push(node);
        for child in children(node) {
            walk(child, out);
        }
    }

    let mut out = Vec::new();
    walk(node, &mut out);
    out
}

fn resolve_index(index: i64, len: usize) -> Option<usize> {
    let len = i64::try_from(len).ok()?;
    let resolved = if index < 0 { len + index } else { index };
    usize::try_from(resolved).ok().filter(|&i| (i as i64) < len)
}

fn slice(items: &[Json], start: Option<i64>, end: Option<i64>, step: i64) -> Vec<&Json> {
    let Ok(len) = i64::try_from(items.len()) else {
        return Vec::new();
    };
    let clamp = |i: i64, low: i64, high: i64| {
        let i = if i < 0 { len + i } else { i };
        i.clamp(low, high)
    };

    let mut out = Vec::new();
    if step > 0 {
        let mut i = start.map_or(0, |s| clamp(s, 0, len));
        let stop = end.map_or(len, |e| clamp(e, 0, len));
        while i < stop {
            out.extend(usize::try_from(i).ok().and_then(|i| items.get(i)));
            i += step;
        }
    } else {
        let mut i = start.map_or(len - 1, |s| clamp(s, -1, len - 1));
        let stop = end.map_or(-1, |e| clamp(e, -1, len - 1));
        while i > stop {
            out.extend(usize::try_from(i).ok().and_then(|i| items.get(i)));
            i += step;
        }
    }
    out
}

fn matches(filter: &FilterExpr, candidate: &Json) -> bool {
    match filter {
        FilterExpr::Exists(path) => resolve(path, candidate).is_some(),
        FilterExpr::Compare(path, op, literal) => {
            resolve(path, candidate).is_some_and(|value| compare(value, *op, literal))
        }
        FilterExpr::Not(inner) => !matches(inner, candidate),
        FilterExpr::And(a, b) => matches(a, candidate) && matches(b, candidate),
        FilterExpr::Or(a, b) => matches(a, candidate) || matches(b, candidate),
    }
}

fn resolve<'j>(path: &[PathKey], candidate: &'j Json) -> Option<&'j Json> {
    path.iter().try_fold(candidate, |node, key| match key {
        PathKey::Name(name) => node.get(name),
        PathKey::Index(i) => match node {
            Json::Array(items) => resolve_index(*i, items.len()).and_then(|i| items.get(i)),
            _ => None,
        },
    })
}

fn compare(value: &Json, op: CompareOp, literal: &Json) -> bool {
    let ordering = match (value, literal) {
        (Json::Number(a), Json::Number(b)) => a.as_f64().zip(b.as_f64()).and_then(|(a, b)| a.partial_cmp(&b)),
        (Json::String(a), Json::String(b)) => Some(a.cmp(b)),
        (a, b) if a == b => Some(Ordering::Equal),
        _ => None,
    };
    match op {
        CompareOp::Eq => ordering == Some(Ordering::Equal),
        CompareOp::Ne => ordering != Some(Ordering::Equal),
        CompareOp::Lt => ordering == Some(Ordering::Less),
        CompareOp::Le => matches!(ordering, Some(Ordering::Less | Ordering::Equal)),
        CompareOp::Gt => ordering == Some(Ordering::Greater),
        CompareOp::Ge => matches!(ordering, Some(Ordering::Greater | Ordering::Equal)),
    }
}
