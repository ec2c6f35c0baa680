//! Query evaluation over a parsed [`Document`]

use scraper::ElementRef;

use crate::document::{normalize_whitespace, string_value, Document};
use crate::error::{ExtractError, Result};

use super::parser::{Axis, BinaryOp, Expr, Function, LocationPath, NodeTest, Step, ValueStep};

/// A node reachable by the engine: the document node or an element.
#[derive(Debug, Clone, Copy)]
pub(crate) enum XNode<'a> {
    Root,
    Element(ElementRef<'a>),
}

#[derive(Debug)]
enum XValue<'a> {
    Nodes(Vec<XNode<'a>>),
    /// Text and attribute values selected by a trailing value step
    Strings(Vec<String>),
    Str(String),
    Num(f64),
    Bool(bool),
}

/// Evaluation context for one predicate test.
#[derive(Clone, Copy)]
struct Context<'a> {
    node: XNode<'a>,
    position: usize,
    size: usize,
}

pub(crate) struct Evaluator<'a, 'q> {
    document: &'a Document,
    query: &'q str,
}

impl<'a, 'q> Evaluator<'a, 'q> {
    pub(crate) fn new(document: &'a Document, query: &'q str) -> Self {
        Self { document, query }
    }

    /// Evaluate a top-level expression from the document node and return
    /// the selected elements in document order.
    pub(crate) fn select(&self, expr: &Expr) -> Result<Vec<ElementRef<'a>>> {
        let context = Context {
            node: XNode::Root,
            position: 1,
            size: 1,
        };
        match self.eval(expr, context)? {
            XValue::Nodes(nodes) => Ok(nodes
                .into_iter()
                .filter_map(|node| match node {
                    XNode::Element(e) => Some(e),
                    XNode::Root => None,
                })
                .collect()),
            _ => Err(ExtractError::xpath(self.query, "query does not select elements")),
        }
    }

    fn eval(&self, expr: &Expr, context: Context<'a>) -> Result<XValue<'a>> {
        Ok(match expr {
            Expr::Path(path) => self.path_value(path, context.node)?,
            Expr::Union(paths) => {
                let mut nodes = Vec::new();
                for path in paths {
                    nodes.extend(self.select_path(path, context.node)?);
                }
                XValue::Nodes(self.sort(nodes))
            }
            Expr::Literal(s) => XValue::Str(s.clone()),
            Expr::Number(n) => XValue::Num(*n),
            Expr::Call(function, args) => self.call(*function, args, context)?,
            Expr::Binary(left, BinaryOp::Or, right) => {
                XValue::Bool(self.eval_bool(left, context)? || self.eval_bool(right, context)?)
            }
            Expr::Binary(left, BinaryOp::And, right) => {
                XValue::Bool(self.eval_bool(left, context)? && self.eval_bool(right, context)?)
            }
            Expr::Binary(left, op, right) => {
                let left = self.eval(left, context)?;
                let right = self.eval(right, context)?;
                XValue::Bool(self.compare(*op, &left, &right))
            }
        })
    }

    fn eval_bool(&self, expr: &Expr, context: Context<'a>) -> Result<bool> {
        let value = self.eval(expr, context)?;
        Ok(self.to_bool(&value))
    }

    fn path_value(&self, path: &LocationPath, context: XNode<'a>) -> Result<XValue<'a>> {
        let nodes = self.select_path(path, context)?;
        Ok(match &path.value {
            None => XValue::Nodes(nodes),
            Some(ValueStep::Text) => XValue::Strings(
                nodes
                    .iter()
                    .filter_map(|node| match node {
                        XNode::Element(e) => Some(e),
                        XNode::Root => None,
                    })
                    .flat_map(|e| {
                        e.children()
                            .filter_map(|child| child.value().as_text().map(|t| t.to_string()))
                    })
                    .collect(),
            ),
            Some(ValueStep::Attribute(name)) => XValue::Strings(
                nodes
                    .iter()
                    .filter_map(|node| match node {
                        XNode::Element(e) => Some(e),
                        XNode::Root => None,
                    })
                    .flat_map(|e| {
                        e.value()
                            .attrs()
                            .filter(|(attr, _)| name.as_deref().is_none_or(|n| attr.eq_ignore_ascii_case(n)))
                            .map(|(_, value)| value.to_string())
                    })
                    .collect(),
            ),
        })
    }

    fn select_path(&self, path: &LocationPath, context: XNode<'a>) -> Result<Vec<XNode<'a>>> {
        let mut nodes = vec![if path.absolute { XNode::Root } else { context }];
        for step in &path.steps {
            let mut next = Vec::new();
            for node in &nodes {
                next.extend(self.apply_step(step, *node)?);
            }
            nodes = self.sort(next);
        }
        Ok(nodes)
    }

    fn apply_step(&self, step: &Step, node: XNode<'a>) -> Result<Vec<XNode<'a>>> {
        let mut candidates: Vec<_> = self
            .axis(step.axis, node)
            .into_iter()
            .filter(|candidate| matches_test(&step.test, candidate))
            .collect();

        for predicate in &step.predicates {
            let size = candidates.len();
            let mut kept = Vec::with_capacity(size);
            for (i, candidate) in candidates.into_iter().enumerate() {
                let context = Context {
                    node: candidate,
                    position: i + 1,
                    size,
                };
                let keep = match self.eval(predicate, context)? {
                    XValue::Num(n) => n == context.position as f64,
                    other => self.to_bool(&other),
                };
                if keep {
                    kept.push(candidate);
                }
            }
            candidates = kept;
        }
        Ok(candidates)
    }

    /// Nodes along `axis`, in axis order: nearest first for reverse axes.
    fn axis(&self, axis: Axis, node: XNode<'a>) -> Vec<XNode<'a>> {
        let element = match node {
            XNode::Element(e) => e,
            XNode::Root => {
                return match axis {
                    Axis::Child => self.document.top_level().map(XNode::Element).collect(),
                    Axis::Descendant => self.document.elements().map(XNode::Element).collect(),
                    Axis::DescendantOrSelf => std::iter::once(XNode::Root)
                        .chain(self.document.elements().map(XNode::Element))
                        .collect(),
                    Axis::SelfAxis | Axis::AncestorOrSelf => vec![XNode::Root],
                    _ => Vec::new(),
                };
            }
        };

        let as_node = |n| ElementRef::wrap(n).map_or(XNode::Root, XNode::Element);
        match axis {
            Axis::Child => element.children().filter_map(ElementRef::wrap).map(XNode::Element).collect(),
            Axis::Descendant => element
                .descendants()
                .skip(1)
                .filter_map(ElementRef::wrap)
                .map(XNode::Element)
                .collect(),
            Axis::DescendantOrSelf => element
                .descendants()
                .filter_map(ElementRef::wrap)
                .map(XNode::Element)
                .collect(),
            Axis::SelfAxis => vec![node],
            Axis::Parent => element.parent().map(as_node).into_iter().collect(),
            Axis::Ancestor => element.ancestors().map(as_node).collect(),
            Axis::AncestorOrSelf => std::iter::once(node).chain(element.ancestors().map(as_node)).collect(),
            Axis::FollowingSibling => element
                .next_siblings()
                .filter_map(ElementRef::wrap)
                .map(XNode::Element)
                .collect(),
            Axis::PrecedingSibling => element
                .prev_siblings()
                .filter_map(ElementRef::wrap)
                .map(XNode::Element)
                .collect(),
        }
    }

    /// Deduplicate into document order.
    fn sort(&self, nodes: Vec<XNode<'a>>) -> Vec<XNode<'a>> {
        let has_root = nodes.iter().any(|n| matches!(n, XNode::Root));
        let elements = nodes
            .into_iter()
            .filter_map(|node| match node {
                XNode::Element(e) => Some(e),
                XNode::Root => None,
            })
            .collect();
        let ordered = self.document.in_document_order(elements);

        let mut sorted = Vec::with_capacity(ordered.len() + 1);
        if has_root {
            sorted.push(XNode::Root);
        }
        sorted.extend(ordered.into_iter().map(XNode::Element));
        sorted
    }

    fn call(&self, function: Function, args: &[Expr], context: Context<'a>) -> Result<XValue<'a>> {
        let arg = |i: usize| -> Result<Option<XValue<'a>>> {
            args.get(i).map(|expr| self.eval(expr, context)).transpose()
        };
        // string argument, defaulting to the context node
        let string_arg = |i: usize| -> Result<String> {
            Ok(match arg(i)? {
                Some(value) => self.to_string(&value),
                None => self.node_string(context.node),
            })
        };

        Ok(match function {
            Function::Last => XValue::Num(context.size as f64),
            Function::Position => XValue::Num(context.position as f64),
            Function::True => XValue::Bool(true),
            Function::False => XValue::Bool(false),
            Function::Count => match arg(0)? {
                Some(XValue::Nodes(nodes)) => XValue::Num(nodes.len() as f64),
                Some(XValue::Strings(strings)) => XValue::Num(strings.len() as f64),
                _ => return Err(ExtractError::xpath(self.query, "count() expects a node-set")),
            },
            Function::Contains => XValue::Bool(string_arg(0)?.contains(&string_arg(1)?)),
            Function::StartsWith => XValue::Bool(string_arg(0)?.starts_with(&string_arg(1)?)),
            Function::NormalizeSpace => XValue::Str(normalize_whitespace(&string_arg(0)?)),
            Function::StringLength => XValue::Num(string_arg(0)?.chars().count() as f64),
            Function::String => XValue::Str(string_arg(0)?),
            Function::Not => XValue::Bool(!arg(0)?.is_some_and(|value| self.to_bool(&value))),
            Function::Name => {
                let node = match arg(0)? {
                    Some(XValue::Nodes(nodes)) => nodes.first().copied(),
                    Some(_) => return Err(ExtractError::xpath(self.query, "name() expects a node-set")),
                    None => Some(context.node),
                };
                XValue::Str(match node {
                    Some(XNode::Element(e)) => e.value().name().to_string(),
                    _ => String::new(),
                })
            }
        })
    }

    fn node_string(&self, node: XNode<'a>) -> String {
        match node {
            XNode::Root => string_value(&self.document.root_element()),
            XNode::Element(e) => string_value(&e),
        }
    }

    fn to_bool(&self, value: &XValue<'a>) -> bool {
        match value {
            XValue::Nodes(nodes) => !nodes.is_empty(),
            XValue::Strings(strings) => !strings.is_empty(),
            XValue::Str(s) => !s.is_empty(),
            XValue::Num(n) => *n != 0.0 && !n.is_nan(),
            XValue::Bool(b) => *b,
        }
    }

    fn to_string(&self, value: &XValue<'a>) -> String {
        match value {
            XValue::Nodes(nodes) => nodes.first().map(|n| self.node_string(*n)).unwrap_or_default(),
            XValue::Strings(strings) => strings.first().cloned().unwrap_or_default(),
            XValue::Str(s) => s.clone(),
            XValue::Num(n) => format_number(*n),
            XValue::Bool(b) => b.to_string(),
        }
    }

    /// String values of a node-set, or `None` for scalars.
    fn set_strings(&self, value: &XValue<'a>) -> Option<Vec<String>> {
        match value {
            XValue::Nodes(nodes) => Some(nodes.iter().map(|n| self.node_string(*n)).collect()),
            XValue::Strings(strings) => Some(strings.clone()),
            _ => None,
        }
    }

    fn compare(&self, op: BinaryOp, left: &XValue<'a>, right: &XValue<'a>) -> bool {
        match (self.set_strings(left), self.set_strings(right)) {
            (Some(l), Some(r)) => l
                .iter()
                .any(|a| r.iter().any(|b| compare_atoms(op, &Atom::Str(a), &Atom::Str(b)))),
            (Some(set), None) => self.compare_set(op, &set, right, false),
            (None, Some(set)) => self.compare_set(op, &set, left, true),
            (None, None) => {
                let l = self.to_string(left);
                let r = self.to_string(right);
                compare_atoms(op, &self.atom(left, &l), &self.atom(right, &r))
            }
        }
    }

    fn compare_set(&self, op: BinaryOp, set: &[String], scalar: &XValue<'a>, scalar_first: bool) -> bool {
        let ordered = |a: &Atom<'_>, b: &Atom<'_>| {
            if scalar_first {
                compare_atoms(op, b, a)
            } else {
                compare_atoms(op, a, b)
            }
        };
        match scalar {
            XValue::Bool(b) => ordered(&Atom::Bool(!set.is_empty()), &Atom::Bool(*b)),
            XValue::Num(n) => set.iter().any(|s| ordered(&Atom::Num(parse_number(s)), &Atom::Num(*n))),
            other => {
                let text = self.to_string(other);
                set.iter().any(|s| ordered(&Atom::Str(s), &Atom::Str(&text)))
            }
        }
    }

    fn atom<'s>(&self, value: &XValue<'a>, text: &'s str) -> Atom<'s> {
        match value {
            XValue::Num(n) => Atom::Num(*n),
            XValue::Bool(b) => Atom::Bool(*b),
            _ => Atom::Str(text),
        }
    }
}

fn matches_test(test: &NodeTest, node: &XNode<'_>) -> bool {
    match (test, node) {
        (NodeTest::AnyNode, _) => true,
        (NodeTest::AnyElement, XNode::Element(_)) => true,
        (NodeTest::Name(name), XNode::Element(e)) => e.value().name().eq_ignore_ascii_case(name),
        (_, XNode::Root) => false,
    }
}

/// Scalar operand of a comparison.
enum Atom<'s> {
    Str(&'s str),
    Num(f64),
    Bool(bool),
}

impl Atom<'_> {
    fn as_bool(&self) -> bool {
        match self {
            Atom::Str(s) => !s.is_empty(),
            Atom::Num(n) => *n != 0.0 && !n.is_nan(),
            Atom::Bool(b) => *b,
        }
    }

    fn as_number(&self) -> f64 {
        match self {
            Atom::Str(s) => parse_number(s),
            Atom::Num(n) => *n,
            Atom::Bool(b) => f64::from(u8::from(*b)),
        }
    }
}

fn compare_atoms(op: BinaryOp, a: &Atom<'_>, b: &Atom<'_>) -> bool {
    match op {
        BinaryOp::Eq | BinaryOp::Neq => {
            let equal = match (a, b) {
                (Atom::Bool(_), _) | (_, Atom::Bool(_)) => a.as_bool() == b.as_bool(),
                (Atom::Num(_), _) | (_, Atom::Num(_)) => a.as_number() == b.as_number(),
                (Atom::Str(x), Atom::Str(y)) => x == y,
            };
            equal == (op == BinaryOp::Eq)
        }
        BinaryOp::Lt => a.as_number() < b.as_number(),
        BinaryOp::Le => a.as_number() <= b.as_number(),
        BinaryOp::Gt => a.as_number() > b.as_number(),
        BinaryOp::Ge => a.as_number() >= b.as_number(),
        BinaryOp::And | BinaryOp::Or => a.as_bool() && b.as_bool(),
    }
}

fn parse_number(s: &str) -> f64 {
    s.trim().parse().unwrap_or(f64::NAN)
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.is_finite() {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}
