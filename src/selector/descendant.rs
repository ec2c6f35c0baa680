//! Translation of a single selector step

use std::fmt;

use crate::error::{ExtractError, Result};

use super::filter::{css_ident, Filter};

/// How a step relates to the elements selected before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    /// `/step`
    Child,
    /// `//step`, or a step with no leading slash
    Descendant,
}

/// A step that yields values instead of narrowing the element set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Terminal {
    /// `text()`: each element's own text
    Text,
    /// `node()`: raw data-node content (script and style bodies)
    Node,
    /// `@name`: attribute value
    Attribute(String),
}

impl Terminal {
    /// Recognise `text()`, `node()`, `@name` and `attribute::name`.
    pub fn parse(segment: &str) -> Option<Self> {
        let segment = segment.trim();
        match segment {
            "text()" => Some(Self::Text),
            "node()" => Some(Self::Node),
            _ => segment
                .strip_prefix('@')
                .or_else(|| segment.strip_prefix("attribute::"))
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(|name| Self::Attribute(name.to_string())),
        }
    }
}

impl fmt::Display for Terminal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => f.write_str("text()"),
            Self::Node => f.write_str("node()"),
            Self::Attribute(name) => write!(f, "@{name}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepNode {
    Element { name: String, filters: Vec<Filter> },
    /// `following-sibling::name`
    FollowingSibling { name: String, filters: Vec<Filter> },
    /// `..`
    Parent,
    /// `.`
    SelfNode,
    Terminal(Terminal),
}

/// One tokenized selector step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Descendant {
    raw: String,
    axis: Axis,
    node: StepNode,
}

impl Descendant {
    pub fn parse(step: &str) -> Result<Self> {
        let trimmed = step.trim();
        let body = trimmed.trim_start_matches('/');
        let axis = match trimmed.len() - body.len() {
            1 => Axis::Child,
            _ => Axis::Descendant,
        };

        let tokens = tokenize(step, body)?;
        // Filters are classified first so a grammar error wins over any
        // other problem with the step.
        let filters = tokens
            .groups
            .into_iter()
            .map(|b| Filter::classify(step, b))
            .collect::<Result<Vec<_>>>()?;
        if let Some(c) = tokens.trailing {
            return Err(ExtractError::css(step, format!("unexpected `{c}` after filter")));
        }
        let node = classify_head(step, tokens.head.trim(), filters)?;

        Ok(Self {
            raw: step.to_string(),
            axis,
            node,
        })
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn axis(&self) -> Axis {
        self.axis
    }

    pub fn node(&self) -> &StepNode {
        &self.node
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.node, StepNode::Terminal(_))
    }

    pub fn terminal(&self) -> Option<&Terminal> {
        match &self.node {
            StepNode::Terminal(t) => Some(t),
            _ => None,
        }
    }

    /// CSS combinator joining this step to the previous one.
    pub fn combinator(&self) -> &'static str {
        match (&self.node, self.axis) {
            (StepNode::FollowingSibling { .. }, _) => " ~ ",
            (StepNode::Parent, _) | (_, Axis::Child) => " > ",
            (_, Axis::Descendant) => " ",
        }
    }

    /// CSS fragment for the step itself, without a combinator.
    pub fn to_css(&self) -> String {
        match &self.node {
            StepNode::Element { name, filters } | StepNode::FollowingSibling { name, filters } => {
                let mut css = element_css(name);
                for filter in filters {
                    css.push_str(&filter.to_css());
                }
                css
            }
            StepNode::Parent => "..".to_string(),
            StepNode::SelfNode => String::new(),
            StepNode::Terminal(t) => t.to_string(),
        }
    }

    /// Tag and attribute filters only, in a form scraper can compile.
    pub(crate) fn compound_css(&self) -> Option<String> {
        match &self.node {
            StepNode::Element { name, filters } | StepNode::FollowingSibling { name, filters } => {
                let mut css = element_css(name);
                for filter in filters.iter().filter(|f| f.is_attribute()) {
                    css.push_str(&filter.to_css());
                }
                Some(css)
            }
            _ => None,
        }
    }

    pub(crate) fn filters(&self) -> &[Filter] {
        match &self.node {
            StepNode::Element { filters, .. } | StepNode::FollowingSibling { filters, .. } => filters,
            _ => &[],
        }
    }
}

fn element_css(name: &str) -> String {
    if name == "*" {
        name.to_string()
    } else {
        css_ident(name)
    }
}

/// A step body split into its head and the bodies of its `[...]` groups.
struct Tokens<'a> {
    head: &'a str,
    groups: Vec<&'a str>,
    /// First character found between or after the groups
    trailing: Option<char>,
}

fn tokenize<'a>(step: &str, body: &'a str) -> Result<Tokens<'a>> {
    let mut in_literal = false;
    let mut trailing = None;
    let mut depth = 0usize;
    let mut head_end = None;
    let mut group_start = 0;
    let mut groups = Vec::new();

    for (i, c) in body.char_indices() {
        match c {
            '\'' => in_literal = !in_literal,
            '[' if !in_literal => {
                if depth == 0 {
                    head_end.get_or_insert(i);
                    group_start = i + 1;
                }
                depth += 1;
            }
            ']' if !in_literal => {
                if depth == 0 {
                    return Err(ExtractError::Grammar {
                        step: step.to_string(),
                        filter: body[head_end.unwrap_or(0)..].to_string(),
                    });
                }
                depth -= 1;
                if depth == 0 {
                    groups.push(&body[group_start..i]);
                }
            }
            c if depth == 0 && head_end.is_some() && !c.is_whitespace() => {
                trailing.get_or_insert(c);
            }
            _ => {}
        }
    }

    if depth > 0 || in_literal {
        return Err(ExtractError::Grammar {
            step: step.to_string(),
            filter: body[group_start..].to_string(),
        });
    }

    Ok(Tokens {
        head: &body[..head_end.unwrap_or(body.len())],
        groups,
        trailing,
    })
}

fn classify_head(step: &str, head: &str, filters: Vec<Filter>) -> Result<StepNode> {
    let no_filters = |node: StepNode| {
        if filters.is_empty() {
            Ok(node)
        } else {
            Err(ExtractError::css(step, "filters are not allowed on this step"))
        }
    };

    if let Some(terminal) = Terminal::parse(head) {
        return no_filters(StepNode::Terminal(terminal));
    }

    match head {
        "." => no_filters(StepNode::SelfNode),
        ".." => no_filters(StepNode::Parent),
        _ => match head.split_once("::") {
            Some((axis, name)) if axis.trim() == "following-sibling" => Ok(StepNode::FollowingSibling {
                name: element_name(name),
                filters,
            }),
            Some((axis, _)) => Err(ExtractError::css(step, format!("unsupported axis `{}`", axis.trim()))),
            None => Ok(StepNode::Element {
                name: element_name(head),
                filters,
            }),
        },
    }
}

fn element_name(name: &str) -> String {
    match name.trim() {
        "" => "*".to_string(),
        name => name.to_string(),
    }
}
