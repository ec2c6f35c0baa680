//! Bracket filter classification and CSS rendering

use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::error::{ExtractError, Result};

// Checked in this order; the first pattern that matches wins.
static ATTR_EQUALS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*@([A-Za-z_][\w.:-]*)\s*=\s*'([^']*)'\s*$").unwrap());

static ATTR_CONTAINS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*contains\(\s*@([A-Za-z_][\w.:-]*)\s*,\s*'([^']*)'\s*\)\s*$").unwrap());

static TEXT_CONTAINS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*contains\(\s*text\(\)\s*,\s*'([^']*)'\s*\)\s*$").unwrap());

static INDEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*(\d+)\s*$").unwrap());

static ATTR_EXISTS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*@([A-Za-z_][\w.:-]*)\s*$").unwrap());

/// One bracketed predicate of a selector step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    /// `[@attr='v']`
    AttrEquals { name: String, value: String },
    /// `[contains(@attr,'v')]`
    AttrContains { name: String, value: String },
    /// `[contains(text(),'v')]`
    TextContains(String),
    /// `[n]`, a zero-based index
    Index(usize),
    /// `[@attr]`
    AttrExists(String),
}

impl Filter {
    /// Classify the body of one `[...]` group of `step`.
    ///
    /// Anything outside the five supported forms is a grammar error; the
    /// filter is never dropped.
    pub fn classify(step: &str, body: &str) -> Result<Self> {
        if let Some(caps) = captures(&ATTR_EQUALS, body) {
            return Ok(Self::AttrEquals {
                name: caps[1].to_string(),
                value: caps[2].to_string(),
            });
        }
        if let Some(caps) = captures(&ATTR_CONTAINS, body) {
            return Ok(Self::AttrContains {
                name: caps[1].to_string(),
                value: caps[2].to_string(),
            });
        }
        if let Some(caps) = captures(&TEXT_CONTAINS, body) {
            return Ok(Self::TextContains(caps[1].to_string()));
        }
        if let Some(index) = captures(&INDEX, body).and_then(|caps| caps[1].parse().ok()) {
            return Ok(Self::Index(index));
        }
        if let Some(caps) = captures(&ATTR_EXISTS, body) {
            return Ok(Self::AttrExists(caps[1].to_string()));
        }

        Err(ExtractError::Grammar {
            step: step.to_string(),
            filter: body.to_string(),
        })
    }

    /// jsoup-style CSS form of the filter.
    pub fn to_css(&self) -> String {
        match self {
            Self::AttrEquals { name, value } => format!("[{}=\"{}\"]", css_ident(name), css_string(value)),
            Self::AttrContains { name, value } => format!("[{}*=\"{}\"]", css_ident(name), css_string(value)),
            Self::TextContains(value) => format!(":matchesOwn({value})"),
            Self::Index(n) => format!(":eq({n})"),
            Self::AttrExists(name) => format!("[{}]", css_ident(name)),
        }
    }

    /// Attribute filters compile into a scraper selector; the rest are
    /// applied after matching.
    pub(crate) fn is_attribute(&self) -> bool {
        matches!(self, Self::AttrEquals { .. } | Self::AttrContains { .. } | Self::AttrExists(_))
    }
}

fn captures<'t>(re: &Regex, text: &'t str) -> Option<Captures<'t>> {
    re.captures(text)
}

/// Escape an identifier such as `xml:lang` for use in a CSS selector.
pub(crate) fn css_ident(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() || c == '-' || c == '_' || !c.is_ascii() {
            out.push(c);
        } else {
            out.push('\\');
            out.push(c);
        }
    }
    out
}

/// Escape the contents of a double-quoted CSS string.
pub(crate) fn css_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '"' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            '\n' => out.push_str("\\a "),
            _ => out.push(c),
        }
    }
    out
}
