//! JSONPath expression parser

use serde_json::Value as Json;

use crate::error::{ExtractError, Result};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Segment {
    /// `.name`, `[...]`
    Child(Selector),
    /// `..name`, `..[...]`
    Descendant(Selector),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Selector {
    Name(String),
    Wildcard,
    Index(i64),
    Slice {
        start: Option<i64>,
        end: Option<i64>,
        step: i64,
    },
    Union(Vec<Selector>),
    Filter(FilterExpr),
}

/// Relative path inside a filter, rooted at the candidate (`@`).
pub(crate) type RelativePath = Vec<PathKey>;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum PathKey {
    Name(String),
    Index(i64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum FilterExpr {
    Exists(RelativePath),
    Compare(RelativePath, CompareOp, Json),
    Not(Box<FilterExpr>),
    And(Box<FilterExpr>, Box<FilterExpr>),
    Or(Box<FilterExpr>, Box<FilterExpr>),
}

pub(crate) struct Parser<'p> {
    path: &'p str,
    chars: Vec<char>,
    pos: usize,
}

impl<'p> Parser<'p> {
    pub(crate) fn new(path: &'p str) -> Self {
        Self {
            path,
            chars: path.chars().collect(),
            pos: 0,
        }
    }

    fn error(&self, reason: impl Into<String>) -> ExtractError {
        ExtractError::json_path(self.path, format!("{} at offset {}", reason.into(), self.pos))
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn starts_with(&self, s: &str) -> bool {
        s.chars().enumerate().all(|(i, c)| self.chars.get(self.pos + i) == Some(&c))
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn expect(&mut self, c: char) -> Result<()> {
        self.skip_whitespace();
        if self.peek() == Some(c) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(format!("expected `{c}`")))
        }
    }

    /// Parse a full path starting at `$`.
    pub(crate) fn parse(mut self) -> Result<Vec<Segment>> {
        self.skip_whitespace();
        self.expect('$')?;

        let mut segments = Vec::new();
        loop {
            self.skip_whitespace();
            match self.peek() {
                None => return Ok(segments),
                Some('.') if self.starts_with("..") => {
                    self.pos += 2;
                    let selector = match self.peek() {
                        Some('[') => self.bracket()?,
                        _ => self.dot_member()?,
                    };
                    segments.push(Segment::Descendant(selector));
                }
                Some('.') => {
                    self.pos += 1;
                    segments.push(Segment::Child(self.dot_member()?));
                }
                Some('[') => segments.push(Segment::Child(self.bracket()?)),
                Some(c) => return Err(self.error(format!("unexpected `{c}`"))),
            }
        }
    }

    fn dot_member(&mut self) -> Result<Selector> {
        if self.peek() == Some('*') {
            self.pos += 1;
            return Ok(Selector::Wildcard);
        }
        let name = self.name();
        if name.is_empty() {
            return Err(self.error("expected a member name"));
        }
        Ok(Selector::Name(name))
    }

    fn name(&mut self) -> String {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '$' | '@' | ':'))
        {
            self.pos += 1;
        }
        self.chars[start..self.pos].iter().collect()
    }

    fn bracket(&mut self) -> Result<Selector> {
        self.expect('[')?;
        self.skip_whitespace();

        let selector = match self.peek() {
            Some('*') => {
                self.pos += 1;
                Selector::Wildcard
            }
            Some('?') => {
                self.pos += 1;
                self.expect('(')?;
                let filter = self.filter_or()?;
                self.expect(')')?;
                Selector::Filter(filter)
            }
            _ => {
                let mut items = vec![self.bracket_item()?];
                loop {
                    self.skip_whitespace();
                    if self.peek() != Some(',') {
                        break;
                    }
                    self.pos += 1;
                    items.push(self.bracket_item()?);
                }
                match items.len() {
                    1 => items.remove(0),
                    _ => Selector::Union(items),
                }
            }
        };

        self.expect(']')?;
        Ok(selector)
    }

    fn bracket_item(&mut self) -> Result<Selector> {
        self.skip_whitespace();
        match self.peek() {
            Some('\'' | '"') => Ok(Selector::Name(self.quoted()?)),
            Some('*') => {
                self.pos += 1;
                Ok(Selector::Wildcard)
            }
            _ => {
                let start = self.integer()?;
                self.skip_whitespace();
                if self.peek() != Some(':') {
                    return start
                        .map(Selector::Index)
                        .ok_or_else(|| self.error("expected an index, name or slice"));
                }
                self.pos += 1;
                let end = self.integer()?;
                self.skip_whitespace();
                let step = if self.peek() == Some(':') {
                    self.pos += 1;
                    self.integer()?.unwrap_or(1)
                } else {
                    1
                };
                if step == 0 {
                    return Err(self.error("slice step cannot be zero"));
                }
                Ok(Selector::Slice { start, end, step })
            }
        }
    }

    fn integer(&mut self) -> Result<Option<i64>> {
        self.skip_whitespace();
        let start = self.pos;
        if self.peek() == Some('-') {
            self.pos += 1;
        }
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        if text.is_empty() {
            return Ok(None);
        }
        text.parse().map(Some).map_err(|_| self.error(format!("invalid integer `{text}`")))
    }

    fn quoted(&mut self) -> Result<String> {
        let quote = self.peek().ok_or_else(|| self.error("expected a string"))?;
        self.pos += 1;
        let mut out = String::new();
        loop {
            match self.peek() {
                None => return Err(self.error("unterminated string")),
                Some('\\') => {
                    self.pos += 1;
                    let escaped = self.peek().ok_or_else(|| self.error("unterminated string"))?;
                    out.push(escaped);
                }
                Some(c) if c == quote => {
                    self.pos += 1;
                    return Ok(out);
                }
                Some(c) => out.push(c),
            }
            self.pos += 1;
        }
    }

    fn filter_or(&mut self) -> Result<FilterExpr> {
        let mut left = self.filter_and()?;
        loop {
            self.skip_whitespace();
            if !self.starts_with("||") {
                return Ok(left);
            }
            self.pos += 2;
            let right = self.filter_and()?;
            left = FilterExpr::Or(Box::new(left), Box::new(right));
        }
    }

    fn filter_and(&mut self) -> Result<FilterExpr> {
        let mut left = self.filter_atom()?;
        loop {
            self.skip_whitespace();
            if !self.starts_with("&&") {
                return Ok(left);
            }
            self.pos += 2;
            let right = self.filter_atom()?;
            left = FilterExpr::And(Box::new(left), Box::new(right));
        }
    }

    fn filter_atom(&mut self) -> Result<FilterExpr> {
        self.skip_whitespace();
        match self.peek() {
            Some('(') => {
                self.pos += 1;
                let inner = self.filter_or()?;
                self.expect(')')?;
                Ok(inner)
            }
            Some('!') if !self.starts_with("!=") => {
                self.pos += 1;
                Ok(FilterExpr::Not(Box::new(self.filter_atom()?)))
            }
            Some('@') => {
                self.pos += 1;
                let path = self.relative_path()?;
                match self.compare_op() {
                    Some(op) => Ok(FilterExpr::Compare(path, op, self.literal()?)),
                    None => Ok(FilterExpr::Exists(path)),
                }
            }
            _ => Err(self.error("filter terms must start with `@`")),
        }
    }

    fn relative_path(&mut self) -> Result<RelativePath> {
        let mut keys = Vec::new();
        loop {
            match self.peek() {
                Some('.') => {
                    self.pos += 1;
                    let name = self.name();
                    if name.is_empty() {
                        return Err(self.error("expected a member name"));
                    }
                    keys.push(PathKey::Name(name));
                }
                Some('[') => {
                    self.pos += 1;
                    self.skip_whitespace();
                    let key = match self.peek() {
                        Some('\'' | '"') => PathKey::Name(self.quoted()?),
                        _ => PathKey::Index(self.integer()?.ok_or_else(|| self.error("expected an index"))?),
                    };
                    self.expect(']')?;
                    keys.push(key);
                }
                _ => return Ok(keys),
            }
        }
    }

    fn compare_op(&mut self) -> Option<CompareOp> {
        self.skip_whitespace();
        let (op, width) = [
            ("==", CompareOp::Eq, 2),
            ("!=", CompareOp::Ne, 2),
            ("<=", CompareOp::Le, 2),
            (">=", CompareOp::Ge, 2),
            ("<", CompareOp::Lt, 1),
            (">", CompareOp::Gt, 1),
        ]
        .into_iter()
        .find(|(text, _, _)| self.starts_with(text))
        .map(|(_, op, width)| (op, width))?;
        self.pos += width;
        Some(op)
    }

    fn literal(&mut self) -> Result<Json> {
        self.skip_whitespace();
        if matches!(self.peek(), Some('\'' | '"')) {
            return Ok(Json::String(self.quoted()?));
        }
        for (word, value) in [("true", Json::Bool(true)), ("false", Json::Bool(false)), ("null", Json::Null)] {
            if self.starts_with(word) {
                self.pos += word.len();
                return Ok(value);
            }
        }

        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_digit() || matches!(c, '-' | '+' | '.' | 'e' | 'E'))
        {
            self.pos += 1;
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        serde_json::from_str::<serde_json::Number>(&text)
            .map(Json::Number)
            .map_err(|_| self.error("expected a literal"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(path: &str) -> Result<Vec<Segment>> {
        Parser::new(path).parse()
    }

    #[test]
    fn test_dot_and_bracket_members() {
        assert_eq!(
            parse("$.a['b c'][0]").unwrap(),
            vec![
                Segment::Child(Selector::Name("a".into())),
                Segment::Child(Selector::Name("b c".into())),
                Segment::Child(Selector::Index(0)),
            ]
        );
        assert_eq!(parse("$").unwrap(), vec![]);
    }

    #[test]
    fn test_wildcards_slices_unions() {
        assert_eq!(
            parse("$.*[*][1:-1:2][0,2]").unwrap(),
            vec![
                Segment::Child(Selector::Wildcard),
                Segment::Child(Selector::Wildcard),
                Segment::Child(Selector::Slice {
                    start: Some(1),
                    end: Some(-1),
                    step: 2
                }),
                Segment::Child(Selector::Union(vec![Selector::Index(0), Selector::Index(2)])),
            ]
        );
        assert_eq!(
            parse("$[:2]").unwrap(),
            vec![Segment::Child(Selector::Slice {
                start: None,
                end: Some(2),
                step: 1
            })]
        );
    }

    #[test]
    fn test_recursive_descent() {
        assert_eq!(
            parse("$..price").unwrap(),
            vec![Segment::Descendant(Selector::Name("price".into()))]
        );
        assert_eq!(parse("$..[0]").unwrap(), vec![Segment::Descendant(Selector::Index(0))]);
    }

    #[test]
    fn test_filters() {
        assert_eq!(
            parse("$.items[?(@.price < 10 && !@.sold)]").unwrap()[1],
            Segment::Child(Selector::Filter(FilterExpr::And(
                Box::new(FilterExpr::Compare(
                    vec![PathKey::Name("price".into())],
                    CompareOp::Lt,
                    json!(10)
                )),
                Box::new(FilterExpr::Not(Box::new(FilterExpr::Exists(vec![PathKey::Name("sold".into())])))),
            )))
        );
        assert_eq!(
            parse("$[?(@.tag == 'a' || @['x'][0] != null)]").unwrap().len(),
            1
        );
    }

    #[test]
    fn test_errors() {
        for path in ["a.b", "$.", "$[", "$['a'", "$[1:2:0]", "$[?(price > 1)]", "$.a b", "$[?(@.a == )]"] {
            assert!(
                matches!(parse(path), Err(ExtractError::JsonPath { .. })),
                "expected an error for {path}"
            );
        }
    }
}
