//! Recursive-descent parser producing the query AST

use crate::error::{ExtractError, Result};

use super::lexer::Token;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Axis {
    Child,
    Descendant,
    DescendantOrSelf,
    SelfAxis,
    Parent,
    Ancestor,
    AncestorOrSelf,
    FollowingSibling,
    PrecedingSibling,
}

impl Axis {
    fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "child" => Self::Child,
            "descendant" => Self::Descendant,
            "descendant-or-self" => Self::DescendantOrSelf,
            "self" => Self::SelfAxis,
            "parent" => Self::Parent,
            "ancestor" => Self::Ancestor,
            "ancestor-or-self" => Self::AncestorOrSelf,
            "following-sibling" => Self::FollowingSibling,
            "preceding-sibling" => Self::PrecedingSibling,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum NodeTest {
    Name(String),
    /// `*`
    AnyElement,
    /// `node()`
    AnyNode,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Step {
    pub axis: Axis,
    pub test: NodeTest,
    pub predicates: Vec<Expr>,
}

impl Step {
    fn descendant_or_self() -> Self {
        Self {
            axis: Axis::DescendantOrSelf,
            test: NodeTest::AnyNode,
            predicates: Vec::new(),
        }
    }
}

/// Trailing step that yields strings rather than elements.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ValueStep {
    Text,
    /// `@name`, or `@*` when `None`
    Attribute(Option<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct LocationPath {
    pub absolute: bool,
    pub steps: Vec<Step>,
    pub value: Option<ValueStep>,
}

impl LocationPath {
    /// Re-root a relative path so it matches anywhere in the document.
    pub(crate) fn anchor_anywhere(&mut self) {
        if !self.absolute {
            self.absolute = true;
            self.steps.insert(0, Step::descendant_or_self());
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BinaryOp {
    Or,
    And,
    Eq,
    Neq,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Function {
    Last,
    Position,
    Count,
    Contains,
    StartsWith,
    NormalizeSpace,
    StringLength,
    String,
    Name,
    Not,
    True,
    False,
}

impl Function {
    fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "last" => Self::Last,
            "position" => Self::Position,
            "count" => Self::Count,
            "contains" => Self::Contains,
            "starts-with" => Self::StartsWith,
            "normalize-space" => Self::NormalizeSpace,
            "string-length" => Self::StringLength,
            "string" => Self::String,
            "name" | "local-name" => Self::Name,
            "not" => Self::Not,
            "true" => Self::True,
            "false" => Self::False,
            _ => return None,
        })
    }

    fn arity(self) -> (usize, usize) {
        match self {
            Self::Last | Self::Position | Self::True | Self::False => (0, 0),
            Self::Count | Self::Not => (1, 1),
            Self::Contains | Self::StartsWith => (2, 2),
            Self::NormalizeSpace | Self::StringLength | Self::String | Self::Name => (0, 1),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Expr {
    Path(LocationPath),
    Union(Vec<LocationPath>),
    Literal(String),
    Number(f64),
    Call(Function, Vec<Expr>),
    Binary(Box<Expr>, BinaryOp, Box<Expr>),
}

enum Parsed {
    Step(Step),
    Value(ValueStep),
}

pub(crate) struct Parser<'q> {
    query: &'q str,
    tokens: Vec<Token>,
    pos: usize,
}

impl<'q> Parser<'q> {
    pub(crate) fn new(query: &'q str, tokens: Vec<Token>) -> Self {
        Self { query, tokens, pos: 0 }
    }

    /// Parse the whole token stream as one expression.
    pub(crate) fn parse(mut self) -> Result<Expr> {
        let expr = self.expr()?;
        match self.peek() {
            None => Ok(expr),
            Some(token) => Err(self.error(format!("unexpected {token:?}"))),
        }
    }

    fn error(&self, reason: impl Into<String>) -> ExtractError {
        ExtractError::xpath(self.query, reason)
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: &Token) -> Result<()> {
        if self.eat(expected) {
            Ok(())
        } else {
            Err(self.error(format!("expected {expected:?}")))
        }
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if matches!(self.peek(), Some(Token::Name(n)) if n == keyword) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expr(&mut self) -> Result<Expr> {
        let mut left = self.and_expr()?;
        while self.eat_keyword("or") {
            let right = self.and_expr()?;
            left = Expr::Binary(Box::new(left), BinaryOp::Or, Box::new(right));
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> Result<Expr> {
        let mut left = self.equality()?;
        while self.eat_keyword("and") {
            let right = self.equality()?;
            left = Expr::Binary(Box::new(left), BinaryOp::And, Box::new(right));
        }
        Ok(left)
    }

    fn equality(&mut self) -> Result<Expr> {
        let mut left = self.relational()?;
        loop {
            let op = match self.peek() {
                Some(Token::Eq) => BinaryOp::Eq,
                Some(Token::Neq) => BinaryOp::Neq,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.relational()?;
            left = Expr::Binary(Box::new(left), op, Box::new(right));
        }
    }

    fn relational(&mut self) -> Result<Expr> {
        let mut left = self.union()?;
        loop {
            let op = match self.peek() {
                Some(Token::Lt) => BinaryOp::Lt,
                Some(Token::Le) => BinaryOp::Le,
                Some(Token::Gt) => BinaryOp::Gt,
                Some(Token::Ge) => BinaryOp::Ge,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.union()?;
            left = Expr::Binary(Box::new(left), op, Box::new(right));
        }
    }

    fn union(&mut self) -> Result<Expr> {
        let first = self.primary()?;
        if self.peek() != Some(&Token::Pipe) {
            return Ok(first);
        }

        let mut paths = vec![self.element_path(first)?];
        while self.eat(&Token::Pipe) {
            let next = self.primary()?;
            paths.push(self.element_path(next)?);
        }
        Ok(Expr::Union(paths))
    }

    fn element_path(&self, expr: Expr) -> Result<LocationPath> {
        match expr {
            Expr::Path(path) if path.value.is_none() => Ok(path),
            _ => Err(self.error("union operands must select elements")),
        }
    }

    fn primary(&mut self) -> Result<Expr> {
        match self.peek() {
            Some(Token::Literal(s)) => {
                let s = s.clone();
                self.pos += 1;
                Ok(Expr::Literal(s))
            }
            Some(Token::Number(n)) => {
                let n = *n;
                self.pos += 1;
                Ok(Expr::Number(n))
            }
            Some(Token::LParen) => {
                self.pos += 1;
                let expr = self.expr()?;
                self.expect(&Token::RParen)?;
                Ok(expr)
            }
            Some(Token::Name(name))
                if self.peek_at(1) == Some(&Token::LParen) && !matches!(name.as_str(), "text" | "node") =>
            {
                let name = name.clone();
                self.pos += 2;
                self.call(&name)
            }
            _ => Ok(Expr::Path(self.location_path()?)),
        }
    }

    fn call(&mut self, name: &str) -> Result<Expr> {
        let function = Function::from_name(name).ok_or_else(|| self.error(format!("unsupported function `{name}()`")))?;

        let mut args = Vec::new();
        if !self.eat(&Token::RParen) {
            loop {
                args.push(self.expr()?);
                if self.eat(&Token::RParen) {
                    break;
                }
                self.expect(&Token::Comma)?;
            }
        }

        let (min, max) = function.arity();
        if args.len() < min || args.len() > max {
            return Err(self.error(format!("`{name}()` takes {min}..={max} arguments, got {}", args.len())));
        }
        Ok(Expr::Call(function, args))
    }

    fn location_path(&mut self) -> Result<LocationPath> {
        let mut path = LocationPath {
            absolute: false,
            steps: Vec::new(),
            value: None,
        };

        match self.peek() {
            Some(Token::Slash) => {
                self.pos += 1;
                path.absolute = true;
                if !self.starts_step() {
                    return Ok(path);
                }
            }
            Some(Token::DoubleSlash) => {
                self.pos += 1;
                path.absolute = true;
                path.steps.push(Step::descendant_or_self());
            }
            _ if !self.starts_step() => {
                let found = self.peek().map_or("end of query".to_string(), |t| format!("{t:?}"));
                return Err(self.error(format!("expected a location step, found {found}")));
            }
            _ => {}
        }

        loop {
            match self.step()? {
                Parsed::Step(step) => path.steps.push(step),
                Parsed::Value(value) => {
                    path.value = Some(value);
                    if matches!(self.peek(), Some(Token::Slash | Token::DoubleSlash)) {
                        return Err(self.error("text() and attribute steps must end a path"));
                    }
                    return Ok(path);
                }
            }
            match self.peek() {
                Some(Token::Slash) => self.pos += 1,
                Some(Token::DoubleSlash) => {
                    self.pos += 1;
                    path.steps.push(Step::descendant_or_self());
                }
                _ => return Ok(path),
            }
        }
    }

    fn starts_step(&self) -> bool {
        matches!(
            self.peek(),
            Some(Token::Name(_) | Token::Star | Token::At | Token::Dot | Token::DotDot)
        )
    }

    fn step(&mut self) -> Result<Parsed> {
        let abbreviated = |axis| {
            Parsed::Step(Step {
                axis,
                test: NodeTest::AnyNode,
                predicates: Vec::new(),
            })
        };

        match self.advance() {
            Some(Token::Dot) => return Ok(abbreviated(Axis::SelfAxis)),
            Some(Token::DotDot) => return Ok(abbreviated(Axis::Parent)),
            Some(Token::At) => return self.attribute(),
            Some(Token::Name(name)) if self.peek() == Some(&Token::ColonColon) => {
                self.pos += 1;
                if name == "attribute" {
                    return self.attribute();
                }
                let axis = Axis::from_name(&name).ok_or_else(|| self.error(format!("unsupported axis `{name}`")))?;
                self.node_test(axis)
            }
            Some(_) => {
                self.pos -= 1;
                self.node_test(Axis::Child)
            }
            None => Err(self.error("expected a location step")),
        }
    }

    fn attribute(&mut self) -> Result<Parsed> {
        let name = match self.advance() {
            Some(Token::Name(name)) => Some(name),
            Some(Token::Star) => None,
            _ => return Err(self.error("expected an attribute name")),
        };
        if self.peek() == Some(&Token::LBracket) {
            return Err(self.error("predicates on attribute steps are not supported"));
        }
        Ok(Parsed::Value(ValueStep::Attribute(name)))
    }

    fn node_test(&mut self, axis: Axis) -> Result<Parsed> {
        let test = match self.advance() {
            Some(Token::Star) => NodeTest::AnyElement,
            Some(Token::Name(name)) if self.peek() == Some(&Token::LParen) => {
                self.pos += 1;
                self.expect(&Token::RParen)?;
                match name.as_str() {
                    "node" => NodeTest::AnyNode,
                    "text" if axis == Axis::Child => {
                        if self.peek() == Some(&Token::LBracket) {
                            return Err(self.error("predicates on text() are not supported"));
                        }
                        return Ok(Parsed::Value(ValueStep::Text));
                    }
                    _ => return Err(self.error(format!("unsupported node test `{name}()`"))),
                }
            }
            Some(Token::Name(name)) => NodeTest::Name(name),
            _ => return Err(self.error("expected a node test")),
        };

        let mut predicates = Vec::new();
        while self.eat(&Token::LBracket) {
            predicates.push(self.expr()?);
            self.expect(&Token::RBracket)?;
        }
        Ok(Parsed::Step(Step { axis, test, predicates }))
    }
}
