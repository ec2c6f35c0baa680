//! Tokenizer for path queries

use crate::error::{ExtractError, Result};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    Slash,
    DoubleSlash,
    LBracket,
    RBracket,
    LParen,
    RParen,
    At,
    Comma,
    Dot,
    DotDot,
    Star,
    Pipe,
    ColonColon,
    Eq,
    Neq,
    Lt,
    Le,
    Gt,
    Ge,
    Name(String),
    Literal(String),
    Number(f64),
}

pub(crate) fn tokenize(query: &str) -> Result<Vec<Token>> {
    let chars: Vec<char> = query.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();
        let (token, width) = match c {
            c if c.is_whitespace() => {
                i += 1;
                continue;
            }
            '/' if next == Some('/') => (Token::DoubleSlash, 2),
            '/' => (Token::Slash, 1),
            '[' => (Token::LBracket, 1),
            ']' => (Token::RBracket, 1),
            '(' => (Token::LParen, 1),
            ')' => (Token::RParen, 1),
            '@' => (Token::At, 1),
            ',' => (Token::Comma, 1),
            '*' => (Token::Star, 1),
            '|' => (Token::Pipe, 1),
            '=' => (Token::Eq, 1),
            '!' if next == Some('=') => (Token::Neq, 2),
            '<' if next == Some('=') => (Token::Le, 2),
            '<' => (Token::Lt, 1),
            '>' if next == Some('=') => (Token::Ge, 2),
            '>' => (Token::Gt, 1),
            ':' if next == Some(':') => (Token::ColonColon, 2),
            '.' if next == Some('.') => (Token::DotDot, 2),
            '.' if next.is_some_and(|n| n.is_ascii_digit()) => number(&chars, i),
            '.' => (Token::Dot, 1),
            '\'' | '"' => {
                let end = chars[i + 1..]
                    .iter()
                    .position(|&q| q == c)
                    .ok_or_else(|| ExtractError::xpath(query, "unterminated string literal"))?;
                let literal: String = chars[i + 1..i + 1 + end].iter().collect();
                (Token::Literal(literal), end + 2)
            }
            c if c.is_ascii_digit() => number(&chars, i),
            c if is_name_start(c) => name(&chars, i),
            c => return Err(ExtractError::xpath(query, format!("unexpected character `{c}`"))),
        };
        tokens.push(token);
        i += width;
    }

    Ok(tokens)
}

fn number(chars: &[char], start: usize) -> (Token, usize) {
    let len = chars[start..]
        .iter()
        .position(|c| !(c.is_ascii_digit() || *c == '.'))
        .unwrap_or(chars.len() - start);
    let text: String = chars[start..start + len].iter().collect();
    (Token::Number(text.parse().unwrap_or(f64::NAN)), len)
}

/// Names may carry a namespace prefix (`dc:creator`) but never swallow an
/// axis separator.
fn name(chars: &[char], start: usize) -> (Token, usize) {
    let mut end = start;
    while end < chars.len() {
        let c = chars[end];
        if is_name_char(c) {
            end += 1;
        } else if c == ':'
            && chars.get(end + 1).is_some_and(|&n| is_name_start(n))
            && end > start
        {
            end += 1;
        } else {
            break;
        }
    }
    // names never end with `.` or `-`
    while end > start + 1 && matches!(chars[end - 1], '.' | '-') {
        end -= 1;
    }
    let text: String = chars[start..end].iter().collect();
    (Token::Name(text), end - start)
}

fn is_name_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | '.')
}
