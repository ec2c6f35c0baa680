//! JSONPath queries over `serde_json` documents
//!
//! Supported syntax:
//! - `$`, `.name`, `['name']`, `.*`, `[*]`
//! - `[n]` with negative indices counting from the end, `[start:end:step]`
//! - unions `[0,2]`, `['a','b']`
//! - recursive descent `..name`, `..*`, `..[n]`
//! - filters `[?(@.a)]`, `[?(@.a.b >= 3 && @.c != 'x')]`, `||`, `!`
//!
//! A path without a leading `$` is taken relative to the root, so `a.b`
//! means `$.a.b`.

mod eval;
mod parser;

use serde_json::Value as Json;

use crate::error::Result;
use crate::value::Value;

use parser::{Parser, Segment};

#[derive(Debug, Clone, PartialEq)]
pub struct JsonPath {
    raw: String,
    segments: Vec<Segment>,
}

impl JsonPath {
    pub fn parse(path: &str) -> Result<Self> {
        let trimmed = path.trim();
        let rooted = if trimmed.starts_with('$') {
            trimmed.to_string()
        } else if trimmed.starts_with('[') || trimmed.starts_with('.') {
            format!("${trimmed}")
        } else {
            format!("$.{trimmed}")
        };
        let segments = Parser::new(&rooted).parse()?;

        Ok(Self {
            raw: path.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Borrow every node the path selects, in match order.
    pub fn select<'j>(&self, root: &'j Json) -> Vec<&'j Json> {
        eval::evaluate(&self.segments, root)
    }

    /// Selected nodes converted to extraction values.
    pub fn evaluate(&self, root: &Json) -> Vec<Value> {
        self.select(root).into_iter().map(Value::from_json).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store() -> Json {
        json!({
            "store": {
                "book": [
                    {"title": "Sayings", "price": 8.95, "tags": ["old"]},
                    {"title": "Sword", "price": 12.99, "isbn": "0-553"},
                    {"title": "Moby", "price": 8.99, "isbn": "0-395"}
                ],
                "bicycle": {"color": "red", "price": 19.95}
            },
            "count": 3
        })
    }

    fn eval(path: &str) -> Vec<Value> {
        JsonPath::parse(path).unwrap().evaluate(&store())
    }

    #[test]
    fn test_nested_member() {
        let doc = json!({"a": {"b": 5}});
        assert_eq!(JsonPath::parse("$.a.b").unwrap().evaluate(&doc), vec![Value::Int(5)]);
        assert_eq!(JsonPath::parse("a.b").unwrap().evaluate(&doc), vec![Value::Int(5)]);
    }

    #[test]
    fn test_missing_path_matches_nothing() {
        assert!(eval("$.store.car").is_empty());
        assert!(eval("$.store.book[7].title").is_empty());
        assert!(eval("$.count.value").is_empty());
    }

    #[test]
    fn test_wildcard_and_index() {
        assert_eq!(eval("$.store.book[*].title").len(), 3);
        assert_eq!(eval("$.store.book[-1].title"), vec![Value::from("Moby")]);
        assert_eq!(
            eval("$.store.book[0,2].title"),
            vec![Value::from("Sayings"), Value::from("Moby")]
        );
        assert_eq!(eval("$.store.book[:2].title").len(), 2);
    }

    #[test]
    fn test_recursive_descent() {
        let prices = eval("$..price");
        assert_eq!(prices.len(), 4);
        assert!(prices.contains(&Value::Float(19.95)));
        assert_eq!(eval("$..isbn").len(), 2);
    }

    #[test]
    fn test_filters() {
        assert_eq!(
            eval("$.store.book[?(@.price < 9)].title"),
            vec![Value::from("Sayings"), Value::from("Moby")]
        );
        assert_eq!(eval("$.store.book[?(@.isbn)].title").len(), 2);
        assert_eq!(
            eval("$.store.book[?(@.isbn && @.price > 10 || @.tags[0] == 'old')].title"),
            vec![Value::from("Sayings"), Value::from("Sword")]
        );
    }

    #[test]
    fn test_whole_values() {
        assert_eq!(eval("$.count"), vec![Value::Int(3)]);
        assert_eq!(eval("$.store.book[0].tags"), vec![Value::List(vec![Value::from("old")])]);
        assert!(matches!(eval("$.store.bicycle").as_slice(), [Value::Object(_)]));
    }

    #[test]
    fn test_invalid_paths_are_errors() {
        assert!(JsonPath::parse("$.store[").unwrap_err().is_grammar());
        assert!(JsonPath::parse("$.a[?(x)]").is_err());
    }
}
