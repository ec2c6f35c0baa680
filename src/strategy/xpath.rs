//! Fallback strategy: native path queries plus the shared value accessors

use crate::document::{extract_terminal, Document};
use crate::error::Result;
use crate::selector::{split_last_step, Terminal};
use crate::value::Value;
use crate::xpath::PathQuery;

use super::Strategy;

#[derive(Debug, Clone, Copy, Default)]
pub struct XPathStrategy;

impl XPathStrategy {
    /// Split `selector` into the element query and its trailing value
    /// accessor, if any.
    fn split(selector: &str) -> (String, Option<Terminal>) {
        let (prefix, last) = split_last_step(selector);
        match Terminal::parse(last) {
            // `//@id` keeps the descendant marker: every element's attribute
            Some(terminal) if prefix.ends_with('/') => (format!("{prefix}descendant-or-self::*"), Some(terminal)),
            Some(terminal) => (prefix.to_string(), Some(terminal)),
            None => (selector.to_string(), None),
        }
    }
}

impl Strategy for XPathStrategy {
    fn name(&self) -> &'static str {
        "xpath"
    }

    fn evaluate(&self, document: &Document, selector: &str) -> Result<Vec<Value>> {
        let (query, terminal) = Self::split(selector);
        let elements = if query.trim().is_empty() {
            document.elements().collect()
        } else {
            PathQuery::parse(&query)?.evaluate(document)?
        };
        Ok(extract_terminal(&elements, terminal.as_ref()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExtractError;
    use crate::strategy::CssStrategy;

    fn eval(html: &str, selector: &str) -> Vec<Value> {
        XPathStrategy.evaluate(&Document::parse(html), selector).unwrap()
    }

    #[test]
    fn test_split() {
        assert_eq!(
            XPathStrategy::split("//div[@id='title']/text()"),
            ("//div[@id='title']".to_string(), Some(Terminal::Text))
        );
        assert_eq!(
            XPathStrategy::split("//a[@href='/x/y']"),
            ("//a[@href='/x/y']".to_string(), None)
        );
        assert_eq!(
            XPathStrategy::split("//@id"),
            ("/descendant-or-self::*".to_string(), Some(Terminal::Attribute("id".into())))
        );
        assert_eq!(XPathStrategy::split("node()"), (String::new(), Some(Terminal::Node)));
    }

    #[test]
    fn test_scenarios_match_css_strategy() {
        let cases = [
            (r#"<div id="title">Hello</div>"#, "//div[@id='title']/text()"),
            ("<ul><li>A</li><li>B</li></ul>", "//ul/li"),
            (
                r#"<span class="tag" data-id="1"></span><span class="x tag" data-id="2"></span>"#,
                "//span[contains(@class,'tag')]/@data-id",
            ),
            ("<div>x</div>", "//div/@missing"),
        ];
        for (html, selector) in cases {
            let document = Document::parse(html);
            assert_eq!(
                XPathStrategy.evaluate(&document, selector).unwrap(),
                CssStrategy.evaluate(&document, selector).unwrap(),
                "{selector}"
            );
        }
    }

    #[test]
    fn test_handles_what_css_cannot() {
        let html = r#"<div class="card"><h3>Title</h3><a href="/a">more</a></div><a href="/b">other</a>"#;
        assert_eq!(
            eval(html, "//h3/ancestor::div/a/@href"),
            vec![Value::from("/a")]
        );
        assert_eq!(eval(html, "//a[starts-with(@href,'/b')]/text()"), vec![Value::from("other")]);
        assert_eq!(eval(html, "//a[last()]/@href"), vec![Value::from("/a"), Value::from("/b")]);
    }

    #[test]
    fn test_blank_query_reads_every_element() {
        let html = r#"<p id="a">x</p><p id="b">y</p>"#;
        assert_eq!(eval(html, "@id"), vec![Value::from("a"), Value::from("b")]);
        assert_eq!(eval(html, "//@id"), vec![Value::from("a"), Value::from("b")]);
    }

    #[test]
    fn test_data_nodes() {
        let html = "<style> p { color: red } </style>";
        assert_eq!(
            eval(html, "//style/node()"),
            vec![Value::Data("p { color: red }".into())]
        );
    }

    #[test]
    fn test_errors_propagate() {
        let err = XPathStrategy
            .evaluate(&Document::parse("<a/>"), "//a[matches(., 'x')]")
            .unwrap_err();
        assert!(matches!(err, ExtractError::XPath { .. }));
    }
}
