//! Extraction orchestration
//!
//! HTML/XML content runs every selector through the primary strategy and
//! falls back according to [`FallbackPolicy`]. JSON content runs each path
//! through [`JsonPath`] independently.

use tracing::{debug, warn};

use crate::config::{ExtractorOptions, FallbackPolicy, Selection};
use crate::document::Document;
use crate::error::Result;
use crate::jsonpath::JsonPath;
use crate::result::ExtractionResult;
use crate::strategy::{CssStrategy, Strategy, XPathStrategy};
use crate::value::Value;

pub struct HtmlExtractor {
    primary: Box<dyn Strategy>,
    fallback: Box<dyn Strategy>,
    policy: FallbackPolicy,
}

impl Default for HtmlExtractor {
    fn default() -> Self {
        Self::new(&ExtractorOptions::default())
    }
}

impl HtmlExtractor {
    /// CSS first, native path queries as the fallback.
    pub fn new(options: &ExtractorOptions) -> Self {
        Self::with_strategies(Box::new(CssStrategy), Box::new(XPathStrategy), options.fallback)
    }

    pub fn with_strategies(primary: Box<dyn Strategy>, fallback: Box<dyn Strategy>, policy: FallbackPolicy) -> Self {
        Self {
            primary,
            fallback,
            policy,
        }
    }

    pub fn policy(&self) -> FallbackPolicy {
        self.policy
    }

    /// HTML, or XML when the content carries an `<?xml` declaration.
    pub fn extract(&self, content: &str, selection: &Selection) -> Result<ExtractionResult> {
        let document = Document::parse(content);
        self.extract_document(&document, selection)
    }

    /// Content known to be XML, declaration or not.
    pub fn extract_xml(&self, content: &str, selection: &Selection) -> Result<ExtractionResult> {
        let document = Document::parse_xml(content);
        self.extract_document(&document, selection)
    }

    /// Evaluate every key against an already parsed document.
    ///
    /// Grammar errors are returned as soon as the primary pass has seen
    /// them, whatever the policy.
    pub fn extract_document(&self, document: &Document, selection: &Selection) -> Result<ExtractionResult> {
        debug!(keys = selection.len(), strategy = self.primary.name(), "extracting html");

        let mut found = Vec::with_capacity(selection.len());
        let mut failures = Vec::new();
        for (key, selector) in selection.iter() {
            match self.primary.evaluate(document, selector) {
                Ok(matches) => found.push((key.to_string(), Value::from_matches(matches))),
                Err(e) if e.is_grammar() => return Err(e),
                Err(e) => failures.push((key, selector, e)),
            }
        }

        if failures.is_empty() {
            return Ok(found.into_iter().collect());
        }

        match self.policy {
            FallbackPolicy::Disabled => Err(failures.swap_remove(0).2),
            FallbackPolicy::WholeBatch => {
                let (key, selector, error) = &failures[0];
                warn!(
                    key,
                    selector,
                    error = %error,
                    failed = failures.len(),
                    primary = self.primary.name(),
                    fallback = self.fallback.name(),
                    "primary strategy failed, re-running the whole batch"
                );
                self.run(self.fallback.as_ref(), document, selection)
            }
            FallbackPolicy::PerKey => {
                for (key, selector, error) in failures {
                    warn!(
                        key,
                        selector,
                        error = %error,
                        primary = self.primary.name(),
                        fallback = self.fallback.name(),
                        "primary strategy failed, re-running key"
                    );
                    let matches = self.fallback.evaluate(document, selector)?;
                    found.push((key.to_string(), Value::from_matches(matches)));
                }
                Ok(found.into_iter().collect())
            }
        }
    }

    fn run(&self, strategy: &dyn Strategy, document: &Document, selection: &Selection) -> Result<ExtractionResult> {
        selection
            .iter()
            .map(|(key, selector)| {
                let matches = strategy.evaluate(document, selector)?;
                Ok((key.to_string(), Value::from_matches(matches)))
            })
            .collect()
    }
}

/// Evaluates JSON paths. Each key is independent: a path that matches
/// nothing yields `NotFound`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonExtractor;

impl JsonExtractor {
    pub fn extract(&self, content: &str, selection: &Selection) -> Result<ExtractionResult> {
        let root: serde_json::Value = serde_json::from_str(content)?;
        self.extract_value(&root, selection)
    }

    pub fn extract_value(&self, root: &serde_json::Value, selection: &Selection) -> Result<ExtractionResult> {
        debug!(keys = selection.len(), "extracting json");
        selection
            .iter()
            .map(|(key, path)| {
                let path = JsonPath::parse(path)?;
                Ok((key.to_string(), Value::from_matches(path.evaluate(root))))
            })
            .collect()
    }
}

/// Extract from HTML or XML with the default CSS-then-XPath pipeline.
pub fn extract_html(content: &str, selection: &Selection) -> Result<ExtractionResult> {
    HtmlExtractor::default().extract(content, selection)
}

/// Extract from XML with the default CSS-then-XPath pipeline.
pub fn extract_xml(content: &str, selection: &Selection) -> Result<ExtractionResult> {
    HtmlExtractor::default().extract_xml(content, selection)
}

/// Extract from JSON content.
pub fn extract_json(content: &str, selection: &Selection) -> Result<ExtractionResult> {
    JsonExtractor.extract(content, selection)
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::error::ExtractError;
    use crate::value::ValueKind;

    /// Strategy double that records every selector it sees.
    struct Recording {
        name: &'static str,
        fail_on: Vec<(&'static str, fn(&str) -> ExtractError)>,
        calls: Arc<Mutex<Vec<String>>>,
    }

    impl Recording {
        fn new(name: &'static str) -> (Self, Arc<Mutex<Vec<String>>>) {
            let calls = Arc::new(Mutex::new(Vec::new()));
            let strategy = Self {
                name,
                fail_on: Vec::new(),
                calls: Arc::clone(&calls),
            };
            (strategy, calls)
        }

        fn failing(mut self, selector: &'static str, error: fn(&str) -> ExtractError) -> Self {
            self.fail_on.push((selector, error));
            self
        }
    }

    impl Strategy for Recording {
        fn name(&self) -> &'static str {
            self.name
        }

        fn evaluate(&self, _document: &Document, selector: &str) -> Result<Vec<Value>> {
            self.calls.lock().unwrap().push(selector.to_string());
            match self.fail_on.iter().find(|(s, _)| *s == selector) {
                Some((_, error)) => Err(error(selector)),
                None => Ok(vec![Value::from(format!("{}:{selector}", self.name))]),
            }
        }
    }

    fn css_error(selector: &str) -> ExtractError {
        ExtractError::css(selector, "boom")
    }

    fn xpath_error(selector: &str) -> ExtractError {
        ExtractError::xpath(selector, "boom")
    }

    fn grammar_error(selector: &str) -> ExtractError {
        ExtractError::Grammar {
            step: selector.to_string(),
            filter: "last()".to_string(),
        }
    }

    fn selection() -> Selection {
        [("a", "good"), ("b", "bad"), ("c", "fine")].into_iter().collect()
    }

    #[test]
    fn test_whole_batch_fallback_reruns_every_key() {
        let (primary, primary_calls) = Recording::new("primary");
        let (fallback, fallback_calls) = Recording::new("fallback");
        let extractor = HtmlExtractor::with_strategies(
            Box::new(primary.failing("bad", css_error)),
            Box::new(fallback),
            FallbackPolicy::WholeBatch,
        );

        let result = extractor.extract("<p>x</p>", &selection()).unwrap();

        assert_eq!(primary_calls.lock().unwrap().len(), 3);
        assert_eq!(*fallback_calls.lock().unwrap(), vec!["good", "bad", "fine"]);
        assert_eq!(result.get_string("a").unwrap(), "fallback:good");
        assert_eq!(result.get_string("b").unwrap(), "fallback:bad");
        assert_eq!(result.get_string("c").unwrap(), "fallback:fine");
    }

    #[test]
    fn test_per_key_fallback_reruns_failing_keys_only() {
        let (primary, _) = Recording::new("primary");
        let (fallback, fallback_calls) = Recording::new("fallback");
        let extractor = HtmlExtractor::with_strategies(
            Box::new(primary.failing("bad", css_error)),
            Box::new(fallback),
            FallbackPolicy::PerKey,
        );

        let result = extractor.extract("<p>x</p>", &selection()).unwrap();

        assert_eq!(*fallback_calls.lock().unwrap(), vec!["bad"]);
        assert_eq!(result.get_string("a").unwrap(), "primary:good");
        assert_eq!(result.get_string("b").unwrap(), "fallback:bad");
        assert_eq!(result.len(), 3);
    }

    #[test]
    fn test_disabled_fallback_propagates() {
        let (primary, _) = Recording::new("primary");
        let (fallback, fallback_calls) = Recording::new("fallback");
        let extractor = HtmlExtractor::with_strategies(
            Box::new(primary.failing("bad", css_error)),
            Box::new(fallback),
            FallbackPolicy::Disabled,
        );

        let err = extractor.extract("<p>x</p>", &selection()).unwrap_err();
        assert!(matches!(err, ExtractError::Css { .. }));
        assert!(fallback_calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_grammar_error_is_never_hidden_by_fallback() {
        let (primary, _) = Recording::new("primary");
        let (fallback, fallback_calls) = Recording::new("fallback");
        // the recoverable failure comes first, the grammar error on a later key
        let extractor = HtmlExtractor::with_strategies(
            Box::new(primary.failing("good", css_error).failing("fine", grammar_error)),
            Box::new(fallback),
            FallbackPolicy::WholeBatch,
        );

        let err = extractor.extract("<p>x</p>", &selection()).unwrap_err();
        assert!(err.is_grammar());
        assert!(fallback_calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_fallback_failure_propagates() {
        let (primary, _) = Recording::new("primary");
        let (fallback, _) = Recording::new("fallback");
        let extractor = HtmlExtractor::with_strategies(
            Box::new(primary.failing("bad", css_error)),
            Box::new(fallback.failing("fine", xpath_error)),
            FallbackPolicy::WholeBatch,
        );

        let err = extractor.extract("<p>x</p>", &selection()).unwrap_err();
        assert!(matches!(err, ExtractError::XPath { .. }));
    }

    const PAGE: &str = r#"
        <div id="title">Hello</div>
        <ul id="list"><li>A</li><li>B</li></ul>
        <span class="tag" data-id="1"></span>
        <span class="tag big" data-id="2"></span>
    "#;

    #[test]
    fn test_html_scalar_list_and_not_found() {
        let selection: Selection = [
            ("title", "//div[@id='title']/text()"),
            ("items", "//ul/li"),
            ("ids", "//span[contains(@class,'tag')]/@data-id"),
            ("missing", "//div/@missing"),
        ]
        .into_iter()
        .collect();

        let result = extract_html(PAGE, &selection).unwrap();

        assert_eq!(result.len(), 4);
        assert_eq!(result.get("title"), Some(&Value::from("Hello")));
        assert_eq!(result.get_list::<String>("items").unwrap(), vec!["A", "B"]);
        assert!(result.is_kind("items", ValueKind::List).unwrap());
        assert_eq!(result.get_list::<String>("ids").unwrap(), vec!["1", "2"]);
        assert_eq!(result.get("missing"), Some(&Value::NotFound));
        assert!(!result.is_found("missing").unwrap());
    }

    #[test]
    fn test_html_falls_back_to_path_engine() {
        let selection: Selection = [
            ("list_id", "//li/ancestor::ul/@id"),
            ("title", "//div[@id='title']/text()"),
        ]
        .into_iter()
        .collect();

        let result = extract_html(PAGE, &selection).unwrap();
        assert_eq!(result.get_string("list_id").unwrap(), "list");
        assert_eq!(result.get_string("title").unwrap(), "Hello");
    }

    #[test]
    fn test_html_grammar_error() {
        let selection: Selection = [("x", "//a[starts-with(@href,'x')]")].into_iter().collect();
        assert!(extract_html(PAGE, &selection).unwrap_err().is_grammar());
    }

    #[test]
    fn test_grammar_error_with_text_after_filter() {
        let html = r#"<a href="/x">keep</a><a href="/y">drop</a><b>b</b>"#;
        let selection: Selection = [("x", "//a[starts-with(@href,'/x')]|//b")].into_iter().collect();

        let err = extract_html(html, &selection).unwrap_err();
        assert!(matches!(err, ExtractError::Grammar { ref filter, .. } if filter == "starts-with(@href,'/x')"));
    }

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
        <rss version="2.0" xmlns:dc="http://purl.org/dc/elements/1.1/">
          <channel>
            <title>News</title>
            <item>
              <title>First</title>
              <category domain="tags"/>
              <description><![CDATA[Hello <b>world</b>]]></description>
              <dc:creator>Ann</dc:creator>
            </item>
            <item>
              <title>Second</title>
              <category domain="tags"/>
              <description>plain</description>
              <dc:creator>Bob</dc:creator>
            </item>
          </channel>
        </rss>"#;

    #[test]
    fn test_rss_feed() {
        let selection: Selection = [
            ("titles", "//item/title/text()"),
            ("first_description", "//item[0]/description/text()"),
            ("creators", "//item/dc:creator"),
            ("domains", "//item/category/@domain"),
        ]
        .into_iter()
        .collect();

        let result = extract_html(FEED, &selection).unwrap();
        assert_eq!(result.get_list::<String>("titles").unwrap(), vec!["First", "Second"]);
        assert_eq!(result.get_string("first_description").unwrap(), "Hello <b>world</b>");
        assert_eq!(result.get_list::<String>("creators").unwrap(), vec!["Ann", "Bob"]);
        assert_eq!(result.get_list::<String>("domains").unwrap(), vec!["tags", "tags"]);
    }

    #[test]
    fn test_xml_without_declaration() {
        let feed = r#"<feed><entry><category term="a"/><name>X</name></entry><entry><category term="b"/><name>Y</name></entry></feed>"#;
        let selection: Selection = [("names", "//entry/name")].into_iter().collect();

        let result = extract_xml(feed, &selection).unwrap();
        assert_eq!(result.get_list::<String>("names").unwrap(), vec!["X", "Y"]);
    }

    #[test]
    fn test_json_extraction() {
        let selection: Selection = [("n", "$.a.b"), ("gone", "$.a.c"), ("all", "$.a")].into_iter().collect();
        let result = extract_json(r#"{"a":{"b":5}}"#, &selection).unwrap();

        assert_eq!(result.get("n"), Some(&Value::Int(5)));
        assert_eq!(result.get_i64("n").unwrap(), 5);
        assert_eq!(result.get("gone"), Some(&Value::NotFound));
        assert!(result.is_kind("all", ValueKind::Object).unwrap());
    }

    #[test]
    fn test_json_errors() {
        let selection: Selection = [("n", "$.a")].into_iter().collect();
        assert!(matches!(extract_json("{not json", &selection).unwrap_err(), ExtractError::Json(_)));

        let selection: Selection = [("n", "$.a[")].into_iter().collect();
        assert!(matches!(
            extract_json("{}", &selection).unwrap_err(),
            ExtractError::JsonPath { .. }
        ));
    }
}
