//! Declarative value extraction from HTML/XML and JSON documents
//!
//! Callers map output keys to path-like selectors and get back an
//! [`ExtractionResult`]:
//! - HTML and XML selectors mix XPath steps (`//div[@id='x']/a/@href`) with CSS
//!   execution, falling back to a native path engine when CSS cannot
//!   evaluate them
//! - JSON selectors are JSONPath expressions (`$.items[*].name`)
//! - a selector that matches nothing yields [`Value::NotFound`]
//!
//! ```
//! use path_extract::{extract_html, Selection, Value};
//!
//! let selection: Selection = [("title", "//div[@id='title']/text()")].into_iter().collect();
//! let result = extract_html(r#"<div id="title">Hello</div>"#, &selection).unwrap();
//! assert_eq!(result.get("title"), Some(&Value::from("Hello")));
//! ```

pub mod batch;
pub mod config;
pub mod document;
pub mod error;
pub mod extract;
pub mod ffi;
pub mod jsonpath;
pub mod result;
pub mod selector;
pub mod strategy;
pub mod value;
pub mod xpath;

pub use batch::{extract_file, extract_path, ContentFormat, FileExtraction};
pub use config::{ExtractionRequest, ExtractorOptions, FallbackPolicy, Selection};
pub use document::Document;
pub use error::{ExtractError, Result};
pub use extract::{extract_html, extract_json, extract_xml, HtmlExtractor, JsonExtractor};
pub use ffi::*;
pub use jsonpath::JsonPath;
pub use result::{ExtractionResult, FromValue};
pub use selector::{to_css, Terminal, Translation};
pub use strategy::{CssStrategy, Strategy, XPathStrategy};
pub use value::{Value, ValueKind};
pub use xpath::PathQuery;
