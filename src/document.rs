//! Parsed HTML/XML documents and the value extraction rules shared by the
//! CSS and XPath strategies.

use std::collections::HashSet;

use quick_xml::escape::escape;
use quick_xml::events::Event;
use quick_xml::Reader;
use scraper::{ElementRef, Html};
use tracing::warn;

use crate::selector::Terminal;
use crate::value::Value;

/// A document parsed once per extraction call.
pub struct Document {
    html: Html,
}

// Written as `<name/>` so the HTML tree builder does not read the end tag
// as a second element.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track", "wbr",
];

impl Document {
    /// Parse HTML, or XML when the content opens with an `<?xml` declaration.
    pub fn parse(content: &str) -> Self {
        if is_xml(content) {
            Self::parse_xml(content)
        } else {
            Self::parse_html(content)
        }
    }

    pub fn parse_html(content: &str) -> Self {
        Self {
            html: Html::parse_document(content),
        }
    }

    /// Parse XML into the same tree the strategies query.
    ///
    /// The HTML tree builder ignores `/>` on unknown tags and turns CDATA
    /// into comments, so both are rewritten first: empty elements get an end
    /// tag and CDATA sections become escaped text. Content that is not
    /// well-formed XML is parsed as HTML unchanged.
    pub fn parse_xml(content: &str) -> Self {
        match normalize_xml(content) {
            Ok(markup) => Self::parse_html(&markup),
            Err(e) => {
                warn!(error = %e, "content is not well-formed XML, parsing as HTML");
                Self::parse_html(content)
            }
        }
    }

    pub fn html(&self) -> &Html {
        &self.html
    }

    pub fn root_element(&self) -> ElementRef<'_> {
        self.html.root_element()
    }

    /// Elements directly below the document node (normally just `html`).
    pub fn top_level(&self) -> impl Iterator<Item = ElementRef<'_>> {
        self.html.tree.root().children().filter_map(ElementRef::wrap)
    }

    /// Every element, in document order.
    pub fn elements(&self) -> impl Iterator<Item = ElementRef<'_>> {
        self.html.tree.root().descendants().filter_map(ElementRef::wrap)
    }

    /// Deduplicate `nodes` and sort them into document order.
    pub fn in_document_order<'a>(&'a self, nodes: Vec<ElementRef<'a>>) -> Vec<ElementRef<'a>> {
        if nodes.len() < 2 {
            return nodes;
        }
        let wanted: HashSet<_> = nodes.iter().map(|e| e.id()).collect();
        self.elements().filter(|e| wanted.contains(&e.id())).collect()
    }
}

fn is_xml(content: &str) -> bool {
    content.trim_start_matches('\u{feff}').trim_start().starts_with("<?xml")
}

fn normalize_xml(content: &str) -> Result<String, quick_xml::Error> {
    let mut reader = Reader::from_str(content);
    let mut out = String::with_capacity(content.len());

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                out.push('<');
                out.push_str(&String::from_utf8_lossy(&e));
                out.push('>');
            }
            Event::Empty(e) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                out.push('<');
                out.push_str(&String::from_utf8_lossy(&e));
                if VOID_ELEMENTS.contains(&name.to_ascii_lowercase().as_str()) {
                    out.push_str("/>");
                } else {
                    out.push_str("></");
                    out.push_str(&name);
                    out.push('>');
                }
            }
            Event::End(e) => {
                out.push_str("</");
                out.push_str(&String::from_utf8_lossy(&e));
                out.push('>');
            }
            Event::Text(e) => out.push_str(&String::from_utf8_lossy(&e)),
            Event::CData(e) => {
                let text = String::from_utf8_lossy(&e);
                out.push_str(&escape(&*text));
            }
            Event::Eof => break,
            // declarations, processing instructions, comments, doctypes
            _ => {}
        }
    }

    Ok(out)
}

/// Text owned directly by `element`, whitespace-normalized.
pub fn own_text(element: &ElementRef<'_>) -> String {
    let joined: String = element
        .children()
        .filter_map(|child| child.value().as_text().map(|t| &**t))
        .collect();
    normalize_whitespace(&joined)
}

/// Direct text node children, trimmed, blanks dropped.
pub fn direct_texts(element: &ElementRef<'_>) -> Vec<String> {
    element
        .children()
        .filter_map(|child| child.value().as_text())
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

/// Raw data-node content. Only raw-text elements (`script`, `style`) carry
/// data nodes.
pub fn data_nodes(element: &ElementRef<'_>) -> Vec<String> {
    if !matches!(element.value().name(), "script" | "style") {
        return Vec::new();
    }
    element
        .children()
        .filter_map(|child| child.value().as_text())
        .map(|t| t.trim().to_string())
        .collect()
}

/// Full text content of `element` and its descendants.
pub fn string_value(element: &ElementRef<'_>) -> String {
    element.text().collect()
}

pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Apply a value accessor to a matched element set.
///
/// | accessor | yields |
/// |---|---|
/// | `text()` | each element's own text |
/// | `node()` | each element's data nodes, trimmed |
/// | `@attr` | each element's `attr` value, skipping elements without it |
/// | none | each element's direct text nodes, trimmed, non-blank |
pub fn extract_terminal(elements: &[ElementRef<'_>], terminal: Option<&Terminal>) -> Vec<Value> {
    match terminal {
        Some(Terminal::Text) => elements.iter().map(|e| Value::Text(own_text(e))).collect(),
        Some(Terminal::Node) => elements.iter().flat_map(data_nodes).map(Value::Data).collect(),
        Some(Terminal::Attribute(name)) => elements
            .iter()
            .filter_map(|e| e.value().attr(name))
            .map(|v| Value::Text(v.to_string()))
            .collect(),
        None => elements.iter().flat_map(direct_texts).map(Value::Text).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Selector;

    fn first<'a>(doc: &'a Document, css: &str) -> ElementRef<'a> {
        let selector = Selector::parse(css).unwrap();
        doc.html().select(&selector).next().unwrap()
    }

    #[test]
    fn test_own_text_skips_children() {
        let doc = Document::parse("<p>Hello <b>bold</b>   world\n</p>");
        assert_eq!(own_text(&first(&doc, "p")), "Hello world");
        assert_eq!(string_value(&first(&doc, "p")), "Hello bold   world\n");
    }

    #[test]
    fn test_direct_texts_drop_blanks() {
        let doc = Document::parse("<div>\n  A <span>x</span>\n  B\n</div>");
        assert_eq!(direct_texts(&first(&doc, "div")), vec!["A", "B"]);
    }

    #[test]
    fn test_data_nodes_only_for_raw_text_elements() {
        let doc = Document::parse("<script>\n var x = 1;\n</script><div>plain</div>");
        assert_eq!(data_nodes(&first(&doc, "script")), vec!["var x = 1;"]);
        assert!(data_nodes(&first(&doc, "div")).is_empty());
    }

    #[test]
    fn test_extract_terminal_table() {
        let doc = Document::parse(r#"<a href="/a" title="t">A</a><a href="/b">B</a>"#);
        let selector = Selector::parse("a").unwrap();
        let links: Vec<_> = doc.html().select(&selector).collect();

        assert_eq!(
            extract_terminal(&links, Some(&Terminal::Attribute("href".into()))),
            vec![Value::from("/a"), Value::from("/b")]
        );
        assert_eq!(
            extract_terminal(&links, Some(&Terminal::Attribute("title".into()))),
            vec![Value::from("t")]
        );
        assert!(extract_terminal(&links, Some(&Terminal::Attribute("missing".into()))).is_empty());
        assert_eq!(extract_terminal(&links, Some(&Terminal::Text)), vec![Value::from("A"), Value::from("B")]);
        assert_eq!(extract_terminal(&links, None), vec![Value::from("A"), Value::from("B")]);
        assert!(extract_terminal(&links, Some(&Terminal::Node)).is_empty());
    }

    #[test]
    fn test_xml_self_closing_elements_are_closed() {
        let doc = Document::parse(
            r#"<?xml version="1.0"?>
            <feed><entry><category term="a"/><name>X</name></entry><entry><category term="b"/><name>Y</name></entry></feed>"#,
        );
        let selector = Selector::parse("entry > name").unwrap();
        let names: Vec<_> = doc.html().select(&selector).map(|e| string_value(&e)).collect();
        assert_eq!(names, vec!["X", "Y"]);
        assert_eq!(first(&doc, "category").value().attr("term"), Some("a"));
    }

    #[test]
    fn test_xml_cdata_becomes_text() {
        let doc = Document::parse_xml(
            "<item><description><![CDATA[Hello <b>world</b>]]></description><guid>7 &amp; 8</guid></item>",
        );
        assert_eq!(own_text(&first(&doc, "description")), "Hello <b>world</b>");
        assert_eq!(own_text(&first(&doc, "guid")), "7 & 8");
    }

    #[test]
    fn test_xml_void_elements_stay_single() {
        let doc = Document::parse_xml(r#"<entry><link href="/a"/><br/><title>T</title></entry>"#);
        let selector = Selector::parse("entry > *").unwrap();
        let names: Vec<_> = doc.html().select(&selector).map(|e| e.value().name().to_string()).collect();
        assert_eq!(names, vec!["link", "br", "title"]);
    }

    #[test]
    fn test_malformed_xml_is_parsed_as_html() {
        let doc = Document::parse("<?xml version=\"1.0\"?><root><a>1</b></root>");
        assert_eq!(string_value(&first(&doc, "a")), "1");
    }

    #[test]
    fn test_document_order_dedup() {
        let doc = Document::parse("<ul><li>1</li><li>2</li></ul>");
        let selector = Selector::parse("li").unwrap();
        let mut items: Vec<_> = doc.html().select(&selector).collect();
        items.reverse();
        items.push(items[0]);
        let ordered = doc.in_document_order(items);
        let texts: Vec<_> = ordered.iter().map(string_value).collect();
        assert_eq!(texts, vec!["1", "2"]);
    }
}
