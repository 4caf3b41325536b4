//! Read-only document model consumed by the accessibility checks
//!
//! Architecture: Thin Adapter - wraps the tree scraper builds with html5ever
//! - Element handles borrow the document and never outlive it
//! - Lookups walk the tree iteratively in document order
//! - Content that is never rendered (`<template>` bodies, script and style text) is skipped

use ego_tree::iter::Edge;
use ego_tree::NodeRef;
use scraper::{ElementRef, Html, Node};

/// Elements whose text content is never rendered
const HIDDEN_TEXT_CONTAINERS: &[&str] = &["script", "style", "template"];

/// Elements whose descendants are inert markup rather than page content
const INERT_CONTAINERS: &[&str] = &["template"];

fn is_element_named(node: NodeRef<'_, Node>, names: &[&str]) -> bool {
    node.value()
        .as_element()
        .is_some_and(|el| names.contains(&el.name()))
}

/// A parsed HTML document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    html: Html,
}

impl Document {
    /// Parse HTML into a document. Never fails: html5ever recovers from any input.
    pub fn parse(html: &str) -> Self {
        let doc = Self {
            html: Html::parse_document(html),
        };
        tracing::trace!(elements = doc.element_count(), "Parsed HTML document");
        doc
    }

    /// An empty document with no elements
    pub fn empty() -> Self {
        Self {
            html: Html::new_document(),
        }
    }

    /// Every rendered element in document order.
    ///
    /// A `template` element is yielded, its contents are not.
    pub fn elements(&self) -> impl Iterator<Item = Element<'_>> {
        let mut inert_depth = 0usize;

        self.html.tree.root().traverse().filter_map(move |edge| match edge {
            Edge::Open(node) => {
                let el = ElementRef::wrap(node)?;
                let rendered = inert_depth == 0;
                if is_element_named(node, INERT_CONTAINERS) {
                    inert_depth += 1;
                }
                rendered.then_some(Element { el })
            }
            Edge::Close(node) => {
                if is_element_named(node, INERT_CONTAINERS) {
                    inert_depth -= 1;
                }
                None
            }
        })
    }

    /// Elements with the given (lowercase) tag name, in document order
    pub fn elements_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = Element<'a>> + 'a {
        self.elements().filter(move |el| el.name() == name)
    }

    /// Trimmed text of the first `title` element, if it has any
    pub fn title(&self) -> Option<String> {
        self.elements_named("title")
            .next()
            .map(|el| el.text_content().trim().to_string())
            .filter(|t| !t.is_empty())
    }

    /// Number of rendered elements in the document
    pub fn element_count(&self) -> usize {
        self.elements().count()
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::empty()
    }
}

/// Borrowed view of one element
#[derive(Debug, Clone, Copy)]
pub struct Element<'a> {
    el: ElementRef<'a>,
}

impl<'a> Element<'a> {
    /// Tag name as produced by the parser (lowercase for HTML elements)
    pub fn name(&self) -> &'a str {
        self.el.value().name()
    }

    /// Raw value of an attribute, if present
    pub fn attr(&self, name: &str) -> Option<&'a str> {
        self.el.value().attr(name)
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.attr(name).is_some()
    }

    /// Trimmed attribute value, treating blank values as absent
    pub fn non_empty_attr(&self, name: &str) -> Option<&'a str> {
        self.attr(name).map(str::trim).filter(|v| !v.is_empty())
    }

    /// Trimmed, non-blank `id` attribute
    pub fn id(&self) -> Option<&'a str> {
        self.non_empty_attr("id")
    }

    /// Whitespace-separated `class` tokens
    pub fn classes(&self) -> impl Iterator<Item = &'a str> {
        self.attr("class").unwrap_or("").split_whitespace()
    }

    /// Concatenated text of all descendant text nodes, skipping content that
    /// is never rendered (`script`, `style`, `template`)
    pub fn text_content(&self) -> String {
        let mut text = String::new();
        let mut hidden_depth = 0usize;

        for edge in self.el.traverse() {
            match edge {
                Edge::Open(node) if is_element_named(node, HIDDEN_TEXT_CONTAINERS) => {
                    hidden_depth += 1;
                }
                Edge::Close(node) if is_element_named(node, HIDDEN_TEXT_CONTAINERS) => {
                    hidden_depth -= 1;
                }
                Edge::Open(node) if hidden_depth == 0 => {
                    if let Node::Text(t) = node.value() {
                        text.push_str(t);
                    }
                }
                _ => {}
            }
        }

        text
    }

    /// Serialized markup of this element and its subtree
    pub fn outer_html(&self) -> String {
        self.el.html()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body_elements(doc: &Document) -> Vec<&str> {
        doc.elements()
            .map(|e| e.name())
            .filter(|n| !matches!(*n, "html" | "head" | "body"))
            .collect()
    }

    #[test]
    fn test_elements_in_document_order() {
        let doc = Document::parse("<div><p>a</p><span>b</span></div><ul><li>c</li></ul>");
        assert_eq!(body_elements(&doc), ["div", "p", "span", "ul", "li"]);
    }

    #[test]
    fn test_template_contents_are_not_elements() {
        let doc = Document::parse(
            "<p>before</p><template><img src='x'><a href='/'></a></template><hr>",
        );
        assert_eq!(body_elements(&doc), ["p", "template", "hr"]);
        assert_eq!(doc.elements_named("img").count(), 0);
    }

    #[test]
    fn test_parser_recovers_from_broken_markup() {
        let doc = Document::parse("<div><p>unclosed <b>bold</div><img src=x>");
        assert!(doc.elements_named("img").next().is_some());
        assert!(doc.elements_named("b").next().is_some());
    }

    #[test]
    fn test_empty_input_still_has_skeleton() {
        let doc = Document::parse("");
        let names: Vec<_> = doc.elements().map(|e| e.name()).collect();
        assert_eq!(names, ["html", "head", "body"]);
    }

    #[test]
    fn test_attribute_access() {
        let doc = Document::parse(r#"<img src="a.jpg" alt="" class=" hero  wide " id="">"#);
        let img = doc.elements_named("img").next().unwrap();

        assert_eq!(img.attr("src"), Some("a.jpg"));
        assert_eq!(img.attr("alt"), Some(""));
        assert!(img.has_attr("alt"));
        assert!(!img.has_attr("title"));
        assert_eq!(img.id(), None);
        assert_eq!(img.classes().collect::<Vec<_>>(), ["hero", "wide"]);
    }

    #[test]
    fn test_text_content_skips_hidden_containers() {
        let doc = Document::parse(
            "<a href='/'>Go <b>home</b><script>var x = 1;</script><style>a{}</style></a>",
        );
        let link = doc.elements_named("a").next().unwrap();
        assert_eq!(link.text_content(), "Go home");
    }

    #[test]
    fn test_outer_html_escapes() {
        let doc = Document::parse(r#"<p title='say "hi"'>a &amp; b<br></p>"#);
        let p = doc.elements_named("p").next().unwrap();
        assert_eq!(p.outer_html(), r#"<p title="say &quot;hi&quot;">a &amp; b<br></p>"#);
    }

    #[test]
    fn test_title() {
        let doc = Document::parse("<html><head><title>  Welcome </title></head></html>");
        assert_eq!(doc.title().as_deref(), Some("Welcome"));

        let untitled = Document::parse("<p>no title</p>");
        assert_eq!(untitled.title(), None);
    }

    #[test]
    fn test_deep_nesting_does_not_overflow() {
        let depth = 5_000;
        let html = format!("{}deep{}", "<span>".repeat(depth), "</span>".repeat(depth));
        let doc = Document::parse(&html);
        let body = doc.elements_named("body").next().unwrap();
        assert_eq!(body.text_content(), "deep");
        assert!(body.outer_html().starts_with("<body><span><span>"));
    }

    #[test]
    fn test_empty_document() {
        let doc = Document::empty();
        assert_eq!(doc.element_count(), 0);
        assert_eq!(doc.title(), None);
    }
}
