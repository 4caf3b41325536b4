//! The fixed set of heuristic accessibility checks
//!
//! Code Quality Principle: Small Pure Functions - each check reads the document and appends issues
//! - Checks never fail; absent or malformed attributes count as "not present"
//! - Each check walks elements in document order, so report order is stable
//! - Selector and context helpers are shared so every issue locates its element the same way

use crate::dom::{Document, Element};
use crate::domain::issues::{truncate_chars, Issue, Severity, CONTEXT_LIMIT};
use std::collections::HashSet;

/// Built-in rules, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rule {
    ImageAlt,
    LinkName,
    Label,
    HeadingOrder,
}

impl Rule {
    /// Every rule in the order checks run
    pub const ALL: [Rule; 4] = [Rule::ImageAlt, Rule::LinkName, Rule::Label, Rule::HeadingOrder];

    /// Stable identifier reported as the issue code
    pub fn code(self) -> &'static str {
        match self {
            Self::ImageAlt => "image-alt",
            Self::LinkName => "link-name",
            Self::Label => "label",
            Self::HeadingOrder => "heading-order",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|rule| rule.code() == code.trim())
    }

    pub fn default_severity(self) -> Severity {
        match self {
            Self::HeadingOrder => Severity::Warning,
            _ => Severity::Error,
        }
    }

    /// One-line rule summary used in issue messages
    pub fn summary(self) -> &'static str {
        match self {
            Self::ImageAlt => "Images must have alternate text",
            Self::LinkName => "Links must have discernible text",
            Self::Label => "Form elements must have labels",
            Self::HeadingOrder => "Heading levels should only increase by one",
        }
    }

    /// Longer explanation for `explain`
    pub fn description(self) -> &'static str {
        match self {
            Self::ImageAlt => {
                "Every <img> needs an alt attribute. An empty alt=\"\" marks the image as \
                 decorative and passes, as does role=\"presentation\"."
            }
            Self::LinkName => {
                "Every <a> needs discernible text: visible text content, an aria-label, or a \
                 title attribute."
            }
            Self::Label => {
                "Inputs (other than type=hidden), selects and textareas with an id need a \
                 <label for=\"id\"> somewhere in the document, or an aria-label / \
                 aria-labelledby attribute. Controls without an id are not checked."
            }
            Self::HeadingOrder => {
                "Headings h1-h6 in document order should not skip levels on the way down, \
                 e.g. an h1 followed directly by an h3."
            }
        }
    }

    /// Run this rule against a document, appending issues in document order
    pub(crate) fn run(self, doc: &Document, severity: Severity, out: &mut Vec<Issue>) {
        match self {
            Self::ImageAlt => check_image_alt(doc, severity, out),
            Self::LinkName => check_link_name(doc, severity, out),
            Self::Label => check_form_labels(doc, severity, out),
            Self::HeadingOrder => check_heading_order(doc, severity, out),
        }
    }
}

impl std::fmt::Display for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// CSS-like locator: tag name, then `#id`, else `.class.tokens`
pub fn selector_for(el: &Element<'_>) -> String {
    let mut selector = el.name().to_ascii_lowercase();

    if let Some(id) = el.id() {
        selector.push('#');
        selector.push_str(id);
    } else {
        for class in el.classes() {
            selector.push('.');
            selector.push_str(class);
        }
    }

    selector
}

fn issue_for(el: &Element<'_>, rule: Rule, severity: Severity, message: impl Into<String>) -> Issue {
    Issue::new(rule.code(), severity, message, selector_for(el), &el.outer_html())
}

fn attr_equals(el: &Element<'_>, name: &str, expected: &str) -> bool {
    el.attr(name)
        .is_some_and(|value| value.trim().eq_ignore_ascii_case(expected))
}

fn check_image_alt(doc: &Document, severity: Severity, out: &mut Vec<Issue>) {
    for img in doc.elements_named("img") {
        if img.has_attr("alt") || attr_equals(&img, "role", "presentation") {
            continue;
        }
        out.push(issue_for(&img, Rule::ImageAlt, severity, Rule::ImageAlt.summary()));
    }
}

fn check_link_name(doc: &Document, severity: Severity, out: &mut Vec<Issue>) {
    for link in doc.elements_named("a") {
        let has_text = !link.text_content().trim().is_empty()
            || link.non_empty_attr("aria-label").is_some()
            || link.non_empty_attr("title").is_some();

        if !has_text {
            out.push(issue_for(&link, Rule::LinkName, severity, Rule::LinkName.summary()));
        }
    }
}

fn is_labelable_control(el: &Element<'_>) -> bool {
    match el.name() {
        "input" => !attr_equals(el, "type", "hidden"),
        "select" | "textarea" => true,
        _ => false,
    }
}

fn check_form_labels(doc: &Document, severity: Severity, out: &mut Vec<Issue>) {
    // Index label targets once so each control is a set lookup
    let labelled: HashSet<&str> = doc
        .elements_named("label")
        .filter_map(|label| label.attr("for"))
        .filter(|target| !target.is_empty())
        .collect();

    for control in doc.elements().filter(is_labelable_control) {
        // `for` must equal the id exactly, so compare untrimmed values
        let Some(raw_id) = control.attr("id").filter(|id| !id.trim().is_empty()) else {
            continue;
        };

        if labelled.contains(raw_id)
            || control.has_attr("aria-label")
            || control.has_attr("aria-labelledby")
        {
            continue;
        }

        out.push(issue_for(
            &control,
            Rule::Label,
            severity,
            format!("{} (no label found for #{})", Rule::Label.summary(), raw_id.trim()),
        ));
    }
}

fn heading_level(name: &str) -> Option<u8> {
    match name {
        "h1" => Some(1),
        "h2" => Some(2),
        "h3" => Some(3),
        "h4" => Some(4),
        "h5" => Some(5),
        "h6" => Some(6),
        _ => None,
    }
}

fn check_heading_order(doc: &Document, severity: Severity, out: &mut Vec<Issue>) {
    let headings: Vec<(u8, Element<'_>, String)> = doc
        .elements()
        .filter_map(|el| {
            heading_level(el.name()).map(|level| (level, el, el.text_content().trim().to_string()))
        })
        .collect();

    for pair in headings.windows(2) {
        let (prev_level, _, prev_text) = &pair[0];
        let (next_level, next, next_text) = &pair[1];

        if *next_level > prev_level + 1 {
            let message = format!(
                "{}: h{prev_level} is followed by h{next_level}",
                Rule::HeadingOrder.summary()
            );
            let context = truncate_chars(
                &format!("h{prev_level}: {prev_text} / h{next_level}: {next_text}"),
                CONTEXT_LIMIT,
            );
            out.push(Issue::new(
                Rule::HeadingOrder.code(),
                severity,
                message,
                selector_for(next),
                &context,
            ));
        }
    }
}
