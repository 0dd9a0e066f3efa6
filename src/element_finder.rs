use scraper::{Html, Node, Selector};
use std::fmt::Debug;

/// Label text that marks the per-kilogram comparison price.
pub const DEFAULT_LOCATOR_TEXT: &str = "x kg";

/// Strategy for finding the element that carries the price text.
///
/// The browser renderer asks for an XPath so Chrome can wait on it; the remote
/// renderer matches against already rendered HTML with [`TextLocator::locate_in_html`].
pub trait TextLocator: Debug + Send + Sync {
    /// Human readable form for logs and errors.
    fn describe(&self) -> String;

    /// XPath selecting the candidate elements, first match wins.
    fn xpath(&self) -> String;

    /// Whether one of an element's own text nodes satisfies the predicate.
    fn matches(&self, text_node: &str) -> bool;

    /// Full text of the first element in document order, among those matching
    /// `element_selector`, with a direct text node that satisfies
    /// [`TextLocator::matches`]. Same rule as the XPath form.
    fn locate_in_html(&self, html: &str, element_selector: &str) -> Option<String> {
        let document = Html::parse_document(html);
        let selector = Selector::parse(element_selector).ok()?;

        document.select(&selector).find_map(|element| {
            let matched = element.children().any(|child| match child.value() {
                Node::Text(text) => self.matches(text),
                _ => false,
            });

            matched.then(|| element.text().collect::<String>())
        })
    }
}

/// Case-sensitive literal substring match, no whitespace normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextContains {
    needle: String,
}

impl TextContains {
    pub fn new(needle: impl Into<String>) -> Self {
        Self {
            needle: needle.into(),
        }
    }

    pub fn needle(&self) -> &str {
        &self.needle
    }
}

impl Default for TextContains {
    fn default() -> Self {
        Self::new(DEFAULT_LOCATOR_TEXT)
    }
}

impl TextLocator for TextContains {
    fn describe(&self) -> String {
        format!("text contains {}", xpath_literal(&self.needle))
    }

    // Each text node is tested on its own; `contains(text(), ..)` would only
    // look at the first one.
    fn xpath(&self) -> String {
        format!("//*[text()[contains(., {})]]", xpath_literal(&self.needle))
    }

    fn matches(&self, text_node: &str) -> bool {
        text_node.contains(&self.needle)
    }
}

/// Quotes `value` as an XPath 1.0 string literal. XPath has no escape
/// sequences, so values holding both quote kinds are split into `concat()`.
fn xpath_literal(value: &str) -> String {
    if !value.contains('\'') {
        return format!("'{}'", value);
    }
    if !value.contains('"') {
        return format!("\"{}\"", value);
    }

    let parts: Vec<String> = value
        .split('\'')
        .map(|part| format!("'{}'", part))
        .collect();
    format!("concat({})", parts.join(", \"'\", "))
}
