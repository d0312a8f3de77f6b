//! Readable text extraction from fetched pages.
//!
//! ### Algorithm
//! - Boilerplate subtrees (`script`, `style`, `nav`, `footer`, `header`,
//!   `aside`) are ignored entirely.
//! - Heading text (`h1`-`h3`) comes first, in document order.
//! - Then the text of every `<article>`; plain `<p>` text is used only when
//!   the page has no `<article>`, since articles already contain their
//!   paragraphs.
//! - Fragments are joined with single spaces.

use scraper::{ElementRef, Html, Node, Selector};

/// Elements whose whole subtree is dropped before extraction.
pub const STRIPPED_TAGS: &[&str] = &["script", "style", "nav", "footer", "header", "aside"];

/// Minimum characters a fetched page must yield.
pub const MIN_PAGE_CHARS: usize = 500;

/// Maximum characters handed to graph extraction.
pub const MAX_CONTENT_CHARS: usize = 32_000;

/// Plain text ready for graph extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedContent {
    pub text: String,
    /// Length of `text` in characters.
    pub char_count: usize,
}

impl ExtractedContent {
    pub fn new(text: String) -> Self {
        let char_count = text.chars().count();
        Self { text, char_count }
    }

    /// Cut to at most `max` characters.
    pub fn truncate(mut self, max: usize) -> Self {
        if self.char_count > max {
            if let Some((idx, _)) = self.text.char_indices().nth(max) {
                self.text.truncate(idx);
            }
            self.char_count = max;
        }
        self
    }
}

fn selector(css: &str) -> Option<Selector> {
    Selector::parse(css).ok()
}

fn is_stripped(el: &ElementRef<'_>) -> bool {
    STRIPPED_TAGS.contains(&el.value().name())
}

fn inside_stripped(el: &ElementRef<'_>) -> bool {
    el.ancestors()
        .filter_map(ElementRef::wrap)
        .any(|ancestor| is_stripped(&ancestor))
}

/// Trimmed, non-empty text nodes under `el`, skipping stripped subtrees.
fn collect_text<'a>(el: ElementRef<'a>, out: &mut Vec<&'a str>) {
    for child in el.children() {
        match child.value() {
            Node::Text(text) => {
                let text = text.trim();
                if !text.is_empty() {
                    out.push(text);
                }
            }
            Node::Element(_) => {
                if let Some(child) = ElementRef::wrap(child)
                    && !is_stripped(&child)
                {
                    collect_text(child, out);
                }
            }
            _ => {}
        }
    }
}

fn text_of(el: ElementRef<'_>, separator: &str) -> String {
    let mut parts = Vec::new();
    collect_text(el, &mut parts);
    parts.join(separator)
}

fn visible<'a>(document: &'a Html, css: &str) -> Vec<ElementRef<'a>> {
    match selector(css) {
        Some(sel) => document.select(&sel).filter(|el| !inside_stripped(el)).collect(),
        None => Vec::new(),
    }
}

/// Extract readable text from an HTML document.
pub fn extract_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut parts: Vec<String> = Vec::new();

    for heading in visible(&document, "h1, h2, h3") {
        let text = text_of(heading, "");
        if !text.is_empty() {
            parts.push(text);
        }
    }

    let articles = visible(&document, "article");
    if articles.is_empty() {
        for paragraph in visible(&document, "p") {
            let text = text_of(paragraph, "");
            if !text.is_empty() {
                parts.push(text);
            }
        }
    } else {
        for article in articles {
            let text = text_of(article, " ");
            if !text.is_empty() {
                parts.push(text);
            }
        }
    }

    parts.join(" ")
}

/// Normalize a `text/plain` body: whitespace runs collapse to single spaces.
pub fn plain_text(body: &str) -> String {
    body.split_whitespace().collect::<Vec<_>>().join(" ")
}
