//! Article body extraction with ordered selector strategies.

use itertools::Itertools;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

static PARAGRAPH: Lazy<Selector> = Lazy::new(|| Selector::parse("p").unwrap());

/// How text is pulled out of the node a strategy selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractMode {
    /// All text under the node.
    WholeText,
    /// Text of each `<p>` under the node, one per line. Falls back to
    /// [`ExtractMode::WholeText`] when the node holds no paragraph text.
    Paragraphs,
}

/// All text under `element`, with runs of whitespace collapsed to one space.
pub fn node_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .collect::<String>()
        .split_whitespace()
        .join(" ")
}

fn paragraphs<'a>(elements: impl Iterator<Item = ElementRef<'a>>) -> Vec<String> {
    elements
        .map(node_text)
        .filter(|text| !text.is_empty())
        .collect()
}

/// Extract article text from `doc`.
///
/// The first strategy whose selector matches anything wins, even if its text
/// turns out empty. When none match, every paragraph in the document is used.
pub fn extract_text(doc: &Html, strategies: &[(Selector, ExtractMode)]) -> String {
    for (index, (selector, mode)) in strategies.iter().enumerate() {
        let Some(node) = doc.select(selector).next() else {
            continue;
        };
        debug!(strategy = index, ?mode, "Content selector matched");
        return match mode {
            ExtractMode::WholeText => node_text(node),
            ExtractMode::Paragraphs => {
                let ps = paragraphs(node.select(&PARAGRAPH));
                if ps.is_empty() {
                    node_text(node)
                } else {
                    ps.join("\n")
                }
            }
        };
    }

    debug!("No content selector matched; scanning all paragraphs");
    paragraphs(doc.select(&PARAGRAPH)).join("\n")
}
