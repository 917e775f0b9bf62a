use scraper::node::Node;
use scraper::{ElementRef, Html, Selector};

use wikiwatch_core::{ChangeKind, ChangeLine};

const DELETE_STYLE: &str = "color:red;";
const INSERT_STYLE: &str = "color:blue;";
/// Plain text fragments at most this long (after trimming) are separator
/// noise between lines; longer ones mark an elided stretch.
const ELLIPSIS_MIN_CHARS: usize = 2;

/// Pulls typed change lines out of a rendered diff page.
///
/// The diff convention is a single `<pre class="diff">` container whose
/// children are plain text nodes and styled line elements. Every observed
/// fragment advances the position counter so positions stay comparable
/// across elided stretches; only `color:red;` (delete) and `color:blue;`
/// (insert) elements emit lines. A page without the container yields an
/// empty list, which callers treat as "nothing to report".
pub fn extract_change_lines(page_html: &str) -> Vec<ChangeLine> {
    let document = Html::parse_document(page_html);
    let Some(container) = diff_container(&document) else {
        return Vec::new();
    };

    let mut changes = Vec::new();
    let mut position = 0usize;
    for child in container.children() {
        match child.value() {
            Node::Text(text) => {
                if text.trim().chars().count() > ELLIPSIS_MIN_CHARS {
                    position += 1;
                }
            }
            Node::Element(_) => {
                position += 1;
                let Some(element) = ElementRef::wrap(child) else {
                    continue;
                };
                let style = element.value().attr("style");
                let kind = if style == Some(DELETE_STYLE) {
                    ChangeKind::Delete
                } else if style == Some(INSERT_STYLE) {
                    ChangeKind::Add
                } else {
                    continue;
                };
                let text: String = element.text().collect();
                changes.push(ChangeLine::new(text, position, kind));
            }
            _ => {}
        }
    }
    changes
}

/// Serialized HTML of the diff container, used as the page's dedup subject.
pub fn diff_container_html(page_html: &str) -> Option<String> {
    let document = Html::parse_document(page_html);
    diff_container(&document).map(|element| element.html())
}

fn diff_container(document: &Html) -> Option<ElementRef<'_>> {
    let selector = Selector::parse("pre.diff").ok()?;
    document.select(&selector).next()
}
