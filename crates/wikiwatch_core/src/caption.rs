use std::sync::OnceLock;

use regex::Regex;

use crate::{ChangeKind, ChangeLine};

/// Captions shorter than this (in characters) are appended to the URL as-is.
pub const CAPTION_LIMIT: usize = 130;
/// Longer captions are cut to this many characters before the marker.
const TRUNCATE_AT: usize = 127;
/// Marker appended to a truncated caption, before the URL.
pub const ELLIPSIS_MARKER: &str = "……";

fn markup_pattern() -> &'static Regex {
    static MARKUP: OnceLock<Regex> = OnceLock::new();
    MARKUP.get_or_init(|| Regex::new(r"<[^<>]*>").unwrap())
}

/// Compresses extracted change lines into a single caption.
///
/// The caption is `"<page name>：<hunks>"` with hunk lines joined by `|`,
/// capped at [`CAPTION_LIMIT`] characters before the URL is appended.
pub fn compose_caption(page_name: &str, changes: &[ChangeLine], url: &str) -> String {
    let pruned = prune(changes);
    let body = render_hunks(&pruned);

    let text = format!("{page_name}：{body}");
    let text = text.trim().replace('\n', "|");

    if text.chars().count() < CAPTION_LIMIT {
        return format!("{text}{url}");
    }
    let mut clipped: String = text.chars().take(TRUNCATE_AT).collect();
    clipped.push_str(ELLIPSIS_MARKER);
    clipped.push_str(url);
    clipped
}

/// Strips embedded markup and whitespace padding; lines that end up empty
/// carry no reportable text and are dropped.
fn prune(changes: &[ChangeLine]) -> Vec<ChangeLine> {
    changes
        .iter()
        .filter_map(|line| {
            let text = markup_pattern().replace_all(&line.text, "");
            let text = text.trim();
            if text.is_empty() {
                None
            } else {
                Some(ChangeLine::new(text, line.position, line.kind))
            }
        })
        .collect()
}

/// Walks the pruned sequence and renders it hunk pair by hunk pair.
///
/// A pair holds one delete run and one add run. A Delete→Add transition
/// keeps both runs in the same pair only when the incoming add line is
/// contiguous with the delete run (its position equals the first delete's
/// position plus the number of deletes collected); otherwise the open pair
/// is rendered first. An Add→Delete transition always renders the open
/// pair. The last line forces a final render.
fn render_hunks(pruned: &[ChangeLine]) -> String {
    let mut out = String::new();
    let mut deletes: Vec<String> = Vec::new();
    let mut adds: Vec<String> = Vec::new();
    let mut first_delete_pos = 0usize;
    let mut open: Option<ChangeKind> = None;

    for line in pruned {
        match (open, line.kind) {
            (None, ChangeKind::Delete) | (Some(ChangeKind::Delete), ChangeKind::Delete) => {
                if deletes.is_empty() {
                    first_delete_pos = line.position;
                }
                deletes.push(line.text.clone());
            }
            (None, ChangeKind::Add) | (Some(ChangeKind::Add), ChangeKind::Add) => {
                adds.push(line.text.clone());
            }
            (Some(ChangeKind::Delete), ChangeKind::Add) => {
                // Contiguity test: a replace-edit continues the delete run
                // directly; anything else is an unrelated edit.
                if line.position != first_delete_pos + deletes.len() {
                    render_pair(&mut out, &mut deletes, &mut adds);
                }
                adds.push(line.text.clone());
            }
            (Some(ChangeKind::Add), ChangeKind::Delete) => {
                render_pair(&mut out, &mut deletes, &mut adds);
                first_delete_pos = line.position;
                deletes.push(line.text.clone());
            }
        }
        open = Some(line.kind);
    }
    render_pair(&mut out, &mut deletes, &mut adds);
    out
}

/// Renders one delete-run/add-run pair and clears both runs.
///
/// When both runs are present, lines are paired index-wise up to the
/// shorter run; a pair whose texts are equal after removing all whitespace
/// is a restyled-but-unchanged line and is suppressed from both sides.
fn render_pair(out: &mut String, deletes: &mut Vec<String>, adds: &mut Vec<String>) {
    if !deletes.is_empty() && !adds.is_empty() {
        let paired = deletes.len().min(adds.len());
        for i in 0..paired {
            if strip_whitespace(&deletes[i]) == strip_whitespace(&adds[i]) {
                deletes[i].clear();
                adds[i].clear();
            }
        }
    }
    for text in deletes.iter().filter(|t| !t.is_empty()) {
        out.push('-');
        out.push_str(text);
        out.push('\n');
    }
    for text in adds.iter().filter(|t| !t.is_empty()) {
        out.push('+');
        out.push_str(text);
        out.push('\n');
    }
    deletes.clear();
    adds.clear();
}

fn strip_whitespace(text: &str) -> String {
    text.chars().filter(|c| !c.is_whitespace()).collect()
}
