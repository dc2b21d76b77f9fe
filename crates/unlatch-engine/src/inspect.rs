//! Element predicates shared by the detector and the action catalog.

use unlatch_dom::{ElementNode, NodeId, Page};

use crate::vocabulary::{GATE_MARKER, LANDMARK_TAGS};

/// Tags whose text is never user-visible content.
const NON_CONTENT_TAGS: &[&str] = &["script", "style", "noscript", "template"];

pub(crate) fn is_content(e: &ElementNode) -> bool {
    !NON_CONTENT_TAGS.contains(&e.tag_name.as_str())
}

/// Whether the element is something a user would click.
pub(crate) fn is_clickable(e: &ElementNode) -> bool {
    match e.tag_name.as_str() {
        "a" | "button" => true,
        "input" => matches!(
            e.input_type().as_deref(),
            Some("button") | Some("submit") | Some("image")
        ),
        _ => e.attr("role") == Some("button"),
    }
}

/// Text a user reads on a control: input caption, else text content, else title.
pub(crate) fn label_text(page: &dyn Page, id: NodeId) -> String {
    let Some(e) = page.element(id) else {
        return String::new();
    };
    if let Some(caption) = e.caption() {
        if !caption.trim().is_empty() {
            return caption.trim().to_string();
        }
    }
    let text = page.text_content(id);
    if !text.is_empty() {
        return text;
    }
    e.attr("title").unwrap_or("").trim().to_string()
}

/// Whether the element's id or class carries a known gate marker.
pub(crate) fn has_gate_marker(e: &ElementNode) -> bool {
    e.id().is_some_and(|id| GATE_MARKER.is_match(id))
        || e.attr("class").is_some_and(|c| GATE_MARKER.is_match(c))
}

/// Whether the element sits inside a nav, header or footer landmark.
pub(crate) fn in_landmark(page: &dyn Page, id: NodeId) -> bool {
    page.closest(id, &|e: &ElementNode| LANDMARK_TAGS.contains(&e.tag_name.as_str()))
        .is_some()
}

/// Whether the element is, or contains, a form or an interactive control.
pub(crate) fn contains_interactive(page: &dyn Page, id: NodeId) -> bool {
    std::iter::once(id)
        .chain(page.descendants(id))
        .filter_map(|n| page.element(n))
        .any(|e| e.is_tag("form") || e.is_control() || (e.is_tag("a") && e.has_attr("href")))
}
