//! Mid-state helper advance: pick one control that moves the gate forward.

use std::collections::HashMap;

use serde::Serialize;
use tracing::{debug, info, warn};
use unlatch_dom::{ElementNode, NodeId, Page};

use super::interact::{force_interact, StyleRestore};
use super::{ActionKind, ActionPolicy, ActionRecord, SelectorSets};
use crate::inspect::{has_gate_marker, in_landmark, is_clickable, label_text};
use crate::vocabulary::{CONTINUE_TEXT, FINAL_STEP_TEXT, VERIFY_TEXT};

/// How far along the gate a candidate moves it. Later stages win.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HelperStage {
    /// Close button of an ad overlay.
    Dismiss,
    /// Human-check control.
    Verify,
    /// Known template control without recognised wording.
    Generic,
    Continue,
    /// Reveals or opens the destination.
    GetLink,
}

impl HelperStage {
    fn from_label(label: &str) -> Option<Self> {
        if FINAL_STEP_TEXT.is_match(label) {
            Some(Self::GetLink)
        } else if CONTINUE_TEXT.is_match(label) {
            Some(Self::Continue)
        } else if VERIFY_TEXT.is_match(label) {
            Some(Self::Verify)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    node: NodeId,
    stage: HelperStage,
}

/// Best helper candidate, or `None`.
///
/// Ties between equal stages go to the first candidate in document order.
pub(super) fn pick_helper(
    page: &dyn Page,
    handled: &HashMap<NodeId, ActionRecord>,
    policy: &ActionPolicy,
    selectors: &SelectorSets,
) -> Option<NodeId> {
    let mut candidates: Vec<Candidate> = Vec::new();

    for id in page.elements() {
        let Some(stage) = classify(page, id, selectors) else {
            continue;
        };
        let node = retarget(page, id);
        match candidates.iter_mut().find(|c| c.node == node) {
            Some(existing) => existing.stage = existing.stage.max(stage),
            None => candidates.push(Candidate { node, stage }),
        }
    }

    let best = candidates
        .into_iter()
        .filter(|c| eligible(page, c.node, handled, policy))
        .fold(None::<Candidate>, |best, c| match best {
            Some(b) if b.stage >= c.stage => Some(b),
            _ => Some(c),
        })?;

    debug!(node = %best.node, stage = ?best.stage, "Helper candidate");
    Some(best.node)
}

/// Click a helper. Failures are logged; the click still counts.
pub(super) fn click_helper(page: &mut dyn Page, node: NodeId) -> Option<StyleRestore> {
    match force_interact(page, node) {
        Ok(restore) => {
            info!(node = %node, "Clicked helper");
            restore
        }
        Err(e) => {
            warn!(node = %node, "Helper click failed: {}", e);
            None
        }
    }
}

fn classify(page: &dyn Page, id: NodeId, selectors: &SelectorSets) -> Option<HelperStage> {
    let element = page.element(id)?;
    let by_text = if is_clickable(element) {
        HelperStage::from_label(&label_text(page, id))
    } else {
        None
    };
    let matches_any = |list: &[unlatch_dom::Selector]| list.iter().any(|s| s.matches(page, id));

    by_text
        .or_else(|| matches_any(&selectors.helpers).then_some(HelperStage::Generic))
        .or_else(|| matches_any(&selectors.dismiss).then_some(HelperStage::Dismiss))
}

/// A control nested in a link is clicked through the link.
fn retarget(page: &dyn Page, id: NodeId) -> NodeId {
    page.closest(id, &|e: &ElementNode| e.is_tag("a")).unwrap_or(id)
}

fn eligible(
    page: &dyn Page,
    node: NodeId,
    handled: &HashMap<NodeId, ActionRecord>,
    policy: &ActionPolicy,
) -> bool {
    let Some(element) = page.element(node) else {
        return false;
    };
    if handled.contains_key(&node) || !page.is_visible(node) || in_landmark(page, node) {
        return false;
    }
    if is_in_page_anchor(element) {
        return false;
    }
    // Controls of an already submitted gate form belong to that submit.
    let form = page.closest(node, &|e: &ElementNode| e.is_tag("form"));
    if form.is_some_and(|f| handled.get(&f).is_some_and(|r| r.kind == ActionKind::Submit)) {
        return false;
    }
    if label_text(page, node).chars().count() > policy.max_candidate_text_len {
        return false;
    }
    if policy.require_gate_container {
        return page
            .closest(node, &|e: &ElementNode| e.is_tag("form") || has_gate_marker(e))
            .is_some();
    }
    true
}

/// `href="#section"`; a bare `#` is a script-driven button and stays eligible.
fn is_in_page_anchor(e: &ElementNode) -> bool {
    e.attr("href")
        .map(str::trim)
        .is_some_and(|h| h.starts_with('#') && h.len() > 1)
}
