//! Final-state submit: find the gate form and send it.

use std::collections::HashMap;

use tracing::{info, warn};
use unlatch_dom::{NodeId, Page};

use super::interact::force_interact;
use super::ActionRecord;
use crate::vocabulary::{GATE_FORM_IDS, NON_GATE_FORM_ACTION};

/// First attached, unhandled form that looks like a gate form.
///
/// A gate form either carries a known template id or posts, holds at least
/// one hidden field, and does not target a comment, contact or similar
/// endpoint.
pub(super) fn find_gate_form(
    page: &dyn Page,
    handled: &HashMap<NodeId, ActionRecord>,
) -> Option<NodeId> {
    page.elements().into_iter().find(|id| {
        let Some(form) = page.element(*id) else {
            return false;
        };
        if !form.is_tag("form") || handled.contains_key(id) {
            return false;
        }
        let known_id = form.id().is_some_and(|v| GATE_FORM_IDS.contains(&v));
        let posts = form
            .attr("method")
            .is_some_and(|m| m.trim().eq_ignore_ascii_case("post"));
        if !known_id && !posts {
            return false;
        }
        if form.attr("action").is_some_and(|a| NON_GATE_FORM_ACTION.is_match(a)) {
            return false;
        }
        page.descendants(*id)
            .into_iter()
            .any(|d| page.element(d).is_some_and(|e| e.is_hidden_input()))
    })
}

/// The control a user would press to send `form`.
pub(super) fn find_submit_control(page: &dyn Page, form: NodeId) -> Option<NodeId> {
    page.descendants(form)
        .into_iter()
        .find(|d| page.element(*d).is_some_and(|e| e.is_submit_control()))
}

/// Submit `form`, preferring its submit `control` so attached handlers run.
///
/// Falls back to the native submission API. Returns whether either path
/// went through.
pub(super) fn submit_gate_form(page: &mut dyn Page, form: NodeId, control: Option<NodeId>) -> bool {
    if let Some(control) = control {
        match force_interact(page, control) {
            Ok(_) => {
                info!(node = %form, control = %control, "Submitted gate form via its submit control");
                return true;
            }
            Err(e) => warn!(node = %form, "Submit control failed, using form submission: {}", e),
        }
    }

    match page.submit_form(form) {
        Ok(()) => {
            info!(node = %form, "Submitted gate form");
            true
        }
        Err(e) => {
            warn!(node = %form, "Gate form submission failed: {}", e);
            false
        }
    }
}
