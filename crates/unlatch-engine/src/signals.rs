//! Detection signal registry.
//!
//! Each signal is a pure predicate over the current page plus a weight and a
//! sufficiency flag. Primary signals are cheap and any one of them is enough
//! to consider the page worth scoring; secondary signals only add weight once
//! a primary signal has fired.

use serde::Serialize;
use unlatch_config::DetectorWeights;
use unlatch_dom::Page;

use crate::inspect::{has_gate_marker, is_clickable, is_content, label_text};
use crate::vocabulary::{is_action_text, COUNTDOWN, OVERLAY_Z_INDEX, REDIRECT_SCRIPT};

/// Longest text block inspected for countdown wording.
const COUNTDOWN_TEXT_LIMIT: usize = 160;

/// Longest control label inspected for action wording.
const ACTION_LABEL_LIMIT: usize = 64;

/// Engine facts a signal may depend on besides the page.
#[derive(Debug, Clone, Copy, Default)]
pub struct DetectionContext {
    pub action_count: u32,
    pub sticky_after_action: bool,
}

pub type SignalPredicate = fn(&dyn Page, &DetectionContext) -> bool;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalPhase {
    Primary,
    Secondary,
}

/// One registry entry.
#[derive(Debug, Clone)]
pub struct DetectionSignal {
    pub name: &'static str,
    pub weight: u32,
    /// Whether this signal alone marks the page as a gate candidate.
    pub sufficient: bool,
    pub phase: SignalPhase,
    pub predicate: SignalPredicate,
}

impl DetectionSignal {
    pub fn evaluate(&self, page: &dyn Page, ctx: &DetectionContext) -> bool {
        (self.predicate)(page, ctx)
    }
}

/// Fixed table of detection signals.
#[derive(Debug, Clone)]
pub struct SignalRegistry {
    signals: Vec<DetectionSignal>,
}

impl SignalRegistry {
    pub fn new(weights: &DetectorWeights) -> Self {
        use SignalPhase::*;

        Self {
            signals: vec![
                signal("countdown", weights.countdown, true, Primary, has_countdown),
                signal("disabled_controls", weights.disabled_controls, true, Primary, has_disabled_controls),
                signal("gate_markers", weights.gate_markers, true, Primary, has_gate_markers),
                signal("prior_action", weights.prior_action, true, Primary, has_prior_action),
                signal("overlays", weights.overlays, false, Secondary, has_overlays),
                signal("redirect_scripts", weights.redirect_scripts, false, Secondary, has_redirect_scripts),
                signal("action_text", weights.action_text, false, Secondary, has_action_text),
                // Known gate templates earn their weight a second time.
                signal("known_gate_bonus", weights.gate_markers, false, Secondary, has_gate_markers),
            ],
        }
    }

    pub fn signals(&self) -> &[DetectionSignal] {
        &self.signals
    }

    pub fn get(&self, name: &str) -> Option<&DetectionSignal> {
        self.signals.iter().find(|s| s.name == name)
    }

    pub fn phase(&self, phase: SignalPhase) -> impl Iterator<Item = &DetectionSignal> {
        self.signals.iter().filter(move |s| s.phase == phase)
    }
}

fn signal(
    name: &'static str,
    weight: u32,
    sufficient: bool,
    phase: SignalPhase,
    predicate: SignalPredicate,
) -> DetectionSignal {
    DetectionSignal {
        name,
        weight,
        sufficient,
        phase,
        predicate,
    }
}

impl Default for SignalRegistry {
    fn default() -> Self {
        Self::new(&DetectorWeights::default())
    }
}

fn has_countdown(page: &dyn Page, _ctx: &DetectionContext) -> bool {
    page.elements().into_iter().any(|id| {
        let Some(e) = page.element(id) else {
            return false;
        };
        if !is_content(e) || page.own_text(id).is_empty() || !page.is_visible(id) {
            return false;
        }
        let text = page.text_content(id);
        text.chars().count() <= COUNTDOWN_TEXT_LIMIT && COUNTDOWN.is_match(&text)
    })
}

fn has_disabled_controls(page: &dyn Page, _ctx: &DetectionContext) -> bool {
    page.elements().into_iter().any(|id| {
        page.element(id)
            .is_some_and(|e| e.is_disabled() && !e.is_hidden_input())
            && page.is_visible(id)
    })
}

fn has_gate_markers(page: &dyn Page, _ctx: &DetectionContext) -> bool {
    page.elements()
        .into_iter()
        .filter_map(|id| page.element(id))
        .any(has_gate_marker)
}

fn has_prior_action(_page: &dyn Page, ctx: &DetectionContext) -> bool {
    ctx.sticky_after_action && ctx.action_count > 0
}

fn has_overlays(page: &dyn Page, _ctx: &DetectionContext) -> bool {
    page.elements().into_iter().any(|id| {
        page.element(id)
            .and_then(|e| e.z_index())
            .is_some_and(|z| z > OVERLAY_Z_INDEX)
            && page.is_visible(id)
    })
}

fn has_redirect_scripts(page: &dyn Page, _ctx: &DetectionContext) -> bool {
    page.elements().into_iter().any(|id| {
        page.element(id).is_some_and(|e| e.is_tag("script"))
            && REDIRECT_SCRIPT.is_match(page.own_text(id))
    })
}

fn has_action_text(page: &dyn Page, _ctx: &DetectionContext) -> bool {
    page.elements().into_iter().any(|id| {
        if !page.element(id).is_some_and(is_clickable) || !page.is_visible(id) {
            return false;
        }
        let label = label_text(page, id);
        label.chars().count() <= ACTION_LABEL_LIMIT && is_action_text(&label)
    })
}

#[cfg(test)]
#[path = "signals_tests.rs"]
mod tests;
