//! Action catalog: the priority-ordered actions the engine may take.
//!
//! On a gated tick the catalog tries, in order, a final-state form submit and
//! a mid-state helper click; the first that fires ends the tick. Cleanup is
//! separate and never counts as an action. Every element is the target of at
//! most one submit or click for the lifetime of the page.

mod cleanup;
mod helper;
mod interact;
mod submit;

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;
use unlatch_config::Config;
use unlatch_dom::{NodeId, Page, Selector};

use crate::denylist::RequestDenylist;
use crate::vocabulary::{DISMISS_SELECTORS, HELPER_SELECTORS, NUISANCE_SELECTORS};

pub use cleanup::CleanupReport;
pub use helper::HelperStage;
pub use interact::{force_interact, StyleRestore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Submit,
    Click,
    Cleanup,
}

/// One attempted action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionRecord {
    pub node: NodeId,
    pub kind: ActionKind,
    pub attempted_at: DateTime<Utc>,
}

/// Result of asking the catalog for the next action.
#[derive(Debug)]
pub enum ActionOutcome {
    /// The gate form was submitted; the engine should stop.
    Terminal { node: NodeId },
    /// A helper was clicked; further mutation is expected.
    Advanced {
        node: NodeId,
        restore: Option<StyleRestore>,
    },
    /// A helper click is scheduled to fire after `delay`.
    Deferred { node: NodeId, delay: Duration },
    /// The gate form was found but neither its control nor the native
    /// submission went through. Counted, but the engine keeps running.
    SubmitFailed { node: NodeId },
    /// Nothing to do this tick.
    Idle,
}

impl ActionOutcome {
    /// Whether this outcome consumed one unit of the action budget.
    pub fn is_counted(&self) -> bool {
        matches!(
            self,
            Self::Terminal { .. } | Self::Advanced { .. } | Self::SubmitFailed { .. }
        )
    }
}

/// Tunables for candidate selection and pacing.
#[derive(Debug, Clone)]
pub struct ActionPolicy {
    pub max_candidate_text_len: usize,
    pub require_gate_container: bool,
    pub click_delay: Duration,
}

impl Default for ActionPolicy {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl ActionPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_candidate_text_len: config.engine.max_candidate_text_len,
            require_gate_container: config.engine.require_gate_container,
            click_delay: config.engine.click_delay(),
        }
    }
}

/// Selectors compiled once per catalog.
#[derive(Debug, Clone)]
pub(crate) struct SelectorSets {
    pub helpers: Vec<Selector>,
    pub dismiss: Vec<Selector>,
    pub nuisance: Vec<Selector>,
}

impl SelectorSets {
    fn builtin() -> Self {
        Self {
            helpers: compile(HELPER_SELECTORS),
            dismiss: compile(DISMISS_SELECTORS),
            nuisance: compile(NUISANCE_SELECTORS),
        }
    }
}

fn compile(list: &[&str]) -> Vec<Selector> {
    list.iter()
        .filter_map(|text| match Selector::parse(text) {
            Ok(selector) => Some(selector),
            Err(e) => {
                warn!("Skipping selector: {}", e);
                None
            }
        })
        .collect()
}

/// Owns the per-page idempotency set and runs the actions.
pub struct ActionCatalog {
    policy: ActionPolicy,
    selectors: SelectorSets,
    denylist: RequestDenylist,
    handled: HashMap<NodeId, ActionRecord>,
    history: Vec<ActionRecord>,
}

impl ActionCatalog {
    pub fn new(policy: ActionPolicy, denylist: RequestDenylist) -> Self {
        Self {
            policy,
            selectors: SelectorSets::builtin(),
            denylist,
            handled: HashMap::new(),
            history: Vec::new(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            ActionPolicy::from_config(config),
            RequestDenylist::new(&config.denylist.hosts),
        )
    }

    pub fn policy(&self) -> &ActionPolicy {
        &self.policy
    }

    /// The submit or click record for `node`, if it was acted on.
    pub fn handled(&self, node: NodeId) -> Option<&ActionRecord> {
        self.handled.get(&node)
    }

    pub fn handled_count(&self) -> usize {
        self.handled.len()
    }

    /// All records in attempt order, cleanup removals included.
    pub fn history(&self) -> &[ActionRecord] {
        &self.history
    }

    /// Try the final-state submit, then the helper click. At most one fires.
    pub fn next_action(&mut self, page: &mut dyn Page, now: DateTime<Utc>) -> ActionOutcome {
        let outcome = self.try_submit(page, now);
        if !matches!(outcome, ActionOutcome::Idle) {
            return outcome;
        }

        if let Some(target) = helper::pick_helper(page, &self.handled, &self.policy, &self.selectors) {
            self.mark(target, ActionKind::Click, now);
            if !self.policy.click_delay.is_zero() {
                return ActionOutcome::Deferred {
                    node: target,
                    delay: self.policy.click_delay,
                };
            }
            let restore = helper::click_helper(page, target);
            return ActionOutcome::Advanced {
                node: target,
                restore,
            };
        }

        ActionOutcome::Idle
    }

    /// Final-state submit only; used while a helper click is pending.
    pub fn try_submit(&mut self, page: &mut dyn Page, now: DateTime<Utc>) -> ActionOutcome {
        match submit::find_gate_form(page, &self.handled) {
            Some(form) => {
                let control = submit::find_submit_control(page, form);
                self.mark(form, ActionKind::Submit, now);
                // The control shares the form's action; it must never come
                // back as a helper candidate.
                if let Some(control) = control {
                    self.handled.insert(
                        control,
                        ActionRecord {
                            node: control,
                            kind: ActionKind::Submit,
                            attempted_at: now,
                        },
                    );
                }
                if submit::submit_gate_form(page, form, control) {
                    ActionOutcome::Terminal { node: form }
                } else {
                    ActionOutcome::SubmitFailed { node: form }
                }
            }
            None => ActionOutcome::Idle,
        }
    }

    /// Fire a previously deferred helper click.
    pub fn fire_deferred(&mut self, page: &mut dyn Page, node: NodeId) -> ActionOutcome {
        if !page.is_attached(node) {
            warn!(node = %node, "Deferred click target is gone");
            return ActionOutcome::Idle;
        }
        let restore = helper::click_helper(page, node);
        ActionOutcome::Advanced { node, restore }
    }

    /// Non-destructive cleanup. Safe to run on every tick.
    pub fn cleanup(&mut self, page: &mut dyn Page, now: DateTime<Utc>) -> CleanupReport {
        let report = cleanup::run(page, &self.selectors, &self.denylist);
        self.history
            .extend(report.removed.iter().map(|node| ActionRecord {
                node: *node,
                kind: ActionKind::Cleanup,
                attempted_at: now,
            }));
        report
    }

    fn mark(&mut self, node: NodeId, kind: ActionKind, now: DateTime<Utc>) {
        let record = ActionRecord {
            node,
            kind,
            attempted_at: now,
        };
        self.handled.insert(node, record.clone());
        self.history.push(record);
    }
}

#[cfg(test)]
#[path = "actions_tests.rs"]
mod tests;
