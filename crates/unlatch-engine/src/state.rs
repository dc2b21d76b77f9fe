//! Engine state and the lifecycle controller.

use serde::Serialize;
use tracing::info;

/// Why the engine stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The final gate form was submitted.
    TerminalSubmit,
    /// The per-host action rate exceeded the loop guard.
    LoopPrevention,
    /// The action budget for this page is spent.
    MaxActions,
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            StopReason::TerminalSubmit => "terminal submit",
            StopReason::LoopPrevention => "loop prevention",
            StopReason::MaxActions => "max actions",
        };
        write!(f, "{}", s)
    }
}

/// Per-page engine state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineState {
    action_count: u32,
    stop: Option<StopReason>,
    enabled: bool,
}

impl Default for EngineState {
    fn default() -> Self {
        Self {
            action_count: 0,
            stop: None,
            enabled: true,
        }
    }
}

impl EngineState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn action_count(&self) -> u32 {
        self.action_count
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.is_some()
    }

    pub fn stop_reason(&self) -> Option<StopReason> {
        self.stop
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// State with a given action count, for detection outside a scheduler.
    pub fn with_action_count(action_count: u32) -> Self {
        Self {
            action_count,
            ..Self::default()
        }
    }
}

/// Owns [`EngineState`] and enforces its transitions.
///
/// `action_count` only grows and never passes `max_actions`; `stop` is only
/// cleared by [`Lifecycle::force_resume`].
#[derive(Debug)]
pub struct Lifecycle {
    state: EngineState,
    max_actions: u32,
}

impl Lifecycle {
    pub fn new(max_actions: u32) -> Self {
        Self {
            state: EngineState::new(),
            max_actions,
        }
    }

    pub fn state(&self) -> &EngineState {
        &self.state
    }

    pub fn max_actions(&self) -> u32 {
        self.max_actions
    }

    /// Whether another mutating action fits in the budget.
    pub fn can_act(&self) -> bool {
        self.state.action_count < self.max_actions
    }

    /// Count one action. Returns false if the budget was already spent.
    pub fn record_action(&mut self) -> bool {
        if !self.can_act() {
            return false;
        }
        self.state.action_count += 1;
        true
    }

    /// Stop the engine. Returns false if it was already stopped.
    pub fn stop(&mut self, reason: StopReason) -> bool {
        if self.state.stop.is_some() {
            return false;
        }
        info!(
            reason = %reason,
            actions = self.state.action_count,
            "Engine stopped"
        );
        self.state.stop = Some(reason);
        true
    }

    /// Clear a stop after an external force-trigger. The action count is kept.
    pub fn force_resume(&mut self) -> Option<StopReason> {
        let previous = self.state.stop.take();
        if let Some(reason) = previous {
            info!(previous = %reason, "Engine resumed by force-trigger");
        }
        previous
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.state.enabled = enabled;
    }
}
