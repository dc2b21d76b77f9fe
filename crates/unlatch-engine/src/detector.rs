//! Gate detector: scores the page against the signal registry.

use serde::Serialize;
use tracing::debug;
use unlatch_config::Config;
use unlatch_dom::Page;

use crate::signals::{DetectionContext, SignalPhase, SignalRegistry};
use crate::state::EngineState;

/// A signal that fired during one detection pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignalHit {
    pub name: &'static str,
    pub weight: u32,
    pub phase: SignalPhase,
}

/// Outcome of one detection pass. Never cached across ticks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DetectionResult {
    pub score: u32,
    pub gated: bool,
    pub signals: Vec<SignalHit>,
}

impl DetectionResult {
    pub fn fired(&self, name: &str) -> bool {
        self.signals.iter().any(|s| s.name == name)
    }
}

/// Two-phase gate detector.
///
/// Phase one evaluates the sufficient signals. If none fires the page is not
/// gated and no further signal is evaluated. Otherwise the secondary signals
/// are added and the total is compared against the threshold.
#[derive(Debug, Clone)]
pub struct GateDetector {
    registry: SignalRegistry,
    threshold: u32,
    sticky_after_action: bool,
}

impl GateDetector {
    pub fn new(registry: SignalRegistry, threshold: u32, sticky_after_action: bool) -> Self {
        Self {
            registry,
            threshold,
            sticky_after_action,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            SignalRegistry::new(&config.detector.weights),
            config.engine.detection_threshold,
            config.engine.sticky_gate_after_action,
        )
    }

    pub fn registry(&self) -> &SignalRegistry {
        &self.registry
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    pub fn detect(&self, page: &dyn Page, state: &EngineState) -> DetectionResult {
        let ctx = DetectionContext {
            action_count: state.action_count(),
            sticky_after_action: self.sticky_after_action,
        };

        let mut result = DetectionResult::default();
        let mut candidate = false;

        for signal in self.registry.phase(SignalPhase::Primary) {
            if signal.evaluate(page, &ctx) {
                candidate |= signal.sufficient;
                result.score = result.score.saturating_add(signal.weight);
                result.signals.push(SignalHit {
                    name: signal.name,
                    weight: signal.weight,
                    phase: signal.phase,
                });
            }
        }

        if !candidate {
            return result;
        }

        for signal in self.registry.phase(SignalPhase::Secondary) {
            if signal.evaluate(page, &ctx) {
                result.score = result.score.saturating_add(signal.weight);
                result.signals.push(SignalHit {
                    name: signal.name,
                    weight: signal.weight,
                    phase: signal.phase,
                });
            }
        }

        result.gated = result.score >= self.threshold;
        debug!(
            score = result.score,
            gated = result.gated,
            signals = ?result.signals.iter().map(|s| s.name).collect::<Vec<_>>(),
            "Detection"
        );
        result
    }
}

impl Default for GateDetector {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}
