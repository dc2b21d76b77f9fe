//! Scheduler evaluation path (`tick`) and command handling.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::time::Instant;
use tracing::{debug, info, warn};
use unlatch_config::{CleanupOrder, CleanupScope};
use unlatch_dom::{Page, ScrollTarget};

use crate::actions::{ActionOutcome, StyleRestore};
use crate::messages::{EngineCommand, Request, Response};
use crate::scheduler::Scheduler;
use crate::state::StopReason;
use crate::store::{read_flag, write_flag, ENABLED_KEY};

impl<P: Page + Send + 'static> Scheduler<P> {
    /// One serialized evaluation: loop check, cleanup, detection and at most
    /// one action.
    pub(crate) fn tick(&mut self) {
        self.metrics.record_tick();
        if self.lifecycle.state().is_stopped() {
            return;
        }

        let enabled = read_flag(self.store.as_ref(), ENABLED_KEY, true);
        self.lifecycle.set_enabled(enabled);
        if !enabled {
            debug!(host = %self.host, "Engine disabled, tick skipped");
            self.publish();
            return;
        }

        let now = Utc::now();
        if !self.guard.check_loop(&self.host, now) {
            warn!(host = %self.host, "Loop guard tripped");
            self.halt(StopReason::LoopPrevention);
            return;
        }

        let shared = Arc::clone(&self.page);
        let mut page = shared.lock();
        let order = self.config.engine.cleanup_order;

        if order == CleanupOrder::BeforeDetection && self.cleanup_due(self.last_gated) {
            self.run_cleanup(&mut *page, now);
        }

        let detection = self.detector.detect(&*page, self.lifecycle.state());
        self.metrics.record_evaluation(detection.gated);
        self.last_gated = detection.gated;

        if order == CleanupOrder::AfterDetection && self.cleanup_due(detection.gated) {
            self.run_cleanup(&mut *page, now);
        }

        let stop = if !self.lifecycle.can_act() {
            Some(StopReason::MaxActions)
        } else if detection.gated {
            self.act(&mut *page, now)
        } else {
            None
        };
        drop(page);

        self.last_detection = Some(detection);
        match stop {
            Some(reason) => self.halt(reason),
            None => self.publish(),
        }
    }

    fn cleanup_due(&self, gated: bool) -> bool {
        match self.config.engine.cleanup_scope {
            CleanupScope::Always => true,
            CleanupScope::WhenGated => gated,
        }
    }

    fn run_cleanup(&mut self, page: &mut dyn Page, now: DateTime<Utc>) {
        if !self.catalog.cleanup(page, now).is_empty() {
            self.metrics.record_cleanup();
        }
    }

    /// Run the next catalog action on a gated page.
    fn act(&mut self, page: &mut dyn Page, now: DateTime<Utc>) -> Option<StopReason> {
        // A scheduled click blocks further helper clicks, but not the submit.
        let outcome = if self.pending_click.is_some() {
            self.catalog.try_submit(page, now)
        } else {
            self.catalog.next_action(page, now)
        };

        match outcome {
            ActionOutcome::Terminal { node } => {
                self.count_action(now);
                info!(host = %self.host, node = %node, kind = "submit", "Action");
                Some(StopReason::TerminalSubmit)
            }
            ActionOutcome::SubmitFailed { node } => {
                self.count_action(now);
                warn!(host = %self.host, node = %node, kind = "submit", "Gate form could not be submitted");
                self.budget_stop()
            }
            ActionOutcome::Advanced { node, restore } => {
                self.count_action(now);
                info!(host = %self.host, node = %node, kind = "click", "Action");
                self.queue_restore(restore);
                self.budget_stop()
            }
            ActionOutcome::Deferred { node, delay } => {
                info!(host = %self.host, node = %node, delay_ms = delay.as_millis() as u64, "Helper click scheduled");
                self.pending_click = Some((node, Instant::now() + delay));
                None
            }
            ActionOutcome::Idle => None,
        }
    }

    /// Fire the pending helper click, unless the engine stopped or was
    /// disabled in the meantime.
    pub(crate) fn fire_deferred(&mut self) {
        let Some((node, _)) = self.pending_click.take() else {
            return;
        };
        let enabled = read_flag(self.store.as_ref(), ENABLED_KEY, true);
        if self.lifecycle.state().is_stopped() || !enabled || !self.lifecycle.can_act() {
            self.metrics.record_deferred_cancelled();
            info!(host = %self.host, node = %node, "Deferred click cancelled");
            return;
        }

        let now = Utc::now();
        let outcome = {
            let shared = Arc::clone(&self.page);
            let mut page = shared.lock();
            self.catalog.fire_deferred(&mut *page, node)
        };

        if let ActionOutcome::Advanced { node, restore } = outcome {
            self.count_action(now);
            info!(host = %self.host, node = %node, kind = "click", "Action");
            self.queue_restore(restore);
            if let Some(reason) = self.budget_stop() {
                self.halt(reason);
                return;
            }
        }
        self.publish();
    }

    fn count_action(&mut self, now: DateTime<Utc>) {
        self.lifecycle.record_action();
        self.guard.record_action(&self.host, now);
        self.metrics.record_action();
    }

    fn budget_stop(&self) -> Option<StopReason> {
        (!self.lifecycle.can_act()).then_some(StopReason::MaxActions)
    }

    fn queue_restore(&mut self, restore: Option<StyleRestore>) {
        if let Some(restore) = restore {
            let at = Instant::now() + self.config.engine.style_restore_delay();
            self.pending_restores.push((at, restore));
        }
    }

    /// Enter `stopped` and tear down the triggers.
    pub(crate) fn halt(&mut self, reason: StopReason) {
        self.lifecycle.stop(reason);
        self.disarm_triggers();
        self.publish();
    }

    pub(crate) fn handle_command(&mut self, command: EngineCommand) {
        match command {
            EngineCommand::Request { request, reply } => {
                let response = self.handle_request(request);
                if reply.send(response).is_err() {
                    debug!(host = %self.host, "Requester went away before the reply");
                }
            }
            EngineCommand::SetEnabled(enabled) => self.set_enabled(enabled),
        }
    }

    fn handle_request(&mut self, request: Request) -> Response {
        debug!(host = %self.host, request = ?request, "Request");
        match request {
            Request::ForceBypass => self.force_bypass(),
            Request::ScrollToBottom => {
                self.page.lock().scroll_to(ScrollTarget::Bottom);
                self.force_bypass()
            }
            Request::ScrollToTop => {
                self.page.lock().scroll_to(ScrollTarget::Top);
                Response::ok()
            }
        }
    }

    /// Clear `stopped`, re-arm the triggers and evaluate now.
    fn force_bypass(&mut self) -> Response {
        self.lifecycle.force_resume();
        self.arm_triggers();
        self.tick();
        Response::ok()
    }

    fn set_enabled(&mut self, enabled: bool) {
        if let Err(e) = write_flag(self.store.as_ref(), ENABLED_KEY, enabled) {
            warn!(host = %self.host, "Failed to persist enable flag: {}", e);
        }
        self.lifecycle.set_enabled(enabled);
        info!(host = %self.host, enabled = enabled, "Engine toggled");
        if enabled {
            self.tick();
        } else {
            self.publish();
        }
    }
}
