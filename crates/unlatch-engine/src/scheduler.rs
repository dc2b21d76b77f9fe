//! Execution scheduler.
//!
//! One task per attached page. Mutation notifications, a fallback interval
//! and external commands all funnel into a single serialized [`tick`], so two
//! evaluations never overlap. Mutation bursts are coalesced behind a fixed
//! debounce deadline. Deferred helper clicks and style restores are deadlines
//! in the same `select!` loop.
//!
//! [`tick`]: Scheduler::tick

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use unlatch_config::Config;
use unlatch_dom::{MutationRecord, NodeId, Page};

use crate::actions::{ActionCatalog, StyleRestore};
use crate::detector::{DetectionResult, GateDetector};
use crate::error::{EngineError, EngineResult};
use crate::loop_guard::LoopGuard;
use crate::messages::{EngineCommand, Request, Response};
use crate::metrics::EngineMetrics;
use crate::state::{EngineState, Lifecycle};
use crate::store::KeyValueStore;

/// Page shared between the scheduler task and its owner.
///
/// The lock is only held inside synchronous sections, never across an await.
pub type SharedPage<P> = Arc<parking_lot::Mutex<P>>;

const COMMAND_BUFFER: usize = 32;

/// Published after every tick and command.
#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    pub host: String,
    pub state: EngineState,
    pub last_detection: Option<DetectionResult>,
}

/// Owner's handle on a running scheduler.
pub struct EngineHandle {
    host: String,
    commands: mpsc::Sender<EngineCommand>,
    status: watch::Receiver<EngineStatus>,
    metrics: Arc<EngineMetrics>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl EngineHandle {
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Send a named request and wait for its acknowledgement.
    pub async fn request(&self, request: Request) -> EngineResult<Response> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(EngineCommand::Request { request, reply })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        response.await.map_err(|_| EngineError::ChannelClosed)
    }

    pub async fn force_bypass(&self) -> EngineResult<Response> {
        self.request(Request::ForceBypass).await
    }

    /// Flip the persisted enable flag through the engine.
    pub async fn set_enabled(&self, enabled: bool) -> EngineResult<()> {
        self.commands
            .send(EngineCommand::SetEnabled(enabled))
            .await
            .map_err(|_| EngineError::ChannelClosed)
    }

    /// Latest published status.
    pub fn status(&self) -> EngineStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<EngineStatus> {
        self.status.clone()
    }

    /// Resolve once the engine reaches `stopped`.
    pub async fn wait_for_stop(&self) -> EngineResult<EngineStatus> {
        let mut status = self.subscribe_status();
        let stopped = status
            .wait_for(|s| s.state.is_stopped())
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        Ok(stopped.clone())
    }

    pub fn metrics(&self) -> Arc<EngineMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Stop the scheduler task and wait for it to exit.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            warn!(host = %self.host, "Scheduler task ended abnormally: {}", e);
        }
    }
}

/// Scheduler state. Lives inside the spawned task.
pub struct Scheduler<P: Page + Send + 'static> {
    pub(crate) page: SharedPage<P>,
    pub(crate) host: String,
    pub(crate) config: Config,
    pub(crate) store: Arc<dyn KeyValueStore>,
    pub(crate) detector: GateDetector,
    pub(crate) catalog: ActionCatalog,
    pub(crate) guard: LoopGuard,
    pub(crate) lifecycle: Lifecycle,
    pub(crate) metrics: Arc<EngineMetrics>,
    pub(crate) last_detection: Option<DetectionResult>,
    pub(crate) last_gated: bool,

    pub(crate) status_tx: watch::Sender<EngineStatus>,
    commands: mpsc::Receiver<EngineCommand>,
    cancel: CancellationToken,

    pub(crate) mutations: Option<mpsc::UnboundedReceiver<MutationRecord>>,
    pub(crate) interval: Option<Interval>,
    pub(crate) debounce: Option<Instant>,
    pub(crate) pending_click: Option<(NodeId, Instant)>,
    pub(crate) pending_restores: Vec<(Instant, StyleRestore)>,
}

impl<P: Page + Send + 'static> Scheduler<P> {
    /// Start a scheduler for `page` on the current runtime.
    pub fn spawn(
        page: SharedPage<P>,
        host: impl Into<String>,
        config: Config,
        store: Arc<dyn KeyValueStore>,
    ) -> EngineHandle {
        let host = host.into();
        let (command_tx, commands) = mpsc::channel(COMMAND_BUFFER);
        let lifecycle = Lifecycle::new(config.engine.max_actions);
        let (status_tx, status) = watch::channel(EngineStatus {
            host: host.clone(),
            state: lifecycle.state().clone(),
            last_detection: None,
        });
        let cancel = CancellationToken::new();
        let metrics = Arc::new(EngineMetrics::new());

        let mut scheduler = Self {
            detector: GateDetector::from_config(&config),
            catalog: ActionCatalog::from_config(&config),
            guard: LoopGuard::from_config(Arc::clone(&store), &config.loop_guard),
            page,
            host: host.clone(),
            config,
            store,
            lifecycle,
            metrics: Arc::clone(&metrics),
            last_detection: None,
            last_gated: false,
            status_tx,
            commands,
            cancel: cancel.clone(),
            mutations: None,
            interval: None,
            debounce: None,
            pending_click: None,
            pending_restores: Vec::new(),
        };
        scheduler.arm_triggers();

        let task = tokio::spawn(scheduler.run());
        EngineHandle {
            host,
            commands: command_tx,
            status,
            metrics,
            cancel,
            task,
        }
    }

    async fn run(mut self) {
        self.metrics.mark_start();
        info!(host = %self.host, "Engine attached");
        self.tick();

        loop {
            let debounce = self.debounce;
            let click_at = self.pending_click.map(|(_, at)| at);
            let restore_at = self.pending_restores.iter().map(|(at, _)| *at).min();

            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => break,

                command = self.commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => break,
                },

                mutation = next_mutation(&mut self.mutations) => match mutation {
                    Some(_) => self.on_mutation(),
                    None => self.mutations = None,
                },

                _ = sleep_until(debounce) => {
                    self.debounce = None;
                    self.tick();
                }

                _ = sleep_until(click_at) => self.fire_deferred(),

                _ = sleep_until(restore_at) => self.apply_due_restores(),

                _ = next_interval(&mut self.interval) => self.tick(),
            }
        }

        self.apply_all_restores();
        info!(host = %self.host, "Engine detached");
    }

    /// Subscribe to mutations and start the fallback timer if not running.
    pub(crate) fn arm_triggers(&mut self) {
        if self.mutations.is_none() {
            self.mutations = Some(self.page.lock().subscribe());
        }
        if self.interval.is_none() {
            let period = self.config.engine.tick_interval();
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            self.interval = Some(interval);
        }
    }

    /// Disconnect the observer and timers.
    pub(crate) fn disarm_triggers(&mut self) {
        self.mutations = None;
        self.interval = None;
        self.debounce = None;
        if let Some((node, _)) = self.pending_click.take() {
            self.metrics.record_deferred_cancelled();
            info!(host = %self.host, node = %node, "Deferred click cancelled by stop");
        }
    }

    fn on_mutation(&mut self) {
        let mut folded = 0;
        if let Some(rx) = self.mutations.as_mut() {
            while rx.try_recv().is_ok() {
                folded += 1;
            }
        }

        let debounce = self.config.engine.mutation_debounce();
        if debounce == Duration::ZERO {
            self.metrics.record_coalesced(folded);
            self.tick();
            return;
        }

        match self.debounce {
            Some(_) => folded += 1,
            None => self.debounce = Some(Instant::now() + debounce),
        }
        self.metrics.record_coalesced(folded);
    }

    fn apply_due_restores(&mut self) {
        let now = Instant::now();
        let (due, later): (Vec<_>, Vec<_>) = std::mem::take(&mut self.pending_restores)
            .into_iter()
            .partition(|(at, _)| *at <= now);
        self.pending_restores = later;

        let mut page = self.page.lock();
        for (_, restore) in due {
            debug!(node = %restore.node(), "Restoring inline style");
            restore.apply(&mut *page);
        }
    }

    fn apply_all_restores(&mut self) {
        let mut page = self.page.lock();
        for (_, restore) in self.pending_restores.drain(..) {
            restore.apply(&mut *page);
        }
    }

    pub(crate) fn publish(&self) {
        self.status_tx.send_replace(EngineStatus {
            host: self.host.clone(),
            state: self.lifecycle.state().clone(),
            last_detection: self.last_detection.clone(),
        });
    }
}

async fn next_mutation(
    rx: &mut Option<mpsc::UnboundedReceiver<MutationRecord>>,
) -> Option<MutationRecord> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn next_interval(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
