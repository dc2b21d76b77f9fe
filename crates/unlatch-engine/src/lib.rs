//! # unlatch engine
//!
//! Detects artificial interstitial gates (countdowns, human-check buttons,
//! locker forms) on a page and advances them with a bounded number of
//! idempotent actions.
//!
//! ## Pipeline
//!
//! Every tick runs the same serialized pass:
//!
//! 1. **Loop guard** - per-host sliding-window rate limit over a persisted
//!    ledger of action timestamps.
//! 2. **Cleanup** - re-enable controls, drop overlays and nags, unlock scroll.
//! 3. **Detection** - two-phase weighted scoring over a signal registry.
//! 4. **Action** - final-state submit, else one mid-state helper click.
//!
//! Excluded hosts never reach the pipeline: [`Engine::attach`] returns an
//! inert attachment without subscribing, detecting or writing storage.

pub mod actions;
pub mod denylist;
pub mod detector;
pub mod engine;
pub mod error;
pub mod exclusion;
pub mod host_list;
mod inspect;
pub mod loop_guard;
pub mod messages;
pub mod metrics;
pub mod scheduler;
mod scheduler_tick;
pub mod signals;
pub mod state;
pub mod store;
pub mod vocabulary;

pub use actions::{ActionCatalog, ActionKind, ActionOutcome, ActionPolicy, ActionRecord, CleanupReport};
pub use denylist::RequestDenylist;
pub use detector::{DetectionResult, GateDetector, SignalHit};
pub use engine::{Attachment, Engine};
pub use error::{EngineError, EngineResult};
pub use exclusion::{ExclusionFilter, HostPattern, MatchMode};
pub use host_list::{load_exclusions, parse_host_list, HostListSource, HttpHostList};
pub use loop_guard::LoopGuard;
pub use messages::{EngineCommand, Request, Response};
pub use metrics::{EngineMetrics, MetricsSnapshot};
pub use scheduler::{EngineHandle, EngineStatus, Scheduler, SharedPage};
pub use signals::{DetectionContext, DetectionSignal, SignalPhase, SignalRegistry};
pub use state::{EngineState, Lifecycle, StopReason};
pub use store::{FileStore, KeyValueStore, MemoryStore, ENABLED_KEY, LOOP_PREVENTION_KEY};
