//! Engine facade: exclusion check, then either an inert attachment or a
//! running scheduler.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};
use unlatch_config::Config;
use unlatch_dom::Page;

use crate::detector::{DetectionResult, GateDetector};
use crate::exclusion::{ExclusionFilter, HostPattern};
use crate::host_list::{load_exclusions, HostListSource, HttpHostList};
use crate::scheduler::{EngineHandle, Scheduler, SharedPage};
use crate::state::EngineState;
use crate::store::KeyValueStore;

/// Result of attaching the engine to a page.
pub enum Attachment {
    /// The host is excluded; nothing was observed, run or stored.
    Inert { host: String, pattern: String },
    Running(EngineHandle),
}

impl Attachment {
    pub fn is_inert(&self) -> bool {
        matches!(self, Self::Inert { .. })
    }

    pub fn handle(&self) -> Option<&EngineHandle> {
        match self {
            Self::Running(handle) => Some(handle),
            Self::Inert { .. } => None,
        }
    }

    pub fn into_handle(self) -> Option<EngineHandle> {
        match self {
            Self::Running(handle) => Some(handle),
            Self::Inert { .. } => None,
        }
    }
}

/// Configured engine, shared by every page it attaches to.
pub struct Engine {
    config: Config,
    store: Arc<dyn KeyValueStore>,
    exclusions: ExclusionFilter,
}

impl Engine {
    pub fn new(config: Config, store: Arc<dyn KeyValueStore>, exclusions: ExclusionFilter) -> Self {
        Self {
            config,
            store,
            exclusions,
        }
    }

    /// Build an engine, fetching the remote exclusion list if one is configured.
    ///
    /// A remote list that cannot be fetched leaves only the static patterns.
    pub async fn from_config(config: Config, store: Arc<dyn KeyValueStore>) -> Self {
        let source = config.exclusion.remote_list_url.as_deref().and_then(|url| {
            let timeout = Duration::from_secs(config.exclusion.remote_timeout_secs);
            match HttpHostList::new(url, timeout) {
                Ok(source) => Some(source),
                Err(e) => {
                    warn!("Remote exclusion list disabled: {}", e);
                    None
                }
            }
        });

        let exclusions = load_exclusions(
            &config.exclusion.patterns,
            source.as_ref().map(|s| s as &dyn HostListSource),
        )
        .await;
        Self::new(config, store, exclusions)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn exclusions(&self) -> &ExclusionFilter {
        &self.exclusions
    }

    /// The pattern excluding `host`, if any.
    pub fn excluded_by(&self, host: &str) -> Option<&HostPattern> {
        self.exclusions.matching(host)
    }

    /// Start the engine on `page`, unless its host is excluded.
    pub fn attach<P: Page + Send + 'static>(&self, page: SharedPage<P>) -> Attachment {
        let host = page.lock().hostname();
        if let Some(pattern) = self.excluded_by(&host) {
            info!(host = %host, pattern = %pattern.as_str(), "Host excluded, engine inert");
            return Attachment::Inert {
                host,
                pattern: pattern.as_str().to_string(),
            };
        }

        Attachment::Running(Scheduler::spawn(
            page,
            host,
            self.config.clone(),
            Arc::clone(&self.store),
        ))
    }

    /// One detection pass with a fresh state, or `None` on an excluded host.
    pub fn detect_once(&self, page: &dyn Page) -> Option<DetectionResult> {
        let host = page.hostname();
        if self.exclusions.is_excluded(&host) {
            return None;
        }
        Some(GateDetector::from_config(&self.config).detect(page, &EngineState::new()))
    }
}
