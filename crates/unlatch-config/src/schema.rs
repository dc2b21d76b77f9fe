//! Configuration schema definitions.

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub detector: DetectorConfig,

    #[serde(default)]
    pub loop_guard: LoopGuardConfig,

    #[serde(default)]
    pub exclusion: ExclusionConfig,

    #[serde(default)]
    pub denylist: DenylistConfig,

    #[serde(default)]
    pub storage: StorageConfig,
}

/// When page cleanup runs relative to gate detection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CleanupOrder {
    BeforeDetection,
    #[default]
    AfterDetection,
}

/// On which ticks page cleanup runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CleanupScope {
    #[default]
    Always,
    WhenGated,
}

/// Engine lifecycle and action policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Maximum mutating actions per page load.
    #[serde(default = "default_max_actions")]
    pub max_actions: u32,

    /// Minimum score for a page to count as gated.
    #[serde(default = "default_detection_threshold")]
    pub detection_threshold: u32,

    /// Fallback timer period.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Mutation batching window; 0 evaluates on every mutation burst.
    #[serde(default = "default_mutation_debounce_ms")]
    pub mutation_debounce_ms: u64,

    /// Delay before a helper click fires; 0 clicks immediately.
    #[serde(default)]
    pub click_delay_ms: u64,

    /// Delay before inline styles overridden for a click are restored.
    #[serde(default = "default_style_restore_ms")]
    pub style_restore_ms: u64,

    /// Helper candidates with longer text are ignored.
    #[serde(default = "default_max_candidate_text_len")]
    pub max_candidate_text_len: usize,

    /// Only click helpers nested in a form or gate container.
    #[serde(default)]
    pub require_gate_container: bool,

    /// Keep treating the page as gated once an action was taken.
    #[serde(default = "default_true")]
    pub sticky_gate_after_action: bool,

    #[serde(default)]
    pub cleanup_order: CleanupOrder,

    #[serde(default)]
    pub cleanup_scope: CleanupScope,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_actions: default_max_actions(),
            detection_threshold: default_detection_threshold(),
            tick_interval_ms: default_tick_interval_ms(),
            mutation_debounce_ms: default_mutation_debounce_ms(),
            click_delay_ms: 0,
            style_restore_ms: default_style_restore_ms(),
            max_candidate_text_len: default_max_candidate_text_len(),
            require_gate_container: false,
            sticky_gate_after_action: default_true(),
            cleanup_order: CleanupOrder::default(),
            cleanup_scope: CleanupScope::default(),
        }
    }
}

fn default_max_actions() -> u32 {
    10
}

fn default_detection_threshold() -> u32 {
    3
}

fn default_tick_interval_ms() -> u64 {
    1000
}

fn default_mutation_debounce_ms() -> u64 {
    250
}

fn default_style_restore_ms() -> u64 {
    500
}

fn default_max_candidate_text_len() -> usize {
    48
}

fn default_true() -> bool {
    true
}

/// Gate detector configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DetectorConfig {
    #[serde(default)]
    pub weights: DetectorWeights,
}

/// Score contributed by each detection signal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorWeights {
    #[serde(default = "default_weight_3")]
    pub countdown: u32,

    #[serde(default = "default_weight_3")]
    pub disabled_controls: u32,

    #[serde(default = "default_weight_2")]
    pub gate_markers: u32,

    #[serde(default = "default_weight_1")]
    pub overlays: u32,

    #[serde(default = "default_weight_1")]
    pub redirect_scripts: u32,

    #[serde(default = "default_weight_1")]
    pub action_text: u32,

    #[serde(default = "default_weight_3")]
    pub prior_action: u32,
}

impl Default for DetectorWeights {
    fn default() -> Self {
        Self {
            countdown: default_weight_3(),
            disabled_controls: default_weight_3(),
            gate_markers: default_weight_2(),
            overlays: default_weight_1(),
            redirect_scripts: default_weight_1(),
            action_text: default_weight_1(),
            prior_action: default_weight_3(),
        }
    }
}

fn default_weight_1() -> u32 {
    1
}

fn default_weight_2() -> u32 {
    2
}

fn default_weight_3() -> u32 {
    3
}

/// Per-host rate limiting of actions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoopGuardConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Maximum actions per host inside the window.
    #[serde(default = "default_loop_limit")]
    pub limit: u32,

    #[serde(default = "default_loop_window_secs")]
    pub window_secs: u64,
}

impl Default for LoopGuardConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            limit: default_loop_limit(),
            window_secs: default_loop_window_secs(),
        }
    }
}

fn default_loop_limit() -> u32 {
    4
}

fn default_loop_window_secs() -> u64 {
    10
}

/// Hosts on which the engine stays inert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExclusionConfig {
    /// Suffix patterns (`youtube.com`) or single-wildcard globs (`inshorturl.*`).
    #[serde(default = "default_exclusion_patterns")]
    pub patterns: Vec<String>,

    /// Optional newline-delimited pattern list fetched at startup.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_list_url: Option<String>,

    #[serde(default = "default_remote_timeout_secs")]
    pub remote_timeout_secs: u64,
}

impl Default for ExclusionConfig {
    fn default() -> Self {
        Self {
            patterns: default_exclusion_patterns(),
            remote_list_url: None,
            remote_timeout_secs: default_remote_timeout_secs(),
        }
    }
}

fn default_exclusion_patterns() -> Vec<String> {
    [
        "youtube.com",
        "google.com",
        "github.com",
        "wikipedia.org",
        "facebook.com",
        "x.com",
        "inshorturl.*",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_remote_timeout_secs() -> u64 {
    5
}

/// Static denylist of ad and tracking hosts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DenylistConfig {
    #[serde(default = "default_denylist_hosts")]
    pub hosts: Vec<String>,
}

impl Default for DenylistConfig {
    fn default() -> Self {
        Self {
            hosts: default_denylist_hosts(),
        }
    }
}

fn default_denylist_hosts() -> Vec<String> {
    [
        "doubleclick.net",
        "googlesyndication.com",
        "googleadservices.com",
        "adnxs.com",
        "taboola.com",
        "outbrain.com",
        "revcontent.com",
        "popads.net",
        "propellerads.com",
        "adsterra.com",
        "mgid.com",
        "trafficstars.com",
        "pushads.net",
        "popcash.net",
        "hilltopads.net",
        "exoclick.com",
        "juicyads.com",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Session-scoped key-value storage.
///
/// One directory is one session: toggles and loop ledgers persist across
/// runs until the directory is cleared (`unlatch run --new-session`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory for the file-backed store; `~` is expanded.
    #[serde(default = "default_storage_path")]
    pub path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_storage_path(),
        }
    }
}

fn default_storage_path() -> String {
    dirs::home_dir()
        .map(|h| h.join(".unlatch").join("session"))
        .unwrap_or_else(|| std::path::PathBuf::from(".unlatch/session"))
        .to_string_lossy()
        .into_owned()
}

impl EngineConfig {
    pub fn tick_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.tick_interval_ms)
    }

    pub fn mutation_debounce(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.mutation_debounce_ms)
    }

    pub fn click_delay(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.click_delay_ms)
    }

    pub fn style_restore_delay(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.style_restore_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.engine.max_actions, 10);
        assert_eq!(config.engine.detection_threshold, 3);
        assert_eq!(config.engine.cleanup_order, CleanupOrder::AfterDetection);
        assert_eq!(config.loop_guard.limit, 4);
        assert_eq!(config.loop_guard.window_secs, 10);
        assert_eq!(config.detector.weights.countdown, 3);
        assert!(config.exclusion.patterns.contains(&"youtube.com".to_string()));
        assert!(config.denylist.hosts.contains(&"doubleclick.net".to_string()));
    }

    #[test]
    fn test_cleanup_enums_parse_snake_case() {
        let config: Config = toml::from_str(
            r#"
            [engine]
            cleanup_order = "before_detection"
            cleanup_scope = "when_gated"
            "#,
        )
        .unwrap();
        assert_eq!(config.engine.cleanup_order, CleanupOrder::BeforeDetection);
        assert_eq!(config.engine.cleanup_scope, CleanupScope::WhenGated);
    }

    #[test]
    fn test_partial_weights_keep_defaults() {
        let config: Config = toml::from_str(
            r#"
            [detector.weights]
            overlays = 5
            "#,
        )
        .unwrap();
        assert_eq!(config.detector.weights.overlays, 5);
        assert_eq!(config.detector.weights.countdown, 3);
    }

    #[test]
    fn test_durations() {
        let engine = EngineConfig::default();
        assert_eq!(engine.tick_interval(), std::time::Duration::from_secs(1));
        assert_eq!(engine.mutation_debounce().as_millis(), 250);
        assert!(engine.click_delay().is_zero());
    }
}
