//! Configuration validation.

use crate::error::ConfigError;
use crate::schema::Config;

/// Validation result.
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: ValidationWarning) {
        self.warnings.push(warning);
    }

    /// Collapse into the first error, if any.
    pub fn into_result(self) -> Result<Vec<ValidationWarning>, ConfigError> {
        match self.errors.into_iter().next() {
            Some(e) => Err(ConfigError::InvalidValue {
                field: e.path,
                message: e.message,
            }),
            None => Ok(self.warnings),
        }
    }
}

/// A validation error.
#[derive(Debug)]
pub struct ValidationError {
    pub path: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// A validation warning.
#[derive(Debug)]
pub struct ValidationWarning {
    pub path: String,
    pub message: String,
}

impl ValidationWarning {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Configuration validator.
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration.
    pub fn validate(config: &Config) -> Result<ValidationResult, ConfigError> {
        let mut result = ValidationResult::default();

        Self::validate_engine(config, &mut result);
        Self::validate_loop_guard(config, &mut result);
        Self::validate_exclusion(config, &mut result);
        Self::validate_denylist(config, &mut result);

        Ok(result)
    }

    fn validate_engine(config: &Config, result: &mut ValidationResult) {
        let engine = &config.engine;

        if engine.max_actions == 0 {
            result.add_error(ValidationError::new(
                "engine.max_actions",
                "max_actions must be greater than 0",
            ));
        } else if engine.max_actions > 100 {
            result.add_warning(ValidationWarning::new(
                "engine.max_actions",
                "max_actions is very high, runaway clicking is likely",
            ));
        }

        if engine.detection_threshold == 0 {
            result.add_error(ValidationError::new(
                "engine.detection_threshold",
                "detection_threshold must be greater than 0",
            ));
        }

        if engine.tick_interval_ms == 0 {
            result.add_error(ValidationError::new(
                "engine.tick_interval_ms",
                "tick_interval_ms must be greater than 0",
            ));
        } else if engine.tick_interval_ms < 100 {
            result.add_warning(ValidationWarning::new(
                "engine.tick_interval_ms",
                "tick_interval_ms below 100 re-evaluates the page very often",
            ));
        }

        if engine.click_delay_ms > 10_000 {
            result.add_warning(ValidationWarning::new(
                "engine.click_delay_ms",
                "click_delay_ms above 10 seconds stalls helper clicks while pending",
            ));
        }

        if engine.max_candidate_text_len == 0 {
            result.add_error(ValidationError::new(
                "engine.max_candidate_text_len",
                "max_candidate_text_len must be greater than 0",
            ));
        }
    }

    fn validate_loop_guard(config: &Config, result: &mut ValidationResult) {
        let guard = &config.loop_guard;

        if guard.limit == 0 {
            result.add_error(ValidationError::new(
                "loop_guard.limit",
                "limit must be greater than 0",
            ));
        }

        if guard.window_secs == 0 {
            result.add_error(ValidationError::new(
                "loop_guard.window_secs",
                "window_secs must be greater than 0",
            ));
        }
    }

    fn validate_exclusion(config: &Config, result: &mut ValidationResult) {
        let exclusion = &config.exclusion;

        for (i, pattern) in exclusion.patterns.iter().enumerate() {
            if let Some(message) = Self::check_host_pattern(pattern) {
                result.add_error(ValidationError::new(
                    format!("exclusion.patterns[{}]", i),
                    message,
                ));
            }
        }

        if let Some(url) = &exclusion.remote_list_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                result.add_error(ValidationError::new(
                    "exclusion.remote_list_url",
                    "remote_list_url must start with http:// or https://",
                ));
            }
        }

        if exclusion.remote_timeout_secs == 0 {
            result.add_error(ValidationError::new(
                "exclusion.remote_timeout_secs",
                "remote_timeout_secs must be greater than 0",
            ));
        }
    }

    fn validate_denylist(config: &Config, result: &mut ValidationResult) {
        for (i, host) in config.denylist.hosts.iter().enumerate() {
            if host.trim().is_empty() || host.contains('*') || host.contains('/') {
                result.add_error(ValidationError::new(
                    format!("denylist.hosts[{}]", i),
                    format!("'{}' is not a plain host name", host),
                ));
            }
        }
    }

    /// Exclusion patterns are host suffixes or globs with a single `*`.
    fn check_host_pattern(pattern: &str) -> Option<String> {
        let trimmed = pattern.trim();
        if trimmed.is_empty() {
            return Some("pattern must not be empty".to_string());
        }
        if trimmed.chars().any(|c| c.is_whitespace() || c == '/' || c == ':') {
            return Some(format!("'{}' must be a bare host pattern", pattern));
        }
        if trimmed.matches('*').count() > 1 {
            return Some(format!("'{}' may contain at most one '*'", pattern));
        }
        None
    }
}

#[cfg(test)]
#[path = "validator_tests.rs"]
mod tests;
