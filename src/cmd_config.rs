//! Host and configuration subcommand handlers.

use std::path::Path;
use std::sync::Arc;

use unlatch_config::{Config, ConfigLoader, ConfigValidator};
use unlatch_engine::{Engine, MemoryStore, RequestDenylist};

/// Print whether `host` is excluded from the engine and whether requests to
/// it would be denylisted.
pub(crate) async fn handle_check_host_command(
    config: Config,
    host: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let denylist = RequestDenylist::new(&config.denylist.hosts);
    let engine = Engine::from_config(config, Arc::new(MemoryStore::new())).await;
    let host = host.trim().to_ascii_lowercase();

    match engine.excluded_by(&host) {
        Some(pattern) => println!("{}: excluded (pattern '{}')", host, pattern.as_str()),
        None => println!("{}: engine runs", host),
    }
    if denylist.is_blocked_host(&host) {
        println!("{}: requests denylisted", host);
    }
    Ok(())
}

/// Load and validate a configuration file, printing every finding.
pub(crate) fn handle_validate_config_command(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let config = ConfigLoader::load(path)?;
    let result = ConfigValidator::validate(&config)?;

    for warning in &result.warnings {
        println!("warning: {}: {}", warning.path, warning.message);
    }
    for error in &result.errors {
        println!("error: {}: {}", error.path, error.message);
    }

    if result.is_valid() {
        println!("{}: valid", path.display());
        Ok(())
    } else {
        Err(format!("{}: {} error(s)", path.display(), result.errors.len()).into())
    }
}
