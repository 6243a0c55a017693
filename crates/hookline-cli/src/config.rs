use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use hookline_engine::{LoadReport, RuleStore};
use tracing::warn;

const CONFIG_ENV_VAR: &str = "HOOKLINE_CONFIG";
const DEFAULT_CONFIG: &str = "hookline.toml";

/// Resolve the rules file path: explicit flag, then $HOOKLINE_CONFIG, then
/// ./hookline.toml.
pub fn resolve_rules_path(flag: Option<&Path>) -> PathBuf {
    if let Some(path) = flag {
        let expanded = shellexpand::tilde(&path.to_string_lossy()).into_owned();
        return PathBuf::from(expanded);
    }
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        return PathBuf::from(shellexpand::tilde(&path).into_owned());
    }
    PathBuf::from(DEFAULT_CONFIG)
}

/// Load the rules file, logging any rules excluded by validation
pub fn load_rules(path: &Path) -> Result<LoadReport> {
    let report = RuleStore::load(path)
        .with_context(|| format!("failed to load rules from {:?}", path))?;
    if !report.excluded.is_empty() {
        warn!(
            path = ?path,
            excluded = report.excluded.len(),
            "Some rules were excluded by validation; run 'hookline check'"
        );
    }
    Ok(report)
}
