use std::path::Path;

use anyhow::Result;

use crate::config;

/// Validate a rules file the way dispatch would load it: report every rule
/// excluded by validation and fail if any were.
pub fn execute(path: &Path) -> Result<()> {
    let report = config::load_rules(path)?;

    println!(
        "{}: {} rule(s) loaded, {} excluded",
        path.display(),
        report.store.len(),
        report.excluded.len()
    );
    for (id, reason) in &report.excluded {
        println!("  excluded {}: {}", id, reason);
    }

    anyhow::ensure!(
        report.excluded.is_empty(),
        "{} rule(s) excluded by validation",
        report.excluded.len()
    );
    Ok(())
}
