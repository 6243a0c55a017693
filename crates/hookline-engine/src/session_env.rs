use std::collections::HashMap;
use std::path::Path;
use std::sync::RwLock;

use anyhow::{Context, Result};
use tracing::{debug, warn};

/// Session-scoped key/value store propagated into handler environments.
///
/// Written only while a SessionStart event is being handled (the dispatcher
/// enforces the window); every later handler in the same session receives a
/// snapshot merged over its ambient environment. A later write to an existing
/// key overwrites it for subsequent snapshots but never affects processes
/// already spawned. Concurrent dispatches share the read path only.
#[derive(Debug, Default)]
pub struct SessionEnv {
    vars: RwLock<HashMap<String, String>>,
}

/// Env variable names must be non-empty, start with a letter or underscore,
/// and contain only alphanumerics and underscores.
fn valid_key(key: &str) -> bool {
    let mut chars = key.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl SessionEnv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one startup variable. Append-only within the session; a repeat
    /// key overwrites.
    pub fn record(&self, key: &str, value: &str) -> Result<()> {
        anyhow::ensure!(valid_key(key), "invalid environment key '{}'", key);
        self.vars
            .write()
            .expect("session env lock poisoned")
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    /// Parse a `KEY=VALUE` propagation file written by a SessionStart
    /// handler. Blank lines and `#` comments are skipped; malformed lines
    /// are logged and ignored, never fatal.
    pub fn import_file(&self, path: &Path) -> Result<usize> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read env file {:?}", path))?;
        Ok(self.import_lines(&content))
    }

    pub fn import_lines(&self, content: &str) -> usize {
        let mut imported = 0;
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            match line.split_once('=') {
                Some((key, value)) if valid_key(key.trim()) => {
                    let key = key.trim();
                    debug!(key, "Imported session variable");
                    self.vars
                        .write()
                        .expect("session env lock poisoned")
                        .insert(key.to_string(), value.to_string());
                    imported += 1;
                }
                _ => {
                    warn!(line, "Skipping malformed session env line");
                }
            }
        }
        imported
    }

    /// Snapshot for building a child process environment
    pub fn snapshot(&self) -> HashMap<String, String> {
        self.vars
            .read()
            .expect("session env lock poisoned")
            .clone()
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.vars
            .read()
            .expect("session env lock poisoned")
            .get(key)
            .cloned()
    }

    pub fn is_empty(&self) -> bool {
        self.vars
            .read()
            .expect("session env lock poisoned")
            .is_empty()
    }
}
