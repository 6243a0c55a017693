use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use hookline_engine::{
    AnthropicBackend, CompletionBackend, Dispatcher, EventContext, HookEvent, NullBackend,
    Permission, SessionEnv,
};
use tracing::{info, warn};

use crate::config;

/// Dispatch one event and print the terminal decision. Returns the process
/// exit code: 2 for a deny, 0 otherwise.
pub async fn execute(
    rules_path: &Path,
    event_file: Option<PathBuf>,
    dry_run: bool,
    verbose: bool,
) -> Result<i32> {
    let report = config::load_rules(rules_path)?;

    let raw = match event_file {
        Some(path) => std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read event file {:?}", path))?,
        None => {
            let mut buffer = String::new();
            std::io::stdin()
                .read_to_string(&mut buffer)
                .context("failed to read event from stdin")?;
            buffer
        }
    };
    let event: EventContext = serde_json::from_str(&raw).context("failed to parse event JSON")?;

    // Session variables live across independently spawned dispatches via a
    // per-session file in the temp dir
    let env = Arc::new(SessionEnv::new());
    let env_path = session_env_path(&event.session_id);
    if env_path.exists() {
        if let Err(e) = env.import_file(&env_path) {
            warn!(error = %e, "Failed to restore session environment");
        }
    }

    let backend: Arc<dyn CompletionBackend> = match std::env::var("ANTHROPIC_API_KEY") {
        Ok(key) if !key.is_empty() => Arc::new(AnthropicBackend::new(&key)?),
        _ => Arc::new(NullBackend),
    };

    let dispatcher =
        Dispatcher::new(Arc::new(report.store), env.clone(), backend).with_verbose(verbose);

    if dry_run {
        let ids = dispatcher.matched_rule_ids(&event);
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({ "matched_rules": ids }))?
        );
        return Ok(0);
    }

    let event_kind = event.event;
    info!(event = event_kind.as_str(), session = %event.session_id, "Dispatching event");
    let decision = dispatcher.dispatch(event).await;

    match event_kind {
        HookEvent::SessionStart => persist_session_env(&env, &env_path)?,
        HookEvent::SessionEnd => {
            let _ = std::fs::remove_file(&env_path);
        }
        _ => {}
    }

    println!("{}", serde_json::to_string_pretty(&decision)?);
    Ok(if decision.permission == Permission::Deny {
        2
    } else {
        0
    })
}

fn session_env_path(session_id: &str) -> PathBuf {
    let safe: String = session_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '-'
            }
        })
        .collect();
    std::env::temp_dir().join(format!("hookline-{}.env", safe))
}

fn persist_session_env(env: &SessionEnv, path: &Path) -> Result<()> {
    let snapshot = env.snapshot();
    if snapshot.is_empty() {
        return Ok(());
    }
    let mut lines: Vec<String> = snapshot
        .into_iter()
        .map(|(key, value)| format!("{}={}", key, value))
        .collect();
    lines.sort();
    std::fs::write(path, lines.join("\n") + "\n")
        .with_context(|| format!("failed to persist session environment to {:?}", path))?;
    Ok(())
}
