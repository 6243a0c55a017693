use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::warn;

use super::HandlerResult;
use crate::event::{EventContext, HookEvent};
use crate::session_env::SessionEnv;

/// Env variable naming the propagation file handed to SessionStart handlers
pub const ENV_FILE_VAR: &str = "HOOKLINE_ENV_FILE";

/// Kills the handler's whole process group on drop unless disarmed.
///
/// `kill_on_drop` only reaches the direct child; the group takes out any
/// descendants it left behind, whether the deadline elapsed or the caller
/// dropped the dispatch future mid-flight.
#[cfg(unix)]
struct ProcessGroupGuard {
    pgid: Option<i32>,
}

#[cfg(unix)]
impl ProcessGroupGuard {
    fn new(child: &tokio::process::Child) -> Self {
        Self {
            pgid: child.id().map(|pid| pid as i32),
        }
    }

    fn disarm(&mut self) {
        self.pgid = None;
    }
}

#[cfg(unix)]
impl Drop for ProcessGroupGuard {
    fn drop(&mut self) {
        if let Some(pgid) = self.pgid {
            unsafe {
                libc::killpg(pgid, libc::SIGKILL);
            }
        }
    }
}

/// Execute a command handler: serialized event on stdin, session variables
/// merged over the ambient environment, full stdout/stderr capture, and a
/// hard deadline. Spawn failures, signals, and timeouts all fold into the
/// returned `HandlerResult`.
pub async fn run(
    argv: &[String],
    ctx: &EventContext,
    env: &SessionEnv,
    timeout: Duration,
) -> HandlerResult {
    let Some(program) = argv.first() else {
        return HandlerResult::process_error("command handler with empty argv");
    };

    // SessionStart handlers get a file to declare session variables in
    let env_file = if ctx.event == HookEvent::SessionStart {
        match tempfile::NamedTempFile::new() {
            Ok(file) => Some(file),
            Err(e) => {
                warn!(error = %e, "Failed to create session env file");
                None
            }
        }
    } else {
        None
    };

    let mut cmd = Command::new(program);
    cmd.args(&argv[1..])
        .current_dir(&ctx.cwd)
        .envs(env.snapshot())
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    #[cfg(unix)]
    cmd.process_group(0);
    if let Some(file) = &env_file {
        cmd.env(ENV_FILE_VAR, file.path());
    }

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => {
            return HandlerResult::process_error(format!("failed to spawn '{}': {}", program, e))
        }
    };

    if let Some(mut stdin) = child.stdin.take() {
        let doc = serde_json::to_vec(&ctx.stdin_document()).unwrap_or_default();
        // The handler may exit without reading stdin; a broken pipe is fine
        let _ = stdin.write_all(&doc).await;
        let _ = stdin.shutdown().await;
    }

    #[cfg(unix)]
    let mut pgroup = ProcessGroupGuard::new(&child);

    let result = match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(Ok(output)) => {
            #[cfg(unix)]
            pgroup.disarm();
            let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
            let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
            match output.status.code() {
                Some(code) => HandlerResult {
                    exit_code: Some(code),
                    stdout,
                    stderr,
                    ..HandlerResult::default()
                },
                None => HandlerResult {
                    stdout,
                    stderr,
                    process_error: Some("terminated by signal".to_string()),
                    ..HandlerResult::default()
                },
            }
        }
        Ok(Err(e)) => HandlerResult::process_error(format!("failed to collect output: {}", e)),
        // The still-armed guard reaps the process group when it drops
        Err(_elapsed) => HandlerResult::timed_out(),
    };

    if let Some(file) = env_file {
        if !result.failed() {
            if let Err(e) = env.import_file(file.path()) {
                warn!(error = %e, "Failed to import session env file");
            }
        }
    }

    result
}
