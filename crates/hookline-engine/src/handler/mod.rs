pub mod command;
pub mod prompt;

use serde_json::Value;

use crate::backend::CompletionBackend;
use crate::event::EventContext;
use crate::rules::{HandlerSpec, HookRule};
use crate::session_env::SessionEnv;

/// Handler execution strategy, used by the interpreter to pick a mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerKind {
    Command,
    Prompt,
}

impl HandlerSpec {
    pub fn kind(&self) -> HandlerKind {
        match self {
            HandlerSpec::Command { .. } => HandlerKind::Command,
            HandlerSpec::Prompt { .. } => HandlerKind::Prompt,
        }
    }
}

/// Raw outcome of one handler invocation. Every failure mode lands here;
/// handlers never return errors to the dispatcher.
#[derive(Debug, Default)]
pub struct HandlerResult {
    /// Command handlers only; None when the process died to a signal
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    /// Prompt handlers: the validated JSON response
    pub parsed_json: Option<Value>,
    pub timed_out: bool,
    pub process_error: Option<String>,
}

impl HandlerResult {
    pub fn process_error(cause: impl Into<String>) -> Self {
        Self {
            process_error: Some(cause.into()),
            ..Self::default()
        }
    }

    pub fn timed_out() -> Self {
        Self {
            timed_out: true,
            ..Self::default()
        }
    }

    pub fn failed(&self) -> bool {
        self.timed_out || self.process_error.is_some()
    }
}

/// Run a rule's handler, whichever kind it is
pub async fn run_handler(
    rule: &HookRule,
    ctx: &EventContext,
    env: &SessionEnv,
    backend: &dyn CompletionBackend,
) -> HandlerResult {
    match &rule.handler {
        HandlerSpec::Command { argv } => command::run(argv, ctx, env, rule.timeout).await,
        HandlerSpec::Prompt {
            instruction,
            schema,
        } => prompt::run(instruction, schema, ctx, backend, rule.timeout).await,
    }
}
