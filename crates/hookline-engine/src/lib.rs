pub mod aggregate;
pub mod backend;
pub mod decision;
pub mod dispatcher;
pub mod event;
pub mod handler;
pub mod matcher;
pub mod rules;
pub mod session_env;

pub use aggregate::{default_decision, Aggregator};
pub use backend::{AnthropicBackend, CompletionBackend, NullBackend};
pub use decision::{interpret, Decision, Permission};
pub use dispatcher::Dispatcher;
pub use event::{EventContext, HookEvent};
pub use handler::{HandlerKind, HandlerResult};
pub use matcher::Matcher;
pub use rules::{HandlerSpec, HookRule, LoadReport, ResponseSchema, RuleStore};
pub use session_env::SessionEnv;

/// Initialize structured JSON logging
pub fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    fmt()
        .json()
        .with_env_filter(EnvFilter::from_default_env())
        .init();
}
