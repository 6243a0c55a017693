use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::aggregate::{default_decision, Aggregator};
use crate::backend::CompletionBackend;
use crate::decision::{interpret, Decision, Permission};
use crate::event::EventContext;
use crate::handler::run_handler;
use crate::rules::RuleStore;
use crate::session_env::SessionEnv;

/// Entry point of the engine: one call per lifecycle event.
///
/// Rules for an event run strictly sequentially in configuration order;
/// a failed handler is absorbed fail-open and folding continues. The only
/// early exits are a deny short-circuit and an explicit
/// `continue_chain = false`. No error crosses this boundary: the host
/// always gets a well-formed decision.
pub struct Dispatcher {
    rules: Arc<RuleStore>,
    env: Arc<SessionEnv>,
    backend: Arc<dyn CompletionBackend>,
    verbose: bool,
}

impl Dispatcher {
    pub fn new(
        rules: Arc<RuleStore>,
        env: Arc<SessionEnv>,
        backend: Arc<dyn CompletionBackend>,
    ) -> Self {
        Self {
            rules,
            env,
            backend,
            verbose: false,
        }
    }

    /// Surface handler-failure reasons in decisions (they are always logged)
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Session environment shared by every dispatch in this session
    pub fn session_env(&self) -> &SessionEnv {
        &self.env
    }

    /// Ordered rule ids that would run for this event, without executing
    /// anything (dry-run support for the host).
    pub fn matched_rule_ids(&self, event: &EventContext) -> Vec<String> {
        self.rules
            .matching(event.event, event.action_name.as_deref())
            .iter()
            .map(|r| r.id.clone())
            .collect()
    }

    pub async fn dispatch(&self, event: EventContext) -> Decision {
        let matched = self
            .rules
            .matching(event.event, event.action_name.as_deref());
        if matched.is_empty() {
            debug!(event = event.event.as_str(), "No matching hook rules");
            return default_decision(event.event);
        }

        let mut ctx = event;
        let mut agg = Aggregator::new(ctx.event);
        for rule in matched {
            let started = Instant::now();
            let result = run_handler(rule, &ctx, &self.env, self.backend.as_ref()).await;
            let failed = result.failed();
            let mut decision = interpret(rule.handler.kind(), &result);

            if failed {
                warn!(
                    rule = %rule.id,
                    cause = decision.reason.as_deref().unwrap_or("unknown"),
                    "Hook handler failed"
                );
                // A failure must never look like an approval or denial;
                // its reason stays in the logs unless diagnostics are on
                if !self.verbose {
                    decision.reason = None;
                }
            }

            info!(
                rule = %rule.id,
                event = ctx.event.as_str(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                permission = ?decision.permission,
                "Hook handler finished"
            );

            // Later handlers in the chain see the replaced action arguments
            if decision.permission == Permission::Allow {
                if let Some(updated) = &decision.updated_payload {
                    ctx.set_tool_input(updated.clone());
                }
            }

            if !agg.absorb(decision) {
                break;
            }
        }
        agg.finish()
    }
}
