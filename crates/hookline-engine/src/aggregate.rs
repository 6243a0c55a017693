use serde_json::Value;

use crate::decision::{Decision, Permission};
use crate::event::HookEvent;

/// Decision returned when no rule matched or every handler stayed silent:
/// permission-type events default to an explicit allow, everything else to
/// unspecified.
pub fn default_decision(event: HookEvent) -> Decision {
    if event.is_permission_event() {
        Decision::allow()
    } else {
        Decision::unspecified()
    }
}

/// Incremental fold over per-rule decisions in configuration order.
///
/// Short-circuit rules: the first deny wins immediately; any decision with
/// `continue_chain == false` becomes terminal; the first ask is retained as
/// the provisional result while later rules still run. Among allow
/// decisions, the last non-empty updated payload wins. Reasons carried by
/// decisions that do not become terminal (advisory warnings, handler
/// failures) are accumulated and attached to the terminal decision when it
/// has no reason of its own.
#[derive(Debug)]
pub struct Aggregator {
    event: HookEvent,
    terminal: Option<Decision>,
    ask_retained: bool,
    done: bool,
    updated_payload: Option<Value>,
    contexts: Vec<String>,
    advisories: Vec<String>,
}

impl Aggregator {
    pub fn new(event: HookEvent) -> Self {
        Self {
            event,
            terminal: None,
            ask_retained: false,
            done: false,
            updated_payload: None,
            contexts: Vec::new(),
            advisories: Vec::new(),
        }
    }

    /// Fold one decision; returns false once the chain must stop
    pub fn absorb(&mut self, decision: Decision) -> bool {
        if self.done {
            return false;
        }
        if let Some(context) = &decision.context {
            self.contexts.push(context.clone());
        }

        if decision.permission == Permission::Deny {
            self.terminal = Some(decision);
            self.done = true;
            return false;
        }
        if !decision.continue_chain {
            self.terminal = Some(decision);
            self.done = true;
            return false;
        }
        match decision.permission {
            Permission::Ask if !self.ask_retained => {
                self.ask_retained = true;
                self.terminal = Some(decision);
            }
            Permission::Allow => {
                if let Some(payload) = decision.updated_payload {
                    self.updated_payload = Some(payload);
                }
                if let Some(reason) = decision.reason {
                    self.advisories.push(reason);
                }
            }
            _ => {
                if let Some(reason) = decision.reason {
                    self.advisories.push(reason);
                }
            }
        }
        true
    }

    /// Terminal decision for the event
    pub fn finish(self) -> Decision {
        let mut terminal = self
            .terminal
            .unwrap_or_else(|| default_decision(self.event));
        if terminal.permission == Permission::Allow && terminal.updated_payload.is_none() {
            terminal.updated_payload = self.updated_payload;
        }
        if terminal.reason.is_none() && !self.advisories.is_empty() {
            terminal.reason = Some(self.advisories.join("\n"));
        }
        if !self.contexts.is_empty() {
            terminal.context = Some(self.contexts.join("\n"));
        }
        terminal
    }
}

/// Fold a complete ordered decision list (the incremental `Aggregator` is
/// what the dispatcher drives; this is the one-shot form).
pub fn aggregate(event: HookEvent, decisions: Vec<Decision>) -> Decision {
    let mut agg = Aggregator::new(event);
    for decision in decisions {
        if !agg.absorb(decision) {
            break;
        }
    }
    agg.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn allow_with_payload(payload: Value) -> Decision {
        let mut d = Decision::allow();
        d.updated_payload = Some(payload);
        d
    }

    fn ask(reason: &str) -> Decision {
        let mut d = Decision::unspecified();
        d.permission = Permission::Ask;
        d.reason = Some(reason.to_string());
        d
    }

    #[test]
    fn test_defaults_by_event_kind() {
        assert_eq!(
            default_decision(HookEvent::PreAction).permission,
            Permission::Allow
        );
        assert_eq!(
            default_decision(HookEvent::PermissionRequest).permission,
            Permission::Allow
        );
        assert_eq!(
            default_decision(HookEvent::PostAction).permission,
            Permission::Unspecified
        );
    }

    #[test]
    fn test_empty_chain_returns_default() {
        let terminal = aggregate(HookEvent::PreAction, vec![]);
        assert_eq!(terminal.permission, Permission::Allow);
        assert!(!terminal.blocking);
    }

    #[test]
    fn test_all_unspecified_returns_default() {
        let terminal = aggregate(
            HookEvent::Notification,
            vec![Decision::unspecified(), Decision::unspecified()],
        );
        assert_eq!(terminal.permission, Permission::Unspecified);
    }

    #[test]
    fn test_first_deny_wins() {
        let terminal = aggregate(
            HookEvent::PreAction,
            vec![
                Decision::allow(),
                Decision::deny(Some("no".into())),
                Decision::allow(),
            ],
        );
        assert_eq!(terminal.permission, Permission::Deny);
        assert!(terminal.blocking);
        assert_eq!(terminal.reason.as_deref(), Some("no"));
    }

    #[test]
    fn test_deny_stops_the_fold() {
        let mut agg = Aggregator::new(HookEvent::PreAction);
        assert!(agg.absorb(Decision::allow()));
        assert!(!agg.absorb(Decision::deny(None)));
        assert!(!agg.absorb(Decision::allow()));
    }

    #[test]
    fn test_ask_retained_while_chain_continues() {
        let mut agg = Aggregator::new(HookEvent::PreAction);
        assert!(agg.absorb(ask("confirm?")));
        assert!(agg.absorb(Decision::allow()));
        let terminal = agg.finish();
        assert_eq!(terminal.permission, Permission::Ask);
        assert_eq!(terminal.reason.as_deref(), Some("confirm?"));
    }

    #[test]
    fn test_later_deny_overrides_retained_ask() {
        let terminal = aggregate(
            HookEvent::PreAction,
            vec![ask("confirm?"), Decision::deny(Some("blocked".into()))],
        );
        assert_eq!(terminal.permission, Permission::Deny);
    }

    #[test]
    fn test_continue_false_is_terminal() {
        let mut stop = Decision::allow();
        stop.continue_chain = false;
        let mut agg = Aggregator::new(HookEvent::PreAction);
        assert!(!agg.absorb(stop));
        let terminal = agg.finish();
        assert_eq!(terminal.permission, Permission::Allow);
        assert!(!terminal.continue_chain);
    }

    #[test]
    fn test_last_allow_payload_wins() {
        let terminal = aggregate(
            HookEvent::PreAction,
            vec![
                allow_with_payload(json!({"command": "first"})),
                allow_with_payload(json!({"command": "second"})),
                Decision::allow(),
            ],
        );
        assert_eq!(terminal.permission, Permission::Allow);
        assert_eq!(terminal.updated_payload.unwrap()["command"], "second");
    }

    #[test]
    fn test_payload_dropped_when_terminal_is_ask() {
        let terminal = aggregate(
            HookEvent::PreAction,
            vec![allow_with_payload(json!({"command": "x"})), ask("sure?")],
        );
        assert_eq!(terminal.permission, Permission::Ask);
        assert!(terminal.updated_payload.is_none());
    }

    #[test]
    fn test_advisory_reason_reaches_default_terminal() {
        let mut advisory = Decision::unspecified();
        advisory.reason = Some("handler failed: bad response".into());
        let terminal = aggregate(HookEvent::Notification, vec![advisory]);
        assert_eq!(terminal.permission, Permission::Unspecified);
        assert!(!terminal.blocking);
        assert_eq!(
            terminal.reason.as_deref(),
            Some("handler failed: bad response")
        );
    }

    #[test]
    fn test_terminal_reason_wins_over_advisories() {
        let mut advisory = Decision::unspecified();
        advisory.reason = Some("style warning".into());
        let terminal = aggregate(
            HookEvent::PreAction,
            vec![advisory, Decision::deny(Some("blocked".into()))],
        );
        assert_eq!(terminal.reason.as_deref(), Some("blocked"));
    }

    #[test]
    fn test_allow_reason_accumulates_as_advisory() {
        let mut noisy = Decision::allow();
        noisy.reason = Some("lint: trailing whitespace".into());
        let terminal = aggregate(HookEvent::PostAction, vec![noisy, Decision::unspecified()]);
        assert_eq!(terminal.reason.as_deref(), Some("lint: trailing whitespace"));
    }

    #[test]
    fn test_contexts_accumulate() {
        let mut a = Decision::unspecified();
        a.context = Some("one".into());
        let mut b = Decision::unspecified();
        b.context = Some("two".into());
        let terminal = aggregate(HookEvent::SessionStart, vec![a, b]);
        assert_eq!(terminal.context.as_deref(), Some("one\ntwo"));
    }
}
