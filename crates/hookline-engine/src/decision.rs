use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::handler::{HandlerKind, HandlerResult};

/// Reasons surfaced to the host are bounded
const MAX_REASON_LEN: usize = 500;

/// Canonical permission outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    Allow,
    Deny,
    Ask,
    Unspecified,
}

/// Canonical, handler-kind-agnostic outcome of one handler (or of a whole
/// event once aggregated). Never persisted beyond the dispatch call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Decision {
    pub permission: Permission,
    pub blocking: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_payload: Option<Value>,
    pub continue_chain: bool,
    /// Advisory context a handler handed back for the host (SessionStart
    /// handlers use this to seed the conversation)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

impl Decision {
    pub fn unspecified() -> Self {
        Self {
            permission: Permission::Unspecified,
            blocking: false,
            reason: None,
            updated_payload: None,
            continue_chain: true,
            context: None,
        }
    }

    pub fn allow() -> Self {
        Self {
            permission: Permission::Allow,
            ..Self::unspecified()
        }
    }

    pub fn deny(reason: Option<String>) -> Self {
        Self {
            permission: Permission::Deny,
            blocking: true,
            reason,
            ..Self::unspecified()
        }
    }
}

fn truncate_reason(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.chars().count() <= MAX_REASON_LEN {
        Some(trimmed.to_string())
    } else {
        Some(trimmed.chars().take(MAX_REASON_LEN).collect())
    }
}

fn map_permission(value: &str) -> Permission {
    match value {
        "allow" | "approve" => Permission::Allow,
        "deny" | "block" => Permission::Deny,
        "ask" => Permission::Ask,
        // "continue" and anything unrecognized carry no permission
        _ => Permission::Unspecified,
    }
}

/// Build a decision from a handler's JSON output (command stdout or prompt
/// response): `decision`/`reason`/`continue` plus the command-only
/// `hookSpecificOutput` refinements.
fn decision_from_json(json: &Value) -> Decision {
    let specific = &json["hookSpecificOutput"];
    let stated = json["decision"]
        .as_str()
        .or_else(|| specific["permissionDecision"].as_str());
    let permission = stated.map(map_permission).unwrap_or(Permission::Unspecified);

    let mut decision = Decision::unspecified();
    decision.permission = permission;
    decision.blocking = permission == Permission::Deny;
    decision.reason = json["reason"].as_str().and_then(truncate_reason);
    decision.continue_chain = json["continue"].as_bool().unwrap_or(true);
    if permission == Permission::Allow {
        if let Some(updated) = specific.get("updatedInput") {
            decision.updated_payload = Some(updated.clone());
        }
    }
    if let Some(context) = specific["additionalContext"].as_str() {
        decision.context = Some(context.to_string());
    }
    decision
}

/// Normalize a raw handler result into a canonical decision.
///
/// Fail-open discipline: timeouts and process errors always map to a
/// non-blocking unspecified decision; exit code 2 is the only command path
/// to a blocking deny and overrides any stdout JSON.
pub fn interpret(kind: HandlerKind, result: &HandlerResult) -> Decision {
    if result.failed() {
        let cause = if result.timed_out {
            "timed out"
        } else {
            result.process_error.as_deref().unwrap_or("unknown error")
        };
        let mut decision = Decision::unspecified();
        decision.reason = Some(format!("handler failed: {}", cause));
        return decision;
    }

    match kind {
        HandlerKind::Command => match result.exit_code {
            Some(2) => Decision::deny(truncate_reason(&result.stderr)),
            Some(0) => match serde_json::from_str::<Value>(result.stdout.trim()) {
                Ok(json) if json.is_object() => decision_from_json(&json),
                _ => Decision::unspecified(),
            },
            // Non-blocking warning; stderr surfaced as advisory text
            _ => {
                let mut decision = Decision::unspecified();
                decision.reason = truncate_reason(&result.stderr);
                decision
            }
        },
        HandlerKind::Prompt => match &result.parsed_json {
            Some(json) => decision_from_json(json),
            // The prompt handler validates before handing over; reaching
            // here means it produced nothing usable
            None => {
                let mut decision = Decision::unspecified();
                decision.reason = Some("handler failed: empty completion".to_string());
                decision
            }
        },
    }
}
