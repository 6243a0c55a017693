use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Lifecycle points at which the host consults hook rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HookEvent {
    PreAction,
    PostAction,
    SessionStart,
    SessionEnd,
    UserInput,
    Notification,
    PreCompact,
    SubagentStop,
    Stop,
    PermissionRequest,
}

impl HookEvent {
    /// Events whose default decision is an explicit allow
    pub fn is_permission_event(self) -> bool {
        matches!(self, HookEvent::PreAction | HookEvent::PermissionRequest)
    }

    /// Wire name used in the stdin document's `hook_event_name` field
    pub fn as_str(self) -> &'static str {
        match self {
            HookEvent::PreAction => "PreAction",
            HookEvent::PostAction => "PostAction",
            HookEvent::SessionStart => "SessionStart",
            HookEvent::SessionEnd => "SessionEnd",
            HookEvent::UserInput => "UserInput",
            HookEvent::Notification => "Notification",
            HookEvent::PreCompact => "PreCompact",
            HookEvent::SubagentStop => "SubagentStop",
            HookEvent::Stop => "Stop",
            HookEvent::PermissionRequest => "PermissionRequest",
        }
    }
}

impl FromStr for HookEvent {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let event = match s {
            "PreAction" => HookEvent::PreAction,
            "PostAction" => HookEvent::PostAction,
            "SessionStart" => HookEvent::SessionStart,
            "SessionEnd" => HookEvent::SessionEnd,
            "UserInput" => HookEvent::UserInput,
            "Notification" => HookEvent::Notification,
            "PreCompact" => HookEvent::PreCompact,
            "SubagentStop" => HookEvent::SubagentStop,
            "Stop" => HookEvent::Stop,
            "PermissionRequest" => HookEvent::PermissionRequest,
            other => anyhow::bail!("unknown hook event '{}'", other),
        };
        Ok(event)
    }
}

/// One lifecycle notification from the host.
///
/// Constructed immediately before dispatch and discarded once the terminal
/// decision is returned. The dispatcher threads an updated `tool_input`
/// through the payload between handlers; everything else stays fixed for the
/// lifetime of the event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventContext {
    #[serde(rename = "hook_event_name", with = "event_name_wire")]
    pub event: HookEvent,
    pub session_id: String,
    pub cwd: PathBuf,
    #[serde(default = "default_permission_mode")]
    pub permission_mode: String,
    #[serde(rename = "tool_name", skip_serializing_if = "Option::is_none")]
    pub action_name: Option<String>,
    /// Event-specific fields: `tool_input`, `tool_response`, `prompt`,
    /// `message`, etc.
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl EventContext {
    pub fn new(event: HookEvent, session_id: impl Into<String>, cwd: impl Into<PathBuf>) -> Self {
        Self {
            event,
            session_id: session_id.into(),
            cwd: cwd.into(),
            permission_mode: "default".to_string(),
            action_name: None,
            payload: Map::new(),
        }
    }

    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action_name = Some(action.into());
        self
    }

    pub fn with_payload_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.payload.insert(key.into(), value);
        self
    }

    /// JSON document written to a command handler's stdin
    pub fn stdin_document(&self) -> Value {
        let mut doc = Map::new();
        doc.insert("session_id".into(), Value::String(self.session_id.clone()));
        doc.insert(
            "hook_event_name".into(),
            Value::String(self.event.as_str().to_string()),
        );
        if let Some(action) = &self.action_name {
            doc.insert("tool_name".into(), Value::String(action.clone()));
        }
        doc.insert(
            "cwd".into(),
            Value::String(self.cwd.to_string_lossy().into_owned()),
        );
        doc.insert(
            "permission_mode".into(),
            Value::String(self.permission_mode.clone()),
        );
        for (key, value) in &self.payload {
            doc.insert(key.clone(), value.clone());
        }
        Value::Object(doc)
    }

    /// Replace the event's action arguments for the rest of the chain
    pub fn set_tool_input(&mut self, input: Value) {
        self.payload.insert("tool_input".into(), input);
    }
}

fn default_permission_mode() -> String {
    "default".to_string()
}

mod event_name_wire {
    use super::HookEvent;
    use serde::{Deserialize, Deserializer, Serializer};
    use std::str::FromStr;

    pub fn serialize<S: Serializer>(event: &HookEvent, ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_str(event.as_str())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<HookEvent, D::Error> {
        let name = String::deserialize(de)?;
        HookEvent::from_str(&name).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_stdin_document_shape() {
        let ctx = EventContext::new(HookEvent::PreAction, "sess-1", "/work")
            .with_action("Bash")
            .with_payload_field("tool_input", json!({"command": "ls"}));

        let doc = ctx.stdin_document();
        assert_eq!(doc["session_id"], "sess-1");
        assert_eq!(doc["hook_event_name"], "PreAction");
        assert_eq!(doc["tool_name"], "Bash");
        assert_eq!(doc["cwd"], "/work");
        assert_eq!(doc["permission_mode"], "default");
        assert_eq!(doc["tool_input"]["command"], "ls");
    }

    #[test]
    fn test_stdin_document_omits_absent_action() {
        let ctx = EventContext::new(HookEvent::Notification, "sess-1", "/work")
            .with_payload_field("message", json!("waiting for input"));

        let doc = ctx.stdin_document();
        assert!(doc.get("tool_name").is_none());
        assert_eq!(doc["message"], "waiting for input");
    }

    #[test]
    fn test_event_context_round_trips_host_json() {
        let raw = json!({
            "hook_event_name": "PostAction",
            "session_id": "abc",
            "cwd": "/tmp/project",
            "permission_mode": "plan",
            "tool_name": "Write",
            "tool_input": {"file_path": "/tmp/x"},
            "tool_response": {"success": true}
        });

        let ctx: EventContext = serde_json::from_value(raw).unwrap();
        assert_eq!(ctx.event, HookEvent::PostAction);
        assert_eq!(ctx.action_name.as_deref(), Some("Write"));
        assert_eq!(ctx.payload["tool_response"]["success"], true);
    }

    #[test]
    fn test_missing_permission_mode_defaults() {
        let raw = json!({
            "hook_event_name": "UserInput",
            "session_id": "abc",
            "cwd": "/tmp/project"
        });

        let ctx: EventContext = serde_json::from_value(raw).unwrap();
        assert_eq!(ctx.permission_mode, "default");
    }

    #[test]
    fn test_unknown_event_name_rejected() {
        assert!("NotAnEvent".parse::<HookEvent>().is_err());
    }

    #[test]
    fn test_permission_events() {
        assert!(HookEvent::PreAction.is_permission_event());
        assert!(HookEvent::PermissionRequest.is_permission_event());
        assert!(!HookEvent::PostAction.is_permission_event());
        assert!(!HookEvent::SessionStart.is_permission_event());
    }
}
