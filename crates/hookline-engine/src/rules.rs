use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::warn;

use crate::event::HookEvent;
use crate::matcher::Matcher;

/// Default timeout for command handlers
const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 60;
/// Default timeout for prompt handlers
const DEFAULT_PROMPT_TIMEOUT_SECS: u64 = 30;

/// Expected-schema descriptor for a prompt handler's JSON response.
///
/// `required` lists the fields a response must carry to be usable; `reason`
/// and `continue` fall back to interpreter defaults when absent.
#[derive(Debug, Clone)]
pub struct ResponseSchema {
    pub required: Vec<String>,
}

impl Default for ResponseSchema {
    fn default() -> Self {
        Self {
            required: vec!["decision".to_string()],
        }
    }
}

/// How a rule's handler executes
#[derive(Debug, Clone)]
pub enum HandlerSpec {
    /// Subprocess fed the serialized event on stdin
    Command { argv: Vec<String> },
    /// LLM completion constrained to a JSON response
    Prompt {
        instruction: String,
        schema: ResponseSchema,
    },
}

/// One operator-configured rule, immutable after load
#[derive(Debug, Clone)]
pub struct HookRule {
    pub id: String,
    pub event: HookEvent,
    pub matcher: Matcher,
    pub handler: HandlerSpec,
    pub timeout: Duration,
}

/// Raw configuration entry as written in the rules TOML file
#[derive(Debug, Deserialize)]
struct RawRule {
    id: Option<String>,
    event: String,
    #[serde(default)]
    matcher: String,
    kind: String,
    #[serde(default)]
    command: Vec<String>,
    instruction: Option<String>,
    #[serde(default)]
    required_fields: Vec<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RulesFile {
    #[serde(default)]
    rules: Vec<RawRule>,
}

impl RawRule {
    fn compile(self, index: usize) -> Result<HookRule> {
        let id = self
            .id
            .unwrap_or_else(|| format!("rule-{}", index));
        let event: HookEvent = self.event.parse()?;
        let matcher = Matcher::compile(&self.matcher)?;

        let (handler, default_timeout) = match self.kind.as_str() {
            "command" => {
                anyhow::ensure!(!self.command.is_empty(), "command rule with empty argv");
                (
                    HandlerSpec::Command { argv: self.command },
                    DEFAULT_COMMAND_TIMEOUT_SECS,
                )
            }
            "prompt" => {
                let instruction = self
                    .instruction
                    .context("prompt rule missing 'instruction'")?;
                anyhow::ensure!(!instruction.trim().is_empty(), "prompt rule with empty instruction");
                let schema = if self.required_fields.is_empty() {
                    ResponseSchema::default()
                } else {
                    ResponseSchema {
                        required: self.required_fields,
                    }
                };
                (
                    HandlerSpec::Prompt { instruction, schema },
                    DEFAULT_PROMPT_TIMEOUT_SECS,
                )
            }
            other => anyhow::bail!("unknown handler kind '{}'", other),
        };

        let timeout = Duration::from_secs(self.timeout_secs.unwrap_or(default_timeout));
        anyhow::ensure!(!timeout.is_zero(), "timeout_secs must be non-zero");

        Ok(HookRule {
            id,
            event,
            matcher,
            handler,
            timeout,
        })
    }
}

/// Outcome of loading a rules file: the usable store plus every rule that
/// was excluded at validation, with its reason.
#[derive(Debug)]
pub struct LoadReport {
    pub store: RuleStore,
    pub excluded: Vec<(String, String)>,
}

/// Compiled rules grouped by event, preserving configuration order
#[derive(Debug, Default)]
pub struct RuleStore {
    by_event: HashMap<HookEvent, Vec<HookRule>>,
    len: usize,
}

impl RuleStore {
    pub fn from_rules(rules: Vec<HookRule>) -> Self {
        let mut store = RuleStore::default();
        for rule in rules {
            store.by_event.entry(rule.event).or_default().push(rule);
            store.len += 1;
        }
        store
    }

    /// Parse a TOML rules file. Malformed rules are excluded (fail-closed)
    /// and reported; a file that fails to parse at all is an error.
    pub fn load(path: &Path) -> Result<LoadReport> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read rules file {:?}", path))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<LoadReport> {
        let file: RulesFile = toml::from_str(content).context("failed to parse rules TOML")?;

        let mut rules = Vec::new();
        let mut excluded = Vec::new();
        for (index, raw) in file.rules.into_iter().enumerate() {
            let label = raw
                .id
                .clone()
                .unwrap_or_else(|| format!("rule-{}", index));
            match raw.compile(index) {
                Ok(rule) => rules.push(rule),
                Err(e) => {
                    warn!(rule = %label, error = %e, "Rule excluded by validation");
                    excluded.push((label, e.to_string()));
                }
            }
        }

        Ok(LoadReport {
            store: RuleStore::from_rules(rules),
            excluded,
        })
    }

    /// Ordered rules applying to `(event, action)`. Pure lookup: identical
    /// inputs always yield identical results.
    pub fn matching(&self, event: HookEvent, action: Option<&str>) -> Vec<&HookRule> {
        self.by_event
            .get(&event)
            .map(|rules| {
                rules
                    .iter()
                    .filter(|r| r.matcher.matches(action))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[[rules]]
id = "guard-bash"
event = "PreAction"
matcher = "Bash"
kind = "command"
command = ["./hooks/guard.sh", "--strict"]
timeout_secs = 10

[[rules]]
event = "PreAction"
matcher = "Write|Edit"
kind = "prompt"
instruction = "Review the pending {{tool_name}} call."

[[rules]]
id = "notify"
event = "Notification"
kind = "command"
command = ["./hooks/notify.sh"]
"#;

    #[test]
    fn test_load_and_match_preserves_order() {
        let report = RuleStore::parse(SAMPLE).unwrap();
        assert!(report.excluded.is_empty());
        assert_eq!(report.store.len(), 3);

        let rules = report.store.matching(HookEvent::PreAction, Some("Bash"));
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].id, "guard-bash");
        assert_eq!(rules[0].timeout, Duration::from_secs(10));

        let rules = report.store.matching(HookEvent::PreAction, Some("Edit"));
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].id, "rule-1");
    }

    #[test]
    fn test_empty_matcher_applies_to_any_action() {
        let report = RuleStore::parse(SAMPLE).unwrap();
        let rules = report.store.matching(HookEvent::Notification, None);
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].id, "notify");
    }

    #[test]
    fn test_no_match_yields_empty_list() {
        let report = RuleStore::parse(SAMPLE).unwrap();
        assert!(report
            .store
            .matching(HookEvent::SessionEnd, None)
            .is_empty());
        assert!(report
            .store
            .matching(HookEvent::PreAction, Some("Read"))
            .is_empty());
    }

    #[test]
    fn test_matching_is_idempotent() {
        let report = RuleStore::parse(SAMPLE).unwrap();
        let first: Vec<String> = report
            .store
            .matching(HookEvent::PreAction, Some("Bash"))
            .iter()
            .map(|r| r.id.clone())
            .collect();
        let second: Vec<String> = report
            .store
            .matching(HookEvent::PreAction, Some("Bash"))
            .iter()
            .map(|r| r.id.clone())
            .collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_malformed_rules_are_excluded_not_fatal() {
        let content = r#"
[[rules]]
id = "bad-regex"
event = "PreAction"
matcher = "[unclosed"
kind = "command"
command = ["./x.sh"]

[[rules]]
id = "bad-event"
event = "NoSuchEvent"
kind = "command"
command = ["./x.sh"]

[[rules]]
id = "empty-argv"
event = "PreAction"
kind = "command"

[[rules]]
id = "good"
event = "PreAction"
kind = "command"
command = ["./ok.sh"]
"#;
        let report = RuleStore::parse(content).unwrap();
        assert_eq!(report.store.len(), 1);
        assert_eq!(report.excluded.len(), 3);
        let excluded_ids: Vec<&str> = report.excluded.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(excluded_ids, vec!["bad-regex", "bad-event", "empty-argv"]);
    }

    #[test]
    fn test_prompt_rule_defaults() {
        let report = RuleStore::parse(SAMPLE).unwrap();
        let rules = report.store.matching(HookEvent::PreAction, Some("Write"));
        match &rules[0].handler {
            HandlerSpec::Prompt { schema, .. } => {
                assert_eq!(schema.required, vec!["decision".to_string()]);
            }
            _ => panic!("expected prompt handler"),
        }
        assert_eq!(rules[0].timeout, Duration::from_secs(30));
    }
}
