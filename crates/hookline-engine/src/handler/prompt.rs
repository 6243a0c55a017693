use std::time::Duration;

use anyhow::{Context, Result};
use serde_json::Value;

use super::HandlerResult;
use crate::backend::CompletionBackend;
use crate::event::EventContext;
use crate::rules::ResponseSchema;

/// Execute a prompt handler: render the rule's instruction template, send it
/// to the completion backend under the rule's deadline, and validate the
/// JSON response against the expected schema. A malformed or incomplete
/// response is a process error, never a decision.
pub async fn run(
    instruction: &str,
    schema: &ResponseSchema,
    ctx: &EventContext,
    backend: &dyn CompletionBackend,
    timeout: Duration,
) -> HandlerResult {
    let rendered = render(instruction, ctx);

    let completion = match tokio::time::timeout(timeout, backend.complete(&rendered)).await {
        Err(_elapsed) => return HandlerResult::timed_out(),
        Ok(Err(e)) => return HandlerResult::process_error(format!("completion failed: {}", e)),
        Ok(Ok(text)) => text,
    };

    match parse_response(&completion, schema) {
        Ok(parsed) => HandlerResult {
            parsed_json: Some(parsed),
            stdout: completion,
            ..HandlerResult::default()
        },
        Err(e) => HandlerResult::process_error(e.to_string()),
    }
}

/// Substitute event fields into `{{placeholder}}` slots and append the JSON
/// response contract.
fn render(template: &str, ctx: &EventContext) -> String {
    let mut out = template.to_string();
    out = out.replace("{{event_name}}", ctx.event.as_str());
    out = out.replace("{{tool_name}}", ctx.action_name.as_deref().unwrap_or(""));
    out = out.replace("{{session_id}}", &ctx.session_id);
    out = out.replace("{{permission_mode}}", &ctx.permission_mode);
    out = out.replace("{{cwd}}", &ctx.cwd.to_string_lossy());
    for (key, value) in &ctx.payload {
        let placeholder = format!("{{{{{}}}}}", key);
        if !out.contains(&placeholder) {
            continue;
        }
        let rendered = match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        out = out.replace(&placeholder, &rendered);
    }

    out.push_str(
        "\n\nRespond with a single JSON object and nothing else, shaped as \
         {\"decision\": \"approve\"|\"block\"|\"continue\", \"reason\": string, \
         \"continue\": boolean}.",
    );
    out
}

/// Parse the completion as a strict JSON object, tolerating a markdown code
/// fence wrapper, and require every schema field.
fn parse_response(text: &str, schema: &ResponseSchema) -> Result<Value> {
    let body = strip_fences(text.trim());
    let value: Value =
        serde_json::from_str(body).context("completion response is not valid JSON")?;
    let object = value
        .as_object()
        .context("completion response is not a JSON object")?;
    for field in &schema.required {
        anyhow::ensure!(
            object.contains_key(field),
            "completion response missing required field '{}'",
            field
        );
    }
    Ok(value)
}

fn strip_fences(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Drop the info string ("json") up to the first newline
    let rest = match rest.split_once('\n') {
        Some((_, body)) => body,
        None => rest,
    };
    rest.strip_suffix("```").unwrap_or(rest).trim()
}
