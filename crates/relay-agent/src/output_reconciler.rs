//! Reduces the agent's JSONL event stream to the single response that gets posted.

use std::path::Path;

use serde_json::Value;

/// Text of the last completed `agent_message` item, if any line carries one.
///
/// Each line is decoded on its own; undecodable lines are skipped.
pub fn parse_agent_jsonl(raw: &str) -> Option<String> {
    let mut last_message = None;
    for line in raw.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let Ok(event) = serde_json::from_str::<Value>(line) else {
            continue;
        };
        if event.get("type").and_then(Value::as_str) != Some("item.completed") {
            continue;
        }
        let Some(item) = event.get("item") else {
            continue;
        };
        if item.get("type").and_then(Value::as_str) != Some("agent_message") {
            continue;
        }
        if let Some(text) = item.get("text").and_then(Value::as_str) {
            last_message = Some(text.to_string());
        }
    }
    last_message
}

/// Response for the captured output at `path`.
///
/// Falls back to the raw contents when no agent message is found, and to an
/// empty string when the file is missing or unreadable.
pub fn extract_agent_response(path: &Path) -> String {
    let raw = match std::fs::read(path) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => return String::new(),
        Err(error) => {
            tracing::warn!(path = %path.display(), %error, "failed to read agent output");
            return String::new();
        }
    };
    parse_agent_jsonl(&raw).unwrap_or(raw)
}
