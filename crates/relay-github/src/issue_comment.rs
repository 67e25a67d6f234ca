//! Comment body rendering for responses and run failures.

use crate::github_transport_helpers::truncate_for_error;

/// GitHub rejects comment bodies above 65 536 characters; stay below with headroom.
pub const GITHUB_COMMENT_MAX_CHARS: usize = 65_000;
pub const EMPTY_RESPONSE_BODY: &str = "(no output)";

pub fn chunk_text_by_chars(text: &str, max_chars: usize) -> Vec<String> {
    if max_chars == 0 {
        return Vec::new();
    }
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut count = 0usize;
    for ch in text.chars() {
        if count >= max_chars {
            chunks.push(current);
            current = String::new();
            count = 0;
        }
        current.push(ch);
        count = count.saturating_add(1);
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Splits a response into postable comment bodies, substituting a placeholder for blank text.
pub fn render_comment_chunks(body: &str, max_chars: usize) -> Vec<String> {
    if body.trim().is_empty() {
        return vec![EMPTY_RESPONSE_BODY.to_string()];
    }
    chunk_text_by_chars(body, max_chars.max(1))
}

/// Failure comment for a run whose agent process exited non-zero.
pub fn render_agent_failure_comment(exit_code: Option<i32>, raw_output: &str) -> String {
    let code = exit_code
        .map(|code| code.to_string())
        .unwrap_or_else(|| "signal".to_string());
    let output = if raw_output.trim().is_empty() {
        EMPTY_RESPONSE_BODY
    } else {
        raw_output
    };
    format!("Agent run failed (exit code {code}).\n\n{output}")
}

/// Failure comment for any other run error, optionally linking the workflow run.
pub fn render_run_error_comment(error_message: &str, run_url: Option<&str>) -> String {
    let mut body = format!(
        "Agent run failed.\n\nError: `{}`",
        truncate_for_error(error_message, 600)
    );
    if let Some(run_url) = run_url.filter(|url| !url.trim().is_empty()) {
        body.push_str(&format!("\n\nWorkflow run: {run_url}"));
    }
    body
}
