use std::path::Path;

use anyhow::{Context, Result};

pub const DEFAULT_PROMPT_TEMPLATE: &str = include_str!("../prompt-template.md");

#[derive(Debug, Clone, Copy)]
pub struct PromptContext<'a> {
    pub event_name: &'a str,
    pub event_action: Option<&'a str>,
    pub subject_type: &'a str,
    pub subject_number: u64,
    pub subject_url: &'a str,
    pub delta_json: &'a str,
    pub extra_prompt: &'a str,
}

/// Reads an operator-supplied template, or the built-in one when `path` is `None`.
pub fn load_prompt_template(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read prompt template {}", path.display())),
        None => Ok(DEFAULT_PROMPT_TEMPLATE.to_string()),
    }
}

/// Substitutes every known `{{PLACEHOLDER}}` in one pass; inserted text is never rescanned.
pub fn render_prompt(template: &str, context: &PromptContext<'_>) -> String {
    let subject_number = context.subject_number.to_string();
    let mut output = String::with_capacity(template.len() + context.delta_json.len());
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        output.push_str(&rest[..start]);
        let candidate = &rest[start..];
        let replacement = candidate.find("}}").and_then(|end| {
            let value = match &candidate[2..end] {
                "EVENT_NAME" => context.event_name,
                "EVENT_ACTION" => context.event_action.unwrap_or(""),
                "SUBJECT_TYPE" => context.subject_type,
                "SUBJECT_NUMBER" => subject_number.as_str(),
                "SUBJECT_URL" => context.subject_url,
                "DELTA_JSON" => context.delta_json,
                "EXTRA_PROMPT" => context.extra_prompt,
                _ => return None,
            };
            Some((value, end + 2))
        });
        match replacement {
            Some((value, consumed)) => {
                output.push_str(value);
                rest = &candidate[consumed..];
            }
            None => {
                output.push_str("{{");
                rest = &candidate[2..];
            }
        }
    }
    output.push_str(rest);
    output
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::{load_prompt_template, render_prompt, PromptContext, DEFAULT_PROMPT_TEMPLATE};

    fn context<'a>(delta_json: &'a str) -> PromptContext<'a> {
        PromptContext {
            event_name: "issue_comment",
            event_action: None,
            subject_type: "pr",
            subject_number: 5,
            subject_url: "https://github.com/owner/repo/pull/5",
            delta_json,
            extra_prompt: "Be brief.",
        }
    }

    #[test]
    fn unit_render_prompt_replaces_every_occurrence() {
        let rendered = render_prompt(
            "{{SUBJECT_TYPE}} #{{SUBJECT_NUMBER}} / {{SUBJECT_TYPE}} [{{EVENT_ACTION}}]",
            &context("{}"),
        );
        assert_eq!(rendered, "pr #5 / pr []");
    }

    #[test]
    fn regression_render_prompt_does_not_rescan_inserted_text() {
        let rendered = render_prompt(
            "{{DELTA_JSON}} {{EVENT_NAME}}",
            &context("{\"body\": \"{{EVENT_NAME}} {{\"}"),
        );
        assert_eq!(rendered, "{\"body\": \"{{EVENT_NAME}} {{\"} issue_comment");
    }

    #[test]
    fn regression_render_prompt_keeps_unknown_and_unterminated_markers() {
        assert_eq!(
            render_prompt("{{UNKNOWN}} {{EVENT_NAME", &context("{}")),
            "{{UNKNOWN}} {{EVENT_NAME"
        );
    }

    #[test]
    fn functional_default_template_renders_all_placeholders() {
        let template = load_prompt_template(None).expect("default template");
        assert_eq!(template, DEFAULT_PROMPT_TEMPLATE);
        let rendered = render_prompt(&template, &context("{\n  \"event\": {}\n}\n"));
        assert!(!rendered.contains("{{"));
        assert!(rendered.contains("https://github.com/owner/repo/pull/5"));
        assert!(rendered.contains("\"event\": {}"));
        assert!(rendered.contains("Be brief."));
    }

    #[test]
    fn functional_load_prompt_template_reads_override_file() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("prompt.md");
        std::fs::write(&path, "custom {{EVENT_NAME}}").expect("write");
        assert_eq!(
            load_prompt_template(Some(&path)).expect("load"),
            "custom {{EVENT_NAME}}"
        );
        assert!(load_prompt_template(Some(&temp.path().join("missing.md"))).is_err());
    }
}
