use std::fmt;
use std::path::PathBuf;

use anyhow::{bail, Result};
use serde_json::Value;

/// What happens to the session directory when the agent exits non-zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UploadPolicy {
    /// Nothing is persisted; the next run resumes from the last good artifact.
    #[default]
    SuccessOnly,
    /// The stripped session is uploaded anyway, without advancing `state.json`.
    Always,
}

impl UploadPolicy {
    pub fn parse(raw: &str) -> Result<Self> {
        match raw.trim() {
            "success-only" => Ok(Self::SuccessOnly),
            "always" => Ok(Self::Always),
            other => bail!("invalid upload policy '{other}', expected success-only or always"),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SuccessOnly => "success-only",
            Self::Always => "always",
        }
    }
}

impl fmt::Display for UploadPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct AgentSettings {
    pub binary: String,
    pub api_key: String,
    pub github_token: String,
    pub model: Option<String>,
    pub reasoning_effort: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub event_name: String,
    pub payload: Value,
    pub artifact_prefix: String,
    pub upload_policy: UploadPolicy,
    /// Scratch root holding the live session, download area and agent output.
    pub runner_temp: PathBuf,
    pub workspace: PathBuf,
    pub agent: AgentSettings,
    pub prompt_template: Option<PathBuf>,
    pub extra_prompt: String,
    /// Link to the workflow run, included in failure comments when known.
    pub run_url: Option<String>,
}

impl RuntimeConfig {
    pub fn event_action(&self) -> Option<&str> {
        self.payload.get("action").and_then(Value::as_str)
    }

    pub fn agent_output_path(&self) -> PathBuf {
        self.runner_temp.join("agent-output.jsonl")
    }
}

#[cfg(test)]
mod tests {
    use super::UploadPolicy;

    #[test]
    fn unit_upload_policy_parses_known_values_only() {
        assert_eq!(
            UploadPolicy::parse("success-only").expect("parse"),
            UploadPolicy::SuccessOnly
        );
        assert_eq!(UploadPolicy::parse(" always ").expect("parse"), UploadPolicy::Always);
        assert_eq!(UploadPolicy::default(), UploadPolicy::SuccessOnly);
        assert!(UploadPolicy::parse("never").is_err());
        assert_eq!(UploadPolicy::Always.to_string(), "always");
    }
}
