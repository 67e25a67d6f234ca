//! The `state.json` snapshot carried between runs inside the session directory.

use std::path::Path;

use anyhow::{Context, Result};
use relay_core::write_text_atomic;
use relay_github::SubjectType;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const STATE_FILE_NAME: &str = "state.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    pub subject_type: SubjectType,
    pub subject_number: u64,
    pub last_run_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_issue_comment_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_review_comment_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_head_sha: Option<String>,
}

impl SessionState {
    /// Reads a snapshot, returning `None` when the file is absent or its required fields are invalid.
    ///
    /// Optional fields with the wrong type are dropped individually. Only I/O
    /// failures other than a missing file are reported as errors.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(error) => {
                return Err(error)
                    .with_context(|| format!("failed to read state file {}", path.display()))
            }
        };
        let value = match serde_json::from_str::<Value>(&raw) {
            Ok(value) => value,
            Err(error) => {
                tracing::warn!(
                    path = %path.display(),
                    %error,
                    "state file is not valid json; treating as absent"
                );
                return Ok(None);
            }
        };
        let state = Self::from_value(&value);
        if state.is_none() {
            tracing::warn!(
                path = %path.display(),
                "state file is missing required fields; treating as absent"
            );
        }
        Ok(state)
    }

    fn from_value(value: &Value) -> Option<Self> {
        let subject_type = value
            .get("subjectType")
            .and_then(Value::as_str)
            .and_then(SubjectType::parse)?;
        let subject_number = value.get("subjectNumber").and_then(integral_u64)?;
        let last_run_at = value.get("lastRunAt").and_then(Value::as_str)?.to_string();
        Some(Self {
            subject_type,
            subject_number,
            last_run_at,
            last_issue_comment_id: value.get("lastIssueCommentId").and_then(integral_u64),
            last_review_comment_id: value.get("lastReviewCommentId").and_then(integral_u64),
            last_head_sha: value
                .get("lastHeadSha")
                .and_then(Value::as_str)
                .map(ToOwned::to_owned),
        })
    }

    /// Replaces the file at `path` with this snapshot as pretty JSON plus a trailing newline.
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut payload =
            serde_json::to_string_pretty(self).context("failed to serialize session state")?;
        payload.push('\n');
        write_text_atomic(path, &payload)
            .with_context(|| format!("failed to write state file {}", path.display()))
    }
}

/// Accepts any JSON number holding a non-negative whole value, so `7` and `7.0` agree.
fn integral_u64(value: &Value) -> Option<u64> {
    if let Some(number) = value.as_u64() {
        return Some(number);
    }
    let number = value.as_f64()?;
    if !number.is_finite() || number < 0.0 || number.fract() != 0.0 || number >= u64::MAX as f64 {
        return None;
    }
    Some(number as u64)
}

#[cfg(test)]
mod tests {
    use relay_github::SubjectType;
    use serde_json::json;
    use tempfile::tempdir;

    use super::{SessionState, STATE_FILE_NAME};

    fn sample_state() -> SessionState {
        SessionState {
            subject_type: SubjectType::Pr,
            subject_number: 5,
            last_run_at: "2026-10-01T12:00:00.000Z".to_string(),
            last_issue_comment_id: Some(42),
            last_review_comment_id: None,
            last_head_sha: Some("def".to_string()),
        }
    }

    #[test]
    fn unit_load_returns_none_for_missing_file() {
        let temp = tempdir().expect("tempdir");
        let loaded = SessionState::load(&temp.path().join(STATE_FILE_NAME)).expect("load");
        assert!(loaded.is_none());
    }

    #[test]
    fn functional_save_then_load_preserves_state_and_format() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join(STATE_FILE_NAME);
        let state = sample_state();
        state.save(&path).expect("save");

        let raw = std::fs::read_to_string(&path).expect("read");
        assert!(raw.ends_with("}\n"));
        assert!(raw.contains("\n  \"subjectType\": \"pr\""));
        assert!(!raw.contains("lastReviewCommentId"));

        let loaded = SessionState::load(&path).expect("load").expect("state");
        assert_eq!(loaded, state);
    }

    #[test]
    fn regression_load_treats_invalid_required_fields_as_absent() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join(STATE_FILE_NAME);
        for payload in [
            json!({"subjectNumber": 5, "lastRunAt": "2026-10-01T00:00:00Z"}),
            json!({"subjectType": "discussion", "subjectNumber": 5, "lastRunAt": "x"}),
            json!({"subjectType": "pr", "subjectNumber": "5", "lastRunAt": "x"}),
            json!({"subjectType": "pr", "subjectNumber": 5, "lastRunAt": 17}),
            json!([1, 2, 3]),
        ] {
            std::fs::write(&path, payload.to_string()).expect("write");
            assert!(
                SessionState::load(&path).expect("load").is_none(),
                "payload should be rejected: {payload}"
            );
        }
        std::fs::write(&path, "{not json").expect("write");
        assert!(SessionState::load(&path).expect("load").is_none());
    }

    #[test]
    fn regression_load_drops_malformed_optional_fields_individually() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join(STATE_FILE_NAME);
        std::fs::write(
            &path,
            json!({
                "subjectType": "issue",
                "subjectNumber": 7,
                "lastRunAt": "2026-10-01T00:00:00Z",
                "lastIssueCommentId": "12",
                "lastReviewCommentId": 9,
                "lastHeadSha": false
            })
            .to_string(),
        )
        .expect("write");

        let loaded = SessionState::load(&path).expect("load").expect("state");
        assert_eq!(loaded.subject_type, SubjectType::Issue);
        assert_eq!(loaded.last_issue_comment_id, None);
        assert_eq!(loaded.last_review_comment_id, Some(9));
        assert_eq!(loaded.last_head_sha, None);
    }

    #[test]
    fn regression_load_accepts_integral_float_numbers() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join(STATE_FILE_NAME);
        std::fs::write(
            &path,
            r#"{"subjectType":"pr","subjectNumber":7.0,"lastRunAt":"2026-10-01T00:00:00Z","lastIssueCommentId":12.0,"lastReviewCommentId":3.5}"#,
        )
        .expect("write");

        let loaded = SessionState::load(&path).expect("load").expect("state");
        assert_eq!(loaded.subject_number, 7);
        assert_eq!(loaded.last_issue_comment_id, Some(12));
        assert_eq!(loaded.last_review_comment_id, None);

        for subject_number in ["7.5", "-7", "-7.0"] {
            std::fs::write(
                &path,
                format!(
                    r#"{{"subjectType":"pr","subjectNumber":{subject_number},"lastRunAt":"x"}}"#
                ),
            )
            .expect("write");
            assert!(
                SessionState::load(&path).expect("load").is_none(),
                "subjectNumber {subject_number} should be rejected"
            );
        }
    }
}
