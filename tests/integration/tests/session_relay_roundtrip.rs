#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use httpmock::prelude::*;
use relay_artifacts::{ArtifactStore, DirectoryArtifactStore};
use relay_github::{GithubApiClient, GithubClientConfig, RepoRef, Subject};
use relay_runtime::{AgentSettings, RelayRuntime, RunOutcome, RuntimeConfig, UploadPolicy};
use relay_session::SessionState;
use serde_json::{json, Value};
use tempfile::{tempdir, TempDir};

const ARTIFACT_NAME: &str = "action-agent-session-issue-7";
const RUN_ID: u64 = 100;

struct Harness {
    temp: TempDir,
    server: MockServer,
}

impl Harness {
    fn new() -> Self {
        let temp = tempdir().expect("tempdir");
        let workspace = temp.path().join("workspace");
        std::fs::create_dir_all(workspace.join("skills/review")).expect("skills");
        std::fs::write(workspace.join("skills/review/SKILL.md"), "# review\n").expect("skill");
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/user");
            then.status(200).json_body(json!({"login": "relay-bot"}));
        });
        server.mock(|when, then| {
            when.method(GET)
                .path("/repos/owner/repo/collaborators")
                .query_param("permission", "push");
            then.status(200).json_body(json!([{"login": "alice"}]));
        });
        server.mock(|when, then| {
            when.method(POST).path_includes("/reactions");
            then.status(201).json_body(json!({"id": 1, "content": "eyes"}));
        });
        server.mock(|when, then| {
            when.method(GET).path("/repos/owner/repo/issues/7");
            then.status(200).json_body(json!({
                "id": 700,
                "number": 7,
                "title": "Add a health endpoint",
                "body": "We need /healthz.",
                "state": "open",
                "html_url": "https://github.com/owner/repo/issues/7",
                "user": {"login": "alice"}
            }));
        });
        Self { temp, server }
    }

    fn store(&self) -> DirectoryArtifactStore {
        DirectoryArtifactStore::new(self.temp.path().join("artifacts"), Some(RUN_ID), 7)
    }

    fn runner(&self, label: &str) -> PathBuf {
        self.temp.path().join(label)
    }

    /// Stand-in agent CLI: logs in by writing credentials, records its
    /// arguments and prompt next to the session, and prints `output`.
    fn agent_script(&self, output: &str, exit_code: i32) -> PathBuf {
        let script = self.temp.path().join("mock-agent.sh");
        let body = format!(
            r#"#!/bin/sh
set -eu
if [ "$1" = "login" ]; then
  cat > /dev/null
  printf '{{"OPENAI_API_KEY":"%s"}}' "$OPENAI_API_KEY" > "$CODEX_HOME/auth.json"
  exit 0
fi
echo "$@" >> "$CODEX_HOME/../agent-args.log"
cat > "$CODEX_HOME/../agent-prompt.txt"
mkdir -p "$CODEX_SESSIONS_PATH" "$CODEX_HOME/tmp"
echo '{{"turn":"'"$(date +%s%N)"'"}}' >> "$CODEX_SESSIONS_PATH/rollout.jsonl"
echo 'scratch' > "$CODEX_HOME/tmp/scratch.txt"
cat <<'OUT'
{output}
OUT
exit {exit_code}
"#
        );
        std::fs::write(&script, body).expect("write script");
        let mut perms = std::fs::metadata(&script).expect("metadata").permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&script, perms).expect("chmod");
        script
    }

    fn runtime(
        &self,
        runner: &Path,
        event_name: &str,
        payload: Value,
        script: &Path,
        upload_policy: UploadPolicy,
    ) -> RelayRuntime {
        let github = GithubApiClient::new(GithubClientConfig {
            api_base: self.server.base_url(),
            token: "ghs_test".to_string(),
            repo: RepoRef::parse("owner/repo").expect("repo"),
            request_timeout_ms: 5_000,
            retry_max_attempts: 1,
            retry_base_delay_ms: 1,
        })
        .expect("github client");
        let config = RuntimeConfig {
            event_name: event_name.to_string(),
            payload,
            artifact_prefix: "action-agent".to_string(),
            upload_policy,
            runner_temp: runner.to_path_buf(),
            workspace: self.temp.path().join("workspace"),
            agent: AgentSettings {
                binary: script.display().to_string(),
                api_key: "sk-integration".to_string(),
                github_token: "ghs_test".to_string(),
                model: Some("gpt-test".to_string()),
                reasoning_effort: None,
            },
            prompt_template: None,
            extra_prompt: "Always answer in English.".to_string(),
            run_url: Some(format!("https://github.com/owner/repo/actions/runs/{RUN_ID}")),
        };
        RelayRuntime::new(config, github, Arc::new(self.store()))
    }

    async fn download_latest(&self, label: &str) -> PathBuf {
        let store = self.store();
        let record = store
            .find_latest(ARTIFACT_NAME)
            .await
            .expect("lookup")
            .expect("artifact present");
        let target = self.temp.path().join(label);
        store.download(&record, &target).await.expect("download");
        target
    }
}

fn agent_message(text: &str) -> String {
    json!({"type": "item.completed", "item": {"type": "agent_message", "text": text}}).to_string()
}

fn issue_opened() -> Value {
    json!({
        "action": "opened",
        "issue": {"number": 7, "title": "Add a health endpoint"},
        "sender": {"login": "alice"}
    })
}

#[tokio::test]
async fn integration_fresh_run_then_comment_resumes_saved_session() {
    let harness = Harness::new();
    let script = harness.agent_script(&agent_message("Added /healthz."), 0);
    let first_reply = harness.server.mock(|when, then| {
        when.method(POST)
            .path("/repos/owner/repo/issues/7/comments")
            .body_includes("Added /healthz.");
        then.status(201).json_body(json!({"id": 501}));
    });

    let first_runner = harness.runner("runner-1");
    let outcome = harness
        .runtime(&first_runner, "issues", issue_opened(), &script, UploadPolicy::SuccessOnly)
        .run()
        .await
        .expect("first run");
    assert_eq!(
        outcome,
        RunOutcome::Completed {
            subject: Subject::issue(7),
            resumed: false,
            uploaded: true,
            response_chars: "Added /healthz.".len(),
        }
    );
    first_reply.assert();
    let first_args =
        std::fs::read_to_string(first_runner.join("agent-args.log")).expect("args log");
    assert!(first_args.contains("--model gpt-test"));
    assert!(!first_args.contains("resume"));
    let first_prompt =
        std::fs::read_to_string(first_runner.join("agent-prompt.txt")).expect("prompt");
    assert!(first_prompt.contains("https://github.com/owner/repo/issues/7"));
    assert!(first_prompt.contains("Always answer in English."));

    let saved = harness.download_latest("saved-1").await;
    assert!(saved.join("sessions/rollout.jsonl").is_file());
    assert!(!saved.join("auth.json").exists());
    assert!(!saved.join("tmp").exists());
    assert!(!saved.join("skills").exists());
    let state = SessionState::load(&saved.join("state.json"))
        .expect("load state")
        .expect("state present");
    assert_eq!(state.subject_number, 7);
    assert_eq!(state.last_issue_comment_id, None);

    let new_comments = harness.server.mock(|when, then| {
        when.method(GET)
            .path("/repos/owner/repo/issues/7/comments")
            .query_param_exists("since");
        then.status(200).json_body(json!([{
            "id": 99,
            "body": "Please also cover it with a test.",
            "created_at": "2099-01-01T00:00:00Z",
            "user": {"login": "alice"}
        }]));
    });
    let second_reply = harness.server.mock(|when, then| {
        when.method(POST)
            .path("/repos/owner/repo/issues/7/comments")
            .body_includes("Test added.");
        then.status(201).json_body(json!({"id": 502}));
    });
    let resumed_script = harness.agent_script(&agent_message("Test added."), 0);
    let second_runner = harness.runner("runner-2");
    let comment_event = json!({
        "action": "created",
        "issue": {"number": 7},
        "comment": {"id": 99, "body": "Please also cover it with a test.", "user": {"login": "alice"}},
        "sender": {"login": "alice"}
    });
    let outcome = harness
        .runtime(
            &second_runner,
            "issue_comment",
            comment_event,
            &resumed_script,
            UploadPolicy::SuccessOnly,
        )
        .run()
        .await
        .expect("second run");
    assert!(matches!(outcome, RunOutcome::Completed { resumed: true, .. }));
    new_comments.assert();
    second_reply.assert();
    let second_args =
        std::fs::read_to_string(second_runner.join("agent-args.log")).expect("args log");
    assert!(second_args.contains("resume --last"));
    let second_prompt =
        std::fs::read_to_string(second_runner.join("agent-prompt.txt")).expect("prompt");
    assert!(second_prompt.contains("Please also cover it with a test."));

    let saved = harness.download_latest("saved-2").await;
    let rollout = std::fs::read_to_string(saved.join("sessions/rollout.jsonl")).expect("rollout");
    assert_eq!(rollout.lines().count(), 2);
    let state = SessionState::load(&saved.join("state.json"))
        .expect("load state")
        .expect("state present");
    assert_eq!(state.last_issue_comment_id, Some(99));
}

#[tokio::test]
async fn integration_nonzero_exit_posts_raw_output_and_keeps_previous_artifacts() {
    let harness = Harness::new();
    let script = harness.agent_script("boom: model unavailable", 3);
    let failure = harness.server.mock(|when, then| {
        when.method(POST)
            .path("/repos/owner/repo/issues/7/comments")
            .body_includes("exit code 3")
            .body_includes("boom: model unavailable");
        then.status(201).json_body(json!({"id": 503}));
    });

    let runner = harness.runner("runner");
    let error = harness
        .runtime(&runner, "issues", issue_opened(), &script, UploadPolicy::SuccessOnly)
        .run()
        .await
        .expect_err("agent failure");
    assert!(error.to_string().contains("exited with code 3"));
    failure.assert();
    assert_eq!(
        harness.store().find_latest(ARTIFACT_NAME).await.expect("lookup"),
        None
    );
    assert!(!runner.join("agent-session/auth.json").exists());
}

#[tokio::test]
async fn integration_always_policy_uploads_failed_session_without_advancing_state() {
    let harness = Harness::new();
    let script = harness.agent_script("partial work before crash", 2);
    harness.server.mock(|when, then| {
        when.method(POST).path("/repos/owner/repo/issues/7/comments");
        then.status(201).json_body(json!({"id": 504}));
    });

    let runner = harness.runner("runner");
    harness
        .runtime(&runner, "issues", issue_opened(), &script, UploadPolicy::Always)
        .run()
        .await
        .expect_err("agent failure");

    let saved = harness.download_latest("saved").await;
    assert!(saved.join("sessions/rollout.jsonl").is_file());
    assert!(!saved.join("state.json").exists());
    assert!(!saved.join("auth.json").exists());
}

#[tokio::test]
async fn regression_bot_authored_comment_leaves_store_untouched() {
    let harness = Harness::new();
    let script = harness.agent_script(&agent_message("unused"), 0);
    let runner = harness.runner("runner");
    let outcome = harness
        .runtime(
            &runner,
            "issue_comment",
            json!({
                "action": "created",
                "issue": {"number": 7},
                "comment": {"id": 5, "body": "done", "user": {"login": "relay-bot"}}
            }),
            &script,
            UploadPolicy::Always,
        )
        .run()
        .await
        .expect("skipped run");
    assert!(matches!(outcome, RunOutcome::Skipped { .. }));
    assert!(!runner.exists());
    assert!(!harness.temp.path().join("artifacts").exists());
}
