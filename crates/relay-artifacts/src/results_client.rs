//! Client for the Actions results service that backs artifact uploads.
//!
//! An upload is three calls: `CreateArtifact` returns a signed blob URL, the
//! zip is `PUT` to that URL, and `FinalizeArtifact` commits it with its size
//! and digest. The workflow run and job backend ids come from the runtime
//! token's `Actions.Results:<run>:<job>` scope.

use std::path::Path;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{SecondsFormat, Utc};
use relay_github::github_transport_helpers::truncate_for_error;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

const ARTIFACT_SERVICE_PATH: &str = "twirp/github.actions.results.api.v1.ArtifactService";
const ARTIFACT_PROTOCOL_VERSION: u32 = 4;
const RESULTS_SCOPE_PREFIX: &str = "Actions.Results:";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeTokenScope {
    pub workflow_run_backend_id: String,
    pub workflow_job_run_backend_id: String,
}

impl RuntimeTokenScope {
    /// Extracts the backend ids from an `ACTIONS_RUNTIME_TOKEN` JWT.
    pub fn from_runtime_token(token: &str) -> Result<Self> {
        let payload = token
            .trim()
            .split('.')
            .nth(1)
            .ok_or_else(|| anyhow!("actions runtime token is not a JWT"))?;
        let decoded = URL_SAFE_NO_PAD
            .decode(payload.trim_end_matches('='))
            .context("actions runtime token payload is not base64url")?;
        let claims: Value = serde_json::from_slice(&decoded)
            .context("actions runtime token payload is not JSON")?;
        let scopes = claims
            .get("scp")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow!("actions runtime token has no scp claim"))?;
        for scope in scopes.split_whitespace() {
            let Some(ids) = scope.strip_prefix(RESULTS_SCOPE_PREFIX) else {
                continue;
            };
            let mut parts = ids.split(':');
            if let (Some(run), Some(job), None) = (parts.next(), parts.next(), parts.next()) {
                if !run.is_empty() && !job.is_empty() {
                    return Ok(Self {
                        workflow_run_backend_id: run.to_string(),
                        workflow_job_run_backend_id: job.to_string(),
                    });
                }
            }
        }
        bail!("actions runtime token has no {RESULTS_SCOPE_PREFIX} scope")
    }
}

#[derive(Clone)]
pub struct ActionsResultsClient {
    http: reqwest::Client,
    results_url: String,
    runtime_token: String,
    scope: RuntimeTokenScope,
}

#[derive(Debug, Deserialize)]
struct CreateArtifactResponse {
    #[serde(default)]
    ok: bool,
    #[serde(default, rename = "signedUploadUrl")]
    signed_upload_url: String,
}

#[derive(Debug, Deserialize)]
struct FinalizeArtifactResponse {
    #[serde(default)]
    ok: bool,
    #[serde(default, rename = "artifactId")]
    artifact_id: Option<Value>,
}

impl ActionsResultsClient {
    pub fn new(results_url: &str, runtime_token: &str, request_timeout_ms: u64) -> Result<Self> {
        let results_url = results_url.trim().trim_end_matches('/');
        if results_url.is_empty() {
            bail!("actions results url is empty; artifact upload requires ACTIONS_RESULTS_URL");
        }
        let scope = RuntimeTokenScope::from_runtime_token(runtime_token)?;
        let http = reqwest::Client::builder()
            .user_agent("relay-session-agent")
            .timeout(Duration::from_millis(request_timeout_ms.max(1)))
            .build()
            .context("failed to create actions results client")?;
        Ok(Self {
            http,
            results_url: results_url.to_string(),
            runtime_token: runtime_token.trim().to_string(),
            scope,
        })
    }

    pub fn scope(&self) -> &RuntimeTokenScope {
        &self.scope
    }

    /// Registers a new artifact and returns its signed upload URL.
    pub async fn create_artifact(&self, name: &str, retention_days: u32) -> Result<String> {
        let mut payload = json!({
            "workflowRunBackendId": self.scope.workflow_run_backend_id,
            "workflowJobRunBackendId": self.scope.workflow_job_run_backend_id,
            "name": name,
            "version": ARTIFACT_PROTOCOL_VERSION,
        });
        if retention_days > 0 {
            let expires_at = Utc::now() + chrono::Duration::days(i64::from(retention_days));
            payload["expiresAt"] =
                Value::String(expires_at.to_rfc3339_opts(SecondsFormat::Millis, true));
        }
        let response: CreateArtifactResponse = self.call("CreateArtifact", &payload).await?;
        if !response.ok || response.signed_upload_url.trim().is_empty() {
            bail!("actions results service refused to create artifact '{name}'");
        }
        Ok(response.signed_upload_url)
    }

    /// Uploads the zip at `zip_path` as a single block blob.
    pub async fn upload_blob(&self, signed_upload_url: &str, zip_path: &Path) -> Result<()> {
        let body = tokio::fs::read(zip_path)
            .await
            .with_context(|| format!("failed to read {}", zip_path.display()))?;
        let response = self
            .http
            .put(signed_upload_url)
            .header("x-ms-blob-type", "BlockBlob")
            .header(reqwest::header::CONTENT_TYPE, "application/zip")
            .body(body)
            .send()
            .await
            .context("artifact blob upload request failed")?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!(
                "artifact blob upload failed with status {}: {}",
                status.as_u16(),
                truncate_for_error(&body, 400)
            );
        }
        Ok(())
    }

    /// Commits an uploaded artifact and returns its id when the service reports one.
    pub async fn finalize_artifact(
        &self,
        name: &str,
        size: u64,
        sha256_hex: &str,
    ) -> Result<Option<u64>> {
        let payload = json!({
            "workflowRunBackendId": self.scope.workflow_run_backend_id,
            "workflowJobRunBackendId": self.scope.workflow_job_run_backend_id,
            "name": name,
            "size": size.to_string(),
            "hash": format!("sha256:{sha256_hex}"),
        });
        let response: FinalizeArtifactResponse = self.call("FinalizeArtifact", &payload).await?;
        if !response.ok {
            bail!("actions results service refused to finalize artifact '{name}'");
        }
        // int64 fields arrive as JSON strings
        Ok(match response.artifact_id {
            Some(Value::String(raw)) => raw.parse().ok(),
            Some(Value::Number(number)) => number.as_u64(),
            _ => None,
        })
    }

    async fn call<T>(&self, method: &str, payload: &Value) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let url = format!("{}/{ARTIFACT_SERVICE_PATH}/{method}", self.results_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.runtime_token)
            .json(payload)
            .send()
            .await
            .with_context(|| format!("actions results {method} request failed"))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!(
                "actions results {method} failed with status {}: {}",
                status.as_u16(),
                truncate_for_error(&body, 400)
            );
        }
        response
            .json::<T>()
            .await
            .with_context(|| format!("failed to decode actions results {method} response"))
    }
}
