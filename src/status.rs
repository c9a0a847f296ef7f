use crate::{
    api::ApiTransport,
    context::JobContext,
    store::{EnvStore, keys},
};
use anyhow::{Context, Result, anyhow};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Starting,
    Success,
    Failure,
    Aborted,
}

impl JobStatus {
    /// `starting` is the only non-terminal status; exactly one terminal
    /// report is expected per job.
    pub fn is_terminal(self) -> bool {
        !matches!(self, JobStatus::Starting)
    }
}

/// One status record, immutable once built. `completed_at` is present iff
/// the status is terminal; `cause`/`exception` only accompany failures.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub workflow_run_id: u64,
    pub workflow_name: String,
    pub job_name: String,
    pub analysis_key: String,
    pub commit_oid: String,
    #[serde(rename = "ref")]
    pub git_ref: String,
    pub action_name: String,
    pub action_ref: String,
    pub action_oid: String,
    pub started_at: String,
    pub action_started_at: String,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exception: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matrix_vars: Option<Value>,
}

/// Resolves the workflow's declared file path for a run id. Consulted at
/// most once per job; the derived analysis key is cached in the store after
/// that.
pub trait WorkflowMetadata {
    fn workflow_path(&self, run_id: u64) -> Result<String>;
}

/// Production lookup against the runs API.
pub struct ApiWorkflowMetadata<'a> {
    transport: &'a dyn ApiTransport,
    base_url: String,
    repository: String,
}

impl<'a> ApiWorkflowMetadata<'a> {
    pub fn new(transport: &'a dyn ApiTransport, base_url: &str, repository: &str) -> Self {
        Self {
            transport,
            base_url: base_url.trim_end_matches('/').to_string(),
            repository: repository.to_string(),
        }
    }
}

impl WorkflowMetadata for ApiWorkflowMetadata<'_> {
    fn workflow_path(&self, run_id: u64) -> Result<String> {
        let url = format!(
            "{}/repos/{}/actions/runs/{}",
            self.base_url, self.repository, run_id
        );
        let run = self.transport.get_json(&url)?;
        run.get("path")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| anyhow!("workflow run {run_id} has no path field"))
    }
}

pub struct StatusReporter<'a> {
    transport: &'a dyn ApiTransport,
    metadata: &'a dyn WorkflowMetadata,
    store: &'a dyn EnvStore,
    ctx: &'a JobContext,
    status_url: String,
}

impl<'a> StatusReporter<'a> {
    pub fn new(
        transport: &'a dyn ApiTransport,
        metadata: &'a dyn WorkflowMetadata,
        store: &'a dyn EnvStore,
        ctx: &'a JobContext,
        base_url: &str,
    ) -> Self {
        let status_url = format!(
            "{}/repos/{}/code-scanning/analysis/status",
            base_url.trim_end_matches('/'),
            ctx.repository
        );
        Self {
            transport,
            metadata,
            store,
            ctx,
            status_url,
        }
    }

    /// Workflow path + job name, computed once per job and then read from
    /// the store by every later step.
    pub fn analysis_key(&self) -> Result<String> {
        if let Some(cached) = self.store.get(keys::ANALYSIS_KEY) {
            return Ok(cached);
        }
        let path = self
            .metadata
            .workflow_path(self.ctx.workflow_run_id)
            .context("resolving workflow path")?;
        let key = format!("{path}:{}", self.ctx.job_name);
        self.store.set(keys::ANALYSIS_KEY, &key)?;
        Ok(key)
    }

    /// Job-wide start time: the first action to report wins, and every later
    /// step inherits its timestamp.
    pub fn job_started_at(&self, action_started_at: &str) -> Result<String> {
        if let Some(cached) = self.store.get(keys::JOB_STARTED_AT) {
            return Ok(cached);
        }
        self.store.set(keys::JOB_STARTED_AT, action_started_at)?;
        Ok(action_started_at.to_string())
    }

    pub fn build_report(
        &self,
        action_name: &str,
        status: JobStatus,
        action_started_at: &str,
        cause: Option<String>,
        exception: Option<String>,
    ) -> Result<StatusReport> {
        let completed_at = status
            .is_terminal()
            .then(crate::util::now_rfc3339);

        Ok(StatusReport {
            workflow_run_id: self.ctx.workflow_run_id,
            workflow_name: self.ctx.workflow_name.clone(),
            job_name: self.ctx.job_name.clone(),
            analysis_key: self.analysis_key()?,
            commit_oid: self.ctx.commit_oid.clone(),
            git_ref: self.ctx.git_ref.clone(),
            action_name: action_name.to_string(),
            action_ref: self.ctx.action_ref.clone(),
            action_oid: self.ctx.action_oid.clone(),
            started_at: self.job_started_at(action_started_at)?,
            action_started_at: action_started_at.to_string(),
            status,
            completed_at,
            cause,
            exception,
            matrix_vars: self.ctx.matrix.clone(),
        })
    }

    /// Best-effort delivery. Returns `false` only when `ignore_failures` is
    /// off and the endpoint answered 403/404: the server is saying uploads
    /// are not enabled here, so the caller should stop before doing any real
    /// work. Every other failure is logged and swallowed; telemetry trouble
    /// must never fail the analysis itself.
    pub fn send(&self, report: &StatusReport, ignore_failures: bool) -> bool {
        let body = match serde_json::to_value(report) {
            Ok(v) => v,
            Err(err) => {
                warn!("could not serialize status report: {err}");
                return true;
            }
        };

        match self.transport.put_json(&self.status_url, &body) {
            Ok(response) => match response.status {
                Some(status) if (200..300).contains(&status) => {
                    debug!("status report accepted ({status})");
                    true
                }
                Some(status @ (403 | 404)) if !ignore_failures => {
                    warn!(
                        "status endpoint returned {status}; code scanning is not enabled for this repository"
                    );
                    false
                }
                other => {
                    warn!("status report not accepted (status {other:?}); continuing");
                    true
                }
            },
            Err(err) => {
                warn!("status report failed: {err:#}; continuing");
                true
            }
        }
    }
}
