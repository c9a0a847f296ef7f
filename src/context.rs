use crate::store::EnvStore;
use anyhow::{Context, Result, anyhow};
use serde_json::Value;

/// Identity of the enclosing CI job, gathered once at startup from the
/// environment store. Every field except `matrix` comes from variables the
/// runner exports to each step.
#[derive(Debug, Clone)]
pub struct JobContext {
    pub repository: String,
    pub commit_oid: String,
    pub git_ref: String,
    pub workflow_run_id: u64,
    pub workflow_name: String,
    pub job_name: String,
    pub action_ref: String,
    pub action_oid: String,
    /// Matrix variables identifying this job within a matrix build,
    /// supplied by the caller as a JSON object.
    pub matrix: Option<Value>,
}

impl JobContext {
    pub fn from_store(store: &dyn EnvStore, matrix: Option<Value>) -> Result<Self> {
        let run_id_raw = required(store, "GITHUB_RUN_ID")?;
        let workflow_run_id = run_id_raw
            .parse::<u64>()
            .with_context(|| format!("GITHUB_RUN_ID is not a number: {run_id_raw}"))?;

        Ok(Self {
            repository: required(store, "GITHUB_REPOSITORY")?,
            commit_oid: required(store, "GITHUB_SHA")?,
            git_ref: required(store, "GITHUB_REF")?,
            workflow_run_id,
            workflow_name: required(store, "GITHUB_WORKFLOW")?,
            job_name: required(store, "GITHUB_JOB")?,
            action_ref: store.get("GITHUB_ACTION_REF").unwrap_or_default(),
            action_oid: store.get("GITHUB_ACTION_OID").unwrap_or_else(|| "unknown".into()),
            matrix,
        })
    }
}

fn required(store: &dyn EnvStore, key: &str) -> Result<String> {
    store
        .get(key)
        .ok_or_else(|| anyhow!("required environment variable is missing: {key}"))
}
