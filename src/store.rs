use anyhow::{Context, Result};
use std::cell::RefCell;
use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use tracing::{debug, warn};

/// Store keys shared across the steps of one job.
pub mod keys {
    /// Cached analysis key (workflow path + job name).
    pub const ANALYSIS_KEY: &str = "SARIF_RELAY_ANALYSIS_KEY";
    /// Start time of the first action in the job, inherited by later steps.
    pub const JOB_STARTED_AT: &str = "SARIF_RELAY_STARTED_AT";
    /// Sentinel marking that an upload was already attempted in this job.
    pub const DID_UPLOAD: &str = "SARIF_RELAY_DID_UPLOAD";
}

/// Name of the environment variable holding the path of the inter-step env
/// file. Lines appended there as `KEY=value` become environment variables for
/// every later step of the same job.
pub const ENV_FILE_VAR: &str = "SARIF_RELAY_ENV_FILE";

/// A process-external string-to-string map: written by one step, visible
/// read-only to later steps of the same job. Keys are write-once by
/// convention; `set` must never overwrite an existing value.
pub trait EnvStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// Production store backed by the process environment plus the inter-step
/// env file. Reads see values exported by earlier steps; writes are exported
/// to the current process and appended to the env file for later steps.
pub struct ProcessEnvStore {
    env_file: Option<PathBuf>,
}

impl ProcessEnvStore {
    pub fn new() -> Self {
        Self {
            env_file: std::env::var_os(ENV_FILE_VAR).map(PathBuf::from),
        }
    }
}

impl Default for ProcessEnvStore {
    fn default() -> Self {
        Self::new()
    }
}

impl EnvStore for ProcessEnvStore {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok().filter(|v| !v.is_empty())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        if let Some(existing) = self.get(key) {
            if existing != value {
                warn!("refusing to overwrite {key} (kept existing value)");
            }
            return Ok(());
        }

        // SAFETY: the pipeline is single-threaded; no other thread reads the
        // environment concurrently.
        unsafe { std::env::set_var(key, value) };

        if let Some(path) = &self.env_file {
            let mut f = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("opening env file: {}", path.display()))?;
            writeln!(f, "{key}={value}")
                .with_context(|| format!("appending to env file: {}", path.display()))?;
            debug!("exported {key} for later steps");
        } else {
            warn!("{ENV_FILE_VAR} is not set; {key} will not survive this step");
        }

        Ok(())
    }
}

/// In-memory store for tests and local runs outside a CI job.
#[derive(Default)]
pub struct MemoryEnvStore {
    map: RefCell<HashMap<String, String>>,
}

impl MemoryEnvStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(pairs: &[(&str, &str)]) -> Self {
        let store = Self::default();
        for (k, v) in pairs {
            store
                .map
                .borrow_mut()
                .insert((*k).to_string(), (*v).to_string());
        }
        store
    }
}

impl EnvStore for MemoryEnvStore {
    fn get(&self, key: &str) -> Option<String> {
        self.map.borrow().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.map
            .borrow_mut()
            .entry(key.to_string())
            .or_insert_with(|| value.to_string());
        Ok(())
    }
}
