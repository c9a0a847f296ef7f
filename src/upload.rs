use crate::{
    api::ApiTransport,
    context::JobContext,
    errors::UploadError,
    store::{EnvStore, keys},
};
use anyhow::Context;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use flate2::{Compression, write::GzEncoder};
use serde::Serialize;
use serde_json::Value;
use std::io::Write;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Waits before attempts 1..=3. Attempt 0 fires immediately; four attempts
/// total, 21s of sleep worst case. Deliberately short and fixed: a CI job has
/// its own timeout budget, and a service outage longer than this will not be
/// papered over by waiting.
const BACKOFF_SECONDS: [u64; 3] = [1, 5, 15];

/// Built exactly once per upload and resent unchanged across retries.
#[derive(Debug, Clone, Serialize)]
pub struct UploadPayload {
    pub commit_oid: String,
    #[serde(rename = "ref")]
    pub git_ref: String,
    pub analysis_key: String,
    pub analysis_name: String,
    /// The merged document, gzip-compressed then base64-encoded.
    pub sarif: String,
    pub workflow_run_id: u64,
    pub checkout_uri: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<Value>,
    pub started_at: String,
    pub tool_names: Vec<String>,
}

/// Read-only summary handed back to the caller after a successful upload.
#[derive(Debug, Clone, Serialize)]
pub struct UploadStats {
    pub raw_upload_size_bytes: u64,
    pub zipped_upload_size_bytes: u64,
    pub num_results_in_sarif: u64,
}

pub struct PayloadInput<'a> {
    pub ctx: &'a JobContext,
    pub analysis_key: String,
    pub analysis_name: String,
    pub checkout_uri: String,
    pub started_at: String,
    pub tool_names: Vec<String>,
    pub num_results: u64,
}

/// Compress and encode the serialized SARIF and assemble the payload.
pub fn build_payload(
    sarif_json: &str,
    input: PayloadInput<'_>,
) -> Result<(UploadPayload, UploadStats), UploadError> {
    let raw_upload_size_bytes = sarif_json.len() as u64;

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(sarif_json.as_bytes())
        .context("gzip-compressing SARIF")?;
    let zipped = encoder.finish().context("finishing gzip stream")?;
    let zipped_upload_size_bytes = zipped.len() as u64;

    let payload = UploadPayload {
        commit_oid: input.ctx.commit_oid.clone(),
        git_ref: input.ctx.git_ref.clone(),
        analysis_key: input.analysis_key,
        analysis_name: input.analysis_name,
        sarif: BASE64.encode(&zipped),
        workflow_run_id: input.ctx.workflow_run_id,
        checkout_uri: input.checkout_uri,
        environment: input.ctx.matrix.clone(),
        started_at: input.started_at,
        tool_names: input.tool_names,
    };

    let stats = UploadStats {
        raw_upload_size_bytes,
        zipped_upload_size_bytes,
        num_results_in_sarif: input.num_results,
    };

    Ok((payload, stats))
}

/// Injected so tests observe the retry waits without actually sleeping.
pub trait Sleeper {
    fn sleep(&self, duration: Duration);
}

pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

pub struct Uploader<'a> {
    transport: &'a dyn ApiTransport,
    sleeper: &'a dyn Sleeper,
    store: &'a dyn EnvStore,
    url: String,
    max_payload_bytes: u64,
    test_mode: bool,
}

impl<'a> Uploader<'a> {
    pub fn new(
        transport: &'a dyn ApiTransport,
        sleeper: &'a dyn Sleeper,
        store: &'a dyn EnvStore,
        url: String,
        max_payload_bytes: u64,
        test_mode: bool,
    ) -> Self {
        Self {
            transport,
            sleeper,
            store,
            url,
            max_payload_bytes,
            test_mode,
        }
    }

    /// Deliver the payload, retrying 5xx responses on the fixed backoff
    /// schedule. At most one upload may be attempted per job: the sentinel in
    /// the store is checked first and set before the first network call, so a
    /// second invocation fails without touching the network.
    pub fn upload_with_retry(&self, payload: &UploadPayload) -> Result<(), UploadError> {
        if self.store.get(keys::DID_UPLOAD).is_some() {
            return Err(UploadError::DuplicateUpload);
        }
        self.store.set(keys::DID_UPLOAD, "true")?;

        let body = serde_json::to_value(payload).context("serializing upload payload")?;
        let serialized_len = body.to_string().len() as u64;
        if serialized_len > self.max_payload_bytes {
            return Err(UploadError::PayloadTooLarge {
                actual: serialized_len,
                limit: self.max_payload_bytes,
            });
        }

        if self.test_mode {
            info!("test mode: skipping delivery");
            return Ok(());
        }

        let attempts = BACKOFF_SECONDS.len() + 1;

        for attempt in 0..attempts {
            if attempt > 0 {
                let wait = Duration::from_secs(BACKOFF_SECONDS[attempt - 1]);
                debug!("waiting {}s before attempt {attempt}", wait.as_secs());
                self.sleeper.sleep(wait);
            }

            let response = self.transport.put_json(&self.url, &body)?;

            match response.status {
                Some(202) => {
                    info!(
                        "upload accepted on attempt {attempt} (request id {:?})",
                        response.request_id
                    );
                    return Ok(());
                }
                // A 5xx on the final attempt carries different semantics
                // than one we can still retry.
                Some(status) if (500..600).contains(&status) => {
                    if attempt + 1 == attempts {
                        return Err(UploadError::RetriesExhausted {
                            status,
                            request_id: response.request_id,
                            body: response.body,
                        });
                    }
                    warn!(
                        "attempt {attempt} got {status} (request id {:?}); retrying",
                        response.request_id
                    );
                }
                _ => {
                    return Err(UploadError::Http {
                        status: response.status,
                        request_id: response.request_id,
                        body: response.body,
                    });
                }
            }
        }

        unreachable!("loop exits via return")
    }
}
