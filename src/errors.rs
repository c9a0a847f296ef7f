use thiserror::Error;

/// Failures on the upload path. Everything here is fatal to the pipeline;
/// only `Retryable` 5xx responses inside the uploader ever lead to another
/// attempt, and they surface as `RetriesExhausted` once the budget is spent.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("could not parse {path} as SARIF: {source}")]
    MalformedDocument {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("cannot combine SARIF files with versions {first} and {other} (in {path})")]
    VersionMismatch {
        first: String,
        other: String,
        path: String,
    },

    /// Aggregate of every schema violation found, newline-separated, so one
    /// fix cycle is enough.
    #[error("SARIF failed schema validation:\n{0}")]
    SchemaValidation(String),

    #[error("a SARIF upload was already attempted for this job")]
    DuplicateUpload,

    #[error("serialized payload is {actual} bytes, over the {limit} byte limit")]
    PayloadTooLarge { actual: u64, limit: u64 },

    #[error(
        "upload rejected (status {status:?}, request id {request_id:?}): {body}"
    )]
    Http {
        status: Option<u16>,
        request_id: Option<String>,
        body: String,
    },

    #[error(
        "upload retries exhausted (last status {status}, request id {request_id:?}): {body}"
    )]
    RetriesExhausted {
        status: u16,
        request_id: Option<String>,
        body: String,
    },

    #[error("adding fingerprints failed: {0:#}")]
    Fingerprint(anyhow::Error),

    #[error("reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("no files matching the results suffix in {dir}")]
    NoResultFiles { dir: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
