use crate::{
    api::ApiTransport,
    config::Config,
    context::JobContext,
    errors::UploadError,
    fingerprint::Fingerprinter,
    sarif,
    store::EnvStore,
    upload::{self, PayloadInput, Sleeper, UploadStats, Uploader},
    validate,
};
use anyhow::Context;
use std::path::Path;
use tracing::{debug, info};

pub struct Pipeline<'a> {
    cfg: &'a Config,
    transport: &'a dyn ApiTransport,
    sleeper: &'a dyn Sleeper,
    store: &'a dyn EnvStore,
    fingerprinter: &'a dyn Fingerprinter,
}

pub struct RunInput<'a> {
    pub ctx: &'a JobContext,
    pub analysis_key: String,
    pub analysis_name: String,
    pub checkout_uri: String,
    pub started_at: String,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        cfg: &'a Config,
        transport: &'a dyn ApiTransport,
        sleeper: &'a dyn Sleeper,
        store: &'a dyn EnvStore,
        fingerprinter: &'a dyn Fingerprinter,
    ) -> Self {
        Self {
            cfg,
            transport,
            sleeper,
            store,
            fingerprinter,
        }
    }

    /// One upload invocation: resolve result files, merge, validate,
    /// fingerprint, build the payload, deliver with retry. Each phase runs
    /// to completion before the next begins.
    pub fn run(&self, input: &Path, run: RunInput<'_>) -> Result<UploadStats, UploadError> {
        let files = sarif::resolve_sarif_files(input, &self.cfg.upload.results_suffix)?;
        info!("merging {} result file(s)", files.len());

        let doc = sarif::combine(&files)?;
        let num_results = sarif::count_results(&doc);
        let tool_names = sarif::tool_names(&doc);
        info!("merged document: {num_results} result(s) from {tool_names:?}");

        if self.cfg.upload.validate_schema {
            validate::validate_document(&doc)?;
        } else {
            debug!("schema validation disabled in config");
        }

        let serialized = serde_json::to_string(&doc).context("serializing merged SARIF")?;
        let fingerprinted = self
            .fingerprinter
            .add_fingerprints(&serialized)
            .map_err(UploadError::Fingerprint)?;

        let (payload, stats) = upload::build_payload(
            &fingerprinted,
            PayloadInput {
                ctx: run.ctx,
                analysis_key: run.analysis_key,
                analysis_name: run.analysis_name,
                checkout_uri: run.checkout_uri,
                started_at: run.started_at,
                tool_names,
                num_results,
            },
        )?;

        let upload_url = format!(
            "{}/repos/{}/code-scanning/analysis",
            self.cfg.api.base_url.trim_end_matches('/'),
            run.ctx.repository
        );
        let uploader = Uploader::new(
            self.transport,
            self.sleeper,
            self.store,
            upload_url,
            self.cfg.upload.max_payload_bytes,
            self.cfg.upload.test_mode,
        );
        uploader.upload_with_retry(&payload)?;

        info!(
            "upload complete: raw={}B zipped={}B results={}",
            stats.raw_upload_size_bytes, stats.zipped_upload_size_bytes, stats.num_results_in_sarif
        );
        Ok(stats)
    }
}
