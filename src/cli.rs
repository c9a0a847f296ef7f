use crate::{
    api::HttpTransport,
    config::Config,
    context::JobContext,
    fingerprint::{Fingerprinter, LineHashFingerprinter, NoopFingerprinter},
    pipeline::{Pipeline, RunInput},
    sarif,
    status::{ApiWorkflowMetadata, JobStatus, StatusReporter},
    store::{EnvStore, ProcessEnvStore},
    upload::ThreadSleeper,
    util::{ensure_dir, now_rfc3339},
    validate,
};
use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

const ACTION_NAME: &str = "upload-sarif";

#[derive(Parser, Debug)]
#[command(name = "sarif-relay")]
#[command(about = "CI SARIF upload pipeline (merge + schema check + bounded retry + status telemetry)")]
pub struct Args {
    #[command(subcommand)]
    pub cmd: Command,

    /// Path to config TOML. If omitted, uses ./sarif-relay.toml if present.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override log level (trace/debug/info/warn/error).
    #[arg(long)]
    pub log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Merge, validate and upload result files, reporting step status.
    Upload {
        /// A SARIF file, or a directory scanned (non-recursively) for them.
        #[arg(long)]
        input: PathBuf,
        /// Analysis name distinguishing multiple analyses of one commit.
        #[arg(long)]
        category: Option<String>,
        /// URI of the analyzed checkout; defaults to the working directory.
        #[arg(long)]
        checkout_uri: Option<String>,
        /// Matrix variables for this job, as a JSON object.
        #[arg(long)]
        matrix: Option<String>,
    },
    /// Merge and validate only; prints a summary without any network calls.
    Check {
        #[arg(long)]
        input: PathBuf,
    },
}

pub fn dispatch(args: Args) -> Result<()> {
    let cfg_path = resolve_config_path(args.config.as_deref())?;
    let cfg = Config::load(&cfg_path)?;
    let _guard = init_logging(&args, &cfg)?;

    match &args.cmd {
        Command::Upload {
            input,
            category,
            checkout_uri,
            matrix,
        } => upload(
            &cfg,
            input,
            category.as_deref(),
            checkout_uri.as_deref(),
            matrix.as_deref(),
        ),
        Command::Check { input } => check(&cfg, input),
    }
}

fn resolve_config_path(user: Option<&Path>) -> Result<PathBuf> {
    if let Some(p) = user {
        return Ok(p.to_path_buf());
    }
    let default = PathBuf::from("sarif-relay.toml");
    if default.exists() {
        Ok(default)
    } else {
        Ok(PathBuf::from("sarif-relay.example.toml"))
    }
}

fn init_logging(args: &Args, cfg: &Config) -> Result<Option<WorkerGuard>> {
    let level = args
        .log_level
        .as_deref()
        .unwrap_or(cfg.logging.level.as_str());

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // Summaries go to stdout, logs to stderr, so CI scripts can capture the
    // summary JSON alone.
    let stderr_layer = if cfg.logging.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed()
    };

    let (file_layer, guard) = if cfg.logging.write_to_file && !cfg.logging.file_path.is_empty() {
        let path = PathBuf::from(&cfg.logging.file_path);
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        ensure_dir(parent)?;
        let file = std::fs::File::create(&path)
            .with_context(|| format!("create log file: {}", path.display()))?;
        let (non_blocking, guard) = tracing_appender::non_blocking(file);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_target(true)
            .boxed();
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow!("failed to init logging: {e}"))?;

    Ok(guard)
}

fn upload(
    cfg: &Config,
    input: &Path,
    category: Option<&str>,
    checkout_uri: Option<&str>,
    matrix: Option<&str>,
) -> Result<()> {
    let matrix: Option<serde_json::Value> = matrix
        .map(serde_json::from_str)
        .transpose()
        .context("parsing --matrix as JSON")?;

    let store = ProcessEnvStore::new();
    let ctx = JobContext::from_store(&store, matrix)?;

    let token = store.get(&cfg.api.token_env);
    if token.is_none() {
        warn!(
            "{} is not set; API requests will be unauthenticated",
            cfg.api.token_env
        );
    }
    let transport = HttpTransport::new(cfg.api.timeout_seconds, token)?;
    let metadata = ApiWorkflowMetadata::new(&transport, &cfg.api.base_url, &ctx.repository);
    let reporter = StatusReporter::new(&transport, &metadata, &store, &ctx, &cfg.api.base_url);

    let action_started_at = now_rfc3339();
    let starting = reporter.build_report(
        ACTION_NAME,
        JobStatus::Starting,
        &action_started_at,
        None,
        None,
    )?;
    if !reporter.send(&starting, false) {
        info!("code scanning is not enabled for this repository; skipping upload");
        return Ok(());
    }

    let analysis_key = reporter.analysis_key()?;
    let started_at = reporter.job_started_at(&action_started_at)?;
    let analysis_name = category
        .map(str::to_string)
        .unwrap_or_else(|| ctx.workflow_name.clone());
    let checkout_uri = match checkout_uri {
        Some(uri) => uri.to_string(),
        None => {
            let cwd = std::env::current_dir().context("current_dir")?;
            format!("file://{}", cwd.display())
        }
    };

    let fingerprinter: Box<dyn Fingerprinter> = if cfg.upload.add_fingerprints {
        Box::new(LineHashFingerprinter)
    } else {
        Box::new(NoopFingerprinter)
    };
    let sleeper = ThreadSleeper;
    let pipeline = Pipeline::new(cfg, &transport, &sleeper, &store, fingerprinter.as_ref());

    let outcome = pipeline.run(
        input,
        RunInput {
            ctx: &ctx,
            analysis_key,
            analysis_name,
            checkout_uri,
            started_at,
        },
    );

    match outcome {
        Ok(stats) => {
            let success = reporter.build_report(
                ACTION_NAME,
                JobStatus::Success,
                &action_started_at,
                None,
                None,
            )?;
            reporter.send(&success, true);
            println!("{}", serde_json::to_string_pretty(&stats)?);
            Ok(())
        }
        Err(err) => {
            let failure = reporter.build_report(
                ACTION_NAME,
                JobStatus::Failure,
                &action_started_at,
                Some(err.to_string()),
                Some(format!("{err:?}")),
            )?;
            reporter.send(&failure, true);
            Err(err.into())
        }
    }
}

fn check(cfg: &Config, input: &Path) -> Result<()> {
    let files = sarif::resolve_sarif_files(input, &cfg.upload.results_suffix)?;
    let doc = sarif::combine(&files)?;

    if cfg.upload.validate_schema {
        validate::validate_document(&doc)?;
    }

    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "files": files,
            "version": doc.get("version"),
            "num_results": sarif::count_results(&doc),
            "tool_names": sarif::tool_names(&doc),
            "valid": true,
        }))?
    );
    Ok(())
}
