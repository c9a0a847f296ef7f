use crate::errors::UploadError;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Resolve the set of result files for one upload: either a single file, or
/// every file in `input` (non-recursive) ending in `suffix`, sorted by name
/// so merge order is deterministic. An empty directory match is an error.
pub fn resolve_sarif_files(input: &Path, suffix: &str) -> Result<Vec<PathBuf>, UploadError> {
    if input.is_file() {
        return Ok(vec![input.to_path_buf()]);
    }

    let entries = std::fs::read_dir(input).map_err(|source| UploadError::Io {
        path: input.display().to_string(),
        source,
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| UploadError::Io {
            path: input.display().to_string(),
            source,
        })?;
        let path = entry.path();
        if path.is_file()
            && path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(suffix))
        {
            files.push(path);
        }
    }

    if files.is_empty() {
        return Err(UploadError::NoResultFiles {
            dir: input.display().to_string(),
        });
    }

    files.sort();
    Ok(files)
}

/// Merge N SARIF files into one document. All inputs must declare the same
/// `version`; `runs` are concatenated in file order, then intra-file order.
/// No deduplication happens here.
pub fn combine(paths: &[PathBuf]) -> Result<Value, UploadError> {
    let mut version: Option<String> = None;
    let mut runs: Vec<Value> = Vec::new();

    for path in paths {
        let raw = std::fs::read_to_string(path).map_err(|source| UploadError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let doc: Value =
            serde_json::from_str(&raw).map_err(|source| UploadError::MalformedDocument {
                path: path.display().to_string(),
                source,
            })?;

        let this_version = doc
            .get("version")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string();

        match &version {
            None => version = Some(this_version),
            Some(first) if *first != this_version => {
                return Err(UploadError::VersionMismatch {
                    first: first.clone(),
                    other: this_version,
                    path: path.display().to_string(),
                });
            }
            Some(_) => {}
        }

        if let Some(Value::Array(doc_runs)) = doc.get("runs") {
            debug!("{}: {} run(s)", path.display(), doc_runs.len());
            runs.extend(doc_runs.iter().cloned());
        }
    }

    Ok(serde_json::json!({
        "version": version.unwrap_or_default(),
        "runs": runs,
    }))
}

/// Total number of results across all runs.
pub fn count_results(doc: &Value) -> u64 {
    doc.get("runs")
        .and_then(Value::as_array)
        .map(|runs| {
            runs.iter()
                .map(|run| {
                    run.get("results")
                        .and_then(Value::as_array)
                        .map(|r| r.len() as u64)
                        .unwrap_or(0)
                })
                .sum()
        })
        .unwrap_or(0)
}

/// Driver name of every run, first-appearance order, no duplicates.
pub fn tool_names(doc: &Value) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    if let Some(runs) = doc.get("runs").and_then(Value::as_array) {
        for run in runs {
            let name = run
                .pointer("/tool/driver/name")
                .and_then(Value::as_str)
                .unwrap_or_default();
            if !name.is_empty() && !names.iter().any(|n| n == name) {
                names.push(name.to_string());
            }
        }
    }
    names
}
