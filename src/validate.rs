use crate::errors::UploadError;
use anyhow::{Context, Result, anyhow};
use jsonschema::Validator;
use serde_json::Value;
use tracing::debug;

/// The schema ships with the binary; it is versioned alongside the code and
/// never fetched at runtime.
const SARIF_SCHEMA: &str = include_str!("../schema/sarif-schema.json");

fn compile_schema() -> Result<Validator> {
    let schema: Value = serde_json::from_str(SARIF_SCHEMA).context("parsing embedded schema")?;
    jsonschema::validator_for(&schema).map_err(|e| anyhow!("compiling embedded schema: {e}"))
}

/// Structural validation against the embedded SARIF schema. Every violation
/// is collected so operators can fix all of them in one pass; a failure is a
/// payload defect and is never retried.
pub fn validate_document(doc: &Value) -> Result<(), UploadError> {
    let validator = compile_schema()?;

    let violations: Vec<String> = validator
        .iter_errors(doc)
        .map(|err| format!("{} (at {})", err, err.instance_path))
        .collect();

    if violations.is_empty() {
        debug!("document passed schema validation");
        return Ok(());
    }

    Err(UploadError::SchemaValidation(violations.join("\n")))
}
