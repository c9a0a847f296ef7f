use anyhow::{Context, Result};
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::debug;

/// Pure transform adding stable per-result identifiers to a serialized SARIF
/// document, run once between validation and payload construction. The
/// identifiers let the server deduplicate the same finding across uploads.
pub trait Fingerprinter {
    fn add_fingerprints(&self, sarif: &str) -> Result<String>;
}

/// Leaves the document untouched (fingerprinting disabled in config).
pub struct NoopFingerprinter;

impl Fingerprinter for NoopFingerprinter {
    fn add_fingerprints(&self, sarif: &str) -> Result<String> {
        Ok(sarif.to_string())
    }
}

const LINE_HASH_KEY: &str = "primaryLocationLineHash";

/// Fills `partialFingerprints.primaryLocationLineHash` on every result that
/// lacks one, from the rule id and the primary physical location. Existing
/// fingerprints are never overwritten: a producer that computed its own hash
/// knows more about the result than we do.
pub struct LineHashFingerprinter;

impl Fingerprinter for LineHashFingerprinter {
    fn add_fingerprints(&self, sarif: &str) -> Result<String> {
        let mut doc: Value =
            serde_json::from_str(sarif).context("parsing SARIF for fingerprinting")?;

        let mut added = 0usize;
        if let Some(runs) = doc.get_mut("runs").and_then(Value::as_array_mut) {
            for run in runs {
                let Some(results) = run.get_mut("results").and_then(Value::as_array_mut) else {
                    continue;
                };
                for result in results {
                    if result
                        .pointer(&format!("/partialFingerprints/{LINE_HASH_KEY}"))
                        .is_some()
                    {
                        continue;
                    }
                    let hash = line_hash(result);
                    let fingerprints = result
                        .as_object_mut()
                        .and_then(|r| {
                            r.entry("partialFingerprints")
                                .or_insert_with(|| Value::Object(Default::default()))
                                .as_object_mut()
                        })
                        .context("result is not an object")?;
                    fingerprints.insert(LINE_HASH_KEY.to_string(), Value::String(hash));
                    added += 1;
                }
            }
        }

        debug!("added {added} fingerprint(s)");
        serde_json::to_string(&doc).context("serializing fingerprinted SARIF")
    }
}

fn line_hash(result: &Value) -> String {
    let rule_id = result.get("ruleId").and_then(Value::as_str).unwrap_or("");
    let uri = result
        .pointer("/locations/0/physicalLocation/artifactLocation/uri")
        .and_then(Value::as_str)
        .unwrap_or("");
    let start_line = result
        .pointer("/locations/0/physicalLocation/region/startLine")
        .and_then(Value::as_u64)
        .unwrap_or(0);

    let mut h = Sha256::new();
    h.update(rule_id.as_bytes());
    h.update(b":");
    h.update(uri.as_bytes());
    h.update(b":");
    h.update(start_line.to_le_bytes());
    format!("{:x}", h.finalize())
}
