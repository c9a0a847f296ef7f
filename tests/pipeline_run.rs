use sarif_relay::api::{ApiResponse, ApiTransport};
use sarif_relay::config::Config;
use sarif_relay::context::JobContext;
use sarif_relay::errors::UploadError;
use sarif_relay::fingerprint::LineHashFingerprinter;
use sarif_relay::pipeline::{Pipeline, RunInput};
use sarif_relay::store::MemoryEnvStore;
use sarif_relay::upload::Sleeper;
use std::cell::RefCell;
use std::io::Read;
use std::time::Duration;

struct AcceptingTransport {
    puts: RefCell<Vec<(String, serde_json::Value)>>,
}

impl ApiTransport for AcceptingTransport {
    fn put_json(&self, url: &str, body: &serde_json::Value) -> anyhow::Result<ApiResponse> {
        self.puts.borrow_mut().push((url.to_string(), body.clone()));
        Ok(ApiResponse {
            status: Some(202),
            request_id: Some("req-1".into()),
            body: String::new(),
        })
    }

    fn get_json(&self, _url: &str) -> anyhow::Result<serde_json::Value> {
        unreachable!()
    }
}

struct NoSleep;
impl Sleeper for NoSleep {
    fn sleep(&self, _duration: Duration) {}
}

fn test_ctx() -> JobContext {
    let store = MemoryEnvStore::with(&[
        ("GITHUB_REPOSITORY", "octo/demo"),
        ("GITHUB_SHA", "deadbeef"),
        ("GITHUB_REF", "refs/heads/main"),
        ("GITHUB_RUN_ID", "42"),
        ("GITHUB_WORKFLOW", "ci"),
        ("GITHUB_JOB", "analyze"),
    ]);
    JobContext::from_store(&store, None).unwrap()
}

fn write_sarif(dir: &std::path::Path, name: &str, tool: &str, num_results: usize) {
    let results: Vec<_> = (0..num_results)
        .map(|i| {
            serde_json::json!({
                "ruleId": format!("rule-{i}"),
                "message": { "text": "finding" },
                "locations": [{
                    "physicalLocation": {
                        "artifactLocation": { "uri": "src/lib.rs" },
                        "region": { "startLine": i + 1 },
                    },
                }],
            })
        })
        .collect();
    let doc = serde_json::json!({
        "version": "2.1.0",
        "runs": [{ "tool": { "driver": { "name": tool } }, "results": results }],
    });
    std::fs::write(dir.join(name), serde_json::to_string(&doc).unwrap()).unwrap();
}

fn run_input(ctx: &JobContext) -> RunInput<'_> {
    RunInput {
        ctx,
        analysis_key: ".github/workflows/ci.yml:analyze".into(),
        analysis_name: "ci".into(),
        checkout_uri: "file:///work".into(),
        started_at: "2026-08-29T00:00:00Z".into(),
    }
}

#[test]
fn end_to_end_upload_builds_decodable_payload() {
    let dir = tempfile::tempdir().unwrap();
    write_sarif(dir.path(), "a.sarif", "ESLint", 3);
    write_sarif(dir.path(), "b.sarif", "CodeQL", 5);

    let cfg = Config::default();
    let transport = AcceptingTransport {
        puts: RefCell::new(Vec::new()),
    };
    let sleeper = NoSleep;
    let store = MemoryEnvStore::new();
    let fingerprinter = LineHashFingerprinter;
    let ctx = test_ctx();
    let pipeline = Pipeline::new(&cfg, &transport, &sleeper, &store, &fingerprinter);

    let stats = pipeline.run(dir.path(), run_input(&ctx)).unwrap();
    assert_eq!(stats.num_results_in_sarif, 8);
    assert!(stats.raw_upload_size_bytes > 0);

    let puts = transport.puts.borrow();
    assert_eq!(puts.len(), 1);
    let (url, body) = &puts[0];
    assert_eq!(url, "https://api.github.com/repos/octo/demo/code-scanning/analysis");
    assert_eq!(body["commit_oid"], "deadbeef");
    assert_eq!(body["ref"], "refs/heads/main");
    assert_eq!(body["tool_names"], serde_json::json!(["ESLint", "CodeQL"]));

    // The sarif field round-trips through base64 + gzip back to a document
    // with all runs and fingerprints attached.
    use base64::Engine as _;
    let zipped = base64::engine::general_purpose::STANDARD
        .decode(body["sarif"].as_str().unwrap())
        .unwrap();
    let mut decoder = flate2::read::GzDecoder::new(zipped.as_slice());
    let mut sarif = String::new();
    decoder.read_to_string(&mut sarif).unwrap();
    let doc: serde_json::Value = serde_json::from_str(&sarif).unwrap();
    assert_eq!(doc["runs"].as_array().unwrap().len(), 2);
    assert!(
        doc.pointer("/runs/0/results/0/partialFingerprints/primaryLocationLineHash")
            .is_some()
    );
}

#[test]
fn invalid_document_aborts_before_any_network_call() {
    let dir = tempfile::tempdir().unwrap();
    // Run without a tool: fails schema validation.
    let doc = serde_json::json!({ "version": "2.1.0", "runs": [{}] });
    std::fs::write(dir.path().join("bad.sarif"), doc.to_string()).unwrap();

    let cfg = Config::default();
    let transport = AcceptingTransport {
        puts: RefCell::new(Vec::new()),
    };
    let sleeper = NoSleep;
    let store = MemoryEnvStore::new();
    let fingerprinter = LineHashFingerprinter;
    let ctx = test_ctx();
    let pipeline = Pipeline::new(&cfg, &transport, &sleeper, &store, &fingerprinter);

    let err = pipeline.run(dir.path(), run_input(&ctx)).unwrap_err();
    assert!(matches!(err, UploadError::SchemaValidation(_)));
    assert!(transport.puts.borrow().is_empty());
}
