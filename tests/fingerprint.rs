use sarif_relay::fingerprint::{Fingerprinter, LineHashFingerprinter, NoopFingerprinter};

fn sarif_with_result(result: serde_json::Value) -> String {
    serde_json::json!({
        "version": "2.1.0",
        "runs": [{
            "tool": { "driver": { "name": "T" } },
            "results": [result],
        }],
    })
    .to_string()
}

#[test]
fn adds_line_hash_when_missing() {
    let sarif = sarif_with_result(serde_json::json!({
        "ruleId": "js/xss",
        "message": { "text": "m" },
        "locations": [{
            "physicalLocation": {
                "artifactLocation": { "uri": "src/a.js" },
                "region": { "startLine": 12 },
            },
        }],
    }));

    let out: serde_json::Value =
        serde_json::from_str(&LineHashFingerprinter.add_fingerprints(&sarif).unwrap()).unwrap();
    let hash = out
        .pointer("/runs/0/results/0/partialFingerprints/primaryLocationLineHash")
        .and_then(serde_json::Value::as_str)
        .unwrap();
    assert_eq!(hash.len(), 64);
}

#[test]
fn existing_fingerprint_is_preserved() {
    let sarif = sarif_with_result(serde_json::json!({
        "ruleId": "js/xss",
        "message": { "text": "m" },
        "partialFingerprints": { "primaryLocationLineHash": "producer-supplied" },
    }));

    let out: serde_json::Value =
        serde_json::from_str(&LineHashFingerprinter.add_fingerprints(&sarif).unwrap()).unwrap();
    assert_eq!(
        out.pointer("/runs/0/results/0/partialFingerprints/primaryLocationLineHash")
            .and_then(serde_json::Value::as_str),
        Some("producer-supplied")
    );
}

#[test]
fn same_result_hashes_identically() {
    let sarif = sarif_with_result(serde_json::json!({
        "ruleId": "r",
        "message": { "text": "m" },
        "locations": [{
            "physicalLocation": {
                "artifactLocation": { "uri": "a.rs" },
                "region": { "startLine": 1 },
            },
        }],
    }));

    let a = LineHashFingerprinter.add_fingerprints(&sarif).unwrap();
    let b = LineHashFingerprinter.add_fingerprints(&sarif).unwrap();
    assert_eq!(a, b);
}

#[test]
fn noop_leaves_document_untouched() {
    let sarif = sarif_with_result(serde_json::json!({ "ruleId": "r", "message": { "text": "m" } }));
    assert_eq!(NoopFingerprinter.add_fingerprints(&sarif).unwrap(), sarif);
}
