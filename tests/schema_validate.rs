use sarif_relay::errors::UploadError;
use sarif_relay::validate::validate_document;

#[test]
fn minimal_document_passes() {
    let doc = serde_json::json!({
        "version": "2.1.0",
        "runs": [{
            "tool": { "driver": { "name": "CodeQL" } },
            "results": [{ "ruleId": "js/xss", "message": { "text": "bad" } }],
        }],
    });
    validate_document(&doc).unwrap();
}

#[test]
fn missing_required_fields_are_all_reported() {
    // Two independent violations: run 0 has no tool, run 1's result has no
    // message. Both must show up in one aggregated error.
    let doc = serde_json::json!({
        "version": "2.1.0",
        "runs": [
            {},
            { "tool": { "driver": { "name": "X" } }, "results": [{ "ruleId": "r" }] },
        ],
    });

    let err = validate_document(&doc).unwrap_err();
    let message = match &err {
        UploadError::SchemaValidation(m) => m.clone(),
        other => panic!("expected SchemaValidation, got {other:?}"),
    };
    assert!(message.contains("tool"), "missing tool not reported: {message}");
    assert!(message.contains("message"), "missing message not reported: {message}");
    assert!(message.contains('\n'), "violations should be newline-separated");
}

#[test]
fn wrong_version_is_a_violation() {
    let doc = serde_json::json!({ "version": "1.0.0", "runs": [] });
    let err = validate_document(&doc).unwrap_err();
    assert!(matches!(err, UploadError::SchemaValidation(_)));
}
