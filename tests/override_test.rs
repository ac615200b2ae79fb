//! Parameter override through the full analysis, with a scripted model

use ciforge::ai::BackendError;
use ciforge::classifier::{ClassifierService, MockClassifier};
use ciforge::llm::{MessageRole, MockLLMClient, MockResponse};
use ciforge::params::{OverrideStatus, ParameterExtractor};
use ciforge::{Analyzer, PipelineLabel};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

fn fixture(name: &str) -> String {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures/features")
        .join(name);
    std::fs::read_to_string(path).unwrap()
}

fn analyzer_with(mock: Arc<MockLLMClient>) -> Analyzer {
    Analyzer::new(
        ClassifierService::heuristic_only(),
        ParameterExtractor::new()
            .with_client(mock)
            .with_timeout(Duration::from_millis(200)),
    )
}

#[tokio::test]
async fn test_override_patch_is_applied() {
    let mock = Arc::new(MockLLMClient::new());
    mock.add_response(MockResponse::text(
        "Here is the patch:\n```json\n{\"test_command\": \"npm run test:ci\", \
         \"matrix\": {\"versions\": [\"20.x\"]}, \"nightly\": true}\n```",
    ));

    let report = analyzer_with(mock.clone())
        .analyze_json(&fixture("node_docker.json"))
        .await
        .unwrap();

    assert_eq!(report.override_status, OverrideStatus::Applied);
    let params = &report.parameters;
    assert_eq!(params.test_command, "npm run test:ci");
    assert_eq!(params.matrix.versions, vec!["20.x"]);
    assert_eq!(params.matrix.name, "node-version");
    assert_eq!(params.install_command, "npm ci");
    assert!(!report.is_degraded());

    let requests = mock.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].messages[0].role, MessageRole::System);
    let prompt = &requests[0].messages[1].content;
    assert!(prompt.contains("checkout-api"));
    assert!(prompt.contains("package.json"));
}

#[tokio::test]
async fn test_invalid_override_keeps_base() {
    let mock = Arc::new(MockLLMClient::new());
    mock.add_response(MockResponse::text(r#"{"project_type": ""}"#));

    let report = analyzer_with(mock)
        .analyze_json(&fixture("node_basic.json"))
        .await
        .unwrap();

    assert!(report.override_status.is_failed());
    assert_eq!(report.parameters.project_type, "node");
    assert!(report.degraded.iter().any(|note| note.starts_with("override failed")));
}

#[tokio::test]
async fn test_override_backend_error_keeps_base() {
    let mock = Arc::new(MockLLMClient::new());
    mock.add_response(MockResponse::error(BackendError::Other {
        message: "rate limited".to_string(),
    }));

    let report = analyzer_with(mock)
        .analyze_json(&fixture("python_java.json"))
        .await
        .unwrap();

    match &report.override_status {
        OverrideStatus::Failed { reason } => assert!(reason.contains("rate limited")),
        other => panic!("expected failure, got {:?}", other),
    }
    assert_eq!(report.parameters.package_manager, "pip");
}

#[tokio::test]
async fn test_slow_override_times_out() {
    let mock = Arc::new(MockLLMClient::new());
    mock.add_response(MockResponse::text(r#"{"test_command": "late"}"#).delayed(Duration::from_secs(5)));

    let report = analyzer_with(mock)
        .analyze_json(&fixture("go_service.json"))
        .await
        .unwrap();

    assert!(report.override_status.is_failed());
    assert_eq!(report.parameters.test_command, "go test ./...");
}

#[tokio::test]
async fn test_remote_classifier_and_override_together() {
    let classifier = Arc::new(MockClassifier::scoring(&[
        ("static", 0.9),
        ("node", 0.05),
        ("docker", 0.05),
    ]));
    let mock = Arc::new(MockLLMClient::new());
    mock.add_response(MockResponse::text(r#"{"deploy": {"mode": "spa"}}"#));

    let analyzer = Analyzer::new(
        ClassifierService::new(Some(classifier.clone())),
        ParameterExtractor::new().with_client(mock),
    );
    let report = analyzer
        .analyze_json(&fixture("static_site.json"))
        .await
        .unwrap();

    assert_eq!(classifier.calls(), 1);
    assert_eq!(report.primary, PipelineLabel::Static);
    assert_eq!(report.parameters.deploy.provider, "netlify");
    assert_eq!(report.parameters.deploy.mode, "spa");
    assert_eq!(report.override_status, OverrideStatus::Applied);
}
