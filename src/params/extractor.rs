use super::container::container_settings;
use super::deploy::deploy_settings;
use super::document::ParameterDocument;
use super::ecosystem::{decide, defaults_for};
use super::overrides::{apply_override, build_prompt, extract_json_object, OverrideError, SYSTEM_PROMPT};
use crate::features::FeaturesDocument;
use crate::label::PipelineLabel;
use crate::llm::{ChatMessage, LLMClient, LLMRequest};
use crate::merge::MergeSignal;
use crate::rules::{basename, build_summary, Evidence};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const DEFAULT_MAX_PROMPT_CHARS: usize = 8000;
pub const DEFAULT_OVERRIDE_TIMEOUT: Duration = Duration::from_secs(30);
const OVERRIDE_MAX_TOKENS: u32 = 1024;

const SUBPROJECT_MANIFESTS: &[&str] = &[
    "package.json",
    "requirements.txt",
    "pyproject.toml",
    "setup.py",
    "pom.xml",
    "build.gradle",
    "build.gradle.kts",
    "go.mod",
];

/// Outcome of the optional model override
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OverrideStatus {
    NotConfigured,
    Applied,
    Failed { reason: String },
}

impl OverrideStatus {
    pub fn is_failed(&self) -> bool {
        matches!(self, OverrideStatus::Failed { .. })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Extraction {
    pub document: ParameterDocument,
    pub override_status: OverrideStatus,
}

/// Builds the parameter document: deterministic defaults first, then an
/// optional model-proposed patch.
pub struct ParameterExtractor {
    client: Option<Arc<dyn LLMClient>>,
    max_prompt_chars: usize,
    timeout: Duration,
}

impl Default for ParameterExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ParameterExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParameterExtractor")
            .field("client", &self.client.as_ref().map(|c| c.name().to_string()))
            .field("max_prompt_chars", &self.max_prompt_chars)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl ParameterExtractor {
    pub fn new() -> Self {
        Self {
            client: None,
            max_prompt_chars: DEFAULT_MAX_PROMPT_CHARS,
            timeout: DEFAULT_OVERRIDE_TIMEOUT,
        }
    }

    pub fn with_client(mut self, client: Arc<dyn LLMClient>) -> Self {
        self.client = Some(client);
        self
    }

    pub fn with_max_prompt_chars(mut self, max_prompt_chars: usize) -> Self {
        self.max_prompt_chars = max_prompt_chars;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn has_override(&self) -> bool {
        self.client.is_some()
    }

    /// Deterministic phase. Never fails and never performs I/O.
    pub fn extract_base(&self, features: &FeaturesDocument, signal: &MergeSignal) -> ParameterDocument {
        let ev = Evidence::from_features(features);
        let static_site = signal.is_chosen(PipelineLabel::Static) || ev.is_markup_heavy();
        let ecosystem = decide(&ev, &signal.chosen, static_site);

        let mut doc = defaults_for(ecosystem, features, &ev);

        if let Some((container, secrets)) = container_settings(features, &ev) {
            doc.container = container;
            doc.require_secrets(secrets);
        }

        if let Some((deploy, secret)) = deploy_settings(&ev) {
            doc.deploy = deploy;
            doc.require_secrets([secret]);
        }

        doc.triggers.branches = vec![features.branch_or_default().to_string()];
        doc.path_filters = path_filters(&ev);

        info!(
            ecosystem = %ecosystem,
            primary = %signal.primary,
            container = doc.container.enabled,
            deploy = doc.deploy.enabled,
            "Base parameters extracted"
        );

        doc
    }

    /// Both phases. A failed override is reported and the base document kept.
    pub async fn extract(&self, features: &FeaturesDocument, signal: &MergeSignal) -> Extraction {
        let base = self.extract_base(features, signal);

        let Some(client) = &self.client else {
            return Extraction {
                document: base,
                override_status: OverrideStatus::NotConfigured,
            };
        };

        match self.run_override(client.as_ref(), features, signal, &base).await {
            Ok(document) => {
                info!(client = client.name(), "Override applied");
                Extraction {
                    document,
                    override_status: OverrideStatus::Applied,
                }
            }
            Err(e) => {
                warn!(client = client.name(), error = %e, "Override failed, keeping base parameters");
                Extraction {
                    document: base,
                    override_status: OverrideStatus::Failed {
                        reason: e.to_string(),
                    },
                }
            }
        }
    }

    async fn run_override(
        &self,
        client: &dyn LLMClient,
        features: &FeaturesDocument,
        signal: &MergeSignal,
        base: &ParameterDocument,
    ) -> Result<ParameterDocument, OverrideError> {
        let summary = build_summary(&Evidence::from_features(features));
        let system_chars = SYSTEM_PROMPT.chars().count();
        let budget = self.max_prompt_chars.saturating_sub(system_chars);
        let prompt = build_prompt(&summary, &signal.describe(), base, budget);

        let request = LLMRequest::new(vec![ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(prompt)])
            .with_temperature(0.1)
            .with_max_tokens(OVERRIDE_MAX_TOKENS);
        debug!(prompt_chars = request.prompt_chars(), "Sending override request");

        let response = match tokio::time::timeout(self.timeout, client.chat(request)).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(OverrideError::Timeout {
                    seconds: self.timeout.as_secs(),
                })
            }
        };

        let patch = extract_json_object(&response.content)?;
        let (document, dropped) = apply_override(base, &patch)?;
        if !dropped.is_empty() {
            warn!(keys = ?dropped, "Dropped unknown override keys");
        }
        Ok(document)
    }
}

/// Sub-project directories holding an ecosystem manifest, mapped to their
/// path globs. The repository root is never a sub-project.
fn path_filters(ev: &Evidence) -> BTreeMap<String, Vec<String>> {
    let mut filters = BTreeMap::new();
    for path in &ev.paths {
        if path.split('/').any(|segment| segment == "node_modules" || segment == "vendor") {
            continue;
        }
        let name = basename(path);
        if !(SUBPROJECT_MANIFESTS.contains(&name) || name.ends_with(".tf")) {
            continue;
        }
        let Some((dir, _)) = path.rsplit_once('/') else {
            continue;
        };
        if dir.is_empty() {
            continue;
        }
        filters
            .entry(dir.to_string())
            .or_insert_with(|| vec![format!("{}/**", dir)]);
    }
    filters
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::BackendError;
    use crate::classifier::ClassifierResult;
    use crate::llm::{MockLLMClient, MockResponse};
    use crate::merge::{merge, TemplatePolicy};
    use crate::rules::RuleEngine;
    use serde_json::{json, Value};

    fn features(value: Value) -> FeaturesDocument {
        FeaturesDocument::from_value(&value).unwrap()
    }

    fn signal_for(features: &FeaturesDocument) -> MergeSignal {
        let detection = RuleEngine::new().detect(features);
        let merged = merge(&detection.candidates, &ClassifierResult::empty("none", Value::Null));
        MergeSignal::from_merged(merged, &TemplatePolicy::SinglePrimary)
    }

    #[test]
    fn test_node_with_container() {
        let f = features(json!({
            "repository": "acme/shop",
            "files": ["package.json", "package-lock.json", "Dockerfile"],
            "manifests": {"package.json": r#"{"scripts": {"test": "jest"}}"#},
            "defaultBranch": "trunk"
        }));
        let doc = ParameterExtractor::new().extract_base(&f, &signal_for(&f));
        assert_eq!(doc.project_type, "node");
        assert_eq!(doc.install_command, "npm ci");
        assert_eq!(doc.test_command, "npm test");
        assert!(doc.container.enabled);
        assert_eq!(doc.container.image, "ghcr.io/acme/shop");
        assert_eq!(doc.secrets_required, vec!["GITHUB_TOKEN"]);
        assert_eq!(doc.triggers.branches, vec!["trunk"]);
        assert!(doc.triggers.push && doc.triggers.pull_request && doc.triggers.release_on_tag);
    }

    #[test]
    fn test_generic_document() {
        let f = features(json!({"files": ["README.md", "LICENSE"]}));
        let doc = ParameterExtractor::new().extract_base(&f, &signal_for(&f));
        assert_eq!(doc, {
            let mut expected = ParameterDocument::default();
            expected.triggers.branches = vec!["main".to_string()];
            expected
        });
    }

    #[test]
    fn test_path_filters_for_subprojects() {
        let f = features(json!({
            "files": [
                "package.json",
                "frontend/package.json",
                "frontend/node_modules/left-pad/package.json",
                "services/api/requirements.txt",
                "infra/main.tf",
                "infra/variables.tf"
            ]
        }));
        let doc = ParameterExtractor::new().extract_base(&f, &signal_for(&f));
        let dirs: Vec<&str> = doc.path_filters.keys().map(String::as_str).collect();
        assert_eq!(dirs, vec!["frontend", "infra", "services/api"]);
        assert_eq!(doc.path_filters["infra"], vec!["infra/**"]);
    }

    #[test]
    fn test_static_site_deploys() {
        let f = features(json!({
            "files": ["index.html", "styles.css", "netlify.toml"],
            "languages": {"HTML": 70.0, "CSS": 30.0}
        }));
        let doc = ParameterExtractor::new().extract_base(&f, &signal_for(&f));
        assert_eq!(doc.project_type, "static");
        assert!(doc.deploy.enabled);
        assert_eq!(doc.deploy.provider, "netlify");
        assert_eq!(doc.secrets_required, vec!["NETLIFY_AUTH_TOKEN"]);
    }

    #[tokio::test]
    async fn test_without_client_is_not_configured() {
        let f = features(json!({"files": ["go.mod"]}));
        let extraction = ParameterExtractor::new().extract(&f, &signal_for(&f)).await;
        assert_eq!(extraction.override_status, OverrideStatus::NotConfigured);
        assert_eq!(extraction.document.project_type, "go");
    }

    #[tokio::test]
    async fn test_override_applied() {
        let f = features(json!({"files": ["go.mod"]}));
        let mock = Arc::new(MockLLMClient::new());
        mock.add_response(MockResponse::text(
            "```json\n{\"test_command\": \"go test -race ./...\", \"matrix\": {\"versions\": [\"1.22\"]}}\n```",
        ));
        let extractor = ParameterExtractor::new().with_client(mock.clone());
        let extraction = extractor.extract(&f, &signal_for(&f)).await;

        assert_eq!(extraction.override_status, OverrideStatus::Applied);
        assert_eq!(extraction.document.test_command, "go test -race ./...");
        assert_eq!(extraction.document.matrix.name, "go-version");
        assert_eq!(extraction.document.matrix.versions, vec!["1.22"]);

        let requests = mock.requests();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].prompt_chars() <= DEFAULT_MAX_PROMPT_CHARS);
    }

    #[tokio::test]
    async fn test_override_failures_keep_base() {
        let f = features(json!({"files": ["go.mod"]}));
        let mock = Arc::new(MockLLMClient::new());
        mock.add_responses([
            MockResponse::text("I cannot help with that."),
            MockResponse::error(BackendError::AuthenticationError {
                message: "bad key".to_string(),
            }),
        ]);
        let extractor = ParameterExtractor::new().with_client(mock.clone());
        let base = extractor.extract_base(&f, &signal_for(&f));

        for _ in 0..2 {
            let extraction = extractor.extract(&f, &signal_for(&f)).await;
            assert!(extraction.override_status.is_failed());
            assert_eq!(extraction.document, base);
        }
    }

    #[tokio::test]
    async fn test_override_timeout() {
        let f = features(json!({"files": ["go.mod"]}));
        let mock = Arc::new(MockLLMClient::new());
        mock.add_response(MockResponse::text("{}").delayed(Duration::from_secs(5)));
        let extractor = ParameterExtractor::new()
            .with_client(mock)
            .with_timeout(Duration::from_millis(50));

        let extraction = extractor.extract(&f, &signal_for(&f)).await;
        match extraction.override_status {
            OverrideStatus::Failed { reason } => assert!(reason.contains("did not answer")),
            other => panic!("unexpected status {:?}", other),
        }
        assert_eq!(extraction.document.project_type, "go");
    }
}
