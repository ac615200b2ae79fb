use crate::classifier::{ClassifierReport, ClassifierService, ClassifierSource, ClassifyOptions};
use crate::config::{CiforgeConfig, ConfigError};
use crate::features::{FeaturesDocument, FeaturesError};
use crate::label::PipelineLabel;
use crate::llm::select_override_client;
use crate::merge::{merge, MergeSignal, MergedCandidate, TemplatePolicy};
use crate::params::{OverrideStatus, ParameterDocument, ParameterExtractor};
use crate::rules::{Detection, RuleEngine};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error(transparent)]
    Features(#[from] FeaturesError),

    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

/// Everything one run produced, in pipeline order
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub run_id: Uuid,
    pub analyzed_at: DateTime<Utc>,
    pub repository: Option<String>,
    pub detection: Detection,
    pub classifier: ClassifierReport,
    pub merged: Vec<MergedCandidate>,
    pub chosen: Vec<PipelineLabel>,
    pub primary: PipelineLabel,
    pub parameters: ParameterDocument,
    pub override_status: OverrideStatus,
    /// Every fallback taken during the run
    pub degraded: Vec<String>,
}

impl AnalysisReport {
    pub fn is_degraded(&self) -> bool {
        !self.degraded.is_empty()
    }
}

/// Runs rules, classifier, merge and extraction for one features document.
///
/// Holds no per-run state, so one analyzer can serve many runs concurrently
/// behind an `Arc`.
#[derive(Debug)]
pub struct Analyzer {
    rules: RuleEngine,
    classifier: ClassifierService,
    extractor: ParameterExtractor,
    policy: TemplatePolicy,
    classify_options: ClassifyOptions,
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new(ClassifierService::heuristic_only(), ParameterExtractor::new())
    }
}

impl Analyzer {
    pub fn new(classifier: ClassifierService, extractor: ParameterExtractor) -> Self {
        Self {
            rules: RuleEngine::new(),
            classifier,
            extractor,
            policy: TemplatePolicy::default(),
            classify_options: ClassifyOptions::default(),
        }
    }

    /// Wires every component from configuration. The override phase is only
    /// enabled when a model and its credential are both present.
    pub fn from_config(config: &CiforgeConfig) -> Result<Self, AnalysisError> {
        config.validate()?;

        let mut extractor = ParameterExtractor::new()
            .with_max_prompt_chars(config.max_prompt_chars)
            .with_timeout(config.request_timeout());
        if let Some(selected) = select_override_client(config) {
            info!("Override model enabled: {}", selected.description);
            extractor = extractor.with_client(selected.client);
        }

        Ok(Self::new(ClassifierService::from_config(config), extractor)
            .with_policy(config.template_policy()))
    }

    pub fn with_policy(mut self, policy: TemplatePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_classify_options(mut self, options: ClassifyOptions) -> Self {
        self.classify_options = options;
        self
    }

    pub fn policy(&self) -> &TemplatePolicy {
        &self.policy
    }

    /// Rule engine only, no I/O
    pub fn detect(&self, features: &FeaturesDocument) -> Detection {
        self.rules.detect(features)
    }

    pub async fn analyze_json(&self, raw: &str) -> Result<AnalysisReport, AnalysisError> {
        let features = FeaturesDocument::from_json(raw)?;
        Ok(self.analyze(features).await)
    }

    pub async fn analyze(&self, features: FeaturesDocument) -> AnalysisReport {
        let start = Instant::now();
        let run_id = Uuid::new_v4();
        let repository = features.repository.as_ref().map(|r| r.full_name());
        info!(
            run_id = %run_id,
            repository = repository.as_deref().unwrap_or("unknown"),
            "Starting analysis"
        );
        let mut degraded = Vec::new();

        let detection = self.rules.detect(&features);
        debug!(candidates = detection.candidates.len(), "Rule engine finished");

        let classifier = self
            .classifier
            .classify(
                &detection.summary,
                &PipelineLabel::classifier_label_space(),
                &self.classify_options,
            )
            .await;
        if let Some(reason) = &classifier.failure {
            degraded.push(format!(
                "classifier failed ({}), {} scores used",
                reason, classifier.source
            ));
        } else if classifier.source == ClassifierSource::Empty {
            degraded.push("classifier not configured, rule scores only".to_string());
        } else if classifier.source == ClassifierSource::Heuristic && self.classifier.has_remote() {
            degraded.push("remote classifier skipped, heuristic scores used".to_string());
        }

        let merged = merge(&detection.candidates, &classifier.result);
        let signal = MergeSignal::from_merged(merged, &self.policy);
        if signal.primary == PipelineLabel::Generic {
            degraded.push("no specific pipeline type detected, generic template chosen".to_string());
        }

        let extraction = self.extractor.extract(&features, &signal).await;
        if let OverrideStatus::Failed { reason } = &extraction.override_status {
            degraded.push(format!("override failed ({}), base parameters kept", reason));
        }

        for note in &degraded {
            warn!(run_id = %run_id, "{}", note);
        }
        info!(
            run_id = %run_id,
            primary = %signal.primary,
            chosen = signal.chosen.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Analysis complete"
        );

        let MergeSignal {
            chosen,
            merged,
            primary,
        } = signal;

        AnalysisReport {
            run_id,
            analyzed_at: Utc::now(),
            repository,
            detection,
            classifier,
            merged,
            chosen,
            primary,
            parameters: extraction.document,
            override_status: extraction.override_status,
            degraded,
        }
    }
}
