use super::cache::ClassificationCache;
use super::heuristic::HeuristicClassifier;
use super::remote::HuggingFaceClassifier;
use super::{ClassifierResult, ZeroShotClassifier};
use crate::config::CiforgeConfig;
use crate::label::PipelineLabel;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Outcome of one attempt to reach the remote classifier
#[derive(Debug, Clone, PartialEq)]
pub enum ClassificationOutcome {
    Classified(ClassifierResult),
    /// No remote configured, or remote use disabled for this call
    Unavailable,
    Failed { reason: String },
}

/// Where the returned scores came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassifierSource {
    Remote,
    Cache,
    Heuristic,
    Empty,
}

impl fmt::Display for ClassifierSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ClassifierSource::Remote => "remote",
            ClassifierSource::Cache => "cache",
            ClassifierSource::Heuristic => "heuristic",
            ClassifierSource::Empty => "empty",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierReport {
    pub result: ClassifierResult,
    pub source: ClassifierSource,
    /// Why the remote answer was not used, if it was attempted and failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

impl ClassifierReport {
    /// True when the scores did not come from the configured model
    pub fn is_degraded(&self) -> bool {
        self.failure.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassifyOptions {
    pub use_remote: bool,
    pub use_cache: bool,
}

impl Default for ClassifyOptions {
    fn default() -> Self {
        Self {
            use_remote: true,
            use_cache: true,
        }
    }
}

/// Classifier front door: remote call, cache and fallback policy
///
/// Built once per process and shared; `classify` never fails.
#[derive(Clone)]
pub struct ClassifierService {
    remote: Option<Arc<dyn ZeroShotClassifier>>,
    heuristic: HeuristicClassifier,
    cache: Option<ClassificationCache>,
    heuristic_fallback: bool,
    timeout: Duration,
}

impl ClassifierService {
    pub fn new(remote: Option<Arc<dyn ZeroShotClassifier>>) -> Self {
        Self {
            remote,
            heuristic: HeuristicClassifier::new(),
            cache: None,
            heuristic_fallback: true,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Service with no remote classifier: heuristic scores only
    pub fn heuristic_only() -> Self {
        Self::new(None)
    }

    pub fn from_config(config: &CiforgeConfig) -> Self {
        let remote: Option<Arc<dyn ZeroShotClassifier>> = match &config.classifier_token {
            Some(token) => match HuggingFaceClassifier::new(
                config.classifier_endpoint.clone(),
                config.classifier_model.clone(),
                token.clone(),
                config.request_timeout(),
            ) {
                Ok(client) => {
                    info!(
                        "Zero-shot classifier enabled: {} @ {}",
                        config.classifier_model, config.classifier_endpoint
                    );
                    Some(Arc::new(client))
                }
                Err(e) => {
                    warn!("Zero-shot classifier disabled: {}", e);
                    None
                }
            },
            None => {
                debug!("No classifier token configured");
                None
            }
        };

        let cache = if config.cache_enabled {
            Some(match config.effective_cache_dir() {
                Some(dir) => ClassificationCache::with_dir(dir.join("classifier")),
                None => ClassificationCache::in_memory(),
            })
        } else {
            None
        };

        Self {
            remote,
            heuristic: HeuristicClassifier::new(),
            cache,
            heuristic_fallback: config.heuristic_fallback,
            timeout: config.request_timeout(),
        }
    }

    pub fn with_cache(mut self, cache: ClassificationCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_heuristic_fallback(mut self, enabled: bool) -> Self {
        self.heuristic_fallback = enabled;
        self
    }

    pub fn has_remote(&self) -> bool {
        self.remote.is_some()
    }

    pub fn remote_model(&self) -> Option<&str> {
        self.remote.as_ref().map(|r| r.model())
    }

    pub async fn classify(
        &self,
        summary: &str,
        labels: &[PipelineLabel],
        options: &ClassifyOptions,
    ) -> ClassifierReport {
        let label_names: Vec<String> = labels.iter().map(|l| l.as_str().to_string()).collect();

        let remote = self.remote.as_ref().filter(|_| options.use_remote);
        let cache = self.cache.as_ref().filter(|_| options.use_cache);

        let outcome = match remote {
            None => ClassificationOutcome::Unavailable,
            Some(remote) => {
                let key = ClassificationCache::key(summary, &label_names, remote.model());
                if let Some(hit) = cache.and_then(|c| c.get(&key)) {
                    debug!("Classifier cache hit: {}", key);
                    return ClassifierReport {
                        result: hit,
                        source: ClassifierSource::Cache,
                        failure: None,
                    };
                }

                let outcome = self.call_remote(remote.as_ref(), summary, &label_names).await;
                if let (ClassificationOutcome::Classified(result), Some(cache)) = (&outcome, cache)
                {
                    cache.insert(&key, result);
                }
                outcome
            }
        };

        match outcome {
            ClassificationOutcome::Classified(result) => ClassifierReport {
                result,
                source: ClassifierSource::Remote,
                failure: None,
            },
            ClassificationOutcome::Unavailable => self.fallback(summary, &label_names, None),
            ClassificationOutcome::Failed { reason } => {
                warn!("Classifier failed, using fallback: {}", reason);
                self.fallback(summary, &label_names, Some(reason))
            }
        }
    }

    async fn call_remote(
        &self,
        remote: &dyn ZeroShotClassifier,
        summary: &str,
        labels: &[String],
    ) -> ClassificationOutcome {
        match tokio::time::timeout(self.timeout, remote.classify(summary, labels)).await {
            Ok(Ok(result)) => ClassificationOutcome::Classified(result),
            Ok(Err(e)) => ClassificationOutcome::Failed {
                reason: e.to_string(),
            },
            Err(_) => ClassificationOutcome::Failed {
                reason: format!(
                    "{} did not answer within {}s",
                    remote.name(),
                    self.timeout.as_secs_f64()
                ),
            },
        }
    }

    fn fallback(&self, summary: &str, labels: &[String], reason: Option<String>) -> ClassifierReport {
        if self.heuristic_fallback {
            let result = self.heuristic.score(summary, labels).with_raw(json!({
                "source": "heuristic",
                "fallback_reason": reason.clone(),
            }));
            ClassifierReport {
                result,
                source: ClassifierSource::Heuristic,
                failure: reason,
            }
        } else {
            let model = self.remote_model().unwrap_or("none").to_string();
            ClassifierReport {
                result: ClassifierResult::empty(
                    model,
                    json!({
                        "source": "empty",
                        "fallback_reason": reason.clone().unwrap_or_else(|| "classifier not configured".to_string()),
                    }),
                ),
                source: ClassifierSource::Empty,
                failure: reason,
            }
        }
    }
}

impl fmt::Debug for ClassifierService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassifierService")
            .field("remote", &self.remote.as_ref().map(|r| r.name().to_string()))
            .field("cache", &self.cache)
            .field("heuristic_fallback", &self.heuristic_fallback)
            .field("timeout", &self.timeout)
            .finish()
    }
}
