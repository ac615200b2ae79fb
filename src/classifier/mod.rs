//! Zero-shot classifier adapter
//!
//! Scores a rule-engine summary against the pipeline label space. A remote
//! HuggingFace-style endpoint is used when a token is configured; otherwise,
//! or when the remote call fails, a keyword heuristic produces a result of
//! the same shape so downstream merging does not care which source answered.
//!
//! [`ClassifierService`] is the entry point and never returns an error.

mod cache;
mod heuristic;
mod mock;
mod remote;
mod service;

pub use cache::ClassificationCache;
pub use heuristic::HeuristicClassifier;
pub use mock::MockClassifier;
pub use remote::{normalize_response, HuggingFaceClassifier};
pub use service::{
    ClassificationOutcome, ClassifierReport, ClassifierService, ClassifierSource, ClassifyOptions,
};

use crate::ai::BackendError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Label scores from one classifier call
///
/// `labels` and `scores` are parallel and always the same length; the
/// constructors are the only way to build one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ResultRepr")]
pub struct ClassifierResult {
    model: String,
    labels: Vec<String>,
    scores: Vec<f64>,
    /// Opaque diagnostics: raw response, fallback reason, etc.
    raw: Value,
}

#[derive(Deserialize)]
struct ResultRepr {
    model: String,
    labels: Vec<String>,
    scores: Vec<f64>,
    #[serde(default)]
    raw: Value,
}

impl TryFrom<ResultRepr> for ClassifierResult {
    type Error = String;

    fn try_from(repr: ResultRepr) -> Result<Self, Self::Error> {
        ClassifierResult::from_parallel(repr.model, repr.labels, repr.scores, repr.raw)
            .map_err(|e| e.to_string())
    }
}

impl ClassifierResult {
    /// An empty but well-formed result
    pub fn empty(model: impl Into<String>, raw: Value) -> Self {
        Self {
            model: model.into(),
            labels: Vec::new(),
            scores: Vec::new(),
            raw,
        }
    }

    /// Builds a result from label/score pairs, clamping scores and ranking
    /// them by descending score.
    pub fn from_pairs(model: impl Into<String>, pairs: Vec<(String, f64)>, raw: Value) -> Self {
        let mut pairs: Vec<(String, f64)> = pairs
            .into_iter()
            .map(|(label, score)| (label, clamp_score(score)))
            .collect();
        pairs.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        let (labels, scores) = pairs.into_iter().unzip();
        Self {
            model: model.into(),
            labels,
            scores,
            raw,
        }
    }

    /// Builds a result from parallel arrays; a length mismatch is a malformed response.
    pub fn from_parallel(
        model: impl Into<String>,
        labels: Vec<String>,
        scores: Vec<f64>,
        raw: Value,
    ) -> Result<Self, BackendError> {
        if labels.len() != scores.len() {
            return Err(BackendError::InvalidResponse {
                message: format!(
                    "{} labels but {} scores",
                    labels.len(),
                    scores.len()
                ),
                raw_response: Some(raw.to_string()),
            });
        }
        Ok(Self::from_pairs(
            model,
            labels.into_iter().zip(scores).collect(),
            raw,
        ))
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn scores(&self) -> &[f64] {
        &self.scores
    }

    pub fn raw(&self) -> &Value {
        &self.raw
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn pairs(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.labels
            .iter()
            .map(String::as_str)
            .zip(self.scores.iter().copied())
    }

    pub fn score_of(&self, label: &str) -> Option<f64> {
        self.pairs()
            .find(|(l, _)| l.eq_ignore_ascii_case(label))
            .map(|(_, s)| s)
    }

    pub fn with_raw(mut self, raw: Value) -> Self {
        self.raw = raw;
        self
    }
}

fn clamp_score(score: f64) -> f64 {
    if score.is_nan() {
        0.0
    } else {
        score.clamp(0.0, 1.0)
    }
}

/// A zero-shot, multi-label text classifier
#[async_trait]
pub trait ZeroShotClassifier: Send + Sync {
    async fn classify(
        &self,
        summary: &str,
        labels: &[String],
    ) -> Result<ClassifierResult, BackendError>;

    fn name(&self) -> &str;

    /// Model identifier, part of the cache key
    fn model(&self) -> &str;
}
