//! Deterministic rule engine
//!
//! Turns a [`FeaturesDocument`] into weighted label candidates and a bounded
//! natural-language summary. The engine performs no I/O and holds no state,
//! so repeated calls on the same document return identical output.
//!
//! # Example
//!
//! ```
//! use ciforge::features::FeaturesDocument;
//! use ciforge::rules::RuleEngine;
//! use ciforge::PipelineLabel;
//!
//! let features = FeaturesDocument::from_json(r#"{"detectedFiles": ["package.json"]}"#).unwrap();
//! let detection = RuleEngine::new().detect(&features);
//!
//! assert_eq!(detection.top().unwrap().label, PipelineLabel::Node);
//! ```

mod evidence;
mod summary;
pub mod table;

pub use evidence::Evidence;
pub use summary::build_summary;
pub(crate) use evidence::basename;

use crate::features::FeaturesDocument;
use crate::label::PipelineLabel;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// A weighted hypothesis about the repository's pipeline type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub label: PipelineLabel,
    pub confidence: f64,
    pub reason: String,
}

impl Candidate {
    pub fn new(label: PipelineLabel, confidence: f64, reason: impl Into<String>) -> Self {
        Self {
            label,
            confidence: confidence.clamp(0.0, 1.0),
            reason: reason.into(),
        }
    }
}

/// Output of one rule-engine run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Deduplicated by label, descending confidence
    pub candidates: Vec<Candidate>,
    pub summary: String,
}

impl Detection {
    pub fn top(&self) -> Option<&Candidate> {
        self.candidates.first()
    }

    pub fn labels(&self) -> Vec<PipelineLabel> {
        self.candidates.iter().map(|c| c.label).collect()
    }

    pub fn confidence_of(&self, label: PipelineLabel) -> Option<f64> {
        self.candidates
            .iter()
            .find(|c| c.label == label)
            .map(|c| c.confidence)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RuleEngine;

impl RuleEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn detect(&self, features: &FeaturesDocument) -> Detection {
        let evidence = Evidence::from_features(features);

        let mut raw = Vec::new();
        for (name, rule) in table::RULES {
            let before = raw.len();
            rule(&evidence, &mut raw);
            for hit in &raw[before..] {
                debug!(
                    rule = name,
                    label = %hit.label,
                    confidence = hit.confidence,
                    "Rule fired: {}",
                    hit.reason
                );
            }
        }

        if raw.is_empty() {
            raw.push(Candidate::new(
                PipelineLabel::Generic,
                table::tier::GENERIC,
                "no recognizable ecosystem markers",
            ));
        }

        Detection {
            candidates: dedup_by_label(raw),
            summary: build_summary(&evidence),
        }
    }
}

/// Keeps the highest-confidence emission per label and sorts descending.
///
/// Ties between labels fall back to label order so the result is stable.
pub fn dedup_by_label(raw: Vec<Candidate>) -> Vec<Candidate> {
    let mut best: BTreeMap<PipelineLabel, Candidate> = BTreeMap::new();
    for candidate in raw {
        match best.get(&candidate.label) {
            Some(existing) if existing.confidence >= candidate.confidence => {}
            _ => {
                best.insert(candidate.label, candidate);
            }
        }
    }

    let mut candidates: Vec<Candidate> = best.into_values().collect();
    candidates.sort_by(|a, b| {
        b.confidence
            .total_cmp(&a.confidence)
            .then_with(|| a.label.cmp(&b.label))
    });
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn detect(value: serde_json::Value) -> Detection {
        RuleEngine::new().detect(&FeaturesDocument::from_value(&value).unwrap())
    }

    #[test]
    fn test_unique_manifest_wins() {
        for (file, label) in [
            ("requirements.txt", PipelineLabel::Python),
            ("package.json", PipelineLabel::Node),
            ("pom.xml", PipelineLabel::Java),
            ("go.mod", PipelineLabel::Go),
        ] {
            let detection = detect(json!({ "detectedFiles": [file] }));
            let top = detection.top().unwrap();
            assert_eq!(top.label, label, "{}", file);
            assert!(top.confidence >= 0.9, "{}", file);
        }
    }

    #[test]
    fn test_no_markers_yields_single_generic() {
        let detection = detect(json!({ "detectedFiles": ["README.md", "LICENSE"] }));
        assert_eq!(detection.candidates.len(), 1);
        assert_eq!(detection.candidates[0].label, PipelineLabel::Generic);
        assert!((detection.candidates[0].confidence - 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_docker_is_orthogonal_to_language() {
        let detection = detect(json!({ "detectedFiles": ["package.json", "Dockerfile"] }));
        assert_eq!(detection.top().unwrap().label, PipelineLabel::Node);
        assert!(detection.confidence_of(PipelineLabel::Docker).unwrap() >= 0.9);
    }

    #[test]
    fn test_dedup_keeps_max() {
        let raw = vec![
            Candidate::new(PipelineLabel::Node, 0.65, "dominant language"),
            Candidate::new(PipelineLabel::Node, 0.98, "package.json"),
            Candidate::new(PipelineLabel::Node, 0.88, "framework"),
            Candidate::new(PipelineLabel::Docker, 0.92, "Dockerfile"),
        ];
        let deduped = dedup_by_label(raw);
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].label, PipelineLabel::Node);
        assert_eq!(deduped[0].confidence, 0.98);
        assert_eq!(deduped[0].reason, "package.json");
    }

    #[test]
    fn test_detect_is_idempotent() {
        let value = json!({
            "detectedFiles": ["package.json", "pom.xml", "Dockerfile", "web/index.html"],
            "languages": {"JavaScript": 45, "Java": 40, "HTML": 15},
            "frameworks": ["react", "spring"],
            "recommended_templates": ["node", "docker"]
        });
        let first = detect(value.clone());
        let second = detect(value);
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn test_candidate_confidence_is_clamped() {
        assert_eq!(Candidate::new(PipelineLabel::Go, 1.7, "x").confidence, 1.0);
        assert_eq!(Candidate::new(PipelineLabel::Go, -0.2, "x").confidence, 0.0);
    }
}
