//! Signal merger
//!
//! Fuses rule candidates with classifier scores into one ranked list and picks
//! the template(s) to render.
//!
//! A top rule candidate at or above [`RULE_DOMINANT_CUTOFF`] short-circuits the
//! merge: the classifier is ignored entirely and every rule candidate passes
//! through with its own confidence. Otherwise each label gets a rule weight
//! `w` depending on which sources support it, and
//! `combined = rule * w + classifier * (1 - w)`.

use crate::classifier::ClassifierResult;
use crate::label::PipelineLabel;
use crate::rules::Candidate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

pub const RULE_DOMINANT_CUTOFF: f64 = 0.97;
pub const STRONG_EVIDENCE: f64 = 0.9;

pub mod weight {
    pub const RULE_ONLY_STRONG: f64 = 0.8;
    pub const RULE_ONLY_WEAK: f64 = 0.7;
    pub const CLASSIFIER_ONLY_STRONG: f64 = 0.2;
    pub const CLASSIFIER_ONLY_WEAK: f64 = 0.3;
    pub const BOTH: f64 = 0.5;
    /// Shift towards a source that leads by at least `LEAD_MARGIN`
    pub const LEAD_SHIFT: f64 = 0.15;
    pub const LEAD_MARGIN: f64 = 0.2;
}

pub const RULE_DOMINANT_REASON: &str = "rule-dominant";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedCandidate {
    pub label: PipelineLabel,
    pub rule_score: f64,
    pub classifier_score: f64,
    pub combined_score: f64,
    /// Weight given to the rule score; the classifier gets `1 - rule_weight`
    pub rule_weight: f64,
    pub reasons: Vec<String>,
}

/// How many templates to commit to
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum TemplatePolicy {
    /// Exactly one primary template
    #[default]
    SinglePrimary,
    /// Primary plus every other label scoring at least `threshold`
    MultiAccept { threshold: f64 },
}

/// Merge output handed to the parameter extractor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeSignal {
    pub chosen: Vec<PipelineLabel>,
    pub merged: Vec<MergedCandidate>,
    pub primary: PipelineLabel,
}

impl MergeSignal {
    pub fn from_merged(merged: Vec<MergedCandidate>, policy: &TemplatePolicy) -> Self {
        let chosen = choose_templates(&merged, policy);
        let primary = chosen[0];
        Self {
            chosen,
            merged,
            primary,
        }
    }

    pub fn is_chosen(&self, label: PipelineLabel) -> bool {
        self.chosen.contains(&label)
    }

    /// Combined score of a label anywhere in the merged list
    pub fn score_of(&self, label: PipelineLabel) -> Option<f64> {
        self.merged
            .iter()
            .find(|m| m.label == label)
            .map(|m| m.combined_score)
    }

    /// One line per merged label, for prompts and human output
    pub fn describe(&self) -> String {
        self.merged
            .iter()
            .map(|m| {
                format!(
                    "{}: combined {:.2} (rule {:.2}, classifier {:.2}, w {:.2})",
                    m.label, m.combined_score, m.rule_score, m.classifier_score, m.rule_weight
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Merges rule candidates with classifier scores, descending by combined score.
pub fn merge(candidates: &[Candidate], classifier: &ClassifierResult) -> Vec<MergedCandidate> {
    let top = candidates
        .iter()
        .map(|c| c.confidence)
        .fold(f64::NEG_INFINITY, f64::max);

    let mut merged = if top >= RULE_DOMINANT_CUTOFF {
        debug!(
            top_confidence = top,
            "Rule-dominant signal, ignoring classifier"
        );
        rule_dominant(candidates)
    } else {
        weighted_union(candidates, classifier)
    };

    merged.sort_by(|a, b| {
        b.combined_score
            .total_cmp(&a.combined_score)
            .then_with(|| b.rule_score.total_cmp(&a.rule_score))
            .then_with(|| a.label.cmp(&b.label))
    });
    merged
}

fn rule_dominant(candidates: &[Candidate]) -> Vec<MergedCandidate> {
    let mut by_label: BTreeMap<PipelineLabel, &Candidate> = BTreeMap::new();
    for c in candidates {
        match by_label.get(&c.label) {
            Some(existing) if existing.confidence >= c.confidence => {}
            _ => {
                by_label.insert(c.label, c);
            }
        }
    }

    by_label
        .into_values()
        .map(|c| MergedCandidate {
            label: c.label,
            rule_score: c.confidence,
            classifier_score: 0.0,
            combined_score: c.confidence,
            rule_weight: 1.0,
            reasons: vec![c.reason.clone(), RULE_DOMINANT_REASON.to_string()],
        })
        .collect()
}

fn weighted_union(candidates: &[Candidate], classifier: &ClassifierResult) -> Vec<MergedCandidate> {
    let mut rule: BTreeMap<PipelineLabel, (f64, Vec<String>)> = BTreeMap::new();
    for c in candidates {
        let entry = rule.entry(c.label).or_insert((0.0, Vec::new()));
        entry.0 = entry.0.max(c.confidence);
        entry.1.push(c.reason.clone());
    }

    let mut model: BTreeMap<PipelineLabel, f64> = BTreeMap::new();
    for (name, score) in classifier.pairs() {
        match PipelineLabel::parse(name) {
            Some(label) => {
                let slot = model.entry(label).or_insert(0.0);
                *slot = slot.max(score.clamp(0.0, 1.0));
            }
            None => warn!("Ignoring classifier label outside the label set: {}", name),
        }
    }

    let mut labels: Vec<PipelineLabel> = rule.keys().copied().collect();
    labels.extend(model.keys().copied().filter(|l| !rule.contains_key(l)));

    labels
        .into_iter()
        .map(|label| {
            let rule_entry = rule.get(&label);
            let model_score = model.get(&label).copied();

            let rule_score = rule_entry.map(|(s, _)| *s).unwrap_or(0.0);
            let classifier_score = model_score.unwrap_or(0.0);
            let w = rule_weight(rule_entry.map(|(s, _)| *s), model_score);
            let combined_score = (rule_score * w + classifier_score * (1.0 - w)).clamp(0.0, 1.0);

            let mut reasons = rule_entry.map(|(_, r)| r.clone()).unwrap_or_default();
            if let Some(score) = model_score {
                reasons.push(format!(
                    "classifier {} scored {:.2}",
                    classifier.model(),
                    score
                ));
            }

            MergedCandidate {
                label,
                rule_score,
                classifier_score,
                combined_score,
                rule_weight: w,
                reasons,
            }
        })
        .collect()
}

/// Rule weight for a label given which sources support it
pub fn rule_weight(rule: Option<f64>, classifier: Option<f64>) -> f64 {
    match (rule, classifier) {
        (Some(r), None) if r >= STRONG_EVIDENCE => weight::RULE_ONLY_STRONG,
        (Some(_), None) => weight::RULE_ONLY_WEAK,
        (None, Some(c)) if c >= STRONG_EVIDENCE => weight::CLASSIFIER_ONLY_STRONG,
        (None, Some(_)) => weight::CLASSIFIER_ONLY_WEAK,
        (Some(r), Some(c)) if r - c >= weight::LEAD_MARGIN => weight::BOTH + weight::LEAD_SHIFT,
        (Some(r), Some(c)) if c - r >= weight::LEAD_MARGIN => weight::BOTH - weight::LEAD_SHIFT,
        (Some(_), Some(_)) => weight::BOTH,
        (None, None) => weight::BOTH,
    }
}

/// Picks the template labels to render; never empty.
///
/// The primary label always comes first. It is the best-scoring language the
/// rules detected, so packaging and layout labels (docker, static, polyglot,
/// monorepo) only ever accompany a language. Without a rule-backed language
/// it is simply the highest combined score. An empty merge yields `[generic]`.
pub fn choose_templates(merged: &[MergedCandidate], policy: &TemplatePolicy) -> Vec<PipelineLabel> {
    let Some(primary) = merged
        .iter()
        .find(|m| m.label.is_language() && m.rule_score > 0.0)
        .or_else(|| merged.first())
    else {
        return vec![PipelineLabel::Generic];
    };

    let mut chosen = vec![primary.label];
    if let TemplatePolicy::MultiAccept { threshold } = policy {
        for m in merged {
            if m.combined_score >= *threshold && !chosen.contains(&m.label) {
                chosen.push(m.label);
            }
        }
    }
    chosen
}
