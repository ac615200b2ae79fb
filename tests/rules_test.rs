//! Rule engine and merge properties over every features fixture

use ciforge::classifier::HeuristicClassifier;
use ciforge::merge::{merge, MergeSignal, TemplatePolicy};
use ciforge::rules::RuleEngine;
use ciforge::{FeaturesDocument, PipelineLabel};
use std::collections::HashSet;
use std::path::PathBuf;
use yare::parameterized;

fn features(name: &str) -> FeaturesDocument {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures/features")
        .join(name);
    FeaturesDocument::from_json(&std::fs::read_to_string(path).unwrap()).unwrap()
}

#[parameterized(
    node_basic = { "node_basic.json" },
    node_docker = { "node_docker.json" },
    python_java = { "python_java.json" },
    empty_repo = { "empty_repo.json" },
    monorepo = { "monorepo.json" },
    static_site = { "static_site.json" },
    go_service = { "go_service.json" },
)]
fn test_detection_properties(name: &str) {
    let detection = RuleEngine::new().detect(&features(name));
    assert!(!detection.candidates.is_empty());
    assert!(!detection.summary.is_empty());

    let mut seen = HashSet::new();
    for c in &detection.candidates {
        assert!(seen.insert(c.label), "{} emitted twice", c.label);
        assert!((0.0..=1.0).contains(&c.confidence));
        assert!(!c.reason.is_empty());
    }
    for pair in detection.candidates.windows(2) {
        assert!(pair[0].confidence >= pair[1].confidence);
    }

    let generic = detection.confidence_of(PipelineLabel::Generic).is_some();
    assert_eq!(generic, detection.candidates.len() == 1 && detection.candidates[0].label == PipelineLabel::Generic);
}

#[parameterized(
    node_docker = { "node_docker.json" },
    monorepo = { "monorepo.json" },
    static_site = { "static_site.json" },
)]
fn test_merge_properties(name: &str) {
    let detection = RuleEngine::new().detect(&features(name));
    let labels: Vec<String> = PipelineLabel::classifier_label_space()
        .iter()
        .map(|l| l.as_str().to_string())
        .collect();
    let scores = HeuristicClassifier::new().score(&detection.summary, &labels);
    let merged = merge(&detection.candidates, &scores);

    for m in &merged {
        assert!((0.0..=1.0).contains(&m.combined_score));
        assert!((0.0..=1.0).contains(&m.rule_weight));
    }
    for pair in merged.windows(2) {
        assert!(pair[0].combined_score >= pair[1].combined_score);
    }

    let single = MergeSignal::from_merged(merged.clone(), &TemplatePolicy::SinglePrimary);
    assert_eq!(single.chosen, vec![single.primary]);

    let multi = MergeSignal::from_merged(merged, &TemplatePolicy::MultiAccept { threshold: 0.0 });
    assert_eq!(multi.primary, single.primary);
    assert_eq!(multi.chosen[0], single.primary);
}
