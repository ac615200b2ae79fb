use super::{ClassifierResult, ZeroShotClassifier};
use crate::ai::BackendError;
use async_trait::async_trait;
use regex::Regex;
use serde_json::json;

pub const HEURISTIC_MODEL: &str = "keyword-heuristic";

const LITERAL_SCORE: f64 = 0.7;
const ALIAS_STEP: f64 = 0.3;
const ALIAS_CAP: f64 = 0.9;

/// Summary fragments that mention an alias without being evidence for it
const NEGATED_FRAGMENTS: &[&str] = &["dockerfile: no"];

const ALIASES: &[(&str, &[&str])] = &[
    ("node", &["npm", "express", "react", "yarn", "pnpm", "package.json"]),
    ("python", &["pip", "flask", "django", "fastapi", "requirements", "pyproject"]),
    ("java", &["pom", "gradle", "maven", "spring"]),
    ("go", &["go.mod", "gin"]),
    ("docker", &["dockerfile", "container", "compose"]),
    ("terraform", &[".tf", "hcl"]),
    ("monorepo", &["packages/", "lerna", "turbo.json", "nx.json"]),
    ("static", &["index.html", "html", "hugo", "jekyll"]),
];

/// Keyword scoring over the summary text
///
/// A label that appears as a whole word scores 0.7; each distinct alias found
/// adds 0.3 (at most 0.9 in total); scores are capped at 1.0. Labels with no
/// evidence are left out.
#[derive(Debug, Clone, Default)]
pub struct HeuristicClassifier;

impl HeuristicClassifier {
    pub fn new() -> Self {
        Self
    }

    pub fn score(&self, summary: &str, labels: &[String]) -> ClassifierResult {
        let mut text = summary.to_lowercase();
        for fragment in NEGATED_FRAGMENTS {
            text = text.replace(fragment, "");
        }
        let mut pairs = Vec::new();

        for label in labels {
            let label_lc = label.to_lowercase();
            let score = score_label(&text, &label_lc);
            if score > 0.0 {
                pairs.push((label.clone(), score));
            }
        }

        ClassifierResult::from_pairs(HEURISTIC_MODEL, pairs, json!({"source": "heuristic"}))
    }
}

fn score_label(text: &str, label: &str) -> f64 {
    let literal = match Regex::new(&format!(r"\b{}\b", regex::escape(label))) {
        Ok(re) => re.is_match(text),
        Err(_) => text.contains(label),
    };
    let base = if literal { LITERAL_SCORE } else { 0.0 };

    let hits = ALIASES
        .iter()
        .find(|(l, _)| *l == label)
        .map(|(_, aliases)| aliases.iter().filter(|a| text.contains(*a)).count())
        .unwrap_or(0);
    let bonus = (hits as f64 * ALIAS_STEP).min(ALIAS_CAP);

    (base + bonus).min(1.0)
}

#[async_trait]
impl ZeroShotClassifier for HeuristicClassifier {
    async fn classify(
        &self,
        summary: &str,
        labels: &[String],
    ) -> Result<ClassifierResult, BackendError> {
        Ok(self.score(summary, labels))
    }

    fn name(&self) -> &str {
        "heuristic"
    }

    fn model(&self) -> &str {
        HEURISTIC_MODEL
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_literal_label_scores_at_least_point_seven() {
        let result = HeuristicClassifier::new().score("Dominant language: python.", &labels(&["python"]));
        assert!(result.score_of("python").unwrap() >= 0.7);
    }

    #[test]
    fn test_aliases_accumulate_and_cap() {
        let h = HeuristicClassifier::new();

        let one = h.score("uses npm", &labels(&["node"]));
        assert!((one.score_of("node").unwrap() - 0.3).abs() < 1e-9);

        let many = h.score(
            "node project with npm, express, react, yarn and pnpm",
            &labels(&["node"]),
        );
        assert_eq!(many.score_of("node"), Some(1.0));

        let aliases_only = h.score("npm express react yarn pnpm", &labels(&["node"]));
        assert!((aliases_only.score_of("node").unwrap() - 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_absent_dockerfile_is_not_evidence() {
        let h = HeuristicClassifier::new();
        let result = h.score("Dominant language: unknown. Dockerfile: no. Files: none.", &labels(&["docker"]));
        assert!(result.score_of("docker").is_none());
    }

    #[test]
    fn test_word_boundaries_for_literal_match() {
        let h = HeuristicClassifier::new();
        let result = h.score("languages: javascript, django", &labels(&["java", "go"]));
        assert!(result.score_of("java").is_none());
        assert!(result.score_of("go").is_none());
    }

    #[test]
    fn test_ranked_descending_and_unmatched_dropped() {
        let h = HeuristicClassifier::new();
        let result = h.score(
            "Dockerfile: yes. Files: dockerfile, docker-compose.yml, packages/api/package.json",
            &labels(&["docker", "monorepo", "terraform"]),
        );
        assert_eq!(result.labels()[0], "docker");
        assert!(result.score_of("monorepo").is_some());
        assert!(result.score_of("terraform").is_none());
        let scores = result.scores();
        assert!(scores.windows(2).all(|w| w[0] >= w[1]));
    }

    #[tokio::test]
    async fn test_trait_impl() {
        let h = HeuristicClassifier::new();
        let result = h.classify("go.mod", &labels(&["go"])).await.unwrap();
        assert_eq!(result.model(), HEURISTIC_MODEL);
        assert!(result.score_of("go").unwrap() >= 0.7);
    }
}
