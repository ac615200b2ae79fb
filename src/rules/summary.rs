use super::evidence::Evidence;

pub const MAX_SUMMARY_LANGUAGES: usize = 5;
pub const MAX_SUMMARY_FRAMEWORKS: usize = 8;
pub const MAX_SUMMARY_RECOMMENDATIONS: usize = 5;
pub const MAX_SUMMARY_FILES: usize = 20;

/// Builds the compact evidence summary sent to the classifier.
///
/// Item counts are fixed and every list is emitted in a stable order, so the
/// same evidence always yields byte-identical text.
pub fn build_summary(ev: &Evidence) -> String {
    let dominant = ev.dominant_language.as_deref().unwrap_or("unknown");

    let languages: Vec<String> = ev
        .languages
        .iter()
        .take(MAX_SUMMARY_LANGUAGES)
        .map(|(name, pct)| format!("{} ({:.1}%)", name, pct))
        .collect();

    let frameworks: Vec<&str> = ev
        .frameworks
        .iter()
        .take(MAX_SUMMARY_FRAMEWORKS)
        .map(String::as_str)
        .collect();

    let recommended: Vec<&str> = ev
        .recommended
        .iter()
        .take(MAX_SUMMARY_RECOMMENDATIONS)
        .map(String::as_str)
        .collect();

    let mut files: Vec<&str> = ev
        .paths
        .iter()
        .take(MAX_SUMMARY_FILES)
        .map(String::as_str)
        .collect();
    let hidden = ev.paths.len().saturating_sub(MAX_SUMMARY_FILES);
    let more = format!("(+{} more)", hidden);
    if hidden > 0 {
        files.push(&more);
    }

    format!(
        "Dominant language: {}. Languages: {}. Frameworks: {}. Dockerfile: {}. Recommended: {}. Files: {}.",
        dominant,
        list_or_none(&languages.iter().map(String::as_str).collect::<Vec<_>>()),
        list_or_none(&frameworks),
        if ev.dockerfile { "yes" } else { "no" },
        list_or_none(&recommended),
        list_or_none(&files),
    )
}

fn list_or_none(items: &[&str]) -> String {
    if items.is_empty() {
        "none".to_string()
    } else {
        items.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FeaturesDocument;
    use serde_json::json;

    fn summary(value: serde_json::Value) -> String {
        let features = FeaturesDocument::from_value(&value).unwrap();
        build_summary(&Evidence::from_features(&features))
    }

    #[test]
    fn test_summary_empty_evidence() {
        assert_eq!(
            summary(json!({})),
            "Dominant language: unknown. Languages: none. Frameworks: none. Dockerfile: no. Recommended: none. Files: none."
        );
    }

    #[test]
    fn test_summary_contents() {
        let text = summary(json!({
            "detectedFiles": ["requirements.txt", "Dockerfile"],
            "languages": {"Python": 80, "Shell": 20},
            "dominant_language": "Python",
            "frameworks": ["Flask"]
        }));
        assert!(text.contains("Dominant language: python."));
        assert!(text.contains("Python (80.0%), Shell (20.0%)"));
        assert!(text.contains("Frameworks: flask."));
        assert!(text.contains("Dockerfile: yes."));
        assert!(text.contains("Files: dockerfile, requirements.txt."));
    }

    #[test]
    fn test_summary_is_bounded() {
        let files: Vec<String> = (0..50).map(|i| format!("src/file{:02}.py", i)).collect();
        let text = summary(json!({ "files": files }));
        assert!(text.contains("src/file19.py"));
        assert!(!text.contains("src/file20.py"));
        assert!(text.contains("(+30 more)"));
    }
}
