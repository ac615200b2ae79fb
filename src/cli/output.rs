//! Output formatting for JSON, YAML and human-readable text

use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::config::CiforgeConfig;
use crate::params::ParameterDocument;
use crate::pipeline::AnalysisReport;
use crate::rules::Detection;

const RULE: &str = "\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Yaml,
    Human,
}

pub struct OutputFormatter {
    format: OutputFormat,
}

impl OutputFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn format_parameters(&self, doc: &ParameterDocument) -> Result<String> {
        match self.format {
            OutputFormat::Json => to_json(doc),
            OutputFormat::Yaml => to_yaml(doc),
            OutputFormat::Human => Ok(parameters_human(doc)),
        }
    }

    pub fn format_report(&self, report: &AnalysisReport) -> Result<String> {
        match self.format {
            OutputFormat::Json => to_json(report),
            OutputFormat::Yaml => to_yaml(report),
            OutputFormat::Human => Ok(report_human(report)),
        }
    }

    pub fn format_detection(&self, detection: &Detection) -> Result<String> {
        match self.format {
            OutputFormat::Json => to_json(detection),
            OutputFormat::Yaml => to_yaml(detection),
            OutputFormat::Human => {
                let mut output = String::new();
                output.push_str("Rule Candidates\n");
                output.push_str(RULE);
                output.push_str("\n\n");
                for c in &detection.candidates {
                    output.push_str(&format!("{:<10} {:.2}  {}\n", c.label.as_str(), c.confidence, c.reason));
                }
                output.push_str(&format!("\nSummary: {}\n", detection.summary));
                Ok(output)
            }
        }
    }

    pub fn format_health(
        &self,
        config: &CiforgeConfig,
        checks: &BTreeMap<String, HealthStatus>,
    ) -> Result<String> {
        #[derive(Serialize)]
        struct HealthDocument<'a> {
            configuration: BTreeMap<String, String>,
            checks: &'a BTreeMap<String, HealthStatus>,
        }

        let doc = HealthDocument {
            configuration: config.to_display_map(),
            checks,
        };
        match self.format {
            OutputFormat::Json => to_json(&doc),
            OutputFormat::Yaml => to_yaml(&doc),
            OutputFormat::Human => {
                let mut output = format!("{}\n", config);
                output.push_str("Health Checks\n");
                output.push_str(RULE);
                output.push_str("\n\n");
                for (name, status) in checks {
                    let symbol = if status.available { "\u{2713}" } else { "\u{2717}" };
                    output.push_str(&format!("{} {}\n", symbol, name));
                    output.push_str(&format!("  Message: {}\n", status.message));
                    if let Some(ref details) = status.details {
                        output.push_str(&format!("  Details: {}\n", details));
                    }
                    output.push('\n');
                }
                Ok(output)
            }
        }
    }
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).context("Failed to serialize to JSON")
}

fn to_yaml<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    serde_yaml::to_string(value).context("Failed to serialize to YAML")
}

fn parameters_human(doc: &ParameterDocument) -> String {
    let mut output = String::new();
    output.push_str(&format!("Pipeline Parameters ({})\n", doc.project_type));
    output.push_str(RULE);
    output.push_str("\n\n");

    let mut line = |key: &str, value: &str| {
        if !value.is_empty() {
            output.push_str(&format!("  {:<16} {}\n", key, value));
        }
    };
    line("Language", &doc.language);
    line("Package manager", &doc.package_manager);
    line("Install", &doc.install_command);
    line("Lint", &doc.lint_command);
    line("Test", &doc.test_command);
    line("Build", &doc.build_command);
    line("Artifact", &doc.artifact_path);
    if !doc.matrix.versions.is_empty() {
        line(
            "Matrix",
            &format!("{} = [{}]", doc.matrix.name, doc.matrix.versions.join(", ")),
        );
    }
    if doc.cache.enabled {
        line("Cache", &doc.cache.paths.join(", "));
    }
    if doc.container.enabled {
        line("Image", &doc.container.image);
        line("Platforms", &doc.container.platforms.join(", "));
    }
    if doc.deploy.enabled {
        line("Deploy", &format!("{} ({})", doc.deploy.provider, doc.deploy.mode));
    }
    line("Branches", &doc.triggers.branches.join(", "));
    line("Secrets", &doc.secrets_required.join(", "));
    for (dir, globs) in &doc.path_filters {
        line("Path filter", &format!("{} -> {}", dir, globs.join(", ")));
    }
    output
}

fn report_human(report: &AnalysisReport) -> String {
    let mut output = String::new();
    output.push_str(&format!(
        "Analysis {} ({})\n",
        report.run_id,
        report.repository.as_deref().unwrap_or("unknown repository")
    ));
    output.push_str(RULE);
    output.push_str("\n\n");

    let chosen: Vec<&str> = report.chosen.iter().map(|l| l.as_str()).collect();
    output.push_str(&format!("Primary template: {}\n", report.primary));
    output.push_str(&format!("Chosen templates: {}\n", chosen.join(", ")));
    output.push_str(&format!("Classifier: {}\n\n", report.classifier.source));

    output.push_str("Merged signals:\n");
    for m in &report.merged {
        output.push_str(&format!(
            "  {:<10} {:.2}  (rule {:.2}, classifier {:.2})\n",
            m.label.as_str(),
            m.combined_score,
            m.rule_score,
            m.classifier_score
        ));
    }
    output.push('\n');
    output.push_str(&parameters_human(&report.parameters));

    if !report.degraded.is_empty() {
        output.push_str("\nWarnings:\n");
        for note in &report.degraded {
            output.push_str(&format!("  ! {}\n", note));
        }
    }
    output
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub available: bool,
    pub message: String,
    pub details: Option<String>,
}

impl HealthStatus {
    pub fn available(message: impl Into<String>) -> Self {
        Self {
            available: true,
            message: message.into(),
            details: None,
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self {
            available: false,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FeaturesDocument;
    use crate::rules::RuleEngine;

    fn detection() -> Detection {
        let features = FeaturesDocument::from_json(r#"{"files": ["package.json"]}"#).unwrap();
        RuleEngine::new().detect(&features)
    }

    #[test]
    fn test_parameters_json_and_yaml() {
        let doc = ParameterDocument::default();
        let json = OutputFormatter::new(OutputFormat::Json).format_parameters(&doc).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["project_type"], "generic");

        let yaml = OutputFormatter::new(OutputFormat::Yaml).format_parameters(&doc).unwrap();
        assert!(yaml.contains("project_type: generic"));
    }

    #[test]
    fn test_parameters_human() {
        let mut doc = ParameterDocument::default();
        doc.language = "go".to_string();
        doc.require_secrets(["GITHUB_TOKEN"]);
        let text = OutputFormatter::new(OutputFormat::Human).format_parameters(&doc).unwrap();
        assert!(text.contains("Pipeline Parameters (generic)"));
        assert!(text.contains("go"));
        assert!(text.contains("GITHUB_TOKEN"));
        assert!(!text.contains("Package manager"));
    }

    #[test]
    fn test_detection_formats() {
        let human = OutputFormatter::new(OutputFormat::Human)
            .format_detection(&detection())
            .unwrap();
        assert!(human.contains("node"));
        assert!(human.contains("Summary:"));

        let json = OutputFormatter::new(OutputFormat::Json)
            .format_detection(&detection())
            .unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["candidates"][0]["label"], "node");
    }

    #[test]
    fn test_health_status_creation() {
        let status = HealthStatus::unavailable("down").with_details("connection refused");
        assert!(!status.available);
        assert_eq!(status.details.as_deref(), Some("connection refused"));
        assert!(HealthStatus::available("ok").available);
    }
}
