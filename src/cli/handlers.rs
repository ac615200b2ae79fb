//! Subcommand handlers. Each returns the process exit code.

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Read};
use std::path::Path;
use tracing::{debug, error, info};

use super::commands::{AnalyzeArgs, DetectArgs, HealthArgs, PolicyArg};
use super::output::{HealthStatus, OutputFormat, OutputFormatter};
use crate::classifier::{ClassifyOptions, HuggingFaceClassifier};
use crate::config::CiforgeConfig;
use crate::features::FeaturesDocument;
use crate::llm::select_override_client;
use crate::pipeline::{AnalysisError, Analyzer};
use crate::rules::RuleEngine;

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;
pub const EXIT_CONFIG_ERROR: i32 = 2;

pub async fn handle_analyze(args: &AnalyzeArgs) -> i32 {
    let mut config = CiforgeConfig::default();
    apply_analyze_overrides(&mut config, args);

    let analyzer = match Analyzer::from_config(&config) {
        Ok(analyzer) => analyzer.with_classify_options(ClassifyOptions {
            use_remote: !args.no_classifier,
            use_cache: !args.no_cache,
        }),
        Err(e) => {
            error!("{}", e);
            eprintln!("Error: {}", e);
            return EXIT_CONFIG_ERROR;
        }
    };

    match run_analyze(&analyzer, args).await {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            error!("Analysis failed: {:#}", e);
            eprintln!("Error: {:#}", e);
            EXIT_FAILURE
        }
    }
}

/// Command-line flags take precedence over `CIFORGE_*` variables
fn apply_analyze_overrides(config: &mut CiforgeConfig, args: &AnalyzeArgs) {
    if let Some(timeout) = args.timeout {
        config.request_timeout_secs = timeout;
    }
    if let Some(threshold) = args.threshold {
        config.merge_threshold = threshold;
    }
    match args.policy {
        Some(PolicyArg::Multi) => config.multi_accept = true,
        Some(PolicyArg::Single) => config.multi_accept = false,
        None => {}
    }
    if args.no_cache {
        config.cache_enabled = false;
    }
    if args.no_classifier {
        config.classifier_token = None;
    }
    if args.no_override {
        config.override_model = None;
    }
}

async fn run_analyze(analyzer: &Analyzer, args: &AnalyzeArgs) -> Result<()> {
    let raw = read_input(args.input.as_deref())?;
    let report = match analyzer.analyze_json(&raw).await {
        Ok(report) => report,
        Err(AnalysisError::Features(e)) => {
            return Err(e).context("Failed to read features document");
        }
        Err(e) => return Err(e.into()),
    };

    let formatter = OutputFormatter::new(args.format.into());
    let rendered = if args.report {
        formatter.format_report(&report)?
    } else {
        formatter.format_parameters(&report.parameters)?
    };
    write_output(args.output.as_deref(), &rendered)?;

    info!(
        run_id = %report.run_id,
        primary = %report.primary,
        degraded = report.degraded.len(),
        "Analysis written"
    );
    Ok(())
}

pub async fn handle_detect(args: &DetectArgs) -> i32 {
    let result = read_input(args.input.as_deref()).and_then(|raw| {
        let features =
            FeaturesDocument::from_json(&raw).context("Failed to read features document")?;
        let detection = RuleEngine::new().detect(&features);
        OutputFormatter::new(args.format.into()).format_detection(&detection)
    });

    match result {
        Ok(rendered) => {
            println!("{}", rendered);
            EXIT_SUCCESS
        }
        Err(e) => {
            error!("Detection failed: {:#}", e);
            eprintln!("Error: {:#}", e);
            EXIT_FAILURE
        }
    }
}

pub async fn handle_health(args: &HealthArgs) -> i32 {
    let config = CiforgeConfig::default();
    let format: OutputFormat = args.format.into();
    let mut checks = BTreeMap::new();

    if let Err(e) = config.validate() {
        checks.insert(
            "configuration".to_string(),
            HealthStatus::unavailable(e.to_string()),
        );
        print_health(&config, &checks, format);
        return EXIT_CONFIG_ERROR;
    }
    checks.insert(
        "configuration".to_string(),
        HealthStatus::available("Configuration is valid"),
    );

    let classifier = classifier_health(&config).await;
    let classifier_ok = classifier.available || config.classifier_token.is_none();
    checks.insert("classifier".to_string(), classifier);

    checks.insert(
        "override".to_string(),
        match select_override_client(&config) {
            Some(selected) => HealthStatus::available(selected.description),
            None => HealthStatus::unavailable("Override phase disabled")
                .with_details("Set CIFORGE_OVERRIDE_MODEL and the provider's API key to enable it"),
        },
    );

    checks.insert("cache".to_string(), cache_health(&config));

    print_health(&config, &checks, format);
    if classifier_ok {
        EXIT_SUCCESS
    } else {
        EXIT_FAILURE
    }
}

async fn classifier_health(config: &CiforgeConfig) -> HealthStatus {
    let Some(token) = &config.classifier_token else {
        let fallback = if config.heuristic_fallback {
            "keyword heuristic"
        } else {
            "empty result"
        };
        return HealthStatus::unavailable("No classifier token configured")
            .with_details(format!("Classification falls back to the {}", fallback));
    };

    let client = match HuggingFaceClassifier::new(
        config.classifier_endpoint.clone(),
        config.classifier_model.clone(),
        token.clone(),
        config.request_timeout(),
    ) {
        Ok(client) => client,
        Err(e) => return HealthStatus::unavailable(e.to_string()),
    };

    match client.health_check().await {
        Ok(true) => HealthStatus::available(format!(
            "{} reachable at {}",
            config.classifier_model, config.classifier_endpoint
        )),
        Ok(false) => HealthStatus::unavailable(format!(
            "{} not reachable at {}",
            config.classifier_model, config.classifier_endpoint
        )),
        Err(e) => HealthStatus::unavailable(e.to_string()),
    }
}

fn cache_health(config: &CiforgeConfig) -> HealthStatus {
    match config.effective_cache_dir() {
        None if config.cache_enabled => HealthStatus::available("In-memory cache only"),
        None => HealthStatus::unavailable("Classification cache disabled"),
        Some(dir) => match fs::create_dir_all(dir) {
            Ok(()) => HealthStatus::available(format!("Cache directory {}", dir.display())),
            Err(e) => HealthStatus::unavailable(format!(
                "Cache directory {} is not writable",
                dir.display()
            ))
            .with_details(e.to_string()),
        },
    }
}

fn print_health(config: &CiforgeConfig, checks: &BTreeMap<String, HealthStatus>, format: OutputFormat) {
    match OutputFormatter::new(format).format_health(config, checks) {
        Ok(rendered) => println!("{}", rendered),
        Err(e) => eprintln!("Error: {:#}", e),
    }
}

/// Reads the features document from a file, or stdin for `-` or no path
pub fn read_input(path: Option<&Path>) -> Result<String> {
    match path {
        Some(p) if p != Path::new("-") => {
            debug!("Reading features from {}", p.display());
            fs::read_to_string(p).with_context(|| format!("Failed to read {}", p.display()))
        }
        _ => {
            debug!("Reading features from stdin");
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .context("Failed to read stdin")?;
            Ok(buffer)
        }
    }
}

fn write_output(path: Option<&Path>, content: &str) -> Result<()> {
    match path {
        Some(p) => {
            if let Some(parent) = p.parent().filter(|d| !d.as_os_str().is_empty()) {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
            let mut body = content.to_string();
            if !body.ends_with('\n') {
                body.push('\n');
            }
            fs::write(p, body).with_context(|| format!("Failed to write {}", p.display()))?;
            info!("Output written to {}", p.display());
            Ok(())
        }
        None => {
            println!("{}", content);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::commands::{CliArgs, Commands};
    use clap::Parser;
    use tempfile::TempDir;

    fn analyze_args(argv: &[&str]) -> AnalyzeArgs {
        let mut full = vec!["ciforge", "analyze"];
        full.extend_from_slice(argv);
        match CliArgs::parse_from(full).command {
            Commands::Analyze(a) => a,
            _ => panic!("Expected Analyze command"),
        }
    }

    #[test]
    fn test_flags_override_config() {
        let mut config = CiforgeConfig::default();
        config.classifier_token = Some("hf_token".to_string());
        config.override_model = Some("gpt-4o-mini".to_string());

        let args = analyze_args(&[
            "--policy",
            "multi",
            "--threshold",
            "0.4",
            "--timeout",
            "7",
            "--no-cache",
            "--no-classifier",
            "--no-override",
        ]);
        apply_analyze_overrides(&mut config, &args);

        assert!(config.multi_accept);
        assert_eq!(config.merge_threshold, 0.4);
        assert_eq!(config.request_timeout_secs, 7);
        assert!(!config.cache_enabled);
        assert!(config.classifier_token.is_none());
        assert!(config.override_model.is_none());
    }

    #[test]
    fn test_read_input_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("features.json");
        fs::write(&path, "{}").unwrap();
        assert_eq!(read_input(Some(&path)).unwrap(), "{}");
        assert!(read_input(Some(&dir.path().join("missing.json"))).is_err());
    }

    #[test]
    fn test_write_output_creates_parent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/out.json");
        write_output(Some(&path), "{}").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "{}\n");
    }
}
