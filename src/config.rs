//! Configuration management for ciforge
//!
//! Settings are loaded from environment variables with sensible defaults.
//! `CiforgeConfig::default()` never fails; call [`CiforgeConfig::validate`]
//! before building services from it.
//!
//! # Environment Variables
//!
//! ## Classifier
//! - `CIFORGE_CLASSIFIER_TOKEN`: zero-shot endpoint token (falls back to `HF_TOKEN`).
//!   Without a token no remote call is made.
//! - `CIFORGE_CLASSIFIER_MODEL`: model id - default: "facebook/bart-large-mnli"
//! - `CIFORGE_CLASSIFIER_ENDPOINT`: inference base URL - default: "https://api-inference.huggingface.co"
//! - `CIFORGE_HEURISTIC_FALLBACK`: keyword scoring when remote is unavailable (true|false) - default: "true"
//!
//! ## Override model
//! - `CIFORGE_OVERRIDE_PROVIDER`: genai provider (openai|anthropic|gemini|groq|xai|ollama|...) - default: "openai"
//! - `CIFORGE_OVERRIDE_MODEL`: model name, no default. The override phase is off unless set.
//! - `CIFORGE_OVERRIDE_BASE_URL`: optional custom endpoint for the provider
//!
//! Provider credentials are the variables genai reads (`OPENAI_API_KEY`,
//! `ANTHROPIC_API_KEY`, `GEMINI_API_KEY`, ...). Ollama needs `OLLAMA_HOST`.
//!
//! ## Merge and runtime
//! - `CIFORGE_MERGE_THRESHOLD`: acceptance threshold for multi-template output - default: "0.5"
//! - `CIFORGE_TEMPLATE_POLICY`: single|multi - default: "single"
//! - `CIFORGE_CACHE_ENABLED`: classifier result cache (true|false) - default: "true"
//! - `CIFORGE_CACHE_DIR`: cache directory - default: user cache dir + "ciforge"
//! - `CIFORGE_REQUEST_TIMEOUT`: timeout in seconds for external calls - default: "30"
//! - `CIFORGE_MAX_PROMPT_CHARS`: override prompt bound - default: "8000"
//! - `CIFORGE_LOG_LEVEL`: logging level - default: "info"
//!
//! # Example
//!
//! ```no_run
//! use ciforge::CiforgeConfig;
//!
//! std::env::set_var("CIFORGE_TEMPLATE_POLICY", "multi");
//!
//! let config = CiforgeConfig::default();
//! config.validate().expect("Invalid configuration");
//! assert!(config.multi_accept);
//! ```

use crate::merge::TemplatePolicy;
use genai::adapter::AdapterKind;
use std::collections::BTreeMap;
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_CLASSIFIER_MODEL: &str = "facebook/bart-large-mnli";
pub const DEFAULT_CLASSIFIER_ENDPOINT: &str = "https://api-inference.huggingface.co";
const DEFAULT_OVERRIDE_PROVIDER: &str = "openai";
const DEFAULT_MERGE_THRESHOLD: f64 = 0.5;
const DEFAULT_CACHE_ENABLED: bool = true;
const DEFAULT_HEURISTIC_FALLBACK: bool = true;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_MAX_PROMPT_CHARS: usize = 8_000;
const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid provider: {0}. Valid options: openai, anthropic, gemini, groq, xai, deepseek, cohere, ollama")]
    InvalidProvider(String),

    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

#[derive(Debug, Clone)]
pub struct CiforgeConfig {
    pub classifier_token: Option<String>,
    pub classifier_model: String,
    pub classifier_endpoint: String,
    pub heuristic_fallback: bool,

    /// Raw provider name, resolved by [`CiforgeConfig::override_adapter`]
    pub override_provider: String,
    pub override_model: Option<String>,
    pub override_base_url: Option<String>,

    pub merge_threshold: f64,
    /// Accept every label above `merge_threshold` instead of one primary
    pub multi_accept: bool,

    pub cache_enabled: bool,
    pub cache_dir: Option<PathBuf>,

    pub request_timeout_secs: u64,
    pub max_prompt_chars: usize,

    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn bool_var(key: &str, default: bool) -> bool {
    non_empty_var(key)
        .and_then(|v| match v.to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Some(true),
            "0" | "false" | "no" | "off" => Some(false),
            _ => None,
        })
        .unwrap_or(default)
}

impl Default for CiforgeConfig {
    /// Loads `CIFORGE_*` variables, falling back to defaults for anything
    /// missing or unparseable.
    fn default() -> Self {
        let classifier_token =
            non_empty_var("CIFORGE_CLASSIFIER_TOKEN").or_else(|| non_empty_var("HF_TOKEN"));

        let classifier_model = non_empty_var("CIFORGE_CLASSIFIER_MODEL")
            .unwrap_or_else(|| DEFAULT_CLASSIFIER_MODEL.to_string());

        let classifier_endpoint = non_empty_var("CIFORGE_CLASSIFIER_ENDPOINT")
            .unwrap_or_else(|| DEFAULT_CLASSIFIER_ENDPOINT.to_string())
            .trim_end_matches('/')
            .to_string();

        let heuristic_fallback = bool_var("CIFORGE_HEURISTIC_FALLBACK", DEFAULT_HEURISTIC_FALLBACK);

        let override_provider = non_empty_var("CIFORGE_OVERRIDE_PROVIDER")
            .unwrap_or_else(|| DEFAULT_OVERRIDE_PROVIDER.to_string())
            .to_lowercase();
        let override_model = non_empty_var("CIFORGE_OVERRIDE_MODEL");
        let override_base_url = non_empty_var("CIFORGE_OVERRIDE_BASE_URL");

        let merge_threshold = non_empty_var("CIFORGE_MERGE_THRESHOLD")
            .and_then(|v| v.parse::<f64>().ok())
            .unwrap_or(DEFAULT_MERGE_THRESHOLD);

        let multi_accept = non_empty_var("CIFORGE_TEMPLATE_POLICY")
            .map(|v| v.eq_ignore_ascii_case("multi"))
            .unwrap_or(false);

        let cache_enabled = bool_var("CIFORGE_CACHE_ENABLED", DEFAULT_CACHE_ENABLED);
        let cache_dir = non_empty_var("CIFORGE_CACHE_DIR")
            .map(PathBuf::from)
            .or_else(|| {
                if cache_enabled {
                    dirs::cache_dir()
                        .or_else(|| Some(env::temp_dir()))
                        .map(|d| d.join("ciforge"))
                } else {
                    None
                }
            });

        let request_timeout_secs = non_empty_var("CIFORGE_REQUEST_TIMEOUT")
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS);

        let max_prompt_chars = non_empty_var("CIFORGE_MAX_PROMPT_CHARS")
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(DEFAULT_MAX_PROMPT_CHARS);

        let log_level = non_empty_var("CIFORGE_LOG_LEVEL")
            .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string())
            .to_lowercase();

        Self {
            classifier_token,
            classifier_model,
            classifier_endpoint,
            heuristic_fallback,
            override_provider,
            override_model,
            override_base_url,
            merge_threshold,
            multi_accept,
            cache_enabled,
            cache_dir,
            request_timeout_secs,
            max_prompt_chars,
            log_level,
        }
    }
}

impl CiforgeConfig {
    /// Validates ranges and enumerations
    ///
    /// Credentials are not checked here: a missing token only disables the
    /// corresponding optional phase.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::ValidationFailed(
                "Request timeout must be at least 1 second".to_string(),
            ));
        }
        if self.request_timeout_secs > 600 {
            return Err(ConfigError::ValidationFailed(
                "Request timeout cannot exceed 10 minutes".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.merge_threshold) {
            return Err(ConfigError::ValidationFailed(format!(
                "Merge threshold must be within [0, 1], got {}",
                self.merge_threshold
            )));
        }

        if self.max_prompt_chars < 512 {
            return Err(ConfigError::ValidationFailed(
                "Max prompt size must be at least 512 characters".to_string(),
            ));
        }
        if self.max_prompt_chars > 200_000 {
            return Err(ConfigError::ValidationFailed(
                "Max prompt size cannot exceed 200000 characters".to_string(),
            ));
        }

        if !self.classifier_endpoint.starts_with("http://")
            && !self.classifier_endpoint.starts_with("https://")
        {
            return Err(ConfigError::ValidationFailed(format!(
                "Classifier endpoint must be an http(s) URL: {}",
                self.classifier_endpoint
            )));
        }

        self.override_adapter()?;

        match self.log_level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(ConfigError::ValidationFailed(format!(
                    "Invalid log level: {}. Valid options: trace, debug, info, warn, error",
                    self.log_level
                )))
            }
        }

        Ok(())
    }

    pub fn override_adapter(&self) -> Result<AdapterKind, ConfigError> {
        parse_provider(&self.override_provider)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn template_policy(&self) -> TemplatePolicy {
        if self.multi_accept {
            TemplatePolicy::MultiAccept {
                threshold: self.merge_threshold,
            }
        } else {
            TemplatePolicy::SinglePrimary
        }
    }

    pub fn classifier_enabled(&self) -> bool {
        self.classifier_token.is_some()
    }

    /// Directory for on-disk classifier results, when caching is on
    pub fn effective_cache_dir(&self) -> Option<&PathBuf> {
        if self.cache_enabled {
            self.cache_dir.as_ref()
        } else {
            None
        }
    }

    /// Display map with secrets masked, for `health` output
    pub fn to_display_map(&self) -> BTreeMap<String, String> {
        let mut map = BTreeMap::new();

        map.insert(
            "classifier_token".to_string(),
            mask(self.classifier_token.as_deref()),
        );
        map.insert("classifier_model".to_string(), self.classifier_model.clone());
        map.insert(
            "classifier_endpoint".to_string(),
            self.classifier_endpoint.clone(),
        );
        map.insert(
            "heuristic_fallback".to_string(),
            self.heuristic_fallback.to_string(),
        );
        map.insert(
            "override_provider".to_string(),
            self.override_provider.clone(),
        );
        map.insert(
            "override_model".to_string(),
            self.override_model.clone().unwrap_or_else(|| "(not set)".to_string()),
        );
        if let Some(ref url) = self.override_base_url {
            map.insert("override_base_url".to_string(), url.clone());
        }
        map.insert(
            "template_policy".to_string(),
            if self.multi_accept { "multi" } else { "single" }.to_string(),
        );
        map.insert(
            "merge_threshold".to_string(),
            self.merge_threshold.to_string(),
        );
        map.insert("cache_enabled".to_string(), self.cache_enabled.to_string());
        if let Some(ref dir) = self.cache_dir {
            map.insert("cache_dir".to_string(), dir.display().to_string());
        }
        map.insert(
            "request_timeout_secs".to_string(),
            self.request_timeout_secs.to_string(),
        );
        map.insert(
            "max_prompt_chars".to_string(),
            self.max_prompt_chars.to_string(),
        );
        map.insert("log_level".to_string(), self.log_level.clone());

        map
    }
}

pub fn parse_provider(name: &str) -> Result<AdapterKind, ConfigError> {
    AdapterKind::from_lower_str(&name.to_lowercase())
        .ok_or_else(|| ConfigError::InvalidProvider(name.to_string()))
}

fn mask(secret: Option<&str>) -> String {
    match secret {
        None => "(not set)".to_string(),
        Some(s) if s.len() <= 4 => "****".to_string(),
        Some(s) => format!("{}****", &s[..s.char_indices().nth(4).map_or(s.len(), |(i, _)| i)]),
    }
}

impl fmt::Display for CiforgeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ciforge configuration:")?;
        for (key, value) in self.to_display_map() {
            writeln!(f, "  {}: {}", key, value)?;
        }
        Ok(())
    }
}
