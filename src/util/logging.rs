//! Structured logging setup
//!
//! Logs always go to stderr so that documents written to stdout stay
//! machine-readable. The subscriber can only be installed once per process;
//! later calls are ignored.
//!
//! # Example
//!
//! ```no_run
//! use ciforge::util::logging::{self, LoggingConfig};
//! use tracing::{info, Level};
//!
//! logging::init_logging(LoggingConfig::with_level(Level::DEBUG));
//! info!(repo = "acme/shop", "Analyzing features document");
//! ```

use std::env;
use std::io;
use std::sync::Once;
use tracing::Level;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static INIT: Once = Once::new();

pub const LOG_LEVEL_ENV: &str = "CIFORGE_LOG_LEVEL";
pub const LOG_JSON_ENV: &str = "CIFORGE_LOG_JSON";

/// Crates whose chatter is capped at `warn` unless `RUST_LOG` says otherwise
const NOISY_DEPENDENCIES: &[&str] = &["h2", "hyper", "hyper_util", "reqwest", "rustls", "genai"];

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Minimum level for this crate's events
    pub level: Level,

    /// One JSON object per event instead of human-readable lines
    pub use_json: bool,

    pub include_target: bool,

    /// File and line of the emitting call site
    pub include_location: bool,

    pub include_thread_ids: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            use_json: false,
            include_target: false,
            include_location: false,
            include_thread_ids: false,
        }
    }
}

impl LoggingConfig {
    pub fn with_level(level: Level) -> Self {
        Self {
            level,
            ..Default::default()
        }
    }

    /// JSON output with full metadata
    pub fn production() -> Self {
        Self {
            level: Level::INFO,
            use_json: true,
            include_target: true,
            include_location: true,
            include_thread_ids: true,
        }
    }

    /// Level and JSON flag from `CIFORGE_LOG_LEVEL` / `CIFORGE_LOG_JSON`
    pub fn from_env() -> Self {
        let level = env::var(LOG_LEVEL_ENV)
            .ok()
            .and_then(|v| try_parse_level(&v))
            .unwrap_or(Level::INFO);
        let use_json = env::var(LOG_JSON_ENV)
            .ok()
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        Self {
            level,
            use_json,
            ..Default::default()
        }
    }

    /// Level chosen from CLI flags. `quiet` wins over `verbose`, and an
    /// explicit level wins over both.
    pub fn from_flags(explicit: Option<&str>, verbose: u8, quiet: bool) -> Self {
        let mut config = Self::from_env();
        if let Some(level) = explicit.and_then(try_parse_level) {
            config.level = level;
        } else if quiet {
            config.level = Level::ERROR;
        } else if verbose > 0 {
            config.level = if verbose == 1 { Level::DEBUG } else { Level::TRACE };
            config.include_target = true;
        }
        config
    }
}

pub fn try_parse_level(level_str: &str) -> Option<Level> {
    match level_str.trim().to_ascii_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" | "warning" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        _ => None,
    }
}

/// Like [`try_parse_level`], falling back to `INFO`
pub fn parse_level(level_str: &str) -> Level {
    try_parse_level(level_str).unwrap_or(Level::INFO)
}

fn build_filter(level: Level) -> EnvFilter {
    let mut filter = EnvFilter::from_default_env();
    if let Ok(directive) = format!("ciforge={}", level).parse::<Directive>() {
        filter = filter.add_directive(directive);
    }

    if env::var("RUST_LOG").is_err() {
        for name in NOISY_DEPENDENCIES {
            if let Ok(directive) = format!("{}=warn", name).parse::<Directive>() {
                filter = filter.add_directive(directive);
            }
        }
    }
    filter
}

pub fn init_logging(config: LoggingConfig) {
    INIT.call_once(|| {
        let filter = build_filter(config.level);
        let layer = fmt::layer()
            .with_writer(io::stderr)
            .with_target(config.include_target)
            .with_file(config.include_location)
            .with_line_number(config.include_location)
            .with_thread_ids(config.include_thread_ids)
            .with_thread_names(config.include_thread_ids);

        let registry = tracing_subscriber::registry().with(filter);
        let result = if config.use_json {
            registry.with(layer.json()).try_init()
        } else {
            registry.with(layer).try_init()
        };
        if let Err(e) = result {
            eprintln!("Logging already initialized: {}", e);
        }
    });
}

pub fn init_from_env() {
    init_logging(LoggingConfig::from_env());
}
