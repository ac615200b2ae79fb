//! ciforge - CI/CD pipeline detection from repository features
//!
//! Given a features document describing a repository (files, languages,
//! frameworks, container indicators), ciforge decides which pipeline
//! template(s) fit and fills in the parameters needed to render them.
//!
//! # Stages
//!
//! - [`rules`]: deterministic rule engine producing weighted label candidates
//!   and a compact evidence summary
//! - [`classifier`]: optional zero-shot classifier over that summary, with a
//!   cache and a keyword heuristic fallback
//! - [`merge`]: fuses both signals and applies the template policy
//! - [`params`]: per-ecosystem parameter defaults plus an optional model
//!   override
//! - [`pipeline`]: runs the stages above as one analysis
//!
//! # Example
//!
//! ```no_run
//! use ciforge::pipeline::Analyzer;
//! use ciforge::CiforgeConfig;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let analyzer = Analyzer::from_config(&CiforgeConfig::default())?;
//! let report = analyzer
//!     .analyze_json(r#"{"repository": "acme/shop", "detectedFiles": ["package.json"]}"#)
//!     .await?;
//!
//! println!("template: {}", report.primary);
//! println!("test: {}", report.parameters.test_command);
//! # Ok(())
//! # }
//! ```

pub mod ai;
pub mod classifier;
pub mod cli;
pub mod config;
pub mod features;
pub mod label;
pub mod llm;
pub mod merge;
pub mod params;
pub mod pipeline;
pub mod rules;
pub mod util;

pub use ai::BackendError;
pub use config::{CiforgeConfig, ConfigError};
pub use features::FeaturesDocument;
pub use label::PipelineLabel;
pub use params::ParameterDocument;
pub use pipeline::{AnalysisError, AnalysisReport, Analyzer};
pub use util::{init_from_env, init_logging, LoggingConfig};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_exists() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_name_is_ciforge() {
        assert_eq!(NAME, "ciforge");
    }
}
