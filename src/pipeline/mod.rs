//! End-to-end analysis: features document in, parameter report out
//!
//! The run is one linear sequence: rule engine, classifier, merge, parameter
//! extraction. Only the classifier and override calls suspend.

mod analyzer;

pub use analyzer::{AnalysisError, AnalysisReport, Analyzer};
