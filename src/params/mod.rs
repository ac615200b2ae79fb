//! Parameter extraction
//!
//! Turns the merged signal and the features document into the flat parameter
//! document consumed by pipeline templates. The deterministic phase picks one
//! ecosystem and fills in its conventional commands; the optional override
//! phase lets a chat model patch the result.

pub mod container;
pub mod deploy;
mod document;
pub mod ecosystem;
mod extractor;
pub mod overrides;

pub use document::{
    noop, CacheSpec, ContainerSpec, DeploySpec, MatrixSpec, ParameterDocument, TriggerSpec,
};
pub use ecosystem::Ecosystem;
pub use extractor::{
    Extraction, OverrideStatus, ParameterExtractor, DEFAULT_MAX_PROMPT_CHARS,
    DEFAULT_OVERRIDE_TIMEOUT,
};
pub use overrides::{OverrideError, ParseError};
