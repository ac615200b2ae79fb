pub mod commands;
pub mod handlers;
pub mod output;

pub use commands::{AnalyzeArgs, CliArgs, Commands, DetectArgs, HealthArgs};
pub use handlers::{EXIT_CONFIG_ERROR, EXIT_FAILURE, EXIT_SUCCESS};
pub use output::{HealthStatus, OutputFormat, OutputFormatter};
