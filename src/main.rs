use ciforge::cli::commands::{CliArgs, Commands};
use ciforge::cli::handlers::{handle_analyze, handle_detect, handle_health};
use ciforge::util::logging::{init_logging, LoggingConfig};
use ciforge::VERSION;

use clap::Parser;
use tracing::debug;

#[tokio::main]
async fn main() {
    let args = CliArgs::parse();
    init_logging(LoggingConfig::from_flags(
        args.log_level.as_deref(),
        args.verbose,
        args.quiet,
    ));

    debug!("ciforge v{} starting", VERSION);
    debug!("Arguments: {:?}", args);

    let exit_code = match &args.command {
        Commands::Analyze(analyze_args) => handle_analyze(analyze_args).await,
        Commands::Detect(detect_args) => handle_detect(detect_args).await,
        Commands::Health(health_args) => handle_health(health_args).await,
    };

    std::process::exit(exit_code);
}
