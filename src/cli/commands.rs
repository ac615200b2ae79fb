use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// CI/CD pipeline detection from repository features
#[derive(Parser, Debug)]
#[command(
    name = "ciforge",
    about = "Detect CI/CD pipeline templates and parameters from repository features",
    version,
    author,
    long_about = "ciforge reads a repository features document (as produced by a repository \
                  analyzer), fuses deterministic rules with an optional zero-shot classifier, \
                  and emits the pipeline template choice plus the parameters to render it."
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(long, global = true, value_name = "LEVEL", help = "Set logging level")]
    pub log_level: Option<String>,

    #[arg(
        short = 'v',
        long,
        global = true,
        action = ArgAction::Count,
        help = "Increase verbosity (can be used multiple times)"
    )]
    pub verbose: u8,

    #[arg(
        short = 'q',
        long,
        global = true,
        conflicts_with = "verbose",
        help = "Quiet mode - suppress non-error output"
    )]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(
        about = "Run the full analysis on a features document",
        long_about = "Runs rules, classifier, merge and parameter extraction and prints the \
                      parameter document (or the full report with --report).\n\n\
                      Examples:\n  \
                      ciforge analyze features.json\n  \
                      cat features.json | ciforge analyze -\n  \
                      ciforge analyze features.json --format yaml --policy multi\n  \
                      ciforge analyze features.json --report --no-classifier"
    )]
    Analyze(AnalyzeArgs),

    #[command(
        about = "Run the rule engine only",
        long_about = "Prints the rule candidates and the classifier summary without any \
                      network calls.\n\n\
                      Examples:\n  \
                      ciforge detect features.json\n  \
                      ciforge detect features.json --format json"
    )]
    Detect(DetectArgs),

    #[command(
        about = "Check configuration and endpoint reachability",
        long_about = "Validates the configuration and probes the classifier endpoint.\n\n\
                      Examples:\n  \
                      ciforge health\n  \
                      ciforge health --format json"
    )]
    Health(HealthArgs),
}

#[derive(Parser, Debug, Clone)]
pub struct AnalyzeArgs {
    #[arg(
        value_name = "FILE",
        help = "Features document (JSON); '-' or omitted reads stdin"
    )]
    pub input: Option<PathBuf>,

    #[arg(
        short = 'f',
        long,
        value_enum,
        default_value = "json",
        help = "Output format"
    )]
    pub format: OutputFormatArg,

    #[arg(long, help = "Emit the full analysis report instead of the parameter document")]
    pub report: bool,

    #[arg(long, help = "Skip the remote zero-shot classifier")]
    pub no_classifier: bool,

    #[arg(long, help = "Skip the model override phase")]
    pub no_override: bool,

    #[arg(long, value_enum, help = "Template policy (overrides CIFORGE_TEMPLATE_POLICY)")]
    pub policy: Option<PolicyArg>,

    #[arg(
        long,
        value_name = "SCORE",
        value_parser = parse_threshold,
        help = "Acceptance threshold for the multi policy (0.0 - 1.0)"
    )]
    pub threshold: Option<f64>,

    #[arg(long, value_name = "SECONDS", help = "Request timeout in seconds")]
    pub timeout: Option<u64>,

    #[arg(long, help = "Disable the classification cache")]
    pub no_cache: bool,

    #[arg(
        short = 'o',
        long,
        value_name = "FILE",
        help = "Write output to file instead of stdout"
    )]
    pub output: Option<PathBuf>,
}

#[derive(Parser, Debug, Clone)]
pub struct DetectArgs {
    #[arg(
        value_name = "FILE",
        help = "Features document (JSON); '-' or omitted reads stdin"
    )]
    pub input: Option<PathBuf>,

    #[arg(
        short = 'f',
        long,
        value_enum,
        default_value = "human",
        help = "Output format"
    )]
    pub format: OutputFormatArg,
}

#[derive(Parser, Debug, Clone)]
pub struct HealthArgs {
    #[arg(
        short = 'f',
        long,
        value_enum,
        default_value = "human",
        help = "Output format"
    )]
    pub format: OutputFormatArg,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormatArg {
    Json,
    Yaml,
    Human,
}

impl From<OutputFormatArg> for super::output::OutputFormat {
    fn from(arg: OutputFormatArg) -> Self {
        match arg {
            OutputFormatArg::Json => super::output::OutputFormat::Json,
            OutputFormatArg::Yaml => super::output::OutputFormat::Yaml,
            OutputFormatArg::Human => super::output::OutputFormat::Human,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyArg {
    /// Exactly one primary template
    Single,
    /// Primary plus every label above the threshold
    Multi,
}

fn parse_threshold(s: &str) -> Result<f64, String> {
    let value: f64 = s
        .trim()
        .parse()
        .map_err(|_| format!("Invalid threshold: {}", s))?;
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(format!("Threshold must be between 0.0 and 1.0, got {}", value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_args_verify() {
        CliArgs::command().debug_assert();
    }

    #[test]
    fn test_default_analyze_args() {
        let args = CliArgs::parse_from(["ciforge", "analyze"]);
        match args.command {
            Commands::Analyze(a) => {
                assert!(a.input.is_none());
                assert_eq!(a.format, OutputFormatArg::Json);
                assert!(!a.report && !a.no_classifier && !a.no_override && !a.no_cache);
                assert!(a.policy.is_none());
                assert!(a.threshold.is_none());
                assert!(a.timeout.is_none());
            }
            _ => panic!("Expected Analyze command"),
        }
    }

    #[test]
    fn test_analyze_with_options() {
        let args = CliArgs::parse_from([
            "ciforge",
            "analyze",
            "features.json",
            "--format",
            "yaml",
            "--policy",
            "multi",
            "--threshold",
            "0.6",
            "--timeout",
            "5",
            "-o",
            "out.yaml",
        ]);
        match args.command {
            Commands::Analyze(a) => {
                assert_eq!(a.input, Some(PathBuf::from("features.json")));
                assert_eq!(a.format, OutputFormatArg::Yaml);
                assert_eq!(a.policy, Some(PolicyArg::Multi));
                assert_eq!(a.threshold, Some(0.6));
                assert_eq!(a.timeout, Some(5));
                assert_eq!(a.output, Some(PathBuf::from("out.yaml")));
            }
            _ => panic!("Expected Analyze command"),
        }
    }

    #[test]
    fn test_threshold_out_of_range_rejected() {
        let result = CliArgs::try_parse_from(["ciforge", "analyze", "--threshold", "1.5"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_global_flags() {
        let args = CliArgs::parse_from(["ciforge", "-vv", "detect"]);
        assert_eq!(args.verbose, 2);
        assert!(!args.quiet);

        let args = CliArgs::parse_from(["ciforge", "health", "--log-level", "debug"]);
        assert_eq!(args.log_level.as_deref(), Some("debug"));

        assert!(CliArgs::try_parse_from(["ciforge", "-v", "-q", "health"]).is_err());
    }
}
