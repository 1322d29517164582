//! CLI command definitions.
//!
//! This module defines all CLI commands and their arguments using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::CONFIG_ENV_VAR;

/// ec2drift - Detect drift between Terraform state and live EC2 instances.
#[derive(Parser, Debug)]
#[command(name = "ec2drift")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the configuration file.
    #[arg(short, long, global = true, env = CONFIG_ENV_VAR)]
    pub config: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Compare live instances against a Terraform state baseline.
    Detect(DetectArgs),

    /// List the attributes that can be checked.
    Attributes,

    /// Validate the configuration and print the effective settings.
    Validate {
        /// Show all warnings, not just errors.
        #[arg(short, long)]
        warnings: bool,
    },
}

/// Arguments of the `detect` command.
#[derive(clap::Args, Debug, Clone)]
pub struct DetectArgs {
    /// Terraform state or `.tf` file, or a directory of them.
    #[arg(short, long)]
    pub state: PathBuf,

    /// Instance ids to check. Defaults to every instance in the baseline.
    #[arg(short, long, value_delimiter = ',')]
    pub instances: Vec<String>,

    /// Attributes to check. Defaults to the configured list.
    #[arg(short, long, value_delimiter = ',')]
    pub attributes: Vec<String>,

    /// Output format.
    #[arg(long, default_value = "text")]
    pub format: OutputFormat,

    /// AWS region, overriding the configuration.
    #[arg(long)]
    pub region: Option<String>,

    /// AWS profile, overriding the configuration.
    #[arg(long)]
    pub profile: Option<String>,

    /// Abort outstanding fetches after this many seconds.
    #[arg(long)]
    pub timeout: Option<u64>,
}

/// Output format options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

impl Cli {
    /// Parses CLI arguments from the command line.
    #[must_use]
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_detect() {
        let cli = Cli::try_parse_from([
            "ec2drift",
            "detect",
            "-s",
            "terraform.tfstate",
            "-i",
            "i-1,i-2",
            "-a",
            "InstanceType,Tags",
            "--format",
            "json",
            "--timeout",
            "30",
        ])
        .unwrap();

        let Commands::Detect(args) = cli.command else {
            panic!("expected detect");
        };
        assert_eq!(args.state, PathBuf::from("terraform.tfstate"));
        assert_eq!(args.instances, vec!["i-1", "i-2"]);
        assert_eq!(args.attributes, vec!["InstanceType", "Tags"]);
        assert_eq!(args.format, OutputFormat::Json);
        assert_eq!(args.timeout, Some(30));
        assert_eq!(args.region, None);
    }

    #[test]
    fn test_detect_requires_state() {
        assert!(Cli::try_parse_from(["ec2drift", "detect"]).is_err());
    }
}
