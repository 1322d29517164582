//! ec2drift CLI entrypoint.
//!
//! This is the main entrypoint for the ec2drift command-line tool.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use ec2_drift::aws::{Ec2DescribeClient, StateFetcher, TokenBucket};
use ec2_drift::cancel::CancellationToken;
use ec2_drift::cli::{Cli, Commands, DetectArgs, OutputFormat, OutputFormatter};
use ec2_drift::config::{
    find_config_file, user_config_file, ConfigParser, ConfigValidator, DetectorConfig,
};
use ec2_drift::detector::DriftDetector;
use ec2_drift::error::{DriftError, Result};

use colored::Colorize;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Main entrypoint.
fn main() -> ExitCode {
    let cli = Cli::parse_args();

    // Initialize logging
    init_logging(cli.verbose, cli.log_json);

    // Run async runtime
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {e}", "Error:".red());
            ExitCode::FAILURE
        }
    }
}

/// Initializes the logging system. Logs go to stderr.
fn init_logging(verbose: bool, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("warn")
        }
    });

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Main async entry point.
async fn run(cli: Cli) -> Result<ExitCode> {
    match cli.command {
        Commands::Detect(args) => cmd_detect(cli.config.as_deref(), args).await,
        Commands::Attributes => {
            let formatter = OutputFormatter::new(OutputFormat::Text);
            write_stdout(&formatter.format_attributes())?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Validate { warnings } => cmd_validate(cli.config.as_deref(), warnings),
    }
}

/// Run drift detection.
async fn cmd_detect(config_path: Option<&Path>, args: DetectArgs) -> Result<ExitCode> {
    let mut config = load_config(config_path)?;

    if let Some(region) = args.region {
        config.aws.region = region;
    }
    if let Some(profile) = args.profile {
        config.aws.profile = Some(profile);
    }

    let attributes = if args.attributes.is_empty() {
        config.detection.attributes.clone()
    } else {
        args.attributes
    };
    ConfigValidator::check_attributes(&attributes)?;
    ConfigValidator::new().validate(&config)?;

    info!(
        "Checking {} against region {}",
        args.state.display(),
        config.aws.region
    );

    let client = Ec2DescribeClient::new(&config.aws.region, config.aws.profile.as_deref()).await;
    let fetcher = StateFetcher::new(Arc::new(client))
        .with_rate_limiter(Arc::new(TokenBucket::per_second(
            config.fetch.rate_limit_per_second,
        )))
        .with_retry_policy(config.fetch.retry_policy())
        .with_batch_size(config.fetch.batch_size);

    let detector = DriftDetector::new(Arc::new(fetcher))
        .with_batch_threshold(config.detection.batch_threshold)
        .with_max_concurrency(config.detection.max_concurrency);

    let cancel = args.timeout.map_or_else(CancellationToken::new, |secs| {
        CancellationToken::with_timeout(Duration::from_secs(secs))
    });
    cancel_on_ctrl_c(cancel.clone());

    let outcome = detector
        .detect_from_path(&cancel, &args.state, &args.instances, &attributes)
        .await?;

    let formatter = OutputFormatter::new(args.format);
    write_stdout(&formatter.format_outcome(&outcome))?;

    match outcome.error() {
        None => Ok(ExitCode::SUCCESS),
        Some(err) if outcome.reports.is_empty() => Err(DriftError::Detect(err)),
        Some(err) => {
            eprintln!(
                "{} {} of {} instance(s) checked: {err}",
                "Warning:".yellow(),
                outcome.reports.len(),
                outcome.reports.len() + outcome.failures.len()
            );
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Validate configuration.
fn cmd_validate(config_path: Option<&Path>, show_warnings: bool) -> Result<ExitCode> {
    let config = load_config(config_path)?;
    let result = ConfigValidator::new().validate(&config)?;

    eprintln!("{} Configuration is valid", "✓".green());
    if show_warnings && !result.warnings.is_empty() {
        eprintln!("\nWarnings:");
        for warning in &result.warnings {
            eprintln!("  - {warning}");
        }
    }

    let formatter = OutputFormatter::new(OutputFormat::Text);
    write_stdout(&formatter.format_config(&config))?;
    Ok(ExitCode::SUCCESS)
}

/// Resolves, loads and returns the effective configuration.
fn load_config(config_path: Option<&Path>) -> Result<DetectorConfig> {
    let resolved = resolve_config_path(config_path);
    let base_dir = resolved
        .as_deref()
        .and_then(Path::parent)
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf);

    let parser = ConfigParser::new().with_base_path(base_dir);
    parser.load_dotenv()?;
    parser.load(resolved.as_deref())
}

/// Explicit path, else the nearest `ec2drift.yaml`, else the user config.
fn resolve_config_path(config_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = config_path {
        return Some(path.to_path_buf());
    }

    let found = std::env::current_dir()
        .ok()
        .and_then(|cwd| find_config_file(cwd).ok())
        .or_else(user_config_file);

    if found.is_none() {
        debug!("No configuration file found, using defaults");
    }
    found
}

/// Cancels outstanding fetches on Ctrl-C.
fn cancel_on_ctrl_c(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling outstanding requests");
            cancel.cancel();
        }
    });
}

fn write_stdout(content: &str) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(content.as_bytes())?;
    if !content.ends_with('\n') {
        writeln!(stdout)?;
    }
    stdout.flush()?;
    Ok(())
}
