// # cfsync - zone configuration archiver
//
// Thin integration layer. All sync logic lives in cfsync-core; this binary:
// 1. Parses the command line
// 2. Initializes logging
// 3. Loads and validates the configuration file
// 4. Registers fetch protocols and builds the configured fetcher
// 5. Runs the sync engine once on a current-thread runtime
//
// ## Usage
//
// ```bash
// cfsync --config /etc/cfsync.toml
// cfsync -n            # write files but do not commit; keep the working copy
// ```
//
// ## Exit Codes
//
// - 0: Success, including "no changes"
// - 1: Configuration error
// - 2: Run failure (login, fetch, git)

use anyhow::{Context, Result};
use cfsync_core::config::DEFAULT_CONFIG_PATH;
use cfsync_core::{CommitMode, FetcherRegistry, RunOutcome, RunReport, SyncConfig, SyncEngine};
use cfsync_core::traits::ConfigFetcher;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{Level, error, info};
use tracing_subscriber::FmtSubscriber;

/// Exit codes for different termination scenarios
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CfsyncExitCode {
    /// Run finished (with or without changes)
    Success = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// The run aborted
    RunFailure = 2,
}

impl From<CfsyncExitCode> for ExitCode {
    fn from(code: CfsyncExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Log verbosity accepted by `--log-level`
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "cfsync", version)]
#[command(about = "Archive Cloudflare zone configuration into a git repository")]
struct Cli {
    /// Config file location
    #[arg(short, long, env = "CFSYNC_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Write out the JSON data but don't commit or push
    #[arg(short = 'n', long = "no-commit")]
    no_commit: bool,

    /// Log verbosity
    #[arg(long, env = "CFSYNC_LOG_LEVEL", value_enum, ignore_case = true, default_value = "info")]
    log_level: LogLevel,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::from(cli.log_level))
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return CfsyncExitCode::ConfigError.into();
    }

    let config = match SyncConfig::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return CfsyncExitCode::ConfigError.into();
        }
    };

    let fetcher = match build_fetcher(&config) {
        Ok(fetcher) => fetcher,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return CfsyncExitCode::ConfigError.into();
        }
    };

    let mode = CommitMode::from_no_commit(cli.no_commit);
    let engine = SyncEngine::new(fetcher, config.archive, mode);

    let rt = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return CfsyncExitCode::RunFailure.into();
        }
    };

    let code = rt.block_on(async {
        match engine.run().await {
            Ok(report) => {
                summarize(&report);
                CfsyncExitCode::Success
            }
            Err(e) => {
                error!("Sync failed: {}", e);
                CfsyncExitCode::RunFailure
            }
        }
    });

    code.into()
}

/// Register the compiled-in protocols and build the configured fetcher
fn build_fetcher(config: &SyncConfig) -> Result<Box<dyn ConfigFetcher>> {
    let registry = FetcherRegistry::new();

    #[cfg(feature = "cloudflare")]
    cfsync_fetcher_cloudflare::register(&registry);

    let fetcher = registry
        .create_fetcher(&config.cloudflare)
        .with_context(|| format!("Cannot create {} fetcher", config.cloudflare.protocol))?;
    info!("Using {} protocol", fetcher.protocol_name());
    Ok(fetcher)
}

fn summarize(report: &RunReport) {
    match &report.outcome {
        RunOutcome::Committed { commit } => info!(
            "Archived {} change(s) in commit {}",
            report.changed_count(),
            commit
        ),
        RunOutcome::NoChanges => info!("Archive is up to date"),
        RunOutcome::CommitDisabled => {
            if let Some(path) = &report.retained_workdir {
                info!(
                    "{} change(s) left uncommitted in {}",
                    report.changed_count(),
                    path.display()
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_short_flags() {
        let cli = Cli::try_parse_from(["cfsync", "-c", "/tmp/cfsync.toml", "-n"]).unwrap();
        assert_eq!(cli.config, PathBuf::from("/tmp/cfsync.toml"));
        assert!(cli.no_commit);
        assert_eq!(
            CommitMode::from_no_commit(cli.no_commit),
            CommitMode::Disabled
        );
    }

    #[test]
    fn test_log_level_parsing() {
        let cli = Cli::try_parse_from(["cfsync", "--log-level", "DEBUG"]).unwrap();
        assert_eq!(cli.log_level, LogLevel::Debug);

        assert!(Cli::try_parse_from(["cfsync", "--log-level", "loud"]).is_err());
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(CfsyncExitCode::Success as u8, 0);
        assert_eq!(CfsyncExitCode::ConfigError as u8, 1);
        assert_eq!(CfsyncExitCode::RunFailure as u8, 2);
    }

    #[cfg(feature = "cloudflare")]
    #[test]
    fn test_build_fetcher_uses_configured_protocol() {
        let config = SyncConfig::from_toml(
            r#"
[cloudflare]
protocol = "legacy"
username = "ops@example.com"
user_id = "1"
api_key = "k"
login_pass = "p"

[archive]
repo_url = "/srv/git/archive.git"
"#,
        )
        .unwrap();

        let fetcher = build_fetcher(&config).unwrap();
        assert_eq!(fetcher.protocol_name(), "legacy");
    }
}
