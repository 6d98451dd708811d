//! filesink CLI
//!
//! Thin wrapper around filesink-core for command-line usage.
//!
//! ## Usage
//!
//! ```bash
//! # Pipe a program's output into a rotating log file
//! my-server 2>&1 | filesink --file logs/server.log write
//!
//! # Same, with settings from a JSON file and a minimum level
//! my-server | filesink -c filesink.json --level warn write --severity error
//!
//! # Delete rotated files older than the retention window
//! filesink --file logs/server.log --max-days 14 sweep
//!
//! # Show the resolved configuration
//! filesink -c filesink.json config
//! ```

use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use filesink_core::{FileHook, HookConfig, RetentionManager, Severity};
use tokio::io::AsyncBufReadExt;
use tracing::{debug, info, warn};

/// filesink - rotating file sink for log streams
#[derive(Parser)]
#[command(name = "filesink")]
#[command(version = "0.1.0")]
#[command(about = "Rotating, retention-managed log files")]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// JSON configuration file (kebab-case keys, e.g. "max-lines")
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Active log file path
    #[arg(long, global = true)]
    file: Option<PathBuf>,

    /// Minimum severity written
    #[arg(long, global = true)]
    level: Option<Severity>,

    /// Rotate after this many lines (0 disables)
    #[arg(long, global = true)]
    max_lines: Option<u64>,

    /// Rotate before exceeding this many bytes (0 disables)
    #[arg(long, global = true)]
    max_size: Option<u64>,

    /// Delete rotated files older than this many days (0 keeps everything)
    #[arg(long, global = true)]
    max_days: Option<i64>,

    /// Do not rotate at midnight
    #[arg(long, global = true)]
    no_daily: bool,

    /// Do not rotate at the top of each hour
    #[arg(long, global = true)]
    no_hourly: bool,

    /// Never rotate or delete files
    #[arg(long, global = true)]
    no_rotate: bool,

    /// Keep ANSI color codes in written lines
    #[arg(long, global = true)]
    keep_colors: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Append stdin lines to the log file until EOF or Ctrl-C
    Write {
        /// Severity assigned to every line
        #[arg(short, long, default_value = "info")]
        severity: Severity,
    },

    /// Run retention once and print deleted files
    Sweep,

    /// Print the resolved configuration as JSON
    Config,
}

impl Cli {
    /// Config file values, then command-line overrides.
    fn hook_config(&self) -> Result<HookConfig> {
        let mut config = match &self.config {
            Some(path) => HookConfig::from_path(path)
                .with_context(|| format!("failed to load config from {}", path.display()))?,
            None => HookConfig::default(),
        };

        if let Some(file) = &self.file {
            config.filename = file.clone();
        }
        if self.level.is_some() {
            config.level = self.level;
        }
        if let Some(max_lines) = self.max_lines {
            config.max_lines = max_lines;
        }
        if let Some(max_size) = self.max_size {
            config.max_size = max_size;
        }
        if let Some(max_days) = self.max_days {
            config.max_days = max_days;
        }
        if self.no_daily {
            config.daily = false;
        }
        if self.no_hourly {
            config.hourly = false;
        }
        if self.no_rotate {
            config.rotate = false;
        }
        if self.keep_colors {
            config.strip_colors = false;
        }

        Ok(config)
    }
}

fn setup_logging(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    // stdout carries command output, diagnostics go to stderr.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .init();
}

/// Pump stdin into the hook. Returns the number of lines written.
async fn pump_stdin(hook: &FileHook, severity: Severity) -> Result<u64> {
    let stdin = tokio::io::stdin();
    let reader = tokio::io::BufReader::new(stdin);
    let mut lines = reader.lines();
    let mut written = 0u64;

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read stdin")? else {
                    break;
                };
                match hook.fire(severity, Local::now(), &line) {
                    Ok(()) => {
                        if hook.enabled(severity) {
                            written += 1;
                        }
                    }
                    // The line was written even though rotation failed.
                    Err(e) if e.entry_persisted() => {
                        warn!(error = %e, "rotation failed, line kept in the current file");
                        written += 1;
                    }
                    Err(e) => {
                        return Err(e).with_context(|| {
                            format!("failed to write to {}", hook.path().display())
                        });
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                debug!("interrupted, closing log file");
                break;
            }
        }
    }

    Ok(written)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose);

    let config = cli.hook_config()?;

    match cli.command {
        Commands::Write { severity } => {
            let hook = FileHook::new(&config)
                .with_context(|| format!("failed to open {}", config.filename.display()))?;

            let result = pump_stdin(&hook, severity).await;
            hook.close()
                .with_context(|| format!("failed to close {}", hook.path().display()))?;

            let written = result?;
            info!(path = %hook.path().display(), lines = written, "log file closed");
            eprintln!("wrote {} lines to {}", written, hook.path().display());
        }

        Commands::Sweep => {
            let writer_config = config.to_writer_config()?;
            let days = if writer_config.rotate_enabled {
                writer_config.max_retained_days
            } else {
                0
            };
            let manager = RetentionManager::new(&writer_config.path, days)?;

            let deleted = manager
                .sweep(Local::now().naive_local())?
                .into_result()
                .context("some expired files could not be deleted")?;
            info!(
                dir = %manager.directory().display(),
                deleted = deleted.len(),
                "retention sweep finished"
            );
            for path in deleted {
                println!("{}", path.display());
            }
        }

        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(())
}
