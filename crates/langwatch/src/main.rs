//! langwatch CLI - GitHub path watcher for localization files.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use langwatch::config::{MonitorsFile, Settings};
use langwatch::pipeline::{Pipeline, PipelineConfig, RunReport};
use langwatch::state::WatchState;
use notify::{EmailChannel, NotifyChannel};

/// langwatch CLI - watch GitHub repository paths and notify on change.
#[derive(Parser)]
#[command(name = "langwatch")]
#[command(about = "GitHub path watcher with email and To Do notifications")]
#[command(version)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a single check pass (for scheduled use)
    Check {
        /// Monitor config file
        #[arg(long, default_value = "config/monitors.json")]
        config: PathBuf,

        /// Watch state file
        #[arg(long, default_value = "data/state.json")]
        state: PathBuf,

        /// Detect and report only; skip notifiers and the state save
        #[arg(long)]
        dry_run: bool,
    },

    /// Show the persisted watch state
    Status {
        /// Watch state file
        #[arg(long, default_value = "data/state.json")]
        state: PathBuf,
    },

    /// Send a test email to verify the SMTP configuration
    TestEmail {
        /// Monitor config file (for subject prefix and sender name)
        #[arg(long, default_value = "config/monitors.json")]
        config: PathBuf,
    },

    /// Obtain a Microsoft To Do refresh token (interactive)
    Auth {
        /// Azure application (client) id; falls back to MS_TODO_CLIENT_ID
        #[arg(long)]
        client_id: Option<String>,

        /// Local callback port
        #[arg(long, default_value = "8400")]
        port: u16,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose {
        EnvFilter::new("langwatch=debug,notify=debug,info")
    } else {
        EnvFilter::new("langwatch=info,notify=info,warn")
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    match cli.command {
        Commands::Check {
            config,
            state,
            dry_run,
        } => {
            tracing::info!(
                config = %config.display(),
                state = %state.display(),
                dry_run,
                "Starting check"
            );
            run_check(config, state, dry_run).await
        }
        Commands::Status { state } => run_status(&state),
        Commands::TestEmail { config } => run_test_email(&config).await,
        Commands::Auth { client_id, port } => {
            tracing::info!(port, "Starting authorization helper");
            langwatch::auth::run(client_id, port).await
        }
    }
}

async fn run_check(config: PathBuf, state: PathBuf, dry_run: bool) -> Result<()> {
    let pipeline = Pipeline::new(PipelineConfig {
        config_path: config,
        state_path: state,
        dry_run,
    });
    let report = pipeline.run().await?;

    // Print summary
    println!("\n📊 Check Summary");
    println!("   Checked:   {}", report.checked);
    println!("   Changed:   {}", report.changed());
    println!("   Baselined: {}", report.baselined);
    println!("   Unchanged: {}", report.unchanged);

    if !report.events.is_empty() {
        println!("\n📢 Updates:");
        for event in &report.events {
            println!("   • {}: {} ({})", event.monitor, event.path, event.repo);
        }
    }

    if !report.path_failures.is_empty() {
        println!("   Path failures: {}", report.path_failures.len());
        for failure in &report.path_failures {
            eprintln!("     - {} {}: {}", failure.repo, failure.path, failure.error);
        }
    }

    if !report.notifier_failures.is_empty() {
        println!("   Notifier failures: {}", report.notifier_failures.len());
        for (channel, error) in &report.notifier_failures {
            eprintln!("     - {channel}: {error}");
        }
    }

    write_actions_output(&report);

    if report.all_checks_failed() {
        bail!("Every path check failed");
    }
    if report.degraded() {
        // Partial failure: distinct from both success and fatal error so the
        // external scheduler can surface it.
        std::process::exit(2);
    }

    Ok(())
}

fn run_status(state_path: &Path) -> Result<()> {
    let state = WatchState::load(state_path);

    if state.is_empty() {
        println!("No watch state recorded yet at {}", state_path.display());
        return Ok(());
    }

    println!("Watch state ({} paths)\n", state.len());
    for (key, entry) in &state.monitors {
        let short = &entry.last_sha[..entry.last_sha.len().min(7)];
        println!(
            "  {:<60} {} {}",
            key,
            short,
            entry.checked_at.format("%Y-%m-%d %H:%M UTC")
        );
    }

    if let Some(last) = state.last_check {
        println!("\nLast check: {}", last.format("%Y-%m-%d %H:%M:%S UTC"));
    }

    Ok(())
}

async fn run_test_email(config_path: &Path) -> Result<()> {
    let settings = if config_path.exists() {
        MonitorsFile::load(config_path)?.settings
    } else {
        Settings::default()
    };

    let channel = EmailChannel::from_env(&settings.notify_options());
    if !channel.enabled() {
        bail!(
            "Email is not configured. Set EMAIL_SMTP_SERVER, EMAIL_USERNAME, \
             EMAIL_PASSWORD and EMAIL_TO."
        );
    }

    channel.send_test().await.context("Test email failed")?;
    println!("✅ Test email sent");
    Ok(())
}

/// Append the run outcome to the GitHub Actions output file, when present.
fn write_actions_output(report: &RunReport) {
    let Ok(path) = std::env::var("GITHUB_OUTPUT") else {
        return;
    };

    let line = format!(
        "has_updates={}\nupdate_count={}\n",
        report.changed() > 0,
        report.changed()
    );

    let result = std::fs::OpenOptions::new()
        .append(true)
        .create(true)
        .open(&path)
        .and_then(|mut file| file.write_all(line.as_bytes()));

    if let Err(e) = result {
        tracing::warn!(path = %path, error = %e, "Failed to write GITHUB_OUTPUT");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_check_defaults() {
        let cli = Cli::parse_from(["langwatch", "check"]);
        match cli.command {
            Commands::Check {
                config,
                state,
                dry_run,
            } => {
                assert_eq!(config, PathBuf::from("config/monitors.json"));
                assert_eq!(state, PathBuf::from("data/state.json"));
                assert!(!dry_run);
            }
            _ => panic!("Expected Check command"),
        }
    }

    #[test]
    fn test_cli_parse_check_dry_run() {
        let cli = Cli::parse_from(["langwatch", "check", "--dry-run", "--state", "/tmp/s.json"]);
        match cli.command {
            Commands::Check { state, dry_run, .. } => {
                assert_eq!(state, PathBuf::from("/tmp/s.json"));
                assert!(dry_run);
            }
            _ => panic!("Expected Check command"),
        }
    }

    #[test]
    fn test_cli_parse_auth() {
        let cli = Cli::parse_from(["langwatch", "auth", "--client-id", "abc"]);
        match cli.command {
            Commands::Auth { client_id, port } => {
                assert_eq!(client_id.as_deref(), Some("abc"));
                assert_eq!(port, 8400);
            }
            _ => panic!("Expected Auth command"),
        }
    }

    #[test]
    fn test_cli_verbose_is_global() {
        let cli = Cli::parse_from(["langwatch", "status", "--verbose"]);
        assert!(cli.verbose);
    }

    #[test]
    #[serial_test::serial]
    fn test_write_actions_output() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        std::env::set_var("GITHUB_OUTPUT", &path);

        let report = RunReport::default();
        write_actions_output(&report);

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("has_updates=false"));
        assert!(content.contains("update_count=0"));
        std::env::remove_var("GITHUB_OUTPUT");
    }

    #[test]
    #[serial_test::serial]
    fn test_write_actions_output_absent_env_is_noop() {
        std::env::remove_var("GITHUB_OUTPUT");
        // Must not panic or create anything.
        write_actions_output(&RunReport::default());
    }
}
