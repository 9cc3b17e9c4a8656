mod dispatch;
mod flows;
mod prompt;
mod render;

use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::error::{ContextKind, ContextValue, ErrorKind};
use clap::{Parser, ValueEnum};
use pyreset_core::{CommandError, ConfirmationGate};
use tracing::warn;
use tracing_subscriber::EnvFilter;

use crate::dispatch::{run_command, Session};
use crate::prompt::TerminalConsent;

const LOG_ENV: &str = "PYRESET_LOG";
const INTERRUPTED_EXIT: i32 = 130;

#[derive(Parser, Debug)]
#[command(name = "pyreset", version)]
#[command(
    about = "Inventory, back up, clean and rebuild a Python toolchain",
    long_about = None
)]
struct Cli {
    /// Operation to run.
    #[arg(value_enum, default_value_t = CommandName::Help)]
    command: CommandName,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum CommandName {
    /// Report interpreters, tools, environments and caches without changing anything.
    Analyze,
    /// Write a timestamped backup archive of package lists and environment metadata.
    Backup,
    /// Remove every Python artifact the inventory finds.
    CleanAll,
    /// Remove system and user-installed interpreters.
    CleanSystem,
    /// Remove the version manager root and its shell configuration lines.
    CleanPyenv,
    /// Remove virtual environments and package caches.
    CleanPackages,
    /// Install the pinned interpreter with pyenv and uv.
    SetupModern,
    /// Back up, remove everything, then install the pinned toolchain.
    FullReset,
    /// Show this help.
    Help,
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => return parse_failure(err),
    };
    init_tracing();

    let cancelled = Arc::new(AtomicBool::new(false));
    if let Err(err) = install_interrupt_handler(Arc::clone(&cancelled)) {
        warn!(error = %err, "continuing without interrupt handling");
    }

    match run(cli.command, cancelled) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(command: CommandName, cancelled: Arc<AtomicBool>) -> Result<()> {
    let session = Session::from_env(Arc::clone(&cancelled))?;
    let mut gate = ConfirmationGate::new(TerminalConsent::new(cancelled));
    run_command(command, &session, &mut gate)
}

fn parse_failure(err: clap::Error) -> ExitCode {
    match err.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
            let _ = err.print();
            ExitCode::SUCCESS
        }
        ErrorKind::InvalidValue => {
            let value = match err.get(ContextKind::InvalidValue) {
                Some(ContextValue::String(value)) => value.clone(),
                _ => String::new(),
            };
            eprintln!("error: {}", CommandError::InvalidCommand(value));
            eprintln!("run `pyreset help` to list the available commands");
            ExitCode::FAILURE
        }
        _ => {
            let _ = err.print();
            ExitCode::FAILURE
        }
    }
}

/// Logs go to stderr so stdout carries only the report.
fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true)
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}

/// First Ctrl-C lets the current action finish and stops the run; a second
/// one exits immediately.
fn install_interrupt_handler(cancelled: Arc<AtomicBool>) -> Result<()> {
    ctrlc::set_handler(move || {
        if cancelled.swap(true, Ordering::SeqCst) {
            std::process::exit(INTERRUPTED_EXIT);
        }
        eprintln!("\ninterrupted; stopping after the current step (Ctrl-C again to abort)");
    })
    .context("failed to install Ctrl-C handler")
}
