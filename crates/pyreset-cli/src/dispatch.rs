use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::CommandFactory;
use pyreset_backup::RESTORE_GUIDE_FILE;
use pyreset_core::{
    CleanupScope, ConfirmationGate, ConsentSource, EnvironmentSnapshot, HostLayout, OsTag,
    PathCatalog, ToolchainConfig,
};
use pyreset_installer::{HttpFetcher, ScriptFetcher};
use pyreset_scanner::InventoryScanner;
use pyreset_tools::{PathLocator, SystemCommandRunner, Toolbox};
use tracing::debug;

use crate::flows;
use crate::render::{current_output_style, OutputStyle, TerminalRenderer};
use crate::{Cli, CommandName};

/// Everything a command needs about the host, resolved once per run.
pub(crate) struct Session {
    pub(crate) layout: HostLayout,
    pub(crate) toolbox: Toolbox,
    pub(crate) toolchain: ToolchainConfig,
    pub(crate) fetcher: Arc<dyn ScriptFetcher>,
    pub(crate) cancelled: Arc<AtomicBool>,
    pub(crate) renderer: TerminalRenderer,
}

impl Session {
    pub(crate) fn new(
        layout: HostLayout,
        toolbox: Toolbox,
        toolchain: ToolchainConfig,
        fetcher: Arc<dyn ScriptFetcher>,
        style: OutputStyle,
    ) -> Self {
        Self {
            layout,
            toolbox,
            toolchain,
            fetcher,
            cancelled: Arc::new(AtomicBool::new(false)),
            renderer: TerminalRenderer::from_style(style),
        }
    }

    pub(crate) fn from_env(cancelled: Arc<AtomicBool>) -> Result<Self> {
        let os = OsTag::current();
        let layout = HostLayout::from_env()?;
        let toolchain = ToolchainConfig::load(&layout, os)?;
        let locator = PathLocator::for_layout(&layout, os);
        let toolbox = Toolbox::new(Arc::new(SystemCommandRunner), Arc::new(locator), os);
        let fetcher = HttpFetcher::new().context("failed to prepare installer downloads")?;
        debug!(home = %layout.home().display(), %os, "session ready");

        let mut session = Self::new(
            layout,
            toolbox,
            toolchain,
            Arc::new(fetcher),
            current_output_style(),
        );
        session.cancelled = cancelled;
        Ok(session)
    }

    pub(crate) fn os(&self) -> OsTag {
        self.toolbox.os()
    }

    /// A fresh inventory. Every command that acts on the machine scans first.
    pub(crate) fn scan(&self) -> EnvironmentSnapshot {
        let catalog = PathCatalog::new(self.layout.clone());
        InventoryScanner::new(self.toolbox.clone()).scan(&catalog, self.os())
    }
}

pub(crate) fn run_command<S: ConsentSource>(
    command: CommandName,
    session: &Session,
    gate: &mut ConfirmationGate<S>,
) -> Result<()> {
    match command {
        CommandName::Analyze => {
            flows::analyze(session);
        }
        CommandName::Backup => {
            flows::backup(session)?;
        }
        CommandName::CleanAll => {
            flows::clean(session, gate, CleanupScope::All)?;
        }
        CommandName::CleanSystem => {
            flows::clean(session, gate, CleanupScope::SystemInterpreters)?;
        }
        CommandName::CleanPyenv => {
            flows::clean(session, gate, CleanupScope::VersionManager)?;
        }
        CommandName::CleanPackages => {
            flows::clean(session, gate, CleanupScope::Packages)?;
        }
        CommandName::SetupModern => {
            flows::setup_modern(session, gate);
        }
        CommandName::FullReset => {
            let outcome = flows::full_reset(session, gate)?;
            if let Some(archive) = &outcome.archive {
                session.renderer.print_status(
                    "ok",
                    &format!(
                        "restore instructions: {}",
                        archive.file(RESTORE_GUIDE_FILE).display()
                    ),
                );
            }
            if outcome.has_failures() {
                session
                    .renderer
                    .print_status("warn", "full reset finished with failures; see above");
            }
        }
        CommandName::Help => {
            Cli::command()
                .print_long_help()
                .context("failed to print help")?;
        }
    }
    Ok(())
}
