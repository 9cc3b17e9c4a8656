use std::sync::atomic::Ordering;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use pyreset_backup::{verify_archive, BackupArchive, BackupManager};
use pyreset_core::{
    ActionScope, CleanupPlan, CleanupScope, CommandError, ConfirmationGate, ConsentSource,
    EnvironmentSnapshot,
};
use pyreset_installer::{CleanupExecutor, CleanupReport, InstallReport, StackInstaller};
use tracing::info;

use crate::dispatch::Session;
use crate::render::{
    format_backup_lines, format_cleanup_report_lines, format_install_plan_lines,
    format_install_report_lines, format_plan_lines, format_snapshot_lines,
};

const FULL_RESET: &str = "full-reset";
const SETUP_MODERN: &str = "setup-modern";

/// What a full reset did. Every part stays empty when consent is refused.
#[derive(Debug, Default)]
pub(crate) struct FullResetOutcome {
    pub(crate) archive: Option<BackupArchive>,
    pub(crate) cleanup: CleanupReport,
    pub(crate) install: Option<InstallReport>,
}

impl FullResetOutcome {
    pub(crate) fn has_failures(&self) -> bool {
        self.cleanup.failures().next().is_some()
            || self.install.as_ref().is_some_and(InstallReport::has_failures)
    }
}

pub(crate) fn analyze(session: &Session) -> EnvironmentSnapshot {
    let snapshot = session.scan();
    session.renderer.print_section("inventory");
    session.renderer.print_lines(&format_snapshot_lines(&snapshot));
    snapshot
}

pub(crate) fn backup(session: &Session) -> Result<BackupArchive> {
    let snapshot = session.scan();
    write_backup(session, &snapshot)
}

pub(crate) fn clean<S: ConsentSource>(
    session: &Session,
    gate: &mut ConfirmationGate<S>,
    scope: CleanupScope,
) -> Result<CleanupReport> {
    let renderer = session.renderer;
    let command = scope_command(scope);
    let snapshot = session.scan();
    let plan = CleanupPlan::from_snapshot(&snapshot, &session.layout, scope, None);

    renderer.print_section(&format!("{command} plan"));
    if plan.is_empty() {
        renderer.print_status("ok", "nothing to remove");
        return Ok(CleanupReport::default());
    }
    renderer.print_lines(&format_plan_lines(&plan));

    if !gate.authorize(&scope.action_scope()).is_authorized() {
        report_denied(session, command);
        return Ok(CleanupReport::default());
    }
    execute_plan(session, &plan)
}

pub(crate) fn setup_modern<S: ConsentSource>(
    session: &Session,
    gate: &mut ConfirmationGate<S>,
) -> Option<InstallReport> {
    let renderer = session.renderer;
    renderer.print_section("toolchain");
    renderer.print_lines(&format_install_plan_lines(&session.toolchain));

    let scope = ActionScope::scoped(format!(
        "Install Python {} with pyenv and uv",
        session.toolchain.pinned_version
    ));
    if !gate.authorize(&scope).is_authorized() {
        report_denied(session, SETUP_MODERN);
        return None;
    }
    Some(install(session))
}

/// Backup, then remove everything except the desired toolchain, then
/// install it. One consent covers all three phases.
pub(crate) fn full_reset<S: ConsentSource>(
    session: &Session,
    gate: &mut ConfirmationGate<S>,
) -> Result<FullResetOutcome> {
    let renderer = session.renderer;
    let snapshot = session.scan();
    let retained = session.toolchain.retained();
    let plan = CleanupPlan::from_snapshot(
        &snapshot,
        &session.layout,
        CleanupScope::All,
        Some(&retained),
    );

    renderer.print_section("full reset plan");
    if plan.is_empty() {
        renderer.print_status("ok", "nothing to remove");
    } else {
        renderer.print_lines(&format_plan_lines(&plan));
    }
    renderer.print_lines(&format_install_plan_lines(&session.toolchain));

    if !gate.authorize(&ActionScope::Nuclear).is_authorized() {
        report_denied(session, FULL_RESET);
        return Ok(FullResetOutcome::default());
    }

    let mut outcome = FullResetOutcome::default();
    if !plan.is_empty() {
        let archive = write_backup(session, &snapshot)
            .context("backup failed; nothing was removed")?;
        ensure_intact(&archive).context("backup failed; nothing was removed")?;
        outcome.archive = Some(archive);
        outcome.cleanup = execute_plan(session, &plan)?;
    }

    if session.cancelled.load(Ordering::SeqCst) {
        renderer.print_status("warn", "interrupted; toolchain installation skipped");
        return Ok(outcome);
    }
    outcome.install = Some(install(session));
    Ok(outcome)
}

fn write_backup(session: &Session, snapshot: &EnvironmentSnapshot) -> Result<BackupArchive> {
    let renderer = session.renderer;
    let archive = BackupManager::new(session.toolbox.clone(), session.layout.clone())
        .backup(snapshot)?;
    renderer.print_section("backup");
    renderer.print_lines(&format_backup_lines(&archive, renderer.style()));
    if archive.has_failures() {
        renderer.print_status(
            "warn",
            "some captures failed; see the .failed files in the backup",
        );
    }
    Ok(archive)
}

/// Re-reads the archive from disk before anything it describes is removed.
fn ensure_intact(archive: &BackupArchive) -> Result<()> {
    let verification = verify_archive(&archive.root)?;
    if let Some(problem) = verification.problems.first() {
        bail!(
            "backup archive {} did not verify ({} problem(s)): {problem}",
            archive.root.display(),
            verification.problems.len()
        );
    }
    info!(checked = verification.checked, archive = %archive.root.display(), "backup verified");
    Ok(())
}

fn execute_plan(session: &Session, plan: &CleanupPlan) -> Result<CleanupReport> {
    let renderer = session.renderer;
    let executor = CleanupExecutor::new(session.toolbox.clone(), session.layout.clone())
        .with_cancel_flag(Arc::clone(&session.cancelled));

    let mut progress = renderer.start_progress("cleanup", plan.len() as u64);
    let result = executor.execute_with_observer(plan, |index, _| progress.set(index as u64 + 1));
    progress.finish();
    let report = result?;

    let totals = report.totals();
    info!(
        removed = totals.removed,
        failed = totals.failed,
        skipped = totals.skipped,
        "cleanup finished"
    );
    renderer.print_section("cleanup results");
    renderer.print_lines(&format_cleanup_report_lines(&report, renderer.style()));
    Ok(report)
}

fn install(session: &Session) -> InstallReport {
    let renderer = session.renderer;
    let installer = StackInstaller::new(session.toolbox.clone(), Arc::clone(&session.fetcher));
    let report = installer.install(&session.toolchain);

    renderer.print_section("toolchain results");
    renderer.print_lines(&format_install_report_lines(&report, renderer.style()));
    if report.all_satisfied() {
        renderer.print_status("ok", "toolchain already up to date");
    } else if report.has_failures() {
        renderer.print_status("warn", "toolchain installed with failures");
    }
    report
}

fn report_denied(session: &Session, command: &str) {
    let message = CommandError::ConfirmationDenied(command.to_string()).to_string();
    info!(command, "operation declined");
    session.renderer.print_status("warn", &message);
}

fn scope_command(scope: CleanupScope) -> &'static str {
    match scope {
        CleanupScope::All => "clean-all",
        CleanupScope::SystemInterpreters => "clean-system",
        CleanupScope::VersionManager => "clean-pyenv",
        CleanupScope::Packages => "clean-packages",
    }
}
