use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use pyreset_core::{
    strip_tool_lines, ActionFailure, CleanupPlan, HostLayout, OsTag, RemovalAction,
    RemovalCategory, RemovalMethod, ToolError, VersionManager,
};
use pyreset_tools::{run_checked, Invocation, Toolbox};
use tracing::{debug, info, warn};

use crate::fs_utils::{remove_tree, replace_file_atomically};

pub const CANCELLED_REASON: &str = "cancelled";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    Removed,
    Failed(ActionFailure),
    Skipped(String),
}

impl fmt::Display for ActionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Removed => f.write_str("removed"),
            Self::Failed(failure) => write!(f, "failed: {failure}"),
            Self::Skipped(reason) => write!(f, "skipped: {reason}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionResult {
    pub action: RemovalAction,
    pub outcome: ActionOutcome,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutcomeCounts {
    pub removed: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl OutcomeCounts {
    fn record(&mut self, outcome: &ActionOutcome) {
        match outcome {
            ActionOutcome::Removed => self.removed += 1,
            ActionOutcome::Failed(_) => self.failed += 1,
            ActionOutcome::Skipped(_) => self.skipped += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.removed + self.failed + self.skipped
    }
}

/// One entry per planned action, in execution order. A declined or empty
/// run produces the default (empty) report.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub results: Vec<ActionResult>,
}

impl CleanupReport {
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn counts_by_category(&self) -> BTreeMap<RemovalCategory, OutcomeCounts> {
        let mut counts: BTreeMap<RemovalCategory, OutcomeCounts> = BTreeMap::new();
        for result in &self.results {
            counts
                .entry(result.action.category)
                .or_default()
                .record(&result.outcome);
        }
        counts
    }

    pub fn totals(&self) -> OutcomeCounts {
        let mut totals = OutcomeCounts::default();
        for result in &self.results {
            totals.record(&result.outcome);
        }
        totals
    }

    pub fn failures(&self) -> impl Iterator<Item = &ActionResult> {
        self.results
            .iter()
            .filter(|result| matches!(result.outcome, ActionOutcome::Failed(_)))
    }
}

/// Applies a [`CleanupPlan`] category by category. Every action is attempted
/// on its own; failures are recorded and the batch continues.
pub struct CleanupExecutor {
    toolbox: Toolbox,
    layout: HostLayout,
    cancelled: Arc<AtomicBool>,
}

impl CleanupExecutor {
    pub fn new(toolbox: Toolbox, layout: HostLayout) -> Self {
        Self {
            toolbox,
            layout,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Shares a flag (typically set from a Ctrl-C handler) that stops the run
    /// before the next action starts. An action in progress always finishes.
    pub fn with_cancel_flag(mut self, cancelled: Arc<AtomicBool>) -> Self {
        self.cancelled = cancelled;
        self
    }

    pub fn execute(&self, plan: &CleanupPlan) -> Result<CleanupReport> {
        self.execute_with_observer(plan, |_, _| {})
    }

    /// Like [`execute`](Self::execute), calling `observer` with the action
    /// index after each action completes. Fails only for plans that target
    /// a filesystem root, the home directory or a relative path.
    pub fn execute_with_observer<F>(&self, plan: &CleanupPlan, mut observer: F) -> Result<CleanupReport>
    where
        F: FnMut(usize, &ActionResult),
    {
        plan.validate(&self.layout)?;

        let mut report = CleanupReport::default();
        for (index, action) in plan.ordered_actions().into_iter().enumerate() {
            let outcome = if self.cancelled.load(Ordering::SeqCst) {
                ActionOutcome::Skipped(CANCELLED_REASON.to_string())
            } else {
                self.apply(action)
            };
            match &outcome {
                ActionOutcome::Removed => {
                    info!(category = %action.category, target = %action.target_path.display(), "removed")
                }
                ActionOutcome::Failed(failure) => warn!(
                    category = %action.category,
                    target = %action.target_path.display(),
                    error = %failure,
                    "removal failed"
                ),
                ActionOutcome::Skipped(reason) => {
                    debug!(target = %action.target_path.display(), %reason, "removal skipped")
                }
            }
            let result = ActionResult {
                action: action.clone(),
                outcome,
            };
            observer(index, &result);
            report.results.push(result);
        }
        Ok(report)
    }

    fn apply(&self, action: &RemovalAction) -> ActionOutcome {
        let target = &action.target_path;
        if let Err(err) = fs::symlink_metadata(target) {
            return ActionOutcome::Failed(ActionFailure::from_io(target, &err));
        }

        let result = match &action.method {
            RemovalMethod::DeleteTree => delete_tree(target),
            RemovalMethod::UninstallPackage { manager, package } => {
                self.uninstall_package(manager, package)
            }
            RemovalMethod::UninstallVersion { version } => self.uninstall_version(target, version),
            RemovalMethod::StripShellConfig { keep_managed_block } => {
                return strip_shell_config(target, *keep_managed_block);
            }
        };
        match result {
            Ok(()) => ActionOutcome::Removed,
            Err(failure) => ActionOutcome::Failed(failure),
        }
    }

    fn uninstall_package(&self, manager: &str, package: &str) -> Result<(), ActionFailure> {
        let program = self.toolbox.locate(manager).ok_or_else(|| ToolError::NotFound {
            program: manager.to_string(),
        })?;
        let invocation = Invocation::new(program).args(["uninstall", package]);
        run_checked(self.toolbox.runner(), &invocation)?;
        Ok(())
    }

    fn uninstall_version(&self, target: &Path, version: &str) -> Result<(), ActionFailure> {
        let os = self.toolbox.os();
        let Some(root) = version_manager_root(target, os) else {
            return delete_tree(target);
        };
        let Some(program) = pyenv_program(&root, os).or_else(|| self.toolbox.locate("pyenv")) else {
            debug!(version, "pyenv not found, deleting the version directory directly");
            return delete_tree(target);
        };
        self.toolbox.pyenv(&program, &root).uninstall_version(version)?;
        Ok(())
    }
}

fn delete_tree(target: &Path) -> Result<(), ActionFailure> {
    remove_tree(target).map_err(|err| ActionFailure::from_io(target, &err))
}

fn strip_shell_config(path: &Path, keep_managed_block: bool) -> ActionOutcome {
    let original = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) => return ActionOutcome::Failed(ActionFailure::from_io(path, &err)),
    };
    let stripped = strip_tool_lines(&original, keep_managed_block);
    if stripped == original {
        return ActionOutcome::Skipped("no version-manager lines left".to_string());
    }
    match replace_file_atomically(path, &stripped) {
        Ok(()) => ActionOutcome::Removed,
        Err(err) => ActionOutcome::Failed(ActionFailure::from_io(path, &err)),
    }
}

/// `<root>/versions/<v>`, or `<root>/pyenv-win/versions/<v>` on Windows.
fn version_manager_root(version_dir: &Path, os: OsTag) -> Option<PathBuf> {
    let versions = version_dir.parent()?;
    let root = versions.parent()?;
    match os {
        OsTag::Windows => root.parent().map(Path::to_path_buf),
        OsTag::Linux | OsTag::MacOs => Some(root.to_path_buf()),
    }
}

/// The version manager's own executable inside its install root.
pub(crate) fn pyenv_program(root: &Path, os: OsTag) -> Option<PathBuf> {
    let candidate = match os {
        OsTag::Windows => root.join("pyenv-win").join("bin").join("pyenv.bat"),
        OsTag::Linux | OsTag::MacOs => root.join("bin").join("pyenv"),
    };
    candidate.is_file().then_some(candidate)
}
