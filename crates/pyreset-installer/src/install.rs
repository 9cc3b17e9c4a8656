use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use pyreset_core::{
    upsert_managed_block, InstallVersionOutcome, ShellFlavor, ToolchainConfig, VersionManager,
};
use pyreset_tools::{run_checked, script_invocation, Pyenv, Toolbox};
use tracing::{debug, info, warn};

use crate::cleanup::pyenv_program;
use crate::fetch::ScriptFetcher;
use crate::fs_utils::{read_to_string_if_exists, replace_file_atomically};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallStep {
    VersionManager,
    PackageManager,
    Interpreter,
    GlobalVersion,
    ShellConfig,
    VenvRoot,
}

impl InstallStep {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::VersionManager => "version manager",
            Self::PackageManager => "package manager",
            Self::Interpreter => "interpreter",
            Self::GlobalVersion => "global version",
            Self::ShellConfig => "shell config",
            Self::VenvRoot => "venv root",
        }
    }
}

impl fmt::Display for InstallStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Changed(String),
    AlreadySatisfied,
    Failed(String),
    Skipped(String),
}

impl StepOutcome {
    pub fn is_satisfied(&self) -> bool {
        matches!(self, Self::AlreadySatisfied)
    }
}

impl fmt::Display for StepOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Changed(detail) => write!(f, "changed: {detail}"),
            Self::AlreadySatisfied => f.write_str("already satisfied"),
            Self::Failed(reason) => write!(f, "failed: {reason}"),
            Self::Skipped(reason) => write!(f, "skipped: {reason}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepResult {
    pub step: InstallStep,
    /// Set for steps that run once per file, i.e. shell configs.
    pub target: Option<PathBuf>,
    pub outcome: StepOutcome,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallReport {
    pub steps: Vec<StepResult>,
}

impl InstallReport {
    fn push(&mut self, step: InstallStep, outcome: StepOutcome) {
        self.push_for(step, None, outcome);
    }

    fn push_for(&mut self, step: InstallStep, target: Option<PathBuf>, outcome: StepOutcome) {
        match &outcome {
            StepOutcome::Changed(detail) => info!(%step, %detail, "install step changed"),
            StepOutcome::AlreadySatisfied => debug!(%step, "install step already satisfied"),
            StepOutcome::Failed(reason) => warn!(%step, %reason, "install step failed"),
            StepOutcome::Skipped(reason) => debug!(%step, %reason, "install step skipped"),
        }
        self.steps.push(StepResult {
            step,
            target,
            outcome,
        });
    }

    pub fn outcome(&self, step: InstallStep) -> Option<&StepOutcome> {
        self.steps
            .iter()
            .find(|result| result.step == step)
            .map(|result| &result.outcome)
    }

    pub fn all_satisfied(&self) -> bool {
        self.steps.iter().all(|result| result.outcome.is_satisfied())
    }

    pub fn changed(&self) -> impl Iterator<Item = &StepResult> {
        self.steps
            .iter()
            .filter(|result| matches!(result.outcome, StepOutcome::Changed(_)))
    }

    pub fn has_failures(&self) -> bool {
        self.steps
            .iter()
            .any(|result| matches!(result.outcome, StepOutcome::Failed(_)))
    }
}

/// Provisions the toolchain described by a [`ToolchainConfig`]. Every step
/// checks before it acts, so a second run reports everything satisfied and
/// touches nothing.
pub struct StackInstaller {
    toolbox: Toolbox,
    fetcher: Arc<dyn ScriptFetcher>,
}

impl StackInstaller {
    pub fn new(toolbox: Toolbox, fetcher: Arc<dyn ScriptFetcher>) -> Self {
        Self { toolbox, fetcher }
    }

    pub fn install(&self, config: &ToolchainConfig) -> InstallReport {
        let mut report = InstallReport::default();

        let version_manager = self.ensure_version_manager(config);
        let version_manager_ok = !matches!(version_manager, StepOutcome::Failed(_));
        report.push(InstallStep::VersionManager, version_manager);

        report.push(InstallStep::PackageManager, self.ensure_package_manager(config));

        if version_manager_ok {
            match self.pyenv(config) {
                Ok(pyenv) => {
                    let interpreter = ensure_interpreter(&pyenv, &config.pinned_version);
                    let interpreter_ok = !matches!(interpreter, StepOutcome::Failed(_));
                    report.push(InstallStep::Interpreter, interpreter);
                    let global = if interpreter_ok {
                        ensure_global_version(&pyenv, &config.pinned_version)
                    } else {
                        StepOutcome::Skipped(format!(
                            "interpreter {} is not installed",
                            config.pinned_version
                        ))
                    };
                    report.push(InstallStep::GlobalVersion, global);
                }
                Err(err) => {
                    report.push(InstallStep::Interpreter, StepOutcome::Failed(format!("{err:#}")));
                    report.push(
                        InstallStep::GlobalVersion,
                        StepOutcome::Skipped("version manager is not runnable".to_string()),
                    );
                }
            }
        } else {
            let reason = "version manager is not installed".to_string();
            report.push(InstallStep::Interpreter, StepOutcome::Skipped(reason.clone()));
            report.push(InstallStep::GlobalVersion, StepOutcome::Skipped(reason));
        }

        for path in shell_config_targets(config) {
            let outcome = ensure_shell_block(&path, config);
            report.push_for(InstallStep::ShellConfig, Some(path), outcome);
        }

        report.push(InstallStep::VenvRoot, ensure_dir(&config.venv_root));
        report
    }

    fn ensure_version_manager(&self, config: &ToolchainConfig) -> StepOutcome {
        let root = &config.version_manager_root;
        if root.is_dir() {
            return StepOutcome::AlreadySatisfied;
        }
        let envs = [("PYENV_ROOT", root.display().to_string())];
        match self.run_installer(&config.version_manager_installer_url, &envs) {
            Ok(()) if root.is_dir() => {
                StepOutcome::Changed(format!("installed into {}", root.display()))
            }
            Ok(()) => StepOutcome::Failed(format!(
                "installer finished but {} was not created",
                root.display()
            )),
            Err(err) => StepOutcome::Failed(format!("{err:#}")),
        }
    }

    fn ensure_package_manager(&self, config: &ToolchainConfig) -> StepOutcome {
        let bin = &config.package_manager_bin;
        if bin.is_file() {
            return StepOutcome::AlreadySatisfied;
        }
        let Some(install_dir) = bin.parent() else {
            return StepOutcome::Failed(format!("invalid package manager path: {}", bin.display()));
        };
        let envs = [
            ("UV_INSTALL_DIR", install_dir.display().to_string()),
            ("UV_NO_MODIFY_PATH", "1".to_string()),
        ];
        match self.run_installer(&config.package_manager_installer_url, &envs) {
            Ok(()) if bin.is_file() => StepOutcome::Changed(format!("installed {}", bin.display())),
            Ok(()) => StepOutcome::Failed(format!(
                "installer finished but {} was not created",
                bin.display()
            )),
            Err(err) => StepOutcome::Failed(format!("{err:#}")),
        }
    }

    /// Downloads an installer script and runs it with the platform shell.
    fn run_installer(&self, url: &str, envs: &[(&str, String)]) -> Result<()> {
        let windows = self.toolbox.os().is_windows();
        let script = self.fetcher.fetch(url)?;
        let suffix = if windows { ".ps1" } else { ".sh" };
        let mut file = tempfile::Builder::new()
            .prefix("pyreset-installer-")
            .suffix(suffix)
            .tempfile()
            .context("failed to create installer script file")?;
        file.write_all(&script)
            .context("failed to write installer script")?;
        let script_path = file.into_temp_path();

        let mut invocation = script_invocation(&script_path, windows);
        for (key, value) in envs {
            invocation = invocation.env(*key, value.clone());
        }
        info!(url, "running installer script");
        run_checked(self.toolbox.runner(), &invocation)
            .with_context(|| format!("installer from {url} failed"))?;
        Ok(())
    }

    fn pyenv(&self, config: &ToolchainConfig) -> Result<Pyenv> {
        let root = &config.version_manager_root;
        let program = pyenv_program(root, self.toolbox.os())
            .or_else(|| self.toolbox.locate("pyenv"))
            .ok_or_else(|| anyhow!("pyenv executable not found under {}", root.display()))?;
        Ok(self.toolbox.pyenv(&program, root))
    }
}

fn ensure_interpreter(pyenv: &Pyenv, version: &str) -> StepOutcome {
    match pyenv.install_version(version) {
        Ok(InstallVersionOutcome::Installed) => StepOutcome::Changed(format!("installed {version}")),
        Ok(InstallVersionOutcome::AlreadyInstalled) => StepOutcome::AlreadySatisfied,
        Err(err) => StepOutcome::Failed(err.to_string()),
    }
}

fn ensure_global_version(pyenv: &Pyenv, version: &str) -> StepOutcome {
    match pyenv.global_version() {
        Ok(Some(current)) if current == version => return StepOutcome::AlreadySatisfied,
        Ok(_) => {}
        Err(err) => debug!(error = %err, "could not read the global version"),
    }
    match pyenv.set_global(version) {
        Ok(()) => StepOutcome::Changed(format!("global version set to {version}")),
        Err(err) => StepOutcome::Failed(err.to_string()),
    }
}

/// Configured shell configs that exist, or the default one when none does.
fn shell_config_targets(config: &ToolchainConfig) -> Vec<PathBuf> {
    let existing = config
        .shell_configs
        .iter()
        .filter(|path| path.is_file())
        .cloned()
        .collect::<Vec<_>>();
    if existing.is_empty() {
        vec![config.default_shell_config.clone()]
    } else {
        existing
    }
}

fn ensure_shell_block(path: &Path, config: &ToolchainConfig) -> StepOutcome {
    let original = match read_to_string_if_exists(path) {
        Ok(text) => text,
        Err(err) => return StepOutcome::Failed(format!("failed to read {}: {err}", path.display())),
    };
    let lines = config.managed_shell_lines(ShellFlavor::for_path(path));
    let updated = upsert_managed_block(&original, &lines);
    if updated == original {
        return StepOutcome::AlreadySatisfied;
    }
    match replace_file_atomically(path, &updated) {
        Ok(()) => StepOutcome::Changed(format!("refreshed managed block in {}", path.display())),
        Err(err) => StepOutcome::Failed(format!("failed to write {}: {err}", path.display())),
    }
}

fn ensure_dir(path: &Path) -> StepOutcome {
    if path.is_dir() {
        return StepOutcome::AlreadySatisfied;
    }
    match fs::create_dir_all(path) {
        Ok(()) => StepOutcome::Changed(format!("created {}", path.display())),
        Err(err) => StepOutcome::Failed(format!("failed to create {}: {err}", path.display())),
    }
}
