use std::path::{Path, PathBuf};
use std::sync::Arc;

use pyreset_core::{InstallVersionOutcome, PackageManager, ToolError, VersionManager};
use tracing::{debug, info};

use crate::runner::{run_checked, CommandRunner, Invocation, INSTALL_TIMEOUT};

/// pip, either as its own executable or as `python -m pip`.
pub struct Pip {
    runner: Arc<dyn CommandRunner>,
    program: PathBuf,
    via_module: bool,
}

impl Pip {
    pub fn direct(runner: Arc<dyn CommandRunner>, pip: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            program: pip.into(),
            via_module: false,
        }
    }

    /// Runs pip through a specific interpreter, e.g. a virtual environment's.
    pub fn module(runner: Arc<dyn CommandRunner>, python: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            program: python.into(),
            via_module: true,
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    fn invocation(&self) -> Invocation {
        let invocation = Invocation::new(&self.program);
        let invocation = if self.via_module {
            invocation.args(["-m", "pip"])
        } else {
            invocation
        };
        invocation.arg("--disable-pip-version-check")
    }
}

impl PackageManager for Pip {
    fn name(&self) -> &str {
        "pip"
    }

    fn freeze_raw(&self) -> Result<String, ToolError> {
        run_checked(self.runner.as_ref(), &self.invocation().arg("freeze"))
    }

    fn install(&self, spec: &str) -> Result<(), ToolError> {
        let invocation = self
            .invocation()
            .args(["install", spec])
            .timeout(INSTALL_TIMEOUT);
        run_checked(self.runner.as_ref(), &invocation).map(|_| ())
    }
}

/// uv. Its freeze-equivalent is the list of installed tools.
pub struct Uv {
    runner: Arc<dyn CommandRunner>,
    program: PathBuf,
}

impl Uv {
    pub fn new(runner: Arc<dyn CommandRunner>, program: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            program: program.into(),
        }
    }
}

impl PackageManager for Uv {
    fn name(&self) -> &str {
        "uv"
    }

    fn freeze_raw(&self) -> Result<String, ToolError> {
        let invocation = Invocation::new(&self.program).args(["tool", "list"]);
        run_checked(self.runner.as_ref(), &invocation)
    }

    fn install(&self, spec: &str) -> Result<(), ToolError> {
        let invocation = Invocation::new(&self.program)
            .args(["tool", "install", spec])
            .timeout(INSTALL_TIMEOUT);
        run_checked(self.runner.as_ref(), &invocation).map(|_| ())
    }

    fn install_version(&self, version: &str) -> Result<(), ToolError> {
        let invocation = Invocation::new(&self.program)
            .args(["python", "install", version])
            .timeout(INSTALL_TIMEOUT);
        run_checked(self.runner.as_ref(), &invocation).map(|_| ())
    }
}

pub struct Pipx {
    runner: Arc<dyn CommandRunner>,
    program: PathBuf,
}

impl Pipx {
    pub fn new(runner: Arc<dyn CommandRunner>, program: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            program: program.into(),
        }
    }
}

impl PackageManager for Pipx {
    fn name(&self) -> &str {
        "pipx"
    }

    fn freeze_raw(&self) -> Result<String, ToolError> {
        let invocation = Invocation::new(&self.program).args(["list", "--short"]);
        run_checked(self.runner.as_ref(), &invocation)
    }

    fn install(&self, spec: &str) -> Result<(), ToolError> {
        let invocation = Invocation::new(&self.program)
            .args(["install", spec])
            .timeout(INSTALL_TIMEOUT);
        run_checked(self.runner.as_ref(), &invocation).map(|_| ())
    }
}

/// pyenv, or pyenv-win on Windows. Every call pins `PYENV_ROOT` so the
/// configured root is used even when the caller's environment differs.
pub struct Pyenv {
    runner: Arc<dyn CommandRunner>,
    program: PathBuf,
    root: PathBuf,
    windows: bool,
}

impl Pyenv {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        program: impl Into<PathBuf>,
        root: impl Into<PathBuf>,
        windows: bool,
    ) -> Self {
        Self {
            runner,
            program: program.into(),
            root: root.into(),
            windows,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn invocation<I, S>(&self, args: I) -> Invocation
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Invocation::new(&self.program)
            .args(args)
            .env("PYENV_ROOT", self.root.display().to_string())
    }
}

impl VersionManager for Pyenv {
    fn list_versions(&self) -> Result<Vec<String>, ToolError> {
        let raw = run_checked(self.runner.as_ref(), &self.invocation(["versions", "--bare"]))?;
        Ok(parse_version_list(&raw))
    }

    fn install_version(&self, version: &str) -> Result<InstallVersionOutcome, ToolError> {
        if self.list_versions()?.iter().any(|installed| installed == version) {
            debug!(version, "interpreter already installed");
            return Ok(InstallVersionOutcome::AlreadyInstalled);
        }
        info!(version, "installing interpreter");
        let invocation = self
            .invocation(["install", "-s", version])
            .timeout(INSTALL_TIMEOUT);
        match run_checked(self.runner.as_ref(), &invocation) {
            Ok(_) => Ok(InstallVersionOutcome::Installed),
            Err(ToolError::Failed { stderr, .. }) if reports_already_installed(&stderr) => {
                Ok(InstallVersionOutcome::AlreadyInstalled)
            }
            Err(err) => Err(err),
        }
    }

    fn set_global(&self, version: &str) -> Result<(), ToolError> {
        run_checked(self.runner.as_ref(), &self.invocation(["global", version])).map(|_| ())
    }

    fn global_version(&self) -> Result<Option<String>, ToolError> {
        let raw = run_checked(self.runner.as_ref(), &self.invocation(["global"]))?;
        Ok(parse_version_list(&raw).into_iter().next())
    }

    fn uninstall_version(&self, version: &str) -> Result<(), ToolError> {
        let invocation = if self.windows {
            self.invocation(["uninstall", version])
        } else {
            self.invocation(["uninstall", "-f", version])
        };
        run_checked(self.runner.as_ref(), &invocation).map(|_| ())
    }
}

/// Accepts both `versions --bare` output and the decorated pyenv-win form
/// (`* 3.11.7 (set by ...)`). The `system` pseudo-version is dropped.
pub fn parse_version_list(raw: &str) -> Vec<String> {
    raw.lines()
        .map(|line| line.trim().trim_start_matches('*').trim())
        .filter_map(|line| line.split_whitespace().next())
        .filter(|version| *version != "system")
        .map(ToOwned::to_owned)
        .collect()
}

fn reports_already_installed(stderr: &str) -> bool {
    let lowered = stderr.to_ascii_lowercase();
    lowered.contains("already installed") || lowered.contains("already exists")
}
