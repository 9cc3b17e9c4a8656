mod locator;
mod managers;
mod probe;
mod runner;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use pyreset_core::{OsTag, PackageManager};

pub use locator::{is_executable_file, PathLocator, ToolLocator};
pub use managers::{parse_version_list, Pip, Pipx, Pyenv, Uv};
pub use probe::{parse_tool_version, probe_version};
pub use runner::{
    run_checked, script_invocation, CommandRunner, Invocation, SystemCommandRunner, ToolOutput,
    DEFAULT_TOOL_TIMEOUT, INSTALL_TIMEOUT, PROBE_TIMEOUT,
};

/// Package and version managers the inventory looks for, in report order.
pub const KNOWN_TOOLS: [&str; 4] = ["pip", "uv", "pyenv", "pipx"];

/// Bundles how to find and run external tools, plus factories for the
/// typed collaborators built on top of them.
#[derive(Clone)]
pub struct Toolbox {
    runner: Arc<dyn CommandRunner>,
    locator: Arc<dyn ToolLocator>,
    os: OsTag,
}

impl Toolbox {
    pub fn new(runner: Arc<dyn CommandRunner>, locator: Arc<dyn ToolLocator>, os: OsTag) -> Self {
        Self {
            runner,
            locator,
            os,
        }
    }

    pub fn runner(&self) -> &dyn CommandRunner {
        self.runner.as_ref()
    }

    pub fn shared_runner(&self) -> Arc<dyn CommandRunner> {
        Arc::clone(&self.runner)
    }

    pub fn os(&self) -> OsTag {
        self.os
    }

    /// Resolves one of [`KNOWN_TOOLS`]. pip is looked up as `pip3` first.
    pub fn locate(&self, tool: &str) -> Option<PathBuf> {
        match tool {
            "pip" => self
                .locator
                .locate("pip3")
                .or_else(|| self.locator.locate("pip")),
            other => self.locator.locate(other),
        }
    }

    /// Typed collaborator for a located package manager. `pyenv` is not a
    /// package manager and yields `None`.
    pub fn package_manager(&self, tool: &str, program: &Path) -> Option<Box<dyn PackageManager>> {
        let runner = self.shared_runner();
        match tool {
            "pip" => Some(Box::new(Pip::direct(runner, program))),
            "uv" => Some(Box::new(Uv::new(runner, program))),
            "pipx" => Some(Box::new(Pipx::new(runner, program))),
            _ => None,
        }
    }

    /// pip bound to a virtual environment's own interpreter.
    pub fn venv_pip(&self, venv_root: &Path) -> Pip {
        Pip::module(self.shared_runner(), self.os.venv_python(venv_root))
    }

    pub fn pyenv(&self, program: &Path, root: &Path) -> Pyenv {
        Pyenv::new(self.shared_runner(), program, root, self.os.is_windows())
    }

    pub fn probe_version(&self, program: &Path) -> Result<String, pyreset_core::ToolError> {
        probe_version(self.runner(), program)
    }
}
