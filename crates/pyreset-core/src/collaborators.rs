use crate::ToolError;

/// A package manager the orchestrator drives as an opaque external tool.
pub trait PackageManager {
    fn name(&self) -> &str;

    /// Raw output of the tool's freeze-equivalent listing, verbatim.
    fn freeze_raw(&self) -> Result<String, ToolError>;

    fn freeze(&self) -> Result<Vec<String>, ToolError> {
        Ok(self
            .freeze_raw()?
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(ToOwned::to_owned)
            .collect())
    }

    fn install(&self, spec: &str) -> Result<(), ToolError>;

    fn install_version(&self, version: &str) -> Result<(), ToolError> {
        Err(ToolError::Unsupported {
            program: self.name().to_string(),
            operation: format!("installing interpreter {version}"),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallVersionOutcome {
    Installed,
    AlreadyInstalled,
}

/// An interpreter version manager (pyenv / pyenv-win).
pub trait VersionManager {
    fn list_versions(&self) -> Result<Vec<String>, ToolError>;
    fn install_version(&self, version: &str) -> Result<InstallVersionOutcome, ToolError>;
    fn set_global(&self, version: &str) -> Result<(), ToolError>;
    fn global_version(&self) -> Result<Option<String>, ToolError>;
    fn uninstall_version(&self, version: &str) -> Result<(), ToolError>;
}
