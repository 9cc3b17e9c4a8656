use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

/// Host operating system family, detected once per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OsTag {
    Linux,
    MacOs,
    Windows,
}

impl OsTag {
    pub fn current() -> Self {
        if cfg!(windows) {
            Self::Windows
        } else if cfg!(target_os = "macos") {
            Self::MacOs
        } else {
            Self::Linux
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Linux => "linux",
            Self::MacOs => "macos",
            Self::Windows => "windows",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "linux" => Ok(Self::Linux),
            "macos" | "darwin" | "osx" => Ok(Self::MacOs),
            "windows" | "win32" => Ok(Self::Windows),
            other => Err(anyhow!("unsupported os tag: {other}")),
        }
    }

    pub fn is_windows(self) -> bool {
        self == Self::Windows
    }

    pub fn executable_name(self, stem: &str) -> String {
        match self {
            Self::Windows => format!("{stem}.exe"),
            Self::Linux | Self::MacOs => stem.to_string(),
        }
    }

    /// Interpreter path inside a virtual environment root.
    pub fn venv_python(self, venv_root: &Path) -> PathBuf {
        match self {
            Self::Windows => venv_root.join("Scripts").join("python.exe"),
            Self::Linux | Self::MacOs => venv_root.join("bin").join("python"),
        }
    }

    pub fn venv_pip(self, venv_root: &Path) -> PathBuf {
        match self {
            Self::Windows => venv_root.join("Scripts").join("pip.exe"),
            Self::Linux | Self::MacOs => venv_root.join("bin").join("pip"),
        }
    }
}

impl fmt::Display for OsTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
