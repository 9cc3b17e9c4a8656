use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::OsTag;

/// Values of the tool-specific environment variables that relocate well-known
/// directories. Absent means "use the platform default".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvOverrides {
    pub pyenv_root: Option<PathBuf>,
    pub uv_cache_dir: Option<PathBuf>,
    pub uv_python_install_dir: Option<PathBuf>,
    pub pip_cache_dir: Option<PathBuf>,
}

impl EnvOverrides {
    pub fn from_env() -> Self {
        Self {
            pyenv_root: env_path("PYENV_ROOT"),
            uv_cache_dir: env_path("UV_CACHE_DIR"),
            uv_python_install_dir: env_path("UV_PYTHON_INSTALL_DIR"),
            pip_cache_dir: env_path("PIP_CACHE_DIR"),
        }
    }
}

/// Anchor directories of the machine being managed. Every path the tool reads
/// or writes is derived from one of these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostLayout {
    home: PathBuf,
    system_root: PathBuf,
    local_app_data: Option<PathBuf>,
    app_data: Option<PathBuf>,
    program_files: Option<PathBuf>,
    overrides: EnvOverrides,
}

impl HostLayout {
    pub fn new(home: impl Into<PathBuf>) -> Self {
        Self {
            home: home.into(),
            system_root: default_system_root(),
            local_app_data: None,
            app_data: None,
            program_files: None,
            overrides: EnvOverrides::default(),
        }
    }

    pub fn from_env() -> Result<Self> {
        let home = dirs::home_dir().context("cannot resolve the home directory")?;
        let mut layout = Self::new(home).with_overrides(EnvOverrides::from_env());
        layout.local_app_data = env_path("LOCALAPPDATA");
        layout.app_data = env_path("APPDATA");
        layout.program_files = env_path("ProgramFiles");
        if let Some(drive) = env_path("SystemDrive") {
            layout.system_root = drive.join(std::path::MAIN_SEPARATOR_STR);
        }
        Ok(layout)
    }

    pub fn with_system_root(mut self, system_root: impl Into<PathBuf>) -> Self {
        self.system_root = system_root.into();
        self
    }

    pub fn with_overrides(mut self, overrides: EnvOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    pub fn system_root(&self) -> &Path {
        &self.system_root
    }

    pub fn overrides(&self) -> &EnvOverrides {
        &self.overrides
    }

    pub fn local_app_data(&self) -> PathBuf {
        self.local_app_data
            .clone()
            .unwrap_or_else(|| self.home.join("AppData").join("Local"))
    }

    pub fn app_data(&self) -> PathBuf {
        self.app_data
            .clone()
            .unwrap_or_else(|| self.home.join("AppData").join("Roaming"))
    }

    pub fn program_files(&self) -> PathBuf {
        self.program_files
            .clone()
            .unwrap_or_else(|| self.system_root.join("Program Files"))
    }

    pub fn pyenv_root(&self) -> PathBuf {
        self.overrides
            .pyenv_root
            .clone()
            .unwrap_or_else(|| self.home.join(".pyenv"))
    }

    pub fn uv_cache_dir(&self, os: OsTag) -> PathBuf {
        if let Some(dir) = &self.overrides.uv_cache_dir {
            return dir.clone();
        }
        match os {
            OsTag::Windows => self.local_app_data().join("uv").join("cache"),
            OsTag::Linux | OsTag::MacOs => self.home.join(".cache").join("uv"),
        }
    }

    pub fn uv_python_install_dir(&self, os: OsTag) -> PathBuf {
        if let Some(dir) = &self.overrides.uv_python_install_dir {
            return dir.clone();
        }
        match os {
            OsTag::Windows => self.app_data().join("uv").join("python"),
            OsTag::Linux | OsTag::MacOs => self
                .home
                .join(".local")
                .join("share")
                .join("uv")
                .join("python"),
        }
    }

    pub fn pip_cache_dir(&self, os: OsTag) -> PathBuf {
        if let Some(dir) = &self.overrides.pip_cache_dir {
            return dir.clone();
        }
        match os {
            OsTag::Linux => self.home.join(".cache").join("pip"),
            OsTag::MacOs => self.home.join("Library").join("Caches").join("pip"),
            OsTag::Windows => self.local_app_data().join("pip").join("Cache"),
        }
    }

    pub fn user_bin_dir(&self) -> PathBuf {
        self.home.join(".local").join("bin")
    }

    pub fn default_venv_root(&self) -> PathBuf {
        self.home.join(".venvs")
    }

    pub fn powershell_profiles(&self) -> Vec<PathBuf> {
        let documents = self.home.join("Documents");
        vec![
            documents
                .join("PowerShell")
                .join("Microsoft.PowerShell_profile.ps1"),
            documents
                .join("WindowsPowerShell")
                .join("Microsoft.PowerShell_profile.ps1"),
        ]
    }

    /// Default parent directory for backup archives.
    pub fn backup_parent(&self) -> PathBuf {
        env_path("PYRESET_BACKUP_DIR").unwrap_or_else(|| self.home.clone())
    }

    pub fn config_file(&self) -> Option<PathBuf> {
        if let Some(path) = env_path("PYRESET_CONFIG") {
            return Some(path);
        }
        dirs::config_dir().map(|dir| dir.join("pyreset").join("config.toml"))
    }
}

fn default_system_root() -> PathBuf {
    if cfg!(windows) {
        PathBuf::from("C:\\")
    } else {
        PathBuf::from("/")
    }
}

fn env_path(key: &str) -> Option<PathBuf> {
    std::env::var_os(key)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}
