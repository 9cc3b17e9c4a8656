use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

use crate::{parse_python_version, HostLayout, OsTag, RetainedToolchain, ShellFlavor};

const DEFAULT_PINNED_VERSION: &str = "3.11.7";
const POSIX_VERSION_MANAGER_INSTALLER: &str = "https://pyenv.run";
const WINDOWS_VERSION_MANAGER_INSTALLER: &str =
    "https://raw.githubusercontent.com/pyenv-win/pyenv-win/master/pyenv-win/install-pyenv-win.ps1";
const POSIX_PACKAGE_MANAGER_INSTALLER: &str = "https://astral.sh/uv/install.sh";
const WINDOWS_PACKAGE_MANAGER_INSTALLER: &str = "https://astral.sh/uv/install.ps1";

/// Desired end state of the toolchain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolchainConfig {
    pub pinned_version: String,
    pub version_manager_root: PathBuf,
    pub package_manager_bin: PathBuf,
    pub venv_root: PathBuf,
    /// Exported from the managed shell block, in key order.
    pub environment: BTreeMap<String, String>,
    /// Additional lines appended to the managed shell block.
    pub extra_shell_lines: Vec<String>,
    /// Shell configs that receive the managed block when they exist.
    pub shell_configs: Vec<PathBuf>,
    /// Created when none of `shell_configs` exists.
    pub default_shell_config: PathBuf,
    pub version_manager_installer_url: String,
    pub package_manager_installer_url: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ToolchainOverrides {
    pinned_version: Option<String>,
    version_manager_root: Option<PathBuf>,
    package_manager_bin: Option<PathBuf>,
    venv_root: Option<PathBuf>,
    #[serde(default)]
    environment: BTreeMap<String, String>,
    #[serde(default)]
    extra_shell_lines: Vec<String>,
    shell_configs: Option<Vec<PathBuf>>,
    default_shell_config: Option<PathBuf>,
    version_manager_installer_url: Option<String>,
    package_manager_installer_url: Option<String>,
}

impl ToolchainConfig {
    pub fn defaults(layout: &HostLayout, os: OsTag) -> Self {
        let home = layout.home();
        let mut environment = BTreeMap::new();
        environment.insert(
            "PYENV_ROOT".to_string(),
            layout.pyenv_root().display().to_string(),
        );
        let overrides = layout.overrides();
        if let Some(dir) = &overrides.uv_cache_dir {
            environment.insert("UV_CACHE_DIR".to_string(), dir.display().to_string());
        }
        if let Some(dir) = &overrides.uv_python_install_dir {
            environment.insert(
                "UV_PYTHON_INSTALL_DIR".to_string(),
                dir.display().to_string(),
            );
        }

        let (shell_configs, default_shell_config) = match os {
            OsTag::Windows => {
                let profiles = layout.powershell_profiles();
                let default = profiles[0].clone();
                (profiles, default)
            }
            OsTag::Linux => (
                vec![home.join(".bashrc"), home.join(".zshrc")],
                home.join(".bashrc"),
            ),
            OsTag::MacOs => (
                vec![home.join(".zshrc"), home.join(".bashrc")],
                home.join(".zshrc"),
            ),
        };

        let (version_manager_installer_url, package_manager_installer_url) = match os {
            OsTag::Windows => (
                WINDOWS_VERSION_MANAGER_INSTALLER,
                WINDOWS_PACKAGE_MANAGER_INSTALLER,
            ),
            OsTag::Linux | OsTag::MacOs => (
                POSIX_VERSION_MANAGER_INSTALLER,
                POSIX_PACKAGE_MANAGER_INSTALLER,
            ),
        };

        Self {
            pinned_version: DEFAULT_PINNED_VERSION.to_string(),
            version_manager_root: layout.pyenv_root(),
            package_manager_bin: layout.user_bin_dir().join(os.executable_name("uv")),
            venv_root: layout.default_venv_root(),
            environment,
            extra_shell_lines: Vec::new(),
            shell_configs,
            default_shell_config,
            version_manager_installer_url: version_manager_installer_url.to_string(),
            package_manager_installer_url: package_manager_installer_url.to_string(),
        }
    }

    pub fn from_toml_str(input: &str, layout: &HostLayout, os: OsTag) -> Result<Self> {
        let overrides: ToolchainOverrides =
            toml::from_str(input).context("failed to parse toolchain config")?;
        let mut config = Self::defaults(layout, os);
        if let Some(version) = overrides.pinned_version {
            config.pinned_version = version;
        }
        if let Some(root) = overrides.version_manager_root {
            config.environment.insert(
                "PYENV_ROOT".to_string(),
                root.display().to_string(),
            );
            config.version_manager_root = root;
        }
        if let Some(bin) = overrides.package_manager_bin {
            config.package_manager_bin = bin;
        }
        if let Some(root) = overrides.venv_root {
            config.venv_root = root;
        }
        config.environment.extend(overrides.environment);
        config.extra_shell_lines.extend(overrides.extra_shell_lines);
        if let Some(configs) = overrides.shell_configs {
            config.shell_configs = configs;
        }
        if let Some(path) = overrides.default_shell_config {
            config.default_shell_config = path;
        }
        if let Some(url) = overrides.version_manager_installer_url {
            config.version_manager_installer_url = url;
        }
        if let Some(url) = overrides.package_manager_installer_url {
            config.package_manager_installer_url = url;
        }
        config.validate()?;
        Ok(config)
    }

    /// Defaults, overlaid with the config file when one exists.
    pub fn load(layout: &HostLayout, os: OsTag) -> Result<Self> {
        let Some(path) = layout.config_file() else {
            return Ok(Self::defaults(layout, os));
        };
        Self::load_from(&path, layout, os)
    }

    pub fn load_from(path: &Path, layout: &HostLayout, os: OsTag) -> Result<Self> {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Ok(Self::defaults(layout, os));
            }
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("failed to read config: {}", path.display()));
            }
        };
        Self::from_toml_str(&raw, layout, os)
            .with_context(|| format!("invalid config: {}", path.display()))
    }

    pub fn validate(&self) -> Result<()> {
        if parse_python_version(&self.pinned_version).is_none() {
            return Err(anyhow!(
                "pinned interpreter version is not a CPython release: {}",
                self.pinned_version
            ));
        }
        for key in self.environment.keys() {
            let valid = !key.is_empty()
                && !key.starts_with(|ch: char| ch.is_ascii_digit())
                && key.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '_');
            if !valid {
                return Err(anyhow!("invalid environment variable name: {key}"));
            }
        }
        Ok(())
    }

    pub fn retained(&self) -> RetainedToolchain {
        RetainedToolchain {
            version_manager_root: self.version_manager_root.clone(),
            pinned_version: self.pinned_version.clone(),
        }
    }

    /// Body of the managed shell block for one shell flavour.
    pub fn managed_shell_lines(&self, flavor: ShellFlavor) -> Vec<String> {
        let mut lines = Vec::new();
        let user_bin = self
            .package_manager_bin
            .parent()
            .map(|dir| dir.display().to_string());
        match flavor {
            ShellFlavor::Posix => {
                for (key, value) in &self.environment {
                    lines.push(format!("export {key}=\"{}\"", escape_double_quoted(value)));
                }
                lines.push(
                    "[ -d \"$PYENV_ROOT/bin\" ] && export PATH=\"$PYENV_ROOT/bin:$PATH\"".to_string(),
                );
                if let Some(bin) = user_bin {
                    lines.push(format!("export PATH=\"{}:$PATH\"", escape_double_quoted(&bin)));
                }
                lines.push("command -v pyenv >/dev/null 2>&1 && eval \"$(pyenv init -)\"".to_string());
            }
            ShellFlavor::PowerShell => {
                for (key, value) in &self.environment {
                    lines.push(format!("$env:{key} = '{}'", escape_single_quoted_ps(value)));
                }
                let pyenv_win = self.version_manager_root.join("pyenv-win");
                lines.push(format!(
                    "$env:PATH = '{};{};' + $env:PATH",
                    escape_single_quoted_ps(&pyenv_win.join("bin").display().to_string()),
                    escape_single_quoted_ps(&pyenv_win.join("shims").display().to_string()),
                ));
                if let Some(bin) = user_bin {
                    lines.push(format!(
                        "$env:PATH = '{};' + $env:PATH",
                        escape_single_quoted_ps(&bin)
                    ));
                }
            }
        }
        lines.extend(self.extra_shell_lines.iter().cloned());
        lines
    }
}

fn escape_double_quoted(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('$', "\\$")
        .replace('`', "\\`")
}

fn escape_single_quoted_ps(value: &str) -> String {
    value.replace('\'', "''")
}
