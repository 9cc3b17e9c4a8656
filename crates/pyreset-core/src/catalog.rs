use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{CacheOwner, HostLayout, InterpreterOrigin, OsTag};

/// Kinds of Python artifacts the catalog knows how to locate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    Interpreter,
    VersionManagerRoot,
    VirtualEnvRoot,
    Cache,
    ShellConfig,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Interpreter,
        Category::VersionManagerRoot,
        Category::VirtualEnvRoot,
        Category::Cache,
        Category::ShellConfig,
    ];
}

/// What a matched path is, as far as the catalog can tell from its location alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationKind {
    Interpreter(InterpreterOrigin),
    VersionManagerRoot,
    /// Directory whose children are virtual environments.
    VirtualEnvRoot,
    Cache(CacheOwner),
    ShellConfig,
}

/// One candidate location: a concrete base directory plus an optional
/// glob-style suffix (`Python3*/python.exe`) evaluated beneath it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateLocation {
    pub base: PathBuf,
    pub pattern: Option<String>,
    pub kind: LocationKind,
}

impl CandidateLocation {
    fn fixed(base: PathBuf, kind: LocationKind) -> Self {
        Self {
            base,
            pattern: None,
            kind,
        }
    }

    fn glob(base: PathBuf, pattern: &str, kind: LocationKind) -> Self {
        Self {
            base,
            pattern: Some(pattern.to_string()),
            kind,
        }
    }

    pub fn is_wildcard(&self) -> bool {
        self.pattern.is_some()
    }

    /// Human-readable form, e.g. `/home/me/.pyenv/versions/*/bin/python`.
    pub fn display_pattern(&self) -> String {
        match &self.pattern {
            Some(pattern) => self.base.join(pattern).display().to_string(),
            None => self.base.display().to_string(),
        }
    }
}

/// Per-platform location conventions.
trait PlatformLocations: Sync {
    fn interpreters(&self, layout: &HostLayout) -> Vec<CandidateLocation>;
    fn virtual_env_roots(&self, layout: &HostLayout) -> Vec<CandidateLocation>;
    fn caches(&self, layout: &HostLayout) -> Vec<CandidateLocation>;
    fn shell_configs(&self, layout: &HostLayout) -> Vec<CandidateLocation>;

    fn version_manager_roots(&self, layout: &HostLayout) -> Vec<CandidateLocation> {
        vec![CandidateLocation::fixed(
            layout.pyenv_root(),
            LocationKind::VersionManagerRoot,
        )]
    }
}

struct LinuxLocations;
struct MacOsLocations;
struct WindowsLocations;

fn platform(os: OsTag) -> &'static dyn PlatformLocations {
    match os {
        OsTag::Linux => &LinuxLocations,
        OsTag::MacOs => &MacOsLocations,
        OsTag::Windows => &WindowsLocations,
    }
}

/// Pure enumeration of where Python artifacts live on each supported OS.
/// Never touches the filesystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathCatalog {
    layout: HostLayout,
}

impl PathCatalog {
    pub fn new(layout: HostLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &HostLayout {
        &self.layout
    }

    pub fn candidate_locations(&self, category: Category, os: OsTag) -> Vec<CandidateLocation> {
        let platform = platform(os);
        match category {
            Category::Interpreter => platform.interpreters(&self.layout),
            Category::VersionManagerRoot => platform.version_manager_roots(&self.layout),
            Category::VirtualEnvRoot => platform.virtual_env_roots(&self.layout),
            Category::Cache => platform.caches(&self.layout),
            Category::ShellConfig => platform.shell_configs(&self.layout),
        }
    }
}

const SYSTEM: LocationKind = LocationKind::Interpreter(InterpreterOrigin::SystemPackage);
const USER_LOCAL: LocationKind = LocationKind::Interpreter(InterpreterOrigin::UserLocal);
const MANAGED: LocationKind = LocationKind::Interpreter(InterpreterOrigin::VersionManager);
const STORE: LocationKind = LocationKind::Interpreter(InterpreterOrigin::StoreAlias);

fn posix_venv_roots(layout: &HostLayout, poetry_cache: PathBuf) -> Vec<CandidateLocation> {
    let home = layout.home();
    vec![
        CandidateLocation::glob(home.join(".venvs"), "*", LocationKind::VirtualEnvRoot),
        CandidateLocation::glob(home.join(".virtualenvs"), "*", LocationKind::VirtualEnvRoot),
        CandidateLocation::glob(
            home.join(".local").join("share").join("virtualenvs"),
            "*",
            LocationKind::VirtualEnvRoot,
        ),
        CandidateLocation::glob(
            poetry_cache.join("virtualenvs"),
            "*",
            LocationKind::VirtualEnvRoot,
        ),
    ]
}

fn tool_caches(layout: &HostLayout, os: OsTag) -> Vec<CandidateLocation> {
    let home = layout.home();
    let pyenv_cache = match os {
        OsTag::Windows => layout.pyenv_root().join("pyenv-win").join("install_cache"),
        OsTag::Linux | OsTag::MacOs => layout.pyenv_root().join("cache"),
    };
    vec![
        CandidateLocation::fixed(
            layout.pip_cache_dir(os),
            LocationKind::Cache(CacheOwner::PackageManagerCache),
        ),
        CandidateLocation::fixed(
            layout.uv_cache_dir(os),
            LocationKind::Cache(CacheOwner::PackageManagerCache),
        ),
        CandidateLocation::fixed(
            pyenv_cache,
            LocationKind::Cache(CacheOwner::VersionManagerCache),
        ),
        CandidateLocation::fixed(
            home.join(".mypy_cache"),
            LocationKind::Cache(CacheOwner::TypeCheckerCache),
        ),
        CandidateLocation::fixed(
            home.join(".pytest_cache"),
            LocationKind::Cache(CacheOwner::TestRunnerCache),
        ),
    ]
}

fn posix_shell_configs(layout: &HostLayout) -> Vec<CandidateLocation> {
    [".bashrc", ".bash_profile", ".profile", ".zshrc", ".zprofile"]
        .into_iter()
        .map(|name| CandidateLocation::fixed(layout.home().join(name), LocationKind::ShellConfig))
        .collect()
}

impl PlatformLocations for LinuxLocations {
    fn interpreters(&self, layout: &HostLayout) -> Vec<CandidateLocation> {
        let root = layout.system_root();
        vec![
            CandidateLocation::glob(root.join("usr").join("bin"), "python3*", SYSTEM),
            CandidateLocation::glob(root.join("usr").join("local").join("bin"), "python3*", USER_LOCAL),
            CandidateLocation::glob(layout.user_bin_dir(), "python3*", USER_LOCAL),
            CandidateLocation::glob(layout.pyenv_root().join("versions"), "*/bin/python", MANAGED),
            CandidateLocation::glob(
                layout.uv_python_install_dir(OsTag::Linux),
                "*/bin/python3",
                MANAGED,
            ),
        ]
    }

    fn virtual_env_roots(&self, layout: &HostLayout) -> Vec<CandidateLocation> {
        posix_venv_roots(layout, layout.home().join(".cache").join("pypoetry"))
    }

    fn caches(&self, layout: &HostLayout) -> Vec<CandidateLocation> {
        tool_caches(layout, OsTag::Linux)
    }

    fn shell_configs(&self, layout: &HostLayout) -> Vec<CandidateLocation> {
        posix_shell_configs(layout)
    }
}

impl PlatformLocations for MacOsLocations {
    fn interpreters(&self, layout: &HostLayout) -> Vec<CandidateLocation> {
        let root = layout.system_root();
        vec![
            CandidateLocation::glob(root.join("usr").join("bin"), "python3*", SYSTEM),
            CandidateLocation::glob(root.join("opt").join("homebrew").join("bin"), "python3*", SYSTEM),
            CandidateLocation::glob(root.join("usr").join("local").join("bin"), "python3*", SYSTEM),
            CandidateLocation::glob(
                root.join("Library")
                    .join("Frameworks")
                    .join("Python.framework")
                    .join("Versions"),
                "*/bin/python3",
                USER_LOCAL,
            ),
            CandidateLocation::glob(layout.pyenv_root().join("versions"), "*/bin/python", MANAGED),
            CandidateLocation::glob(
                layout.uv_python_install_dir(OsTag::MacOs),
                "*/bin/python3",
                MANAGED,
            ),
        ]
    }

    fn virtual_env_roots(&self, layout: &HostLayout) -> Vec<CandidateLocation> {
        posix_venv_roots(
            layout,
            layout.home().join("Library").join("Caches").join("pypoetry"),
        )
    }

    fn caches(&self, layout: &HostLayout) -> Vec<CandidateLocation> {
        tool_caches(layout, OsTag::MacOs)
    }

    fn shell_configs(&self, layout: &HostLayout) -> Vec<CandidateLocation> {
        posix_shell_configs(layout)
    }
}

impl PlatformLocations for WindowsLocations {
    fn interpreters(&self, layout: &HostLayout) -> Vec<CandidateLocation> {
        let local = layout.local_app_data();
        vec![
            CandidateLocation::glob(
                local.join("Programs").join("Python"),
                "Python3*/python.exe",
                USER_LOCAL,
            ),
            CandidateLocation::glob(layout.program_files(), "Python3*/python.exe", SYSTEM),
            CandidateLocation::glob(layout.system_root().to_path_buf(), "Python3*/python.exe", SYSTEM),
            CandidateLocation::glob(
                local.join("Microsoft").join("WindowsApps"),
                "python*.exe",
                STORE,
            ),
            CandidateLocation::glob(
                layout.pyenv_root().join("pyenv-win").join("versions"),
                "*/python.exe",
                MANAGED,
            ),
            CandidateLocation::glob(
                layout.uv_python_install_dir(OsTag::Windows),
                "*/python.exe",
                MANAGED,
            ),
        ]
    }

    fn virtual_env_roots(&self, layout: &HostLayout) -> Vec<CandidateLocation> {
        let home = layout.home();
        vec![
            CandidateLocation::glob(home.join(".venvs"), "*", LocationKind::VirtualEnvRoot),
            CandidateLocation::glob(home.join(".virtualenvs"), "*", LocationKind::VirtualEnvRoot),
            CandidateLocation::glob(home.join("Envs"), "*", LocationKind::VirtualEnvRoot),
            CandidateLocation::glob(
                layout
                    .local_app_data()
                    .join("pypoetry")
                    .join("Cache")
                    .join("virtualenvs"),
                "*",
                LocationKind::VirtualEnvRoot,
            ),
        ]
    }

    fn caches(&self, layout: &HostLayout) -> Vec<CandidateLocation> {
        tool_caches(layout, OsTag::Windows)
    }

    fn shell_configs(&self, layout: &HostLayout) -> Vec<CandidateLocation> {
        layout
            .powershell_profiles()
            .into_iter()
            .map(|path| CandidateLocation::fixed(path, LocationKind::ShellConfig))
            .collect()
    }
}

/// Whether a file name looks like a Python interpreter executable, as opposed
/// to a sibling such as `python3-config` or `python3.11-gdb.py`.
pub fn is_interpreter_file_name(name: &str, os: OsTag) -> bool {
    let stem = match os {
        OsTag::Windows => match name
            .get(name.len().saturating_sub(4)..)
            .filter(|suffix| suffix.eq_ignore_ascii_case(".exe"))
        {
            Some(_) => &name[..name.len() - 4],
            None => return false,
        },
        OsTag::Linux | OsTag::MacOs => name,
    };

    let Some(rest) = stem
        .strip_prefix("python")
        .or_else(|| stem.strip_prefix("Python"))
    else {
        return false;
    };
    let rest = rest.strip_suffix('m').unwrap_or(rest);
    if rest.is_empty() {
        return true;
    }
    if rest.starts_with('.') || rest.ends_with('.') || rest.contains("..") {
        return false;
    }
    rest.chars().all(|ch| ch.is_ascii_digit() || ch == '.')
}

/// Version-manager managed version name for an interpreter path, i.e. the
/// directory directly below `<root>/versions` (or `<root>/pyenv-win/versions`).
pub(crate) fn managed_version_name(root: &Path, interpreter: &Path) -> Option<String> {
    for versions_dir in [root.join("versions"), root.join("pyenv-win").join("versions")] {
        if let Ok(relative) = interpreter.strip_prefix(&versions_dir) {
            return relative
                .components()
                .next()
                .map(|component| component.as_os_str().to_string_lossy().into_owned());
        }
    }
    None
}
