use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::catalog::managed_version_name;
use crate::{
    python_minor_series, ActionScope, EnvironmentSnapshot, HostLayout, InterpreterOrigin,
    InterpreterRecord, OsTag,
};

/// Removal categories in execution priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RemovalCategory {
    VirtualEnv,
    VersionManagerRoot,
    SystemInterpreter,
    Cache,
    ShellConfig,
}

impl RemovalCategory {
    pub const EXECUTION_ORDER: [RemovalCategory; 5] = [
        RemovalCategory::VirtualEnv,
        RemovalCategory::VersionManagerRoot,
        RemovalCategory::SystemInterpreter,
        RemovalCategory::Cache,
        RemovalCategory::ShellConfig,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::VirtualEnv => "virtual-envs",
            Self::VersionManagerRoot => "version-manager",
            Self::SystemInterpreter => "system-interpreters",
            Self::Cache => "caches",
            Self::ShellConfig => "shell-configs",
        }
    }
}

impl fmt::Display for RemovalCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RemovalMethod {
    /// Recursively delete the target (file or directory).
    DeleteTree,
    /// Ask an OS package manager to remove a package.
    UninstallPackage { manager: String, package: String },
    /// Ask the version manager to drop one installed version.
    UninstallVersion { version: String },
    /// Rewrite a shell config without version-manager lines.
    StripShellConfig { keep_managed_block: bool },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RemovalAction {
    pub target_path: PathBuf,
    pub category: RemovalCategory,
    pub destructive: bool,
    pub method: RemovalMethod,
}

impl RemovalAction {
    fn delete(target_path: PathBuf, category: RemovalCategory) -> Self {
        Self {
            target_path,
            category,
            destructive: true,
            method: RemovalMethod::DeleteTree,
        }
    }

    pub fn describe(&self) -> String {
        match &self.method {
            RemovalMethod::DeleteTree => format!("delete {}", self.target_path.display()),
            RemovalMethod::UninstallPackage { manager, package } => format!(
                "{manager} uninstall {package} ({})",
                self.target_path.display()
            ),
            RemovalMethod::UninstallVersion { version } => {
                format!("uninstall managed version {version}")
            }
            RemovalMethod::StripShellConfig { .. } => format!(
                "strip version-manager lines from {}",
                self.target_path.display()
            ),
        }
    }
}

/// Which categories a cleanup command covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupScope {
    All,
    SystemInterpreters,
    VersionManager,
    Packages,
}

impl CleanupScope {
    pub fn categories(self) -> &'static [RemovalCategory] {
        match self {
            Self::All => &RemovalCategory::EXECUTION_ORDER,
            Self::SystemInterpreters => &[RemovalCategory::SystemInterpreter],
            Self::VersionManager => &[
                RemovalCategory::VersionManagerRoot,
                RemovalCategory::ShellConfig,
            ],
            Self::Packages => &[RemovalCategory::VirtualEnv, RemovalCategory::Cache],
        }
    }

    pub fn action_scope(self) -> ActionScope {
        match self {
            Self::All => ActionScope::Nuclear,
            Self::SystemInterpreters => {
                ActionScope::scoped("Remove system and user-installed Python interpreters")
            }
            Self::VersionManager => {
                ActionScope::scoped("Remove the version manager and every interpreter it manages")
            }
            Self::Packages => ActionScope::scoped("Remove virtual environments and package caches"),
        }
    }

    fn includes(self, category: RemovalCategory) -> bool {
        self.categories().contains(&category)
    }
}

/// The part of the desired toolchain a full reset must leave in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetainedToolchain {
    pub version_manager_root: PathBuf,
    pub pinned_version: String,
}

/// Removal actions derived from a snapshot taken in the same run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupPlan {
    actions: Vec<RemovalAction>,
    captured_at_unix: u64,
}

impl CleanupPlan {
    pub fn new(actions: Vec<RemovalAction>, captured_at_unix: u64) -> Self {
        Self {
            actions,
            captured_at_unix,
        }
    }

    pub fn from_snapshot(
        snapshot: &EnvironmentSnapshot,
        layout: &HostLayout,
        scope: CleanupScope,
        retain: Option<&RetainedToolchain>,
    ) -> Self {
        let mut actions = Vec::new();

        if scope.includes(RemovalCategory::VirtualEnv) {
            for venv in &snapshot.virtual_envs {
                actions.push(RemovalAction::delete(
                    venv.root.clone(),
                    RemovalCategory::VirtualEnv,
                ));
            }
        }

        if scope.includes(RemovalCategory::VersionManagerRoot) {
            if let Some(root) = &snapshot.version_manager_root {
                actions.extend(version_manager_actions(snapshot, root, retain));
            }
            if scope == CleanupScope::All && retain.is_none() {
                actions.extend(uv_managed_actions(snapshot, layout));
            }
        }

        if scope.includes(RemovalCategory::SystemInterpreter) {
            for interpreter in &snapshot.interpreters {
                if is_exempt(interpreter, layout) {
                    continue;
                }
                if let Some(action) = system_interpreter_action(interpreter, snapshot.os) {
                    actions.push(action);
                }
            }
        }

        if scope.includes(RemovalCategory::Cache) {
            for cache in &snapshot.caches {
                actions.push(RemovalAction::delete(
                    cache.path.clone(),
                    RemovalCategory::Cache,
                ));
            }
        }

        if scope.includes(RemovalCategory::ShellConfig) {
            for config in &snapshot.shell_configs {
                let strip_block = config.has_managed_block && retain.is_none();
                if config.foreign_lines == 0 && !strip_block {
                    continue;
                }
                actions.push(RemovalAction {
                    target_path: config.path.clone(),
                    category: RemovalCategory::ShellConfig,
                    destructive: false,
                    method: RemovalMethod::StripShellConfig {
                        keep_managed_block: retain.is_some(),
                    },
                });
            }
        }

        Self::new(prune_redundant(actions), snapshot.captured_at_unix)
    }

    pub fn actions(&self) -> &[RemovalAction] {
        &self.actions
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn captured_at_unix(&self) -> u64 {
        self.captured_at_unix
    }

    /// Actions grouped by category, in execution order. Within a category
    /// the plan's own order is preserved.
    pub fn by_category(&self) -> BTreeMap<RemovalCategory, Vec<&RemovalAction>> {
        let mut grouped: BTreeMap<RemovalCategory, Vec<&RemovalAction>> = BTreeMap::new();
        for action in &self.actions {
            grouped.entry(action.category).or_default().push(action);
        }
        grouped
    }

    pub fn ordered_actions(&self) -> Vec<&RemovalAction> {
        self.by_category().into_values().flatten().collect()
    }

    /// Rejects targets that must never be handed to a recursive delete.
    pub fn validate(&self, layout: &HostLayout) -> anyhow::Result<()> {
        for action in &self.actions {
            let target = &action.target_path;
            if !target.is_absolute() {
                anyhow::bail!("removal target must be absolute: {}", target.display());
            }
            if target.parent().is_none() || target == layout.system_root() {
                anyhow::bail!("refusing to remove a filesystem root: {}", target.display());
            }
            if action.method == RemovalMethod::DeleteTree && target == layout.home() {
                anyhow::bail!("refusing to remove the home directory: {}", target.display());
            }
        }
        Ok(())
    }
}

fn version_manager_actions(
    snapshot: &EnvironmentSnapshot,
    root: &Path,
    retain: Option<&RetainedToolchain>,
) -> Vec<RemovalAction> {
    let Some(retained) = retain.filter(|retained| retained.version_manager_root == root) else {
        return vec![RemovalAction::delete(
            root.to_path_buf(),
            RemovalCategory::VersionManagerRoot,
        )];
    };

    let mut seen = HashSet::new();
    snapshot
        .interpreters
        .iter()
        .filter_map(|interpreter| managed_version_name(root, &interpreter.path))
        .filter(|version| version != &retained.pinned_version)
        .filter(|version| seen.insert(version.clone()))
        .map(|version| RemovalAction {
            target_path: managed_version_dir(root, snapshot.os, &version),
            category: RemovalCategory::VersionManagerRoot,
            destructive: true,
            method: RemovalMethod::UninstallVersion { version },
        })
        .collect()
}

/// One delete per uv-managed version directory that holds a found interpreter.
fn uv_managed_actions(snapshot: &EnvironmentSnapshot, layout: &HostLayout) -> Vec<RemovalAction> {
    let install_dir = layout.uv_python_install_dir(snapshot.os);
    snapshot
        .interpreters
        .iter()
        .filter(|interpreter| matches!(interpreter.origin, InterpreterOrigin::VersionManager))
        .filter_map(|interpreter| {
            let relative = interpreter.path.strip_prefix(&install_dir).ok()?;
            let version_dir = relative.components().next()?;
            Some(RemovalAction::delete(
                install_dir.join(version_dir),
                RemovalCategory::VersionManagerRoot,
            ))
        })
        .collect()
}

fn managed_version_dir(root: &Path, os: OsTag, version: &str) -> PathBuf {
    match os {
        OsTag::Windows => root.join("pyenv-win").join("versions").join(version),
        OsTag::Linux | OsTag::MacOs => root.join("versions").join(version),
    }
}

/// Store aliases, unresponsive candidates and OS-owned interpreters are
/// never removed.
fn is_exempt(interpreter: &InterpreterRecord, layout: &HostLayout) -> bool {
    match interpreter.origin {
        InterpreterOrigin::StoreAlias | InterpreterOrigin::Unknown => return true,
        InterpreterOrigin::VersionManager => return true,
        InterpreterOrigin::SystemPackage | InterpreterOrigin::UserLocal => {}
    }
    let root = layout.system_root();
    [root.join("usr").join("bin"), root.join("bin"), root.join("System")]
        .iter()
        .any(|protected| interpreter.path.starts_with(protected))
}

fn system_interpreter_action(
    interpreter: &InterpreterRecord,
    os: OsTag,
) -> Option<RemovalAction> {
    let path = &interpreter.path;
    match (os, interpreter.origin) {
        // Homebrew owns every non-OS interpreter the macOS catalog marks as system.
        (OsTag::MacOs, InterpreterOrigin::SystemPackage) => {
            let series = interpreter.version.as_deref().and_then(python_minor_series)?;
            Some(RemovalAction {
                target_path: path.clone(),
                category: RemovalCategory::SystemInterpreter,
                destructive: true,
                method: RemovalMethod::UninstallPackage {
                    manager: "brew".to_string(),
                    package: format!("python@{series}"),
                },
            })
        }
        (OsTag::MacOs, _) if path.components().any(|c| c.as_os_str() == "Python.framework") => {
            let version_dir = path.parent()?.parent()?;
            Some(RemovalAction::delete(
                version_dir.to_path_buf(),
                RemovalCategory::SystemInterpreter,
            ))
        }
        (OsTag::Windows, _) => Some(RemovalAction::delete(
            path.parent()?.to_path_buf(),
            RemovalCategory::SystemInterpreter,
        )),
        (OsTag::Linux | OsTag::MacOs, _) => Some(RemovalAction::delete(
            path.clone(),
            RemovalCategory::SystemInterpreter,
        )),
    }
}

/// Drops duplicate actions and deletions nested inside an earlier deletion.
fn prune_redundant(actions: Vec<RemovalAction>) -> Vec<RemovalAction> {
    let mut seen = HashSet::new();
    let mut deleted_roots: Vec<PathBuf> = Vec::new();
    let mut kept = Vec::with_capacity(actions.len());
    for action in actions {
        let key = match &action.method {
            RemovalMethod::UninstallPackage { manager, package } => format!("pkg:{manager}:{package}"),
            _ => format!("path:{}", action.target_path.display()),
        };
        if !seen.insert(key) {
            continue;
        }
        if action.method == RemovalMethod::DeleteTree {
            if deleted_roots
                .iter()
                .any(|root| action.target_path.starts_with(root))
            {
                continue;
            }
            deleted_roots.push(action.target_path.clone());
        }
        kept.push(action);
    }
    kept
}
