use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::OsTag;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum InterpreterOrigin {
    SystemPackage,
    VersionManager,
    StoreAlias,
    UserLocal,
    /// The candidate did not answer a version probe.
    Unknown,
}

impl InterpreterOrigin {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SystemPackage => "system-package",
            Self::VersionManager => "version-manager",
            Self::StoreAlias => "store-alias",
            Self::UserLocal => "user-local",
            Self::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterpreterRecord {
    pub path: PathBuf,
    pub version: Option<String>,
    pub origin: InterpreterOrigin,
}

impl InterpreterRecord {
    pub fn probed(path: impl Into<PathBuf>, version: impl Into<String>, origin: InterpreterOrigin) -> Self {
        Self {
            path: path.into(),
            version: Some(version.into()),
            origin,
        }
    }

    pub fn unresponsive(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            version: None,
            origin: InterpreterOrigin::Unknown,
        }
    }
}

/// One `name<spec>` line of a freeze listing.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Requirement {
    pub name: String,
    pub version_spec: String,
}

impl Requirement {
    /// Parses a single freeze output line. Blank lines, comments and pip
    /// option lines yield `None`.
    pub fn parse_freeze_line(line: &str) -> Option<Self> {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with("--") {
            return None;
        }
        if let Some(editable) = trimmed.strip_prefix("-e ") {
            return Some(Self {
                name: editable.trim().to_string(),
                version_spec: String::new(),
            });
        }

        let split_at = trimmed
            .find(|ch: char| matches!(ch, '=' | '<' | '>' | '!' | '~' | '@' | ';' | '[' | ' '))
            .unwrap_or(trimmed.len());
        let (name, spec) = trimmed.split_at(split_at);
        if name.is_empty() {
            return None;
        }
        Some(Self {
            name: name.to_string(),
            version_spec: spec.trim().to_string(),
        })
    }

    pub fn parse_freeze_output(raw: &str) -> Vec<Self> {
        raw.lines().filter_map(Self::parse_freeze_line).collect()
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.name, self.version_spec)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VenvRecord {
    pub root: PathBuf,
    /// `None` when part of the tree could not be traversed.
    pub size_bytes: Option<u64>,
    pub python_version: Option<String>,
    /// Filled in by the backup step only.
    #[serde(default)]
    pub packages: Vec<Requirement>,
}

impl VenvRecord {
    pub fn name(&self) -> String {
        self.root
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "venv".to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CacheOwner {
    PackageManagerCache,
    VersionManagerCache,
    TypeCheckerCache,
    TestRunnerCache,
}

impl CacheOwner {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PackageManagerCache => "package-manager",
            Self::VersionManagerCache => "version-manager",
            Self::TypeCheckerCache => "type-checker",
            Self::TestRunnerCache => "test-runner",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheRecord {
    pub path: PathBuf,
    pub owner: CacheOwner,
    pub size_bytes: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShellConfigRecord {
    pub path: PathBuf,
    /// Version-manager lines outside the managed block.
    pub foreign_lines: usize,
    pub has_managed_block: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum ScanIssueKind {
    #[error("permission denied")]
    PermissionDenied,
    #[error("unreadable: {0}")]
    Unreadable(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanIssue {
    pub path: PathBuf,
    pub kind: ScanIssueKind,
}

impl ScanIssue {
    pub fn from_io(path: &Path, err: &std::io::Error) -> Self {
        let kind = if err.kind() == std::io::ErrorKind::PermissionDenied {
            ScanIssueKind::PermissionDenied
        } else {
            ScanIssueKind::Unreadable(err.to_string())
        };
        Self {
            path: path.to_path_buf(),
            kind,
        }
    }
}

/// Result of one inventory scan. Produced once per command run and only ever
/// shared by reference afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentSnapshot {
    pub os: OsTag,
    /// In discovery order along the catalog's pattern order.
    pub interpreters: Vec<InterpreterRecord>,
    pub version_manager_root: Option<PathBuf>,
    pub virtual_envs: Vec<VenvRecord>,
    pub caches: Vec<CacheRecord>,
    /// Package / version manager name to reported version.
    pub package_managers: BTreeMap<String, String>,
    pub tool_paths: BTreeMap<String, PathBuf>,
    pub shell_configs: Vec<ShellConfigRecord>,
    pub issues: Vec<ScanIssue>,
    pub captured_at_unix: u64,
}

impl EnvironmentSnapshot {
    pub fn empty(os: OsTag, captured_at_unix: u64) -> Self {
        Self {
            os,
            interpreters: Vec::new(),
            version_manager_root: None,
            virtual_envs: Vec::new(),
            caches: Vec::new(),
            package_managers: BTreeMap::new(),
            tool_paths: BTreeMap::new(),
            shell_configs: Vec::new(),
            issues: Vec::new(),
            captured_at_unix,
        }
    }

    /// Equality ignoring capture time and set ordering. `interpreters` keeps
    /// its discovery order; venvs, caches, shell configs and issues compare as sets.
    pub fn equivalent(&self, other: &Self) -> bool {
        fn sorted<T: Clone, K: Ord>(items: &[T], key: impl Fn(&T) -> K) -> Vec<T> {
            let mut items = items.to_vec();
            items.sort_by_key(|item| key(item));
            items
        }

        self.os == other.os
            && self.interpreters == other.interpreters
            && self.version_manager_root == other.version_manager_root
            && self.package_managers == other.package_managers
            && self.tool_paths == other.tool_paths
            && sorted(&self.virtual_envs, |v| v.root.clone())
                == sorted(&other.virtual_envs, |v| v.root.clone())
            && sorted(&self.caches, |c| c.path.clone()) == sorted(&other.caches, |c| c.path.clone())
            && sorted(&self.shell_configs, |s| s.path.clone())
                == sorted(&other.shell_configs, |s| s.path.clone())
            && sorted(&self.issues, |i| i.path.clone()) == sorted(&other.issues, |i| i.path.clone())
    }

    pub fn package_manager_version(&self, name: &str) -> Option<&str> {
        self.package_managers.get(name).map(String::as_str)
    }

    /// Sum of known sizes; unknown sizes count as zero.
    pub fn known_reclaimable_bytes(&self) -> u64 {
        let venvs = self
            .virtual_envs
            .iter()
            .filter_map(|venv| venv.size_bytes)
            .sum::<u64>();
        let caches = self
            .caches
            .iter()
            .filter_map(|cache| cache.size_bytes)
            .sum::<u64>();
        venvs + caches
    }
}
