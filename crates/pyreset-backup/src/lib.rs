mod guide;
mod manifest;

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use chrono::{Local, NaiveDateTime};
use pyreset_core::{
    EnvironmentSnapshot, HostLayout, PackageManager, Requirement, VenvRecord, VersionManager,
};
use pyreset_tools::Toolbox;
use tracing::{info, warn};

use crate::guide::{render_restore_guide, tool_names, GuideInput};

pub use guide::{RESTORE_GUIDE_FILE, SNAPSHOT_FILE};
pub use manifest::{
    sha256_file, sha256_hex, verify_archive, ArchiveVerification, ArtifactRecord, BackupManifest,
    CaptureStatus, VerificationProblem, MANIFEST_FILE, MANIFEST_VERSION,
};

pub const ARCHIVE_PREFIX: &str = "python-backup-";
pub const GLOBAL_PIP_FILE: &str = "global-pip-packages.txt";
pub const PYENV_VERSIONS_FILE: &str = "pyenv-versions.txt";
pub const UV_TOOLS_FILE: &str = "uv-tools.txt";
pub const PIPX_PACKAGES_FILE: &str = "pipx-packages.txt";
pub const FAILED_SUFFIX: &str = ".failed";

const MAX_NAME_ATTEMPTS: u32 = 100;

/// A written backup directory. Never modified after `backup` returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupArchive {
    pub root: PathBuf,
    pub manifest: BackupManifest,
    /// Snapshot venvs with `packages` filled in from their freeze output.
    pub virtual_envs: Vec<VenvRecord>,
}

impl BackupArchive {
    pub fn file(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    pub fn has_failures(&self) -> bool {
        self.manifest.failed_artifacts().next().is_some()
    }
}

pub struct BackupManager {
    toolbox: Toolbox,
    layout: HostLayout,
    parent: PathBuf,
}

impl BackupManager {
    pub fn new(toolbox: Toolbox, layout: HostLayout) -> Self {
        let parent = layout.backup_parent();
        Self {
            toolbox,
            layout,
            parent,
        }
    }

    pub fn with_parent(mut self, parent: impl Into<PathBuf>) -> Self {
        self.parent = parent.into();
        self
    }

    pub fn parent(&self) -> &Path {
        &self.parent
    }

    pub fn backup(&self, snapshot: &EnvironmentSnapshot) -> Result<BackupArchive> {
        self.backup_at(snapshot, Local::now().naive_local())
    }

    /// Captures every package list the snapshot knows about. Only failing to
    /// create the archive directory is an error; individual capture failures
    /// leave a `.failed` sentinel instead.
    pub fn backup_at(
        &self,
        snapshot: &EnvironmentSnapshot,
        at: NaiveDateTime,
    ) -> Result<BackupArchive> {
        let root = create_archive_dir(&self.parent, at)?;
        info!(archive = %root.display(), "writing backup archive");
        let mut writer = ArchiveWriter::new(root);

        let global_packages = self
            .freeze_tool(snapshot, "pip")
            .and_then(|content| {
                writer.capture(GLOBAL_PIP_FILE, "pip freeze (global interpreter)", content)
            })
            .map(|_| GLOBAL_PIP_FILE);

        let interpreter_versions = match self.interpreter_versions(snapshot) {
            Some(result) => {
                let content = result
                    .as_ref()
                    .map(|versions| join_lines(versions))
                    .map_err(|reason| reason.clone());
                writer.capture(PYENV_VERSIONS_FILE, "installed interpreter versions", content);
                result.unwrap_or_default()
            }
            None => Vec::new(),
        };

        let uv_tools = self
            .freeze_tool(snapshot, "uv")
            .and_then(|content| writer.capture(UV_TOOLS_FILE, "uv tool list", content))
            .map(|raw| tool_names(&raw))
            .unwrap_or_default();

        let pipx_packages = self
            .freeze_tool(snapshot, "pipx")
            .and_then(|content| writer.capture(PIPX_PACKAGES_FILE, "pipx list --short", content))
            .map(|raw| tool_names(&raw))
            .unwrap_or_default();

        let mut used_names = HashSet::new();
        let mut virtual_envs = Vec::with_capacity(snapshot.virtual_envs.len());
        let mut restorable_venvs = Vec::new();
        for venv in &snapshot.virtual_envs {
            let file_name = unique_venv_file_name(&venv.name(), &mut used_names);
            let content = self
                .toolbox
                .venv_pip(&venv.root)
                .freeze_raw()
                .map_err(|err| err.to_string());
            let source = format!("pip freeze ({})", venv.root.display());
            let mut enriched = venv.clone();
            if let Some(raw) = writer.capture(&file_name, &source, content) {
                enriched.packages = Requirement::parse_freeze_output(&raw);
                restorable_venvs.push((enriched.clone(), file_name));
            }
            virtual_envs.push(enriched);
        }

        let mut enriched_snapshot = snapshot.clone();
        enriched_snapshot.virtual_envs = virtual_envs.clone();
        let snapshot_json = serde_json::to_string_pretty(&enriched_snapshot)
            .map(|mut json| {
                json.push('\n');
                json
            })
            .map_err(|err| err.to_string());
        writer.capture(SNAPSHOT_FILE, "inventory snapshot", snapshot_json);

        let created_at = at.format("%Y-%m-%d %H:%M:%S").to_string();
        let guide = render_restore_guide(&GuideInput {
            created_at: &created_at,
            os: snapshot.os,
            artifacts: &writer.artifacts,
            interpreter_versions: &interpreter_versions,
            global_packages,
            uv_tools: &uv_tools,
            pipx_packages: &pipx_packages,
            venvs: &restorable_venvs,
        });
        writer.capture(RESTORE_GUIDE_FILE, "restore guide", Ok(guide));

        let manifest = BackupManifest {
            version: MANIFEST_VERSION,
            created_at,
            os: snapshot.os,
            artifacts: writer.artifacts,
        };
        let manifest_path = writer.root.join(MANIFEST_FILE);
        match serde_json::to_string_pretty(&manifest) {
            Ok(json) => {
                if let Err(err) = fs::write(&manifest_path, json) {
                    warn!(path = %manifest_path.display(), error = %err, "failed to write backup manifest");
                } else {
                    make_read_only(&manifest_path);
                }
            }
            Err(err) => warn!(error = %err, "failed to serialize backup manifest"),
        }

        let failed = manifest.failed_artifacts().count();
        if failed > 0 {
            warn!(failed, archive = %writer.root.display(), "backup completed with failed captures");
        }

        Ok(BackupArchive {
            root: writer.root,
            manifest,
            virtual_envs,
        })
    }

    /// Freeze output of a tool recorded in the snapshot, or `None` when the
    /// snapshot does not list it.
    fn freeze_tool(
        &self,
        snapshot: &EnvironmentSnapshot,
        tool: &str,
    ) -> Option<Result<String, String>> {
        snapshot.package_managers.get(tool)?;
        let Some(program) = snapshot.tool_paths.get(tool) else {
            return Some(Err(format!("{tool} was detected but its location is unknown")));
        };
        let manager = self.toolbox.package_manager(tool, program)?;
        Some(manager.freeze_raw().map_err(|err| err.to_string()))
    }

    /// Installed interpreter versions, from pyenv when it is runnable and from
    /// the versions directory otherwise.
    fn interpreter_versions(
        &self,
        snapshot: &EnvironmentSnapshot,
    ) -> Option<Result<Vec<String>, String>> {
        let root = snapshot.version_manager_root.clone();
        if let Some(program) = snapshot.tool_paths.get("pyenv") {
            let root = root.unwrap_or_else(|| self.layout.pyenv_root());
            return Some(
                self.toolbox
                    .pyenv(program, &root)
                    .list_versions()
                    .map_err(|err| err.to_string()),
            );
        }
        let root = root?;
        let versions_dir = if snapshot.os.is_windows() {
            root.join("pyenv-win").join("versions")
        } else {
            root.join("versions")
        };
        Some(list_version_dirs(&versions_dir).map_err(|err| err.to_string()))
    }
}

struct ArchiveWriter {
    root: PathBuf,
    artifacts: Vec<ArtifactRecord>,
}

impl ArchiveWriter {
    fn new(root: PathBuf) -> Self {
        Self {
            root,
            artifacts: Vec::new(),
        }
    }

    /// Writes `content` verbatim, or a sentinel carrying the failure reason.
    /// Returns the content when it was written.
    fn capture(
        &mut self,
        file_name: &str,
        source: &str,
        content: Result<String, String>,
    ) -> Option<String> {
        let reason = match content {
            Ok(text) => match self.write(file_name, &text) {
                Ok(sha256) => {
                    self.artifacts.push(ArtifactRecord {
                        file_name: file_name.to_string(),
                        source: source.to_string(),
                        status: CaptureStatus::Captured,
                        sha256: Some(sha256),
                    });
                    return Some(text);
                }
                Err(err) => format!("failed to write {file_name}: {err}"),
            },
            Err(reason) => reason,
        };

        warn!(artifact = file_name, %reason, "capture failed, writing sentinel");
        let sentinel = format!("{file_name}{FAILED_SUFFIX}");
        let sha256 = self
            .write(&sentinel, &format!("backup failed: {reason}\n"))
            .ok();
        self.artifacts.push(ArtifactRecord {
            file_name: sentinel,
            source: source.to_string(),
            status: CaptureStatus::Failed { reason },
            sha256,
        });
        None
    }

    fn write(&self, file_name: &str, content: &str) -> io::Result<String> {
        let path = self.root.join(file_name);
        fs::write(&path, content)?;
        make_read_only(&path);
        Ok(sha256_hex(content.as_bytes()))
    }
}

fn create_archive_dir(parent: &Path, at: NaiveDateTime) -> Result<PathBuf> {
    fs::create_dir_all(parent)
        .with_context(|| format!("failed to create backup parent: {}", parent.display()))?;
    let base = format!("{ARCHIVE_PREFIX}{}", at.format("%Y%m%d-%H%M%S"));
    for attempt in 1..=MAX_NAME_ATTEMPTS {
        let name = if attempt == 1 {
            base.clone()
        } else {
            format!("{base}-{attempt}")
        };
        let path = parent.join(name);
        match fs::create_dir(&path) {
            Ok(()) => return Ok(path),
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(err) => {
                return Err(err).with_context(|| {
                    format!("failed to create backup archive: {}", path.display())
                })
            }
        }
    }
    Err(anyhow!(
        "failed to allocate a backup archive name under {}",
        parent.display()
    ))
}

fn unique_venv_file_name(venv_name: &str, used: &mut HashSet<String>) -> String {
    let stem = venv_name
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.') {
                ch
            } else {
                '_'
            }
        })
        .collect::<String>();
    let mut candidate = format!("venv-{stem}-packages.txt");
    let mut index = 2;
    while !used.insert(candidate.clone()) {
        candidate = format!("venv-{stem}-{index}-packages.txt");
        index += 1;
    }
    candidate
}

fn list_version_dirs(versions_dir: &Path) -> io::Result<Vec<String>> {
    let mut versions = Vec::new();
    let entries = match fs::read_dir(versions_dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(versions),
        Err(err) => return Err(err),
    };
    for entry in entries {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            versions.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    versions.sort();
    Ok(versions)
}

fn join_lines(lines: &[String]) -> String {
    let mut out = String::new();
    for line in lines {
        out.push_str(line);
        out.push('\n');
    }
    out
}

fn make_read_only(path: &Path) {
    let Ok(metadata) = fs::metadata(path) else {
        return;
    };
    let mut permissions = metadata.permissions();
    permissions.set_readonly(true);
    if let Err(err) = fs::set_permissions(path, permissions) {
        warn!(path = %path.display(), error = %err, "failed to mark backup file read-only");
    }
}
