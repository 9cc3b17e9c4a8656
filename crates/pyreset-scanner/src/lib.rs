mod expand;

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use pyreset_core::{
    analyze_shell_config, is_interpreter_file_name, CacheRecord, Category, EnvironmentSnapshot,
    InterpreterOrigin, InterpreterRecord, LocationKind, OsTag, PathCatalog, ScanIssue,
    ShellConfigRecord, VenvRecord,
};
use pyreset_tools::{is_executable_file, Toolbox, KNOWN_TOOLS};
use rayon::prelude::*;
use tracing::{debug, warn};

use crate::expand::{expand, tree_size};

/// Walks catalog locations and probes what it finds. Never fails: anything
/// unreadable ends up in [`EnvironmentSnapshot::issues`].
pub struct InventoryScanner {
    toolbox: Toolbox,
}

impl InventoryScanner {
    pub fn new(toolbox: Toolbox) -> Self {
        Self { toolbox }
    }

    pub fn scan(&self, catalog: &PathCatalog, os: OsTag) -> EnvironmentSnapshot {
        let mut snapshot = EnvironmentSnapshot::empty(os, current_unix_timestamp());
        let mut issues = Vec::new();

        snapshot.interpreters = self.scan_interpreters(catalog, os, &mut issues);
        snapshot.version_manager_root = scan_version_manager_root(catalog, os, &mut issues);
        snapshot.virtual_envs = scan_virtual_envs(catalog, os, &mut issues);
        snapshot.caches = scan_caches(catalog, os, &mut issues);
        snapshot.shell_configs = scan_shell_configs(catalog, os, &mut issues);
        self.scan_package_managers(&mut snapshot);

        issues.sort_by(|left, right| left.path.cmp(&right.path));
        issues.dedup();
        snapshot.issues = issues;

        debug!(
            interpreters = snapshot.interpreters.len(),
            venvs = snapshot.virtual_envs.len(),
            caches = snapshot.caches.len(),
            issues = snapshot.issues.len(),
            "inventory scan complete"
        );
        snapshot
    }

    fn scan_interpreters(
        &self,
        catalog: &PathCatalog,
        os: OsTag,
        issues: &mut Vec<ScanIssue>,
    ) -> Vec<InterpreterRecord> {
        let mut seen = HashSet::new();
        let mut candidates = Vec::new();
        for location in catalog.candidate_locations(Category::Interpreter, os) {
            let LocationKind::Interpreter(origin) = location.kind else {
                continue;
            };
            let expansion = expand(&location);
            issues.extend(expansion.issues);
            for path in expansion.matches {
                if !looks_like_interpreter(&path, os) || !seen.insert(path.clone()) {
                    continue;
                }
                candidates.push((path, origin));
            }
        }

        candidates
            .into_par_iter()
            .map(|(path, origin)| match self.toolbox.probe_version(&path) {
                Ok(version) => InterpreterRecord::probed(path, version, origin),
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "interpreter did not answer version probe");
                    InterpreterRecord::unresponsive(path)
                }
            })
            .collect()
    }

    fn scan_package_managers(&self, snapshot: &mut EnvironmentSnapshot) {
        for tool in KNOWN_TOOLS {
            let Some(program) = self.toolbox.locate(tool) else {
                continue;
            };
            let version = match self.toolbox.probe_version(&program) {
                Ok(version) => version,
                Err(err) => {
                    warn!(%tool, error = %err, "could not determine tool version");
                    "unknown".to_string()
                }
            };
            snapshot.package_managers.insert(tool.to_string(), version);
            snapshot.tool_paths.insert(tool.to_string(), program);
        }
    }
}

fn looks_like_interpreter(path: &Path, os: OsTag) -> bool {
    let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
        return false;
    };
    if !is_interpreter_file_name(name, os) {
        return false;
    }
    match os {
        // Store aliases are zero-byte reparse points; existence is all we can check.
        OsTag::Windows => fs::symlink_metadata(path).is_ok(),
        OsTag::Linux | OsTag::MacOs => is_executable_file(path),
    }
}

fn scan_version_manager_root(
    catalog: &PathCatalog,
    os: OsTag,
    issues: &mut Vec<ScanIssue>,
) -> Option<PathBuf> {
    catalog
        .candidate_locations(Category::VersionManagerRoot, os)
        .iter()
        .flat_map(|location| {
            let expansion = expand(location);
            issues.extend(expansion.issues);
            expansion.matches
        })
        .find(|path| path.is_dir())
}

fn scan_virtual_envs(
    catalog: &PathCatalog,
    os: OsTag,
    issues: &mut Vec<ScanIssue>,
) -> Vec<VenvRecord> {
    let mut roots = Vec::new();
    for location in catalog.candidate_locations(Category::VirtualEnvRoot, os) {
        let expansion = expand(&location);
        issues.extend(expansion.issues);
        roots.extend(
            expansion
                .matches
                .into_iter()
                .filter(|path| path.join("pyvenv.cfg").is_file()),
        );
    }
    roots.sort();
    roots.dedup();

    let measured = roots
        .into_par_iter()
        .map(|root| {
            let (size_bytes, issue) = split_size(tree_size(&root));
            let python_version = read_pyvenv_version(&root.join("pyvenv.cfg"));
            let record = VenvRecord {
                root,
                size_bytes,
                python_version,
                packages: Vec::new(),
            };
            (record, issue)
        })
        .collect::<Vec<_>>();

    measured
        .into_iter()
        .map(|(record, issue)| {
            issues.extend(issue);
            record
        })
        .collect()
}

fn scan_caches(catalog: &PathCatalog, os: OsTag, issues: &mut Vec<ScanIssue>) -> Vec<CacheRecord> {
    let mut found = Vec::new();
    for location in catalog.candidate_locations(Category::Cache, os) {
        let LocationKind::Cache(owner) = location.kind else {
            continue;
        };
        let expansion = expand(&location);
        issues.extend(expansion.issues);
        found.extend(expansion.matches.into_iter().map(|path| (path, owner)));
    }
    found.sort_by(|left, right| left.0.cmp(&right.0));
    found.dedup_by(|left, right| left.0 == right.0);

    let measured = found
        .into_par_iter()
        .map(|(path, owner)| {
            let (size_bytes, issue) = split_size(tree_size(&path));
            (
                CacheRecord {
                    path,
                    owner,
                    size_bytes,
                },
                issue,
            )
        })
        .collect::<Vec<_>>();

    measured
        .into_iter()
        .map(|(record, issue)| {
            issues.extend(issue);
            record
        })
        .collect()
}

fn scan_shell_configs(
    catalog: &PathCatalog,
    os: OsTag,
    issues: &mut Vec<ScanIssue>,
) -> Vec<ShellConfigRecord> {
    let mut records = Vec::new();
    for location in catalog.candidate_locations(Category::ShellConfig, os) {
        match fs::read_to_string(&location.base) {
            Ok(text) => {
                let scan = analyze_shell_config(&text);
                records.push(ShellConfigRecord {
                    path: location.base.clone(),
                    foreign_lines: scan.foreign_lines,
                    has_managed_block: scan.has_managed_block,
                });
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => issues.push(ScanIssue::from_io(&location.base, &err)),
        }
    }
    records.sort_by(|left, right| left.path.cmp(&right.path));
    records
}

fn split_size(size: Result<u64, ScanIssue>) -> (Option<u64>, Option<ScanIssue>) {
    match size {
        Ok(bytes) => (Some(bytes), None),
        Err(issue) => (None, Some(issue)),
    }
}

/// `version` (venv) or `version_info` (virtualenv) from a `pyvenv.cfg`.
pub fn read_pyvenv_version(cfg: &Path) -> Option<String> {
    let raw = fs::read_to_string(cfg).ok()?;
    parse_pyvenv_version(&raw)
}

pub fn parse_pyvenv_version(raw: &str) -> Option<String> {
    let mut version_info = None;
    for line in raw.lines() {
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let value = value.trim();
        if value.is_empty() {
            continue;
        }
        match key.trim() {
            "version" => return Some(value.to_string()),
            "version_info" => version_info = Some(value.to_string()),
            _ => {}
        }
    }
    version_info
}

pub fn current_unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_secs())
        .unwrap_or(0)
}
