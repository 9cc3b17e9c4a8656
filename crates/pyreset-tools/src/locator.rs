use std::path::{Path, PathBuf};

use pyreset_core::{HostLayout, OsTag};

/// Resolves a tool name to an executable path.
pub trait ToolLocator: Send + Sync {
    fn locate(&self, name: &str) -> Option<PathBuf>;
}

impl<F> ToolLocator for F
where
    F: Fn(&str) -> Option<PathBuf> + Send + Sync,
{
    fn locate(&self, name: &str) -> Option<PathBuf> {
        self(name)
    }
}

/// Searches a few tool-owned bin directories first, then `PATH`.
///
/// The extra directories matter right after an install: the current
/// process never sees the PATH edits made by the managed shell block.
#[derive(Debug, Clone)]
pub struct PathLocator {
    extra_dirs: Vec<PathBuf>,
    os: OsTag,
}

impl PathLocator {
    pub fn new(extra_dirs: Vec<PathBuf>, os: OsTag) -> Self {
        Self { extra_dirs, os }
    }

    pub fn for_layout(layout: &HostLayout, os: OsTag) -> Self {
        let pyenv_root = layout.pyenv_root();
        let mut extra_dirs = vec![layout.user_bin_dir()];
        match os {
            OsTag::Windows => {
                extra_dirs.push(pyenv_root.join("pyenv-win").join("bin"));
                extra_dirs.push(layout.home().join(".cargo").join("bin"));
            }
            OsTag::Linux | OsTag::MacOs => {
                extra_dirs.push(pyenv_root.join("bin"));
                extra_dirs.push(layout.home().join(".cargo").join("bin"));
            }
        }
        Self::new(extra_dirs, os)
    }

    fn candidate_names(&self, name: &str) -> Vec<String> {
        match self.os {
            OsTag::Windows => ["exe", "bat", "cmd"]
                .iter()
                .map(|ext| format!("{name}.{ext}"))
                .collect(),
            OsTag::Linux | OsTag::MacOs => vec![name.to_string()],
        }
    }
}

impl ToolLocator for PathLocator {
    fn locate(&self, name: &str) -> Option<PathBuf> {
        for dir in &self.extra_dirs {
            for candidate in self.candidate_names(name) {
                let path = dir.join(candidate);
                if is_executable_file(&path) {
                    return Some(path);
                }
            }
        }
        which::which(name).ok()
    }
}

pub fn is_executable_file(path: &Path) -> bool {
    let Ok(metadata) = path.metadata() else {
        return false;
    };
    if !metadata.is_file() {
        return false;
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        metadata.permissions().mode() & 0o111 != 0
    }
    #[cfg(not(unix))]
    {
        true
    }
}
