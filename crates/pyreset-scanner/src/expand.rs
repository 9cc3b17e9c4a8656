use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use glob::{MatchOptions, Pattern};
use pyreset_core::{CandidateLocation, ScanIssue, ScanIssueKind};
use walkdir::WalkDir;

/// Paths matching one catalog location, plus whatever could not be read
/// while matching.
#[derive(Debug, Default)]
pub(crate) struct Expansion {
    pub matches: Vec<PathBuf>,
    pub issues: Vec<ScanIssue>,
}

pub(crate) fn expand(location: &CandidateLocation) -> Expansion {
    let mut expansion = Expansion::default();
    match fs::metadata(&location.base) {
        Ok(_) => {}
        Err(err) if err.kind() == io::ErrorKind::NotFound => return expansion,
        Err(err) => {
            expansion.issues.push(ScanIssue::from_io(&location.base, &err));
            return expansion;
        }
    }

    let Some(pattern) = &location.pattern else {
        expansion.matches.push(location.base.clone());
        return expansion;
    };

    let Some(base) = location.base.to_str() else {
        expansion.issues.push(ScanIssue {
            path: location.base.clone(),
            kind: ScanIssueKind::Unreadable("path is not valid UTF-8".to_string()),
        });
        return expansion;
    };
    let full = format!("{}/{}", Pattern::escape(base.trim_end_matches(['/', '\\'])), pattern);

    let paths = match glob::glob_with(&full, MatchOptions::new()) {
        Ok(paths) => paths,
        Err(err) => {
            expansion.issues.push(ScanIssue {
                path: location.base.clone(),
                kind: ScanIssueKind::Unreadable(err.to_string()),
            });
            return expansion;
        }
    };

    for entry in paths {
        match entry {
            Ok(path) => expansion.matches.push(path),
            Err(err) => expansion
                .issues
                .push(ScanIssue::from_io(err.path(), err.error())),
        }
    }
    expansion.matches.sort();
    expansion
}

/// Total size of regular files below `path`. Any unreadable entry makes the
/// size unknown; the first such entry is returned as an issue.
pub(crate) fn tree_size(path: &Path) -> Result<u64, ScanIssue> {
    let mut total = 0u64;
    for entry in WalkDir::new(path).follow_links(false) {
        let entry = entry.map_err(|err| walk_issue(path, &err))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let metadata = entry.metadata().map_err(|err| walk_issue(path, &err))?;
        total += metadata.len();
    }
    Ok(total)
}

fn walk_issue(root: &Path, err: &walkdir::Error) -> ScanIssue {
    let path = err.path().unwrap_or(root);
    match err.io_error() {
        Some(io_err) => ScanIssue::from_io(path, io_err),
        None => ScanIssue {
            path: path.to_path_buf(),
            kind: ScanIssueKind::Unreadable(err.to_string()),
        },
    }
}
