use std::fmt;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::Path;

use anyhow::{Context, Result};
use pyreset_core::OsTag;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub const MANIFEST_FILE: &str = "manifest.json";
pub const MANIFEST_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum CaptureStatus {
    Captured,
    Failed { reason: String },
}

impl CaptureStatus {
    pub fn is_captured(&self) -> bool {
        matches!(self, Self::Captured)
    }
}

/// One file inside a backup archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRecord {
    /// File name relative to the archive root. Failed captures point at
    /// their `.failed` sentinel.
    pub file_name: String,
    /// What produced the content, e.g. `pip freeze` or `venv demo`.
    pub source: String,
    #[serde(flatten)]
    pub status: CaptureStatus,
    /// Absent when not even a sentinel could be written.
    pub sha256: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupManifest {
    pub version: u32,
    pub created_at: String,
    pub os: OsTag,
    pub artifacts: Vec<ArtifactRecord>,
}

impl BackupManifest {
    pub fn failed_artifacts(&self) -> impl Iterator<Item = &ArtifactRecord> {
        self.artifacts
            .iter()
            .filter(|artifact| !artifact.status.is_captured())
    }

    pub fn read(archive_root: &Path) -> Result<Self> {
        let path = archive_root.join(MANIFEST_FILE);
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("failed to read backup manifest: {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse backup manifest: {}", path.display()))
    }
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

pub fn sha256_file(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0_u8; 32 * 1024];
    loop {
        let read = file.read(&mut buf)?;
        if read == 0 {
            break;
        }
        hasher.update(&buf[..read]);
    }
    Ok(hex::encode(hasher.finalize()))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationProblem {
    Missing { file_name: String },
    DigestMismatch { file_name: String, expected: String, actual: String },
}

impl fmt::Display for VerificationProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing { file_name } => write!(f, "{file_name} is missing or unreadable"),
            Self::DigestMismatch {
                file_name,
                expected,
                actual,
            } => write!(f, "{file_name} changed (expected sha256 {expected}, found {actual})"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ArchiveVerification {
    pub checked: usize,
    pub problems: Vec<VerificationProblem>,
}

impl ArchiveVerification {
    pub fn is_intact(&self) -> bool {
        self.problems.is_empty()
    }
}

/// Re-hashes every artifact listed in the manifest. Fails only when the
/// manifest itself is missing or unreadable.
pub fn verify_archive(archive_root: &Path) -> Result<ArchiveVerification> {
    let manifest = BackupManifest::read(archive_root)?;
    let mut verification = ArchiveVerification::default();
    for artifact in &manifest.artifacts {
        let Some(expected) = &artifact.sha256 else {
            continue;
        };
        verification.checked += 1;
        match sha256_file(&archive_root.join(&artifact.file_name)) {
            Ok(actual) if &actual == expected => {}
            Ok(actual) => verification.problems.push(VerificationProblem::DigestMismatch {
                file_name: artifact.file_name.clone(),
                expected: expected.clone(),
                actual,
            }),
            Err(_) => verification.problems.push(VerificationProblem::Missing {
                file_name: artifact.file_name.clone(),
            }),
        }
    }
    Ok(verification)
}
