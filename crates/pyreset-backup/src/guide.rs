use std::fmt::Write as _;

use pyreset_core::{OsTag, VenvRecord};

use crate::manifest::{ArtifactRecord, CaptureStatus, MANIFEST_FILE};

pub const RESTORE_GUIDE_FILE: &str = "restore-guide.md";
pub const SNAPSHOT_FILE: &str = "snapshot.json";

/// Everything the restore guide needs, gathered while the archive is written.
pub(crate) struct GuideInput<'a> {
    pub created_at: &'a str,
    pub os: OsTag,
    pub artifacts: &'a [ArtifactRecord],
    pub interpreter_versions: &'a [String],
    pub global_packages: Option<&'a str>,
    pub uv_tools: &'a [String],
    pub pipx_packages: &'a [String],
    /// Venv records paired with the artifact holding their freeze output.
    pub venvs: &'a [(VenvRecord, String)],
}

pub(crate) fn render_restore_guide(input: &GuideInput<'_>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# Python environment restore guide");
    let _ = writeln!(out);
    let _ = writeln!(out, "Captured {} on {}.", input.created_at, input.os);
    let _ = writeln!(
        out,
        "Every command below uses only files in this directory; the tool that wrote it is not required."
    );
    let _ = writeln!(out);

    let _ = writeln!(out, "## Archive contents");
    let _ = writeln!(out);
    for artifact in input.artifacts {
        match &artifact.status {
            CaptureStatus::Captured => {
                let _ = writeln!(out, "- `{}`: {}", artifact.file_name, artifact.source);
            }
            CaptureStatus::Failed { reason } => {
                let _ = writeln!(
                    out,
                    "- `{}`: {} (CAPTURE FAILED: {reason})",
                    artifact.file_name, artifact.source
                );
            }
        }
    }
    let _ = writeln!(out, "- `{SNAPSHOT_FILE}`: full inventory at capture time");
    let _ = writeln!(out, "- `{RESTORE_GUIDE_FILE}`: this guide");
    let _ = writeln!(out, "- `{MANIFEST_FILE}`: SHA-256 digest of every file above");
    let _ = writeln!(out);

    let shell = if input.os.is_windows() { "powershell" } else { "sh" };
    let mut step = 1;

    let _ = writeln!(out, "## {step}. Install the version manager");
    let _ = writeln!(out);
    if input.os.is_windows() {
        let _ = writeln!(out, "Install pyenv-win: https://github.com/pyenv-win/pyenv-win#installation");
    } else {
        let _ = writeln!(out, "Install pyenv: https://github.com/pyenv/pyenv#installation");
    }
    let _ = writeln!(out);
    step += 1;

    if !input.interpreter_versions.is_empty() {
        let _ = writeln!(out, "## {step}. Reinstall interpreters");
        let _ = writeln!(out);
        let _ = writeln!(out, "```{shell}");
        for version in input.interpreter_versions {
            let _ = writeln!(out, "pyenv install -s {version}");
        }
        let _ = writeln!(out, "```");
        let _ = writeln!(out);
        step += 1;
    }

    if input.global_packages.is_some() || !input.uv_tools.is_empty() || !input.pipx_packages.is_empty() {
        let _ = writeln!(out, "## {step}. Restore global packages and tools");
        let _ = writeln!(out);
        let _ = writeln!(out, "```{shell}");
        if let Some(file) = input.global_packages {
            let _ = writeln!(out, "python -m pip install -r {file}");
        }
        for tool in input.uv_tools {
            let _ = writeln!(out, "uv tool install {tool}");
        }
        for package in input.pipx_packages {
            let _ = writeln!(out, "pipx install {package}");
        }
        let _ = writeln!(out, "```");
        let _ = writeln!(out);
        step += 1;
    }

    if !input.venvs.is_empty() {
        let _ = writeln!(out, "## {step}. Recreate virtual environments");
        let _ = writeln!(out);
        for (venv, file) in input.venvs {
            let root = venv.root.display();
            let python = input.os.venv_python(&venv.root);
            let _ = writeln!(out, "### {}", venv.name());
            let _ = writeln!(out);
            let _ = writeln!(out, "```{shell}");
            match &venv.python_version {
                Some(version) => {
                    let _ = writeln!(out, "pyenv install -s {version}");
                    let _ = writeln!(out, "pyenv shell {version}");
                }
                None => {
                    let _ = writeln!(out, "# interpreter version was not recorded");
                }
            }
            let _ = writeln!(out, "python -m venv \"{root}\"");
            let _ = writeln!(out, "\"{}\" -m pip install -r {file}", python.display());
            let _ = writeln!(out, "```");
            let _ = writeln!(out);
        }
    }

    out
}

/// First token of each meaningful line: `uv tool list` prints
/// `ruff v0.6.9` followed by `- ruff` executable lines; `pipx list --short`
/// prints `black 24.1.0`. An empty uv listing says `No tools installed`.
pub(crate) fn tool_names(raw: &str) -> Vec<String> {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('-') && !line.starts_with("No "))
        .filter_map(|line| line.split_whitespace().next())
        .map(ToOwned::to_owned)
        .collect()
}
