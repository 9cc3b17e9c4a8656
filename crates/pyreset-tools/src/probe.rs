use std::path::Path;

use pyreset_core::ToolError;

use crate::runner::{CommandRunner, Invocation, PROBE_TIMEOUT};

/// Pulls the first version-looking token out of `--version` output.
///
/// `Python 3.11.7`, `pip 23.3.1 from /usr/lib/...`, `uv 0.4.18 (abc 2024-10-01)`
/// and a bare `1.4.3` all yield the dotted number.
pub fn parse_tool_version(output: &str) -> Option<String> {
    output
        .split_whitespace()
        .map(|token| token.trim_matches(|ch: char| matches!(ch, '(' | ')' | ',' | ';')))
        .map(|token| token.strip_prefix('v').unwrap_or(token))
        .find(|token| {
            token.starts_with(|ch: char| ch.is_ascii_digit())
                && token.contains('.')
                && token
                    .chars()
                    .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '.' | '-' | '+'))
        })
        .map(ToOwned::to_owned)
}

/// Runs `<program> --version` with the probe timeout. Python 2 and a few
/// shims print the version on stderr, so both streams are consulted.
pub fn probe_version(runner: &dyn CommandRunner, program: &Path) -> Result<String, ToolError> {
    let invocation = Invocation::new(program)
        .arg("--version")
        .timeout(PROBE_TIMEOUT);
    let output = runner.run(&invocation)?;
    if !output.success {
        return Err(ToolError::Failed {
            program: invocation.program_name(),
            status: output.status,
            stderr: output.stderr.trim().to_string(),
        });
    }
    parse_tool_version(&output.stdout)
        .or_else(|| parse_tool_version(&output.stderr))
        .ok_or_else(|| ToolError::Failed {
            program: invocation.program_name(),
            status: output.status,
            stderr: format!("unrecognised version output: {}", output.stdout.trim()),
        })
}
