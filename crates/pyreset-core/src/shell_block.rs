//! Text-level merge rules for shared shell configuration files.
//!
//! Only the block between [`MANAGED_BLOCK_START`] and [`MANAGED_BLOCK_END`]
//! and lines mentioning one of [`VERSION_MANAGER_TOKENS`] are ever touched,
//! plus the `if`/`then`/`fi` lines of a construct left with nothing else in
//! it. Every other byte is passed through as-is, including line terminators.

use std::path::Path;

pub const MANAGED_BLOCK_START: &str = "# >>> pyreset toolchain >>>";
pub const MANAGED_BLOCK_END: &str = "# <<< pyreset toolchain <<<";
pub const VERSION_MANAGER_TOKENS: &[&str] = &["pyenv"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellFlavor {
    Posix,
    PowerShell,
}

impl ShellFlavor {
    pub fn for_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("ps1") => Self::PowerShell,
            _ => Self::Posix,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ShellConfigScan {
    pub foreign_lines: usize,
    pub has_managed_block: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineKind {
    Plain,
    /// Part of the n-th complete managed block.
    Block(usize),
    /// A start or end marker without its counterpart.
    OrphanMarker,
}

fn classify(text: &str) -> Vec<(&str, LineKind)> {
    let lines = text.split_inclusive('\n').collect::<Vec<_>>();
    let mut kinds = vec![LineKind::Plain; lines.len()];
    let mut block_index = 0;
    let mut i = 0;
    while i < lines.len() {
        let trimmed = lines[i].trim();
        if trimmed == MANAGED_BLOCK_START {
            let end = (i + 1..lines.len()).find(|&j| {
                let candidate = lines[j].trim();
                candidate == MANAGED_BLOCK_END || candidate == MANAGED_BLOCK_START
            });
            match end {
                Some(j) if lines[j].trim() == MANAGED_BLOCK_END => {
                    for kind in &mut kinds[i..=j] {
                        *kind = LineKind::Block(block_index);
                    }
                    block_index += 1;
                    i = j + 1;
                    continue;
                }
                _ => kinds[i] = LineKind::OrphanMarker,
            }
        } else if trimmed == MANAGED_BLOCK_END {
            kinds[i] = LineKind::OrphanMarker;
        }
        i += 1;
    }
    lines.into_iter().zip(kinds).collect()
}

fn mentions_version_manager(line: &str) -> bool {
    let lowered = line.to_ascii_lowercase();
    VERSION_MANAGER_TOKENS
        .iter()
        .any(|token| lowered.contains(token))
}

fn line_ending(text: &str) -> &'static str {
    if text.contains("\r\n") {
        "\r\n"
    } else {
        "\n"
    }
}

/// A POSIX `if ... fi` construct found among plain lines.
struct IfBlock {
    start: usize,
    end: usize,
    /// `elif` and `else` lines belonging to this construct.
    branches: Vec<usize>,
}

fn is_if_opener(trimmed: &str) -> bool {
    let closes_inline = trimmed.trim_end_matches(';').ends_with(" fi");
    trimmed.starts_with("if ") && !closes_inline
}

/// Matched `if`/`fi` pairs in closing order, so inner constructs come first.
fn if_blocks(lines: &[(&str, LineKind)]) -> Vec<IfBlock> {
    let mut open: Vec<IfBlock> = Vec::new();
    let mut closed = Vec::new();
    for (index, (line, kind)) in lines.iter().enumerate() {
        if *kind != LineKind::Plain {
            continue;
        }
        let trimmed = line.trim();
        if is_if_opener(trimmed) {
            open.push(IfBlock {
                start: index,
                end: index,
                branches: Vec::new(),
            });
        } else if trimmed == "else" || trimmed.starts_with("elif ") {
            if let Some(block) = open.last_mut() {
                block.branches.push(index);
            }
        } else if trimmed == "fi" || trimmed == "fi;" {
            if let Some(mut block) = open.pop() {
                block.end = index;
                closed.push(block);
            }
        }
    }
    closed
}

fn is_filler(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.is_empty() || trimmed == "then" || trimmed.starts_with('#')
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineEdit {
    Keep,
    Drop,
    /// Dropped, but a `:` takes its place so a branch never ends up empty.
    NoOp,
}

/// What a strip does to each line. Version-manager lines go one by one,
/// except that an `if ... fi` holding nothing else goes as a whole and the
/// keywords of any other construct stay, keeping the file parseable.
fn plan_edits(lines: &[(&str, LineKind)], keep_managed_block: bool) -> Vec<LineEdit> {
    let mut edits = lines
        .iter()
        .map(|(line, kind)| {
            let drop = match kind {
                LineKind::Plain => mentions_version_manager(line),
                LineKind::Block(0) => !keep_managed_block,
                LineKind::Block(_) | LineKind::OrphanMarker => true,
            };
            if drop {
                LineEdit::Drop
            } else {
                LineEdit::Keep
            }
        })
        .collect::<Vec<_>>();

    let cleared = |edits: &[LineEdit], from: usize, to: usize| {
        (from + 1..to).all(|index| edits[index] != LineEdit::Keep || is_filler(lines[index].0))
    };
    let touched = |edits: &[LineEdit], from: usize, to: usize| {
        (from + 1..to).any(|index| edits[index] != LineEdit::Keep)
    };

    for block in if_blocks(lines) {
        if block.branches.is_empty()
            && cleared(&edits, block.start, block.end)
            && (edits[block.start] == LineEdit::Drop || touched(&edits, block.start, block.end))
        {
            for edit in &mut edits[block.start..=block.end] {
                *edit = LineEdit::Drop;
            }
            continue;
        }

        let keywords = std::iter::once(block.start)
            .chain(block.branches.iter().copied())
            .chain(std::iter::once(block.end))
            .collect::<Vec<_>>();
        for &index in &keywords {
            edits[index] = LineEdit::Keep;
        }
        for pair in keywords.windows(2) {
            let (from, to) = (pair[0], pair[1]);
            if !cleared(&edits, from, to) || !touched(&edits, from, to) {
                continue;
            }
            if let Some(first) = (from + 1..to).find(|&index| edits[index] != LineEdit::Keep) {
                edits[first] = LineEdit::NoOp;
            }
        }
    }
    edits
}

fn no_op_line(line: &str) -> String {
    let indent = &line[..line.len() - line.trim_start().len()];
    let ending = if line.ends_with("\r\n") {
        "\r\n"
    } else if line.ends_with('\n') {
        "\n"
    } else {
        ""
    };
    format!("{indent}:{ending}")
}

pub fn analyze_shell_config(text: &str) -> ShellConfigScan {
    let lines = classify(text);
    let edits = plan_edits(&lines, true);
    let mut scan = ShellConfigScan::default();
    for ((_, kind), edit) in lines.iter().zip(edits) {
        match kind {
            LineKind::Plain if edit != LineEdit::Keep => scan.foreign_lines += 1,
            LineKind::Block(_) => scan.has_managed_block = true,
            _ => {}
        }
    }
    scan
}

/// Removes version-manager lines outside the managed block and any orphaned
/// markers. The managed block itself is removed unless `keep_managed_block`.
pub fn strip_tool_lines(text: &str, keep_managed_block: bool) -> String {
    let lines = classify(text);
    let edits = plan_edits(&lines, keep_managed_block);
    let mut out = String::with_capacity(text.len());
    for ((line, _), edit) in lines.iter().zip(edits) {
        match edit {
            LineEdit::Keep => out.push_str(line),
            LineEdit::NoOp => out.push_str(&no_op_line(line)),
            LineEdit::Drop => {}
        }
    }
    out
}

/// Replaces the first managed block with `block_lines` (dropping any further
/// copies), or appends a fresh block when none exists.
pub fn upsert_managed_block(text: &str, block_lines: &[String]) -> String {
    let eol = line_ending(text);
    let mut block = String::new();
    block.push_str(MANAGED_BLOCK_START);
    block.push_str(eol);
    for line in block_lines {
        block.push_str(line);
        block.push_str(eol);
    }
    block.push_str(MANAGED_BLOCK_END);
    block.push_str(eol);

    let mut out = String::with_capacity(text.len() + block.len());
    let mut placed = false;
    for (line, kind) in classify(text) {
        match kind {
            LineKind::Plain => out.push_str(line),
            LineKind::Block(_) if !placed => {
                out.push_str(&block);
                placed = true;
            }
            LineKind::Block(_) | LineKind::OrphanMarker => {}
        }
    }

    if !placed {
        if !out.is_empty() && !out.ends_with('\n') {
            out.push_str(eol);
        }
        out.push_str(&block);
    }
    out
}
