use std::io::IsTerminal;
use std::time::{Duration, Instant};

use anstyle::{AnsiColor, Effects, Style};
use indicatif::{HumanBytes, HumanCount, ProgressBar, ProgressStyle};
use pyreset_backup::{BackupArchive, CaptureStatus};
use pyreset_core::{CleanupPlan, EnvironmentSnapshot, ToolchainConfig};
use pyreset_installer::{ActionOutcome, CleanupReport, InstallReport, StepOutcome};
use pyreset_tools::KNOWN_TOOLS;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum OutputStyle {
    Plain,
    Rich,
}

/// Rich output only on an interactive stdout, and never with `NO_COLOR` set.
pub(crate) fn current_output_style() -> OutputStyle {
    if std::env::var_os("NO_COLOR").is_some() || !std::io::stdout().is_terminal() {
        OutputStyle::Plain
    } else {
        OutputStyle::Rich
    }
}

#[derive(Copy, Clone, Debug)]
pub(crate) struct TerminalRenderer {
    style: OutputStyle,
}

pub(crate) struct TerminalProgress {
    style: OutputStyle,
    label: String,
    total: u64,
    current: u64,
    progress_bar: Option<ProgressBar>,
    started_at: Instant,
}

impl TerminalRenderer {
    pub(crate) fn from_style(style: OutputStyle) -> Self {
        Self { style }
    }

    pub(crate) fn style(self) -> OutputStyle {
        self.style
    }

    pub(crate) fn print_status(self, status: &str, message: &str) {
        println!("{}", render_status_line(self.style, status, message));
    }

    pub(crate) fn print_section(self, title: &str) {
        if let Some(line) = render_section_header(self.style, title) {
            println!();
            println!("{}", colorize(section_style(), &line));
        }
    }

    pub(crate) fn print_lines(self, lines: &[String]) {
        for line in lines {
            println!("{line}");
        }
    }

    pub(crate) fn start_progress(self, label: &str, total: u64) -> TerminalProgress {
        let progress_bar = if self.style == OutputStyle::Rich {
            let progress_bar = ProgressBar::new(total.max(1));
            if let Ok(style) = ProgressStyle::with_template(
                "{spinner:.cyan.bold} {msg:<12} [{bar:20.cyan/blue}] {pos:>3}/{len:3} {elapsed_precise}",
            ) {
                progress_bar.set_style(style.tick_chars("\\|/- ").progress_chars("=>-"));
            }
            progress_bar.set_message(label.to_string());
            progress_bar.enable_steady_tick(Duration::from_millis(80));
            Some(progress_bar)
        } else {
            None
        };

        TerminalProgress {
            style: self.style,
            label: label.to_string(),
            total,
            current: 0,
            progress_bar,
            started_at: Instant::now(),
        }
    }
}

impl TerminalProgress {
    pub(crate) fn set(&mut self, current: u64) {
        self.current = current.min(self.total);

        let Some(progress_bar) = &self.progress_bar else {
            return;
        };
        progress_bar.set_position(self.current);
    }

    pub(crate) fn finish(mut self) {
        let Some(progress_bar) = self.progress_bar.take() else {
            return;
        };

        progress_bar.finish_and_clear();
        if let Some(line) = render_progress_line(
            self.style,
            &self.label,
            self.current,
            self.total,
            self.started_at.elapsed(),
        ) {
            println!("{line}");
        }
    }
}

pub(crate) fn render_status_line(style: OutputStyle, status: &str, message: &str) -> String {
    match style {
        OutputStyle::Plain => message.to_string(),
        OutputStyle::Rich => {
            let badge = match status {
                "ok" => "[OK]",
                "warn" => "[WARN]",
                "error" => "[ERR]",
                "step" => "[..]",
                _ => "[--]",
            };
            format!("{badge} {message}")
        }
    }
}

fn render_section_header(style: OutputStyle, title: &str) -> Option<String> {
    match style {
        OutputStyle::Plain => None,
        OutputStyle::Rich => Some(format!("== {title} ==")),
    }
}

fn render_progress_line(
    style: OutputStyle,
    label: &str,
    current: u64,
    total: u64,
    elapsed: Duration,
) -> Option<String> {
    if style == OutputStyle::Plain {
        return None;
    }
    Some(format!(
        "{} {}/{} complete in {}",
        colorize(progress_label_style(), label),
        HumanCount(current),
        HumanCount(total),
        format_elapsed(elapsed)
    ))
}

fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    let millis = elapsed.subsec_millis();
    format!("{secs}.{millis:03}s")
}

fn section_style() -> Style {
    Style::new()
        .fg_color(Some(AnsiColor::BrightBlue.into()))
        .effects(Effects::BOLD)
}

fn progress_label_style() -> Style {
    Style::new()
        .fg_color(Some(AnsiColor::BrightCyan.into()))
        .effects(Effects::BOLD)
}

fn colorize(style: Style, text: &str) -> String {
    format!("{}{}{}", style.render(), text, style.render_reset())
}

fn format_size(size_bytes: Option<u64>) -> String {
    size_bytes
        .map(|bytes| HumanBytes(bytes).to_string())
        .unwrap_or_else(|| "size unknown".to_string())
}

pub(crate) fn format_snapshot_lines(snapshot: &EnvironmentSnapshot) -> Vec<String> {
    let mut lines = Vec::new();

    lines.push(format!("interpreters: {}", snapshot.interpreters.len()));
    for interpreter in &snapshot.interpreters {
        lines.push(format!(
            "  {} {} ({})",
            interpreter.version.as_deref().unwrap_or("unknown"),
            interpreter.path.display(),
            interpreter.origin.as_str()
        ));
    }

    match &snapshot.version_manager_root {
        Some(root) => lines.push(format!("version manager root: {}", root.display())),
        None => lines.push("version manager root: not installed".to_string()),
    }

    for tool in KNOWN_TOOLS {
        match snapshot.package_manager_version(tool) {
            Some(version) => {
                let location = snapshot
                    .tool_paths
                    .get(tool)
                    .map(|path| format!(" ({})", path.display()))
                    .unwrap_or_default();
                lines.push(format!("{tool}: {version}{location}"));
            }
            None => lines.push(format!("{tool}: not installed")),
        }
    }

    lines.push(format!("virtual environments: {}", snapshot.virtual_envs.len()));
    for venv in &snapshot.virtual_envs {
        lines.push(format!(
            "  {} {} python {} {}",
            venv.name(),
            venv.root.display(),
            venv.python_version.as_deref().unwrap_or("unknown"),
            format_size(venv.size_bytes)
        ));
    }

    lines.push(format!("caches: {}", snapshot.caches.len()));
    for cache in &snapshot.caches {
        lines.push(format!(
            "  {} {} {}",
            cache.owner.as_str(),
            cache.path.display(),
            format_size(cache.size_bytes)
        ));
    }

    let tainted = snapshot
        .shell_configs
        .iter()
        .filter(|config| config.foreign_lines > 0)
        .collect::<Vec<_>>();
    lines.push(format!(
        "shell configs with version-manager lines: {}",
        tainted.len()
    ));
    for config in tainted {
        lines.push(format!(
            "  {} ({} lines)",
            config.path.display(),
            config.foreign_lines
        ));
    }

    lines.push(format!(
        "reclaimable: {}",
        HumanBytes(snapshot.known_reclaimable_bytes())
    ));

    if !snapshot.issues.is_empty() {
        lines.push(format!("unreadable locations: {}", snapshot.issues.len()));
        for issue in &snapshot.issues {
            lines.push(format!("  {} ({})", issue.path.display(), issue.kind));
        }
    }
    lines
}

pub(crate) fn format_plan_lines(plan: &CleanupPlan) -> Vec<String> {
    let mut lines = Vec::new();
    for (category, actions) in plan.by_category() {
        lines.push(format!("{category} ({}):", actions.len()));
        lines.extend(actions.iter().map(|action| format!("  {}", action.describe())));
    }
    lines
}

pub(crate) fn format_cleanup_report_lines(report: &CleanupReport, style: OutputStyle) -> Vec<String> {
    let mut lines = Vec::new();
    for result in &report.results {
        let status = match result.outcome {
            ActionOutcome::Removed => "ok",
            ActionOutcome::Failed(_) => "error",
            ActionOutcome::Skipped(_) => "warn",
        };
        lines.push(render_status_line(
            style,
            status,
            &format!("{}: {}", result.action.describe(), result.outcome),
        ));
    }
    for (category, counts) in report.counts_by_category() {
        lines.push(format!(
            "{category}: {} removed, {} failed, {} skipped",
            counts.removed, counts.failed, counts.skipped
        ));
    }
    lines
}

pub(crate) fn format_install_plan_lines(config: &ToolchainConfig) -> Vec<String> {
    vec![
        format!("python {}", config.pinned_version),
        format!("version manager root: {}", config.version_manager_root.display()),
        format!("package manager: {}", config.package_manager_bin.display()),
        format!("venv root: {}", config.venv_root.display()),
    ]
}

pub(crate) fn format_install_report_lines(report: &InstallReport, style: OutputStyle) -> Vec<String> {
    report
        .steps
        .iter()
        .map(|result| {
            let status = match result.outcome {
                StepOutcome::Changed(_) | StepOutcome::AlreadySatisfied => "ok",
                StepOutcome::Failed(_) => "error",
                StepOutcome::Skipped(_) => "warn",
            };
            let subject = match &result.target {
                Some(target) => format!("{} ({})", result.step, target.display()),
                None => result.step.to_string(),
            };
            render_status_line(style, status, &format!("{subject}: {}", result.outcome))
        })
        .collect()
}

pub(crate) fn format_backup_lines(archive: &BackupArchive, style: OutputStyle) -> Vec<String> {
    let mut lines = vec![render_status_line(
        style,
        "ok",
        &format!("backup written to {}", archive.root.display()),
    )];
    for artifact in &archive.manifest.artifacts {
        let line = match &artifact.status {
            CaptureStatus::Captured => render_status_line(
                style,
                "ok",
                &format!("{} ({})", artifact.file_name, artifact.source),
            ),
            CaptureStatus::Failed { reason } => render_status_line(
                style,
                "warn",
                &format!("{} ({}): {reason}", artifact.file_name, artifact.source),
            ),
        };
        lines.push(line);
    }
    lines
}
