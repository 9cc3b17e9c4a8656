use super::*;

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use pyreset_core::{
    ActionFailure, CleanupPlan, HostLayout, OsTag, RemovalAction, RemovalCategory, RemovalMethod,
    ToolError, ToolchainConfig, MANAGED_BLOCK_END, MANAGED_BLOCK_START,
};
use pyreset_tools::{CommandRunner, Invocation, ToolLocator, ToolOutput, Toolbox};
use tempfile::TempDir;

struct Machine {
    dir: TempDir,
    home: PathBuf,
}

impl Machine {
    fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let home = dir.path().join("home");
        fs::create_dir_all(&home).expect("home");
        Self { dir, home }
    }

    fn layout(&self) -> HostLayout {
        HostLayout::new(&self.home).with_system_root(self.dir.path())
    }

    fn config(&self) -> ToolchainConfig {
        ToolchainConfig::defaults(&self.layout(), OsTag::Linux)
    }

    fn write(&self, relative: &str, contents: &str) -> PathBuf {
        let path = self.home.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("mkdir");
        }
        fs::write(&path, contents).expect("write");
        path
    }

    fn mkdir(&self, relative: &str) -> PathBuf {
        let path = self.home.join(relative);
        fs::create_dir_all(path.join("lib")).expect("mkdir");
        fs::write(path.join("lib").join("payload"), "x").expect("payload");
        path
    }
}

fn no_tools() -> Arc<dyn ToolLocator> {
    Arc::new(|_: &str| -> Option<PathBuf> { None })
}

fn recording_runner(
    calls: Arc<Mutex<Vec<Invocation>>>,
    respond: fn(&Invocation) -> Result<ToolOutput, ToolError>,
) -> Arc<dyn CommandRunner> {
    Arc::new(move |invocation: &Invocation| -> Result<ToolOutput, ToolError> {
        calls.lock().expect("calls lock").push(invocation.clone());
        respond(invocation)
    })
}

fn env_path(invocation: &Invocation, key: &str) -> Option<PathBuf> {
    invocation
        .envs
        .iter()
        .find(|(name, _)| name == key)
        .map(|(_, value)| PathBuf::from(value))
}

/// Behaves like the installer scripts and pyenv would, against the files
/// under the invocation's `PYENV_ROOT` / `UV_INSTALL_DIR`.
fn simulated_toolchain(invocation: &Invocation) -> Result<ToolOutput, ToolError> {
    if invocation.program_name() == "sh" {
        if let Some(root) = env_path(invocation, "PYENV_ROOT") {
            fs::create_dir_all(root.join("bin")).expect("pyenv bin");
            fs::create_dir_all(root.join("versions")).expect("pyenv versions");
            fs::write(root.join("bin").join("pyenv"), "#!/bin/sh\n").expect("pyenv");
            return Ok(ToolOutput::ok("pyenv installed\n"));
        }
        if let Some(dir) = env_path(invocation, "UV_INSTALL_DIR") {
            fs::create_dir_all(&dir).expect("uv dir");
            fs::write(dir.join("uv"), "uv").expect("uv");
            return Ok(ToolOutput::ok("uv installed\n"));
        }
        return Ok(ToolOutput::failed("exit status: 1", "unknown installer"));
    }

    let root = env_path(invocation, "PYENV_ROOT").expect("pyenv calls carry PYENV_ROOT");
    let args = invocation.args.iter().map(String::as_str).collect::<Vec<_>>();
    match args.as_slice() {
        ["versions", "--bare"] => {
            let mut versions = fs::read_dir(root.join("versions"))
                .map(|entries| {
                    entries
                        .filter_map(|entry| entry.ok())
                        .map(|entry| entry.file_name().to_string_lossy().into_owned())
                        .collect::<Vec<_>>()
                })
                .unwrap_or_default();
            versions.sort();
            Ok(ToolOutput::ok(
                versions.iter().map(|v| format!("{v}\n")).collect::<String>(),
            ))
        }
        ["install", "-s", version] => {
            fs::create_dir_all(root.join("versions").join(version).join("bin")).expect("version");
            Ok(ToolOutput::ok(""))
        }
        ["global"] => Ok(ToolOutput::ok(
            fs::read_to_string(root.join("version")).unwrap_or_else(|_| "system\n".to_string()),
        )),
        ["global", version] => {
            fs::write(root.join("version"), format!("{version}\n")).expect("global");
            Ok(ToolOutput::ok(""))
        }
        _ => Ok(ToolOutput::failed("exit status: 1", "unexpected pyenv call")),
    }
}

fn script_fetcher() -> Arc<dyn ScriptFetcher> {
    Arc::new(|url: &str| -> anyhow::Result<Vec<u8>> {
        Ok(format!("# installer from {url}\n").into_bytes())
    })
}

fn installer(runner: Arc<dyn CommandRunner>) -> StackInstaller {
    StackInstaller::new(Toolbox::new(runner, no_tools(), OsTag::Linux), script_fetcher())
}

/// Every file and directory under `root` with its contents and mtime.
fn tree_state(root: &Path) -> BTreeMap<PathBuf, (Option<Vec<u8>>, SystemTime)> {
    let mut state = BTreeMap::new();
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        for entry in fs::read_dir(&dir).expect("read dir") {
            let path = entry.expect("entry").path();
            let metadata = fs::metadata(&path).expect("metadata");
            let modified = metadata.modified().expect("mtime");
            if metadata.is_dir() {
                pending.push(path.clone());
                state.insert(path, (None, modified));
            } else {
                state.insert(path.clone(), (Some(fs::read(&path).expect("read")), modified));
            }
        }
    }
    state
}

fn delete(path: PathBuf, category: RemovalCategory) -> RemovalAction {
    RemovalAction {
        target_path: path,
        category,
        destructive: true,
        method: RemovalMethod::DeleteTree,
    }
}

fn executor(machine: &Machine, runner: Arc<dyn CommandRunner>, locator: Arc<dyn ToolLocator>) -> CleanupExecutor {
    CleanupExecutor::new(Toolbox::new(runner, locator, OsTag::Linux), machine.layout())
}

fn idle_runner() -> Arc<dyn CommandRunner> {
    Arc::new(|invocation: &Invocation| -> Result<ToolOutput, ToolError> {
        Ok(ToolOutput::failed("exit status: 1", format!("unexpected call: {}", invocation.command_line())))
    })
}

#[test]
fn vanished_targets_are_reported_and_the_batch_completes() {
    let machine = Machine::new();
    let demo = machine.mkdir(".venvs/demo");
    let api = machine.mkdir(".venvs/api");
    let tools = machine.mkdir(".venvs/tools");
    let cache = machine.mkdir(".cache/pip");
    let plan = CleanupPlan::new(
        vec![
            delete(demo.clone(), RemovalCategory::VirtualEnv),
            delete(api.clone(), RemovalCategory::VirtualEnv),
            delete(tools.clone(), RemovalCategory::VirtualEnv),
            delete(cache.clone(), RemovalCategory::Cache),
        ],
        0,
    );
    fs::remove_dir_all(&api).expect("out-of-band removal");

    let report = executor(&machine, idle_runner(), no_tools())
        .execute(&plan)
        .expect("execute");

    let outcomes = report
        .results
        .iter()
        .map(|result| (result.action.target_path.clone(), result.outcome.clone()))
        .collect::<Vec<_>>();
    assert_eq!(
        outcomes,
        vec![
            (demo.clone(), ActionOutcome::Removed),
            (
                api.clone(),
                ActionOutcome::Failed(ActionFailure::Vanished {
                    path: api.display().to_string()
                })
            ),
            (tools.clone(), ActionOutcome::Removed),
            (cache.clone(), ActionOutcome::Removed),
        ]
    );
    assert!(!demo.exists() && !tools.exists() && !cache.exists());

    let counts = report.counts_by_category();
    assert_eq!(
        counts[&RemovalCategory::VirtualEnv],
        OutcomeCounts {
            removed: 2,
            failed: 1,
            skipped: 0
        }
    );
    assert_eq!(counts[&RemovalCategory::Cache].removed, 1);
    assert_eq!(report.totals().total(), 4);
}

#[test]
fn actions_run_in_category_priority_order() {
    let machine = Machine::new();
    let config = machine.write(".bashrc", "export PYENV_ROOT=\"$HOME/.pyenv\"\n");
    let cache = machine.mkdir(".cache/uv");
    let root = machine.mkdir(".pyenv");
    let venv = machine.mkdir(".venvs/demo");
    let plan = CleanupPlan::new(
        vec![
            RemovalAction {
                target_path: config.clone(),
                category: RemovalCategory::ShellConfig,
                destructive: false,
                method: RemovalMethod::StripShellConfig {
                    keep_managed_block: false,
                },
            },
            delete(cache.clone(), RemovalCategory::Cache),
            delete(root.clone(), RemovalCategory::VersionManagerRoot),
            delete(venv.clone(), RemovalCategory::VirtualEnv),
        ],
        0,
    );

    let report = executor(&machine, idle_runner(), no_tools())
        .execute(&plan)
        .expect("execute");
    let order = report
        .results
        .iter()
        .map(|result| result.action.category)
        .collect::<Vec<_>>();
    assert_eq!(
        order,
        vec![
            RemovalCategory::VirtualEnv,
            RemovalCategory::VersionManagerRoot,
            RemovalCategory::Cache,
            RemovalCategory::ShellConfig,
        ]
    );
    assert_eq!(report.totals().removed, 4);
    assert_eq!(fs::read_to_string(&config).expect("config"), "");
}

#[test]
fn failing_tool_does_not_abort_remaining_actions() {
    let machine = Machine::new();
    let interpreter = machine.write("brew/bin/python3.12", "");
    let cache = machine.mkdir(".mypy_cache");
    let plan = CleanupPlan::new(
        vec![
            RemovalAction {
                target_path: interpreter.clone(),
                category: RemovalCategory::SystemInterpreter,
                destructive: true,
                method: RemovalMethod::UninstallPackage {
                    manager: "brew".to_string(),
                    package: "python@3.12".to_string(),
                },
            },
            delete(cache.clone(), RemovalCategory::Cache),
        ],
        0,
    );

    let report = executor(&machine, idle_runner(), no_tools())
        .execute(&plan)
        .expect("execute");
    assert_eq!(
        report.results[0].outcome,
        ActionOutcome::Failed(ActionFailure::ExternalTool(ToolError::NotFound {
            program: "brew".to_string()
        }))
    );
    assert_eq!(report.results[1].outcome, ActionOutcome::Removed);
    assert!(interpreter.exists());
    assert!(!cache.exists());
    assert_eq!(report.failures().count(), 1);
}

#[test]
fn brew_owned_interpreters_are_uninstalled_by_formula() {
    let machine = Machine::new();
    let interpreter = machine.write("brew/bin/python3.12", "");
    let calls = Arc::new(Mutex::new(Vec::new()));
    let runner = recording_runner(Arc::clone(&calls), |_| Ok(ToolOutput::ok("Uninstalling python@3.12\n")));
    let locator: Arc<dyn ToolLocator> = Arc::new(|name: &str| -> Option<PathBuf> {
        (name == "brew").then(|| PathBuf::from("/opt/homebrew/bin/brew"))
    });
    let plan = CleanupPlan::new(
        vec![RemovalAction {
            target_path: interpreter,
            category: RemovalCategory::SystemInterpreter,
            destructive: true,
            method: RemovalMethod::UninstallPackage {
                manager: "brew".to_string(),
                package: "python@3.12".to_string(),
            },
        }],
        0,
    );

    let report = executor(&machine, runner, locator).execute(&plan).expect("execute");
    assert_eq!(report.results[0].outcome, ActionOutcome::Removed);
    let calls = calls.lock().expect("calls lock");
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].program, PathBuf::from("/opt/homebrew/bin/brew"));
    assert_eq!(calls[0].args, vec!["uninstall".to_string(), "python@3.12".to_string()]);
}

#[test]
fn managed_versions_are_uninstalled_through_pyenv() {
    let machine = Machine::new();
    let root = machine.home.join(".pyenv");
    machine.write(".pyenv/bin/pyenv", "#!/bin/sh\n");
    let version_dir = machine.mkdir(".pyenv/versions/3.9.18");
    let calls = Arc::new(Mutex::new(Vec::new()));
    let runner = recording_runner(Arc::clone(&calls), |_| Ok(ToolOutput::ok("")));
    let plan = CleanupPlan::new(
        vec![RemovalAction {
            target_path: version_dir,
            category: RemovalCategory::VersionManagerRoot,
            destructive: true,
            method: RemovalMethod::UninstallVersion {
                version: "3.9.18".to_string(),
            },
        }],
        0,
    );

    let report = executor(&machine, runner, no_tools()).execute(&plan).expect("execute");
    assert_eq!(report.results[0].outcome, ActionOutcome::Removed);
    let calls = calls.lock().expect("calls lock");
    assert_eq!(calls[0].program, root.join("bin").join("pyenv"));
    assert_eq!(
        calls[0].args,
        vec!["uninstall".to_string(), "-f".to_string(), "3.9.18".to_string()]
    );
    assert!(calls[0]
        .envs
        .contains(&("PYENV_ROOT".to_string(), root.display().to_string())));
}

#[test]
fn version_directory_is_deleted_when_pyenv_is_unavailable() {
    let machine = Machine::new();
    let version_dir = machine.mkdir(".pyenv/versions/3.10.13");
    let plan = CleanupPlan::new(
        vec![RemovalAction {
            target_path: version_dir.clone(),
            category: RemovalCategory::VersionManagerRoot,
            destructive: true,
            method: RemovalMethod::UninstallVersion {
                version: "3.10.13".to_string(),
            },
        }],
        0,
    );
    let report = executor(&machine, idle_runner(), no_tools())
        .execute(&plan)
        .expect("execute");
    assert_eq!(report.results[0].outcome, ActionOutcome::Removed);
    assert!(!version_dir.exists());
}

#[test]
fn shell_config_strip_preserves_unrelated_bytes() {
    let machine = Machine::new();
    let original = format!(
        "alias ll='ls -l'\r\nexport PYENV_ROOT=\"$HOME/.pyenv\"\r\n{MANAGED_BLOCK_START}\r\neval \"$(pyenv init -)\"\r\n{MANAGED_BLOCK_END}\r\n  # keep me  \r\nexport EDITOR=vim"
    );
    let config = machine.write(".bashrc", &original);
    let strip = |keep_managed_block| {
        CleanupPlan::new(
            vec![RemovalAction {
                target_path: config.clone(),
                category: RemovalCategory::ShellConfig,
                destructive: false,
                method: RemovalMethod::StripShellConfig { keep_managed_block },
            }],
            0,
        )
    };
    let executor = executor(&machine, idle_runner(), no_tools());

    let report = executor.execute(&strip(true)).expect("execute");
    assert_eq!(report.results[0].outcome, ActionOutcome::Removed);
    assert_eq!(
        fs::read_to_string(&config).expect("config"),
        format!(
            "alias ll='ls -l'\r\n{MANAGED_BLOCK_START}\r\neval \"$(pyenv init -)\"\r\n{MANAGED_BLOCK_END}\r\n  # keep me  \r\nexport EDITOR=vim"
        )
    );

    let report = executor.execute(&strip(true)).expect("execute");
    assert!(matches!(report.results[0].outcome, ActionOutcome::Skipped(_)));

    executor.execute(&strip(false)).expect("execute");
    assert_eq!(
        fs::read_to_string(&config).expect("config"),
        "alias ll='ls -l'\r\n  # keep me  \r\nexport EDITOR=vim"
    );
}

#[cfg(unix)]
#[test]
fn shell_config_strip_follows_symlinks() {
    let machine = Machine::new();
    let real = machine.write("dotfiles/bashrc", "export PYENV_ROOT=x\nexport EDITOR=vim\n");
    let link = machine.home.join(".bashrc");
    std::os::unix::fs::symlink(&real, &link).expect("symlink");
    let plan = CleanupPlan::new(
        vec![RemovalAction {
            target_path: link.clone(),
            category: RemovalCategory::ShellConfig,
            destructive: false,
            method: RemovalMethod::StripShellConfig {
                keep_managed_block: false,
            },
        }],
        0,
    );

    executor(&machine, idle_runner(), no_tools())
        .execute(&plan)
        .expect("execute");
    assert!(fs::symlink_metadata(&link).expect("link").file_type().is_symlink());
    assert_eq!(fs::read_to_string(&real).expect("real"), "export EDITOR=vim\n");
}

#[test]
fn cancellation_skips_actions_that_have_not_started() {
    let machine = Machine::new();
    let first = machine.mkdir(".venvs/a");
    let second = machine.mkdir(".venvs/b");
    let third = machine.mkdir(".cache/pip");
    let plan = CleanupPlan::new(
        vec![
            delete(first.clone(), RemovalCategory::VirtualEnv),
            delete(second.clone(), RemovalCategory::VirtualEnv),
            delete(third.clone(), RemovalCategory::Cache),
        ],
        0,
    );
    let cancelled = Arc::new(AtomicBool::new(false));
    let executor =
        executor(&machine, idle_runner(), no_tools()).with_cancel_flag(Arc::clone(&cancelled));

    let report = executor
        .execute_with_observer(&plan, |index, _| {
            if index == 0 {
                cancelled.store(true, Ordering::SeqCst);
            }
        })
        .expect("execute");

    let outcomes = report
        .results
        .iter()
        .map(|result| result.outcome.clone())
        .collect::<Vec<_>>();
    assert_eq!(
        outcomes,
        vec![
            ActionOutcome::Removed,
            ActionOutcome::Skipped(CANCELLED_REASON.to_string()),
            ActionOutcome::Skipped(CANCELLED_REASON.to_string()),
        ]
    );
    assert!(!first.exists());
    assert!(second.exists() && third.exists());
}

#[test]
fn unsafe_plans_are_rejected_before_anything_is_removed() {
    let machine = Machine::new();
    let venv = machine.mkdir(".venvs/demo");
    let executor = executor(&machine, idle_runner(), no_tools());

    for unsafe_target in [machine.home.clone(), PathBuf::from("relative/venv")] {
        let plan = CleanupPlan::new(
            vec![
                delete(venv.clone(), RemovalCategory::VirtualEnv),
                delete(unsafe_target, RemovalCategory::Cache),
            ],
            0,
        );
        assert!(executor.execute(&plan).is_err());
        assert!(venv.exists());
    }
}

#[test]
fn empty_plan_yields_empty_report() {
    let machine = Machine::new();
    let report = executor(&machine, idle_runner(), no_tools())
        .execute(&CleanupPlan::new(Vec::new(), 0))
        .expect("execute");
    assert!(report.is_empty());
    assert_eq!(report, CleanupReport::default());
}

#[test]
fn fresh_machine_gets_the_full_toolchain() {
    let machine = Machine::new();
    let config = machine.config();
    let calls = Arc::new(Mutex::new(Vec::new()));

    let report = installer(recording_runner(Arc::clone(&calls), simulated_toolchain)).install(&config);

    let steps = report
        .steps
        .iter()
        .map(|result| (result.step, matches!(result.outcome, StepOutcome::Changed(_))))
        .collect::<Vec<_>>();
    assert_eq!(
        steps,
        vec![
            (InstallStep::VersionManager, true),
            (InstallStep::PackageManager, true),
            (InstallStep::Interpreter, true),
            (InstallStep::GlobalVersion, true),
            (InstallStep::ShellConfig, true),
            (InstallStep::VenvRoot, true),
        ]
    );
    assert!(!report.has_failures());
    assert!(config.version_manager_root.join("versions").join("3.11.7").is_dir());
    assert_eq!(
        fs::read_to_string(config.version_manager_root.join("version")).expect("global"),
        "3.11.7\n"
    );
    assert!(config.package_manager_bin.is_file());
    assert!(config.venv_root.is_dir());

    let bashrc = fs::read_to_string(machine.home.join(".bashrc")).expect("bashrc");
    assert!(bashrc.starts_with(MANAGED_BLOCK_START));
    assert!(bashrc.contains("eval \"$(pyenv init -)\""));
    assert!(!machine.home.join(".zshrc").exists());

    let calls = calls.lock().expect("calls lock");
    let uv_install = calls
        .iter()
        .find(|call| env_path(call, "UV_INSTALL_DIR").is_some())
        .expect("uv installer ran");
    assert_eq!(
        env_path(uv_install, "UV_INSTALL_DIR"),
        config.package_manager_bin.parent().map(Path::to_path_buf)
    );
    assert!(uv_install
        .envs
        .contains(&("UV_NO_MODIFY_PATH".to_string(), "1".to_string())));
}

#[test]
fn second_install_changes_nothing() {
    let machine = Machine::new();
    let config = machine.config();
    machine.write(".zshrc", "setopt autocd\n");
    let first = installer(Arc::new(simulated_toolchain)).install(&config);
    assert!(!first.has_failures());

    let before = tree_state(&machine.home);
    let calls = Arc::new(Mutex::new(Vec::new()));
    let second = installer(recording_runner(Arc::clone(&calls), simulated_toolchain)).install(&config);

    assert!(second.all_satisfied(), "{second:#?}");
    assert_eq!(second.changed().count(), 0);
    assert_eq!(tree_state(&machine.home), before);
    let mutating = calls
        .lock()
        .expect("calls lock")
        .iter()
        .filter(|call| call.program_name() == "sh" || call.args.first().map(String::as_str) == Some("install"))
        .count();
    assert_eq!(mutating, 0);
}

#[test]
fn existing_block_is_refreshed_in_place_without_touching_other_lines() {
    let machine = Machine::new();
    let config = machine.config();
    let unrelated = (1..=10)
        .map(|n| format!("export VAR_{n}=value{n}\n"))
        .collect::<Vec<_>>();
    let mut original = unrelated[..5].concat();
    original.push_str(&format!(
        "{MANAGED_BLOCK_START}\nexport STALE_SETTING=1\n{MANAGED_BLOCK_END}\n"
    ));
    original.push_str(&unrelated[5..].concat());
    let bashrc = machine.write(".bashrc", &original);

    installer(Arc::new(simulated_toolchain)).install(&config);
    let updated = fs::read_to_string(&bashrc).expect("bashrc");

    let block_start = updated.find(MANAGED_BLOCK_START).expect("block");
    let block_end = updated.find(MANAGED_BLOCK_END).expect("block end") + MANAGED_BLOCK_END.len() + 1;
    assert_eq!(&updated[..block_start], unrelated[..5].concat());
    assert_eq!(&updated[block_end..], unrelated[5..].concat());
    assert_eq!(updated.matches(MANAGED_BLOCK_START).count(), 1);
    assert!(!updated.contains("STALE_SETTING"));
    assert!(updated[block_start..block_end].contains("export PYENV_ROOT="));
}

#[test]
fn version_manager_failure_skips_dependent_steps() {
    let machine = Machine::new();
    let config = machine.config();
    let runner: Arc<dyn CommandRunner> =
        Arc::new(|invocation: &Invocation| -> Result<ToolOutput, ToolError> {
            if env_path(invocation, "PYENV_ROOT").is_some() {
                return Ok(ToolOutput::failed("exit status: 1", "git is required"));
            }
            simulated_toolchain(invocation)
        });

    let report = installer(runner).install(&config);
    assert!(matches!(
        report.outcome(InstallStep::VersionManager),
        Some(StepOutcome::Failed(reason)) if reason.contains("git is required")
    ));
    assert!(matches!(
        report.outcome(InstallStep::PackageManager),
        Some(StepOutcome::Changed(_))
    ));
    assert!(matches!(
        report.outcome(InstallStep::Interpreter),
        Some(StepOutcome::Skipped(_))
    ));
    assert!(matches!(
        report.outcome(InstallStep::GlobalVersion),
        Some(StepOutcome::Skipped(_))
    ));
    assert!(config.venv_root.is_dir());
}

#[test]
fn download_failure_is_recorded_against_the_step() {
    let machine = Machine::new();
    let config = machine.config();
    let fetcher: Arc<dyn ScriptFetcher> = Arc::new(|url: &str| -> anyhow::Result<Vec<u8>> {
        Err(anyhow::anyhow!("failed to download installer from {url}"))
    });
    let installer = StackInstaller::new(
        Toolbox::new(Arc::new(simulated_toolchain), no_tools(), OsTag::Linux),
        fetcher,
    );

    let report = installer.install(&config);
    assert!(matches!(
        report.outcome(InstallStep::VersionManager),
        Some(StepOutcome::Failed(reason)) if reason.contains("https://pyenv.run")
    ));
    assert!(matches!(
        report.outcome(InstallStep::PackageManager),
        Some(StepOutcome::Failed(_))
    ));
}

#[test]
fn already_installed_interpreter_counts_as_satisfied() {
    let machine = Machine::new();
    let config = machine.config();
    machine.write(".pyenv/bin/pyenv", "#!/bin/sh\n");
    fs::create_dir_all(config.version_manager_root.join("versions").join("3.11.7"))
        .expect("version");
    let runner: Arc<dyn CommandRunner> =
        Arc::new(|invocation: &Invocation| -> Result<ToolOutput, ToolError> {
            match invocation.args.first().map(String::as_str) {
                Some("versions") => Ok(ToolOutput::ok("")),
                Some("install") => Ok(ToolOutput::failed(
                    "exit status: 1",
                    "pyenv: /home/dev/.pyenv/versions/3.11.7 already exists",
                )),
                _ => simulated_toolchain(invocation),
            }
        });

    let report = installer(runner).install(&config);
    assert_eq!(
        report.outcome(InstallStep::Interpreter),
        Some(&StepOutcome::AlreadySatisfied)
    );
    assert!(matches!(
        report.outcome(InstallStep::GlobalVersion),
        Some(StepOutcome::Changed(_))
    ));
}
