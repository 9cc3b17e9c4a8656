use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::*;

fn fixture_layout() -> HostLayout {
    HostLayout::new("/home/dev").with_system_root("/")
}

fn windows_layout() -> HostLayout {
    HostLayout::new("/Users/dev").with_system_root("/c")
}

fn patterns(catalog: &PathCatalog, category: Category, os: OsTag) -> Vec<String> {
    catalog
        .candidate_locations(category, os)
        .iter()
        .map(CandidateLocation::display_pattern)
        .collect()
}

#[test]
fn linux_interpreter_locations_follow_declared_order() {
    let catalog = PathCatalog::new(fixture_layout());
    assert_eq!(
        patterns(&catalog, Category::Interpreter, OsTag::Linux),
        vec![
            "/usr/bin/python3*",
            "/usr/local/bin/python3*",
            "/home/dev/.local/bin/python3*",
            "/home/dev/.pyenv/versions/*/bin/python",
            "/home/dev/.local/share/uv/python/*/bin/python3",
        ]
    );
}

#[test]
fn macos_interpreter_locations_cover_homebrew_and_framework_installs() {
    let catalog = PathCatalog::new(fixture_layout());
    assert_eq!(
        patterns(&catalog, Category::Interpreter, OsTag::MacOs),
        vec![
            "/usr/bin/python3*",
            "/opt/homebrew/bin/python3*",
            "/usr/local/bin/python3*",
            "/Library/Frameworks/Python.framework/Versions/*/bin/python3",
            "/home/dev/.pyenv/versions/*/bin/python",
            "/home/dev/.local/share/uv/python/*/bin/python3",
        ]
    );
}

#[test]
fn windows_interpreter_locations_include_store_alias_and_pyenv_win() {
    let catalog = PathCatalog::new(windows_layout());
    let locations = catalog.candidate_locations(Category::Interpreter, OsTag::Windows);
    let rendered = locations
        .iter()
        .map(|location| location.display_pattern().replace('\\', "/"))
        .collect::<Vec<_>>();
    assert_eq!(
        rendered,
        vec![
            "/Users/dev/AppData/Local/Programs/Python/Python3*/python.exe",
            "/c/Program Files/Python3*/python.exe",
            "/c/Python3*/python.exe",
            "/Users/dev/AppData/Local/Microsoft/WindowsApps/python*.exe",
            "/Users/dev/.pyenv/pyenv-win/versions/*/python.exe",
            "/Users/dev/AppData/Roaming/uv/python/*/python.exe",
        ]
    );
    assert_eq!(
        locations[3].kind,
        LocationKind::Interpreter(InterpreterOrigin::StoreAlias)
    );
}

#[test]
fn cache_locations_respect_env_overrides() {
    let layout = fixture_layout().with_overrides(EnvOverrides {
        uv_cache_dir: Some(PathBuf::from("/scratch/uv")),
        pip_cache_dir: Some(PathBuf::from("/scratch/pip")),
        ..EnvOverrides::default()
    });
    let catalog = PathCatalog::new(layout);
    let caches = patterns(&catalog, Category::Cache, OsTag::Linux);
    assert_eq!(
        caches,
        vec![
            "/scratch/pip",
            "/scratch/uv",
            "/home/dev/.pyenv/cache",
            "/home/dev/.mypy_cache",
            "/home/dev/.pytest_cache",
        ]
    );
}

#[test]
fn every_os_enumerates_every_category() {
    let catalog = PathCatalog::new(fixture_layout());
    for os in [OsTag::Linux, OsTag::MacOs, OsTag::Windows] {
        for category in Category::ALL {
            assert!(
                !catalog.candidate_locations(category, os).is_empty(),
                "{os} has no locations for {category:?}"
            );
        }
    }
}

#[test]
fn macos_venv_roots_include_poetry_library_cache() {
    let catalog = PathCatalog::new(fixture_layout());
    let roots = patterns(&catalog, Category::VirtualEnvRoot, OsTag::MacOs);
    assert!(roots.contains(&"/home/dev/Library/Caches/pypoetry/virtualenvs/*".to_string()));
    assert!(roots.contains(&"/home/dev/.venvs/*".to_string()));
}

#[test]
fn interpreter_file_names_exclude_helper_binaries() {
    for name in ["python", "python3", "python3.11", "python3.7m"] {
        assert!(is_interpreter_file_name(name, OsTag::Linux), "{name}");
    }
    for name in ["python3-config", "python3.11-config", "python3.", "pythonw", "pip3"] {
        assert!(!is_interpreter_file_name(name, OsTag::Linux), "{name}");
    }
    assert!(is_interpreter_file_name("python.exe", OsTag::Windows));
    assert!(is_interpreter_file_name("python3.12.exe", OsTag::Windows));
    assert!(!is_interpreter_file_name("pythonw.exe", OsTag::Windows));
    assert!(!is_interpreter_file_name("python", OsTag::Windows));
}

#[test]
fn python_versions_parse_with_prerelease_tags() {
    assert_eq!(
        parse_python_version("3.11.7").map(|v| v.to_string()),
        Some("3.11.7".to_string())
    );
    assert_eq!(
        parse_python_version("3.12").map(|v| v.to_string()),
        Some("3.12.0".to_string())
    );
    assert_eq!(
        parse_python_version("3.13.0rc1").map(|v| v.to_string()),
        Some("3.13.0-rc1".to_string())
    );
    assert!(parse_python_version("system").is_none());
    assert!(parse_python_version("pypy3.10-7.3.15").is_none());
    assert_eq!(python_minor_series("3.11.7").as_deref(), Some("3.11"));
}

#[test]
fn scoped_consent_accepts_short_and_long_forms_case_insensitively() {
    let scope = ActionScope::scoped("Remove caches");
    for answer in ["y", "Y", "yes", "YES", " yes\n"] {
        assert_eq!(evaluate_response(&scope, answer), Authorization::Authorized);
    }
    for answer in ["", "n", "no", "yep"] {
        assert_eq!(evaluate_response(&scope, answer), Authorization::Denied);
    }
}

#[test]
fn nuclear_consent_requires_exact_lowercase_yes() {
    let scope = ActionScope::Nuclear;
    assert_eq!(evaluate_response(&scope, "yes\n"), Authorization::Authorized);
    for answer in ["y", "Y", "YES", "Yes", "yes please"] {
        assert_eq!(evaluate_response(&scope, answer), Authorization::Denied, "{answer}");
    }
}

#[test]
fn gate_asks_on_every_call_and_denies_closed_input() {
    let mut answers = vec![None, Some("y".to_string()), Some("n".to_string())];
    let mut prompts = Vec::new();
    let mut gate = ConfirmationGate::new(|prompt: &str| {
        prompts.push(prompt.to_string());
        answers.pop().flatten()
    });
    let scope = ActionScope::scoped("Remove caches");
    assert_eq!(gate.authorize(&scope), Authorization::Denied);
    assert_eq!(gate.authorize(&scope), Authorization::Authorized);
    assert_eq!(gate.authorize(&scope), Authorization::Denied);
    drop(gate);
    assert_eq!(prompts.len(), 3);
    assert!(prompts[0].contains("Remove caches"));
}

fn unrelated_lines() -> String {
    (1..=10)
        .map(|n| format!("export VAR_{n}=\"value {n}\"\n"))
        .collect()
}

#[test]
fn upsert_replaces_prior_block_and_preserves_unrelated_lines() {
    let prior = format!(
        "{}{}\nold line\n{}\n",
        &unrelated_lines()[..],
        MANAGED_BLOCK_START,
        MANAGED_BLOCK_END
    );
    let block = vec!["export PYENV_ROOT=\"/home/dev/.pyenv\"".to_string()];
    let updated = upsert_managed_block(&prior, &block);

    assert_eq!(
        updated,
        format!(
            "{}{}\nexport PYENV_ROOT=\"/home/dev/.pyenv\"\n{}\n",
            unrelated_lines(),
            MANAGED_BLOCK_START,
            MANAGED_BLOCK_END
        )
    );
    assert_eq!(upsert_managed_block(&updated, &block), updated);
    assert_eq!(updated.matches(MANAGED_BLOCK_START).count(), 1);
}

#[test]
fn upsert_keeps_block_position_and_crlf_endings() {
    let prior = format!(
        "alias ll='ls -l'\r\n{MANAGED_BLOCK_START}\r\nold\r\n{MANAGED_BLOCK_END}\r\nalias gs='git status'\r\n"
    );
    let updated = upsert_managed_block(&prior, &["new".to_string()]);
    assert_eq!(
        updated,
        format!(
            "alias ll='ls -l'\r\n{MANAGED_BLOCK_START}\r\nnew\r\n{MANAGED_BLOCK_END}\r\nalias gs='git status'\r\n"
        )
    );
}

#[test]
fn upsert_appends_block_after_unterminated_last_line() {
    let updated = upsert_managed_block("alias ll='ls -l'", &["x".to_string()]);
    assert_eq!(
        updated,
        format!("alias ll='ls -l'\n{MANAGED_BLOCK_START}\nx\n{MANAGED_BLOCK_END}\n")
    );
}

#[test]
fn upsert_collapses_duplicate_blocks_and_orphan_markers() {
    let prior = format!(
        "a\n{MANAGED_BLOCK_START}\none\n{MANAGED_BLOCK_END}\nb\n{MANAGED_BLOCK_START}\ntwo\n{MANAGED_BLOCK_END}\n{MANAGED_BLOCK_END}\nc\n"
    );
    let updated = upsert_managed_block(&prior, &["x".to_string()]);
    assert_eq!(
        updated,
        format!("a\n{MANAGED_BLOCK_START}\nx\n{MANAGED_BLOCK_END}\nb\nc\n")
    );
}

#[test]
fn unterminated_start_marker_does_not_swallow_following_lines() {
    let prior = format!("a\n{MANAGED_BLOCK_START}\nb\nc\n");
    assert_eq!(strip_tool_lines(&prior, false), "a\nb\nc\n");
}

#[test]
fn strip_removes_version_manager_lines_but_nothing_else() {
    let text = format!(
        "export EDITOR=vim\nexport PYENV_ROOT=\"$HOME/.pyenv\"\neval \"$(pyenv init -)\"\n# keep me\n{MANAGED_BLOCK_START}\neval \"$(pyenv init -)\"\n{MANAGED_BLOCK_END}\n"
    );
    let scan = analyze_shell_config(&text);
    assert_eq!(scan.foreign_lines, 2);
    assert!(scan.has_managed_block);

    assert_eq!(
        strip_tool_lines(&text, false),
        "export EDITOR=vim\n# keep me\n"
    );
    assert_eq!(
        strip_tool_lines(&text, true),
        format!(
            "export EDITOR=vim\n# keep me\n{MANAGED_BLOCK_START}\neval \"$(pyenv init -)\"\n{MANAGED_BLOCK_END}\n"
        )
    );
}

#[test]
fn strip_drops_guard_blocks_that_only_wrap_version_manager_lines() {
    let text = concat!(
        "export EDITOR=vim\n",
        "if command -v pyenv 1>/dev/null 2>&1; then\n",
        "  eval \"$(pyenv init -)\"\n",
        "fi\n",
        "if [ -f ~/.aliases ]; then\n",
        "  # shims\n",
        "  eval \"$(pyenv virtualenv-init -)\"\n",
        "fi\n",
        "alias ll='ls -l'\n",
    );

    assert_eq!(analyze_shell_config(text).foreign_lines, 7);
    assert_eq!(
        strip_tool_lines(text, false),
        "export EDITOR=vim\nalias ll='ls -l'\n"
    );
}

#[test]
fn strip_keeps_construct_keywords_around_unrelated_lines() {
    let text = concat!(
        "if command -v pyenv >/dev/null; then\n",
        "  export PATH=\"$HOME/bin:$PATH\"\n",
        "  eval \"$(pyenv init -)\"\n",
        "fi\n",
        "if [ -n \"$PS1\" ]; then\n",
        "    eval \"$(pyenv init -)\"\n",
        "else\n",
        "  echo quiet\n",
        "fi\n",
    );

    let stripped = strip_tool_lines(text, false);
    assert_eq!(
        stripped,
        concat!(
            "if command -v pyenv >/dev/null; then\n",
            "  export PATH=\"$HOME/bin:$PATH\"\n",
            "fi\n",
            "if [ -n \"$PS1\" ]; then\n",
            "    :\n",
            "else\n",
            "  echo quiet\n",
            "fi\n",
        )
    );
    assert_eq!(analyze_shell_config(text).foreign_lines, 2);
    assert_eq!(strip_tool_lines(&stripped, false), stripped);
    assert_eq!(analyze_shell_config(&stripped).foreign_lines, 0);
}

#[test]
fn shell_flavor_follows_extension() {
    assert_eq!(
        ShellFlavor::for_path(Path::new("profile.PS1")),
        ShellFlavor::PowerShell
    );
    assert_eq!(ShellFlavor::for_path(Path::new(".bashrc")), ShellFlavor::Posix);
}

#[test]
fn freeze_lines_parse_into_name_and_spec() {
    let parsed = Requirement::parse_freeze_output(
        "# comment\nrequests==2.31.0\n\n-e git+https://example.test/x.git#egg=x\nblack @ file:///tmp/black.whl\n--index-url https://pypi.org/simple\nurllib3>=2,<3\n",
    );
    assert_eq!(
        parsed,
        vec![
            Requirement {
                name: "requests".to_string(),
                version_spec: "==2.31.0".to_string()
            },
            Requirement {
                name: "git+https://example.test/x.git#egg=x".to_string(),
                version_spec: String::new()
            },
            Requirement {
                name: "black".to_string(),
                version_spec: "@ file:///tmp/black.whl".to_string()
            },
            Requirement {
                name: "urllib3".to_string(),
                version_spec: ">=2,<3".to_string()
            },
        ]
    );
    assert_eq!(parsed[0].to_string(), "requests==2.31.0");
}

fn sample_snapshot() -> EnvironmentSnapshot {
    let mut snapshot = EnvironmentSnapshot::empty(OsTag::Linux, 1_700_000_000);
    snapshot.interpreters = vec![
        InterpreterRecord::probed("/usr/bin/python3", "3.10.12", InterpreterOrigin::SystemPackage),
        InterpreterRecord::probed("/usr/local/bin/python3.12", "3.12.1", InterpreterOrigin::UserLocal),
        InterpreterRecord::probed(
            "/home/dev/.pyenv/versions/3.11.7/bin/python",
            "3.11.7",
            InterpreterOrigin::VersionManager,
        ),
        InterpreterRecord::probed(
            "/home/dev/.pyenv/versions/3.9.18/bin/python",
            "3.9.18",
            InterpreterOrigin::VersionManager,
        ),
        InterpreterRecord::unresponsive("/home/dev/.local/bin/python3"),
    ];
    snapshot.version_manager_root = Some(PathBuf::from("/home/dev/.pyenv"));
    snapshot.virtual_envs = vec![VenvRecord {
        root: PathBuf::from("/home/dev/.venvs/demo"),
        size_bytes: Some(10),
        python_version: Some("3.11.7".to_string()),
        packages: Vec::new(),
    }];
    snapshot.caches = vec![
        CacheRecord {
            path: PathBuf::from("/home/dev/.cache/pip"),
            owner: CacheOwner::PackageManagerCache,
            size_bytes: Some(5),
        },
        CacheRecord {
            path: PathBuf::from("/home/dev/.pyenv/cache"),
            owner: CacheOwner::VersionManagerCache,
            size_bytes: None,
        },
    ];
    snapshot.shell_configs = vec![
        ShellConfigRecord {
            path: PathBuf::from("/home/dev/.bashrc"),
            foreign_lines: 2,
            has_managed_block: false,
        },
        ShellConfigRecord {
            path: PathBuf::from("/home/dev/.zshrc"),
            foreign_lines: 0,
            has_managed_block: true,
        },
    ];
    snapshot
}

#[test]
fn full_plan_orders_categories_and_skips_nested_and_exempt_targets() {
    let snapshot = sample_snapshot();
    let plan = CleanupPlan::from_snapshot(&snapshot, &fixture_layout(), CleanupScope::All, None);
    let described = plan
        .ordered_actions()
        .iter()
        .map(|action| (action.category, action.target_path.display().to_string()))
        .collect::<Vec<_>>();
    assert_eq!(
        described,
        vec![
            (RemovalCategory::VirtualEnv, "/home/dev/.venvs/demo".to_string()),
            (RemovalCategory::VersionManagerRoot, "/home/dev/.pyenv".to_string()),
            (
                RemovalCategory::SystemInterpreter,
                "/usr/local/bin/python3.12".to_string()
            ),
            (RemovalCategory::Cache, "/home/dev/.cache/pip".to_string()),
            (RemovalCategory::ShellConfig, "/home/dev/.bashrc".to_string()),
            (RemovalCategory::ShellConfig, "/home/dev/.zshrc".to_string()),
        ]
    );
    assert!(plan.validate(&fixture_layout()).is_ok());
}

#[test]
fn retained_plan_uninstalls_only_unpinned_versions_and_keeps_managed_block() {
    let snapshot = sample_snapshot();
    let retain = RetainedToolchain {
        version_manager_root: PathBuf::from("/home/dev/.pyenv"),
        pinned_version: "3.11.7".to_string(),
    };
    let plan = CleanupPlan::from_snapshot(
        &snapshot,
        &fixture_layout(),
        CleanupScope::All,
        Some(&retain),
    );

    let vm_actions = &plan.by_category()[&RemovalCategory::VersionManagerRoot];
    assert_eq!(vm_actions.len(), 1);
    assert_eq!(
        vm_actions[0].method,
        RemovalMethod::UninstallVersion {
            version: "3.9.18".to_string()
        }
    );

    let shell_actions = &plan.by_category()[&RemovalCategory::ShellConfig];
    assert_eq!(shell_actions.len(), 1);
    assert_eq!(shell_actions[0].target_path, PathBuf::from("/home/dev/.bashrc"));
    assert_eq!(
        shell_actions[0].method,
        RemovalMethod::StripShellConfig {
            keep_managed_block: true
        }
    );
    assert!(plan
        .actions()
        .iter()
        .any(|action| action.target_path == Path::new("/home/dev/.pyenv/cache")));
}

#[test]
fn store_aliases_are_never_planned() {
    let mut snapshot = EnvironmentSnapshot::empty(OsTag::Windows, 0);
    snapshot.interpreters = vec![
        InterpreterRecord::probed(
            "/Users/dev/AppData/Local/Microsoft/WindowsApps/python.exe",
            "3.12.0",
            InterpreterOrigin::StoreAlias,
        ),
        InterpreterRecord::probed(
            "/Users/dev/AppData/Local/Programs/Python/Python311/python.exe",
            "3.11.7",
            InterpreterOrigin::UserLocal,
        ),
    ];
    let plan = CleanupPlan::from_snapshot(
        &snapshot,
        &windows_layout(),
        CleanupScope::SystemInterpreters,
        None,
    );
    assert_eq!(plan.len(), 1);
    assert_eq!(
        plan.actions()[0].target_path,
        PathBuf::from("/Users/dev/AppData/Local/Programs/Python/Python311")
    );
}

#[test]
fn macos_homebrew_interpreters_are_uninstalled_once_per_formula() {
    let mut snapshot = EnvironmentSnapshot::empty(OsTag::MacOs, 0);
    snapshot.interpreters = vec![
        InterpreterRecord::probed("/usr/bin/python3", "3.9.6", InterpreterOrigin::SystemPackage),
        InterpreterRecord::probed("/opt/homebrew/bin/python3", "3.12.1", InterpreterOrigin::SystemPackage),
        InterpreterRecord::probed("/opt/homebrew/bin/python3.12", "3.12.1", InterpreterOrigin::SystemPackage),
    ];
    let plan = CleanupPlan::from_snapshot(
        &snapshot,
        &fixture_layout(),
        CleanupScope::SystemInterpreters,
        None,
    );
    assert_eq!(plan.len(), 1);
    assert_eq!(
        plan.actions()[0].method,
        RemovalMethod::UninstallPackage {
            manager: "brew".to_string(),
            package: "python@3.12".to_string()
        }
    );
}

#[test]
fn packages_scope_covers_venvs_and_caches_only() {
    let plan = CleanupPlan::from_snapshot(
        &sample_snapshot(),
        &fixture_layout(),
        CleanupScope::Packages,
        None,
    );
    assert!(plan.actions().iter().all(|action| matches!(
        action.category,
        RemovalCategory::VirtualEnv | RemovalCategory::Cache
    )));
    assert_eq!(plan.len(), 3);
}

#[test]
fn clean_all_removes_uv_managed_interpreters_but_a_retained_reset_keeps_them() {
    let uv_python = "/home/dev/.local/share/uv/python/cpython-3.12.1-linux-x86_64-gnu";
    let mut snapshot = EnvironmentSnapshot::empty(OsTag::Linux, 0);
    snapshot.interpreters = vec![
        InterpreterRecord::probed(
            format!("{uv_python}/bin/python3"),
            "3.12.1",
            InterpreterOrigin::VersionManager,
        ),
        InterpreterRecord::probed(
            format!("{uv_python}/bin/python3.12"),
            "3.12.1",
            InterpreterOrigin::VersionManager,
        ),
    ];

    let plan = CleanupPlan::from_snapshot(&snapshot, &fixture_layout(), CleanupScope::All, None);
    assert_eq!(plan.len(), 1);
    assert_eq!(plan.actions()[0].target_path, PathBuf::from(uv_python));
    assert_eq!(plan.actions()[0].category, RemovalCategory::VersionManagerRoot);
    assert_eq!(plan.actions()[0].method, RemovalMethod::DeleteTree);
    assert!(plan.validate(&fixture_layout()).is_ok());

    let system_only = CleanupPlan::from_snapshot(
        &snapshot,
        &fixture_layout(),
        CleanupScope::SystemInterpreters,
        None,
    );
    assert!(system_only.is_empty());

    let retain = RetainedToolchain {
        version_manager_root: PathBuf::from("/home/dev/.pyenv"),
        pinned_version: "3.12.1".to_string(),
    };
    let retained = CleanupPlan::from_snapshot(
        &snapshot,
        &fixture_layout(),
        CleanupScope::All,
        Some(&retain),
    );
    assert!(retained.is_empty());
}

#[test]
fn validate_rejects_home_and_relative_targets() {
    let layout = fixture_layout();
    let home = CleanupPlan::new(
        vec![RemovalAction {
            target_path: PathBuf::from("/home/dev"),
            category: RemovalCategory::Cache,
            destructive: true,
            method: RemovalMethod::DeleteTree,
        }],
        0,
    );
    assert!(home.validate(&layout).is_err());

    let relative = CleanupPlan::new(
        vec![RemovalAction {
            target_path: PathBuf::from("venvs/demo"),
            category: RemovalCategory::VirtualEnv,
            destructive: true,
            method: RemovalMethod::DeleteTree,
        }],
        0,
    );
    assert!(relative.validate(&layout).is_err());
}

#[test]
fn io_errors_keep_permission_denied_distinct() {
    let target = Path::new("/home/dev/.cache/pip");
    let denied = std::io::Error::from(std::io::ErrorKind::PermissionDenied);
    let gone = std::io::Error::from(std::io::ErrorKind::NotFound);
    let other = std::io::Error::new(std::io::ErrorKind::Other, "disk on fire");

    assert_eq!(ScanIssue::from_io(target, &denied).kind, ScanIssueKind::PermissionDenied);
    assert!(matches!(
        ScanIssue::from_io(target, &other).kind,
        ScanIssueKind::Unreadable(message) if message.contains("disk on fire")
    ));
    assert_eq!(ScanIssue::from_io(target, &gone).path, target);

    assert_eq!(
        ActionFailure::from_io(target, &denied),
        ActionFailure::PermissionDenied {
            path: "/home/dev/.cache/pip".to_string()
        }
    );
    assert_eq!(
        ActionFailure::from_io(target, &gone),
        ActionFailure::Vanished {
            path: "/home/dev/.cache/pip".to_string()
        }
    );
    assert!(matches!(
        ActionFailure::from_io(target, &other),
        ActionFailure::Io { message, .. } if message == "disk on fire"
    ));
}

#[test]
fn snapshot_equivalence_ignores_set_order_and_capture_time() {
    let first = sample_snapshot();
    let mut second = sample_snapshot();
    second.captured_at_unix += 60;
    second.caches.reverse();
    second.shell_configs.reverse();
    assert!(first.equivalent(&second));

    second.interpreters.swap(0, 1);
    assert!(!first.equivalent(&second));
}

#[test]
fn toolchain_defaults_pin_known_good_interpreter() {
    let config = ToolchainConfig::defaults(&fixture_layout(), OsTag::Linux);
    assert_eq!(config.pinned_version, "3.11.7");
    assert_eq!(config.version_manager_root, PathBuf::from("/home/dev/.pyenv"));
    assert_eq!(config.package_manager_bin, PathBuf::from("/home/dev/.local/bin/uv"));
    assert_eq!(config.default_shell_config, PathBuf::from("/home/dev/.bashrc"));
    assert!(config.validate().is_ok());

    let lines = config.managed_shell_lines(ShellFlavor::Posix);
    assert_eq!(lines[0], "export PYENV_ROOT=\"/home/dev/.pyenv\"");
    assert!(lines.iter().any(|line| line.contains("pyenv init -")));
}

#[test]
fn toolchain_toml_overrides_merge_over_defaults() {
    let config = ToolchainConfig::from_toml_str(
        r#"
pinned_version = "3.12.1"
venv_root = "/data/venvs"
extra_shell_lines = ["alias py=python"]

[environment]
UV_CACHE_DIR = "/data/uv-cache"
"#,
        &fixture_layout(),
        OsTag::Linux,
    )
    .expect("must parse");
    assert_eq!(config.pinned_version, "3.12.1");
    assert_eq!(config.venv_root, PathBuf::from("/data/venvs"));
    let expected = BTreeMap::from([
        ("PYENV_ROOT".to_string(), "/home/dev/.pyenv".to_string()),
        ("UV_CACHE_DIR".to_string(), "/data/uv-cache".to_string()),
    ]);
    assert_eq!(config.environment, expected);
    assert_eq!(
        config.managed_shell_lines(ShellFlavor::Posix).last().map(String::as_str),
        Some("alias py=python")
    );
}

#[test]
fn toolchain_toml_rejects_unknown_keys_and_bad_versions() {
    let layout = fixture_layout();
    assert!(ToolchainConfig::from_toml_str("colour = \"red\"", &layout, OsTag::Linux).is_err());
    assert!(
        ToolchainConfig::from_toml_str("pinned_version = \"latest\"", &layout, OsTag::Linux)
            .is_err()
    );
}

#[test]
fn missing_config_file_yields_defaults() {
    let dir = tempfile::tempdir().expect("tempdir");
    let layout = HostLayout::new(dir.path());
    let config = ToolchainConfig::load_from(&dir.path().join("absent.toml"), &layout, OsTag::Linux)
        .expect("defaults");
    assert_eq!(config, ToolchainConfig::defaults(&layout, OsTag::Linux));
}
