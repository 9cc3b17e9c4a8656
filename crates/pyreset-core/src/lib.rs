mod catalog;
mod collaborators;
mod error;
mod gate;
mod layout;
mod os;
mod plan;
mod shell_block;
mod snapshot;
mod toolchain;
mod version;

pub use catalog::{is_interpreter_file_name, CandidateLocation, Category, LocationKind, PathCatalog};
pub use collaborators::{InstallVersionOutcome, PackageManager, VersionManager};
pub use error::{ActionFailure, CommandError, ToolError};
pub use gate::{evaluate_response, prompt_text, ActionScope, Authorization, ConfirmationGate, ConsentSource};
pub use layout::{EnvOverrides, HostLayout};
pub use os::OsTag;
pub use plan::{
    CleanupPlan, CleanupScope, RemovalAction, RemovalCategory, RemovalMethod, RetainedToolchain,
};
pub use shell_block::{
    analyze_shell_config, strip_tool_lines, upsert_managed_block, ShellConfigScan, ShellFlavor,
    MANAGED_BLOCK_END, MANAGED_BLOCK_START, VERSION_MANAGER_TOKENS,
};
pub use snapshot::{
    CacheOwner, CacheRecord, EnvironmentSnapshot, InterpreterOrigin, InterpreterRecord, Requirement,
    ScanIssue, ScanIssueKind, ShellConfigRecord, VenvRecord,
};
pub use toolchain::ToolchainConfig;
pub use version::{parse_python_version, python_minor_series};

#[cfg(test)]
mod tests;
