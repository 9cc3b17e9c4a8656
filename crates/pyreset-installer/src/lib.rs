mod cleanup;
mod fetch;
mod fs_utils;
mod install;

pub use cleanup::{
    ActionOutcome, ActionResult, CleanupExecutor, CleanupReport, OutcomeCounts, CANCELLED_REASON,
};
pub use fetch::{HttpFetcher, ScriptFetcher};
pub use install::{InstallReport, InstallStep, StackInstaller, StepOutcome, StepResult};

#[cfg(test)]
mod tests;
