//! API-compatibility checks via `cargo semver-checks`.
//!
//! The check runs against the last released baseline and is advisory for
//! bump selection: a breaking verdict upgrades the bump, it never blocks a
//! release on its own.

use std::process::Command;

use tracing::debug;

use crate::context::WorkspaceContext;

/// Errors from running the compatibility checker.
#[derive(thiserror::Error, Debug)]
pub enum CompatError {
    /// Failed to spawn `cargo semver-checks`.
    #[error("failed to execute cargo semver-checks: {0}")]
    Exec(#[from] std::io::Error),
}

/// Result alias for compatibility checks.
pub type CompatResult<T> = Result<T, CompatError>;

/// Verdict of one compatibility check.
#[derive(Debug, Clone)]
pub struct CompatReport {
    /// Whether the checker reported API breakage (nonzero exit).
    pub breaking: bool,
    /// Combined stdout and stderr, for surfacing on breakage.
    pub output: String,
}

/// Check the current tree against the baseline git revision.
///
/// `package` narrows the check to one workspace member; `None` checks the
/// whole workspace (the grouped unit).
pub fn check_compat(
    ctx: &WorkspaceContext,
    baseline: &str,
    package: Option<&str>,
) -> CompatResult<CompatReport> {
    let mut cmd = Command::new("cargo");
    cmd.args(["semver-checks", "--baseline-rev", baseline]);
    if let Some(name) = package {
        cmd.args(["--package", name]);
    }
    debug!(baseline, package, "semver-checks");

    let output = cmd.current_dir(ctx.root()).output()?;
    let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
    combined.push_str(&String::from_utf8_lossy(&output.stderr));

    Ok(CompatReport {
        breaking: !output.status.success(),
        output: combined,
    })
}
