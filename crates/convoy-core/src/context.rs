//! Workspace context — build once, pass everywhere.
//!
//! Every collaborator call (git, gh, cargo-semver-checks, git-cliff, file
//! rewrites) receives a [`WorkspaceContext`] instead of reading the current
//! working directory or other ambient process state. This keeps the release
//! engine deterministic for a given root and makes tests trivial to isolate.

use camino::{Utf8Path, Utf8PathBuf};

use crate::config::Config;

/// Shared context for a single release run.
#[derive(Debug, Clone)]
pub struct WorkspaceContext {
    /// Workspace root directory (absolute path).
    pub root: Utf8PathBuf,
    /// Loaded configuration.
    pub config: Config,
}

impl WorkspaceContext {
    /// Create a context rooted at `root` with the given configuration.
    pub fn new(root: impl Into<Utf8PathBuf>, config: Config) -> Self {
        Self {
            root: root.into(),
            config,
        }
    }

    /// Path to the workspace-level `Cargo.toml`.
    pub fn root_manifest(&self) -> Utf8PathBuf {
        self.root.join("Cargo.toml")
    }

    /// Workspace root as a path reference (convenience).
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_manifest_is_under_root() {
        let ctx = WorkspaceContext::new("/work/repo", Config::default());
        assert_eq!(ctx.root_manifest(), Utf8PathBuf::from("/work/repo/Cargo.toml"));
    }
}
