//! Subprocess-backed git queries.
//!
//! Read-only history access goes through here: tag enumeration and commit
//! listing. Mutating git commands (add, commit, tag, push) are built as
//! [`crate::cmd::Invocation`]s by the release driver so dry runs can print
//! them verbatim.

use std::process::Command;

use semver::Version;
use tracing::debug;

use crate::context::WorkspaceContext;
use crate::version::{self, VersionError};

/// Errors from git queries.
#[derive(thiserror::Error, Debug)]
pub enum GitError {
    /// Failed to spawn the git binary.
    #[error("failed to execute git: {0}")]
    Exec(#[from] std::io::Error),

    /// git ran and exited nonzero.
    #[error("git {command} failed: {stderr}")]
    Command {
        /// The subcommand and arguments that failed.
        command: String,
        /// Trimmed stderr from git.
        stderr: String,
    },

    /// A tag matched the expected prefix but its version part did not parse.
    #[error("malformed version tag `{tag}`: {source}")]
    MalformedTag {
        /// The offending tag.
        tag: String,
        /// Parse failure detail.
        source: VersionError,
    },
}

/// Result alias for git operations.
pub type GitResult<T> = Result<T, GitError>;

/// One commit from `git log`, with the files it touched.
#[derive(Debug, Clone)]
pub struct LogEntry {
    /// Full commit hash.
    pub sha: String,
    /// First line of the commit message.
    pub subject: String,
    /// Paths touched by the commit, relative to the repository root.
    pub files: Vec<String>,
}

fn git(ctx: &WorkspaceContext, args: &[&str]) -> GitResult<String> {
    debug!(?args, "git");
    let output = Command::new("git")
        .args(args)
        .current_dir(ctx.root())
        .output()?;
    if !output.status.success() {
        return Err(GitError::Command {
            command: args.join(" "),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// List tags beginning with `prefix`.
pub fn tags_with_prefix(ctx: &WorkspaceContext, prefix: &str) -> GitResult<Vec<String>> {
    let out = git(ctx, &["tag", "--list", &format!("{prefix}*")])?;
    Ok(out.lines().map(str::to_string).collect())
}

/// Find the highest-versioned tag with the given prefix.
///
/// Every matching tag must carry a plain `MAJOR.MINOR.PATCH` after the
/// prefix; anything else is a hard error rather than silently skipped.
/// Returns `None` when no tag matches.
pub fn latest_tag(ctx: &WorkspaceContext, prefix: &str) -> GitResult<Option<String>> {
    let tags = tags_with_prefix(ctx, prefix)?;
    let mut versions: Vec<Version> = Vec::with_capacity(tags.len());
    for tag in &tags {
        let raw = &tag[prefix.len()..];
        let version = version::parse_version(raw)
            .map_err(|source| GitError::MalformedTag { tag: tag.clone(), source })?;
        versions.push(version);
    }
    Ok(version::latest(versions).map(|v| format!("{prefix}{v}")))
}

/// List commits in `since..HEAD`, newest first, with touched files.
pub fn commits_since(ctx: &WorkspaceContext, since: &str) -> GitResult<Vec<LogEntry>> {
    let log = git(ctx, &["log", "--format=%H %s", &format!("{since}..HEAD")])?;
    let mut entries = Vec::new();
    for line in log.lines() {
        let Some((sha, subject)) = line.split_once(' ') else {
            continue;
        };
        let files = git(
            ctx,
            &["diff-tree", "--no-commit-id", "--name-only", "-r", sha],
        )?;
        entries.push(LogEntry {
            sha: sha.to_string(),
            subject: subject.to_string(),
            files: files.lines().map(str::to_string).collect(),
        });
    }
    Ok(entries)
}
