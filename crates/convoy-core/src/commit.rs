//! Conventional-commit subject classification.
//!
//! Subjects must match `type(scope)!: subject`, with scope and the breaking
//! `!` marker optional. A subject outside that grammar is a hard error —
//! convoy assumes every commit since the last release tag is conventionally
//! formatted, so an unparseable subject means the history is not releasable
//! as-is. Breaking changes are recognized by the `!` marker only; the
//! `BREAKING CHANGE:` body footer is intentionally not inspected.

use camino::Utf8Path;
use serde::Serialize;
use thiserror::Error;

/// Errors from commit classification.
#[derive(Error, Debug)]
pub enum CommitError {
    /// Subject line does not follow the conventional-commit grammar.
    #[error("unconventional commit subject ({sha}): {subject:?}")]
    BadSubject {
        /// Offending commit.
        sha: String,
        /// The raw subject line.
        subject: String,
    },
}

/// Result alias for commit classification.
pub type CommitResult<T> = Result<T, CommitError>;

/// One commit since the last release tag, classified.
#[derive(Debug, Clone, Serialize)]
pub struct Commit {
    /// Full commit SHA.
    pub sha: String,
    /// Conventional-commit type (e.g., `feat`, `fix`).
    pub kind: String,
    /// Optional scope from `type(scope): …`.
    pub scope: Option<String>,
    /// Whether the `!` breaking marker is present.
    pub breaking: bool,
    /// Subject text after the `: ` separator.
    pub subject: String,
    /// The unparsed subject line.
    pub raw_subject: String,
    /// Repository-relative paths touched by this commit.
    pub files: Vec<String>,
}

impl Commit {
    /// Classify a raw subject line into a [`Commit`].
    pub fn parse(sha: impl Into<String>, raw_subject: &str, files: Vec<String>) -> CommitResult<Self> {
        let sha = sha.into();
        let bad = |sha: &str| CommitError::BadSubject {
            sha: sha.to_string(),
            subject: raw_subject.to_string(),
        };

        // type(scope)!: subject
        let (head, subject) = raw_subject.split_once(": ").ok_or_else(|| bad(&sha))?;
        let (head, breaking) = match head.strip_suffix('!') {
            Some(rest) => (rest, true),
            None => (head, false),
        };
        let (kind, scope) = match head.split_once('(') {
            Some((kind, rest)) => {
                let scope = rest.strip_suffix(')').ok_or_else(|| bad(&sha))?;
                (kind, Some(scope.to_string()))
            }
            None => (head, None),
        };
        if kind.is_empty() || kind.contains(' ') {
            return Err(bad(&sha));
        }

        Ok(Self {
            sha,
            kind: kind.to_string(),
            scope,
            breaking,
            subject: subject.to_string(),
            raw_subject: raw_subject.to_string(),
            files,
        })
    }

    /// Short SHA for display.
    pub fn short_sha(&self) -> &str {
        &self.sha[..self.sha.len().min(8)]
    }
}

/// Keep commits touching any of `paths` — or, with `invert`, commits
/// touching anything *outside* all of them.
///
/// The inverted form selects the grouped unit's commits: everything not
/// claimed by an independent package's path.
pub fn filter_by_paths(commits: Vec<Commit>, paths: &[&Utf8Path], invert: bool) -> Vec<Commit> {
    let file_matches = |file: &str| {
        let claimed = paths.iter().any(|p| Utf8Path::new(file).starts_with(p));
        if invert { !claimed } else { claimed }
    };

    commits
        .into_iter()
        .filter(|commit| commit.files.iter().any(|f| file_matches(f)))
        .collect()
}
