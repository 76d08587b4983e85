//! Release-relevance file filtering.
//!
//! A release unit only releases when at least one touched file matches its
//! matchlist. Entries are glob patterns; each entry matches both the bare
//! file name and a `*/`-prefixed form so `Cargo.toml` also hits
//! `gateway/Cargo.toml`. Entries prefixed with `!` are exclusions: a file
//! matching one is never release-relevant, even if a positive entry also
//! matches it.

use glob::Pattern;
use thiserror::Error;

use crate::workspace::Package;

/// Errors from matchlist construction.
#[derive(Error, Debug)]
pub enum MatchlistError {
    /// A glob entry failed to compile.
    #[error("invalid glob pattern `{pattern}`: {source}")]
    BadPattern {
        /// The offending entry (without the `!` prefix).
        pattern: String,
        /// Compilation failure detail.
        source: glob::PatternError,
    },
}

/// Result alias for matchlist operations.
pub type MatchlistResult<T> = Result<T, MatchlistError>;

/// Files that make an independent package releasable.
pub fn independent_entries() -> Vec<String> {
    vec!["*.rs".into(), "Cargo.toml".into()]
}

/// Files that make the grouped (workspace-versioned) unit releasable.
///
/// Extends the independent set with workspace-level infrastructure, any
/// configured extra globs, and an exclusion per independent package so files
/// claimed by those packages never trigger a workspace release.
pub fn grouped_entries(independent: &[&Package], extra: &[String]) -> Vec<String> {
    let mut entries = independent_entries();
    entries.extend(
        [".sqlx/*", "*.sql", "Cargo.lock", "compose.*.yml", "Dockerfile*"]
            .into_iter()
            .map(String::from),
    );
    entries.extend(extra.iter().cloned());
    entries.extend(independent.iter().map(|pkg| format!("!{}/**/*", pkg.path)));
    entries
}

/// A compiled matchlist: positive patterns plus exclusions.
#[derive(Debug)]
pub struct Matchlist {
    include: Vec<(Pattern, Pattern)>,
    exclude: Vec<(Pattern, Pattern)>,
}

impl Matchlist {
    /// Compile a list of glob entries, honoring the `!` exclusion prefix.
    pub fn new(entries: impl IntoIterator<Item = String>) -> MatchlistResult<Self> {
        let mut include = Vec::new();
        let mut exclude = Vec::new();

        for entry in entries {
            let (negated, pattern) = match entry.strip_prefix('!') {
                Some(rest) => (true, rest),
                None => (false, entry.as_str()),
            };
            let compiled = (
                compile(pattern)?,
                compile(&format!("*/{pattern}"))?,
            );
            if negated {
                exclude.push(compiled);
            } else {
                include.push(compiled);
            }
        }

        Ok(Self { include, exclude })
    }

    /// Whether `file` counts as release-relevant under this matchlist.
    pub fn is_relevant(&self, file: &str) -> bool {
        let hits = |(bare, nested): &(Pattern, Pattern)| bare.matches(file) || nested.matches(file);
        self.include.iter().any(hits) && !self.exclude.iter().any(hits)
    }
}

fn compile(pattern: &str) -> MatchlistResult<Pattern> {
    Pattern::new(pattern).map_err(|source| MatchlistError::BadPattern {
        pattern: pattern.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matchlist(entries: &[&str]) -> Matchlist {
        Matchlist::new(entries.iter().map(ToString::to_string)).unwrap()
    }

    #[test]
    fn bare_and_nested_forms_match() {
        let ml = matchlist(&["Cargo.toml", "*.rs"]);
        assert!(ml.is_relevant("Cargo.toml"));
        assert!(ml.is_relevant("gateway/Cargo.toml"));
        assert!(ml.is_relevant("gateway/src/main.rs"));
        assert!(!ml.is_relevant("README.md"));
    }

    #[test]
    fn negated_entry_excludes_even_on_positive_match() {
        let ml = matchlist(&["*.rs", "!gateway/**/*"]);
        assert!(ml.is_relevant("cache/src/lib.rs"));
        assert!(!ml.is_relevant("gateway/src/main.rs"));
    }

    #[test]
    fn infra_files_trigger_grouped_unit_only() {
        let ml = matchlist(&["Cargo.lock", "Dockerfile*", "compose.*.yml"]);
        assert!(ml.is_relevant("Cargo.lock"));
        assert!(ml.is_relevant("Dockerfile.gateway"));
        assert!(ml.is_relevant("compose.prod.yml"));
        assert!(!ml.is_relevant("docs/compose.md"));
    }

    #[test]
    fn bad_pattern_is_an_error() {
        let err = Matchlist::new(vec!["[".to_string()]);
        assert!(err.is_err());
    }

    #[test]
    fn grouped_entries_exclude_independent_paths() {
        use camino::Utf8PathBuf;
        use std::collections::BTreeSet;

        let pkg = Package {
            name: "gateway".into(),
            path: Utf8PathBuf::from("gateway"),
            independent: true,
            dependencies: BTreeSet::new(),
            lock_file: Utf8PathBuf::from("Cargo.lock"),
        };
        let entries = grouped_entries(&[&pkg], &[]);
        assert!(entries.contains(&"!gateway/**/*".to_string()));

        let ml = Matchlist::new(entries).unwrap();
        assert!(ml.is_relevant("shared/src/lib.rs"));
        assert!(!ml.is_relevant("gateway/src/main.rs"));
    }
}
