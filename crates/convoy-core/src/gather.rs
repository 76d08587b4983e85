//! Release-candidate gathering.
//!
//! One candidate is gathered per release unit: each independent package on
//! its own, then every workspace-versioned member together as the grouped
//! unit. Gathering inspects history since the unit's baseline tag, decides
//! the bump, and pre-renders the changelog section, but mutates nothing.

use camino::Utf8Path;
use semver::Version;
use tracing::{debug, info};

use crate::changelog::{self, ChangelogError};
use crate::commit::{self, Commit, CommitError};
use crate::context::WorkspaceContext;
use crate::git::{self, GitError};
use crate::matchlist::{self, Matchlist, MatchlistError};
use crate::semver_check::{self, CompatError};
use crate::version::{self, VersionError};
use crate::workspace::{Package, Workspace};

/// Errors from candidate gathering.
#[derive(thiserror::Error, Debug)]
pub enum GatherError {
    /// Git history access failed.
    #[error(transparent)]
    Git(#[from] GitError),

    /// A commit subject could not be classified.
    #[error(transparent)]
    Commit(#[from] CommitError),

    /// A tag version failed to parse.
    #[error(transparent)]
    Version(#[from] VersionError),

    /// A matchlist entry failed to compile.
    #[error(transparent)]
    Matchlist(#[from] MatchlistError),

    /// The compatibility checker failed to run.
    #[error(transparent)]
    Compat(#[from] CompatError),

    /// Changelog generation failed.
    #[error(transparent)]
    Changelog(#[from] ChangelogError),

    /// No previous release tag exists for a unit, so there is no baseline.
    #[error("no previous release tag found for {unit}")]
    NoBaselineTag {
        /// Release unit name.
        unit: String,
    },
}

/// Result alias for gathering.
pub type GatherResult<T> = Result<T, GatherError>;

/// One release unit with everything decided about its next release.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ReleaseCandidate {
    /// Members released by this unit. One package when independent,
    /// every workspace-versioned member otherwise.
    pub packages: Vec<Package>,
    /// Whether this unit tags and versions on its own stream.
    pub independent: bool,
    /// Tag prefix before the `v`: the package name plus `-` when
    /// independent, empty for the grouped unit.
    pub tag_prefix: String,
    /// The tag the bump was computed against. May come from the bare `v`
    /// stream when an independent package has never been tagged.
    pub baseline_tag: String,
    /// Version released by `baseline_tag`.
    pub prev_version: Version,
    /// Version this release would publish.
    pub next_version: Version,
    /// Classified commits attributed to this unit since the baseline.
    pub commits: Vec<Commit>,
    /// Pre-rendered changelog section for `next_version`.
    pub changelog: String,
    /// Whether release-relevant files changed (or a dependency cascaded).
    pub should_release: bool,
    /// Whether any attributed commit is a `feat`.
    pub has_feature: bool,
    /// Whether any attributed commit carries the `!` marker.
    pub has_breaking_commit: bool,
    /// Whether `cargo semver-checks` reported API breakage.
    pub breaking_api: bool,
    /// Set when dependency propagation forced `should_release`.
    pub cascaded: bool,
}

impl ReleaseCandidate {
    /// Display name: the package name, or `workspace` for the grouped unit.
    pub fn name(&self) -> &str {
        if self.independent {
            &self.packages[0].name
        } else {
            "workspace"
        }
    }

    /// The tag this unit's previous release carries on its own stream.
    pub fn prev_tag(&self) -> String {
        format!("{}v{}", self.tag_prefix, self.prev_version)
    }

    /// The tag this release would create.
    pub fn next_tag(&self) -> String {
        format!("{}v{}", self.tag_prefix, self.next_version)
    }

    /// Whether the bump moved the version at all.
    pub fn changed(&self) -> bool {
        self.prev_version != self.next_version
    }

    /// Whether this release is breaking for any reason.
    pub fn breaking(&self) -> bool {
        self.has_breaking_commit || self.breaking_api
    }

    /// Human-readable breaking verdict for plan output.
    pub fn breaking_reason(&self) -> &'static str {
        if self.has_breaking_commit {
            "yes (breaking commit)"
        } else if self.breaking_api {
            "yes (cargo semver-checks failed)"
        } else {
            "no"
        }
    }

    /// CHANGELOG.md location: the package's own for independent units, the
    /// workspace root's for the grouped unit.
    pub fn changelog_path(&self, ctx: &WorkspaceContext) -> camino::Utf8PathBuf {
        if self.independent {
            self.packages[0].changelog(ctx)
        } else {
            ctx.root().join("CHANGELOG.md")
        }
    }
}

/// Gather candidates for every release unit in the workspace.
///
/// The grouped candidate is skipped entirely when no member shares the
/// workspace version.
pub fn gather_all(ctx: &WorkspaceContext, workspace: &Workspace) -> GatherResult<Vec<ReleaseCandidate>> {
    let independent = workspace.independent();
    let grouped = workspace.grouped();

    let mut candidates = Vec::with_capacity(independent.len() + 1);
    for package in &independent {
        candidates.push(gather_independent(ctx, package, &independent)?);
    }
    if !grouped.is_empty() {
        candidates.push(gather_grouped(ctx, &grouped, &independent)?);
    }
    Ok(candidates)
}

/// Gather the candidate for one independently-versioned package.
pub fn gather_independent(
    ctx: &WorkspaceContext,
    package: &Package,
    independent: &[&Package],
) -> GatherResult<ReleaseCandidate> {
    let tag_prefix = format!("{}-", package.name);
    let (baseline_tag, prev_version) = baseline(ctx, &tag_prefix, &package.name)?;

    let log = git::commits_since(ctx, &baseline_tag)?;
    let commits = classify(log)?;
    let commits = commit::filter_by_paths(commits, &[package.path.as_path()], false);

    let matchlist = Matchlist::new(matchlist::independent_entries())?;
    let should_release = relevant_change(&commits, &matchlist, Some(&package.path));

    let compat = semver_check::check_compat(ctx, &baseline_tag, Some(&package.name))?;
    let candidate = decide(
        vec![package.clone()],
        true,
        tag_prefix,
        baseline_tag,
        prev_version,
        commits,
        should_release,
        compat.breaking,
    );

    let changelog = changelog::unreleased_section(
        ctx,
        Some(package),
        independent,
        &candidate.next_version,
    )?;
    info!(
        unit = candidate.name(),
        next = %candidate.next_version,
        release = candidate.should_release,
        "gathered"
    );
    Ok(ReleaseCandidate { changelog, ..candidate })
}

/// Gather the candidate for the grouped (workspace-versioned) unit.
pub fn gather_grouped(
    ctx: &WorkspaceContext,
    grouped: &[&Package],
    independent: &[&Package],
) -> GatherResult<ReleaseCandidate> {
    let (baseline_tag, prev_version) = baseline(ctx, "", "workspace")?;

    let log = git::commits_since(ctx, &baseline_tag)?;
    let commits = classify(log)?;
    let claimed: Vec<&Utf8Path> = independent.iter().map(|p| p.path.as_path()).collect();
    let commits = commit::filter_by_paths(commits, &claimed, true);

    let matchlist = Matchlist::new(matchlist::grouped_entries(
        independent,
        &ctx.config.workspace_globs,
    ))?;
    let should_release = relevant_change(&commits, &matchlist, None);

    let compat = semver_check::check_compat(ctx, &baseline_tag, None)?;
    let candidate = decide(
        grouped.iter().map(|p| (*p).clone()).collect(),
        false,
        String::new(),
        baseline_tag,
        prev_version,
        commits,
        should_release,
        compat.breaking,
    );

    let changelog =
        changelog::unreleased_section(ctx, None, independent, &candidate.next_version)?;
    info!(
        unit = candidate.name(),
        next = %candidate.next_version,
        release = candidate.should_release,
        "gathered"
    );
    Ok(ReleaseCandidate { changelog, ..candidate })
}

/// Pure bump decision from already-collected facts.
///
/// `changelog` is left empty; callers fill it after the version is known.
#[allow(clippy::too_many_arguments)]
fn decide(
    packages: Vec<Package>,
    independent: bool,
    tag_prefix: String,
    baseline_tag: String,
    prev_version: Version,
    commits: Vec<Commit>,
    should_release: bool,
    breaking_api: bool,
) -> ReleaseCandidate {
    let has_feature = commits.iter().any(|c| c.kind == "feat");
    let has_breaking_commit = commits.iter().any(|c| c.breaking);
    let next_version = version::bumped(
        &prev_version,
        has_feature,
        has_breaking_commit || breaking_api,
    );

    ReleaseCandidate {
        packages,
        independent,
        tag_prefix,
        baseline_tag,
        prev_version,
        next_version,
        commits,
        changelog: String::new(),
        should_release,
        has_feature,
        has_breaking_commit,
        breaking_api,
        cascaded: false,
    }
}

/// Resolve the baseline tag and version for a unit.
///
/// Independent streams fall back to the bare `v` stream when the package
/// has never been tagged under its own prefix.
fn baseline(
    ctx: &WorkspaceContext,
    tag_prefix: &str,
    unit: &str,
) -> GatherResult<(String, Version)> {
    let own = format!("{tag_prefix}v");
    let (tag, prefix) = match git::latest_tag(ctx, &own)? {
        Some(tag) => (Some(tag), own),
        None if !tag_prefix.is_empty() => {
            debug!(unit, "no prefixed tag, falling back to bare stream");
            (git::latest_tag(ctx, "v")?, "v".to_string())
        }
        None => (None, own),
    };
    let tag = tag.ok_or_else(|| GatherError::NoBaselineTag {
        unit: unit.to_string(),
    })?;
    let prev = version::parse_version(&tag[prefix.len()..])?;
    Ok((tag, prev))
}

fn classify(log: Vec<git::LogEntry>) -> GatherResult<Vec<Commit>> {
    log.into_iter()
        .map(|entry| Commit::parse(entry.sha, &entry.subject, entry.files).map_err(Into::into))
        .collect()
}

/// Whether any touched file makes this unit releasable.
///
/// `scope` restricts consideration to files under one directory, which is
/// how an independent package ignores changes elsewhere in the repository.
fn relevant_change(commits: &[Commit], matchlist: &Matchlist, scope: Option<&Utf8Path>) -> bool {
    commits
        .iter()
        .flat_map(|c| c.files.iter())
        .filter(|file| scope.is_none_or(|dir| Utf8Path::new(file).starts_with(dir)))
        .any(|file| matchlist.is_relevant(file))
}
