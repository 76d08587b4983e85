//! Release execution.
//!
//! Takes a [`ReleasePlan`] and performs the releases in order: version
//! bumps, dependency pin updates, changelog writes, then one release commit
//! followed by tags, a push, and GitHub releases. Progress is reported
//! through a caller-supplied event callback so the core stays silent.
//!
//! In dry-run mode every filesystem write is skipped and every external
//! command is reported without being run. There is no rollback: a failing
//! step aborts immediately and leaves earlier steps in place.

use semver::Version;
use tracing::info;

use crate::changelog::{self, ChangelogError};
use crate::cmd::{CmdError, Invocation};
use crate::commit::Commit;
use crate::context::WorkspaceContext;
use crate::gather::ReleaseCandidate;
use crate::manifest::{self, ManifestError};
use crate::propagate::ReleasePlan;

/// Errors from release execution.
#[derive(thiserror::Error, Debug)]
pub enum ReleaseError {
    /// A manifest or lock file edit failed.
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    /// A changelog write failed.
    #[error(transparent)]
    Changelog(#[from] ChangelogError),

    /// An external command failed.
    #[error(transparent)]
    Cmd(#[from] CmdError),
}

/// Result alias for release execution.
pub type ReleaseResult<T> = Result<T, ReleaseError>;

/// Whether to mutate anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecuteMode {
    /// Report every step and command without performing it.
    DryRun,
    /// Perform the release.
    Execute,
}

impl ExecuteMode {
    /// Whether this mode performs the release.
    pub fn is_execute(self) -> bool {
        matches!(self, Self::Execute)
    }
}

/// Progress notifications emitted while executing a plan.
#[derive(Debug)]
pub enum ReleaseEvent {
    /// The plan is empty.
    NothingToRelease,

    /// Summary of one unit about to be released.
    Planned {
        /// Unit name.
        name: String,
        /// Version moving from.
        prev_version: Version,
        /// Version moving to.
        next_version: Version,
        /// Tag of the previous release on this unit's stream.
        prev_tag: String,
        /// Tag this release creates.
        next_tag: String,
        /// Whether a `feat` commit contributed to the bump.
        feature: bool,
        /// Human-readable breaking verdict.
        breaking: String,
        /// Whether this unit only releases because a dependency did.
        cascaded: bool,
        /// The commits attributed to this unit.
        commits: Vec<Commit>,
    },

    /// A phase of the release is starting.
    Step {
        /// Phase description.
        message: String,
    },

    /// One unit's version was bumped (or would be).
    VersionBumped {
        /// Unit name.
        name: String,
        /// Version moving from.
        prev_version: Version,
        /// Version moving to.
        next_version: Version,
    },

    /// An external command ran (or would run).
    Command {
        /// The rendered command line.
        line: String,
        /// False in dry-run mode.
        executed: bool,
    },
}

/// Execute (or dry-run) a release plan.
pub fn execute_plan(
    ctx: &WorkspaceContext,
    plan: &ReleasePlan,
    mode: ExecuteMode,
    on_event: &mut dyn FnMut(ReleaseEvent),
) -> ReleaseResult<()> {
    if plan.is_empty() {
        on_event(ReleaseEvent::NothingToRelease);
        return Ok(());
    }

    for candidate in &plan.releases {
        on_event(ReleaseEvent::Planned {
            name: candidate.name().to_string(),
            prev_version: candidate.prev_version.clone(),
            next_version: candidate.next_version.clone(),
            prev_tag: candidate.prev_tag(),
            next_tag: candidate.next_tag(),
            feature: candidate.has_feature,
            breaking: candidate.breaking_reason().to_string(),
            cascaded: candidate.cascaded,
            commits: candidate.commits.clone(),
        });
    }

    bump_versions(ctx, plan, mode, on_event)?;
    write_changelogs(ctx, plan, mode, on_event)?;
    commit_changes(ctx, plan, mode, on_event)?;
    tag_releases(ctx, plan, mode, on_event)?;
    push_release(ctx, plan, mode, on_event)?;
    create_github_releases(ctx, plan, mode, on_event)?;

    info!(releases = plan.releases.len(), dry_run = !mode.is_execute(), "release complete");
    Ok(())
}

fn bump_versions(
    ctx: &WorkspaceContext,
    plan: &ReleasePlan,
    mode: ExecuteMode,
    on_event: &mut dyn FnMut(ReleaseEvent),
) -> ReleaseResult<()> {
    on_event(ReleaseEvent::Step {
        message: "Bumping versions".into(),
    });

    // package name -> packages in the plan that depend on it
    let mut dependents: Vec<(&str, &crate::workspace::Package)> = Vec::new();
    for candidate in &plan.releases {
        for package in &candidate.packages {
            for dep in &package.dependencies {
                dependents.push((dep.as_str(), package));
            }
        }
    }

    for candidate in &plan.releases {
        on_event(ReleaseEvent::VersionBumped {
            name: candidate.name().to_string(),
            prev_version: candidate.prev_version.clone(),
            next_version: candidate.next_version.clone(),
        });
        if !mode.is_execute() {
            continue;
        }

        let version = &candidate.next_version;
        if candidate.independent {
            let package = &candidate.packages[0];
            manifest::set_package_version(&package.manifest(ctx), version)?;
            manifest::set_lock_version(&package.lock_file, &package.name, version)?;
        } else {
            manifest::set_workspace_version(&ctx.root_manifest(), version)?;
            for package in &candidate.packages {
                manifest::set_lock_version(&package.lock_file, &package.name, version)?;
            }
        }

        for package in &candidate.packages {
            for (dep, user) in &dependents {
                if *dep == package.name {
                    manifest::set_dependency_version(&user.manifest(ctx), dep, version)?;
                }
            }
        }
    }
    Ok(())
}

fn write_changelogs(
    ctx: &WorkspaceContext,
    plan: &ReleasePlan,
    mode: ExecuteMode,
    on_event: &mut dyn FnMut(ReleaseEvent),
) -> ReleaseResult<()> {
    on_event(ReleaseEvent::Step {
        message: "Writing changelogs".into(),
    });
    if !mode.is_execute() {
        return Ok(());
    }
    for candidate in &plan.releases {
        changelog::prepend_section(&candidate.changelog_path(ctx), &candidate.changelog)?;
    }
    Ok(())
}

fn commit_changes(
    ctx: &WorkspaceContext,
    plan: &ReleasePlan,
    mode: ExecuteMode,
    on_event: &mut dyn FnMut(ReleaseEvent),
) -> ReleaseResult<()> {
    on_event(ReleaseEvent::Step {
        message: "Committing changes".into(),
    });

    let add = Invocation::new(
        "git",
        [
            "add",
            "CHANGELOG.md",
            "*/CHANGELOG.md",
            "Cargo.lock",
            "Cargo.toml",
            "*/Cargo.toml",
        ]
        .map(String::from),
    );
    run(ctx, add, mode, on_event)?;

    // dependents first in the subject line, same as the push order is
    // dependency-first
    let message = format!(
        "release: {}",
        plan.releases
            .iter()
            .rev()
            .map(|c| format!("{} v{}", c.name(), c.next_version))
            .collect::<Vec<_>>()
            .join(", ")
    );
    let commit = Invocation::new(
        "git",
        ["commit", "--cleanup=verbatim", "--message", &message].map(String::from),
    );
    run(ctx, commit, mode, on_event)
}

fn tag_releases(
    ctx: &WorkspaceContext,
    plan: &ReleasePlan,
    mode: ExecuteMode,
    on_event: &mut dyn FnMut(ReleaseEvent),
) -> ReleaseResult<()> {
    on_event(ReleaseEvent::Step {
        message: "Tagging release".into(),
    });
    for candidate in &plan.releases {
        let tag = Invocation::new(
            "git",
            ["tag", "--cleanup=verbatim", "--file=-", &candidate.next_tag()].map(String::from),
        )
        .with_stdin(changelog::tag_notes(&candidate.changelog));
        run(ctx, tag, mode, on_event)?;
    }
    Ok(())
}

fn push_release(
    ctx: &WorkspaceContext,
    plan: &ReleasePlan,
    mode: ExecuteMode,
    on_event: &mut dyn FnMut(ReleaseEvent),
) -> ReleaseResult<()> {
    on_event(ReleaseEvent::Step {
        message: "Pushing release".into(),
    });
    let mut args = vec![
        "push".to_string(),
        ctx.config.remote.clone(),
        ctx.config.branch.clone(),
    ];
    args.extend(plan.releases.iter().map(ReleaseCandidate::next_tag));
    run(ctx, Invocation::new("git", args), mode, on_event)
}

fn create_github_releases(
    ctx: &WorkspaceContext,
    plan: &ReleasePlan,
    mode: ExecuteMode,
    on_event: &mut dyn FnMut(ReleaseEvent),
) -> ReleaseResult<()> {
    on_event(ReleaseEvent::Step {
        message: "Creating GitHub releases".into(),
    });
    for candidate in &plan.releases {
        let tag = candidate.next_tag();
        let gh = Invocation::new(
            "gh",
            ["release", "create", &tag, "--notes-file=-", "--title", &tag].map(String::from),
        )
        .with_stdin(candidate.changelog.clone());
        run(ctx, gh, mode, on_event)?;
    }
    Ok(())
}

fn run(
    ctx: &WorkspaceContext,
    invocation: Invocation,
    mode: ExecuteMode,
    on_event: &mut dyn FnMut(ReleaseEvent),
) -> ReleaseResult<()> {
    on_event(ReleaseEvent::Command {
        line: invocation.rendered(),
        executed: mode.is_execute(),
    });
    if mode.is_execute() {
        invocation.run(ctx)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::workspace::Package;
    use camino::Utf8PathBuf;
    use std::collections::BTreeSet;

    fn ctx() -> WorkspaceContext {
        WorkspaceContext::new(Utf8PathBuf::from("/repo"), Config::default())
    }

    fn candidate(name: &str, prev: &str, next: &str) -> ReleaseCandidate {
        ReleaseCandidate {
            packages: vec![Package {
                name: name.into(),
                path: name.into(),
                independent: true,
                dependencies: BTreeSet::new(),
                lock_file: "/repo/Cargo.lock".into(),
            }],
            independent: true,
            tag_prefix: format!("{name}-"),
            baseline_tag: format!("{name}-v{prev}"),
            prev_version: Version::parse(prev).unwrap(),
            next_version: Version::parse(next).unwrap(),
            commits: Vec::new(),
            changelog: "## [x]\n\n- change".into(),
            should_release: true,
            has_feature: false,
            has_breaking_commit: false,
            breaking_api: false,
            cascaded: false,
        }
    }

    fn collect_events(plan: &ReleasePlan) -> Vec<String> {
        let mut lines = Vec::new();
        execute_plan(&ctx(), plan, ExecuteMode::DryRun, &mut |event| {
            lines.push(match event {
                ReleaseEvent::NothingToRelease => "nothing".to_string(),
                ReleaseEvent::Planned { name, .. } => format!("planned {name}"),
                ReleaseEvent::Step { message } => format!("step {message}"),
                ReleaseEvent::VersionBumped { name, .. } => format!("bumped {name}"),
                ReleaseEvent::Command { line, executed } => {
                    assert!(!executed);
                    format!("cmd {line}")
                }
            });
        })
        .unwrap();
        lines
    }

    #[test]
    fn empty_plan_reports_nothing_to_release() {
        let plan = ReleasePlan { releases: vec![] };
        let events = collect_events(&plan);
        assert_eq!(events, ["nothing"]);
    }

    #[test]
    fn dry_run_reports_every_command_without_executing() {
        let plan = ReleasePlan {
            releases: vec![candidate("gateway", "0.5.0", "0.5.1")],
        };
        let events = collect_events(&plan);

        assert!(events.contains(&"planned gateway".to_string()));
        assert!(events.contains(&"bumped gateway".to_string()));
        assert!(events.iter().any(|e| e.starts_with("cmd git add CHANGELOG.md")));
        assert!(events
            .iter()
            .any(|e| e == "cmd git commit --cleanup=verbatim --message release: gateway v0.5.1"));
        assert!(events
            .iter()
            .any(|e| e == "cmd git tag --cleanup=verbatim --file=- gateway-v0.5.1"));
        assert!(events.iter().any(|e| e == "cmd git push origin main gateway-v0.5.1"));
        assert!(events.iter().any(|e| e.starts_with("cmd gh release create gateway-v0.5.1")));
    }

    #[test]
    fn commit_message_lists_releases_dependents_first() {
        let plan = ReleasePlan {
            releases: vec![
                candidate("shared", "0.3.1", "0.3.2"),
                candidate("gateway", "0.5.0", "0.5.1"),
            ],
        };
        let events = collect_events(&plan);
        assert!(events.iter().any(|e| e.contains(
            "release: gateway v0.5.1, shared v0.3.2"
        )));
    }
}
