//! Changelog generation and maintenance via git-cliff.
//!
//! Each release unit keeps a `CHANGELOG.md` (at the package root for
//! independent packages, at the workspace root for the grouped unit). New
//! sections are generated by `git-cliff` from unreleased commits, then
//! prepended above the newest existing section. A plain-text variant of the
//! same section becomes the annotated tag message.

use camino::Utf8Path;
use tracing::debug;

use crate::cmd::{CmdError, Invocation};
use crate::context::WorkspaceContext;
use crate::workspace::Package;

/// Errors from changelog generation or editing.
#[derive(thiserror::Error, Debug)]
pub enum ChangelogError {
    /// git-cliff failed to run or exited nonzero.
    #[error(transparent)]
    Cmd(#[from] CmdError),

    /// Reading or writing a CHANGELOG.md failed.
    #[error("failed to access {path}: {source}")]
    Io {
        /// The changelog path.
        path: String,
        /// Underlying filesystem error.
        source: std::io::Error,
    },

    /// The existing changelog has no `##` section heading to prepend above.
    #[error("no `##` heading found in {path}")]
    NoHeading {
        /// The changelog path.
        path: String,
    },
}

/// Result alias for changelog operations.
pub type ChangelogResult<T> = Result<T, ChangelogError>;

/// Generate the unreleased changelog section for one release unit.
///
/// Independent packages restrict git-cliff to their own path; the grouped
/// unit instead excludes every independent package's path. `next_version`
/// labels the section heading.
pub fn unreleased_section(
    ctx: &WorkspaceContext,
    package: Option<&Package>,
    independent: &[&Package],
    next_version: &semver::Version,
) -> ChangelogResult<String> {
    let mut args: Vec<String> = Vec::new();
    match package {
        Some(pkg) => {
            args.push("--include-path".into());
            args.push(format!("{}/**/*", pkg.path));
        }
        None => {
            for pkg in independent {
                args.push("--exclude-path".into());
                args.push(format!("{}/**/*", pkg.path));
            }
        }
    }
    args.extend(
        ["--strip", "all", "--unreleased", "--tag"]
            .into_iter()
            .map(String::from),
    );
    args.push(next_version.to_string());

    debug!(package = package.map(|p| p.name.as_str()), %next_version, "git-cliff");
    let out = Invocation::new("git-cliff", args).run(ctx)?;
    Ok(out.trim().to_string())
}

/// Reduce a changelog section to plain text suitable for an annotated tag.
///
/// Drops the section heading, unfolds the `<details>` wrapper git-cliff
/// emits around commit lists, and rewrites markdown links to their bare
/// URLs.
pub fn tag_notes(section: &str) -> String {
    let unfolded = section
        .replace("\n<details><summary>view details</summary>\n", "")
        .replace("</details>", "");
    let body = unfolded
        .lines()
        .skip(2)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string();
    strip_markdown_links(&body)
}

/// Insert `section` above the newest `##` heading in the changelog at `path`.
pub fn prepend_section(path: &Utf8Path, section: &str) -> ChangelogResult<()> {
    let io_err = |source| ChangelogError::Io {
        path: path.to_string(),
        source,
    };
    let existing = std::fs::read_to_string(path).map_err(io_err)?;
    if !existing.contains("##") {
        return Err(ChangelogError::NoHeading {
            path: path.to_string(),
        });
    }
    let updated = existing.replacen("##", &format!("{section}\n\n##"), 1);
    std::fs::write(path, updated).map_err(io_err)?;
    Ok(())
}

/// Replace `[text](url)` markdown links with their bare `url`.
fn strip_markdown_links(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    loop {
        let Some(open) = rest.find('[') else {
            out.push_str(rest);
            return out;
        };
        let after_open = &rest[open + 1..];
        let link = after_open.find(']').and_then(|close| {
            let tail = &after_open[close + 1..];
            if !tail.starts_with('(') {
                return None;
            }
            let end = tail.find(')')?;
            // index one past the closing paren, relative to `rest`
            Some((&tail[1..end], open + 1 + close + 1 + end + 1))
        });
        match link {
            Some((url, next)) => {
                out.push_str(&rest[..open]);
                out.push_str(url);
                rest = &rest[next..];
            }
            None => {
                out.push_str(&rest[..=open]);
                rest = &rest[open + 1..];
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_notes_strips_heading_and_details() {
        let section = "## [0.2.0] - 2026-08-27\n\n### Features\n<details><summary>view details</summary>\n\n- add thing ([abc1234](https://example.com/abc1234))\n</details>";
        let notes = tag_notes(section);
        assert!(!notes.contains("## ["));
        assert!(!notes.contains("<details>"));
        assert!(notes.contains("https://example.com/abc1234"));
        assert!(!notes.contains("[abc1234]"));
    }

    #[test]
    fn strip_markdown_links_keeps_urls() {
        assert_eq!(
            strip_markdown_links("see [docs](https://docs.rs) and [x](y)"),
            "see https://docs.rs and y"
        );
        assert_eq!(strip_markdown_links("no links here"), "no links here");
        assert_eq!(strip_markdown_links("broken [link"), "broken [link");
    }

    #[test]
    fn prepend_section_inserts_above_newest_heading() {
        let dir = tempfile::tempdir().unwrap();
        let path = camino::Utf8PathBuf::from_path_buf(dir.path().join("CHANGELOG.md")).unwrap();
        std::fs::write(&path, "# Changelog\n\n## [0.1.0]\n\n- initial\n").unwrap();

        prepend_section(&path, "## [0.2.0]\n\n- more").unwrap();
        let updated = std::fs::read_to_string(&path).unwrap();
        assert!(updated.starts_with("# Changelog\n\n## [0.2.0]\n\n- more\n\n## [0.1.0]"));
    }

    #[test]
    fn prepend_section_requires_a_heading() {
        let dir = tempfile::tempdir().unwrap();
        let path = camino::Utf8PathBuf::from_path_buf(dir.path().join("CHANGELOG.md")).unwrap();
        std::fs::write(&path, "nothing here\n").unwrap();

        let err = prepend_section(&path, "## [0.2.0]").unwrap_err();
        assert!(matches!(err, ChangelogError::NoHeading { .. }));
    }
}
