//! Workspace member discovery and manifest inspection.
//!
//! Members come from the root manifest's `[workspace].members` list (glob
//! entries are expanded). A member versioned with `version.workspace = true`
//! belongs to the grouped release unit; anything else releases
//! independently with its own tag stream.

use std::collections::BTreeSet;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use toml_edit::DocumentMut;
use tracing::debug;

use crate::context::WorkspaceContext;

/// Errors from workspace discovery.
#[derive(thiserror::Error, Debug)]
pub enum WorkspaceError {
    /// Reading a manifest or lock file failed.
    #[error("failed to read {path}: {source}")]
    Io {
        /// The file that could not be read.
        path: Utf8PathBuf,
        /// Underlying filesystem error.
        source: std::io::Error,
    },

    /// A manifest did not parse as TOML.
    #[error("failed to parse {path}: {source}")]
    Toml {
        /// The manifest that failed to parse.
        path: Utf8PathBuf,
        /// Parse failure detail.
        source: toml_edit::TomlError,
    },

    /// A member glob entry failed to compile or expand.
    #[error("invalid workspace member pattern `{0}`")]
    BadMemberPattern(String),

    /// The root manifest declares no workspace members.
    #[error("no workspace members found in {0}")]
    NoMembers(Utf8PathBuf),

    /// A manifest is missing a required key.
    #[error("{path} has no `{key}`")]
    MissingKey {
        /// The manifest.
        path: Utf8PathBuf,
        /// The missing key, in dotted form.
        key: String,
    },

    /// No Cargo.lock exists at or above a member directory.
    #[error("no Cargo.lock found above {0}")]
    MissingLockFile(Utf8PathBuf),

    /// A member path is not valid UTF-8.
    #[error("non-UTF-8 member path under {0}")]
    NonUtf8Path(Utf8PathBuf),
}

/// Result alias for workspace discovery.
pub type WorkspaceResult<T> = Result<T, WorkspaceError>;

/// One workspace member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Package {
    /// Package name from `[package].name`.
    pub name: String,
    /// Member directory, relative to the workspace root.
    pub path: Utf8PathBuf,
    /// Whether the package versions and tags independently.
    pub independent: bool,
    /// Names of workspace members this package path-depends on.
    pub dependencies: BTreeSet<String>,
    /// Absolute path of the Cargo.lock governing this member.
    pub lock_file: Utf8PathBuf,
}

impl Package {
    /// Absolute path of this member's Cargo.toml.
    pub fn manifest(&self, ctx: &WorkspaceContext) -> Utf8PathBuf {
        ctx.root().join(&self.path).join("Cargo.toml")
    }

    /// Absolute path of this member's CHANGELOG.md.
    pub fn changelog(&self, ctx: &WorkspaceContext) -> Utf8PathBuf {
        ctx.root().join(&self.path).join("CHANGELOG.md")
    }
}

/// The discovered workspace.
#[derive(Debug)]
pub struct Workspace {
    /// All members, in root-manifest order.
    pub packages: Vec<Package>,
}

impl Workspace {
    /// Discover members from the root manifest in `ctx`.
    pub fn load(ctx: &WorkspaceContext) -> WorkspaceResult<Self> {
        let root_manifest = ctx.root_manifest();
        let doc = read_manifest(&root_manifest)?;

        let members = doc
            .get("workspace")
            .and_then(|ws| ws.get("members"))
            .and_then(|m| m.as_array())
            .ok_or_else(|| WorkspaceError::MissingKey {
                path: root_manifest.clone(),
                key: "workspace.members".into(),
            })?;

        let mut member_dirs: Vec<Utf8PathBuf> = Vec::new();
        for entry in members.iter().filter_map(|m| m.as_str()) {
            if entry.contains('*') {
                member_dirs.extend(expand_member_glob(ctx.root(), entry)?);
            } else {
                member_dirs.push(Utf8PathBuf::from(entry));
            }
        }
        if member_dirs.is_empty() {
            return Err(WorkspaceError::NoMembers(root_manifest));
        }

        let mut packages = Vec::with_capacity(member_dirs.len());
        for dir in member_dirs {
            packages.push(load_package(ctx, &dir)?);
        }

        // keep only dependencies that are themselves workspace members
        let names: BTreeSet<String> = packages.iter().map(|p| p.name.clone()).collect();
        for package in &mut packages {
            package.dependencies.retain(|dep| names.contains(dep));
        }

        debug!(members = packages.len(), "workspace loaded");
        Ok(Self { packages })
    }

    /// Members that version and tag independently.
    pub fn independent(&self) -> Vec<&Package> {
        self.packages.iter().filter(|p| p.independent).collect()
    }

    /// Members sharing the workspace version.
    pub fn grouped(&self) -> Vec<&Package> {
        self.packages.iter().filter(|p| !p.independent).collect()
    }

    /// Look up a member by package name.
    pub fn get(&self, name: &str) -> Option<&Package> {
        self.packages.iter().find(|p| p.name == name)
    }
}

fn read_manifest(path: &Utf8Path) -> WorkspaceResult<DocumentMut> {
    let text = std::fs::read_to_string(path).map_err(|source| WorkspaceError::Io {
        path: path.to_owned(),
        source,
    })?;
    text.parse().map_err(|source| WorkspaceError::Toml {
        path: path.to_owned(),
        source,
    })
}

fn expand_member_glob(root: &Utf8Path, entry: &str) -> WorkspaceResult<Vec<Utf8PathBuf>> {
    let pattern = root.join(entry);
    let paths = glob::glob(pattern.as_str())
        .map_err(|_| WorkspaceError::BadMemberPattern(entry.to_string()))?;

    let mut dirs = Vec::new();
    for path in paths.flatten() {
        if !path.join("Cargo.toml").is_file() {
            continue;
        }
        let abs = Utf8PathBuf::from_path_buf(path)
            .map_err(|_| WorkspaceError::NonUtf8Path(root.to_owned()))?;
        let rel = abs
            .strip_prefix(root)
            .map(Utf8Path::to_owned)
            .unwrap_or(abs);
        dirs.push(rel);
    }
    dirs.sort();
    Ok(dirs)
}

fn load_package(ctx: &WorkspaceContext, dir: &Utf8Path) -> WorkspaceResult<Package> {
    let manifest_path = ctx.root().join(dir).join("Cargo.toml");
    let doc = read_manifest(&manifest_path)?;

    let package = doc
        .get("package")
        .and_then(|p| p.as_table_like())
        .ok_or_else(|| WorkspaceError::MissingKey {
            path: manifest_path.clone(),
            key: "package".into(),
        })?;

    let name = package
        .get("name")
        .and_then(|n| n.as_str())
        .ok_or_else(|| WorkspaceError::MissingKey {
            path: manifest_path.clone(),
            key: "package.name".into(),
        })?
        .to_string();

    let independent = !package
        .get("version")
        .and_then(|v| v.as_table_like())
        .and_then(|v| v.get("workspace"))
        .and_then(|w| w.as_bool())
        .unwrap_or(false);

    let dependencies = doc
        .get("dependencies")
        .and_then(|d| d.as_table_like())
        .map(|deps| {
            deps.iter()
                .filter(|(_, item)| {
                    item.as_table_like()
                        .is_some_and(|t| t.get("path").is_some())
                })
                .map(|(dep, _)| dep.to_string())
                .collect()
        })
        .unwrap_or_default();

    let lock_file = find_file_upwards(&ctx.root().join(dir), "Cargo.lock")
        .ok_or_else(|| WorkspaceError::MissingLockFile(dir.to_owned()))?;

    Ok(Package {
        name,
        path: dir.to_owned(),
        independent,
        dependencies,
        lock_file,
    })
}

/// Walk from `start` toward the filesystem root looking for `name`.
fn find_file_upwards(start: &Utf8Path, name: &str) -> Option<Utf8PathBuf> {
    let mut dir = start;
    loop {
        let candidate = dir.join(name);
        if candidate.is_file() {
            return Some(candidate);
        }
        dir = dir.parent()?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn fixture() -> (tempfile::TempDir, WorkspaceContext) {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();

        std::fs::write(
            root.join("Cargo.toml"),
            r#"
[workspace]
members = ["gateway", "cache", "shared"]

[workspace.package]
version = "0.3.1"
"#,
        )
        .unwrap();
        std::fs::write(root.join("Cargo.lock"), "").unwrap();

        write_member(
            &root,
            "gateway",
            r#"
[package]
name = "gateway"
version = "0.5.0"

[dependencies]
shared = { path = "../shared", version = "0.3.1" }
serde = "1"
"#,
        );
        write_member(
            &root,
            "cache",
            r#"
[package]
name = "cache"
version.workspace = true

[dependencies]
shared = { path = "../shared", version = "0.3.1" }
"#,
        );
        write_member(
            &root,
            "shared",
            r#"
[package]
name = "shared"
version.workspace = true
"#,
        );

        let ctx = WorkspaceContext::new(root, Config::default());
        (dir, ctx)
    }

    fn write_member(root: &Utf8Path, name: &str, manifest: &str) {
        let dir = root.join(name);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("Cargo.toml"), manifest).unwrap();
    }

    #[test]
    fn splits_independent_and_grouped_members() {
        let (_dir, ctx) = fixture();
        let ws = Workspace::load(&ctx).unwrap();

        assert_eq!(ws.packages.len(), 3);
        let independent: Vec<_> = ws.independent().iter().map(|p| p.name.clone()).collect();
        let grouped: Vec<_> = ws.grouped().iter().map(|p| p.name.clone()).collect();
        assert_eq!(independent, ["gateway"]);
        assert_eq!(grouped, ["cache", "shared"]);
    }

    #[test]
    fn dependencies_keep_only_workspace_path_deps() {
        let (_dir, ctx) = fixture();
        let ws = Workspace::load(&ctx).unwrap();

        let gateway = ws.get("gateway").unwrap();
        assert_eq!(
            gateway.dependencies,
            BTreeSet::from(["shared".to_string()])
        );
        assert!(ws.get("shared").unwrap().dependencies.is_empty());
    }

    #[test]
    fn lock_file_resolves_upwards() {
        let (_dir, ctx) = fixture();
        let ws = Workspace::load(&ctx).unwrap();

        let cache = ws.get("cache").unwrap();
        assert_eq!(cache.lock_file, ctx.root().join("Cargo.lock"));
    }

    #[test]
    fn missing_members_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        std::fs::write(root.join("Cargo.toml"), "[workspace]\nmembers = []\n").unwrap();

        let ctx = WorkspaceContext::new(root, Config::default());
        let err = Workspace::load(&ctx).unwrap_err();
        assert!(matches!(err, WorkspaceError::NoMembers(_)));
    }
}
