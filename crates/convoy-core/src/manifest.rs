//! Lossless manifest and lock file edits.
//!
//! All writes go through `toml_edit` so formatting and comments survive the
//! version bumps a release applies.

use camino::Utf8Path;
use semver::Version;
use toml_edit::DocumentMut;
use tracing::debug;

/// Errors from manifest edits.
#[derive(thiserror::Error, Debug)]
pub enum ManifestError {
    /// Reading or writing the file failed.
    #[error("failed to access {path}: {source}")]
    Io {
        /// The manifest or lock file.
        path: String,
        /// Underlying filesystem error.
        source: std::io::Error,
    },

    /// The file did not parse as TOML.
    #[error("failed to parse {path}: {source}")]
    Toml {
        /// The file that failed to parse.
        path: String,
        /// Parse failure detail.
        source: toml_edit::TomlError,
    },

    /// A required key is missing or has an unexpected shape.
    #[error("{path} has no `{key}`")]
    MissingKey {
        /// The file.
        path: String,
        /// The missing key, in dotted form.
        key: String,
    },

    /// `package.version` is not a plain string.
    ///
    /// Happens when a workspace-versioned member is bumped as if it were
    /// independent.
    #[error("{path} does not carry a string `package.version` (workspace-inherited?)")]
    NotAStringVersion {
        /// The manifest.
        path: String,
    },
}

/// Result alias for manifest edits.
pub type ManifestResult<T> = Result<T, ManifestError>;

/// Set `package.version` in an independent member's manifest.
pub fn set_package_version(path: &Utf8Path, version: &Version) -> ManifestResult<()> {
    edit(path, |doc| {
        let item = doc
            .get_mut("package")
            .and_then(|p| p.as_table_like_mut())
            .and_then(|p| p.get_mut("version"))
            .ok_or_else(|| missing(path, "package.version"))?;
        if item.as_str().is_none() {
            return Err(ManifestError::NotAStringVersion {
                path: path.to_string(),
            });
        }
        *item = toml_edit::value(version.to_string());
        Ok(())
    })
}

/// Set `workspace.package.version` in the root manifest.
pub fn set_workspace_version(path: &Utf8Path, version: &Version) -> ManifestResult<()> {
    edit(path, |doc| {
        let item = doc
            .get_mut("workspace")
            .and_then(|w| w.as_table_like_mut())
            .and_then(|w| w.get_mut("package"))
            .and_then(|p| p.as_table_like_mut())
            .and_then(|p| p.get_mut("version"))
            .ok_or_else(|| missing(path, "workspace.package.version"))?;
        *item = toml_edit::value(version.to_string());
        Ok(())
    })
}

/// Set the pinned `version` of a path dependency in a member's manifest.
pub fn set_dependency_version(
    path: &Utf8Path,
    dependency: &str,
    version: &Version,
) -> ManifestResult<()> {
    edit(path, |doc| {
        let dep = doc
            .get_mut("dependencies")
            .and_then(|d| d.as_table_like_mut())
            .and_then(|d| d.get_mut(dependency))
            .and_then(|d| d.as_table_like_mut())
            .ok_or_else(|| missing(path, &format!("dependencies.{dependency}")))?;
        dep.insert("version", toml_edit::value(version.to_string()));
        Ok(())
    })
}

/// Update one `[[package]]` entry in a Cargo.lock.
pub fn set_lock_version(path: &Utf8Path, name: &str, version: &Version) -> ManifestResult<()> {
    edit(path, |doc| {
        let packages = doc
            .get_mut("package")
            .and_then(|p| p.as_array_of_tables_mut())
            .ok_or_else(|| missing(path, "package"))?;
        let entry = packages
            .iter_mut()
            .find(|pkg| pkg.get("name").and_then(|n| n.as_str()) == Some(name))
            .ok_or_else(|| missing(path, &format!("package `{name}`")))?;
        entry.insert("version", toml_edit::value(version.to_string()));
        Ok(())
    })
}

fn edit(
    path: &Utf8Path,
    mutate: impl FnOnce(&mut DocumentMut) -> ManifestResult<()>,
) -> ManifestResult<()> {
    let io_err = |source| ManifestError::Io {
        path: path.to_string(),
        source,
    };
    let text = std::fs::read_to_string(path).map_err(io_err)?;
    let mut doc: DocumentMut = text.parse().map_err(|source| ManifestError::Toml {
        path: path.to_string(),
        source,
    })?;
    mutate(&mut doc)?;
    std::fs::write(path, doc.to_string()).map_err(io_err)?;
    debug!(%path, "manifest updated");
    Ok(())
}

fn missing(path: &Utf8Path, key: &str) -> ManifestError {
    ManifestError::MissingKey {
        path: path.to_string(),
        key: key.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;

    fn write_temp(dir: &tempfile::TempDir, name: &str, contents: &str) -> Utf8PathBuf {
        let path = Utf8PathBuf::from_path_buf(dir.path().join(name)).unwrap();
        std::fs::write(&path, contents).unwrap();
        path
    }

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    #[test]
    fn package_version_bump_preserves_formatting() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_temp(
            &dir,
            "Cargo.toml",
            "# my crate\n[package]\nname = \"gateway\"\nversion = \"0.5.0\" # pinned\n",
        );

        set_package_version(&path, &v("0.6.0")).unwrap();
        let updated = std::fs::read_to_string(&path).unwrap();
        assert!(updated.contains("version = \"0.6.0\" # pinned"));
        assert!(updated.starts_with("# my crate\n"));
    }

    #[test]
    fn workspace_inherited_version_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_temp(
            &dir,
            "Cargo.toml",
            "[package]\nname = \"shared\"\nversion.workspace = true\n",
        );

        let err = set_package_version(&path, &v("0.6.0")).unwrap_err();
        assert!(matches!(err, ManifestError::NotAStringVersion { .. }));
    }

    #[test]
    fn workspace_version_bump() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_temp(
            &dir,
            "Cargo.toml",
            "[workspace]\nmembers = [\"shared\"]\n\n[workspace.package]\nversion = \"0.3.1\"\n",
        );

        set_workspace_version(&path, &v("0.3.2")).unwrap();
        let updated = std::fs::read_to_string(&path).unwrap();
        assert!(updated.contains("version = \"0.3.2\""));
    }

    #[test]
    fn dependency_pin_update() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_temp(
            &dir,
            "Cargo.toml",
            "[package]\nname = \"gateway\"\nversion = \"0.5.0\"\n\n[dependencies]\nshared = { path = \"../shared\", version = \"0.3.1\" }\n",
        );

        set_dependency_version(&path, "shared", &v("0.3.2")).unwrap();
        let updated = std::fs::read_to_string(&path).unwrap();
        assert!(updated.contains("version = \"0.3.2\""));
        assert!(updated.contains("path = \"../shared\""));
    }

    #[test]
    fn lock_entry_update_touches_only_named_package() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_temp(
            &dir,
            "Cargo.lock",
            "[[package]]\nname = \"gateway\"\nversion = \"0.5.0\"\n\n[[package]]\nname = \"shared\"\nversion = \"0.3.1\"\n",
        );

        set_lock_version(&path, "shared", &v("0.3.2")).unwrap();
        let updated = std::fs::read_to_string(&path).unwrap();
        assert!(updated.contains("name = \"shared\"\nversion = \"0.3.2\""));
        assert!(updated.contains("name = \"gateway\"\nversion = \"0.5.0\""));
    }

    #[test]
    fn missing_dependency_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_temp(&dir, "Cargo.toml", "[package]\nname = \"gateway\"\n");

        let err = set_dependency_version(&path, "shared", &v("0.3.2")).unwrap_err();
        assert!(matches!(err, ManifestError::MissingKey { .. }));
    }
}
