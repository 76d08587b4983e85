//! Strict version parsing and bump arithmetic.
//!
//! Release tags carry plain `MAJOR.MINOR.PATCH` versions; pre-release and
//! build metadata are rejected because the bump rules below are only defined
//! for the bare triple. Zero-major versions ("0.y.z") use an alternate rule:
//! a breaking change bumps the minor component, since pre-1.0 minor bumps are
//! the semver convention for breaking changes.

use semver::Version;
use thiserror::Error;
use tracing::debug;

/// Errors from version operations.
#[derive(Error, Debug)]
pub enum VersionError {
    /// Failed to parse a semver string.
    #[error("invalid semver: {0}")]
    InvalidSemver(#[from] semver::Error),

    /// Parsed, but not a bare `MAJOR.MINOR.PATCH` triple.
    #[error("invalid version `{0}`: expected exactly MAJOR.MINOR.PATCH")]
    NotATriple(String),
}

/// Result alias for version operations.
pub type VersionResult<T> = Result<T, VersionError>;

/// Parse a strict `MAJOR.MINOR.PATCH` version.
///
/// Pre-release or build metadata makes the input a hard error; a release tag
/// carrying either is malformed as far as convoy is concerned.
pub fn parse_version(s: &str) -> VersionResult<Version> {
    let version = Version::parse(s)?;
    if !version.pre.is_empty() || !version.build.is_empty() {
        return Err(VersionError::NotATriple(s.to_string()));
    }
    Ok(version)
}

/// Compute the next version from change classification.
///
/// For `major == 0` a breaking change bumps the minor component (patch resets
/// to 0); anything else bumps patch. From 1.0.0 on, breaking beats feature
/// beats fix: major, minor, and patch bumps respectively.
pub fn bumped(version: &Version, feature: bool, breaking: bool) -> Version {
    let next = if version.major == 0 {
        if breaking {
            Version::new(0, version.minor + 1, 0)
        } else {
            Version::new(0, version.minor, version.patch + 1)
        }
    } else if breaking {
        Version::new(version.major + 1, 0, 0)
    } else if feature {
        Version::new(version.major, version.minor + 1, 0)
    } else {
        Version::new(version.major, version.minor, version.patch + 1)
    };
    debug!(%version, %next, feature, breaking, "bumped version");
    next
}

/// The highest version of the given set, or `None` if it is empty.
pub fn latest(versions: impl IntoIterator<Item = Version>) -> Option<Version> {
    versions.into_iter().max()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_major_plain_bumps_patch() {
        let v = Version::new(0, 3, 1);
        assert_eq!(bumped(&v, false, false), Version::new(0, 3, 2));
        // A feature alone does not bump minor before 1.0
        assert_eq!(bumped(&v, true, false), Version::new(0, 3, 2));
    }

    #[test]
    fn zero_major_breaking_bumps_minor_and_resets_patch() {
        let v = Version::new(0, 3, 1);
        assert_eq!(bumped(&v, false, true), Version::new(0, 4, 0));
        assert_eq!(bumped(&v, true, true), Version::new(0, 4, 0));
    }

    #[test]
    fn breaking_takes_precedence_over_feature() {
        let v = Version::new(1, 2, 3);
        assert_eq!(bumped(&v, true, true), Version::new(2, 0, 0));
    }

    #[test]
    fn feature_bumps_minor() {
        let v = Version::new(1, 2, 3);
        assert_eq!(bumped(&v, true, false), Version::new(1, 3, 0));
    }

    #[test]
    fn fix_bumps_patch() {
        let v = Version::new(1, 2, 3);
        assert_eq!(bumped(&v, false, false), Version::new(1, 2, 4));
    }

    #[test]
    fn parse_format_round_trips() {
        for s in ["0.0.1", "0.4.0", "1.2.3", "10.20.30"] {
            let v = parse_version(s).unwrap();
            assert_eq!(v.to_string(), s);
            assert_eq!(parse_version(&v.to_string()).unwrap(), v);
        }
    }

    #[test]
    fn parse_rejects_malformed() {
        assert!(parse_version("1.2").is_err());
        assert!(parse_version("v1.2.3").is_err());
        assert!(parse_version("not-a-version").is_err());
    }

    #[test]
    fn parse_rejects_prerelease_and_build() {
        assert!(parse_version("1.2.3-rc.1").is_err());
        assert!(parse_version("1.2.3+build5").is_err());
    }

    #[test]
    fn latest_picks_highest_triple() {
        let versions = vec![
            Version::new(0, 9, 9),
            Version::new(1, 0, 0),
            Version::new(0, 10, 0),
        ];
        assert_eq!(latest(versions), Some(Version::new(1, 0, 0)));
        assert_eq!(latest(Vec::new()), None);
    }
}
