//! Version ranges and dependency edges.
//!
//! A range is a half-open semver interval `[low, high)`. Dependency edges
//! carry exactly one interval; intersection narrows accumulated
//! requirements during solving.

use std::fmt;

use semver::Version;
use serde::{Deserialize, Serialize};

use crate::core::package_id::{parse_version, validate_name};
use crate::error::{user_error, Errc, Result};

/// A half-open version interval `[low, high)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VersionRange {
    low: Version,
    high: Version,
}

/// The next major version after `v` (`1.4.2` -> `2.0.0`).
pub fn next_major(v: &Version) -> Version {
    Version::new(v.major + 1, 0, 0)
}

fn next_minor(v: &Version) -> Version {
    Version::new(v.major, v.minor + 1, 0)
}

fn next_patch(v: &Version) -> Version {
    Version::new(v.major, v.minor, v.patch + 1)
}

impl VersionRange {
    /// Create a range. The interval must be non-empty (`low < high`).
    pub fn new(low: Version, high: Version) -> Result<Self> {
        if low >= high {
            return Err(user_error(
                Errc::InvalidVersionRangeString,
                format!("version range [{}, {}) is empty", low, high),
            ));
        }
        Ok(VersionRange { low, high })
    }

    /// The range matching exactly one version.
    pub fn exactly(v: Version) -> Self {
        let high = next_patch(&v);
        VersionRange { low: v, high }
    }

    /// The caret range: everything compatible with `low` under semver
    /// conventions (`^1.2.3` -> `[1.2.3, 2.0.0)`, `^0.2.3` -> `[0.2.3, 0.3.0)`,
    /// `^0.0.3` -> `[0.0.3, 0.0.4)`).
    pub fn caret(low: Version) -> Self {
        let high = if low.major > 0 {
            next_major(&low)
        } else if low.minor > 0 {
            next_minor(&low)
        } else {
            next_patch(&low)
        };
        VersionRange { low, high }
    }

    /// The tilde range: patch-level changes only (`~1.2.3` -> `[1.2.3, 1.3.0)`).
    pub fn tilde(low: Version) -> Self {
        let high = next_minor(&low);
        VersionRange { low, high }
    }

    /// The range `[low, next_major(low))` used for `name@low` dependency
    /// strings.
    pub fn for_base_version(low: Version) -> Self {
        let high = next_major(&low);
        VersionRange { low, high }
    }

    pub fn low(&self) -> &Version {
        &self.low
    }

    pub fn high(&self) -> &Version {
        &self.high
    }

    /// Whether `v` falls inside `[low, high)`.
    pub fn contains(&self, v: &Version) -> bool {
        *v >= self.low && *v < self.high
    }

    /// Intersect two ranges. `None` when the intersection is empty.
    pub fn intersection(&self, other: &VersionRange) -> Option<VersionRange> {
        let low = self.low.clone().max(other.low.clone());
        let high = self.high.clone().min(other.high.clone());
        if low < high {
            Some(VersionRange { low, high })
        } else {
            None
        }
    }

    /// Parse a range string. Accepts the restricted manifest forms
    /// (`1.2.3`, `^1.2.3`, `~1.2.3`, `=1.2.3`) and the explicit interval
    /// form `[1.2.3, 2.0.0)` produced by `Display`.
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        let invalid = || {
            user_error(
                Errc::InvalidVersionRangeString,
                format!("invalid version range string '{}'", s),
            )
        };

        if let Some(interval) = s.strip_prefix('[').and_then(|r| r.strip_suffix(')')) {
            let (low, high) = interval.split_once(',').ok_or_else(invalid)?;
            let low = parse_version(low.trim()).map_err(|_| invalid())?;
            let high = parse_version(high.trim()).map_err(|_| invalid())?;
            return VersionRange::new(low, high).map_err(|_| invalid());
        }

        if let Some(rest) = s.strip_prefix('^') {
            return Ok(VersionRange::caret(
                parse_version(rest).map_err(|_| invalid())?,
            ));
        }
        if let Some(rest) = s.strip_prefix('~') {
            return Ok(VersionRange::tilde(
                parse_version(rest).map_err(|_| invalid())?,
            ));
        }
        if let Some(rest) = s.strip_prefix('=') {
            return Ok(VersionRange::exactly(
                parse_version(rest).map_err(|_| invalid())?,
            ));
        }

        // A bare version means "compatible with", like `^`.
        Ok(VersionRange::caret(
            parse_version(s).map_err(|_| invalid())?,
        ))
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.low, self.high)
    }
}

/// A dependency edge: a package name and the acceptable version interval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    pub name: String,
    pub range: VersionRange,
}

impl Dependency {
    pub fn new(name: impl Into<String>, range: VersionRange) -> Result<Self> {
        let name = name.into();
        validate_name(&name)?;
        Ok(Dependency { name, range })
    }

    /// Parse a `name@1.2.3` dependency string, expanding the version to the
    /// interval `[1.2.3, 2.0.0)`.
    pub fn parse_depends_string(s: &str) -> Result<Self> {
        let (name, version) = s.split_once('@').ok_or_else(|| {
            user_error(
                Errc::InvalidVersionRangeString,
                format!("dependency string '{}' is missing the '@version' suffix", s),
            )
        })?;
        let low = parse_version(version)?;
        Dependency::new(name, VersionRange::for_base_version(low))
    }
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.range)
    }
}
