//! Package identification - a name plus a semantic version.
//!
//! In text a package ID is written `name@version`, e.g. `spdlog@1.4.2`.
//! `parse` and `Display` round-trip.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use semver::Version;
use serde::{Deserialize, Serialize};

use crate::error::{user_error, Errc, Error, Result};

static NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z][a-z0-9._-]*$").expect("static regex"));

/// Validate a package name.
pub fn validate_name(name: &str) -> Result<()> {
    if NAME_RE.is_match(name) {
        Ok(())
    } else {
        Err(user_error(
            Errc::InvalidPkgName,
            format!("invalid package name '{}'", name),
        ))
    }
}

/// Parse a version string, classifying failures.
pub fn parse_version(s: &str) -> Result<Version> {
    s.parse().map_err(|_| {
        user_error(
            Errc::InvalidVersionString,
            format!("invalid version string '{}'", s),
        )
    })
}

/// A unique package identifier: name and version.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PackageId {
    pub name: String,
    pub version: Version,
}

impl PackageId {
    /// Create a package ID, validating the name.
    pub fn new(name: impl Into<String>, version: Version) -> Result<Self> {
        let name = name.into();
        validate_name(&name)?;
        Ok(PackageId { name, version })
    }

    /// Parse the textual `name@version` form.
    pub fn parse(s: &str) -> Result<Self> {
        let (name, version) = s.split_once('@').ok_or_else(|| {
            user_error(
                Errc::InvalidPkgName,
                format!("package ID '{}' is missing the '@version' suffix", s),
            )
        })?;
        PackageId::new(name, parse_version(version)?)
    }
}

impl fmt::Display for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.version)
    }
}

impl FromStr for PackageId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        PackageId::parse(s)
    }
}
