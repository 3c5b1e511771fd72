//! The drydock error taxonomy.
//!
//! Every user-facing failure carries a kind from [`Errc`], a short message,
//! a longer explanation, and a stable reference slug that documentation can
//! link against. Only the top-level command dispatcher translates these
//! into process exit codes.

use std::fmt;

use thiserror::Error;

/// Result alias for core APIs that fail with a classified [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// The set of classified failure conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Errc {
    InvalidPkgName,
    InvalidVersionString,
    InvalidVersionRangeString,
    InvalidPkgManifest,
    UnknownTestDriver,
    InvalidCatalogJson,
    NoSuchCatalogPackage,
    NoCatalogRemoteInfo,
    GitUrlRefMutualReq,
    CorruptedCatalogDb,
    CatalogTooNew,
    DependencyResolveFailure,
    CompileFailure,
    ArchiveFailure,
    LinkFailure,
    SdistExists,
    NoDefaultToolchain,
    InvalidBuiltinToolchain,
    UserCancelled,
}

impl Errc {
    /// The stable slug used to build a documentation reference URL.
    pub fn slug(self) -> &'static str {
        match self {
            Errc::InvalidPkgName => "invalid-pkg-name",
            Errc::InvalidVersionString => "invalid-version-string",
            Errc::InvalidVersionRangeString => "invalid-version-range-string",
            Errc::InvalidPkgManifest => "invalid-pkg-manifest",
            Errc::UnknownTestDriver => "unknown-test-driver",
            Errc::InvalidCatalogJson => "invalid-catalog-json",
            Errc::NoSuchCatalogPackage => "no-such-catalog-package",
            Errc::NoCatalogRemoteInfo => "no-catalog-remote-info",
            Errc::GitUrlRefMutualReq => "git-url-ref-mutual-req",
            Errc::CorruptedCatalogDb => "corrupted-catalog-db",
            Errc::CatalogTooNew => "catalog-too-new",
            Errc::DependencyResolveFailure => "dep-res-failure",
            Errc::CompileFailure => "compile-failure",
            Errc::ArchiveFailure => "archive-failure",
            Errc::LinkFailure => "link-failure",
            Errc::SdistExists => "sdist-exists",
            Errc::NoDefaultToolchain => "no-default-toolchain",
            Errc::InvalidBuiltinToolchain => "invalid-builtin-toolchain",
            Errc::UserCancelled => "user-cancelled",
        }
    }

    /// A documentation URL for this error kind.
    pub fn reference(self) -> String {
        format!("https://drydock.dev/err/{}", self.slug())
    }

    /// The long-form explanation shown beneath the primary message.
    pub fn explanation(self) -> &'static str {
        match self {
            Errc::InvalidPkgName => {
                "Package names must be non-empty, begin with a lowercase letter, and \
                 contain only lowercase letters, digits, `-`, `_`, and `.`."
            }
            Errc::InvalidVersionString => {
                "Version numbers must be valid semantic versions, e.g. `1.2.3` or \
                 `0.4.0-beta.1`."
            }
            Errc::InvalidVersionRangeString => {
                "Version ranges are written as a restricted subset of semver ranges: \
                 `1.2.3`, `^1.2.3`, `~1.2.3`, `=1.2.3`, or an explicit half-open \
                 interval `[1.2.3, 2.0.0)`."
            }
            Errc::InvalidPkgManifest => {
                "The package manifest (`package.json5`, `package.jsonc`, `package.json`, \
                 or legacy `package.dds`) could not be parsed or is missing required \
                 fields."
            }
            Errc::UnknownTestDriver => {
                "`test_driver` must be one of `Catch` or `Catch-Main`."
            }
            Errc::InvalidCatalogJson => {
                "The catalog import document does not match the expected schema. The \
                 message names the JSON path at which validation failed."
            }
            Errc::NoSuchCatalogPackage => {
                "The requested package ID does not appear in the catalog. Check the \
                 spelling, or import/add an entry for it first."
            }
            Errc::NoCatalogRemoteInfo => {
                "Every catalog entry must carry remote acquisition information (a `git` \
                 object with `url` and `ref`)."
            }
            Errc::GitUrlRefMutualReq => {
                "`--git-url` and `--git-ref` must be provided together: a URL without a \
                 ref (or vice versa) cannot be fetched reproducibly."
            }
            Errc::CorruptedCatalogDb => {
                "The catalog database could not be read or migrated. It may have been \
                 truncated or written by a corrupt process. Delete it and re-import."
            }
            Errc::CatalogTooNew => {
                "The catalog data was produced by a newer drydock and cannot be read by \
                 this version. Upgrade drydock."
            }
            Errc::DependencyResolveFailure => {
                "The dependency requirements cannot all be satisfied simultaneously. \
                 The message names the two requirements whose ranges do not intersect. \
                 drydock does not backtrack to older versions."
            }
            Errc::CompileFailure => {
                "A compiler subprocess exited with an error. The failing command and \
                 its output were logged above."
            }
            Errc::ArchiveFailure => {
                "Creating a static library archive failed. The failing command and its \
                 output were logged above."
            }
            Errc::LinkFailure => {
                "Linking an executable failed. The failing command and its output were \
                 logged above."
            }
            Errc::SdistExists => {
                "The source distribution destination already exists. Pass `--replace` \
                 to overwrite it."
            }
            Errc::NoDefaultToolchain => {
                "No toolchain was specified and no default toolchain file was found. \
                 Pass `--toolchain` with a `:builtin` name or a descriptor file path."
            }
            Errc::InvalidBuiltinToolchain => {
                "The `:`-prefixed toolchain name does not match any built-in toolchain. \
                 Known builtins include `:gcc`, `:gcc-9`, `:clang`, and `:msvc`."
            }
            Errc::UserCancelled => "The operation was interrupted by the user.",
        }
    }
}

impl fmt::Display for Errc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

/// A classified drydock error.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct Error {
    kind: Errc,
    message: String,
}

impl Error {
    /// Create an error of the given kind with a formatted message.
    pub fn new(kind: Errc, message: impl Into<String>) -> Self {
        Error {
            kind,
            message: message.into(),
        }
    }

    /// The classified kind of this error.
    pub fn kind(&self) -> Errc {
        self.kind
    }

    /// The long-form explanation for this error's kind.
    pub fn explanation(&self) -> &'static str {
        self.kind.explanation()
    }

    /// The documentation reference URL for this error's kind.
    pub fn reference(&self) -> String {
        self.kind.reference()
    }
}

/// Shorthand constructor used throughout the core.
pub fn user_error(kind: Errc, message: impl Into<String>) -> Error {
    Error::new(kind, message)
}

/// The error raised when the SIGINT latch is observed.
pub fn cancelled() -> Error {
    Error::new(Errc::UserCancelled, "operation cancelled by user")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slug_and_reference() {
        let err = user_error(Errc::SdistExists, "destination exists");
        assert_eq!(err.kind(), Errc::SdistExists);
        assert_eq!(err.reference(), "https://drydock.dev/err/sdist-exists");
        assert!(err.explanation().contains("--replace"));
    }

    #[test]
    fn test_display_is_message() {
        let err = user_error(Errc::CompileFailure, "compilation failed [src/a.cpp]");
        assert_eq!(err.to_string(), "compilation failed [src/a.cpp]");
    }

    #[test]
    fn test_every_kind_has_explanation() {
        let kinds = [
            Errc::InvalidPkgName,
            Errc::InvalidVersionString,
            Errc::InvalidVersionRangeString,
            Errc::InvalidPkgManifest,
            Errc::UnknownTestDriver,
            Errc::InvalidCatalogJson,
            Errc::NoSuchCatalogPackage,
            Errc::NoCatalogRemoteInfo,
            Errc::GitUrlRefMutualReq,
            Errc::CorruptedCatalogDb,
            Errc::CatalogTooNew,
            Errc::DependencyResolveFailure,
            Errc::CompileFailure,
            Errc::ArchiveFailure,
            Errc::LinkFailure,
            Errc::SdistExists,
            Errc::NoDefaultToolchain,
            Errc::InvalidBuiltinToolchain,
            Errc::UserCancelled,
        ];
        for kind in kinds {
            assert!(!kind.explanation().is_empty());
            assert!(!kind.slug().is_empty());
        }
    }
}
