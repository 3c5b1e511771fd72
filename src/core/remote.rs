//! Remote acquisition listings stored in the catalog.
//!
//! The catalog records, per package, where its sources can be obtained.
//! Today the only kind is a git remote, but the listing is an open set:
//! consumers dispatch on the variant rather than assuming git.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{user_error, Errc, Result};

/// A libman `namespace/name` pair supplied by the catalog for packages
/// whose upstream tree lacks a native manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoLib {
    pub namespace: String,
    pub name: String,
}

impl AutoLib {
    /// Parse the `namespace/name` usage form.
    pub fn split_usage_string(s: &str) -> Result<Self> {
        let (namespace, name) = s.split_once('/').ok_or_else(|| {
            user_error(
                Errc::InvalidCatalogJson,
                format!("auto-lib '{}' must be of the form 'namespace/name'", s),
            )
        })?;
        if namespace.is_empty() || name.is_empty() || name.contains('/') {
            return Err(user_error(
                Errc::InvalidCatalogJson,
                format!("auto-lib '{}' must be of the form 'namespace/name'", s),
            ));
        }
        Ok(AutoLib {
            namespace: namespace.to_string(),
            name: name.to_string(),
        })
    }
}

impl fmt::Display for AutoLib {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// A git remote: a URL plus the ref to materialize.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitRemote {
    pub url: String,
    pub ref_: String,
    pub auto_lib: Option<AutoLib>,
}

/// Where a catalog package's sources come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum RemoteListing {
    Git(GitRemote),
}

impl RemoteListing {
    /// Build a git listing, enforcing that URL and ref arrive together.
    pub fn git(url: Option<String>, ref_: Option<String>, auto_lib: Option<AutoLib>) -> Result<Self> {
        match (url, ref_) {
            (Some(url), Some(ref_)) => Ok(RemoteListing::Git(GitRemote { url, ref_, auto_lib })),
            _ => Err(user_error(
                Errc::GitUrlRefMutualReq,
                "a git URL and a git ref must be specified together",
            )),
        }
    }
}

impl fmt::Display for RemoteListing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteListing::Git(git) => write!(f, "git+{}#{}", git.url, git.ref_),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_usage_string() {
        let al = AutoLib::split_usage_string("boost/filesystem").unwrap();
        assert_eq!(al.namespace, "boost");
        assert_eq!(al.name, "filesystem");
        assert_eq!(al.to_string(), "boost/filesystem");
    }

    #[test]
    fn test_split_usage_string_rejects() {
        assert!(AutoLib::split_usage_string("no-slash").is_err());
        assert!(AutoLib::split_usage_string("/name").is_err());
        assert!(AutoLib::split_usage_string("ns/").is_err());
        assert!(AutoLib::split_usage_string("a/b/c").is_err());
    }

    #[test]
    fn test_git_url_ref_mutual_req() {
        assert!(RemoteListing::git(Some("u".into()), Some("r".into()), None).is_ok());

        let err = RemoteListing::git(Some("u".into()), None, None).unwrap_err();
        assert_eq!(err.kind(), Errc::GitUrlRefMutualReq);
        let err = RemoteListing::git(None, Some("r".into()), None).unwrap_err();
        assert_eq!(err.kind(), Errc::GitUrlRefMutualReq);
    }
}
