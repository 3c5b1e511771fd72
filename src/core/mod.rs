//! Core data model: package identity, version ranges, dependencies,
//! manifests, and remote listings.

pub mod dependency;
pub mod manifest;
pub mod package_id;
pub mod remote;

pub use dependency::{Dependency, VersionRange};
pub use manifest::{PackageManifest, TestDriver};
pub use package_id::PackageId;
pub use remote::{AutoLib, GitRemote, RemoteListing};
