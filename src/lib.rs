//! Drydock - a source-based package manager and build system for C/C++.
//!
//! This crate provides the core library functionality for drydock: the
//! package catalog, dependency solving, the source-distribution
//! repository, and parallel incremental build execution.

pub mod build;
pub mod catalog;
pub mod core;
pub mod error;
pub mod fetch;
pub mod ops;
pub mod repo;
pub mod sdist;
pub mod solve;
pub mod toolchain;
pub mod util;

pub use crate::core::{Dependency, PackageId, PackageManifest, RemoteListing, VersionRange};
pub use catalog::{Catalog, PackageInfo};
pub use error::{Errc, Error};
pub use sdist::Sdist;
pub use toolchain::Toolchain;
