//! Build planning and execution.

pub mod db;
pub mod deps;
pub mod executor;
pub mod lmi;
pub mod plan;
pub mod sources;

use std::path::PathBuf;

use anyhow::Result;

use crate::sdist::Sdist;
use crate::toolchain::Toolchain;

pub use lmi::ExternalLib;
pub use plan::{BuildPlan, SdistBuildParams};

/// The environment a plan is realized against: where outputs land and
/// which toolchain renders commands.
#[derive(Debug, Clone)]
pub struct BuildEnv {
    pub out_root: PathBuf,
    pub toolchain: Toolchain,
}

/// Whole-build parameters.
#[derive(Debug, Clone)]
pub struct BuildParams {
    pub out_root: PathBuf,
    pub toolchain: Toolchain,
    /// Parallel compile jobs; non-positive means hardware concurrency + 2.
    pub parallel_jobs: i32,
    /// Where to write the interchange index, if requested.
    pub emit_lmi: Option<PathBuf>,
}

/// Accumulates the sdists participating in a build, then drives the plan
/// and executor.
#[derive(Default)]
pub struct Builder {
    sdists: Vec<(Sdist, SdistBuildParams)>,
    externals: Vec<ExternalLib>,
}

impl Builder {
    pub fn new() -> Self {
        Builder::default()
    }

    /// Add one sdist to the build. Dependencies should be added
    /// leaves-first; the primary project is typically added first with
    /// apps/tests enabled and dependencies follow with defaults.
    pub fn add(&mut self, sdist: Sdist, params: SdistBuildParams) {
        self.sdists.push((sdist, params));
    }

    /// Add pre-built libraries from an existing interchange index.
    pub fn add_external_libs(&mut self, libs: Vec<ExternalLib>) {
        self.externals.extend(libs);
    }

    /// Plan and execute the build.
    pub fn build(&self, params: &BuildParams) -> Result<()> {
        let plan = BuildPlan::generate(&self.sdists, &self.externals)?;
        tracing::debug!(
            "planned {} compile step(s) across {} package(s)",
            plan.compile_count(),
            plan.libraries.len()
        );

        let env = BuildEnv {
            out_root: params.out_root.clone(),
            toolchain: params.toolchain.clone(),
        };
        let db = db::FileDepsDb::open(&params.out_root.join(".drydock.db"))?;

        executor::execute(
            &plan,
            &env,
            &db,
            params.parallel_jobs,
            params.emit_lmi.as_deref(),
        )
    }
}
