//! Build execution.
//!
//! Compile nodes run in parallel on a fixed-size pool; archive and link
//! nodes run serially afterwards. Incremental skip decisions come from the
//! file-deps database, which is updated in one transaction at the end of
//! the compile phase.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Instant;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};

use crate::build::db::{get_rebuild_info, FileDepsDb};
use crate::build::deps::{parse_mkfile_deps_file, parse_msvc_output_for_deps, FileDepsInfo};
use crate::build::plan::{BuildPlan, CompileFilePlan, CreateArchivePlan, LibraryPlan};
use crate::build::BuildEnv;
use crate::error::{user_error, Errc};
use crate::toolchain::DepsMode;
use crate::util::fs::ensure_dir;
use crate::util::process::{quote_command, ProcessBuilder};
use crate::util::signal;

/// The concrete information needed to run one compilation.
struct RealizedCompile {
    qualifier: String,
    source: PathBuf,
    basis: PathBuf,
    object: PathBuf,
    command: Vec<String>,
    gnu_depfile: Option<PathBuf>,
}

/// Materialize a compile plan into a concrete command and object path.
fn realize_plan(plan: &CompileFilePlan, env: &BuildEnv) -> RealizedCompile {
    let cmd = plan.generate_compile_command(env);
    RealizedCompile {
        qualifier: plan.qualifier.clone(),
        source: plan.source.clone(),
        basis: plan.basis.clone(),
        object: plan.object_file_path(env),
        command: cmd.command,
        gnu_depfile: cmd.gnu_depfile,
    }
}

/// Decide whether a compile must actually run.
fn should_compile(comp: &RealizedCompile, db: &FileDepsDb) -> Result<bool> {
    if !comp.object.exists() {
        // The output file simply doesn't exist. We have to compile.
        return Ok(true);
    }
    let rb_info = get_rebuild_info(db, &comp.object)?;
    let Some(previous_command) = rb_info.previous_command else {
        // No prior command recorded for this output. Assume it is new.
        return Ok(true);
    };
    if !rb_info.newer_inputs.is_empty() {
        // Inputs to this file have changed since the prior execution.
        return Ok(true);
    }
    if quote_command(&comp.command) != previous_command {
        // The command used to generate the output is new.
        return Ok(true);
    }
    Ok(false)
}

/// Run one compilation and collect its dependency information.
fn do_compile(
    cf: &RealizedCompile,
    env: &BuildEnv,
    counter: &AtomicUsize,
    total: usize,
) -> Result<Option<FileDepsInfo>> {
    if let Some(parent) = cf.object.parent() {
        ensure_dir(parent)?;
    }

    let rel_source = cf.source.strip_prefix(&cf.basis).unwrap_or(&cf.source);
    let msg = format!("[{}] compile: {}", cf.qualifier, rel_source.display());
    tracing::info!("{}", msg);

    let start = Instant::now();
    let res = ProcessBuilder::from_command(&cf.command).run()?;
    let dur = start.elapsed();

    let nth = counter.fetch_add(1, Ordering::SeqCst) + 1;
    tracing::info!("{:<60} - {:>6}ms [{}/{}]", msg, dur.as_millis(), nth, total);

    let mut compiler_output = res.output.clone();
    let mut ret_deps_info = None;

    match env.toolchain.deps_mode() {
        DepsMode::Gnu => {
            // GNU-style deps via the Makefile-fragment depfile.
            let df_path = cf
                .gnu_depfile
                .as_ref()
                .expect("gnu deps mode always renders a depfile path");
            if !df_path.is_file() {
                if res.okay() {
                    tracing::error!(
                        "the expected Makefile deps were not generated on disk. This is a bug! \
                         (expected file to exist: [{}])",
                        df_path.display()
                    );
                }
            } else if let Some(mut dep_info) = parse_mkfile_deps_file(df_path)? {
                dep_info.output = cf.object.clone();
                dep_info.command = quote_command(&cf.command);
                dep_info.command_output = compiler_output.clone();
                ret_deps_info = Some(dep_info);
            }
        }
        DepsMode::Msvc => {
            // Uglier deps collection by scanning the compiler's stdout.
            let msvc_deps =
                parse_msvc_output_for_deps(&compiler_output, env.toolchain.msvc_deps_leader());
            compiler_output = msvc_deps.cleaned_output;
            // Only record deps when notes were actually seen; storing an
            // empty input list would defeat later rebuild checks.
            if !msvc_deps.inputs.is_empty() {
                let mut inputs = msvc_deps.inputs;
                // cl.exe does not list the main source file itself.
                inputs.push(cf.source.clone());
                ret_deps_info = Some(FileDepsInfo {
                    output: cf.object.clone(),
                    inputs,
                    command: quote_command(&cf.command),
                    command_output: compiler_output.clone(),
                });
            }
        }
        DepsMode::None => {}
    }

    if !res.okay() {
        tracing::error!("compilation failed: {}", cf.source.display());
        tracing::error!(
            "subcommand FAILED [exited {:?}]: {}\n{}",
            res.retc,
            quote_command(&cf.command),
            compiler_output
        );
        if res.signal != 0 {
            tracing::error!("process exited via signal {}", res.signal);
        }
        return Err(user_error(
            Errc::CompileFailure,
            format!("compilation failed [{}]", cf.source.display()),
        )
        .into());
    }

    // Surface non-empty (cleaned) compiler output as warnings.
    if !compiler_output.trim().is_empty() {
        tracing::warn!(
            "while compiling file {} [{}]:\n{}",
            cf.source.display(),
            quote_command(&cf.command),
            compiler_output
        );
    }

    Ok(ret_deps_info)
}

fn n_jobs(parallel_jobs: i32) -> usize {
    if parallel_jobs >= 1 {
        parallel_jobs as usize
    } else {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(2)
            + 2
    }
}

/// Run every compile in the plan that is out of date, in parallel.
///
/// The first failure sets a latch: workers drain without starting new
/// compiles, in-flight subprocesses finish, and the first error is
/// returned after the pool joins. Dependency records from successful
/// compiles are written to the database either way.
fn compile_all(plan: &BuildPlan, env: &BuildEnv, db: &FileDepsDb, jobs: i32) -> Result<()> {
    let mut pending = Vec::new();
    for lib in &plan.libraries {
        for compile in &lib.compiles {
            let realized = realize_plan(compile, env);
            if should_compile(&realized, db)? {
                pending.push(realized);
            }
        }
    }

    let total = pending.len();
    if total == 0 {
        tracing::info!("all {} translation unit(s) up to date", plan.compile_count());
        return Ok(());
    }
    tracing::info!("compiling {} file(s)", total);

    let progress = if total > 1 {
        let pb = ProgressBar::new(total as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .expect("static progress template")
                .progress_chars("#>-"),
        );
        Some(pb)
    } else {
        None
    };

    let cursor = AtomicUsize::new(0);
    let counter = AtomicUsize::new(0);
    let latch = AtomicBool::new(false);
    let new_deps: Mutex<Vec<FileDepsInfo>> = Mutex::new(Vec::new());
    let errors: Mutex<Vec<anyhow::Error>> = Mutex::new(Vec::new());

    let jobs = n_jobs(jobs);
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(jobs)
        .build()
        .context("failed to build compile thread pool")?;

    pool.scope(|scope| {
        for _ in 0..jobs {
            scope.spawn(|_| loop {
                if latch.load(Ordering::SeqCst) || signal::is_cancelled() {
                    break;
                }
                let idx = cursor.fetch_add(1, Ordering::SeqCst);
                if idx >= total {
                    break;
                }
                match do_compile(&pending[idx], env, &counter, total) {
                    Ok(Some(dep)) => {
                        new_deps.lock().expect("deps mutex").push(dep);
                    }
                    Ok(None) => {}
                    Err(e) => {
                        errors.lock().expect("error mutex").push(e);
                        latch.store(true, Ordering::SeqCst);
                    }
                }
                if let Some(pb) = &progress {
                    pb.inc(1);
                }
            });
        }
    });

    if let Some(pb) = progress {
        pb.finish_and_clear();
    }

    // Record what did compile successfully, even on a failed build; the
    // next invocation can then skip that work.
    let new_deps = new_deps.into_inner().expect("deps mutex");
    db.update_deps_info(&new_deps)?;

    let mut errors = errors.into_inner().expect("error mutex");
    if !errors.is_empty() {
        return Err(errors.swap_remove(0));
    }
    signal::check_cancelled()?;
    Ok(())
}

/// Create one static library archive.
fn create_archive(lib: &LibraryPlan, ar: &CreateArchivePlan, env: &BuildEnv) -> Result<()> {
    let objects: Vec<PathBuf> = ar
        .compiles
        .iter()
        .map(|&i| lib.compiles[i].object_file_path(env))
        .collect();
    if objects.is_empty() {
        return Err(user_error(
            Errc::ArchiveFailure,
            format!("archive for '{}' has no object file inputs", ar.name),
        )
        .into());
    }

    let out_path = ar.archive_file_path(env);
    let out_relpath = out_path
        .strip_prefix(&env.out_root)
        .unwrap_or(&out_path)
        .to_path_buf();

    // Archiver behavior on an existing archive differs between platforms;
    // removing the prior copy makes it uniform.
    if out_path.exists() {
        std::fs::remove_file(&out_path)
            .with_context(|| format!("failed to remove {}", out_path.display()))?;
    }
    if let Some(parent) = out_path.parent() {
        ensure_dir(parent)?;
    }

    let command = env.toolchain.archive_command(&objects, &out_path);
    tracing::info!("[{}] archive: {}", ar.name, out_relpath.display());
    let start = Instant::now();
    let res = ProcessBuilder::from_command(&command).run()?;
    tracing::info!(
        "[{}] archive: {} - {}ms",
        ar.name,
        out_relpath.display(),
        start.elapsed().as_millis()
    );

    if !res.okay() {
        tracing::error!(
            "creating static library archive failed: {}",
            out_relpath.display()
        );
        tracing::error!("subcommand FAILED: {}\n{}", quote_command(&command), res.output);
        return Err(user_error(
            Errc::ArchiveFailure,
            format!(
                "creating archive [{}] failed for '{}'",
                out_relpath.display(),
                ar.name
            ),
        )
        .into());
    }
    Ok(())
}

/// Link one executable against its library archives.
fn link_executable(
    plan: &BuildPlan,
    lib_index: usize,
    exe: &crate::build::plan::LinkExecutablePlan,
    env: &BuildEnv,
) -> Result<()> {
    let lib = &plan.libraries[lib_index];
    let object = lib.compiles[exe.compile].object_file_path(env);
    let output = exe.exe_path(env);

    if let Some(parent) = output.parent() {
        ensure_dir(parent)?;
    }

    let command = env.toolchain.link_exe_command(&crate::toolchain::LinkParams {
        objects: vec![object],
        archives: plan.link_archives(lib_index, env),
        output: output.clone(),
    });

    tracing::info!("[{}] link: {}", lib.name, exe.name);
    let res = ProcessBuilder::from_command(&command).run()?;

    if !res.okay() {
        tracing::error!("linking failed: {}", output.display());
        tracing::error!("subcommand FAILED: {}\n{}", quote_command(&command), res.output);
        return Err(user_error(
            Errc::LinkFailure,
            format!("linking failed [{}]", output.display()),
        )
        .into());
    }
    Ok(())
}

/// Execute a whole plan: parallel compiles, then serial archives and
/// links, then the interchange index if requested.
pub fn execute(
    plan: &BuildPlan,
    env: &BuildEnv,
    db: &FileDepsDb,
    jobs: i32,
    emit_lmi: Option<&Path>,
) -> Result<()> {
    compile_all(plan, env, db, jobs)?;

    for lib in &plan.libraries {
        if let Some(ar) = &lib.archive {
            create_archive(lib, ar, env)?;
        }
    }

    for (lib_index, lib) in plan.libraries.iter().enumerate() {
        for exe in &lib.executables {
            link_executable(plan, lib_index, exe, env)?;
        }
    }

    if let Some(lmi_path) = emit_lmi {
        crate::build::lmi::write_index(plan, env, lmi_path)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::plan::LibraryPlan;
    use crate::toolchain::Toolchain;
    use tempfile::TempDir;

    #[test]
    fn test_n_jobs_default_is_positive() {
        assert!(n_jobs(0) >= 3);
        assert!(n_jobs(-4) >= 3);
        assert_eq!(n_jobs(6), 6);
    }

    #[test]
    fn test_archive_with_no_objects_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let env = BuildEnv {
            out_root: tmp.path().join("_build"),
            toolchain: Toolchain::get_builtin("gcc").unwrap(),
        };
        let lib = LibraryPlan {
            name: "empty".to_string(),
            namespace: "empty".to_string(),
            subdir: PathBuf::new(),
            compiles: vec![],
            archive: Some(CreateArchivePlan {
                name: "empty".to_string(),
                subdir: PathBuf::new(),
                compiles: vec![],
            }),
            executables: vec![],
            public_include_dirs: vec![],
        };

        let err = create_archive(&lib, lib.archive.as_ref().unwrap(), &env).unwrap_err();
        let err = err.downcast::<crate::error::Error>().unwrap();
        assert_eq!(err.kind(), Errc::ArchiveFailure);
    }

    #[test]
    fn test_should_compile_for_missing_output() {
        let tmp = TempDir::new().unwrap();
        let db = FileDepsDb::open(&tmp.path().join(".drydock.db")).unwrap();
        let comp = RealizedCompile {
            qualifier: "x".to_string(),
            source: tmp.path().join("a.cpp"),
            basis: tmp.path().to_path_buf(),
            object: tmp.path().join("a.o"),
            command: vec!["cc".to_string()],
            gnu_depfile: None,
        };
        assert!(should_compile(&comp, &db).unwrap());
    }

    #[test]
    fn test_should_compile_command_change() {
        let tmp = TempDir::new().unwrap();
        let db = FileDepsDb::open(&tmp.path().join(".drydock.db")).unwrap();

        let object = tmp.path().join("a.o");
        std::fs::write(&object, "obj").unwrap();

        let command = vec!["cc".to_string(), "-c".to_string(), "a.cpp".to_string()];
        db.update_deps_info(&[FileDepsInfo {
            output: object.clone(),
            inputs: vec![],
            command: quote_command(&command),
            command_output: String::new(),
        }])
        .unwrap();

        let mut comp = RealizedCompile {
            qualifier: "x".to_string(),
            source: tmp.path().join("a.cpp"),
            basis: tmp.path().to_path_buf(),
            object,
            command,
            gnu_depfile: None,
        };
        assert!(!should_compile(&comp, &db).unwrap());

        comp.command.push("-O2".to_string());
        assert!(should_compile(&comp, &db).unwrap());
    }
}
