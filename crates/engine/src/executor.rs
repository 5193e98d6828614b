// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Layered parallel executor.
//!
//! The DAG's levels are executed in order; stages within a level fan out
//! to tokio tasks bounded by a semaphore. A level is a barrier: no stage
//! of level k+1 starts before every stage of level k has reported.
//! Progress glyphs go to stderr so parallel stage output stays readable.

use crate::dag::{Dag, DagError};
use crate::freshness;
use crate::runner::{RunnerError, StageRunner};
use stagerun_core::{ExecutionResult, Stage, StageState};
use stagerun_storage::{hash, LockError, LockStore};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

/// Errors that abort the whole run
#[derive(Debug, Error)]
pub enum ExecuteError {
    #[error("stage(s) failed: {}", .0.join(", "))]
    StagesFailed(Vec<String>),

    #[error(transparent)]
    Graph(#[from] DagError),

    #[error(transparent)]
    Lock(#[from] LockError),

    #[error(transparent)]
    Runner(#[from] RunnerError),
}

/// Execution knobs, all defaulted for a plain `stagerun` invocation.
#[derive(Debug, Clone)]
pub struct ExecOptions {
    /// Worker-pool width; `None` means the host CPU count
    pub max_workers: Option<usize>,
    /// Print the plan and stop
    pub dry_run: bool,
    /// Run every stage even when up-to-date
    pub force: bool,
    /// Decide freshness from dvc.lock; when false, ask `dvc status`
    pub use_lock: bool,
    /// Record each successful stage back into dvc.lock
    pub update_lock: bool,
    /// Path to the dvc.lock manifest
    pub lock_path: PathBuf,
}

impl Default for ExecOptions {
    fn default() -> Self {
        Self {
            max_workers: None,
            dry_run: false,
            force: false,
            use_lock: true,
            update_lock: true,
            lock_path: PathBuf::from("dvc.lock"),
        }
    }
}

/// Drives one pipeline run over a borrowed DAG.
pub struct Executor<'a> {
    dag: &'a Dag,
    runner: Arc<dyn StageRunner>,
    opts: ExecOptions,
    lock_store: Option<LockStore>,
    /// Freshness snapshot loaded once at startup. Read-only thereafter:
    /// freshness is decided against the state of the world when the run
    /// began, not against updates from sibling stages.
    lock_states: Arc<BTreeMap<String, StageState>>,
}

impl std::fmt::Debug for Executor<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor")
            .field("dag", &self.dag)
            .field("opts", &self.opts)
            .field("lock_states", &self.lock_states)
            .finish_non_exhaustive()
    }
}

impl<'a> Executor<'a> {
    /// Reads the freshness snapshot up front, so a corrupt manifest fails
    /// the run before any stage starts.
    pub fn new(
        dag: &'a Dag,
        runner: Arc<dyn StageRunner>,
        opts: ExecOptions,
    ) -> Result<Self, ExecuteError> {
        let lock_states = if opts.use_lock && !opts.dry_run {
            LockStore::new(&opts.lock_path).read()?
        } else {
            BTreeMap::new()
        };
        let lock_store =
            (opts.update_lock && !opts.dry_run).then(|| LockStore::new(&opts.lock_path));

        Ok(Self {
            dag,
            runner,
            opts,
            lock_store,
            lock_states: Arc::new(lock_states),
        })
    }

    /// Execute every level in order; returns one result per stage.
    ///
    /// A failing stage does not cancel its level siblings; once the level
    /// drains, the run stops with [`ExecuteError::StagesFailed`] naming
    /// every failure in that level.
    pub async fn execute(&self) -> Result<Vec<ExecutionResult>, ExecuteError> {
        let levels = self.dag.topological_sort()?;

        eprintln!(
            "Execution plan ({} levels, {} stages):",
            levels.len(),
            self.dag.len()
        );
        for (i, level) in levels.iter().enumerate() {
            eprintln!("  Level {}: {}", i + 1, level.join(", "));
        }

        if self.opts.dry_run {
            eprintln!("\nDry run - no stages will be executed");
            return Ok(Vec::new());
        }
        eprintln!();

        let workers = self.opts.max_workers.unwrap_or_else(num_cpus::get).max(1);
        let semaphore = Arc::new(Semaphore::new(workers));
        debug!(workers, "worker pool sized");

        let mut results = Vec::new();
        for (i, level) in levels.iter().enumerate() {
            eprintln!("Level {}/{}: {} stage(s)", i + 1, levels.len(), level.len());
            let level_results = self.run_level(level, &semaphore).await?;

            let failures: Vec<String> = level_results
                .iter()
                .filter(|r| !r.success && !r.skipped)
                .map(|r| r.stage_name.clone())
                .collect();
            results.extend(level_results);

            if !failures.is_empty() {
                return Err(ExecuteError::StagesFailed(failures));
            }
        }
        Ok(results)
    }

    /// Run one level; results come back in the level's (sorted) name order.
    async fn run_level(
        &self,
        names: &[String],
        semaphore: &Arc<Semaphore>,
    ) -> Result<Vec<ExecutionResult>, ExecuteError> {
        // Single stage: run inline, no task overhead
        if let [name] = names {
            return Ok(vec![execute_stage(self.job_for(name)).await?]);
        }

        let mut handles = Vec::with_capacity(names.len());
        for name in names {
            let job = self.job_for(name);
            let semaphore = Arc::clone(semaphore);
            let handle = tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                execute_stage(job).await
            });
            handles.push((name.clone(), handle));
        }

        // Await every sibling even after a failure; awaiting in spawn order
        // keeps the collected results aligned with the level ordering.
        let mut fatal: Option<RunnerError> = None;
        let mut results = Vec::with_capacity(names.len());
        for (name, handle) in handles {
            match handle.await {
                Ok(Ok(result)) => results.push(result),
                Ok(Err(err)) => {
                    results.push(ExecutionResult::failed(&name, err.to_string()));
                    if fatal.is_none() {
                        fatal = Some(err);
                    }
                }
                Err(join_err) => {
                    warn!(stage = %name, error = %join_err, "stage task aborted");
                    results.push(ExecutionResult::failed(&name, join_err.to_string()));
                }
            }
        }

        // dvc itself was missing: no stage can ever succeed, stop here
        if let Some(err) = fatal {
            return Err(err.into());
        }
        Ok(results)
    }

    fn job_for(&self, name: &str) -> StageJob {
        // Names come from the DAG's own topological sort, so the lookup
        // cannot miss; the fallback stage keeps the type system honest.
        let stage = self
            .dag
            .get(name)
            .cloned()
            .unwrap_or_else(|| Stage::new(name, ""));

        StageJob {
            recorded: self.lock_states.get(name).cloned(),
            stage,
            runner: Arc::clone(&self.runner),
            force: self.opts.force,
            use_lock: self.opts.use_lock,
            lock_store: self.lock_store.clone(),
        }
    }
}

/// Everything one stage task needs, owned, so tasks outlive the borrow of
/// the executor.
struct StageJob {
    stage: Stage,
    runner: Arc<dyn StageRunner>,
    recorded: Option<StageState>,
    force: bool,
    use_lock: bool,
    lock_store: Option<LockStore>,
}

/// Per-stage procedure: freshness check, run, hash, commit.
///
/// `Err` is reserved for the missing-dvc case; everything else, including
/// a failing stage command, comes back as an [`ExecutionResult`].
async fn execute_stage(job: StageJob) -> Result<ExecutionResult, RunnerError> {
    let name = job.stage.name.clone();

    if job.force {
        eprintln!("  ⟳ {name}: running (forced)");
    } else if job.use_lock {
        let stage = job.stage.clone();
        let recorded = job.recorded.clone();
        // The reason is "up-to-date" exactly when every freshness
        // predicate holds, so one pass decides both verdict and message.
        let reason = tokio::task::spawn_blocking(move || {
            freshness::freshness_reason(&stage, recorded.as_ref())
        })
        .await
        .unwrap_or_else(|join_err| {
            warn!(error = %join_err, "freshness check aborted");
            String::new()
        });

        if reason == "up-to-date" {
            eprintln!("  ⊙ {name}: {reason}");
            return Ok(ExecutionResult::skipped(name, reason));
        }
        if reason.is_empty() {
            eprintln!("  ⟳ {name}: running...");
        } else {
            eprintln!("  ⟳ {name}: running ({reason})");
        }
    } else {
        let status = job.runner.check_status(&name).await?;
        if status.is_fresh {
            eprintln!("  ⊙ {name}: {}", status.message);
            return Ok(ExecutionResult::skipped(name, status.message));
        }
        eprintln!("  ⟳ {name}: running...");
    }

    if let Err(err) = job.runner.run(&name).await {
        if matches!(err, RunnerError::DvcNotFound) {
            eprintln!("  ✗ {name}: {err}");
            return Err(err);
        }
        eprintln!("  ✗ {name}: failed");
        return Ok(ExecutionResult::failed(name, err.to_string()));
    }

    if let Some(store) = job.lock_store {
        let stage = job.stage.clone();
        let committed =
            tokio::task::spawn_blocking(move || commit_stage_state(&store, &stage)).await;
        match committed {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                eprintln!("  ✗ {name}: failed to record state");
                return Ok(ExecutionResult::failed(
                    name,
                    format!("lock update failed: {err}"),
                ));
            }
            Err(join_err) => {
                eprintln!("  ✗ {name}: failed to record state");
                return Ok(ExecutionResult::failed(name, join_err.to_string()));
            }
        }
    }

    eprintln!("  ✓ {name}: completed");
    Ok(ExecutionResult::completed(name))
}

/// Hash the stage's declared files and merge its entry into the manifest.
fn commit_stage_state(store: &LockStore, stage: &Stage) -> Result<(), LockError> {
    let deps_hashes = hash_paths(&stage.name, "dep", &stage.deps);
    let outs_hashes = hash_paths(&stage.name, "out", &stage.outs);
    store.update(stage, &deps_hashes, &outs_hashes)
}

/// Digest each path; a file that cannot be hashed is warned about and
/// left out of the manifest entry rather than failing the stage.
fn hash_paths(stage_name: &str, role: &str, paths: &[String]) -> BTreeMap<String, String> {
    let mut hashes = BTreeMap::new();
    for path in paths {
        match hash::digest(Path::new(path)) {
            Ok(md5) => {
                hashes.insert(path.clone(), md5);
            }
            Err(err) => {
                eprintln!("  ⚠ {stage_name}: warning - couldn't hash {role} {path}: {err}");
                warn!(stage = %stage_name, path = %path, error = %err, "skipping unhashable {}", role);
            }
        }
    }
    hashes
}

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;
