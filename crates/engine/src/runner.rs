// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stage runner: the bridge to the external `dvc` binary.
//!
//! Commands are executed through `dvc repro --single-item` so dvc applies
//! its own bookkeeping; the scheduler has already ordered the stages, so
//! dvc must not recurse into dependencies itself.

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;

/// Errors from invoking dvc
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("dvc command not found - is DVC installed? Install with: pip install dvc")]
    DvcNotFound,

    #[error("stage '{stage}' failed:\nstdout: {stdout}\nstderr: {stderr}")]
    StageFailed {
        stage: String,
        stdout: String,
        stderr: String,
    },

    #[error("failed to invoke dvc: {0}")]
    Io(#[from] std::io::Error),
}

/// Captured output of a successful stage run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Freshness verdict from `dvc status` (used only when the lock-based
/// oracle is disabled).
#[derive(Debug, Clone)]
pub struct StageStatus {
    pub name: String,
    pub is_fresh: bool,
    pub message: String,
}

/// Executes stages and answers status queries.
#[async_trait]
pub trait StageRunner: Send + Sync {
    /// Run one stage to completion, buffering its output.
    async fn run(&self, stage_name: &str) -> Result<RunOutput, RunnerError>;

    /// Ask whether a stage is up-to-date.
    async fn check_status(&self, stage_name: &str) -> Result<StageStatus, RunnerError>;
}

/// The real dvc client.
#[derive(Debug, Clone, Copy, Default)]
pub struct DvcRunner;

impl DvcRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl StageRunner for DvcRunner {
    async fn run(&self, stage_name: &str) -> Result<RunOutput, RunnerError> {
        let output = Command::new("dvc")
            .args(["repro", "--single-item", stage_name])
            .output()
            .await
            .map_err(map_spawn_error)?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if output.status.success() {
            Ok(RunOutput { stdout, stderr })
        } else {
            Err(RunnerError::StageFailed {
                stage: stage_name.to_string(),
                stdout,
                stderr,
            })
        }
    }

    async fn check_status(&self, stage_name: &str) -> Result<StageStatus, RunnerError> {
        let output = Command::new("dvc")
            .args(["status", stage_name])
            .output()
            .await
            .map_err(map_spawn_error)?;

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        let is_fresh = output.status.success()
            && (stdout.is_empty() || stdout.to_lowercase().contains("up to date"));
        let message = if stdout.is_empty() {
            "up to date".to_string()
        } else {
            stdout
        };

        Ok(StageStatus {
            name: stage_name.to_string(),
            is_fresh,
            message,
        })
    }
}

fn map_spawn_error(err: std::io::Error) -> RunnerError {
    if err.kind() == std::io::ErrorKind::NotFound {
        RunnerError::DvcNotFound
    } else {
        RunnerError::Io(err)
    }
}
