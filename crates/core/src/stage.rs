// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stage definitions and per-stage execution results.

use serde::{Deserialize, Serialize};

/// A single pipeline stage from dvc.yaml.
///
/// Stages are immutable after parsing: the engine never rewrites a stage,
/// it only records the stage's observed state in the lock manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage {
    /// Stage name (the key under `stages:` in dvc.yaml)
    pub name: String,
    /// Shell command; a multi-command list is joined with `&&` at parse time
    pub cmd: String,
    /// Declared input paths (files or directories)
    #[serde(default)]
    pub deps: Vec<String>,
    /// Declared output paths (files or directories)
    #[serde(default)]
    pub outs: Vec<String>,
    /// Optional free-form description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desc: Option<String>,
}

impl Stage {
    /// Create a stage with no deps or outs.
    pub fn new(name: impl Into<String>, cmd: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cmd: cmd.into(),
            deps: Vec::new(),
            outs: Vec::new(),
            desc: None,
        }
    }

    /// Builder-style helper to set dependencies.
    pub fn with_deps(mut self, deps: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.deps = deps.into_iter().map(Into::into).collect();
        self
    }

    /// Builder-style helper to set outputs.
    pub fn with_outs(mut self, outs: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.outs = outs.into_iter().map(Into::into).collect();
        self
    }
}

/// Outcome of executing (or skipping) one stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub stage_name: String,
    pub success: bool,
    pub skipped: bool,
    pub message: String,
}

impl ExecutionResult {
    /// Stage ran and completed.
    pub fn completed(stage_name: impl Into<String>) -> Self {
        Self {
            stage_name: stage_name.into(),
            success: true,
            skipped: false,
            message: "completed".to_string(),
        }
    }

    /// Stage was up-to-date and skipped.
    pub fn skipped(stage_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            stage_name: stage_name.into(),
            success: true,
            skipped: true,
            message: reason.into(),
        }
    }

    /// Stage ran and failed.
    pub fn failed(stage_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            stage_name: stage_name.into(),
            success: false,
            skipped: false,
            message: message.into(),
        }
    }
}

#[cfg(test)]
#[path = "stage_tests.rs"]
mod tests;
