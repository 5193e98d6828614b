// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Document model for the dvc.lock manifest.
//!
//! The manifest is the persistent record of each stage's last-observed
//! command and file hashes. The on-disk shape is fixed by interop with
//! `dvc repro`: a `schema` tag plus a `stages` mapping whose deps/outs are
//! path-sorted sequences of `{path, md5, size}` records, omitted when empty.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Schema tag written to every manifest.
pub const LOCK_SCHEMA_VERSION: &str = "2.0";

/// One tracked file (or directory) in a stage's manifest entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    pub path: String,
    /// 32-char lowercase hex MD5 of the file contents (or directory tree)
    #[serde(default)]
    pub md5: String,
    /// Size in bytes; advisory, not consulted by the freshness check
    #[serde(default)]
    pub size: u64,
}

impl FileInfo {
    pub fn new(path: impl Into<String>, md5: impl Into<String>, size: u64) -> Self {
        Self {
            path: path.into(),
            md5: md5.into(),
            size,
        }
    }
}

/// Recorded state of one stage, keyed by path for O(log n) lookup.
///
/// This is the in-memory view the freshness oracle works against; the
/// serialized form is [`LockedStage`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StageState {
    pub cmd: String,
    pub deps: BTreeMap<String, FileInfo>,
    pub outs: BTreeMap<String, FileInfo>,
}

impl StageState {
    pub fn new(cmd: impl Into<String>) -> Self {
        Self {
            cmd: cmd.into(),
            deps: BTreeMap::new(),
            outs: BTreeMap::new(),
        }
    }
}

/// Serialized form of one stage entry in dvc.lock.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockedStage {
    #[serde(default)]
    pub cmd: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub deps: Vec<FileInfo>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub outs: Vec<FileInfo>,
}

impl LockedStage {
    /// Convert to the path-keyed in-memory view.
    pub fn to_state(&self) -> StageState {
        StageState {
            cmd: self.cmd.clone(),
            deps: index_by_path(&self.deps),
            outs: index_by_path(&self.outs),
        }
    }
}

fn index_by_path(entries: &[FileInfo]) -> BTreeMap<String, FileInfo> {
    entries
        .iter()
        .map(|info| (info.path.clone(), info.clone()))
        .collect()
}

/// The whole dvc.lock document.
///
/// Stage entries keep their on-disk order so a rewrite after updating one
/// stage produces a minimal diff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default = "default_schema")]
    pub schema: String,
    #[serde(default)]
    pub stages: IndexMap<String, LockedStage>,
}

fn default_schema() -> String {
    LOCK_SCHEMA_VERSION.to_string()
}

impl Default for Manifest {
    fn default() -> Self {
        Self {
            schema: LOCK_SCHEMA_VERSION.to_string(),
            stages: IndexMap::new(),
        }
    }
}

impl Manifest {
    /// Snapshot every stage entry into the path-keyed view.
    pub fn stage_states(&self) -> BTreeMap<String, StageState> {
        self.stages
            .iter()
            .map(|(name, entry)| (name.clone(), entry.to_state()))
            .collect()
    }
}

#[cfg(test)]
#[path = "manifest_tests.rs"]
mod tests;
