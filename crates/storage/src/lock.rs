// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! dvc.lock persistence with cross-process mutual exclusion.
//!
//! Readers never take the lock: writes replace the whole file atomically
//! (write to `.tmp`, then rename), so a concurrent reader sees either the
//! old or the new manifest, never a torn one. Writers serialize through an
//! exclusive advisory lock on the sidecar `<manifest>.lock` file for the
//! whole read-modify-write cycle, so no worker's update is lost.

use fs2::FileExt;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

use stagerun_core::{FileInfo, LockedStage, Manifest, Stage, StageState};

use crate::hash;

/// How many times to retry the sidecar lock before giving up.
const LOCK_ATTEMPTS: u32 = 16;
/// Pause between lock attempts. A manifest rewrite takes a few
/// milliseconds, so the full window only trips on a wedged process.
const LOCK_RETRY_DELAY: Duration = Duration::from_millis(250);

/// Errors that can occur reading or updating the manifest
#[derive(Debug, Error)]
pub enum LockError {
    #[error("corrupt manifest at {path}: {source}")]
    Corrupt {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("could not lock {path} after {attempts} attempts: another process holds it")]
    Contended { path: PathBuf, attempts: u32 },

    #[error("failed to serialize manifest: {0}")]
    Serialize(serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Store for the dvc.lock manifest.
///
/// Cheap to clone; holds only the manifest path and its sidecar lock path.
#[derive(Debug, Clone)]
pub struct LockStore {
    path: PathBuf,
    sidecar: PathBuf,
}

impl LockStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut sidecar = path.clone().into_os_string();
        sidecar.push(".lock");
        Self {
            path,
            sidecar: PathBuf::from(sidecar),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the recorded state of every stage.
    ///
    /// An absent manifest, or one without a stages section, reads as empty.
    /// Unparseable content is a hard error: silently treating a corrupt
    /// manifest as empty would re-run the whole pipeline.
    pub fn read(&self) -> Result<BTreeMap<String, StageState>, LockError> {
        Ok(self.read_manifest()?.stage_states())
    }

    /// Merge one stage's new state into the manifest on disk.
    ///
    /// `deps_hashes` and `outs_hashes` map path → md5 for every file the
    /// caller managed to hash; files missing from the maps are left out of
    /// the entry. Sizes are re-measured from disk here. The entry replaces
    /// any previous record for the stage; all other stages are preserved.
    pub fn update(
        &self,
        stage: &Stage,
        deps_hashes: &BTreeMap<String, String>,
        outs_hashes: &BTreeMap<String, String>,
    ) -> Result<(), LockError> {
        let guard = self.acquire_sidecar()?;

        let mut manifest = self.read_manifest()?;
        let entry = LockedStage {
            cmd: stage.cmd.clone(),
            deps: file_entries(deps_hashes),
            outs: file_entries(outs_hashes),
        };
        manifest.stages.insert(stage.name.clone(), entry);

        self.replace(&manifest)?;
        drop(guard);
        Ok(())
    }

    fn read_manifest(&self) -> Result<Manifest, LockError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Manifest::default())
            }
            Err(err) => return Err(err.into()),
        };

        // serde_yaml maps an all-whitespace document to null, which cannot
        // deserialize into a struct; treat it like an absent file.
        let manifest: Option<Manifest> =
            serde_yaml::from_str(&text).map_err(|source| LockError::Corrupt {
                path: self.path.clone(),
                source,
            })?;
        Ok(manifest.unwrap_or_default())
    }

    /// Write the manifest to a sibling temp file, then rename into place.
    fn replace(&self, manifest: &Manifest) -> Result<(), LockError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let tmp_path = self.path.with_extension("tmp");
        {
            let file = File::create(&tmp_path)?;
            let mut writer = BufWriter::new(file);
            let text = serde_yaml::to_string(manifest).map_err(LockError::Serialize)?;
            writer.write_all(text.as_bytes())?;
            let file = writer.into_inner().map_err(|e| e.into_error())?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }

    /// Take the exclusive sidecar lock, retrying over a bounded window.
    fn acquire_sidecar(&self) -> Result<SidecarGuard, LockError> {
        let file = File::create(&self.sidecar)?;
        for attempt in 1..=LOCK_ATTEMPTS {
            match file.try_lock_exclusive() {
                Ok(()) => return Ok(SidecarGuard { file }),
                Err(err) if attempt == LOCK_ATTEMPTS => {
                    warn!(
                        path = %self.sidecar.display(),
                        error = %err,
                        "giving up on manifest lock"
                    );
                }
                Err(_) => std::thread::sleep(LOCK_RETRY_DELAY),
            }
        }
        Err(LockError::Contended {
            path: self.sidecar.clone(),
            attempts: LOCK_ATTEMPTS,
        })
    }
}

/// Holds the sidecar lock; released on drop.
struct SidecarGuard {
    file: File,
}

impl Drop for SidecarGuard {
    fn drop(&mut self) {
        if let Err(err) = FileExt::unlock(&self.file) {
            warn!(error = %err, "failed to release manifest lock");
        }
    }
}

fn file_entries(hashes: &BTreeMap<String, String>) -> Vec<FileInfo> {
    // BTreeMap iteration gives the path-sorted order the format requires.
    hashes
        .iter()
        .map(|(path, md5)| {
            let size = hash::size_on_disk(Path::new(path)).unwrap_or(0);
            FileInfo::new(path.clone(), md5.clone(), size)
        })
        .collect()
}

#[cfg(test)]
#[path = "lock_tests.rs"]
mod tests;
