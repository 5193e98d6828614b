// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! MD5 content digests for files and directory trees.
//!
//! MD5 (not SHA-2) because the digests must interop with hashes already
//! recorded in dvc.lock by `dvc repro`; this is change detection, not
//! cryptography.

use md5::{Digest, Md5};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

/// Errors that can occur while hashing a path
#[derive(Debug, Error)]
pub enum HashError {
    #[error("path not found: {0}")]
    FileMissing(PathBuf),

    #[error("unsupported file type: {0}")]
    Unsupported(PathBuf),

    #[error("error reading {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// What kind of filesystem object a path resolves to.
enum PathKind {
    RegularFile,
    Directory,
}

/// Stat the path once; everything downstream branches on the result.
fn classify(path: &Path) -> Result<PathKind, HashError> {
    // metadata() follows symlinks, so a link to a file hashes as a file.
    let meta = match std::fs::metadata(path) {
        Ok(meta) => meta,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Err(HashError::FileMissing(path.to_path_buf()))
        }
        Err(err) => {
            return Err(HashError::Io {
                path: path.to_path_buf(),
                source: err,
            })
        }
    };

    if meta.is_file() {
        Ok(PathKind::RegularFile)
    } else if meta.is_dir() {
        Ok(PathKind::Directory)
    } else {
        Err(HashError::Unsupported(path.to_path_buf()))
    }
}

/// Compute the 32-char lowercase hex MD5 digest of a file or directory.
///
/// For a directory, every regular file is folded into a single digest in
/// sorted relative-path order, with the `/`-normalized relative path and a
/// NUL separator mixed in before and after each file's contents. The digest
/// therefore changes iff any contained file's path or content changes.
pub fn digest(path: &Path) -> Result<String, HashError> {
    match classify(path)? {
        PathKind::RegularFile => digest_file(path),
        PathKind::Directory => digest_dir(path),
    }
}

/// Size of a file, or the sum of regular-file sizes under a directory.
pub fn size_on_disk(path: &Path) -> Result<u64, HashError> {
    match classify(path)? {
        PathKind::RegularFile => {
            let meta = std::fs::metadata(path).map_err(|source| HashError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            Ok(meta.len())
        }
        PathKind::Directory => {
            let mut total = 0u64;
            for entry in walk_files(path)? {
                let meta = entry.metadata().map_err(|err| HashError::Io {
                    path: entry.path().to_path_buf(),
                    source: err.into(),
                })?;
                total += meta.len();
            }
            Ok(total)
        }
    }
}

fn digest_file(path: &Path) -> Result<String, HashError> {
    let mut hasher = Md5::new();
    stream_into(path, &mut hasher)?;
    Ok(format!("{:x}", hasher.finalize()))
}

fn digest_dir(root: &Path) -> Result<String, HashError> {
    let mut files: Vec<(String, PathBuf)> = walk_files(root)?
        .into_iter()
        .map(|entry| {
            let rel = relative_key(root, entry.path());
            (rel, entry.into_path())
        })
        .collect();
    files.sort();

    let mut hasher = Md5::new();
    for (rel, path) in files {
        hasher.update(rel.as_bytes());
        hasher.update([0u8]);
        stream_into(&path, &mut hasher)?;
        hasher.update([0u8]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// Collect regular files under `root`, following symlinks.
fn walk_files(root: &Path) -> Result<Vec<walkdir::DirEntry>, HashError> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).follow_links(true) {
        let entry = entry.map_err(|err| {
            let path = err
                .path()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| root.to_path_buf());
            HashError::Io {
                path,
                source: err.into(),
            }
        })?;
        if entry.file_type().is_file() {
            files.push(entry);
        }
    }
    Ok(files)
}

/// Relative path from `root` with components joined by `/`, regardless of
/// the platform separator, so digests are portable.
fn relative_key(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn stream_into(path: &Path, hasher: &mut Md5) -> Result<(), HashError> {
    let io_err = |source| HashError::Io {
        path: path.to_path_buf(),
        source,
    };

    let mut file = File::open(path).map_err(io_err)?;
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf).map_err(io_err)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(())
}

#[cfg(test)]
#[path = "hash_tests.rs"]
mod tests;
