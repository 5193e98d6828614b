// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The freshness oracle: decides whether a stage can be skipped.
//!
//! A stage is fresh iff it has run before, its command is byte-identical
//! to the recorded one, and every declared dep AND out still exists with
//! its recorded digest. Outputs are checked too so an externally deleted
//! or edited output forces a re-run.

use stagerun_core::{FileInfo, Stage, StageState};
use stagerun_storage::hash;
use std::path::Path;

/// True when the stage may be skipped.
pub fn is_fresh(stage: &Stage, recorded: Option<&StageState>) -> bool {
    let Some(state) = recorded else {
        return false;
    };
    if stage.cmd != state.cmd {
        return false;
    }

    stage.deps.iter().all(|p| file_matches(p, state.deps.get(p)))
        && stage.outs.iter().all(|p| file_matches(p, state.outs.get(p)))
}

fn file_matches(path_str: &str, recorded: Option<&FileInfo>) -> bool {
    let Some(info) = recorded else {
        return false;
    };
    let path = Path::new(path_str);
    if !path.exists() {
        return false;
    }
    // An unreadable file is always a reason to re-run
    match hash::digest(path) {
        Ok(md5) => md5 == info.md5,
        Err(_) => false,
    }
}

/// Human-readable verdict: the first failing predicate, in check order,
/// or `"up-to-date"` when every predicate holds.
pub fn freshness_reason(stage: &Stage, recorded: Option<&StageState>) -> String {
    let Some(state) = recorded else {
        return "never run before".to_string();
    };
    if stage.cmd != state.cmd {
        return "command changed".to_string();
    }

    for path in &stage.deps {
        if let Some(reason) = file_reason(path, state.deps.get(path), "dependency") {
            return reason;
        }
    }
    for path in &stage.outs {
        if let Some(reason) = file_reason(path, state.outs.get(path), "output") {
            return reason;
        }
    }

    "up-to-date".to_string()
}

fn file_reason(path_str: &str, recorded: Option<&FileInfo>, role: &str) -> Option<String> {
    let Some(info) = recorded else {
        return Some(format!("new {role}: {path_str}"));
    };
    let path = Path::new(path_str);
    if !path.exists() {
        return Some(format!("missing {role}: {path_str}"));
    }
    match hash::digest(path) {
        Ok(md5) if md5 == info.md5 => None,
        Ok(_) => Some(format!("{role} changed: {path_str}")),
        Err(_) => Some(format!("error reading {role}: {path_str}")),
    }
}

#[cfg(test)]
#[path = "freshness_tests.rs"]
mod tests;
