// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Run summary formatting.

use stagerun_core::ExecutionResult;

/// Build the end-of-run summary block printed to stderr.
pub fn summary(results: &[ExecutionResult]) -> String {
    let total = results.len();
    let executed = results.iter().filter(|r| r.success && !r.skipped).count();
    let skipped = results.iter().filter(|r| r.skipped).count();
    let failed = results.iter().filter(|r| !r.success).count();

    let mut out = String::new();
    out.push_str("\nSummary:\n");
    out.push_str(&format!("  Total stages: {total}\n"));
    out.push_str(&format!("  Executed: {executed}\n"));
    out.push_str(&format!("  Skipped (up-to-date): {skipped}\n"));
    if failed > 0 {
        out.push_str(&format!("  Failed: {failed}\n"));
    }
    out
}

#[cfg(test)]
#[path = "report_tests.rs"]
mod tests;
