// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! stagerun execution engine: dependency graph, freshness oracle, and the
//! layered parallel scheduler.

mod dag;
mod executor;
mod freshness;
mod runner;
mod viz;

pub use dag::{Dag, DagError};
pub use executor::{ExecOptions, ExecuteError, Executor};
pub use freshness::{freshness_reason, is_fresh};
pub use runner::{DvcRunner, RunOutput, RunnerError, StageRunner, StageStatus};
pub use viz::{render_svg, to_dot, to_mermaid, VizError};
