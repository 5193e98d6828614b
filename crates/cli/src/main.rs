// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! stagerun - run DVC pipeline stages in parallel

mod report;

use clap::Parser;
use stagerun_engine::{Dag, DvcRunner, ExecOptions, ExecuteError, Executor};
use stagerun_pipeline::parse_pipeline;
use std::path::PathBuf;
use std::sync::Arc;

/// Exit code used when the run is interrupted by ctrl-c.
const EXIT_INTERRUPTED: i32 = 130;

#[derive(Parser)]
#[command(
    name = "stagerun",
    version,
    about = "Run DVC pipeline stages in parallel",
    long_about = "stagerun reads dvc.yaml, builds a dependency graph, and executes \
independent stages in parallel, skipping stages whose inputs, outputs, and \
command are unchanged since the last run recorded in dvc.lock."
)]
struct Cli {
    /// Stages to run (with their transitive dependencies); all when omitted
    #[arg(value_name = "STAGE")]
    targets: Vec<String>,

    /// Show the execution plan without running stages
    #[arg(short = 'd', long = "dry-run")]
    dry_run: bool,

    /// Number of parallel jobs (default: CPU count)
    #[arg(short = 'j', long = "jobs", value_name = "N")]
    jobs: Option<usize>,

    /// Path to the dvc.yaml pipeline file
    #[arg(
        short = 'f',
        long = "file",
        value_name = "PATH",
        default_value = "dvc.yaml"
    )]
    file: PathBuf,

    /// Path to the dvc.lock manifest
    #[arg(long = "lock", value_name = "PATH", default_value = "dvc.lock")]
    lock: PathBuf,

    /// Re-run every stage, ignoring recorded freshness
    #[arg(long = "force")]
    force: bool,

    /// Decide freshness with `dvc status` instead of dvc.lock
    #[arg(long = "no-lock")]
    no_lock: bool,

    /// Enable verbose output
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,

    /// Export the DAG as GraphViz DOT to a file
    #[arg(long = "dot", value_name = "FILE")]
    dot: Option<PathBuf>,

    /// Export the DAG as SVG to a file (requires graphviz)
    #[arg(long = "svg", value_name = "FILE")]
    svg: Option<PathBuf>,

    /// Export the DAG as a Mermaid diagram to a file
    #[arg(long = "mermaid", value_name = "FILE")]
    mermaid: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let code = tokio::select! {
        code = run(cli) => code,
        _ = tokio::signal::ctrl_c() => {
            eprintln!("\nInterrupted");
            EXIT_INTERRUPTED
        }
    };
    std::process::exit(code);
}

async fn run(cli: Cli) -> i32 {
    match try_run(cli).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err}");
            1
        }
    }
}

async fn try_run(cli: Cli) -> anyhow::Result<i32> {
    if cli.verbose {
        eprintln!("Parsing {}...", cli.file.display());
    }

    let stages = parse_pipeline(&cli.file)?;
    if stages.is_empty() {
        eprintln!("No stages found in {}", cli.file.display());
        return Ok(1);
    }
    if cli.verbose {
        eprintln!("Found {} stage(s)", stages.len());
    }

    let dag = Dag::new(stages)?;
    if let Some(cycle) = dag.check_cycles() {
        eprintln!(
            "Error: Circular dependency detected: {}",
            cycle.join(" -> ")
        );
        return Ok(1);
    }

    let dag = if cli.targets.is_empty() {
        dag
    } else {
        dag.filter_to_targets(&cli.targets)?
    };

    // Visualization exports replace execution
    if cli.dot.is_some() || cli.svg.is_some() || cli.mermaid.is_some() {
        export_visualizations(&cli, &dag).await?;
        return Ok(0);
    }

    let opts = ExecOptions {
        max_workers: cli.jobs,
        dry_run: cli.dry_run,
        force: cli.force,
        use_lock: !cli.no_lock,
        update_lock: !cli.no_lock,
        lock_path: cli.lock.clone(),
    };
    let executor = Executor::new(&dag, Arc::new(DvcRunner::new()), opts)?;

    match executor.execute().await {
        Ok(results) => {
            if !cli.dry_run {
                eprint!("{}", report::summary(&results));
            }
            Ok(0)
        }
        Err(err @ ExecuteError::StagesFailed(_)) => {
            eprintln!("Error: {err}");
            Ok(1)
        }
        Err(err) => Err(err.into()),
    }
}

async fn export_visualizations(cli: &Cli, dag: &Dag) -> anyhow::Result<()> {
    if let Some(path) = &cli.dot {
        std::fs::write(path, stagerun_engine::to_dot(dag))?;
        eprintln!("Exported DOT to {}", path.display());
    }
    if let Some(path) = &cli.svg {
        stagerun_engine::render_svg(dag, path).await?;
        eprintln!("Exported SVG to {}", path.display());
    }
    if let Some(path) = &cli.mermaid {
        std::fs::write(path, stagerun_engine::to_mermaid(dag))?;
        eprintln!("Exported Mermaid to {}", path.display());
    }
    Ok(())
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "info" } else { "warn" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;
