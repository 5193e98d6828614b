// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! DAG visualization export: GraphViz DOT, Mermaid, and rendered SVG.

use crate::dag::Dag;
use std::path::Path;
use std::process::Stdio;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Errors from visualization export
#[derive(Debug, Error)]
pub enum VizError {
    #[error("GraphViz 'dot' command not found - install graphviz to render SVG")]
    DotNotFound,

    #[error("failed to generate SVG: {0}")]
    DotFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// GraphViz DOT representation, nodes and edges in sorted order.
pub fn to_dot(dag: &Dag) -> String {
    let mut names: Vec<&str> = dag.names().collect();
    names.sort_unstable();

    let mut lines = vec![
        "digraph pipeline {".to_string(),
        "  rankdir=LR;".to_string(),
        "  node [shape=box, style=rounded];".to_string(),
        String::new(),
    ];

    for name in &names {
        lines.push(format!("  \"{name}\";"));
    }
    lines.push(String::new());

    for name in &names {
        for dep in dag.dependencies_of(name) {
            lines.push(format!("  \"{dep}\" -> \"{name}\";"));
        }
    }

    lines.push("}".to_string());
    lines.join("\n")
}

/// Mermaid `graph LR` representation; stages without edges appear as
/// standalone nodes.
pub fn to_mermaid(dag: &Dag) -> String {
    let mut names: Vec<&str> = dag.names().collect();
    names.sort_unstable();

    let mut lines = vec!["graph LR".to_string()];
    for name in &names {
        let mut had_edge = false;
        for dep in dag.dependencies_of(name) {
            lines.push(format!("  {dep} --> {name}"));
            had_edge = true;
        }
        if !had_edge {
            lines.push(format!("  {name}"));
        }
    }
    lines.join("\n")
}

/// Render the graph to SVG by piping DOT text through GraphViz.
pub async fn render_svg(dag: &Dag, output: &Path) -> Result<(), VizError> {
    let dot_text = to_dot(dag);

    let mut child = Command::new("dot")
        .arg("-Tsvg")
        .arg("-o")
        .arg(output)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|err| {
            if err.kind() == std::io::ErrorKind::NotFound {
                VizError::DotNotFound
            } else {
                VizError::Io(err)
            }
        })?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(dot_text.as_bytes()).await?;
        // Dropping stdin closes the pipe so dot sees EOF
    }

    let done = child.wait_with_output().await?;
    if !done.status.success() {
        let stderr = String::from_utf8_lossy(&done.stderr).trim().to_string();
        return Err(VizError::DotFailed(stderr));
    }
    Ok(())
}

#[cfg(test)]
#[path = "viz_tests.rs"]
mod tests;
