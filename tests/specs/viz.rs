//! Visualization export specs.

use crate::prelude::*;

fn diamond(p: &Project) {
    p.pipeline(&[
        stage("a", "echo a > a.txt").out("a.txt"),
        stage("b", "cat a.txt > b.txt").dep("a.txt").out("b.txt"),
    ]);
}

#[test]
fn dot_export_writes_the_graph_without_executing() {
    let p = Project::empty();
    diamond(&p);

    p.stagerun()
        .args(&["--dot", "dag.dot"])
        .passes()
        .stderr_has("Exported DOT to dag.dot");

    let dot = p.read("dag.dot");
    assert!(dot.starts_with("digraph pipeline {"));
    assert!(dot.contains("\"a\" -> \"b\";"));

    assert!(!p.exists("a.txt"), "export must not execute stages");
}

#[test]
fn mermaid_export_writes_the_graph() {
    let p = Project::empty();
    diamond(&p);

    p.stagerun()
        .args(&["--mermaid", "dag.mmd"])
        .passes()
        .stderr_has("Exported Mermaid to dag.mmd");

    let mermaid = p.read("dag.mmd");
    assert!(mermaid.starts_with("graph LR"));
    assert!(mermaid.contains("a --> b"));
}

#[test]
fn both_exports_can_be_written_in_one_invocation() {
    let p = Project::empty();
    diamond(&p);

    p.stagerun()
        .args(&["--dot", "dag.dot", "--mermaid", "dag.mmd"])
        .passes();

    assert!(p.exists("dag.dot"));
    assert!(p.exists("dag.mmd"));
}
