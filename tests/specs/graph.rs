//! Graph validation specs: cycles, collisions, unknown targets, bad specs.

use crate::prelude::*;

#[test]
fn cycle_is_detected_before_anything_runs() {
    let p = Project::empty();
    p.pipeline(&[
        stage("a", "cat b.txt > a.txt").dep("b.txt").out("a.txt"),
        stage("b", "cat a.txt > b.txt").dep("a.txt").out("b.txt"),
    ]);

    p.stagerun()
        .fails()
        .code(1)
        .stderr_has("Circular dependency detected: a -> b -> a");

    assert!(!p.exists("a.txt"));
    assert!(!p.exists("dvc.lock"));
}

#[test]
fn output_collision_is_rejected() {
    let p = Project::empty();
    p.pipeline(&[
        stage("first", "echo 1 > shared.txt").out("shared.txt"),
        stage("second", "echo 2 > shared.txt").out("shared.txt"),
    ]);

    p.stagerun()
        .fails()
        .code(1)
        .stderr_has("shared.txt")
        .stderr_has("declared by both");
}

#[test]
fn unknown_target_is_rejected() {
    let p = Project::empty();
    p.pipeline(&[stage("a", "echo a > a.txt").out("a.txt")]);

    p.stagerun()
        .args(&["nonexistent"])
        .fails()
        .code(1)
        .stderr_has("unknown stage: nonexistent");
}

#[test]
fn missing_pipeline_file_is_an_error() {
    let p = Project::empty();

    p.stagerun()
        .fails()
        .code(1)
        .stderr_has("pipeline file not found");
}

#[test]
fn empty_stages_section_reports_no_stages() {
    let p = Project::empty();
    p.file("dvc.yaml", "stages: {}\n");

    p.stagerun().fails().code(1).stderr_has("No stages found");
}

#[test]
fn stage_without_cmd_is_rejected() {
    let p = Project::empty();
    p.file("dvc.yaml", "stages:\n  broken:\n    deps:\n      - a.txt\n");

    p.stagerun()
        .fails()
        .code(1)
        .stderr_has("missing required 'cmd' field");
}

#[test]
fn corrupt_lock_file_is_a_hard_error() {
    let p = Project::empty();
    p.pipeline(&[stage("a", "echo a > a.txt").out("a.txt")]);
    p.file("dvc.lock", "stages: [truncated");

    p.stagerun().fails().code(1).stderr_has("corrupt manifest");
}
