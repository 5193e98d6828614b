//! Execution specs: fresh runs, parallel levels, failures, dry-run.

use crate::prelude::*;

#[test]
fn fresh_run_executes_and_records_the_stage() {
    let p = Project::empty();
    p.pipeline(&[stage("a", r#"echo "a" > a.txt"#).out("a.txt")]);

    p.stagerun()
        .passes()
        .stderr_has("Executed: 1")
        .stderr_has("Skipped (up-to-date): 0");

    assert_eq!(p.read("a.txt"), "a\n");

    let lock = read_lock(&p);
    let entry = &lock["stages"]["a"];
    assert_eq!(entry["cmd"].as_str().unwrap(), r#"echo "a" > a.txt"#);
    assert_eq!(entry["outs"][0]["path"].as_str().unwrap(), "a.txt");
    assert_eq!(entry["outs"][0]["md5"].as_str().unwrap(), md5_hex(b"a\n"));
    assert_eq!(entry["outs"][0]["size"].as_u64().unwrap(), 2);
}

#[test]
fn independent_stages_share_a_level_and_feed_consumers() {
    let p = Project::empty();
    p.pipeline(&[
        stage("a", r#"echo "a" > a.txt"#).out("a.txt"),
        stage("b", r#"echo "b" > b.txt"#).out("b.txt"),
        stage("c", "cat a.txt b.txt > c.txt")
            .dep("a.txt")
            .dep("b.txt")
            .out("c.txt"),
    ]);

    p.stagerun()
        .passes()
        .stderr_has("Level 1: a, b")
        .stderr_has("Level 2: c")
        .stderr_has("Executed: 3");

    assert_eq!(p.read("c.txt"), "a\nb\n");
}

#[test]
fn failing_stage_exits_nonzero_without_recording() {
    let p = Project::empty();
    p.pipeline(&[stage("a", "exit 1").out("o.txt")]);

    p.stagerun().fails().code(1).stderr_has("failed");

    assert!(!p.exists("dvc.lock"), "failed stage must not be recorded");
}

#[test]
fn failing_stage_blocks_dependents() {
    let p = Project::empty();
    p.pipeline(&[
        stage("a", "exit 1").out("a.txt"),
        stage("b", "cat a.txt > b.txt").dep("a.txt").out("b.txt"),
    ]);

    p.stagerun().fails().stderr_has("stage(s) failed: a");
    assert!(!p.exists("b.txt"), "b must never run");
}

#[test]
fn dry_run_prints_the_plan_and_touches_nothing() {
    let p = Project::empty();
    p.pipeline(&[stage("a", r#"echo "a" > a.txt"#).out("a.txt")]);

    p.stagerun()
        .args(&["--dry-run"])
        .passes()
        .stderr_has("Execution plan (1 levels, 1 stages):")
        .stderr_has("Dry run - no stages will be executed");

    assert!(!p.exists("a.txt"));
    assert!(!p.exists("dvc.lock"));
}

#[test]
fn targets_select_the_ancestor_closure() {
    let p = Project::empty();
    p.pipeline(&[
        stage("a", r#"echo "a" > a.txt"#).out("a.txt"),
        stage("b", "cat a.txt > b.txt").dep("a.txt").out("b.txt"),
        stage("unrelated", "echo u > u.txt").out("u.txt"),
    ]);

    p.stagerun()
        .args(&["b"])
        .passes()
        .stderr_has("Executed: 2");

    assert!(p.exists("a.txt"));
    assert!(p.exists("b.txt"));
    assert!(!p.exists("u.txt"), "unrelated stage must not run");
}

#[test]
fn jobs_flag_limits_workers_without_changing_results() {
    let p = Project::empty();
    p.pipeline(&[
        stage("a", "echo a > a.txt").out("a.txt"),
        stage("b", "echo b > b.txt").out("b.txt"),
        stage("c", "echo c > c.txt").out("c.txt"),
    ]);

    p.stagerun().args(&["-j", "1"]).passes().stderr_has("Executed: 3");

    assert!(p.exists("a.txt") && p.exists("b.txt") && p.exists("c.txt"));
}

#[test]
fn no_lock_mode_defers_freshness_to_dvc_status() {
    let p = Project::empty();
    p.pipeline(&[stage("a", r#"echo "a" > a.txt"#).out("a.txt")]);

    // The shim's `dvc status` reports everything up to date
    p.stagerun()
        .args(&["--no-lock"])
        .passes()
        .stderr_has("Skipped (up-to-date): 1")
        .stderr_has("Executed: 0");

    assert!(!p.exists("a.txt"));
}

#[test]
fn custom_pipeline_path_is_honored() {
    let p = Project::empty();
    p.pipeline(&[stage("a", "echo a > a.txt").out("a.txt")]);
    let yaml = p.read("dvc.yaml");
    p.file("pipelines/build.yaml", &yaml);

    p.stagerun()
        .args(&["-f", "pipelines/build.yaml"])
        .passes()
        .stderr_has("Executed: 1");
}
