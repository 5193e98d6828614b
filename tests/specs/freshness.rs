//! Freshness specs: skipping, out-of-band changes, command edits, force.

use crate::prelude::*;

#[test]
fn second_run_skips_everything() {
    let p = Project::empty();
    p.pipeline(&[stage("a", r#"echo "a" > a.txt"#).out("a.txt")]);

    p.stagerun().passes().stderr_has("Executed: 1");

    let first_contents = p.read("a.txt");
    p.stagerun()
        .passes()
        .stderr_has("up-to-date")
        .stderr_has("Executed: 0")
        .stderr_has("Skipped (up-to-date): 1");

    assert_eq!(p.read("a.txt"), first_contents);
}

#[test]
fn out_of_band_output_change_triggers_rerun() {
    let p = Project::empty();
    p.pipeline(&[stage("a", r#"echo "a" > a.txt"#).out("a.txt")]);
    p.stagerun().passes();

    // Clobber the output behind the pipeline's back
    p.file("a.txt", "x");

    p.stagerun()
        .passes()
        .stderr_has("output changed: a.txt")
        .stderr_has("Executed: 1");

    // The command rewrote the file, so the recorded hash is restored
    let lock = read_lock(&p);
    assert_eq!(
        lock["stages"]["a"]["outs"][0]["md5"].as_str().unwrap(),
        md5_hex(b"a\n")
    );
    assert_eq!(p.read("a.txt"), "a\n");
}

#[test]
fn deleted_output_triggers_rerun() {
    let p = Project::empty();
    p.pipeline(&[stage("a", r#"echo "a" > a.txt"#).out("a.txt")]);
    p.stagerun().passes();

    std::fs::remove_file(p.path().join("a.txt")).unwrap();

    p.stagerun()
        .passes()
        .stderr_has("missing output: a.txt")
        .stderr_has("Executed: 1");

    assert_eq!(p.read("a.txt"), "a\n");
}

#[test]
fn changed_dependency_triggers_rerun() {
    let p = Project::empty();
    p.file("input.txt", "v1\n");
    p.pipeline(&[stage("copy", "cat input.txt > copy.txt")
        .dep("input.txt")
        .out("copy.txt")]);

    p.stagerun().passes().stderr_has("Executed: 1");
    p.stagerun().passes().stderr_has("Executed: 0");

    p.file("input.txt", "v2\n");
    p.stagerun()
        .passes()
        .stderr_has("dependency changed: input.txt")
        .stderr_has("Executed: 1");

    assert_eq!(p.read("copy.txt"), "v2\n");
}

#[test]
fn changed_command_triggers_rerun() {
    let p = Project::empty();
    p.pipeline(&[stage("a", r#"echo "a" > a.txt"#).out("a.txt")]);
    p.stagerun().passes();

    // Same stage name, new command
    p.pipeline(&[stage("a", r#"echo "A" > a.txt"#).out("a.txt")]);
    p.stagerun()
        .passes()
        .stderr_has("command changed")
        .stderr_has("Executed: 1");

    assert_eq!(p.read("a.txt"), "A\n");
}

#[test]
fn force_reruns_fresh_stages() {
    let p = Project::empty();
    p.pipeline(&[stage("a", r#"echo "a" > a.txt"#).out("a.txt")]);
    p.stagerun().passes();

    p.stagerun()
        .args(&["--force"])
        .passes()
        .stderr_has("running (forced)")
        .stderr_has("Executed: 1")
        .stderr_has("Skipped (up-to-date): 0");
}

#[test]
fn only_stale_stages_rerun_in_a_mixed_pipeline() {
    let p = Project::empty();
    p.pipeline(&[
        stage("a", r#"echo "a" > a.txt"#).out("a.txt"),
        stage("b", r#"echo "b" > b.txt"#).out("b.txt"),
    ]);
    p.stagerun().passes().stderr_has("Executed: 2");

    p.file("b.txt", "stale");
    p.stagerun()
        .passes()
        .stderr_has("Executed: 1")
        .stderr_has("Skipped (up-to-date): 1");
}
