//! Integration tests for `kana-upgrade`.

use kana_state_upgrade::{TypedBuffer, UPGRADE_VERSION, Values};
use predicates::prelude::*;
use serde_json::json;
use tempfile::TempDir;

use crate::fixtures::legacy::{
    TAIL, file_names, kana_cmd, legacy_state, read_upgraded, typed, write_legacy,
};

struct Workspace {
    dir: TempDir,
    config: TempDir,
}

impl Workspace {
    fn new() -> Self {
        Self {
            dir: TempDir::new().expect("work dir"),
            config: TempDir::new().expect("config dir"),
        }
    }

    fn cmd(&self) -> assert_cmd::Command {
        let mut cmd = kana_cmd(self.config.path());
        cmd.current_dir(self.dir.path());
        cmd
    }
}

#[test]
fn upgrades_into_working_directory() {
    let ws = Workspace::new();
    let input = write_legacy(ws.dir.path(), &legacy_state(100, 50));

    ws.cmd()
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::contains("wrote ./full.khc"))
        .stdout(predicate::str::contains("version 0 -> 1000000"));

    assert_eq!(
        file_names(ws.dir.path()),
        vec!["full.khc", "session.kana", "updated.khc"]
    );

    let (header, container, tail) = read_upgraded(&ws.dir.path().join("full.khc"));
    assert_eq!(header.version_code, UPGRADE_VERSION);
    assert_eq!(header.format_code, 0);
    assert_eq!(tail, TAIL);
    assert_eq!(
        container
            .dataset("inputs/contents/dimensions")
            .expect("dimensions")
            .values,
        Values::Number(TypedBuffer::Int32(vec![100, 50]))
    );
    let pcs = container.dataset("pca/contents/pcs").expect("pcs");
    assert_eq!(pcs.shape, vec![50, 5]);
    assert!(container.group("kmeans_cluster").is_none());

    let standalone = std::fs::read(ws.dir.path().join("updated.khc")).expect("intermediate");
    assert_eq!(standalone.len() as u64, header.metadata_len);
}

#[test]
fn missing_metric_fails_and_writes_nothing() {
    let ws = Workspace::new();
    let mut doc = legacy_state(10, 4);
    doc["quality_control_metrics"]["contents"]
        .as_object_mut()
        .expect("contents object")
        .remove("sums");
    let input = write_legacy(ws.dir.path(), &doc);

    ws.cmd()
        .arg(&input)
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("quality_control"))
        .stderr(predicate::str::contains("sums"));

    assert_eq!(file_names(ws.dir.path()), vec!["session.kana"]);
}

#[test]
fn json_error_payload_names_kind() {
    let ws = Workspace::new();
    let mut doc = legacy_state(10, 4);
    doc["quality_control_metrics"]["contents"]
        .as_object_mut()
        .expect("contents object")
        .remove("sums");
    let input = write_legacy(ws.dir.path(), &doc);

    ws.cmd()
        .args(["--json"])
        .arg(&input)
        .assert()
        .failure()
        .stdout(predicate::str::contains(r#""error": "missing_field""#))
        .stdout(predicate::str::contains(r#""effect": "none""#));
}

#[test]
fn unknown_buffer_kind_aborts() {
    let ws = Workspace::new();
    let mut doc = legacy_state(10, 4);
    doc["tsne"]["contents"]["x"] = typed("FooArray", json!([1, 2, 3, 4]));
    let input = write_legacy(ws.dir.path(), &doc);

    ws.cmd()
        .args(["--json"])
        .arg(&input)
        .assert()
        .failure()
        .stdout(predicate::str::contains(r#""error": "unsupported_type""#))
        .stdout(predicate::str::contains("FooArray"));

    assert_eq!(file_names(ws.dir.path()), vec!["session.kana"]);
}

#[test]
fn truncated_header_is_a_format_error() {
    let ws = Workspace::new();
    let input = ws.dir.path().join("short.kana");
    std::fs::write(&input, [0u8; 10]).expect("write");

    ws.cmd()
        .args(["--json"])
        .arg(&input)
        .assert()
        .failure()
        .stdout(predicate::str::contains(r#""error": "format""#));
}

#[test]
fn kmeans_step_is_migrated_when_present() {
    let ws = Workspace::new();
    let mut doc = legacy_state(10, 6);
    doc["kmeans_cluster"] = json!({
        "parameters": { "k": 5 },
        "contents": { "clusters": typed("Int32Array", json!([0, 1, 2, 3, 4, 0])) }
    });
    let input = write_legacy(ws.dir.path(), &doc);

    ws.cmd().arg(&input).assert().success();

    let (_, container, _) = read_upgraded(&ws.dir.path().join("full.khc"));
    assert_eq!(
        container
            .dataset("kmeans_cluster/parameters/k")
            .expect("k")
            .values,
        Values::Number(TypedBuffer::Int32(vec![5]))
    );
    assert_eq!(
        container
            .dataset("kmeans_cluster/contents/clusters")
            .expect("clusters")
            .shape,
        vec![6]
    );
}

#[test]
fn dry_run_reports_without_writing() {
    let ws = Workspace::new();
    let input = write_legacy(ws.dir.path(), &legacy_state(10, 4));

    ws.cmd()
        .args(["--dry-run", "--json"])
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""dry_run": true"#))
        .stdout(predicate::str::contains(r#""target_version": 1000000"#))
        .stdout(predicate::str::contains(r#""tail_bytes": 19"#));

    assert_eq!(file_names(ws.dir.path()), vec!["session.kana"]);
}

#[test]
fn output_flags_pick_locations() {
    let ws = Workspace::new();
    let input = write_legacy(ws.dir.path(), &legacy_state(10, 4));
    let out = ws.dir.path().join("out");
    std::fs::create_dir(&out).expect("mkdir");

    ws.cmd()
        .arg("--out-dir")
        .arg(&out)
        .args(["--output", "upgraded.kana", "--no-intermediate"])
        .arg(&input)
        .assert()
        .success();

    assert_eq!(file_names(&out), vec!["upgraded.kana"]);
    let (header, _, tail) = read_upgraded(&out.join("upgraded.kana"));
    assert_eq!(header.version_code, UPGRADE_VERSION);
    assert_eq!(tail, TAIL);
}

#[test]
fn missing_input_fails() {
    let ws = Workspace::new();
    ws.cmd()
        .args(["--json", "absent.kana"])
        .assert()
        .failure()
        .stdout(predicate::str::contains(r#""error": "io""#));
}
