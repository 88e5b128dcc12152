//! Output locations driven by config files and env.

use std::fs;

use tempfile::TempDir;

use crate::fixtures::legacy::{file_names, kana_cmd, legacy_state, write_legacy};

#[test]
fn user_config_sets_output_names() {
    let work = TempDir::new().expect("work dir");
    let config = TempDir::new().expect("config dir");
    fs::write(
        config.path().join("config.toml"),
        "[output]\ncombined_name = \"from-user.khc\"\nkeep_intermediate = false\n",
    )
    .expect("write config");
    let input = write_legacy(work.path(), &legacy_state(5, 3));

    kana_cmd(config.path())
        .current_dir(work.path())
        .arg(&input)
        .assert()
        .success();

    assert_eq!(
        file_names(work.path()),
        vec!["from-user.khc", "session.kana"]
    );
}

#[test]
fn local_config_and_env_layer_on_top() {
    let work = TempDir::new().expect("work dir");
    let config = TempDir::new().expect("config dir");
    fs::write(
        work.path().join("kana-upgrade.toml"),
        "[output]\nintermediate_name = \"local.khc\"\ncombined_name = \"local-full.khc\"\n",
    )
    .expect("write local config");
    let input = write_legacy(work.path(), &legacy_state(5, 3));

    kana_cmd(config.path())
        .current_dir(work.path())
        .env("KANA_OUTPUT_NAME", "env-full.khc")
        .arg(&input)
        .assert()
        .success();

    assert_eq!(
        file_names(work.path()),
        vec!["env-full.khc", "kana-upgrade.toml", "local.khc", "session.kana"]
    );
}

#[test]
fn malformed_config_falls_back_to_defaults() {
    let work = TempDir::new().expect("work dir");
    let config = TempDir::new().expect("config dir");
    fs::write(config.path().join("config.toml"), "[output\n").expect("write config");
    let input = write_legacy(work.path(), &legacy_state(5, 3));

    kana_cmd(config.path())
        .current_dir(work.path())
        .arg(&input)
        .assert()
        .success();

    assert_eq!(
        file_names(work.path()),
        vec!["full.khc", "session.kana", "updated.khc"]
    );
}
