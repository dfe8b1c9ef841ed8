use std::fs;
use std::path::PathBuf;
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::prelude::*;

fn fixture(name: &str) -> String {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("../beamtag-io/tests/data");
    path.push(name);
    path.to_string_lossy().into_owned()
}

fn beamtag() -> Command {
    let mut command = Command::cargo_bin("beamtag").unwrap();
    command.env_remove("BEAMTAG_CONFIG");
    command
}

#[test]
fn label_command_prints_summary() {
    beamtag()
        .args([
            "label",
            "--drawing",
            &fixture("two_floors.dxf"),
            "--beams",
            &fixture("beams_v2.json"),
            "--yes",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 -> 1"))
        .stdout(predicate::str::contains("已标注 4 根梁，跳过 2 根"));
}

#[test]
fn label_command_writes_report() {
    let dir = tempfile::tempdir().unwrap();
    let report = dir.path().join("report.json");
    beamtag()
        .args([
            "label",
            "--drawing",
            &fixture("two_floors.dxf"),
            "--beams",
            &fixture("beams.csv"),
            "--floor",
            "2F",
            "-y",
            "--report",
            report.to_str().unwrap(),
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("已标注 2 根梁，跳过 0 根"));

    let content = fs::read_to_string(&report).unwrap();
    assert!(content.contains("\"placed_count\": 2"));
}

#[test]
fn unconfirmed_correspondence_fails() {
    // stdin 为空，确认提示读到 EOF 视为取消
    beamtag()
        .args([
            "label",
            "--drawing",
            &fixture("two_floors.dxf"),
            "--beams",
            &fixture("beams_v2.json"),
        ])
        .assert()
        .failure()
        .code(1);
}

#[test]
fn grids_command_lists_floors() {
    beamtag()
        .args(["grids", "--drawing", &fixture("two_floors.dxf")])
        .assert()
        .success()
        .stdout(predicate::str::contains("共 2 个楼层，10 个轴号"));
}

#[test]
fn invalid_config_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("beamtag.toml");
    fs::write(&config, "[units]\nscale = -1.0\n").unwrap();
    beamtag()
        .args([
            "--config",
            config.to_str().unwrap(),
            "grids",
            "--drawing",
            &fixture("two_floors.dxf"),
        ])
        .assert()
        .failure()
        .code(1);
}

#[test]
fn missing_drawing_fails() {
    beamtag()
        .args(["grids", "--drawing", "does-not-exist.dxf"])
        .assert()
        .failure();
}
