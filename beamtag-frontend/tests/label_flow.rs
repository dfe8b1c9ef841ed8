use std::fs;
use std::path::PathBuf;

use beamtag_config::AppConfig;
use beamtag_engine::errors::SkipKind;
use beamtag_engine::host::{ScriptedAnswer, ScriptedPrompter};
use beamtag_frontend::{FLOOR_PROMPT, FrontendError, LabelRequest, run_grids, run_label};

fn fixture(name: &str) -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("../beamtag-io/tests/data");
    path.push(name);
    path
}

fn request(beams: &str) -> LabelRequest {
    LabelRequest {
        drawing: fixture("two_floors.dxf"),
        beams: fixture(beams),
        ..LabelRequest::default()
    }
}

fn labels_on(document: &beamtag_core::document::Document, layer: &str) -> usize {
    document
        .entities()
        .filter(|(_, entity)| entity.layer_name() == layer)
        .count()
}

#[test]
fn label_two_floors_from_json() {
    let mut prompter = ScriptedPrompter::accepting();
    let outcome = run_label(&request("beams_v2.json"), &AppConfig::default(), &mut prompter)
        .expect("标注应成功");

    assert_eq!(outcome.rejected_records, 1);
    assert_eq!(outcome.summary.placed_count(), 4);
    assert_eq!(outcome.summary.skipped_count(), 2);
    let counts = outcome.summary.skip_counts();
    assert_eq!(counts.get(&SkipKind::FloorNotFound), Some(&1));
    assert_eq!(counts.get(&SkipKind::SpatialMatch), Some(&1));

    assert_eq!(labels_on(&outcome.document, "S-TEXTG"), 3);
    assert_eq!(labels_on(&outcome.document, "S-TEXTB"), 1);
    assert!(
        prompter
            .messages()
            .iter()
            .any(|line| line == "已标注 4 根梁，跳过 2 根")
    );
}

#[test]
fn label_from_csv_places_point_anchored_labels() {
    let mut prompter = ScriptedPrompter::accepting();
    let outcome = run_label(&request("beams.csv"), &AppConfig::default(), &mut prompter)
        .expect("标注应成功");
    assert_eq!(outcome.summary.placed_count(), 2);
    assert_eq!(outcome.rejected_records, 1);
    assert!(outcome.summary.placed.iter().all(|placed| placed.deviation.is_none()));
}

#[test]
fn floor_filter_and_floor_prompt() {
    let mut fixed = request("beams_v2.json");
    fixed.floor = Some("3F".to_string());
    let mut prompter = ScriptedPrompter::accepting();
    let outcome = run_label(&fixed, &AppConfig::default(), &mut prompter).expect("标注应成功");
    assert_eq!(outcome.summary.placed_count(), 1);
    assert_eq!(outcome.summary.skipped_count(), 1);

    let mut prompted = request("beams_v2.json");
    prompted.floor = Some(FLOOR_PROMPT.to_string());
    let mut prompter = ScriptedPrompter::new([ScriptedAnswer::Keyword("2f".to_string())]);
    let outcome = run_label(&prompted, &AppConfig::default(), &mut prompter).expect("标注应成功");
    assert_eq!(outcome.summary.placed_count(), 3);
    assert!(outcome.summary.skipped.is_empty());

    let mut missing = request("beams_v2.json");
    missing.floor = Some("9F".to_string());
    let err = run_label(&missing, &AppConfig::default(), &mut ScriptedPrompter::accepting())
        .expect_err("输入中没有 9F");
    assert!(matches!(err, FrontendError::FloorNotInInput(floor) if floor == "9F"));
}

#[test]
fn floor_filter_keeps_grid_correspondence() {
    // 2F 引用 1、2、3 号轴，3F 只引用 3 号轴
    let dir = tempfile::tempdir().expect("创建临时目录失败");
    let beams = dir.path().join("beams.csv");
    fs::write(
        &beams,
        "story,newLabel,etabsLabel,baseGridX,baseGridY,midpointX,midpointY,isMainBeam\n\
         2F,G1,B1,1,A,0,0,true\n\
         2F,G2,B2,2,A,0,0,true\n\
         2F,G3,B3,3,B,0,0,true\n\
         3F,G7,B7,3,A,0,0,true\n",
    )
    .expect("写入梁数据失败");

    let position_of_b7 = |floor: Option<&str>| {
        let request = LabelRequest {
            drawing: fixture("two_floors.dxf"),
            beams: beams.clone(),
            floor: floor.map(str::to_string),
            ..LabelRequest::default()
        };
        let outcome = run_label(&request, &AppConfig::default(), &mut ScriptedPrompter::accepting())
            .expect("标注应成功");
        outcome
            .summary
            .placed
            .iter()
            .find(|placed| placed.beam_id == "B7")
            .map(|placed| placed.label.position)
            .expect("B7 应已标注")
    };

    let unfiltered = position_of_b7(None);
    let filtered = position_of_b7(Some("3F"));
    assert!((unfiltered.x() - 63_000.0).abs() < 1e-6);
    assert!((filtered.x() - unfiltered.x()).abs() < 1e-6);
    assert!((filtered.y() - unfiltered.y()).abs() < 1e-6);
}

#[test]
fn rejected_correspondence_aborts() {
    let mut prompter = ScriptedPrompter::new([ScriptedAnswer::Keyword("N".to_string())]);
    let err = run_label(&request("beams_v2.json"), &AppConfig::default(), &mut prompter)
        .expect_err("拒绝对应关系应中止");
    assert!(matches!(err, FrontendError::Command { .. }));
}

#[test]
fn interactive_parameters_and_report() {
    let dir = tempfile::tempdir().expect("创建临时目录失败");
    let report_path = dir.path().join("report.json");
    let mut interactive = request("beams_v2.json");
    interactive.interactive = true;
    interactive.report = Some(report_path.clone());

    // 图框宽度、比例取默认值，字高改为 250
    let mut prompter = ScriptedPrompter::new([
        ScriptedAnswer::Number(50_000.0),
        ScriptedAnswer::Number(1000.0),
        ScriptedAnswer::Number(250.0),
    ]);
    let outcome = run_label(&interactive, &AppConfig::default(), &mut prompter).expect("标注应成功");
    assert_eq!(outcome.summary.placed_count(), 4);
    assert_eq!(prompter.remaining(), 0);

    let report: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&report_path).expect("报告应已写出"))
            .expect("报告应为 JSON");
    assert_eq!(report["placed_count"], 4);
    assert_eq!(report["skipped_count"], 2);
    assert_eq!(report["rejected_records"], 1);
    assert_eq!(report["placed"].as_array().map(Vec::len), Some(4));
}

#[test]
fn show_grids_lists_both_floors() {
    let mut prompter = ScriptedPrompter::accepting();
    let summary = run_grids(
        &fixture("two_floors.dxf"),
        None,
        &AppConfig::default(),
        &mut prompter,
    )
    .expect("列出轴线应成功");
    assert_eq!(summary, "共 2 个楼层，10 个轴号");
    assert!(
        prompter
            .messages()
            .iter()
            .any(|line| line.contains("1@51000"))
    );
}
