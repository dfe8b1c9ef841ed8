use std::path::{Path, PathBuf};

use beamtag_config::AppConfig;
use beamtag_core::document::Document;
use beamtag_core::model::BeamSet;
use beamtag_engine::command::{
    CommandBus, CommandContext, CommandRequest, LABEL_BEAMS, SHOW_GRIDS,
};
use beamtag_engine::host::Prompter;
use beamtag_engine::pipeline::{RunOptions, RunSummary};
use tracing::info;

use crate::errors::FrontendError;
use crate::loader::{LoadedDrawing, load_beams, load_drawing, run_options};
use crate::report::RunReport;

/// `--floor` 取此值时改为询问用户。
pub const FLOOR_PROMPT: &str = "?";

/// 一次标注命令的输入。
#[derive(Debug, Clone, Default)]
pub struct LabelRequest {
    pub drawing: PathBuf,
    pub beams: PathBuf,
    pub floor: Option<String>,
    pub interactive: bool,
    pub scale: Option<f64>,
    pub frame_width: Option<f64>,
    pub report: Option<PathBuf>,
}

#[derive(Debug)]
pub struct LabelOutcome {
    pub summary: RunSummary,
    pub rejected_records: usize,
    /// 写入标注后的图面。
    pub document: Document,
}

pub fn run_label(
    request: &LabelRequest,
    config: &AppConfig,
    prompter: &mut dyn Prompter,
) -> Result<LabelOutcome, FrontendError> {
    let mut options = run_options(config);
    apply_overrides(&mut options, request.scale, request.frame_width);

    let LoadedDrawing { mut document, .. } = load_drawing(&request.drawing)?;
    let import = load_beams(&request.beams)?;
    for rejected in &import.rejected {
        prompter.message(&format!("已丢弃记录 {rejected}"));
    }
    let rejected_records = import.rejected.len();
    let beams = import.set;

    let floor = select_floor(&beams, request.floor.as_deref(), prompter)?;
    if request.interactive {
        ask_parameters(&mut options, prompter)?;
    }
    options.validate().map_err(FrontendError::Options)?;

    let summary = dispatch_label(&mut document, prompter, &options, &beams, floor)?;
    print_summary(prompter, &summary, rejected_records);

    if let Some(path) = &request.report {
        RunReport::new(&request.drawing, &request.beams, &summary, rejected_records).write(path)?;
        prompter.message(&format!("报告已写入 {}", path.display()));
    }

    Ok(LabelOutcome {
        summary,
        rejected_records,
        document,
    })
}

/// 列出图面中识别出的楼层与轴线，返回汇总说明。
pub fn run_grids(
    drawing: &Path,
    frame_width: Option<f64>,
    config: &AppConfig,
    prompter: &mut dyn Prompter,
) -> Result<String, FrontendError> {
    let mut options = run_options(config);
    apply_overrides(&mut options, None, frame_width);
    options.validate().map_err(FrontendError::Options)?;
    let LoadedDrawing { mut document, .. } = load_drawing(drawing)?;

    let bus = CommandBus::new();
    let mut context = CommandContext::new(&mut document, prompter, &options);
    let response = bus.dispatch(&CommandRequest::new(SHOW_GRIDS), &mut context);
    let message = response.message.unwrap_or_default();
    if !response.success {
        return Err(FrontendError::Command {
            command: SHOW_GRIDS.to_string(),
            message,
        });
    }
    prompter.message(&message);
    Ok(message)
}

fn apply_overrides(options: &mut RunOptions, scale: Option<f64>, frame_width: Option<f64>) {
    if let Some(scale) = scale {
        options.scale = scale;
    }
    if let Some(frame_width) = frame_width {
        options.catalog.frame_width = frame_width;
    }
}

fn dispatch_label(
    document: &mut Document,
    prompter: &mut dyn Prompter,
    options: &RunOptions,
    beams: &BeamSet,
    floor: Option<String>,
) -> Result<RunSummary, FrontendError> {
    let bus = CommandBus::new();
    let mut context = CommandContext::new(document, prompter, options).with_beams(beams);
    let request = CommandRequest::new(LABEL_BEAMS).with_floor(floor);
    let response = bus.dispatch(&request, &mut context);
    if !response.success {
        return Err(FrontendError::Command {
            command: LABEL_BEAMS.to_string(),
            message: response.message.unwrap_or_default(),
        });
    }
    context.summary.take().ok_or_else(|| FrontendError::Command {
        command: LABEL_BEAMS.to_string(),
        message: "命令未返回运行结果".to_string(),
    })
}

/// 确定要标注的楼层；`?` 时列出输入中的楼层供选择。
fn select_floor(
    beams: &BeamSet,
    floor: Option<&str>,
    prompter: &mut dyn Prompter,
) -> Result<Option<String>, FrontendError> {
    let Some(floor) = floor else {
        return Ok(None);
    };
    let story = if floor == FLOOR_PROMPT {
        let stories: Vec<String> = beams.stories().into_iter().map(str::to_string).collect();
        let keywords: Vec<&str> = stories.iter().map(String::as_str).collect();
        prompter.message(&format!("梁数据中的楼层: {}", keywords.join(", ")));
        prompter
            .get_keyword("选择要标注的楼层", &keywords, keywords.first().copied())
            .ok_or(FrontendError::Cancelled("楼层选择"))?
    } else {
        floor.to_string()
    };

    if !beams.beams.iter().any(|beam| beam.story == story) {
        return Err(FrontendError::FloorNotInInput(story));
    }
    let count = beams.beams.iter().filter(|beam| beam.story == story).count();
    info!(floor = %story, beams = count, "仅标注指定楼层");
    Ok(Some(story))
}

fn ask_parameters(options: &mut RunOptions, prompter: &mut dyn Prompter) -> Result<(), FrontendError> {
    options.catalog.frame_width = prompter
        .get_double("图框宽度", options.catalog.frame_width)
        .ok_or(FrontendError::Cancelled("参数输入"))?;
    options.scale = prompter
        .get_double("模型单位换算比例", options.scale)
        .ok_or(FrontendError::Cancelled("参数输入"))?;
    options.placement.text_height = prompter
        .get_double("标注字高", options.placement.text_height)
        .ok_or(FrontendError::Cancelled("参数输入"))?;
    Ok(())
}

fn print_summary(prompter: &mut dyn Prompter, summary: &RunSummary, rejected_records: usize) {
    prompter.message(&format!(
        "已标注 {} 根梁，跳过 {} 根",
        summary.placed_count(),
        summary.skipped_count()
    ));
    for (kind, count) in summary.skip_counts() {
        prompter.message(&format!("  {}: {count}", kind.describe()));
    }
    for skipped in &summary.skipped {
        prompter.message(&format!(
            "  - {} {} ({}): {}",
            skipped.beam_id, skipped.label, skipped.story, skipped.reason
        ));
    }
    if rejected_records > 0 {
        prompter.message(&format!("输入中有 {rejected_records} 条记录格式错误，已丢弃"));
    }
}
