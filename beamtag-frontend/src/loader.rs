use std::path::{Path, PathBuf};

use beamtag_config::{AppConfig, BasePointMode};
use beamtag_core::document::Document;
use beamtag_engine::catalog::CatalogSettings;
use beamtag_engine::pipeline::{BasePointStrategy, RunOptions};
use beamtag_engine::placer::PlacementStyle;
use beamtag_io::{BeamImport, DrawingLoader, DxfFacade, read_beams};
use tracing::{info, warn};

use crate::errors::FrontendError;

/// 载入后的图面及其来源。
#[derive(Debug)]
pub struct LoadedDrawing {
    pub document: Document,
    pub path: PathBuf,
}

pub fn load_drawing(path: &Path) -> Result<LoadedDrawing, FrontendError> {
    let loader = DxfFacade::new();
    let document = loader.load(path)?;
    info!(
        path = %path.display(),
        layers = document.layers().count(),
        entities = document.entities().count(),
        "从 DXF 加载图面成功"
    );
    Ok(LoadedDrawing {
        document,
        path: path.to_path_buf(),
    })
}

/// 读取梁数据。被丢弃的记录只记日志，不影响其余记录。
pub fn load_beams(path: &Path) -> Result<BeamImport, FrontendError> {
    let import = read_beams(path)?;
    if !import.is_clean() {
        warn!(
            path = %path.display(),
            rejected = import.rejected.len(),
            "部分梁记录格式错误，已丢弃"
        );
    }
    Ok(import)
}

/// 由配置文件得到运行参数。
pub fn run_options(config: &AppConfig) -> RunOptions {
    RunOptions {
        catalog: CatalogSettings {
            title_layer: config.layers.title.clone(),
            marker_layer: config.layers.grid_marker.clone(),
            grid_layer: config.layers.grid_line.clone(),
            frame_width: config.units.frame_width,
            axis_tolerance: config.matching.axis_tolerance,
            marker_distance: config.matching.marker_distance,
            heuristic_tolerance: config.matching.heuristic_tolerance,
        },
        placement: PlacementStyle {
            margin: config.labeling.margin,
            text_height: config.labeling.text_height,
            main_layer: config.layers.main_label.clone(),
            secondary_layer: config.layers.secondary_label.clone(),
            text_style: config.labeling.text_style.clone(),
            fallback_style: config.labeling.fallback_style.clone(),
            color: config.labeling.color,
        },
        scale: config.units.scale,
        match_tolerance: config.matching.match_tolerance,
        beam_layers: config.layers.beams.clone(),
        reference_floor: config.run.reference_floor.clone(),
        base_point: match config.run.base_point {
            BasePointMode::Auto => BasePointStrategy::Auto,
            BasePointMode::Prompt => BasePointStrategy::Prompt,
        },
    }
}
