//! 标注结果的 JSON 报告。

use std::fs;
use std::path::{Path, PathBuf};

use beamtag_engine::pipeline::RunSummary;
use beamtag_engine::placer::LabelTarget;
use serde::Serialize;
use tracing::info;

use crate::errors::FrontendError;

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub drawing: PathBuf,
    pub beams: PathBuf,
    pub placed_count: usize,
    pub skipped_count: usize,
    /// 被丢弃的输入记录数。
    pub rejected_records: usize,
    pub skip_counts: Vec<SkipCount>,
    pub placed: Vec<PlacedEntry>,
    pub skipped: Vec<SkippedEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SkipCount {
    pub kind: String,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlacedEntry {
    pub beam_id: String,
    pub story: String,
    pub label: String,
    pub x: f64,
    pub y: f64,
    pub rotation_deg: f64,
    pub layer: String,
    pub main_beam: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deviation: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SkippedEntry {
    pub beam_id: String,
    pub label: String,
    pub story: String,
    pub kind: String,
    pub reason: String,
}

impl RunReport {
    pub fn new(
        drawing: &Path,
        beams: &Path,
        summary: &RunSummary,
        rejected_records: usize,
    ) -> Self {
        Self {
            drawing: drawing.to_path_buf(),
            beams: beams.to_path_buf(),
            placed_count: summary.placed_count(),
            skipped_count: summary.skipped_count(),
            rejected_records,
            skip_counts: summary
                .skip_counts()
                .into_iter()
                .map(|(kind, count)| SkipCount {
                    kind: kind.describe().to_string(),
                    count,
                })
                .collect(),
            placed: summary
                .placed
                .iter()
                .map(|placed| PlacedEntry {
                    beam_id: placed.beam_id.clone(),
                    story: placed.story.clone(),
                    label: placed.label.text.clone(),
                    x: placed.label.position.x(),
                    y: placed.label.position.y(),
                    rotation_deg: placed.label.rotation.to_degrees(),
                    layer: placed.label.layer.clone(),
                    main_beam: placed.label.target == LabelTarget::Main,
                    deviation: placed.deviation,
                })
                .collect(),
            skipped: summary
                .skipped
                .iter()
                .map(|skipped| SkippedEntry {
                    beam_id: skipped.beam_id.clone(),
                    label: skipped.label.clone(),
                    story: skipped.story.clone(),
                    kind: skipped.reason.kind().describe().to_string(),
                    reason: skipped.reason.to_string(),
                })
                .collect(),
        }
    }

    pub fn write(&self, path: &Path) -> Result<(), FrontendError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).map_err(|source| FrontendError::Report {
            path: path.to_path_buf(),
            source,
        })?;
        info!(path = %path.display(), "运行报告已写出");
        Ok(())
    }
}
