//! 梁数据导入。支持按楼层分组的 JSON（轴线相对定位、绝对轴号、模型坐标三种写法）
//! 以及按行排列的 CSV。单条记录格式错误只丢弃该条，其余记录照常导入。

use std::path::Path;

use beamtag_core::geometry::Point2;
use beamtag_core::model::{
    BeamDirection, BeamRecord, BeamSet, DEFAULT_RELATIVE_TOLERANCE, GridReference, GridSystem,
    ModelOffsetReference, RelativeReference,
};
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::{IoError, read_file};

const CSV_COLUMNS: usize = 8;

/// 单条记录的解析错误，`location` 指明行号或 JSON 路径。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{location}: {message}")]
pub struct RecordParseError {
    pub location: String,
    pub message: String,
}

impl RecordParseError {
    fn new(location: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct BeamImport {
    pub set: BeamSet,
    pub rejected: Vec<RecordParseError>,
}

impl BeamImport {
    #[inline]
    pub fn is_clean(&self) -> bool {
        self.rejected.is_empty()
    }
}

/// 按扩展名选择 CSV 或 JSON 读取梁数据。没有任何可用记录时报错。
pub fn read_beams(path: &Path) -> Result<BeamImport, IoError> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_default();
    let source = match extension.as_str() {
        "csv" | "json" => read_file(path)?,
        other => {
            return Err(IoError::UnsupportedFormat(if other.is_empty() {
                path.display().to_string()
            } else {
                other.to_string()
            }));
        }
    };

    let import = if extension == "csv" {
        parse_csv(&source)
    } else {
        parse_json(&source).map_err(|source| IoError::Json {
            path: path.to_path_buf(),
            source,
        })?
    };

    for rejected in &import.rejected {
        warn!(location = %rejected.location, "梁记录被丢弃: {}", rejected.message);
    }
    if import.set.beams.is_empty() {
        return Err(IoError::NoRecords {
            path: path.to_path_buf(),
        });
    }
    info!(
        path = %path.display(),
        beams = import.set.beams.len(),
        rejected = import.rejected.len(),
        "梁数据已载入"
    );
    Ok(import)
}

/// CSV 首个非空行为表头；列依次为楼层、新编号、原编号、X 轴号、Y 轴号、
/// 中点 X、中点 Y、是否主梁。
pub fn parse_csv(source: &str) -> BeamImport {
    let mut import = BeamImport::default();
    let mut header_seen = false;
    for (index, line) in source.trim_start_matches('\u{feff}').lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        if !header_seen {
            header_seen = true;
            continue;
        }
        let location = format!("第 {} 行", index + 1);
        match parse_csv_row(line) {
            Ok(beam) => import.set.beams.push(beam),
            Err(message) => import.rejected.push(RecordParseError::new(location, message)),
        }
    }
    import
}

fn parse_csv_row(line: &str) -> Result<BeamRecord, String> {
    let values: Vec<&str> = line.split(',').map(str::trim).collect();
    if values.len() < CSV_COLUMNS {
        return Err(format!(
            "列数不足（期望 {CSV_COLUMNS}，实际 {}）",
            values.len()
        ));
    }
    for (column, name) in [(5, "中点 X"), (6, "中点 Y")] {
        values[column]
            .parse::<f64>()
            .map_err(|_| format!("{name} 不是数值（值：\"{}\"）", values[column]))?;
    }
    let is_main = if values[7].eq_ignore_ascii_case("true") {
        true
    } else if values[7].eq_ignore_ascii_case("false") {
        false
    } else {
        return Err(format!("主梁标记无法识别（值：\"{}\"）", values[7]));
    };
    let label = required(values[1], "新编号")?;
    let x_grid = required(values[3], "X 轴号")?;
    let y_grid = required(values[4], "Y 轴号")?;

    Ok(BeamRecord {
        id: if values[2].is_empty() {
            label.clone()
        } else {
            values[2].to_string()
        },
        label,
        story: values[0].to_string(),
        section: None,
        is_main,
        reference: GridReference::Absolute { x_grid, y_grid },
    })
}

fn required(value: &str, field: &str) -> Result<String, String> {
    if value.is_empty() {
        Err(format!("缺少{field}"))
    } else {
        Ok(value.to_string())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExportDocument {
    #[serde(default)]
    project: Option<String>,
    #[serde(default)]
    grid_system: Option<GridSystemEntry>,
    #[serde(default)]
    floors: Vec<FloorEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GridSystemEntry {
    #[serde(default)]
    x_grids: Vec<String>,
    #[serde(default)]
    y_grids: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FloorEntry {
    floor_name: String,
    #[serde(default)]
    beams: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BeamEntry {
    #[serde(default)]
    etabs_id: Option<String>,
    #[serde(default)]
    new_label: Option<String>,
    #[serde(default)]
    section: Option<String>,
    #[serde(default)]
    is_main_beam: bool,
    #[serde(default)]
    grid_info: Option<GridInfoEntry>,
    #[serde(default)]
    x_grid: Option<String>,
    #[serde(default)]
    y_grid: Option<String>,
    #[serde(default)]
    start_point: Option<PointEntry>,
    #[serde(default)]
    end_point: Option<PointEntry>,
    #[serde(default)]
    mid_point: Option<PointEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GridInfoEntry {
    along_grid: String,
    between: Vec<String>,
    direction: String,
    #[serde(default)]
    offset_from_start: f64,
    #[serde(default)]
    length: f64,
    #[serde(default = "default_tolerance")]
    tolerance: f64,
}

fn default_tolerance() -> f64 {
    DEFAULT_RELATIVE_TOLERANCE
}

#[derive(Debug, Clone, Copy, Deserialize)]
struct PointEntry {
    x: f64,
    y: f64,
}

impl From<PointEntry> for Point2 {
    fn from(point: PointEntry) -> Self {
        Point2::new(point.x, point.y)
    }
}

/// 文档结构本身无法解析时整体报错；单根梁的字段问题记入 `rejected`。
pub fn parse_json(source: &str) -> Result<BeamImport, serde_json::Error> {
    let document: ExportDocument = serde_json::from_str(source.trim_start_matches('\u{feff}'))?;
    let mut import = BeamImport::default();
    import.set.project = document.project.filter(|project| !project.is_empty());
    import.set.grid_system = document
        .grid_system
        .filter(|system| !system.x_grids.is_empty() || !system.y_grids.is_empty())
        .map(|system| GridSystem {
            x_grids: system.x_grids,
            y_grids: system.y_grids,
        });

    for (floor_index, floor) in document.floors.into_iter().enumerate() {
        for (beam_index, value) in floor.beams.into_iter().enumerate() {
            let location = format!("floors[{floor_index}].beams[{beam_index}]");
            let record = serde_json::from_value::<BeamEntry>(value)
                .map_err(|err| err.to_string())
                .and_then(|entry| beam_from_entry(entry, &floor.floor_name));
            match record {
                Ok(beam) => import.set.beams.push(beam),
                Err(message) => import.rejected.push(RecordParseError::new(location, message)),
            }
        }
    }
    Ok(import)
}

fn beam_from_entry(entry: BeamEntry, story: &str) -> Result<BeamRecord, String> {
    let label = entry
        .new_label
        .map(|label| label.trim().to_string())
        .filter(|label| !label.is_empty())
        .ok_or_else(|| "缺少 newLabel".to_string())?;
    let reference = if let Some(info) = entry.grid_info {
        GridReference::Relative(relative_reference(info)?)
    } else if let (Some(x_grid), Some(y_grid)) = (entry.x_grid, entry.y_grid) {
        GridReference::Absolute { x_grid, y_grid }
    } else if entry.mid_point.is_some() || (entry.start_point.is_some() && entry.end_point.is_some())
    {
        let start = entry.start_point.map(Point2::from);
        let end = entry.end_point.map(Point2::from);
        let midpoint = match (entry.mid_point, start, end) {
            (Some(mid), _, _) => Point2::from(mid),
            (None, Some(start), Some(end)) => {
                Point2::new((start.x() + end.x()) / 2.0, (start.y() + end.y()) / 2.0)
            }
            _ => return Err("缺少梁中点".to_string()),
        };
        GridReference::ModelOffset(ModelOffsetReference {
            start,
            end,
            midpoint,
        })
    } else {
        return Err("缺少定位信息（gridInfo、xGrid/yGrid 或 startPoint/endPoint/midPoint）".to_string());
    };

    Ok(BeamRecord {
        id: entry
            .etabs_id
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| label.clone()),
        label,
        story: story.to_string(),
        section: entry.section.filter(|section| !section.is_empty()),
        is_main: entry.is_main_beam,
        reference,
    })
}

fn relative_reference(info: GridInfoEntry) -> Result<RelativeReference, String> {
    let direction = match info.direction.to_ascii_lowercase().as_str() {
        "horizontal" => BeamDirection::Horizontal,
        "vertical" => BeamDirection::Vertical,
        other => return Err(format!("无法识别的梁方向 \"{other}\"")),
    };
    let between: [String; 2] = info
        .between
        .try_into()
        .map_err(|values: Vec<String>| format!("between 需要两个轴号（实际 {} 个）", values.len()))?;
    if info.tolerance < 0.0 {
        return Err(format!("容许误差不能为负（值：{}）", info.tolerance));
    }
    Ok(RelativeReference {
        along_grid: info.along_grid,
        between,
        direction,
        offset_from_start: info.offset_from_start,
        length: info.length,
        tolerance: info.tolerance,
    })
}
