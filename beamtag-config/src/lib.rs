use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

pub const CONFIG_ENV: &str = "BEAMTAG_CONFIG";

/// 应用配置的根结构。缺省的段落与字段均取默认值。
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub layers: LayerConfig,
    #[serde(default)]
    pub labeling: LabelingConfig,
    #[serde(default)]
    pub matching: MatchingConfig,
    #[serde(default)]
    pub units: UnitConfig,
    #[serde(default)]
    pub run: RunConfig,
}

impl AppConfig {
    /// 从显式路径加载配置，并做取值检查。
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// 自动发现配置文件：优先读取环境变量 `BEAMTAG_CONFIG`，否则寻找 `./config/default.toml`。
    /// 若文件缺失，则返回默认配置。
    pub fn discover() -> Result<Self, ConfigError> {
        let cwd = env::current_dir().map_err(|source| ConfigError::Context {
            message: "获取当前工作目录失败".to_string(),
            source,
        })?;
        Self::discover_in(&cwd, env::var_os(CONFIG_ENV).map(PathBuf::from))
    }

    /// `discover` 的实现，显式传入工作目录与环境变量取值。
    pub fn discover_in(dir: &Path, explicit: Option<PathBuf>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        let default_path = dir.join("config").join("default.toml");
        if default_path.exists() {
            Self::from_file(default_path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("units.scale", self.units.scale)?;
        positive("units.frame_width", self.units.frame_width)?;
        positive("labeling.text_height", self.labeling.text_height)?;
        non_negative("labeling.margin", self.labeling.margin)?;
        non_negative("matching.axis_tolerance", self.matching.axis_tolerance)?;
        non_negative("matching.marker_distance", self.matching.marker_distance)?;
        non_negative("matching.heuristic_tolerance", self.matching.heuristic_tolerance)?;
        non_negative("matching.match_tolerance", self.matching.match_tolerance)?;
        for (field, value) in [
            ("layers.title", &self.layers.title),
            ("layers.grid_marker", &self.layers.grid_marker),
            ("layers.grid_line", &self.layers.grid_line),
            ("layers.main_label", &self.layers.main_label),
            ("layers.secondary_label", &self.layers.secondary_label),
            ("labeling.text_style", &self.labeling.text_style),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::Invalid {
                    field,
                    message: "不能为空".to_string(),
                });
            }
        }
        Ok(())
    }
}

fn positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::Invalid {
            field,
            message: format!("必须为正数（当前值：{value}）"),
        })
    }
}

fn non_negative(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::Invalid {
            field,
            message: format!("不能为负数（当前值：{value}）"),
        })
    }
}

/// 日志配置，支持设置默认等级。
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_string()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
        }
    }
}

/// 图层名称。`beams` 为空时除轴线图层外的所有直线都作为候选梁线。
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LayerConfig {
    pub title: String,
    pub grid_marker: String,
    pub grid_line: String,
    pub beams: Vec<String>,
    pub main_label: String,
    pub secondary_label: String,
}

impl Default for LayerConfig {
    fn default() -> Self {
        Self {
            title: "S-TITLE".to_string(),
            grid_marker: "S-GRID-T".to_string(),
            grid_line: "S-GRID".to_string(),
            beams: Vec::new(),
            main_label: "S-TEXTG".to_string(),
            secondary_label: "S-TEXTB".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LabelingConfig {
    pub margin: f64,
    pub text_height: f64,
    pub text_style: String,
    /// 首选样式不存在时改用的样式。
    pub fallback_style: String,
    /// 新建标注图层的 ACI 颜色号。
    pub color: i16,
}

impl Default for LabelingConfig {
    fn default() -> Self {
        Self {
            margin: 400.0,
            text_height: 300.0,
            text_style: "中央".to_string(),
            fallback_style: "Standard".to_string(),
            color: 2,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    pub axis_tolerance: f64,
    pub marker_distance: f64,
    pub heuristic_tolerance: f64,
    pub match_tolerance: f64,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            axis_tolerance: 1.0,
            marker_distance: 500.0,
            heuristic_tolerance: 1000.0,
            match_tolerance: 500.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UnitConfig {
    /// 模型单位换算到图面单位的倍数。
    pub scale: f64,
    pub frame_width: f64,
}

impl Default for UnitConfig {
    fn default() -> Self {
        Self {
            scale: 1000.0,
            frame_width: 50_000.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BasePointMode {
    #[default]
    Auto,
    Prompt,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub reference_floor: Option<String>,
    pub base_point: BasePointMode,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("读取配置文件 {path:?} 失败: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("解析配置文件 {path:?} 失败: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("配置项 {field} {message}")]
    Invalid {
        field: &'static str,
        message: String,
    },
    #[error("{message}")]
    Context {
        message: String,
        #[source]
        source: std::io::Error,
    },
}
