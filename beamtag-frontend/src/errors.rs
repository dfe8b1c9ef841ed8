use std::path::PathBuf;

use beamtag_config::ConfigError;
use beamtag_engine::errors::EngineError;
use beamtag_io::IoError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FrontendError {
    #[error(transparent)]
    Io(#[from] IoError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("运行参数无效: {0}")]
    Options(#[source] EngineError),
    #[error("命令 {command} 执行失败: {message}")]
    Command { command: String, message: String },
    #[error("梁数据中没有楼层 {0} 的记录")]
    FloorNotInInput(String),
    #[error("用户取消了{0}")]
    Cancelled(&'static str),
    #[error("写入报告 {path:?} 失败: {source}")]
    Report {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("序列化报告失败: {0}")]
    ReportEncode(#[from] serde_json::Error),
}
