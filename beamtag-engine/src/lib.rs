pub mod anchor;
pub mod catalog;
pub mod command;
pub mod correspondence;
pub mod host;
pub mod matcher;
pub mod pipeline;
pub mod placer;

pub mod errors {
    use beamtag_core::model::GridAxis;
    use thiserror::Error;

    /// 中止整次运行的错误。出现时图面尚未写入任何实体。
    #[derive(Debug, Error)]
    pub enum EngineError {
        #[error("图层 {layer} 上未找到楼层标题")]
        MissingFloorTitles { layer: String },
        #[error("图层 {layer} 上未找到轴网标记")]
        MissingGridMarkers { layer: String },
        #[error("图层 {layer} 上未找到轴线")]
        MissingGridLines { layer: String },
        #[error("没有任何楼层识别出轴线，请检查图框宽度与图层设置")]
        NoClassifiedFloors,
        #[error("参考楼层 {0} 不在图面中")]
        ReferenceFloorNotFound(String),
        #[error("轴网对应关系未被确认，已取消操作")]
        CorrespondenceRejected,
        #[error("运行参数无效: {0}")]
        InvalidOptions(String),
    }

    /// 单根梁被跳过的原因，只计数、不中止运行。
    #[derive(Debug, Clone, PartialEq, Error)]
    pub enum SkipReason {
        #[error("楼层 {0} 不在图面中")]
        FloorNotFound(String),
        #[error("{} 向轴线 {name} 没有对应的图面轴线", .axis.label())]
        GridUnmapped { axis: GridAxis, name: String },
        #[error("楼层 {floor} 中找不到 {} 向轴线 {name}", .axis.label())]
        GridMissing {
            axis: GridAxis,
            name: String,
            floor: String,
        },
        #[error("容差 {tolerance:.1} 内没有匹配的梁线")]
        NoSegmentMatch { tolerance: f64, closest: Option<f64> },
        #[error("楼层 {0} 没有可用的基准点")]
        BasePointUnavailable(String),
        #[error("写入标注失败: {0}")]
        LabelWrite(String),
    }

    /// 汇总统计使用的跳过类别。
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
    pub enum SkipKind {
        FloorNotFound,
        GridResolution,
        SpatialMatch,
        LabelWrite,
    }

    impl SkipKind {
        pub fn describe(self) -> &'static str {
            match self {
                SkipKind::FloorNotFound => "楼层不存在",
                SkipKind::GridResolution => "轴线无法解析",
                SkipKind::SpatialMatch => "梁线匹配失败",
                SkipKind::LabelWrite => "标注写入失败",
            }
        }
    }

    impl SkipReason {
        pub fn kind(&self) -> SkipKind {
            match self {
                SkipReason::FloorNotFound(_) => SkipKind::FloorNotFound,
                SkipReason::GridUnmapped { .. }
                | SkipReason::GridMissing { .. }
                | SkipReason::BasePointUnavailable(_) => SkipKind::GridResolution,
                SkipReason::NoSegmentMatch { .. } => SkipKind::SpatialMatch,
                SkipReason::LabelWrite(_) => SkipKind::LabelWrite,
            }
        }
    }
}
