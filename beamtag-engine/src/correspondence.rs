//! 模型轴号与图面轴号的对应关系。按顺序逐一配对，经用户确认后冻结。

use std::collections::HashMap;

use beamtag_core::model::{GridAxis, GridSystem};
use tracing::{info, warn};

use crate::catalog::FloorScope;
use crate::errors::EngineError;
use crate::host::Prompter;

const CONFIRM_KEYWORDS: [&str; 2] = ["Y", "N"];

/// 单一方向上的配对结果。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AxisPairing {
    pub axis: GridAxis,
    /// (模型轴号, 图面轴号)，按顺序。
    pub pairs: Vec<(String, String)>,
    pub unmapped_model: Vec<String>,
    pub unmapped_drawing: Vec<String>,
}

impl AxisPairing {
    fn build(axis: GridAxis, model: &[String], drawing: &[String]) -> Self {
        let mut distinct: Vec<String> = Vec::with_capacity(model.len());
        for name in model {
            if !distinct.contains(name) {
                distinct.push(name.clone());
            }
        }
        let paired = distinct.len().min(drawing.len());
        Self {
            axis,
            pairs: distinct
                .iter()
                .zip(drawing)
                .map(|(model, drawing)| (model.clone(), drawing.clone()))
                .collect(),
            unmapped_model: distinct[paired..].to_vec(),
            unmapped_drawing: drawing[paired..].to_vec(),
        }
    }
}

/// 待确认的对应关系。构造过程不依赖外部状态，相同输入得到相同结果。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrespondenceProposal {
    pub reference_floor: String,
    pub vertical: AxisPairing,
    pub horizontal: AxisPairing,
}

pub fn propose(model: &GridSystem, floor: &FloorScope) -> CorrespondenceProposal {
    let vertical = AxisPairing::build(
        GridAxis::Vertical,
        model.names(GridAxis::Vertical),
        &floor.ordered_names(GridAxis::Vertical),
    );
    let horizontal = AxisPairing::build(
        GridAxis::Horizontal,
        model.names(GridAxis::Horizontal),
        &floor.ordered_names(GridAxis::Horizontal),
    );
    CorrespondenceProposal {
        reference_floor: floor.name.clone(),
        vertical,
        horizontal,
    }
}

impl CorrespondenceProposal {
    pub fn pairing(&self, axis: GridAxis) -> &AxisPairing {
        match axis {
            GridAxis::Vertical => &self.vertical,
            GridAxis::Horizontal => &self.horizontal,
        }
    }

    /// 供用户核对的逐行说明。
    pub fn describe(&self) -> Vec<String> {
        let mut lines = vec![format!("参考楼层: {}", self.reference_floor)];
        for pairing in [&self.vertical, &self.horizontal] {
            let axis = pairing.axis.label();
            lines.push(format!("{axis} 向轴线对应关系:"));
            for (model, drawing) in &pairing.pairs {
                lines.push(format!("  {model} -> {drawing}"));
            }
            if !pairing.unmapped_model.is_empty() {
                lines.push(format!(
                    "  未对应的模型轴号: {}",
                    pairing.unmapped_model.join(", ")
                ));
            }
            if !pairing.unmapped_drawing.is_empty() {
                lines.push(format!(
                    "  未使用的图面轴号: {}",
                    pairing.unmapped_drawing.join(", ")
                ));
            }
        }
        lines
    }

    /// 展示对应关系并请求确认。只有明确接受（或直接回车接受默认）才返回冻结后的映射。
    pub fn confirm(self, prompter: &mut dyn Prompter) -> Result<GridCorrespondence, EngineError> {
        for line in self.describe() {
            prompter.message(&line);
        }
        let answer = prompter.get_keyword("确认轴网对应关系? [Y/N]", &CONFIRM_KEYWORDS, Some("Y"));
        match answer.as_deref() {
            Some("Y") => {
                info!(
                    floor = %self.reference_floor,
                    x_pairs = self.vertical.pairs.len(),
                    y_pairs = self.horizontal.pairs.len(),
                    "轴网对应关系已确认"
                );
                Ok(self.accept())
            }
            _ => {
                warn!("轴网对应关系被拒绝");
                Err(EngineError::CorrespondenceRejected)
            }
        }
    }

    /// 不经确认直接冻结。
    pub fn accept(self) -> GridCorrespondence {
        let mut map = HashMap::new();
        for pairing in [self.vertical, self.horizontal] {
            for (model, drawing) in pairing.pairs {
                map.insert((pairing.axis, model), drawing);
            }
        }
        GridCorrespondence { map }
    }
}

/// 已确认的对应关系，只读。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GridCorrespondence {
    map: HashMap<(GridAxis, String), String>,
}

impl GridCorrespondence {
    pub fn resolve(&self, axis: GridAxis, model_name: &str) -> Option<&str> {
        self.map
            .get(&(axis, model_name.to_string()))
            .map(String::as_str)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CatalogSettings, GridCatalog};
    use crate::host::{ScriptedAnswer, ScriptedPrompter};
    use beamtag_core::document::Document;
    use beamtag_core::geometry::Point2;

    /// 图面 X 轴线 G2 在右、G1 在左，验证按坐标而非文字顺序排列。
    fn floor() -> FloorScope {
        let mut doc = Document::new();
        doc.add_text(Point2::new(0.0, -2000.0), "一層(1F)", 500.0, 0.0, "S-TITLE");
        for (name, x) in [("G2", 7000.0), ("G1", 1000.0)] {
            doc.add_line(Point2::new(x, 0.0), Point2::new(x, 10_000.0), "S-GRID");
            doc.add_text(Point2::new(x, 10_300.0), name, 300.0, 0.0, "S-GRID-T");
        }
        doc.add_line(Point2::new(0.0, 1000.0), Point2::new(20_000.0, 1000.0), "S-GRID");
        doc.add_text(Point2::new(300.0, 1000.0), "A", 300.0, 0.0, "S-GRID-T");
        let catalog = GridCatalog::scan(&doc, &CatalogSettings::default()).expect("目录应建立成功");
        catalog.first_floor().cloned().expect("应有一个楼层")
    }

    fn model() -> GridSystem {
        GridSystem {
            x_grids: vec!["1".to_string(), "2".to_string(), "3".to_string()],
            y_grids: vec!["A".to_string()],
        }
    }

    #[test]
    fn ordinal_pairing_leaves_extra_model_names_unmapped() {
        let floor = floor();
        let proposal = propose(&model(), &floor);
        assert_eq!(
            proposal.vertical.pairs,
            vec![
                ("1".to_string(), "G1".to_string()),
                ("2".to_string(), "G2".to_string()),
            ]
        );
        assert_eq!(proposal.vertical.unmapped_model, vec!["3".to_string()]);
        assert!(proposal.pairing(GridAxis::Horizontal).unmapped_drawing.is_empty());

        let correspondence = proposal.accept();
        assert_eq!(correspondence.resolve(GridAxis::Vertical, "1"), Some("G1"));
        assert_eq!(correspondence.resolve(GridAxis::Vertical, "2"), Some("G2"));
        assert_eq!(correspondence.resolve(GridAxis::Vertical, "3"), None);
        assert_eq!(correspondence.resolve(GridAxis::Horizontal, "1"), None);
        assert_eq!(correspondence.len(), 3);
    }

    #[test]
    fn proposal_is_idempotent() {
        let floor = floor();
        assert_eq!(propose(&model(), &floor), propose(&model(), &floor));
        assert_eq!(
            propose(&model(), &floor).accept(),
            propose(&model(), &floor).accept()
        );
    }

    #[test]
    fn confirmation_gate() {
        let floor = floor();

        let mut accepting = ScriptedPrompter::accepting();
        let accepted = propose(&model(), &floor).confirm(&mut accepting);
        assert!(accepted.is_ok());
        assert!(accepting.messages().iter().any(|line| line.contains("1 -> G1")));

        let mut rejecting = ScriptedPrompter::new([ScriptedAnswer::Keyword("N".to_string())]);
        assert!(matches!(
            propose(&model(), &floor).confirm(&mut rejecting),
            Err(EngineError::CorrespondenceRejected)
        ));

        let mut cancelling = ScriptedPrompter::new([ScriptedAnswer::Cancel]);
        assert!(matches!(
            propose(&model(), &floor).confirm(&mut cancelling),
            Err(EngineError::CorrespondenceRejected)
        ));
    }
}
