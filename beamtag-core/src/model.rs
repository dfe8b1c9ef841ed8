//! 结构模型一侧的梁记录与轴网命名。

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::geometry::Point2;

/// 相对定位记录未显式给出容差时采用的值（模型单位）。
pub const DEFAULT_RELATIVE_TOLERANCE: f64 = 0.1;

/// 轴网方向。`Vertical` 为 X 向轴线（X 坐标恒定），`Horizontal` 为 Y 向轴线。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GridAxis {
    Vertical,
    Horizontal,
}

impl GridAxis {
    #[inline]
    pub fn opposite(self) -> Self {
        match self {
            GridAxis::Vertical => GridAxis::Horizontal,
            GridAxis::Horizontal => GridAxis::Vertical,
        }
    }

    #[inline]
    pub fn label(self) -> &'static str {
        match self {
            GridAxis::Vertical => "X",
            GridAxis::Horizontal => "Y",
        }
    }
}

/// 梁的走向。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BeamDirection {
    Horizontal,
    Vertical,
}

impl BeamDirection {
    /// 梁所沿轴线的方向：水平梁沿 Y 向轴线，垂直梁沿 X 向轴线。
    #[inline]
    pub fn along_axis(self) -> GridAxis {
        match self {
            BeamDirection::Horizontal => GridAxis::Horizontal,
            BeamDirection::Vertical => GridAxis::Vertical,
        }
    }
}

/// 沿某条轴线、夹在另一方向两条轴线之间的相对定位。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelativeReference {
    pub along_grid: String,
    pub between: [String; 2],
    pub direction: BeamDirection,
    pub offset_from_start: f64,
    pub length: f64,
    /// 匹配容差，模型单位，非负。
    pub tolerance: f64,
}

/// 以楼层基准点为原点的模型坐标定位。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelOffsetReference {
    pub start: Option<Point2>,
    pub end: Option<Point2>,
    pub midpoint: Point2,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum GridReference {
    Absolute { x_grid: String, y_grid: String },
    Relative(RelativeReference),
    ModelOffset(ModelOffsetReference),
}

impl GridReference {
    /// 列出该定位引用的模型轴线及其方向。
    pub fn grid_names(&self) -> Vec<(GridAxis, &str)> {
        match self {
            GridReference::Absolute { x_grid, y_grid } => vec![
                (GridAxis::Vertical, x_grid.as_str()),
                (GridAxis::Horizontal, y_grid.as_str()),
            ],
            GridReference::Relative(reference) => {
                let along = reference.direction.along_axis();
                let across = along.opposite();
                vec![
                    (along, reference.along_grid.as_str()),
                    (across, reference.between[0].as_str()),
                    (across, reference.between[1].as_str()),
                ]
            }
            GridReference::ModelOffset(_) => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeamRecord {
    /// 结构模型中的原编号。
    pub id: String,
    /// 要写入图面的新编号。
    pub label: String,
    pub story: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    pub is_main: bool,
    pub reference: GridReference,
}

/// 模型轴网名称，按物理顺序排列。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridSystem {
    pub x_grids: Vec<String>,
    pub y_grids: Vec<String>,
}

impl GridSystem {
    pub fn names(&self, axis: GridAxis) -> &[String] {
        match axis {
            GridAxis::Vertical => &self.x_grids,
            GridAxis::Horizontal => &self.y_grids,
        }
    }
}

/// 一次运行的全部模型输入。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BeamSet {
    pub project: Option<String>,
    pub grid_system: Option<GridSystem>,
    pub beams: Vec<BeamRecord>,
}

impl BeamSet {
    /// 模型轴网名称：输入显式给出时原样使用，否则收集梁引用的去重名称并按自然顺序排序。
    pub fn model_grid_names(&self) -> GridSystem {
        if let Some(system) = &self.grid_system {
            return system.clone();
        }
        let mut system = GridSystem::default();
        for beam in &self.beams {
            for (axis, name) in beam.reference.grid_names() {
                let target = match axis {
                    GridAxis::Vertical => &mut system.x_grids,
                    GridAxis::Horizontal => &mut system.y_grids,
                };
                if !target.iter().any(|existing| existing == name) {
                    target.push(name.to_string());
                }
            }
        }
        system.x_grids.sort_by(|a, b| natural_cmp(a, b));
        system.y_grids.sort_by(|a, b| natural_cmp(a, b));
        system
    }

    /// 出现过的楼层名称，保持输入顺序。
    pub fn stories(&self) -> Vec<&str> {
        let mut stories: Vec<&str> = Vec::new();
        for beam in &self.beams {
            if !stories.contains(&beam.story.as_str()) {
                stories.push(&beam.story);
            }
        }
        stories
    }

    /// 仅保留指定楼层的梁。轴网名称先按全部梁固定下来，筛选后的轴号顺序与全量运行一致。
    pub fn retain_story(&mut self, story: &str) {
        if self.grid_system.is_none() {
            self.grid_system = Some(self.model_grid_names());
        }
        self.beams.retain(|beam| beam.story == story);
    }
}

/// 数字感知的自然排序：`"2" < "10"`，`"X2" < "X10"`。
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut left = a.chars().peekable();
    let mut right = b.chars().peekable();
    loop {
        match (left.peek().copied(), right.peek().copied()) {
            (None, None) => return a.cmp(b),
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(l), Some(r)) if l.is_ascii_digit() && r.is_ascii_digit() => {
                let l_digits = take_digits(&mut left);
                let r_digits = take_digits(&mut right);
                let l_trimmed = l_digits.trim_start_matches('0');
                let r_trimmed = r_digits.trim_start_matches('0');
                let ordering = l_trimmed
                    .len()
                    .cmp(&r_trimmed.len())
                    .then_with(|| l_trimmed.cmp(r_trimmed));
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            (Some(l), Some(r)) => {
                if l != r {
                    return l.cmp(&r);
                }
                left.next();
                right.next();
            }
        }
    }
}

fn take_digits(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> String {
    let mut digits = String::new();
    while let Some(ch) = chars.peek().copied() {
        if !ch.is_ascii_digit() {
            break;
        }
        digits.push(ch);
        chars.next();
    }
    digits
}

#[cfg(test)]
mod tests {
    use super::*;

    fn absolute(story: &str, x: &str, y: &str) -> BeamRecord {
        BeamRecord {
            id: format!("B-{x}{y}"),
            label: format!("G{x}{y}"),
            story: story.to_string(),
            section: None,
            is_main: true,
            reference: GridReference::Absolute {
                x_grid: x.to_string(),
                y_grid: y.to_string(),
            },
        }
    }

    #[test]
    fn natural_order_is_numeric_aware() {
        let mut names = vec!["10", "2", "1", "X10", "X2", "A", "B"];
        names.sort_by(|a, b| natural_cmp(a, b));
        assert_eq!(names, vec!["1", "2", "10", "A", "B", "X2", "X10"]);
        assert_eq!(natural_cmp("02", "2"), Ordering::Less);
        assert_eq!(natural_cmp("A", "A"), Ordering::Equal);
    }

    #[test]
    fn model_grid_names_are_collected_per_axis() {
        let mut set = BeamSet::default();
        set.beams.push(absolute("2F", "3", "B"));
        set.beams.push(absolute("2F", "1", "A"));
        set.beams.push(BeamRecord {
            id: "B9".to_string(),
            label: "b9".to_string(),
            story: "3F".to_string(),
            section: Some("B40X70".to_string()),
            is_main: false,
            reference: GridReference::Relative(RelativeReference {
                along_grid: "C".to_string(),
                between: ["2".to_string(), "10".to_string()],
                direction: BeamDirection::Horizontal,
                offset_from_start: 0.0,
                length: 6.0,
                tolerance: DEFAULT_RELATIVE_TOLERANCE,
            }),
        });

        let system = set.model_grid_names();
        assert_eq!(system.x_grids, vec!["1", "2", "3", "10"]);
        assert_eq!(system.y_grids, vec!["A", "B", "C"]);
        assert_eq!(set.stories(), vec!["2F", "3F"]);

        set.retain_story("3F");
        assert_eq!(set.beams.len(), 1);
        // 筛选后仍保留全量轴号
        assert_eq!(set.model_grid_names(), system);
    }

    #[test]
    fn explicit_grid_system_wins() {
        let set = BeamSet {
            project: None,
            grid_system: Some(GridSystem {
                x_grids: vec!["3".to_string(), "1".to_string()],
                y_grids: vec!["A".to_string()],
            }),
            beams: vec![absolute("1F", "2", "B")],
        };
        let system = set.model_grid_names();
        assert_eq!(system.names(GridAxis::Vertical), &["3".to_string(), "1".to_string()]);
        assert_eq!(system.names(GridAxis::Horizontal), &["A".to_string()]);
    }

    #[test]
    fn vertical_relative_reference_lists_axes() {
        let reference = GridReference::Relative(RelativeReference {
            along_grid: "2".to_string(),
            between: ["A".to_string(), "B".to_string()],
            direction: BeamDirection::Vertical,
            offset_from_start: 0.0,
            length: 0.0,
            tolerance: 0.1,
        });
        assert_eq!(
            reference.grid_names(),
            vec![
                (GridAxis::Vertical, "2"),
                (GridAxis::Horizontal, "A"),
                (GridAxis::Horizontal, "B"),
            ]
        );
    }
}
