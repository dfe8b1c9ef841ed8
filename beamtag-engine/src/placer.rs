//! 根据梁的走向确定标注位置与旋转角。

use std::f64::consts::{FRAC_PI_2, PI};

use beamtag_core::document::STANDARD_TEXT_STYLE;
use beamtag_core::geometry::{Point2, Segment2, Vector2};

use crate::catalog::GridLine;
use crate::host::LabelEntity;

/// 判定水平/垂直时允许的坐标增量。
pub const AXIS_EPSILON: f64 = 1.0;

/// 决定标注方向的几何信息：标注中心与走向增量。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BeamGeometry {
    pub midpoint: Point2,
    pub delta_x: f64,
    pub delta_y: f64,
}

impl BeamGeometry {
    pub fn from_segment(segment: &Segment2) -> Self {
        let delta = segment.delta();
        Self {
            midpoint: segment.midpoint(),
            delta_x: delta.x(),
            delta_y: delta.y(),
        }
    }

    /// 轴线交点处的梁：Δx 取 X 向轴线，Δy 取 Y 向轴线。
    pub fn from_grids(anchor: Point2, x_grid: &GridLine, y_grid: &GridLine) -> Self {
        Self {
            midpoint: anchor,
            delta_x: x_grid.delta().x(),
            delta_y: y_grid.delta().y(),
        }
    }

    /// 没有方向信息的点，按水平梁处理。
    pub fn level_at(point: Point2) -> Self {
        Self {
            midpoint: point,
            delta_x: 1.0,
            delta_y: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BeamOrientation {
    Horizontal,
    Vertical,
    /// 已规整到 `(-90°, 90°]` 的方向角，弧度。
    Diagonal { angle: f64 },
}

impl BeamOrientation {
    pub fn classify(geometry: &BeamGeometry, epsilon: f64) -> Self {
        if geometry.delta_y.abs() < epsilon {
            BeamOrientation::Horizontal
        } else if geometry.delta_x.abs() < epsilon {
            BeamOrientation::Vertical
        } else {
            BeamOrientation::Diagonal {
                angle: normalize_upright(geometry.delta_y.atan2(geometry.delta_x)),
            }
        }
    }
}

/// 将角度规整到 `(-π/2, π/2]`，保证文字不倒置。
pub fn normalize_upright(angle: f64) -> f64 {
    let mut angle = angle % (2.0 * PI);
    if angle > PI {
        angle -= 2.0 * PI;
    } else if angle <= -PI {
        angle += 2.0 * PI;
    }
    if angle > FRAC_PI_2 {
        angle - PI
    } else if angle <= -FRAC_PI_2 {
        angle + PI
    } else {
        angle
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LabelTarget {
    Main,
    Secondary,
}

impl LabelTarget {
    #[inline]
    pub fn from_main_flag(is_main: bool) -> Self {
        if is_main {
            LabelTarget::Main
        } else {
            LabelTarget::Secondary
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlacementStyle {
    /// 标注相对梁中点的偏移距离。
    pub margin: f64,
    pub text_height: f64,
    pub main_layer: String,
    pub secondary_layer: String,
    pub text_style: String,
    pub fallback_style: String,
    pub color: i16,
}

impl Default for PlacementStyle {
    fn default() -> Self {
        Self {
            margin: 400.0,
            text_height: 300.0,
            main_layer: "S-TEXTG".to_string(),
            secondary_layer: "S-TEXTB".to_string(),
            text_style: "中央".to_string(),
            fallback_style: STANDARD_TEXT_STYLE.to_string(),
            color: 2,
        }
    }
}

impl PlacementStyle {
    pub fn layer_for(&self, target: LabelTarget) -> &str {
        match target {
            LabelTarget::Main => &self.main_layer,
            LabelTarget::Secondary => &self.secondary_layer,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LabelResult {
    pub text: String,
    pub position: Point2,
    /// 弧度。
    pub rotation: f64,
    pub target: LabelTarget,
    pub layer: String,
    pub orientation: BeamOrientation,
}

#[derive(Debug, Clone)]
pub struct LabelPlacer {
    style: PlacementStyle,
    epsilon: f64,
}

impl LabelPlacer {
    pub fn new(style: PlacementStyle) -> Self {
        Self {
            style,
            epsilon: AXIS_EPSILON,
        }
    }

    #[inline]
    pub fn style(&self) -> &PlacementStyle {
        &self.style
    }

    pub fn place(&self, text: &str, is_main: bool, geometry: &BeamGeometry) -> LabelResult {
        let orientation = BeamOrientation::classify(geometry, self.epsilon);
        let margin = self.style.margin;
        let (offset, rotation) = match orientation {
            BeamOrientation::Horizontal => (Vector2::new(0.0, margin), 0.0),
            BeamOrientation::Vertical => (Vector2::new(-margin, 0.0), FRAC_PI_2),
            BeamOrientation::Diagonal { angle } => {
                (Vector2::from_polar(margin, angle + FRAC_PI_2), angle)
            }
        };
        let target = LabelTarget::from_main_flag(is_main);
        LabelResult {
            text: text.to_string(),
            position: geometry.midpoint.translate(offset),
            rotation,
            target,
            layer: self.style.layer_for(target).to_string(),
            orientation,
        }
    }

    /// 生成写入宿主的文字实体，`style` 为实际可用的文字样式。
    pub fn to_entity(&self, result: &LabelResult, style: &str) -> LabelEntity {
        LabelEntity {
            content: result.text.clone(),
            position: result.position,
            rotation: result.rotation,
            height: self.style.text_height,
            layer: result.layer.clone(),
            style: style.to_string(),
            color: self.style.color,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_4;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn horizontal_beam_label_sits_above() {
        let placer = LabelPlacer::new(PlacementStyle::default());
        let segment = Segment2::new(Point2::new(0.0, 1000.0), Point2::new(6000.0, 1000.0));
        let result = placer.place("G1", true, &BeamGeometry::from_segment(&segment));
        assert_eq!(result.orientation, BeamOrientation::Horizontal);
        assert_eq!(result.position, Point2::new(3000.0, 1400.0));
        assert_eq!(result.rotation, 0.0);
        assert_eq!(result.layer, "S-TEXTG");
        assert_eq!(result.target, LabelTarget::Main);
    }

    #[test]
    fn vertical_beam_label_sits_left_and_rotated() {
        let placer = LabelPlacer::new(PlacementStyle::default());
        let segment = Segment2::new(Point2::new(1000.0, 9000.0), Point2::new(1000.0, 5000.0));
        let result = placer.place("b3", false, &BeamGeometry::from_segment(&segment));
        assert_eq!(result.orientation, BeamOrientation::Vertical);
        assert_eq!(result.position, Point2::new(600.0, 7000.0));
        assert!(approx(result.rotation, FRAC_PI_2));
        assert_eq!(result.layer, "S-TEXTB");
    }

    #[test]
    fn diagonal_beam_offsets_perpendicular() {
        let placer = LabelPlacer::new(PlacementStyle::default());
        let geometry = BeamGeometry {
            midpoint: Point2::new(0.0, 0.0),
            delta_x: 1000.0,
            delta_y: 1000.0,
        };
        let result = placer.place("G7", true, &geometry);
        match result.orientation {
            BeamOrientation::Diagonal { angle } => assert!(approx(angle, FRAC_PI_4)),
            other => panic!("应判定为斜向: {other:?}"),
        }
        assert!(approx(result.rotation.to_degrees(), 45.0));
        let offset = result.position.as_vec2();
        assert!(approx(offset.length(), 400.0));
        assert!(approx(offset.y.atan2(offset.x).to_degrees(), 135.0));
    }

    #[test]
    fn reversed_diagonal_stays_upright() {
        let placer = LabelPlacer::new(PlacementStyle::default());
        let geometry = BeamGeometry {
            midpoint: Point2::new(0.0, 0.0),
            delta_x: -1000.0,
            delta_y: -1000.0,
        };
        let result = placer.place("G7", true, &geometry);
        assert!(approx(result.rotation, FRAC_PI_4));
    }

    #[test]
    fn normalization_range_is_half_open() {
        assert!(approx(normalize_upright(FRAC_PI_2), FRAC_PI_2));
        assert!(approx(normalize_upright(-FRAC_PI_2), FRAC_PI_2));
        assert!(approx(normalize_upright(135f64.to_radians()), -FRAC_PI_4));
        assert!(approx(normalize_upright(-135f64.to_radians()), FRAC_PI_4));
        assert!(approx(normalize_upright(2.0 * PI + 0.5), 0.5));
    }

    #[test]
    fn entity_uses_style_height_and_colour() {
        let placer = LabelPlacer::new(PlacementStyle::default());
        let result = placer.place("G1", true, &BeamGeometry::level_at(Point2::new(0.0, 0.0)));
        let entity = placer.to_entity(&result, "Standard");
        assert_eq!(entity.height, 300.0);
        assert_eq!(entity.color, 2);
        assert_eq!(entity.style, "Standard");
        assert_eq!(entity.position, Point2::new(0.0, 400.0));
    }
}
