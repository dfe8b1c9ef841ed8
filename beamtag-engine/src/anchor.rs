//! 把梁的轴网定位换算为图面上的理论锚点。

use beamtag_core::geometry::{Point2, Segment2, Vector2};
use beamtag_core::model::{
    BeamDirection, GridAxis, GridReference, ModelOffsetReference, RelativeReference,
};

use crate::catalog::{FloorScope, GridLine};
use crate::correspondence::GridCorrespondence;
use crate::errors::SkipReason;
use crate::placer::BeamGeometry;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Anchor {
    /// 单点锚点，直接用于放置，附带决定方向的几何信息。
    Point {
        location: Point2,
        geometry: BeamGeometry,
    },
    /// 需要与图面直线匹配的理论梁段。
    Segment(Segment2),
}

impl Anchor {
    pub fn point(&self) -> Option<Point2> {
        match self {
            Anchor::Point { location, .. } => Some(*location),
            Anchor::Segment(_) => None,
        }
    }

    pub fn segment(&self) -> Option<Segment2> {
        match self {
            Anchor::Segment(segment) => Some(*segment),
            Anchor::Point { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedAnchor {
    pub anchor: Anchor,
    /// 梁自带的匹配容差（已换算为图面单位）。
    pub tolerance: Option<f64>,
}

/// 针对单个楼层的锚点解析器。目录与对应关系只读共享。
#[derive(Debug, Clone, Copy)]
pub struct BeamAnchorResolver<'a> {
    floor: &'a FloorScope,
    correspondence: &'a GridCorrespondence,
    scale: f64,
    base_point: Option<Point2>,
}

impl<'a> BeamAnchorResolver<'a> {
    pub fn new(floor: &'a FloorScope, correspondence: &'a GridCorrespondence, scale: f64) -> Self {
        Self {
            floor,
            correspondence,
            scale,
            base_point: None,
        }
    }

    /// 模型坐标定位所用的楼层基准点。
    pub fn with_base_point(mut self, base_point: Option<Point2>) -> Self {
        self.base_point = base_point;
        self
    }

    pub fn resolve(&self, reference: &GridReference) -> Result<ResolvedAnchor, SkipReason> {
        match reference {
            GridReference::Absolute { x_grid, y_grid } => self.resolve_absolute(x_grid, y_grid),
            GridReference::Relative(relative) => self.resolve_relative(relative),
            GridReference::ModelOffset(offset) => self.resolve_model_offset(offset),
        }
    }

    /// 经对应关系映射后在本楼层中查找轴线。
    pub fn grid(&self, axis: GridAxis, model_name: &str) -> Result<&'a GridLine, SkipReason> {
        let drawing_name = self.correspondence.resolve(axis, model_name).ok_or_else(|| {
            SkipReason::GridUnmapped {
                axis,
                name: model_name.to_string(),
            }
        })?;
        self.floor
            .grid(axis, drawing_name)
            .ok_or_else(|| SkipReason::GridMissing {
                axis,
                name: drawing_name.to_string(),
                floor: self.floor.name.clone(),
            })
    }

    fn resolve_absolute(&self, x_name: &str, y_name: &str) -> Result<ResolvedAnchor, SkipReason> {
        let x_grid = self.grid(GridAxis::Vertical, x_name)?;
        let y_grid = self.grid(GridAxis::Horizontal, y_name)?;
        let location = Point2::new(x_grid.position, y_grid.position);
        Ok(ResolvedAnchor {
            anchor: Anchor::Point {
                location,
                geometry: BeamGeometry::from_grids(location, x_grid, y_grid),
            },
            tolerance: None,
        })
    }

    fn resolve_relative(&self, relative: &RelativeReference) -> Result<ResolvedAnchor, SkipReason> {
        let along_axis = relative.direction.along_axis();
        let across_axis = along_axis.opposite();
        let along = self.grid(along_axis, &relative.along_grid)?;
        let first = self.grid(across_axis, &relative.between[0])?;
        let second = self.grid(across_axis, &relative.between[1])?;

        let segment = match relative.direction {
            BeamDirection::Horizontal => Segment2::new(
                Point2::new(first.position, along.position),
                Point2::new(second.position, along.position),
            ),
            BeamDirection::Vertical => Segment2::new(
                Point2::new(along.position, first.position),
                Point2::new(along.position, second.position),
            ),
        };
        Ok(ResolvedAnchor {
            anchor: Anchor::Segment(segment),
            tolerance: Some(relative.tolerance * self.scale),
        })
    }

    fn resolve_model_offset(
        &self,
        offset: &ModelOffsetReference,
    ) -> Result<ResolvedAnchor, SkipReason> {
        let base = self
            .base_point
            .ok_or_else(|| SkipReason::BasePointUnavailable(self.floor.name.clone()))?;
        let to_drawing =
            |point: Point2| base.translate(Vector2::from(point.scale(self.scale).as_vec2()));

        let anchor = match (offset.start, offset.end) {
            (Some(start), Some(end)) => Anchor::Segment(Segment2::new(to_drawing(start), to_drawing(end))),
            _ => {
                let location = to_drawing(offset.midpoint);
                Anchor::Point {
                    location,
                    geometry: BeamGeometry::level_at(location),
                }
            }
        };
        Ok(ResolvedAnchor {
            anchor,
            tolerance: None,
        })
    }
}
