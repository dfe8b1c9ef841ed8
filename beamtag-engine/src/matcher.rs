//! 理论梁段与图面直线的容差匹配，以及轴号到轴线的就近关联。

use beamtag_core::document::EntityId;
use beamtag_core::geometry::{Point2, Segment2};
use tracing::{debug, trace};

use crate::catalog::FloorScope;
use crate::errors::SkipReason;
use crate::host::{EntityStore, LineRecord};

/// 两条线段端点偏差之和，取两种端点配对中的较小者，与端点顺序无关。
pub fn endpoint_deviation(candidate: &Segment2, target: &Segment2) -> f64 {
    let forward =
        candidate.start.distance_to(target.start) + candidate.end.distance_to(target.end);
    let backward =
        candidate.start.distance_to(target.end) + candidate.end.distance_to(target.start);
    forward.min(backward)
}

/// 距离点最近的线段下标及垂足距离；距离相同时取先出现者。
pub fn nearest_segment<'a>(
    point: Point2,
    segments: impl IntoIterator<Item = &'a Segment2>,
) -> Option<(usize, f64)> {
    let mut best: Option<(usize, f64)> = None;
    for (index, segment) in segments.into_iter().enumerate() {
        let distance = segment.distance_to_point(point);
        let better = match best {
            Some((_, current)) => distance < current,
            None => true,
        };
        if better {
            best = Some((index, distance));
        }
    }
    best
}

#[derive(Debug, Clone, PartialEq)]
pub struct SegmentMatch {
    pub id: EntityId,
    pub segment: Segment2,
    pub deviation: f64,
}

/// 候选梁线快照，在写入任何标注之前一次性采集。
#[derive(Debug, Clone, Default)]
pub struct SpatialMatcher {
    candidates: Vec<LineRecord>,
}

impl SpatialMatcher {
    pub fn new(candidates: Vec<LineRecord>) -> Self {
        Self { candidates }
    }

    /// 采集候选直线：给定梁图层时只取这些图层，否则取轴线图层以外的全部直线。
    pub fn from_store(store: &dyn EntityStore, beam_layers: &[String], grid_layer: &str) -> Self {
        let candidates: Vec<LineRecord> = store
            .lines()
            .into_iter()
            .filter(|line| {
                if beam_layers.is_empty() {
                    !line.layer.eq_ignore_ascii_case(grid_layer)
                } else {
                    beam_layers
                        .iter()
                        .any(|layer| line.layer.eq_ignore_ascii_case(layer))
                }
            })
            .collect();
        debug!(candidates = candidates.len(), "已采集候选梁线");
        Self { candidates }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// 楼层图框内偏差最小的候选线，不考虑容差。
    pub fn closest(&self, floor: &FloorScope, target: &Segment2) -> Option<SegmentMatch> {
        let mut best: Option<SegmentMatch> = None;
        for candidate in &self.candidates {
            if !floor.contains_x(candidate.segment.start.x()) {
                continue;
            }
            let deviation = endpoint_deviation(&candidate.segment, target);
            let better = match &best {
                Some(current) => deviation < current.deviation,
                None => true,
            };
            if better {
                best = Some(SegmentMatch {
                    id: candidate.id,
                    segment: candidate.segment,
                    deviation,
                });
            }
        }
        best
    }

    /// 偏差最小且严格小于容差的候选线。
    pub fn find_match(
        &self,
        floor: &FloorScope,
        target: &Segment2,
        tolerance: f64,
    ) -> Result<SegmentMatch, SkipReason> {
        let closest = self.closest(floor, target);
        match closest {
            Some(found) if found.deviation < tolerance => {
                trace!(entity = found.id.get(), deviation = found.deviation, "梁线匹配成功");
                Ok(found)
            }
            other => Err(SkipReason::NoSegmentMatch {
                tolerance,
                closest: other.map(|found| found.deviation),
            }),
        }
    }
}
