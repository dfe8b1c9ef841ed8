//! 三阶段标注流程：只读识别、确认对应关系、逐梁解析匹配放置。
//! 第三阶段开始之前不写入任何实体。

use std::collections::{BTreeMap, HashMap};

use beamtag_core::document::EntityId;
use beamtag_core::geometry::Point2;
use beamtag_core::model::{BeamRecord, BeamSet, GridReference};
use tracing::{debug, info, warn};

use crate::anchor::{Anchor, BeamAnchorResolver};
use crate::catalog::{CatalogSettings, FloorScope, GridCatalog};
use crate::correspondence::{GridCorrespondence, propose};
use crate::errors::{EngineError, SkipKind, SkipReason};
use crate::host::{EntityStore, Prompter};
use crate::matcher::SpatialMatcher;
use crate::placer::{BeamGeometry, LabelPlacer, LabelResult, PlacementStyle};

/// 模型坐标定位的楼层基准点来源。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BasePointStrategy {
    /// 取楼层首根 X、Y 向轴线交点，缺失时再询问用户。
    #[default]
    Auto,
    Prompt,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunOptions {
    pub catalog: CatalogSettings,
    pub placement: PlacementStyle,
    /// 模型单位到图面单位的比例。
    pub scale: f64,
    /// 无自带容差的线段锚点使用的匹配容差（图面单位）。
    pub match_tolerance: f64,
    /// 候选梁线图层，为空时取轴线图层以外的全部直线。
    pub beam_layers: Vec<String>,
    pub reference_floor: Option<String>,
    pub base_point: BasePointStrategy,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            catalog: CatalogSettings::default(),
            placement: PlacementStyle::default(),
            scale: 1000.0,
            match_tolerance: 500.0,
            beam_layers: Vec::new(),
            reference_floor: None,
            base_point: BasePointStrategy::Auto,
        }
    }
}

impl RunOptions {
    pub fn validate(&self) -> Result<(), EngineError> {
        if !(self.scale > 0.0) {
            return Err(EngineError::InvalidOptions(format!(
                "比例必须为正数，当前为 {}",
                self.scale
            )));
        }
        if !(self.catalog.frame_width > 0.0) {
            return Err(EngineError::InvalidOptions(format!(
                "图框宽度必须为正数，当前为 {}",
                self.catalog.frame_width
            )));
        }
        if !(self.match_tolerance >= 0.0) {
            return Err(EngineError::InvalidOptions(format!(
                "匹配容差不能为负，当前为 {}",
                self.match_tolerance
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlacedLabel {
    pub beam_id: String,
    pub story: String,
    pub entity: EntityId,
    pub label: LabelResult,
    /// 线段锚点匹配到的端点偏差。
    pub deviation: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedBeam {
    pub beam_id: String,
    pub label: String,
    pub story: String,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub placed: Vec<PlacedLabel>,
    pub skipped: Vec<SkippedBeam>,
}

impl RunSummary {
    #[inline]
    pub fn placed_count(&self) -> usize {
        self.placed.len()
    }

    #[inline]
    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }

    pub fn skip_counts(&self) -> BTreeMap<SkipKind, usize> {
        let mut counts = BTreeMap::new();
        for skipped in &self.skipped {
            *counts.entry(skipped.reason.kind()).or_insert(0) += 1;
        }
        counts
    }
}

/// 执行一次完整标注。返回错误时图面未被修改。
pub fn run(
    store: &mut dyn EntityStore,
    prompter: &mut dyn Prompter,
    beams: &BeamSet,
    options: &RunOptions,
) -> Result<RunSummary, EngineError> {
    options.validate()?;

    // 阶段一：只读识别与候选梁线快照
    let catalog = GridCatalog::scan(&*store, &options.catalog)?;
    let matcher = SpatialMatcher::from_store(&*store, &options.beam_layers, &options.catalog.grid_layer);

    // 阶段二：对应关系确认及基准点询问
    let reference = match &options.reference_floor {
        Some(name) => catalog
            .floor(name)
            .ok_or_else(|| EngineError::ReferenceFloorNotFound(name.clone()))?,
        None => catalog.first_floor().ok_or(EngineError::NoClassifiedFloors)?,
    };
    let correspondence = propose(&beams.model_grid_names(), reference).confirm(prompter)?;
    let base_points = collect_base_points(&catalog, beams, options.base_point, prompter);

    // 阶段三：逐梁处理
    let placer = LabelPlacer::new(options.placement.clone());
    let style = prepare_host(store, placer.style());
    let context = BeamContext {
        catalog: &catalog,
        correspondence: &correspondence,
        matcher: &matcher,
        placer: &placer,
        base_points: &base_points,
        options,
        style: &style,
    };

    let mut summary = RunSummary::default();
    for beam in &beams.beams {
        match context.process(store, beam) {
            Ok(placed) => {
                debug!(beam = %beam.id, label = %beam.label, entity = placed.entity.get(), "标注已写入");
                summary.placed.push(placed);
            }
            Err(reason) => {
                warn!(beam = %beam.id, story = %beam.story, %reason, "梁已跳过");
                summary.skipped.push(SkippedBeam {
                    beam_id: beam.id.clone(),
                    label: beam.label.clone(),
                    story: beam.story.clone(),
                    reason,
                });
            }
        }
    }

    info!(
        placed = summary.placed_count(),
        skipped = summary.skipped_count(),
        "标注完成"
    );
    Ok(summary)
}

/// 确保标注图层存在，并返回实际可用的文字样式。
fn prepare_host(store: &mut dyn EntityStore, style: &PlacementStyle) -> String {
    store.ensure_layer(&style.main_layer, style.color);
    store.ensure_layer(&style.secondary_layer, style.color);
    if store.has_text_style(&style.text_style) {
        style.text_style.clone()
    } else {
        warn!(
            style = %style.text_style,
            fallback = %style.fallback_style,
            "文字样式不存在，改用备用样式"
        );
        style.fallback_style.clone()
    }
}

/// 为含模型坐标定位梁的楼层准备基准点。
fn collect_base_points(
    catalog: &GridCatalog,
    beams: &BeamSet,
    strategy: BasePointStrategy,
    prompter: &mut dyn Prompter,
) -> HashMap<String, Point2> {
    let mut points = HashMap::new();
    let mut visited: Vec<&str> = Vec::new();
    for beam in &beams.beams {
        if !matches!(beam.reference, GridReference::ModelOffset(_)) {
            continue;
        }
        let Some(floor) = catalog.floor(&beam.story) else {
            continue;
        };
        if visited.contains(&floor.name.as_str()) {
            continue;
        }
        visited.push(&floor.name);

        let detected = match strategy {
            BasePointStrategy::Auto => floor.base_point(),
            BasePointStrategy::Prompt => None,
        };
        let point = detected.or_else(|| {
            prompter.get_point(&format!("请指定楼层 {} 的基准点 (轴线交点)", floor.name))
        });
        match point {
            Some(point) => {
                info!(floor = %floor.name, x = point.x(), y = point.y(), "楼层基准点");
                points.insert(floor.name.clone(), point);
            }
            None => warn!(floor = %floor.name, "未获得楼层基准点"),
        }
    }
    points
}

struct BeamContext<'a> {
    catalog: &'a GridCatalog,
    correspondence: &'a GridCorrespondence,
    matcher: &'a SpatialMatcher,
    placer: &'a LabelPlacer,
    base_points: &'a HashMap<String, Point2>,
    options: &'a RunOptions,
    style: &'a str,
}

impl BeamContext<'_> {
    fn process(
        &self,
        store: &mut dyn EntityStore,
        beam: &BeamRecord,
    ) -> Result<PlacedLabel, SkipReason> {
        let floor: &FloorScope = self
            .catalog
            .floor(&beam.story)
            .ok_or_else(|| SkipReason::FloorNotFound(beam.story.clone()))?;
        let resolver = BeamAnchorResolver::new(floor, self.correspondence, self.options.scale)
            .with_base_point(self.base_points.get(&floor.name).copied());
        let resolved = resolver.resolve(&beam.reference)?;

        let (geometry, deviation) = match resolved.anchor {
            Anchor::Point { geometry, .. } => (geometry, None),
            Anchor::Segment(target) => {
                let tolerance = resolved.tolerance.unwrap_or(self.options.match_tolerance);
                let found = self.matcher.find_match(floor, &target, tolerance)?;
                (BeamGeometry::from_segment(&found.segment), Some(found.deviation))
            }
        };

        let label = self.placer.place(&beam.label, beam.is_main, &geometry);
        let entity = self.placer.to_entity(&label, self.style);
        let id = store
            .append_label(&entity)
            .map_err(|err| SkipReason::LabelWrite(err.to_string()))?;

        Ok(PlacedLabel {
            beam_id: beam.id.clone(),
            story: beam.story.clone(),
            entity: id,
            label,
            deviation,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{LabelEntity, LineRecord, ScriptedAnswer, ScriptedPrompter, StoreError, TextRecord};
    use crate::placer::LabelTarget;
    use beamtag_core::document::Document;
    use beamtag_core::model::{BeamDirection, ModelOffsetReference, RelativeReference};
    use std::f64::consts::FRAC_PI_2;

    /// 二层：X 轴线 1/2/3 (x=1000/7000/13000)，Y 轴线 A/B (y=1000/6000)，
    /// 沿 A 轴 1~2 间一根水平梁，沿 3 轴 A~B 间一根垂直梁。
    fn drawing() -> Document {
        let mut doc = Document::new();
        doc.add_text(Point2::new(0.0, -2000.0), "二層結構平面圖(2F)", 500.0, 0.0, "S-TITLE");
        for (name, x) in [("1", 1000.0), ("2", 7000.0), ("3", 13_000.0)] {
            doc.add_line(Point2::new(x, 0.0), Point2::new(x, 10_000.0), "S-GRID");
            doc.add_text(Point2::new(x, 10_300.0), name, 300.0, 0.0, "S-GRID-T");
        }
        for (name, y) in [("A", 1000.0), ("B", 6000.0)] {
            doc.add_line(Point2::new(0.0, y), Point2::new(20_000.0, y), "S-GRID");
            doc.add_text(Point2::new(300.0, y), name, 300.0, 0.0, "S-GRID-T");
        }
        doc.add_line(Point2::new(7000.0, 1000.0), Point2::new(1000.0, 1000.0), "S-BEAM");
        doc.add_line(Point2::new(13_000.0, 1000.0), Point2::new(13_000.0, 6000.0), "S-BEAM");
        doc
    }

    fn relative(id: &str, along: &str, between: [&str; 2], direction: BeamDirection) -> BeamRecord {
        BeamRecord {
            id: id.to_string(),
            label: format!("G{id}"),
            story: "二層結構平面圖".to_string(),
            section: None,
            is_main: true,
            reference: GridReference::Relative(RelativeReference {
                along_grid: along.to_string(),
                between: between.map(str::to_string),
                direction,
                offset_from_start: 0.0,
                length: 6.0,
                tolerance: 0.1,
            }),
        }
    }

    fn absolute(id: &str, story: &str, x: &str, y: &str) -> BeamRecord {
        BeamRecord {
            id: id.to_string(),
            label: format!("b{id}"),
            story: story.to_string(),
            section: None,
            is_main: false,
            reference: GridReference::Absolute {
                x_grid: x.to_string(),
                y_grid: y.to_string(),
            },
        }
    }

    fn beam_set(beams: Vec<BeamRecord>) -> BeamSet {
        BeamSet {
            project: Some("demo".to_string()),
            grid_system: None,
            beams,
        }
    }

    fn label_count(doc: &Document) -> usize {
        doc.texts_on_layer("S-TEXTG").len() + doc.texts_on_layer("S-TEXTB").len()
    }

    #[test]
    fn labels_matched_and_absolute_beams() {
        let mut doc = drawing();
        let beams = beam_set(vec![
            relative("1", "A", ["1", "2"], BeamDirection::Horizontal),
            relative("2", "3", ["A", "B"], BeamDirection::Vertical),
            absolute("3", "2F", "2", "B"),
        ]);
        let mut prompter = ScriptedPrompter::accepting();
        let summary = run(&mut doc, &mut prompter, &beams, &RunOptions::default()).expect("运行应成功");

        assert_eq!(summary.placed_count(), 3);
        assert_eq!(summary.skipped_count(), 0);

        let horizontal = &summary.placed[0].label;
        assert_eq!(horizontal.position, Point2::new(4000.0, 1400.0));
        assert_eq!(horizontal.rotation, 0.0);
        assert_eq!(summary.placed[0].deviation, Some(0.0));

        let vertical = &summary.placed[1].label;
        assert_eq!(vertical.position, Point2::new(12_600.0, 3500.0));
        assert!((vertical.rotation - FRAC_PI_2).abs() < 1e-12);

        let point = &summary.placed[2].label;
        assert_eq!(point.target, LabelTarget::Secondary);
        assert_eq!(point.position, Point2::new(7000.0, 6400.0));

        assert!(doc.has_layer("S-TEXTG"));
        assert!(doc.has_layer("S-TEXTB"));
        assert_eq!(label_count(&doc), 3);
    }

    #[test]
    fn unmapped_grid_is_skipped_and_counted() {
        let mut doc = drawing();
        let mut beams = beam_set(vec![
            absolute("1", "2F", "1", "A"),
            absolute("2", "2F", "4", "A"),
            absolute("3", "RF", "1", "A"),
        ]);
        beams.grid_system = Some(beamtag_core::model::GridSystem {
            x_grids: vec!["1".to_string(), "2".to_string(), "3".to_string(), "4".to_string()],
            y_grids: vec!["A".to_string(), "B".to_string()],
        });
        let mut prompter = ScriptedPrompter::accepting();
        let summary = run(&mut doc, &mut prompter, &beams, &RunOptions::default()).expect("运行应成功");

        assert_eq!(summary.placed_count(), 1);
        let counts = summary.skip_counts();
        assert_eq!(counts.get(&SkipKind::GridResolution), Some(&1));
        assert_eq!(counts.get(&SkipKind::FloorNotFound), Some(&1));
        assert_eq!(label_count(&doc), 1);
    }

    #[test]
    fn rejected_correspondence_writes_nothing() {
        let mut doc = drawing();
        let before = doc.entities().count();
        let layers_before = doc.layers().count();
        let beams = beam_set(vec![absolute("1", "2F", "1", "A")]);
        let mut prompter = ScriptedPrompter::new([ScriptedAnswer::Keyword("N".to_string())]);

        let result = run(&mut doc, &mut prompter, &beams, &RunOptions::default());
        assert!(matches!(result, Err(EngineError::CorrespondenceRejected)));
        assert_eq!(doc.entities().count(), before);
        assert_eq!(doc.layers().count(), layers_before);
    }

    #[test]
    fn configuration_error_aborts_before_prompting() {
        let mut doc = Document::new();
        doc.add_line(Point2::new(0.0, 0.0), Point2::new(0.0, 10.0), "S-GRID");
        let beams = beam_set(vec![absolute("1", "2F", "1", "A")]);
        let mut prompter = ScriptedPrompter::accepting();

        let result = run(&mut doc, &mut prompter, &beams, &RunOptions::default());
        assert!(matches!(result, Err(EngineError::MissingFloorTitles { .. })));
        assert!(prompter.prompts().is_empty());
        assert_eq!(doc.entities().count(), 1);
    }

    #[test]
    fn beam_outside_tolerance_is_spatial_skip() {
        let mut doc = drawing();
        let mut beam = relative("9", "B", ["1", "2"], BeamDirection::Horizontal);
        if let GridReference::Relative(reference) = &mut beam.reference {
            reference.tolerance = 0.0;
        }
        let beams = beam_set(vec![beam]);
        let mut prompter = ScriptedPrompter::accepting();
        let summary = run(&mut doc, &mut prompter, &beams, &RunOptions::default()).expect("运行应成功");
        assert_eq!(summary.placed_count(), 0);
        assert_eq!(summary.skip_counts().get(&SkipKind::SpatialMatch), Some(&1));
    }

    #[test]
    fn model_offset_beams_use_detected_base_point() {
        let mut doc = drawing();
        let beams = beam_set(vec![BeamRecord {
            id: "7".to_string(),
            label: "G7".to_string(),
            story: "2F".to_string(),
            section: None,
            is_main: true,
            reference: GridReference::ModelOffset(ModelOffsetReference {
                start: Some(Point2::new(0.0, 0.0)),
                end: Some(Point2::new(6.0, 0.0)),
                midpoint: Point2::new(3.0, 0.0),
            }),
        }]);
        let mut prompter = ScriptedPrompter::accepting();
        let summary = run(&mut doc, &mut prompter, &beams, &RunOptions::default()).expect("运行应成功");
        assert_eq!(summary.placed_count(), 1);
        assert_eq!(summary.placed[0].label.position, Point2::new(4000.0, 1400.0));

        let mut doc = drawing();
        let options = RunOptions {
            base_point: BasePointStrategy::Prompt,
            ..RunOptions::default()
        };
        let mut prompter = ScriptedPrompter::new([
            ScriptedAnswer::Keyword("Y".to_string()),
            ScriptedAnswer::Cancel,
        ]);
        let summary = run(&mut doc, &mut prompter, &beams, &options).expect("运行应成功");
        assert_eq!(summary.placed_count(), 0);
        assert_eq!(summary.skip_counts().get(&SkipKind::GridResolution), Some(&1));
    }

    #[test]
    fn missing_text_style_falls_back() {
        let mut doc = drawing();
        let beams = beam_set(vec![absolute("1", "2F", "1", "A")]);
        let mut prompter = ScriptedPrompter::accepting();
        let summary = run(&mut doc, &mut prompter, &beams, &RunOptions::default()).expect("运行应成功");
        match doc.entity(summary.placed[0].entity) {
            Some(beamtag_core::document::Entity::Text(text)) => {
                assert_eq!(text.style.as_deref(), Some("Standard"));
                assert_eq!(text.height, 300.0);
            }
            other => panic!("unexpected entity: {other:?}"),
        }
    }

    #[test]
    fn invalid_options_are_rejected() {
        let mut doc = drawing();
        let beams = beam_set(Vec::new());
        let mut prompter = ScriptedPrompter::accepting();
        let options = RunOptions {
            scale: 0.0,
            ..RunOptions::default()
        };
        assert!(matches!(
            run(&mut doc, &mut prompter, &beams, &options),
            Err(EngineError::InvalidOptions(_))
        ));
    }

    /// 拒绝所有写入的宿主，用于验证写入失败只影响当前梁。
    struct ReadOnlyStore(Document);

    impl EntityStore for ReadOnlyStore {
        fn lines(&self) -> Vec<LineRecord> {
            self.0.lines()
        }

        fn texts(&self) -> Vec<TextRecord> {
            self.0.texts()
        }

        fn has_layer(&self, name: &str) -> bool {
            self.0.has_layer(name)
        }

        fn ensure_layer(&mut self, _name: &str, _color: i16) {}

        fn has_text_style(&self, name: &str) -> bool {
            self.0.has_text_style(name)
        }

        fn append_label(&mut self, label: &LabelEntity) -> Result<EntityId, StoreError> {
            Err(StoreError::Rejected(format!("只读图面，无法写入 {}", label.content)))
        }
    }

    #[test]
    fn write_failures_are_counted_per_beam() {
        let mut store = ReadOnlyStore(drawing());
        let beams = beam_set(vec![absolute("1", "2F", "1", "A"), absolute("2", "2F", "2", "B")]);
        let mut prompter = ScriptedPrompter::accepting();
        let summary = run(&mut store, &mut prompter, &beams, &RunOptions::default()).expect("运行应成功");
        assert_eq!(summary.placed_count(), 0);
        assert_eq!(summary.skip_counts().get(&SkipKind::LabelWrite), Some(&2));
    }
}
