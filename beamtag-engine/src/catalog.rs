//! 从图面实体中识别楼层、轴线与轴号。

use beamtag_core::document::EntityId;
use beamtag_core::geometry::{Point2, Segment2, Vector2};
use beamtag_core::model::{GridAxis, natural_cmp};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info, warn};

use crate::errors::EngineError;
use crate::host::{EntityStore, LineRecord, TextRecord};
use crate::matcher;

static GRID_LABEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9A-Za-z']+$").expect("grid label pattern is valid"));

/// 识别参数，默认值与常用结构图图层约定一致。
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogSettings {
    pub title_layer: String,
    pub marker_layer: String,
    pub grid_layer: String,
    pub frame_width: f64,
    /// 判定直线水平/垂直时允许的坐标差。
    pub axis_tolerance: f64,
    /// 轴号关联到轴线的最大距离（不含）。
    pub marker_distance: f64,
    /// 启发式判定中坐标"近似相等"的容差。
    pub heuristic_tolerance: f64,
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self {
            title_layer: "S-TITLE".to_string(),
            marker_layer: "S-GRID-T".to_string(),
            grid_layer: "S-GRID".to_string(),
            frame_width: 50_000.0,
            axis_tolerance: 1.0,
            marker_distance: 500.0,
            heuristic_tolerance: 1_000.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineOrientation {
    Vertical,
    Horizontal,
    Skewed,
}

impl LineOrientation {
    pub fn classify(segment: &Segment2, tolerance: f64) -> Self {
        let delta = segment.delta();
        if delta.x().abs() < tolerance {
            LineOrientation::Vertical
        } else if delta.y().abs() < tolerance {
            LineOrientation::Horizontal
        } else {
            LineOrientation::Skewed
        }
    }

    /// 斜向轴线归入 Y 向一族。
    #[inline]
    pub fn axis(self) -> GridAxis {
        match self {
            LineOrientation::Vertical => GridAxis::Vertical,
            LineOrientation::Horizontal | LineOrientation::Skewed => GridAxis::Horizontal,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridSource {
    Line(EntityId),
    /// 没有轴线可供关联时，由轴号位置推断出的退化轴线。
    Heuristic,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GridLine {
    pub name: String,
    pub axis: GridAxis,
    pub orientation: LineOrientation,
    /// X 向轴线取起点 X，Y 向轴线取起点 Y。
    pub position: f64,
    pub start: Point2,
    pub end: Point2,
    pub source: GridSource,
}

impl GridLine {
    fn from_line(name: &str, line: &LineRecord, tolerance: f64) -> Self {
        let orientation = LineOrientation::classify(&line.segment, tolerance);
        let axis = orientation.axis();
        let start = line.segment.start;
        Self {
            name: name.to_string(),
            axis,
            orientation,
            position: axis_coordinate(axis, start),
            start,
            end: line.segment.end,
            source: GridSource::Line(line.id),
        }
    }

    fn from_marker(name: &str, axis: GridAxis, position: Point2) -> Self {
        let orientation = match axis {
            GridAxis::Vertical => LineOrientation::Vertical,
            GridAxis::Horizontal => LineOrientation::Horizontal,
        };
        Self {
            name: name.to_string(),
            axis,
            orientation,
            position: axis_coordinate(axis, position),
            start: position,
            end: position,
            source: GridSource::Heuristic,
        }
    }

    #[inline]
    pub fn segment(&self) -> Segment2 {
        Segment2::new(self.start, self.end)
    }

    #[inline]
    pub fn delta(&self) -> Vector2 {
        self.segment().delta()
    }
}

fn axis_coordinate(axis: GridAxis, point: Point2) -> f64 {
    match axis {
        GridAxis::Vertical => point.x(),
        GridAxis::Horizontal => point.y(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MarkerClass {
    /// 关联到了某条轴线，记录垂足距离。
    Line { axis: GridAxis, distance: f64 },
    Heuristic(GridAxis),
    Unclassified,
}

impl MarkerClass {
    pub fn axis(self) -> Option<GridAxis> {
        match self {
            MarkerClass::Line { axis, .. } | MarkerClass::Heuristic(axis) => Some(axis),
            MarkerClass::Unclassified => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GridMarker {
    pub label: String,
    pub position: Point2,
    pub class: MarkerClass,
}

/// 一个楼层图框：以标题为锚点、按图框宽度切出的水平带。
#[derive(Debug, Clone, PartialEq)]
pub struct FloorScope {
    pub name: String,
    /// 标题括号内的楼层代号，如 `2F`。
    pub code: Option<String>,
    pub origin_x: f64,
    pub frame_width: f64,
    grids: Vec<GridLine>,
    markers: Vec<GridMarker>,
}

impl FloorScope {
    fn new(title: &FloorTitle, frame_width: f64) -> Self {
        Self {
            name: title.name.clone(),
            code: title.code.clone(),
            origin_x: floor_origin(title.position.x(), frame_width),
            frame_width,
            grids: Vec::new(),
            markers: Vec::new(),
        }
    }

    #[inline]
    pub fn contains_x(&self, x: f64) -> bool {
        x >= self.origin_x && x < self.origin_x + self.frame_width
    }

    /// 楼层名或括号内代号任一相同即视为同一楼层。
    pub fn matches(&self, story: &str) -> bool {
        let story = story.trim();
        self.name == story || self.code.as_deref() == Some(story)
    }

    #[inline]
    pub fn grids(&self) -> &[GridLine] {
        &self.grids
    }

    #[inline]
    pub fn markers(&self) -> &[GridMarker] {
        &self.markers
    }

    pub fn grid(&self, axis: GridAxis, name: &str) -> Option<&GridLine> {
        self.grids
            .iter()
            .find(|grid| grid.axis == axis && grid.name == name)
    }

    pub fn grids_on(&self, axis: GridAxis) -> impl Iterator<Item = &GridLine> {
        self.grids.iter().filter(move |grid| grid.axis == axis)
    }

    /// 按坐标升序排列的轴线（坐标相同时按名称自然顺序）。
    pub fn ordered_grids(&self, axis: GridAxis) -> Vec<&GridLine> {
        let mut grids: Vec<&GridLine> = self.grids_on(axis).collect();
        grids.sort_by(|a, b| {
            a.position
                .total_cmp(&b.position)
                .then_with(|| natural_cmp(&a.name, &b.name))
        });
        grids
    }

    pub fn ordered_names(&self, axis: GridAxis) -> Vec<String> {
        self.ordered_grids(axis)
            .into_iter()
            .map(|grid| grid.name.clone())
            .collect()
    }

    /// 楼层基准点：坐标最小的 X 向轴线与坐标最小的 Y 向轴线的交点。
    pub fn base_point(&self) -> Option<Point2> {
        let x = self.ordered_grids(GridAxis::Vertical).first()?.position;
        let y = self.ordered_grids(GridAxis::Horizontal).first()?.position;
        Some(Point2::new(x, y))
    }

    fn push_grid(&mut self, grid: GridLine) {
        if self.grid(grid.axis, &grid.name).is_some() {
            warn!(
                floor = %self.name,
                axis = grid.axis.label(),
                name = %grid.name,
                "同一楼层出现重复轴号，保留首次识别结果"
            );
            return;
        }
        self.grids.push(grid);
    }
}

/// 图框原点：`floor(x / frameWidth) * frameWidth`。
#[inline]
pub fn floor_origin(x: f64, frame_width: f64) -> f64 {
    (x / frame_width).floor() * frame_width
}

#[derive(Debug, Clone, PartialEq)]
struct FloorTitle {
    name: String,
    code: Option<String>,
    position: Point2,
}

/// 标题文字中第一个 `(` 之前的部分为楼层名，括号内为代号。
pub fn parse_floor_title(content: &str) -> Option<(String, Option<String>)> {
    let content = content.trim();
    let (name, rest) = match content.find(['(', '（']) {
        Some(index) => (&content[..index], Some(&content[index..])),
        None => (content, None),
    };
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    let code = rest.and_then(|rest| {
        let inner = rest
            .trim_start_matches(['(', '（'])
            .split([')', '）'])
            .next()?
            .trim();
        (!inner.is_empty()).then(|| inner.to_string())
    });
    Some((name.to_string(), code))
}

#[inline]
pub fn is_grid_label(text: &str) -> bool {
    GRID_LABEL.is_match(text)
}

/// 识别完成后的只读轴网目录。
#[derive(Debug, Clone, PartialEq)]
pub struct GridCatalog {
    floors: Vec<FloorScope>,
}

impl GridCatalog {
    /// 扫描图面。标题、轴号或轴线任一为空即视为配置错误，不返回部分结果。
    pub fn scan(store: &dyn EntityStore, settings: &CatalogSettings) -> Result<Self, EngineError> {
        if !(settings.frame_width > 0.0) {
            return Err(EngineError::InvalidOptions(format!(
                "图框宽度必须为正数，当前为 {}",
                settings.frame_width
            )));
        }

        let titles = store.texts_on_layer(&settings.title_layer);
        if titles.is_empty() {
            return Err(EngineError::MissingFloorTitles {
                layer: settings.title_layer.clone(),
            });
        }
        let markers = store.texts_on_layer(&settings.marker_layer);
        if markers.is_empty() {
            return Err(EngineError::MissingGridMarkers {
                layer: settings.marker_layer.clone(),
            });
        }
        let lines = store.lines_on_layer(&settings.grid_layer);
        if lines.is_empty() {
            return Err(EngineError::MissingGridLines {
                layer: settings.grid_layer.clone(),
            });
        }
        info!(
            titles = titles.len(),
            markers = markers.len(),
            lines = lines.len(),
            "开始识别轴网"
        );

        let mut floors: Vec<FloorScope> = Vec::new();
        for title in collect_titles(&titles) {
            if floors.iter().any(|floor| floor.name == title.name) {
                warn!(floor = %title.name, "楼层标题重复，忽略后出现的标题");
                continue;
            }
            let mut floor = FloorScope::new(&title, settings.frame_width);
            classify_floor(&mut floor, &markers, &lines, settings);
            if floor.grids.is_empty() {
                debug!(floor = %floor.name, origin = floor.origin_x, "楼层内未识别出轴线，已忽略");
                continue;
            }
            debug!(
                floor = %floor.name,
                origin = floor.origin_x,
                x_grids = floor.grids_on(GridAxis::Vertical).count(),
                y_grids = floor.grids_on(GridAxis::Horizontal).count(),
                "楼层轴网识别完成"
            );
            floors.push(floor);
        }

        if floors.is_empty() {
            return Err(EngineError::NoClassifiedFloors);
        }
        floors.sort_by(|a, b| a.origin_x.total_cmp(&b.origin_x));
        info!(floors = floors.len(), "轴网目录已建立");

        Ok(Self { floors })
    }

    #[inline]
    pub fn floors(&self) -> &[FloorScope] {
        &self.floors
    }

    pub fn floor(&self, story: &str) -> Option<&FloorScope> {
        self.floors.iter().find(|floor| floor.matches(story))
    }

    #[inline]
    pub fn first_floor(&self) -> Option<&FloorScope> {
        self.floors.first()
    }

    pub fn floor_names(&self) -> Vec<&str> {
        self.floors.iter().map(|floor| floor.name.as_str()).collect()
    }
}

fn collect_titles(texts: &[TextRecord]) -> Vec<FloorTitle> {
    texts
        .iter()
        .filter_map(|text| {
            let (name, code) = parse_floor_title(&text.content)?;
            Some(FloorTitle {
                name,
                code,
                position: text.position,
            })
        })
        .collect()
}

fn classify_floor(
    floor: &mut FloorScope,
    markers: &[TextRecord],
    lines: &[LineRecord],
    settings: &CatalogSettings,
) {
    let floor_lines: Vec<&LineRecord> = lines
        .iter()
        .filter(|line| floor.contains_x(line.segment.start.x()))
        .collect();

    for text in markers {
        if !floor.contains_x(text.position.x()) {
            continue;
        }
        let label = text.content.trim();
        if !is_grid_label(label) {
            continue;
        }

        let class = if floor_lines.is_empty() {
            let class = guess_axis(text.position, &floor.markers, settings.heuristic_tolerance)
                .map_or(MarkerClass::Unclassified, MarkerClass::Heuristic);
            if let MarkerClass::Heuristic(axis) = class {
                floor.push_grid(GridLine::from_marker(label, axis, text.position));
            }
            class
        } else {
            associate(floor, label, text.position, &floor_lines, settings)
        };

        if class == MarkerClass::Unclassified {
            debug!(floor = %floor.name, label, x = text.position.x(), y = text.position.y(), "轴号未能归类");
        }
        floor.markers.push(GridMarker {
            label: label.to_string(),
            position: text.position,
            class,
        });
    }
}

fn associate(
    floor: &mut FloorScope,
    label: &str,
    position: Point2,
    floor_lines: &[&LineRecord],
    settings: &CatalogSettings,
) -> MarkerClass {
    let nearest = matcher::nearest_segment(position, floor_lines.iter().map(|line| &line.segment));
    match nearest {
        Some((index, distance)) if distance < settings.marker_distance => {
            let grid = GridLine::from_line(label, floor_lines[index], settings.axis_tolerance);
            let axis = grid.axis;
            floor.push_grid(grid);
            MarkerClass::Line { axis, distance }
        }
        _ => MarkerClass::Unclassified,
    }
}

/// 统计已处理轴号中与当前轴号 Y 近似相同与 X 近似相同的数量，多者决定方向。
/// 同一行排列的轴号标注的是垂直轴线。
fn guess_axis(position: Point2, previous: &[GridMarker], tolerance: f64) -> Option<GridAxis> {
    let same_y = previous
        .iter()
        .filter(|marker| (marker.position.y() - position.y()).abs() < tolerance)
        .count();
    let same_x = previous
        .iter()
        .filter(|marker| (marker.position.x() - position.x()).abs() < tolerance)
        .count();
    match same_y.cmp(&same_x) {
        std::cmp::Ordering::Greater => Some(GridAxis::Vertical),
        std::cmp::Ordering::Less => Some(GridAxis::Horizontal),
        std::cmp::Ordering::Equal => None,
    }
}
