pub mod model;

pub mod geometry {
    use glam::DVec2;
    use serde::{Deserialize, Serialize};

    /// 二维点，内部以 `glam::DVec2` 表示。图面坐标与模型坐标共用此类型，
    /// 由调用方保证在比较前完成单位换算。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Point2(pub DVec2);

    impl Point2 {
        #[inline]
        pub fn new(x: f64, y: f64) -> Self {
            Self(DVec2::new(x, y))
        }

        #[inline]
        pub fn from_vec(vec: DVec2) -> Self {
            Self(vec)
        }

        #[inline]
        pub fn x(self) -> f64 {
            self.0.x
        }

        #[inline]
        pub fn y(self) -> f64 {
            self.0.y
        }

        #[inline]
        pub fn translate(self, offset: Vector2) -> Self {
            Self(self.0 + offset.0)
        }

        #[inline]
        pub fn vector_to(self, other: Point2) -> Vector2 {
            Vector2(other.0 - self.0)
        }

        #[inline]
        pub fn distance_to(self, other: Point2) -> f64 {
            self.0.distance(other.0)
        }

        /// 按比例缩放坐标（相对原点），用于模型单位到图面单位的换算。
        #[inline]
        pub fn scale(self, factor: f64) -> Self {
            Self(self.0 * factor)
        }

        #[inline]
        pub fn as_vec2(self) -> DVec2 {
            self.0
        }
    }

    impl From<DVec2> for Point2 {
        fn from(value: DVec2) -> Self {
            Self::from_vec(value)
        }
    }

    /// 二维向量。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Vector2(pub DVec2);

    impl Vector2 {
        #[inline]
        pub fn new(x: f64, y: f64) -> Self {
            Self(DVec2::new(x, y))
        }

        #[inline]
        pub fn from_points(start: Point2, end: Point2) -> Self {
            Self(end.0 - start.0)
        }

        /// 由长度与方向角（弧度）构造向量。
        #[inline]
        pub fn from_polar(length: f64, angle: f64) -> Self {
            Self(DVec2::new(angle.cos(), angle.sin()) * length)
        }

        #[inline]
        pub fn length(self) -> f64 {
            self.0.length()
        }

        #[inline]
        pub fn length_squared(self) -> f64 {
            self.0.length_squared()
        }

        #[inline]
        pub fn dot(self, other: Vector2) -> f64 {
            self.0.dot(other.0)
        }

        /// 相对 +X 轴的方向角，范围 `(-π, π]`。
        #[inline]
        pub fn angle(self) -> f64 {
            self.0.y.atan2(self.0.x)
        }

        #[inline]
        pub fn as_vec2(self) -> DVec2 {
            self.0
        }

        #[inline]
        pub fn x(self) -> f64 {
            self.0.x
        }

        #[inline]
        pub fn y(self) -> f64 {
            self.0.y
        }
    }

    impl From<DVec2> for Vector2 {
        fn from(value: DVec2) -> Self {
            Self(value)
        }
    }

    /// 有向线段。匹配与投影计算都基于它完成。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Segment2 {
        pub start: Point2,
        pub end: Point2,
    }

    impl Segment2 {
        #[inline]
        pub fn new(start: Point2, end: Point2) -> Self {
            Self { start, end }
        }

        #[inline]
        pub fn delta(&self) -> Vector2 {
            Vector2::from_points(self.start, self.end)
        }

        #[inline]
        pub fn length(&self) -> f64 {
            self.delta().length()
        }

        #[inline]
        pub fn midpoint(&self) -> Point2 {
            Point2::from_vec((self.start.as_vec2() + self.end.as_vec2()) * 0.5)
        }

        #[inline]
        pub fn reversed(&self) -> Self {
            Self {
                start: self.end,
                end: self.start,
            }
        }

        /// 点到线段的垂足距离，投影参数限制在 `[0, 1]`；
        /// 退化线段直接返回到起点的距离。
        pub fn distance_to_point(&self, point: Point2) -> f64 {
            let line = self.delta().as_vec2();
            let offset = point.as_vec2() - self.start.as_vec2();
            let length_sq = line.length_squared();
            if length_sq < 1e-4 {
                return point.distance_to(self.start);
            }
            let t = (offset.dot(line) / length_sq).clamp(0.0, 1.0);
            let projection = self.start.as_vec2() + line * t;
            point.as_vec2().distance(projection)
        }
    }
}

pub mod document {
    use std::collections::HashMap;

    use serde::{Deserialize, Serialize};

    use crate::geometry::{Point2, Segment2, Vector2};

    /// 新建文档默认携带的文字样式。
    pub const STANDARD_TEXT_STYLE: &str = "Standard";

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct EntityId(u64);

    impl EntityId {
        #[inline]
        pub fn new(raw: u64) -> Self {
            Self(raw)
        }

        /// 提供原始数值，便于序列化或日志输出。
        #[inline]
        pub fn get(self) -> u64 {
            self.0
        }
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Layer {
        pub name: String,
        pub is_visible: bool,
        /// ACI 颜色号，未指定时沿用宿主默认值。
        pub color: Option<i16>,
    }

    impl Layer {
        #[inline]
        pub fn new(name: impl Into<String>) -> Self {
            Self {
                name: name.into(),
                is_visible: true,
                color: None,
            }
        }
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct TextStyle {
        pub name: String,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub enum Entity {
        Line(Line),
        Text(Text),
        MText(MText),
    }

    impl Entity {
        #[inline]
        pub fn layer_name(&self) -> &str {
            match self {
                Entity::Line(line) => &line.layer,
                Entity::Text(text) => &text.layer,
                Entity::MText(mtext) => &mtext.layer,
            }
        }
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Line {
        pub start: Point2,
        pub end: Point2,
        pub layer: String,
    }

    impl Line {
        #[inline]
        pub fn segment(&self) -> Segment2 {
            Segment2::new(self.start, self.end)
        }
    }

    /// 单行文字的对齐方式，只区分默认的左下基线与居中两种。
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum TextJustify {
        #[default]
        BaseLeft,
        MiddleCenter,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Text {
        pub insert: Point2,
        pub content: String,
        pub height: f64,
        /// 旋转角，弧度。
        pub rotation: f64,
        #[serde(default)]
        pub justify: TextJustify,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub style: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub color: Option<i16>,
        pub layer: String,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct MText {
        pub insert: Point2,
        pub content: String,
        pub height: f64,
        pub direction: Vector2,
        pub style: Option<String>,
        pub layer: String,
    }

    #[derive(Debug, Default, Clone, Serialize, Deserialize)]
    pub struct Document {
        layers: HashMap<String, Layer>,
        #[serde(default)]
        text_styles: HashMap<String, TextStyle>,
        entities: Vec<(EntityId, Entity)>,
        next_entity_id: u64,
    }

    impl Document {
        pub fn new() -> Self {
            let mut doc = Self::default();
            doc.ensure_layer("0");
            doc.ensure_text_style(STANDARD_TEXT_STYLE);
            doc
        }

        pub fn ensure_layer(&mut self, name: impl AsRef<str>) {
            let key = name.as_ref();
            if self.layer(key).is_none() {
                self.layers.insert(key.to_string(), Layer::new(key));
            }
        }

        /// 图层不存在时以指定颜色创建；已存在的图层保持原样。
        pub fn ensure_layer_with_color(&mut self, name: impl AsRef<str>, color: i16) {
            let key = name.as_ref();
            if self.layer(key).is_none() {
                let mut layer = Layer::new(key);
                layer.color = Some(color);
                self.layers.insert(key.to_string(), layer);
            }
        }

        /// 图层名按 ASCII 忽略大小写比较，与 CAD 宿主的习惯一致。
        pub fn layer(&self, name: &str) -> Option<&Layer> {
            self.layers
                .values()
                .find(|layer| layer.name.eq_ignore_ascii_case(name))
        }

        #[inline]
        pub fn has_layer(&self, name: &str) -> bool {
            self.layer(name).is_some()
        }

        pub fn ensure_text_style(&mut self, name: impl AsRef<str>) {
            let key = name.as_ref();
            if !self.has_text_style(key) {
                self.text_styles.insert(
                    key.to_string(),
                    TextStyle {
                        name: key.to_string(),
                    },
                );
            }
        }

        pub fn has_text_style(&self, name: &str) -> bool {
            self.text_styles
                .values()
                .any(|style| style.name.eq_ignore_ascii_case(name))
        }

        #[inline]
        pub fn text_styles(&self) -> impl Iterator<Item = &TextStyle> {
            self.text_styles.values()
        }

        pub fn add_line(
            &mut self,
            start: Point2,
            end: Point2,
            layer: impl Into<String>,
        ) -> EntityId {
            let layer = layer.into();
            self.add_entity(Entity::Line(Line { start, end, layer }))
        }

        pub fn add_text(
            &mut self,
            insert: Point2,
            content: impl Into<String>,
            height: f64,
            rotation: f64,
            layer: impl Into<String>,
        ) -> EntityId {
            self.add_entity(Entity::Text(Text {
                insert,
                content: content.into(),
                height,
                rotation,
                justify: TextJustify::BaseLeft,
                style: None,
                color: None,
                layer: layer.into(),
            }))
        }

        pub fn add_mtext(
            &mut self,
            insert: Point2,
            content: impl Into<String>,
            height: f64,
            direction: Vector2,
            style: Option<String>,
            layer: impl Into<String>,
        ) -> EntityId {
            self.add_entity(Entity::MText(MText {
                insert,
                content: content.into(),
                height,
                direction,
                style,
                layer: layer.into(),
            }))
        }

        /// 追加任意实体并登记其图层。
        pub fn add_entity(&mut self, entity: Entity) -> EntityId {
            self.ensure_layer(entity.layer_name());
            let id = self.next_id();
            self.entities.push((id, entity));
            id
        }

        #[inline]
        pub fn layers(&self) -> impl Iterator<Item = &Layer> {
            self.layers.values()
        }

        /// 按插入顺序遍历实体，匹配阶段依赖该顺序保证结果可复现。
        #[inline]
        pub fn entities(&self) -> impl Iterator<Item = &(EntityId, Entity)> {
            self.entities.iter()
        }

        #[inline]
        pub fn entity(&self, id: EntityId) -> Option<&Entity> {
            self.entities
                .iter()
                .find_map(|(entity_id, entity)| (*entity_id == id).then_some(entity))
        }

        #[inline]
        fn next_id(&mut self) -> EntityId {
            let id = self.next_entity_id;
            self.next_entity_id += 1;
            EntityId(id)
        }
    }

}
