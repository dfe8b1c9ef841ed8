//! 宿主图面与交互能力的抽象。引擎只通过这里的两个 trait 读写图面、询问用户，
//! 内存中的 [`Document`] 与命令行提示器都是它们的实现。

use std::collections::VecDeque;

use beamtag_core::document::{Document, Entity, EntityId, Text, TextJustify};
use beamtag_core::geometry::{Point2, Segment2};
use thiserror::Error;

/// 图面上带插入点的一段文字（单行文字或多行文字）。
#[derive(Debug, Clone, PartialEq)]
pub struct TextRecord {
    pub id: EntityId,
    pub content: String,
    pub position: Point2,
    pub layer: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LineRecord {
    pub id: EntityId,
    pub segment: Segment2,
    pub layer: String,
}

/// 待写入的标注文字，插入点为文字中心。
#[derive(Debug, Clone, PartialEq)]
pub struct LabelEntity {
    pub content: String,
    pub position: Point2,
    pub rotation: f64,
    pub height: f64,
    pub layer: String,
    pub style: String,
    pub color: i16,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("图层 {0} 不存在")]
    MissingLayer(String),
    #[error("宿主拒绝写入: {0}")]
    Rejected(String),
}

pub trait EntityStore {
    /// 按图面顺序列出全部直线。
    fn lines(&self) -> Vec<LineRecord>;

    /// 按图面顺序列出全部文字，单行与多行文字都视为文字。
    fn texts(&self) -> Vec<TextRecord>;

    fn has_layer(&self, name: &str) -> bool;

    /// 图层不存在时以给定颜色创建，已存在时不做修改。
    fn ensure_layer(&mut self, name: &str, color: i16);

    fn has_text_style(&self, name: &str) -> bool;

    fn append_label(&mut self, label: &LabelEntity) -> Result<EntityId, StoreError>;

    fn lines_on_layer(&self, layer: &str) -> Vec<LineRecord> {
        self.lines()
            .into_iter()
            .filter(|line| line.layer.eq_ignore_ascii_case(layer))
            .collect()
    }

    fn texts_on_layer(&self, layer: &str) -> Vec<TextRecord> {
        self.texts()
            .into_iter()
            .filter(|text| text.layer.eq_ignore_ascii_case(layer))
            .collect()
    }
}

impl EntityStore for Document {
    fn lines(&self) -> Vec<LineRecord> {
        self.entities()
            .filter_map(|(id, entity)| match entity {
                Entity::Line(line) => Some(LineRecord {
                    id: *id,
                    segment: line.segment(),
                    layer: line.layer.clone(),
                }),
                _ => None,
            })
            .collect()
    }

    fn texts(&self) -> Vec<TextRecord> {
        self.entities()
            .filter_map(|(id, entity)| match entity {
                Entity::Text(text) => Some(TextRecord {
                    id: *id,
                    content: text.content.trim().to_string(),
                    position: text.insert,
                    layer: text.layer.clone(),
                }),
                Entity::MText(mtext) => Some(TextRecord {
                    id: *id,
                    content: mtext.content.trim().to_string(),
                    position: mtext.insert,
                    layer: mtext.layer.clone(),
                }),
                Entity::Line(_) => None,
            })
            .collect()
    }

    fn has_layer(&self, name: &str) -> bool {
        Document::has_layer(self, name)
    }

    fn ensure_layer(&mut self, name: &str, color: i16) {
        self.ensure_layer_with_color(name, color);
    }

    fn has_text_style(&self, name: &str) -> bool {
        Document::has_text_style(self, name)
    }

    fn append_label(&mut self, label: &LabelEntity) -> Result<EntityId, StoreError> {
        if !Document::has_layer(self, &label.layer) {
            return Err(StoreError::MissingLayer(label.layer.clone()));
        }
        Ok(self.add_entity(Entity::Text(Text {
            insert: label.position,
            content: label.content.clone(),
            height: label.height,
            rotation: label.rotation,
            justify: TextJustify::MiddleCenter,
            style: Some(label.style.clone()),
            color: Some(label.color),
            layer: label.layer.clone(),
        })))
    }
}

/// 运行期间与用户的交互。所有方法返回 `None` 表示用户取消。
pub trait Prompter {
    fn message(&mut self, text: &str);

    fn get_point(&mut self, prompt: &str) -> Option<Point2>;

    fn get_string(&mut self, prompt: &str) -> Option<String>;

    /// 在给定关键字中选择一个；直接回车时返回 `default`。
    fn get_keyword(
        &mut self,
        prompt: &str,
        keywords: &[&str],
        default: Option<&str>,
    ) -> Option<String>;

    fn get_double(&mut self, prompt: &str, default: f64) -> Option<f64>;
}

/// 预先录入的应答。
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptedAnswer {
    Keyword(String),
    Point(Point2),
    Text(String),
    Number(f64),
    Cancel,
}

/// 按顺序回放预设应答的提示器。应答耗尽后关键字与数值取默认值，
/// 点与字符串视为取消。用于非交互运行与测试。
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    answers: VecDeque<ScriptedAnswer>,
    messages: Vec<String>,
    prompts: Vec<String>,
}

impl ScriptedPrompter {
    pub fn new(answers: impl IntoIterator<Item = ScriptedAnswer>) -> Self {
        Self {
            answers: answers.into_iter().collect(),
            messages: Vec::new(),
            prompts: Vec::new(),
        }
    }

    /// 不带任何应答，所有确认都接受默认选项。
    pub fn accepting() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    pub fn prompts(&self) -> &[String] {
        &self.prompts
    }

    pub fn remaining(&self) -> usize {
        self.answers.len()
    }

    fn next_answer(&mut self, prompt: &str) -> Option<ScriptedAnswer> {
        self.prompts.push(prompt.to_string());
        self.answers.pop_front()
    }
}

impl Prompter for ScriptedPrompter {
    fn message(&mut self, text: &str) {
        self.messages.push(text.to_string());
    }

    fn get_point(&mut self, prompt: &str) -> Option<Point2> {
        match self.next_answer(prompt)? {
            ScriptedAnswer::Point(point) => Some(point),
            _ => None,
        }
    }

    fn get_string(&mut self, prompt: &str) -> Option<String> {
        match self.next_answer(prompt)? {
            ScriptedAnswer::Text(text) | ScriptedAnswer::Keyword(text) => Some(text),
            _ => None,
        }
    }

    fn get_keyword(
        &mut self,
        prompt: &str,
        keywords: &[&str],
        default: Option<&str>,
    ) -> Option<String> {
        match self.next_answer(prompt) {
            None => default.map(str::to_string),
            Some(ScriptedAnswer::Keyword(word)) | Some(ScriptedAnswer::Text(word)) => keywords
                .iter()
                .find(|keyword| keyword.eq_ignore_ascii_case(&word))
                .map(|keyword| keyword.to_string()),
            Some(_) => None,
        }
    }

    fn get_double(&mut self, prompt: &str, default: f64) -> Option<f64> {
        match self.next_answer(prompt) {
            None => Some(default),
            Some(ScriptedAnswer::Number(value)) => Some(value),
            Some(_) => None,
        }
    }
}
