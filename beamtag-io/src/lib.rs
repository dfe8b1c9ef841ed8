use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use beamtag_core::{
    document::{Document, Entity, Line, MText, Text, TextJustify},
    geometry::{Point2, Vector2},
};
use thiserror::Error;
use tracing::{debug, info};

pub mod beams;

pub use beams::{BeamImport, RecordParseError, read_beams};

#[derive(Debug, Error)]
pub enum IoError {
    #[error("unsupported input format: {0}")]
    UnsupportedFormat(String),
    #[error("failed to read file {path:?}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid drawing structure: {0}")]
    InvalidDocument(String),
    #[error("failed to parse JSON {path:?}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("no usable beam records in {path:?}")]
    NoRecords { path: PathBuf },
}

/// 从文件载入图面实体。
pub trait DrawingLoader {
    fn load(&self, path: &Path) -> Result<Document, IoError>;
}

/// DXF 读取入口。只关心直线、单行文字、多行文字以及图层和文字样式表，
/// 其余实体被跳过。
#[derive(Debug, Default, Clone, Copy)]
pub struct DxfFacade;

impl DxfFacade {
    pub fn new() -> Self {
        Self
    }

    pub fn parse_str(&self, source: &str) -> Result<Document, IoError> {
        DxfParser::new(source).parse().map_err(|err| match err {
            DxfError::Invalid { message } => IoError::InvalidDocument(message),
        })
    }
}

impl DrawingLoader for DxfFacade {
    fn load(&self, path: &Path) -> Result<Document, IoError> {
        let data = read_file(path)?;
        let document = self.parse_str(&data)?;
        info!(
            path = %path.display(),
            entities = document.entities().count(),
            "图面已载入"
        );
        Ok(document)
    }
}

pub(crate) fn read_file(path: &Path) -> Result<String, IoError> {
    fs::read_to_string(path).map_err(|source| IoError::ReadError {
        path: path.to_path_buf(),
        source,
    })
}

#[derive(Debug)]
enum DxfError {
    Invalid { message: String },
}

impl DxfError {
    fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }
}

struct DxfParser<'a> {
    reader: DxfReader<'a>,
    skipped: BTreeMap<String, usize>,
}

impl<'a> DxfParser<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            reader: DxfReader::new(source),
            skipped: BTreeMap::new(),
        }
    }

    fn parse(mut self) -> Result<Document, DxfError> {
        let mut document = Document::new();
        while let Some((code, value)) = self.reader.next_pair()? {
            if code == 999 {
                continue;
            }
            if code != 0 {
                return Err(DxfError::invalid(format!(
                    "意外的组码 {code}（期望 0 表示 SECTION/EOF）"
                )));
            }
            match value.trim() {
                "SECTION" => {
                    let (name_code, name) = self
                        .reader
                        .next_pair()?
                        .ok_or_else(|| DxfError::invalid("SECTION 缺少名称（组码 2）"))?;
                    if name_code != 2 {
                        return Err(DxfError::invalid(format!(
                            "SECTION 名称使用了组码 {name_code}（期望 2）"
                        )));
                    }
                    match name.trim() {
                        "TABLES" => self.parse_tables(&mut document)?,
                        "ENTITIES" => self.parse_entities(&mut document)?,
                        _ => self.skip_section()?,
                    }
                }
                "EOF" => break,
                unexpected => {
                    return Err(DxfError::invalid(format!(
                        "意外的标记 {unexpected}，期望 SECTION 或 EOF"
                    )));
                }
            }
        }
        if !self.skipped.is_empty() {
            debug!(skipped = ?self.skipped, "已跳过不参与标注的实体");
        }
        Ok(document)
    }

    fn skip_section(&mut self) -> Result<(), DxfError> {
        loop {
            match self.reader.next_pair()? {
                Some((0, value)) if value.trim() == "ENDSEC" => break,
                Some(_) => continue,
                None => {
                    return Err(DxfError::invalid("SECTION 未找到 ENDSEC 终止标记"));
                }
            }
        }
        Ok(())
    }

    /// 只登记图层与文字样式名称，供存在性检查使用。
    fn parse_tables(&mut self, document: &mut Document) -> Result<(), DxfError> {
        loop {
            let (code, value) = match self.reader.next_pair()? {
                Some(pair) => pair,
                None => return Err(DxfError::invalid("TABLES 段提前结束")),
            };
            if code != 0 {
                continue;
            }
            match value.trim() {
                "ENDSEC" => break,
                "LAYER" => {
                    let (name, color) = self.parse_table_record("LAYER")?;
                    if let Some(name) = name {
                        match color {
                            Some(color) => document.ensure_layer_with_color(&name, color.abs()),
                            None => document.ensure_layer(&name),
                        }
                    }
                }
                "STYLE" => {
                    let (name, _) = self.parse_table_record("STYLE")?;
                    if let Some(name) = name.filter(|name| !name.is_empty()) {
                        document.ensure_text_style(&name);
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn parse_table_record(&mut self, kind: &str) -> Result<(Option<String>, Option<i16>), DxfError> {
        let mut name = None;
        let mut color = None;
        loop {
            match self.reader.next_pair()? {
                Some((0, value)) => {
                    self.reader.put_back((0, value));
                    break;
                }
                Some((2, value)) => name = Some(value.trim().to_string()),
                Some((62, value)) => {
                    color = Some(parse_i16(&value, &format!("{kind} 颜色（组码 62）"))?)
                }
                Some(_) => {}
                None => return Err(DxfError::invalid(format!("{kind} 表记录未正确结束"))),
            }
        }
        Ok((name, color))
    }

    fn parse_entities(&mut self, document: &mut Document) -> Result<(), DxfError> {
        loop {
            let (code, value) = match self.reader.next_pair()? {
                Some(pair) => pair,
                None => return Err(DxfError::invalid("ENTITIES 段提前结束")),
            };
            if code != 0 {
                return Err(DxfError::invalid(format!(
                    "ENTITIES 段遇到组码 {code}（期望 0 表示实体起始）"
                )));
            }

            match value.trim() {
                "ENDSEC" => break,
                "LINE" => {
                    let line = self.parse_line()?;
                    document.add_entity(line);
                }
                "TEXT" => {
                    let text = self.parse_text()?;
                    document.add_entity(text);
                }
                "MTEXT" => {
                    let mtext = self.parse_mtext()?;
                    document.add_entity(mtext);
                }
                other => {
                    *self.skipped.entry(other.to_string()).or_insert(0) += 1;
                    self.skip_entity_body()?;
                }
            }
        }
        Ok(())
    }

    fn parse_line(&mut self) -> Result<Entity, DxfError> {
        let mut layer = None;
        let mut start_x = None;
        let mut start_y = None;
        let mut end_x = None;
        let mut end_y = None;
        loop {
            match self.reader.next_pair()? {
                Some((0, value)) => {
                    self.reader.put_back((0, value));
                    break;
                }
                Some((code, value)) => match code {
                    8 => layer = Some(value.trim().to_string()),
                    10 => assign_coord(&mut start_x, &value, "LINE 起点 X（组码 10）")?,
                    20 => assign_coord(&mut start_y, &value, "LINE 起点 Y（组码 20）")?,
                    11 => assign_coord(&mut end_x, &value, "LINE 终点 X（组码 11）")?,
                    21 => assign_coord(&mut end_y, &value, "LINE 终点 Y（组码 21）")?,
                    _ => {}
                },
                None => return Err(DxfError::invalid("LINE 未正确结束")),
            }
        }

        let layer = layer.unwrap_or_else(|| "0".to_string());
        let sx = start_x.ok_or_else(|| DxfError::invalid("LINE 缺少起点 X（组码 10）"))?;
        let sy = start_y.ok_or_else(|| DxfError::invalid("LINE 缺少起点 Y（组码 20）"))?;
        let ex = end_x.ok_or_else(|| DxfError::invalid("LINE 缺少终点 X（组码 11）"))?;
        let ey = end_y.ok_or_else(|| DxfError::invalid("LINE 缺少终点 Y（组码 21）"))?;

        Ok(Entity::Line(Line {
            start: Point2::new(sx, sy),
            end: Point2::new(ex, ey),
            layer,
        }))
    }

    fn parse_text(&mut self) -> Result<Entity, DxfError> {
        let mut layer = None;
        let mut insert_x = None;
        let mut insert_y = None;
        let mut align_x = None;
        let mut align_y = None;
        let mut height = None;
        let mut rotation_deg = 0.0;
        let mut horizontal: i16 = 0;
        let mut vertical: i16 = 0;
        let mut style = None;
        let mut color = None;
        let mut text: Option<String> = None;
        loop {
            match self.reader.next_pair()? {
                Some((0, value)) => {
                    self.reader.put_back((0, value));
                    break;
                }
                Some((code, value)) => match code {
                    8 => layer = Some(value.trim().to_string()),
                    10 => assign_coord(&mut insert_x, &value, "TEXT 插入点 X（组码 10）")?,
                    20 => assign_coord(&mut insert_y, &value, "TEXT 插入点 Y（组码 20）")?,
                    11 => assign_coord(&mut align_x, &value, "TEXT 对齐点 X（组码 11）")?,
                    21 => assign_coord(&mut align_y, &value, "TEXT 对齐点 Y（组码 21）")?,
                    40 => assign_coord(&mut height, &value, "TEXT 高度（组码 40）")?,
                    50 => rotation_deg = parse_f64(&value, "TEXT 旋转角")?,
                    72 => horizontal = parse_i16(&value, "TEXT 水平对齐（组码 72）")?,
                    73 => vertical = parse_i16(&value, "TEXT 垂直对齐（组码 73）")?,
                    7 => style = Some(value.trim().to_string()),
                    62 => color = Some(parse_i16(&value, "TEXT 颜色（组码 62）")?),
                    1 => match text {
                        Some(ref mut existing) => {
                            existing.push('\n');
                            existing.push_str(&value);
                        }
                        None => text = Some(value),
                    },
                    _ => {}
                },
                None => return Err(DxfError::invalid("TEXT 未正确结束")),
            }
        }

        let layer = layer.unwrap_or_else(|| "0".to_string());
        let ix = insert_x.ok_or_else(|| DxfError::invalid("TEXT 缺少插入点 X（组码 10）"))?;
        let iy = insert_y.ok_or_else(|| DxfError::invalid("TEXT 缺少插入点 Y（组码 20）"))?;
        let height = height.ok_or_else(|| DxfError::invalid("TEXT 缺少文字高度（组码 40）"))?;
        let content = text.ok_or_else(|| DxfError::invalid("TEXT 缺少文本内容（组码 1）"))?;

        // 居中对齐的文字以对齐点为准
        let justify = match (horizontal, vertical) {
            (1, 2) | (4, _) => TextJustify::MiddleCenter,
            _ => TextJustify::BaseLeft,
        };
        let insert = match (justify, align_x, align_y) {
            (TextJustify::MiddleCenter, Some(x), Some(y)) => Point2::new(x, y),
            _ => Point2::new(ix, iy),
        };

        Ok(Entity::Text(Text {
            insert,
            content: decode_inline_text(&content),
            height,
            rotation: rotation_deg.to_radians(),
            justify,
            style,
            color,
            layer,
        }))
    }

    fn parse_mtext(&mut self) -> Result<Entity, DxfError> {
        let mut layer = None;
        let mut insert_x = None;
        let mut insert_y = None;
        let mut height = None;
        let mut direction_x: Option<f64> = None;
        let mut direction_y: Option<f64> = None;
        let mut rotation_deg: Option<f64> = None;
        let mut style: Option<String> = None;
        let mut fragments: Vec<String> = Vec::new();

        loop {
            match self.reader.next_pair()? {
                Some((0, value)) => {
                    self.reader.put_back((0, value));
                    break;
                }
                Some((code, value)) => match code {
                    8 => layer = Some(value.trim().to_string()),
                    10 => assign_coord(&mut insert_x, &value, "MTEXT 插入点 X（组码 10）")?,
                    20 => assign_coord(&mut insert_y, &value, "MTEXT 插入点 Y（组码 20）")?,
                    40 => assign_coord(&mut height, &value, "MTEXT 高度（组码 40）")?,
                    11 => direction_x = Some(parse_f64(&value, "MTEXT 方向向量 X")?),
                    21 => direction_y = Some(parse_f64(&value, "MTEXT 方向向量 Y")?),
                    50 => rotation_deg = Some(parse_f64(&value, "MTEXT 旋转角")?),
                    7 => style = Some(value.trim().to_string()),
                    // 组码 3 为前置分段，1 为最后一段
                    1 | 3 => fragments.push(value),
                    _ => {}
                },
                None => return Err(DxfError::invalid("MTEXT 未正确结束")),
            }
        }

        let layer = layer.unwrap_or_else(|| "0".to_string());
        let ix = insert_x.ok_or_else(|| DxfError::invalid("MTEXT 缺少插入点 X（组码 10）"))?;
        let iy = insert_y.ok_or_else(|| DxfError::invalid("MTEXT 缺少插入点 Y（组码 20）"))?;
        let height = height.ok_or_else(|| DxfError::invalid("MTEXT 缺少文本高度（组码 40）"))?;
        if fragments.is_empty() {
            return Err(DxfError::invalid("MTEXT 缺少内容（组码 1/3）"));
        }

        let direction = match (direction_x, direction_y) {
            (Some(x), Some(y)) if x.abs() >= f64::EPSILON || y.abs() >= f64::EPSILON => {
                Vector2::new(x, y)
            }
            _ => match rotation_deg {
                Some(rotation) => Vector2::from_polar(1.0, rotation.to_radians()),
                None => Vector2::new(1.0, 0.0),
            },
        };

        Ok(Entity::MText(MText {
            insert: Point2::new(ix, iy),
            content: decode_mtext_content(&fragments.concat()),
            height,
            direction,
            style,
            layer,
        }))
    }

    fn skip_entity_body(&mut self) -> Result<(), DxfError> {
        loop {
            match self.reader.next_pair()? {
                Some((0, value)) => {
                    self.reader.put_back((0, value));
                    break;
                }
                Some(_) => continue,
                None => break,
            }
        }
        Ok(())
    }
}

struct DxfReader<'a> {
    lines: std::str::Lines<'a>,
    buffer: Option<(i32, String)>,
    line_number: usize,
}

impl<'a> DxfReader<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            lines: source.trim_start_matches('\u{feff}').lines(),
            buffer: None,
            line_number: 0,
        }
    }

    fn next_pair(&mut self) -> Result<Option<(i32, String)>, DxfError> {
        if let Some(pair) = self.buffer.take() {
            return Ok(Some(pair));
        }

        let code_line = loop {
            match self.lines.next() {
                Some(line) => {
                    self.line_number += 1;
                    if !line.trim().is_empty() {
                        break line;
                    }
                }
                None => return Ok(None),
            }
        };

        let value_line = match self.lines.next() {
            Some(line) => {
                self.line_number += 1;
                line
            }
            None => {
                return Err(DxfError::invalid(format!(
                    "文件在第 {} 行结束，缺少与组码对应的值行",
                    self.line_number
                )));
            }
        };

        let code = code_line.trim().parse::<i32>().map_err(|_| {
            DxfError::invalid(format!(
                "第 {} 行的组码 \"{}\" 无法解析为整数",
                self.line_number - 1,
                code_line.trim()
            ))
        })?;
        let value = value_line.trim_end_matches('\r').to_string();
        Ok(Some((code, value)))
    }

    /// 回退一个组码对，缓冲区只容纳一个。
    fn put_back(&mut self, pair: (i32, String)) {
        debug_assert!(self.buffer.is_none(), "DXF 组码对只能回退一次");
        self.buffer = Some(pair);
    }
}

fn assign_coord(slot: &mut Option<f64>, raw: &str, context: &str) -> Result<(), DxfError> {
    if slot.is_some() {
        return Err(DxfError::invalid(format!("{context} 出现重复值")));
    }
    *slot = Some(parse_f64(raw, context)?);
    Ok(())
}

fn parse_f64(raw: &str, context: &str) -> Result<f64, DxfError> {
    raw.trim()
        .parse::<f64>()
        .map_err(|_| DxfError::invalid(format!("{context} 解析失败（值：\"{raw}\"）")))
}

fn parse_i32(raw: &str, context: &str) -> Result<i32, DxfError> {
    raw.trim()
        .parse::<i32>()
        .map_err(|_| DxfError::invalid(format!("{context} 解析失败（值：\"{raw}\"）")))
}

fn parse_i16(raw: &str, context: &str) -> Result<i16, DxfError> {
    let value = parse_i32(raw, context)?;
    i16::try_from(value)
        .map_err(|_| DxfError::invalid(format!("{context} 超出 i16 范围（值：{value}）")))
}

/// 去掉多行文字的格式控制码，只保留可见文字。
fn decode_mtext_content(raw: &str) -> String {
    let mut result = String::new();
    let mut chars = raw.chars();
    while let Some(ch) = chars.next() {
        match ch {
            '\\' => match chars.next() {
                Some('P') => result.push('\n'),
                Some('~') => result.push(' '),
                Some(escaped @ ('\\' | '{' | '}')) => result.push(escaped),
                // 字体、高度、宽度、颜色等带参数的控制码以 ';' 结束
                Some('f' | 'F' | 'H' | 'W' | 'Q' | 'T' | 'A' | 'C' | 'c' | 'p') => {
                    for next in chars.by_ref() {
                        if next == ';' {
                            break;
                        }
                    }
                }
                Some('L' | 'l' | 'O' | 'o' | 'K' | 'k') => {}
                Some(other) => {
                    result.push('\\');
                    result.push(other);
                }
                None => result.push('\\'),
            },
            '{' | '}' => {}
            other => result.push(other),
        }
    }
    result
}

/// 单行文字中的 `%%` 控制码。
fn decode_inline_text(raw: &str) -> String {
    let mut result = String::new();
    let mut chars = raw.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '%' && chars.peek() == Some(&'%') {
            chars.next();
            match chars.next() {
                Some('c' | 'C') => result.push('Ø'),
                Some('d' | 'D') => result.push('°'),
                Some('p' | 'P') => result.push('±'),
                Some('%') => result.push('%'),
                // 上划线/下划线开关
                Some('o' | 'O' | 'u' | 'U') => {}
                Some(other) => {
                    result.push_str("%%");
                    result.push(other);
                }
                None => result.push_str("%%"),
            }
        } else {
            result.push(ch);
        }
    }
    result
}
