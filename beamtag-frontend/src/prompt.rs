use std::io::{BufRead, Write};

use beamtag_core::geometry::Point2;
use beamtag_engine::host::Prompter;
use tracing::warn;

/// 基于文本输入输出的提示器。输入结束（EOF）视为取消。
///
/// `auto_confirm` 打开时关键字与数值提示直接取默认值而不读取输入，
/// 用于 `--yes` 这类非交互运行；点与字符串提示仍然读取输入。
pub struct ConsolePrompter<R, W> {
    input: R,
    output: W,
    auto_confirm: bool,
}

impl<R: BufRead, W: Write> ConsolePrompter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self {
            input,
            output,
            auto_confirm: false,
        }
    }

    pub fn with_auto_confirm(mut self, auto_confirm: bool) -> Self {
        self.auto_confirm = auto_confirm;
        self
    }

    pub fn into_output(self) -> W {
        self.output
    }

    fn write_prompt(&mut self, prompt: &str) {
        let result = write!(self.output, "{prompt}: ").and_then(|_| self.output.flush());
        if let Err(err) = result {
            warn!(error = %err, "写入提示失败");
        }
    }

    fn read_answer(&mut self, prompt: &str) -> Option<String> {
        self.write_prompt(prompt);
        let mut line = String::new();
        match self.input.read_line(&mut line) {
            Ok(0) => None,
            Ok(_) => Some(line.trim().to_string()),
            Err(err) => {
                warn!(error = %err, "读取输入失败");
                None
            }
        }
    }
}

fn parse_point(raw: &str) -> Option<Point2> {
    let mut parts = raw.split([',', ' ']).filter(|part| !part.is_empty());
    let x = parts.next()?.parse::<f64>().ok()?;
    let y = parts.next()?.parse::<f64>().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some(Point2::new(x, y))
}

impl<R: BufRead, W: Write> Prompter for ConsolePrompter<R, W> {
    fn message(&mut self, text: &str) {
        if let Err(err) = writeln!(self.output, "{text}") {
            warn!(error = %err, "写入输出失败");
        }
    }

    fn get_point(&mut self, prompt: &str) -> Option<Point2> {
        loop {
            let answer = self.read_answer(&format!("{prompt} (x,y)"))?;
            if answer.is_empty() {
                return None;
            }
            match parse_point(&answer) {
                Some(point) => return Some(point),
                None => self.message("无效的坐标，请按 x,y 格式输入"),
            }
        }
    }

    fn get_string(&mut self, prompt: &str) -> Option<String> {
        self.read_answer(prompt).filter(|answer| !answer.is_empty())
    }

    fn get_keyword(
        &mut self,
        prompt: &str,
        keywords: &[&str],
        default: Option<&str>,
    ) -> Option<String> {
        let prompt = match default {
            Some(default) => format!("{prompt} <{default}>"),
            None => prompt.to_string(),
        };
        if self.auto_confirm {
            if let Some(default) = default {
                self.message(&format!("{prompt}: {default}"));
                return Some(default.to_string());
            }
        }
        loop {
            let answer = self.read_answer(&prompt)?;
            if answer.is_empty() {
                return default.map(str::to_string);
            }
            if let Some(keyword) = keywords
                .iter()
                .find(|keyword| keyword.eq_ignore_ascii_case(&answer))
            {
                return Some(keyword.to_string());
            }
            self.message(&format!("请输入以下选项之一: {}", keywords.join("/")));
        }
    }

    fn get_double(&mut self, prompt: &str, default: f64) -> Option<f64> {
        let prompt = format!("{prompt} <{default}>");
        if self.auto_confirm {
            self.message(&format!("{prompt}: {default}"));
            return Some(default);
        }
        loop {
            let answer = self.read_answer(&prompt)?;
            if answer.is_empty() {
                return Some(default);
            }
            match answer.parse::<f64>() {
                Ok(value) if value.is_finite() => return Some(value),
                _ => self.message("请输入数值"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn prompter(input: &str) -> ConsolePrompter<Cursor<Vec<u8>>, Vec<u8>> {
        ConsolePrompter::new(Cursor::new(input.as_bytes().to_vec()), Vec::new())
    }

    fn output(prompter: ConsolePrompter<Cursor<Vec<u8>>, Vec<u8>>) -> String {
        String::from_utf8(prompter.into_output()).expect("输出应为 UTF-8")
    }

    #[test]
    fn keyword_prompt_retries_until_valid() {
        let mut console = prompter("maybe\nn\n");
        let answer = console.get_keyword("确认? [Y/N]", &["Y", "N"], Some("Y"));
        assert_eq!(answer.as_deref(), Some("N"));
        assert!(output(console).contains("请输入以下选项之一: Y/N"));
    }

    #[test]
    fn empty_answers_take_defaults_and_eof_cancels() {
        let mut console = prompter("\n\n");
        assert_eq!(
            console.get_keyword("确认?", &["Y", "N"], Some("Y")).as_deref(),
            Some("Y")
        );
        assert_eq!(console.get_double("比例", 1000.0), Some(1000.0));
        assert_eq!(console.get_double("比例", 1000.0), None);
        assert_eq!(console.get_keyword("确认?", &["Y", "N"], Some("Y")), None);
    }

    #[test]
    fn points_and_numbers_are_parsed() {
        let mut console = prompter("abc\n100, 200\n2.5\n");
        assert_eq!(console.get_point("基准点"), Some(Point2::new(100.0, 200.0)));
        assert_eq!(console.get_double("字高", 300.0), Some(2.5));
        assert_eq!(parse_point("1 2"), Some(Point2::new(1.0, 2.0)));
        assert_eq!(parse_point("1,2,3"), None);
    }

    #[test]
    fn auto_confirm_does_not_read_input() {
        let mut console = prompter("").with_auto_confirm(true);
        assert_eq!(
            console.get_keyword("确认?", &["Y", "N"], Some("Y")).as_deref(),
            Some("Y")
        );
        assert_eq!(console.get_double("图框宽度", 50_000.0), Some(50_000.0));
        assert_eq!(console.get_point("基准点"), None);
        assert!(output(console).contains("确认? <Y>: Y"));
    }
}
