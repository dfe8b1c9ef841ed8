use std::borrow::Cow;
use std::collections::HashMap;

use beamtag_core::model::{BeamSet, GridAxis};

use crate::catalog::GridCatalog;
use crate::host::{EntityStore, Prompter};
use crate::pipeline::{self, RunOptions, RunSummary};

pub const LABEL_BEAMS: &str = "label_beams";
pub const SHOW_GRIDS: &str = "show_grids";

#[derive(Debug, Clone)]
pub struct CommandRequest {
    pub name: String,
    /// 只处理该楼层的梁；为空时处理全部楼层。
    pub floor: Option<String>,
}

impl CommandRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            floor: None,
        }
    }

    pub fn with_floor(mut self, floor: Option<String>) -> Self {
        self.floor = floor;
        self
    }
}

#[derive(Debug, Clone)]
pub struct CommandResponse {
    pub success: bool,
    pub message: Option<String>,
}

impl CommandResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
        }
    }
}

pub trait CommandHandler: Send + Sync {
    fn name(&self) -> &'static str;
    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse;
}

pub struct CommandContext<'a> {
    pub store: &'a mut dyn EntityStore,
    pub prompter: &'a mut dyn Prompter,
    pub options: &'a RunOptions,
    pub beams: Option<&'a BeamSet>,
    /// 最近一次标注命令的结果。
    pub summary: Option<RunSummary>,
}

impl<'a> CommandContext<'a> {
    pub fn new(
        store: &'a mut dyn EntityStore,
        prompter: &'a mut dyn Prompter,
        options: &'a RunOptions,
    ) -> Self {
        Self {
            store,
            prompter,
            options,
            beams: None,
            summary: None,
        }
    }

    pub fn with_beams(mut self, beams: &'a BeamSet) -> Self {
        self.beams = Some(beams);
        self
    }
}

pub struct CommandBus {
    handlers: HashMap<&'static str, Box<dyn CommandHandler>>,
}

impl CommandBus {
    pub fn new() -> Self {
        let mut bus = Self {
            handlers: HashMap::new(),
        };
        bus.register(LabelBeamsCommand);
        bus.register(ShowGridsCommand);
        bus
    }

    pub fn register<H: CommandHandler + 'static>(&mut self, handler: H) {
        self.handlers.insert(handler.name(), Box::new(handler));
    }

    pub fn dispatch(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        if let Some(handler) = self.handlers.get(request.name.as_str()) {
            handler.execute(request, context)
        } else {
            CommandResponse::err(format!("未知命令: {}", request.name))
        }
    }

    pub fn available_commands(&self) -> impl Iterator<Item = &&'static str> {
        self.handlers.keys()
    }
}

impl Default for CommandBus {
    fn default() -> Self {
        Self::new()
    }
}

struct LabelBeamsCommand;

impl CommandHandler for LabelBeamsCommand {
    fn name(&self) -> &'static str {
        LABEL_BEAMS
    }

    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        let Some(beams) = context.beams else {
            return CommandResponse::err("未载入梁数据");
        };
        let beams = match &request.floor {
            Some(story) => {
                let mut subset = beams.clone();
                subset.retain_story(story);
                if subset.beams.is_empty() {
                    return CommandResponse::err(format!("梁数据中没有楼层 {story}"));
                }
                Cow::Owned(subset)
            }
            None => Cow::Borrowed(beams),
        };
        match pipeline::run(
            &mut *context.store,
            &mut *context.prompter,
            &beams,
            context.options,
        ) {
            Ok(summary) => {
                let message = format!(
                    "完成: 已标注 {} 根梁，跳过 {} 根",
                    summary.placed_count(),
                    summary.skipped_count()
                );
                context.summary = Some(summary);
                CommandResponse::ok(message)
            }
            Err(err) => CommandResponse::err(err.to_string()),
        }
    }
}

/// 列出各楼层识别出的轴线。
struct ShowGridsCommand;

impl CommandHandler for ShowGridsCommand {
    fn name(&self) -> &'static str {
        SHOW_GRIDS
    }

    fn execute(
        &self,
        _request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        let catalog = match GridCatalog::scan(&*context.store, &context.options.catalog) {
            Ok(catalog) => catalog,
            Err(err) => return CommandResponse::err(err.to_string()),
        };

        let mut markers = 0;
        for floor in catalog.floors() {
            context
                .prompter
                .message(&format!("楼层 {} (图框原点 X={:.0})", floor.name, floor.origin_x));
            for axis in [GridAxis::Vertical, GridAxis::Horizontal] {
                let grids = floor.ordered_grids(axis);
                let listing: Vec<String> = grids
                    .iter()
                    .map(|grid| format!("{}@{:.0}", grid.name, grid.position))
                    .collect();
                context.prompter.message(&format!(
                    "  {} 向轴线 ({}): {}",
                    axis.label(),
                    grids.len(),
                    listing.join(", ")
                ));
            }
            markers += floor.markers().len();
        }
        CommandResponse::ok(format!(
            "共 {} 个楼层，{} 个轴号",
            catalog.floors().len(),
            markers
        ))
    }
}
