use std::io;
use std::path::{Path, PathBuf};

use anyhow::Context;
use beamtag_config::{AppConfig, ConfigError};
use beamtag_frontend::{ConsolePrompter, LabelRequest, run_grids, run_label};
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Parser)]
#[command(name = "beamtag", version, about = "按结构模型数据在平面图上标注梁编号")]
struct Cli {
    /// 配置文件路径，缺省时按 BEAMTAG_CONFIG 与 ./config/default.toml 查找
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// 在图面上写入梁编号
    Label {
        #[arg(long)]
        drawing: PathBuf,
        #[arg(long)]
        beams: PathBuf,
        /// 只标注该楼层；取 `?` 时从梁数据中的楼层选择
        #[arg(long)]
        floor: Option<String>,
        /// 自动接受轴网对应关系等确认提示
        #[arg(long, short = 'y')]
        yes: bool,
        /// 运行前询问图框宽度、比例与字高
        #[arg(long)]
        interactive: bool,
        #[arg(long)]
        scale: Option<f64>,
        #[arg(long)]
        frame_width: Option<f64>,
        /// 将运行结果写为 JSON 报告
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// 列出图面中识别出的楼层与轴线
    Grids {
        #[arg(long)]
        drawing: PathBuf,
        #[arg(long)]
        frame_width: Option<f64>,
    },
}

fn main() {
    let cli = Cli::parse();

    let loaded = load_configuration(cli.config.as_deref());
    let config = match &loaded {
        Ok(config) => config.clone(),
        Err(_) => AppConfig::default(),
    };
    init_logging(&config);
    if let Err(err) = loaded {
        if cli.config.is_some() || matches!(err, ConfigError::Invalid { .. }) {
            error!(error = %err, "加载配置失败");
            std::process::exit(1);
        }
        warn!(error = %err, "加载默认配置失败，使用内建默认值");
    }
    info!("启动 beamtag");

    if let Err(err) = run(cli.command, &config) {
        error!("{err:#}");
        std::process::exit(1);
    }
}

fn run(command: Command, config: &AppConfig) -> anyhow::Result<()> {
    let stdin = io::stdin();
    match command {
        Command::Label {
            drawing,
            beams,
            floor,
            yes,
            interactive,
            scale,
            frame_width,
            report,
        } => {
            let request = LabelRequest {
                drawing,
                beams,
                floor,
                interactive,
                scale,
                frame_width,
                report,
            };
            let mut prompter =
                ConsolePrompter::new(stdin.lock(), io::stdout().lock()).with_auto_confirm(yes);
            run_label(&request, config, &mut prompter).with_context(|| {
                format!("标注 {} 失败", request.drawing.display())
            })?;
        }
        Command::Grids {
            drawing,
            frame_width,
        } => {
            let mut prompter = ConsolePrompter::new(stdin.lock(), io::stdout().lock());
            run_grids(&drawing, frame_width, config, &mut prompter)
                .with_context(|| format!("读取 {} 的轴网失败", drawing.display()))?;
        }
    }
    Ok(())
}

fn load_configuration(override_path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    match override_path {
        Some(path) => AppConfig::from_file(path),
        None => AppConfig::discover(),
    }
}

fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_new(config.logging.level.clone()).unwrap_or_else(|_| EnvFilter::new("info"));
    // 日志写到 stderr，stdout 只留给提示与汇总
    let subscriber = fmt().with_env_filter(filter).with_writer(io::stderr);
    if subscriber.try_init().is_err() {
        // 已初始化，忽略
    }
}
