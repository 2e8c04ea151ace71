// SoundBuddy - 音频分离与节拍检测面板核心
// 命令行入口

use clap::{Args, Parser, Subcommand};
use serde_json::json;
use soundbuddy::audio::output_path::derive_output_folder;
use soundbuddy::audio::source::{AudioReference, HttpBlobFetcher};
use soundbuddy::commands::{AudioSource, Panel};
use soundbuddy::config::{self, AppConfig, LogLevel};
use soundbuddy::error::{AppError, AppResult};
use soundbuddy::host::memory::MemoryHost;
use soundbuddy::host::{AudioInfo, MarkerScope};
use soundbuddy::markers::describe_sync;
use soundbuddy::models::{Device, Stem};
use soundbuddy::session::Session;
use soundbuddy::{logging, utils};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "soundbuddy")]
#[command(about = "音源分离与节拍检测，结果以 JSON 输出")]
#[command(version)]
struct Cli {
    /// 配置文件路径，默认为数据目录下的 config.json
    #[arg(long, env = "SOUNDBUDDY_CONFIG")]
    config: Option<PathBuf>,

    /// 处理服务地址，覆盖配置文件
    #[arg(long, env = "SOUNDBUDDY_SERVER")]
    server: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 音源分离
    Isolate(IsolateArgs),
    /// 节拍检测，并预览导出到时间线的标记
    Beats(BeatsArgs),
    /// 跟随处理服务的进度流
    Progress,
    /// 打印任务输出目录
    OutputPath { input: String, label: String },
    /// 查看或修改配置文件
    Config(ConfigArgs),
}

#[derive(Args, Debug)]
struct ConfigArgs {
    /// 写入新的处理服务地址
    #[arg(long)]
    set_server: Option<String>,
    /// 写入新的日志级别，下次启动生效
    #[arg(long)]
    log_level: Option<LogLevel>,
}

#[derive(Args, Debug)]
struct IsolateArgs {
    /// 音频文件路径、data URL 或 http(s) 地址
    input: String,
    #[arg(long)]
    model: Option<String>,
    #[arg(long)]
    device: Option<Device>,
    #[arg(long)]
    shifts: Option<u32>,
    #[arg(long)]
    two_stems: Option<Stem>,
}

#[derive(Args, Debug)]
struct BeatsArgs {
    /// 音频文件路径
    input: String,
    #[arg(long)]
    hop_length: Option<u32>,
    #[arg(long)]
    sample_rate: Option<u32>,
    #[arg(long)]
    start_bpm: Option<f64>,
    #[arg(long)]
    tightness: Option<f64>,
    /// 片段在时间线上的起点 (秒)
    #[arg(long, default_value_t = 0.0)]
    offset: f64,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let app_dir = utils::get_app_data_dir();
    let config_path = cli.config.clone().unwrap_or_else(|| app_dir.join("config.json"));

    if let Err(e) = config::init_config(&config_path) {
        eprintln!("配置初始化失败: {}", e);
        std::process::exit(1);
    }
    let mut app_config = config::get_config();

    // guard 必须保持存活，否则异步日志线程会退出
    let log_guard = logging::init_logging(&app_dir, &app_config.log_level);
    info!("SoundBuddy 启动, 数据目录: {:?}", app_dir);

    if let Some(server) = cli.server {
        app_config.server.base_url = server;
    }

    let code = match run(cli.command, app_config, &app_dir).await {
        Ok(()) => 0,
        Err(e) => {
            error!("命令执行失败: {}", e);
            eprintln!("错误: {}", e);
            1
        }
    };

    drop(log_guard);
    std::process::exit(code);
}

async fn run(command: Commands, app_config: AppConfig, app_dir: &Path) -> AppResult<()> {
    match command {
        Commands::Config(args) => {
            // 以文件中的配置为准，不带入 --server 的临时覆盖
            let mut persisted = config::get_config();
            let changed = args.set_server.is_some() || args.log_level.is_some();
            if let Some(server) = args.set_server {
                persisted.server.base_url = server;
            }
            if let Some(level) = args.log_level {
                persisted.log_level = level;
            }
            if changed {
                config::update_config(persisted.clone())?;
            }
            print_json(&persisted)
        }
        Commands::OutputPath { input, label } => {
            println!("{}", derive_output_folder(&input, &label));
            Ok(())
        }
        Commands::Isolate(args) => {
            let (panel, _) = build_panel(app_config, app_dir)?;
            let mut params = panel.default_isolation_params();
            if let Some(model) = args.model {
                params.model_name = model;
            }
            if let Some(device) = args.device {
                params.device = device;
            }
            if let Some(shifts) = args.shifts {
                params.shifts = shifts;
            }
            if args.two_stems.is_some() {
                params.two_stems = args.two_stems;
            }

            let source = cli_source(&args.input).await?;
            let outcome = panel.isolate(Some(source), params).await?;
            print_json(&outcome)
        }
        Commands::Beats(args) => {
            let (panel, host) = build_panel(app_config, app_dir)?;
            let mut params = panel.default_beat_params();
            params.hop_length = args.hop_length.or(params.hop_length);
            params.sample_rate = args.sample_rate.or(params.sample_rate);
            params.start_bpm = args.start_bpm.or(params.start_bpm);
            params.tightness = args.tightness.or(params.tightness);

            // 以选中片段的方式提交，导出时使用 offset 作为片段起点
            let path = absolute_path(&args.input).await?;
            host.select_clip(Some(AudioInfo {
                name: utils::basename(&path).to_string(),
                path,
                in_point: args.offset,
            }));

            let added = panel.detect_beats(None, params).await?;
            let export = panel.add_markers_to_sequence().await;
            let status = describe_sync(&export);
            print_json(&json!({
                "markers": added,
                "timeline": host.markers(MarkerScope::Sequence),
                "status": status,
            }))
        }
        Commands::Progress => {
            let (panel, _) = build_panel(app_config, app_dir)?;
            let last = panel
                .watch_progress(Some(Box::new(|value| eprintln!("进度: {}%", value))))
                .await?;
            print_json(&json!({ "progress": last }))
        }
    }
}

fn build_panel(app_config: AppConfig, app_dir: &Path) -> AppResult<(Panel<MemoryHost>, Arc<MemoryHost>)> {
    let session = Session::new(app_dir.join("temp"))?;
    let host = Arc::new(MemoryHost::new());
    let fetcher = Arc::new(HttpBlobFetcher::new(reqwest::Client::new()));
    let panel = Panel::new(app_config, session, host.clone(), fetcher)?;
    Ok((panel, host))
}

/// 命令行输入：data URL 原样解析，http(s) 地址作为临时对象拉取，其余按本地文件处理
async fn cli_source(input: &str) -> AppResult<AudioSource> {
    if input.starts_with("data:") {
        return Ok(AudioSource::new(AudioReference::parse(input), "audio.wav"));
    }
    if input.starts_with("http://") || input.starts_with("https://") {
        let name = utils::basename(input).to_string();
        return Ok(AudioSource::new(AudioReference::TransientBlobRef { url: input.to_string() }, name));
    }
    let path = absolute_path(input).await?;
    let name = utils::basename(&path).to_string();
    Ok(AudioSource::new(AudioReference::FilePath { path }, name))
}

async fn absolute_path(input: &str) -> AppResult<String> {
    let path = tokio::fs::canonicalize(input)
        .await
        .map_err(|e| AppError::Resolution(format!("无法访问 {}: {}", input, e)))?;
    Ok(path.to_string_lossy().to_string())
}

fn print_json<T: serde::Serialize>(value: &T) -> AppResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
