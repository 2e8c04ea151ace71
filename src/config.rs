// 配置管理模块

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::fs;
use crate::error::{AppError, AppResult};
use crate::markers::color::ColorIndexPolicy;
use crate::models::{Device, Stem, DEFAULT_MODEL_ID};
use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use tracing::info;

static CONFIG: OnceCell<RwLock<AppConfig>> = OnceCell::new();
static CONFIG_PATH: OnceCell<std::path::PathBuf> = OnceCell::new();

/// 日志级别
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl Default for LogLevel {
    fn default() -> Self {
        Self::Info
    }
}

impl LogLevel {
    /// 转换为 tracing 过滤器字符串
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "error" => Ok(LogLevel::Error),
            "warn" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            other => Err(format!("无效日志级别: {}", other)),
        }
    }
}

/// 处理服务连接配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// 服务根地址
    pub base_url: String,
    /// 建立连接的超时 (秒)，任务本身不设超时
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

fn default_connect_timeout() -> u64 {
    5
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

/// 音源分离默认参数
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IsolationConfig {
    #[serde(default = "default_model_name")]
    pub model_name: String,
    pub device: Device,
    pub shifts: u32,
    /// 只分离出某一轨 + 其余部分
    #[serde(default)]
    pub two_stems: Option<Stem>,
}

fn default_model_name() -> String {
    DEFAULT_MODEL_ID.to_string()
}

impl Default for IsolationConfig {
    fn default() -> Self {
        Self {
            model_name: default_model_name(),
            device: Device::Cuda,
            shifts: 0,
            two_stems: None,
        }
    }
}

/// 节拍检测默认参数
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BeatDetectionConfig {
    pub hop_length: u32,
    pub sample_rate: u32,
    pub start_bpm: f64,
    pub tightness: f64,
}

impl Default for BeatDetectionConfig {
    fn default() -> Self {
        Self {
            hop_length: 512,
            sample_rate: 44100,
            start_bpm: 120.0,
            tightness: 100.0,
        }
    }
}

/// 导出到时间线的标记外观
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkerConfig {
    /// 时间线标记名称
    pub label: String,
    /// 时间线标记类型
    pub type_tag: String,
    #[serde(default)]
    pub color_policy: ColorIndexPolicy,
}

impl Default for MarkerConfig {
    fn default() -> Self {
        Self {
            label: "Beat Detection Results".to_string(),
            type_tag: "Segmentation".to_string(),
            color_policy: ColorIndexPolicy::default(),
        }
    }
}

/// 应用配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub isolation: IsolationConfig,
    #[serde(default)]
    pub beat_detection: BeatDetectionConfig,
    #[serde(default)]
    pub markers: MarkerConfig,
    /// 日志级别
    #[serde(default)]
    pub log_level: LogLevel,
}

/// 读取配置文件，不存在时写入默认配置
///
/// JSON 无法解析时回退到默认配置而不是报错，避免一个坏文件导致面板无法启动。
pub fn load_config(config_path: &Path) -> AppResult<AppConfig> {
    if config_path.exists() {
        let content = fs::read_to_string(config_path)?;
        Ok(serde_json::from_str(&content).unwrap_or_else(|e| {
            tracing::warn!("配置文件 JSON 解析失败: {}，使用默认配置", e);
            AppConfig::default()
        }))
    } else {
        let config = AppConfig::default();
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(&config)?;
        fs::write(config_path, content)?;
        Ok(config)
    }
}

/// 初始化配置
pub fn init_config(config_path: &Path) -> AppResult<()> {
    CONFIG_PATH.set(config_path.to_path_buf())
        .map_err(|_| AppError::Config("配置路径已初始化".to_string()))?;

    let config = load_config(config_path)?;

    info!("[CONFIG] 配置已加载: 服务地址={}", config.server.base_url);

    CONFIG.set(RwLock::new(config))
        .map_err(|_| AppError::Config("配置已初始化".to_string()))?;

    Ok(())
}

/// 获取配置
pub fn get_config() -> AppConfig {
    CONFIG.get()
        .map(|c| c.read().clone())
        .unwrap_or_default()
}

/// 更新配置
pub fn update_config(config: AppConfig) -> AppResult<()> {
    info!("[CONFIG] 配置更新");

    // 先写入文件，成功后再更新内存，避免文件写入失败导致内存与文件不一致
    if let Some(path) = CONFIG_PATH.get() {
        let content = serde_json::to_string_pretty(&config)?;
        fs::write(path, content)?;
    }

    if let Some(lock) = CONFIG.get() {
        let mut current = lock.write();
        *current = config;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let config = load_config(&path).unwrap();
        assert_eq!(config.server.base_url, "http://localhost:5000");
        assert_eq!(config.beat_detection.hop_length, 512);
        assert!(path.exists());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"server": {"base_url": "http://127.0.0.1:9000"}, "log_level": "debug"}"#).unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.server.base_url, "http://127.0.0.1:9000");
        assert_eq!(config.server.connect_timeout_secs, 5);
        assert_eq!(config.log_level, LogLevel::Debug);
        assert_eq!(config.isolation.model_name, "htdemucs");
        assert_eq!(config.markers.color_policy, ColorIndexPolicy::Fixed(1));
    }

    #[test]
    fn test_update_persists_and_replaces_memory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        // 全局配置只能初始化一次，其他测试不调用 init_config
        init_config(&path).unwrap();

        let mut config = get_config();
        config.server.base_url = "http://127.0.0.1:7000".to_string();
        config.log_level = "debug".parse().unwrap();
        update_config(config).unwrap();

        assert_eq!(get_config().server.base_url, "http://127.0.0.1:7000");
        let reloaded = load_config(&path).unwrap();
        assert_eq!(reloaded.server.base_url, "http://127.0.0.1:7000");
        assert_eq!(reloaded.log_level, LogLevel::Debug);
        assert!(init_config(&path).is_err());
    }

    #[test]
    fn test_log_level_from_str() {
        assert_eq!("WARN".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert!("loud".parse::<LogLevel>().is_err());
    }

    #[test]
    fn test_broken_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.markers.label, "Beat Detection Results");
    }
}
