// 错误处理模块

use thiserror::Error;
use serde::Serialize;
use crate::host::HostBridgeError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON 解析错误: {0}")]
    Json(#[from] serde_json::Error),

    /// 音频引用无效，或解码/写入/拉取失败，或解析后文件不存在
    #[error("音频解析错误: {0}")]
    Resolution(String),

    /// 任务发送前的前置检查失败
    #[error("参数校验失败: {0}")]
    Validation(String),

    /// 处理服务返回非成功状态或连接失败
    #[error("处理服务通信错误: {0}")]
    Transport(String),

    /// 仅在调用方主动升级同步失败时使用，MarkerSyncBridge 自身不会抛出
    #[error("宿主调用错误: {0}")]
    HostBridge(#[from] HostBridgeError),

    #[error("配置错误: {0}")]
    Config(String),
}

impl From<reqwest::Error> for AppError {
    fn from(e: reqwest::Error) -> Self {
        AppError::Transport(e.to_string())
    }
}

// 实现 Serialize 以便面板直接展示错误
impl Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

pub type AppResult<T> = Result<T, AppError>;
