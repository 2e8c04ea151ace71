// 宿主脚本桥接口
//
// 面板通过宿主（剪辑软件）的脚本接口读取选中片段、控制播放头、增删时间线标记、导入文件。
// 这里只定义接口边界，具体传输方式由宿主侧实现。
//
// 子模块：
// - memory: 内存时间线实现，供命令行预览与测试使用

pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 宿主返回的选中片段信息
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AudioInfo {
    /// 媒体文件路径
    pub path: String,
    /// 片段名称
    pub name: String,
    /// 片段在时间线上的起点 (秒)
    pub in_point: f64,
}

/// 标记写入的范围
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MarkerScope {
    /// 选中片段自身的标记集合
    Clip,
    /// 序列级标记集合
    Sequence,
}

/// 时间线标记的稳定标识，删除其他标记后不会变化
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MarkerHandle(pub u64);

/// 宿主调用失败
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{operation} 失败: {message}")]
pub struct HostBridgeError {
    pub operation: String,
    pub message: String,
}

impl HostBridgeError {
    pub fn new(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            message: message.into(),
        }
    }
}

pub type HostResult<T> = Result<T, HostBridgeError>;

/// 宿主脚本接口
///
/// 所有方法都可能因宿主脚本异常而失败；调用方负责在边界处把失败转换为结果值。
#[async_trait]
pub trait HostBridge: Send + Sync {
    /// 当前选中的音频片段，没有选中时返回 None
    async fn get_audio_info(&self) -> HostResult<Option<AudioInfo>>;

    /// 播放头位置 (秒，序列时间)
    async fn get_player_pos(&self) -> HostResult<f64>;

    async fn set_player_pos(&self, seconds: f64) -> HostResult<()>;

    async fn create_marker(
        &self,
        scope: MarkerScope,
        start: f64,
        label: &str,
        duration: f64,
        comment: &str,
    ) -> HostResult<MarkerHandle>;

    async fn set_marker_type(&self, scope: MarkerScope, handle: MarkerHandle, type_tag: &str) -> HostResult<()>;

    async fn set_marker_color_index(&self, scope: MarkerScope, handle: MarkerHandle, index: u8) -> HostResult<()>;

    /// 按位置顺序列出范围内的全部标记
    async fn list_markers(&self, scope: MarkerScope) -> HostResult<Vec<MarkerHandle>>;

    async fn delete_marker(&self, scope: MarkerScope, handle: MarkerHandle) -> HostResult<()>;

    /// 导入文件到项目，返回宿主是否接受
    async fn import_files(&self, paths: &[String]) -> HostResult<bool>;
}
