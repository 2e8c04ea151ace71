// 面板命令模块
//
// 把面板上的用户操作串成完整流程：取音源 → 解析 → 推导输出目录 → 提交任务 → 结果落到标记或新媒体。
// 所有流程共用一个 Panel，会话状态显式保存在其中。
//
// 子模块：
// - isolation: 音源分离、导入分离后的音轨、进度跟踪
// - detection: 节拍检测
// - markers: 标记导出 / 清空、播放头同步

pub mod detection;
pub mod isolation;
pub mod markers;

use crate::audio::source::{AudioReference, BlobFetcher, ResolvedAudioFile, SourceResolver};
use crate::config::AppConfig;
use crate::error::{AppError, AppResult};
use crate::host::HostBridge;
use crate::jobs::JobClient;
use crate::markers::sync::{MarkerSyncBridge, SyncOptions};
use crate::markers::SharedMarkerStore;
use crate::session::Session;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::info;

pub use isolation::{IsolationOutcome, StemChoice};

/// 用户显式给出的音源
#[derive(Debug, Clone)]
pub struct AudioSource {
    pub reference: AudioReference,
    /// 落地到临时目录时使用的文件名
    pub name: String,
}

impl AudioSource {
    pub fn new(reference: AudioReference, name: impl Into<String>) -> Self {
        Self {
            reference,
            name: name.into(),
        }
    }
}

/// 面板
pub struct Panel<H: HostBridge> {
    config: AppConfig,
    session: RwLock<Session>,
    resolver: SourceResolver,
    jobs: JobClient,
    markers: SharedMarkerStore,
    bridge: MarkerSyncBridge<H>,
    host: Arc<H>,
}

impl<H: HostBridge> Panel<H> {
    pub fn new(config: AppConfig, session: Session, host: Arc<H>, fetcher: Arc<dyn BlobFetcher>) -> AppResult<Self> {
        let jobs = JobClient::new(&config.server)?;
        let bridge = MarkerSyncBridge::new(host.clone(), SyncOptions::from(&config.markers));
        info!("[PANEL] 面板初始化: 服务地址={}, 临时目录={:?}", jobs.base_url(), session.temp_dir());
        Ok(Self {
            config,
            session: RwLock::new(session),
            resolver: SourceResolver::new(fetcher),
            jobs,
            markers: SharedMarkerStore::new(),
            bridge,
            host,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// 当前会话的快照
    pub fn session(&self) -> Session {
        self.session.read().clone()
    }

    pub fn markers(&self) -> &SharedMarkerStore {
        &self.markers
    }

    pub fn host(&self) -> &Arc<H> {
        &self.host
    }

    /// 取音源并解析为本地文件
    ///
    /// 没有显式音源时使用宿主当前选中的片段，并把它记为会话选中片段；
    /// 显式音源与时间线无关，会清除会话中的选中片段。
    async fn resolve_source(&self, source: Option<AudioSource>) -> AppResult<ResolvedAudioFile> {
        let source = match source {
            Some(source) => {
                self.session.write().select_clip(None);
                source
            }
            None => {
                let info = self
                    .host
                    .get_audio_info()
                    .await?
                    .ok_or_else(|| AppError::Validation("没有选中的音频片段".to_string()))?;
                info!("[PANEL] 使用选中片段: {} (起点 {:.3}s)", info.path, info.in_point);
                let source = AudioSource::new(AudioReference::FilePath { path: info.path.clone() }, info.name.clone());
                self.session.write().select_clip(Some(info));
                source
            }
        };

        let session = self.session();
        self.resolver.resolve(&session, &source.reference, &source.name).await
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use crate::host::{AudioInfo, MarkerScope};

    #[tokio::test]
    async fn test_no_selection_is_validation_error() {
        let f = fixture().await;
        let err = f.panel.resolve_source(None).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_host_selection_updates_session() {
        let f = fixture().await;
        let path = media_file(&f.dir, "song.wav");
        f.host.select_clip(Some(AudioInfo {
            path: path.clone(),
            name: "song".to_string(),
            in_point: 3.0,
        }));

        let resolved = f.panel.resolve_source(None).await.unwrap();
        assert_eq!(resolved.path_str(), path);
        assert_eq!(f.panel.session().in_point(), 3.0);
        assert_eq!(f.panel.session().marker_scope(), MarkerScope::Clip);
    }

    #[tokio::test]
    async fn test_explicit_source_clears_selection() {
        let f = fixture().await;
        f.panel.session.write().select_clip(Some(AudioInfo {
            path: "/x.wav".to_string(),
            name: "x".to_string(),
            in_point: 1.0,
        }));

        let source = AudioSource::new(AudioReference::parse("data:audio/wav;base64,UklGRg=="), "upload.wav");
        let resolved = f.panel.resolve_source(Some(source)).await.unwrap();
        assert_eq!(std::fs::read(&resolved.path).unwrap(), b"RIFF");
        assert!(f.panel.session().selected_clip().is_none());
    }

    #[tokio::test]
    async fn test_host_failure_on_selection_is_escalated() {
        let f = fixture().await;
        f.host.fail_operation("get_audio_info");
        let err = f.panel.resolve_source(None).await.unwrap_err();
        assert!(matches!(err, AppError::HostBridge(_)));
    }
}
