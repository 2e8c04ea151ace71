// 标记与宿主时间线同步
//
// 宿主调用失败在这里转换为结果值返回，不向上抛出，也不转换为 AppError。
// 对宿主标记集合的所有调用经过同一把异步锁，导出与清空不会交错执行。

use super::color::{palette_name, ColorIndexPolicy};
use super::store::Marker;
use crate::config::MarkerConfig;
use crate::host::{HostBridge, HostBridgeError, MarkerScope};
use crate::session::Session;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

pub type SyncResult<T> = Result<T, HostBridgeError>;

/// 导出到时间线的标记外观
#[derive(Debug, Clone, PartialEq)]
pub struct SyncOptions {
    pub label: String,
    pub type_tag: String,
    pub color_policy: ColorIndexPolicy,
}

impl From<&MarkerConfig> for SyncOptions {
    fn from(config: &MarkerConfig) -> Self {
        Self {
            label: config.label.clone(),
            type_tag: config.type_tag.clone(),
            color_policy: config.color_policy,
        }
    }
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self::from(&MarkerConfig::default())
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ExportSummary {
    pub scope: MarkerScope,
    pub created: usize,
    /// 加到每个标记上的时间偏移 (秒)
    pub offset: f64,
}

impl fmt::Display for ExportSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.created == 0 {
            return write!(f, "没有可添加的标记");
        }
        write!(f, "已添加 {} 个标记到{}", self.created, scope_name(self.scope))
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ClearSummary {
    pub scope: MarkerScope,
    pub deleted: usize,
}

impl fmt::Display for ClearSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "已删除{}上的 {} 个标记", scope_name(self.scope), self.deleted)
    }
}

fn scope_name(scope: MarkerScope) -> &'static str {
    match scope {
        MarkerScope::Clip => "片段",
        MarkerScope::Sequence => "序列",
    }
}

/// 把同步结果转换为面板状态栏文本
pub fn describe_sync<T: fmt::Display>(result: &SyncResult<T>) -> String {
    match result {
        Ok(summary) => summary.to_string(),
        Err(e) => format!("同步失败: {}", e),
    }
}

pub struct MarkerSyncBridge<H: HostBridge> {
    host: Arc<H>,
    options: SyncOptions,
    lock: Mutex<()>,
}

impl<H: HostBridge> MarkerSyncBridge<H> {
    pub fn new(host: Arc<H>, options: SyncOptions) -> Self {
        Self {
            host,
            options,
            lock: Mutex::new(()),
        }
    }

    /// 在时间线上为每个标记创建一个零时长标记，起点为片段内时间加偏移
    ///
    /// 中途失败时已创建的标记保留在时间线上。
    pub async fn export_to_timeline(
        &self,
        markers: &[Marker],
        offset_seconds: f64,
        scope: MarkerScope,
    ) -> SyncResult<ExportSummary> {
        let _guard = self.lock.lock().await;
        let mut created = 0;

        for marker in markers {
            let result = self.create_one(marker, offset_seconds, scope).await;
            if let Err(e) = result {
                error!("[SYNC] 导出中断: 已创建 {}/{}，错误={}", created, markers.len(), e);
                return Err(e);
            }
            created += 1;
        }

        info!("[SYNC] 导出完成: {} 个标记, 范围={:?}, 偏移={:.3}s", created, scope, offset_seconds);
        Ok(ExportSummary {
            scope,
            created,
            offset: offset_seconds,
        })
    }

    async fn create_one(&self, marker: &Marker, offset_seconds: f64, scope: MarkerScope) -> SyncResult<()> {
        let handle = self
            .host
            .create_marker(scope, marker.start_time + offset_seconds, &self.options.label, 0.0, &marker.id)
            .await?;
        self.host.set_marker_type(scope, handle, &self.options.type_tag).await?;
        let index = self.options.color_policy.index_for(&marker.color);
        debug!(
            "[SYNC] 标记 {} 颜色 {} -> 索引 {} ({})",
            marker.id,
            marker.color,
            index,
            palette_name(index).unwrap_or("未知")
        );
        self.host.set_marker_color_index(scope, handle, index).await
    }

    /// 以会话选中片段的起点为偏移导出
    pub async fn export_for_session(
        &self,
        session: &Session,
        markers: &[Marker],
        scope: MarkerScope,
    ) -> SyncResult<ExportSummary> {
        self.export_to_timeline(markers, session.in_point(), scope).await
    }

    /// 删除范围内的全部时间线标记，从最后一个往前删
    pub async fn clear_all_on_timeline(&self, scope: MarkerScope) -> SyncResult<ClearSummary> {
        let _guard = self.lock.lock().await;

        let handles = self.host.list_markers(scope).await.map_err(|e| {
            error!("[SYNC] 读取时间线标记失败: {}", e);
            e
        })?;

        let mut deleted = 0;
        for handle in handles.iter().rev() {
            if let Err(e) = self.host.delete_marker(scope, *handle).await {
                error!("[SYNC] 清空中断: 已删除 {}/{}，错误={}", deleted, handles.len(), e);
                return Err(e);
            }
            deleted += 1;
        }

        info!("[SYNC] 已清空 {} 个时间线标记, 范围={:?}", deleted, scope);
        Ok(ClearSummary { scope, deleted })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::memory::MemoryHost;
    use crate::host::AudioInfo;
    use crate::markers::color::MarkerColor;
    use crate::markers::store::MarkerStore;

    fn bridge(host: &Arc<MemoryHost>) -> MarkerSyncBridge<MemoryHost> {
        MarkerSyncBridge::new(host.clone(), SyncOptions::default())
    }

    fn markers(times: &[f64]) -> Vec<Marker> {
        let mut store = MarkerStore::new();
        store.add_batch(times)
    }

    #[tokio::test]
    async fn test_export_sets_fields() {
        let host = Arc::new(MemoryHost::new());
        let markers = markers(&[1.0, 2.5]);

        let summary = bridge(&host)
            .export_to_timeline(&markers, 10.0, MarkerScope::Sequence)
            .await
            .unwrap();
        assert_eq!(summary.created, 2);

        let timeline = host.markers(MarkerScope::Sequence);
        assert_eq!(timeline.len(), 2);
        assert_eq!(timeline[0].start, 11.0);
        assert_eq!(timeline[1].start, 12.5);
        for (entry, marker) in timeline.iter().zip(&markers) {
            assert_eq!(entry.duration, 0.0);
            assert_eq!(entry.label, "Beat Detection Results");
            assert_eq!(entry.comment, marker.id);
            assert_eq!(entry.type_tag.as_deref(), Some("Segmentation"));
            assert_eq!(entry.color_index, Some(1));
        }
    }

    #[tokio::test]
    async fn test_export_for_session_uses_in_point() {
        let host = Arc::new(MemoryHost::new());
        let dir = tempfile::tempdir().unwrap();
        let mut session = Session::new(dir.path()).unwrap();
        session.select_clip(Some(AudioInfo {
            path: "/media/song.wav".to_string(),
            name: "song".to_string(),
            in_point: 4.0,
        }));

        bridge(&host)
            .export_for_session(&session, &markers(&[0.5]), session.marker_scope())
            .await
            .unwrap();
        assert_eq!(host.markers(MarkerScope::Clip)[0].start, 4.5);
        assert!(host.markers(MarkerScope::Sequence).is_empty());
    }

    #[tokio::test]
    async fn test_nearest_policy_maps_color() {
        let host = Arc::new(MemoryHost::new());
        let options = SyncOptions { color_policy: ColorIndexPolicy::Nearest, ..SyncOptions::default() };
        let bridge = MarkerSyncBridge::new(host.clone(), options);
        let marker = Marker {
            id: "m".to_string(),
            start_time: 1.0,
            color: MarkerColor { red: 0, green: 200, blue: 60, alpha: 0.5 },
        };

        bridge.export_to_timeline(&[marker], 0.0, MarkerScope::Sequence).await.unwrap();
        assert_eq!(host.markers(MarkerScope::Sequence)[0].color_index, Some(0));
    }

    #[tokio::test]
    async fn test_nearest_policy_reads_encoded_color() {
        let host = Arc::new(MemoryHost::new());
        let options = SyncOptions { color_policy: ColorIndexPolicy::Nearest, ..SyncOptions::default() };
        let bridge = MarkerSyncBridge::new(host.clone(), options);
        // 面板保存的标记以 rgba 字符串携带颜色
        let markers: Vec<Marker> = serde_json::from_str(
            r#"[{"id": "a", "startTime": 1.0, "color": "rgba(50, 100, 230, 0.5)"},
                {"id": "b", "startTime": 2.0, "color": "rgba(230, 210, 40, 0.5)"}]"#,
        )
        .unwrap();

        bridge.export_to_timeline(&markers, 0.0, MarkerScope::Sequence).await.unwrap();
        let indexes: Vec<Option<u8>> = host.markers(MarkerScope::Sequence).iter().map(|m| m.color_index).collect();
        assert_eq!(indexes, vec![Some(6), Some(4)]);
    }

    #[tokio::test]
    async fn test_clear_deletes_from_last_to_first() {
        let host = Arc::new(MemoryHost::new());
        let bridge = bridge(&host);
        bridge
            .export_to_timeline(&markers(&[1.0, 2.0, 3.0, 4.0, 5.0]), 0.0, MarkerScope::Sequence)
            .await
            .unwrap();

        let summary = bridge.clear_all_on_timeline(MarkerScope::Sequence).await.unwrap();
        assert_eq!(summary.deleted, 5);
        assert!(host.markers(MarkerScope::Sequence).is_empty());

        let positions: Vec<usize> = host.deletion_log().into_iter().map(|(_, pos)| pos).collect();
        assert_eq!(positions, vec![4, 3, 2, 1, 0]);
        assert!(positions.windows(2).all(|w| w[0] > w[1]));
    }

    #[tokio::test]
    async fn test_clear_only_touches_scope() {
        let host = Arc::new(MemoryHost::new());
        let bridge = bridge(&host);
        bridge.export_to_timeline(&markers(&[1.0]), 0.0, MarkerScope::Clip).await.unwrap();
        bridge.export_to_timeline(&markers(&[1.0, 2.0]), 0.0, MarkerScope::Sequence).await.unwrap();

        bridge.clear_all_on_timeline(MarkerScope::Clip).await.unwrap();
        assert!(host.markers(MarkerScope::Clip).is_empty());
        assert_eq!(host.markers(MarkerScope::Sequence).len(), 2);
    }

    #[tokio::test]
    async fn test_host_failure_returned_as_value() {
        let host = Arc::new(MemoryHost::new());
        host.fail_operation("set_marker_type");

        let result = bridge(&host)
            .export_to_timeline(&markers(&[1.0, 2.0]), 0.0, MarkerScope::Sequence)
            .await;
        let err = result.as_ref().unwrap_err();
        assert_eq!(err.operation, "set_marker_type");
        assert!(describe_sync(&result).starts_with("同步失败"));
        // 失败前创建的标记保留
        assert_eq!(host.markers(MarkerScope::Sequence).len(), 1);
    }

    #[tokio::test]
    async fn test_clear_failure_returned_as_value() {
        let host = Arc::new(MemoryHost::new());
        host.fail_operation("list_markers");
        let result = bridge(&host).clear_all_on_timeline(MarkerScope::Sequence).await;
        assert!(result.is_err());
    }

    #[test]
    fn test_describe_empty_export() {
        let result: SyncResult<ExportSummary> =
            Ok(ExportSummary { scope: MarkerScope::Sequence, created: 0, offset: 0.0 });
        assert_eq!(describe_sync(&result), "没有可添加的标记");
    }

    #[test]
    fn test_describe_success() {
        let result: SyncResult<ClearSummary> = Ok(ClearSummary { scope: MarkerScope::Sequence, deleted: 3 });
        assert_eq!(describe_sync(&result), "已删除序列上的 3 个标记");
    }
}
