// 标记与播放头命令
//
// 宿主调用失败以 SyncResult 返回，由调用方决定如何提示用户。

use super::Panel;
use crate::host::{HostBridge, MarkerScope};
use crate::markers::sync::{ClearSummary, ExportSummary};
use crate::markers::{Marker, SyncResult};
use tracing::{debug, info};

impl<H: HostBridge> Panel<H> {
    /// 把当前标记导出到序列
    pub async fn add_markers_to_sequence(&self) -> SyncResult<ExportSummary> {
        self.export_markers(MarkerScope::Sequence).await
    }

    /// 把当前标记导出到选中片段，没有选中片段时导出到序列
    pub async fn add_markers_to_clip(&self) -> SyncResult<ExportSummary> {
        let scope = self.session().marker_scope();
        self.export_markers(scope).await
    }

    async fn export_markers(&self, scope: MarkerScope) -> SyncResult<ExportSummary> {
        let markers = self.markers.snapshot();
        let session = self.session();
        if markers.is_empty() {
            info!("[PANEL] 没有可导出的标记");
            return Ok(ExportSummary {
                scope,
                created: 0,
                offset: session.in_point(),
            });
        }
        self.bridge.export_for_session(&session, &markers, scope).await
    }

    /// 清空本地标记以及宿主上当前范围内的标记
    ///
    /// 本地集合总是被清空，宿主失败只体现在返回值中。
    pub async fn clear_markers(&self) -> SyncResult<ClearSummary> {
        self.markers.clear();
        let scope = self.session().marker_scope();
        self.bridge.clear_all_on_timeline(scope).await
    }

    /// 播放头在片段内的时间 (秒)
    ///
    /// 重新读取宿主选中片段，会话跟随宿主：片段起点可能被移动，选中也可能被取消。
    pub async fn sync_to_player_time(&self) -> SyncResult<f64> {
        let position = self.host.get_player_pos().await?;
        let info = self.host.get_audio_info().await?;
        let in_point = info.as_ref().map(|i| i.in_point).unwrap_or(0.0);
        self.session.write().select_clip(info);
        let local = position - in_point;
        debug!("[PANEL] 播放头: 序列 {:.3}s, 片段内 {:.3}s", position, local);
        Ok(local)
    }

    /// 把宿主播放头移到片段内的指定时间
    pub async fn seek_to(&self, local_seconds: f64) -> SyncResult<()> {
        let target = local_seconds + self.session().in_point();
        debug!("[PANEL] 跳转到片段内 {:.3}s (序列 {:.3}s)", local_seconds, target);
        self.host.set_player_pos(target).await
    }

    /// 在播放头位置添加标记，过近时返回 None
    pub async fn add_marker_at_playhead(&self) -> SyncResult<Option<Marker>> {
        let local = self.sync_to_player_time().await?;
        Ok(self.markers.add(local))
    }
}
