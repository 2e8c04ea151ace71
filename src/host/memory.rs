// 内存时间线
//
// 以 arena + id 的方式保存标记：句柄永远不变，位置由当前顺序推导。
// 记录每次删除发生时的位置，便于验证删除顺序。

use super::{AudioInfo, HostBridge, HostBridgeError, HostResult, MarkerHandle, MarkerScope};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// 时间线上的一个标记
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TimelineMarker {
    pub handle: MarkerHandle,
    pub start: f64,
    pub label: String,
    pub duration: f64,
    pub comment: String,
    pub type_tag: Option<String>,
    pub color_index: Option<u8>,
}

#[derive(Default)]
struct TimelineState {
    next_handle: u64,
    markers: HashMap<MarkerScope, Vec<TimelineMarker>>,
    audio_info: Option<AudioInfo>,
    player_pos: f64,
    imported: Vec<String>,
    deletions: Vec<(MarkerScope, usize)>,
    failing: HashSet<String>,
}

impl TimelineState {
    fn check(&self, operation: &str) -> HostResult<()> {
        if self.failing.contains(operation) {
            return Err(HostBridgeError::new(operation, "宿主脚本异常"));
        }
        Ok(())
    }

    fn marker_mut(&mut self, scope: MarkerScope, handle: MarkerHandle, operation: &str) -> HostResult<&mut TimelineMarker> {
        self.markers
            .get_mut(&scope)
            .and_then(|list| list.iter_mut().find(|m| m.handle == handle))
            .ok_or_else(|| HostBridgeError::new(operation, format!("标记不存在: {:?}", handle)))
    }
}

/// 内存中的宿主实现
#[derive(Default)]
pub struct MemoryHost {
    state: Mutex<TimelineState>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置选中片段
    pub fn select_clip(&self, info: Option<AudioInfo>) {
        self.state.lock().audio_info = info;
    }

    /// 让指定操作之后的调用全部失败，用于模拟宿主脚本异常
    pub fn fail_operation(&self, operation: &str) {
        self.state.lock().failing.insert(operation.to_string());
    }

    pub fn markers(&self, scope: MarkerScope) -> Vec<TimelineMarker> {
        self.state
            .lock()
            .markers
            .get(&scope)
            .cloned()
            .unwrap_or_default()
    }

    /// 每次删除发生时被删标记所在的位置
    pub fn deletion_log(&self) -> Vec<(MarkerScope, usize)> {
        self.state.lock().deletions.clone()
    }

    pub fn imported_files(&self) -> Vec<String> {
        self.state.lock().imported.clone()
    }

    pub fn player_pos(&self) -> f64 {
        self.state.lock().player_pos
    }
}

#[async_trait]
impl HostBridge for MemoryHost {
    async fn get_audio_info(&self) -> HostResult<Option<AudioInfo>> {
        let state = self.state.lock();
        state.check("get_audio_info")?;
        Ok(state.audio_info.clone())
    }

    async fn get_player_pos(&self) -> HostResult<f64> {
        let state = self.state.lock();
        state.check("get_player_pos")?;
        Ok(state.player_pos)
    }

    async fn set_player_pos(&self, seconds: f64) -> HostResult<()> {
        let mut state = self.state.lock();
        state.check("set_player_pos")?;
        state.player_pos = seconds;
        Ok(())
    }

    async fn create_marker(
        &self,
        scope: MarkerScope,
        start: f64,
        label: &str,
        duration: f64,
        comment: &str,
    ) -> HostResult<MarkerHandle> {
        let mut state = self.state.lock();
        state.check("create_marker")?;
        state.next_handle += 1;
        let handle = MarkerHandle(state.next_handle);
        state.markers.entry(scope).or_default().push(TimelineMarker {
            handle,
            start,
            label: label.to_string(),
            duration,
            comment: comment.to_string(),
            type_tag: None,
            color_index: None,
        });
        Ok(handle)
    }

    async fn set_marker_type(&self, scope: MarkerScope, handle: MarkerHandle, type_tag: &str) -> HostResult<()> {
        let mut state = self.state.lock();
        state.check("set_marker_type")?;
        state.marker_mut(scope, handle, "set_marker_type")?.type_tag = Some(type_tag.to_string());
        Ok(())
    }

    async fn set_marker_color_index(&self, scope: MarkerScope, handle: MarkerHandle, index: u8) -> HostResult<()> {
        let mut state = self.state.lock();
        state.check("set_marker_color_index")?;
        state.marker_mut(scope, handle, "set_marker_color_index")?.color_index = Some(index);
        Ok(())
    }

    async fn list_markers(&self, scope: MarkerScope) -> HostResult<Vec<MarkerHandle>> {
        let state = self.state.lock();
        state.check("list_markers")?;
        Ok(state
            .markers
            .get(&scope)
            .map(|list| list.iter().map(|m| m.handle).collect())
            .unwrap_or_default())
    }

    async fn delete_marker(&self, scope: MarkerScope, handle: MarkerHandle) -> HostResult<()> {
        let mut state = self.state.lock();
        state.check("delete_marker")?;
        let position = state
            .markers
            .get(&scope)
            .and_then(|list| list.iter().position(|m| m.handle == handle))
            .ok_or_else(|| HostBridgeError::new("delete_marker", format!("标记不存在: {:?}", handle)))?;
        if let Some(list) = state.markers.get_mut(&scope) {
            list.remove(position);
        }
        state.deletions.push((scope, position));
        Ok(())
    }

    async fn import_files(&self, paths: &[String]) -> HostResult<bool> {
        let mut state = self.state.lock();
        state.check("import_files")?;
        state.imported.extend(paths.iter().cloned());
        Ok(!paths.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_handles_stay_stable_after_delete() {
        let host = MemoryHost::new();
        let a = host.create_marker(MarkerScope::Sequence, 1.0, "a", 0.0, "").await.unwrap();
        let b = host.create_marker(MarkerScope::Sequence, 2.0, "b", 0.0, "").await.unwrap();

        host.delete_marker(MarkerScope::Sequence, a).await.unwrap();
        host.set_marker_color_index(MarkerScope::Sequence, b, 3).await.unwrap();

        let markers = host.markers(MarkerScope::Sequence);
        assert_eq!(markers.len(), 1);
        assert_eq!(markers[0].handle, b);
        assert_eq!(markers[0].color_index, Some(3));
        assert_eq!(host.deletion_log(), vec![(MarkerScope::Sequence, 0)]);
    }

    #[tokio::test]
    async fn test_scopes_are_separate() {
        let host = MemoryHost::new();
        host.create_marker(MarkerScope::Clip, 1.0, "a", 0.0, "").await.unwrap();
        assert!(host.list_markers(MarkerScope::Sequence).await.unwrap().is_empty());
        assert_eq!(host.list_markers(MarkerScope::Clip).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_injected_failure() {
        let host = MemoryHost::new();
        host.fail_operation("get_player_pos");
        let err = host.get_player_pos().await.unwrap_err();
        assert_eq!(err.operation, "get_player_pos");
    }
}
