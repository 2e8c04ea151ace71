// 标记集合
//
// 不变式：集合内任意两个标记的时间差都不小于 DEDUP_WINDOW_SECS。
// add 是先检查后插入，所有修改必须经过同一把锁（SharedMarkerStore），否则两次并发添加可能同时通过检查。

use super::color::MarkerColor;
use crate::utils::generate_id;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// 去重窗口 (秒)
pub const DEDUP_WINDOW_SECS: f64 = 0.1;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Marker {
    pub id: String,
    /// 片段内时间 (秒)
    pub start_time: f64,
    pub color: MarkerColor,
}

/// 会话内的标记集合，保留插入顺序用于显示
#[derive(Debug, Default)]
pub struct MarkerStore {
    markers: Vec<Marker>,
}

impl MarkerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加一个标记，与已有标记过近或时间无效时返回 None
    pub fn add(&mut self, time: f64) -> Option<Marker> {
        if !time.is_finite() {
            warn!("[MARKERS] 忽略无效时间: {}", time);
            return None;
        }
        if let Some(existing) = self
            .markers
            .iter()
            .find(|m| (m.start_time - time).abs() < DEDUP_WINDOW_SECS)
        {
            debug!("[MARKERS] {:.3}s 与已有标记 {:.3}s 过近，跳过", time, existing.start_time);
            return None;
        }

        let marker = Marker {
            id: generate_id(),
            start_time: time,
            color: MarkerColor::random_translucent(),
        };
        self.markers.push(marker.clone());
        Some(marker)
    }

    /// 依次添加，同一批中较早加入的时间会压制后面过近的时间
    pub fn add_batch(&mut self, times: &[f64]) -> Vec<Marker> {
        let added: Vec<Marker> = times.iter().filter_map(|t| self.add(*t)).collect();
        info!("[MARKERS] 批量添加: 输入 {} 个，新增 {} 个，当前 {} 个", times.len(), added.len(), self.markers.len());
        added
    }

    pub fn clear(&mut self) {
        info!("[MARKERS] 清空 {} 个标记", self.markers.len());
        self.markers.clear();
    }

    pub fn markers(&self) -> &[Marker] {
        &self.markers
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }
}

/// 跨任务共享的标记集合，所有修改在同一把锁内完成
#[derive(Debug, Clone, Default)]
pub struct SharedMarkerStore {
    inner: Arc<Mutex<MarkerStore>>,
}

impl SharedMarkerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, time: f64) -> Option<Marker> {
        self.inner.lock().add(time)
    }

    /// 整批在一次加锁内完成，不会与其他添加交错
    pub fn add_batch(&self, times: &[f64]) -> Vec<Marker> {
        self.inner.lock().add_batch(times)
    }

    pub fn clear(&self) {
        self.inner.lock().clear()
    }

    /// 当前标记的快照
    pub fn snapshot(&self) -> Vec<Marker> {
        self.inner.lock().markers().to_vec()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}
