// 节拍检测命令

use super::{AudioSource, Panel};
use crate::audio::output_path::derive_output_folder;
use crate::detection::detector::{collect_beat_times, BeatDetectionParams};
use crate::error::{AppError, AppResult};
use crate::host::HostBridge;
use crate::jobs::{JobRequest, JobResult};
use crate::markers::Marker;
use tracing::info;

impl<H: HostBridge> Panel<H> {
    pub fn default_beat_params(&self) -> BeatDetectionParams {
        BeatDetectionParams::from(&self.config.beat_detection)
    }

    /// 执行节拍检测，把节拍时间加入标记集合，返回实际新增的标记
    ///
    /// 与已有标记或同批中更早的节拍过近的时间会被去重。
    pub async fn detect_beats(&self, source: Option<AudioSource>, params: BeatDetectionParams) -> AppResult<Vec<Marker>> {
        let resolved = self.resolve_source(source).await?;
        let input = resolved.path_str();
        let output_folder = derive_output_folder(&input, "beats");
        info!("[PANEL] 节拍检测: 输入={}, 输出目录={}", input, output_folder);

        let outcome = self
            .jobs
            .submit(JobRequest::beat_detection(&resolved.path, output_folder, params))
            .await?;

        let times = match &outcome.result {
            JobResult::BeatDetection { results } => collect_beat_times(results),
            JobResult::Isolation { .. } => {
                return Err(AppError::Transport("节拍检测任务返回了分离结果".to_string()));
            }
        };

        let added = self.markers.add_batch(&times);
        info!("[PANEL] 节拍检测完成: {} 个节拍，新增 {} 个标记", times.len(), added.len());
        Ok(added)
    }
}
