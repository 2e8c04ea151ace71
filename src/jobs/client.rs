// 处理服务客户端
//
// 服务接口：
// - POST /isolate         音源分离，返回输出文件列表
// - POST /beat-detection  节拍检测，返回每个输入单元的节拍时间
// - GET  /progress        文本流推送当前进度
//
// 不做重试、不做去重；多个任务可以同时在途。

use super::progress::{ProgressParser, ProgressTracker};
use super::{Job, JobOutcome, JobParameters, JobRequest, JobResult, JobStatus};
use crate::audio::separator::{IsolationRequest, IsolationResponse};
use crate::config::ServerConfig;
use crate::detection::detector::{BeatDetectionRequest, BeatDetectionResponse};
use crate::error::{AppError, AppResult};
use crate::utils::generate_id;
use chrono::Local;
use futures_util::StreamExt;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, info, warn};

/// 服务返回的错误体
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

/// 处理服务客户端
#[derive(Clone)]
pub struct JobClient {
    client: reqwest::Client,
    base_url: String,
}

impl JobClient {
    pub fn new(config: &ServerConfig) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()
            .map_err(|e| AppError::Transport(format!("创建 HTTP 客户端失败: {}", e)))?;
        Ok(Self::with_client(client, &config.base_url))
    }

    pub fn with_client(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// 提交任务并等待结果
    ///
    /// 发送前检查输入文件存在、参数合法，失败时直接返回 Validation 错误，不发起请求。
    pub async fn submit(&self, request: JobRequest) -> AppResult<JobOutcome> {
        let input_file = request.input_file.to_string_lossy().to_string();
        let mut job = Job {
            id: generate_id(),
            kind: request.parameters.kind(),
            input_file: input_file.clone(),
            parameters: request.parameters.clone(),
            output_folder: request.output_folder.clone(),
            status: JobStatus::Pending,
            created_at: Local::now().to_rfc3339(),
            finished_at: None,
        };
        info!("[JOBS] 创建任务: id={}, 类型={:?}, 输入={}", job.id, job.kind, input_file);

        if !tokio::fs::try_exists(&request.input_file).await.unwrap_or(false) {
            warn!("[JOBS] 输入文件不存在，任务未发送: id={}, 输入={}", job.id, input_file);
            return Err(AppError::Validation(format!("输入文件不存在: {}", input_file)));
        }

        if let Err(e) = request.parameters.validate() {
            warn!("[JOBS] 参数校验失败，任务未发送: id={}, 错误={}", job.id, e);
            return Err(e);
        }

        job.status = JobStatus::Running;
        info!("[JOBS] 任务开始: id={}, 输出目录={}", job.id, job.output_folder);

        let result = match &request.parameters {
            JobParameters::Isolation(params) => {
                let body = IsolationRequest::new(&input_file, params, &request.output_folder);
                self.post_json::<_, IsolationResponse>("/isolate", &body)
                    .await
                    .map(|r| JobResult::Isolation { output_files: r.output_files })
            }
            JobParameters::BeatDetection(params) => {
                let body = BeatDetectionRequest::new(&input_file, params, &request.output_folder);
                self.post_json::<_, BeatDetectionResponse>("/beat-detection", &body)
                    .await
                    .map(|r| JobResult::BeatDetection { results: r.results })
            }
        };

        job.finished_at = Some(Local::now().to_rfc3339());
        match result {
            Ok(result) => {
                job.status = JobStatus::Completed;
                info!("[JOBS] 任务完成: id={}", job.id);
                Ok(JobOutcome { job, result })
            }
            Err(e) => {
                job.status = JobStatus::Failed;
                error!("[JOBS] 任务失败: id={}, 错误={}", job.id, e);
                Err(e)
            }
        }
    }

    async fn post_json<B: Serialize, R: DeserializeOwned>(&self, path: &str, body: &B) -> AppResult<R> {
        let response = self
            .client
            .post(self.endpoint(path))
            .json(body)
            .send()
            .await
            .map_err(|e| AppError::Transport(format!("请求 {} 失败: {}", path, e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&text)
                .map(|b| b.error)
                .unwrap_or(text);
            return Err(AppError::Transport(format!("{} 返回 {}: {}", path, status, message)));
        }

        response
            .json::<R>()
            .await
            .map_err(|e| AppError::Transport(format!("解析 {} 响应失败: {}", path, e)))
    }

    /// 跟随进度流直到结束，返回最后的进度值
    ///
    /// 进度流与任务请求是两条独立的连接，二者之间没有顺序保证，以任务请求的结果为准。
    pub async fn watch_progress(&self, tracker: &ProgressTracker) -> AppResult<u8> {
        let response = self
            .client
            .get(self.endpoint("/progress"))
            .send()
            .await
            .map_err(|e| AppError::Transport(format!("连接进度流失败: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Transport(format!("/progress 返回 {}", status)));
        }

        let mut parser = ProgressParser::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| AppError::Transport(format!("读取进度流失败: {}", e)))?;
            if let Some(value) = parser.feed(&chunk) {
                tracker.update(value);
            }
        }
        if let Some(value) = parser.finish() {
            tracker.update(value);
        }

        info!("[JOBS] 进度流结束: {}%", tracker.current());
        Ok(tracker.current())
    }
}
