// 任务模块
//
// 向本地处理服务提交音源分离 / 节拍检测任务并跟踪进度。
// 任务在提交时创建，完成或失败后即为终态，不会复用；失败的任务不保留任何状态，调用方需要重新提交。
//
// 子模块：
// - client: HTTP 客户端，负责前置检查、发送请求、解析结果
// - progress: 进度流解析与当前进度保存

pub mod client;
pub mod progress;

pub use client::JobClient;
pub use progress::{ProgressCallback, ProgressTracker};

use crate::audio::separator::IsolationParams;
use crate::detection::detector::{BeatDetectionParams, BeatResult};
use crate::error::AppResult;
use serde::Serialize;
use std::path::PathBuf;

/// 任务类型
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    Isolation,
    BeatDetection,
}

/// 任务状态
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

/// 各类任务的参数
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobParameters {
    Isolation(IsolationParams),
    BeatDetection(BeatDetectionParams),
}

impl JobParameters {
    pub fn kind(&self) -> JobKind {
        match self {
            JobParameters::Isolation(_) => JobKind::Isolation,
            JobParameters::BeatDetection(_) => JobKind::BeatDetection,
        }
    }

    pub fn validate(&self) -> AppResult<()> {
        match self {
            JobParameters::Isolation(params) => params.validate(),
            JobParameters::BeatDetection(params) => params.validate(),
        }
    }
}

/// 提交任务的请求
#[derive(Debug, Clone)]
pub struct JobRequest {
    pub input_file: PathBuf,
    pub output_folder: String,
    pub parameters: JobParameters,
}

impl JobRequest {
    pub fn isolation(input_file: impl Into<PathBuf>, output_folder: impl Into<String>, params: IsolationParams) -> Self {
        Self {
            input_file: input_file.into(),
            output_folder: output_folder.into(),
            parameters: JobParameters::Isolation(params),
        }
    }

    pub fn beat_detection(
        input_file: impl Into<PathBuf>,
        output_folder: impl Into<String>,
        params: BeatDetectionParams,
    ) -> Self {
        Self {
            input_file: input_file.into(),
            output_folder: output_folder.into(),
            parameters: JobParameters::BeatDetection(params),
        }
    }
}

/// 任务记录
#[derive(Debug, Clone, Serialize)]
pub struct Job {
    pub id: String,
    pub kind: JobKind,
    pub input_file: String,
    pub parameters: JobParameters,
    pub output_folder: String,
    pub status: JobStatus,
    pub created_at: String,
    pub finished_at: Option<String>,
}

/// 任务结果
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobResult {
    /// 服务输出的全部文件路径，由调用方按音轨归类
    Isolation { output_files: Vec<String> },
    /// 每个输入单元一条结果
    BeatDetection { results: Vec<BeatResult> },
}

/// 已完成的任务及其结果
#[derive(Debug, Clone, Serialize)]
pub struct JobOutcome {
    pub job: Job,
    pub result: JobResult,
}
