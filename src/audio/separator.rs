// 音源分离 - 请求构造与输出分类
//
// 分离本身由处理服务完成，这里负责参数校验、请求体构造，
// 以及把服务返回的文件列表按音轨归类。

use crate::config::IsolationConfig;
use crate::error::{AppError, AppResult};
use crate::models::{self, Device, Stem};
use crate::utils::basename;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// 音源分离参数
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IsolationParams {
    pub model_name: String,
    pub device: Device,
    pub shifts: u32,
    pub two_stems: Option<Stem>,
}

impl From<&IsolationConfig> for IsolationParams {
    fn from(config: &IsolationConfig) -> Self {
        Self {
            model_name: config.model_name.clone(),
            device: config.device,
            shifts: config.shifts,
            two_stems: config.two_stems,
        }
    }
}

impl IsolationParams {
    /// 模型名必须是服务端支持的 Demucs 模型之一
    pub fn validate(&self) -> AppResult<()> {
        if models::get_model_by_id(&self.model_name).is_none() {
            let valid: Vec<String> = models::get_available_models().into_iter().map(|m| m.id).collect();
            return Err(AppError::Validation(format!(
                "无效模型: {}，可选: {}",
                self.model_name,
                valid.join(", ")
            )));
        }
        Ok(())
    }
}

/// `POST /isolate` 请求体
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IsolationRequest {
    pub file_path: String,
    pub model_name: String,
    pub device: Device,
    pub shifts: u32,
    pub two_stems: Option<Stem>,
    pub output_folder: String,
}

impl IsolationRequest {
    pub fn new(file_path: &str, params: &IsolationParams, output_folder: &str) -> Self {
        Self {
            file_path: file_path.to_string(),
            model_name: params.model_name.clone(),
            device: params.device,
            shifts: params.shifts,
            two_stems: params.two_stems,
            output_folder: output_folder.to_string(),
        }
    }
}

/// `POST /isolate` 响应体
#[derive(Debug, Clone, Deserialize)]
pub struct IsolationResponse {
    pub output_files: Vec<String>,
}

/// 按音轨归类后的分离结果，缺失的音轨为 None
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct StemSet {
    pub vocals: Option<String>,
    pub drums: Option<String>,
    pub bass: Option<String>,
    pub other: Option<String>,
    /// 原始输入文件
    pub original: String,
}

impl StemSet {
    /// 按文件名后缀匹配各音轨，没有匹配的音轨视为不可用而不是错误
    pub fn classify(output_files: &[String], original: &str) -> Self {
        let find = |stem: Stem| {
            output_files
                .iter()
                .find(|file| {
                    // two_stems 模式会额外输出 no_<stem>.wav，不能当成该音轨
                    let name = basename(file).to_ascii_lowercase();
                    name.ends_with(stem.file_suffix()) && !name.starts_with("no_")
                })
                .cloned()
        };

        let set = Self {
            vocals: find(Stem::Vocals),
            drums: find(Stem::Drums),
            bass: find(Stem::Bass),
            other: find(Stem::Other),
            original: original.to_string(),
        };
        debug!("[SEPARATOR] 音轨归类: 可用={:?}, 缺失={:?}", set.available(), set.unavailable());
        set
    }

    pub fn path(&self, stem: Stem) -> Option<&str> {
        match stem {
            Stem::Vocals => self.vocals.as_deref(),
            Stem::Drums => self.drums.as_deref(),
            Stem::Bass => self.bass.as_deref(),
            Stem::Other => self.other.as_deref(),
        }
    }

    pub fn is_available(&self, stem: Stem) -> bool {
        self.path(stem).is_some()
    }

    pub fn available(&self) -> Vec<Stem> {
        Stem::ALL.into_iter().filter(|s| self.is_available(*s)).collect()
    }

    pub fn unavailable(&self) -> Vec<Stem> {
        Stem::ALL.into_iter().filter(|s| !self.is_available(*s)).collect()
    }
}
