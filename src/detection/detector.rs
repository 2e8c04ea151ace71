// 节拍检测 - 请求构造与结果解析
//
// 检测由处理服务完成（librosa beat_track），这里负责参数校验、请求体构造，
// 以及把每个输入单元的节拍时间戳整理成标记时间。

use crate::config::BeatDetectionConfig;
use crate::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};

/// 节拍检测参数，未设置的字段由服务端使用默认值
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BeatDetectionParams {
    pub hop_length: Option<u32>,
    pub sample_rate: Option<u32>,
    pub start_bpm: Option<f64>,
    pub tightness: Option<f64>,
}

impl From<&BeatDetectionConfig> for BeatDetectionParams {
    fn from(config: &BeatDetectionConfig) -> Self {
        Self {
            hop_length: Some(config.hop_length),
            sample_rate: Some(config.sample_rate),
            start_bpm: Some(config.start_bpm),
            tightness: Some(config.tightness),
        }
    }
}

impl BeatDetectionParams {
    /// 所有给定的参数都必须为正数
    pub fn validate(&self) -> AppResult<()> {
        if self.hop_length == Some(0) {
            return Err(AppError::Validation("hop_length 必须为正整数".to_string()));
        }
        if self.sample_rate == Some(0) {
            return Err(AppError::Validation("sr 必须为正整数".to_string()));
        }
        check_positive("start_bpm", self.start_bpm)?;
        check_positive("tightness", self.tightness)?;
        Ok(())
    }
}

fn check_positive(name: &str, value: Option<f64>) -> AppResult<()> {
    match value {
        Some(v) if !(v.is_finite() && v > 0.0) => {
            Err(AppError::Validation(format!("{} 必须为正数: {}", name, v)))
        }
        _ => Ok(()),
    }
}

/// `POST /beat-detection` 请求体，未设置的可选字段不出现在 JSON 中
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BeatDetectionRequest {
    pub file_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hop_length: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sr: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_bpm: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tightness: Option<f64>,
    pub output_folder: String,
}

impl BeatDetectionRequest {
    pub fn new(file_path: &str, params: &BeatDetectionParams, output_folder: &str) -> Self {
        Self {
            file_path: file_path.to_string(),
            hop_length: params.hop_length,
            sr: params.sample_rate,
            start_bpm: params.start_bpm,
            tightness: params.tightness,
            output_folder: output_folder.to_string(),
        }
    }
}

/// 单个输入单元的检测结果
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BeatResult {
    #[serde(default)]
    pub file_path: Option<String>,
    /// 按时间顺序排列的节拍时间戳 (秒)
    pub beat_times: Vec<f64>,
}

/// `POST /beat-detection` 响应体
#[derive(Debug, Clone, Deserialize)]
pub struct BeatDetectionResponse {
    pub results: Vec<BeatResult>,
}

/// 按结果顺序展开所有节拍时间
pub fn collect_beat_times(results: &[BeatResult]) -> Vec<f64> {
    results
        .iter()
        .flat_map(|r| r.beat_times.iter().copied())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_optional_fields_omitted() {
        let body = serde_json::to_value(BeatDetectionRequest::new(
            "/a.wav",
            &BeatDetectionParams::default(),
            "/a_beats",
        ))
        .unwrap();
        let object = body.as_object().unwrap();
        assert_eq!(object.len(), 2);
        assert_eq!(body["file_path"], "/a.wav");
        assert_eq!(body["output_folder"], "/a_beats");
    }

    #[test]
    fn test_config_params_use_sr_key() {
        let params = BeatDetectionParams::from(&BeatDetectionConfig::default());
        let body = serde_json::to_value(BeatDetectionRequest::new("/a.wav", &params, "/o")).unwrap();
        assert_eq!(body["sr"], 44100);
        assert_eq!(body["hop_length"], 512);
        assert_eq!(body["start_bpm"], 120.0);
    }

    #[test]
    fn test_validation() {
        assert!(BeatDetectionParams::default().validate().is_ok());
        let zero_hop = BeatDetectionParams { hop_length: Some(0), ..Default::default() };
        assert!(matches!(zero_hop.validate(), Err(AppError::Validation(_))));
        let negative = BeatDetectionParams { tightness: Some(-1.0), ..Default::default() };
        assert!(negative.validate().is_err());
        let nan = BeatDetectionParams { start_bpm: Some(f64::NAN), ..Default::default() };
        assert!(nan.validate().is_err());
    }

    #[test]
    fn test_parse_response_and_flatten() {
        let response: BeatDetectionResponse = serde_json::from_str(
            r#"{"message": "ok", "results": [
                {"file_path": "/a.wav", "beat_times": [0.5, 1.0]},
                {"beat_times": [1.5]}
            ]}"#,
        )
        .unwrap();
        assert_eq!(response.results[1].file_path, None);
        assert_eq!(collect_beat_times(&response.results), vec![0.5, 1.0, 1.5]);
    }
}
