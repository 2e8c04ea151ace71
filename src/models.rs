// 分离模型目录
//
// 处理服务端基于 Demucs，只接受固定的模型名、设备和音轨名。
// 在发送任务前本地校验，避免一次无意义的往返。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_MODEL_ID: &str = "htdemucs";

/// 推理设备
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    Cpu,
    Cuda,
}

impl Device {
    pub fn as_str(&self) -> &'static str {
        match self {
            Device::Cpu => "cpu",
            Device::Cuda => "cuda",
        }
    }
}

impl FromStr for Device {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cpu" => Ok(Device::Cpu),
            "cuda" => Ok(Device::Cuda),
            other => Err(format!("无效设备: {}，可选: cpu, cuda", other)),
        }
    }
}

/// 分离出的音轨
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Stem {
    Vocals,
    Drums,
    Bass,
    Other,
}

impl Stem {
    pub const ALL: [Stem; 4] = [Stem::Vocals, Stem::Drums, Stem::Bass, Stem::Other];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stem::Vocals => "vocals",
            Stem::Drums => "drums",
            Stem::Bass => "bass",
            Stem::Other => "other",
        }
    }

    /// 服务输出文件名的固定后缀
    pub fn file_suffix(&self) -> &'static str {
        match self {
            Stem::Vocals => "vocals.wav",
            Stem::Drums => "drums.wav",
            Stem::Bass => "bass.wav",
            Stem::Other => "other.wav",
        }
    }
}

impl fmt::Display for Stem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stem {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Stem::ALL
            .into_iter()
            .find(|stem| stem.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("无效音轨: {}，可选: vocals, drums, bass, other", s))
    }
}

/// 模型信息
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    /// 服务端使用的模型名
    pub id: String,
    /// 模型描述
    pub description: String,
    /// 输出轨道数 (4=人声+鼓+贝斯+其他, 6=额外的吉他与钢琴)
    pub stems: u8,
}

fn model(id: &str, description: &str, stems: u8) -> ModelInfo {
    ModelInfo {
        id: id.to_string(),
        description: description.to_string(),
        stems,
    }
}

/// 获取所有可用模型列表
pub fn get_available_models() -> Vec<ModelInfo> {
    vec![
        model("htdemucs", "Hybrid Transformer Demucs，默认模型", 4),
        model("htdemucs_ft", "htdemucs 微调版，更慢但质量更高", 4),
        model("htdemucs_6s", "六轨实验模型，额外输出吉他与钢琴", 6),
        model("hdemucs_mmi", "Hybrid Demucs v3", 4),
        model("mdx", "MDX 挑战赛模型", 4),
        model("mdx_extra", "MDX 额外训练数据版本", 4),
        model("mdx_q", "mdx 量化版，体积更小", 4),
        model("mdx_extra_q", "mdx_extra 量化版", 4),
    ]
}

/// 根据 ID 获取模型信息
pub fn get_model_by_id(model_id: &str) -> Option<ModelInfo> {
    get_available_models().into_iter().find(|m| m.id == model_id)
}
