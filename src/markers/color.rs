// 标记颜色
//
// 标记在面板中以半透明 RGBA 显示；导出到时间线时宿主只接受调色板索引，
// 由 ColorIndexPolicy 决定索引取固定值还是按 RGB 映射到最接近的调色板颜色。

use crate::error::AppError;
use rand::Rng;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 新建标记的固定透明度
pub const MARKER_ALPHA: f32 = 0.5;

lazy_static::lazy_static! {
    static ref RGBA_REGEX: Regex = Regex::new(
        r"^\s*rgba\(\s*(\d{1,3})\s*,\s*(\d{1,3})\s*,\s*(\d{1,3})\s*,\s*([0-9]*\.?[0-9]+)\s*\)\s*$"
    ).unwrap();
}

/// 宿主时间线标记调色板，下标即颜色索引
const HOST_PALETTE: [(&str, [u8; 3]); 8] = [
    ("green", [36, 196, 72]),
    ("red", [224, 55, 55]),
    ("purple", [170, 85, 200]),
    ("orange", [240, 140, 30]),
    ("yellow", [230, 210, 40]),
    ("white", [240, 240, 240]),
    ("blue", [50, 100, 230]),
    ("cyan", [40, 200, 210]),
];

/// 序列化为 `rgba(r, g, b, a)` 字符串，反序列化时按同一格式解析
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MarkerColor {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
    pub alpha: f32,
}

impl MarkerColor {
    /// 三个通道各自在 0-255 内均匀取值，透明度固定
    pub fn random_translucent() -> Self {
        let mut rng = rand::thread_rng();
        Self {
            red: rng.gen(),
            green: rng.gen(),
            blue: rng.gen(),
            alpha: MARKER_ALPHA,
        }
    }

    /// 调色板中与当前颜色 RGB 距离最近的索引，透明度不参与比较
    pub fn nearest_palette_index(&self) -> u8 {
        let mut best = 0usize;
        let mut best_distance = u32::MAX;
        for (idx, (_, rgb)) in HOST_PALETTE.iter().enumerate() {
            let distance = channel_distance(self.red, rgb[0])
                + channel_distance(self.green, rgb[1])
                + channel_distance(self.blue, rgb[2]);
            if distance < best_distance {
                best = idx;
                best_distance = distance;
            }
        }
        best as u8
    }
}

fn channel_distance(a: u8, b: u8) -> u32 {
    let d = a.abs_diff(b) as u32;
    d * d
}

impl fmt::Display for MarkerColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rgba({}, {}, {}, {})", self.red, self.green, self.blue, self.alpha)
    }
}

impl FromStr for MarkerColor {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || AppError::Validation(format!("无效颜色: {}", s));
        let caps = RGBA_REGEX.captures(s).ok_or_else(invalid)?;
        let channel = |i: usize| caps[i].parse::<u8>().map_err(|_| invalid());
        let alpha = caps[4].parse::<f32>().map_err(|_| invalid())?;
        if !(0.0..=1.0).contains(&alpha) {
            return Err(invalid());
        }
        Ok(Self {
            red: channel(1)?,
            green: channel(2)?,
            blue: channel(3)?,
            alpha,
        })
    }
}

impl TryFrom<String> for MarkerColor {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<MarkerColor> for String {
    fn from(color: MarkerColor) -> Self {
        color.to_string()
    }
}

/// 导出到时间线时的颜色索引策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorIndexPolicy {
    /// 所有标记使用同一个索引
    Fixed(u8),
    /// 按标记颜色取最接近的调色板索引
    Nearest,
}

impl Default for ColorIndexPolicy {
    fn default() -> Self {
        ColorIndexPolicy::Fixed(1)
    }
}

impl ColorIndexPolicy {
    pub fn index_for(&self, color: &MarkerColor) -> u8 {
        match self {
            ColorIndexPolicy::Fixed(index) => *index,
            ColorIndexPolicy::Nearest => color.nearest_palette_index(),
        }
    }
}

/// 调色板索引对应的颜色名，超出范围返回 None
pub fn palette_name(index: u8) -> Option<&'static str> {
    HOST_PALETTE.get(index as usize).map(|(name, _)| *name)
}
