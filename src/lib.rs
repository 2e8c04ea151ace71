// SoundBuddy - 音频分离与节拍检测面板核心
//
// 把音频引用落地为本地文件，向本地处理服务提交分离 / 节拍检测任务，
// 并把节拍结果作为标记同步到宿主时间线。

pub mod audio;
pub mod commands;
pub mod config;
pub mod detection;
pub mod error;
pub mod host;
pub mod jobs;
pub mod logging;
pub mod markers;
pub mod models;
pub mod session;
pub mod utils;
