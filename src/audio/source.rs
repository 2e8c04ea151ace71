// 音源解析模块
//
// 面板拿到的音频引用可能是 data URL 内嵌数据、临时 blob 引用或文件路径，
// 处理服务只接受本地文件，因此提交任务前统一落地到会话临时目录。

use crate::error::{AppError, AppResult};
use crate::session::Session;
use crate::utils::{basename, file_stem, generate_id};
use async_trait::async_trait;
use base64::Engine;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

/// 名称清洗后为空时使用的文件名
const FALLBACK_FILE_NAME: &str = "audio.wav";

/// 同名文件的最大编号尝试次数，超过后改用随机后缀
const MAX_NUMBERED_SUFFIX: u32 = 999;

/// 音频引用
#[derive(Debug, Clone, PartialEq)]
pub enum AudioReference {
    /// base64 内嵌数据，附带来源文件名
    EmbeddedData { base64: String, implicit_name: String },
    /// 临时 blob 引用，需要先拉取到内存
    TransientBlobRef { url: String },
    /// 文件路径
    FilePath { path: String },
}

impl AudioReference {
    /// 按面板收到的原始字符串分类
    ///
    /// `data:<mime>;base64,<payload>` 为内嵌数据，`blob:` 开头为临时引用，其余视为路径。
    pub fn parse(raw: &str) -> Self {
        if let Some(rest) = raw.strip_prefix("data:") {
            let payload = rest.split_once(',').map(|(_, data)| data).unwrap_or("");
            return AudioReference::EmbeddedData {
                base64: payload.to_string(),
                implicit_name: String::new(),
            };
        }
        if raw.starts_with("blob:") {
            return AudioReference::TransientBlobRef { url: raw.to_string() };
        }
        AudioReference::FilePath { path: raw.to_string() }
    }
}

/// 解析后的本地音频文件，交给任务时保证存在
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedAudioFile {
    pub path: PathBuf,
}

impl ResolvedAudioFile {
    pub fn path_str(&self) -> String {
        self.path.to_string_lossy().to_string()
    }
}

/// 临时对象的拉取通道
#[async_trait]
pub trait BlobFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> AppResult<Vec<u8>>;
}

/// 进程内的临时对象注册表
#[derive(Default)]
pub struct BlobStore {
    blobs: RwLock<HashMap<String, Arc<Vec<u8>>>>,
}

impl BlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册一段数据，返回可用于 `AudioReference::TransientBlobRef` 的 URL
    pub fn register(&self, bytes: Vec<u8>) -> String {
        let url = format!("blob:soundbuddy/{}", generate_id());
        self.blobs.write().insert(url.clone(), Arc::new(bytes));
        url
    }

}

#[async_trait]
impl BlobFetcher for BlobStore {
    async fn fetch(&self, url: &str) -> AppResult<Vec<u8>> {
        self.blobs
            .read()
            .get(url)
            .map(|bytes| bytes.as_ref().clone())
            .ok_or_else(|| AppError::Resolution(format!("临时对象不存在或已释放: {}", url)))
    }
}

/// 通过 HTTP 或本地文件拉取
pub struct HttpBlobFetcher {
    client: reqwest::Client,
}

impl HttpBlobFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl BlobFetcher for HttpBlobFetcher {
    async fn fetch(&self, url: &str) -> AppResult<Vec<u8>> {
        if let Some(path) = url.strip_prefix("file://") {
            return tokio::fs::read(path)
                .await
                .map_err(|e| AppError::Resolution(format!("读取 {} 失败: {}", url, e)));
        }

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AppError::Resolution(format!("拉取 {} 失败: {}", url, e)))?;
        if !response.status().is_success() {
            return Err(AppError::Resolution(format!("拉取 {} 失败: HTTP {}", url, response.status())));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| AppError::Resolution(format!("读取 {} 响应失败: {}", url, e)))?;
        Ok(bytes.to_vec())
    }
}

/// 音源解析器
pub struct SourceResolver {
    fetcher: Arc<dyn BlobFetcher>,
}

impl SourceResolver {
    pub fn new(fetcher: Arc<dyn BlobFetcher>) -> Self {
        Self { fetcher }
    }

    /// 把任意音频引用解析为会话内存在的本地文件
    pub async fn resolve(
        &self,
        session: &Session,
        reference: &AudioReference,
        preferred_name: &str,
    ) -> AppResult<ResolvedAudioFile> {
        match reference {
            AudioReference::EmbeddedData { base64, implicit_name } => {
                let bytes = decode_base64(base64)?;
                let name = pick_name(preferred_name, implicit_name);
                info!("[RESOLVER] 内嵌数据 {} 字节 -> {}", bytes.len(), name);
                write_unique(session.temp_dir(), &name, &bytes).await
            }
            AudioReference::TransientBlobRef { url } => {
                let bytes = self.fetcher.fetch(url).await?;
                let name = pick_name(preferred_name, "");
                info!("[RESOLVER] 临时对象 {} ({} 字节) -> {}", url, bytes.len(), name);
                write_unique(session.temp_dir(), &name, &bytes).await
            }
            AudioReference::FilePath { path } => resolve_path(session, path).await,
        }
    }
}

fn decode_base64(payload: &str) -> AppResult<Vec<u8>> {
    let compact: String = payload.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    base64::engine::general_purpose::STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| AppError::Resolution(format!("base64 解码失败: {}", e)))
}

/// 只保留最后一段文件名，避免写出临时目录
fn pick_name(preferred: &str, implicit: &str) -> String {
    [preferred, implicit]
        .into_iter()
        .map(|candidate| basename(candidate.trim()))
        .find(|name| !name.is_empty() && *name != "." && *name != "..")
        .unwrap_or(FALLBACK_FILE_NAME)
        .to_string()
}

/// 第 n 个候选文件名: name.wav, name_1.wav, name_2.wav ...
fn numbered_name(name: &str, n: u32) -> String {
    if n == 0 {
        return name.to_string();
    }
    let stem = file_stem(name);
    let ext = &name[stem.len()..];
    format!("{}_{}{}", stem, n, ext)
}

/// 以独占方式创建文件写入数据，同名文件存在时追加编号
async fn write_unique(dir: &Path, name: &str, bytes: &[u8]) -> AppResult<ResolvedAudioFile> {
    if bytes.is_empty() {
        return Err(AppError::Resolution("音频数据为空".to_string()));
    }

    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| AppError::Resolution(format!("创建临时目录失败: {}", e)))?;

    let candidates = (0..=MAX_NUMBERED_SUFFIX)
        .map(|n| numbered_name(name, n))
        .chain(std::iter::once(format!("{}_{}", generate_id(), name)));

    for candidate in candidates {
        let path = dir.join(&candidate);
        let mut file = match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(AppError::Resolution(format!("创建文件 {:?} 失败: {}", path, e))),
        };

        file.write_all(bytes)
            .await
            .map_err(|e| AppError::Resolution(format!("写入文件 {:?} 失败: {}", path, e)))?;
        file.flush()
            .await
            .map_err(|e| AppError::Resolution(format!("写入文件 {:?} 失败: {}", path, e)))?;

        let exists = tokio::fs::try_exists(&path).await.unwrap_or(false);
        debug!("[RESOLVER] 写入后文件存在: {} ({:?})", exists, path);
        if !exists {
            return Err(AppError::Resolution(format!("文件写入后不存在: {:?}", path)));
        }
        return Ok(ResolvedAudioFile { path });
    }

    Err(AppError::Resolution(format!("无法在 {:?} 中为 {} 分配文件名", dir, name)))
}

/// 宿主可能给出 Windows 路径，即便当前运行在其他平台也按绝对路径处理
fn is_absolute_like(path: &str) -> bool {
    if Path::new(path).is_absolute() || path.starts_with('/') || path.starts_with("\\\\") {
        return true;
    }
    let bytes = path.as_bytes();
    bytes.len() >= 3
        && bytes[0].is_ascii_alphabetic()
        && bytes[1] == b':'
        && (bytes[2] == b'\\' || bytes[2] == b'/')
}

async fn resolve_path(session: &Session, path: &str) -> AppResult<ResolvedAudioFile> {
    let resolved = if is_absolute_like(path) {
        PathBuf::from(path)
    } else {
        // 相对路径约定为之前保存到会话临时目录的文件
        let joined = session.temp_dir().join(basename(path));
        debug!("[RESOLVER] 相对路径 {} 转换为 {:?}", path, joined);
        joined
    };

    if !tokio::fs::try_exists(&resolved).await.unwrap_or(false) {
        warn!("[RESOLVER] 文件不存在: {:?}", resolved);
        return Err(AppError::Resolution(format!("文件不存在: {}", resolved.display())));
    }
    Ok(ResolvedAudioFile { path: resolved })
}
