// 音源分离命令

use super::{AudioSource, Panel};
use crate::audio::output_path::derive_output_folder;
use crate::audio::separator::{IsolationParams, StemSet};
use crate::error::{AppError, AppResult};
use crate::host::HostBridge;
use crate::jobs::{Job, JobRequest, JobResult, ProgressCallback, ProgressTracker};
use crate::markers::SyncResult;
use crate::models::Stem;
use crate::utils::generate_id;
use rand::Rng;
use serde::Serialize;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, info, warn};

/// 导入文件名随机后缀的尝试次数，都已存在时改用唯一 id
const IMPORT_NAME_ATTEMPTS: usize = 16;

/// 分离结果
#[derive(Debug, Clone, Serialize)]
pub struct IsolationOutcome {
    pub job: Job,
    pub stems: StemSet,
}

/// 导入时的选择：原始音频或某个分离音轨
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StemChoice {
    Original,
    Stem(Stem),
}

impl<H: HostBridge> Panel<H> {
    /// 参数使用配置中的默认值
    pub fn default_isolation_params(&self) -> IsolationParams {
        IsolationParams::from(&self.config.isolation)
    }

    /// 执行音源分离
    ///
    /// 缺少部分音轨不是错误，不可用的音轨在 StemSet 中为 None。
    pub async fn isolate(&self, source: Option<AudioSource>, params: IsolationParams) -> AppResult<IsolationOutcome> {
        let resolved = self.resolve_source(source).await?;
        let input = resolved.path_str();
        let output_folder = derive_output_folder(&input, "isolated");
        info!(
            "[PANEL] 音源分离: 输入={}, 模型={}, 设备={}, 输出目录={}",
            input,
            params.model_name,
            params.device.as_str(),
            output_folder
        );

        let outcome = self
            .jobs
            .submit(JobRequest::isolation(&resolved.path, output_folder, params))
            .await?;

        let stems = match &outcome.result {
            JobResult::Isolation { output_files } => StemSet::classify(output_files, &input),
            JobResult::BeatDetection { .. } => {
                return Err(AppError::Transport("分离任务返回了节拍检测结果".to_string()));
            }
        };
        if !stems.unavailable().is_empty() {
            warn!("[PANEL] 部分音轨不可用: {:?}", stems.unavailable());
        }

        Ok(IsolationOutcome { job: outcome.job, stems })
    }

    /// 把选中的音轨复制到会话临时目录并导入到宿主项目
    ///
    /// 原始音频已经在项目中，直接返回 false，不调用宿主。
    /// 外层错误为本地校验与文件复制失败，内层为宿主导入结果。
    pub async fn import_stem(&self, stems: &StemSet, choice: StemChoice) -> AppResult<SyncResult<bool>> {
        let stem = match choice {
            StemChoice::Original => {
                info!("[PANEL] 选择原始音频，无需导入");
                return Ok(Ok(false));
            }
            StemChoice::Stem(stem) => stem,
        };

        let source = stems
            .path(stem)
            .ok_or_else(|| AppError::Validation(format!("音轨不可用: {}", stem)))?;

        let target = copy_to_new_file(source, self.session().temp_dir(), stem).await?;
        let target = target.to_string_lossy().to_string();
        info!("[PANEL] 导入音轨: {} -> {}", source, target);

        let result = self.host.import_files(&[target]).await;
        match &result {
            Ok(true) => info!("[PANEL] 宿主已导入 {}", stem),
            Ok(false) => warn!("[PANEL] 宿主拒绝导入 {}", stem),
            Err(e) => error!("[PANEL] 导入失败: {}", e),
        }
        Ok(result)
    }

    /// 跟随进度流，直到服务关闭连接
    pub async fn watch_progress(&self, callback: Option<ProgressCallback>) -> AppResult<u8> {
        let tracker = match callback {
            Some(callback) => ProgressTracker::with_callback(callback),
            None => ProgressTracker::new(),
        };
        self.jobs.watch_progress(&tracker).await
    }
}

/// 把音轨复制为临时目录下的新文件，不覆盖已有文件
///
/// 之前导入的文件可能仍被宿主项目引用。
async fn copy_to_new_file(source: &str, dir: &Path, stem: Stem) -> AppResult<PathBuf> {
    let mut reader = tokio::fs::File::open(source).await?;

    let mut names: Vec<String> = {
        let mut rng = rand::thread_rng();
        (0..IMPORT_NAME_ATTEMPTS)
            .map(|_| format!("{}_{}.wav", stem, rng.gen_range(0..1000)))
            .collect()
    };
    names.push(format!("{}_{}.wav", stem, generate_id()));

    for name in names {
        let path = dir.join(&name);
        let mut target = match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                debug!("[PANEL] {} 已存在，换一个文件名", name);
                continue;
            }
            Err(e) => return Err(e.into()),
        };
        tokio::io::copy(&mut reader, &mut target).await?;
        target.flush().await?;
        return Ok(path);
    }

    Err(AppError::Validation(format!("无法在 {:?} 下创建 {} 的导入文件", dir, stem)))
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::*;
    use crate::audio::source::AudioReference;
    use std::sync::{Arc, Mutex};

    fn stem_set(dir: &tempfile::TempDir) -> StemSet {
        StemSet {
            drums: Some(media_file(dir, "drums.wav")),
            original: media_file(dir, "song.wav"),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_isolate_explicit_source() {
        let f = fixture().await;
        let input = media_file(&f.dir, "song.wav");
        let source = AudioSource::new(AudioReference::FilePath { path: input.clone() }, "song.wav");

        let outcome = f.panel.isolate(Some(source), f.panel.default_isolation_params()).await.unwrap();

        assert_eq!(outcome.stems.original, input);
        assert_eq!(outcome.stems.available(), vec![Stem::Other]);
        assert_eq!(outcome.stems.unavailable(), vec![Stem::Vocals, Stem::Drums, Stem::Bass]);
        assert!(outcome.job.output_folder.ends_with("song_isolated"));
    }

    #[tokio::test]
    async fn test_isolate_rejects_unknown_model() {
        let f = fixture().await;
        let input = media_file(&f.dir, "song.wav");
        let mut params = f.panel.default_isolation_params();
        params.model_name = "nope".to_string();

        let source = AudioSource::new(AudioReference::FilePath { path: input }, "song.wav");
        let err = f.panel.isolate(Some(source), params).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_import_available_stem() {
        let f = fixture().await;
        let stems = stem_set(&f.dir);

        let imported = f.panel.import_stem(&stems, StemChoice::Stem(Stem::Drums)).await.unwrap();
        assert_eq!(imported, Ok(true));

        let files = f.host.imported_files();
        assert_eq!(files.len(), 1);
        let name = crate::utils::basename(&files[0]).to_string();
        assert!(name.starts_with("drums_") && name.ends_with(".wav"));
        assert!(std::path::Path::new(&files[0]).exists());
    }

    #[tokio::test]
    async fn test_import_never_overwrites_existing_files() {
        let f = fixture().await;
        let temp_dir = f.panel.session().temp_dir().to_path_buf();
        // 占满所有随机后缀，只能落到唯一 id 文件名
        for n in 0..1000 {
            std::fs::write(temp_dir.join(format!("drums_{}.wav", n)), b"old").unwrap();
        }

        let imported = f.panel.import_stem(&stem_set(&f.dir), StemChoice::Stem(Stem::Drums)).await.unwrap();
        assert_eq!(imported, Ok(true));

        let files = f.host.imported_files();
        assert_eq!(std::fs::read(&files[0]).unwrap(), b"RIFF....WAVE");
        for n in 0..1000 {
            assert_eq!(std::fs::read(temp_dir.join(format!("drums_{}.wav", n))).unwrap(), b"old");
        }
    }

    #[tokio::test]
    async fn test_repeated_import_creates_distinct_files() {
        let f = fixture().await;
        let stems = stem_set(&f.dir);
        for _ in 0..5 {
            f.panel.import_stem(&stems, StemChoice::Stem(Stem::Drums)).await.unwrap().unwrap();
        }

        let mut files = f.host.imported_files();
        assert_eq!(files.len(), 5);
        files.sort();
        files.dedup();
        assert_eq!(files.len(), 5);
    }

    #[tokio::test]
    async fn test_import_unavailable_stem() {
        let f = fixture().await;
        let err = f
            .panel
            .import_stem(&stem_set(&f.dir), StemChoice::Stem(Stem::Vocals))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(f.host.imported_files().is_empty());
    }

    #[tokio::test]
    async fn test_import_original_skips_host() {
        let f = fixture().await;
        let result = f.panel.import_stem(&stem_set(&f.dir), StemChoice::Original).await.unwrap();
        assert_eq!(result, Ok(false));
        assert!(f.host.imported_files().is_empty());
    }

    #[tokio::test]
    async fn test_import_host_failure_is_value() {
        let f = fixture().await;
        f.host.fail_operation("import_files");
        let result = f
            .panel
            .import_stem(&stem_set(&f.dir), StemChoice::Stem(Stem::Drums))
            .await
            .unwrap();
        assert_eq!(result.unwrap_err().operation, "import_files");
    }

    #[tokio::test]
    async fn test_watch_progress() {
        let f = fixture().await;
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();

        let last = f
            .panel
            .watch_progress(Some(Box::new(move |v| sink.lock().unwrap().push(v))))
            .await
            .unwrap();
        assert_eq!(last, 100);
        assert_eq!(seen.lock().unwrap().last(), Some(&100));
    }
}
