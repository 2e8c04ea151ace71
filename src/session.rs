// 会话上下文
//
// 显式保存会话临时目录与当前选中片段，每次解析音源、同步标记时传入，
// 不使用任何进程级的可变全局状态。

use crate::error::AppResult;
use crate::host::{AudioInfo, MarkerScope};
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct Session {
    temp_dir: PathBuf,
    selected_clip: Option<AudioInfo>,
}

impl Session {
    /// 创建会话，临时目录不存在时自动创建
    pub fn new(temp_dir: impl Into<PathBuf>) -> AppResult<Self> {
        let temp_dir = temp_dir.into();
        std::fs::create_dir_all(&temp_dir)?;
        debug!("[SESSION] 临时目录: {:?}", temp_dir);
        Ok(Self {
            temp_dir,
            selected_clip: None,
        })
    }

    pub fn temp_dir(&self) -> &Path {
        &self.temp_dir
    }

    pub fn selected_clip(&self) -> Option<&AudioInfo> {
        self.selected_clip.as_ref()
    }

    pub fn select_clip(&mut self, clip: Option<AudioInfo>) {
        self.selected_clip = clip;
    }

    /// 选中片段在时间线上的起点，没有选中时为 0
    pub fn in_point(&self) -> f64 {
        self.selected_clip.as_ref().map(|c| c.in_point).unwrap_or(0.0)
    }

    /// 有选中片段时操作片段自身的标记，否则操作序列标记
    pub fn marker_scope(&self) -> MarkerScope {
        if self.selected_clip.is_some() {
            MarkerScope::Clip
        } else {
            MarkerScope::Sequence
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_follows_selection() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = Session::new(dir.path().join("temp")).unwrap();
        assert!(session.temp_dir().exists());
        assert_eq!(session.marker_scope(), MarkerScope::Sequence);
        assert_eq!(session.in_point(), 0.0);

        session.select_clip(Some(AudioInfo {
            path: "/media/song.wav".to_string(),
            name: "song".to_string(),
            in_point: 12.5,
        }));
        assert_eq!(session.marker_scope(), MarkerScope::Clip);
        assert_eq!(session.in_point(), 12.5);
    }
}
