// 工具模块

use std::path::PathBuf;

const DATA_DIR_ENV: &str = "SOUNDBUDDY_DATA_DIR";

/// 生成 UUID
pub fn generate_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// 获取应用数据目录
///
/// 优先使用环境变量 SOUNDBUDDY_DATA_DIR，其次是系统本地数据目录，
/// 都不可用时回退到当前工作目录下的 data 文件夹
pub fn get_app_data_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os(DATA_DIR_ENV) {
        if !dir.is_empty() {
            return PathBuf::from(dir);
        }
    }

    if let Some(dir) = dirs::data_local_dir() {
        return dir.join("soundbuddy");
    }

    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join("data")
}

/// 取路径最后一段，同时接受 `\` 和 `/` 分隔符
///
/// 宿主在 Windows 上返回反斜杠路径，面板可能运行在任一平台，不能依赖 std::path 的平台语义。
pub fn basename(path: &str) -> &str {
    path.rsplit(['\\', '/']).next().unwrap_or(path)
}

/// 去掉最后一个扩展名，以点开头的文件名保持不变
pub fn file_stem(name: &str) -> &str {
    match name.rfind('.') {
        Some(idx) if idx > 0 => &name[..idx],
        _ => name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basename_mixed_separators() {
        assert_eq!(basename("/a/b/song.wav"), "song.wav");
        assert_eq!(basename("C:\\a\\b\\song.wav"), "song.wav");
        assert_eq!(basename("song.wav"), "song.wav");
        assert_eq!(basename("dir/"), "");
    }

    #[test]
    fn test_file_stem() {
        assert_eq!(file_stem("song.wav"), "song");
        assert_eq!(file_stem("song.final.mp3"), "song.final");
        assert_eq!(file_stem(".hidden"), ".hidden");
        assert_eq!(file_stem("noext"), "noext");
    }

    #[test]
    fn test_generate_id_unique() {
        assert_ne!(generate_id(), generate_id());
    }
}
