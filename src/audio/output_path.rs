// 输出目录规划
//
// 根据输入文件路径和任务标签推导输出目录，与输入文件放在同一目录下，
// 并沿用输入路径的分隔符风格（宿主在 Windows 上给出反斜杠路径）。

use crate::utils::{basename, file_stem};

/// 推导任务输出目录: `<目录><分隔符><文件名去扩展名>_<标签>`
///
/// 先找最后一个 `\`，找不到再找 `/`。没有分隔符的裸文件名得到空目录前缀，
/// 结果只有目录名本身。纯函数，任何输入都返回字符串。
pub fn derive_output_folder(input_path: &str, label: &str) -> String {
    let split = input_path
        .rfind('\\')
        .map(|idx| (idx, '\\'))
        .or_else(|| input_path.rfind('/').map(|idx| (idx, '/')));

    let stem = file_stem(basename(input_path));
    match split {
        Some((idx, separator)) => {
            format!("{}{}{}_{}", &input_path[..idx], separator, stem, label)
        }
        None => format!("{}_{}", stem, label),
    }
}
