// 音频处理模块
//
// 子模块：
// - output_path: 根据输入文件推导任务输出目录
// - source: 把内嵌数据 / 临时 blob / 文件路径解析为会话内的本地文件
// - separator: 音源分离请求构造与输出音轨归类

pub mod output_path;
pub mod separator;
pub mod source;
