// 节拍检测模块
//
// 由处理服务基于 librosa 完成节拍跟踪，返回每个输入单元的节拍时间戳，
// 面板把这些时间戳作为标记加入 MarkerStore。
//
// 子模块：
// - detector: 参数校验、请求体构造、结果解析

pub mod detector;
