// 标记模块
//
// 子模块：
// - color: 标记颜色与调色板索引策略
// - store: 会话内标记集合，0.1 秒去重
// - sync: 与宿主时间线的导出 / 清空

pub mod color;
pub mod store;
pub mod sync;

pub use store::{Marker, MarkerStore, SharedMarkerStore};
pub use sync::{describe_sync, MarkerSyncBridge, SyncResult};
