// 进度流解析
//
// `GET /progress` 以文本帧推送进度，每条记录形如 `data:<整数>`，记录之间以空行分隔。
// 网络分块与记录边界无关，一条记录可能被拆到两个分块中，因此按字节缓冲到完整记录再解析。

use std::sync::atomic::{AtomicU8, Ordering};
use tracing::debug;

/// 进度回调类型：(progress: 0-100)
pub type ProgressCallback = Box<dyn Fn(u8) + Send + Sync>;

const RECORD_SEPARATOR: &[u8] = b"\n\n";

/// 未完成记录的缓冲上限 (字节)
pub const MAX_PENDING_BYTES: usize = 4096;

/// 增量解析器
#[derive(Debug, Default)]
pub struct ProgressParser {
    buffer: Vec<u8>,
    /// 超长行被丢弃后，跳过该行剩余的字节直到换行
    skipping_line: bool,
}

impl ProgressParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// 输入一个分块，返回本分块内解析出的最后一个进度值
    pub fn feed(&mut self, chunk: &[u8]) -> Option<u8> {
        let mut chunk = chunk;
        if self.skipping_line {
            match chunk.iter().position(|b| *b == b'\n') {
                Some(pos) => {
                    chunk = &chunk[pos + 1..];
                    self.skipping_line = false;
                }
                None => return None,
            }
        }
        self.buffer.extend(chunk.iter().copied().filter(|b| *b != b'\r'));

        let mut latest = None;
        while let Some(end) = find_separator(&self.buffer) {
            let record: Vec<u8> = self.buffer.drain(..end + RECORD_SEPARATOR.len()).collect();
            if let Some(value) = parse_record(&String::from_utf8_lossy(&record)) {
                latest = Some(value);
            }
        }
        self.trim_pending().or(latest)
    }

    /// 流结束时解析缓冲中剩余的不完整记录
    pub fn finish(&mut self) -> Option<u8> {
        self.skipping_line = false;
        let rest = std::mem::take(&mut self.buffer);
        parse_record(&String::from_utf8_lossy(&rest))
    }

    /// 缓冲超过上限时，先解析并移出已完整的行，仍超限则丢弃正在接收的行
    fn trim_pending(&mut self) -> Option<u8> {
        if self.buffer.len() <= MAX_PENDING_BYTES {
            return None;
        }

        let complete = self
            .buffer
            .iter()
            .rposition(|b| *b == b'\n')
            .map(|pos| pos + 1)
            .unwrap_or(0);
        let lines: Vec<u8> = self.buffer.drain(..complete).collect();
        let latest = parse_record(&String::from_utf8_lossy(&lines));

        if self.buffer.len() > MAX_PENDING_BYTES {
            debug!("[JOBS] 进度流单行超过 {} 字节，丢弃", MAX_PENDING_BYTES);
            self.buffer.clear();
            self.skipping_line = true;
        }
        latest
    }
}

fn find_separator(buffer: &[u8]) -> Option<usize> {
    buffer
        .windows(RECORD_SEPARATOR.len())
        .position(|window| window == RECORD_SEPARATOR)
}

/// 解析一条记录，`data:` 前缀可选，非整数行忽略，取记录内最后一个值
pub fn parse_record(record: &str) -> Option<u8> {
    record
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            let value = line.strip_prefix("data:").unwrap_or(line).trim();
            value.parse::<i64>().ok()
        })
        .last()
        .map(|v| v.clamp(0, 100) as u8)
}

/// 当前进度，只保留最近一次解析出的值
pub struct ProgressTracker {
    current: AtomicU8,
    callback: Option<ProgressCallback>,
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self {
            current: AtomicU8::new(0),
            callback: None,
        }
    }

    pub fn with_callback(callback: ProgressCallback) -> Self {
        Self {
            current: AtomicU8::new(0),
            callback: Some(callback),
        }
    }

    pub fn current(&self) -> u8 {
        self.current.load(Ordering::SeqCst)
    }

    pub fn update(&self, value: u8) {
        self.current.store(value, Ordering::SeqCst);
        debug!("[JOBS] 进度: {}%", value);
        if let Some(ref cb) = self.callback {
            cb(value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_keeps_last_value_in_frame() {
        let mut parser = ProgressParser::new();
        assert_eq!(parser.feed(b"data:10\n\ndata:20\n\n"), Some(20));
    }

    #[test]
    fn test_record_split_across_chunks() {
        let mut parser = ProgressParser::new();
        assert_eq!(parser.feed(b"data:4"), None);
        assert_eq!(parser.feed(b"2\n"), None);
        assert_eq!(parser.feed(b"\ndata:5"), Some(42));
        assert_eq!(parser.finish(), Some(5));
    }

    #[test]
    fn test_crlf_and_clamping() {
        let mut parser = ProgressParser::new();
        assert_eq!(parser.feed(b"data: 150\r\n\r\n"), Some(100));
        assert_eq!(parser.feed(b"data:-3\n\n"), Some(0));
    }

    #[test]
    fn test_buffer_bounded_without_separator() {
        let mut parser = ProgressParser::new();
        let noise = vec![b'x'; 1024];
        for _ in 0..64 {
            assert_eq!(parser.feed(&noise), None);
            assert!(parser.buffer.len() <= MAX_PENDING_BYTES);
        }
        // 超长行剩余部分跳过到换行，后面的记录照常解析
        assert_eq!(parser.feed(b"123\ndata:40\n\n"), Some(40));
        assert!(parser.buffer.is_empty());
    }

    #[test]
    fn test_lines_without_blank_separator_stay_bounded() {
        let mut parser = ProgressParser::new();
        let mut seen = None;
        for i in 0..2000 {
            if let Some(value) = parser.feed(format!("data:{}\n", i % 100).as_bytes()) {
                seen = Some(value);
            }
            assert!(parser.buffer.len() <= MAX_PENDING_BYTES);
        }
        assert!(seen.is_some());
        assert_eq!(parser.finish(), Some(99));
    }

    #[test]
    fn test_bare_integers_and_noise() {
        assert_eq!(parse_record("77"), Some(77));
        assert_eq!(parse_record(": keep-alive"), None);
        assert_eq!(parse_record("event: progress\ndata:12"), Some(12));
        assert_eq!(parse_record("data:abc"), None);
    }

    #[test]
    fn test_tracker_invokes_callback() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let tracker = ProgressTracker::with_callback(Box::new(move |v| sink.lock().unwrap().push(v)));

        tracker.update(30);
        tracker.update(60);
        assert_eq!(tracker.current(), 60);
        assert_eq!(*seen.lock().unwrap(), vec![30, 60]);
    }
}
