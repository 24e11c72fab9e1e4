//! 时间-字节稀疏索引.
//!
//! 对标 GstBaseParse 的内部 index: 解析过程中记录 (时间戳, 字节偏移)
//! 对, 供 seek 精确定位. 条目按时间与字节双重间隔稀疏化,
//! 上限约 4096 条, 大文件自动拉大字节间隔.

use xi_core::time::{to_seconds, MSECOND, SECOND};

/// 索引条目数上限, 超出后按字节间隔稀疏化
const MAX_INDEX_ENTRIES: u64 = 4096;

/// 一条索引记录
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexEntry {
    /// 字节偏移
    pub offset: u64,
    /// 时间戳 (纳秒)
    pub ts: u64,
    /// 该位置是否关键帧
    pub key: bool,
}

/// 时间-字节稀疏索引
#[derive(Debug)]
pub struct TimeByteIndex {
    entries: Vec<IndexEntry>,
    /// 源可随机访问时才接受插入
    seekable: bool,
    /// 相邻条目的最小时间间隔
    ts_interval: u64,
    /// 相邻条目的最小字节间隔
    byte_interval: u64,
    last_offset: u64,
    last_ts: Option<u64>,
}

impl Default for TimeByteIndex {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            seekable: false,
            ts_interval: SECOND,
            byte_interval: 0,
            last_offset: 0,
            last_ts: None,
        }
    }
}

impl TimeByteIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// 按源能力与总大小配置稀疏间隔
    ///
    /// 小流记得密一些, 大流拉开间隔把条目数压在上限内.
    pub fn configure(&mut self, seekable: bool, size: Option<u64>) {
        self.seekable = seekable;
        let size = size.unwrap_or(0);
        self.ts_interval = if size < 10 * 1024 * 1024 {
            100 * MSECOND
        } else if size < 100 * 1024 * 1024 {
            500 * MSECOND
        } else {
            SECOND
        };
        self.byte_interval = size / MAX_INDEX_ENTRIES;
        log::debug!(
            "索引配置: seekable={} ts_interval={:.3}s byte_interval={}",
            seekable,
            to_seconds(self.ts_interval),
            self.byte_interval
        );
    }

    /// 记录一个 (时间戳, 偏移) 对
    ///
    /// 返回是否真正入表. 非可 seek 源、时间回退、与上一条过近
    /// 的插入都被拒绝.
    pub fn insert(&mut self, ts: u64, offset: u64, key: bool) -> bool {
        if !self.seekable {
            return false;
        }
        if let Some(last_ts) = self.last_ts {
            if ts < last_ts {
                // 时间回退, 索引要求单调
                return false;
            }
            if ts - last_ts < self.ts_interval {
                return false;
            }
            // 偏移必须严格递增, 字节间隔另算
            if offset <= self.last_offset {
                return false;
            }
            if offset - self.last_offset < self.byte_interval {
                return false;
            }
        }
        self.entries.push(IndexEntry { offset, ts, key });
        self.last_offset = offset;
        self.last_ts = Some(ts);
        true
    }

    /// 查找时间戳 `ts` 的近邻条目
    ///
    /// `before` 为真取不晚于 `ts` 的最后一条 (seek 的安全起点),
    /// 否则取不早于 `ts` 的第一条. 返回 (偏移, 时间戳).
    pub fn lookup(&self, ts: u64, before: bool) -> Option<(u64, u64)> {
        let idx = self.entries.partition_point(|e| e.ts <= ts);
        let entry = if before {
            idx.checked_sub(1).map(|i| self.entries[i])
        } else if idx < self.entries.len() {
            Some(self.entries[idx])
        } else {
            None
        }?;
        Some((entry.offset, entry.ts))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.last_offset = 0;
        self.last_ts = None;
    }
}
