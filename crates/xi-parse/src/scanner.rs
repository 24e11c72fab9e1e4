//! 帧扫描器.
//!
//! 对标 GstBaseParse 的 scan_for_frame 主循环: 维护探测窗口,
//! 驱动探测器在累积数据上滑动, 处理跳字节重同步、探测窗口增长、
//! 排空 (drain) 语义, 并内置两道防御:
//!
//! - 饥饿防护: 探测器拒绝给出跳字节数时按最小步长 1 推进;
//! - 重同步上限: 自上次同步点丢弃超过 2 MiB 仍无帧则判定致命.

use bytes::Bytes;
use xi_core::{XiError, XiResult};

use crate::adapter::Adapter;
use crate::detector::{FrameCheck, FrameDetector};
use crate::flow::FrameFlow;
use crate::frame::{Frame, FrameFlags};
use crate::source::Source;

/// 自同步点起允许丢弃的最大字节数
const RESYNC_LIMIT: u64 = 2 * 1024 * 1024;

/// pull 模式单次预取的最小块
const PULL_CHUNK: usize = 64 * 1024;

/// 一次扫描推进的结果
#[derive(Debug)]
pub enum ScanOutcome {
    /// 切出一帧, 附带探测器给出的去向
    Frame(Frame, FrameFlow),
    /// 数据不足, 等待下一块输入
    NeedMoreData,
    /// 数据已耗尽 (仅 drain / pull 末尾出现)
    EndOfData,
}

/// 帧扫描器
pub struct Scanner {
    adapter: Adapter,
    detector: Box<dyn FrameDetector>,
    /// 累积器首字节的流内绝对偏移
    offset: u64,
    /// 最近一次同步点 (上一帧末尾或重定位点)
    sync_offset: u64,
    /// 下一帧需打上 DISCONT
    discont: bool,
    /// 当前探测窗口大小, 帧间重置为探测器最小值
    fsize: usize,
    /// 跨输入块顺延的待跳字节数
    pending_skip: usize,
    /// 为真时被丢弃的字节收集到 `skipped` 而非直接扔掉 (反向播放用)
    collect_skipped: bool,
    skipped: Vec<Bytes>,
    /// pull 模式已读到源末尾
    pull_drained: bool,
}

impl Scanner {
    pub fn new(detector: Box<dyn FrameDetector>) -> Self {
        let fsize = detector.min_frame_size().max(1);
        Self {
            adapter: Adapter::new(),
            detector,
            offset: 0,
            sync_offset: 0,
            discont: true,
            fsize,
            pending_skip: 0,
            collect_skipped: false,
            skipped: Vec::new(),
            pull_drained: false,
        }
    }

    /// 当前扫描位置 (累积器首字节的绝对偏移)
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// 累积器中待扫描的字节数
    pub fn available(&self) -> usize {
        self.adapter.available()
    }

    /// pull 模式是否已触到源末尾
    pub fn pull_drained(&self) -> bool {
        self.pull_drained
    }

    /// 喂入一块输入数据, 先兑现遗留的跳字节量
    pub fn feed(&mut self, mut data: Bytes) {
        if self.pending_skip > 0 {
            let cut = self.pending_skip.min(data.len());
            let head = data.split_to(cut);
            if self.collect_skipped {
                self.skipped.push(head);
            }
            self.pending_skip -= cut;
            self.offset += cut as u64;
        }
        self.adapter.push(data);
    }

    /// 开关丢弃字节收集 (反向播放时片段头部的散字节要归还给更早的片段)
    pub fn set_collect_skipped(&mut self, on: bool) {
        self.collect_skipped = on;
    }

    /// 取走已收集的丢弃字节
    pub fn take_skipped(&mut self) -> Vec<Bytes> {
        std::mem::take(&mut self.skipped)
    }

    /// 丢弃累积器中剩余的全部数据 (不计入重同步统计)
    ///
    /// 之后切出的第一帧带 DISCONT.
    pub fn clear_pending(&mut self) {
        let n = self.adapter.available() as u64;
        self.adapter.clear();
        self.offset += n;
        self.sync_offset = self.offset;
        self.pending_skip = 0;
        self.discont = true;
    }

    /// 重定位到新的流偏移, 清空所有扫描状态
    pub fn reposition(&mut self, offset: u64) {
        self.adapter.clear();
        self.offset = offset;
        self.sync_offset = offset;
        self.discont = true;
        self.fsize = self.detector.min_frame_size().max(1);
        self.pending_skip = 0;
        self.skipped.clear();
        self.pull_drained = false;
    }

    /// push 模式扫描推进一步
    ///
    /// `drain` 为真表示不会再有输入, 窗口按剩余数据截断,
    /// 探测器需就地给出最终结论.
    pub fn scan(&mut self, drain: bool) -> XiResult<ScanOutcome> {
        loop {
            let available = self.adapter.available();
            if available == 0 {
                return Ok(if drain {
                    ScanOutcome::EndOfData
                } else {
                    ScanOutcome::NeedMoreData
                });
            }
            let probe = if drain {
                self.fsize.min(available)
            } else {
                if available < self.fsize {
                    return Ok(ScanOutcome::NeedMoreData);
                }
                self.fsize
            };
            let window = self.adapter.peek(probe)?;
            match self.detector.check(window, drain) {
                FrameCheck::Invalid { skip } => {
                    // 饥饿防护: 最小步长 1, 保证扫描永远向前
                    let skip = skip.unwrap_or(1).max(1);
                    let now = skip.min(available);
                    self.pending_skip = skip - now;
                    self.discard(now)?;
                    self.fsize = self.detector.min_frame_size().max(1);
                }
                FrameCheck::Valid { skip, size } => {
                    if size == 0 {
                        return Err(XiError::InvalidData("探测器报告零长度帧".into()));
                    }
                    let need = skip + size;
                    if need > available {
                        if drain {
                            // 尾部截断帧, 放弃剩余数据
                            self.discard(available)?;
                            return Ok(ScanOutcome::EndOfData);
                        }
                        if need <= self.fsize {
                            return Err(XiError::NoProgress);
                        }
                        self.fsize = need;
                        return Ok(ScanOutcome::NeedMoreData);
                    }
                    if skip > 0 {
                        self.discard(skip)?;
                    }
                    let frame_offset = self.offset;
                    let data = self.adapter.take(size)?;
                    self.offset += size as u64;
                    self.sync_offset = self.offset;
                    self.fsize = self.detector.min_frame_size().max(1);
                    let mut frame = Frame::new(data, frame_offset);
                    if self.discont {
                        frame.flags |= FrameFlags::DISCONT;
                        self.discont = false;
                    }
                    let flow = self.detector.on_confirmed(&mut frame)?;
                    return Ok(ScanOutcome::Frame(frame, flow));
                }
            }
        }
    }

    /// pull 模式扫描推进一步, 数据不足时主动从源预取
    pub fn scan_pull(&mut self, source: &mut dyn Source) -> XiResult<ScanOutcome> {
        loop {
            match self.scan(self.pull_drained)? {
                ScanOutcome::NeedMoreData => {
                    let available = self.adapter.available();
                    let want = self.fsize.saturating_sub(available).max(PULL_CHUNK);
                    let data = source.read_range(self.offset + available as u64, want)?;
                    if data.len() < want {
                        self.pull_drained = true;
                    }
                    if data.is_empty() && available == 0 {
                        return Ok(ScanOutcome::EndOfData);
                    }
                    self.feed(data);
                }
                other => return Ok(other),
            }
        }
    }

    /// 丢弃 `n` 字节并做重同步记账
    fn discard(&mut self, n: usize) -> XiResult<()> {
        if n == 0 {
            return Ok(());
        }
        self.discont = true;
        if self.collect_skipped {
            let data = self.adapter.take(n)?;
            self.skipped.push(data);
        } else {
            self.adapter.flush(n)?;
        }
        self.offset += n as u64;
        let scanned = self.offset - self.sync_offset;
        if scanned > RESYNC_LIMIT {
            log::error!("重同步失败: 自偏移 {} 起已丢弃 {} 字节", self.sync_offset, scanned);
            return Err(XiError::ResyncOverflow(scanned));
        }
        if scanned > 0 {
            log::trace!("重同步中: 偏移 {} 已丢弃 {} 字节", self.offset, scanned);
        }
        Ok(())
    }
}

impl std::fmt::Debug for Scanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scanner")
            .field("offset", &self.offset)
            .field("sync_offset", &self.sync_offset)
            .field("available", &self.adapter.available())
            .field("fsize", &self.fsize)
            .field("discont", &self.discont)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemorySource;

    /// 测试探测器: 帧为 [0xA5, 序号, 0, 0] 四字节
    struct TestDetector;

    impl FrameDetector for TestDetector {
        fn min_frame_size(&self) -> usize {
            1
        }

        fn check(&mut self, window: &[u8], _drain: bool) -> FrameCheck {
            if window[0] == 0xA5 {
                FrameCheck::Valid { skip: 0, size: 4 }
            } else {
                FrameCheck::Invalid { skip: None }
            }
        }
    }

    fn frame_bytes(idx: u8) -> Vec<u8> {
        vec![0xA5, idx, 0, 0]
    }

    #[test]
    fn test_连续帧切分() {
        let mut s = Scanner::new(Box::new(TestDetector));
        let mut data = frame_bytes(0);
        data.extend(frame_bytes(1));
        s.feed(Bytes::from(data));
        let ScanOutcome::Frame(f0, _) = s.scan(false).unwrap() else {
            panic!("应切出帧");
        };
        assert_eq!(f0.offset, 0);
        assert_eq!(f0.data[1], 0);
        // 首帧带 DISCONT, 次帧不带
        assert!(f0.flags.contains(FrameFlags::DISCONT));
        let ScanOutcome::Frame(f1, _) = s.scan(false).unwrap() else {
            panic!("应切出帧");
        };
        assert_eq!(f1.offset, 4);
        assert!(!f1.flags.contains(FrameFlags::DISCONT));
    }

    #[test]
    fn test_垃圾字节重同步() {
        let mut s = Scanner::new(Box::new(TestDetector));
        let mut data = vec![0x00, 0x11, 0x22];
        data.extend(frame_bytes(7));
        s.feed(Bytes::from(data));
        let ScanOutcome::Frame(f, _) = s.scan(false).unwrap() else {
            panic!("应切出帧");
        };
        assert_eq!(f.offset, 3);
        assert_eq!(f.data[1], 7);
        assert!(f.flags.contains(FrameFlags::DISCONT));
    }

    #[test]
    fn test_半帧等待更多数据() {
        let mut s = Scanner::new(Box::new(TestDetector));
        s.feed(Bytes::from_static(&[0xA5, 3]));
        assert!(matches!(s.scan(false).unwrap(), ScanOutcome::NeedMoreData));
        s.feed(Bytes::from_static(&[0, 0]));
        assert!(matches!(s.scan(false).unwrap(), ScanOutcome::Frame(..)));
    }

    #[test]
    fn test_drain_丢弃截断尾帧() {
        let mut s = Scanner::new(Box::new(TestDetector));
        let mut data = frame_bytes(1);
        data.extend([0xA5, 9]); // 只有半个尾帧
        s.feed(Bytes::from(data));
        assert!(matches!(s.scan(true).unwrap(), ScanOutcome::Frame(..)));
        assert!(matches!(s.scan(true).unwrap(), ScanOutcome::EndOfData));
        assert_eq!(s.available(), 0);
    }

    #[test]
    fn test_重同步超限() {
        let mut s = Scanner::new(Box::new(TestDetector));
        // 超过 2 MiB 的垃圾
        s.feed(Bytes::from(vec![0u8; (RESYNC_LIMIT + 16) as usize]));
        let err = s.scan(false).unwrap_err();
        assert!(matches!(err, XiError::ResyncOverflow(_)));
    }

    #[test]
    fn test_pull_模式自动预取() {
        let mut stream = Vec::new();
        for i in 0..10u8 {
            stream.extend(frame_bytes(i));
        }
        let mut src = MemorySource::new(stream);
        let mut s = Scanner::new(Box::new(TestDetector));
        for i in 0..10u8 {
            let ScanOutcome::Frame(f, _) = s.scan_pull(&mut src).unwrap() else {
                panic!("应切出帧 {i}");
            };
            assert_eq!(f.data[1], i);
        }
        assert!(matches!(s.scan_pull(&mut src).unwrap(), ScanOutcome::EndOfData));
    }

    #[test]
    fn test_收集丢弃字节() {
        let mut s = Scanner::new(Box::new(TestDetector));
        s.set_collect_skipped(true);
        let mut data = vec![0x01, 0x02];
        data.extend(frame_bytes(5));
        s.feed(Bytes::from(data));
        assert!(matches!(s.scan(false).unwrap(), ScanOutcome::Frame(..)));
        let skipped = s.take_skipped();
        let total: usize = skipped.iter().map(|b| b.len()).sum();
        assert_eq!(total, 2);
    }

    #[test]
    fn test_reposition_清空状态() {
        let mut s = Scanner::new(Box::new(TestDetector));
        s.feed(Bytes::from(frame_bytes(1)));
        s.reposition(1000);
        assert_eq!(s.available(), 0);
        assert_eq!(s.offset(), 1000);
        s.feed(Bytes::from(frame_bytes(2)));
        let ScanOutcome::Frame(f, _) = s.scan(false).unwrap() else {
            panic!("应切出帧");
        };
        assert_eq!(f.offset, 1000);
        assert!(f.flags.contains(FrameFlags::DISCONT));
    }
}
