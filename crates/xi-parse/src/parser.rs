//! 解析核心: 模式无关的帧善后与状态簿记.
//!
//! push / pull 两种驱动共享这里的逻辑: 为切出的帧补齐时间信息、
//! 更新码率统计与时间-字节索引、做段裁剪后交给消费者, 以及
//! 反向播放的片段重组 (时间戳回填 + 关键帧分组倒序下发).

use bytes::Bytes;
use xi_core::time::to_seconds;
use xi_core::{XiError, XiResult};

use crate::bitrate::BitrateEstimator;
use crate::consumer::{Consumer, Downstream};
use crate::detector::FrameDetector;
use crate::flow::{FlowStatus, FrameFlow};
use crate::frame::{Frame, FrameFlags};
use crate::index::TimeByteIndex;
use crate::scanner::{ScanOutcome, Scanner};
use crate::segment::SegmentController;

/// 模式无关的解析核心
pub struct ParserCore {
    pub(crate) scanner: Scanner,
    pub(crate) segment: SegmentController,
    pub(crate) bitrate: BitrateEstimator,
    pub(crate) index: TimeByteIndex,

    /// 权威时长 (调用方声明或扫描所得)
    duration: Option<u64>,
    /// 按码率估算的时长, 权威值缺席时的次选
    estimated_duration: Option<u64>,
    /// 固定帧时长 (恒定帧率流), 探测器未给时长时的默认值
    frame_duration: Option<u64>,
    /// 下一帧的预期时间戳 (上一帧 pts + duration)
    next_pts: Option<u64>,

    frame_count: u64,
    upstream_size: Option<u64>,
    /// 上游可随机访问
    seekable: bool,
    /// 流可在任意位置重新同步 (否则拒绝 seek)
    syncable: bool,
    /// 当前位置是从流头连续扫描而来 (索引条目只在此时可信)
    exact_position: bool,

    first_frame_offset: Option<u64>,
    first_frame_pts: Option<u64>,

    /// Queue 去向的帧, 等待下一个 Emit 一起下发
    queued: Vec<Frame>,

    /// 反向播放: 上个片段头部收集的散字节, 拼到更早片段的尾部
    frag_pending: Vec<Bytes>,
    /// 反向播放: 等待关键帧分组下发的帧 (文件顺序)
    queued_rev: Vec<Frame>,
    /// 反向播放: 已知最早的时间戳, 回填的基准
    rev_last_pts: Option<u64>,
}

impl ParserCore {
    pub fn new(detector: Box<dyn FrameDetector>, key_aware: bool) -> Self {
        Self {
            scanner: Scanner::new(detector),
            segment: SegmentController::new(key_aware),
            bitrate: BitrateEstimator::new(),
            index: TimeByteIndex::new(),
            duration: None,
            estimated_duration: None,
            frame_duration: None,
            next_pts: Some(0),
            frame_count: 0,
            upstream_size: None,
            seekable: false,
            syncable: true,
            exact_position: true,
            first_frame_offset: None,
            first_frame_pts: None,
            queued: Vec::new(),
            frag_pending: Vec::new(),
            queued_rev: Vec::new(),
            rev_last_pts: None,
        }
    }

    /// 声明上游能力, 据此配置索引
    pub fn configure_upstream(&mut self, seekable: bool, size: Option<u64>) {
        self.seekable = seekable;
        self.upstream_size = size;
        self.index.configure(seekable, size);
    }

    /// 恒定帧率流: 声明每帧固定时长
    pub fn set_frame_duration(&mut self, duration: u64) {
        self.frame_duration = Some(duration);
    }

    /// 声明权威时长, 压过一切估算
    pub fn set_duration(&mut self, duration: u64) {
        self.duration = Some(duration);
    }

    /// 声明权威平均码率
    pub fn set_average_bitrate(&mut self, bitrate: u32) {
        self.bitrate.set_average_bitrate(bitrate);
    }

    /// 流不可任意位置同步时关闭, seek 将被拒绝
    pub fn set_syncable(&mut self, syncable: bool) {
        self.syncable = syncable;
    }

    pub fn syncable(&self) -> bool {
        self.syncable
    }

    pub fn seekable(&self) -> bool {
        self.seekable
    }

    pub fn upstream_size(&self) -> Option<u64> {
        self.upstream_size
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn first_frame_offset(&self) -> Option<u64> {
        self.first_frame_offset
    }

    pub fn first_frame_pts(&self) -> Option<u64> {
        self.first_frame_pts
    }

    /// 当前已知的最佳时长 (权威值优先, 其次码率估算)
    pub fn duration(&self) -> Option<u64> {
        self.duration.or(self.estimated_duration)
    }

    /// 估算的平均码率 (bit/s)
    pub fn avg_bitrate(&self) -> Option<u32> {
        self.bitrate.avg_bitrate()
    }

    /// 设置下一帧的预期时间戳 (上游带时间的输入块、seek 落点)
    pub fn set_next_pts(&mut self, pts: Option<u64>) {
        self.next_pts = pts;
    }

    pub(crate) fn set_exact_position(&mut self, exact: bool) {
        self.exact_position = exact;
    }

    /// 为一帧补齐时间信息并完成统计簿记 (正反向共用)
    fn attach_timing(&mut self, frame: &mut Frame) {
        if frame.pts.is_none() && !self.segment.segment.is_reverse() {
            frame.pts = self.next_pts;
        }
        if frame.duration.is_none() {
            frame.duration = self.frame_duration;
        }
        self.next_pts = match (frame.pts, frame.duration) {
            (Some(pts), Some(dur)) => Some(pts + dur),
            _ => None,
        };
        if self.first_frame_offset.is_none() {
            self.first_frame_offset = Some(frame.offset);
            self.first_frame_pts = frame.pts;
        }
        let counted = !frame.flags.contains(FrameFlags::NO_COUNT);
        self.bitrate.observe(frame.size(), frame.duration, counted);
        self.frame_count += 1;
        if self.bitrate.estimate_due() {
            if let Some(size) = self.upstream_size {
                if self.duration.is_none() {
                    self.estimated_duration = self.bitrate.estimated_duration(size);
                    if let Some(d) = self.estimated_duration {
                        log::debug!("估算时长更新: {:.3}s", to_seconds(d));
                    }
                }
            }
        }
        if self.seekable && self.exact_position {
            if let Some(pts) = frame.pts {
                self.index.insert(pts, frame.offset, frame.is_key());
            }
        }
    }

    /// 正向路径: 帧善后并按去向下发
    pub fn finish_frame(
        &mut self,
        mut frame: Frame,
        flow: FrameFlow,
        consumer: &mut dyn Consumer,
    ) -> XiResult<FlowStatus> {
        self.attach_timing(&mut frame);
        match flow {
            FrameFlow::Drop => Ok(FlowStatus::Ok),
            FrameFlow::EndOfSegment => Ok(FlowStatus::EndOfSegment),
            FrameFlow::Queue => {
                self.queued.push(frame);
                Ok(FlowStatus::Ok)
            }
            FrameFlow::Emit => {
                let mut status = FlowStatus::Ok;
                for queued in std::mem::take(&mut self.queued) {
                    status = self.emit_one(queued, consumer)?;
                    if status == FlowStatus::EndOfSegment {
                        return Ok(status);
                    }
                }
                let s = self.emit_one(frame, consumer)?;
                if s != FlowStatus::Ok {
                    status = s;
                }
                Ok(status)
            }
        }
    }

    /// 下发暂存的 Queue 帧 (流结束时兜底)
    pub fn flush_queued(&mut self, consumer: &mut dyn Consumer) -> XiResult<FlowStatus> {
        let mut status = FlowStatus::Ok;
        for frame in std::mem::take(&mut self.queued) {
            status = self.emit_one(frame, consumer)?;
            if status == FlowStatus::EndOfSegment {
                break;
            }
        }
        Ok(status)
    }

    /// 段裁剪后交给消费者
    fn emit_one(&mut self, frame: Frame, consumer: &mut dyn Consumer) -> XiResult<FlowStatus> {
        match self.segment.clip(&frame) {
            FrameFlow::Drop => {
                log::trace!(
                    "段外丢帧: pts={:?} offset={}",
                    frame.pts.map(to_seconds),
                    frame.offset
                );
                Ok(FlowStatus::Ok)
            }
            FrameFlow::EndOfSegment => Ok(FlowStatus::EndOfSegment),
            _ => {
                if let Some(pts) = frame.pts {
                    self.segment.advance(pts);
                }
                match consumer.accept(frame) {
                    Ok(()) => Ok(FlowStatus::Ok),
                    Err(Downstream::NotLinked) => Ok(FlowStatus::NotLinked),
                    Err(Downstream::EndOfSegment) => Ok(FlowStatus::EndOfSegment),
                    Err(Downstream::Fatal(msg)) => Err(XiError::Downstream(msg)),
                }
            }
        }
    }

    // ---- 反向播放 ----

    /// 处理一个完整片段: 排空扫描、时间戳回填、关键帧分组倒序下发
    ///
    /// 片段 = 两次数据断裂之间的连续字节. 上游按文件倒序送片段,
    /// 片段内字节仍为正序. 片段头部扫不出帧的散字节是更早片段
    /// 末尾截断帧的延续, 收集起来拼到下一个 (更早的) 片段尾部.
    pub(crate) fn finish_fragment(
        &mut self,
        consumer: &mut dyn Consumer,
        more_fragments: bool,
    ) -> XiResult<FlowStatus> {
        // 上个片段留下的尾巴接到本片段末尾
        for chunk in std::mem::take(&mut self.frag_pending) {
            self.scanner.feed(chunk);
        }
        // 片段内尚无帧时, 头部丢弃的字节要收集归还
        self.scanner.set_collect_skipped(true);
        let mut frag_frames: Vec<Frame> = Vec::new();
        loop {
            match self.scanner.scan(true)? {
                ScanOutcome::Frame(mut frame, flow) => {
                    self.scanner.set_collect_skipped(false);
                    if frame.duration.is_none() {
                        frame.duration = self.frame_duration;
                    }
                    let counted = !frame.flags.contains(FrameFlags::NO_COUNT);
                    self.bitrate.observe(frame.size(), frame.duration, counted);
                    self.frame_count += 1;
                    if !matches!(flow, FrameFlow::Drop) {
                        frag_frames.push(frame);
                    }
                }
                ScanOutcome::EndOfData => break,
                ScanOutcome::NeedMoreData => {
                    return Err(XiError::Internal("排空扫描不应要求更多数据".into()));
                }
            }
        }
        self.frag_pending = self.scanner.take_skipped();
        log::debug!(
            "片段处理: {} 帧, 遗留 {} 块散字节",
            frag_frames.len(),
            self.frag_pending.len()
        );

        // 时间戳回填: 从已知最早时间戳向前逐帧减时长
        for frame in frag_frames.iter_mut().rev() {
            if frame.pts.is_none() {
                if let (Some(base), Some(dur)) = (self.rev_last_pts, frame.duration) {
                    frame.pts = Some(base.saturating_sub(dur));
                }
            }
            if let Some(pts) = frame.pts {
                self.rev_last_pts = Some(pts);
            }
        }

        // 本片段在文件中位于已排队帧之前
        frag_frames.append(&mut self.queued_rev);
        self.queued_rev = frag_frames;

        self.release_reverse(consumer, !more_fragments)
    }

    /// 反向播放回填基准: 已知最早时间戳 (seek 落点的 stop)
    pub(crate) fn set_reverse_base(&mut self, pts: Option<u64>) {
        self.rev_last_pts = pts;
    }

    /// 反向播放当前已知的最早时间戳
    pub(crate) fn reverse_base(&self) -> Option<u64> {
        self.rev_last_pts
    }

    /// 声明的固定帧时长
    pub fn frame_duration(&self) -> Option<u64> {
        self.frame_duration
    }

    /// 按关键帧分组, 组间倒序、组内正序下发
    ///
    /// 首个关键帧之前的 delta 帧继续等更早的片段; `last` 为真
    /// (不会再有片段) 时这些帧无法解码, 丢弃.
    fn release_reverse(&mut self, consumer: &mut dyn Consumer, last: bool) -> XiResult<FlowStatus> {
        let first_key = self.queued_rev.iter().position(Frame::is_key);
        let Some(first_key) = first_key else {
            if last {
                self.queued_rev.clear();
            }
            return Ok(FlowStatus::Ok);
        };
        let releasable = self.queued_rev.split_off(first_key);
        if last {
            self.queued_rev.clear();
        }

        // 每组以关键帧开头
        let mut groups: Vec<Vec<Frame>> = Vec::new();
        for frame in releasable {
            if frame.is_key() || groups.is_empty() {
                groups.push(Vec::new());
            }
            if let Some(last_group) = groups.last_mut() {
                last_group.push(frame);
            }
        }

        let mut status = FlowStatus::Ok;
        let mut first_of_batch = true;
        for group in groups.into_iter().rev() {
            for mut frame in group {
                if first_of_batch {
                    frame.flags |= FrameFlags::DISCONT;
                    first_of_batch = false;
                } else {
                    frame.flags -= FrameFlags::DISCONT;
                }
                status = self.emit_one(frame, consumer)?;
                if status == FlowStatus::EndOfSegment {
                    return Ok(status);
                }
            }
        }
        Ok(status)
    }

    /// 反向播放是否还有囤积未下发的帧或散字节
    pub(crate) fn has_reverse_backlog(&self) -> bool {
        !self.queued_rev.is_empty() || !self.frag_pending.is_empty()
    }

    /// 丢弃所有在途数据, 保留统计与位置 (flush 用)
    pub(crate) fn reset_inflight(&mut self) {
        self.scanner.clear_pending();
        self.queued.clear();
        self.queued_rev.clear();
        self.frag_pending.clear();
    }

    /// 重定位到新偏移, 丢掉所有在途状态
    pub(crate) fn reposition(&mut self, offset: u64, next_pts: Option<u64>, exact: bool) {
        self.scanner.reposition(offset);
        self.queued.clear();
        self.queued_rev.clear();
        self.frag_pending.clear();
        self.next_pts = next_pts;
        self.rev_last_pts = None;
        self.exact_position = exact;
    }
}
