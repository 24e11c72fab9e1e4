//! 播放段与段控制器.
//!
//! 段 (segment) 描述当前希望播放的时间/字节区间与速率,
//! 段控制器据此对帧做裁剪, 并维护 flush/drain 生命周期状态.

use xi_core::time::to_seconds;

use crate::flow::FrameFlow;
use crate::frame::{Frame, FrameFlags};

/// 段所使用的度量格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// 纳秒时间
    Time,
    /// 字节偏移
    Bytes,
}

/// 播放段
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub format: Format,
    /// 播放速率, 负值表示反向
    pub rate: f64,
    /// 段起点 (含)
    pub start: u64,
    /// 段终点 (不含), None 表示播到尽头
    pub stop: Option<u64>,
    /// 当前播放位置
    pub position: Option<u64>,
}

impl Segment {
    /// 覆盖整条流的默认时间段
    pub fn new_time() -> Self {
        Self {
            format: Format::Time,
            rate: 1.0,
            start: 0,
            stop: None,
            position: Some(0),
        }
    }

    /// 以 seek 结果更新段边界
    pub fn do_seek(&mut self, rate: f64, start: u64, stop: Option<u64>) {
        self.rate = rate;
        self.start = start;
        self.stop = stop;
        // 正向从起点继续, 反向从终点继续
        self.position = if rate >= 0.0 { Some(start) } else { stop };
    }

    /// 是否反向播放
    pub fn is_reverse(&self) -> bool {
        self.rate < 0.0
    }
}

/// 段控制器生命周期状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentState {
    /// 正常推进
    Normal,
    /// flush 进行中, 到来的数据一律丢弃
    Flushing,
    /// 流结束, 排空剩余缓冲
    Draining,
}

/// 段控制器
///
/// 对标 GstBaseParse 中围绕 `GstSegment` 的裁剪逻辑: 段外的帧
/// 被丢弃或触发段终点, 但对关键帧感知的流会保留段前最后一个
/// 关键帧之后的 delta 帧, 保证段起点可解码.
#[derive(Debug)]
pub struct SegmentController {
    pub segment: Segment,
    pub state: SegmentState,
    /// 是否已见到段内首个关键帧
    seen_key: bool,
    /// 流是否区分关键帧 (音频类流不区分, 裁剪更激进)
    key_aware: bool,
}

impl SegmentController {
    pub fn new(key_aware: bool) -> Self {
        Self {
            segment: Segment::new_time(),
            state: SegmentState::Normal,
            seen_key: false,
            key_aware,
        }
    }

    /// 替换当前段, 重置关键帧追踪
    pub fn replace(&mut self, segment: Segment) {
        log::debug!(
            "段更新: start={:.3}s stop={:?} rate={}",
            to_seconds(segment.start),
            segment.stop.map(to_seconds),
            segment.rate
        );
        self.segment = segment;
        self.seen_key = false;
        self.state = SegmentState::Normal;
    }

    /// 对一帧做段裁剪
    pub fn clip(&mut self, frame: &Frame) -> FrameFlow {
        let Some(pts) = frame.pts else {
            // 无时间戳的帧不裁剪
            return FrameFlow::Emit;
        };
        if !frame.flags.contains(FrameFlags::CLIP) {
            return FrameFlow::Emit;
        }
        if self.key_aware && frame.is_key() {
            self.seen_key = true;
        }
        if let Some(stop) = self.segment.stop {
            if pts >= stop {
                // 反向播放从 stop 一侧进入, 越界帧直接丢弃而非终止
                if self.segment.is_reverse() {
                    return FrameFlow::Drop;
                }
                return FrameFlow::EndOfSegment;
            }
        }
        let end = pts.saturating_add(frame.duration.unwrap_or(0));
        if end <= self.segment.start {
            // 段前的帧: 关键帧感知的流保留最后一组, 让段起点可解码
            if self.key_aware && self.seen_key {
                return FrameFlow::Emit;
            }
            return FrameFlow::Drop;
        }
        FrameFlow::Emit
    }

    /// 更新当前位置
    pub fn advance(&mut self, pts: u64) {
        self.segment.position = Some(pts);
    }
}
