//! push 模式驱动.
//!
//! 上游主动把数据块送进来 (网络流、管道), 解析器被动切帧.
//! seek 在本模式下无法自己动手: 把时间目标换算成字节偏移后
//! 作为 [`UpstreamSeek`] 返回给调用方, 由上游执行字节 seek,
//! 再通过后续的 BYTES 段通知与之配对, 还原出精确的时间段.

use xi_core::time::to_seconds;
use xi_core::{XiError, XiResult};

use bytes::Bytes;

use crate::consumer::Consumer;
use crate::detector::FrameDetector;
use crate::flow::FlowStatus;
use crate::parser::ParserCore;
use crate::scanner::ScanOutcome;
use crate::seek::{SeekRequest, SeekSpec, TARGET_DIFFERENCE};
use crate::segment::{Format, Segment, SegmentState};

/// 一块 push 输入
#[derive(Debug, Clone)]
pub struct InputChunk {
    pub data: Bytes,
    /// 上游已知的时间戳 (块首字节对应的 pts)
    pub pts: Option<u64>,
    /// 与上一块之间存在数据断裂
    pub discont: bool,
}

impl InputChunk {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            pts: None,
            discont: false,
        }
    }
}

/// 要求上游执行的字节 seek
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpstreamSeek {
    /// 目标字节偏移
    pub offset: u64,
    /// 是否要求上游先 flush
    pub flush: bool,
}

/// 待配对的 seek: 等上游以 BYTES 段确认落点
#[derive(Debug, Clone, Copy)]
struct PendingSeek {
    offset: u64,
    /// 请求的段起点时间 (裁剪边界)
    start: u64,
    /// 落点处已知的流时间 (时间戳递推锚点)
    start_ts: u64,
    stop: Option<u64>,
    accurate: bool,
}

/// push 模式解析器
pub struct PushParser {
    core: ParserCore,
    consumer: Box<dyn Consumer>,
    /// 是否收到过任何数据 (区分空流与未启动)
    ever_chained: bool,
    pending_seeks: Vec<PendingSeek>,
}

impl PushParser {
    pub fn new(detector: Box<dyn FrameDetector>, key_aware: bool, consumer: Box<dyn Consumer>) -> Self {
        Self {
            core: ParserCore::new(detector, key_aware),
            consumer,
            ever_chained: false,
            pending_seeks: Vec::new(),
        }
    }

    /// 解析核心 (能力声明、时长查询等都经由它)
    pub fn core(&self) -> &ParserCore {
        &self.core
    }

    pub fn core_mut(&mut self) -> &mut ParserCore {
        &mut self.core
    }

    /// 送入一块数据并尽可能切帧
    pub fn chain(&mut self, chunk: InputChunk) -> XiResult<FlowStatus> {
        if self.core.segment.state == SegmentState::Flushing {
            // flush 期间到达的数据一律丢弃
            return Ok(FlowStatus::Ok);
        }
        self.ever_chained = true;
        if self.core.segment.segment.is_reverse() {
            // 反向: 断裂标志切片段, 数据先囤着, 片段完整后统一处理
            if chunk.discont && self.core.scanner.available() > 0 {
                let status = self.core.finish_fragment(&mut *self.consumer, true)?;
                if status == FlowStatus::EndOfSegment {
                    return Ok(status);
                }
            }
            self.core.scanner.feed(chunk.data);
            return Ok(FlowStatus::Ok);
        }
        if chunk.discont {
            // 正向断裂: 半帧残渣作废, 下一帧带 DISCONT
            self.core.scanner.clear_pending();
        }
        if chunk.pts.is_some() && self.core.scanner.available() == 0 {
            // 块首对齐下一帧时才可信
            self.core.set_next_pts(chunk.pts);
        }
        self.core.scanner.feed(chunk.data);
        self.scan_loop(false)
    }

    /// 新段通知
    ///
    /// TIME 段直接替换裁剪边界; BYTES 段尝试与待配对 seek 按
    /// 偏移匹配, 命中则还原当初的时间段并重定位.
    pub fn segment(&mut self, segment: Segment) -> XiResult<()> {
        // 旧段残余数据先排空
        if self.core.scanner.available() > 0 {
            if self.core.segment.segment.is_reverse() {
                self.core.finish_fragment(&mut *self.consumer, true)?;
            } else {
                self.scan_loop(true)?;
            }
        }
        match segment.format {
            Format::Time => {
                if segment.is_reverse() {
                    self.core.set_reverse_base(segment.stop);
                }
                let start = segment.start;
                self.core.segment.replace(segment);
                // 时间戳递推重新锚定到新段起点, 旧基准不再可信
                self.core.scanner.clear_pending();
                self.core.set_next_pts(Some(start));
            }
            Format::Bytes => {
                let matched = self
                    .pending_seeks
                    .iter()
                    .position(|p| p.offset == segment.start);
                if let Some(i) = matched {
                    let pending = self.pending_seeks.remove(i);
                    log::debug!(
                        "BYTES 段配对成功: 偏移 {} -> 段起点 {:.3}s (落点 {:.3}s)",
                        pending.offset,
                        to_seconds(pending.start),
                        to_seconds(pending.start_ts)
                    );
                    // 段起点用请求的时间, 落点时间只作递推锚点
                    let mut time_segment = Segment::new_time();
                    time_segment.do_seek(segment.rate, pending.start, pending.stop);
                    self.core.segment.replace(time_segment);
                    self.core
                        .reposition(pending.offset, Some(pending.start_ts), pending.accurate);
                } else {
                    // 无配对记录: 上游自发的字节段, 按估算换时间
                    let start_ts = self.core.bitrate.bytes_to_time(segment.start).unwrap_or(0);
                    let mut time_segment = Segment::new_time();
                    time_segment.do_seek(segment.rate, start_ts, None);
                    self.core.segment.replace(time_segment);
                    self.core.reposition(segment.start, Some(start_ts), false);
                }
            }
        }
        Ok(())
    }

    /// flush 开始: 丢弃在途数据, 后续 chain 的数据直接扔掉
    pub fn flush_start(&mut self) {
        self.core.segment.state = SegmentState::Flushing;
        self.core.reset_inflight();
    }

    /// flush 结束: 恢复接收, 下一帧带断裂标志
    pub fn flush_stop(&mut self) {
        self.core.segment.state = SegmentState::Normal;
        self.core.reset_inflight();
    }

    /// 发起 seek
    ///
    /// 把时间目标解析成字节偏移, 记入待配对表并返回给上游执行.
    pub fn seek(&mut self, req: SeekRequest) -> XiResult<UpstreamSeek> {
        if req.rate < 0.0 {
            return Err(XiError::Unsupported("push 模式不支持反向 seek".into()));
        }
        if !self.core.syncable() {
            return Err(XiError::Unsupported("流不可重新同步, 无法 seek".into()));
        }
        let SeekSpec::Set(target) = req.start else {
            return Err(XiError::InvalidArgument("seek 缺少起点".into()));
        };
        if req.format == Format::Bytes {
            // 字节目标无需换算, 落点时间只能估
            let start_ts = self.core.bitrate.bytes_to_time(target).unwrap_or(0);
            let stop = match req.stop {
                SeekSpec::Set(bytes) => self.core.bitrate.bytes_to_time(bytes),
                SeekSpec::None => None,
            };
            self.pending_seeks.push(PendingSeek {
                offset: target,
                start: start_ts,
                start_ts,
                stop,
                accurate: false,
            });
            return Ok(UpstreamSeek {
                offset: target,
                flush: req.flush,
            });
        }
        let (offset, start_ts, accurate) = if target == 0 {
            (0, 0, true)
        } else if let Some((offset, idx_ts)) = self.core.index.lookup(target, true) {
            // 索引命中: 落点时间精确已知
            let accurate = req.accurate && target <= idx_ts + TARGET_DIFFERENCE;
            (offset, idx_ts, accurate)
        } else if let Some(offset) = self.core.bitrate.time_to_bytes(target) {
            (offset, target, false)
        } else {
            return Err(XiError::Unsupported(
                "无码率信息, 无法把时间换算为字节".into(),
            ));
        };
        let stop = match req.stop {
            SeekSpec::Set(ts) => Some(ts),
            SeekSpec::None => None,
        };
        self.pending_seeks.push(PendingSeek {
            offset,
            start: target,
            start_ts,
            stop,
            accurate,
        });
        log::info!(
            "push seek: 目标 {:.3}s -> 偏移 {} (精确={})",
            to_seconds(target),
            offset,
            accurate
        );
        Ok(UpstreamSeek {
            offset,
            flush: req.flush,
        })
    }

    /// 流结束: 排空缓冲, 下发所有能下发的帧
    pub fn end_of_stream(&mut self) -> XiResult<FlowStatus> {
        self.core.segment.state = SegmentState::Draining;
        if self.core.segment.segment.is_reverse() {
            if self.core.scanner.available() > 0 || self.core.has_reverse_backlog() {
                self.core.finish_fragment(&mut *self.consumer, false)?;
            }
        } else {
            self.scan_loop(true)?;
            self.core.flush_queued(&mut *self.consumer)?;
        }
        if self.core.frame_count() == 0 && self.ever_chained {
            return Err(XiError::NoFrames);
        }
        Ok(FlowStatus::Eos)
    }

    fn scan_loop(&mut self, drain: bool) -> XiResult<FlowStatus> {
        loop {
            match self.core.scanner.scan(drain)? {
                ScanOutcome::Frame(frame, flow) => {
                    let status = self.core.finish_frame(frame, flow, &mut *self.consumer)?;
                    if status == FlowStatus::EndOfSegment {
                        return Ok(status);
                    }
                }
                ScanOutcome::NeedMoreData | ScanOutcome::EndOfData => return Ok(FlowStatus::Ok),
            }
        }
    }
}

impl std::fmt::Debug for PushParser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PushParser")
            .field("frame_count", &self.core.frame_count())
            .field("pending_seeks", &self.pending_seeks.len())
            .finish()
    }
}
