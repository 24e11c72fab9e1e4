//! pull 模式驱动.
//!
//! 上游是可随机访问的源, 解析器自己掌握读取节奏, 因此 seek
//! 可以完全在本地完成: 索引直查、码率估算、必要时对源做时间
//! 二分定位. 反向播放通过逐段回退读取 + 片段重组实现.

use xi_core::time::{to_seconds, SECOND};
use xi_core::{XiError, XiResult};

use crate::consumer::Consumer;
use crate::detector::FrameDetector;
use crate::flow::FlowStatus;
use crate::parser::ParserCore;
use crate::scanner::{ScanOutcome, Scanner};
use crate::seek::{locate_time, SeekRequest, SeekSpec, TARGET_DIFFERENCE};
use crate::segment::{Format, Segment};
use crate::source::Source;

/// 反向播放单次回退的时间步长
const REVERSE_STEP_TIME: u64 = 10 * SECOND;
/// 回退字节步长的上限
const REVERSE_STEP_MAX: u64 = 1024 * 1024;
/// 回退字节步长的下限
const REVERSE_STEP_MIN: u64 = 1024;
/// 时长扫描时从尾部回退的窗口
const DURATION_SCAN_STEP: u64 = 64 * 1024;

/// pull 模式解析器
pub struct PullParser {
    core: ParserCore,
    source: Box<dyn Source>,
    consumer: Box<dyn Consumer>,
    /// 反向播放: 下一个片段的上界偏移 (已处理数据的下界)
    rev_offset: u64,
    eos: bool,
}

impl PullParser {
    pub fn new(
        detector: Box<dyn FrameDetector>,
        key_aware: bool,
        mut source: Box<dyn Source>,
        consumer: Box<dyn Consumer>,
    ) -> Self {
        let mut core = ParserCore::new(detector, key_aware);
        let size = source.size_hint();
        // pull 源天然可随机访问
        core.configure_upstream(true, size);
        Self {
            core,
            source,
            consumer,
            rev_offset: 0,
            eos: false,
        }
    }

    pub fn core(&self) -> &ParserCore {
        &self.core
    }

    pub fn core_mut(&mut self) -> &mut ParserCore {
        &mut self.core
    }

    /// 推进一步: 正向切一帧, 反向处理一个片段
    pub fn iterate(&mut self) -> XiResult<FlowStatus> {
        if self.eos {
            return Ok(FlowStatus::Eos);
        }
        if self.core.segment.segment.is_reverse() {
            return self.prev_fragment();
        }
        match self.core.scanner.scan_pull(&mut *self.source)? {
            ScanOutcome::Frame(frame, flow) => {
                self.core.finish_frame(frame, flow, &mut *self.consumer)
            }
            ScanOutcome::EndOfData => {
                self.core.flush_queued(&mut *self.consumer)?;
                self.eos = true;
                if self.core.frame_count() == 0 {
                    return Err(XiError::NoFrames);
                }
                Ok(FlowStatus::Eos)
            }
            ScanOutcome::NeedMoreData => {
                Err(XiError::Internal("pull 扫描不应要求更多数据".into()))
            }
        }
    }

    /// 一路跑到流结束或段终点
    pub fn run(&mut self) -> XiResult<FlowStatus> {
        loop {
            match self.iterate()? {
                FlowStatus::Ok | FlowStatus::NotLinked => {}
                status => return Ok(status),
            }
        }
    }

    /// 查询时长
    ///
    /// 权威值与码率估算都缺席时, 从尾部回退扫描最后一帧的时间戳
    /// (仅对自带时间戳的格式有效), 结果记为权威时长.
    pub fn duration(&mut self) -> XiResult<Option<u64>> {
        if let Some(d) = self.core.duration() {
            return Ok(Some(d));
        }
        let Some(size) = self.core.upstream_size() else {
            return Ok(None);
        };
        let saved = self.core.scanner.offset();
        let result = self.scan_last_pts(size);
        self.core.scanner.reposition(saved);
        let last = result?;
        if let Some(d) = last {
            log::info!("尾部扫描得到时长: {:.3}s", to_seconds(d));
            self.core.set_duration(d);
        }
        Ok(last)
    }

    /// 从尾部逐窗口回退, 找最后一帧的 pts + duration
    fn scan_last_pts(&mut self, size: u64) -> XiResult<Option<u64>> {
        let mut pos = size.saturating_sub(DURATION_SCAN_STEP);
        loop {
            self.core.scanner.reposition(pos);
            let mut last = None;
            loop {
                match self.core.scanner.scan_pull(&mut *self.source) {
                    Ok(ScanOutcome::Frame(frame, _)) => {
                        if let Some(pts) = frame.pts {
                            let dur = frame.duration.or(self.core.frame_duration()).unwrap_or(0);
                            last = Some(pts + dur);
                        }
                    }
                    Ok(ScanOutcome::EndOfData) => break,
                    Ok(ScanOutcome::NeedMoreData) => break,
                    // 尾部窗口可能落在垃圾数据里, 换个窗口再试
                    Err(XiError::ResyncOverflow(_)) => break,
                    Err(e) => return Err(e),
                }
            }
            if last.is_some() {
                return Ok(last);
            }
            if pos == 0 {
                return Ok(None);
            }
            pos = pos.saturating_sub(DURATION_SCAN_STEP);
        }
    }

    /// 本地执行 seek
    ///
    /// 解析顺序: 目标 0 直达流头; 索引命中且落点时间足够近则走
    /// 精确路径; 否则码率估算, 估不出再对源做时间二分定位.
    pub fn seek(&mut self, req: SeekRequest) -> XiResult<()> {
        if !self.core.syncable() {
            return Err(XiError::Unsupported("流不可重新同步, 无法 seek".into()));
        }
        let SeekSpec::Set(target) = req.start else {
            return Err(XiError::InvalidArgument("seek 缺少起点".into()));
        };
        let stop = match req.stop {
            SeekSpec::Set(v) => Some(v),
            SeekSpec::None => None,
        };
        if req.format == Format::Bytes {
            if req.rate < 0.0 {
                return Err(XiError::Unsupported("反向播放只接受时间格式的 seek".into()));
            }
            // 字节目标直接定位, 落点时间只能估
            let ts = self.core.bitrate.bytes_to_time(target).unwrap_or(0);
            let stop_ts = stop.and_then(|b| self.core.bitrate.bytes_to_time(b));
            let mut segment = Segment::new_time();
            segment.do_seek(req.rate, ts, stop_ts);
            self.core.segment.replace(segment);
            self.core.reposition(target, Some(ts), false);
            self.eos = false;
            return Ok(());
        }
        if req.rate < 0.0 {
            return self.seek_reverse(req.rate, target, stop);
        }

        let (offset, known_ts, exact) = self.resolve_time(target, req.accurate)?;
        // 精确 seek 从已知时间点起扫, 段起点裁掉目标之前的帧;
        // 非精确 seek 落哪算哪, 段起点就是落点时间.
        let seg_start = if exact { target } else { known_ts };
        let mut segment = Segment::new_time();
        segment.do_seek(req.rate, seg_start, stop);
        self.core.segment.replace(segment);
        self.core.reposition(offset, Some(known_ts), exact);
        self.eos = false;
        log::info!(
            "pull seek: 目标 {:.3}s -> 偏移 {} (起扫时间 {:.3}s, 精确={})",
            to_seconds(target),
            offset,
            to_seconds(known_ts),
            exact
        );
        Ok(())
    }

    /// 把时间目标解析为 (字节偏移, 该处已知时间, 是否精确)
    fn resolve_time(&mut self, target: u64, accurate: bool) -> XiResult<(u64, u64, bool)> {
        if target == 0 {
            return Ok((0, 0, true));
        }
        if let (Some(d), Some(size)) = (self.core.duration(), self.core.upstream_size()) {
            // 目标不早于流尾: 直达末端, 不必搜索
            if target >= d {
                return Ok((size, d, true));
            }
        }
        if let Some((offset, idx_ts)) = self.core.index.lookup(target, true) {
            if accurate || target <= idx_ts + TARGET_DIFFERENCE {
                // 索引点时间精确, 从那里正扫到目标即可
                return Ok((offset, idx_ts, true));
            }
        }
        if accurate {
            // 无索引可用, 只能从头扫 (慢而准)
            return Ok((0, 0, true));
        }
        // 非精确: 先试二分定位 (需要格式自带时间戳), 再退码率估算
        match self.bisect_time(target) {
            Ok(Some((offset, ts))) => return Ok((offset, ts, false)),
            Ok(None) => {}
            Err(e) => return Err(e),
        }
        if let Some(offset) = self.core.bitrate.time_to_bytes(target) {
            let size = self.core.upstream_size().unwrap_or(u64::MAX);
            return Ok((offset.min(size), target, false));
        }
        Err(XiError::Unsupported("无任何信息可定位目标时间".into()))
    }

    /// 对源做时间二分; 格式不带时间戳时返回 None
    fn bisect_time(&mut self, target: u64) -> XiResult<Option<(u64, u64)>> {
        let Some(size) = self.core.upstream_size() else {
            return Ok(None);
        };
        let duration = self.core.duration();
        let saved = self.core.scanner.offset();
        let scanner = &mut self.core.scanner;
        let source = &mut *self.source;
        let mut stamped = true;
        let result = locate_time(target, size, duration, &mut |pos| {
            match probe_first_frame(scanner, source, pos)? {
                Probe::Frame(offset, ts) => Ok(Some((offset, ts))),
                Probe::Eos => Ok(None),
                Probe::NoTimestamp => {
                    stamped = false;
                    Ok(None)
                }
            }
        });
        self.core.scanner.reposition(saved);
        if !stamped {
            return Ok(None);
        }
        result.map(Some)
    }

    /// 反向 seek: 从 stop (缺省为时长) 所在位置开始向前回退
    fn seek_reverse(&mut self, rate: f64, start: u64, stop: Option<u64>) -> XiResult<()> {
        let stop_ts = match stop {
            Some(ts) => ts,
            None => self
                .duration()?
                .ok_or_else(|| XiError::Unsupported("时长未知, 反向播放需要明确的终点".into()))?,
        };
        // 终点在已知时长之后时直接从流尾回退, 不必定位
        let offset = match (self.core.duration(), self.core.upstream_size()) {
            (Some(d), Some(size)) if stop_ts >= d => size,
            _ => self.resolve_time(stop_ts, false)?.0,
        };
        let mut segment = Segment::new_time();
        segment.do_seek(rate, start, Some(stop_ts));
        self.core.segment.replace(segment);
        self.core.reposition(offset, None, false);
        self.core.set_reverse_base(Some(stop_ts));
        self.rev_offset = offset;
        self.eos = false;
        log::info!(
            "反向 seek: [{:.3}s, {:.3}s] 自偏移 {} 回退",
            to_seconds(start),
            to_seconds(stop_ts),
            offset
        );
        Ok(())
    }

    /// 读取并处理上一个 (文件序更早的) 片段
    fn prev_fragment(&mut self) -> XiResult<FlowStatus> {
        if self.rev_offset == 0 {
            self.eos = true;
            return Ok(FlowStatus::Eos);
        }
        if let Some(base) = self.core.reverse_base() {
            if base <= self.core.segment.segment.start {
                // 已回退到段起点之前
                self.eos = true;
                return Ok(FlowStatus::Eos);
            }
        }
        let step = self
            .core
            .bitrate
            .time_to_bytes(REVERSE_STEP_TIME)
            .unwrap_or(REVERSE_STEP_MAX)
            .clamp(REVERSE_STEP_MIN, REVERSE_STEP_MAX);
        let start = self.rev_offset.saturating_sub(step);
        let len = (self.rev_offset - start) as usize;
        let data = self.source.read_range(start, len)?;
        if data.is_empty() {
            self.eos = true;
            return Ok(FlowStatus::Eos);
        }
        log::trace!("反向片段: [{}, {})", start, self.rev_offset);
        self.core.scanner.reposition(start);
        self.core.scanner.feed(data);
        let status = self
            .core
            .finish_fragment(&mut *self.consumer, start > 0)?;
        self.rev_offset = start;
        if start == 0 {
            self.eos = true;
            if status == FlowStatus::Ok {
                return Ok(FlowStatus::Eos);
            }
        }
        Ok(status)
    }
}

/// 单次探测的结果
enum Probe {
    Frame(u64, u64),
    Eos,
    NoTimestamp,
}

/// 从 `pos` 起扫出第一个带时间戳的帧
fn probe_first_frame(
    scanner: &mut Scanner,
    source: &mut dyn Source,
    pos: u64,
) -> XiResult<Probe> {
    scanner.reposition(pos);
    match scanner.scan_pull(source)? {
        ScanOutcome::Frame(frame, _) => match frame.pts {
            Some(pts) => Ok(Probe::Frame(frame.offset, pts)),
            None => Ok(Probe::NoTimestamp),
        },
        _ => Ok(Probe::Eos),
    }
}

impl std::fmt::Debug for PullParser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PullParser")
            .field("frame_count", &self.core.frame_count())
            .field("eos", &self.eos)
            .finish()
    }
}
