//! Seek 请求与时间二分定位.

use xi_core::time::{abs_diff, scale_u64, to_seconds, SECOND};
use xi_core::XiResult;

use crate::segment::Format;

/// 二分定位可接受的时间误差
///
/// 落点只需是安全下界, 精确裁剪交给段控制器, 容差可以很宽.
pub const TARGET_DIFFERENCE: u64 = 20 * SECOND;

/// 每次探测点向前预留的余量, 避免正好落在帧中间反复试探
pub(crate) const LOCATE_CHUNK: u64 = 4 * 1024;

/// 二分迭代上限, 防止病态流上不收敛
const MAX_BISECT_ITERS: u32 = 32;

/// seek 的单端位置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekSpec {
    /// 定位到该值
    Set(u64),
    /// 不改变 / 不设置
    None,
}

/// 一次 seek 请求
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeekRequest {
    /// 播放速率, 负值为反向
    pub rate: f64,
    /// start/stop 的度量格式
    pub format: Format,
    pub start: SeekSpec,
    pub stop: SeekSpec,
    /// 要求精确落点 (否则允许就近)
    pub accurate: bool,
    /// 丢弃在途数据
    pub flush: bool,
}

impl SeekRequest {
    /// 最常见的请求: 正向精确 flush seek 到指定时间
    pub fn to_time(ts: u64) -> Self {
        Self {
            rate: 1.0,
            format: Format::Time,
            start: SeekSpec::Set(ts),
            stop: SeekSpec::None,
            accurate: true,
            flush: true,
        }
    }
}

/// 在字节流中二分定位目标时间对应的帧
///
/// 对标 GstBaseParse 的 locate_time: 维护 [低偏移,低时间] 与
/// [高偏移,高时间] 括号, 按码率插值(高端时间未知时取中点)选探测点,
/// 回退 [`LOCATE_CHUNK`] 后由 `probe` 扫出该位置起的第一帧.
/// `probe` 返回该帧的 (偏移, 时间戳), 流尾之后返回 `None`.
///
/// 返回不晚于目标的帧 (偏移, 时间戳); 目标为 0 直接返回流头.
pub fn locate_time(
    target: u64,
    size: u64,
    duration: Option<u64>,
    probe: &mut dyn FnMut(u64) -> XiResult<Option<(u64, u64)>>,
) -> XiResult<(u64, u64)> {
    if target == 0 || size == 0 {
        return Ok((0, 0));
    }
    let mut lpos = 0u64;
    let mut ltime = 0u64;
    let mut hpos = size;
    let mut htime = duration;

    for _ in 0..MAX_BISECT_ITERS {
        if hpos <= lpos + LOCATE_CHUNK {
            break;
        }
        let mid = match htime {
            Some(ht) if ht > ltime => {
                let span = (target.saturating_sub(ltime)).min(ht - ltime);
                lpos + scale_u64(hpos - lpos, span, ht - ltime)
            }
            _ => lpos + (hpos - lpos) / 2,
        };
        let mid = mid.saturating_sub(LOCATE_CHUNK).max(lpos);
        log::trace!(
            "二分定位: 目标 {:.3}s 括号 [{},{}] 探测 {}",
            to_seconds(target),
            lpos,
            hpos,
            mid
        );
        match probe(mid)? {
            None => {
                // 探测触到流尾, 收缩高端再试
                hpos = hpos.saturating_sub(LOCATE_CHUNK).max(lpos);
                htime = None;
            }
            Some((fpos, ftime)) => {
                if abs_diff(ftime, target) <= TARGET_DIFFERENCE {
                    log::debug!(
                        "二分定位命中: 目标 {:.3}s 帧 {:.3}s @ {}",
                        to_seconds(target),
                        to_seconds(ftime),
                        fpos
                    );
                    return Ok((fpos, ftime));
                }
                if ftime < target {
                    lpos = fpos;
                    ltime = ftime;
                } else {
                    hpos = mid;
                    htime = Some(ftime);
                }
            }
        }
    }
    // 括号收拢或迭代耗尽, 低端是已知的安全下界
    Ok((lpos, ltime))
}
