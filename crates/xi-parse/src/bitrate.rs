//! 码率估算与 时间↔字节 换算.
//!
//! 对标 GstBaseParse 的 update_bitrates / convert_default:
//! 累积帧大小与时长, 得到平均码率, 在无更好信息时用它做
//! 时间与字节之间的双向换算以及整流时长估算.

use xi_core::time::{scale_u64, MSECOND, SECOND};

/// 积累到多少帧之后 min/max 码率才可信
const MIN_FRAMES_TO_POST_BITRATE: u64 = 10;

/// 每多少帧刷新一次估算时长
const ESTIMATE_UPDATE_INTERVAL: u64 = 50;

/// 码率估算器
#[derive(Debug)]
pub struct BitrateEstimator {
    /// 计入统计的帧数
    frame_count: u64,
    /// 计入统计的字节数
    byte_count: u64,
    /// 累计时长 (纳秒)
    acc_duration: u64,
    min_bitrate: u32,
    avg_bitrate: u32,
    max_bitrate: u32,
    /// 调用方声明的权威平均码率, 优先于实测值
    override_bitrate: Option<u32>,
}

impl Default for BitrateEstimator {
    fn default() -> Self {
        Self {
            frame_count: 0,
            byte_count: 0,
            acc_duration: 0,
            min_bitrate: u32::MAX,
            avg_bitrate: 0,
            max_bitrate: 0,
            override_bitrate: None,
        }
    }
}

impl BitrateEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    /// 观察一帧
    ///
    /// `counted` 为假时 (填充帧等) 完全不计入统计.
    pub fn observe(&mut self, size: usize, duration: Option<u64>, counted: bool) {
        if !counted {
            return;
        }
        self.frame_count += 1;
        self.byte_count += size as u64;
        let Some(dur) = duration else {
            return;
        };
        if dur == 0 {
            return;
        }
        self.acc_duration += dur;
        let frame_bitrate = scale_u64(8 * size as u64, SECOND, dur) as u32;
        if frame_bitrate < self.min_bitrate {
            self.min_bitrate = frame_bitrate;
        }
        if frame_bitrate > self.max_bitrate {
            self.max_bitrate = frame_bitrate;
        }
        self.avg_bitrate = scale_u64(8 * self.byte_count, SECOND, self.acc_duration) as u32;
    }

    /// 声明权威平均码率 (如容器头里的标称值)
    pub fn set_average_bitrate(&mut self, bitrate: u32) {
        self.override_bitrate = Some(bitrate);
    }

    /// 当前可用的平均码率 (bit/s), 无数据时为 None
    pub fn avg_bitrate(&self) -> Option<u32> {
        if let Some(br) = self.override_bitrate {
            return Some(br);
        }
        if self.avg_bitrate > 0 {
            Some(self.avg_bitrate)
        } else {
            None
        }
    }

    /// 最低帧码率, 样本足够多时才报告
    pub fn min_bitrate(&self) -> Option<u32> {
        (self.frame_count >= MIN_FRAMES_TO_POST_BITRATE).then_some(self.min_bitrate)
    }

    /// 最高帧码率, 样本足够多时才报告
    pub fn max_bitrate(&self) -> Option<u32> {
        (self.frame_count >= MIN_FRAMES_TO_POST_BITRATE).then_some(self.max_bitrate)
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// 估算时长是否该刷新了
    pub fn estimate_due(&self) -> bool {
        self.frame_count > 0 && self.frame_count % ESTIMATE_UPDATE_INTERVAL == 0
    }

    /// 字节数换算为时间 (纳秒)
    ///
    /// 优先用实测累积比例 (毫秒精度缩放避免大数溢出),
    /// 没有积累时退回权威码率.
    pub fn bytes_to_time(&self, bytes: u64) -> Option<u64> {
        if self.byte_count > 0 && self.acc_duration >= MSECOND {
            let dur_ms = self.acc_duration / MSECOND;
            return Some(scale_u64(bytes, dur_ms, self.byte_count) * MSECOND);
        }
        let br = self.override_bitrate?;
        if br == 0 {
            return None;
        }
        Some(scale_u64(bytes, 8 * SECOND, br as u64))
    }

    /// 时间 (纳秒) 换算为字节数
    pub fn time_to_bytes(&self, time: u64) -> Option<u64> {
        if self.byte_count > 0 && self.acc_duration >= MSECOND {
            let dur_ms = self.acc_duration / MSECOND;
            if dur_ms == 0 {
                return None;
            }
            return Some(scale_u64(time / MSECOND, self.byte_count, dur_ms));
        }
        let br = self.override_bitrate?;
        if br == 0 {
            return None;
        }
        Some(scale_u64(time, br as u64, 8 * SECOND))
    }

    /// 按总字节数估算整流时长
    pub fn estimated_duration(&self, total_bytes: u64) -> Option<u64> {
        self.bytes_to_time(total_bytes)
    }

    pub fn reset(&mut self) {
        let override_bitrate = self.override_bitrate;
        *self = Self::default();
        self.override_bitrate = override_bitrate;
    }
}
