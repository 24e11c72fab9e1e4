//! 集成测试公用设施: 一个合成的恒定码率测试格式.
//!
//! 帧结构 (32 字节): [0xA5, 序号高8位, 序号低8位, 关键帧标志, 28 字节负载],
//! 每帧固定 100ms, 时间戳 = 序号 * 100ms.

use xi::core::time::MSECOND;
use xi::core::XiResult;
use xi::parse::{Frame, FrameCheck, FrameDetector, FrameFlags, FrameFlow};

/// 辅助: 初始化测试日志 (RUST_LOG 控制级别)
pub fn init_logs() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub const FRAME_SIZE: usize = 32;
pub const FRAME_DUR: u64 = 100 * MSECOND;
pub const SYNC_BYTE: u8 = 0xA5;

/// 生成一帧
pub fn build_frame(idx: u16, key: bool) -> Vec<u8> {
    let mut frame = vec![0u8; FRAME_SIZE];
    frame[0] = SYNC_BYTE;
    frame[1] = (idx >> 8) as u8;
    frame[2] = (idx & 0xFF) as u8;
    frame[3] = key as u8;
    // 负载: 可区分的确定性内容
    for (i, b) in frame[4..].iter_mut().enumerate() {
        *b = (idx as usize + i) as u8;
    }
    frame
}

/// 生成连续帧流, 序号 `idx % key_interval == 0` 的帧为关键帧
pub fn build_stream(frames: u16, key_interval: u16) -> Vec<u8> {
    let mut out = Vec::with_capacity(frames as usize * FRAME_SIZE);
    for idx in 0..frames {
        out.extend(build_frame(idx, idx % key_interval == 0));
    }
    out
}

/// 测试格式的帧探测器
///
/// `stamped` 为真时在确认回调里按序号写入时间戳 (模拟自带时间的格式),
/// 为假时留空 (依赖引擎的帧时长递推).
pub struct IndexedDetector {
    pub stamped: bool,
}

impl IndexedDetector {
    pub fn stamped() -> Box<Self> {
        Box::new(Self { stamped: true })
    }

    pub fn unstamped() -> Box<Self> {
        Box::new(Self { stamped: false })
    }
}

impl FrameDetector for IndexedDetector {
    fn min_frame_size(&self) -> usize {
        4
    }

    fn check(&mut self, window: &[u8], _drain: bool) -> FrameCheck {
        if window[0] == SYNC_BYTE {
            FrameCheck::Valid {
                skip: 0,
                size: FRAME_SIZE,
            }
        } else {
            FrameCheck::Invalid { skip: None }
        }
    }

    fn on_confirmed(&mut self, frame: &mut Frame) -> XiResult<FrameFlow> {
        let idx = ((frame.data[1] as u16) << 8) | frame.data[2] as u16;
        if self.stamped {
            frame.pts = Some(idx as u64 * FRAME_DUR);
            frame.duration = Some(FRAME_DUR);
        }
        if frame.data[3] == 0 {
            frame.flags |= FrameFlags::DELTA_UNIT;
        }
        Ok(FrameFlow::Emit)
    }
}

/// 辅助: 从帧数据还原序号
pub fn frame_idx(frame: &Frame) -> u16 {
    ((frame.data[1] as u16) << 8) | frame.data[2] as u16
}
