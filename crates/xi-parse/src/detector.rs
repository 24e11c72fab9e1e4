//! 帧探测器接口.
//!
//! 格式相关的帧边界识别策略由调用方实现本模块的 [`FrameDetector`]
//! trait 插入, 扫描器对探测窗口内容完全不做假设.

use xi_core::XiResult;

use crate::flow::FrameFlow;
use crate::frame::Frame;

/// 一次探测窗口检查的结论
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameCheck {
    /// 窗口前部 (跳过 `skip` 字节后) 是一个 `size` 字节的完整帧候选
    ///
    /// `size` 可以大于当前窗口, 扫描器会扩大窗口后重新检查.
    Valid { skip: usize, size: usize },
    /// 窗口前部不是帧起点
    ///
    /// `skip` 为建议丢弃的字节数; `None` 表示探测器说不清,
    /// 扫描器按最小步长 1 字节推进, 保证永不停滞.
    Invalid { skip: Option<usize> },
}

/// 帧边界探测器
///
/// 单线程使用, 不要求 `Send`. 实现方持有自己的格式状态
/// (如上一帧的参数, 用于校验连续性).
pub trait FrameDetector {
    /// 探测一个帧头至少需要的字节数
    ///
    /// 扫描器以此作为探测窗口的起始大小.
    fn min_frame_size(&self) -> usize {
        1
    }

    /// 检查探测窗口
    ///
    /// `drain` 为真表示流已结束, 窗口不会再增长, 探测器应就现有
    /// 数据给出最终结论 (例如接受一个被截断到窗口大小的尾帧).
    fn check(&mut self, window: &[u8], drain: bool) -> FrameCheck;

    /// 帧已切出, 探测器最后过目
    ///
    /// 可修改帧内容与标志 (如打上 `DELTA_UNIT`), 并决定去向:
    /// [`FrameFlow::Emit`] 下发、[`FrameFlow::Drop`] 丢弃、
    /// [`FrameFlow::Queue`] 暂存. 默认全部下发.
    ///
    /// seek 的二分定位与时长扫描会在远离播放点的位置试切帧,
    /// 这些探测帧同样经过本回调但不会下发; 实现方不应假设
    /// 相邻两次调用的帧在流中连续.
    fn on_confirmed(&mut self, _frame: &mut Frame) -> XiResult<FrameFlow> {
        Ok(FrameFlow::Emit)
    }
}
