//! 帧数据结构.

use bytes::Bytes;

bitflags::bitflags! {
    /// 帧标志位
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FrameFlags: u32 {
        /// 帧前存在数据断裂 (丢弃过字节, 或来自新片段)
        const DISCONT = 1 << 0;
        /// 不计入码率统计 (如填充帧、辅助数据)
        const NO_COUNT = 1 << 1;
        /// 参与段裁剪 (默认开启, 探测器可关闭以旁路裁剪)
        const CLIP = 1 << 2;
        /// 非关键帧 (依赖前序帧才能解码)
        const DELTA_UNIT = 1 << 3;
    }
}

/// 一个已确认的离散帧
#[derive(Debug, Clone)]
pub struct Frame {
    /// 帧数据
    pub data: Bytes,
    /// 帧首字节在流中的绝对偏移
    pub offset: u64,
    /// 展示时间戳 (纳秒), 未知为 None
    pub pts: Option<u64>,
    /// 时长 (纳秒), 未知为 None
    pub duration: Option<u64>,
    /// 标志位
    pub flags: FrameFlags,
}

impl Frame {
    /// 以数据和偏移构造帧, 时间信息待填, 默认参与段裁剪
    pub fn new(data: Bytes, offset: u64) -> Self {
        Self {
            data,
            offset,
            pts: None,
            duration: None,
            flags: FrameFlags::CLIP,
        }
    }

    /// 帧字节数
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// 是否关键帧 (可作为解码起点)
    pub fn is_key(&self) -> bool {
        !self.flags.contains(FrameFlags::DELTA_UNIT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_新帧默认标志() {
        let f = Frame::new(Bytes::from_static(b"xyz"), 42);
        assert_eq!(f.size(), 3);
        assert_eq!(f.offset, 42);
        assert!(f.flags.contains(FrameFlags::CLIP));
        assert!(f.is_key());
        assert!(f.pts.is_none());
    }

    #[test]
    fn test_delta帧非关键() {
        let mut f = Frame::new(Bytes::from_static(b"x"), 0);
        f.flags |= FrameFlags::DELTA_UNIT;
        assert!(!f.is_key());
    }
}
