//! 帧流转与管线状态.

/// 单帧的流转去向
///
/// 段控制器裁剪与探测器回调都用它描述一帧的命运,
/// 用标签类型而非布尔组合, 让调用处的 match 穷尽所有分支.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameFlow {
    /// 正常下发
    Emit,
    /// 静默丢弃 (段外、探测器主动丢弃等)
    Drop,
    /// 暂存, 与后续帧一起下发 (探测器需要后向信息时使用)
    Queue,
    /// 段终点已到, 本帧及之后的帧不再下发
    EndOfSegment,
}

/// 整条管线推进一步之后的状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowStatus {
    /// 正常, 可继续推进
    Ok,
    /// 下游未连接, 数据被吞掉
    NotLinked,
    /// 已越过段终点
    EndOfSegment,
    /// 流结束
    Eos,
}
