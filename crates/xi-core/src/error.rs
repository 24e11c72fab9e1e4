//! 统一错误类型定义.
//!
//! 所有 Xi crate 共用的错误类型, 支持跨模块传播.

use thiserror::Error;

/// Xi 框架统一错误类型
#[derive(Debug, Error)]
pub enum XiError {
    /// 无效参数
    #[error("无效参数: {0}")]
    InvalidArgument(String),

    /// 不支持的操作
    #[error("不支持的操作: {0}")]
    Unsupported(String),

    /// 源不支持随机访问 (pull 模式要求可 seek 的源)
    #[error("源不支持随机访问")]
    NotSeekable,

    /// I/O 错误
    #[error("I/O 错误: {0}")]
    Io(#[from] std::io::Error),

    /// 数据不足, 需要更多输入
    #[error("数据不足, 需要更多输入")]
    NeedMoreData,

    /// 已到达流末尾
    #[error("已到达流末尾")]
    Eof,

    /// 无效数据 (损坏的码流等)
    #[error("无效数据: {0}")]
    InvalidData(String),

    /// 重同步超过上限 (扫描过多字节仍未找到有效帧)
    #[error("解析失败: 扫描 {0} 字节仍未重新同步")]
    ResyncOverflow(u64),

    /// 帧探测器无进展 (探测窗口不再增长却仍不产出帧)
    #[error("帧探测器无进展, 中止扫描")]
    NoProgress,

    /// 流结束前未找到任何有效帧
    #[error("流结束前未找到任何有效帧")]
    NoFrames,

    /// 下游消费者报告的致命错误
    #[error("下游错误: {0}")]
    Downstream(String),

    /// 内部错误 (不应发生)
    #[error("内部错误: {0}")]
    Internal(String),
}

/// Xi 框架统一 Result 类型
pub type XiResult<T> = Result<T, XiError>;
