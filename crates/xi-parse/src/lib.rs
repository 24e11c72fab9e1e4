//! # xi-parse
//!
//! Xi 流式帧解析引擎, 对标 GStreamer 的 `GstBaseParse`/`GstAdapter`.
//!
//! 将任意到达方式 (push: 数据异步送入 / pull: 主动按字节区间拉取) 的
//! 字节流切分为一系列带时间戳的离散 "帧", 并支持 seek、反向播放、
//! 时长估算与 时间↔字节 索引构建.
//!
//! 帧边界识别策略 ([`FrameDetector`]) 由调用方以 trait 实现插入,
//! 本 crate 只负责通用的缓冲、扫描、重同步、定时与定位逻辑.

pub mod adapter;
pub mod bitrate;
pub mod consumer;
pub mod detector;
pub mod flow;
pub mod frame;
pub mod index;
pub mod parser;
pub mod pull;
pub mod push;
pub mod scanner;
pub mod seek;
pub mod segment;
pub mod source;

// 重导出常用类型
pub use adapter::Adapter;
pub use bitrate::BitrateEstimator;
pub use consumer::{CollectConsumer, Consumer, Downstream};
pub use detector::{FrameCheck, FrameDetector};
pub use flow::{FlowStatus, FrameFlow};
pub use frame::{Frame, FrameFlags};
pub use index::TimeByteIndex;
pub use parser::ParserCore;
pub use pull::PullParser;
pub use push::{InputChunk, PushParser, UpstreamSeek};
pub use scanner::{ScanOutcome, Scanner};
pub use seek::{SeekRequest, SeekSpec};
pub use segment::{Format, Segment, SegmentController, SegmentState};
pub use source::{FileSource, MemorySource, Source};
