//! # Xi (析)
//!
//! 纯 Rust 实现的通用流式帧解析引擎, 对标 GStreamer 的
//! `GstBaseParse`/`GstAdapter`.
//!
//! Xi 把任意到达方式的字节流切分为带时间戳的离散帧:
//! - **push 模式**: 上游主动送块 (网络流、管道), seek 委托上游按字节执行
//! - **pull 模式**: 本地随机访问源, seek 与反向播放完全自理
//! - **帧探测**: 格式相关的边界识别以 [`parse::FrameDetector`] trait 插入
//! - **定位设施**: 时间-字节稀疏索引、码率估算、时间二分定位
//!
//! # 快速开始
//!
//! ```rust,ignore
//! use xi::parse::{CollectConsumer, MemorySource, PullParser};
//!
//! let consumer = CollectConsumer::new();
//! let frames = consumer.handle();
//! let mut parser = PullParser::new(
//!     Box::new(my_detector),
//!     false,
//!     Box::new(MemorySource::new(data)),
//!     Box::new(consumer),
//! );
//! parser.run()?;
//! println!("共 {} 帧", frames.borrow().len());
//! ```
//!
//! # Crate 结构
//!
//! | Crate | 功能 |
//! |-------|------|
//! | `xi-core` | 错误类型与时钟时间工具 |
//! | `xi-parse` | 解析引擎 (累积、扫描、定时、seek、反向播放) |

/// 核心类型与工具
pub use xi_core as core;

/// 流式帧解析引擎
pub use xi_parse as parse;
