//! # xi-core
//!
//! Xi 流式帧解析引擎核心库, 提供基础类型定义、错误处理和时间工具.
//!
//! 本 crate 对标 GStreamer 的 libgstreamer 基础设施 (GstClockTime 与通用
//! 工具函数), 为整个 Xi 框架提供底层基础设施.

pub mod error;
pub mod time;

// 重导出常用类型
pub use error::{XiError, XiResult};
