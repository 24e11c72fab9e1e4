//! 字节累积器.
//!
//! 对标 GStreamer 的 `GstAdapter`: 帧探测前所有原始字节的唯一栖身之处.
//! 以 `Bytes` 块链表存放输入, peek/take 在窗口落在首块内时零拷贝,
//! 跨块时才拼接; push/flush 均摊 O(1). 单线程单所有者, 不涉及并发.

use std::collections::VecDeque;

use bytes::{Bytes, BytesMut};
use xi_core::{XiError, XiResult};

/// 字节累积器
#[derive(Debug, Default)]
pub struct Adapter {
    /// 输入块队列, 首块前 `skip` 字节已被消耗
    chunks: VecDeque<Bytes>,
    /// 首块中已消耗的字节数
    skip: usize,
    /// 剩余可读字节总数
    size: usize,
    /// peek 跨块时的拼接缓冲
    scratch: Vec<u8>,
}

impl Adapter {
    /// 创建空累积器
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一块数据 (获得所有权, 不拷贝)
    pub fn push(&mut self, data: Bytes) {
        if data.is_empty() {
            return;
        }
        self.size += data.len();
        self.chunks.push_back(data);
    }

    /// 剩余可读字节数
    pub fn available(&self) -> usize {
        self.size
    }

    /// 查看前 `n` 字节但不消耗
    ///
    /// 窗口完全落在首块内时直接返回切片 (零拷贝), 否则拼接到内部
    /// 缓冲后返回. 数据不足时返回 [`XiError::NeedMoreData`].
    pub fn peek(&mut self, n: usize) -> XiResult<&[u8]> {
        if n > self.size {
            return Err(XiError::NeedMoreData);
        }
        if n == 0 {
            return Ok(&[]);
        }
        let head = &self.chunks[0];
        if head.len() - self.skip >= n {
            return Ok(&head[self.skip..self.skip + n]);
        }
        // 跨块, 拼接
        self.scratch.clear();
        self.scratch.reserve(n);
        let mut remaining = n;
        let mut skip = self.skip;
        for chunk in &self.chunks {
            let avail = chunk.len() - skip;
            let copy = avail.min(remaining);
            self.scratch.extend_from_slice(&chunk[skip..skip + copy]);
            remaining -= copy;
            skip = 0;
            if remaining == 0 {
                break;
            }
        }
        Ok(&self.scratch[..n])
    }

    /// 消耗前 `n` 字节并取得所有权
    ///
    /// 落在首块内时为零拷贝切片. 数据不足时返回 [`XiError::NeedMoreData`].
    pub fn take(&mut self, n: usize) -> XiResult<Bytes> {
        if n > self.size {
            return Err(XiError::NeedMoreData);
        }
        if n == 0 {
            return Ok(Bytes::new());
        }
        let head = &self.chunks[0];
        if head.len() - self.skip >= n {
            let out = head.slice(self.skip..self.skip + n);
            self.discard(n);
            return Ok(out);
        }
        let mut out = BytesMut::with_capacity(n);
        let mut remaining = n;
        while remaining > 0 {
            let head = &self.chunks[0];
            let avail = head.len() - self.skip;
            let copy = avail.min(remaining);
            out.extend_from_slice(&head[self.skip..self.skip + copy]);
            self.discard(copy);
            remaining -= copy;
        }
        Ok(out.freeze())
    }

    /// 丢弃前 `n` 字节 (不返回)
    pub fn flush(&mut self, n: usize) -> XiResult<()> {
        if n > self.size {
            return Err(XiError::NeedMoreData);
        }
        self.discard(n);
        Ok(())
    }

    /// 清空全部数据
    pub fn clear(&mut self) {
        self.chunks.clear();
        self.skip = 0;
        self.size = 0;
    }

    /// 内部丢弃, 调用方已验证 n <= size
    fn discard(&mut self, mut n: usize) {
        self.size -= n;
        while n > 0 {
            let head_len = self.chunks[0].len() - self.skip;
            if n < head_len {
                self.skip += n;
                return;
            }
            n -= head_len;
            self.chunks.pop_front();
            self.skip = 0;
        }
    }
}
