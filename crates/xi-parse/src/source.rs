//! 随机访问数据源.
//!
//! pull 模式的上游抽象: 按字节区间读取, 可选报告总大小.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};

use bytes::{Bytes, BytesMut};
use xi_core::XiResult;

/// 随机访问数据源
pub trait Source {
    /// 从 `offset` 起最多读 `len` 字节
    ///
    /// 允许短读; 位于流末尾之后时返回空, 而非错误.
    fn read_range(&mut self, offset: u64, len: usize) -> XiResult<Bytes>;

    /// 总字节数, 未知时返回 None
    fn size_hint(&mut self) -> Option<u64>;
}

/// 内存数据源, 测试与小数据场景用
#[derive(Debug, Clone)]
pub struct MemorySource {
    data: Bytes,
}

impl MemorySource {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self { data: data.into() }
    }
}

impl Source for MemorySource {
    fn read_range(&mut self, offset: u64, len: usize) -> XiResult<Bytes> {
        let total = self.data.len() as u64;
        if offset >= total {
            return Ok(Bytes::new());
        }
        let start = offset as usize;
        let end = (start + len).min(self.data.len());
        Ok(self.data.slice(start..end))
    }

    fn size_hint(&mut self) -> Option<u64> {
        Some(self.data.len() as u64)
    }
}

/// 文件数据源
#[derive(Debug)]
pub struct FileSource {
    file: File,
}

impl FileSource {
    pub fn open(path: impl AsRef<std::path::Path>) -> XiResult<Self> {
        Ok(Self {
            file: File::open(path)?,
        })
    }
}

impl Source for FileSource {
    fn read_range(&mut self, offset: u64, len: usize) -> XiResult<Bytes> {
        self.file.seek(SeekFrom::Start(offset))?;
        let mut buf = BytesMut::zeroed(len);
        let mut filled = 0;
        // read 允许短读, 循环填满或到 EOF
        loop {
            let n = self.file.read(&mut buf[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
            if filled == len {
                break;
            }
        }
        buf.truncate(filled);
        Ok(buf.freeze())
    }

    fn size_hint(&mut self) -> Option<u64> {
        self.file.metadata().ok().map(|m| m.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_内存源_区间读取() {
        let mut s = MemorySource::new(&b"0123456789"[..]);
        assert_eq!(s.size_hint(), Some(10));
        assert_eq!(&s.read_range(2, 4).unwrap()[..], b"2345");
    }

    #[test]
    fn test_内存源_末尾短读() {
        let mut s = MemorySource::new(&b"abcde"[..]);
        assert_eq!(&s.read_range(3, 10).unwrap()[..], b"de");
    }

    #[test]
    fn test_内存源_越界返回空() {
        let mut s = MemorySource::new(&b"abc"[..]);
        assert!(s.read_range(3, 1).unwrap().is_empty());
        assert!(s.read_range(100, 1).unwrap().is_empty());
    }
}
