//! 下游帧消费者.

use std::cell::RefCell;
use std::rc::Rc;

use crate::frame::Frame;

/// 消费者拒收帧的原因
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Downstream {
    /// 未连接, 帧被吞掉但管线可继续
    NotLinked,
    /// 下游认为段已结束
    EndOfSegment,
    /// 致命错误, 管线应中止
    Fatal(String),
}

/// 帧消费者
///
/// 解析引擎对每个最终下发的帧调用一次 [`Consumer::accept`].
/// 单线程回调, 不要求 `Send`.
pub trait Consumer {
    fn accept(&mut self, frame: Frame) -> Result<(), Downstream>;
}

/// 把所有帧收进共享 Vec 的消费者, 测试用
#[derive(Debug, Default)]
pub struct CollectConsumer {
    frames: Rc<RefCell<Vec<Frame>>>,
}

impl CollectConsumer {
    pub fn new() -> Self {
        Self::default()
    }

    /// 收集结果的共享句柄
    pub fn handle(&self) -> Rc<RefCell<Vec<Frame>>> {
        Rc::clone(&self.frames)
    }
}

impl Consumer for CollectConsumer {
    fn accept(&mut self, frame: Frame) -> Result<(), Downstream> {
        self.frames.borrow_mut().push(frame);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[test]
    fn test_收集消费者() {
        let mut c = CollectConsumer::new();
        let h = c.handle();
        c.accept(Frame::new(Bytes::from_static(b"a"), 0)).unwrap();
        c.accept(Frame::new(Bytes::from_static(b"b"), 1)).unwrap();
        let frames = h.borrow();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[1].offset, 1);
    }
}
