//! 时钟时间工具.
//!
//! 对标 GStreamer 的 `GstClockTime`: 流内时间统一以纳秒 (u64) 表示,
//! "未定义" 用 `Option::None` 表达, 而非魔数哨兵值.

/// 1 纳秒
pub const NSECOND: u64 = 1;
/// 1 微秒 (纳秒数)
pub const USECOND: u64 = 1_000;
/// 1 毫秒 (纳秒数)
pub const MSECOND: u64 = 1_000_000;
/// 1 秒 (纳秒数)
pub const SECOND: u64 = 1_000_000_000;

/// 按 `val * num / den` 做 64 位安全缩放
///
/// 中间乘积用 128 位避免溢出, 对标 `gst_util_uint64_scale`.
/// `den` 为 0 时返回 0 (调用方应事先保证分母有效).
pub fn scale_u64(val: u64, num: u64, den: u64) -> u64 {
    if den == 0 {
        return 0;
    }
    ((val as u128 * num as u128) / den as u128) as u64
}

/// 两个无符号时间值的绝对差
pub fn abs_diff(a: u64, b: u64) -> u64 {
    if a > b { a - b } else { b - a }
}

/// 将纳秒时间格式化为秒 (便于日志输出)
pub fn to_seconds(ns: u64) -> f64 {
    ns as f64 / SECOND as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_缩放_不溢出() {
        // u64 直接相乘会溢出的场景
        let v = scale_u64(u64::MAX / 2, 1_000_000_000, 500_000_000);
        assert_eq!(v, u64::MAX - 1);
    }

    #[test]
    fn test_缩放_分母为零() {
        assert_eq!(scale_u64(100, 7, 0), 0);
    }

    #[test]
    fn test_绝对差() {
        assert_eq!(abs_diff(3, 10), 7);
        assert_eq!(abs_diff(10, 3), 7);
        assert_eq!(abs_diff(5, 5), 0);
    }

    #[test]
    fn test_时间常量() {
        assert_eq!(SECOND, 1000 * MSECOND);
        assert_eq!(MSECOND, 1000 * USECOND);
        assert_eq!(USECOND, 1000 * NSECOND);
    }
}
