//! 压缩访问单元 (Packet) 与硬件时间戳.
//!
//! 宿主每次解码调用送入一个访问单元, 其 PTS 以毫秒计,
//! 提交给硬件前换算为 100 纳秒单位.

use std::fmt;

use bytes::Bytes;

/// 毫秒到 100 纳秒刻度的换算系数
pub const TICKS_PER_MILLI: u64 = 10_000;

/// 硬件时钟时间戳 (100 纳秒刻度)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct HwTimestamp(pub u64);

impl HwTimestamp {
    /// 由毫秒 PTS 换算, 负值钳制为 0, 溢出时饱和
    pub fn from_millis(pts_ms: i64) -> Self {
        let ms = u64::try_from(pts_ms).unwrap_or(0);
        Self(ms.saturating_mul(TICKS_PER_MILLI))
    }

    /// 还原为毫秒 (向下取整)
    pub fn as_millis(&self) -> u64 {
        self.0 / TICKS_PER_MILLI
    }
}

impl fmt::Display for HwTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 压缩访问单元
#[derive(Debug, Clone, Default)]
pub struct Packet {
    /// 压缩数据, 为空表示本次调用没有新的输入
    pub data: Bytes,
    /// 显示时间戳 (毫秒)
    pub pts_ms: i64,
    /// 宿主请求丢帧
    pub drop_requested: bool,
}

impl Packet {
    /// 创建空数据包, 仅用于轮询输出
    pub fn empty() -> Self {
        Self::default()
    }

    /// 从数据和毫秒 PTS 创建数据包
    pub fn new(data: impl Into<Bytes>, pts_ms: i64) -> Self {
        Self {
            data: data.into(),
            pts_ms,
            drop_requested: false,
        }
    }

    /// 数据大小 (字节)
    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// 换算后的硬件时间戳
    pub fn hw_timestamp(&self) -> HwTimestamp {
        HwTimestamp::from_millis(self.pts_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_millis_to_ticks() {
        assert_eq!(HwTimestamp::from_millis(0), HwTimestamp(0));
        assert_eq!(HwTimestamp::from_millis(40), HwTimestamp(400_000));
        assert_eq!(HwTimestamp::from_millis(1_000).as_millis(), 1_000);
    }

    #[test]
    fn test_negative_and_overflow() {
        assert_eq!(HwTimestamp::from_millis(-5), HwTimestamp(0));
        assert_eq!(HwTimestamp::from_millis(i64::MAX), HwTimestamp(u64::MAX));
    }

    #[test]
    fn test_packet_helpers() {
        let pkt = Packet::new(vec![1u8, 2, 3], 20);
        assert_eq!(pkt.size(), 3);
        assert!(!pkt.is_empty());
        assert_eq!(pkt.hw_timestamp(), HwTimestamp(200_000));
        assert!(Packet::empty().is_empty());
    }
}
