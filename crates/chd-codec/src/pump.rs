//! 输入提交泵.
//!
//! 非阻塞地把压缩访问单元送入设备输入环. 只有当数据加上安全余量
//! 能够完整放入剩余空间时才提交, 避免设备拒收的部分提交.

use chd_core::ChdResult;
use log::{debug, warn};

use crate::config::DecoderConfig;
use crate::device::{DeviceStatus, HardwareDecoder};
use crate::packet::HwTimestamp;

/// 一次提交尝试的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Offer {
    /// 设备已接收整个访问单元
    Accepted,
    /// 输入空间不足或设备忙, 数据未被消费, 稍后重试
    Deferred,
}

/// 已提交但尚未对应到输出帧的访问单元计数
///
/// 饱和计数, 永不为负.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UnseenCounter(u32);

impl UnseenCounter {
    pub fn get(&self) -> u32 {
        self.0
    }

    /// 每次提交被接受时调用
    pub fn increment(&mut self) {
        self.0 = self.0.saturating_add(1);
    }

    /// 每输出一帧完整图像时调用
    pub fn decrement(&mut self) {
        self.0 = self.0.saturating_sub(1);
    }

    /// 流不连续 (seek/flush) 时清零
    pub fn reset(&mut self) {
        self.0 = 0;
    }
}

/// 输入提交泵
#[derive(Debug, Clone)]
pub struct InputPump {
    margin: usize,
}

impl InputPump {
    pub fn new(config: &DecoderConfig) -> Self {
        Self {
            margin: config.input_margin,
        }
    }

    /// 尝试提交一个访问单元
    ///
    /// # 返回
    /// - `Accepted`: 已提交
    /// - `Deferred`: 空间不足或设备忙, 调用方保留数据稍后重试
    ///
    /// 不在这里退避, 等待由调用方的提交/轮询循环统一负责.
    ///
    /// # 错误
    /// 设备返回非忙失败状态时返回 `ChdError::Device`, 不保留任何部分成功状态.
    pub fn offer<D>(&self, device: &mut D, data: &[u8], timestamp: HwTimestamp) -> ChdResult<Offer>
    where
        D: HardwareDecoder + ?Sized,
    {
        let free = device.free_input_space();
        if !self.fits(data.len(), free) {
            debug!(
                "输入缓冲区已满: need={}+{}, free={}",
                data.len(),
                self.margin,
                free
            );
            return Ok(Offer::Deferred);
        }

        match device.submit(data, timestamp) {
            Ok(()) => Ok(Offer::Accepted),
            Err(DeviceStatus::Busy) => {
                debug!("提交时设备忙, 稍后重试");
                Ok(Offer::Deferred)
            }
            Err(status) => {
                warn!("提交输入失败: {status}");
                Err(status.into_error("proc_input"))
            }
        }
    }

    /// 数据加余量是否严格小于剩余空间
    fn fits(&self, len: usize, free: usize) -> bool {
        len.checked_add(self.margin).is_some_and(|needed| needed < free)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec_parameters::InputFormat;
    use crate::device::{DeviceResult, OpenMode, OutputColorSpace, Retrieved, StreamType};
    use std::time::{Duration, Instant};

    /// 提交总是返回忙的设备
    struct BusyDevice {
        submits: u32,
    }

    impl HardwareDecoder for BusyDevice {
        fn open(&mut self, _mode: &OpenMode) -> DeviceResult<()> {
            Ok(())
        }
        fn set_input_format(&mut self, _format: &InputFormat) -> DeviceResult<()> {
            Ok(())
        }
        fn open_decoder(&mut self, _stream: StreamType) -> DeviceResult<()> {
            Ok(())
        }
        fn set_color_space(&mut self, _mode: OutputColorSpace) -> DeviceResult<()> {
            Ok(())
        }
        fn start_decoder(&mut self) -> DeviceResult<()> {
            Ok(())
        }
        fn start_capture(&mut self) -> DeviceResult<()> {
            Ok(())
        }
        fn stop_decoder(&mut self) -> DeviceResult<()> {
            Ok(())
        }
        fn close_decoder(&mut self) -> DeviceResult<()> {
            Ok(())
        }
        fn close(&mut self) -> DeviceResult<()> {
            Ok(())
        }
        fn submit(&mut self, _data: &[u8], _timestamp: HwTimestamp) -> DeviceResult<()> {
            self.submits += 1;
            Err(DeviceStatus::Busy)
        }
        fn free_input_space(&mut self) -> usize {
            1 << 20
        }
        fn ready_count(&mut self) -> DeviceResult<u32> {
            Ok(0)
        }
        fn retrieve(&mut self, _timeout: Duration) -> DeviceResult<Retrieved> {
            Err(DeviceStatus::Busy)
        }
        fn release_output(&mut self) {}
        fn flush_input(&mut self, _mode: u32) -> DeviceResult<()> {
            Ok(())
        }
    }

    #[test]
    fn test_busy_submit_defers_without_sleeping() {
        let config = DecoderConfig {
            backoff_ms: 10_000,
            ..Default::default()
        };
        let pump = InputPump::new(&config);
        let mut device = BusyDevice { submits: 0 };

        let started = Instant::now();
        let offer = pump
            .offer(&mut device, &[0u8; 16], HwTimestamp::from_millis(0))
            .unwrap();
        assert_eq!(offer, Offer::Deferred);
        assert_eq!(device.submits, 1);
        assert!(started.elapsed() < Duration::from_secs(5), "退避只应发生在循环中");
    }

    #[test]
    fn test_unseen_saturates_at_zero() {
        let mut c = UnseenCounter::default();
        c.decrement();
        assert_eq!(c.get(), 0);
        c.increment();
        c.increment();
        c.decrement();
        assert_eq!(c.get(), 1);
        c.reset();
        assert_eq!(c.get(), 0);
    }

    #[test]
    fn test_fits_requires_margin() {
        let pump = InputPump::new(&DecoderConfig::default());
        assert!(pump.fits(100, 1125));
        assert!(!pump.fits(100, 1124));
        assert!(!pump.fits(0, 1024));
        assert!(!pump.fits(usize::MAX, usize::MAX));
    }
}
