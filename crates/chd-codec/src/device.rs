//! 硬件解码器设备接口.
//!
//! 设备本身 (驱动、固件) 不在本库实现范围内, 这里只定义适配层
//! 依赖的请求/响应契约. 每个调用都可能在设备内部阻塞到其自身超时.

use std::time::Duration;

use bitflags::bitflags;
use bytes::Bytes;
use chd_core::ChdError;
use thiserror::Error;

use crate::codec_parameters::InputFormat;
use crate::packet::HwTimestamp;

bitflags! {
    /// 设备打开模式标志
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct OpenFlags: u32 {
        /// 播放模式
        const PLAYBACK           = 1 << 0;
        /// 从文件加载播放固件
        const LOAD_FILE_PLAY_FW  = 1 << 8;
        /// 跳过发送端 CPB 检查
        const SKIP_TX_CHK_CPB    = 1 << 20;
        /// 丢弃重复帧
        const PLAYBACK_DROP_RPT  = 1 << 21;
        /// 单线程模式
        const SINGLE_THREADED    = 1 << 22;
    }
}

bitflags! {
    /// 解码图像标志
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PictureFlags: u32 {
        /// 流结束
        const EOS            = 0x0004;
        /// 场对
        const FIELD_PAIR     = 0x0008;
        /// 顶场
        const TOP_FIELD      = 0x0010;
        /// 底场 (包含场对与顶场两位)
        const BOTTOM_FIELD   = 0x0018;
        /// 隔行源
        const INTERLACED_SRC = 0x0020;
        /// 源类型未知, 使隔行标志失效
        const UNKNOWN_SRC    = 0x0040;
        /// 底场优先
        const BOTTOM_FIRST   = 0x0080;
        /// 最后一帧
        const LAST_PICTURE   = 0x0100;
    }
}

bitflags! {
    /// 输出过程标志
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct OutputFlags: u32 {
        /// 图像信息块有效, 缓冲区携带可用像素
        const PIB_VALID = 0x0001;
    }
}

/// 默认分辨率: 1080p 23.976
pub const RESOLUTION_1080P23_976: u32 = 0x0B;

/// 设备打开模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenMode {
    pub flags: OpenFlags,
    /// 设备默认分辨率编号
    pub default_resolution: u32,
}

impl OpenMode {
    /// 单线程播放模式, 默认 1080p23.976
    pub fn playback() -> Self {
        Self {
            flags: OpenFlags::PLAYBACK
                | OpenFlags::LOAD_FILE_PLAY_FW
                | OpenFlags::SKIP_TX_CHK_CPB
                | OpenFlags::PLAYBACK_DROP_RPT
                | OpenFlags::SINGLE_THREADED,
            default_resolution: RESOLUTION_1080P23_976,
        }
    }
}

impl Default for OpenMode {
    fn default() -> Self {
        Self::playback()
    }
}

/// 输入流类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamType {
    /// 基本流 (ES)
    Elementary,
}

/// 输出色彩空间
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputColorSpace {
    /// 4:2:2 打包 YUY2
    Mode422Yuy2,
}

/// 设备的非成功状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DeviceStatus {
    /// 暂时忙, 稍后重试
    #[error("设备忙")]
    Busy,
    /// 其他失败状态码
    #[error("设备状态 {0}")]
    Failed(u32),
}

/// 设备忙状态码, 仅在忙被当作错误上报时使用
pub const STATUS_BUSY: u32 = 1;

impl DeviceStatus {
    /// 转换为 `ChdError::Device`
    pub fn into_error(self, op: &'static str) -> ChdError {
        let code = match self {
            Self::Busy => STATUS_BUSY,
            Self::Failed(code) => code,
        };
        ChdError::Device { op, code }
    }
}

/// 设备调用结果
pub type DeviceResult<T> = Result<T, DeviceStatus>;

/// 一次输出获取的结果
#[derive(Debug, Clone)]
pub enum Retrieved {
    /// 取到一幅解码图像
    Picture(DecodedPicture),
    /// 输出格式变化, 携带设备报告的新尺寸
    FormatChanged { width: u32, height: u32 },
}

/// 硬件输出的一幅解码图像
///
/// 隔行源时缓冲区只含一场, 行数为 `height / 2`.
/// 适配层拷贝完像素后必须调用 `release_output` 归还缓冲区.
#[derive(Debug, Clone)]
pub struct DecodedPicture {
    /// 打包 YUY2 像素, 行跨度为 `width * 2`
    pub y_buffer: Bytes,
    /// 宽度 (像素)
    pub width: u32,
    /// 帧高度 (像素)
    pub height: u32,
    pub flags: PictureFlags,
    pub output_flags: OutputFlags,
    pub timestamp: HwTimestamp,
    /// 设备分配的图像序号
    pub picture_number: u32,
}

impl DecodedPicture {
    /// 图像信息块是否有效
    pub fn info_valid(&self) -> bool {
        self.output_flags.contains(OutputFlags::PIB_VALID)
    }

    /// 源缓冲区行跨度 (16 位/像素)
    pub fn src_stride(&self) -> usize {
        self.width as usize * 2
    }
}

/// 硬件解码器设备
///
/// 所有方法都是同步请求/响应, 可能在设备内部阻塞.
pub trait HardwareDecoder {
    /// 打开设备
    fn open(&mut self, mode: &OpenMode) -> DeviceResult<()>;

    /// 设置输入格式 (子类型, 元数据, 起始码长度等)
    fn set_input_format(&mut self, format: &InputFormat) -> DeviceResult<()>;

    /// 打开解码器
    fn open_decoder(&mut self, stream: StreamType) -> DeviceResult<()>;

    /// 设置输出色彩空间
    fn set_color_space(&mut self, mode: OutputColorSpace) -> DeviceResult<()>;

    fn start_decoder(&mut self) -> DeviceResult<()>;

    fn start_capture(&mut self) -> DeviceResult<()>;

    fn stop_decoder(&mut self) -> DeviceResult<()>;

    fn close_decoder(&mut self) -> DeviceResult<()>;

    /// 关闭设备
    fn close(&mut self) -> DeviceResult<()>;

    /// 提交一段压缩数据
    fn submit(&mut self, data: &[u8], timestamp: HwTimestamp) -> DeviceResult<()>;

    /// 输入环形缓冲区的剩余空间 (字节)
    fn free_input_space(&mut self) -> usize;

    /// 已就绪等待取出的图像数
    fn ready_count(&mut self) -> DeviceResult<u32>;

    /// 取出一幅解码图像, 最多阻塞 `timeout`
    fn retrieve(&mut self, timeout: Duration) -> DeviceResult<Retrieved>;

    /// 归还上一次取出的输出缓冲区
    fn release_output(&mut self);

    /// 清空输入
    fn flush_input(&mut self, mode: u32) -> DeviceResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bottom_field_is_multi_bit() {
        let top = PictureFlags::TOP_FIELD | PictureFlags::INTERLACED_SRC;
        assert!(!top.contains(PictureFlags::BOTTOM_FIELD));
        let bottom = PictureFlags::BOTTOM_FIELD | PictureFlags::INTERLACED_SRC;
        assert!(bottom.contains(PictureFlags::BOTTOM_FIELD));
    }

    #[test]
    fn test_status_into_error() {
        let err = DeviceStatus::Failed(9).into_error("submit");
        assert!(matches!(err, ChdError::Device { op: "submit", code: 9 }));
        let busy = DeviceStatus::Busy.into_error("retrieve");
        assert!(matches!(busy, ChdError::Device { code: STATUS_BUSY, .. }));
    }

    #[test]
    fn test_playback_mode_flags() {
        let mode = OpenMode::default();
        assert!(mode.flags.contains(OpenFlags::SINGLE_THREADED));
        assert!(mode.flags.contains(OpenFlags::PLAYBACK_DROP_RPT));
        assert_eq!(mode.default_resolution, RESOLUTION_1080P23_976);
    }
}
