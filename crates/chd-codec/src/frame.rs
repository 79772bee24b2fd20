//! 输出图像与显示几何.
//!
//! 解码结果要么是一幅完整图像, 要么是 "尚缺第二场" 的标记,
//! 要么本次调用什么都没有产生.

use bitflags::bitflags;
use chd_core::{ChdError, ChdResult, PixelFormat};

use crate::packet::HwTimestamp;

/// 硬件对 1080 行内容报告的填充高度
pub const PADDED_HEIGHT: u32 = 1088;

/// 1080 行内容的显示高度
pub const DISPLAY_HEIGHT_1080: u32 = 1080;

bitflags! {
    /// 图像的场属性
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct FieldFlags: u8 {
        /// 由两场交织而成
        const INTERLACED = 1 << 0;
        /// 顶场优先
        const TOP_FIRST  = 1 << 1;
    }
}

/// 显示几何
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DisplayGeometry {
    pub width: u32,
    pub height: u32,
}

impl DisplayGeometry {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// 由设备报告的尺寸得到显示几何, 1088 行归一为 1080 行
    pub fn from_reported(width: u32, height: u32) -> Self {
        let height = if height == PADDED_HEIGHT {
            DISPLAY_HEIGHT_1080
        } else {
            height
        };
        Self { width, height }
    }
}

/// 目标图像 (单平面打包格式)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoImage {
    /// 像素数据, 共 `stride * height` 字节
    pub data: Vec<u8>,
    /// 每行字节数
    pub stride: usize,
    pub width: u32,
    pub height: u32,
    pub pixel_format: PixelFormat,
    pub fields: FieldFlags,
    /// 首个拷入的硬件图像的时间戳
    pub timestamp: HwTimestamp,
}

impl VideoImage {
    /// 按最小行跨度分配
    pub fn new(width: u32, height: u32, pixel_format: PixelFormat) -> ChdResult<Self> {
        let stride = pixel_format.min_stride(width).ok_or_else(|| {
            ChdError::InvalidArgument(format!("{pixel_format} 不是打包格式, 无法分配单平面图像"))
        })?;
        Ok(Self::with_stride(width, height, pixel_format, stride))
    }

    /// 使用指定行跨度分配 (宿主可能要求对齐)
    pub fn with_stride(width: u32, height: u32, pixel_format: PixelFormat, stride: usize) -> Self {
        Self {
            data: vec![0; stride * height as usize],
            stride,
            width,
            height,
            pixel_format,
            fields: FieldFlags::empty(),
            timestamp: HwTimestamp::default(),
        }
    }

    /// 第 `y` 行
    pub fn row(&self, y: usize) -> Option<&[u8]> {
        let start = y.checked_mul(self.stride)?;
        self.data.get(start..start + self.stride)
    }

    /// 第 `y` 行 (可写)
    pub fn row_mut(&mut self, y: usize) -> Option<&mut [u8]> {
        let start = y.checked_mul(self.stride)?;
        self.data.get_mut(start..start + self.stride)
    }
}

/// 一次解码调用的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    /// 可显示的完整图像
    Frame(VideoImage),
    /// 隔行首场已缓存, 尚缺第二场, 本次不应显示任何图像
    Incomplete,
    /// 本次调用没有产生输出
    Nothing,
}

impl Decoded {
    pub fn is_frame(&self) -> bool {
        matches!(self, Self::Frame(_))
    }

    pub fn into_frame(self) -> Option<VideoImage> {
        match self {
            Self::Frame(image) => Some(image),
            _ => None,
        }
    }
}

/// 宿主视频输出回调
pub trait VideoOutput {
    /// 输出几何变化, 以固定输出格式重新配置显示
    fn configure(&mut self, geometry: DisplayGeometry, pixel_format: PixelFormat);

    /// 分配一幅目标图像
    ///
    /// `accept_stride` 为真表示适配层能处理宿主选择的任意行跨度.
    fn allocate_image(
        &mut self,
        geometry: DisplayGeometry,
        accept_stride: bool,
    ) -> ChdResult<VideoImage> {
        let _ = accept_stride;
        VideoImage::new(geometry.width, geometry.height, PixelFormat::Yuy2)
    }
}
