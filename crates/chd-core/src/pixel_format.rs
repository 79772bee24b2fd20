//! 输出像素格式定义.
//!
//! 硬件解码器只输出打包 YUV, 这里列出宿主可能询问的格式,
//! 以便控制接口能明确回答 "支持" 或 "不支持".

use std::fmt;

/// 像素格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum PixelFormat {
    /// 未指定
    None,

    // ========================
    // 打包 YUV 4:2:2 (16 位/像素)
    // ========================
    /// YUYV 打包 4:2:2 (Y0 U Y1 V), 硬件固定输出格式
    Yuy2,
    /// UYVY 打包 4:2:2 (U Y0 V Y1)
    Uyvy,

    // ========================
    // 平面 / 半平面 4:2:0
    // ========================
    /// YUV 4:2:0 平面格式, 8 位
    Yuv420p,
    /// NV12: Y 平面 + UV 交错
    Nv12,
}

impl PixelFormat {
    /// 是否为打包格式 (所有分量存储在单一平面)
    pub const fn is_packed(&self) -> bool {
        matches!(self, Self::Yuy2 | Self::Uyvy)
    }

    /// 打包格式每像素字节数, 平面格式返回 `None`
    pub const fn packed_bytes_per_pixel(&self) -> Option<usize> {
        match self {
            Self::Yuy2 | Self::Uyvy => Some(2),
            _ => None,
        }
    }

    /// 打包格式的最小行字节数
    pub fn min_stride(&self, width: u32) -> Option<usize> {
        self.packed_bytes_per_pixel().map(|bpp| width as usize * bpp)
    }

    /// 获取格式名称
    pub const fn name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Yuy2 => "yuy2",
            Self::Uyvy => "uyvy",
            Self::Yuv420p => "yuv420p",
            Self::Nv12 => "nv12",
        }
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
