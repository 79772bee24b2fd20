//! # chd-core
//!
//! chd 硬件解码适配层核心库, 提供统一错误类型与像素格式定义.
//!
//! 所有 chd crate 共用此处的 `ChdError`, 以便跨模块传播.

pub mod error;
pub mod pixel_format;

// 重导出常用类型
pub use error::{ChdError, ChdResult};
pub use pixel_format::PixelFormat;
