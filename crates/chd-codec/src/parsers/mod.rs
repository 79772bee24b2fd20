//! 码流配置解析器.

pub mod h264;
