//! 硬件解码器媒体子类型.
//!
//! 宿主按符号名称 (如 `h264`, 或插件名 `chdh264`) 选择解码器,
//! 这里把名称映射为硬件的子类型编号, 并决定码流封装约定.

use std::fmt;

use crate::parsers::h264::ConfigFraming;

/// 宿主插件名称的公共前缀
const PLUGIN_PREFIX: &str = "chd";

/// 硬件媒体子类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CodecSubtype {
    /// 无法识别
    Invalid,
    /// MPEG-1 Video
    Mpeg1Video,
    /// MPEG-2 Video
    Mpeg2Video,
    /// H.264 原始 Annex B 封装
    H264,
    /// VC-1 (WVC1 fourcc)
    Wvc1,
    /// WMV9 Main (WMV3)
    Wmv3,
    /// H.264 avcC 长度前缀封装
    Avc1,
    /// WMV9 Advanced (WMVA)
    Wmva,
    /// VC-1 基本流
    Vc1,
    /// DivX 4/5
    Divx,
    /// DivX 3.11
    Divx311,
}

impl CodecSubtype {
    /// 按符号名称解析子类型
    ///
    /// `h264` 的结果取决于封装方式: 长度前缀得到 `Avc1`, 否则得到 `H264`.
    /// 未知名称返回 `Invalid`, 调用方需将其视为致命的初始化错误.
    pub fn resolve(name: &str, framing: ConfigFraming) -> Self {
        let name = name.strip_prefix(PLUGIN_PREFIX).unwrap_or(name);
        match name {
            "divx" => Self::Divx,
            "divx3" => Self::Divx311,
            "mpeg1" => Self::Mpeg1Video,
            "mpeg2" => Self::Mpeg2Video,
            "vc1" => Self::Vc1,
            "wvc1" => Self::Wvc1,
            "wmv3" => Self::Wmv3,
            "wmva" => Self::Wmva,
            "h264" if framing.is_length_prefixed() => Self::Avc1,
            "h264" => Self::H264,
            _ => Self::Invalid,
        }
    }

    /// 硬件接口中的子类型编号
    pub const fn hw_code(&self) -> u8 {
        match self {
            Self::Invalid => 0,
            Self::Mpeg1Video => 1,
            Self::Mpeg2Video => 2,
            Self::H264 => 3,
            Self::Wvc1 => 4,
            Self::Wmv3 => 5,
            Self::Avc1 => 6,
            Self::Wmva => 7,
            Self::Vc1 => 8,
            Self::Divx => 9,
            Self::Divx311 => 10,
        }
    }

    /// 是否为 H.264 (两种封装)
    pub const fn is_h264(&self) -> bool {
        matches!(self, Self::H264 | Self::Avc1)
    }

    pub const fn is_valid(&self) -> bool {
        !matches!(self, Self::Invalid)
    }

    /// 获取子类型名称
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Invalid => "invalid",
            Self::Mpeg1Video => "mpeg1video",
            Self::Mpeg2Video => "mpeg2video",
            Self::H264 => "h264",
            Self::Wvc1 => "wvc1",
            Self::Wmv3 => "wmv3",
            Self::Avc1 => "avc1",
            Self::Wmva => "wmva",
            Self::Vc1 => "vc1",
            Self::Divx => "divx",
            Self::Divx311 => "divx311",
        }
    }
}

impl fmt::Display for CodecSubtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const AVCC: ConfigFraming = ConfigFraming::LengthPrefixed { nal_length_size: 4 };

    #[test]
    fn test_h264_depends_on_framing() {
        assert_eq!(CodecSubtype::resolve("h264", AVCC), CodecSubtype::Avc1);
        assert_eq!(
            CodecSubtype::resolve("h264", ConfigFraming::AnnexB),
            CodecSubtype::H264
        );
    }

    #[test]
    fn test_static_table() {
        let cases = [
            ("divx", CodecSubtype::Divx),
            ("divx3", CodecSubtype::Divx311),
            ("mpeg1", CodecSubtype::Mpeg1Video),
            ("mpeg2", CodecSubtype::Mpeg2Video),
            ("vc1", CodecSubtype::Vc1),
            ("wvc1", CodecSubtype::Wvc1),
            ("wmv3", CodecSubtype::Wmv3),
            ("wmva", CodecSubtype::Wmva),
        ];
        for (name, expected) in cases {
            // 非 H.264 名称与封装方式无关
            assert_eq!(CodecSubtype::resolve(name, AVCC), expected, "name={name}");
            assert_eq!(
                CodecSubtype::resolve(name, ConfigFraming::AnnexB),
                expected,
                "name={name}"
            );
        }
    }

    #[test]
    fn test_plugin_prefixed_names() {
        assert_eq!(CodecSubtype::resolve("chdh264", AVCC), CodecSubtype::Avc1);
        assert_eq!(CodecSubtype::resolve("chdwmv3", AVCC), CodecSubtype::Wmv3);
    }

    #[test]
    fn test_unknown_is_invalid() {
        let sub = CodecSubtype::resolve("hevc", AVCC);
        assert_eq!(sub, CodecSubtype::Invalid);
        assert!(!sub.is_valid());
        assert_eq!(sub.hw_code(), 0);
        // 精确匹配, 大小写敏感
        assert_eq!(CodecSubtype::resolve("H264", AVCC), CodecSubtype::Invalid);
        assert_eq!(CodecSubtype::resolve("chd", AVCC), CodecSubtype::Invalid);
    }
}
