//! 流参数与设备输入格式描述.
//!
//! 流初始化时执行一次: 判定封装方式, 解析子类型, 必要时提取 avcC
//! 参数集, 得到交给设备 `set_input_format` 的描述.

use chd_core::{ChdError, ChdResult};
use log::debug;

use crate::codec_subtype::CodecSubtype;
use crate::parsers::h264::{ConfigFraming, extract_sps_pps};

/// 59.94 帧率编号
pub const FRAME_RATE_59_94: u32 = 7;

/// 输入格式的默认选项位
pub const DEFAULT_OPT_FLAGS: u32 = 0x8000_0000 | FRAME_RATE_59_94 | 0x40;

/// 宿主提供的流参数
#[derive(Debug, Clone, Default)]
pub struct StreamParameters {
    /// 编解码器符号名称
    pub codec_name: String,
    /// 容器中的额外数据 (avcC 记录, 序列头等)
    pub extra_data: Vec<u8>,
    /// 显示宽度
    pub width: u32,
    /// 显示高度
    pub height: u32,
}

/// 设备输入格式
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputFormat {
    pub subtype: CodecSubtype,
    pub framing: ConfigFraming,
    /// 元数据: `Avc1` 为 Annex B 参数集, 其余为原始额外数据
    pub metadata: Vec<u8>,
    /// 提交阶段的起始码长度, 仅 H.264 设置
    pub start_code_size: Option<u8>,
    pub width: u32,
    pub height: u32,
    pub progressive: bool,
    pub fgt_enable: bool,
    pub opt_flags: u32,
}

impl InputFormat {
    /// 由流参数构建输入格式
    ///
    /// # 错误
    /// - `UnknownCodec`: 名称无法映射
    /// - `MalformedConfig`: avcC 记录损坏
    pub fn resolve(params: &StreamParameters) -> ChdResult<Self> {
        let framing = ConfigFraming::detect(&params.extra_data);
        let subtype = CodecSubtype::resolve(&params.codec_name, framing);
        debug!(
            "解析输入格式: codec={}, subtype={}, framing={:?}, extradata={} 字节",
            params.codec_name,
            subtype,
            framing,
            params.extra_data.len()
        );

        let (metadata, start_code_size) = match subtype {
            CodecSubtype::Invalid => {
                return Err(ChdError::UnknownCodec(params.codec_name.clone()));
            }
            CodecSubtype::Avc1 => {
                let extraction = extract_sps_pps(&params.extra_data)?;
                (
                    extraction.annex_b.into_vec(),
                    Some(framing.start_code_size()),
                )
            }
            CodecSubtype::H264 => (params.extra_data.clone(), Some(framing.start_code_size())),
            _ => (params.extra_data.clone(), None),
        };

        Ok(Self {
            subtype,
            framing,
            metadata,
            start_code_size,
            width: params.width,
            height: params.height,
            progressive: true,
            fgt_enable: false,
            opt_flags: DEFAULT_OPT_FLAGS,
        })
    }

    /// 元数据大小 (字节)
    pub fn metadata_size(&self) -> usize {
        self.metadata.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::h264::START_CODE;

    fn params(name: &str, extra_data: Vec<u8>) -> StreamParameters {
        StreamParameters {
            codec_name: name.into(),
            extra_data,
            width: 1920,
            height: 1080,
        }
    }

    fn avcc_record() -> Vec<u8> {
        vec![
            0x01, 0x64, 0x00, 0x28, 0xFD, 0xE1, // 头部, length_size=2
            0x00, 0x02, 0x67, 0x64, // SPS
            0x01, 0x00, 0x01, 0x68, // PPS
        ]
    }

    #[test]
    fn test_avc1_uses_extracted_metadata() {
        let fmt = InputFormat::resolve(&params("h264", avcc_record())).unwrap();
        assert_eq!(fmt.subtype, CodecSubtype::Avc1);
        assert_eq!(fmt.start_code_size, Some(2));
        let mut expected = START_CODE.to_vec();
        expected.extend_from_slice(&[0x67, 0x64]);
        expected.extend_from_slice(&START_CODE);
        expected.push(0x68);
        assert_eq!(fmt.metadata, expected);
        assert!(fmt.progressive);
        assert_eq!(fmt.opt_flags, DEFAULT_OPT_FLAGS);
    }

    #[test]
    fn test_raw_h264_passes_extradata_through() {
        let extra = vec![0x00, 0x00, 0x00, 0x01, 0x67, 0x42];
        let fmt = InputFormat::resolve(&params("h264", extra.clone())).unwrap();
        assert_eq!(fmt.subtype, CodecSubtype::H264);
        assert_eq!(fmt.metadata, extra);
        assert_eq!(fmt.start_code_size, Some(4));
    }

    #[test]
    fn test_empty_extradata_is_raw_h264() {
        let fmt = InputFormat::resolve(&params("h264", Vec::new())).unwrap();
        assert_eq!(fmt.subtype, CodecSubtype::H264);
        assert_eq!(fmt.metadata_size(), 0);
    }

    #[test]
    fn test_non_nal_codec_has_no_start_code() {
        let extra = vec![0x00, 0x00, 0x01, 0xB3];
        let fmt = InputFormat::resolve(&params("mpeg2", extra.clone())).unwrap();
        assert_eq!(fmt.subtype, CodecSubtype::Mpeg2Video);
        assert_eq!(fmt.start_code_size, None);
        assert_eq!(fmt.metadata, extra);
    }

    #[test]
    fn test_unknown_codec_is_fatal() {
        let err = InputFormat::resolve(&params("theora", Vec::new())).unwrap_err();
        assert!(matches!(err, ChdError::UnknownCodec(ref name) if name == "theora"));
    }

    #[test]
    fn test_malformed_avcc_is_fatal() {
        let mut record = avcc_record();
        record.truncate(9);
        let err = InputFormat::resolve(&params("h264", record)).unwrap_err();
        assert!(matches!(err, ChdError::MalformedConfig(_)));
    }
}
