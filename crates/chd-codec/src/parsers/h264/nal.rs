//! H.264 NAL 单元类型识别与 Annex B 分割.
//!
//! # Annex B 格式
//!
//! 每个 NAL 单元前加起始码:
//! - 3 字节: `00 00 01`
//! - 4 字节: `00 00 00 01` (本适配层输出统一使用此形式)
//!
//! # NAL 头部 (1 字节)
//! ```text
//! ┌─────────────────────────────────────┐
//! │ forbidden(1) | ref_idc(2) | type(5) │
//! └─────────────────────────────────────┘
//! ```

use chd_core::{ChdError, ChdResult};

/// 4 字节 Annex B 起始码
pub const START_CODE: [u8; 4] = [0x00, 0x00, 0x00, 0x01];

/// NAL 单元类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum NalUnitType {
    /// 非 IDR 图像切片
    Slice,
    /// IDR 图像切片
    SliceIdr,
    /// 增补增强信息 (SEI)
    Sei,
    /// 序列参数集 (SPS)
    Sps,
    /// 图像参数集 (PPS)
    Pps,
    /// 访问单元分隔符 (AUD)
    Aud,
    /// SPS 扩展
    SpsExtension,
    /// 其他类型
    Other(u8),
}

impl NalUnitType {
    /// 从 NAL 头部的 5 位类型编号创建
    pub fn from_type_id(type_id: u8) -> Self {
        match type_id & 0x1F {
            1 => Self::Slice,
            5 => Self::SliceIdr,
            6 => Self::Sei,
            7 => Self::Sps,
            8 => Self::Pps,
            9 => Self::Aud,
            13 => Self::SpsExtension,
            id => Self::Other(id),
        }
    }
}

impl std::fmt::Display for NalUnitType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Slice => write!(f, "Slice"),
            Self::SliceIdr => write!(f, "IDR"),
            Self::Sei => write!(f, "SEI"),
            Self::Sps => write!(f, "SPS"),
            Self::Pps => write!(f, "PPS"),
            Self::Aud => write!(f, "AUD"),
            Self::SpsExtension => write!(f, "SPSExt"),
            Self::Other(id) => write!(f, "Other({id})"),
        }
    }
}

/// Annex B 流中的一个 NAL 单元 (借用原始缓冲区)
#[derive(Debug, Clone, Copy)]
pub struct NalUnit<'a> {
    /// NAL 单元类型
    pub nal_type: NalUnitType,
    /// NAL 数据 (不含起始码, 含头部字节)
    pub data: &'a [u8],
}

impl<'a> NalUnit<'a> {
    /// 从 NAL 数据 (含头部字节) 解析
    pub fn parse(data: &'a [u8]) -> ChdResult<Self> {
        let header = *data
            .first()
            .ok_or_else(|| ChdError::MalformedConfig("H.264: NAL 单元数据为空".into()))?;
        if header & 0x80 != 0 {
            return Err(ChdError::MalformedConfig(format!(
                "H.264: forbidden_zero_bit 非法, header=0x{header:02x}"
            )));
        }
        Ok(Self {
            nal_type: NalUnitType::from_type_id(header),
            data,
        })
    }
}

/// 从 Annex B 字节流中分割出所有 NAL 单元
///
/// 支持 3 字节与 4 字节起始码, 头部非法的单元被跳过.
/// 一个长度为 0 的 NAL (起始码后紧跟下一个起始码) 不产生条目.
pub fn split_annex_b(data: &[u8]) -> Vec<NalUnit<'_>> {
    let starts = find_start_codes(data);
    let mut nalus = Vec::with_capacity(starts.len());

    for (i, &(pos, code_len)) in starts.iter().enumerate() {
        let begin = pos + code_len;
        let end = starts.get(i + 1).map(|&(next, _)| next).unwrap_or(data.len());
        if begin >= end {
            continue;
        }
        if let Ok(nalu) = NalUnit::parse(&data[begin..end]) {
            nalus.push(nalu);
        }
    }

    nalus
}

/// 查找所有起始码, 返回 (位置, 起始码长度)
fn find_start_codes(data: &[u8]) -> Vec<(usize, usize)> {
    let mut positions = Vec::new();
    let mut i = 0;

    while i + 2 < data.len() {
        if data[i] == 0x00 && data[i + 1] == 0x00 {
            if data[i + 2] == 0x01 {
                positions.push((i, 3));
                i += 3;
                continue;
            }
            if i + 3 < data.len() && data[i + 2] == 0x00 && data[i + 3] == 0x01 {
                positions.push((i, 4));
                i += 4;
                continue;
            }
        }
        i += 1;
    }

    positions
}
