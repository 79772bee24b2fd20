//! avcC 配置记录到 Annex B 参数集缓冲区的重封装.
//!
//! # AVCDecoderConfigurationRecord 布局
//! ```text
//! [version: 1] [profile: 1] [compat: 1] [level: 1]
//! [0b111111 | lengthSizeMinusOne: 2 bits]
//! [0b111 | numOfSPS: 5 bits] { [len: 2 BE] [SPS: len] } * numOfSPS
//! [numOfPPS: 8 bits]         { [len: 2 BE] [PPS: len] } * numOfPPS
//! ```
//!
//! 硬件解码器的流式输入只接受起始码形式, 因此每个参数集被改写为
//! `00 00 00 01` + 原始 NAL 负载. 每一次读取前都做边界检查,
//! 记录可能被截断, 也可能是刻意构造的.

use chd_core::{ChdError, ChdResult};
use log::{debug, trace, warn};

use super::nal::{NalUnitType, START_CODE};

/// avcC 版本标记, 首字节为此值表示长度前缀封装
pub const AVCC_VERSION: u8 = 1;

/// 原始 Annex B 封装下传给硬件的起始码长度
const DEFAULT_START_CODE_SIZE: u8 = 4;

/// 码流封装方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFraming {
    /// avcC 长度前缀封装, 每个访问单元内的 NAL 以 1~4 字节长度开头
    LengthPrefixed {
        /// NAL 长度字段字节数 (lengthSizeMinusOne + 1)
        nal_length_size: u8,
    },
    /// 原始 Annex B 起始码封装, 额外数据原样透传
    AnnexB,
}

impl ConfigFraming {
    /// 根据额外数据首字节判定封装方式
    ///
    /// 空的额外数据视为原始封装.
    pub fn detect(extra_data: &[u8]) -> Self {
        match extra_data {
            [AVCC_VERSION, _, _, _, length_byte, ..] => Self::LengthPrefixed {
                nal_length_size: (length_byte & 0x03) + 1,
            },
            // 首字节为 1 但不足以携带长度字段, 交给提取阶段报告截断
            [AVCC_VERSION, ..] => Self::LengthPrefixed {
                nal_length_size: DEFAULT_START_CODE_SIZE,
            },
            _ => Self::AnnexB,
        }
    }

    /// 是否为长度前缀封装
    pub fn is_length_prefixed(&self) -> bool {
        matches!(self, Self::LengthPrefixed { .. })
    }

    /// 提交阶段硬件重封装所用的起始码长度
    pub fn start_code_size(&self) -> u8 {
        match self {
            Self::LengthPrefixed { nal_length_size } => *nal_length_size,
            Self::AnnexB => DEFAULT_START_CODE_SIZE,
        }
    }
}

/// Annex B 参数集缓冲区
///
/// 流初始化时分配一次, 由适配器持有, 流结束时释放.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnnexBBuffer {
    data: Vec<u8>,
}

impl AnnexBBuffer {
    /// 按配置记录大小预分配
    ///
    /// 多个参数集时起始码累计开销可能超过记录头部节省的字节,
    /// 预分配仅是容量提示, 缓冲区会按需增长.
    pub fn with_capacity(record_size: usize) -> Self {
        Self {
            data: Vec::with_capacity(record_size),
        }
    }

    /// 追加一个起始码 + NAL 负载
    pub fn push_nal(&mut self, payload: &[u8]) {
        self.data.extend_from_slice(&START_CODE);
        self.data.extend_from_slice(payload);
    }

    /// 已写入字节数
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }
}

/// 参数集提取结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvccExtraction {
    /// 码流封装方式
    pub framing: ConfigFraming,
    /// 重封装后的 SPS/PPS (原始封装时为空)
    pub annex_b: AnnexBBuffer,
    /// profile_idc / profile_compatibility / level_idc 拼成的 24 位值
    pub profile: u32,
    /// SPS 条目数
    pub sps_count: usize,
    /// PPS 条目数
    pub pps_count: usize,
}

impl AvccExtraction {
    /// 原始封装: 不做提取, 输出长度为 0
    fn passthrough() -> Self {
        Self {
            framing: ConfigFraming::AnnexB,
            annex_b: AnnexBBuffer::default(),
            profile: 0,
            sps_count: 0,
            pps_count: 0,
        }
    }

    /// 输出缓冲区的有效长度
    pub fn used_len(&self) -> usize {
        self.annex_b.len()
    }
}

/// 从 avcC 配置记录中提取 SPS/PPS 并改写为 Annex B
///
/// # 返回
/// - 首字节不是 1: 不做任何处理, 返回原始封装且输出为空
/// - 否则: 所有 SPS 与 PPS, 每个以 4 字节起始码开头, 顺序与记录一致
///
/// # 错误
/// 任何长度字段或负载超出剩余字节时返回 `ChdError::MalformedConfig`,
/// 此时不产生任何可用的输出.
pub fn extract_sps_pps(record: &[u8]) -> ChdResult<AvccExtraction> {
    let framing = ConfigFraming::detect(record);
    let ConfigFraming::LengthPrefixed { .. } = framing else {
        debug!("avcC: 首字节不是版本 1, 按原始 Annex B 透传");
        return Ok(AvccExtraction::passthrough());
    };

    let mut cursor = ByteCursor::new(record);
    cursor.read_u8("configurationVersion")?;
    let profile = cursor.read_u24_be("profile/compat/level")?;
    cursor.read_u8("lengthSizeMinusOne")?;
    let sps_count = usize::from(cursor.read_u8("numOfSequenceParameterSets")? & 0x1F);
    debug!("avcC: profile={profile:06x}, num_sps={sps_count}");

    let mut annex_b = AnnexBBuffer::with_capacity(record.len());
    copy_parameter_sets(&mut cursor, &mut annex_b, sps_count, "SPS", NalUnitType::Sps)?;

    let pps_count = usize::from(cursor.read_u8("numOfPictureParameterSets")?);
    debug!("avcC: num_pps={pps_count}");
    copy_parameter_sets(&mut cursor, &mut annex_b, pps_count, "PPS", NalUnitType::Pps)?;

    debug!(
        "avcC: 提取完成, 输出 {} 字节, 记录尾部剩余 {} 字节",
        annex_b.len(),
        cursor.remaining()
    );

    Ok(AvccExtraction {
        framing,
        annex_b,
        profile,
        sps_count,
        pps_count,
    })
}

/// 复制 `count` 个长度前缀的参数集
fn copy_parameter_sets(
    cursor: &mut ByteCursor<'_>,
    out: &mut AnnexBBuffer,
    count: usize,
    label: &str,
    expected: NalUnitType,
) -> ChdResult<()> {
    for index in 0..count {
        let declared = usize::from(cursor.read_u16_be(label).map_err(|_| {
            ChdError::MalformedConfig(format!("H.264: avcC {label} 长度字段截断, index={index}"))
        })?);
        let remain = cursor.remaining();
        let payload = cursor.take(declared).ok_or_else(|| {
            ChdError::MalformedConfig(format!(
                "H.264: avcC {label} 数据截断, index={index}, declared_len={declared}, remain={remain}"
            ))
        })?;

        if let Some(&header) = payload.first() {
            let nal_type = NalUnitType::from_type_id(header);
            if nal_type != expected {
                warn!("avcC: {label}[{index}] 的 NAL 类型为 {nal_type}, 按原样复制");
            }
        }
        trace!("avcC: {label}[{index}] len={declared}");
        out.push_nal(payload);
    }
    Ok(())
}

/// 带边界检查的大端字节读取游标
struct ByteCursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteCursor<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// 取出接下来的 `len` 字节, 不足时不移动游标
    fn take(&mut self, len: usize) -> Option<&'a [u8]> {
        let end = self.pos.checked_add(len)?;
        let bytes = self.data.get(self.pos..end)?;
        self.pos = end;
        Some(bytes)
    }

    fn take_field(&mut self, len: usize, field: &str) -> ChdResult<&'a [u8]> {
        let remain = self.remaining();
        self.take(len).ok_or_else(|| {
            ChdError::MalformedConfig(format!(
                "H.264: avcC 缺少 {field} 字段, need={len}, remain={remain}"
            ))
        })
    }

    fn read_u8(&mut self, field: &str) -> ChdResult<u8> {
        Ok(self.take_field(1, field)?[0])
    }

    fn read_u16_be(&mut self, field: &str) -> ChdResult<u16> {
        let b = self.take_field(2, field)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn read_u24_be(&mut self, field: &str) -> ChdResult<u32> {
        let b = self.take_field(3, field)?;
        Ok(u32::from_be_bytes([0, b[0], b[1], b[2]]))
    }
}
