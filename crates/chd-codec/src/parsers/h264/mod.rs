//! H.264/AVC 码流配置解析.
//!
//! - avcC (AVCDecoderConfigurationRecord) 中 SPS/PPS 的提取与 Annex B 重封装
//! - Annex B 字节流的 NAL 单元分割 (用于检查重封装结果)

pub mod avcc;
pub mod nal;

pub use avcc::{AnnexBBuffer, AvccExtraction, ConfigFraming, extract_sps_pps};
pub use nal::{NalUnit, NalUnitType, START_CODE, split_annex_b};
