//! # chd-codec
//!
//! chd 硬件解码适配层, 把宿主的同步解码调用映射到异步硬件解码器.
//!
//! ## 组成
//!
//! - **parsers::h264**: avcC 记录到 Annex B 参数集的提取, Annex B 切分
//! - **codec_subtype**: 编解码器名称到设备子类型的映射
//! - **pump**: 带余量检查与退避的输入提交
//! - **fields**: 隔行两场重组为一帧的状态机
//! - **decoder**: 设备生命周期, 提交/轮询循环与控制接口
//!
//! ## 使用示例
//!
//! ```rust
//! use chd_codec::{CodecSubtype, InputFormat, StreamParameters};
//!
//! let params = StreamParameters {
//!     codec_name: "chdh264".into(),
//!     extra_data: vec![
//!         0x01, 0x64, 0x00, 0x28, 0xFF, 0xE1, // avcC 头部
//!         0x00, 0x02, 0x67, 0x64, // SPS
//!         0x01, 0x00, 0x01, 0x68, // PPS
//!     ],
//!     width: 1920,
//!     height: 1080,
//! };
//! let format = InputFormat::resolve(&params).unwrap();
//! assert_eq!(format.subtype, CodecSubtype::Avc1);
//! assert_eq!(format.metadata_size(), 4 + 2 + 4 + 1);
//! ```

pub mod codec_parameters;
pub mod codec_subtype;
pub mod config;
pub mod decoder;
pub mod device;
pub mod fields;
pub mod frame;
pub mod packet;
pub mod parsers;
pub mod pump;

// 重导出常用类型
pub use codec_parameters::{InputFormat, StreamParameters};
pub use codec_subtype::CodecSubtype;
pub use config::DecoderConfig;
pub use decoder::{ChdDecoder, ControlCommand, ControlReply, DeviceSession, OUTPUT_PIXEL_FORMAT};
pub use device::{
    DecodedPicture, DeviceResult, DeviceStatus, HardwareDecoder, OpenMode, OutputFlags,
    PictureFlags, Retrieved,
};
pub use fields::{FieldReassembler, PictureStructure};
pub use frame::{Decoded, DisplayGeometry, FieldFlags, VideoImage, VideoOutput};
pub use packet::{HwTimestamp, Packet};
