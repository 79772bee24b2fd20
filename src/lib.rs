//! # chd
//!
//! 类 CrystalHD 硬件解码器的宿主适配层.
//!
//! 硬件解码器以异步方式工作: 输入环有容量限制, 输出按图像逐个取回,
//! 隔行源一次只给出一场. chd 把这些细节收敛为宿主熟悉的同步调用:
//! - **参数集重封装**: avcC 长度前缀记录转为 Annex B 起始码
//! - **输入提交**: 余量检查, 忙退避, 与输出轮询共用一个循环
//! - **场重组**: 两个半高场交织为一帧, 不完整时返回显式标记
//!
//! # 快速开始
//!
//! ```rust
//! use chd::codec::{CodecSubtype, InputFormat, StreamParameters};
//!
//! let params = StreamParameters {
//!     codec_name: "h264".into(),
//!     ..Default::default()
//! };
//! let format = InputFormat::resolve(&params).unwrap();
//! assert_eq!(format.subtype, CodecSubtype::H264);
//! println!("chd {}: {}", chd::version(), format.subtype);
//! ```
//!
//! # Crate 结构
//!
//! | Crate | 功能 |
//! |-------|------|
//! | `chd-core` | 错误类型与像素格式 |
//! | `chd-codec` | avcC 提取, 子类型解析, 设备契约, 输入泵, 场重组, 解码适配器 |

/// 核心类型与错误定义
pub use chd_core as core;

/// 解码适配层
pub use chd_codec as codec;

pub mod logging;

/// 获取 chd 版本号
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
