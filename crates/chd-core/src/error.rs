//! 统一错误类型定义.
//!
//! 设备忙 (busy) 与暂无输出不属于错误, 由调用方在适配层内部消化,
//! 这里只列出会中断当前调用或流初始化的情况.

use thiserror::Error;

/// chd 适配层统一错误类型
#[derive(Debug, Error)]
pub enum ChdError {
    /// avcC 配置记录截断或内部不一致
    #[error("配置记录损坏: {0}")]
    MalformedConfig(String),

    /// 编解码器名称无法映射到硬件子类型
    #[error("未知编解码器: {0}")]
    UnknownCodec(String),

    /// 设备返回了非成功且非忙的状态
    #[error("设备错误: {op} 失败, status={code}")]
    Device {
        /// 失败的设备操作
        op: &'static str,
        /// 设备状态码
        code: u32,
    },

    /// 场配对状态机收到非法的场序列
    #[error("场顺序错误: {0}")]
    FieldOrder(String),

    /// 无效参数
    #[error("无效参数: {0}")]
    InvalidArgument(String),
}

/// chd 统一 Result 类型
pub type ChdResult<T> = Result<T, ChdError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_error_message() {
        let err = ChdError::Device {
            op: "open_decoder",
            code: 7,
        };
        let msg = format!("{err}");
        assert!(msg.contains("open_decoder"), "错误信息应包含操作名, actual={msg}");
        assert!(msg.contains("status=7"), "错误信息应包含状态码, actual={msg}");
    }
}
