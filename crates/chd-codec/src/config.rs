//! 适配层运行参数.
//!
//! 所有字段都有默认值, 可从 JSON/TOML 等配置中只覆盖需要的部分.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::device::OpenMode;

fn default_input_margin() -> usize {
    1024
}

fn default_backoff_ms() -> u64 {
    1
}

fn default_output_timeout_ms() -> u64 {
    2000
}

fn default_max_wait_rounds() -> u32 {
    2000
}

fn default_unseen_baseline() -> u32 {
    10
}

fn default_flush_mode() -> u32 {
    4
}

/// 解码适配器配置
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DecoderConfig {
    /// 提交前要求输入缓冲区额外保留的字节数
    #[serde(default = "default_input_margin")]
    pub input_margin: usize,
    /// 输入已满或设备忙时的退避间隔 (毫秒)
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
    /// 取输出时传给设备的超时 (毫秒)
    #[serde(default = "default_output_timeout_ms")]
    pub output_timeout_ms: u64,
    /// 提交/轮询循环在输入满且无输出时的最大等待轮数
    #[serde(default = "default_max_wait_rounds")]
    pub max_wait_rounds: u32,
    /// 未见帧查询结果的固定基数 (反映流水线深度)
    #[serde(default = "default_unseen_baseline")]
    pub unseen_baseline: u32,
    /// 重同步时清空输入使用的模式参数
    #[serde(default = "default_flush_mode")]
    pub flush_mode: u32,
    /// 设备打开模式
    #[serde(skip)]
    pub open_mode: OpenMode,
}

impl DecoderConfig {
    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }

    pub fn output_timeout(&self) -> Duration {
        Duration::from_millis(self.output_timeout_ms)
    }
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            input_margin: default_input_margin(),
            backoff_ms: default_backoff_ms(),
            output_timeout_ms: default_output_timeout_ms(),
            max_wait_rounds: default_max_wait_rounds(),
            unseen_baseline: default_unseen_baseline(),
            flush_mode: default_flush_mode(),
            open_mode: OpenMode::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = DecoderConfig::default();
        assert_eq!(cfg.input_margin, 1024);
        assert_eq!(cfg.backoff(), Duration::from_millis(1));
        assert_eq!(cfg.output_timeout(), Duration::from_millis(2000));
        assert_eq!(cfg.unseen_baseline, 10);
        assert_eq!(cfg.flush_mode, 4);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let cfg: DecoderConfig =
            serde_json::from_str(r#"{"backoff_ms": 0, "unseen_baseline": 3}"#).unwrap();
        assert_eq!(cfg.backoff_ms, 0);
        assert_eq!(cfg.unseen_baseline, 3);
        assert_eq!(cfg.input_margin, 1024);
        assert_eq!(cfg.open_mode, OpenMode::playback());
    }
}
