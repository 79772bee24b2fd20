//! chd-probe - 码流配置探测工具
//!
//! 读取容器中的额外数据 (avcC 记录或原始序列头), 按硬件适配层的规则
//! 解析出设备输入格式, 并列出重封装后的参数集 NAL 单元.

use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context, Result};
use clap::Parser;
use log::debug;
use serde::Serialize;

use chd::logging::{self, LoggingConfig};
use chd_codec::parsers::h264::{ConfigFraming, split_annex_b};
use chd_codec::{InputFormat, StreamParameters};

/// chd 码流配置探测工具
#[derive(Parser, Debug)]
#[command(name = "chd-probe", version, about = "解析额外数据并显示硬件解码器输入格式")]
struct Cli {
    /// 额外数据文件 (avcC 记录或 Annex B 序列头)
    extradata: PathBuf,

    /// 编解码器名称 (支持 chd 前缀, 如 chdh264)
    #[arg(long, default_value = "h264")]
    codec: String,

    /// 显示宽度
    #[arg(long, default_value_t = 1920)]
    width: u32,

    /// 显示高度
    #[arg(long, default_value_t = 1080)]
    height: u32,

    /// 以十六进制显示每个 NAL 单元
    #[arg(long)]
    hex: bool,

    /// 输出 JSON 格式
    #[arg(long)]
    json: bool,

    /// 把交给设备的元数据写入文件
    #[arg(long, value_name = "FILE")]
    dump: Option<PathBuf>,

    /// 输出调试日志
    #[arg(short, long)]
    verbose: bool,

    /// 调试日志目录
    #[arg(long, default_value = "logs")]
    log_dir: String,
}

// ============================================================
// JSON 输出结构体
// ============================================================

/// 探测结果
#[derive(Serialize, Debug)]
struct ProbeReport {
    codec: String,
    subtype: String,
    hw_code: u8,
    framing: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    nal_length_size: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    start_code_size: Option<u8>,
    width: u32,
    height: u32,
    metadata_size: usize,
    opt_flags: String,
    nal_units: Vec<NalInfo>,
}

/// 单个 NAL 单元
#[derive(Serialize, Debug)]
struct NalInfo {
    index: usize,
    nal_type: String,
    size: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    hex: Option<String>,
}

// ============================================================
// 主逻辑
// ============================================================

fn main() {
    let cli = Cli::parse();
    if let Err(err) = run(&cli) {
        eprintln!("错误: {err:#}");
        process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    if cli.verbose {
        logging::init(LoggingConfig {
            level: "debug".to_string(),
            directory: cli.log_dir.clone(),
            file_prefix: "chd-probe".to_string(),
            ..Default::default()
        })?;
    }

    let params = load_params(&cli.extradata, &cli.codec, cli.width, cli.height)?;
    debug!(
        "读取额外数据: {} ({} 字节)",
        cli.extradata.display(),
        params.extra_data.len()
    );

    let format = InputFormat::resolve(&params)
        .with_context(|| format!("无法为 '{}' 构建输入格式", cli.codec))?;
    let report = build_report(&params, &format, cli.hex);

    if let Some(path) = &cli.dump {
        fs::write(path, &format.metadata)
            .with_context(|| format!("写入元数据失败, path={}", path.display()))?;
        debug!("元数据已写入 {}", path.display());
    }

    if cli.json {
        let json = serde_json::to_string_pretty(&report).context("序列化探测结果失败")?;
        println!("{json}");
    } else {
        print_report_text(&report);
    }
    Ok(())
}

fn load_params(path: &Path, codec: &str, width: u32, height: u32) -> Result<StreamParameters> {
    let extra_data =
        fs::read(path).with_context(|| format!("无法读取额外数据, path={}", path.display()))?;
    Ok(StreamParameters {
        codec_name: codec.to_string(),
        extra_data,
        width,
        height,
    })
}

fn build_report(params: &StreamParameters, format: &InputFormat, with_hex: bool) -> ProbeReport {
    let (framing, nal_length_size) = match format.framing {
        ConfigFraming::LengthPrefixed { nal_length_size } => ("avcC", Some(nal_length_size)),
        ConfigFraming::AnnexB => ("annex-b", None),
    };

    let nal_units = if format.subtype.is_h264() {
        split_annex_b(&format.metadata)
            .iter()
            .enumerate()
            .map(|(index, nal)| NalInfo {
                index,
                nal_type: nal.nal_type.to_string(),
                size: nal.data.len(),
                hex: with_hex.then(|| to_hex(nal.data)),
            })
            .collect()
    } else {
        Vec::new()
    };

    ProbeReport {
        codec: params.codec_name.clone(),
        subtype: format.subtype.to_string(),
        hw_code: format.subtype.hw_code(),
        framing: framing.to_string(),
        nal_length_size,
        start_code_size: format.start_code_size,
        width: format.width,
        height: format.height,
        metadata_size: format.metadata_size(),
        opt_flags: format!("0x{:08x}", format.opt_flags),
        nal_units,
    }
}

fn to_hex(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// 文本输出
fn print_report_text(report: &ProbeReport) {
    println!("[INPUT FORMAT]");
    println!("  编解码器     : {}", report.codec);
    println!("  子类型       : {} (hw={})", report.subtype, report.hw_code);
    println!("  封装         : {}", report.framing);
    if let Some(size) = report.nal_length_size {
        println!("  NAL 长度字段 : {size} 字节");
    }
    if let Some(size) = report.start_code_size {
        println!("  起始码长度   : {size} 字节");
    }
    println!("  分辨率       : {}x{}", report.width, report.height);
    println!("  元数据大小   : {} 字节", report.metadata_size);
    println!("  选项位       : {}", report.opt_flags);
    println!("[/INPUT FORMAT]");

    if report.nal_units.is_empty() {
        return;
    }
    println!();
    for nal in &report.nal_units {
        println!("[NAL #{}] {} ({} 字节)", nal.index, nal.nal_type, nal.size);
        if let Some(hex) = &nal.hex {
            println!("  {hex}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn avcc_record() -> Vec<u8> {
        vec![
            0x01, 0x4D, 0x40, 0x1F, 0xFF, 0xE1, // 头部, length_size=4, 1 个 SPS
            0x00, 0x03, 0x67, 0x4D, 0x40, // SPS
            0x01, 0x00, 0x02, 0x68, 0xEE, // PPS
        ]
    }

    #[test]
    fn test_report_lists_reframed_parameter_sets() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("avcc.bin");
        fs::write(&path, avcc_record()).unwrap();

        let params = load_params(&path, "chdh264", 1280, 720).unwrap();
        let format = InputFormat::resolve(&params).unwrap();
        let report = build_report(&params, &format, true);

        assert_eq!(report.subtype, "avc1");
        assert_eq!(report.hw_code, 6);
        assert_eq!(report.framing, "avcC");
        assert_eq!(report.nal_length_size, Some(4));
        assert_eq!(report.metadata_size, 4 + 3 + 4 + 2);
        assert_eq!(report.nal_units.len(), 2);
        assert_eq!(report.nal_units[0].size, 3);
        assert_eq!(report.nal_units[1].hex.as_deref(), Some("68 ee"));
    }

    #[test]
    fn test_unknown_codec_fails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("seq.bin");
        fs::write(&path, [0x00, 0x00, 0x01, 0xB3]).unwrap();

        let params = load_params(&path, "theora", 720, 576).unwrap();
        assert!(InputFormat::resolve(&params).is_err());
    }

    #[test]
    fn test_missing_file_fails() {
        let dir = TempDir::new().unwrap();
        assert!(load_params(&dir.path().join("none.bin"), "h264", 0, 0).is_err());
    }
}
