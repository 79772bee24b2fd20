use super::LoggingConfig;
use anyhow::{Context, Result};
use chrono::{Duration as ChronoDuration, Local, NaiveDate};
use flate2::Compression;
use flate2::write::GzEncoder;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use tracing::warn;

/// 一次清理的统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetentionReport {
    pub removed: usize,
    pub compressed: usize,
}

impl RetentionReport {
    pub fn is_empty(&self) -> bool {
        self.removed == 0 && self.compressed == 0
    }
}

/// 删除超过保留天数的日志, 并压缩今天以前的未压缩日志
///
/// 单个文件处理失败只记录告警, 不中断其余文件.
pub fn cleanup_logs(config: &LoggingConfig) -> Result<RetentionReport> {
    cleanup_logs_at(config, Local::now().date_naive())
}

/// 以 `today` 为当天执行清理; 保留天数为负时按 0 处理, 当天的日志始终保留
pub(crate) fn cleanup_logs_at(config: &LoggingConfig, today: NaiveDate) -> Result<RetentionReport> {
    let directory = Path::new(&config.directory);
    let mut report = RetentionReport::default();
    if !directory.exists() {
        return Ok(report);
    }

    let cutoff = today - ChronoDuration::days(config.retention_days.max(0));

    let entries = fs::read_dir(directory)
        .with_context(|| format!("读取日志目录失败, path={}", directory.display()))?;
    for entry in entries {
        let entry = entry?;
        let file_name = entry.file_name().to_string_lossy().to_string();
        let file_path = entry.path();

        let Some((date, compressed)) = parse_rotated_log_name(&file_name, &config.file_prefix)
        else {
            continue;
        };

        if date < cutoff {
            match fs::remove_file(&file_path) {
                Ok(()) => report.removed += 1,
                Err(err) => warn!("删除过期日志失败, path={}: {}", file_path.display(), err),
            }
            continue;
        }

        if config.compress_history && !compressed && date < today {
            match compress_to_gz(&file_path) {
                Ok(true) => report.compressed += 1,
                Ok(false) => {}
                Err(err) => warn!("压缩日志失败: {:#}", err),
            }
        }
    }

    Ok(report)
}

/// 压缩为同名 `.gz` 并删除原文件; 目标已存在时跳过并返回 `false`
fn compress_to_gz(path: &Path) -> Result<bool> {
    let gz_path = PathBuf::from(format!("{}.gz", path.display()));
    if gz_path.exists() {
        return Ok(false);
    }

    let mut input =
        File::open(path).with_context(|| format!("打开待压缩日志失败, path={}", path.display()))?;
    let output = File::create(&gz_path)
        .with_context(|| format!("创建压缩日志失败, path={}", gz_path.display()))?;
    let mut encoder = GzEncoder::new(output, Compression::default());
    io::copy(&mut input, &mut encoder)?;
    encoder.finish()?;

    fs::remove_file(path)
        .with_context(|| format!("删除已压缩日志失败, path={}", path.display()))?;
    Ok(true)
}

fn parse_rotated_log_name(file_name: &str, prefix: &str) -> Option<(NaiveDate, bool)> {
    let with_dot = file_name.strip_prefix(prefix)?.strip_prefix('.')?;

    if let Some(date_part) = with_dot.strip_suffix(".log") {
        return parse_date(date_part).map(|date| (date, false));
    }
    if let Some(date_part) = with_dot.strip_suffix(".log.gz") {
        return parse_date(date_part).map(|date| (date, true));
    }
    None
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    if value.len() != 10 {
        return None;
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::build_current_log_path;
    use flate2::read::GzDecoder;
    use std::io::Read;
    use tempfile::TempDir;

    fn config_in(dir: &TempDir, compress_history: bool) -> LoggingConfig {
        LoggingConfig {
            level: "info".to_string(),
            directory: dir.path().to_string_lossy().to_string(),
            file_prefix: "chd".to_string(),
            retention_days: 30,
            compress_history,
        }
    }

    fn write_log(config: &LoggingConfig, days_ago: i64, content: &str) -> PathBuf {
        let date = Local::now().date_naive() - ChronoDuration::days(days_ago);
        let path = build_current_log_path(Path::new(&config.directory), &config.file_prefix, date);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_parse_rotated_log_name() {
        let parsed = parse_rotated_log_name("chd.2026-02-06.log", "chd");
        assert_eq!(parsed, NaiveDate::from_ymd_opt(2026, 2, 6).map(|d| (d, false)));

        let parsed = parse_rotated_log_name("chd.2026-02-06.log.gz", "chd");
        assert_eq!(parsed, NaiveDate::from_ymd_opt(2026, 2, 6).map(|d| (d, true)));

        assert!(parse_rotated_log_name("chd.log", "chd").is_none());
        assert!(parse_rotated_log_name("other.2026-02-06.log", "chd").is_none());
        assert!(parse_rotated_log_name("chd.2026-2-6.log", "chd").is_none());
    }

    #[test]
    fn test_cleanup_removes_expired_and_compresses_history() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir, true);

        let expired = write_log(&config, 40, "old");
        let yesterday = write_log(&config, 1, "yesterday");
        let today = write_log(&config, 0, "today");
        fs::write(dir.path().join("unrelated.txt"), "keep").unwrap();

        let report = cleanup_logs(&config).unwrap();
        assert_eq!(
            report,
            RetentionReport {
                removed: 1,
                compressed: 1
            }
        );

        assert!(!expired.exists());
        assert!(!yesterday.exists());
        assert!(today.exists());
        assert!(dir.path().join("unrelated.txt").exists());

        let gz_path = PathBuf::from(format!("{}.gz", yesterday.display()));
        let mut decoded = String::new();
        GzDecoder::new(File::open(gz_path).unwrap())
            .read_to_string(&mut decoded)
            .unwrap();
        assert_eq!(decoded, "yesterday");
    }

    #[test]
    fn test_cleanup_without_compression_keeps_plain_history() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir, false);
        let yesterday = write_log(&config, 1, "yesterday");

        let report = cleanup_logs(&config).unwrap();
        assert!(report.is_empty());
        assert!(yesterday.exists());
    }

    #[test]
    fn test_cleanup_missing_directory_is_noop() {
        let dir = TempDir::new().unwrap();
        let mut config = config_in(&dir, true);
        config.directory = dir.path().join("missing").to_string_lossy().to_string();
        assert!(cleanup_logs(&config).unwrap().is_empty());
    }

    #[test]
    fn test_negative_retention_keeps_current_log() {
        let dir = TempDir::new().unwrap();
        let mut config = config_in(&dir, true);
        config.retention_days = -5;
        let today = write_log(&config, 0, "today");
        let yesterday = write_log(&config, 1, "yesterday");

        let report = cleanup_logs(&config).unwrap();
        assert_eq!(report.removed, 1);
        assert!(today.exists(), "当天日志不能被删除");
        assert!(!yesterday.exists());
    }
}
