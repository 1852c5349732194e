use std::{fs::OpenOptions, io::Write, path::PathBuf};

use anyhow::Result;
use once_cell::sync::Lazy;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

use crate::models::LlmProvider;

static OPTED_IN: Lazy<std::sync::atomic::AtomicBool> =
    Lazy::new(|| std::sync::atomic::AtomicBool::new(false));

/** \brief 遙測為選擇性加入，預設關閉。 */
pub fn set_enabled(enabled: bool) {
    OPTED_IN.store(enabled, std::sync::atomic::Ordering::Relaxed);
}

pub fn is_enabled() -> bool {
    OPTED_IN.load(std::sync::atomic::Ordering::Relaxed)
}

/**
 * \brief 記錄一般事件（大綱生成、匯出等操作節點）。
 */
pub fn log_event(category: &str, message: &str) {
    emit("INFO", category, message);
}

/**
 * \brief 記錄錯誤事件。
 */
pub fn log_error(category: &str, message: &str) {
    emit("ERROR", category, message);
}

/**
 * \brief AI 呼叫的統一記錄點：供應商、操作與結果。
 */
pub fn log_ai_call(provider: LlmProvider, operation: &str, outcome: &str) {
    emit(
        "INFO",
        "ai",
        &format!("{} {} -> {}", provider.as_str(), operation, outcome),
    );
}

fn emit(level: &str, category: &str, message: &str) {
    if !is_enabled() {
        return;
    }
    if let Err(err) = write_line(level, category, message) {
        eprintln!("telemetry: dropped log line ({})", err);
    }
}

fn write_line(level: &str, category: &str, message: &str) -> Result<()> {
    let log_dir = PathBuf::from("logs");
    std::fs::create_dir_all(&log_dir)?;
    let stamp = OffsetDateTime::now_utc().format(&Rfc3339)?;
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join("slidequill.log"))?;
    writeln!(file, "{stamp} {level} [{category}] {message}")?;
    Ok(())
}
