//! レポートファイル出力
//!
//! 拡張子で形式を決める（`.xlsx` → Excel、それ以外 → JSON）。

use crate::error::{LucidError, Result};
use lucid_common::export::{build_report, generate_report_buffer, report_json};
use lucid_common::AnalysisRecord;
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Json,
    Excel,
}

impl ReportFormat {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("xlsx") => ReportFormat::Excel,
            _ => ReportFormat::Json,
        }
    }
}

/// 解析レコードのレポートを書き出す
pub fn write_report(record: &AnalysisRecord, output_path: &Path) -> Result<ReportFormat> {
    if !record.is_terminal() {
        return Err(LucidError::NotFinished(record.id.clone()));
    }

    let report = build_report(record, chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string());
    let format = ReportFormat::from_path(output_path);
    let bytes = match format {
        ReportFormat::Json => report_json(&report)?.into_bytes(),
        ReportFormat::Excel => generate_report_buffer(&report)?,
    };

    if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(output_path, bytes)
        .map_err(|e| LucidError::Report(format!("{}: {}", output_path.display(), e)))?;

    info!(path = %output_path.display(), ?format, "report written");
    Ok(format)
}
