//! 解析レポート生成
//!
//! 結果画面の内容（ファイル名・ステータス・結果行）を JSON / Excel に書き出す。

use crate::error::Result;
use crate::render::{present, ResultRow};
use crate::types::{AnalysisRecord, AnalysisStatus};
use serde::Serialize;

/// レポート本体
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    pub analysis_id: String,
    pub filename: String,
    pub file_size: u64,
    pub status: AnalysisStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub generated_at: String,
    pub rows: Vec<ResultRow>,
}

/// レコードからレポートを組み立てる
pub fn build_report(record: &AnalysisRecord, generated_at: impl Into<String>) -> AnalysisReport {
    AnalysisReport {
        analysis_id: record.id.clone(),
        filename: record.filename.clone(),
        file_size: record.file_size,
        status: record.status,
        error_message: record.error_message.clone(),
        generated_at: generated_at.into(),
        rows: present(record),
    }
}

/// JSON文字列に変換
pub fn report_json(report: &AnalysisReport) -> Result<String> {
    Ok(serde_json::to_string_pretty(report)?)
}

/// Excelをバッファに生成
#[cfg(feature = "excel")]
pub fn generate_report_buffer(report: &AnalysisReport) -> Result<Vec<u8>> {
    use crate::error::Error;
    use rust_xlsxwriter::{Color, Format, FormatBorder, Workbook};

    let export_err = |context: &str, e: rust_xlsxwriter::XlsxError| Error::Export(format!("{}: {}", context, e));

    let mut workbook = Workbook::new();

    let label_format = Format::new()
        .set_bold()
        .set_background_color(Color::RGB(0xF5F5F5))
        .set_border(FormatBorder::Hair);
    let value_format = Format::new()
        .set_text_wrap()
        .set_border(FormatBorder::Hair);

    let worksheet = workbook.add_worksheet();
    worksheet
        .set_name("Analysis")
        .map_err(|e| export_err("シート名設定エラー", e))?;
    worksheet
        .set_column_width(0, 28)
        .map_err(|e| export_err("列幅設定エラー", e))?;
    worksheet
        .set_column_width(1, 60)
        .map_err(|e| export_err("列幅設定エラー", e))?;

    let mut header: Vec<(&str, String)> = vec![
        ("Analysis ID", report.analysis_id.clone()),
        ("File", report.filename.clone()),
        ("Size", format!("{}KB", report.file_size / 1024)),
        ("Status", report.status.to_string()),
        ("Generated", report.generated_at.clone()),
    ];
    if let Some(message) = &report.error_message {
        header.push(("Error", message.clone()));
    }

    let mut row: u32 = 0;
    for (label, value) in header.iter().map(|(l, v)| (*l, v.as_str())).chain(
        report.rows.iter().map(|r| (r.label, r.value.as_str())),
    ) {
        worksheet
            .write_string_with_format(row, 0, label, &label_format)
            .map_err(|e| export_err("ラベル書き込みエラー", e))?;
        worksheet
            .write_string_with_format(row, 1, value, &value_format)
            .map_err(|e| export_err("値書き込みエラー", e))?;
        row += 1;
    }

    workbook
        .save_to_buffer()
        .map_err(|e| export_err("Excel保存エラー", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AnalysisKind, AnalysisOptions, NewAnalysisRecord};

    fn completed_record() -> AnalysisRecord {
        let mut record = NewAnalysisRecord::processing(
            Some("user-1".to_string()),
            "1700000000000-photo.jpg",
            "photo.jpg",
            4096,
            AnalysisOptions::only(&[AnalysisKind::AiScore, AnalysisKind::Ocr]),
        )
        .into_record("rec-1", None);
        record.status = AnalysisStatus::Completed;
        record.results = Some(
            [("aiScore", "72%"), ("ocr", "Sample text"), ("location", "hidden")]
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        );
        record
    }

    #[test]
    fn test_build_report_uses_rendered_rows() {
        let report = build_report(&completed_record(), "2026-01-18 10:00:00");
        assert_eq!(report.rows.len(), 2);
        assert_eq!(report.rows[0].label, "AI Score");
        assert_eq!(report.rows[1].label, "OCR Text");
    }

    #[test]
    fn test_report_json_fields() {
        let report = build_report(&completed_record(), "now");
        let json = report_json(&report).expect("JSON生成失敗");
        assert!(json.contains("\"analysisId\": \"rec-1\""));
        assert!(json.contains("\"status\": \"completed\""));
        assert!(!json.contains("errorMessage"));
        assert!(!json.contains("hidden"));
    }

    #[cfg(feature = "excel")]
    #[test]
    fn test_generate_report_buffer_is_xlsx() {
        let report = build_report(&completed_record(), "now");
        let buffer = generate_report_buffer(&report).expect("Excel生成失敗");
        // xlsx は zip コンテナ
        assert!(buffer.starts_with(b"PK"));
    }
}
