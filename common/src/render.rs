//! 結果表示
//!
//! 完了レコードの結果マップを表示行へ変換する。

use crate::types::{AnalysisKind, AnalysisOptions, AnalysisRecord};
use serde::Serialize;
use std::collections::BTreeMap;

/// 結果表示の1行
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultRow {
    pub kind: AnalysisKind,
    pub label: &'static str,
    pub value: String,
}

/// レコードを表示行に変換
///
/// - 要求されていない項目は出さない
/// - 結果マップにキーがない項目も黙って省く
/// - 並びは常に `AnalysisKind::ALL` の順
pub fn present(record: &AnalysisRecord) -> Vec<ResultRow> {
    match &record.results {
        Some(results) => present_with(&record.analysis_options, results),
        None => Vec::new(),
    }
}

pub fn present_with(options: &AnalysisOptions, results: &BTreeMap<String, String>) -> Vec<ResultRow> {
    options
        .enabled_kinds()
        .filter_map(|kind| {
            results.get(kind.key()).map(|value| ResultRow {
                kind,
                label: kind.label(),
                value: value.clone(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AnalysisStatus, NewAnalysisRecord};

    fn completed(options: AnalysisOptions, pairs: &[(&str, &str)]) -> AnalysisRecord {
        let mut record = NewAnalysisRecord::processing(None, "k", "f.jpg", 1, options).into_record("id", None);
        record.status = AnalysisStatus::Completed;
        record.results = Some(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        );
        record
    }

    #[test]
    fn test_unrequested_options_are_omitted() {
        let record = completed(
            AnalysisOptions::only(&[AnalysisKind::Ocr]),
            &[("ocr", "hello"), ("location", "Location: New York, NY")],
        );

        let rows = present(&record);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].label, "OCR Text");
        assert_eq!(rows[0].value, "hello");
    }

    #[test]
    fn test_rows_follow_canonical_order() {
        let record = completed(
            AnalysisOptions::all(),
            &[("timestamp", "t"), ("ocr", "o"), ("aiScore", "72%"), ("editCheck", "No edits detected")],
        );

        let labels: Vec<&str> = present(&record).iter().map(|r| r.label).collect();
        assert_eq!(labels, vec!["AI Score", "Edited/Altered Image Check", "OCR Text", "Timestamp"]);
    }

    #[test]
    fn test_missing_result_key_is_skipped() {
        let record = completed(
            AnalysisOptions::only(&[AnalysisKind::AiScore, AnalysisKind::ImageMatches]),
            &[("aiScore", "61%")],
        );
        let rows = present(&record);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].kind, AnalysisKind::AiScore);
    }

    #[test]
    fn test_record_without_results_renders_nothing() {
        let record = NewAnalysisRecord::processing(None, "k", "f.jpg", 1, AnalysisOptions::all())
            .into_record("id", None);
        assert!(present(&record).is_empty());
    }
}
