//! レポート出力（共通ライブラリ）

pub mod report_core;

pub use report_core::{build_report, report_json, AnalysisReport};
#[cfg(feature = "excel")]
pub use report_core::generate_report_buffer;
