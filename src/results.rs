//! 結果画面
//!
//! 完了レコードを表示行に変換し、保存画像の署名付きURLを添える。

use crate::backend::ObjectStore;
use crate::session::User;
use lucid_common::{present, AnalysisRecord, ResultRow};
use std::fmt::Write as _;
use std::time::Duration;
use tracing::warn;

pub const GUEST_TITLE: &str = "Your Analysis Results";

#[derive(Debug, Clone, PartialEq)]
pub struct ResultsView {
    pub analysis_id: String,
    pub filename: String,
    pub greeting: String,
    pub rows: Vec<ResultRow>,
    /// 署名に失敗した場合は `None`
    pub image_url: Option<String>,
}

pub fn greeting(user: Option<&User>) -> String {
    match user {
        Some(user) => format!("Welcome back, {}. Here are your results.", user.name),
        None => GUEST_TITLE.to_string(),
    }
}

impl ResultsView {
    pub async fn load(
        objects: &dyn ObjectStore,
        record: &AnalysisRecord,
        user: Option<&User>,
        ttl: Duration,
    ) -> Self {
        let image_url = match objects.signed_url(&record.image_path, ttl).await {
            Ok(url) => Some(url),
            Err(e) => {
                warn!(id = %record.id, error = %e, "could not sign image url");
                None
            }
        };

        Self {
            analysis_id: record.id.clone(),
            filename: record.filename.clone(),
            greeting: greeting(user),
            rows: present(record),
            image_url,
        }
    }

    /// 端末表示用テキスト
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{}", self.greeting);
        let _ = writeln!(out);
        let _ = writeln!(out, "Image: {}", self.filename);
        if let Some(url) = &self.image_url {
            let _ = writeln!(out, "Preview: {}", url);
        }
        let _ = writeln!(out);

        if self.rows.is_empty() {
            let _ = writeln!(out, "No results available.");
            return out;
        }

        let width = self.rows.iter().map(|r| r.label.len()).max().unwrap_or(0);
        for row in &self.rows {
            let _ = writeln!(out, "  {:<width$}  {}", row.label, row.value, width = width);
        }
        out
    }
}
