//! 解析の送信
//!
//! アップロード → レコード作成 → ジョブ起動の3段階。
//! ジョブ起動の失敗はログのみで、送信自体は成功扱い（ステータス追跡で検出する）。

use crate::backend::{Backend, JobTrigger, ObjectStore, RecordStore};
use crate::session::User;
use lazy_static::lazy_static;
use lucid_common::{AnalysisOptions, JobRequest, NewAnalysisRecord, RecordId, StagedFile};
use regex::Regex;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

lazy_static! {
    static ref UNSAFE_KEY_CHARS: Regex = Regex::new(r"[^A-Za-z0-9._-]").unwrap();
}

#[derive(Error, Debug)]
pub enum SubmissionError {
    #[error("Upload failed: {0}")]
    Upload(String),

    #[error("Failed to create analysis record: {0}")]
    CreateRecord(String),
}

/// ストレージのオブジェクトキー `{ミリ秒}-{ファイル名}`
pub fn storage_key(filename: &str, millis: i64) -> String {
    let mut name = UNSAFE_KEY_CHARS.replace_all(filename.trim(), "_").to_string();
    // ".." は親参照と誤認されるので潰す
    while name.contains("..") {
        name = name.replace("..", "_.");
    }
    if name.is_empty() {
        name = "image".to_string();
    }
    format!("{}-{}", millis, name)
}

#[derive(Clone)]
pub struct SubmissionClient {
    objects: Arc<dyn ObjectStore>,
    records: Arc<dyn RecordStore>,
    trigger: Arc<dyn JobTrigger>,
}

impl SubmissionClient {
    pub fn new(backend: &Backend) -> Self {
        Self {
            objects: backend.objects.clone(),
            records: backend.records.clone(),
            trigger: backend.trigger.clone(),
        }
    }

    /// ステージング済みファイルを送信してレコードIDを返す
    ///
    /// ファイルの所有権はここで受け取り、アップロード後に破棄する。
    pub async fn submit(
        &self,
        file: StagedFile,
        options: AnalysisOptions,
        user: Option<&User>,
    ) -> Result<RecordId, SubmissionError> {
        let key = storage_key(file.name(), chrono::Utc::now().timestamp_millis());
        debug!(key = %key, size = file.size(), "uploading image");

        self.objects
            .upload(&key, file.bytes(), file.content_type())
            .await
            .map_err(|e| SubmissionError::Upload(e.to_string()))?;

        // アップロード済みのオブジェクトはレコード作成に失敗しても残る
        let new_record = NewAnalysisRecord::processing(
            user.map(|u| u.id.clone()),
            key.clone(),
            file.name(),
            file.size(),
            options,
        );
        let record = self
            .records
            .insert(new_record)
            .await
            .map_err(|e| SubmissionError::CreateRecord(e.to_string()))?;
        info!(id = %record.id, key = %key, "analysis record created");

        if let Err(e) = self.trigger.invoke(&JobRequest::new(record.id.clone(), options)).await {
            warn!(id = %record.id, error = %e, "failed to trigger analysis job");
        }

        Ok(record.id)
    }
}
