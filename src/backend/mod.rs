//! バックエンド抽象
//!
//! - ObjectStore: 画像ファイルの保存と署名付きURL
//! - RecordStore: `image_analysis` レコードの作成・参照・終端遷移
//! - JobTrigger: リモート解析ジョブの起動（fire-and-forget）

pub mod local;
pub mod memory;
pub mod supabase;

use crate::config::{BackendKind, Config};
use crate::error::Result;
use crate::worker::{AnalysisWorker, LocalJobTrigger};
use async_trait::async_trait;
use lucid_common::{AnalysisRecord, AnalysisStatus, JobRequest, NewAnalysisRecord};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

pub use local::{LocalObjectStore, LocalRecordStore};
pub use memory::{MemoryObjectStore, MemoryRecordStore};
pub use supabase::SupabaseClient;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("record not found: {0}")]
    NotFound(String),

    #[error("object not found: {0}")]
    ObjectNotFound(String),

    #[error("record {0} is already in a terminal state")]
    AlreadyTerminal(String),

    #[error("object already exists: {0}")]
    ObjectExists(String),

    #[error("invalid object key: {0}")]
    InvalidKey(String),

    #[error("unsupported record file version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },

    #[error("request failed: {0}")]
    Request(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type BackendResult<T> = std::result::Result<T, BackendError>;

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn upload(&self, key: &str, bytes: &[u8], content_type: &str) -> BackendResult<()>;

    async fn download(&self, key: &str) -> BackendResult<Vec<u8>>;

    /// 期限付きの読み取りURL
    async fn signed_url(&self, key: &str, ttl: Duration) -> BackendResult<String>;
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn insert(&self, record: NewAnalysisRecord) -> BackendResult<AnalysisRecord>;

    async fn get(&self, id: &str) -> BackendResult<AnalysisRecord>;

    /// processing → completed
    async fn complete(&self, id: &str, results: BTreeMap<String, String>) -> BackendResult<()>;

    /// processing → failed
    async fn fail(&self, id: &str, message: &str) -> BackendResult<()>;
}

#[async_trait]
pub trait JobTrigger: Send + Sync {
    async fn invoke(&self, request: &JobRequest) -> BackendResult<()>;
}

/// 終端への遷移
pub(crate) enum Transition {
    Complete(BTreeMap<String, String>),
    Fail(String),
}

/// 終端遷移を適用。終端済みのレコードは変更しない
pub(crate) fn apply_transition(record: &mut AnalysisRecord, transition: Transition) -> BackendResult<()> {
    if record.status.is_terminal() {
        return Err(BackendError::AlreadyTerminal(record.id.clone()));
    }

    match transition {
        Transition::Complete(results) => {
            record.status = AnalysisStatus::Completed;
            record.results = Some(results);
            record.error_message = None;
        }
        Transition::Fail(message) => {
            record.status = AnalysisStatus::Failed;
            record.results = None;
            record.error_message = Some(message);
        }
    }
    Ok(())
}

/// オブジェクトキーの検証（パス区切りや親参照を拒否）
pub(crate) fn check_object_key(key: &str) -> BackendResult<()> {
    if key.is_empty() || key.contains('/') || key.contains('\\') || key.contains("..") {
        return Err(BackendError::InvalidKey(key.to_string()));
    }
    Ok(())
}

/// 3つのバックエンド機能の組
#[derive(Clone)]
pub struct Backend {
    pub objects: Arc<dyn ObjectStore>,
    pub records: Arc<dyn RecordStore>,
    pub trigger: Arc<dyn JobTrigger>,
}

impl Backend {
    pub fn from_config(config: &Config) -> Result<Self> {
        match config.backend {
            BackendKind::Local => {
                let root = config.data_dir()?;
                Ok(Self::local(&root, &config.signing_secret, config.worker_delay()))
            }
            BackendKind::Memory => Ok(Self::in_memory(config.worker_delay())),
            BackendKind::Supabase => {
                let client = SupabaseClient::new(
                    config.get_supabase_url()?,
                    config.get_supabase_key()?,
                    config.bucket.clone(),
                );
                Ok(Self::hosted(Arc::new(client)))
            }
        }
    }

    /// ファイルシステム + プロセス内ワーカー
    pub fn local(root: &std::path::Path, secret: &str, worker_delay: Duration) -> Self {
        let objects: Arc<dyn ObjectStore> = Arc::new(LocalObjectStore::new(root.join("objects"), secret));
        let records: Arc<dyn RecordStore> = Arc::new(LocalRecordStore::new(root));
        Self::with_local_worker(objects, records, worker_delay)
    }

    /// メモリ + プロセス内ワーカー
    pub fn in_memory(worker_delay: Duration) -> Self {
        let objects: Arc<dyn ObjectStore> = Arc::new(MemoryObjectStore::new());
        let records: Arc<dyn RecordStore> = Arc::new(MemoryRecordStore::new());
        Self::with_local_worker(objects, records, worker_delay)
    }

    /// 既存のストアにプロセス内ワーカーを組み合わせる
    pub fn with_local_worker(
        objects: Arc<dyn ObjectStore>,
        records: Arc<dyn RecordStore>,
        worker_delay: Duration,
    ) -> Self {
        let worker = Arc::new(AnalysisWorker::new(objects.clone(), records.clone()));
        let trigger: Arc<dyn JobTrigger> = Arc::new(LocalJobTrigger::new(worker, worker_delay));
        Self {
            objects,
            records,
            trigger,
        }
    }

    /// 解析はホスト側の Edge Function が担当
    pub fn hosted(client: Arc<SupabaseClient>) -> Self {
        Self {
            objects: client.clone(),
            records: client.clone(),
            trigger: client,
        }
    }

    /// このバックエンドのストアを使うワーカー
    pub fn worker(&self) -> AnalysisWorker {
        AnalysisWorker::new(self.objects.clone(), self.records.clone())
    }
}
