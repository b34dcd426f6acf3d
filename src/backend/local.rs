//! ローカルファイルのバックエンド
//!
//! - 画像: `{root}/objects/{key}`
//! - レコード: `{root}/image_analysis.json`（変更のたびに全体を書き直す）
//! - 署名付きURL: `file://{path}?expires={unix}&token={sha256}`

use super::{apply_transition, check_object_key, BackendError, BackendResult, ObjectStore, RecordStore, Transition};
use async_trait::async_trait;
use lucid_common::{AnalysisRecord, NewAnalysisRecord};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

const RECORDS_FILE_NAME: &str = "image_analysis.json";

/// レコードファイルの構造
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RecordsFile {
    /// バージョン（互換性チェック用）
    version: u32,
    records: BTreeMap<String, AnalysisRecord>,
}

impl RecordsFile {
    const CURRENT_VERSION: u32 = 1;

    /// ファイルがなければ空。読めない・壊れている・版が違う場合はエラー
    async fn load(path: &Path) -> BackendResult<Self> {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(e.into()),
        };

        let file: RecordsFile = serde_json::from_slice(&bytes)?;
        if file.version != Self::CURRENT_VERSION {
            return Err(BackendError::UnsupportedVersion {
                found: file.version,
                expected: Self::CURRENT_VERSION,
            });
        }
        Ok(file)
    }

    async fn save(&self, path: &Path) -> BackendResult<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let bytes = serde_json::to_vec_pretty(self)?;
        tokio::fs::write(path, bytes).await?;
        Ok(())
    }
}

impl Default for RecordsFile {
    fn default() -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            records: BTreeMap::new(),
        }
    }
}

pub struct LocalRecordStore {
    path: PathBuf,
    // 読み込み → 変更 → 書き込みを直列化
    lock: Mutex<()>,
}

impl LocalRecordStore {
    pub fn new(root: &Path) -> Self {
        Self {
            path: root.join(RECORDS_FILE_NAME),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 保存済みレコード数
    pub async fn len(&self) -> BackendResult<usize> {
        let _guard = self.lock.lock().await;
        Ok(RecordsFile::load(&self.path).await?.records.len())
    }

    async fn transition(&self, id: &str, transition: Transition) -> BackendResult<()> {
        let _guard = self.lock.lock().await;
        let mut file = RecordsFile::load(&self.path).await?;
        let record = file
            .records
            .get_mut(id)
            .ok_or_else(|| BackendError::NotFound(id.to_string()))?;
        apply_transition(record, transition)?;
        file.save(&self.path).await
    }
}

#[async_trait]
impl RecordStore for LocalRecordStore {
    async fn insert(&self, record: NewAnalysisRecord) -> BackendResult<AnalysisRecord> {
        let _guard = self.lock.lock().await;
        let mut file = RecordsFile::load(&self.path).await?;

        let id = uuid::Uuid::new_v4().to_string();
        let record = record.into_record(id.clone(), Some(chrono::Utc::now().to_rfc3339()));
        file.records.insert(id, record.clone());
        file.save(&self.path).await?;
        Ok(record)
    }

    async fn get(&self, id: &str) -> BackendResult<AnalysisRecord> {
        let _guard = self.lock.lock().await;
        RecordsFile::load(&self.path)
            .await?
            .records
            .remove(id)
            .ok_or_else(|| BackendError::NotFound(id.to_string()))
    }

    async fn complete(&self, id: &str, results: BTreeMap<String, String>) -> BackendResult<()> {
        self.transition(id, Transition::Complete(results)).await
    }

    async fn fail(&self, id: &str, message: &str) -> BackendResult<()> {
        self.transition(id, Transition::Fail(message.to_string())).await
    }
}

pub struct LocalObjectStore {
    root: PathBuf,
    secret: String,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>, secret: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            secret: secret.into(),
        }
    }

    pub fn object_path(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }

    fn sign(&self, key: &str, expires: i64) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.secret.as_bytes());
        hasher.update(b"|");
        hasher.update(key.as_bytes());
        hasher.update(b"|");
        hasher.update(expires.to_string().as_bytes());
        hex::encode(hasher.finalize())
    }

    fn signed_url_at(&self, key: &str, expires: i64) -> String {
        format!(
            "file://{}?expires={}&token={}",
            self.object_path(key).display(),
            expires,
            self.sign(key, expires)
        )
    }

    /// 署名付きURLを検証（`now` はUNIX秒）
    pub fn verify_signed_url(&self, url: &str, now: i64) -> bool {
        let Some((location, query)) = url.split_once('?') else {
            return false;
        };
        let Some(key) = location.rsplit('/').next() else {
            return false;
        };

        let mut expires = None;
        let mut token = None;
        for pair in query.split('&') {
            match pair.split_once('=') {
                Some(("expires", value)) => expires = value.parse::<i64>().ok(),
                Some(("token", value)) => token = Some(value),
                _ => {}
            }
        }

        match (expires, token) {
            (Some(expires), Some(token)) => now <= expires && self.sign(key, expires) == token,
            _ => false,
        }
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn upload(&self, key: &str, bytes: &[u8], _content_type: &str) -> BackendResult<()> {
        check_object_key(key)?;
        tokio::fs::create_dir_all(&self.root).await?;
        let mut file = match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(self.object_path(key))
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(BackendError::ObjectExists(key.to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        file.write_all(bytes).await?;
        file.flush().await?;
        Ok(())
    }

    async fn download(&self, key: &str) -> BackendResult<Vec<u8>> {
        check_object_key(key)?;
        match tokio::fs::read(self.object_path(key)).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(BackendError::ObjectNotFound(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn signed_url(&self, key: &str, ttl: Duration) -> BackendResult<String> {
        check_object_key(key)?;
        if !self.object_path(key).exists() {
            return Err(BackendError::ObjectNotFound(key.to_string()));
        }
        let expires = chrono::Utc::now().timestamp() + ttl.as_secs() as i64;
        Ok(self.signed_url_at(key, expires))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lucid_common::{AnalysisOptions, AnalysisStatus};
    use tempfile::tempdir;

    fn new_record() -> NewAnalysisRecord {
        NewAnalysisRecord::processing(Some("u1".into()), "1-a.jpg", "a.jpg", 10, AnalysisOptions::all())
    }

    #[tokio::test]
    async fn test_records_persist_across_instances() {
        let dir = tempdir().expect("Failed to create temp dir");
        let store = LocalRecordStore::new(dir.path());
        let record = store.insert(new_record()).await.unwrap();

        let reopened = LocalRecordStore::new(dir.path());
        let loaded = reopened.get(&record.id).await.unwrap();
        assert_eq!(loaded.filename, "a.jpg");
        assert_eq!(loaded.user_id.as_deref(), Some("u1"));
        assert_eq!(reopened.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_complete_is_persisted_and_final() {
        let dir = tempdir().expect("Failed to create temp dir");
        let store = LocalRecordStore::new(dir.path());
        let record = store.insert(new_record()).await.unwrap();

        let results: BTreeMap<String, String> = [("aiScore".to_string(), "88%".to_string())].into();
        store.complete(&record.id, results).await.unwrap();

        let loaded = store.get(&record.id).await.unwrap();
        assert_eq!(loaded.status, AnalysisStatus::Completed);
        assert!(matches!(
            store.fail(&record.id, "late").await,
            Err(BackendError::AlreadyTerminal(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_record_file_is_empty() {
        let dir = tempdir().expect("Failed to create temp dir");
        let store = LocalRecordStore::new(dir.path());
        assert_eq!(store.len().await.unwrap(), 0);
        assert!(matches!(store.get("anything").await, Err(BackendError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_corrupted_record_file_is_not_overwritten() {
        let dir = tempdir().expect("Failed to create temp dir");
        let path = dir.path().join(RECORDS_FILE_NAME);
        std::fs::write(&path, "{ invalid json }").unwrap();

        let store = LocalRecordStore::new(dir.path());
        assert!(matches!(store.len().await, Err(BackendError::Json(_))));
        assert!(matches!(store.insert(new_record()).await, Err(BackendError::Json(_))));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{ invalid json }");
    }

    #[tokio::test]
    async fn test_version_mismatch_keeps_existing_records() {
        let dir = tempdir().expect("Failed to create temp dir");
        let store = LocalRecordStore::new(dir.path());
        let first = store.insert(new_record()).await.unwrap();

        // 新しい版で書き直されたファイル
        let path = dir.path().join(RECORDS_FILE_NAME);
        let content = std::fs::read_to_string(&path)
            .unwrap()
            .replacen("\"version\": 1", "\"version\": 2", 1);
        std::fs::write(&path, &content).unwrap();

        let err = store.insert(new_record()).await.unwrap_err();
        assert!(matches!(
            err,
            BackendError::UnsupportedVersion { found: 2, expected: 1 }
        ));
        assert!(matches!(
            store.complete(&first.id, BTreeMap::new()).await,
            Err(BackendError::UnsupportedVersion { .. })
        ));

        // ファイルはそのまま残る
        let after = std::fs::read_to_string(&path).unwrap();
        assert_eq!(after, content);
        assert!(after.contains(&first.id));
    }

    #[tokio::test]
    async fn test_object_upload_and_download() {
        let dir = tempdir().expect("Failed to create temp dir");
        let store = LocalObjectStore::new(dir.path().join("objects"), "secret");

        store.upload("1-a.jpg", b"jpeg-bytes", "image/jpeg").await.unwrap();
        assert_eq!(store.download("1-a.jpg").await.unwrap(), b"jpeg-bytes".to_vec());
        assert!(matches!(
            store.download("missing.jpg").await,
            Err(BackendError::ObjectNotFound(_))
        ));
        assert!(matches!(
            store.upload("../escape.jpg", b"x", "image/jpeg").await,
            Err(BackendError::InvalidKey(_))
        ));
    }

    #[tokio::test]
    async fn test_existing_object_is_not_replaced() {
        let dir = tempdir().expect("Failed to create temp dir");
        let store = LocalObjectStore::new(dir.path().join("objects"), "secret");

        store.upload("1-a.jpg", b"first", "image/jpeg").await.unwrap();
        assert!(matches!(
            store.upload("1-a.jpg", b"second", "image/jpeg").await,
            Err(BackendError::ObjectExists(_))
        ));
        assert_eq!(store.download("1-a.jpg").await.unwrap(), b"first".to_vec());
    }

    #[tokio::test]
    async fn test_signed_url_verification() {
        let dir = tempdir().expect("Failed to create temp dir");
        let store = LocalObjectStore::new(dir.path().join("objects"), "secret");
        store.upload("1-a.jpg", b"x", "image/jpeg").await.unwrap();

        let url = store.signed_url("1-a.jpg", Duration::from_secs(3600)).await.unwrap();
        let now = chrono::Utc::now().timestamp();
        assert!(url.starts_with("file://"));
        assert!(store.verify_signed_url(&url, now));

        // 期限切れ
        assert!(!store.verify_signed_url(&url, now + 3601));

        // 別の秘密鍵
        let other = LocalObjectStore::new(dir.path().join("objects"), "other");
        assert!(!other.verify_signed_url(&url, now));

        // 改ざん
        let tampered = url.replace("1-a.jpg", "1-b.jpg");
        assert!(!store.verify_signed_url(&tampered, now));
    }

    #[tokio::test]
    async fn test_signed_url_requires_object() {
        let dir = tempdir().expect("Failed to create temp dir");
        let store = LocalObjectStore::new(dir.path().join("objects"), "secret");
        assert!(store.signed_url("none.jpg", Duration::from_secs(60)).await.is_err());
    }
}
