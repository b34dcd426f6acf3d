//! プロセス内メモリのバックエンド

use super::{apply_transition, check_object_key, BackendError, BackendResult, ObjectStore, RecordStore, Transition};
use async_trait::async_trait;
use lucid_common::{AnalysisRecord, NewAnalysisRecord};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

struct StoredObject {
    bytes: Vec<u8>,
    content_type: String,
}

#[derive(Default)]
pub struct MemoryObjectStore {
    objects: Mutex<HashMap<String, StoredObject>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.objects.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects.lock().contains_key(key)
    }

    pub fn content_type(&self, key: &str) -> Option<String> {
        self.objects.lock().get(key).map(|o| o.content_type.clone())
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn upload(&self, key: &str, bytes: &[u8], content_type: &str) -> BackendResult<()> {
        check_object_key(key)?;
        let mut objects = self.objects.lock();
        if objects.contains_key(key) {
            return Err(BackendError::ObjectExists(key.to_string()));
        }
        objects.insert(
            key.to_string(),
            StoredObject {
                bytes: bytes.to_vec(),
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }

    async fn download(&self, key: &str) -> BackendResult<Vec<u8>> {
        self.objects
            .lock()
            .get(key)
            .map(|o| o.bytes.clone())
            .ok_or_else(|| BackendError::ObjectNotFound(key.to_string()))
    }

    async fn signed_url(&self, key: &str, ttl: Duration) -> BackendResult<String> {
        if !self.contains(key) {
            return Err(BackendError::ObjectNotFound(key.to_string()));
        }
        let expires = chrono::Utc::now().timestamp() + ttl.as_secs() as i64;
        Ok(format!("memory://{}?expires={}", key, expires))
    }
}

#[derive(Default)]
pub struct MemoryRecordStore {
    records: Mutex<HashMap<String, AnalysisRecord>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn all(&self) -> Vec<AnalysisRecord> {
        self.records.lock().values().cloned().collect()
    }

    fn transition(&self, id: &str, transition: Transition) -> BackendResult<()> {
        let mut records = self.records.lock();
        let record = records
            .get_mut(id)
            .ok_or_else(|| BackendError::NotFound(id.to_string()))?;
        apply_transition(record, transition)
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn insert(&self, record: NewAnalysisRecord) -> BackendResult<AnalysisRecord> {
        let id = uuid::Uuid::new_v4().to_string();
        let record = record.into_record(id.clone(), Some(chrono::Utc::now().to_rfc3339()));
        self.records.lock().insert(id, record.clone());
        Ok(record)
    }

    async fn get(&self, id: &str) -> BackendResult<AnalysisRecord> {
        self.records
            .lock()
            .get(id)
            .cloned()
            .ok_or_else(|| BackendError::NotFound(id.to_string()))
    }

    async fn complete(&self, id: &str, results: BTreeMap<String, String>) -> BackendResult<()> {
        self.transition(id, Transition::Complete(results))
    }

    async fn fail(&self, id: &str, message: &str) -> BackendResult<()> {
        self.transition(id, Transition::Fail(message.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lucid_common::{AnalysisOptions, AnalysisStatus};

    #[tokio::test]
    async fn test_object_roundtrip() {
        let store = MemoryObjectStore::new();
        store.upload("1-a.png", b"png", "image/png").await.unwrap();

        assert_eq!(store.download("1-a.png").await.unwrap(), b"png".to_vec());
        assert_eq!(store.content_type("1-a.png").as_deref(), Some("image/png"));

        let url = store.signed_url("1-a.png", Duration::from_secs(3600)).await.unwrap();
        assert!(url.starts_with("memory://1-a.png?expires="));
    }

    #[tokio::test]
    async fn test_missing_object() {
        let store = MemoryObjectStore::new();
        assert!(matches!(
            store.download("nope").await,
            Err(BackendError::ObjectNotFound(_))
        ));
        assert!(store.signed_url("nope", Duration::from_secs(1)).await.is_err());
    }

    #[tokio::test]
    async fn test_duplicate_key_keeps_first_object() {
        let store = MemoryObjectStore::new();
        store.upload("1-a.png", b"first", "image/png").await.unwrap();

        let err = store.upload("1-a.png", b"second", "image/jpeg").await.unwrap_err();
        assert!(matches!(err, BackendError::ObjectExists(_)));
        assert_eq!(store.download("1-a.png").await.unwrap(), b"first".to_vec());
        assert_eq!(store.content_type("1-a.png").as_deref(), Some("image/png"));
    }

    #[tokio::test]
    async fn test_record_lifecycle() {
        let store = MemoryRecordStore::new();
        let record = store
            .insert(NewAnalysisRecord::processing(None, "k", "a.png", 3, AnalysisOptions::all()))
            .await
            .unwrap();
        assert_eq!(record.status, AnalysisStatus::Processing);
        assert!(record.created_at.is_some());

        store.fail(&record.id, "worker crashed").await.unwrap();
        let loaded = store.get(&record.id).await.unwrap();
        assert_eq!(loaded.status, AnalysisStatus::Failed);

        let err = store.complete(&record.id, BTreeMap::new()).await.unwrap_err();
        assert!(matches!(err, BackendError::AlreadyTerminal(_)));
    }

    #[tokio::test]
    async fn test_unknown_record() {
        let store = MemoryRecordStore::new();
        assert!(matches!(store.get("missing").await, Err(BackendError::NotFound(_))));
        assert!(matches!(store.fail("missing", "x").await, Err(BackendError::NotFound(_))));
    }
}
