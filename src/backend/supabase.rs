//! Supabase バックエンド
//!
//! - Storage: `/storage/v1/object/{bucket}/{key}`
//! - PostgREST: `/rest/v1/image_analysis`
//! - Edge Function: `/functions/v1/analyze-image`
//!
//! 終端遷移は `status=eq.processing` で絞り込んだ PATCH で行う。
//! 終端済みのレコードには1行もマッチしないので、サーバ側で単調性が保たれる。

use super::{check_object_key, BackendError, BackendResult, JobTrigger, ObjectStore, RecordStore};
use async_trait::async_trait;
use lucid_common::{AnalysisRecord, AnalysisStatus, JobRequest, NewAnalysisRecord};
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

const TABLE: &str = "image_analysis";
const FUNCTION_NAME: &str = "analyze-image";

pub struct SupabaseClient {
    http: Client,
    base_url: String,
    api_key: String,
    bucket: String,
}

#[derive(Deserialize)]
struct SignedUrlResponse {
    #[serde(rename = "signedURL")]
    signed_url: String,
}

#[derive(Serialize)]
struct StatusUpdate<'a> {
    status: AnalysisStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    results: Option<&'a BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_message: Option<&'a str>,
}

impl SupabaseClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, bucket: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            bucket: bucket.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn object_url(&self, key: &str) -> String {
        self.url(&format!("/storage/v1/object/{}/{}", self.bucket, key))
    }

    fn table_url(&self) -> String {
        self.url(&format!("/rest/v1/{}", TABLE))
    }

    fn authed(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    async fn check(response: Response) -> BackendResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(BackendError::Request(format!("{} {}", status, body.trim())))
    }

    async fn update_processing(&self, id: &str, update: &StatusUpdate<'_>) -> BackendResult<()> {
        let response = self
            .authed(self.http.patch(self.table_url()))
            .query(&[("id", format!("eq.{}", id)), ("status", "eq.processing".to_string())])
            .header("Prefer", "return=representation")
            .json(update)
            .send()
            .await?;
        let updated: Vec<AnalysisRecord> = Self::check(response).await?.json().await?;
        if updated.is_empty() {
            // 存在しないか、既に終端
            return Err(BackendError::AlreadyTerminal(id.to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for SupabaseClient {
    async fn upload(&self, key: &str, bytes: &[u8], content_type: &str) -> BackendResult<()> {
        check_object_key(key)?;
        let response = self
            .authed(self.http.post(self.object_url(key)))
            .header("Content-Type", content_type)
            .body(bytes.to_vec())
            .send()
            .await?;
        // x-upsert なしの POST は既存キーを 409 で拒否する
        if response.status() == reqwest::StatusCode::CONFLICT {
            return Err(BackendError::ObjectExists(key.to_string()));
        }
        Self::check(response).await?;
        debug!(key, bytes = bytes.len(), "uploaded object");
        Ok(())
    }

    async fn download(&self, key: &str) -> BackendResult<Vec<u8>> {
        check_object_key(key)?;
        let response = self
            .authed(self.http.get(self.object_url(key)))
            .send()
            .await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(BackendError::ObjectNotFound(key.to_string()));
        }
        let bytes = Self::check(response).await?.bytes().await?;
        Ok(bytes.to_vec())
    }

    async fn signed_url(&self, key: &str, ttl: Duration) -> BackendResult<String> {
        check_object_key(key)?;
        let response = self
            .authed(self.http.post(self.url(&format!(
                "/storage/v1/object/sign/{}/{}",
                self.bucket, key
            ))))
            .json(&json!({ "expiresIn": ttl.as_secs() }))
            .send()
            .await?;
        let signed: SignedUrlResponse = Self::check(response).await?.json().await?;
        Ok(self.url(&format!("/storage/v1{}", signed.signed_url)))
    }
}

#[async_trait]
impl RecordStore for SupabaseClient {
    async fn insert(&self, record: NewAnalysisRecord) -> BackendResult<AnalysisRecord> {
        let response = self
            .authed(self.http.post(self.table_url()))
            .header("Prefer", "return=representation")
            .json(&record)
            .send()
            .await?;
        let mut rows: Vec<AnalysisRecord> = Self::check(response).await?.json().await?;
        rows.pop()
            .ok_or_else(|| BackendError::Request("insert returned no rows".to_string()))
    }

    async fn get(&self, id: &str) -> BackendResult<AnalysisRecord> {
        let response = self
            .authed(self.http.get(self.table_url()))
            .query(&[("id", format!("eq.{}", id)), ("select", "*".to_string())])
            .send()
            .await?;
        let mut rows: Vec<AnalysisRecord> = Self::check(response).await?.json().await?;
        rows.pop().ok_or_else(|| BackendError::NotFound(id.to_string()))
    }

    async fn complete(&self, id: &str, results: BTreeMap<String, String>) -> BackendResult<()> {
        let update = StatusUpdate {
            status: AnalysisStatus::Completed,
            results: Some(&results),
            error_message: None,
        };
        self.update_processing(id, &update).await
    }

    async fn fail(&self, id: &str, message: &str) -> BackendResult<()> {
        let update = StatusUpdate {
            status: AnalysisStatus::Failed,
            results: None,
            error_message: Some(message),
        };
        self.update_processing(id, &update).await
    }
}

#[async_trait]
impl JobTrigger for SupabaseClient {
    async fn invoke(&self, request: &JobRequest) -> BackendResult<()> {
        let response = self
            .authed(self.http.post(self.url(&format!("/functions/v1/{}", FUNCTION_NAME))))
            .json(request)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }
}
