//! 解析ワーカー（スタブ）
//!
//! 実際の解析は行わず、要求された項目について見た目だけの結果を作る。
//! ファイル名・サイズ・画素数・EXIF のように画像から分かるものは実値を使う。

pub mod metadata;

use crate::backend::{BackendError, JobTrigger, ObjectStore, RecordStore};
use async_trait::async_trait;
use lucid_common::{AnalysisKind, AnalysisOptions, AnalysisRecord, JobRequest};
use rand::Rng;
use std::collections::BTreeMap;
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const GPS_UNAVAILABLE: &str = "GPS data not available";
pub const OCR_PLACEHOLDER: &str = "Sample text extracted from image...";

/// 結果の生成に使う画像の事実
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImageFacts {
    pub filename: String,
    pub file_size: u64,
    pub dimensions: Option<(u32, u32)>,
    pub captured_at: Option<String>,
    pub gps: Option<(f64, f64)>,
}

impl ImageFacts {
    pub fn from_record(record: &AnalysisRecord) -> Self {
        Self {
            filename: record.filename.clone(),
            file_size: record.file_size,
            ..Self::default()
        }
    }

    /// 画像バイト列から画素数とEXIFを補う
    pub fn with_bytes(mut self, bytes: &[u8]) -> Self {
        self.dimensions = image::ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .ok()
            .and_then(|reader| reader.into_dimensions().ok());

        if let Some(exif) = metadata::read_exif(bytes) {
            self.captured_at = metadata::extract_date(&exif);
            self.gps = metadata::extract_gps(&exif);
        }
        self
    }
}

/// 要求された項目だけ結果を作る
pub fn fabricate_results<R: Rng + ?Sized>(
    rng: &mut R,
    facts: &ImageFacts,
    options: &AnalysisOptions,
) -> BTreeMap<String, String> {
    options
        .enabled_kinds()
        .map(|kind| (kind.key().to_string(), fabricate(rng, facts, kind)))
        .collect()
}

fn fabricate<R: Rng + ?Sized>(rng: &mut R, facts: &ImageFacts, kind: AnalysisKind) -> String {
    match kind {
        AnalysisKind::AiScore => format!("{}%", rng.random_range(60..=99)),
        AnalysisKind::EditCheck => {
            if rng.random_bool(0.3) {
                "Edits detected".to_string()
            } else {
                "No edits detected".to_string()
            }
        }
        AnalysisKind::ImageInfo => {
            let mut info = format!("{}, {}KB", facts.filename, facts.file_size / 1024);
            if let Some((width, height)) = facts.dimensions {
                info.push_str(&format!(", {}x{}", width, height));
            }
            info
        }
        AnalysisKind::ImageMatches => {
            format!("{} similar images found online", rng.random_range(0..=9))
        }
        AnalysisKind::Location => match facts.gps {
            Some((lat, lon)) => format!("Location: {:.4}, {:.4}", lat, lon),
            None => GPS_UNAVAILABLE.to_string(),
        },
        AnalysisKind::Ocr => OCR_PLACEHOLDER.to_string(),
        AnalysisKind::Timestamp => facts
            .captured_at
            .clone()
            .unwrap_or_else(|| chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string()),
    }
}

/// レコードを終端状態へ進めるワーカー
#[derive(Clone)]
pub struct AnalysisWorker {
    objects: Arc<dyn ObjectStore>,
    records: Arc<dyn RecordStore>,
}

impl AnalysisWorker {
    pub fn new(objects: Arc<dyn ObjectStore>, records: Arc<dyn RecordStore>) -> Self {
        Self { objects, records }
    }

    /// ジョブを1件処理して生成した結果を返す
    ///
    /// レコードが見つからなければ何も書かずにエラーを返す。
    /// それ以降の失敗はレコードを failed にする。
    pub async fn process(&self, request: &JobRequest) -> Result<BTreeMap<String, String>, BackendError> {
        let record = self.records.get(&request.analysis_id).await?;
        debug!(id = %record.id, "analysis job started");

        let facts = match self.objects.download(&record.image_path).await {
            Ok(bytes) => ImageFacts::from_record(&record).with_bytes(&bytes),
            Err(e) => {
                warn!(id = %record.id, error = %e, "stored image unavailable, using record metadata only");
                ImageFacts::from_record(&record)
            }
        };

        let results = fabricate_results(&mut rand::rng(), &facts, &request.analysis_options);

        match self.records.complete(&record.id, results.clone()).await {
            Ok(()) => {
                info!(id = %record.id, items = results.len(), "analysis completed");
                Ok(results)
            }
            Err(e @ BackendError::AlreadyTerminal(_)) => Err(e),
            Err(e) => {
                let message = e.to_string();
                if let Err(fail_err) = self.records.fail(&record.id, &message).await {
                    warn!(id = %record.id, error = %fail_err, "could not mark analysis as failed");
                }
                Err(e)
            }
        }
    }
}

/// プロセス内でワーカーを起動するトリガー
pub struct LocalJobTrigger {
    worker: Arc<AnalysisWorker>,
    delay: Duration,
}

impl LocalJobTrigger {
    pub fn new(worker: Arc<AnalysisWorker>, delay: Duration) -> Self {
        Self { worker, delay }
    }
}

#[async_trait]
impl JobTrigger for LocalJobTrigger {
    async fn invoke(&self, request: &JobRequest) -> Result<(), BackendError> {
        let worker = self.worker.clone();
        let request = request.clone();
        let delay = self.delay;

        tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            if let Err(e) = worker.process(&request).await {
                warn!(id = %request.analysis_id, error = %e, "analysis job failed");
            }
        });
        Ok(())
    }
}
