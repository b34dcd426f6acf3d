//! アプリケーションコンテキスト
//!
//! セッション・ステージング中のファイル・現在の画面を1つにまとめる。
//! グローバル状態は持たず、呼び出し側がこの値を所有する。

use crate::backend::Backend;
use crate::config::Config;
use crate::error::{LucidError, Result};
use crate::poller::StatusPoller;
use crate::processing::{ProcessingOutcome, ProcessingScreen};
use crate::results::ResultsView;
use crate::session::{Credentials, Session, User};
use crate::submit::SubmissionClient;
use lucid_common::{
    AnalysisOptions, AnalysisRecord, AnalysisStatus, Navigator, Notifier, ProcessingPayload, ResultsPayload, Route,
    StagedFile, Toast, UploadCandidate, UploadController,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub struct Lucid {
    config: Config,
    session: Session,
    backend: Backend,
    notifier: Arc<dyn Notifier>,
    uploads: UploadController,
    navigator: Navigator,
}

impl Lucid {
    pub fn new(config: Config, backend: Backend, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            config,
            session: Session::new(),
            backend,
            notifier,
            uploads: UploadController::new(),
            navigator: Navigator::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    pub fn user(&self) -> Option<&User> {
        self.session.user()
    }

    pub fn navigator(&self) -> &Navigator {
        &self.navigator
    }

    pub fn staged(&self) -> Option<&StagedFile> {
        self.uploads.staged()
    }

    pub fn login(&mut self, credentials: &Credentials) -> Result<User> {
        self.navigator.navigate(Route::Login);
        match self.session.login(credentials) {
            Ok(user) => {
                let user = user.clone();
                self.notifier.notify(Toast::info(
                    "Welcome back!",
                    format!("Hello {}, you're now logged in.", user.name),
                ));
                info!(user = %user.id, "logged in");
                self.navigator.navigate(Route::Upload);
                Ok(user)
            }
            Err(e) => {
                self.notifier.notify(Toast::error(e.title(), e.to_string()));
                Err(e.into())
            }
        }
    }

    pub fn logout(&mut self) -> Option<User> {
        let user = self.session.logout();
        self.navigator.navigate(Route::Upload);
        user
    }

    /// ファイルを選択（検証に失敗しても以前のファイルは残る）
    pub fn select_file(&mut self, candidate: UploadCandidate) -> Result<()> {
        self.uploads.select_file(candidate, self.notifier.as_ref())?;
        Ok(())
    }

    /// ステージング済みファイルを処理中画面へ渡す
    pub fn start_analysis(&mut self, options: AnalysisOptions) -> Result<()> {
        let file = self.uploads.take_staged(self.notifier.as_ref())?;
        self.navigator
            .navigate(Route::Processing(Some(ProcessingPayload { file, options })));
        Ok(())
    }

    /// 送信して終端状態まで待つ
    ///
    /// 完了時は結果画面へ進んでレコードを返す。キャンセル時は `None`。
    pub async fn process<F>(&mut self, cancel: &CancellationToken, on_progress: F) -> Result<Option<AnalysisRecord>>
    where
        F: FnMut(f64),
    {
        let Some(payload) = self.navigator.take_processing_payload() else {
            self.navigator.navigate(Route::Upload);
            return Ok(None);
        };

        let client = SubmissionClient::new(&self.backend);
        let id = match client.submit(payload.file, payload.options, self.session.user()).await {
            Ok(id) => id,
            Err(e) => {
                self.notifier
                    .notify(Toast::error("Analysis failed to start", e.to_string()));
                self.navigator.navigate(Route::Upload);
                return Err(e.into());
            }
        };

        let poller = StatusPoller::new(self.backend.records.clone(), self.config.poll_interval());
        let mut screen = ProcessingScreen::new(poller, self.config.progress_interval());

        match screen.run(&id, cancel, on_progress).await {
            ProcessingOutcome::Completed(record) => {
                self.navigator.navigate(Route::Results(Some(ResultsPayload {
                    analysis_id: id,
                    record: record.clone(),
                })));
                Ok(Some(record))
            }
            ProcessingOutcome::Failed(record) => {
                let message = record
                    .error_message
                    .unwrap_or_else(|| "Unknown error".to_string());
                self.notifier.notify(Toast::error("Analysis failed", message.clone()));
                self.navigator.navigate(Route::Upload);
                Err(LucidError::WorkerFault(message))
            }
            ProcessingOutcome::Cancelled => {
                self.notifier.notify(Toast::info(
                    "Analysis cancelled",
                    "You can start a new analysis at any time.",
                ));
                self.navigator.navigate(Route::Upload);
                Ok(None)
            }
        }
    }

    /// 保存済みレコードを開いて結果画面へ進む
    pub async fn open_results(&mut self, id: &str) -> Result<AnalysisRecord> {
        let record = self.backend.records.get(id).await?;
        match record.status {
            AnalysisStatus::Processing => Err(LucidError::NotFinished(id.to_string())),
            AnalysisStatus::Failed => Err(LucidError::WorkerFault(
                record.error_message.unwrap_or_else(|| "Unknown error".to_string()),
            )),
            AnalysisStatus::Completed => {
                self.navigator.navigate(Route::Results(Some(ResultsPayload {
                    analysis_id: record.id.clone(),
                    record: record.clone(),
                })));
                Ok(record)
            }
        }
    }

    /// 現在の結果画面（結果画面にいなければ Upload へ戻して `None`）
    pub async fn results_view(&mut self) -> Option<ResultsView> {
        let Some(payload) = self.navigator.results_payload() else {
            self.navigator.navigate(Route::Upload);
            return None;
        };

        Some(
            ResultsView::load(
                self.backend.objects.as_ref(),
                &payload.record,
                self.session.user(),
                self.config.signed_url_ttl(),
            )
            .await,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lucid_common::{AnalysisKind, RecordingNotifier, ValidationError};
    use std::time::Duration;

    fn app(notifier: Arc<RecordingNotifier>) -> Lucid {
        let config = Config {
            poll_interval_ms: 2000,
            progress_interval_ms: 300,
            ..Config::default()
        };
        let backend = Backend::in_memory(Duration::from_millis(1500));
        Lucid::new(config, backend, notifier)
    }

    fn jpeg(size: usize) -> UploadCandidate {
        UploadCandidate::new("photo.jpg", "image/jpeg", vec![0u8; size])
    }

    #[test]
    fn test_login_notifies() {
        let notifier = Arc::new(RecordingNotifier::new());
        let mut app = app(notifier.clone());

        assert!(app.login(&Credentials::new("Ada", "nope", "secret1")).is_err());
        assert!(app.user().is_none());

        let user = app.login(&Credentials::new("Ada", "ada@example.com", "secret1")).unwrap();
        assert_eq!(app.user(), Some(&user));
        assert_eq!(notifier.titles(), vec!["Invalid email", "Welcome back!"]);
        assert_eq!(app.navigator().current(), &Route::Upload);

        assert_eq!(app.logout(), Some(user));
        assert!(app.user().is_none());
    }

    #[test]
    fn test_start_without_file() {
        let notifier = Arc::new(RecordingNotifier::new());
        let mut app = app(notifier.clone());

        let err = app.start_analysis(AnalysisOptions::all()).unwrap_err();
        assert!(matches!(err, LucidError::Validation(ValidationError::NothingStaged)));
        assert_eq!(app.navigator().current(), &Route::Upload);
    }

    #[tokio::test]
    async fn test_process_without_payload_redirects() {
        let notifier = Arc::new(RecordingNotifier::new());
        let mut app = app(notifier);

        let outcome = app.process(&CancellationToken::new(), |_| {}).await.unwrap();
        assert!(outcome.is_none());
        assert_eq!(app.navigator().current(), &Route::Upload);
        assert!(app.results_view().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_lifecycle() {
        let notifier = Arc::new(RecordingNotifier::new());
        let mut app = app(notifier.clone());
        app.login(&Credentials::new("Ada", "ada@example.com", "secret1")).unwrap();

        app.select_file(jpeg(2 * 1024 * 1024)).unwrap();
        app.start_analysis(AnalysisOptions::only(&[AnalysisKind::AiScore, AnalysisKind::Ocr]))
            .unwrap();
        assert!(app.staged().is_none());
        assert_eq!(app.navigator().current().path(), "/processing");

        let mut last = 0.0;
        let record = app
            .process(&CancellationToken::new(), |v| last = v)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.status, AnalysisStatus::Completed);
        assert_eq!(last, 100.0);
        assert_eq!(app.navigator().current().path(), "/results");

        let view = app.results_view().await.unwrap();
        assert_eq!(view.greeting, "Welcome back, Ada. Here are your results.");
        let labels: Vec<&str> = view.rows.iter().map(|r| r.label).collect();
        assert_eq!(labels, vec!["AI Score", "OCR Text"]);
        assert!(view.image_url.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_returns_to_upload() {
        let notifier = Arc::new(RecordingNotifier::new());
        let mut app = app(notifier.clone());
        app.select_file(jpeg(10)).unwrap();
        app.start_analysis(AnalysisOptions::all()).unwrap();

        let cancel = CancellationToken::new();
        cancel.cancel();
        assert!(app.process(&cancel, |_| {}).await.unwrap().is_none());
        assert_eq!(app.navigator().current(), &Route::Upload);
        assert_eq!(notifier.titles().last().map(String::as_str), Some("Analysis cancelled"));
    }

    #[tokio::test]
    async fn test_open_results_of_unfinished_record() {
        let notifier = Arc::new(RecordingNotifier::new());
        let mut app = app(notifier);
        let record = app
            .backend()
            .records
            .insert(lucid_common::NewAnalysisRecord::processing(
                None,
                "1-a.jpg",
                "a.jpg",
                1,
                AnalysisOptions::all(),
            ))
            .await
            .unwrap();

        assert!(matches!(
            app.open_results(&record.id).await,
            Err(LucidError::NotFinished(_))
        ));

        app.backend().records.fail(&record.id, "boom").await.unwrap();
        match app.open_results(&record.id).await {
            Err(LucidError::WorkerFault(message)) => assert_eq!(message, "boom"),
            other => panic!("unexpected: {:?}", other.map(|r| r.id)),
        }
    }
}
