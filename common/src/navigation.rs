//! 画面遷移
//!
//! Upload → Processing → Results の一方向遷移。
//! 必要なペイロードを持たない画面へ遷移しようとした場合は Upload に戻す。

use crate::types::{AnalysisOptions, AnalysisRecord, RecordId};
use crate::upload::StagedFile;

/// Upload → Processing のペイロード
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessingPayload {
    pub file: StagedFile,
    pub options: AnalysisOptions,
}

/// Processing → Results のペイロード
///
/// ファイル本体は持たない。画像は保存済みレコードと署名付きURLから辿る。
#[derive(Debug, Clone, PartialEq)]
pub struct ResultsPayload {
    pub analysis_id: RecordId,
    pub record: AnalysisRecord,
}

/// 画面
#[derive(Debug, Clone, PartialEq)]
pub enum Route {
    Upload,
    Login,
    Processing(Option<ProcessingPayload>),
    Results(Option<ResultsPayload>),
}

impl Route {
    pub fn path(&self) -> &'static str {
        match self {
            Route::Upload => "/",
            Route::Login => "/login",
            Route::Processing(_) => "/processing",
            Route::Results(_) => "/results",
        }
    }

    /// 必要なペイロードが揃っているか
    pub fn has_required_payload(&self) -> bool {
        match self {
            Route::Upload | Route::Login => true,
            Route::Processing(payload) => payload.is_some(),
            Route::Results(payload) => payload.is_some(),
        }
    }
}

/// 現在の画面と遷移履歴
#[derive(Debug)]
pub struct Navigator {
    current: Route,
    history: Vec<&'static str>,
}

impl Default for Navigator {
    fn default() -> Self {
        Self::new()
    }
}

impl Navigator {
    pub fn new() -> Self {
        Self {
            current: Route::Upload,
            history: vec![Route::Upload.path()],
        }
    }

    /// 画面遷移（ペイロード欠落時は Upload へリダイレクト）
    pub fn navigate(&mut self, route: Route) -> &Route {
        let route = if route.has_required_payload() {
            route
        } else {
            Route::Upload
        };
        self.history.push(route.path());
        self.current = route;
        &self.current
    }

    pub fn current(&self) -> &Route {
        &self.current
    }

    pub fn history(&self) -> &[&'static str] {
        &self.history
    }

    /// Processing 画面のペイロードを取り出す
    ///
    /// 取り出した後の画面はペイロードなしの Processing として残る。
    pub fn take_processing_payload(&mut self) -> Option<ProcessingPayload> {
        match &mut self.current {
            Route::Processing(payload) => payload.take(),
            _ => None,
        }
    }

    pub fn results_payload(&self) -> Option<&ResultsPayload> {
        match &self.current {
            Route::Results(payload) => payload.as_ref(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::RecordingNotifier;
    use crate::types::{AnalysisStatus, NewAnalysisRecord};
    use crate::upload::{UploadCandidate, UploadController};

    fn staged() -> StagedFile {
        let notifier = RecordingNotifier::new();
        let mut controller = UploadController::new();
        controller
            .select_file(UploadCandidate::new("a.png", "image/png", vec![1]), &notifier)
            .unwrap();
        controller.take_staged(&notifier).unwrap()
    }

    #[test]
    fn test_starts_on_upload() {
        let nav = Navigator::new();
        assert_eq!(nav.current(), &Route::Upload);
        assert_eq!(nav.history(), &["/"]);
    }

    #[test]
    fn test_missing_payload_redirects_to_upload() {
        let mut nav = Navigator::new();
        assert_eq!(nav.navigate(Route::Processing(None)), &Route::Upload);
        assert_eq!(nav.navigate(Route::Results(None)), &Route::Upload);
        assert_eq!(nav.history(), &["/", "/", "/"]);
    }

    #[test]
    fn test_processing_payload_taken_once() {
        let mut nav = Navigator::new();
        nav.navigate(Route::Processing(Some(ProcessingPayload {
            file: staged(),
            options: AnalysisOptions::all(),
        })));
        assert_eq!(nav.current().path(), "/processing");

        let payload = nav.take_processing_payload().expect("ペイロードがない");
        assert_eq!(payload.file.name(), "a.png");
        assert!(nav.take_processing_payload().is_none());
    }

    #[test]
    fn test_results_payload() {
        let mut nav = Navigator::new();
        let mut record = NewAnalysisRecord::processing(None, "k", "a.png", 1, AnalysisOptions::all())
            .into_record("id-9", None);
        record.status = AnalysisStatus::Completed;

        nav.navigate(Route::Results(Some(ResultsPayload {
            analysis_id: record.id.clone(),
            record,
        })));
        assert_eq!(nav.results_payload().map(|p| p.analysis_id.as_str()), Some("id-9"));
        assert!(nav.take_processing_payload().is_none());
    }
}
