//! LUCID Common Library
//!
//! CLIと将来のWebフロントで共有される型とロジック（I/Oなし）

pub mod types;
pub mod error;
pub mod upload;
pub mod notify;
pub mod progress;
pub mod render;
pub mod navigation;
pub mod feedback;
pub mod export;

pub use types::{AnalysisKind, AnalysisOptions, AnalysisRecord, AnalysisStatus, JobRequest, NewAnalysisRecord, RecordId};
pub use error::{Error, Result};
pub use upload::{StagedFile, UploadCandidate, UploadController, ValidationError, MAX_UPLOAD_BYTES};
pub use notify::{Notifier, RecordingNotifier, Toast, ToastVariant};
pub use progress::{ProgressTracker, PROGRESS_CEILING, PROGRESS_DONE};
pub use render::{present, ResultRow};
pub use navigation::{Navigator, ProcessingPayload, ResultsPayload, Route};
pub use feedback::{FeedbackSection, Rating};
