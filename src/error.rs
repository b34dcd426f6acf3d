use crate::backend::BackendError;
use crate::session::AuthError;
use crate::submit::SubmissionError;
use lucid_common::ValidationError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LucidError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Supabase credentials are not configured. Set SUPABASE_URL / SUPABASE_ANON_KEY or run `lucid config --set-supabase-url URL --set-supabase-key KEY`")]
    MissingSupabaseCredentials,

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Submission(#[from] SubmissionError),

    #[error("Analysis failed: {0}")]
    WorkerFault(String),

    #[error("Analysis {0} has not finished yet")]
    NotFinished(String),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Report error: {0}")]
    Report(String),

    #[error("JSON error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Common(#[from] lucid_common::Error),
}

pub type Result<T> = std::result::Result<T, LucidError>;
