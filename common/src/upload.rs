//! アップロードコントローラ
//!
//! 選択されたファイルを検証してステージングする。
//! ステージング済みファイルは送信時に所有権ごと引き渡す。

use crate::notify::{Notifier, Toast};
use thiserror::Error;

/// 受け付けるファイルサイズの上限（10 MiB）
pub const MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

/// 受け付けるContent-Type
pub const ALLOWED_CONTENT_TYPES: &[&str] = &["image/png", "image/jpeg", "image/jpg"];

/// 検証エラー
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Unsupported file type: {0}. Please upload a PNG or JPG image.")]
    UnsupportedType(String),

    #[error("File too large: {size} bytes (max {max} bytes)")]
    TooLarge { size: u64, max: u64 },

    #[error("No image selected")]
    NothingStaged,
}

/// ユーザーが選択したファイル（未検証）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadCandidate {
    pub name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl UploadCandidate {
    pub fn new(name: impl Into<String>, content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            bytes,
        }
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// 検証済みファイル
///
/// `UploadController` 経由でのみ作られる。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedFile {
    name: String,
    content_type: String,
    bytes: Vec<u8>,
}

impl StagedFile {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// 候補ファイルを検証（種類 → サイズの順）
pub fn validate(candidate: &UploadCandidate) -> Result<(), ValidationError> {
    check_content_type(candidate)?;
    check_size(candidate)
}

fn check_content_type(candidate: &UploadCandidate) -> Result<(), ValidationError> {
    let content_type = candidate.content_type.trim().to_ascii_lowercase();
    if !ALLOWED_CONTENT_TYPES.contains(&content_type.as_str()) {
        return Err(ValidationError::UnsupportedType(candidate.content_type.clone()));
    }
    Ok(())
}

fn check_size(candidate: &UploadCandidate) -> Result<(), ValidationError> {
    let size = candidate.size();
    if size > MAX_UPLOAD_BYTES {
        return Err(ValidationError::TooLarge {
            size,
            max: MAX_UPLOAD_BYTES,
        });
    }
    Ok(())
}

/// ステージング枠を1つだけ持つコントローラ
#[derive(Debug, Default)]
pub struct UploadController {
    staged: Option<StagedFile>,
}

impl UploadController {
    pub fn new() -> Self {
        Self::default()
    }

    /// ファイルを選択
    ///
    /// 検証に失敗した場合、既存のステージング済みファイルはそのまま残る。
    pub fn select_file(
        &mut self,
        candidate: UploadCandidate,
        notifier: &dyn Notifier,
    ) -> Result<&StagedFile, ValidationError> {
        if let Err(err) = check_content_type(&candidate) {
            notifier.notify(Toast::error("Invalid file type", "Please upload a PNG or JPG image."));
            return Err(err);
        }
        if let Err(err) = check_size(&candidate) {
            notifier.notify(Toast::error("File too large", "Please upload an image smaller than 10MB."));
            return Err(err);
        }

        notifier.notify(Toast::info("Image uploaded", "Your image is ready for analysis."));
        let staged = self.staged.insert(StagedFile {
            name: candidate.name,
            content_type: candidate.content_type.trim().to_ascii_lowercase(),
            bytes: candidate.bytes,
        });
        Ok(&*staged)
    }

    pub fn staged(&self) -> Option<&StagedFile> {
        self.staged.as_ref()
    }

    pub fn has_staged(&self) -> bool {
        self.staged.is_some()
    }

    /// ステージング済みファイルを引き渡す（枠は空になる）
    pub fn take_staged(&mut self, notifier: &dyn Notifier) -> Result<StagedFile, ValidationError> {
        match self.staged.take() {
            Some(file) => Ok(file),
            None => {
                notifier.notify(Toast::error("No image selected", "Please upload an image first."));
                Err(ValidationError::NothingStaged)
            }
        }
    }

    pub fn clear(&mut self) {
        self.staged = None;
    }
}
