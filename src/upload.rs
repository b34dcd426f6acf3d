//! ディスク上のファイルからアップロード候補を作る
//!
//! Content-Type はブラウザと同様に拡張子から決める。
//! 拡張子で判別できない場合のみ先頭バイトから推定する。

use crate::error::{LucidError, Result};
use lucid_common::UploadCandidate;
use std::path::Path;

/// 拡張子 → Content-Type
pub fn content_type_for_extension(ext: &str) -> Option<&'static str> {
    match ext.to_ascii_lowercase().as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        "bmp" => Some("image/bmp"),
        "tif" | "tiff" => Some("image/tiff"),
        "pdf" => Some("application/pdf"),
        "txt" => Some("text/plain"),
        _ => None,
    }
}

/// 先頭バイトから推定
pub fn sniff_content_type(bytes: &[u8]) -> Option<&'static str> {
    image::guess_format(bytes).ok().map(|format| format.to_mime_type())
}

pub fn candidate_from_path(path: &Path) -> Result<UploadCandidate> {
    if !path.is_file() {
        return Err(LucidError::FileNotFound(path.display().to_string()));
    }

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let bytes = std::fs::read(path)?;

    let content_type = path
        .extension()
        .and_then(|ext| content_type_for_extension(&ext.to_string_lossy()))
        .or_else(|| sniff_content_type(&bytes))
        .unwrap_or("application/octet-stream");

    Ok(UploadCandidate::new(name, content_type, bytes))
}
