//! 解析レコードの型定義
//!
//! - AnalysisOptions: ユーザーが選んだ解析トグルのスナップショット
//! - AnalysisRecord: `image_analysis` テーブルの1行（解析ライフサイクル）
//! - NewAnalysisRecord: アップロード時に作成する挿入ペイロード
//! - JobRequest: リモート解析ジョブへ渡すリクエスト

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// 解析レコードID
pub type RecordId = String;

/// 解析項目（表示順 = 宣言順）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AnalysisKind {
    AiScore,
    EditCheck,
    ImageInfo,
    ImageMatches,
    Location,
    Ocr,
    Timestamp,
}

impl AnalysisKind {
    /// 正規の表示順
    pub const ALL: [AnalysisKind; 7] = [
        AnalysisKind::AiScore,
        AnalysisKind::EditCheck,
        AnalysisKind::ImageInfo,
        AnalysisKind::ImageMatches,
        AnalysisKind::Location,
        AnalysisKind::Ocr,
        AnalysisKind::Timestamp,
    ];

    /// 結果マップのキー
    pub fn key(self) -> &'static str {
        match self {
            AnalysisKind::AiScore => "aiScore",
            AnalysisKind::EditCheck => "editCheck",
            AnalysisKind::ImageInfo => "imageInfo",
            AnalysisKind::ImageMatches => "imageMatches",
            AnalysisKind::Location => "location",
            AnalysisKind::Ocr => "ocr",
            AnalysisKind::Timestamp => "timestamp",
        }
    }

    /// 結果行のラベル
    pub fn label(self) -> &'static str {
        match self {
            AnalysisKind::AiScore => "AI Score",
            AnalysisKind::EditCheck => "Edited/Altered Image Check",
            AnalysisKind::ImageInfo => "Image Information",
            AnalysisKind::ImageMatches => "Image Matches",
            AnalysisKind::Location => "Location",
            AnalysisKind::Ocr => "OCR Text",
            AnalysisKind::Timestamp => "Timestamp",
        }
    }

    /// 入力画面のトグル表示名
    pub fn toggle_label(self) -> &'static str {
        match self {
            AnalysisKind::AiScore => "AI score",
            AnalysisKind::EditCheck => "Edited/altered image check",
            AnalysisKind::ImageInfo => "Image information",
            AnalysisKind::ImageMatches => "Image matches",
            AnalysisKind::Location => "Location of the image",
            AnalysisKind::Ocr => "Recognize text in image (OCR)",
            AnalysisKind::Timestamp => "Timestamp",
        }
    }

    /// キー文字列から逆引き（大文字小文字は区別しない）
    pub fn from_key(key: &str) -> Option<Self> {
        let key = key.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.key().eq_ignore_ascii_case(key))
    }
}

impl fmt::Display for AnalysisKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for AnalysisKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_key(s).ok_or_else(|| {
            let known: Vec<&str> = Self::ALL.iter().map(|k| k.key()).collect();
            format!("Unknown analysis option: {}. Use one of {}", s, known.join(", "))
        })
    }
}

/// 解析トグルのスナップショット
///
/// 欠落したフィールドは「要求なし」として読み込む。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisOptions {
    #[serde(default)]
    pub ai_score: bool,
    #[serde(default)]
    pub edit_check: bool,
    #[serde(default)]
    pub image_info: bool,
    #[serde(default)]
    pub image_matches: bool,
    #[serde(default)]
    pub location: bool,
    #[serde(default)]
    pub ocr: bool,
    #[serde(default)]
    pub timestamp: bool,
}

impl AnalysisOptions {
    /// 全項目ON（入力画面の初期状態）
    pub fn all() -> Self {
        Self {
            ai_score: true,
            edit_check: true,
            image_info: true,
            image_matches: true,
            location: true,
            ocr: true,
            timestamp: true,
        }
    }

    /// 全項目OFF
    pub fn none() -> Self {
        Self {
            ai_score: false,
            edit_check: false,
            image_info: false,
            image_matches: false,
            location: false,
            ocr: false,
            timestamp: false,
        }
    }

    /// 指定項目のみON
    pub fn only(kinds: &[AnalysisKind]) -> Self {
        let mut options = Self::none();
        for &kind in kinds {
            options.set(kind, true);
        }
        options
    }

    pub fn is_enabled(&self, kind: AnalysisKind) -> bool {
        match kind {
            AnalysisKind::AiScore => self.ai_score,
            AnalysisKind::EditCheck => self.edit_check,
            AnalysisKind::ImageInfo => self.image_info,
            AnalysisKind::ImageMatches => self.image_matches,
            AnalysisKind::Location => self.location,
            AnalysisKind::Ocr => self.ocr,
            AnalysisKind::Timestamp => self.timestamp,
        }
    }

    pub fn set(&mut self, kind: AnalysisKind, enabled: bool) {
        let flag = match kind {
            AnalysisKind::AiScore => &mut self.ai_score,
            AnalysisKind::EditCheck => &mut self.edit_check,
            AnalysisKind::ImageInfo => &mut self.image_info,
            AnalysisKind::ImageMatches => &mut self.image_matches,
            AnalysisKind::Location => &mut self.location,
            AnalysisKind::Ocr => &mut self.ocr,
            AnalysisKind::Timestamp => &mut self.timestamp,
        };
        *flag = enabled;
    }

    /// トグル切り替え
    pub fn toggle(&mut self, kind: AnalysisKind) {
        let current = self.is_enabled(kind);
        self.set(kind, !current);
    }

    /// 有効な項目を表示順で列挙
    pub fn enabled_kinds(&self) -> impl Iterator<Item = AnalysisKind> + '_ {
        AnalysisKind::ALL
            .iter()
            .copied()
            .filter(move |&kind| self.is_enabled(kind))
    }

    pub fn any_enabled(&self) -> bool {
        self.enabled_kinds().next().is_some()
    }
}

/// 解析ステータス
///
/// processing → completed | failed の一方向のみ遷移する。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisStatus {
    Processing,
    Completed,
    Failed,
}

impl AnalysisStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, AnalysisStatus::Processing)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisStatus::Processing => "processing",
            AnalysisStatus::Completed => "completed",
            AnalysisStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for AnalysisStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `image_analysis` テーブルの1行
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub id: RecordId,

    #[serde(default)]
    pub user_id: Option<String>,

    /// ストレージ上のオブジェクトキー
    pub image_path: String,

    /// 元のファイル名
    pub filename: String,

    pub file_size: u64,

    pub analysis_options: AnalysisOptions,

    pub status: AnalysisStatus,

    /// completed のときのみ存在
    #[serde(default)]
    pub results: Option<BTreeMap<String, String>>,

    /// failed のときのみ存在
    #[serde(default)]
    pub error_message: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl AnalysisRecord {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// 解析項目の結果値
    pub fn result(&self, kind: AnalysisKind) -> Option<&str> {
        self.results
            .as_ref()
            .and_then(|results| results.get(kind.key()))
            .map(String::as_str)
    }
}

/// 挿入ペイロード（IDはストア側で採番）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAnalysisRecord {
    pub user_id: Option<String>,
    pub image_path: String,
    pub filename: String,
    pub file_size: u64,
    pub analysis_options: AnalysisOptions,
    pub status: AnalysisStatus,
}

impl NewAnalysisRecord {
    /// status = processing の新規レコード
    pub fn processing(
        user_id: Option<String>,
        image_path: impl Into<String>,
        filename: impl Into<String>,
        file_size: u64,
        analysis_options: AnalysisOptions,
    ) -> Self {
        Self {
            user_id,
            image_path: image_path.into(),
            filename: filename.into(),
            file_size,
            analysis_options,
            status: AnalysisStatus::Processing,
        }
    }

    /// ID・作成日時を付与してレコード化
    pub fn into_record(self, id: impl Into<RecordId>, created_at: Option<String>) -> AnalysisRecord {
        AnalysisRecord {
            id: id.into(),
            user_id: self.user_id,
            image_path: self.image_path,
            filename: self.filename,
            file_size: self.file_size,
            analysis_options: self.analysis_options,
            status: AnalysisStatus::Processing,
            results: None,
            error_message: None,
            created_at,
        }
    }
}

/// リモート解析ジョブのリクエスト
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRequest {
    pub analysis_id: RecordId,
    pub analysis_options: AnalysisOptions,
}

impl JobRequest {
    pub fn new(analysis_id: impl Into<RecordId>, analysis_options: AnalysisOptions) -> Self {
        Self {
            analysis_id: analysis_id.into(),
            analysis_options,
        }
    }
}
