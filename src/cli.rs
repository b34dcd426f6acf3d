use crate::config::BackendKind;
use clap::{Parser, Subcommand};
use lucid_common::{AnalysisKind, AnalysisOptions};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "lucid")]
#[command(about = "LUCID画像解析: アップロード・解析追跡・結果表示", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// 詳細ログを出力
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// バックエンドを一時的に切り替え (local/memory/supabase)
    #[arg(long, global = true)]
    pub backend: Option<BackendKind>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 画像をアップロードして解析結果を表示
    Analyze {
        /// 画像ファイル（PNG/JPEG、10MBまで）
        #[arg(required = true)]
        file: PathBuf,

        /// 指定項目のみ解析（カンマ区切り: aiScore,ocr,...）
        #[arg(long, value_delimiter = ',')]
        only: Vec<AnalysisKind>,

        /// 指定項目を除外（カンマ区切り）
        #[arg(long, value_delimiter = ',')]
        skip: Vec<AnalysisKind>,

        /// 解析前にログイン
        #[arg(long)]
        login: bool,

        /// ログイン名（省略時は対話入力）
        #[arg(long, requires = "login")]
        name: Option<String>,

        /// メールアドレス
        #[arg(long, requires = "login")]
        email: Option<String>,

        /// パスワード
        #[arg(long, requires = "login")]
        password: Option<String>,

        /// レポート出力先（.json / .xlsx）
        #[arg(short, long)]
        report: Option<PathBuf>,

        /// 結果表示後に評価を入力
        #[arg(long)]
        feedback: bool,
    },

    /// 解析ステータスを1回だけ確認
    Status {
        #[arg(required = true)]
        id: String,
    },

    /// 完了済み解析の結果を表示
    Results {
        #[arg(required = true)]
        id: String,

        /// レポート出力先（.json / .xlsx）
        #[arg(short, long)]
        report: Option<PathBuf>,
    },

    /// 既存レコードに対してワーカーを実行（ローカル用）
    Work {
        #[arg(required = true)]
        id: String,
    },

    /// 設定を表示/編集
    Config {
        /// 設定を表示
        #[arg(long)]
        show: bool,

        /// 既定のバックエンドを設定
        #[arg(long)]
        set_backend: Option<BackendKind>,

        /// Supabase URLを設定
        #[arg(long)]
        set_supabase_url: Option<String>,

        /// Supabase anonキーを設定
        #[arg(long)]
        set_supabase_key: Option<String>,
    },
}

/// `--only` / `--skip` から解析トグルを組み立てる（既定は全項目ON）
pub fn build_options(only: &[AnalysisKind], skip: &[AnalysisKind]) -> AnalysisOptions {
    let mut options = if only.is_empty() {
        AnalysisOptions::all()
    } else {
        AnalysisOptions::only(only)
    };
    for &kind in skip {
        options.set(kind, false);
    }
    options
}
