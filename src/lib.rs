//! LUCID 画像解析クライアント
//!
//! アップロード → 解析ジョブ起動 → ステータス追跡 → 結果表示。
//! I/Oを伴わない型とロジックは `lucid-common` にある。

pub mod app;
pub mod backend;
pub mod cli;
pub mod config;
pub mod error;
pub mod notify;
pub mod poller;
pub mod processing;
pub mod report;
pub mod results;
pub mod session;
pub mod submit;
pub mod upload;
pub mod worker;

pub use app::Lucid;
pub use error::{LucidError, Result};
