use crate::error::{LucidError, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// 解析データの保存先
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// ローカルファイル（data_dir 以下）
    Local,
    /// プロセス内メモリ（終了時に消える）
    Memory,
    /// Supabase（ストレージ + REST + Edge Function）
    Supabase,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::Local => write!(f, "local"),
            BackendKind::Memory => write!(f, "memory"),
            BackendKind::Supabase => write!(f, "supabase"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub backend: BackendKind,
    pub data_dir: Option<PathBuf>,
    pub supabase_url: Option<String>,
    pub supabase_anon_key: Option<String>,
    pub bucket: String,
    pub poll_interval_ms: u64,
    pub progress_interval_ms: u64,
    pub worker_delay_ms: u64,
    pub signed_url_ttl_secs: u64,
    pub signing_secret: String,
}

impl Default for Config {
    fn default() -> Self {
        Self::default_config()
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        if config_path.exists() {
            let content = std::fs::read_to_string(config_path)?;
            let config: Config = serde_json::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default_config())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| LucidError::Config("home directory not found".into()))?;
        Ok(home.join(".config").join("lucid").join("config.json"))
    }

    fn default_config() -> Self {
        Self {
            backend: BackendKind::Local,
            data_dir: None,
            supabase_url: None,
            supabase_anon_key: None,
            bucket: "image-uploads".into(),
            poll_interval_ms: 2000,
            progress_interval_ms: 300,
            worker_delay_ms: 1500,
            signed_url_ttl_secs: 3600,
            signing_secret: uuid::Uuid::new_v4().to_string(),
        }
    }

    /// ローカルバックエンドの保存先
    pub fn data_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.data_dir {
            return Ok(dir.clone());
        }
        let base = dirs::data_dir()
            .ok_or_else(|| LucidError::Config("data directory not found".into()))?;
        Ok(base.join("lucid"))
    }

    pub fn get_supabase_url(&self) -> Result<String> {
        // 環境変数を優先
        if let Ok(url) = std::env::var("SUPABASE_URL") {
            if !url.trim().is_empty() {
                return Ok(url.trim_end_matches('/').to_string());
            }
        }

        self.supabase_url
            .as_deref()
            .map(|u| u.trim_end_matches('/').to_string())
            .ok_or(LucidError::MissingSupabaseCredentials)
    }

    pub fn get_supabase_key(&self) -> Result<String> {
        if let Ok(key) = std::env::var("SUPABASE_ANON_KEY") {
            if !key.trim().is_empty() {
                return Ok(key);
            }
        }

        self.supabase_anon_key
            .clone()
            .ok_or(LucidError::MissingSupabaseCredentials)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms.max(1))
    }

    pub fn worker_delay(&self) -> Duration {
        Duration::from_millis(self.worker_delay_ms)
    }

    pub fn signed_url_ttl(&self) -> Duration {
        Duration::from_secs(self.signed_url_ttl_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.backend, BackendKind::Local);
        assert_eq!(config.bucket, "image-uploads");
        assert_eq!(config.signed_url_ttl(), Duration::from_secs(3600));
        assert_eq!(config.poll_interval(), Duration::from_secs(2));
        assert!(!config.signing_secret.is_empty());
    }

    #[test]
    fn test_load_missing_file_returns_default() {
        let dir = tempdir().expect("Failed to create temp dir");
        let config = Config::load_from(&dir.path().join("none.json")).unwrap();
        assert_eq!(config.progress_interval_ms, 300);
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("nested").join("config.json");

        let mut config = Config::default();
        config.backend = BackendKind::Memory;
        config.worker_delay_ms = 0;
        config.save_to(&path).expect("保存失敗");

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.backend, BackendKind::Memory);
        assert_eq!(loaded.worker_delay(), Duration::ZERO);
        assert_eq!(loaded.signing_secret, config.signing_secret);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"backend": "supabase", "bucket": "custom"}"#).unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.backend, BackendKind::Supabase);
        assert_eq!(config.bucket, "custom");
        assert_eq!(config.poll_interval_ms, 2000);
    }

    #[test]
    fn test_explicit_data_dir() {
        let config = Config {
            data_dir: Some(PathBuf::from("/tmp/lucid-data")),
            ..Config::default()
        };
        assert_eq!(config.data_dir().unwrap(), PathBuf::from("/tmp/lucid-data"));
    }
}
