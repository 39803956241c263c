//! 設定ファイル（TOML）の読み込み。
//!
//! 探索順: `$SMALLSH_CONFIG` → `<config_dir>/smallsh/config.toml`。
//! ファイルが存在しなければデフォルト値を使う（エラーにしない）。

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::job::DEFAULT_CAPACITY;

/// 設定ファイルのパスを上書きする環境変数。
pub const CONFIG_ENV: &str = "SMALLSH_CONFIG";

/// リダイレクト指定のないバックグラウンドコマンドの stdin/stdout。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackgroundStdio {
    /// `/dev/null` に繋ぐ。
    #[default]
    Null,
    /// シェルの端末をそのまま継承する。
    Inherit,
}

/// シェルの設定値。
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// 各入力の前に表示するプロンプト。
    pub prompt: String,
    /// ジョブテーブルの容量。
    pub job_capacity: usize,
    pub background_stdio: BackgroundStdio,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            prompt: ": ".to_string(),
            job_capacity: DEFAULT_CAPACITY,
            background_stdio: BackgroundStdio::default(),
        }
    }
}

/// 設定読み込みのエラー。
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid job_capacity {0} (must be at least 1)")]
    InvalidJobCapacity(usize),
}

impl Config {
    /// 既定の探索パスから設定を読み込む。
    pub fn load() -> Result<Self, ConfigError> {
        match default_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    /// `path` から読み込む。ファイルが無ければデフォルト値。
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config file, using defaults");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        let config: Config = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        tracing::debug!(path = %path.display(), ?config, "config loaded");
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.job_capacity == 0 {
            return Err(ConfigError::InvalidJobCapacity(self.job_capacity));
        }
        Ok(())
    }
}

fn default_path() -> Option<PathBuf> {
    if let Some(path) = std::env::var_os(CONFIG_ENV) {
        return Some(PathBuf::from(path));
    }
    dirs::config_dir().map(|dir| dir.join("smallsh").join("config.toml"))
}
