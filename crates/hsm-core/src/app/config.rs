//! DispatcherConfig - Dispatcher の設定
//!
//! # 設計原則
//! - 全フィールドにデフォルトがある（空の JSON オブジェクトも有効な設定）
//! - 未知のフィールドは拒否する（typo を起動時に検出）

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DispatcherConfig {
    /// これより大きい入力はデコード前に拒否する。`None` なら検査しない
    pub max_input_bytes: Option<usize>,

    /// Ref が主張する型に加えて、Environment に永続化された型も確認する
    pub verify_target: bool,

    /// 入出力のサイズを debug レベルでログに出す
    pub log_payload_sizes: bool,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            max_input_bytes: None,
            verify_target: true,
            log_payload_sizes: false,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}

impl DispatcherConfig {
    /// JSON 文字列から読み込む
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }
}
