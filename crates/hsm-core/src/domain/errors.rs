//! Errors - handler 側のエラー型と分類
//!
//! `MethodError` は executor が返すドメインエラーです。
//! dispatcher はこれを解釈・リトライせず、そのまま呼び出し元へ返します。

use serde::{Deserialize, Serialize};

use super::machine_type::MachineType;
use super::reference::Ref;

/// ErrorKind は handler エラーの運用分類
///
/// リトライ判断は呼び出し側の責務。この分類はその判断材料。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// 一時的なエラー（リトライ推奨）
    Transient,
    /// 恒久的なエラー（リトライ無意味）
    Permanent,
    /// インフラエラー（ストレージ等の障害）
    Infrastructure,
    /// 対象インスタンスがこの method を受け付けられる状態にない
    InvalidState,
}

/// MethodError はリモートメソッドの handler が返すエラー
#[derive(Debug)]
pub struct MethodError {
    kind: ErrorKind,
    message: String,
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl MethodError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transient, message)
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Permanent, message)
    }

    pub fn infrastructure(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Infrastructure, message)
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidState, message)
    }

    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self.kind, ErrorKind::Transient | ErrorKind::Infrastructure)
    }
}

impl std::fmt::Display for MethodError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MethodError (kind: {:?}): {}", self.kind, self.message)
    }
}

impl std::error::Error for MethodError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

/// EnvironmentError は Environment（state machine ツリーの外部実装）が返すエラー
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EnvironmentError {
    #[error("state machine not found: {0}")]
    NotFound(Ref),

    #[error("state machine {target} is a {actual}, not a {expected}")]
    TypeConflict {
        target: Ref,
        expected: MachineType,
        actual: MachineType,
    },

    #[error("storage error: {0}")]
    Storage(String),
}

impl From<EnvironmentError> for MethodError {
    fn from(err: EnvironmentError) -> Self {
        let kind = match &err {
            EnvironmentError::NotFound(_) | EnvironmentError::TypeConflict { .. } => {
                ErrorKind::Permanent
            }
            EnvironmentError::Storage(_) => ErrorKind::Infrastructure,
        };
        MethodError::new(kind, err.to_string()).with_source(err)
    }
}
