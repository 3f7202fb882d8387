//! Status - transport に依存しないエラー表現
//!
//! dispatch の失敗も出力 bytes と同じ境界を越える必要があります。
//! `ErrorStatus` はそのワイヤ形式です。
//!
//! # 構成
//! - **code**: 粗い分類（`StatusCode`）
//! - **message**: 人間向けのメッセージ
//! - **details**: 型付きの詳細（任意）
//! - **identity**: 呼び出しの識別子（任意）
//!
//! クライアント側では `into_remote_error` が details から型付きエラーを復元し、
//! details がない・code と合わないときは素の status に戻します。

use serde::{Deserialize, Serialize};

use super::context::CallIdentity;
use super::errors::ErrorKind;
use super::machine_type::MachineType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusCode {
    InvalidArgument,
    NotFound,
    FailedPrecondition,
    Unavailable,
    Internal,
    Cancelled,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ErrorDetails {
    TargetMismatch {
        expected: MachineType,
        actual: MachineType,
    },
    MethodNotFound {
        machine_type: MachineType,
        method: String,
    },
    BadInput,
    BadOutput,
    MethodFailure {
        error_kind: ErrorKind,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorStatus {
    pub code: StatusCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<ErrorDetails>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity: Option<CallIdentity>,
}

/// RemoteError はリモートの dispatcher から受け取った `ErrorStatus` の型付きビュー
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemoteError {
    #[error("target mismatch: expected {expected}, found {actual}")]
    TargetMismatch {
        expected: MachineType,
        actual: MachineType,
    },

    #[error("remote method '{method}' not found on '{machine_type}'")]
    MethodNotFound {
        machine_type: MachineType,
        method: String,
    },

    #[error("bad input: {0}")]
    BadInput(String),

    #[error("bad output: {0}")]
    BadOutput(String),

    #[error("method failed ({kind:?}): {message}")]
    MethodFailed { kind: ErrorKind, message: String },

    #[error("{code:?}: {message}")]
    Status { code: StatusCode, message: String },
}

impl RemoteError {
    pub fn is_retryable(&self) -> bool {
        match self {
            RemoteError::MethodFailed { kind, .. } => {
                matches!(kind, ErrorKind::Transient | ErrorKind::Infrastructure)
            }
            RemoteError::Status { code, .. } => *code == StatusCode::Unavailable,
            _ => false,
        }
    }
}

impl ErrorStatus {
    pub fn new(code: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
            identity: None,
        }
    }

    pub fn with_details(mut self, details: ErrorDetails) -> Self {
        self.details = Some(details);
        self
    }

    pub fn with_identity(mut self, identity: CallIdentity) -> Self {
        self.identity = Some(identity);
        self
    }

    /// code と details の組から型付きエラーを復元する
    pub fn into_remote_error(self) -> RemoteError {
        let ErrorStatus {
            code,
            message,
            details,
            ..
        } = self;

        match (code, details) {
            (StatusCode::FailedPrecondition, Some(ErrorDetails::TargetMismatch { expected, actual })) => {
                RemoteError::TargetMismatch { expected, actual }
            }
            (StatusCode::NotFound, Some(ErrorDetails::MethodNotFound { machine_type, method })) => {
                RemoteError::MethodNotFound {
                    machine_type,
                    method,
                }
            }
            (StatusCode::InvalidArgument, Some(ErrorDetails::BadInput)) => {
                RemoteError::BadInput(message)
            }
            (StatusCode::Internal, Some(ErrorDetails::BadOutput)) => RemoteError::BadOutput(message),
            (_, Some(ErrorDetails::MethodFailure { error_kind })) => RemoteError::MethodFailed {
                kind: error_kind,
                message,
            },
            (code, _) => RemoteError::Status { code, message },
        }
    }
}
