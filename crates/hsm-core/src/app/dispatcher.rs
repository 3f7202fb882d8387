//! Dispatcher - リモートメソッド呼び出しの入口
//!
//! transport 層（RPC ハンドラ、レプリケーション、管理 API）から呼ばれ、
//! (state machine 型, method 名, Ref, 入力 bytes) を出力 bytes に変換します。
//!
//! # 処理の流れ
//! 1. 入力サイズの検査（設定があれば）
//! 2. Ref が指す state machine の型が要求された型と一致するか検査
//! 3. レジストリから定義を引く
//! 4. 入力をデシリアライズ
//! 5. キャンセル済みなら executor を呼ばずに終了
//! 6. executor を実行（エラーはそのまま返す）
//! 7. 出力をシリアライズ
//!
//! リトライもタイムアウトもしない。どちらも呼び出し側の責務。

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::Instrument;

use super::config::DispatcherConfig;
use crate::domain::context::{CallContext, CallIdentity};
use crate::domain::errors::{EnvironmentError, ErrorKind, MethodError};
use crate::domain::machine_type::MachineType;
use crate::domain::reference::Ref;
use crate::domain::status::{ErrorDetails, ErrorStatus, StatusCode};
use crate::ports::{Environment, IdGenerator, SystemClock, UlidGenerator};
use crate::typed::{AdapterError, CodecError, SealedRegistry};

/// One remote-method call as a transport hands it over.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvocationRequest {
    pub machine_type: MachineType,
    pub method: String,
    pub target: Ref,
    pub input: Vec<u8>,
}

impl InvocationRequest {
    pub fn new(
        machine_type: MachineType,
        method: impl Into<String>,
        target: Ref,
        input: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            machine_type,
            method: method.into(),
            target,
            input: input.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchFailure {
    #[error("target mismatch: expected a {expected}, found a {actual}")]
    TargetMismatch {
        expected: MachineType,
        actual: MachineType,
    },

    #[error("target unavailable: {0}")]
    TargetUnavailable(#[source] EnvironmentError),

    #[error("remote method not found")]
    MethodNotFound,

    #[error("bad input: {0}")]
    BadInput(#[source] CodecError),

    /// 宣言された型の値をシリアライズできなかった = method 実装のバグ
    #[error("bad output: {0}")]
    BadOutput(#[source] CodecError),

    #[error("cancelled before execution")]
    Cancelled,

    #[error(transparent)]
    Executor(MethodError),

    /// 登録とディスパッチの不整合（narrowing 失敗）
    #[error("internal consistency violation: {0}")]
    Internal(#[source] AdapterError),
}

impl DispatchFailure {
    /// method 実装か framework のバグを示すか
    pub fn is_defect(&self) -> bool {
        matches!(self, DispatchFailure::BadOutput(_) | DispatchFailure::Internal(_))
    }
}

#[derive(Debug, thiserror::Error)]
#[error("{failure} ({identity})")]
pub struct DispatchError {
    identity: CallIdentity,
    #[source]
    failure: DispatchFailure,
}

impl DispatchError {
    pub fn identity(&self) -> &CallIdentity {
        &self.identity
    }

    pub fn failure(&self) -> &DispatchFailure {
        &self.failure
    }

    pub fn into_failure(self) -> DispatchFailure {
        self.failure
    }

    /// transport に載せるための status に変換する
    ///
    /// どの variant でも `identity` に呼び出しの識別子が入る。
    pub fn to_status(&self) -> ErrorStatus {
        let message = self.to_string();
        let status = match &self.failure {
            DispatchFailure::TargetMismatch { expected, actual }
            | DispatchFailure::TargetUnavailable(EnvironmentError::TypeConflict {
                expected,
                actual,
                ..
            }) => ErrorStatus::new(StatusCode::FailedPrecondition, message).with_details(
                ErrorDetails::TargetMismatch {
                    expected: expected.clone(),
                    actual: actual.clone(),
                },
            ),
            DispatchFailure::TargetUnavailable(EnvironmentError::NotFound(_)) => {
                ErrorStatus::new(StatusCode::NotFound, message)
            }
            DispatchFailure::TargetUnavailable(EnvironmentError::Storage(_)) => {
                ErrorStatus::new(StatusCode::Unavailable, message)
            }
            DispatchFailure::MethodNotFound => ErrorStatus::new(StatusCode::NotFound, message)
                .with_details(ErrorDetails::MethodNotFound {
                    machine_type: self.identity.machine_type.clone(),
                    method: self.identity.method.clone(),
                }),
            DispatchFailure::BadInput(_) => {
                ErrorStatus::new(StatusCode::InvalidArgument, message)
                    .with_details(ErrorDetails::BadInput)
            }
            DispatchFailure::BadOutput(_) => {
                ErrorStatus::new(StatusCode::Internal, message).with_details(ErrorDetails::BadOutput)
            }
            DispatchFailure::Cancelled => ErrorStatus::new(StatusCode::Cancelled, message),
            DispatchFailure::Executor(err) => {
                let code = match err.kind() {
                    ErrorKind::Transient => StatusCode::Unavailable,
                    ErrorKind::Infrastructure => StatusCode::Internal,
                    ErrorKind::Permanent | ErrorKind::InvalidState => StatusCode::FailedPrecondition,
                };
                // handler のメッセージはそのまま渡す
                ErrorStatus::new(code, err.message()).with_details(ErrorDetails::MethodFailure {
                    error_kind: err.kind(),
                })
            }
            DispatchFailure::Internal(_) => ErrorStatus::new(StatusCode::Internal, message),
        };
        status.with_identity(self.identity.clone())
    }
}

/// Dispatcher は封印済みレジストリを使ってリモートメソッドを実行する
///
/// `Send + Sync` で、リクエストごとの状態を持たない。`Arc<Dispatcher>` で共有する。
pub struct Dispatcher {
    registry: Arc<SealedRegistry>,
    config: DispatcherConfig,
    ids: Arc<dyn IdGenerator>,
}

impl Dispatcher {
    pub fn new(registry: SealedRegistry) -> Self {
        Self::with_config(registry, DispatcherConfig::default())
    }

    pub fn with_config(registry: SealedRegistry, config: DispatcherConfig) -> Self {
        Self {
            registry: Arc::new(registry),
            config,
            ids: Arc::new(UlidGenerator::new(SystemClock)),
        }
    }

    pub fn with_id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    pub fn registry(&self) -> &SealedRegistry {
        &self.registry
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// 新しい CallId を持つ context（deadline なし、未キャンセル）
    pub fn new_context(&self) -> CallContext {
        CallContext::new(self.ids.generate_call_id())
    }

    /// Execute one remote-method call.
    pub async fn invoke(
        &self,
        ctx: CallContext,
        env: Arc<dyn Environment>,
        request: InvocationRequest,
    ) -> Result<Vec<u8>, DispatchError> {
        let identity = CallIdentity {
            call_id: ctx.call_id(),
            machine_type: request.machine_type,
            method: request.method,
            target: request.target,
        };
        let span = tracing::debug_span!(
            "remote_method",
            call_id = %identity.call_id,
            machine_type = %identity.machine_type,
            method = %identity.method,
            target = %identity.target,
        );

        async {
            match self.dispatch(&identity, ctx, env, &request.input).await {
                Ok(output) => {
                    tracing::debug!("remote method completed");
                    Ok(output)
                }
                Err(failure) => {
                    log_failure(&failure);
                    Err(DispatchError { identity, failure })
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn dispatch(
        &self,
        identity: &CallIdentity,
        ctx: CallContext,
        env: Arc<dyn Environment>,
        input: &[u8],
    ) -> Result<Vec<u8>, DispatchFailure> {
        if let Some(limit) = self.config.max_input_bytes
            && input.len() > limit
        {
            return Err(DispatchFailure::BadInput(CodecError::TooLarge {
                size: input.len(),
                limit,
            }));
        }

        let claimed = identity.target.machine_type();
        if claimed != &identity.machine_type {
            return Err(DispatchFailure::TargetMismatch {
                expected: identity.machine_type.clone(),
                actual: claimed.clone(),
            });
        }
        if self.config.verify_target {
            let actual = env
                .resolve(&identity.target)
                .await
                .map_err(DispatchFailure::TargetUnavailable)?;
            if actual != identity.machine_type {
                return Err(DispatchFailure::TargetMismatch {
                    expected: identity.machine_type.clone(),
                    actual,
                });
            }
        }

        let definition = self
            .registry
            .lookup(&identity.machine_type, &identity.method)
            .ok_or(DispatchFailure::MethodNotFound)?;

        let value = definition
            .deserialize_erased(input)
            .map_err(DispatchFailure::BadInput)?;

        if ctx.is_cancelled() || ctx.is_expired(env.now()) {
            return Err(DispatchFailure::Cancelled);
        }

        let output = definition
            .invoke_erased(ctx, env, identity.target.clone(), value)
            .await
            .map_err(|err| match err {
                AdapterError::Method(err) => DispatchFailure::Executor(err),
                other => DispatchFailure::Internal(other),
            })?;

        let bytes = definition
            .serialize_erased(output)
            .map_err(|err| match err {
                AdapterError::Codec(err) => DispatchFailure::BadOutput(err),
                other => DispatchFailure::Internal(other),
            })?;

        if self.config.log_payload_sizes {
            tracing::debug!(
                input_bytes = input.len(),
                output_bytes = bytes.len(),
                "remote method payload sizes"
            );
        }
        Ok(bytes)
    }
}

fn log_failure(failure: &DispatchFailure) {
    match failure {
        f if f.is_defect() => tracing::error!(error = %f, "remote method defect"),
        DispatchFailure::Executor(err) => {
            tracing::debug!(error = %err, kind = ?err.kind(), "remote method returned an error")
        }
        f => tracing::warn!(error = %f, "remote method call rejected"),
    }
}
