//! CallContext - 1 回の呼び出しごとのコンテキスト
//!
//! dispatcher から executor まで受け渡され、呼び出し元の deadline と
//! キャンセルを伝えます。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio_util::sync::CancellationToken;

use super::ids::CallId;
use super::machine_type::MachineType;
use super::reference::Ref;

/// CallIdentity は「誰が何を呼んだか」
///
/// dispatch エラーと、transport に載せる ErrorStatus の両方に付く。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallIdentity {
    pub call_id: CallId,
    pub machine_type: MachineType,
    pub method: String,
    pub target: Ref,
}

impl fmt::Display for CallIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}.{} on {}",
            self.call_id, self.machine_type, self.method, self.target
        )
    }
}

/// CallContext はリモートメソッド呼び出し 1 回分の実行コンテキスト
///
/// # 責務の分担
/// - dispatcher は executor を呼ぶ前に一度だけキャンセルと deadline を確認する
/// - 実行中の確認は executor の責務（ブロッキング境界ごとに見る）
/// - キャンセルしても Environment 経由の副作用は巻き戻らない
#[derive(Clone)]
pub struct CallContext {
    call_id: CallId,
    deadline: Option<DateTime<Utc>>,
    cancellation_token: CancellationToken,
}

impl CallContext {
    pub fn new(call_id: CallId) -> Self {
        Self {
            call_id,
            deadline: None,
            cancellation_token: CancellationToken::new(),
        }
    }

    pub fn with_deadline(mut self, deadline: DateTime<Utc>) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancellation_token = token;
        self
    }

    pub fn call_id(&self) -> CallId {
        self.call_id
    }

    pub fn deadline(&self) -> Option<DateTime<Utc>> {
        self.deadline
    }

    /// `now` が deadline に達していれば true
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.deadline.is_some_and(|deadline| now >= deadline)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation_token.is_cancelled()
    }

    /// 呼び出し元がキャンセルすると完了する（`tokio::select!` で executor の処理と競わせる）
    pub async fn cancelled(&self) {
        self.cancellation_token.cancelled().await
    }

    /// executor が spawn する処理用。このコンテキストと一緒にキャンセルされる
    pub fn child_token(&self) -> CancellationToken {
        self.cancellation_token.child_token()
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancellation_token
    }
}

impl fmt::Debug for CallContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallContext")
            .field("call_id", &self.call_id)
            .field("deadline", &self.deadline)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
