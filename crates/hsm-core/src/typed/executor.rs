//! RemoteExecutor trait - リモートメソッドを実行する handler の定義
//!
//! # 学習ポイント
//! - ジェネリック trait (`RemoteExecutor<I, O>`)
//! - クロージャへの blanket impl（struct を定義しなくても登録できる）

use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;

use crate::domain::context::CallContext;
use crate::domain::errors::MethodError;
use crate::domain::reference::Ref;
use crate::ports::Environment;

/// RemoteExecutor は入力 I を受け取り、対象 state machine に作用して O を返す
///
/// # 使用例
/// ```ignore
/// struct RescheduleTimer;
///
/// #[async_trait]
/// impl RemoteExecutor<RescheduleRequest, RescheduleResponse> for RescheduleTimer {
///     async fn execute(
///         &self,
///         ctx: CallContext,
///         env: Arc<dyn Environment>,
///         target: Ref,
///         input: RescheduleRequest,
///     ) -> Result<RescheduleResponse, MethodError> {
///         ...
///     }
/// }
/// ```
///
/// # 責務
/// - state の読み書きは必ず Environment 経由（Environment の一貫性契約に従う）
/// - `ctx` のキャンセル・deadline をブロッキング境界ごとに確認する
///   （framework は実行中の executor を止めない）
#[async_trait]
pub trait RemoteExecutor<I, O>: Send + Sync
where
    I: Send + 'static,
    O: Send + 'static,
{
    async fn execute(
        &self,
        ctx: CallContext,
        env: Arc<dyn Environment>,
        target: Ref,
        input: I,
    ) -> Result<O, MethodError>;
}

/// `async` なクロージャをそのまま executor として使う
///
/// 引数の型はこの impl 経由では推論されないので、
/// 型注釈を省きたいときは `MethodRegistry::register_fn` を使う。
///
/// ```ignore
/// registry.register_fn(timer, JsonMethod::<(), TimerInfo>::new("Describe"), |_ctx, env, target, _| async move {
///     load::<TimerInfo>(env.as_ref(), &target).await
/// })?;
/// ```
#[async_trait]
impl<I, O, F, Fut> RemoteExecutor<I, O> for F
where
    I: Send + 'static,
    O: Send + 'static,
    F: Fn(CallContext, Arc<dyn Environment>, Ref, I) -> Fut + Send + Sync,
    Fut: Future<Output = Result<O, MethodError>> + Send + 'static,
{
    async fn execute(
        &self,
        ctx: CallContext,
        env: Arc<dyn Environment>,
        target: Ref,
        input: I,
    ) -> Result<O, MethodError> {
        (self)(ctx, env, target, input).await
    }
}
