//! Erasure adapter - 型付き定義と型消去された表面の橋渡し
//!
//! # 学習ポイント
//! - Object-safe trait (`ErasedMethod`)
//! - Type erasure パターン (`MethodDefinition<M, E>` → `dyn ErasedMethod`)
//! - `Box<dyn Any + Send>::downcast` による narrowing
//! - Sealed trait（外部から ErasedMethod を実装させない）
//!
//! # 不変条件
//! `ErasedMethod` の実装は `MethodDefinition<M, E>` だけで、
//! 生成はジェネリックなコンストラクタ経由のみ。
//! そのため `deserialize_erased` が返す値は必ず同じ定義の `invoke_erased` が
//! 受け付ける型になる。narrowing（downcast）はこのファイルの `narrow` だけが行い、
//! 型が合わなければ executor を呼ばずにエラーを返す。

use async_trait::async_trait;
use std::any::{Any, type_name};
use std::future::Future;
use std::sync::Arc;

use super::codec::CodecError;
use super::executor::RemoteExecutor;
use super::method::RemoteMethod;
use crate::domain::context::CallContext;
use crate::domain::errors::MethodError;
use crate::domain::reference::Ref;
use crate::ports::Environment;

/// 型消去された値
pub type AnyValue = Box<dyn Any + Send>;

#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    /// 登録とディスパッチの不整合。発生したらバグ
    #[error("remote method '{method}' was handed a value that is not a {expected}")]
    Narrowing {
        method: String,
        expected: &'static str,
    },

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Method(#[from] MethodError),
}

mod private {
    pub trait Sealed {}
}

/// ErasedMethod は object-safe なリモートメソッド定義
///
/// `HashMap<String, Arc<dyn ErasedMethod>>` に異なる (I, O) の定義を混在させるための表面。
///
/// # Object Safety
/// - メソッドはジェネリックではない（入出力は `AnyValue`）
/// - `dyn ErasedMethod` として trait object にできる
#[async_trait]
pub trait ErasedMethod: private::Sealed + Send + Sync {
    fn name(&self) -> &str;

    /// 入力型の名前（診断・一覧表示用）
    fn input_type(&self) -> &'static str;

    /// 出力型の名前（診断・一覧表示用）
    fn output_type(&self) -> &'static str;

    /// input を I に narrowing して executor を呼ぶ。executor のエラーは `AdapterError::Method` でそのまま返す
    async fn invoke_erased(
        &self,
        ctx: CallContext,
        env: Arc<dyn Environment>,
        target: Ref,
        input: AnyValue,
    ) -> Result<AnyValue, AdapterError>;

    /// output を O に narrowing して契約でシリアライズ
    fn serialize_erased(&self, output: AnyValue) -> Result<Vec<u8>, AdapterError>;

    /// 契約でデシリアライズして型消去（bytes に narrowing は不要）
    fn deserialize_erased(&self, data: &[u8]) -> Result<AnyValue, CodecError>;
}

/// MethodDefinition は (契約, executor) の組
///
/// # 使用例
/// ```ignore
/// let definition = MethodDefinition::new(JsonMethod::new("Reschedule"), RescheduleTimer);
/// registry.register(timer_type, definition)?;
/// ```
pub struct MethodDefinition<M, E> {
    method: M,
    executor: E,
}

impl<M, E> MethodDefinition<M, E>
where
    M: RemoteMethod,
    E: RemoteExecutor<M::Input, M::Output>,
{
    pub fn new(method: M, executor: E) -> Self {
        Self { method, executor }
    }
}

impl<M, F, Fut> MethodDefinition<M, F>
where
    M: RemoteMethod,
    F: Fn(CallContext, Arc<dyn Environment>, Ref, M::Input) -> Fut + Send + Sync,
    Fut: Future<Output = Result<M::Output, MethodError>> + Send + 'static,
{
    /// クロージャから定義を作る（引数の型は契約から推論される）
    pub fn from_fn(method: M, executor: F) -> Self {
        Self { method, executor }
    }
}

impl<M: RemoteMethod, E> MethodDefinition<M, E> {
    pub fn method(&self) -> &M {
        &self.method
    }

    fn narrow<T: Any>(&self, value: AnyValue) -> Result<T, AdapterError> {
        value
            .downcast::<T>()
            .map(|boxed| *boxed)
            .map_err(|_| AdapterError::Narrowing {
                method: self.method.name().to_string(),
                expected: type_name::<T>(),
            })
    }
}

impl<M, E> private::Sealed for MethodDefinition<M, E> {}

#[async_trait]
impl<M, E> ErasedMethod for MethodDefinition<M, E>
where
    M: RemoteMethod,
    E: RemoteExecutor<M::Input, M::Output> + 'static,
{
    fn name(&self) -> &str {
        self.method.name()
    }

    fn input_type(&self) -> &'static str {
        type_name::<M::Input>()
    }

    fn output_type(&self) -> &'static str {
        type_name::<M::Output>()
    }

    async fn invoke_erased(
        &self,
        ctx: CallContext,
        env: Arc<dyn Environment>,
        target: Ref,
        input: AnyValue,
    ) -> Result<AnyValue, AdapterError> {
        let input: M::Input = self.narrow(input)?;
        let output = self.executor.execute(ctx, env, target, input).await?;
        Ok(Box::new(output))
    }

    fn serialize_erased(&self, output: AnyValue) -> Result<Vec<u8>, AdapterError> {
        let output: M::Output = self.narrow(output)?;
        Ok(self.method.serialize_output(&output)?)
    }

    fn deserialize_erased(&self, data: &[u8]) -> Result<AnyValue, CodecError> {
        let input = self.method.deserialize_input(data)?;
        Ok(Box::new(input))
    }
}
