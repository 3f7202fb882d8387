//! Codec - ペイロードのエンコード/デコード
//!
//! `JsonMethod<I, O>` は serde_json で入出力を扱う標準の RemoteMethod 実装です。
//! 独自フォーマット（protobuf など）が必要なら RemoteMethod を直接実装します。

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt;
use std::marker::PhantomData;

use super::method::RemoteMethod;

/// CodecError はペイロードの不正・非互換を表す（リトライ対象外）
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("payload of {size} bytes exceeds the limit of {limit} bytes")]
    TooLarge { size: usize, limit: usize },
}

/// JsonMethod は JSON で入出力する RemoteMethod
///
/// # 使用例
/// ```ignore
/// let describe = JsonMethod::<DescribeRequest, TimerInfo>::new("Describe");
/// registry.register_method(timer_type, describe, describe_timer)?;
/// ```
///
/// `PhantomData<fn(I) -> O>` なので I, O が Sync でなくても JsonMethod は Send + Sync。
pub struct JsonMethod<I, O> {
    name: String,
    _marker: PhantomData<fn(I) -> O>,
}

impl<I, O> JsonMethod<I, O> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            _marker: PhantomData,
        }
    }
}

impl<I, O> Clone for JsonMethod<I, O> {
    fn clone(&self) -> Self {
        Self::new(self.name.clone())
    }
}

impl<I, O> fmt::Debug for JsonMethod<I, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonMethod")
            .field("name", &self.name)
            .field("input", &std::any::type_name::<I>())
            .field("output", &std::any::type_name::<O>())
            .finish()
    }
}

impl<I, O> RemoteMethod for JsonMethod<I, O>
where
    I: DeserializeOwned + Send + 'static,
    O: Serialize + Send + 'static,
{
    type Input = I;
    type Output = O;

    fn name(&self) -> &str {
        &self.name
    }

    fn serialize_output(&self, output: &O) -> Result<Vec<u8>, CodecError> {
        Ok(serde_json::to_vec(output)?)
    }

    fn deserialize_input(&self, data: &[u8]) -> Result<I, CodecError> {
        Ok(serde_json::from_slice(data)?)
    }
}
