//! Environment port - state machine ツリーへのアクセス能力
//!
//! Environment は外部実装（永続化・遷移ロジックを持つ HSM 本体）が提供します。
//! dispatcher は Environment を中身を見ずに executor へ渡すだけで、
//! 1 回の呼び出しを超えて保持しません。
//!
//! # 設計原則
//! - 並行制御・一貫性は Environment 側の責務（framework はロックを取らない）
//! - キャンセル時のロールバックも Environment 側の責務

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::errors::{EnvironmentError, MethodError};
use crate::domain::machine_type::MachineType;
use crate::domain::reference::Ref;

/// Effect は executor が orchestration engine に依頼する後続作業
///
/// 例: タイマー発火の予約、シグナル配送、子実行の開始
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Effect {
    pub kind: String,
    #[serde(default)]
    pub payload: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fire_at: Option<DateTime<Utc>>,
}

impl Effect {
    pub fn new(kind: impl Into<String>, payload: Value) -> Self {
        Self {
            kind: kind.into(),
            payload,
            fire_at: None,
        }
    }

    pub fn at(mut self, fire_at: DateTime<Utc>) -> Self {
        self.fire_at = Some(fire_at);
        self
    }
}

/// Environment は Ref で指定された state machine の読み書きと副作用の予約を提供
///
/// # Object Safety
/// - `Arc<dyn Environment>` として dispatcher → executor に渡される
/// - 型付きの読み書きは [`load`] / [`store`] を使う
#[async_trait]
pub trait Environment: Send + Sync {
    /// 対象ノードの実際の型を返す（Ref が主張する型ではなく、永続化されている型）
    async fn resolve(&self, target: &Ref) -> Result<MachineType, EnvironmentError>;

    async fn read(&self, target: &Ref) -> Result<Value, EnvironmentError>;

    async fn write(&self, target: &Ref, data: Value) -> Result<(), EnvironmentError>;

    async fn schedule(&self, target: &Ref, effect: Effect) -> Result<(), EnvironmentError>;

    fn now(&self) -> DateTime<Utc>;
}

/// 対象ノードのデータを T として読み出す
pub async fn load<T: DeserializeOwned>(
    env: &dyn Environment,
    target: &Ref,
) -> Result<T, MethodError> {
    let data = env.read(target).await?;
    serde_json::from_value(data).map_err(|e| {
        MethodError::permanent(format!("state of {target} is not readable: {e}")).with_source(e)
    })
}

/// T をシリアライズして対象ノードに書き込む
pub async fn store<T: Serialize>(
    env: &dyn Environment,
    target: &Ref,
    data: &T,
) -> Result<(), MethodError> {
    let data = serde_json::to_value(data).map_err(|e| {
        MethodError::permanent(format!("state for {target} is not serializable: {e}"))
            .with_source(e)
    })?;
    env.write(target, data).await?;
    Ok(())
}
