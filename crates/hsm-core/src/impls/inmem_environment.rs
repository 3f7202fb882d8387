//! InMemoryEnvironment - 開発・テスト用の Environment
//!
//! # 実装詳細
//! - ノードは「型を除いた位置」（namespace, workflow, run, id のパス）で管理
//!   → Ref が別の型を主張しても同じノードに解決され、型の不一致を検出できる
//! - tokio の RwLock で排他制御（ロックを握ったまま await しない）
//! - schedule された Effect は記録するだけで実行しない

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::domain::errors::EnvironmentError;
use crate::domain::ids::RunId;
use crate::domain::machine_type::MachineType;
use crate::domain::reference::Ref;
use crate::ports::{Clock, Effect, Environment, SystemClock};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct Location {
    namespace_id: String,
    workflow_id: String,
    run_id: RunId,
    ids: Vec<String>,
}

impl From<&Ref> for Location {
    fn from(target: &Ref) -> Self {
        Self {
            namespace_id: target.namespace_id().to_string(),
            workflow_id: target.workflow_id().to_string(),
            run_id: target.run_id(),
            ids: target.path().iter().map(|key| key.id.clone()).collect(),
        }
    }
}

#[derive(Debug, Clone)]
struct Node {
    machine_type: MachineType,
    data: Value,
}

/// InMemoryEnvironment は HashMap 上の state machine ツリー
///
/// # 使用例
/// ```ignore
/// let env = InMemoryEnvironment::new();
/// env.insert(&timer_ref, json!({ "fired": false })).await;
/// let dispatcher_env: Arc<dyn Environment> = Arc::new(env);
/// ```
pub struct InMemoryEnvironment<C = SystemClock> {
    nodes: RwLock<HashMap<Location, Node>>,
    effects: RwLock<Vec<(Ref, Effect)>>,
    clock: C,
}

impl InMemoryEnvironment<SystemClock> {
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl Default for InMemoryEnvironment<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> InMemoryEnvironment<C> {
    pub fn with_clock(clock: C) -> Self {
        Self {
            nodes: RwLock::new(HashMap::new()),
            effects: RwLock::new(Vec::new()),
            clock,
        }
    }

    /// ノードを作成（既存なら置き換え）。型は Ref の末尾キーの型になる
    pub async fn insert(&self, target: &Ref, data: Value) {
        let node = Node {
            machine_type: target.machine_type().clone(),
            data,
        };
        self.nodes.write().await.insert(Location::from(target), node);
    }

    pub async fn contains(&self, target: &Ref) -> bool {
        self.nodes.read().await.contains_key(&Location::from(target))
    }

    /// これまでに schedule された Effect（全ノード分、発行順）
    pub async fn effects(&self) -> Vec<(Ref, Effect)> {
        self.effects.read().await.clone()
    }

    pub async fn effects_for(&self, target: &Ref) -> Vec<Effect> {
        self.effects
            .read()
            .await
            .iter()
            .filter(|(r, _)| r == target)
            .map(|(_, effect)| effect.clone())
            .collect()
    }

    async fn node_type(&self, target: &Ref) -> Result<MachineType, EnvironmentError> {
        self.nodes
            .read()
            .await
            .get(&Location::from(target))
            .map(|node| node.machine_type.clone())
            .ok_or_else(|| EnvironmentError::NotFound(target.clone()))
    }

    fn check_type(target: &Ref, node: &Node) -> Result<(), EnvironmentError> {
        if &node.machine_type != target.machine_type() {
            return Err(EnvironmentError::TypeConflict {
                target: target.clone(),
                expected: target.machine_type().clone(),
                actual: node.machine_type.clone(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl<C: Clock> Environment for InMemoryEnvironment<C> {
    async fn resolve(&self, target: &Ref) -> Result<MachineType, EnvironmentError> {
        self.node_type(target).await
    }

    async fn read(&self, target: &Ref) -> Result<Value, EnvironmentError> {
        let nodes = self.nodes.read().await;
        let node = nodes
            .get(&Location::from(target))
            .ok_or_else(|| EnvironmentError::NotFound(target.clone()))?;
        Self::check_type(target, node)?;
        Ok(node.data.clone())
    }

    async fn write(&self, target: &Ref, data: Value) -> Result<(), EnvironmentError> {
        let mut nodes = self.nodes.write().await;
        let node = nodes
            .get_mut(&Location::from(target))
            .ok_or_else(|| EnvironmentError::NotFound(target.clone()))?;
        Self::check_type(target, node)?;
        node.data = data;
        Ok(())
    }

    async fn schedule(&self, target: &Ref, effect: Effect) -> Result<(), EnvironmentError> {
        let actual = self.node_type(target).await?;
        if &actual != target.machine_type() {
            return Err(EnvironmentError::TypeConflict {
                target: target.clone(),
                expected: target.machine_type().clone(),
                actual,
            });
        }
        self.effects.write().await.push((target.clone(), effect));
        Ok(())
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::reference::StateMachineKey;
    use crate::ports::FixedClock;
    use chrono::TimeZone;
    use serde_json::json;
    use ulid::Ulid;

    fn key(machine_type: &str, id: &str) -> StateMachineKey {
        StateMachineKey::new(MachineType::new(machine_type).unwrap(), id)
    }

    fn workflow_ref() -> Ref {
        Ref::root("default", "wf-1", RunId::from_ulid(Ulid::new()), key("workflow", "wf-1"))
    }

    #[tokio::test]
    async fn read_write_roundtrip() {
        let env = InMemoryEnvironment::new();
        let target = workflow_ref();
        env.insert(&target, json!({ "status": "running" })).await;

        env.write(&target, json!({ "status": "completed" })).await.unwrap();
        let data = env.read(&target).await.unwrap();
        assert_eq!(data, json!({ "status": "completed" }));
    }

    #[tokio::test]
    async fn missing_nodes_are_not_found() {
        let env = InMemoryEnvironment::new();
        let target = workflow_ref();

        assert!(matches!(
            env.read(&target).await,
            Err(EnvironmentError::NotFound(_))
        ));
        assert!(matches!(
            env.resolve(&target).await,
            Err(EnvironmentError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn resolve_reports_the_stored_type() {
        let env = InMemoryEnvironment::new();
        let root = workflow_ref();
        let timer = root.child(key("timer", "t-1"));
        env.insert(&timer, json!({})).await;

        // 同じ位置を別の型だと主張する Ref
        let claimed_as_callback = root.child(key("callback", "t-1"));
        let actual = env.resolve(&claimed_as_callback).await.unwrap();
        assert_eq!(actual.as_str(), "timer");

        assert!(matches!(
            env.read(&claimed_as_callback).await,
            Err(EnvironmentError::TypeConflict { .. })
        ));
    }

    #[tokio::test]
    async fn schedule_records_effects_per_target() {
        let fixed = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let env = InMemoryEnvironment::with_clock(FixedClock::new(fixed));
        let root = workflow_ref();
        let timer = root.child(key("timer", "t-1"));
        env.insert(&root, json!({})).await;
        env.insert(&timer, json!({})).await;

        let effect = Effect::new("timer_fired", json!({})).at(env.now());
        env.schedule(&timer, effect.clone()).await.unwrap();
        env.schedule(&root, Effect::new("noop", Value::Null)).await.unwrap();

        assert_eq!(env.effects().await.len(), 2);
        assert_eq!(env.effects_for(&timer).await, vec![effect]);
        assert_eq!(env.now(), fixed);
    }
}
