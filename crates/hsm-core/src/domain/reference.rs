//! Ref - 階層化された state machine の 1 インスタンスを指すアドレス
//!
//! # 構造
//! - 実行の識別子: namespace, workflow id, run id
//! - ルートから対象ノードまでの StateMachineKey のパス
//!
//! パスは空にならない。末尾のキーが対象インスタンス。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::ids::RunId;
use super::machine_type::{MachineType, ValidationError};

/// Ref パスの 1 段（ノードの型と、兄弟の中での id）
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StateMachineKey {
    pub machine_type: MachineType,
    pub id: String,
}

impl StateMachineKey {
    pub fn new(machine_type: MachineType, id: impl Into<String>) -> Self {
        Self {
            machine_type,
            id: id.into(),
        }
    }
}

impl fmt::Display for StateMachineKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.machine_type, self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RefError {
    #[error("ref path must contain at least one state machine key")]
    EmptyPath,

    #[error("state machine key must look like `type:id`, got `{0}`")]
    MalformedKey(String),

    #[error(transparent)]
    InvalidMachineType(#[from] ValidationError),
}

/// `type:id` をパースする。id 側に `:` が含まれてもよい
impl FromStr for StateMachineKey {
    type Err = RefError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (machine_type, id) = s
            .split_once(':')
            .ok_or_else(|| RefError::MalformedKey(s.to_string()))?;
        if id.is_empty() {
            return Err(RefError::MalformedKey(s.to_string()));
        }
        Ok(Self::new(MachineType::new(machine_type)?, id))
    }
}

/// Ref はちょうど 1 つの state machine インスタンスを指す
///
/// 呼び出し側が一度だけ解決し、呼び出しの間は変更されない。
/// デシリアライズ時も空のパスは `RawRef` 経由で拒否される。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawRef")]
pub struct Ref {
    namespace_id: String,
    workflow_id: String,
    run_id: RunId,
    path: Vec<StateMachineKey>,
}

#[derive(Deserialize)]
struct RawRef {
    namespace_id: String,
    workflow_id: String,
    run_id: RunId,
    path: Vec<StateMachineKey>,
}

impl TryFrom<RawRef> for Ref {
    type Error = RefError;

    fn try_from(raw: RawRef) -> Result<Self, Self::Error> {
        Self::from_path(raw.namespace_id, raw.workflow_id, raw.run_id, raw.path)
    }
}

impl Ref {
    /// run のルートノードを指す Ref
    pub fn root(
        namespace_id: impl Into<String>,
        workflow_id: impl Into<String>,
        run_id: RunId,
        root: StateMachineKey,
    ) -> Self {
        Self {
            namespace_id: namespace_id.into(),
            workflow_id: workflow_id.into(),
            run_id,
            path: vec![root],
        }
    }

    pub fn from_path(
        namespace_id: impl Into<String>,
        workflow_id: impl Into<String>,
        run_id: RunId,
        path: Vec<StateMachineKey>,
    ) -> Result<Self, RefError> {
        if path.is_empty() {
            return Err(RefError::EmptyPath);
        }
        Ok(Self {
            namespace_id: namespace_id.into(),
            workflow_id: workflow_id.into(),
            run_id,
            path,
        })
    }

    /// このノードの子を指す Ref
    pub fn child(&self, key: StateMachineKey) -> Self {
        let mut child = self.clone();
        child.path.push(key);
        child
    }

    /// 親ノードを指す Ref（ルートでは `None`）
    pub fn parent(&self) -> Option<Self> {
        if self.path.len() == 1 {
            return None;
        }
        let mut parent = self.clone();
        parent.path.pop();
        Some(parent)
    }

    pub fn namespace_id(&self) -> &str {
        &self.namespace_id
    }

    pub fn workflow_id(&self) -> &str {
        &self.workflow_id
    }

    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    pub fn path(&self) -> &[StateMachineKey] {
        &self.path
    }

    /// 対象ノードのキー
    pub fn key(&self) -> &StateMachineKey {
        // パスは構築時に非空が保証されている
        &self.path[self.path.len() - 1]
    }

    /// 呼び出し側が主張する対象ノードの型（永続化された型とは限らない）
    pub fn machine_type(&self) -> &MachineType {
        &self.key().machine_type
    }

    /// ルートからの段数（ルートは 1）
    pub fn depth(&self) -> usize {
        self.path.len()
    }
}

impl fmt::Display for Ref {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.namespace_id, self.workflow_id, self.run_id)?;
        for key in &self.path {
            write!(f, "/{key}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use ulid::Ulid;

    fn key(machine_type: &str, id: &str) -> StateMachineKey {
        StateMachineKey::new(MachineType::new(machine_type).unwrap(), id)
    }

    fn workflow_ref() -> Ref {
        Ref::root("default", "wf-1", RunId::from_ulid(Ulid::new()), key("workflow", "wf-1"))
    }

    #[test]
    fn child_and_parent_walk_the_path() {
        let root = workflow_ref();
        let timer = root.child(key("timer", "t-1"));

        assert_eq!(timer.depth(), 2);
        assert_eq!(timer.machine_type().as_str(), "timer");
        assert_eq!(timer.key().id, "t-1");
        assert_eq!(timer.parent(), Some(root.clone()));
        assert_eq!(root.parent(), None);
    }

    #[test]
    fn display_lists_every_key() {
        let root = workflow_ref();
        let timer = root.child(key("timer", "t-1"));
        let shown = timer.to_string();

        assert!(shown.starts_with("default/wf-1/run-"));
        assert!(shown.ends_with("/workflow:wf-1/timer:t-1"));
    }

    #[test]
    fn empty_path_is_rejected() {
        let result = Ref::from_path("default", "wf-1", RunId::from_ulid(Ulid::new()), vec![]);
        assert_eq!(result, Err(RefError::EmptyPath));
    }

    #[test]
    fn serde_roundtrip_keeps_identity() {
        let timer = workflow_ref().child(key("timer", "t-1"));
        let json = serde_json::to_string(&timer).unwrap();
        let back: Ref = serde_json::from_str(&json).unwrap();
        assert_eq!(back, timer);
    }

    #[test]
    fn deserializing_an_empty_path_fails() {
        let json = serde_json::json!({
            "namespace_id": "default",
            "workflow_id": "wf-1",
            "run_id": Ulid::new().to_string(),
            "path": [],
        });
        assert!(serde_json::from_value::<Ref>(json).is_err());
    }

    #[rstest]
    #[case::simple("timer:t-1", "timer", "t-1")]
    #[case::colon_in_id("callback:cb:7", "callback", "cb:7")]
    fn parses_keys(#[case] input: &str, #[case] machine_type: &str, #[case] id: &str) {
        let parsed: StateMachineKey = input.parse().unwrap();
        assert_eq!(parsed, key(machine_type, id));
    }

    #[rstest]
    #[case::no_separator("timer")]
    #[case::empty_id("timer:")]
    #[case::empty_type(":t-1")]
    fn rejects_malformed_keys(#[case] input: &str) {
        assert!(input.parse::<StateMachineKey>().is_err());
    }
}
