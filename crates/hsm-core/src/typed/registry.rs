//! MethodRegistry - リモートメソッド定義の登録と管理
//!
//! # 学習ポイント
//! - HashMap での型消去された trait object の管理
//! - Generic methods での登録と型安全性
//! - Typestate: `MethodRegistry`（登録フェーズ）→ `seal()` → `SealedRegistry`（参照フェーズ）
//!
//! # 登録フェーズと参照フェーズ
//! - 起動時に `&mut MethodRegistry` を各 state machine の登録関数に渡す
//! - `seal()` で `SealedRegistry` に変換。以降は登録 API 自体が存在しない
//!   → 遅れた登録はコンパイルエラーになり、ロックも不要

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use super::erased::{ErasedMethod, MethodDefinition};
use super::executor::RemoteExecutor;
use super::method::RemoteMethod;
use crate::domain::context::CallContext;
use crate::domain::errors::MethodError;
use crate::domain::machine_type::MachineType;
use crate::domain::reference::Ref;
use crate::ports::Environment;

type MethodTable = HashMap<MachineType, HashMap<String, Arc<dyn ErasedMethod>>>;

/// RegistrationError は起動時の設定ミス
///
/// 無視してはいけない（プロセスは起動を中止するべき）。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistrationError {
    #[error("remote method on '{machine_type}' must have a non-empty name")]
    EmptyName { machine_type: MachineType },

    #[error("remote method '{method}' is already registered for '{machine_type}'")]
    Conflict {
        machine_type: MachineType,
        method: String,
    },
}

/// MethodRegistry は登録フェーズのレジストリ
///
/// # 使用例
/// ```ignore
/// let mut registry = MethodRegistry::new();
/// timer::register_remote_methods(&mut registry)?;
/// workflow::register_remote_methods(&mut registry)?;
/// let registry = registry.seal();
/// ```
///
/// # 内部実装
/// - 型付き定義を `MethodDefinition` で包み `Arc<dyn ErasedMethod>` として保持
/// - キーは (MachineType, method 名)。同じ名前でも型が違えば別エントリ
/// - 更新・削除はできない（契約を変えるときは新しい名前で登録する）
#[derive(Default)]
pub struct MethodRegistry {
    methods: MethodTable,
}

impl MethodRegistry {
    pub fn new() -> Self {
        Self {
            methods: HashMap::new(),
        }
    }

    /// 定義を登録する。同じ型に同じ名前があれば失敗し、既存の登録はそのまま残る
    pub fn register<M, E>(
        &mut self,
        machine_type: MachineType,
        definition: MethodDefinition<M, E>,
    ) -> Result<(), RegistrationError>
    where
        M: RemoteMethod,
        E: RemoteExecutor<M::Input, M::Output> + 'static,
    {
        let name = definition.method().name().to_string();
        if name.is_empty() {
            return Err(RegistrationError::EmptyName { machine_type });
        }

        let methods = self.methods.entry(machine_type.clone()).or_default();
        match methods.entry(name) {
            Entry::Occupied(entry) => Err(RegistrationError::Conflict {
                machine_type,
                method: entry.key().clone(),
            }),
            Entry::Vacant(entry) => {
                tracing::debug!(
                    machine_type = %machine_type,
                    method = %entry.key(),
                    "registered remote method"
                );
                entry.insert(Arc::new(definition));
                Ok(())
            }
        }
    }

    /// 契約と executor から登録する
    pub fn register_method<M, E>(
        &mut self,
        machine_type: MachineType,
        method: M,
        executor: E,
    ) -> Result<(), RegistrationError>
    where
        M: RemoteMethod,
        E: RemoteExecutor<M::Input, M::Output> + 'static,
    {
        self.register(machine_type, MethodDefinition::new(method, executor))
    }

    /// 契約とクロージャから登録する（クロージャの引数型は契約から推論される）
    pub fn register_fn<M, F, Fut>(
        &mut self,
        machine_type: MachineType,
        method: M,
        executor: F,
    ) -> Result<(), RegistrationError>
    where
        M: RemoteMethod,
        F: Fn(CallContext, Arc<dyn Environment>, Ref, M::Input) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<M::Output, MethodError>> + Send + 'static,
    {
        self.register(machine_type, MethodDefinition::from_fn(method, executor))
    }

    pub fn contains(&self, machine_type: &MachineType, method: &str) -> bool {
        self.methods
            .get(machine_type)
            .is_some_and(|methods| methods.contains_key(method))
    }

    pub fn len(&self) -> usize {
        self.methods.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 登録フェーズを終える
    pub fn seal(self) -> SealedRegistry {
        let registry = SealedRegistry {
            methods: self.methods,
        };
        tracing::debug!(
            machine_types = registry.methods.len(),
            methods = registry.len(),
            "sealed remote method registry"
        );
        registry
    }
}

/// SealedRegistry は参照専用のレジストリ
///
/// 不変なので `Arc<SealedRegistry>` で任意のスレッドからロックなしで参照できる。
pub struct SealedRegistry {
    methods: MethodTable,
}

impl SealedRegistry {
    pub fn lookup(&self, machine_type: &MachineType, method: &str) -> Option<Arc<dyn ErasedMethod>> {
        self.methods
            .get(machine_type)
            .and_then(|methods| methods.get(method))
            .cloned()
    }

    /// 登録済みの state machine 型（名前順）
    pub fn machine_types(&self) -> Vec<&MachineType> {
        let mut types: Vec<&MachineType> = self.methods.keys().collect();
        types.sort();
        types
    }

    /// ある型に登録された method 名（名前順）
    pub fn methods(&self, machine_type: &MachineType) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .methods
            .get(machine_type)
            .map(|methods| methods.keys().map(String::as_str).collect())
            .unwrap_or_default();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.methods.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn debug_table(table: &MethodTable, name: &str, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let mut map = f.debug_map();
    for (machine_type, methods) in table {
        let names: Vec<&String> = methods.keys().collect();
        map.entry(machine_type, &names);
    }
    map.finish()?;
    write!(f, " ({name})")
}

impl fmt::Debug for MethodRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        debug_table(&self.methods, "open", f)
    }
}

impl fmt::Debug for SealedRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        debug_table(&self.methods, "sealed", f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::typed::codec::JsonMethod;

    fn mt(value: &str) -> MachineType {
        MachineType::new(value).unwrap()
    }

    fn echo(name: &'static str) -> MethodDefinition<JsonMethod<String, String>, impl RemoteExecutor<String, String>> {
        MethodDefinition::from_fn(
            JsonMethod::<String, String>::new(name),
            |_ctx, _env, _target, input| async move { Ok(input) },
        )
    }

    fn length(name: &'static str) -> MethodDefinition<JsonMethod<String, usize>, impl RemoteExecutor<String, usize>> {
        MethodDefinition::from_fn(
            JsonMethod::<String, usize>::new(name),
            |_ctx, _env, _target, input: String| async move { Ok(input.len()) },
        )
    }

    #[test]
    fn register_and_lookup() {
        let mut registry = MethodRegistry::new();
        registry.register(mt("timer"), echo("Echo")).unwrap();

        let registry = registry.seal();
        let found = registry.lookup(&mt("timer"), "Echo").unwrap();
        assert_eq!(found.name(), "Echo");
        assert!(registry.lookup(&mt("timer"), "Missing").is_none());
        assert!(registry.lookup(&mt("workflow"), "Echo").is_none());
    }

    #[test]
    fn duplicate_name_fails_and_keeps_the_first_registration() {
        let mut registry = MethodRegistry::new();
        registry.register(mt("timer"), echo("Describe")).unwrap();

        let result = registry.register(mt("timer"), length("Describe"));
        assert_eq!(
            result,
            Err(RegistrationError::Conflict {
                machine_type: mt("timer"),
                method: "Describe".into(),
            })
        );
        assert_eq!(registry.len(), 1);

        let registry = registry.seal();
        let kept = registry.lookup(&mt("timer"), "Describe").unwrap();
        assert!(kept.output_type().ends_with("String"));
    }

    #[test]
    fn same_name_on_different_machine_types_does_not_collide() {
        let mut registry = MethodRegistry::new();
        registry.register(mt("timer"), echo("Describe")).unwrap();
        registry.register(mt("workflow"), length("Describe")).unwrap();

        let registry = registry.seal();
        let timer = registry.lookup(&mt("timer"), "Describe").unwrap();
        let workflow = registry.lookup(&mt("workflow"), "Describe").unwrap();

        assert!(timer.output_type().ends_with("String"));
        assert_eq!(workflow.output_type(), "usize");
    }

    #[test]
    fn empty_names_are_rejected() {
        let mut registry = MethodRegistry::new();
        let result = registry.register(mt("timer"), echo(""));
        assert_eq!(
            result,
            Err(RegistrationError::EmptyName {
                machine_type: mt("timer")
            })
        );
        assert!(registry.is_empty());
    }

    #[test]
    fn listing_is_sorted() {
        let mut registry = MethodRegistry::new();
        registry.register(mt("workflow"), echo("Signal")).unwrap();
        registry.register(mt("timer"), echo("Reschedule")).unwrap();
        registry.register(mt("timer"), echo("Describe")).unwrap();

        assert!(registry.contains(&mt("timer"), "Describe"));
        assert!(!registry.contains(&mt("timer"), "Signal"));

        let registry = registry.seal();
        let types: Vec<&str> = registry.machine_types().iter().map(|t| t.as_str()).collect();
        assert_eq!(types, vec!["timer", "workflow"]);
        assert_eq!(registry.methods(&mt("timer")), vec!["Describe", "Reschedule"]);
        assert!(registry.methods(&mt("callback")).is_empty());
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn register_method_accepts_a_struct_executor() {
        struct Noop;

        #[async_trait::async_trait]
        impl RemoteExecutor<(), ()> for Noop {
            async fn execute(
                &self,
                _ctx: CallContext,
                _env: Arc<dyn Environment>,
                _target: Ref,
                _input: (),
            ) -> Result<(), MethodError> {
                Ok(())
            }
        }

        let mut registry = MethodRegistry::new();
        registry
            .register_method(mt("timer"), JsonMethod::<(), ()>::new("Noop"), Noop)
            .unwrap();
        assert!(registry.contains(&mt("timer"), "Noop"));
    }
}
