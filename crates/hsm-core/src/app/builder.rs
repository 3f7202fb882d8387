//! DispatcherBuilder - Dispatcher の構築とワイヤリング
//!
//! # 学習ポイント
//! - Builder パターンの実装
//! - 起動時検証（Fail-fast 設計）
//! - 開発体験の改善（明確なエラーメッセージ）

use std::future::Future;
use std::sync::Arc;

use super::config::DispatcherConfig;
use super::dispatcher::Dispatcher;
use crate::domain::context::CallContext;
use crate::domain::errors::MethodError;
use crate::domain::machine_type::MachineType;
use crate::domain::reference::Ref;
use crate::ports::{Environment, IdGenerator};
use crate::typed::{
    MethodDefinition, MethodRegistry, RegistrationError, RemoteExecutor, RemoteMethod,
};

/// DispatcherBuilder は Dispatcher を構築
///
/// # 使用例
/// ```ignore
/// let dispatcher = DispatcherBuilder::new()
///     .register_fn(timer_type.clone(), JsonMethod::new("Describe"), describe_timer)?
///     .expect_methods(&timer_type, &["Describe", "Reschedule"])
///     .build()?;
/// ```
///
/// # Fail-fast 設計
/// - expect_methods() で期待される (型, method) を登録
/// - build() 時に「期待集合 ⊆ 登録済み集合」をチェック
/// - 不足があれば BuildError を返す
pub struct DispatcherBuilder {
    registry: MethodRegistry,
    expected: Vec<(MachineType, String)>,
    config: DispatcherConfig,
    ids: Option<Arc<dyn IdGenerator>>,
}

/// BuildError は Dispatcher 構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("missing remote methods: {0:?}. These methods were expected but not registered.")]
    MissingMethods(Vec<String>),
}

impl DispatcherBuilder {
    pub fn new() -> Self {
        Self {
            registry: MethodRegistry::new(),
            expected: Vec::new(),
            config: DispatcherConfig::default(),
            ids: None,
        }
    }

    /// 既存の登録フェーズのレジストリから始める
    pub fn with_registry(mut self, registry: MethodRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// 各 state machine の `register_remote_methods(&mut MethodRegistry)` に渡す用
    pub fn registry_mut(&mut self) -> &mut MethodRegistry {
        &mut self.registry
    }

    pub fn register<M, E>(
        mut self,
        machine_type: MachineType,
        definition: MethodDefinition<M, E>,
    ) -> Result<Self, RegistrationError>
    where
        M: RemoteMethod,
        E: RemoteExecutor<M::Input, M::Output> + 'static,
    {
        self.registry.register(machine_type, definition)?;
        Ok(self)
    }

    pub fn register_fn<M, F, Fut>(
        mut self,
        machine_type: MachineType,
        method: M,
        executor: F,
    ) -> Result<Self, RegistrationError>
    where
        M: RemoteMethod,
        F: Fn(CallContext, Arc<dyn Environment>, Ref, M::Input) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<M::Output, MethodError>> + Send + 'static,
    {
        self.registry.register_fn(machine_type, method, executor)?;
        Ok(self)
    }

    /// 期待される method を追加（複数回呼べる）
    pub fn expect_methods(mut self, machine_type: &MachineType, methods: &[&str]) -> Self {
        for &method in methods {
            self.expected.push((machine_type.clone(), method.to_string()));
        }
        self
    }

    pub fn with_config(mut self, config: DispatcherConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = Some(ids);
        self
    }

    /// レジストリを封印して Dispatcher を生成
    ///
    /// # 検証
    /// - expect_methods() で設定された method が全て登録されているかチェック
    /// - 不足があれば BuildError::MissingMethods を返す（"型.method" 形式）
    pub fn build(self) -> Result<Dispatcher, BuildError> {
        let missing: Vec<String> = self
            .expected
            .iter()
            .filter(|(machine_type, method)| !self.registry.contains(machine_type, method))
            .map(|(machine_type, method)| format!("{machine_type}.{method}"))
            .collect();
        if !missing.is_empty() {
            return Err(BuildError::MissingMethods(missing));
        }

        let dispatcher = Dispatcher::with_config(self.registry.seal(), self.config);
        Ok(match self.ids {
            Some(ids) => dispatcher.with_id_generator(ids),
            None => dispatcher,
        })
    }
}

impl Default for DispatcherBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ids::CallId;
    use crate::ports::{FixedClock, UlidGenerator};
    use crate::typed::JsonMethod;
    use chrono::{TimeZone, Utc};
    use rstest::rstest;

    fn timer() -> MachineType {
        MachineType::new("timer").unwrap()
    }

    fn builder() -> DispatcherBuilder {
        DispatcherBuilder::new()
            .register_fn(
                timer(),
                JsonMethod::<(), String>::new("Describe"),
                |_ctx, _env, target, _input| async move { Ok(target.to_string()) },
            )
            .unwrap()
    }

    #[test]
    fn test_build_success() {
        let dispatcher = builder().expect_methods(&timer(), &["Describe"]).build();
        assert!(dispatcher.is_ok());
    }

    #[rstest]
    #[case::one_missing(&["Describe", "Reschedule"], vec!["timer.Reschedule"])]
    #[case::all_missing(&["Fire", "Reschedule"], vec!["timer.Fire", "timer.Reschedule"])]
    fn test_build_missing_methods(#[case] expected: &[&str], #[case] missing: Vec<&str>) {
        let result = builder().expect_methods(&timer(), expected).build();
        assert!(matches!(
            result,
            Err(BuildError::MissingMethods(names)) if names == missing
        ));
    }

    #[test]
    fn test_build_no_expect_methods() {
        let dispatcher = builder().build().unwrap();
        assert_eq!(dispatcher.registry().len(), 1);
    }

    #[test]
    fn with_registry_starts_from_an_existing_registration_phase() {
        let mut registry = MethodRegistry::new();
        registry
            .register_fn(
                timer(),
                JsonMethod::<(), ()>::new("Fire"),
                |_ctx, _env, _target, _input| async move { Ok(()) },
            )
            .unwrap();

        let dispatcher = DispatcherBuilder::new()
            .with_registry(registry)
            .expect_methods(&timer(), &["Fire"])
            .build()
            .unwrap();
        assert_eq!(dispatcher.registry().methods(&timer()), vec!["Fire"]);
    }

    #[test]
    fn same_name_on_another_type_does_not_satisfy_an_expectation() {
        let workflow = MachineType::new("workflow").unwrap();
        let result = builder().expect_methods(&workflow, &["Describe"]).build();
        assert!(matches!(result, Err(BuildError::MissingMethods(_))));
    }

    #[test]
    fn duplicate_registration_fails_the_chain() {
        let result = builder().register_fn(
            timer(),
            JsonMethod::<(), ()>::new("Describe"),
            |_ctx, _env, _target, _input| async move { Ok(()) },
        );
        assert!(matches!(result, Err(RegistrationError::Conflict { .. })));
    }

    #[test]
    fn registry_mut_accepts_registration_functions() {
        fn register_timer_methods(registry: &mut MethodRegistry) -> Result<(), RegistrationError> {
            registry.register_fn(
                MachineType::new("timer").unwrap(),
                JsonMethod::<(), ()>::new("Reschedule"),
                |_ctx, _env, _target, _input| async move { Ok(()) },
            )
        }

        let mut builder = builder();
        register_timer_methods(builder.registry_mut()).unwrap();
        let dispatcher = builder
            .expect_methods(&timer(), &["Describe", "Reschedule"])
            .build()
            .unwrap();
        assert_eq!(dispatcher.registry().methods(&timer()), vec!["Describe", "Reschedule"]);
    }

    #[test]
    fn config_and_id_generator_are_wired_through() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let config = DispatcherConfig {
            max_input_bytes: Some(64),
            ..DispatcherConfig::default()
        };
        let dispatcher = builder()
            .with_config(config.clone())
            .with_id_generator(Arc::new(UlidGenerator::new(FixedClock::new(now))))
            .build()
            .unwrap();

        assert_eq!(dispatcher.config(), &config);
        let call_id: CallId = dispatcher.new_context().call_id();
        assert_eq!(
            call_id.as_ulid().timestamp_ms(),
            now.timestamp_millis() as u64
        );
    }
}
