//! Machines - CLI で使うサンプル state machine
//!
//! # 含まれる state machine
//! - **workflow**: signal を受け付ける（Describe, Signal）
//! - **timer**: workflow の子。再スケジュールと発火ができる（Describe, Reschedule, Fire）
//!
//! 実際のコンポーネントと同じく、各モジュールは起動時に呼ぶ
//! `register_remote_methods` を公開します。

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use hsm_core::domain::MachineType;
use hsm_core::impls::InMemoryEnvironment;
use hsm_core::ports::{Effect, Environment, load, store};
use hsm_core::typed::{JsonMethod, MethodRegistry};
use hsm_core::{CallContext, DispatcherBuilder, MethodError, Ref};
use serde::{Deserialize, Serialize};
use serde_json::json;

pub const WORKFLOW: &str = "workflow";
pub const TIMER: &str = "timer";

pub mod workflow {
    use super::*;

    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    pub struct WorkflowState {
        pub signals: Vec<String>,
    }

    #[derive(Debug, Deserialize)]
    pub struct SignalRequest {
        pub name: String,
        #[serde(default)]
        pub payload: serde_json::Value,
    }

    #[derive(Debug, Serialize)]
    pub struct SignalResponse {
        pub accepted_signals: usize,
    }

    async fn describe(
        _ctx: CallContext,
        env: Arc<dyn Environment>,
        target: Ref,
        _input: (),
    ) -> Result<WorkflowState, MethodError> {
        load(env.as_ref(), &target).await
    }

    /// signal を記録し、受信 Effect を発行する
    async fn signal(
        _ctx: CallContext,
        env: Arc<dyn Environment>,
        target: Ref,
        input: SignalRequest,
    ) -> Result<SignalResponse, MethodError> {
        if input.name.trim().is_empty() {
            return Err(MethodError::permanent("signal name must not be empty"));
        }
        let mut state: WorkflowState = load(env.as_ref(), &target).await?;
        state.signals.push(input.name.clone());
        store(env.as_ref(), &target, &state).await?;
        env.schedule(
            &target,
            Effect::new("signal_received", json!({ "name": input.name, "payload": input.payload })),
        )
        .await?;
        Ok(SignalResponse {
            accepted_signals: state.signals.len(),
        })
    }

    pub fn register_remote_methods(registry: &mut MethodRegistry) -> anyhow::Result<()> {
        let mt = MachineType::new(WORKFLOW)?;
        registry.register_fn(mt.clone(), JsonMethod::<(), WorkflowState>::new("Describe"), describe)?;
        registry.register_fn(
            mt,
            JsonMethod::<SignalRequest, SignalResponse>::new("Signal"),
            signal,
        )?;
        Ok(())
    }
}

pub mod timer {
    use super::*;

    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    pub struct TimerState {
        pub fire_at: Option<DateTime<Utc>>,
        pub fired: bool,
        pub reschedules: u32,
    }

    #[derive(Debug, Deserialize)]
    pub struct RescheduleRequest {
        pub delay_seconds: i64,
    }

    #[derive(Debug, Serialize)]
    pub struct RescheduleResponse {
        pub fire_at: DateTime<Utc>,
        pub reschedules: u32,
    }

    async fn describe(
        _ctx: CallContext,
        env: Arc<dyn Environment>,
        target: Ref,
        _input: (),
    ) -> Result<TimerState, MethodError> {
        load(env.as_ref(), &target).await
    }

    /// 発火時刻を `now + delay_seconds` に置き換え、発火 Effect を予約する
    ///
    /// # エラー
    /// - 負の delay、または時刻として表せない delay → Permanent
    /// - 発火済みのタイマー → InvalidState
    async fn reschedule(
        _ctx: CallContext,
        env: Arc<dyn Environment>,
        target: Ref,
        input: RescheduleRequest,
    ) -> Result<RescheduleResponse, MethodError> {
        if input.delay_seconds < 0 {
            return Err(MethodError::permanent(format!(
                "delay must not be negative, got {}s",
                input.delay_seconds
            )));
        }
        let fire_at = TimeDelta::try_seconds(input.delay_seconds)
            .and_then(|delay| env.now().checked_add_signed(delay))
            .ok_or_else(|| {
                MethodError::permanent(format!(
                    "delay out of range, got {}s",
                    input.delay_seconds
                ))
            })?;

        let mut state: TimerState = load(env.as_ref(), &target).await?;
        if state.fired {
            return Err(MethodError::invalid_state("timer has already fired"));
        }

        state.fire_at = Some(fire_at);
        state.reschedules += 1;
        store(env.as_ref(), &target, &state).await?;
        env.schedule(&target, Effect::new("timer_fired", json!({})).at(fire_at))
            .await?;

        Ok(RescheduleResponse {
            fire_at,
            reschedules: state.reschedules,
        })
    }

    /// タイマーを即時に発火させる。発火は一度だけ
    async fn fire(
        _ctx: CallContext,
        env: Arc<dyn Environment>,
        target: Ref,
        _input: (),
    ) -> Result<TimerState, MethodError> {
        let mut state: TimerState = load(env.as_ref(), &target).await?;
        if state.fired {
            return Err(MethodError::invalid_state("timer has already fired"));
        }

        state.fired = true;
        state.fire_at = Some(env.now());
        store(env.as_ref(), &target, &state).await?;
        env.schedule(&target, Effect::new("timer_fired", json!({ "manual": true })))
            .await?;
        Ok(state)
    }

    pub fn register_remote_methods(registry: &mut MethodRegistry) -> anyhow::Result<()> {
        let mt = MachineType::new(TIMER)?;
        registry.register_fn(mt.clone(), JsonMethod::<(), TimerState>::new("Describe"), describe)?;
        registry.register_fn(
            mt.clone(),
            JsonMethod::<RescheduleRequest, RescheduleResponse>::new("Reschedule"),
            reschedule,
        )?;
        registry.register_fn(mt, JsonMethod::<(), TimerState>::new("Fire"), fire)?;
        Ok(())
    }
}

/// 全サンプル state machine を登録し、CLI が前提とする method を宣言する
pub fn install(mut builder: DispatcherBuilder) -> anyhow::Result<DispatcherBuilder> {
    workflow::register_remote_methods(builder.registry_mut())?;
    timer::register_remote_methods(builder.registry_mut())?;
    Ok(builder
        .expect_methods(&MachineType::new(WORKFLOW)?, &["Describe", "Signal"])
        .expect_methods(&MachineType::new(TIMER)?, &["Describe", "Reschedule", "Fire"]))
}

/// `target` のパス上の全ノードを、その型の初期状態で作成する（既存ノードはそのまま）
pub async fn seed(env: &InMemoryEnvironment, target: &Ref) -> anyhow::Result<()> {
    let mut node = Some(target.clone());
    while let Some(current) = node {
        if !env.contains(&current).await {
            let initial = match current.machine_type().as_str() {
                WORKFLOW => serde_json::to_value(workflow::WorkflowState::default())?,
                TIMER => serde_json::to_value(timer::TimerState::default())?,
                _ => json!({}),
            };
            env.insert(&current, initial).await;
        }
        node = current.parent();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use hsm_core::domain::{ErrorKind, RunId, StateMachineKey};
    use hsm_core::ports::{IdGenerator, SystemClock, UlidGenerator};
    use hsm_core::{DispatchFailure, Dispatcher, InvocationRequest};

    fn dispatcher() -> Dispatcher {
        install(DispatcherBuilder::new()).unwrap().build().unwrap()
    }

    fn timer_ref() -> Ref {
        let run_id: RunId = UlidGenerator::new(SystemClock).generate_run_id();
        Ref::root(
            "default",
            "wf-1",
            run_id,
            StateMachineKey::new(MachineType::new(WORKFLOW).unwrap(), "wf-1"),
        )
        .child(StateMachineKey::new(MachineType::new(TIMER).unwrap(), "t-1"))
    }

    #[tokio::test]
    async fn reschedule_updates_state_and_schedules_a_timer() {
        let dispatcher = dispatcher();
        let env = Arc::new(InMemoryEnvironment::new());
        let target = timer_ref();
        seed(&env, &target).await.unwrap();

        let request = InvocationRequest::new(
            MachineType::new(TIMER).unwrap(),
            "Reschedule",
            target.clone(),
            br#"{"delay_seconds":30}"#,
        );
        dispatcher
            .invoke(dispatcher.new_context(), env.clone(), request)
            .await
            .unwrap();

        let state: timer::TimerState = serde_json::from_value(env.read(&target).await.unwrap()).unwrap();
        assert_eq!(state.reschedules, 1);
        let effects = env.effects_for(&target).await;
        assert_eq!(effects.len(), 1);
        assert_eq!(effects[0].fire_at, state.fire_at);
    }

    #[tokio::test]
    async fn negative_delay_is_a_permanent_failure() {
        let dispatcher = dispatcher();
        let env = Arc::new(InMemoryEnvironment::new());
        let target = timer_ref();
        seed(&env, &target).await.unwrap();

        let request = InvocationRequest::new(
            MachineType::new(TIMER).unwrap(),
            "Reschedule",
            target.clone(),
            br#"{"delay_seconds":-1}"#,
        );
        let err = dispatcher
            .invoke(dispatcher.new_context(), env.clone(), request)
            .await
            .unwrap_err();

        assert!(matches!(
            err.failure(),
            DispatchFailure::Executor(e) if e.kind() == ErrorKind::Permanent
        ));
        assert!(env.effects().await.is_empty());
    }

    #[tokio::test]
    async fn out_of_range_delay_is_a_permanent_failure() {
        let dispatcher = dispatcher();
        let env = Arc::new(InMemoryEnvironment::new());
        let target = timer_ref();
        seed(&env, &target).await.unwrap();

        let request = InvocationRequest::new(
            MachineType::new(TIMER).unwrap(),
            "Reschedule",
            target.clone(),
            br#"{"delay_seconds":9000000000000000}"#,
        );
        let err = dispatcher
            .invoke(dispatcher.new_context(), env.clone(), request)
            .await
            .unwrap_err();

        match err.failure() {
            DispatchFailure::Executor(e) => {
                assert_eq!(e.kind(), ErrorKind::Permanent);
                assert!(e.message().contains("out of range"));
            }
            other => panic!("expected the executor error, got {other:?}"),
        }
        let state: timer::TimerState = serde_json::from_value(env.read(&target).await.unwrap()).unwrap();
        assert_eq!(state.reschedules, 0);
        assert!(env.effects().await.is_empty());
    }

    #[tokio::test]
    async fn fired_timer_rejects_fire_and_reschedule() {
        let dispatcher = dispatcher();
        let env = Arc::new(InMemoryEnvironment::new());
        let target = timer_ref();
        seed(&env, &target).await.unwrap();
        let timer_type = MachineType::new(TIMER).unwrap();

        let output = dispatcher
            .invoke(
                dispatcher.new_context(),
                env.clone(),
                InvocationRequest::new(timer_type.clone(), "Fire", target.clone(), b"null"),
            )
            .await
            .unwrap();
        let state: timer::TimerState = serde_json::from_slice(&output).unwrap();
        assert!(state.fired);

        for (method, input) in [("Fire", "null"), ("Reschedule", r#"{"delay_seconds":10}"#)] {
            let err = dispatcher
                .invoke(
                    dispatcher.new_context(),
                    env.clone(),
                    InvocationRequest::new(timer_type.clone(), method, target.clone(), input.as_bytes()),
                )
                .await
                .unwrap_err();
            assert!(matches!(
                err.failure(),
                DispatchFailure::Executor(e) if e.kind() == ErrorKind::InvalidState
            ));
        }
        assert_eq!(env.effects_for(&target).await.len(), 1);
    }

    #[tokio::test]
    async fn seed_initializes_every_ancestor() {
        let env = InMemoryEnvironment::new();
        let target = timer_ref();
        seed(&env, &target).await.unwrap();

        assert!(env.contains(&target).await);
        assert!(env.contains(&target.parent().unwrap()).await);
    }
}
