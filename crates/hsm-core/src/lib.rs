//! hsm-core
//!
//! Remote-method dispatch for hierarchical state machines.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, machine_type, reference, context, errors, status）
//! - **ports**: 抽象化レイヤー（Environment, Clock, IdGenerator）
//! - **typed**: 型付きリモートメソッド API（RemoteMethod, RemoteExecutor, MethodRegistry）
//! - **app**: Dispatcher とその構築（builder, config, status）
//! - **impls**: 実装（InMemoryEnvironment など開発用）

pub mod app;
pub mod domain;
pub mod impls;
pub mod ports;
pub mod typed;

pub use app::{
    BuildError, DispatchError, DispatchFailure, Dispatcher, DispatcherBuilder, DispatcherConfig,
    InvocationRequest, RegistryStatus,
};
pub use domain::{CallContext, ErrorKind, MachineType, MethodError, Ref, StateMachineKey};
pub use typed::{JsonMethod, MethodDefinition, MethodRegistry, RemoteExecutor, RemoteMethod};
