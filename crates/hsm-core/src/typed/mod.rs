//! Typed - 型付きリモートメソッド API
//!
//! handler の作者は入出力の型をコンパイル時に固定し、
//! dispatcher 側は型消去された一様な表面だけを扱います。
//!
//! # 二層構造
//! - **表層（Typed）**: `RemoteMethod` trait, `RemoteExecutor<I, O>` trait - 型安全
//! - **内部（Dyn）**: `ErasedMethod` trait - object-safe, type erasure
//!
//! 両者をつなぐのは `MethodDefinition<M, E>` だけです。

pub mod codec;
pub mod erased;
pub mod executor;
pub mod method;
pub mod registry;

pub use self::codec::{CodecError, JsonMethod};
pub use self::erased::{AdapterError, AnyValue, ErasedMethod, MethodDefinition};
pub use self::executor::RemoteExecutor;
pub use self::method::RemoteMethod;
pub use self::registry::{MethodRegistry, RegistrationError, SealedRegistry};
