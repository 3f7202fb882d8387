//! Impls - ports の実装（開発用・テスト用）
//!
//! # 含まれる実装
//! - **InMemoryEnvironment**: HashMap 上の state machine ツリー
//!
//! 本番の Environment は HSM 本体（永続化層）が提供します。

pub mod inmem_environment;

pub use self::inmem_environment::InMemoryEnvironment;
