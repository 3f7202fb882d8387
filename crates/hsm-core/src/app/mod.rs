//! App - アプリケーション層
//!
//! 封印済みレジストリと Environment を組み合わせて呼び出しを処理します。
//!
//! # 主要コンポーネント
//! - **DispatcherBuilder**: 登録と起動時検証
//! - **Dispatcher**: 名前で引いたリモートメソッドを実行
//! - **DispatcherConfig**: 入力サイズ上限などの設定
//! - **RegistryStatus**: 登録済み method の一覧

pub mod builder;
pub mod config;
pub mod dispatcher;
pub mod status;

// 主要な型を再エクスポート
pub use self::builder::{BuildError, DispatcherBuilder};
pub use self::config::{ConfigError, DispatcherConfig};
pub use self::dispatcher::{DispatchError, DispatchFailure, Dispatcher, InvocationRequest};
pub use self::status::{MachineTypeStatus, MethodStatus, RegistryStatus};
