//! Ports - 抽象化レイヤー
//!
//! framework の外側にある能力（state machine ツリー、時刻、ID 生成）への
//! インターフェースを定義します。実装は `impls` か、framework を使う側が提供します。

pub mod clock;
pub mod environment;
pub mod id_generator;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::environment::{Effect, Environment, load, store};
pub use self::id_generator::{IdGenerator, UlidGenerator};
