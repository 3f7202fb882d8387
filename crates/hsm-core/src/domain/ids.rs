//! Domain identifiers (strongly-typed IDs).
//!
//! # ULID ベースの ID
//! Run や Call の識別子は ULID で表現します。
//! `Id<T>` の `T` は PhantomData のマーカー型で、実行時には何も持ちませんが、
//! `RunId` と `CallId` をコンパイル時に区別します。
//!
//! ## ULID の特性
//! - **時刻でソート可能**: ログ上で呼び出し順に並べられる
//! - **分散生成可能**: 調整なしで複数ノードで生成できる

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;
use ulid::Ulid;

/// IdMarker は各 ID 型のマーカー trait
///
/// Display で使うプレフィックス（"run-", "call-"）を提供します。
pub trait IdMarker: Send + Sync + 'static {
    fn prefix() -> &'static str;
}

/// ジェネリック ID 型
///
/// JSON 上は ULID 文字列そのもの（プレフィックスなし）として表現されます。
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Id<T: IdMarker> {
    ulid: Ulid,
    #[serde(skip)]
    _marker: PhantomData<T>,
}

impl<T: IdMarker> Id<T> {
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self {
            ulid,
            _marker: PhantomData,
        }
    }

    pub fn as_ulid(&self) -> Ulid {
        self.ulid
    }
}

impl<T: IdMarker> From<Ulid> for Id<T> {
    fn from(ulid: Ulid) -> Self {
        Self::from_ulid(ulid)
    }
}

impl<T: IdMarker> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", T::prefix(), self.ulid)
    }
}

/// Display の出力（"run-01H..."）と素の ULID 文字列の両方を受け付ける
impl<T: IdMarker> FromStr for Id<T> {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.strip_prefix(T::prefix()).unwrap_or(s);
        Ulid::from_string(raw).map(Self::from_ulid)
    }
}

// ========================================
// マーカー型の定義
// ========================================

/// Run のマーカー型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Run {}

impl IdMarker for Run {
    fn prefix() -> &'static str {
        "run-"
    }
}

/// Call のマーカー型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Call {}

impl IdMarker for Call {
    fn prefix() -> &'static str {
        "call-"
    }
}

/// Identifier of one execution run (the root of a state-machine tree).
pub type RunId = Id<Run>;

/// Identifier of one remote-method invocation, used to correlate logs and errors.
pub type CallId = Id<Call>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_distinct_types() {
        let ulid1 = Ulid::new();
        let ulid2 = Ulid::new();

        let run = RunId::from_ulid(ulid1);
        let call = CallId::from_ulid(ulid2);

        assert_eq!(run.as_ulid(), ulid1);
        assert_eq!(call.as_ulid(), ulid2);

        assert!(run.to_string().starts_with("run-"));
        assert!(call.to_string().starts_with("call-"));

        // let _: RunId = call; // <- does not compile
    }

    #[test]
    fn ids_serialize_as_plain_ulid_strings() {
        let ulid = Ulid::new();
        let run_id = RunId::from_ulid(ulid);

        let serialized = serde_json::to_string(&run_id).unwrap();
        assert_eq!(serialized, format!("\"{ulid}\""));

        let deserialized: RunId = serde_json::from_str(&serialized).unwrap();
        assert_eq!(run_id, deserialized);
    }

    #[test]
    fn parse_accepts_prefixed_and_bare_forms() {
        let run_id = RunId::from_ulid(Ulid::new());

        let from_display: RunId = run_id.to_string().parse().unwrap();
        let from_bare: RunId = run_id.as_ulid().to_string().parse().unwrap();

        assert_eq!(from_display, run_id);
        assert_eq!(from_bare, run_id);
        assert!("run-not-a-ulid".parse::<RunId>().is_err());
    }

    #[test]
    fn phantom_data_does_not_consume_memory() {
        use std::mem::size_of;

        assert_eq!(size_of::<RunId>(), size_of::<Ulid>());
        assert_eq!(size_of::<CallId>(), size_of::<Ulid>());
    }
}
