//! MachineType - state machine の種類を表す識別子
//!
//! レジストリのキー、Ref のパス要素、エラーの識別情報として使われます。
//! 空文字列は許可しません（構築時とデシリアライズ時の両方で検証）。

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;

/// State machine type identifier (e.g. `workflow`, `timer`, `nexus_operation`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MachineType(String);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("machine type must not be empty")]
    EmptyMachineType,
}

impl MachineType {
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(ValidationError::EmptyMachineType);
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for MachineType {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<MachineType> for String {
    fn from(value: MachineType) -> Self {
        value.0
    }
}

impl FromStr for MachineType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for MachineType {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// HashMap<MachineType, _> を &str で引けるようにする
impl Borrow<str> for MachineType {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MachineType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
