//! Status - 登録済みリモートメソッドの一覧
//!
//! 管理 API や CLI が「どの型にどの method があるか」を表示するためのビュー。

use serde::{Deserialize, Serialize};

use crate::domain::machine_type::MachineType;
use crate::typed::SealedRegistry;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodStatus {
    pub name: String,
    pub input_type: String,
    pub output_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineTypeStatus {
    pub machine_type: MachineType,
    pub methods: Vec<MethodStatus>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryStatus {
    pub machine_types: Vec<MachineTypeStatus>,
    pub total_methods: usize,
}

impl RegistryStatus {
    /// 型名順、method 名順に並べる
    pub fn from_registry(registry: &SealedRegistry) -> Self {
        let machine_types: Vec<MachineTypeStatus> = registry
            .machine_types()
            .into_iter()
            .map(|machine_type| MachineTypeStatus {
                machine_type: machine_type.clone(),
                methods: registry
                    .methods(machine_type)
                    .into_iter()
                    .filter_map(|name| registry.lookup(machine_type, name))
                    .map(|definition| MethodStatus {
                        name: definition.name().to_string(),
                        input_type: definition.input_type().to_string(),
                        output_type: definition.output_type().to_string(),
                    })
                    .collect(),
            })
            .collect();

        Self {
            total_methods: machine_types.iter().map(|t| t.methods.len()).sum(),
            machine_types,
        }
    }

    pub fn find(&self, machine_type: &MachineType) -> Option<&MachineTypeStatus> {
        self.machine_types
            .iter()
            .find(|status| &status.machine_type == machine_type)
    }
}
