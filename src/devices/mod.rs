// MIT License - Copyright (c) 2026 The paradox-bridge Authors
// Element attribute templates and per-type status decoding

pub mod door;
pub mod partition;
pub mod pgm;
pub mod system;
pub mod zone;

use serde_json::{Map, Value};

use crate::storage::ElementType;

pub use door::DoorCommand;
pub use partition::{derive_state, PartitionCommand, PartitionState, PartitionStatusFlags};
pub use pgm::PgmCommand;
pub use system::PanicType;
pub use zone::{ZoneCommand, ZoneStatusFlags};

/// Default attributes a freshly labelled element starts with.
pub fn template(ty: ElementType) -> Map<String, Value> {
    match ty {
        ElementType::Zone => zone::template(),
        ElementType::Partition => partition::template(),
        ElementType::Pgm => pgm::template(),
        ElementType::Door => door::template(),
        ElementType::BusModule | ElementType::Repeater | ElementType::Keypad => system::module_template(),
        ElementType::KeySwitch => flags(&["triggered"]),
        ElementType::System => system::template(),
        ElementType::User => Map::new(),
    }
}

pub(crate) fn flags(names: &[&str]) -> Map<String, Value> {
    names
        .iter()
        .map(|name| (name.to_string(), Value::Bool(false)))
        .collect()
}
