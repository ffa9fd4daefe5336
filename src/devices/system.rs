// MIT License - Copyright (c) 2026 The paradox-bridge Authors
// System record, bus modules and panic types

use std::str::FromStr;

use serde_json::{json, Map, Value};

use crate::error::ParadoxError;

/// The single `system` record: nested maps filled in by the status blocks.
pub fn template() -> Map<String, Value> {
    let value = json!({
        "power": {"vdc": null, "battery": null, "dc": null},
        "rf": {"noise_floor": null},
        "date": {"time": null, "weekday": null},
        "troubles": {"trouble": false},
        "panel_status": {"installer_lock_active": false},
        "report": {},
        "event": {},
    });
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// Bus modules, repeaters and keypads share one attribute set.
pub fn module_template() -> Map<String, Value> {
    let mut attrs = super::flags(&[
        "trouble",
        "tamper",
        "supervision_trouble",
        "ac_loss",
        "battery_failure",
    ]);
    attrs.insert("signal_strength".into(), Value::from(0));
    attrs
}

/// Panic alarm kinds accepted by `send_panic`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanicType {
    Emergency,
    Medical,
    Fire,
}

impl PanicType {
    pub fn code(&self) -> u8 {
        match self {
            Self::Emergency => 0,
            Self::Medical => 1,
            Self::Fire => 2,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Emergency),
            1 => Some(Self::Medical),
            2 => Some(Self::Fire),
            _ => None,
        }
    }
}

impl FromStr for PanicType {
    type Err = ParadoxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "emergency" | "police" => Ok(Self::Emergency),
            "medical" => Ok(Self::Medical),
            "fire" => Ok(Self::Fire),
            other => Err(ParadoxError::mapping(other, "panic")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_template_shape() {
        let t = template();
        assert_eq!(t["troubles"]["trouble"], json!(false));
        assert!(t["power"]["vdc"].is_null());
        assert_eq!(t["panel_status"]["installer_lock_active"], json!(false));
    }

    #[test]
    fn test_panic_type() {
        assert_eq!("medical".parse::<PanicType>().unwrap(), PanicType::Medical);
        assert_eq!(PanicType::from_code(PanicType::Fire.code()), Some(PanicType::Fire));
        assert!("flood".parse::<PanicType>().is_err());
    }
}
