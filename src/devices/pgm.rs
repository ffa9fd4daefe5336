// MIT License - Copyright (c) 2026 The paradox-bridge Authors
// Programmable outputs

use std::str::FromStr;

use serde_json::{Map, Value};

use crate::error::ParadoxError;

pub fn template() -> Map<String, Value> {
    let mut attrs = super::flags(&["on", "pulse", "tamper", "supervision_trouble"]);
    attrs.insert("signal_strength".into(), Value::from(0));
    attrs
}

/// Commands accepted by `control_output`.
///
/// `Pulse` is emulated as `On`, a wait, then `Off`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PgmCommand {
    On,
    Off,
    OnOverride,
    OffOverride,
    Pulse,
}

impl PgmCommand {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::On => "on",
            Self::Off => "off",
            Self::OnOverride => "on_override",
            Self::OffOverride => "off_override",
            Self::Pulse => "pulse",
        }
    }
}

impl FromStr for PgmCommand {
    type Err = ParadoxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "on" => Ok(Self::On),
            "off" => Ok(Self::Off),
            "on_override" => Ok(Self::OnOverride),
            "off_override" => Ok(Self::OffOverride),
            "pulse" => Ok(Self::Pulse),
            other => Err(ParadoxError::mapping(other, "pgm")),
        }
    }
}
