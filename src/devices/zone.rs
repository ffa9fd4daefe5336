// MIT License - Copyright (c) 2026 The paradox-bridge Authors
// Zones

use std::str::FromStr;

use bitflags::bitflags;
use serde_json::{Map, Value};

use crate::error::ParadoxError;

bitflags! {
    /// Per-zone status byte read from the RAM status blocks (MSB first).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ZoneStatusFlags: u8 {
        const GENERATED_ALARM             = 0b1000_0000;
        const PRESENTLY_IN_ALARM          = 0b0100_0000;
        const ACTIVATED_ENTRY_DELAY       = 0b0010_0000;
        const ACTIVATED_INTELLIZONE_DELAY = 0b0001_0000;
        const BYPASSED                    = 0b0000_1000;
        const SHUTTED_DOWN                = 0b0000_0100;
        const TX_DELAY                    = 0b0000_0010;
        const SUPERVISION_TROUBLE         = 0b0000_0001;
    }
}

/// Attribute name for every status bit.
const ZONE_FLAG_NAMES: [(&str, ZoneStatusFlags); 8] = [
    ("generated_alarm", ZoneStatusFlags::GENERATED_ALARM),
    ("presently_in_alarm", ZoneStatusFlags::PRESENTLY_IN_ALARM),
    ("activated_entry_delay", ZoneStatusFlags::ACTIVATED_ENTRY_DELAY),
    ("activated_intellizone_delay", ZoneStatusFlags::ACTIVATED_INTELLIZONE_DELAY),
    ("bypassed", ZoneStatusFlags::BYPASSED),
    ("shutted_down", ZoneStatusFlags::SHUTTED_DOWN),
    ("tx_delay", ZoneStatusFlags::TX_DELAY),
    ("supervision_trouble", ZoneStatusFlags::SUPERVISION_TROUBLE),
];

impl ZoneStatusFlags {
    pub fn from_byte(b: u8) -> Self {
        Self::from_bits_truncate(b)
    }

    /// Expand into `{attribute: bool}` for every status bit.
    pub fn to_attributes(self) -> Map<String, Value> {
        ZONE_FLAG_NAMES
            .iter()
            .map(|(name, flag)| (name.to_string(), Value::Bool(self.contains(*flag))))
            .collect()
    }
}

pub fn template() -> Map<String, Value> {
    let mut attrs = super::flags(&["open", "tamper", "low_battery"]);
    attrs.extend(ZoneStatusFlags::empty().to_attributes());
    attrs
}

/// Commands accepted by `control_zone`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoneCommand {
    Bypass,
    ClearBypass,
    ClearAlarmMemory,
}

impl ZoneCommand {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bypass => "bypass",
            Self::ClearBypass => "clear_bypass",
            Self::ClearAlarmMemory => "clear_alarm_memory",
        }
    }

    /// The bypass state the zone should end up in, for bypass commands.
    pub fn target_bypass(&self) -> Option<bool> {
        match self {
            Self::Bypass => Some(true),
            Self::ClearBypass => Some(false),
            Self::ClearAlarmMemory => None,
        }
    }
}

impl FromStr for ZoneCommand {
    type Err = ParadoxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "bypass" => Ok(Self::Bypass),
            "clear_bypass" => Ok(Self::ClearBypass),
            "clear_alarm_memory" => Ok(Self::ClearAlarmMemory),
            other => Err(ParadoxError::mapping(other, "zone")),
        }
    }
}
