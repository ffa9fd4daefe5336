// MIT License - Copyright (c) 2026 The paradox-bridge Authors
// Partitions and the derived arming state

use std::fmt;
use std::str::FromStr;

use bitflags::bitflags;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::ParadoxError;

bitflags! {
    /// Four-byte partition status record (big-endian, MSB of byte 0 first).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PartitionStatusFlags: u32 {
        const FIRE_ALARM            = 1 << 31;
        const AUDIBLE_ALARM         = 1 << 30;
        const SILENT_ALARM          = 1 << 29;
        const WAS_IN_ALARM          = 1 << 28;
        const ARM_NO_ENTRY          = 1 << 27;
        const ARM_STAY              = 1 << 26;
        const ARM_AWAY              = 1 << 25;
        const ARM                   = 1 << 24;

        const LOCKOUT               = 1 << 23;
        const PROGRAMMING           = 1 << 22;
        const ZONE_BYPASSED         = 1 << 21;
        const ALARM_IN_MEMORY       = 1 << 20;
        const TROUBLE               = 1 << 19;
        const ENTRY_DELAY           = 1 << 18;
        const EXIT_DELAY            = 1 << 17;
        const READY                 = 1 << 16;

        const PANIC_ALARM           = 1 << 15;
        const DURESS_ALARM          = 1 << 14;
        const POLICE_CODE_DELAY     = 1 << 13;
        const FOLLOW_BECOME_DELAY   = 1 << 12;
        const REMOTE_ARM            = 1 << 11;
        const STAYD_MODE            = 1 << 10;
        const FORCE_READY           = 1 << 9;
        const BYPASS_READY          = 1 << 8;

        const ARM_SLEEP             = 1 << 7;
        const AUTO_ARMING_ENGAGED   = 1 << 6;
        const RECENT_CLOSING_DELAY  = 1 << 5;
        const INTELLIZONE_ENGAGE    = 1 << 4;
        const ALL_ZONES_CLOSED      = 1 << 3;
        const INHIBIT_READY         = 1 << 2;
        const TIME_TO_REFRESH       = 1 << 1;
        const ZONE_SUPERVISION      = 1 << 0;
    }
}

const PARTITION_FLAG_NAMES: [(&str, PartitionStatusFlags); 32] = [
    ("fire_alarm", PartitionStatusFlags::FIRE_ALARM),
    ("audible_alarm", PartitionStatusFlags::AUDIBLE_ALARM),
    ("silent_alarm", PartitionStatusFlags::SILENT_ALARM),
    ("was_in_alarm", PartitionStatusFlags::WAS_IN_ALARM),
    ("arm_no_entry", PartitionStatusFlags::ARM_NO_ENTRY),
    ("arm_stay", PartitionStatusFlags::ARM_STAY),
    ("arm_away", PartitionStatusFlags::ARM_AWAY),
    ("arm", PartitionStatusFlags::ARM),
    ("lockout", PartitionStatusFlags::LOCKOUT),
    ("programming", PartitionStatusFlags::PROGRAMMING),
    ("zone_bypassed", PartitionStatusFlags::ZONE_BYPASSED),
    ("alarm_in_memory", PartitionStatusFlags::ALARM_IN_MEMORY),
    ("trouble", PartitionStatusFlags::TROUBLE),
    ("entry_delay", PartitionStatusFlags::ENTRY_DELAY),
    ("exit_delay", PartitionStatusFlags::EXIT_DELAY),
    ("ready", PartitionStatusFlags::READY),
    ("panic_alarm", PartitionStatusFlags::PANIC_ALARM),
    ("duress_alarm", PartitionStatusFlags::DURESS_ALARM),
    ("police_code_delay", PartitionStatusFlags::POLICE_CODE_DELAY),
    ("follow_become_delay", PartitionStatusFlags::FOLLOW_BECOME_DELAY),
    ("remote_arm", PartitionStatusFlags::REMOTE_ARM),
    ("stayd_mode", PartitionStatusFlags::STAYD_MODE),
    ("force_ready", PartitionStatusFlags::FORCE_READY),
    ("bypass_ready", PartitionStatusFlags::BYPASS_READY),
    ("arm_sleep", PartitionStatusFlags::ARM_SLEEP),
    ("auto_arming_engaged", PartitionStatusFlags::AUTO_ARMING_ENGAGED),
    ("recent_closing_delay", PartitionStatusFlags::RECENT_CLOSING_DELAY),
    ("intellizone_engage", PartitionStatusFlags::INTELLIZONE_ENGAGE),
    ("all_zones_closed", PartitionStatusFlags::ALL_ZONES_CLOSED),
    ("inhibit_ready", PartitionStatusFlags::INHIBIT_READY),
    ("time_to_refresh", PartitionStatusFlags::TIME_TO_REFRESH),
    ("zone_supervision", PartitionStatusFlags::ZONE_SUPERVISION),
];

impl PartitionStatusFlags {
    pub fn from_bytes(bytes: [u8; 4]) -> Self {
        Self::from_bits_truncate(u32::from_be_bytes(bytes))
    }

    pub fn to_bytes(self) -> [u8; 4] {
        self.bits().to_be_bytes()
    }

    pub fn to_attributes(self) -> Map<String, Value> {
        PARTITION_FLAG_NAMES
            .iter()
            .map(|(name, flag)| (name.to_string(), Value::Bool(self.contains(*flag))))
            .collect()
    }
}

/// Arming state published as `current_state` / `target_state`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PartitionState {
    Disarmed,
    Arming,
    ArmedAway,
    ArmedHome,
    ArmedNight,
    Triggered,
}

impl PartitionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disarmed => "disarmed",
            Self::Arming => "arming",
            Self::ArmedAway => "armed_away",
            Self::ArmedHome => "armed_home",
            Self::ArmedNight => "armed_night",
            Self::Triggered => "triggered",
        }
    }
}

impl fmt::Display for PartitionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn flag(attrs: &Map<String, Value>, name: &str) -> bool {
    attrs.get(name).and_then(Value::as_bool).unwrap_or(false)
}

/// Compute `(current_state, target_state)` from a partition's status booleans.
pub fn derive_state(attrs: &Map<String, Value>) -> (PartitionState, PartitionState) {
    let armed_mode = if flag(attrs, "arm_stay") {
        PartitionState::ArmedHome
    } else if flag(attrs, "arm_sleep") || flag(attrs, "arm_no_entry") {
        PartitionState::ArmedNight
    } else {
        PartitionState::ArmedAway
    };
    let in_alarm = ["fire_alarm", "audible_alarm", "silent_alarm", "panic_alarm"]
        .iter()
        .any(|name| flag(attrs, name));
    let arm = flag(attrs, "arm");
    let exit_delay = flag(attrs, "exit_delay");

    if in_alarm {
        let target = if arm { armed_mode } else { PartitionState::Disarmed };
        (PartitionState::Triggered, target)
    } else if arm && exit_delay {
        (PartitionState::Arming, armed_mode)
    } else if arm {
        (armed_mode, armed_mode)
    } else if exit_delay {
        (PartitionState::Arming, armed_mode)
    } else {
        (PartitionState::Disarmed, PartitionState::Disarmed)
    }
}

pub fn template() -> Map<String, Value> {
    let mut attrs = PartitionStatusFlags::empty().to_attributes();
    attrs.insert("current_state".into(), Value::from(PartitionState::Disarmed.as_str()));
    attrs.insert("target_state".into(), Value::from(PartitionState::Disarmed.as_str()));
    attrs
}

/// Commands accepted by `control_partition`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionCommand {
    Arm,
    ArmStay,
    ArmSleep,
    ArmFull,
    Disarm,
    DisarmBothDisableStayd,
    Beep,
}

impl PartitionCommand {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Arm => "arm",
            Self::ArmStay => "arm_stay",
            Self::ArmSleep => "arm_sleep",
            Self::ArmFull => "arm_full",
            Self::Disarm => "disarm",
            Self::DisarmBothDisableStayd => "disarm_both_disable_stayd",
            Self::Beep => "beep",
        }
    }
}

impl FromStr for PartitionCommand {
    type Err = ParadoxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "arm" => Ok(Self::Arm),
            "arm_stay" => Ok(Self::ArmStay),
            "arm_sleep" | "arm_no_entry" => Ok(Self::ArmSleep),
            "arm_full" => Ok(Self::ArmFull),
            "disarm" => Ok(Self::Disarm),
            "disarm_both_disable_stayd" => Ok(Self::DisarmBothDisableStayd),
            "beep" => Ok(Self::Beep),
            other => Err(ParadoxError::mapping(other, "partition")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn attrs(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn test_status_bytes() {
        let flags = PartitionStatusFlags::from_bytes([0x01, 0x02, 0x00, 0x80]);
        assert!(flags.contains(PartitionStatusFlags::ARM));
        assert!(flags.contains(PartitionStatusFlags::EXIT_DELAY));
        assert!(flags.contains(PartitionStatusFlags::ARM_SLEEP));
        assert_eq!(flags.to_bytes(), [0x01, 0x02, 0x00, 0x80]);
        let a = flags.to_attributes();
        assert_eq!(a["arm"], json!(true));
        assert_eq!(a["ready"], json!(false));
        assert_eq!(a.len(), 32);
    }

    #[test]
    fn test_armed_home() {
        let (current, target) = derive_state(&attrs(json!({"arm": true, "arm_stay": true})));
        assert_eq!(current, PartitionState::ArmedHome);
        assert_eq!(target, PartitionState::ArmedHome);
    }

    #[test]
    fn test_arming_keeps_away_target() {
        let (current, target) = derive_state(&attrs(json!({"arm": true, "exit_delay": true})));
        assert_eq!(current, PartitionState::Arming);
        assert_eq!(target, PartitionState::ArmedAway);
    }

    #[test]
    fn test_triggered_wins() {
        let (current, target) = derive_state(&attrs(json!({"fire_alarm": true, "arm": true})));
        assert_eq!(current, PartitionState::Triggered);
        assert_eq!(target, PartitionState::ArmedAway);
    }

    #[test]
    fn test_night_and_disarmed() {
        let (current, _) = derive_state(&attrs(json!({"arm": true, "arm_sleep": true})));
        assert_eq!(current, PartitionState::ArmedNight);
        let (current, _) = derive_state(&attrs(json!({"arm": true, "arm_no_entry": true})));
        assert_eq!(current, PartitionState::ArmedNight);
        let (current, target) = derive_state(&attrs(json!({"exit_delay": true})));
        assert_eq!((current, target), (PartitionState::Arming, PartitionState::ArmedAway));
        let (current, target) = derive_state(&Map::new());
        assert_eq!((current, target), (PartitionState::Disarmed, PartitionState::Disarmed));
    }

    #[test]
    fn test_partition_command_parse() {
        assert_eq!("arm".parse::<PartitionCommand>().unwrap(), PartitionCommand::Arm);
        assert_eq!("arm_no_entry".parse::<PartitionCommand>().unwrap(), PartitionCommand::ArmSleep);
        assert_eq!(
            "disarm_both_disable_stayD".parse::<PartitionCommand>().unwrap(),
            PartitionCommand::DisarmBothDisableStayd
        );
        assert!("launch".parse::<PartitionCommand>().is_err());
    }

    #[test]
    fn test_template_has_states() {
        let t = template();
        assert_eq!(t["current_state"], json!("disarmed"));
        assert_eq!(t["target_state"], json!("disarmed"));
        assert_eq!(t["arm"], json!(false));
    }
}
