// MIT License - Copyright (c) 2026 The paradox-bridge Authors
// Spectra SP / Magellan MG: fixed 37-byte frames

pub mod event_map;

use serde_json::{Map, Value};

use crate::constants::{command, opcode, MEM_STATUS_BASE1, MEM_STATUS_BASE2};
use crate::devices::{PartitionCommand, PgmCommand, ZoneCommand};
use crate::error::{ParadoxError, Result};
use crate::protocol::with_checksum;
use crate::storage::ElementType;

use super::common::{blank, decode_date, encode_date, SOURCE_ID};
use super::layout::{parse_block, Field};
use super::messages::{Body, Direction, EepromData, Message, RawEvent, ReadEeprom, Request};
use super::LabelRegion;

/// Bytes of data carried by a `ReadEEPROM` reply.
pub const READ_LENGTH: u8 = 32;

pub mod action {
    pub const STAY_ARM: u8 = 0x01;
    pub const STAY_ARM1: u8 = 0x02;
    pub const SLEEP_ARM: u8 = 0x03;
    pub const FULL_ARM: u8 = 0x04;
    pub const DISARM: u8 = 0x05;
    pub const BYPASS: u8 = 0x10;
    pub const PGM_ON_OVERRIDE: u8 = 0x30;
    pub const PGM_OFF_OVERRIDE: u8 = 0x31;
    pub const PGM_ON: u8 = 0x32;
    pub const PGM_OFF: u8 = 0x33;
}

const TROUBLES: &[&str] = &[
    "timer_loss_trouble",
    "fire_loop_trouble",
    "module_tamper_trouble",
    "zone_tamper_trouble",
    "communication_trouble",
    "bell_trouble",
    "power_trouble",
    "rf_low_battery_trouble",
    "rf_interference_trouble",
    "",
    "",
    "",
    "module_supervision_trouble",
    "zone_supervision_trouble",
    "",
    "",
    "wireless_repeater_battery_trouble",
    "wireless_repeater_ac_loss_trouble",
    "wireless_keypad_battery_trouble",
    "wireless_keypad_ac_trouble",
    "auxiliary_output_overload_trouble",
    "ac_failure_trouble",
    "low_battery_trouble",
    "no_battery_trouble",
    "bell_output_overload_trouble",
    "bell_output_disconnected_trouble",
    "",
    "",
    "computer_fail_to_communicate_trouble",
    "voice_fail_to_communicate_trouble",
    "pager_fail_to_communicate_trouble",
    "central_2_reporting_ftc_trouble",
];

/// RAM status blocks `0x8000 + i`, i = 0..5.
const STATUS_BLOCKS: [&[Field]; 6] = [
    &[
        Field::Troubles(TROUBLES),
        Field::Date { seconds: false },
        Field::Power,
        Field::Rf,
        Field::Bits { key: "zone_open", count: 32 },
        Field::Bits { key: "zone_tamper", count: 32 },
        Field::Bits { key: "pgm_tamper", count: 16 },
        Field::Bits { key: "bus-module_tamper", count: 16 },
        Field::Bits { key: "pgm_supervision_trouble", count: 16 },
        Field::Skip(4),
    ],
    &[
        Field::Bits { key: "zone_low_battery", count: 32 },
        Field::Bits { key: "repeater_supervision_trouble", count: 2 },
        Field::Bits { key: "repeater_ac_loss", count: 2 },
        Field::Bits { key: "repeater_battery_failure", count: 2 },
        Field::Bits { key: "keypad_supervision_trouble", count: 8 },
        Field::Bits { key: "keypad_ac_loss", count: 8 },
        Field::Bits { key: "keypad_battery_failure", count: 8 },
        Field::Skip(22),
    ],
    &[Field::ZoneStatus { first: 1, count: 32 }],
    &[Field::PartitionStatus { count: 2 }, Field::Skip(24)],
    &[
        Field::Bits { key: "pgm_on", count: 16 },
        Field::Bytes { key: "pgm_signal_strength", count: 16 },
        Field::Skip(14),
    ],
    &[Field::Bytes { key: "zone_signal_strength", count: 32 }],
];

const LABELS: &[LabelRegion] = &[
    LabelRegion::new(ElementType::Zone, 0x0010, 32, 0x10),
    LabelRegion::new(ElementType::Pgm, 0x0210, 16, 0x10),
    LabelRegion::new(ElementType::Partition, 0x0310, 2, 0x10),
    LabelRegion::new(ElementType::User, 0x0330, 32, 0x10),
    LabelRegion::new(ElementType::BusModule, 0x0530, 15, 0x10),
];

const MAGELLAN_LABELS: &[LabelRegion] = &[
    LabelRegion::new(ElementType::Repeater, 0x0620, 2, 0x10),
    LabelRegion::new(ElementType::Keypad, 0x0640, 8, 0x10),
];

pub fn label_regions(magellan: bool) -> Vec<LabelRegion> {
    let mut regions = LABELS.to_vec();
    if magellan {
        regions.extend_from_slice(MAGELLAN_LABELS);
    }
    regions
}

/// Status reads issued on every poll.
pub fn status_requests() -> Vec<ReadEeprom> {
    (0..STATUS_BLOCKS.len() as u32)
        .map(|i| ReadEeprom::ram(i, READ_LENGTH))
        .collect()
}

/// One-off EEPROM read carrying the installer-lock byte.
pub fn installer_lock_request() -> ReadEeprom {
    ReadEeprom::eeprom(MEM_STATUS_BASE2 as u32, READ_LENGTH)
}

/// Decode a status block reply; `None` when the reply is not a status block.
pub fn parse_status(reply: &EepromData) -> Option<Map<String, Value>> {
    if reply.ram_access {
        let layout = STATUS_BLOCKS.get(reply.address as usize)?;
        return Some(parse_block(layout, &reply.data));
    }
    if reply.address == MEM_STATUS_BASE2 as u32 {
        let locked = reply.data.first().is_some_and(|b| *b != 0);
        let mut out = Map::new();
        out.insert(
            "panel_status".into(),
            serde_json::json!({"installer_lock_active": locked}),
        );
        return Some(out);
    }
    None
}

fn wire_address(req: &ReadEeprom) -> u16 {
    let base = if req.ram_access { MEM_STATUS_BASE1 } else { 0 };
    base | (req.address as u16 & 0x7FFF)
}

fn with_source(mut body: Vec<u8>) -> Vec<u8> {
    body[33] = SOURCE_ID;
    with_checksum(body)
}

pub fn build(request: &Request) -> Option<Vec<u8>> {
    let frame = match request {
        Request::ReadEeprom(req) => {
            let mut body = blank(opcode::READ_EEPROM);
            body[2..4].copy_from_slice(&wire_address(req).to_be_bytes());
            with_source(body)
        }
        Request::PerformAction { action, argument } => {
            let mut body = blank(opcode::PERFORM_ACTION);
            body[2] = *action;
            body[3] = *argument;
            with_source(body)
        }
        Request::SetTimeDate(dt) => {
            let mut body = blank(opcode::SET_TIME_DATE);
            body[4..10].copy_from_slice(&encode_date(dt));
            with_source(body)
        }
        _ => return None,
    };
    Some(frame)
}

pub fn parse(b: &[u8], direction: Direction) -> Option<Message> {
    if b.len() < crate::constants::FRAME_LEN {
        return None;
    }
    match direction {
        Direction::FromPanel => parse_from_panel(b),
        Direction::ToPanel => parse_to_panel(b),
    }
}

fn parse_from_panel(b: &[u8]) -> Option<Message> {
    let nibble = b[0] >> 4;
    let body = match nibble {
        command::READ_EEPROM => {
            let addr = u16::from_be_bytes([b[2], b[3]]);
            Body::ReadEepromResponse(EepromData {
                address: (addr & 0x7FFF) as u32,
                ram_access: addr & MEM_STATUS_BASE1 != 0,
                bus_address: 0,
                data: b[4..36].to_vec(),
            })
        }
        command::PERFORM_ACTION => Body::PerformActionResponse { action: b[2] },
        command::SET_TIME_DATE => Body::SetTimeDateResponse,
        command::LIVE_EVENT => Body::LiveEvent(RawEvent {
            timestamp: decode_date(&b[1..7]),
            major: b[7],
            minor: b[8] as u16,
            label_type: b[9],
            module_serial: b[10..14].try_into().ok()?,
            partition: b[14],
            label: b[15..31].try_into().ok()?,
            event_nr: None,
        }),
        _ => return None,
    };
    Some(Message::new(nibble, body))
}

fn parse_to_panel(b: &[u8]) -> Option<Message> {
    let request = match b[0] {
        opcode::READ_EEPROM => {
            let addr = u16::from_be_bytes([b[2], b[3]]);
            Request::ReadEeprom(ReadEeprom {
                address: (addr & 0x7FFF) as u32,
                length: READ_LENGTH,
                ram_access: addr & MEM_STATUS_BASE1 != 0,
                bus_address: 0,
            })
        }
        opcode::PERFORM_ACTION => Request::PerformAction {
            action: b[2],
            argument: b[3],
        },
        opcode::SET_TIME_DATE => Request::SetTimeDate(decode_date(&b[4..10])?),
        _ => return None,
    };
    Some(Message::new(b[0] >> 4, Body::Request(request)))
}

fn per_element(ids: &[u32], action: u8) -> Vec<Request> {
    ids.iter()
        .filter(|id| **id > 0)
        .map(|id| Request::PerformAction {
            action,
            argument: (*id - 1) as u8,
        })
        .collect()
}

pub fn partition_requests(ids: &[u32], command: PartitionCommand) -> Result<Vec<Request>> {
    let action = match command {
        PartitionCommand::Arm | PartitionCommand::ArmFull => action::FULL_ARM,
        PartitionCommand::ArmStay => action::STAY_ARM,
        PartitionCommand::ArmSleep => action::SLEEP_ARM,
        PartitionCommand::Disarm => action::DISARM,
        other => return Err(ParadoxError::mapping(other.as_str(), "partition")),
    };
    Ok(per_element(ids, action))
}

/// Bypass on this family is a toggle; callers pass only zones whose state must flip.
pub fn zone_requests(ids: &[u32], command: ZoneCommand) -> Result<Vec<Request>> {
    match command {
        ZoneCommand::Bypass | ZoneCommand::ClearBypass => Ok(per_element(ids, action::BYPASS)),
        other => Err(ParadoxError::mapping(other.as_str(), "zone")),
    }
}

pub fn pgm_requests(ids: &[u32], command: PgmCommand) -> Result<Vec<Request>> {
    let action = match command {
        PgmCommand::On => action::PGM_ON,
        PgmCommand::Off => action::PGM_OFF,
        PgmCommand::OnOverride => action::PGM_ON_OVERRIDE,
        PgmCommand::OffOverride => action::PGM_OFF_OVERRIDE,
        PgmCommand::Pulse => return Err(ParadoxError::mapping("pulse", "pgm")),
    };
    Ok(per_element(ids, action))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::family::layout::layout_width;
    use crate::protocol::verify_checksum;
    use chrono::NaiveDate;

    fn roundtrip(request: Request) {
        let bytes = build(&request).unwrap();
        assert_eq!(bytes.len(), 37);
        assert!(verify_checksum(&bytes));
        assert_eq!(parse(&bytes, Direction::ToPanel).unwrap().body, Body::Request(request));
    }

    #[test]
    fn test_layouts_fill_blocks() {
        for (i, layout) in STATUS_BLOCKS.iter().enumerate() {
            assert_eq!(layout_width(layout), READ_LENGTH as usize, "block {i}");
        }
        assert_eq!(TROUBLES.len(), 32);
    }

    #[test]
    fn test_requests_roundtrip() {
        roundtrip(Request::ReadEeprom(ReadEeprom::ram(3, READ_LENGTH)));
        roundtrip(Request::ReadEeprom(ReadEeprom::eeprom(0x0310, READ_LENGTH)));
        roundtrip(Request::PerformAction { action: action::FULL_ARM, argument: 1 });
        let dt = NaiveDate::from_ymd_opt(2026, 2, 3).unwrap().and_hms_opt(4, 5, 0).unwrap();
        roundtrip(Request::SetTimeDate(dt));
    }

    #[test]
    fn test_ram_address_bit() {
        let bytes = build(&Request::ReadEeprom(ReadEeprom::ram(2, 32))).unwrap();
        assert_eq!(&bytes[..4], &[0x50, 0x00, 0x80, 0x02]);
        let bytes = build(&Request::ReadEeprom(ReadEeprom::eeprom(0x0310, 32))).unwrap();
        assert_eq!(&bytes[..4], &[0x50, 0x00, 0x03, 0x10]);
    }

    #[test]
    fn test_parse_action_reply() {
        let mut body = blank(0x42);
        body[2] = action::FULL_ARM;
        let frame = with_checksum(body);
        assert_eq!(frame[36], 0x46);
        let msg = parse(&frame, Direction::FromPanel).unwrap();
        assert_eq!(msg.command, 0x4);
        assert_eq!(msg.body, Body::PerformActionResponse { action: 4 });
    }

    #[test]
    fn test_parse_status_blocks() {
        let mut data = vec![0u8; 32];
        data[0] = 0x01; // partition 1 armed
        let reply = EepromData { address: 3, ram_access: true, bus_address: 0, data };
        let status = parse_status(&reply).unwrap();
        assert_eq!(status["partition_status"]["1"]["arm"], Value::Bool(true));
        assert_eq!(status["partition_status"]["2"]["arm"], Value::Bool(false));

        let lock = EepromData { address: 0x1FE0, ram_access: false, bus_address: 0, data: vec![1; 32] };
        assert_eq!(
            parse_status(&lock).unwrap()["panel_status"]["installer_lock_active"],
            Value::Bool(true)
        );
        let label = EepromData { address: 0x0010, ram_access: false, bus_address: 0, data: vec![0; 32] };
        assert!(parse_status(&label).is_none());
    }

    #[test]
    fn test_command_mapping() {
        let reqs = partition_requests(&[1, 2], PartitionCommand::ArmStay).unwrap();
        assert_eq!(
            reqs,
            vec![
                Request::PerformAction { action: action::STAY_ARM, argument: 0 },
                Request::PerformAction { action: action::STAY_ARM, argument: 1 },
            ]
        );
        assert!(partition_requests(&[1], PartitionCommand::Beep).is_err());
        assert_eq!(
            pgm_requests(&[3], PgmCommand::Off).unwrap(),
            vec![Request::PerformAction { action: action::PGM_OFF, argument: 2 }]
        );
        assert!(zone_requests(&[1], ZoneCommand::ClearAlarmMemory).is_err());
    }

    #[test]
    fn test_label_regions() {
        assert_eq!(label_regions(false).len(), 5);
        let mg = label_regions(true);
        assert!(mg.iter().any(|r| r.ty == ElementType::Keypad));
        let zone = mg[0];
        assert_eq!(zone.address(1), 0x0010);
        assert_eq!(zone.address(2), 0x0020);
    }
}
