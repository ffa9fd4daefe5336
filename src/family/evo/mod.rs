// MIT License - Copyright (c) 2026 The paradox-bridge Authors
// Digiplex EVO: variable-length frames, RAM status via ReadEEPROM

pub mod event_map;

use serde_json::{json, Map, Value};

use crate::constants::{command, opcode, LIVE_EVENT_SOURCE};
use crate::devices::{DoorCommand, PanicType, PartitionCommand, PgmCommand, ZoneCommand};
use crate::error::{ParadoxError, Result};
use crate::protocol::with_checksum;
use crate::storage::ElementType;

use super::common::{decode_date, encode_date};
use super::layout::{parse_block, Field};
use super::messages::{
    Body, Direction, EepromData, Message, RawEvent, ReadEeprom, Request, ZoneFlag,
};
use super::LabelRegion;

/// Bytes per RAM status block.
pub const RAM_BLOCK_LENGTH: u8 = 64;
/// Bytes per label read.
pub const LABEL_LENGTH: u8 = 16;

const READ_EEPROM_LEN: u8 = 0x08;
const PERFORM_ACTION_LEN: u8 = 0x0F;
const ZONE_ACTION_LEN: u8 = 0x1F;
const SET_TIME_DATE_LEN: u8 = 0x0D;
const ZONE_BITMAP_LEN: usize = 24;

pub mod action {
    pub const PARTITION: u8 = 0x02;
    pub const PGM_ON_OVERRIDE: u8 = 0x30;
    pub const PGM_OFF_OVERRIDE: u8 = 0x31;
    pub const PGM_ON: u8 = 0x32;
    pub const PGM_OFF: u8 = 0x33;
    pub const DOOR_UNLOCK: u8 = 0x50;
    pub const DOOR_LOCK: u8 = 0x51;
    pub const PANIC: u8 = 0x60;
}

/// Which EVO board; decides zone count and which status blocks exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Model {
    Evo48,
    Evo96,
    Evo192,
    EvoHd,
}

impl Model {
    pub fn max_zones(self) -> u32 {
        match self {
            Self::Evo48 => 48,
            Self::Evo96 => 96,
            Self::Evo192 | Self::EvoHd => 192,
        }
    }

    fn max_users(self) -> u32 {
        match self {
            Self::Evo48 | Self::Evo96 => 96,
            Self::Evo192 | Self::EvoHd => 999,
        }
    }

    fn status_blocks(self) -> &'static [u32] {
        match self {
            Self::Evo48 => &[1, 3, 6],
            Self::Evo96 => &[1, 3, 4, 6],
            Self::Evo192 | Self::EvoHd => &[1, 2, 3, 4, 5, 6],
        }
    }
}

const TROUBLES: &[&str] = &[
    "system_trouble",
    "dialer_trouble",
    "module_trouble",
    "bus_com_trouble",
    "zone_tamper_trouble",
    "zone_low_battery_trouble",
    "zone_fault_trouble",
    "time_lost_trouble",
    "ac_trouble",
    "battery_failure_trouble",
    "aux_limit_trouble",
    "bell_limit_trouble",
    "bell_absent_trouble",
    "rom_error_trouble",
    "",
    "",
    "tlm_trouble",
    "fail_tel_1_trouble",
    "fail_tel_2_trouble",
    "fail_tel_3_trouble",
    "fail_tel_4_trouble",
    "com_pc_trouble",
    "",
    "",
    "module_tamper_trouble",
    "module_rom_error_trouble",
    "module_tlm_trouble",
    "module_fail_to_com_trouble",
    "module_printer_trouble",
    "module_ac_trouble",
    "module_battery_fail",
    "module_aux_trouble",
    "missing_keypad_trouble",
    "missing_module_trouble",
    "",
    "",
    "safety_mismatch_trouble",
    "bus_global_fail",
    "bus_overload_trouble",
    "mdl_com_error",
];

fn layout(block: u32) -> Option<&'static [Field]> {
    const BLOCK1: &[Field] = &[
        Field::Skip(4),
        Field::Troubles(TROUBLES),
        Field::Skip(9),
        Field::Date { seconds: true },
        Field::Power,
        Field::Bits { key: "zone_open", count: 96 },
        Field::Bits { key: "zone_tamper", count: 96 },
        Field::Bits { key: "zone_low_battery", count: 96 },
    ];
    const BLOCK2: &[Field] = &[
        Field::BitsFrom { key: "zone_open", first: 97, count: 96 },
        Field::BitsFrom { key: "zone_tamper", first: 97, count: 96 },
        Field::BitsFrom { key: "zone_low_battery", first: 97, count: 96 },
        Field::Bits { key: "door_open", count: 32 },
        Field::Bits { key: "pgm_on", count: 32 },
        Field::Bits { key: "bus-module_trouble", count: 32 },
        Field::Rf,
        Field::Skip(15),
    ];
    const BLOCK3: &[Field] = &[Field::ZoneStatus { first: 1, count: 64 }];
    const BLOCK4: &[Field] = &[Field::ZoneStatus { first: 65, count: 64 }];
    const BLOCK5: &[Field] = &[Field::ZoneStatus { first: 129, count: 64 }];
    const BLOCK6: &[Field] = &[Field::PartitionStatus { count: 8 }, Field::Skip(32)];
    match block {
        1 => Some(BLOCK1),
        2 => Some(BLOCK2),
        3 => Some(BLOCK3),
        4 => Some(BLOCK4),
        5 => Some(BLOCK5),
        6 => Some(BLOCK6),
        _ => None,
    }
}

pub fn label_regions(model: Model) -> Vec<LabelRegion> {
    vec![
        LabelRegion::new(ElementType::Zone, 0x0_0430, model.max_zones(), 0x10),
        LabelRegion::new(ElementType::Pgm, 0x0_7082, 32, 0x10),
        LabelRegion::new(ElementType::Partition, 0x0_3A6B, 8, 0x6B),
        LabelRegion::new(ElementType::User, 0x0_3E47, model.max_users(), 0x10),
        LabelRegion::new(ElementType::BusModule, 0x0_7300, 126, 0x10),
        LabelRegion::new(ElementType::Door, 0x0_345C, 32, 0x10),
    ]
}

pub fn status_requests(model: Model) -> Vec<ReadEeprom> {
    model
        .status_blocks()
        .iter()
        .map(|block| ReadEeprom::ram(*block, RAM_BLOCK_LENGTH))
        .collect()
}

pub fn parse_status(reply: &EepromData) -> Option<Map<String, Value>> {
    if !reply.ram_access {
        return None;
    }
    Some(parse_block(layout(reply.address)?, &reply.data))
}

/// Zone definitions: two bytes per zone.
pub const ZONE_DEFINITIONS: u32 = 0x0_0CD0;
/// One byte; bit n set = partition n + 1 enabled.
pub const PARTITION_ENABLED: u32 = 0x0_39D8;
const ZONES_PER_DEFINITION_READ: u32 = 32;

const ZONE_DEFINITION_NAMES: &[&str] = &[
    "disabled",
    "entry_delay1",
    "entry_delay2",
    "follow",
    "instant",
    "stay_delay1",
    "stay_delay2",
    "stay_follow",
    "stay_instant",
    "24h_buzzer",
    "24h_burglary",
    "24h_holdup",
    "24h_gas",
    "24h_heat",
    "24h_water",
    "24h_freeze",
    "24h_fire_delayed",
    "24h_fire_standard",
];

/// Reads covering zone definitions `1..=max_zones` plus the partition bitmap.
pub fn definition_requests(model: Model) -> Vec<ReadEeprom> {
    let chunks = model.max_zones().div_ceil(ZONES_PER_DEFINITION_READ);
    let mut reqs: Vec<ReadEeprom> = (0..chunks)
        .map(|i| ReadEeprom::eeprom(ZONE_DEFINITIONS + i * ZONES_PER_DEFINITION_READ * 2, RAM_BLOCK_LENGTH))
        .collect();
    reqs.push(ReadEeprom::eeprom(PARTITION_ENABLED, LABEL_LENGTH));
    reqs
}

/// Decode a definitions reply into `{zone: {id: {...}}}` / `{partition: {id: {...}}}`.
pub fn parse_definitions(reply: &EepromData) -> Option<Map<String, Value>> {
    let mut out = Map::new();
    if reply.address == PARTITION_ENABLED {
        let bitmap = *reply.data.first()?;
        let partitions: Map<String, Value> = (0..8)
            .map(|i| ((i + 1).to_string(), json!({"enabled": bitmap & (1 << i) != 0})))
            .collect();
        out.insert("partition".into(), Value::Object(partitions));
        return Some(out);
    }
    let offset = reply.address.checked_sub(ZONE_DEFINITIONS)?;
    if offset % 2 != 0 || offset >= 192 * 2 {
        return None;
    }
    let first = offset / 2 + 1;
    let zones: Map<String, Value> = reply
        .data
        .chunks_exact(2)
        .enumerate()
        .map(|(i, def)| {
            let name = ZONE_DEFINITION_NAMES
                .get(def[0] as usize)
                .copied()
                .unwrap_or("unknown");
            (
                (first + i as u32).to_string(),
                json!({
                    "definition": name,
                    "enabled": def[0] != 0,
                    "partition": (def[1] & 0x0F) + 1,
                }),
            )
        })
        .collect();
    out.insert("zone".into(), Value::Object(zones));
    Some(out)
}

pub fn build(request: &Request) -> Option<Vec<u8>> {
    let body = match request {
        Request::ReadEeprom(req) => {
            let control = (u8::from(req.ram_access) << 7) | ((req.address >> 16) as u8 & 0x03);
            let addr = (req.address as u16).to_be_bytes();
            vec![
                opcode::READ_EEPROM,
                READ_EEPROM_LEN,
                control,
                req.bus_address,
                addr[0],
                addr[1],
                req.length,
            ]
        }
        Request::PartitionAction { commands } => {
            let mut payload = [0u8; 4];
            for (i, pair) in commands.chunks_exact(2).enumerate() {
                payload[i] = ((pair[0] & 0x0F) << 4) | (pair[1] & 0x0F);
            }
            perform_action(action::PARTITION, payload)
        }
        Request::BitmapAction { action, bitmap } => perform_action(*action, bitmap.to_le_bytes()),
        Request::Panic { partitions, panic_type, user_id } => {
            let user = user_id.to_be_bytes();
            perform_action(action::PANIC, [*partitions, *panic_type, user[0], user[1]])
        }
        Request::ZoneAction { flag, set, zones } => {
            let mut body = vec![0u8; ZONE_ACTION_LEN as usize - 1];
            body[0] = opcode::ZONE_ACTION;
            body[1] = ZONE_ACTION_LEN;
            body[2] = flag.bits();
            body[3] = u8::from(*set);
            for zone in zones.iter().filter(|z| (1..=192).contains(*z)) {
                let bit = (zone - 1) as usize;
                body[6 + bit / 8] |= 1 << (bit % 8);
            }
            body
        }
        Request::SetTimeDate(dt) => {
            let mut body = vec![0u8; SET_TIME_DATE_LEN as usize - 1];
            body[0] = opcode::SET_TIME_DATE;
            body[1] = SET_TIME_DATE_LEN;
            body[6..12].copy_from_slice(&encode_date(dt));
            body
        }
        _ => return None,
    };
    Some(with_checksum(body))
}

fn perform_action(action: u8, payload: [u8; 4]) -> Vec<u8> {
    let mut body = vec![0u8; PERFORM_ACTION_LEN as usize - 1];
    body[0] = opcode::PERFORM_ACTION;
    body[1] = PERFORM_ACTION_LEN;
    body[2] = action;
    body[4..8].copy_from_slice(&payload);
    body
}

pub fn parse(b: &[u8], direction: Direction) -> Option<Message> {
    if b.len() < 3 {
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
        command::READ_EEPROM if b.len() >= 7 => {
            let control = b[2];
            let address = ((control as u32 & 0x03) << 16) | u16::from_be_bytes([b[4], b[5]]) as u32;
            Body::ReadEepromResponse(EepromData {
                address,
                ram_access: control & 0x80 != 0,
                bus_address: b[3],
                data: b[6..b.len() - 1].to_vec(),
            })
        }
        command::PERFORM_ACTION => Body::PerformActionResponse { action: b[2] },
        command::SET_TIME_DATE => Body::SetTimeDateResponse,
        command::ZONE_ACTION => Body::ZoneActionResponse,
        command::LIVE_EVENT if b.len() >= 37 && b[1] == LIVE_EVENT_SOURCE => Body::LiveEvent(RawEvent {
            event_nr: Some(u16::from_be_bytes([b[2], b[3]])),
            timestamp: decode_date(&b[4..10]),
            major: b[10],
            minor: ((b[13] as u16) << 8) | b[11] as u16,
            partition: b[12],
            module_serial: b[14..18].try_into().ok()?,
            label_type: b[18],
            label: b[19..35].try_into().ok()?,
        }),
        command::LIVE_EVENT if b.len() >= 4 => Body::RequestedEvent {
            event_nr: u16::from_be_bytes([b[2], b[3]]),
        },
        _ => return None,
    };
    Some(Message::new(nibble, body))
}

fn parse_to_panel(b: &[u8]) -> Option<Message> {
    let request = match (b[0], b[1]) {
        (opcode::READ_EEPROM, READ_EEPROM_LEN) if b.len() >= 8 => Request::ReadEeprom(ReadEeprom {
            address: ((b[2] as u32 & 0x03) << 16) | u16::from_be_bytes([b[4], b[5]]) as u32,
            length: b[6],
            ram_access: b[2] & 0x80 != 0,
            bus_address: b[3],
        }),
        (opcode::PERFORM_ACTION, PERFORM_ACTION_LEN) if b.len() >= 15 => {
            let payload = [b[4], b[5], b[6], b[7]];
            match b[2] {
                action::PARTITION => {
                    let mut commands = [0u8; 8];
                    for (i, byte) in payload.iter().enumerate() {
                        commands[2 * i] = byte >> 4;
                        commands[2 * i + 1] = byte & 0x0F;
                    }
                    Request::PartitionAction { commands }
                }
                action::PANIC => Request::Panic {
                    partitions: payload[0],
                    panic_type: payload[1],
                    user_id: u16::from_be_bytes([payload[2], payload[3]]),
                },
                other => Request::BitmapAction {
                    action: other,
                    bitmap: u32::from_le_bytes(payload),
                },
            }
        }
        (opcode::ZONE_ACTION, ZONE_ACTION_LEN) if b.len() >= 31 => {
            let bitmap = &b[6..6 + ZONE_BITMAP_LEN];
            let zones = (0..ZONE_BITMAP_LEN * 8)
                .filter(|bit| bitmap[bit / 8] & (1 << (bit % 8)) != 0)
                .map(|bit| bit as u32 + 1)
                .collect();
            Request::ZoneAction {
                flag: ZoneFlag::from_bits(b[2])?,
                set: b[3] != 0,
                zones,
            }
        }
        (opcode::SET_TIME_DATE, SET_TIME_DATE_LEN) if b.len() >= 13 => {
            Request::SetTimeDate(decode_date(&b[6..12])?)
        }
        _ => return None,
    };
    Some(Message::new(b[0] >> 4, Body::Request(request)))
}

fn bitmap(ids: &[u32]) -> u32 {
    ids.iter()
        .filter(|id| (1..=32).contains(*id))
        .fold(0u32, |acc, id| acc | 1 << (id - 1))
}

pub fn partition_command_code(command: PartitionCommand) -> u8 {
    match command {
        PartitionCommand::Arm => 0x2,
        PartitionCommand::ArmStay => 0x3,
        PartitionCommand::ArmSleep => 0x4,
        PartitionCommand::ArmFull => 0x5,
        PartitionCommand::Disarm => 0x8,
        PartitionCommand::DisarmBothDisableStayd => 0x9,
        PartitionCommand::Beep => 0xA,
    }
}

/// One frame covering every selected partition.
pub fn partition_requests(ids: &[u32], command: PartitionCommand) -> Result<Vec<Request>> {
    let code = partition_command_code(command);
    let mut commands = [0u8; 8];
    for id in ids.iter().filter(|id| (1..=8).contains(*id)) {
        commands[(*id - 1) as usize] = code;
    }
    Ok(vec![Request::PartitionAction { commands }])
}

pub fn zone_requests(ids: &[u32], command: ZoneCommand) -> Result<Vec<Request>> {
    let (flag, set) = match command {
        ZoneCommand::Bypass => (ZoneFlag::Bypassed, true),
        ZoneCommand::ClearBypass => (ZoneFlag::Bypassed, false),
        ZoneCommand::ClearAlarmMemory => (ZoneFlag::GeneratedAlarm, false),
    };
    Ok(vec![Request::ZoneAction {
        flag,
        set,
        zones: ids.to_vec(),
    }])
}

pub fn pgm_requests(ids: &[u32], command: PgmCommand) -> Result<Vec<Request>> {
    let action = match command {
        PgmCommand::On => action::PGM_ON,
        PgmCommand::Off => action::PGM_OFF,
        PgmCommand::OnOverride => action::PGM_ON_OVERRIDE,
        PgmCommand::OffOverride => action::PGM_OFF_OVERRIDE,
        PgmCommand::Pulse => return Err(ParadoxError::mapping("pulse", "pgm")),
    };
    Ok(vec![Request::BitmapAction {
        action,
        bitmap: bitmap(ids),
    }])
}

pub fn door_requests(ids: &[u32], command: DoorCommand) -> Result<Vec<Request>> {
    let action = match command {
        DoorCommand::Unlock => action::DOOR_UNLOCK,
        DoorCommand::Lock => action::DOOR_LOCK,
    };
    Ok(vec![Request::BitmapAction {
        action,
        bitmap: bitmap(ids),
    }])
}

pub fn panic_request(partitions: &[u32], panic_type: PanicType, user_id: u16) -> Request {
    Request::Panic {
        partitions: bitmap(partitions) as u8,
        panic_type: panic_type.code(),
        user_id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::family::layout::layout_width;
    use crate::protocol::verify_checksum;
    use chrono::NaiveDate;

    fn roundtrip(request: Request) {
        let bytes = build(&request).unwrap();
        assert!(verify_checksum(&bytes));
        assert_eq!(bytes.len(), bytes[1] as usize);
        assert_eq!(parse(&bytes, Direction::ToPanel).unwrap().body, Body::Request(request));
    }

    #[test]
    fn test_layouts_fill_blocks() {
        for block in 1..=6 {
            assert_eq!(layout_width(layout(block).unwrap()), RAM_BLOCK_LENGTH as usize, "block {block}");
        }
        assert!(layout(7).is_none());
    }

    #[test]
    fn test_read_eeprom_layout() {
        let bytes = build(&Request::ReadEeprom(ReadEeprom::eeprom(0x9F00, 64))).unwrap();
        assert_eq!(bytes, vec![0x50, 0x08, 0x00, 0x00, 0x9f, 0x00, 0x40, 0x37]);
        let bytes = build(&Request::ReadEeprom(ReadEeprom::ram(0x1_0002, 64))).unwrap();
        assert_eq!(&bytes[..6], &[0x50, 0x08, 0x81, 0x00, 0x00, 0x02]);
    }

    #[test]
    fn test_requests_roundtrip() {
        roundtrip(Request::ReadEeprom(ReadEeprom::ram(6, 64)));
        roundtrip(Request::PartitionAction { commands: [2, 0, 8, 0, 0, 0, 0, 0xA] });
        roundtrip(Request::BitmapAction { action: action::PGM_ON, bitmap: 0b101 });
        roundtrip(Request::BitmapAction { action: action::DOOR_LOCK, bitmap: 1 << 31 });
        roundtrip(Request::Panic { partitions: 0b11, panic_type: 2, user_id: 7 });
        roundtrip(Request::ZoneAction { flag: ZoneFlag::Bypassed, set: true, zones: vec![1, 9, 192] });
        let dt = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap().and_hms_opt(8, 30, 0).unwrap();
        roundtrip(Request::SetTimeDate(dt));
    }

    #[test]
    fn test_partition_nibbles() {
        let reqs = partition_requests(&[1, 3], PartitionCommand::ArmStay).unwrap();
        assert_eq!(reqs, vec![Request::PartitionAction { commands: [3, 0, 3, 0, 0, 0, 0, 0] }]);
        let bytes = build(&reqs[0]).unwrap();
        assert_eq!(&bytes[..8], &[0x40, 0x0F, 0x02, 0x00, 0x30, 0x30, 0x00, 0x00]);
    }

    #[test]
    fn test_parse_eeprom_response() {
        let mut body = vec![0x52, 0x47, 0x00, 0x00, 0x9f, 0x00];
        let mut data = vec![0u8; 64];
        data[0] = 0x41;
        data[63] = 0x0C;
        body.extend_from_slice(&data);
        let frame = with_checksum(body);
        assert_eq!(frame[70], 0x85);
        let Body::ReadEepromResponse(reply) = parse(&frame, Direction::FromPanel).unwrap().body else {
            panic!("expected eeprom reply");
        };
        assert_eq!(reply.address, 0x9F00);
        assert_eq!(reply.data, data);
        assert!(!reply.ram_access);
    }

    #[test]
    fn test_requested_event_is_not_live() {
        let mut body = vec![0u8; 36];
        body[0] = 0xE2;
        body[1] = 0x00;
        body[2] = 0x01;
        let frame = with_checksum(body);
        let msg = parse(&frame, Direction::FromPanel).unwrap();
        assert_eq!(msg.body, Body::RequestedEvent { event_nr: 0x0100 });
        assert!(!msg.is_live_event());
    }

    #[test]
    fn test_status_blocks_by_model() {
        let addrs: Vec<u32> = status_requests(Model::Evo48).iter().map(|r| r.address).collect();
        assert_eq!(addrs, vec![1, 3, 6]);
        assert_eq!(status_requests(Model::EvoHd).len(), 6);
        assert!(status_requests(Model::Evo96).iter().all(|r| r.ram_access));
    }

    #[test]
    fn test_parse_definitions() {
        let mut data = vec![0u8; 64];
        data[0] = 4; // zone 1 instant, partition 1
        data[2] = 0; // zone 2 disabled
        data[4] = 1;
        data[5] = 1; // zone 3 entry delay, partition 2
        let reply = EepromData { address: ZONE_DEFINITIONS, ram_access: false, bus_address: 0, data };
        let defs = parse_definitions(&reply).unwrap();
        assert_eq!(defs["zone"]["1"]["definition"], json!("instant"));
        assert_eq!(defs["zone"]["2"]["enabled"], json!(false));
        assert_eq!(defs["zone"]["3"]["partition"], json!(2));
        assert_eq!(defs["zone"].as_object().unwrap().len(), 32);

        let reply = EepromData { address: PARTITION_ENABLED, ram_access: false, bus_address: 0, data: vec![0b0000_0011] };
        let defs = parse_definitions(&reply).unwrap();
        assert_eq!(defs["partition"]["2"]["enabled"], json!(true));
        assert_eq!(defs["partition"]["3"]["enabled"], json!(false));
    }

    #[test]
    fn test_pgm_and_door_bitmaps() {
        assert_eq!(
            pgm_requests(&[1, 3], PgmCommand::On).unwrap(),
            vec![Request::BitmapAction { action: action::PGM_ON, bitmap: 0b101 }]
        );
        assert_eq!(
            door_requests(&[2], DoorCommand::Unlock).unwrap(),
            vec![Request::BitmapAction { action: action::DOOR_UNLOCK, bitmap: 0b10 }]
        );
        assert_eq!(
            panic_request(&[1], PanicType::Fire, 3),
            Request::Panic { partitions: 1, panic_type: 2, user_id: 3 }
        );
    }
}
