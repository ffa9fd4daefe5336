// MIT License - Copyright (c) 2026 The paradox-bridge Authors
// Handshake frames shared by every panel family

use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};

use crate::constants::{command, opcode, FRAME_LEN, NEW_PROTOCOL};
use crate::error::{ParadoxError, Result};
use crate::protocol::with_checksum;

use super::messages::{
    Body, Direction, InitializeCommunication, InitiateResponse, Message, Request,
    StartCommunicationResponse, Version,
};

/// Source id this crate announces itself with.
pub const SOURCE_ID: u8 = 0x02;

/// Zeroed 37-byte frame body (checksum not yet appended) starting with `first`.
pub(crate) fn blank(first: u8) -> Vec<u8> {
    let mut body = vec![0u8; FRAME_LEN - 1];
    body[0] = first;
    body
}

/// Encode the panel date layout: century, year, month, day, hour, minute.
pub fn encode_date(dt: &NaiveDateTime) -> [u8; 6] {
    let year = dt.year().clamp(0, 9999) as u32;
    [
        (year / 100) as u8,
        (year % 100) as u8,
        dt.month() as u8,
        dt.day() as u8,
        dt.hour() as u8,
        dt.minute() as u8,
    ]
}

/// Decode a panel date; a seventh byte, when present, carries seconds.
pub fn decode_date(b: &[u8]) -> Option<NaiveDateTime> {
    if b.len() < 6 {
        return None;
    }
    let year = b[0] as i32 * 100 + b[1] as i32;
    let seconds = b.get(6).copied().unwrap_or(0) as u32;
    NaiveDate::from_ymd_opt(year, b[2] as u32, b[3] as u32)?.and_hms_opt(b[4] as u32, b[5] as u32, seconds)
}

/// Encode a PC password into its two-byte wire form.
///
/// Each decimal digit becomes a nibble with `0` written as `0xA`; short
/// passwords are left-padded with zeros. No password, or all zeros, is `00 00`.
pub fn encode_password(password: Option<&str>) -> Result<[u8; 2]> {
    let Some(password) = password.map(str::trim).filter(|p| !p.is_empty()) else {
        return Ok([0, 0]);
    };
    if password.len() > 4 || !password.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ParadoxError::Config {
            reason: format!("PC password must be 1-4 digits, got {:?}", password),
        });
    }
    if password.bytes().all(|b| b == b'0') {
        return Ok([0, 0]);
    }
    let padded = format!("{:0>4}", password);
    let nibbles: Vec<u8> = padded
        .bytes()
        .map(|b| match b - b'0' {
            0 => 0x0A,
            d => d,
        })
        .collect();
    Ok([(nibbles[0] << 4) | nibbles[1], (nibbles[2] << 4) | nibbles[3]])
}

pub fn build(request: &Request) -> Option<Vec<u8>> {
    let body = match request {
        Request::InitiateCommunication => blank(opcode::INITIATE_COMMUNICATION),
        Request::StartCommunication { source_id, user_id } => {
            let mut body = blank(opcode::START_COMMUNICATION);
            body[1] = opcode::START_COMMUNICATION_VALIDATION;
            body[33] = *source_id;
            body[34..36].copy_from_slice(&user_id.to_be_bytes());
            body
        }
        Request::InitializeCommunication(init) => build_initialize(init),
        Request::CloseConnection => {
            let mut body = blank(opcode::CLOSE_CONNECTION);
            body[2] = 0x05;
            body
        }
        _ => return None,
    };
    Some(with_checksum(body))
}

fn build_initialize(init: &InitializeCommunication) -> Vec<u8> {
    let mut body = blank(opcode::INITIALIZE_COMMUNICATION);
    body[1] = init.module_address;
    body[4] = init.product_id;
    body[5..8].copy_from_slice(&init.firmware.to_bytes());
    body[8..10].copy_from_slice(&init.panel_id.to_be_bytes());
    body[10..12].copy_from_slice(&init.pc_password);
    body[12] = init.modem_speed;
    body[13] = init.source_method;
    body[14..18].copy_from_slice(&init.user_code.to_be_bytes());
    body[18..22].copy_from_slice(&init.serial_number);
    body[22..31].copy_from_slice(&init.system_options);
    body[34] = init.source_id;
    body
}

/// Parse the handshake frames every family shares.
pub fn parse(bytes: &[u8], direction: Direction) -> Option<Message> {
    if bytes.len() < FRAME_LEN {
        return None;
    }
    match direction {
        Direction::FromPanel => parse_from_panel(bytes),
        Direction::ToPanel => parse_to_panel(bytes),
    }
}

fn parse_from_panel(b: &[u8]) -> Option<Message> {
    let nibble = b[0] >> 4;
    let body = match nibble {
        command::ERROR_OR_INITIATE if b[1] == NEW_PROTOCOL => Body::InitiateResponse(InitiateResponse {
            message_center: b[0] & 0x0F,
            protocol_id: b[2],
            protocol: Version::from_bytes(&b[3..6]),
            family_id: b[6],
            product_id: b[7],
            talker: b[8],
            application: Version::from_bytes(&b[9..12]),
            serial_number: b[12..16].try_into().ok()?,
            hardware: (b[16], b[17]),
            bootloader: b[18..24].try_into().ok()?,
            processor_id: b[24],
            encryption_id: b[25],
            label: b[28..36].try_into().ok()?,
        }),
        command::ERROR_OR_INITIATE => Body::Error { code: b[2] },
        command::START_COMMUNICATION_RESPONSE => Body::StartCommunicationResponse(StartCommunicationResponse {
            product_id: b[4],
            firmware: Version::from_bytes(&b[5..8]),
            panel_id: u16::from_be_bytes([b[8], b[9]]),
            transceiver: b[15..22].try_into().ok()?,
        }),
        command::INITIALIZE_COMMUNICATION_RESPONSE => Body::InitializeCommunicationResponse,
        _ => return None,
    };
    Some(Message::new(nibble, body))
}

fn parse_to_panel(b: &[u8]) -> Option<Message> {
    let request = match b[0] {
        opcode::INITIATE_COMMUNICATION => Request::InitiateCommunication,
        opcode::START_COMMUNICATION => Request::StartCommunication {
            source_id: b[33],
            user_id: u16::from_be_bytes([b[34], b[35]]),
        },
        opcode::INITIALIZE_COMMUNICATION => Request::InitializeCommunication(InitializeCommunication {
            module_address: b[1],
            product_id: b[4],
            firmware: Version::from_bytes(&b[5..8]),
            panel_id: u16::from_be_bytes([b[8], b[9]]),
            pc_password: [b[10], b[11]],
            modem_speed: b[12],
            source_method: b[13],
            user_code: u32::from_be_bytes([b[14], b[15], b[16], b[17]]),
            serial_number: b[18..22].try_into().ok()?,
            system_options: b[22..31].try_into().ok()?,
            source_id: b[34],
        }),
        opcode::CLOSE_CONNECTION => Request::CloseConnection,
        _ => return None,
    };
    Some(Message::new(b[0] >> 4, Body::Request(request)))
}

impl InitiateResponse {
    /// Encode as the panel would send it.
    pub fn to_frame(&self) -> Vec<u8> {
        let mut body = blank(0x70 | (self.message_center & 0x0F));
        body[1] = NEW_PROTOCOL;
        body[2] = self.protocol_id;
        body[3..6].copy_from_slice(&self.protocol.to_bytes());
        body[6] = self.family_id;
        body[7] = self.product_id;
        body[8] = self.talker;
        body[9..12].copy_from_slice(&self.application.to_bytes());
        body[12..16].copy_from_slice(&self.serial_number);
        body[16] = self.hardware.0;
        body[17] = self.hardware.1;
        body[18..24].copy_from_slice(&self.bootloader);
        body[24] = self.processor_id;
        body[25] = self.encryption_id;
        body[28..36].copy_from_slice(&self.label);
        with_checksum(body)
    }
}

impl StartCommunicationResponse {
    /// Encode as the panel would send it.
    pub fn to_frame(&self) -> Vec<u8> {
        let mut body = blank(0x00);
        body[4] = self.product_id;
        body[5..8].copy_from_slice(&self.firmware.to_bytes());
        body[8..10].copy_from_slice(&self.panel_id.to_be_bytes());
        body[15..22].copy_from_slice(&self.transceiver);
        with_checksum(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::verify_checksum;

    fn roundtrip(request: Request) {
        let bytes = build(&request).unwrap();
        assert_eq!(bytes.len(), FRAME_LEN);
        assert!(verify_checksum(&bytes));
        let parsed = parse(&bytes, Direction::ToPanel).unwrap();
        assert_eq!(parsed.body, Body::Request(request));
    }

    #[test]
    fn test_encode_password() {
        assert_eq!(encode_password(Some("1234")).unwrap(), [0x12, 0x34]);
        assert_eq!(encode_password(Some("0000")).unwrap(), [0x00, 0x00]);
        assert_eq!(encode_password(Some("1")).unwrap(), [0xAA, 0xA1]);
        assert_eq!(encode_password(Some("1030")).unwrap(), [0x1A, 0x3A]);
        assert_eq!(encode_password(None).unwrap(), [0x00, 0x00]);
        assert!(encode_password(Some("12a4")).is_err());
        assert!(encode_password(Some("123456")).is_err());
    }

    #[test]
    fn test_handshake_requests_roundtrip() {
        roundtrip(Request::InitiateCommunication);
        roundtrip(Request::StartCommunication {
            source_id: SOURCE_ID,
            user_id: 0x0102,
        });
        roundtrip(Request::CloseConnection);
        roundtrip(Request::InitializeCommunication(InitializeCommunication {
            module_address: 0x00,
            product_id: 21,
            firmware: Version::from_bytes(&[4, 92, 1]),
            panel_id: 0x1234,
            pc_password: [0x12, 0x34],
            modem_speed: 0x08,
            source_method: 0x55,
            user_code: 0x0001_0203,
            serial_number: [1, 2, 3, 4],
            system_options: [9; 9],
            source_id: SOURCE_ID,
        }));
    }

    #[test]
    fn test_start_communication_layout() {
        let bytes = build(&Request::StartCommunication { source_id: 2, user_id: 0 }).unwrap();
        assert_eq!(&bytes[..2], &[0x5F, 0x20]);
        assert_eq!(bytes[33], 2);
    }

    #[test]
    fn test_parse_initiate_response() {
        let resp = InitiateResponse {
            message_center: 2,
            protocol_id: 1,
            protocol: Version::from_bytes(&[1, 2, 3]),
            family_id: 0x21,
            product_id: 5,
            talker: 1,
            application: Version::from_bytes(&[7, 50, 4]),
            serial_number: [0x05, 0x00, 0xab, 0xcd],
            hardware: (1, 0),
            bootloader: [1, 2, 3, 4, 5, 6],
            processor_id: 3,
            encryption_id: 1,
            label: *b"EVO192  ",
        };
        let frame = resp.to_frame();
        let msg = parse(&frame, Direction::FromPanel).unwrap();
        assert_eq!(msg.command, 0x7);
        assert_eq!(msg.body, Body::InitiateResponse(resp.clone()));
        assert_eq!(resp.serial_hex(), "0500abcd");
    }

    #[test]
    fn test_parse_start_response_and_error() {
        let start = StartCommunicationResponse {
            product_id: 21,
            firmware: Version::from_bytes(&[4, 92, 1]),
            panel_id: 0x0102,
            transceiver: [1, 2, 3, 4, 5, 6, 7],
        };
        let msg = parse(&start.to_frame(), Direction::FromPanel).unwrap();
        assert_eq!(msg.body, Body::StartCommunicationResponse(start));

        let mut err = blank(0x70);
        err[2] = 0x12;
        let msg = parse(&with_checksum(err), Direction::FromPanel).unwrap();
        assert_eq!(msg.body, Body::Error { code: 0x12 });
    }

    #[test]
    fn test_date_codec() {
        let dt = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap().and_hms_opt(21, 5, 0).unwrap();
        let b = encode_date(&dt);
        assert_eq!(b, [20, 26, 10, 16, 21, 5]);
        assert_eq!(decode_date(&b), Some(dt));
        assert_eq!(decode_date(&[20, 26, 13, 1, 0, 0]), None);
        assert_eq!(
            decode_date(&[20, 26, 10, 16, 21, 5, 30]).unwrap().second(),
            30
        );
    }
}
