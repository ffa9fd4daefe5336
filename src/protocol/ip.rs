// MIT License - Copyright (c) 2026 The paradox-bridge Authors
// IP-module envelope: 16-byte header, 0xEE padding, optional payload encryption

use std::sync::{Arc, RwLock};

use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::{debug, trace};

use crate::constants::ip::*;
use crate::crypto::{pad_to_block, ParadoxCipher, BLOCK_LEN};
use crate::error::{ParadoxError, Result};
use crate::protocol::frame::hex;

/// Envelope message type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    IpResponse,
    SerialPassthroughResponse,
    IpRequest,
    SerialPassthroughRequest,
    Other(u8),
}

impl MessageType {
    pub fn from_u8(v: u8) -> Self {
        match v {
            MESSAGE_IP_RESPONSE => Self::IpResponse,
            MESSAGE_SERIAL_PASSTHROUGH_RESPONSE => Self::SerialPassthroughResponse,
            MESSAGE_IP_REQUEST => Self::IpRequest,
            MESSAGE_SERIAL_PASSTHROUGH_REQUEST => Self::SerialPassthroughRequest,
            other => Self::Other(other),
        }
    }

    pub fn to_u8(self) -> u8 {
        match self {
            Self::IpResponse => MESSAGE_IP_RESPONSE,
            Self::SerialPassthroughResponse => MESSAGE_SERIAL_PASSTHROUGH_RESPONSE,
            Self::IpRequest => MESSAGE_IP_REQUEST,
            Self::SerialPassthroughRequest => MESSAGE_SERIAL_PASSTHROUGH_REQUEST,
            Self::Other(v) => v,
        }
    }
}

/// The 16-byte envelope header (without the 0xEE padding).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IpHeader {
    /// Unpadded payload length.
    pub length: u16,
    pub message_type: MessageType,
    pub flags: u8,
    pub command: u8,
    pub sub_command: u8,
    pub sb: u8,
    pub wt: u8,
}

impl IpHeader {
    pub fn encrypted(&self) -> bool {
        self.flags & FLAG_ENCRYPT != 0
    }

    fn to_bytes(self) -> [u8; HEADER_LEN] {
        let mut out = [PAD; HEADER_LEN];
        out[0] = SOF;
        out[1..3].copy_from_slice(&self.length.to_le_bytes());
        out[3] = self.message_type.to_u8();
        out[4] = self.flags;
        out[5] = self.command;
        out[6] = self.sub_command;
        out[7] = self.sb;
        out[8] = self.wt;
        out
    }

    fn from_bytes(buf: &[u8]) -> Result<Self> {
        if buf.len() < HEADER_LEN {
            return Err(ParadoxError::parse("IP header shorter than 16 bytes"));
        }
        if buf[0] != SOF {
            return Err(ParadoxError::parse(format!("bad IP start byte 0x{:02x}", buf[0])));
        }
        Ok(Self {
            length: u16::from_le_bytes([buf[1], buf[2]]),
            message_type: MessageType::from_u8(buf[3]),
            flags: buf[4],
            command: buf[5],
            sub_command: buf[6],
            sb: buf[7],
            wt: buf[8],
        })
    }
}

/// One envelope with its cleartext payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IpMessage {
    pub message_type: MessageType,
    pub flags: u8,
    pub command: u8,
    pub sub_command: u8,
    pub sb: u8,
    pub wt: u8,
    pub payload: Vec<u8>,
}

impl IpMessage {
    /// An encrypted IP-module request (`connect`, `keep_alive`, ...).
    pub fn request(command: u8, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            message_type: MessageType::IpRequest,
            flags: FLAG_ENCRYPT,
            command,
            sub_command: 0,
            sb: 0,
            wt: 0,
            payload: payload.into(),
        }
    }

    /// An encrypted serial pass-through request carrying one panel frame.
    pub fn passthrough(frame: impl Into<Vec<u8>>) -> Self {
        Self {
            message_type: MessageType::SerialPassthroughRequest,
            ..Self::request(COMMAND_PASSTHROUGH, frame)
        }
    }

    pub fn with_message_type(mut self, message_type: MessageType) -> Self {
        self.message_type = message_type;
        self
    }

    pub fn encrypted(&self) -> bool {
        self.flags & FLAG_ENCRYPT != 0
    }

    pub fn header(&self) -> IpHeader {
        IpHeader {
            length: self.payload.len() as u16,
            message_type: self.message_type,
            flags: self.flags,
            command: self.command,
            sub_command: self.sub_command,
            sb: self.sb,
            wt: self.wt,
        }
    }

    /// Serialize; the output length is always a multiple of 16.
    pub fn encode(&self, key: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_LEN + self.payload.len() + BLOCK_LEN);
        out.extend_from_slice(&self.header().to_bytes());
        if self.encrypted() {
            out.extend_from_slice(&ParadoxCipher::new(key).encrypt(&self.payload));
        } else {
            out.extend_from_slice(&pad_to_block(&self.payload));
        }
        out
    }

    /// Bytes on the wire for an envelope whose header announces `length`.
    pub fn wire_len(length: u16) -> usize {
        HEADER_LEN + (length as usize).div_ceil(BLOCK_LEN) * BLOCK_LEN
    }

    /// Parse one complete envelope (header plus padded payload).
    pub fn decode(buf: &[u8], key: &[u8]) -> Result<Self> {
        let header = IpHeader::from_bytes(buf)?;
        let total = Self::wire_len(header.length);
        if buf.len() < total {
            return Err(ParadoxError::parse(format!(
                "IP envelope truncated: {} of {} bytes",
                buf.len(),
                total
            )));
        }
        let body = &buf[HEADER_LEN..total];
        let mut payload = if header.encrypted() {
            ParadoxCipher::new(key).decrypt(body)
        } else {
            body.to_vec()
        };
        payload.truncate(header.length as usize);
        Ok(Self {
            message_type: header.message_type,
            flags: header.flags,
            command: header.command,
            sub_command: header.sub_command,
            sb: header.sb,
            wt: header.wt,
            payload,
        })
    }
}

/// Current envelope key, shared between the reader and the writer halves.
///
/// Starts as the IP-module password and is replaced by the session key
/// handed out in the `connect` response.
#[derive(Debug, Clone)]
pub struct SessionKey(Arc<RwLock<Vec<u8>>>);

impl SessionKey {
    pub fn new(key: impl Into<Vec<u8>>) -> Self {
        Self(Arc::new(RwLock::new(key.into())))
    }

    pub fn get(&self) -> Vec<u8> {
        match self.0.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn set(&self, key: impl Into<Vec<u8>>) {
        let key = key.into();
        match self.0.write() {
            Ok(mut guard) => *guard = key,
            Err(poisoned) => *poisoned.into_inner() = key,
        }
    }
}

/// tokio codec for the IP-module stream.
#[derive(Debug, Clone)]
pub struct IpCodec {
    key: SessionKey,
    dump_packets: bool,
}

impl IpCodec {
    pub fn new(key: SessionKey) -> Self {
        Self {
            key,
            dump_packets: false,
        }
    }

    pub fn with_packet_dump(mut self, enabled: bool) -> Self {
        self.dump_packets = enabled;
        self
    }

    pub fn key(&self) -> &SessionKey {
        &self.key
    }
}

impl Decoder for IpCodec {
    type Item = IpMessage;
    type Error = ParadoxError;

    fn decode(&mut self, src: &mut BytesMut) -> std::result::Result<Option<Self::Item>, Self::Error> {
        loop {
            if src.is_empty() {
                return Ok(None);
            }
            if src[0] != SOF {
                trace!("Skipping non-SOF byte 0x{:02x}", src[0]);
                src.advance(1);
                continue;
            }
            if src.len() < HEADER_LEN {
                return Ok(None);
            }
            let length = u16::from_le_bytes([src[1], src[2]]);
            let total = IpMessage::wire_len(length);
            if src.len() < total {
                return Ok(None);
            }
            let raw = src.split_to(total);
            if self.dump_packets {
                debug!("IP <- {}", hex(&raw));
            }
            return IpMessage::decode(&raw, &self.key.get()).map(Some);
        }
    }
}

impl Encoder<IpMessage> for IpCodec {
    type Error = ParadoxError;

    fn encode(&mut self, item: IpMessage, dst: &mut BytesMut) -> std::result::Result<(), Self::Error> {
        let bytes = item.encode(&self.key.get());
        if self.dump_packets {
            debug!("IP -> {}", hex(&bytes));
        }
        dst.extend_from_slice(&bytes);
        Ok(())
    }
}

/// `login_status` of the IP-module `connect` response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginStatus {
    Success,
    InvalidPassword,
    UserAlreadyConnected,
    UserAlreadyConnected1,
    Unknown(u8),
}

impl LoginStatus {
    pub fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Success,
            1 => Self::InvalidPassword,
            2 => Self::UserAlreadyConnected,
            4 => Self::UserAlreadyConnected1,
            other => Self::Unknown(other),
        }
    }

    pub fn to_u8(self) -> u8 {
        match self {
            Self::Success => 0,
            Self::InvalidPassword => 1,
            Self::UserAlreadyConnected => 2,
            Self::UserAlreadyConnected1 => 4,
            Self::Unknown(v) => v,
        }
    }
}

/// Payload of the IP-module `connect` response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectResponse {
    pub login_status: LoginStatus,
    pub key: [u8; 16],
    pub hardware_version: u16,
    pub ip_firmware_major: u8,
    pub ip_firmware_minor: u8,
    pub ip_module_serial: [u8; 4],
}

impl ConnectResponse {
    pub const LEN: usize = 25;

    pub fn parse(payload: &[u8]) -> Result<Self> {
        if payload.len() < Self::LEN {
            return Err(ParadoxError::parse(format!(
                "connect response too short: {} bytes",
                payload.len()
            )));
        }
        let mut key = [0u8; 16];
        key.copy_from_slice(&payload[1..17]);
        let mut serial = [0u8; 4];
        serial.copy_from_slice(&payload[21..25]);
        Ok(Self {
            login_status: LoginStatus::from_u8(payload[0]),
            key,
            hardware_version: u16::from_be_bytes([payload[17], payload[18]]),
            ip_firmware_major: payload[19],
            ip_firmware_minor: payload[20],
            ip_module_serial: serial,
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(Self::LEN);
        out.push(self.login_status.to_u8());
        out.extend_from_slice(&self.key);
        out.extend_from_slice(&self.hardware_version.to_be_bytes());
        out.push(self.ip_firmware_major);
        out.push(self.ip_firmware_minor);
        out.extend_from_slice(&self.ip_module_serial);
        out
    }

    /// Map a non-success login status onto the error taxonomy.
    pub fn check(&self) -> Result<()> {
        match self.login_status {
            LoginStatus::Success => Ok(()),
            LoginStatus::InvalidPassword => Err(ParadoxError::InvalidIpPassword),
            other => Err(ParadoxError::ConnectToIpModuleFailed {
                reason: format!("login status {:?}", other),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_layout() {
        let msg = IpMessage::request(COMMAND_KEEP_ALIVE, vec![0, 0, 0, 0]);
        let bytes = msg.encode(b"paradox");
        assert_eq!(bytes.len(), 32);
        assert_eq!(&bytes[..9], &[0xAA, 0x04, 0x00, 0x03, 0x01, 0xF2, 0x00, 0x00, 0x00]);
        assert!(bytes[9..16].iter().all(|b| *b == 0xEE));
    }

    #[test]
    fn test_plain_payload_is_padded() {
        let mut msg = IpMessage::passthrough(vec![0x72, 0x00]);
        msg.flags = 0;
        let bytes = msg.encode(b"unused");
        assert_eq!(bytes.len(), 32);
        assert_eq!(&bytes[16..18], &[0x72, 0x00]);
        assert!(bytes[18..].iter().all(|b| *b == 0xEE));
        assert_eq!(IpMessage::decode(&bytes, b"unused").unwrap(), msg);
    }

    #[test]
    fn test_roundtrip_various_keys_and_lengths() {
        let keys: [&[u8]; 4] = [b"paradox", b"", &[0x11; 16], &[0x42; 40]];
        for key in keys {
            for len in [0usize, 1, 16, 17, 38, 64] {
                let payload: Vec<u8> = (0..len).map(|i| (i * 7) as u8).collect();
                let msg = IpMessage::passthrough(payload);
                let bytes = msg.encode(key);
                assert_eq!(bytes.len() % 16, 0);
                assert_eq!(IpMessage::decode(&bytes, key).unwrap(), msg);
            }
        }
    }

    #[test]
    fn test_codec_stream() {
        let key = SessionKey::new(b"paradox".to_vec());
        let mut codec = IpCodec::new(key.clone());
        let a = IpMessage::request(COMMAND_CONNECT, b"paradox".to_vec());
        let b = IpMessage::passthrough(vec![0x72; 37]);

        let mut buf = BytesMut::new();
        buf.extend_from_slice(&[0x00, 0x13]);
        codec.encode(a.clone(), &mut buf).unwrap();
        codec.encode(b.clone(), &mut buf).unwrap();

        assert_eq!(codec.decode(&mut buf).unwrap(), Some(a));
        assert_eq!(codec.decode(&mut buf).unwrap(), Some(b));
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
    }

    #[test]
    fn test_session_key_rotation() {
        let key = SessionKey::new(b"paradox".to_vec());
        let msg = IpMessage::request(COMMAND_KEEP_ALIVE, vec![0; 4]);
        let old = msg.encode(&key.get());
        key.set(vec![0x10; 16]);
        let new = msg.encode(&key.get());
        assert_ne!(old, new);
        assert_eq!(IpMessage::decode(&new, &key.get()).unwrap(), msg);
    }

    #[test]
    fn test_connect_response() {
        let resp = ConnectResponse {
            login_status: LoginStatus::Success,
            key: [0x31; 16],
            hardware_version: 0x0102,
            ip_firmware_major: 4,
            ip_firmware_minor: 48,
            ip_module_serial: [0x71, 0x00, 0x12, 0x34],
        };
        let parsed = ConnectResponse::parse(&resp.to_bytes()).unwrap();
        assert_eq!(parsed, resp);
        assert!(parsed.check().is_ok());

        let rejected = ConnectResponse {
            login_status: LoginStatus::InvalidPassword,
            ..resp.clone()
        };
        assert!(matches!(rejected.check(), Err(ParadoxError::InvalidIpPassword)));
        let busy = ConnectResponse {
            login_status: LoginStatus::UserAlreadyConnected,
            ..resp
        };
        assert!(matches!(busy.check(), Err(ParadoxError::ConnectToIpModuleFailed { .. })));
    }
}
