// MIT License - Copyright (c) 2026 The paradox-bridge Authors
// Parsed panel messages and outbound requests

use std::fmt;

use chrono::NaiveDateTime;

use crate::constants::command;

/// Which side produced a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    FromPanel,
    ToPanel,
}

/// Three-part version number as the panel reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Version {
    pub version: u8,
    pub revision: u8,
    pub build: u8,
}

impl Version {
    pub fn from_bytes(b: &[u8]) -> Self {
        Self {
            version: b.first().copied().unwrap_or(0),
            revision: b.get(1).copied().unwrap_or(0),
            build: b.get(2).copied().unwrap_or(0),
        }
    }

    pub fn to_bytes(self) -> [u8; 3] {
        [self.version, self.revision, self.build]
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02} build {}", self.version, self.revision, self.build)
    }
}

/// Reply to `InitiateCommunication` (`7x FF …`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitiateResponse {
    pub message_center: u8,
    pub protocol_id: u8,
    pub protocol: Version,
    pub family_id: u8,
    pub product_id: u8,
    pub talker: u8,
    pub application: Version,
    pub serial_number: [u8; 4],
    pub hardware: (u8, u8),
    pub bootloader: [u8; 6],
    pub processor_id: u8,
    pub encryption_id: u8,
    pub label: [u8; 8],
}

impl InitiateResponse {
    /// Serial number rendered the way the panel prints it.
    pub fn serial_hex(&self) -> String {
        crate::protocol::frame::hex(&self.serial_number)
    }
}

/// Reply to `StartCommunication` (command nibble 0).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartCommunicationResponse {
    pub product_id: u8,
    pub firmware: Version,
    pub panel_id: u16,
    pub transceiver: [u8; 7],
}

/// Login frame sent after `StartCommunication`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitializeCommunication {
    pub module_address: u8,
    pub product_id: u8,
    pub firmware: Version,
    pub panel_id: u16,
    pub pc_password: [u8; 2],
    pub modem_speed: u8,
    pub source_method: u8,
    pub user_code: u32,
    pub serial_number: [u8; 4],
    pub system_options: [u8; 9],
    pub source_id: u8,
}

/// Memory read; `ram_access` selects the live status RAM instead of EEPROM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadEeprom {
    pub address: u32,
    pub length: u8,
    pub ram_access: bool,
    pub bus_address: u8,
}

impl ReadEeprom {
    pub fn eeprom(address: u32, length: u8) -> Self {
        Self {
            address,
            length,
            ram_access: false,
            bus_address: 0,
        }
    }

    pub fn ram(address: u32, length: u8) -> Self {
        Self {
            address,
            length,
            ram_access: true,
            bus_address: 0,
        }
    }
}

/// Data returned by a memory read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EepromData {
    pub address: u32,
    pub ram_access: bool,
    pub bus_address: u8,
    pub data: Vec<u8>,
}

impl EepromData {
    /// True when this is the reply to `request`.
    pub fn answers(&self, request: &ReadEeprom) -> bool {
        self.address == request.address && self.ram_access == request.ram_access
    }
}

/// Fields common to both families' live-event frames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
    pub major: u8,
    pub minor: u16,
    pub partition: u8,
    pub module_serial: [u8; 4],
    pub label_type: u8,
    pub label: [u8; 16],
    pub timestamp: Option<NaiveDateTime>,
    pub event_nr: Option<u16>,
}

/// Zone flag an EVO `PerformZoneAction` sets or clears.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoneFlag {
    Bypassed,
    GeneratedAlarm,
}

impl ZoneFlag {
    pub fn bits(self) -> u8 {
        match self {
            Self::Bypassed => 0x08,
            Self::GeneratedAlarm => 0x80,
        }
    }

    pub fn from_bits(b: u8) -> Option<Self> {
        match b {
            0x08 => Some(Self::Bypassed),
            0x80 => Some(Self::GeneratedAlarm),
            _ => None,
        }
    }
}

/// Every frame this crate sends, one variant per wire schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    InitiateCommunication,
    StartCommunication { source_id: u8, user_id: u16 },
    InitializeCommunication(InitializeCommunication),
    ReadEeprom(ReadEeprom),
    SetTimeDate(NaiveDateTime),
    /// Spectra/Magellan `PerformAction`: one action code and its target index.
    PerformAction { action: u8, argument: u8 },
    /// EVO partition action: one command nibble per partition, 0 = untouched.
    PartitionAction { commands: [u8; 8] },
    /// EVO bitmap action (PGMs `30..33`, doors `50/51`).
    BitmapAction { action: u8, bitmap: u32 },
    /// EVO panic: partition bitmap, type and user.
    Panic { partitions: u8, panic_type: u8, user_id: u16 },
    /// EVO `PerformZoneAction` over a zone bitmap (bit n = zone n + 1).
    ZoneAction { flag: ZoneFlag, set: bool, zones: Vec<u32> },
    CloseConnection,
}

impl Request {
    pub fn name(&self) -> &'static str {
        match self {
            Self::InitiateCommunication => "InitiateCommunication",
            Self::StartCommunication { .. } => "StartCommunication",
            Self::InitializeCommunication(_) => "InitializeCommunication",
            Self::ReadEeprom(_) => "ReadEEPROM",
            Self::SetTimeDate(_) => "SetTimeDate",
            Self::PerformAction { .. } => "PerformAction",
            Self::PartitionAction { .. } => "PerformPartitionAction",
            Self::BitmapAction { .. } => "PerformAction",
            Self::Panic { .. } => "SendPanicAction",
            Self::ZoneAction { .. } => "PerformZoneAction",
            Self::CloseConnection => "CloseConnection",
        }
    }

    /// Command nibbles that count as the reply, or `None` for fire-and-forget frames.
    pub fn reply_commands(&self) -> Option<&'static [u8]> {
        match self {
            Self::InitiateCommunication => Some(&[command::ERROR_OR_INITIATE]),
            Self::StartCommunication { .. } => Some(&[command::START_COMMUNICATION_RESPONSE]),
            Self::InitializeCommunication(_) => Some(&[
                command::INITIALIZE_COMMUNICATION_RESPONSE,
                command::START_COMMUNICATION_RESPONSE,
            ]),
            Self::ReadEeprom(_) => Some(&[command::READ_EEPROM]),
            Self::SetTimeDate(_) => Some(&[command::SET_TIME_DATE]),
            Self::PerformAction { .. }
            | Self::PartitionAction { .. }
            | Self::BitmapAction { .. }
            | Self::Panic { .. } => Some(&[command::PERFORM_ACTION]),
            Self::ZoneAction { .. } => Some(&[command::ZONE_ACTION]),
            Self::CloseConnection => None,
        }
    }
}

/// Decoded frame contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    InitiateResponse(InitiateResponse),
    StartCommunicationResponse(StartCommunicationResponse),
    InitializeCommunicationResponse,
    ReadEepromResponse(EepromData),
    PerformActionResponse { action: u8 },
    SetTimeDateResponse,
    ZoneActionResponse,
    LiveEvent(RawEvent),
    RequestedEvent { event_nr: u16 },
    Error { code: u8 },
    /// An outbound frame decoded back into its request.
    Request(Request),
}

/// One parsed frame: the command nibble plus its decoded body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub command: u8,
    pub body: Body,
}

impl Message {
    pub fn new(command: u8, body: Body) -> Self {
        Self { command, body }
    }

    pub fn is_live_event(&self) -> bool {
        matches!(self.body, Body::LiveEvent(_))
    }

    pub fn is_error(&self) -> bool {
        matches!(self.body, Body::Error { .. })
    }

    pub fn name(&self) -> &'static str {
        match &self.body {
            Body::InitiateResponse(_) => "InitiateCommunicationResponse",
            Body::StartCommunicationResponse(_) => "StartCommunicationResponse",
            Body::InitializeCommunicationResponse => "InitializeCommunicationResponse",
            Body::ReadEepromResponse(_) => "ReadEEPROMResponse",
            Body::PerformActionResponse { .. } => "PerformActionResponse",
            Body::SetTimeDateResponse => "SetTimeDateResponse",
            Body::ZoneActionResponse => "PerformZoneActionResponse",
            Body::LiveEvent(_) => "LiveEvent",
            Body::RequestedEvent { .. } => "RequestedEvent",
            Body::Error { .. } => "ErrorMessage",
            Body::Request(r) => r.name(),
        }
    }
}
