// MIT License - Copyright (c) 2026 The paradox-bridge Authors
// Protocol constants

use std::time::Duration;

/// Fixed frame length used by Spectra/Magellan and by the generic handshake frames.
pub const FRAME_LEN: usize = 37;
/// Largest length an EVO variable frame may announce in byte 1.
pub const MAX_VARIABLE_LEN: usize = 71;

/// Command nibbles (high nibble of byte 0).
pub mod command {
    pub const START_COMMUNICATION_RESPONSE: u8 = 0x0;
    pub const INITIALIZE_COMMUNICATION_RESPONSE: u8 = 0x1;
    pub const SET_TIME_DATE: u8 = 0x3;
    pub const PERFORM_ACTION: u8 = 0x4;
    pub const READ_EEPROM: u8 = 0x5;
    pub const ERROR_OR_INITIATE: u8 = 0x7;
    pub const ZONE_ACTION: u8 = 0xD;
    pub const LIVE_EVENT: u8 = 0xE;
}

/// First bytes of outbound request frames.
pub mod opcode {
    pub const INITIATE_COMMUNICATION: u8 = 0x72;
    pub const START_COMMUNICATION: u8 = 0x5F;
    pub const START_COMMUNICATION_VALIDATION: u8 = 0x20;
    pub const INITIALIZE_COMMUNICATION: u8 = 0x00;
    pub const READ_EEPROM: u8 = 0x50;
    pub const PERFORM_ACTION: u8 = 0x40;
    pub const SET_TIME_DATE: u8 = 0x30;
    pub const CLOSE_CONNECTION: u8 = 0x70;
    pub const ZONE_ACTION: u8 = 0xD0;
}

/// Marker in byte 1 of an `InitiateCommunicationResponse`.
pub const NEW_PROTOCOL: u8 = 0xFF;
/// Marker in byte 1 of an EVO live event (anything else is a requested event).
pub const LIVE_EVENT_SOURCE: u8 = 0xFF;

/// Spectra/Magellan RAM status base address.
pub const MEM_STATUS_BASE1: u16 = 0x8000;
/// Spectra/Magellan EEPROM byte carrying the installer-lock flag.
pub const MEM_STATUS_BASE2: u16 = 0x1FE0;

/// Paradox product identifiers reported in the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProductId {
    DigiplexV13,
    DigiplexV2,
    DigiplexNe,
    Evo48,
    Evo96,
    Evo192,
    EvoHd,
    Sp5500,
    Sp6000,
    Sp7000,
    Sp4000,
    Sp65,
    Mg5000,
    Mg5050,
    Mg5075,
}

impl ProductId {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::DigiplexV13),
            1 => Some(Self::DigiplexV2),
            2 => Some(Self::DigiplexNe),
            3 => Some(Self::Evo48),
            4 => Some(Self::Evo96),
            5 => Some(Self::Evo192),
            7 => Some(Self::EvoHd),
            21 => Some(Self::Sp5500),
            22 => Some(Self::Sp6000),
            23 => Some(Self::Sp7000),
            26 => Some(Self::Sp4000),
            27 => Some(Self::Sp65),
            64 => Some(Self::Mg5000),
            65 => Some(Self::Mg5050),
            66 => Some(Self::Mg5075),
            _ => None,
        }
    }

    pub fn to_u8(self) -> u8 {
        match self {
            Self::DigiplexV13 => 0,
            Self::DigiplexV2 => 1,
            Self::DigiplexNe => 2,
            Self::Evo48 => 3,
            Self::Evo96 => 4,
            Self::Evo192 => 5,
            Self::EvoHd => 7,
            Self::Sp5500 => 21,
            Self::Sp6000 => 22,
            Self::Sp7000 => 23,
            Self::Sp4000 => 26,
            Self::Sp65 => 27,
            Self::Mg5000 => 64,
            Self::Mg5050 => 65,
            Self::Mg5075 => 66,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DigiplexV13 => "DIGIPLEX_v13",
            Self::DigiplexV2 => "DIGIPLEX_v2",
            Self::DigiplexNe => "DIGIPLEX_NE",
            Self::Evo48 => "DIGIPLEX_EVO_48",
            Self::Evo96 => "DIGIPLEX_EVO_96",
            Self::Evo192 => "DIGIPLEX_EVO_192",
            Self::EvoHd => "DIGIPLEX_EVO_HD",
            Self::Sp5500 => "SPECTRA_SP5500",
            Self::Sp6000 => "SPECTRA_SP6000",
            Self::Sp7000 => "SPECTRA_SP7000",
            Self::Sp4000 => "SPECTRA_SP4000",
            Self::Sp65 => "SPECTRA_SP65",
            Self::Mg5000 => "MAGELLAN_MG5000",
            Self::Mg5050 => "MAGELLAN_MG5050",
            Self::Mg5075 => "MAGELLAN_MG5075",
        }
    }

    /// True for the Spectra/Magellan family.
    pub fn is_spectra_magellan(&self) -> bool {
        matches!(
            self,
            Self::Sp5500
                | Self::Sp6000
                | Self::Sp7000
                | Self::Sp4000
                | Self::Sp65
                | Self::Mg5000
                | Self::Mg5050
                | Self::Mg5075
        )
    }
}

/// IP envelope constants.
pub mod ip {
    pub const SOF: u8 = 0xAA;
    pub const PAD: u8 = 0xEE;
    pub const HEADER_LEN: usize = 16;

    pub const MESSAGE_IP_RESPONSE: u8 = 0x01;
    pub const MESSAGE_SERIAL_PASSTHROUGH_RESPONSE: u8 = 0x02;
    pub const MESSAGE_IP_REQUEST: u8 = 0x03;
    pub const MESSAGE_SERIAL_PASSTHROUGH_REQUEST: u8 = 0x04;

    pub const FLAG_ENCRYPT: u8 = 0x01;

    pub const COMMAND_PASSTHROUGH: u8 = 0x00;
    pub const COMMAND_CONNECT: u8 = 0xF0;
    pub const COMMAND_KEEP_ALIVE: u8 = 0xF2;
    pub const COMMAND_UPLOAD_DOWNLOAD_CONNECTION: u8 = 0xF3;
    pub const COMMAND_TOGGLE_KEEP_ALIVE: u8 = 0xF8;

    /// Fixed `toggle_keep_alive` payload: `0a 50 00 80`, zeros, last byte `d0`.
    pub const TOGGLE_KEEP_ALIVE_PAYLOAD: [u8; 38] = [
        0x0a, 0x50, 0x00, 0x80, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xd0,
    ];
}

/// Attempts made by the transport before giving up on a connect.
pub const CONNECT_RETRIES: u32 = 3;
/// Maximum back-off between reconnect attempts.
pub const MAX_RECONNECT_DELAY: Duration = Duration::from_secs(60);
