// MIT License - Copyright (c) 2026 The paradox-bridge Authors
// Panel family adapters: per-product message codecs, memory maps and event maps

pub mod common;
pub mod event_map;
pub mod evo;
pub mod layout;
pub mod messages;
pub mod spectra_magellan;

use std::fmt;

use serde_json::{Map, Value};

use crate::constants::ProductId;
use crate::devices::{DoorCommand, PanicType, PartitionCommand, PgmCommand, ZoneCommand};
use crate::error::{ParadoxError, Result};
use crate::labels::LabelEncoding;
use crate::storage::ElementType;

pub use common::encode_password;
pub use event_map::EventMap;
pub use messages::{
    Body, Direction, EepromData, InitializeCommunication, InitiateResponse, Message, RawEvent,
    ReadEeprom, Request, StartCommunicationResponse, Version,
};

use common::SOURCE_ID;

/// Label bytes per element.
pub const LABEL_LENGTH: usize = 16;

const MODULE_ADDRESS: u8 = 0x00;
const MODEM_SPEED: u8 = 0x08;
const SOURCE_METHOD: u8 = 0x55;

/// A run of equally spaced label records in EEPROM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LabelRegion {
    pub ty: ElementType,
    pub base: u32,
    pub count: u32,
    pub stride: u32,
    pub length: usize,
}

impl LabelRegion {
    pub const fn new(ty: ElementType, base: u32, count: u32, stride: u32) -> Self {
        Self {
            ty,
            base,
            count,
            stride,
            length: LABEL_LENGTH,
        }
    }

    /// EEPROM address of the label for element `id` (1-based).
    pub fn address(&self, id: u32) -> u32 {
        self.base + id.saturating_sub(1) * self.stride
    }
}

/// The codec selected for the connected panel.
///
/// `Generic` only understands the handshake frames and is used until
/// `StartCommunicationResponse` reveals the product id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Panel {
    #[default]
    Generic,
    SpecMag(ProductId),
    Evo48,
    Evo96,
    Evo192,
    EvoHd,
}

impl fmt::Display for Panel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl Panel {
    pub fn from_product_id(product_id: u8) -> Result<Self> {
        match ProductId::from_u8(product_id) {
            Some(ProductId::Evo48) => Ok(Self::Evo48),
            Some(ProductId::Evo96) => Ok(Self::Evo96),
            Some(ProductId::Evo192) => Ok(Self::Evo192),
            Some(ProductId::EvoHd) => Ok(Self::EvoHd),
            Some(p) if p.is_spectra_magellan() => Ok(Self::SpecMag(p)),
            _ => Err(ParadoxError::PanelNotDetected),
        }
    }

    pub fn product_id(&self) -> Option<ProductId> {
        match self {
            Self::Generic => None,
            Self::SpecMag(p) => Some(*p),
            Self::Evo48 => Some(ProductId::Evo48),
            Self::Evo96 => Some(ProductId::Evo96),
            Self::Evo192 => Some(ProductId::Evo192),
            Self::EvoHd => Some(ProductId::EvoHd),
        }
    }

    pub fn name(&self) -> &'static str {
        self.product_id().map(|p| p.as_str()).unwrap_or("GENERIC")
    }

    pub fn is_evo(&self) -> bool {
        self.evo_model().is_some()
    }

    fn is_magellan(&self) -> bool {
        matches!(
            self,
            Self::SpecMag(ProductId::Mg5000 | ProductId::Mg5050 | ProductId::Mg5075)
        )
    }

    fn evo_model(&self) -> Option<evo::Model> {
        match self {
            Self::Evo48 => Some(evo::Model::Evo48),
            Self::Evo96 => Some(evo::Model::Evo96),
            Self::Evo192 => Some(evo::Model::Evo192),
            Self::EvoHd => Some(evo::Model::EvoHd),
            Self::Generic | Self::SpecMag(_) => None,
        }
    }

    /// Decode one frame; `None` for shapes this family does not know.
    pub fn parse_message(&self, bytes: &[u8], direction: Direction) -> Option<Message> {
        let family = match self {
            Self::Generic => None,
            Self::SpecMag(_) => spectra_magellan::parse(bytes, direction),
            _ => evo::parse(bytes, direction),
        };
        family.or_else(|| common::parse(bytes, direction))
    }

    /// Encode a request into a checksummed frame.
    pub fn build(&self, request: &Request) -> Result<Vec<u8>> {
        let family = match self {
            Self::Generic => None,
            Self::SpecMag(_) => spectra_magellan::build(request),
            _ => evo::build(request),
        };
        family
            .or_else(|| common::build(request))
            .ok_or_else(|| ParadoxError::mapping(request.name(), self.name()))
    }

    pub fn status_requests(&self) -> Vec<ReadEeprom> {
        match self {
            Self::Generic => Vec::new(),
            Self::SpecMag(_) => {
                let mut reqs = spectra_magellan::status_requests();
                reqs.push(spectra_magellan::installer_lock_request());
                reqs
            }
            _ => self.evo_model().map(evo::status_requests).unwrap_or_default(),
        }
    }

    pub fn parse_status(&self, reply: &EepromData) -> Option<Map<String, Value>> {
        match self {
            Self::Generic => None,
            Self::SpecMag(_) => spectra_magellan::parse_status(reply),
            _ => evo::parse_status(reply),
        }
    }

    pub fn label_regions(&self) -> Vec<LabelRegion> {
        match self {
            Self::Generic => Vec::new(),
            Self::SpecMag(_) => spectra_magellan::label_regions(self.is_magellan()),
            _ => self.evo_model().map(evo::label_regions).unwrap_or_default(),
        }
    }

    /// Read issued for one label record.
    pub fn label_request(&self, region: &LabelRegion, id: u32) -> ReadEeprom {
        let length = match self {
            Self::SpecMag(_) => spectra_magellan::READ_LENGTH,
            _ => region.length as u8,
        };
        ReadEeprom::eeprom(region.address(id), length)
    }

    /// Label text carried by a label read reply.
    pub fn decode_label(&self, region: &LabelRegion, reply: &EepromData, encoding: LabelEncoding) -> String {
        let end = region.length.min(reply.data.len());
        encoding.decode(&reply.data[..end])
    }

    pub fn event_map(&self) -> EventMap {
        match self {
            Self::Generic | Self::SpecMag(_) => spectra_magellan::event_map::EVENT_MAP,
            _ => evo::event_map::EVENT_MAP,
        }
    }

    /// Zone/partition definition reads; empty when the family exposes none.
    pub fn definition_requests(&self) -> Vec<ReadEeprom> {
        self.evo_model().map(evo::definition_requests).unwrap_or_default()
    }

    pub fn parse_definitions(&self, reply: &EepromData) -> Option<Map<String, Value>> {
        if self.is_evo() {
            evo::parse_definitions(reply)
        } else {
            None
        }
    }

    pub fn partition_requests(&self, ids: &[u32], command: PartitionCommand) -> Result<Vec<Request>> {
        match self {
            Self::Generic => Err(ParadoxError::mapping(command.as_str(), "partition")),
            Self::SpecMag(_) => spectra_magellan::partition_requests(ids, command),
            _ => evo::partition_requests(ids, command),
        }
    }

    pub fn zone_requests(&self, ids: &[u32], command: ZoneCommand) -> Result<Vec<Request>> {
        match self {
            Self::Generic => Err(ParadoxError::mapping(command.as_str(), "zone")),
            Self::SpecMag(_) => spectra_magellan::zone_requests(ids, command),
            _ => evo::zone_requests(ids, command),
        }
    }

    pub fn pgm_requests(&self, ids: &[u32], command: PgmCommand) -> Result<Vec<Request>> {
        match self {
            Self::Generic => Err(ParadoxError::mapping(command.as_str(), "pgm")),
            Self::SpecMag(_) => spectra_magellan::pgm_requests(ids, command),
            _ => evo::pgm_requests(ids, command),
        }
    }

    pub fn door_requests(&self, ids: &[u32], command: DoorCommand) -> Result<Vec<Request>> {
        if self.is_evo() {
            evo::door_requests(ids, command)
        } else {
            Err(ParadoxError::mapping(command.as_str(), "door"))
        }
    }

    pub fn panic_request(&self, partitions: &[u32], panic_type: PanicType, user_id: u16) -> Result<Request> {
        if self.is_evo() {
            Ok(evo::panic_request(partitions, panic_type, user_id))
        } else {
            Err(ParadoxError::mapping("panic", "partition"))
        }
    }

    /// Login frame echoing the identity the panel reported during the handshake.
    pub fn initialize_request(
        &self,
        start: &StartCommunicationResponse,
        initiate: Option<&InitiateResponse>,
        password: Option<&str>,
    ) -> Result<Request> {
        Ok(Request::InitializeCommunication(InitializeCommunication {
            module_address: MODULE_ADDRESS,
            product_id: start.product_id,
            firmware: start.firmware,
            panel_id: start.panel_id,
            pc_password: encode_password(password)?,
            modem_speed: MODEM_SPEED,
            source_method: SOURCE_METHOD,
            user_code: 0,
            serial_number: initiate.map(|i| i.serial_number).unwrap_or_default(),
            system_options: [0; 9],
            source_id: SOURCE_ID,
        }))
    }
}
