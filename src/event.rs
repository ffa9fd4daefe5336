// MIT License - Copyright (c) 2026 The paradox-bridge Authors
// Pub/sub bus between the session engine and its interfaces

use std::fmt;

use chrono::NaiveDateTime;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::storage::{Change, ElementType};

/// Where an [`Event`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    /// Decoded from a panel live-event frame.
    Live,
    /// Derived from a published [`Change`].
    Change,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventLevel {
    Debug,
    Info,
    Warn,
    Critical,
}

impl EventLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Critical => "critical",
        }
    }
}

/// A rendered event, ready for interfaces.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    pub kind: EventKind,
    pub level: EventLevel,
    pub tags: Vec<String>,
    #[serde(rename = "type")]
    pub element_type: ElementType,
    pub id: Option<u32>,
    pub key: Option<String>,
    pub label: String,
    pub message: String,
    pub change: Map<String, Value>,
    pub partition: Option<u32>,
    pub major: Option<u8>,
    pub minor: Option<u16>,
    pub timestamp: NaiveDateTime,
}

impl Event {
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.level.as_str(), self.message)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub level: EventLevel,
    pub source: String,
    pub message: String,
}

/// What the handshake learned about the panel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PanelInfo {
    pub product_id: u8,
    pub model: String,
    pub firmware: String,
    pub serial_number: String,
    pub panel_id: u16,
}

/// Session lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RunState {
    Stop,
    Init,
    Connected,
    Run,
    Pause,
    Error,
}

impl RunState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stop => "STOP",
            Self::Init => "INIT",
            Self::Connected => "CONNECTED",
            Self::Run => "RUN",
            Self::Pause => "PAUSE",
            Self::Error => "ERROR",
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything published on the bus.
///
/// Subscribe via `paradox.subscribe()` to receive a
/// `tokio::sync::broadcast::Receiver<BusMessage>`.
#[derive(Debug, Clone)]
pub enum BusMessage {
    LabelsLoaded(Value),
    DefinitionsLoaded(Value),
    StatusUpdate(Value),
    Change(Change),
    Event(Event),
    Notification(Notification),
    PanelDetected(PanelInfo),
    Connected,
    RunState(RunState),
}

impl BusMessage {
    /// Topic name of this message.
    pub fn topic(&self) -> &'static str {
        match self {
            Self::LabelsLoaded(_) => "labels_loaded",
            Self::DefinitionsLoaded(_) => "definitions_loaded",
            Self::StatusUpdate(_) => "status_update",
            Self::Change(_) => "changes",
            Self::Event(_) => "events",
            Self::Notification(_) => "notifications",
            Self::PanelDetected(_) => "panel_detected",
            Self::Connected => "connected",
            Self::RunState(_) => "run-state",
        }
    }
}

/// Type alias for the broadcast sender.
pub type BusSender = tokio::sync::broadcast::Sender<BusMessage>;

/// Type alias for the broadcast receiver.
pub type BusReceiver = tokio::sync::broadcast::Receiver<BusMessage>;

/// Create a new bus with the given capacity.
pub fn bus_channel(capacity: usize) -> (BusSender, BusReceiver) {
    tokio::sync::broadcast::channel(capacity)
}
