// MIT License - Copyright (c) 2026 The paradox-bridge Authors
// Paradox alarm panel session engine
//
//! # paradox-bridge
//!
//! Local communication with Paradox alarm panels: Spectra SP, Magellan MG
//! and EVO (EVO48/96/192/HD), over a serial port, a bare TCP tunnel, a
//! local IP150 module or a remote site broker.
//!
//! The [`Paradox`] session logs in, loads labels and definitions, keeps
//! polling status, decodes live events and publishes everything on a bus.
//! Interfaces subscribe to the bus and drive the panel through the
//! `control_*` commands.
//!
//! ## Quick Start
//!
//! ```no_run
//! use paradox_bridge::{BusMessage, Config, Paradox};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::builder()
//!         .serial("/dev/ttyUSB0", 9600)
//!         .password(Some("0000"))
//!         .build();
//!
//!     let paradox = Paradox::new(config)?;
//!     let mut bus = paradox.subscribe();
//!     paradox.connect().await?;
//!
//!     let runner = paradox.clone();
//!     tokio::spawn(async move { runner.run().await });
//!
//!     tokio::spawn(async move {
//!         while let Ok(message) = bus.recv().await {
//!             if let BusMessage::Change(change) = message {
//!                 println!("{}/{} {} = {}", change.element_type, change.key, change.property, change.new_value);
//!             }
//!         }
//!     });
//!
//!     paradox.control_zone("Front_door", "bypass").await?;
//!
//!     tokio::signal::ctrl_c().await?;
//!     paradox.disconnect().await;
//!     Ok(())
//! }
//! ```

pub mod comm;
pub mod config;
pub mod constants;
pub mod crypto;
pub mod devices;
pub mod error;
pub mod event;
pub mod family;
pub mod handler;
pub mod labels;
pub mod live_event;
pub mod paradox;
pub mod protocol;
pub mod status;
pub mod storage;
pub mod transport;

// Re-exports for convenience
pub use config::{Config, ConfigBuilder, ConnectionType};
pub use devices::{DoorCommand, PanicType, PartitionCommand, PartitionState, PgmCommand, ZoneCommand};
pub use error::{PanelErrorCode, ParadoxError, Result};
pub use event::{BusMessage, BusReceiver, Event, EventKind, EventLevel, Notification, PanelInfo, RunState};
pub use family::Panel;
pub use labels::LabelEncoding;
pub use paradox::Paradox;
pub use storage::{Change, Element, ElementType, Selector};
pub use transport::{SiteInfo, SiteModule, SiteRendezvous};
