//! BLE advertisement decoding for BroodMinder hive sensors.
//!
//! BroodMinder scales, thermometers and hygrometers broadcast their readings
//! in the manufacturer-specific data of undirected BLE advertisements. A
//! SubHub collects readings from nearby sensors and re-broadcasts them one
//! device at a time, presenting each under the relayed sensor's identity.
//!
//! This crate turns captured advertisements into [`SensorReading`]s and
//! reconstructs which devices each SubHub is relaying.
//!
//! # Features
//!
//! - **AD parsing**: Split advertising data into length-type-value structures
//! - **Vendor filtering**: Accept only BroodMinder manufacturer data
//! - **Model-aware decoding**: Per-model temperature formula, weight order and
//!   optional field groups
//! - **Identity resolution**: Local name first, device address second
//! - **Rotation tracking**: Per-hub census of relayed devices with cycle
//!   detection and stale-entry pruning
//! - **Monitoring**: Async event stream over any source of advertisements
//!
//! # Quick Start
//!
//! ```
//! use broodminder_core::decode_payload;
//!
//! // Manufacturer data after the company identifier, from a model 43 scale.
//! let payload = [
//!     0x2B, 0x15, 0x02, 0x00, 0x5A, 0x21, 0x00, 0xD0, 0x62, 0x00,
//!     0xFF, 0x7F, 0x05, 0x80, 0x37,
//! ];
//! let reading = decode_payload(&payload)?;
//! assert_eq!(reading.model_number, 43);
//! assert_eq!(reading.battery, Some(90));
//! assert_eq!(reading.humidity, Some(55));
//! # Ok::<(), broodminder_core::Error>(())
//! ```
//!
//! Advertisements from a SubHub are tracked with a [`DecodePipeline`] or, for
//! an async source, an [`AdvertisementMonitor`].

pub mod ad;
pub mod config;
pub mod decoder;
pub mod error;
pub mod events;
pub mod identity;
pub mod layout;
pub mod mock;
pub mod monitor;
pub mod pipeline;
pub mod rotation;
pub mod util;
pub mod vendor;

pub use broodminder_types;
pub use broodminder_types::ble;

// Core exports
pub use config::{Config, ConfigError};
pub use decoder::{decode_payload, decode_relayed};
pub use error::{Error, Result};
pub use events::{EventReceiver, EventSender, MonitorEvent};
pub use identity::{IdentitySource, resolve_identity};
pub use layout::{ModelLayout, layout_for};
pub use mock::{AdvertisementBuilder, MockSubHub};
pub use monitor::{AdvertisementMonitor, MonitorOptions};
pub use pipeline::{DecodePipeline, DecodedAdvertisement, Outcome, decode_advertisement};
pub use rotation::{CensusSnapshot, Observation, RotationTracker, TrackerOptions};
pub use util::create_identifier;
pub use vendor::Rejection;

// Re-export from broodminder-types
pub use broodminder_types::{
    BdAddr, DeviceIdentity, DeviceModel, FirmwareVersion, RawAdvertisement, SensorReading, SmTime,
};
