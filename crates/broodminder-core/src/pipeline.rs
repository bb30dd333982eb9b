//! Per-advertisement decode pipeline.
//!
//! [`decode_advertisement`] is the stateless path: framing, vendor filter,
//! identity resolution and payload decoding. [`DecodePipeline`] wraps it with
//! a [`RotationTracker`] so hub relays update the per-hub census in arrival
//! order.

use std::fmt;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, trace};

use broodminder_types::{BdAddr, DeviceIdentity, RawAdvertisement, SensorReading};

use crate::ad::parse_ad_structures;
use crate::decoder::{decode_payload, decode_relayed};
use crate::error::{Error, Result};
use crate::identity::{IdentitySource, resolve_identity};
use crate::layout::{Field, Payload, layout_for};
use crate::rotation::{Observation, RotationTracker, TrackerOptions};
use crate::util::create_identifier;
use crate::vendor::{Rejection, manufacturer_payload};

/// One decoded BroodMinder advertisement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecodedAdvertisement {
    /// Address the advertisement was received from.
    pub address: BdAddr,
    /// Received signal strength in dBm.
    pub rssi: i16,
    /// Complete Local Name, if present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_name: Option<String>,
    /// Identity of the device the reading belongs to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity: Option<DeviceIdentity>,
    /// Where `identity` came from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity_source: Option<IdentitySource>,
    /// Hub that relayed the reading, for mock advertisements.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relayed_by: Option<DeviceIdentity>,
    /// Decoded sensor values.
    pub reading: SensorReading,
}

impl DecodedAdvertisement {
    /// Whether this reading was relayed by a hub.
    pub fn is_relayed(&self) -> bool {
        self.relayed_by.is_some()
    }

    /// Stable key for the device the reading belongs to.
    ///
    /// Relayed readings are keyed by the relayed identity, since their
    /// address is the hub's.
    pub fn device_id(&self) -> String {
        match (self.relayed_by, self.identity) {
            (Some(_), Some(identity)) => identity.to_string(),
            _ => create_identifier(&self.address, self.identity.as_ref()),
        }
    }

    /// Key of the relaying hub: its address, or its identity when the
    /// platform withholds the address.
    pub fn hub_key(&self) -> Option<String> {
        self.relayed_by
            .map(|hub| create_identifier(&self.address, Some(&hub)))
    }
}

impl fmt::Display for DecodedAdvertisement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.identity {
            Some(identity) => writeln!(f, "Device: {} ({})", identity, self.address)?,
            None => writeln!(f, "Device: {}", self.address)?,
        }
        if let Some(hub) = self.relayed_by {
            writeln!(f, "Relayed by: {}", hub)?;
        }
        writeln!(f, "RSSI: {} dBm", self.rssi)?;
        write!(f, "{}", self.reading)
    }
}

/// Result of running one advertisement through the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// A BroodMinder advertisement was decoded.
    Decoded(Box<DecodedAdvertisement>),
    /// The advertisement was filtered out before decoding.
    Rejected(Rejection),
}

impl Outcome {
    /// The decoded advertisement, if any.
    pub fn decoded(&self) -> Option<&DecodedAdvertisement> {
        match self {
            Outcome::Decoded(decoded) => Some(decoded),
            Outcome::Rejected(_) => None,
        }
    }

    /// Consume into the decoded advertisement, if any.
    pub fn into_decoded(self) -> Option<DecodedAdvertisement> {
        match self {
            Outcome::Decoded(decoded) => Some(*decoded),
            Outcome::Rejected(_) => None,
        }
    }
}

/// Read the relayed identity from a hub payload's mock slots.
///
/// # Errors
///
/// Returns [`Error::TruncatedPayload`] if the payload is too short for the
/// hub layout, or [`Error::Parse`] if the model slot is not a valid identity
/// byte.
pub fn mock_identity(payload: &[u8]) -> Result<DeviceIdentity> {
    let hub_model = broodminder_types::DeviceModel::SubHub.number();
    let p = Payload::new(payload, hub_model);
    let required = layout_for(hub_model).required_len();
    if p.len() < required {
        return Err(Error::truncated(hub_model, required, p.len()));
    }
    let slots = [
        p.u8(Field::MockModel)?,
        p.u8(Field::MockMinor)?,
        p.u8(Field::MockMajor)?,
    ];
    Ok(DeviceIdentity::from_bytes(slots)?)
}

/// Decode one raw advertisement without touching any tracker state.
///
/// # Errors
///
/// - [`Error::MalformedAdvertisement`] if the AD framing is inconsistent.
/// - [`Error::TruncatedPayload`] if the payload is shorter than the layout
///   requires.
/// - [`Error::Parse`] if a hub's mock slots do not hold an identity.
pub fn decode_advertisement(raw: &RawAdvertisement) -> Result<Outcome> {
    let structures = parse_ad_structures(&raw.data)?;
    let payload = match manufacturer_payload(&structures) {
        Ok(payload) => payload,
        Err(rejection) => {
            trace!(address = %raw.address, %rejection, "Advertisement rejected");
            return Ok(Outcome::Rejected(rejection));
        }
    };

    let resolved = resolve_identity(&structures, &raw.address);

    let decoded = match resolved.identity.filter(DeviceIdentity::is_hub) {
        Some(hub) => {
            let relayed = mock_identity(payload)?;
            trace!(%hub, %relayed, "Hub relay");
            DecodedAdvertisement {
                address: raw.address,
                rssi: raw.rssi,
                local_name: resolved.local_name,
                identity: Some(relayed),
                identity_source: Some(IdentitySource::HubSlot),
                relayed_by: Some(hub),
                reading: decode_relayed(payload, relayed.model)?,
            }
        }
        None => DecodedAdvertisement {
            address: raw.address,
            rssi: raw.rssi,
            local_name: resolved.local_name,
            identity: resolved.identity,
            identity_source: resolved.source,
            relayed_by: None,
            reading: decode_payload(payload)?,
        },
    };

    Ok(Outcome::Decoded(Box::new(decoded)))
}

/// Output of [`DecodePipeline::process`].
#[derive(Debug, Clone, PartialEq)]
pub struct Processed {
    /// Decode result.
    pub outcome: Outcome,
    /// Tracker update, for hub relays.
    pub relay: Option<RelayUpdate>,
}

/// Tracker update caused by one hub relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayUpdate {
    /// Key of the hub.
    pub hub: String,
    /// Device being relayed.
    pub relayed: DeviceIdentity,
    /// What the tracker observed.
    pub observation: Observation,
}

/// Stateful pipeline: decoding plus hub rotation tracking.
///
/// Calls must be made in arrival order for a given hub; the tracker state
/// depends on the sequence of relays.
#[derive(Debug, Clone, Default)]
pub struct DecodePipeline {
    tracker: RotationTracker,
}

impl DecodePipeline {
    /// Create a pipeline with the given tracker options.
    pub fn new(options: TrackerOptions) -> Self {
        Self {
            tracker: RotationTracker::new(options),
        }
    }

    /// Decode one advertisement and feed hub relays to the tracker.
    ///
    /// Errors leave the tracker untouched.
    ///
    /// # Errors
    ///
    /// See [`decode_advertisement`].
    pub fn process(&mut self, raw: &RawAdvertisement, now: Instant) -> Result<Processed> {
        let outcome = decode_advertisement(raw)?;

        let relay = outcome.decoded().and_then(|decoded| {
            let hub_key = decoded.hub_key()?;
            let relayed = decoded.identity?;
            let observation = self.tracker.observe(
                &hub_key,
                decoded.relayed_by,
                relayed,
                decoded.reading.clone(),
                decoded.rssi,
                now,
            );
            debug!(hub = %hub_key, %relayed, ?observation, "Relay tracked");
            Some(RelayUpdate {
                hub: hub_key,
                relayed,
                observation,
            })
        });

        Ok(Processed { outcome, relay })
    }

    /// The rotation tracker.
    pub fn tracker(&self) -> &RotationTracker {
        &self.tracker
    }

    /// Mutable access to the rotation tracker, e.g. for pruning.
    pub fn tracker_mut(&mut self) -> &mut RotationTracker {
        &mut self.tracker
    }
}
