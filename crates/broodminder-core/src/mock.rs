//! Mock advertisements for testing.
//!
//! This module builds bit-exact BroodMinder advertisements without radio
//! hardware.
//!
//! - [`AdvertisementBuilder`] encodes one device's advertisement, applying
//!   the inverse of the decoder's conversions.
//! - [`MockSubHub`] produces a hub's rotating mock advertisements.
//!
//! # Example
//!
//! ```
//! use broodminder_core::mock::AdvertisementBuilder;
//! use broodminder_core::decode_advertisement;
//! use broodminder_types::DeviceIdentity;
//!
//! let raw = AdvertisementBuilder::for_device(DeviceIdentity::new(43, 0x0A, 0x1C))
//!     .temperature_c(22.5)
//!     .weights(10.0, 12.5)
//!     .build();
//!
//! let decoded = decode_advertisement(&raw).unwrap().into_decoded().unwrap();
//! assert_eq!(decoded.reading.weight_right, Some(12.5));
//! ```

use broodminder_types::ble::{
    AD_TYPE_COMPLETE_LOCAL_NAME, AD_TYPE_FLAGS, AD_TYPE_MANUFACTURER_DATA, MANUFACTURER_ID,
};
use broodminder_types::{BdAddr, DeviceIdentity, RawAdvertisement, SmTime};

use crate::layout::{
    Field, ModelLayout, TemperatureFormula, WeightOrder, layout_for, raw_from_weight,
};

/// BLE flags value: LE General Discoverable, BR/EDR not supported.
const FLAGS_GENERAL_DISCOVERABLE: u8 = 0x06;

/// Address prefix used for mock devices.
const MOCK_ADDRESS_PREFIX: [u8; 3] = [0x06, 0x09, 0x16];

fn mock_address(identity: &DeviceIdentity) -> BdAddr {
    let [a, b, c] = identity.to_bytes();
    let [p0, p1, p2] = MOCK_ADDRESS_PREFIX;
    BdAddr([p0, p1, p2, a, b, c])
}

fn push_ad(data: &mut Vec<u8>, ad_type: u8, value: &[u8]) {
    data.push(value.len() as u8 + 1);
    data.push(ad_type);
    data.extend_from_slice(value);
}

/// Builder for a single device's advertisement.
///
/// Fields the model's layout does not carry can still be written; the
/// decoder ignores them.
#[derive(Debug, Clone)]
pub struct AdvertisementBuilder {
    model: u8,
    layout: &'static ModelLayout,
    identity: DeviceIdentity,
    address: BdAddr,
    rssi: i16,
    local_name: Option<String>,
    company_id: u16,
    payload: Vec<u8>,
    truncate_to: Option<usize>,
}

impl AdvertisementBuilder {
    /// Start an advertisement for `model` with plausible defaults: full
    /// battery, 20 °C, empty scale.
    pub fn new(model: u8) -> Self {
        let layout = layout_for(model);
        let identity = DeviceIdentity::new(model, 0, 0);
        let mut builder = Self {
            model,
            layout,
            identity,
            address: mock_address(&identity),
            rssi: -60,
            local_name: None,
            company_id: MANUFACTURER_ID,
            payload: vec![0; layout.required_len().max(Field::VersionMajor.end())],
            truncate_to: None,
        };
        builder.payload[Field::Model.offset()] = model;
        builder = builder.version(1, 0);
        if layout.is_unknown() {
            return builder;
        }

        builder = builder.battery(100).temperature_c(20.0);
        if layout.weights.is_some() {
            builder = builder.weights(0.0, 0.0);
        }
        if layout.realtime.is_some() {
            builder = builder.realtime_temperature_c(20.0);
        }
        builder
    }

    /// Start an advertisement for a device, with matching address and local
    /// name.
    pub fn for_device(identity: DeviceIdentity) -> Self {
        Self::new(identity.model).identity(identity)
    }

    /// Set the identity advertised in the address and the local name.
    pub fn identity(mut self, identity: DeviceIdentity) -> Self {
        self.identity = identity;
        self.address = mock_address(&identity);
        self.local_name = Some(identity.to_string());
        self
    }

    /// Set the platform-reported address.
    pub fn address(mut self, address: BdAddr) -> Self {
        self.address = address;
        self
    }

    /// Set the signal strength.
    pub fn rssi(mut self, rssi: i16) -> Self {
        self.rssi = rssi;
        self
    }

    /// Set the Complete Local Name.
    pub fn local_name(mut self, name: impl Into<String>) -> Self {
        self.local_name = Some(name.into());
        self
    }

    /// Omit the Complete Local Name.
    pub fn without_local_name(mut self) -> Self {
        self.local_name = None;
        self
    }

    /// Set the manufacturer company identifier.
    pub fn company_id(mut self, company_id: u16) -> Self {
        self.company_id = company_id;
        self
    }

    fn put(&mut self, field: Field, value: &[u8]) {
        if self.payload.len() < field.end() {
            self.payload.resize(field.end(), 0);
        }
        self.payload[field.offset()..field.end()].copy_from_slice(value);
    }

    fn formula(&self) -> TemperatureFormula {
        self.layout
            .temperature
            .unwrap_or(TemperatureFormula::CentiCelsiusOffset)
    }

    fn weight_order(&self) -> WeightOrder {
        self.layout.weights.unwrap_or(WeightOrder::LeftRight)
    }

    /// Set the firmware version.
    pub fn version(mut self, major: u8, minor: u8) -> Self {
        self.put(Field::VersionMajor, &[major]);
        self.put(Field::VersionMinor, &[minor]);
        self
    }

    /// Set the battery percentage.
    pub fn battery(mut self, battery: u8) -> Self {
        self.put(Field::Battery, &[battery]);
        self
    }

    /// Set the elapsed counter.
    pub fn elapsed(mut self, elapsed: u16) -> Self {
        self.put(Field::Elapsed, &elapsed.to_le_bytes());
        self
    }

    /// Set the raw temperature sample.
    pub fn temperature_raw(mut self, raw: u16) -> Self {
        self.put(Field::Temperature, &raw.to_le_bytes());
        self
    }

    /// Set the temperature using the model's formula.
    pub fn temperature_c(self, celsius: f32) -> Self {
        let raw = self.formula().raw_from_celsius(celsius);
        self.temperature_raw(raw)
    }

    /// Set the humidity percentage.
    pub fn humidity(mut self, humidity: u8) -> Self {
        self.put(Field::Humidity, &[humidity]);
        self
    }

    /// Set the raw weight fields A and B, in payload order.
    pub fn weights_raw(mut self, a: u16, b: u16) -> Self {
        self.put(Field::WeightA, &a.to_le_bytes());
        self.put(Field::WeightB, &b.to_le_bytes());
        self
    }

    /// Set the left and right load cells in pounds.
    pub fn weights(self, left: f32, right: f32) -> Self {
        let (a, b) = self.weight_order().assign(left, right);
        self.weights_raw(raw_from_weight(a), raw_from_weight(b))
    }

    /// Set the second pair of load cells in pounds.
    pub fn secondary_weights(mut self, left: f32, right: f32) -> Self {
        let (a, b) = self.weight_order().assign(left, right);
        self.put(Field::SecondaryLow, &raw_from_weight(a).to_le_bytes());
        self.put(Field::SecondaryHigh, &raw_from_weight(b).to_le_bytes());
        self
    }

    /// Set the SM_Time word.
    pub fn sm_time(mut self, sm_time: SmTime) -> Self {
        self.put(Field::SmTime, &sm_time.to_raw().to_le_bytes());
        self
    }

    /// Set the realtime temperature using the model's formula.
    pub fn realtime_temperature_c(mut self, celsius: f32) -> Self {
        let [lo, hi] = self.formula().raw_from_celsius(celsius).to_le_bytes();
        self.put(Field::RealtimeTemperatureLow, &[lo]);
        self.put(Field::RealtimeTemperatureHigh, &[hi]);
        self
    }

    /// Set the realtime total weight in pounds.
    pub fn realtime_total_weight(mut self, pounds: f32) -> Self {
        self.put(Field::Trailer, &raw_from_weight(pounds).to_le_bytes());
        self
    }

    /// Set the swarm-state word.
    pub fn swarm_state(mut self, state: u16) -> Self {
        self.put(Field::Trailer, &state.to_le_bytes());
        self
    }

    /// Write an identity into the hub mock-identity slots.
    pub fn mock_identity(mut self, identity: DeviceIdentity) -> Self {
        let [model, minor, major] = identity.to_bytes();
        self.put(Field::MockModel, &[model]);
        self.put(Field::MockMinor, &[minor]);
        self.put(Field::MockMajor, &[major]);
        self
    }

    /// Cut the manufacturer payload to `len` bytes.
    pub fn truncate(mut self, len: usize) -> Self {
        self.truncate_to = Some(len);
        self
    }

    /// Model number written at offset 0.
    pub fn model(&self) -> u8 {
        self.model
    }

    /// Identity advertised by this builder.
    pub fn device_identity(&self) -> DeviceIdentity {
        self.identity
    }

    /// The manufacturer payload (after the company identifier).
    pub fn payload(&self) -> Vec<u8> {
        let mut payload = self.payload.clone();
        if let Some(len) = self.truncate_to {
            payload.truncate(len);
        }
        payload
    }

    /// The complete AD structure bytes.
    pub fn ad_bytes(&self) -> Vec<u8> {
        let mut manufacturer = self.company_id.to_le_bytes().to_vec();
        manufacturer.extend(self.payload());

        let mut data = Vec::with_capacity(manufacturer.len() + 16);
        push_ad(&mut data, AD_TYPE_FLAGS, &[FLAGS_GENERAL_DISCOVERABLE]);
        push_ad(&mut data, AD_TYPE_MANUFACTURER_DATA, &manufacturer);
        if let Some(name) = &self.local_name {
            push_ad(&mut data, AD_TYPE_COMPLETE_LOCAL_NAME, name.as_bytes());
        }
        data
    }

    /// Build the raw advertisement.
    pub fn build(&self) -> RawAdvertisement {
        RawAdvertisement::new(self.address, self.rssi, self.ad_bytes())
    }
}

/// A hub cycling through the devices it relays.
///
/// Each call to [`MockSubHub::next_advertisement`] produces the hub's
/// advertisement for the next member in rotation order.
///
/// # Example
///
/// ```
/// use broodminder_core::mock::{AdvertisementBuilder, MockSubHub};
/// use broodminder_types::DeviceIdentity;
///
/// let mut hub = MockSubHub::new(DeviceIdentity::new(52, 0x01, 0x2F))
///     .relay(AdvertisementBuilder::for_device(DeviceIdentity::new(43, 0x0A, 0x1C)))
///     .relay_self();
///
/// assert_eq!(hub.members().len(), 2);
/// let first = hub.next_advertisement();
/// assert_eq!(first.address, hub.address());
/// ```
#[derive(Debug, Clone)]
pub struct MockSubHub {
    identity: DeviceIdentity,
    address: BdAddr,
    rssi: i16,
    members: Vec<AdvertisementBuilder>,
    position: usize,
}

impl MockSubHub {
    /// Create a hub with no members.
    pub fn new(identity: DeviceIdentity) -> Self {
        Self {
            identity,
            address: mock_address(&identity),
            rssi: -55,
            members: Vec::new(),
            position: 0,
        }
    }

    /// Override the hub's platform-reported address.
    pub fn with_address(mut self, address: BdAddr) -> Self {
        self.address = address;
        self
    }

    /// Set the hub's signal strength.
    pub fn rssi(mut self, rssi: i16) -> Self {
        self.rssi = rssi;
        self
    }

    /// Add a relayed device; its identity and sensor payload come from the
    /// builder.
    pub fn relay(mut self, member: AdvertisementBuilder) -> Self {
        self.members.push(member);
        self
    }

    /// Add the hub itself to the rotation.
    pub fn relay_self(self) -> Self {
        let identity = self.identity;
        self.relay(AdvertisementBuilder::for_device(identity))
    }

    /// Drop a device from the rotation.
    pub fn remove(&mut self, identity: &DeviceIdentity) {
        self.members.retain(|m| m.device_identity() != *identity);
        if self.position >= self.members.len() {
            self.position = 0;
        }
    }

    /// The hub's identity.
    pub fn identity(&self) -> DeviceIdentity {
        self.identity
    }

    /// The hub's address.
    pub fn address(&self) -> BdAddr {
        self.address
    }

    /// Relayed identities in rotation order.
    pub fn members(&self) -> Vec<DeviceIdentity> {
        self.members.iter().map(|m| m.device_identity()).collect()
    }

    /// The hub advertisement relaying member `index`, if it exists.
    pub fn advertisement_for(&self, index: usize) -> Option<RawAdvertisement> {
        let member = self.members.get(index)?;
        let raw = member
            .clone()
            .mock_identity(member.device_identity())
            .identity(self.identity)
            .address(self.address)
            .rssi(self.rssi)
            .build();
        Some(raw)
    }

    /// The next advertisement in rotation order.
    ///
    /// Returns an advertisement with no manufacturer payload when the hub
    /// has no members.
    pub fn next_advertisement(&mut self) -> RawAdvertisement {
        match self.advertisement_for(self.position) {
            Some(raw) => {
                self.position = (self.position + 1) % self.members.len();
                raw
            }
            None => {
                let mut data = Vec::new();
                push_ad(&mut data, AD_TYPE_FLAGS, &[FLAGS_GENERAL_DISCOVERABLE]);
                push_ad(
                    &mut data,
                    AD_TYPE_COMPLETE_LOCAL_NAME,
                    self.identity.to_string().as_bytes(),
                );
                RawAdvertisement::new(self.address, self.rssi, data)
            }
        }
    }
}

impl Iterator for MockSubHub {
    type Item = RawAdvertisement;

    fn next(&mut self) -> Option<Self::Item> {
        if self.members.is_empty() {
            None
        } else {
            Some(self.next_advertisement())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ad::parse_ad_structures;
    use crate::decoder::decode_payload;
    use crate::pipeline::decode_advertisement;
    use broodminder_types::DeviceModel;

    #[test]
    fn test_default_builder_decodes() {
        for model in DeviceModel::ALL {
            let builder = AdvertisementBuilder::new(model.number());
            let reading = decode_payload(&builder.payload()).unwrap();
            assert_eq!(reading.model, Some(model));
            assert_eq!(reading.battery, Some(100));
            assert!((reading.temperature_c.unwrap() - 20.0).abs() < 0.01);
        }
    }

    #[test]
    fn test_ad_bytes_layout() {
        let builder = AdvertisementBuilder::for_device(DeviceIdentity::new(43, 0x0A, 0x1C));
        let data = builder.ad_bytes();
        let ads = parse_ad_structures(&data).unwrap();
        assert_eq!(ads.len(), 3);
        assert_eq!(ads[1].data[..2], [0x8Du8, 0x02]);
        assert_eq!(ads[1].data.len(), 2 + 15);
        assert_eq!(ads[2].data, b"43:0A:1C");
        assert_eq!(builder.build().address.to_string(), "06:09:16:43:0A:1C");
    }

    #[test]
    fn test_builder_round_trips_values() {
        let raw = AdvertisementBuilder::for_device(DeviceIdentity::new(57, 1, 2))
            .temperature_c(34.5)
            .humidity(61)
            .weights(-1.25, 40.0)
            .sm_time(SmTime::SinceBoot { seconds: 120 })
            .realtime_total_weight(80.5)
            .build();

        let reading = decode_advertisement(&raw)
            .unwrap()
            .into_decoded()
            .unwrap()
            .reading;
        assert_eq!(reading.temperature_c, Some(34.5));
        assert_eq!(reading.humidity, Some(61));
        assert_eq!(reading.weight_left, Some(-1.25));
        assert_eq!(reading.weight_right, Some(40.0));
        assert_eq!(reading.sm_time, Some(SmTime::SinceBoot { seconds: 120 }));
        assert_eq!(reading.realtime_total_weight, Some(80.5));
        assert_eq!(reading.realtime_temperature_c, Some(20.0));
    }

    #[test]
    fn test_truncate() {
        let builder = AdvertisementBuilder::new(43).truncate(5);
        assert_eq!(builder.payload().len(), 5);
    }

    #[test]
    fn test_hub_rotation_order() {
        let a = DeviceIdentity::new(43, 1, 1);
        let b = DeviceIdentity::new(56, 2, 2);
        let hub_id = DeviceIdentity::new(52, 0x01, 0x2F);
        let hub = MockSubHub::new(hub_id)
            .relay(AdvertisementBuilder::for_device(a))
            .relay(AdvertisementBuilder::for_device(b))
            .relay_self();

        let relayed: Vec<DeviceIdentity> = hub
            .take(6)
            .map(|raw| {
                decode_advertisement(&raw)
                    .unwrap()
                    .into_decoded()
                    .unwrap()
                    .identity
                    .unwrap()
            })
            .collect();
        assert_eq!(relayed, vec![a, b, hub_id, a, b, hub_id]);
    }

    #[test]
    fn test_hub_advertisement_carries_hub_name() {
        let hub = MockSubHub::new(DeviceIdentity::new(52, 0x01, 0x2F))
            .relay(AdvertisementBuilder::for_device(DeviceIdentity::new(43, 1, 1)));
        let raw = hub.advertisement_for(0).unwrap();
        let data = raw.data.to_vec();
        let ads = parse_ad_structures(&data).unwrap();
        assert_eq!(ads[2].data, b"52:01:2F");
        assert_eq!(ads[1].data.len(), 2 + 21);
        assert!(hub.advertisement_for(1).is_none());
    }

    #[test]
    fn test_empty_hub_iterator() {
        let mut hub = MockSubHub::new(DeviceIdentity::new(52, 0x01, 0x2F));
        assert!(hub.next().is_none());
        let raw = hub.next_advertisement();
        assert!(matches!(
            decode_advertisement(&raw).unwrap(),
            crate::pipeline::Outcome::Rejected(_)
        ));
    }

    #[test]
    fn test_remove_member() {
        let a = DeviceIdentity::new(43, 1, 1);
        let mut hub = MockSubHub::new(DeviceIdentity::new(52, 0x01, 0x2F))
            .relay(AdvertisementBuilder::for_device(a))
            .relay_self();
        hub.remove(&a);
        assert_eq!(hub.members(), vec![DeviceIdentity::new(52, 0x01, 0x2F)]);
    }
}
