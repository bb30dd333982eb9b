//! Core types for BroodMinder sensor data.

use core::fmt;
use core::str::FromStr;

use bytes::Bytes;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::ParseError;

/// BroodMinder device model, identified by the model number embedded in
/// every advertisement and in the device's Bluetooth address.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new models
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[non_exhaustive]
#[repr(u8)]
pub enum DeviceModel {
    /// Temperature sensor.
    T = 41,
    /// Temperature and humidity sensor.
    Th = 42,
    /// Two-cell hive scale.
    W = 43,
    /// Temperature sensor with swarm detection.
    Tmwc = 47,
    /// Four-cell extended range hive scale.
    Xlr = 49,
    /// Hub that rebroadcasts other devices' readings.
    SubHub = 52,
    /// Scale with swarm detection.
    Ws = 56,
    /// Long range scale.
    Wslr = 57,
    /// Extended long range scale.
    Wsxlr = 58,
}

impl DeviceModel {
    /// Every documented model, in model-number order.
    pub const ALL: [DeviceModel; 9] = [
        DeviceModel::T,
        DeviceModel::Th,
        DeviceModel::W,
        DeviceModel::Tmwc,
        DeviceModel::Xlr,
        DeviceModel::SubHub,
        DeviceModel::Ws,
        DeviceModel::Wslr,
        DeviceModel::Wsxlr,
    ];

    /// Look up a model by its model number.
    ///
    /// # Examples
    ///
    /// ```
    /// use broodminder_types::DeviceModel;
    ///
    /// assert_eq!(DeviceModel::from_number(43), Some(DeviceModel::W));
    /// assert_eq!(DeviceModel::from_number(44), None);
    /// ```
    #[must_use]
    pub fn from_number(number: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.number() == number)
    }

    /// The model number as broadcast by the device.
    #[must_use]
    pub fn number(self) -> u8 {
        self as u8
    }

    /// Marketing name, e.g. `BroodMinder-W`.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            DeviceModel::T => "BroodMinder-T",
            DeviceModel::Th => "BroodMinder-TH",
            DeviceModel::W => "BroodMinder-W",
            DeviceModel::Tmwc => "BroodMinder-TMWC",
            DeviceModel::Xlr => "BroodMinder-XLR",
            DeviceModel::SubHub => "BroodMinder-SubHub",
            DeviceModel::Ws => "BroodMinder-WS",
            DeviceModel::Wslr => "BroodMinder-WSLR",
            DeviceModel::Wsxlr => "BroodMinder-WSXLR",
        }
    }

    /// Detect the model from its marketing name (case-insensitive).
    ///
    /// ```
    /// use broodminder_types::DeviceModel;
    ///
    /// assert_eq!(DeviceModel::from_name("broodminder-subhub"), Some(DeviceModel::SubHub));
    /// assert_eq!(DeviceModel::from_name("Aranet4"), None);
    /// ```
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|m| m.name().eq_ignore_ascii_case(name.trim()))
    }

    /// Whether this model relays other devices' readings.
    #[must_use]
    pub fn is_hub(self) -> bool {
        self == DeviceModel::SubHub
    }
}

impl TryFrom<u8> for DeviceModel {
    type Error = ParseError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::from_number(value).ok_or(ParseError::UnknownModel(value))
    }
}

impl fmt::Display for DeviceModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Firmware version broadcast in every primary advertisement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FirmwareVersion {
    /// Major version.
    pub major: u8,
    /// Minor version.
    pub minor: u8,
}

impl FirmwareVersion {
    /// Create a version from its parts.
    pub fn new(major: u8, minor: u8) -> Self {
        Self { major, minor }
    }
}

impl fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// A 6-byte Bluetooth device address, most significant byte first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(into = "String", try_from = "String")
)]
pub struct BdAddr(pub [u8; 6]);

impl BdAddr {
    /// The all-zero address some platforms report when they withhold the real one.
    pub const UNSPECIFIED: BdAddr = BdAddr([0; 6]);

    /// Whether the platform withheld the address.
    #[must_use]
    pub fn is_unspecified(&self) -> bool {
        *self == Self::UNSPECIFIED
    }

    /// The trailing three bytes, which carry the device identity on
    /// BroodMinder hardware.
    #[must_use]
    pub fn identity_bytes(&self) -> [u8; 3] {
        [self.0[3], self.0[4], self.0[5]]
    }
}

impl fmt::Display for BdAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = &self.0;
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            b[0], b[1], b[2], b[3], b[4], b[5]
        )
    }
}

impl FromStr for BdAddr {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; 6];
        let mut parts = s.trim().split(':');
        for byte in &mut bytes {
            let part = parts
                .next()
                .filter(|p| p.len() == 2 && p.bytes().all(|b| b.is_ascii_hexdigit()))
                .ok_or_else(|| ParseError::InvalidAddress(s.to_string()))?;
            *byte = u8::from_str_radix(part, 16)
                .map_err(|_| ParseError::InvalidAddress(s.to_string()))?;
        }
        if parts.next().is_some() {
            return Err(ParseError::InvalidAddress(s.to_string()));
        }
        Ok(BdAddr(bytes))
    }
}

impl From<BdAddr> for String {
    fn from(addr: BdAddr) -> Self {
        addr.to_string()
    }
}

impl TryFrom<String> for BdAddr {
    type Error = ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Bluetooth address type reported alongside an advertisement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum AddressType {
    /// Public (IEEE-assigned) address.
    #[default]
    Public,
    /// Random address; may be randomized by the platform.
    Random,
}

/// Identity of a BroodMinder device: its model number and two serial bytes.
///
/// The textual form is `Model:Minor:Major`, mirroring the last three bytes of
/// the device's Bluetooth address. The model byte is written so that its hex
/// digits read as the decimal model number (address byte `0x43` is model 43),
/// while the serial bytes are plain hex.
///
/// ```
/// use broodminder_types::DeviceIdentity;
///
/// let id: DeviceIdentity = "43:0A:1C".parse().unwrap();
/// assert_eq!(id.model, 43);
/// assert_eq!(id.minor, 0x0A);
/// assert_eq!(id.major, 0x1C);
/// assert_eq!(id.to_string(), "43:0A:1C");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(into = "String", try_from = "String")
)]
pub struct DeviceIdentity {
    /// Model number (decimal, e.g. 43).
    pub model: u8,
    /// Serial minor byte.
    pub minor: u8,
    /// Serial major byte.
    pub major: u8,
}

impl DeviceIdentity {
    /// Create an identity from its parts.
    pub fn new(model: u8, minor: u8, major: u8) -> Self {
        Self {
            model,
            minor,
            major,
        }
    }

    /// Build an identity from the `[model, minor, major]` byte triple as it
    /// appears in an address or a hub's mock-identity slots.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::InvalidIdentity`] if the model byte's hex digits
    /// are not both decimal digits (e.g. `0x5A`).
    pub fn from_bytes(bytes: [u8; 3]) -> Result<Self, ParseError> {
        let [model_byte, minor, major] = bytes;
        let (hi, lo) = (model_byte >> 4, model_byte & 0x0F);
        if hi > 9 || lo > 9 {
            return Err(ParseError::InvalidIdentity(format!(
                "{:02X}:{:02X}:{:02X}",
                model_byte, minor, major
            )));
        }
        Ok(Self::new(hi * 10 + lo, minor, major))
    }

    /// Derive the identity from a device address.
    ///
    /// # Errors
    ///
    /// Fails for addresses that do not follow the BroodMinder convention,
    /// which includes randomized platform addresses.
    pub fn from_address(addr: &BdAddr) -> Result<Self, ParseError> {
        Self::from_bytes(addr.identity_bytes())
    }

    /// The `[model, minor, major]` byte triple, inverse of [`Self::from_bytes`].
    #[must_use]
    pub fn to_bytes(&self) -> [u8; 3] {
        let model_byte = (((self.model / 10) % 10) << 4) | (self.model % 10);
        [model_byte, self.minor, self.major]
    }

    /// The documented model for this identity, if any.
    #[must_use]
    pub fn device_model(&self) -> Option<DeviceModel> {
        DeviceModel::from_number(self.model)
    }

    /// Whether this identity belongs to a hub.
    #[must_use]
    pub fn is_hub(&self) -> bool {
        self.model == DeviceModel::SubHub.number()
    }
}

impl fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02X}:{:02X}", self.model, self.minor, self.major)
    }
}

impl FromStr for DeviceIdentity {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseError::InvalidIdentity(s.to_string());
        let parts: Vec<&str> = s.trim().split(':').collect();
        let [model, minor, major] = parts.as_slice() else {
            return Err(invalid());
        };
        if [model, minor, major]
            .iter()
            .any(|p| p.is_empty() || p.len() > 2)
        {
            return Err(invalid());
        }
        // `parse` tolerates a leading sign.
        if !model.bytes().all(|b| b.is_ascii_digit())
            || ![minor, major]
                .iter()
                .all(|p| p.bytes().all(|b| b.is_ascii_hexdigit()))
        {
            return Err(invalid());
        }
        let model: u8 = model.parse().map_err(|_| invalid())?;
        let minor = u8::from_str_radix(minor, 16).map_err(|_| invalid())?;
        let major = u8::from_str_radix(major, 16).map_err(|_| invalid())?;
        Ok(Self::new(model, minor, major))
    }
}

impl From<DeviceIdentity> for String {
    fn from(id: DeviceIdentity) -> Self {
        id.to_string()
    }
}

impl TryFrom<String> for DeviceIdentity {
    type Error = ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Bit that marks an SM_Time value as relative to device boot.
pub const SM_TIME_SINCE_BOOT_FLAG: u32 = 0x8000_0000;

/// Timestamp of the last temperature sample on time-sync capable scales.
///
/// Devices that have never been time-synced report seconds since boot with
/// [`SM_TIME_SINCE_BOOT_FLAG`] set; synced devices report Unix seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", rename_all = "snake_case"))]
pub enum SmTime {
    /// Absolute Unix time in seconds.
    Absolute { unix_seconds: u32 },
    /// Seconds since the device booted.
    SinceBoot { seconds: u32 },
}

impl SmTime {
    /// Interpret a raw 32-bit SM_Time word.
    ///
    /// ```
    /// use broodminder_types::SmTime;
    ///
    /// assert_eq!(SmTime::from_raw(1_700_000_000), SmTime::Absolute { unix_seconds: 1_700_000_000 });
    /// assert_eq!(SmTime::from_raw(0x8000_0E10), SmTime::SinceBoot { seconds: 3600 });
    /// ```
    #[must_use]
    pub fn from_raw(raw: u32) -> Self {
        if raw & SM_TIME_SINCE_BOOT_FLAG != 0 {
            SmTime::SinceBoot {
                seconds: raw & !SM_TIME_SINCE_BOOT_FLAG,
            }
        } else {
            SmTime::Absolute { unix_seconds: raw }
        }
    }

    /// The raw 32-bit word, inverse of [`Self::from_raw`].
    #[must_use]
    pub fn to_raw(&self) -> u32 {
        match *self {
            SmTime::Absolute { unix_seconds } => unix_seconds & !SM_TIME_SINCE_BOOT_FLAG,
            SmTime::SinceBoot { seconds } => seconds | SM_TIME_SINCE_BOOT_FLAG,
        }
    }

    /// Whether the device had been time-synced.
    #[must_use]
    pub fn is_absolute(&self) -> bool {
        matches!(self, SmTime::Absolute { .. })
    }

    /// Wall-clock time of the sample, for synced devices only.
    #[must_use]
    pub fn as_datetime(&self) -> Option<time::OffsetDateTime> {
        match *self {
            SmTime::Absolute { unix_seconds } => {
                time::OffsetDateTime::from_unix_timestamp(i64::from(unix_seconds)).ok()
            }
            SmTime::SinceBoot { .. } => None,
        }
    }
}

/// Decoded sensor values from one primary advertisement.
///
/// Every measurement is an `Option`: `None` means the model does not report
/// that value, which is distinct from a measured zero.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SensorReading {
    /// Model number that selected the byte layout.
    pub model_number: u8,
    /// Documented model, `None` for unknown model numbers.
    pub model: Option<DeviceModel>,
    /// Firmware version.
    pub version: FirmwareVersion,
    /// Battery level percentage.
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub battery: Option<u8>,
    /// Sample counter, in minutes.
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub elapsed: Option<u16>,
    /// Temperature in degrees Celsius.
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub temperature_c: Option<f32>,
    /// Temperature in degrees Fahrenheit.
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub temperature_f: Option<f32>,
    /// Relative humidity percentage.
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub humidity: Option<u8>,
    /// Left load cell, pounds. Negative below the zero reference.
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub weight_left: Option<f32>,
    /// Right load cell, pounds.
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub weight_right: Option<f32>,
    /// Second left load cell on four-cell scales, pounds.
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub weight_left2: Option<f32>,
    /// Second right load cell on four-cell scales, pounds.
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub weight_right2: Option<f32>,
    /// Timestamp of the last temperature sample.
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub sm_time: Option<SmTime>,
    /// Temperature sampled at advertisement time, Celsius.
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub realtime_temperature_c: Option<f32>,
    /// Temperature sampled at advertisement time, Fahrenheit.
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub realtime_temperature_f: Option<f32>,
    /// Total weight sampled at advertisement time, pounds.
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub realtime_total_weight: Option<f32>,
    /// Raw swarm-state word; nonzero when the device flags swarm activity.
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub swarm_state: Option<u16>,
    /// Manufacturer payload the reading was decoded from.
    pub raw: Vec<u8>,
}

impl SensorReading {
    /// Estimate total hive weight from the scale readings.
    ///
    /// Uses the realtime total when the model reports one, otherwise the mean
    /// of the available load cells. `scale_factor` accounts for the part of
    /// the hive not resting on the scale (2.0 for a scale under one end).
    #[must_use]
    pub fn estimated_total_weight(&self, scale_factor: f32) -> Option<f32> {
        if let Some(total) = self.realtime_total_weight {
            return Some(total * scale_factor);
        }
        match (self.weight_left, self.weight_right) {
            (Some(l), Some(r)) => Some((l + r) / 2.0 * scale_factor),
            (Some(w), None) | (None, Some(w)) => Some(w * scale_factor),
            (None, None) => None,
        }
    }

    /// Whether the payload was decoded with a known layout.
    #[must_use]
    pub fn is_known_model(&self) -> bool {
        self.model.is_some()
    }
}

impl fmt::Display for SensorReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.model {
            Some(model) => writeln!(f, "Model: {} ({})", model, self.model_number)?,
            None => writeln!(f, "Model: Unknown-{}", self.model_number)?,
        }
        write!(f, "Firmware: v{}", self.version)?;
        if let Some(battery) = self.battery {
            write!(f, "\nBattery: {}%", battery)?;
        }
        if let Some(elapsed) = self.elapsed {
            write!(f, "\nElapsed Time: {} minutes", elapsed)?;
        }
        if let (Some(c), Some(t)) = (self.temperature_c, self.temperature_f) {
            write!(f, "\nTemperature: {:.1}°C / {:.1}°F", c, t)?;
        }
        if let Some(humidity) = self.humidity {
            write!(f, "\nHumidity: {}%", humidity)?;
        }
        if let (Some(l), Some(r)) = (self.weight_left, self.weight_right) {
            write!(f, "\nWeight: left {:.2} lbs, right {:.2} lbs", l, r)?;
        }
        if let (Some(l), Some(r)) = (self.weight_left2, self.weight_right2) {
            write!(f, "\nWeight (pair 2): left {:.2} lbs, right {:.2} lbs", l, r)?;
        }
        if let Some(total) = self.realtime_total_weight {
            write!(f, "\nRealtime Weight: {:.2} lbs", total)?;
        }
        if let Some(t) = self.realtime_temperature_f {
            write!(f, "\nRealtime Temperature: {:.1}°F", t)?;
        }
        if let Some(state) = self.swarm_state {
            write!(f, "\nSwarm State: 0x{:04X}", state)?;
        }
        match self.sm_time {
            Some(SmTime::Absolute { unix_seconds }) => {
                write!(f, "\nSample Time: {} (unix)", unix_seconds)?
            }
            Some(SmTime::SinceBoot { seconds }) => {
                write!(f, "\nSample Time: {}s since boot", seconds)?
            }
            None => {}
        }
        Ok(())
    }
}

/// One BLE broadcast as captured by the scanning stack.
///
/// `data` holds the concatenated AD structures of the advertisement (and scan
/// response, if the platform merges them).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawAdvertisement {
    /// Advertiser address as exposed by the platform.
    pub address: BdAddr,
    /// Advertiser address type.
    pub address_type: AddressType,
    /// Received signal strength in dBm.
    pub rssi: i16,
    /// Raw AD structure bytes.
    pub data: Bytes,
}

impl RawAdvertisement {
    /// Capture an advertisement with a public address.
    pub fn new(address: BdAddr, rssi: i16, data: impl Into<Bytes>) -> Self {
        Self {
            address,
            address_type: AddressType::Public,
            rssi,
            data: data.into(),
        }
    }

    /// Set the address type.
    pub fn with_address_type(mut self, address_type: AddressType) -> Self {
        self.address_type = address_type;
        self
    }
}
