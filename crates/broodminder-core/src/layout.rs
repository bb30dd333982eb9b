//! Per-model byte layouts of the BroodMinder manufacturer payload.
//!
//! Offsets are relative to the manufacturer data after the 2-byte company
//! identifier:
//!
//! | Offset | Field | Present on |
//! |--------|-------|------------|
//! | 0 | Model | all |
//! | 1 | Version minor | all |
//! | 2 | Version major | all |
//! | 3 | Realtime temperature, low byte | 47, 49, 56, 57, 58 |
//! | 4 | Battery (%) | all known |
//! | 5-6 | Elapsed (u16 LE) | all known |
//! | 7-8 | Temperature (u16 LE) | all known |
//! | 9 | Realtime temperature, high byte | 47, 49, 56, 57, 58 |
//! | 10-11 | Weight A (u16 LE, bias 32767) | 43, 47, 49, 56, 57, 58 |
//! | 12-13 | Weight B (u16 LE, bias 32767) | 43, 47, 49, 56, 57, 58 |
//! | 14 | Humidity (%) | all known except 41, 47, 49, 52 |
//! | 15-18 | Second weight pair (49) or SM_Time (57, 58) | 49, 57, 58 |
//! | 19-20 | Realtime total weight (49, 57, 58) or swarm state (47, 56) | 47, 49, 56, 57, 58 |
//!
//! On the hub (52), bytes 3, 9 and 20 carry the identity of the device being
//! relayed instead of realtime values.

use bytes::Buf;

use broodminder_types::DeviceModel;
use broodminder_types::ble::{CENTI_CELSIUS_OFFSET, WEIGHT_BIAS};

use crate::error::{Error, Result};

/// A named field of the manufacturer payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Model,
    VersionMinor,
    VersionMajor,
    RealtimeTemperatureLow,
    Battery,
    Elapsed,
    Temperature,
    RealtimeTemperatureHigh,
    WeightA,
    WeightB,
    Humidity,
    SecondaryLow,
    SecondaryHigh,
    SmTime,
    Trailer,
    MockModel,
    MockMinor,
    MockMajor,
}

impl Field {
    /// Byte offset within the payload.
    pub const fn offset(self) -> usize {
        match self {
            Field::Model => 0,
            Field::VersionMinor => 1,
            Field::VersionMajor => 2,
            Field::RealtimeTemperatureLow | Field::MockModel => 3,
            Field::Battery => 4,
            Field::Elapsed => 5,
            Field::Temperature => 7,
            Field::RealtimeTemperatureHigh | Field::MockMinor => 9,
            Field::WeightA => 10,
            Field::WeightB => 12,
            Field::Humidity => 14,
            Field::SecondaryLow | Field::SmTime => 15,
            Field::SecondaryHigh => 17,
            Field::Trailer => 19,
            Field::MockMajor => 20,
        }
    }

    /// Width in bytes.
    pub const fn width(self) -> usize {
        match self {
            Field::Elapsed
            | Field::Temperature
            | Field::WeightA
            | Field::WeightB
            | Field::SecondaryLow
            | Field::SecondaryHigh
            | Field::Trailer => 2,
            Field::SmTime => 4,
            _ => 1,
        }
    }

    /// Exclusive end offset.
    pub const fn end(self) -> usize {
        self.offset() + self.width()
    }
}

/// Temperature conversion family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemperatureFormula {
    /// `raw / 65536 * 165 - 40` (models 41, 42, 43).
    FahrenheitDirect,
    /// `(raw - 5000) / 100` (all later models).
    CentiCelsiusOffset,
}

impl TemperatureFormula {
    /// Convert a raw 16-bit sample to degrees Celsius.
    pub fn celsius(self, raw: u16) -> f32 {
        match self {
            TemperatureFormula::FahrenheitDirect => f32::from(raw) / 65536.0 * 165.0 - 40.0,
            TemperatureFormula::CentiCelsiusOffset => {
                (i32::from(raw) - CENTI_CELSIUS_OFFSET) as f32 / 100.0
            }
        }
    }

    /// Inverse of [`Self::celsius`], saturating at the 16-bit range.
    pub fn raw_from_celsius(self, celsius: f32) -> u16 {
        let raw = match self {
            TemperatureFormula::FahrenheitDirect => ((celsius + 40.0) / 165.0 * 65536.0).round(),
            TemperatureFormula::CentiCelsiusOffset => {
                (celsius * 100.0).round() + CENTI_CELSIUS_OFFSET as f32
            }
        };
        raw.clamp(0.0, f32::from(u16::MAX)) as u16
    }
}

/// Convert Celsius to Fahrenheit.
pub fn celsius_to_fahrenheit(celsius: f32) -> f32 {
    celsius * 9.0 / 5.0 + 32.0
}

/// Convert a biased 16-bit weight field to pounds.
///
/// The subtraction happens in `i32`, so the full `u16` range maps to
/// `-327.67..=327.68` without wrapping.
pub fn scaled_weight(raw: u16) -> f32 {
    (i32::from(raw) - WEIGHT_BIAS) as f32 / 100.0
}

/// Inverse of [`scaled_weight`], saturating at the 16-bit range.
pub fn raw_from_weight(pounds: f32) -> u16 {
    ((pounds * 100.0).round() + WEIGHT_BIAS as f32).clamp(0.0, f32::from(u16::MAX)) as u16
}

/// Which load cell each weight field belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeightOrder {
    /// Weight A is left, weight B is right (model 43 convention).
    LeftRight,
    /// Weight A is right, weight B is left.
    RightLeft,
}

impl WeightOrder {
    /// Map `(a, b)` field values to `(left, right)`.
    pub fn assign<T>(self, a: T, b: T) -> (T, T) {
        match self {
            WeightOrder::LeftRight => (a, b),
            WeightOrder::RightLeft => (b, a),
        }
    }
}

/// Interpretation of bytes 15-18.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecondaryGroup {
    /// A second left/right weight pair.
    WeightPair,
    /// The SM_Time sample timestamp.
    SmTime,
}

/// Interpretation of the trailing bytes 19-20.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrailerGroup {
    /// Realtime total weight (biased like the cell weights).
    TotalWeight,
    /// Raw swarm-state word.
    SwarmState,
}

/// Which field groups a model broadcasts and how to convert them.
///
/// `model == None` is the fallback for unknown model numbers: only the model
/// and version bytes are read, and no derived values are produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelLayout {
    /// The model this layout describes.
    pub model: Option<DeviceModel>,
    /// Temperature formula family.
    pub temperature: Option<TemperatureFormula>,
    /// Primary weight pair mapping.
    pub weights: Option<WeightOrder>,
    /// Bytes 15-18.
    pub secondary: Option<SecondaryGroup>,
    /// Realtime temperature (bytes 3 and 9) plus the trailing group.
    pub realtime: Option<TrailerGroup>,
    /// Humidity byte.
    pub humidity: bool,
    /// Hub mock-identity slots (bytes 3, 9, 20).
    pub mock_identity: bool,
}

const fn known(model: DeviceModel, temperature: TemperatureFormula) -> ModelLayout {
    ModelLayout {
        model: Some(model),
        temperature: Some(temperature),
        weights: None,
        secondary: None,
        realtime: None,
        humidity: false,
        mock_identity: false,
    }
}

use TemperatureFormula::{CentiCelsiusOffset, FahrenheitDirect};

static LAYOUTS: [ModelLayout; 9] = [
    known(DeviceModel::T, FahrenheitDirect),
    ModelLayout {
        humidity: true,
        ..known(DeviceModel::Th, FahrenheitDirect)
    },
    ModelLayout {
        weights: Some(WeightOrder::LeftRight),
        humidity: true,
        ..known(DeviceModel::W, FahrenheitDirect)
    },
    ModelLayout {
        weights: Some(WeightOrder::LeftRight),
        realtime: Some(TrailerGroup::SwarmState),
        ..known(DeviceModel::Tmwc, CentiCelsiusOffset)
    },
    ModelLayout {
        weights: Some(WeightOrder::RightLeft),
        secondary: Some(SecondaryGroup::WeightPair),
        realtime: Some(TrailerGroup::TotalWeight),
        ..known(DeviceModel::Xlr, CentiCelsiusOffset)
    },
    ModelLayout {
        mock_identity: true,
        ..known(DeviceModel::SubHub, CentiCelsiusOffset)
    },
    ModelLayout {
        weights: Some(WeightOrder::LeftRight),
        realtime: Some(TrailerGroup::SwarmState),
        humidity: true,
        ..known(DeviceModel::Ws, CentiCelsiusOffset)
    },
    ModelLayout {
        weights: Some(WeightOrder::RightLeft),
        secondary: Some(SecondaryGroup::SmTime),
        realtime: Some(TrailerGroup::TotalWeight),
        humidity: true,
        ..known(DeviceModel::Wslr, CentiCelsiusOffset)
    },
    ModelLayout {
        weights: Some(WeightOrder::RightLeft),
        secondary: Some(SecondaryGroup::SmTime),
        realtime: Some(TrailerGroup::TotalWeight),
        humidity: true,
        ..known(DeviceModel::Wsxlr, CentiCelsiusOffset)
    },
];

/// Layout for model numbers outside the documented set.
pub static UNKNOWN_LAYOUT: ModelLayout = ModelLayout {
    model: None,
    temperature: None,
    weights: None,
    secondary: None,
    realtime: None,
    humidity: false,
    mock_identity: false,
};

/// Look up the layout for a model number; never fails.
pub fn layout_for(model_number: u8) -> &'static ModelLayout {
    LAYOUTS
        .iter()
        .find(|l| l.model.is_some_and(|m| m.number() == model_number))
        .unwrap_or(&UNKNOWN_LAYOUT)
}

impl ModelLayout {
    /// Whether this is the unknown-model fallback.
    pub fn is_unknown(&self) -> bool {
        self.model.is_none()
    }

    /// Every field this layout reads.
    pub fn fields(&self) -> Vec<Field> {
        let mut fields = vec![Field::Model, Field::VersionMinor, Field::VersionMajor];
        if self.is_unknown() {
            return fields;
        }
        fields.extend([Field::Battery, Field::Elapsed]);
        if self.temperature.is_some() {
            fields.push(Field::Temperature);
        }
        if self.weights.is_some() {
            fields.extend([Field::WeightA, Field::WeightB]);
        }
        if self.humidity {
            fields.push(Field::Humidity);
        }
        match self.secondary {
            Some(SecondaryGroup::WeightPair) => {
                fields.extend([Field::SecondaryLow, Field::SecondaryHigh])
            }
            Some(SecondaryGroup::SmTime) => fields.push(Field::SmTime),
            None => {}
        }
        if self.realtime.is_some() {
            fields.extend([
                Field::RealtimeTemperatureLow,
                Field::RealtimeTemperatureHigh,
                Field::Trailer,
            ]);
        }
        if self.mock_identity {
            fields.extend([Field::MockModel, Field::MockMinor, Field::MockMajor]);
        }
        fields
    }

    /// Minimum payload length this layout needs.
    pub fn required_len(&self) -> usize {
        self.fields().into_iter().map(Field::end).max().unwrap_or(0)
    }

    /// This layout with the realtime group dropped, for readings carried by a
    /// hub whose realtime slots hold the relayed identity instead.
    pub fn without_realtime(&self) -> ModelLayout {
        ModelLayout {
            realtime: None,
            ..*self
        }
    }
}

/// Range-checked field access over a manufacturer payload.
#[derive(Debug, Clone, Copy)]
pub struct Payload<'a> {
    bytes: &'a [u8],
    model: u8,
}

impl<'a> Payload<'a> {
    /// Wrap payload bytes decoded under `model`'s layout.
    pub fn new(bytes: &'a [u8], model: u8) -> Self {
        Self { bytes, model }
    }

    /// Payload length.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    fn slice(&self, field: Field) -> Result<&'a [u8]> {
        self.bytes
            .get(field.offset()..field.end())
            .ok_or_else(|| Error::truncated(self.model, field.end(), self.bytes.len()))
    }

    /// Read a single-byte field.
    pub fn u8(&self, field: Field) -> Result<u8> {
        Ok(self.slice(field)?.get_u8())
    }

    /// Read a little-endian 16-bit field.
    pub fn u16_le(&self, field: Field) -> Result<u16> {
        Ok(self.slice(field)?.get_u16_le())
    }

    /// Read a little-endian 32-bit field.
    pub fn u32_le(&self, field: Field) -> Result<u32> {
        Ok(self.slice(field)?.get_u32_le())
    }
}
