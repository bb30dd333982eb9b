//! Manufacturer payload decoding.
//!
//! [`decode_payload`] selects the layout from the model byte and converts
//! every field group the layout declares. Groups the layout does not declare
//! stay `None` in the resulting [`SensorReading`].

use tracing::{debug, trace};

use broodminder_types::{FirmwareVersion, SensorReading, SmTime};

use crate::error::{Error, Result};
use crate::layout::{
    Field, ModelLayout, Payload, SecondaryGroup, TrailerGroup, WeightOrder,
    celsius_to_fahrenheit, layout_for, scaled_weight,
};

/// Decode a BroodMinder manufacturer payload (bytes after the company ID).
///
/// # Errors
///
/// Returns [`Error::TruncatedPayload`] if the payload is shorter than the
/// model's layout requires.
///
/// # Example
///
/// ```
/// use broodminder_core::decode_payload;
///
/// let payload = [
///     0x2B, 0x15, 0x02, 0x00, 0x5A, 0x21, 0x00, 0xD0, 0x62, 0x00,
///     0xFF, 0x7F, 0x05, 0x80, 0x37,
/// ];
/// let reading = decode_payload(&payload).unwrap();
/// assert_eq!(reading.version.to_string(), "2.21");
/// assert_eq!(reading.elapsed, Some(33));
/// assert_eq!(reading.weight_left, Some(0.0));
/// ```
pub fn decode_payload(payload: &[u8]) -> Result<SensorReading> {
    let model = *payload
        .first()
        .ok_or_else(|| Error::truncated(0, Field::Model.end(), 0))?;
    decode_with_layout(payload, model, layout_for(model))
}

/// Decode a reading relayed by a hub on behalf of `model`.
///
/// The realtime group is skipped: on a hub those slots carry the relayed
/// device's identity.
///
/// # Errors
///
/// Returns [`Error::TruncatedPayload`] if the payload is too short for the
/// relayed model's layout.
pub fn decode_relayed(payload: &[u8], model: u8) -> Result<SensorReading> {
    decode_with_layout(payload, model, &layout_for(model).without_realtime())
}

/// Decode `payload` with an explicit layout.
///
/// `model_number` is recorded in the reading and in truncation errors.
///
/// # Errors
///
/// Returns [`Error::TruncatedPayload`] if the payload is shorter than
/// `layout.required_len()`.
pub fn decode_with_layout(
    payload: &[u8],
    model_number: u8,
    layout: &ModelLayout,
) -> Result<SensorReading> {
    let required = layout.required_len();
    if payload.len() < required {
        debug!(
            model = model_number,
            expected = required,
            actual = payload.len(),
            "Payload shorter than layout"
        );
        return Err(Error::truncated(model_number, required, payload.len()));
    }

    let p = Payload::new(payload, model_number);
    let mut reading = SensorReading {
        model_number,
        model: layout.model,
        version: FirmwareVersion::new(p.u8(Field::VersionMajor)?, p.u8(Field::VersionMinor)?),
        raw: payload.to_vec(),
        ..Default::default()
    };

    if layout.is_unknown() {
        debug!(model = model_number, "Unknown model, keeping raw bytes only");
        return Ok(reading);
    }

    reading.battery = Some(p.u8(Field::Battery)?);
    reading.elapsed = Some(p.u16_le(Field::Elapsed)?);

    if let Some(formula) = layout.temperature {
        let celsius = formula.celsius(p.u16_le(Field::Temperature)?);
        reading.temperature_c = Some(celsius);
        reading.temperature_f = Some(celsius_to_fahrenheit(celsius));
    }

    if layout.humidity {
        reading.humidity = Some(p.u8(Field::Humidity)?);
    }

    if let Some(order) = layout.weights {
        let (left, right) = order.assign(
            scaled_weight(p.u16_le(Field::WeightA)?),
            scaled_weight(p.u16_le(Field::WeightB)?),
        );
        reading.weight_left = Some(left);
        reading.weight_right = Some(right);
        trace!(left, right, "Weight pair");
    }

    match layout.secondary {
        Some(SecondaryGroup::WeightPair) => {
            let order = layout.weights.unwrap_or(WeightOrder::LeftRight);
            let (left, right) = order.assign(
                scaled_weight(p.u16_le(Field::SecondaryLow)?),
                scaled_weight(p.u16_le(Field::SecondaryHigh)?),
            );
            reading.weight_left2 = Some(left);
            reading.weight_right2 = Some(right);
        }
        Some(SecondaryGroup::SmTime) => {
            let sm_time = SmTime::from_raw(p.u32_le(Field::SmTime)?);
            trace!(?sm_time, "SM_Time");
            reading.sm_time = Some(sm_time);
        }
        None => {}
    }

    if let Some(trailer) = layout.realtime {
        let raw = u16::from_le_bytes([
            p.u8(Field::RealtimeTemperatureLow)?,
            p.u8(Field::RealtimeTemperatureHigh)?,
        ]);
        if let Some(formula) = layout.temperature {
            let celsius = formula.celsius(raw);
            reading.realtime_temperature_c = Some(celsius);
            reading.realtime_temperature_f = Some(celsius_to_fahrenheit(celsius));
        }
        match trailer {
            TrailerGroup::TotalWeight => {
                reading.realtime_total_weight = Some(scaled_weight(p.u16_le(Field::Trailer)?));
            }
            TrailerGroup::SwarmState => {
                reading.swarm_state = Some(p.u16_le(Field::Trailer)?);
            }
        }
    }

    Ok(reading)
}

#[cfg(test)]
mod tests {
    use super::*;
    use broodminder_types::DeviceModel;

    /// Model 43, version 2.21, elapsed 33, temperature 0x62D0,
    /// weights 0x7FFF / 0x8005, humidity 55%.
    const MODEL_43: [u8; 15] = [
        0x2B, 0x15, 0x02, 0x00, 0x5A, 0x21, 0x00, 0xD0, 0x62, 0x00, 0xFF, 0x7F, 0x05, 0x80, 0x37,
    ];

    fn with_model(model: u8) -> [u8; 21] {
        let mut payload = [0u8; 21];
        payload[0] = model;
        payload[1] = 3;
        payload[2] = 1;
        payload[4] = 77;
        payload
    }

    #[test]
    fn test_decode_model_43() {
        let reading = decode_payload(&MODEL_43).unwrap();

        assert_eq!(reading.model, Some(DeviceModel::W));
        assert_eq!(reading.version, FirmwareVersion::new(2, 21));
        assert_eq!(reading.battery, Some(90));
        assert_eq!(reading.elapsed, Some(33));
        assert_eq!(reading.humidity, Some(55));

        let expected_c = 25296.0f32 / 65536.0 * 165.0 - 40.0;
        assert_eq!(reading.temperature_c, Some(expected_c));
        assert_eq!(reading.temperature_f, Some(expected_c * 9.0 / 5.0 + 32.0));

        assert_eq!(reading.weight_left, Some(0.0));
        assert_eq!(reading.weight_right, Some(6.0 / 100.0));

        assert_eq!(reading.weight_left2, None);
        assert_eq!(reading.sm_time, None);
        assert_eq!(reading.realtime_temperature_c, None);
        assert_eq!(reading.realtime_total_weight, None);
        assert_eq!(reading.swarm_state, None);
        assert_eq!(reading.raw, MODEL_43.to_vec());
    }

    #[test]
    fn test_decode_is_idempotent() {
        let a = decode_payload(&MODEL_43).unwrap();
        let b = decode_payload(&MODEL_43).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_truncated_payload() {
        let err = decode_payload(&MODEL_43[..12]).unwrap_err();
        assert_eq!(err, Error::truncated(43, 15, 12));
    }

    #[test]
    fn test_empty_payload() {
        assert_eq!(decode_payload(&[]).unwrap_err(), Error::truncated(0, 1, 0));
    }

    #[test]
    fn test_unknown_model_keeps_raw_only() {
        let payload = [0x63, 0x01, 0x02, 0xAA, 0xBB];
        let reading = decode_payload(&payload).unwrap();
        assert_eq!(reading.model_number, 0x63);
        assert_eq!(reading.model, None);
        assert!(!reading.is_known_model());
        assert_eq!(reading.version, FirmwareVersion::new(2, 1));
        assert_eq!(reading.battery, None);
        assert_eq!(reading.temperature_f, None);
        assert_eq!(reading.raw, payload.to_vec());
    }

    #[test]
    fn test_unknown_model_too_short() {
        assert_eq!(
            decode_payload(&[0x63, 0x01]).unwrap_err(),
            Error::truncated(0x63, 3, 2)
        );
    }

    #[test]
    fn test_model_41_has_temperature_only() {
        let mut payload = with_model(41);
        payload[7..9].copy_from_slice(&0x8000u16.to_le_bytes());
        let reading = decode_payload(&payload[..9]).unwrap();
        assert_eq!(reading.temperature_c, Some(42.5));
        assert_eq!(reading.humidity, None);
        assert_eq!(reading.weight_left, None);
    }

    #[test]
    fn test_centi_celsius_family() {
        let mut payload = with_model(56);
        payload[7..9].copy_from_slice(&7250u16.to_le_bytes());
        let reading = decode_payload(&payload).unwrap();
        assert_eq!(reading.temperature_c, Some(22.5));
        assert_eq!(reading.temperature_f, Some(72.5));
    }

    #[test]
    fn test_swapped_weights_and_second_pair() {
        let mut payload = with_model(49);
        payload[10..12].copy_from_slice(&(32767u16 + 1000).to_le_bytes()); // right
        payload[12..14].copy_from_slice(&(32767u16 - 500).to_le_bytes()); // left
        payload[15..17].copy_from_slice(&(32767u16 + 200).to_le_bytes()); // right2
        payload[17..19].copy_from_slice(&(32767u16 + 300).to_le_bytes()); // left2
        payload[19..21].copy_from_slice(&(32767u16 + 4000).to_le_bytes());

        let reading = decode_payload(&payload).unwrap();
        assert_eq!(reading.weight_left, Some(-5.0));
        assert_eq!(reading.weight_right, Some(10.0));
        assert_eq!(reading.weight_left2, Some(3.0));
        assert_eq!(reading.weight_right2, Some(2.0));
        assert_eq!(reading.realtime_total_weight, Some(40.0));
        assert_eq!(reading.humidity, None);
        assert_eq!(reading.sm_time, None);
    }

    #[test]
    fn test_sm_time_both_interpretations() {
        let mut payload = with_model(57);
        payload[15..19].copy_from_slice(&1_700_000_000u32.to_le_bytes());
        let reading = decode_payload(&payload).unwrap();
        assert_eq!(
            reading.sm_time,
            Some(SmTime::Absolute {
                unix_seconds: 1_700_000_000
            })
        );

        payload[15..19].copy_from_slice(&0x8000_0E10u32.to_le_bytes());
        let reading = decode_payload(&payload).unwrap();
        assert_eq!(reading.sm_time, Some(SmTime::SinceBoot { seconds: 3600 }));
        assert_eq!(reading.weight_left2, None);
    }

    #[test]
    fn test_realtime_temperature_bytes() {
        let mut payload = with_model(58);
        let raw = 7250u16.to_le_bytes();
        payload[3] = raw[0];
        payload[9] = raw[1];
        let reading = decode_payload(&payload).unwrap();
        assert_eq!(reading.realtime_temperature_c, Some(22.5));
        assert_eq!(reading.realtime_temperature_f, Some(72.5));
    }

    #[test]
    fn test_swarm_state_models() {
        for model in [47, 56] {
            let mut payload = with_model(model);
            payload[19..21].copy_from_slice(&0x0102u16.to_le_bytes());
            let reading = decode_payload(&payload).unwrap();
            assert_eq!(reading.swarm_state, Some(0x0102));
            assert_eq!(reading.realtime_total_weight, None);
        }
    }

    #[test]
    fn test_humidity_absent_not_zero() {
        for model in [41u8, 47, 49, 52] {
            let reading = decode_payload(&with_model(model)).unwrap();
            assert_eq!(reading.humidity, None, "model {}", model);
        }
        for model in [42u8, 43, 56, 57, 58] {
            let reading = decode_payload(&with_model(model)).unwrap();
            assert_eq!(reading.humidity, Some(0), "model {}", model);
        }
    }

    #[test]
    fn test_relayed_skips_realtime_group() {
        let mut payload = with_model(57);
        payload[3] = 0x57;
        payload[9] = 0x12;
        payload[20] = 0x34;
        let reading = decode_relayed(&payload, 57).unwrap();
        assert_eq!(reading.model, Some(DeviceModel::Wslr));
        assert_eq!(reading.realtime_temperature_c, None);
        assert_eq!(reading.realtime_total_weight, None);
        assert!(reading.sm_time.is_some());
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Decoding arbitrary bytes should never panic.
        #[test]
        fn decode_never_panics(data: Vec<u8>) {
            let _ = decode_payload(&data);
        }

        /// Decoding is deterministic.
        #[test]
        fn decode_is_deterministic(data in prop::collection::vec(any::<u8>(), 0..32)) {
            prop_assert_eq!(decode_payload(&data), decode_payload(&data));
        }

        /// Weight sign follows the bias across the full 16-bit range.
        #[test]
        fn weight_sign_follows_bias(raw: u16) {
            let mut payload = [0u8; 15];
            payload[0] = 43;
            payload[10..12].copy_from_slice(&raw.to_le_bytes());
            let left = decode_payload(&payload).unwrap().weight_left.unwrap();
            let expected = (i32::from(raw) - 32767) as f32 / 100.0;
            prop_assert_eq!(left, expected);
            prop_assert_eq!(left < 0.0, raw < 32767);
            prop_assert_eq!(left > 0.0, raw > 32767);
        }

        /// Fahrenheit follows the model's formula family.
        #[test]
        fn temperature_formula_family(raw: u16, model in prop::sample::select(vec![41u8, 42, 43, 47, 49, 52, 56, 57, 58])) {
            let mut payload = [0u8; 21];
            payload[0] = model;
            payload[7..9].copy_from_slice(&raw.to_le_bytes());
            let f = decode_payload(&payload).unwrap().temperature_f.unwrap();
            let expected = if matches!(model, 41..=43) {
                (f64::from(raw) / 65536.0 * 165.0 - 40.0) * 9.0 / 5.0 + 32.0
            } else {
                (f64::from(raw) - 5000.0) / 100.0 * 9.0 / 5.0 + 32.0
            };
            prop_assert!((f64::from(f) - expected).abs() < 1e-2);
        }
    }
}
