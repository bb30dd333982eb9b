//! Platform-agnostic types for BroodMinder hive sensors.
//!
//! This crate provides the shared data types used by the advertisement
//! decoder in broodminder-core, without any Bluetooth stack dependency.
//!
//! # Features
//!
//! - Device models and identities
//! - Decoded sensor readings
//! - Raw advertisement captures
//! - Advertising constants
//! - Error types for identity parsing
//!
//! # Example
//!
//! ```
//! use broodminder_types::{DeviceIdentity, DeviceModel};
//!
//! let id: DeviceIdentity = "52:01:2F".parse().unwrap();
//! assert_eq!(id.device_model(), Some(DeviceModel::SubHub));
//! ```

pub mod ble;
pub mod error;
pub mod types;

pub use error::{ParseError, ParseResult};
pub use types::{
    AddressType, BdAddr, DeviceIdentity, DeviceModel, FirmwareVersion, RawAdvertisement,
    SM_TIME_SINCE_BOOT_FLAG, SensorReading, SmTime,
};

#[cfg(test)]
mod tests {
    use super::*;

    // --- DeviceModel tests ---

    #[test]
    fn test_model_numbers_round_trip() {
        for model in DeviceModel::ALL {
            assert_eq!(DeviceModel::from_number(model.number()), Some(model));
            assert_eq!(DeviceModel::try_from(model.number()), Ok(model));
        }
    }

    #[test]
    fn test_unknown_model_number() {
        assert_eq!(DeviceModel::from_number(0), None);
        assert_eq!(
            DeviceModel::try_from(44),
            Err(ParseError::UnknownModel(44))
        );
    }

    #[test]
    fn test_model_display_names() {
        assert_eq!(DeviceModel::W.to_string(), "BroodMinder-W");
        assert_eq!(DeviceModel::SubHub.to_string(), "BroodMinder-SubHub");
        assert_eq!(DeviceModel::Wsxlr.to_string(), "BroodMinder-WSXLR");
    }

    #[test]
    fn test_only_subhub_is_hub() {
        let hubs: Vec<_> = DeviceModel::ALL.into_iter().filter(|m| m.is_hub()).collect();
        assert_eq!(hubs, vec![DeviceModel::SubHub]);
    }

    // --- FirmwareVersion tests ---

    #[test]
    fn test_firmware_version_display() {
        assert_eq!(FirmwareVersion::new(2, 21).to_string(), "2.21");
    }

    // --- BdAddr tests ---

    #[test]
    fn test_bdaddr_parse_and_display() {
        let addr: BdAddr = "06:09:16:43:0a:1c".parse().unwrap();
        assert_eq!(addr.0, [0x06, 0x09, 0x16, 0x43, 0x0A, 0x1C]);
        assert_eq!(addr.to_string(), "06:09:16:43:0A:1C");
        assert_eq!(addr.identity_bytes(), [0x43, 0x0A, 0x1C]);
    }

    #[test]
    fn test_bdaddr_rejects_malformed() {
        assert!("06:09:16:43:0a".parse::<BdAddr>().is_err());
        assert!("06:09:16:43:0a:1c:00".parse::<BdAddr>().is_err());
        assert!("06:09:16:43:0a:zz".parse::<BdAddr>().is_err());
        assert!("6:09:16:43:0a:1c".parse::<BdAddr>().is_err());
        assert!("06:09:16:43:0a:+c".parse::<BdAddr>().is_err());
    }

    #[test]
    fn test_bdaddr_unspecified() {
        assert!(BdAddr::UNSPECIFIED.is_unspecified());
        assert!(BdAddr::default().is_unspecified());
        assert!(!BdAddr([0, 0, 0, 0, 0, 1]).is_unspecified());
    }

    // --- DeviceIdentity tests ---

    #[test]
    fn test_identity_from_address() {
        let addr: BdAddr = "06:09:16:52:01:2F".parse().unwrap();
        let id = DeviceIdentity::from_address(&addr).unwrap();
        assert_eq!(id, DeviceIdentity::new(52, 0x01, 0x2F));
        assert!(id.is_hub());
        assert_eq!(id.device_model(), Some(DeviceModel::SubHub));
    }

    #[test]
    fn test_identity_from_randomized_address_fails() {
        let addr: BdAddr = "7A:3B:9C:DA:11:22".parse().unwrap();
        let err = DeviceIdentity::from_address(&addr).unwrap_err();
        assert!(matches!(err, ParseError::InvalidIdentity(_)));
    }

    #[test]
    fn test_identity_bytes_round_trip() {
        let id = DeviceIdentity::new(57, 0xAB, 0x01);
        assert_eq!(id.to_bytes(), [0x57, 0xAB, 0x01]);
        assert_eq!(DeviceIdentity::from_bytes(id.to_bytes()), Ok(id));
    }

    #[test]
    fn test_identity_parse_variants() {
        assert_eq!(
            "43:0a:1c".parse::<DeviceIdentity>(),
            Ok(DeviceIdentity::new(43, 0x0A, 0x1C))
        );
        assert_eq!(
            " 41:1:2 ".parse::<DeviceIdentity>(),
            Ok(DeviceIdentity::new(41, 1, 2))
        );
        assert!("43:0a".parse::<DeviceIdentity>().is_err());
        assert!("43:0a:1c:00".parse::<DeviceIdentity>().is_err());
        assert!("4A:0a:1c".parse::<DeviceIdentity>().is_err());
        assert!("43:100:1c".parse::<DeviceIdentity>().is_err());
        assert!("BroodMinder".parse::<DeviceIdentity>().is_err());
    }

    #[test]
    fn test_identity_parse_rejects_signs() {
        assert!("+5:01:02".parse::<DeviceIdentity>().is_err());
        assert!("43:+1:02".parse::<DeviceIdentity>().is_err());
        assert!("43:01:+2".parse::<DeviceIdentity>().is_err());
        assert!("-4:01:02".parse::<DeviceIdentity>().is_err());
    }

    #[test]
    fn test_identity_display_pads() {
        assert_eq!(DeviceIdentity::new(41, 1, 2).to_string(), "41:01:02");
    }

    // --- SmTime tests ---

    #[test]
    fn test_sm_time_absolute() {
        let t = SmTime::from_raw(1_700_000_000);
        assert!(t.is_absolute());
        let dt = t.as_datetime().unwrap();
        assert_eq!(dt.unix_timestamp(), 1_700_000_000);
        assert_eq!(t.to_raw(), 1_700_000_000);
    }

    #[test]
    fn test_sm_time_since_boot() {
        let t = SmTime::from_raw(SM_TIME_SINCE_BOOT_FLAG | 90);
        assert_eq!(t, SmTime::SinceBoot { seconds: 90 });
        assert!(!t.is_absolute());
        assert!(t.as_datetime().is_none());
        assert_eq!(t.to_raw(), SM_TIME_SINCE_BOOT_FLAG | 90);
    }

    // --- SensorReading tests ---

    #[test]
    fn test_estimated_total_weight_prefers_realtime() {
        let reading = SensorReading {
            weight_left: Some(10.0),
            weight_right: Some(20.0),
            realtime_total_weight: Some(40.0),
            ..Default::default()
        };
        assert_eq!(reading.estimated_total_weight(2.0), Some(80.0));
    }

    #[test]
    fn test_estimated_total_weight_from_cells() {
        let both = SensorReading {
            weight_left: Some(10.0),
            weight_right: Some(20.0),
            ..Default::default()
        };
        assert_eq!(both.estimated_total_weight(2.0), Some(30.0));

        let one = SensorReading {
            weight_right: Some(12.5),
            ..Default::default()
        };
        assert_eq!(one.estimated_total_weight(2.0), Some(25.0));

        assert_eq!(SensorReading::default().estimated_total_weight(2.0), None);
    }

    #[test]
    fn test_reading_display_omits_absent_fields() {
        let reading = SensorReading {
            model_number: 41,
            model: Some(DeviceModel::T),
            version: FirmwareVersion::new(2, 21),
            battery: Some(88),
            temperature_c: Some(20.0),
            temperature_f: Some(68.0),
            ..Default::default()
        };
        let text = reading.to_string();
        assert!(text.contains("BroodMinder-T (41)"));
        assert!(text.contains("Firmware: v2.21"));
        assert!(text.contains("Battery: 88%"));
        assert!(text.contains("20.0°C / 68.0°F"));
        assert!(!text.contains("Humidity"));
        assert!(!text.contains("Weight"));
    }

    #[test]
    fn test_reading_display_unknown_model() {
        let reading = SensorReading {
            model_number: 99,
            ..Default::default()
        };
        assert!(reading.to_string().contains("Unknown-99"));
    }

    // --- Serialization tests ---

    #[cfg(feature = "serde")]
    #[test]
    fn test_reading_serialization_skips_absent_fields() {
        let reading = SensorReading {
            model_number: 42,
            model: Some(DeviceModel::Th),
            humidity: Some(55),
            ..Default::default()
        };
        let json = serde_json::to_value(&reading).unwrap();
        assert_eq!(json["humidity"], 55);
        assert!(json.get("weight_left").is_none());
        assert!(json.get("sm_time").is_none());

        let back: SensorReading = serde_json::from_value(json).unwrap();
        assert_eq!(back, reading);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_identity_serializes_as_string() {
        let id = DeviceIdentity::new(43, 0x0A, 0x1C);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"43:0A:1C\"");
        let back: DeviceIdentity = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_sm_time_serialization_is_tagged() {
        let json = serde_json::to_value(SmTime::SinceBoot { seconds: 5 }).unwrap();
        assert_eq!(json["kind"], "since_boot");
        assert_eq!(json["seconds"], 5);
    }
}
