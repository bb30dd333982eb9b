//! Utility functions for broodminder-core.

use broodminder_types::{BdAddr, DeviceIdentity};

/// Create a stable key for a device from its address and resolved identity.
///
/// Platforms that withhold the real address report 00:00:00:00:00:00; the
/// identity is used there. Otherwise the address is the key, since it is
/// what the radio actually saw.
pub fn create_identifier(address: &BdAddr, identity: Option<&DeviceIdentity>) -> String {
    match identity {
        Some(id) if address.is_unspecified() => id.to_string(),
        _ => address.to_string(),
    }
}

/// Decode a Complete Local Name value as text.
///
/// Trailing NUL padding is dropped. Returns `None` for non-ASCII data.
pub fn local_name_text(value: &[u8]) -> Option<&str> {
    if !value.is_ascii() {
        return None;
    }
    std::str::from_utf8(value)
        .ok()
        .map(|s| s.trim_end_matches('\0'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_identifier_with_valid_address() {
        let addr: BdAddr = "06:09:16:43:0A:1C".parse().unwrap();
        let id = DeviceIdentity::new(43, 0x0A, 0x1C);
        assert_eq!(create_identifier(&addr, Some(&id)), "06:09:16:43:0A:1C");
        assert_eq!(create_identifier(&addr, None), "06:09:16:43:0A:1C");
    }

    #[test]
    fn test_create_identifier_with_zero_address() {
        let id = DeviceIdentity::new(52, 0x01, 0x2F);
        assert_eq!(create_identifier(&BdAddr::UNSPECIFIED, Some(&id)), "52:01:2F");
        assert_eq!(
            create_identifier(&BdAddr::UNSPECIFIED, None),
            "00:00:00:00:00:00"
        );
    }

    #[test]
    fn test_local_name_text() {
        assert_eq!(local_name_text(b"43:0A:1C"), Some("43:0A:1C"));
        assert_eq!(local_name_text(b"43:0A:1C\0\0"), Some("43:0A:1C"));
        assert_eq!(local_name_text(&[0xC3, 0xA9]), None);
    }
}
