//! Bluetooth advertising constants for BroodMinder devices.

/// IF, LLC (BroodMinder) company identifier in manufacturer-specific data.
pub const MANUFACTURER_ID: u16 = 0x028D;

// --- AD structure types used by BroodMinder advertisements ---

/// Flags AD type.
pub const AD_TYPE_FLAGS: u8 = 0x01;

/// Complete Local Name AD type; carries the `Model:Minor:Major` identity.
pub const AD_TYPE_COMPLETE_LOCAL_NAME: u8 = 0x09;

/// Manufacturer Specific Data AD type.
pub const AD_TYPE_MANUFACTURER_DATA: u8 = 0xFF;

/// Nominal interval at which a hub switches to its next relayed device.
pub const SUBHUB_ROTATION_PERIOD_SECS: u64 = 5;

/// Bias applied to every 16-bit weight field.
pub const WEIGHT_BIAS: i32 = 32767;

/// Offset applied to centi-Celsius temperature fields.
pub const CENTI_CELSIUS_OFFSET: i32 = 5000;
