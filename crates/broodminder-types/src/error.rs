//! Error types for data parsing in broodminder-types.

use thiserror::Error;

/// Errors that can occur when parsing BroodMinder identifiers and values.
///
/// This error type is platform-agnostic and does not include
/// advertisement framing errors (those belong in broodminder-core).
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ParseError {
    /// Model number outside the documented set.
    #[error("Unknown model number: {0}")]
    UnknownModel(u8),

    /// Identity text is not in `Model:Minor:Major` form.
    #[error("Invalid device identity '{0}': expected Model:Minor:Major")]
    InvalidIdentity(String),

    /// Bluetooth address text is not six colon-separated hex bytes.
    #[error("Invalid Bluetooth address '{0}'")]
    InvalidAddress(String),
}

/// Result type alias using broodminder-types' ParseError type.
pub type ParseResult<T> = std::result::Result<T, ParseError>;
