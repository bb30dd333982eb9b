//! Error types for broodminder-core.
//!
//! Every error here is scoped to a single advertisement: none of them is
//! fatal to the pipeline, and none of them touches rotation-tracker state.
//!
//! | Error | Meaning | Typical handling |
//! |-------|---------|------------------|
//! | [`Error::MalformedAdvertisement`] | AD framing is inconsistent | Drop the advertisement |
//! | [`Error::TruncatedPayload`] | Payload shorter than its layout | Drop, optionally log raw bytes |
//! | [`Error::IdentityUnavailable`] | No Complete Local Name | Fall back to the platform address |
//! | [`Error::InvalidIdentity`] | Local name is not an identity | Fall back to the platform address |
//!
//! Advertisements from other vendors are not errors; the pipeline reports
//! them as a [`Rejection`](crate::vendor::Rejection).

use thiserror::Error;

/// Errors that can occur while decoding BroodMinder advertisements.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum Error {
    /// An AD structure declares more bytes than the advertisement holds.
    #[error(
        "Malformed advertisement: record at offset {offset} declares {declared} bytes, {available} available"
    )]
    MalformedAdvertisement {
        /// Offset of the length byte.
        offset: usize,
        /// Declared record length.
        declared: usize,
        /// Bytes remaining after the length byte.
        available: usize,
    },

    /// Manufacturer payload is shorter than the model's layout requires.
    #[error("Truncated payload for model {model}: expected {expected} bytes, got {actual}")]
    TruncatedPayload {
        /// Model number that selected the layout.
        model: u8,
        /// Bytes required by the layout.
        expected: usize,
        /// Bytes present.
        actual: usize,
    },

    /// The advertisement has no Complete Local Name structure.
    #[error("Device identity unavailable: no Complete Local Name in advertisement")]
    IdentityUnavailable,

    /// The Complete Local Name is not a `Model:Minor:Major` identity.
    #[error("Invalid device identity: {0}")]
    InvalidIdentity(String),

    /// Value-level parse failure.
    #[error(transparent)]
    Parse(#[from] broodminder_types::ParseError),

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Operation was cancelled.
    #[error("Operation cancelled")]
    Cancelled,
}

impl Error {
    /// Create a malformed-advertisement error.
    pub fn malformed(offset: usize, declared: usize, available: usize) -> Self {
        Self::MalformedAdvertisement {
            offset,
            declared,
            available,
        }
    }

    /// Create a truncated-payload error.
    pub fn truncated(model: u8, expected: usize, actual: usize) -> Self {
        Self::TruncatedPayload {
            model,
            expected,
            actual,
        }
    }

    /// Create a configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }
}

/// Result type alias using broodminder-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::malformed(3, 30, 12);
        assert!(err.to_string().contains("offset 3"));
        assert!(err.to_string().contains("declares 30 bytes"));

        let err = Error::truncated(43, 15, 9);
        assert_eq!(
            err.to_string(),
            "Truncated payload for model 43: expected 15 bytes, got 9"
        );

        let err = Error::IdentityUnavailable;
        assert!(err.to_string().contains("Complete Local Name"));

        let err = Error::invalid_config("rotation period is zero");
        assert_eq!(
            err.to_string(),
            "Invalid configuration: rotation period is zero"
        );
    }

    #[test]
    fn test_parse_error_conversion() {
        let parse = broodminder_types::ParseError::UnknownModel(7);
        let err: Error = parse.clone().into();
        assert_eq!(err, Error::Parse(parse));
        assert!(err.to_string().contains("Unknown model number: 7"));
    }
}
