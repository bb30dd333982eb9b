//! BLE Advertising Data structure parsing.
//!
//! An advertisement is a sequence of length-prefixed records:
//!
//! ```text
//! [length][type][value ...] [length][type][value ...] ...
//! ```
//!
//! `length` counts the type byte plus the value. A zero length (or the end of
//! the buffer) terminates the sequence; legacy 31-byte advertisements are
//! commonly zero-padded after the last record.

use std::iter::FusedIterator;

use tracing::trace;

use crate::error::{Error, Result};

/// One AD structure borrowed from an advertisement buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdStructure<'a> {
    /// AD type code.
    pub ad_type: u8,
    /// Value bytes following the type code.
    pub data: &'a [u8],
}

impl AdStructure<'_> {
    /// The declared record length (type byte plus value).
    pub fn length(&self) -> usize {
        self.data.len() + 1
    }
}

/// Lazy iterator over the AD structures of an advertisement.
///
/// Yields `Err(Error::MalformedAdvertisement)` once, and then stops, if a
/// record's declared length runs past the end of the buffer.
#[derive(Debug, Clone)]
pub struct AdStructures<'a> {
    buf: &'a [u8],
    offset: usize,
    done: bool,
}

impl<'a> Iterator for AdStructures<'a> {
    type Item = Result<AdStructure<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.offset >= self.buf.len() {
            return None;
        }

        let offset = self.offset;
        let declared = usize::from(self.buf[offset]);
        if declared == 0 {
            self.done = true;
            return None;
        }

        let available = self.buf.len() - offset - 1;
        if declared > available {
            self.done = true;
            return Some(Err(Error::malformed(offset, declared, available)));
        }

        let ad_type = self.buf[offset + 1];
        let data = &self.buf[offset + 2..offset + 1 + declared];
        self.offset = offset + 1 + declared;
        trace!(offset, ad_type, len = data.len(), "AD structure");

        Some(Ok(AdStructure { ad_type, data }))
    }
}

impl FusedIterator for AdStructures<'_> {}

/// Iterate over the AD structures in `data`.
pub fn ad_structures(data: &[u8]) -> AdStructures<'_> {
    AdStructures {
        buf: data,
        offset: 0,
        done: false,
    }
}

/// Parse every AD structure in `data`, failing on the first framing error.
pub fn parse_ad_structures(data: &[u8]) -> Result<Vec<AdStructure<'_>>> {
    ad_structures(data).collect()
}

/// Find the first structure of the given type.
pub fn find_ad_structure<'s, 'a>(
    structures: &'s [AdStructure<'a>],
    ad_type: u8,
) -> Option<&'s AdStructure<'a>> {
    structures.iter().find(|s| s.ad_type == ad_type)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_typical_advertisement() {
        let data = [
            0x02, 0x01, 0x06, // flags
            0x05, 0xFF, 0x8D, 0x02, 0x2B, 0x15, // manufacturer data (truncated payload)
            0x04, 0x09, b'4', b'3', b':', // local name
        ];

        let ads = parse_ad_structures(&data).unwrap();
        assert_eq!(ads.len(), 3);
        assert_eq!(ads[0].ad_type, 0x01);
        assert_eq!(ads[0].data, &[0x06]);
        assert_eq!(ads[1].ad_type, 0xFF);
        assert_eq!(ads[1].data, &[0x8D, 0x02, 0x2B, 0x15]);
        assert_eq!(ads[1].length(), 5);
        assert_eq!(ads[2].data, b"43:");
    }

    #[test]
    fn test_zero_length_terminates() {
        let data = [0x02, 0x01, 0x06, 0x00, 0x00, 0x00, 0x03, 0xFF, 0x01];
        let ads = parse_ad_structures(&data).unwrap();
        assert_eq!(ads.len(), 1);
    }

    #[test]
    fn test_empty_input() {
        assert!(parse_ad_structures(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_type_only_record() {
        let ads = parse_ad_structures(&[0x01, 0x09]).unwrap();
        assert_eq!(ads.len(), 1);
        assert_eq!(ads[0].ad_type, 0x09);
        assert!(ads[0].data.is_empty());
    }

    #[test]
    fn test_overlong_record_is_malformed() {
        let data = [0x02, 0x01, 0x06, 0x1E, 0xFF, 0x8D, 0x02];
        let err = parse_ad_structures(&data).unwrap_err();
        assert_eq!(err, Error::malformed(3, 30, 3));
    }

    #[test]
    fn test_iterator_stops_after_error() {
        let data = [0x02, 0x01, 0x06, 0x09, 0xFF];
        let mut iter = ad_structures(&data);
        assert!(iter.next().unwrap().is_ok());
        assert!(iter.next().unwrap().is_err());
        assert!(iter.next().is_none());
        assert!(iter.next().is_none());
    }

    #[test]
    fn test_find_ad_structure() {
        let data = [0x02, 0x01, 0x06, 0x02, 0x09, b'x'];
        let ads = parse_ad_structures(&data).unwrap();
        assert_eq!(find_ad_structure(&ads, 0x09).unwrap().data, b"x");
        assert!(find_ad_structure(&ads, 0xFF).is_none());
    }
}
