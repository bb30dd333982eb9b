//! Manufacturer-specific data filtering.
//!
//! Only advertisements whose Manufacturer Specific Data carries the
//! BroodMinder company identifier reach the payload decoder.

use serde::{Deserialize, Serialize};
use tracing::trace;

use broodminder_types::ble::{AD_TYPE_MANUFACTURER_DATA, MANUFACTURER_ID};

use crate::ad::AdStructure;

/// Why an advertisement was excluded before decoding.
///
/// These are normal filtering outcomes, not errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum Rejection {
    /// No Manufacturer Specific Data structure present.
    NotManufacturerAdvertisement,
    /// Manufacturer data belongs to another company.
    NotThisVendor {
        /// Company identifier found in the first manufacturer record,
        /// `None` if the record was too short to hold one.
        company_id: Option<u16>,
    },
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotManufacturerAdvertisement => write!(f, "no manufacturer data"),
            Self::NotThisVendor {
                company_id: Some(id),
            } => write!(f, "manufacturer 0x{:04X} is not BroodMinder", id),
            Self::NotThisVendor { company_id: None } => {
                write!(f, "manufacturer data too short for a company identifier")
            }
        }
    }
}

/// Read the little-endian company identifier of a manufacturer record.
fn company_id(data: &[u8]) -> Option<u16> {
    match data {
        [lo, hi, ..] => Some(u16::from_le_bytes([*lo, *hi])),
        _ => None,
    }
}

/// Extract the BroodMinder manufacturer payload (bytes after the company ID).
///
/// Every Manufacturer Specific Data structure is considered; the first one
/// carrying company identifier `0x028D` wins.
pub fn manufacturer_payload<'a>(
    structures: &[AdStructure<'a>],
) -> std::result::Result<&'a [u8], Rejection> {
    let mut first_foreign = None;
    let mut seen = false;

    for ad in structures
        .iter()
        .filter(|ad| ad.ad_type == AD_TYPE_MANUFACTURER_DATA)
    {
        let data: &'a [u8] = ad.data;
        let id = company_id(data);
        if id == Some(MANUFACTURER_ID) {
            return Ok(&data[2..]);
        }
        if !seen {
            seen = true;
            first_foreign = id;
        }
    }

    if seen {
        trace!(company_id = ?first_foreign, "Foreign manufacturer data");
        Err(Rejection::NotThisVendor {
            company_id: first_foreign,
        })
    } else {
        Err(Rejection::NotManufacturerAdvertisement)
    }
}
