//! Device identity resolution.
//!
//! BroodMinder devices advertise their identity twice: in the last three
//! bytes of the BLE address and as `Model:Minor:Major` text in the Complete
//! Local Name. Some platforms hide the real address from applications, so the
//! local name is the primary source and the address is the fallback.

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use broodminder_types::ble::AD_TYPE_COMPLETE_LOCAL_NAME;
use broodminder_types::{BdAddr, DeviceIdentity};

use crate::ad::{AdStructure, find_ad_structure};
use crate::error::{Error, Result};
use crate::util::local_name_text;

/// Where a resolved identity came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentitySource {
    /// Complete Local Name of the advertisement.
    LocalName,
    /// Last three bytes of the platform-reported address.
    Address,
    /// Mock-identity slots of a hub's payload.
    HubSlot,
}

impl std::fmt::Display for IdentitySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::LocalName => "local name",
            Self::Address => "address",
            Self::HubSlot => "hub slot",
        };
        f.write_str(s)
    }
}

/// Outcome of identity resolution for one advertisement.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResolvedIdentity {
    /// Local name text, when present and ASCII.
    pub local_name: Option<String>,
    /// Resolved identity.
    pub identity: Option<DeviceIdentity>,
    /// Source of `identity`.
    pub source: Option<IdentitySource>,
}

/// Read the Complete Local Name text, if present.
pub fn local_name(structures: &[AdStructure<'_>]) -> Option<String> {
    find_ad_structure(structures, AD_TYPE_COMPLETE_LOCAL_NAME)
        .and_then(|ad| local_name_text(ad.data))
        .map(str::to_string)
}

/// Parse the device identity from the Complete Local Name.
///
/// # Errors
///
/// - [`Error::IdentityUnavailable`] if there is no Complete Local Name.
/// - [`Error::InvalidIdentity`] if the name is not `Model:Minor:Major` text.
pub fn identity_from_local_name(structures: &[AdStructure<'_>]) -> Result<DeviceIdentity> {
    let ad = find_ad_structure(structures, AD_TYPE_COMPLETE_LOCAL_NAME)
        .ok_or(Error::IdentityUnavailable)?;
    let text = local_name_text(ad.data)
        .ok_or_else(|| Error::InvalidIdentity(String::from_utf8_lossy(ad.data).into_owned()))?;
    text.parse()
        .map_err(|_| Error::InvalidIdentity(text.to_string()))
}

/// Resolve the identity of an advertiser.
///
/// The local name wins; otherwise the address is tried, unless the platform
/// reported the unspecified address.
pub fn resolve_identity(structures: &[AdStructure<'_>], address: &BdAddr) -> ResolvedIdentity {
    let local_name = local_name(structures);

    match identity_from_local_name(structures) {
        Ok(identity) => {
            trace!(%identity, "Identity from local name");
            return ResolvedIdentity {
                local_name,
                identity: Some(identity),
                source: Some(IdentitySource::LocalName),
            };
        }
        Err(e) => debug!(%address, error = %e, "No identity in local name"),
    }

    if address.is_unspecified() {
        return ResolvedIdentity {
            local_name,
            ..Default::default()
        };
    }

    match DeviceIdentity::from_address(address) {
        Ok(identity) => ResolvedIdentity {
            local_name,
            identity: Some(identity),
            source: Some(IdentitySource::Address),
        },
        Err(e) => {
            debug!(%address, error = %e, "Address does not encode an identity");
            ResolvedIdentity {
                local_name,
                ..Default::default()
            }
        }
    }
}
