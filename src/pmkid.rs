//! PMKID extraction from message 1 key data
//!
//! An access point that caches PMKSAs advertises the PMKID in a vendor
//! specific KDE inside the key data of message 1:
//!
//! ```text
//! DD <len> 00-0F-AC 04 <16 bytes PMKID>
//! ```

use serde::Serialize;

/// Vendor specific element id used for KDEs
pub const KDE_ELEMENT_ID: u8 = 0xDD;

/// IEEE 802.11 OUI
pub const RSN_OUI: [u8; 3] = [0x00, 0x0F, 0xAC];

/// KDE data type carrying a PMKID
pub const PMKID_KDE_TYPE: u8 = 4;

pub const PMKID_LEN: usize = 16;

/// OUI, data type and PMKID
const PMKID_KDE_BODY_LEN: usize = 4 + PMKID_LEN;

/// Why key data did not yield a PMKID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PmkidRejection {
    Truncated,
    WrongElement(u8),
    WrongOui([u8; 3]),
    WrongKdeType(u8),
    ZeroPmkid,
}

/// Verdict on the key data of one message 1
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PmkidVerdict {
    WellFormed([u8; PMKID_LEN]),
    Rejected(PmkidRejection),
}

impl PmkidVerdict {
    pub fn pmkid(&self) -> Option<[u8; PMKID_LEN]> {
        match self {
            PmkidVerdict::WellFormed(pmkid) => Some(*pmkid),
            PmkidVerdict::Rejected(_) => None,
        }
    }
}

/// Judges whether message 1 key data carries a usable PMKID
pub trait PmkidValidator: Send + Sync {
    fn validate(&self, key_data: &[u8]) -> PmkidVerdict;
}

/// Validator for the standard RSN PMKID KDE
#[derive(Debug, Clone, Copy, Default)]
pub struct RsnPmkidValidator;

impl PmkidValidator for RsnPmkidValidator {
    fn validate(&self, key_data: &[u8]) -> PmkidVerdict {
        match parse_pmkid_kde(key_data) {
            Ok(pmkid) => PmkidVerdict::WellFormed(pmkid),
            Err(why) => PmkidVerdict::Rejected(why),
        }
    }
}

fn parse_pmkid_kde(key_data: &[u8]) -> Result<[u8; PMKID_LEN], PmkidRejection> {
    let (&element, rest) = key_data.split_first().ok_or(PmkidRejection::Truncated)?;
    if element != KDE_ELEMENT_ID {
        return Err(PmkidRejection::WrongElement(element));
    }

    let (&length, rest) = rest.split_first().ok_or(PmkidRejection::Truncated)?;
    let length = length as usize;
    if length < PMKID_KDE_BODY_LEN || rest.len() < length {
        return Err(PmkidRejection::Truncated);
    }

    let oui = [rest[0], rest[1], rest[2]];
    if oui != RSN_OUI {
        return Err(PmkidRejection::WrongOui(oui));
    }
    if rest[3] != PMKID_KDE_TYPE {
        return Err(PmkidRejection::WrongKdeType(rest[3]));
    }

    let mut pmkid = [0u8; PMKID_LEN];
    pmkid.copy_from_slice(&rest[4..4 + PMKID_LEN]);
    if pmkid.iter().all(|b| *b == 0) {
        return Err(PmkidRejection::ZeroPmkid);
    }
    Ok(pmkid)
}
