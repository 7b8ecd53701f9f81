//! EAPOL framing: LLC/SNAP encapsulation, EAPOL header and EAPOL-Key body
//!
//! Every accessor here works on borrowed slices and checks lengths against
//! what the frame declares before touching a field. Nothing allocates.

use serde::{Serialize, Serializer};
use std::fmt;
use std::ops::Deref;
use thiserror::Error;

use crate::key_info::KeyInformation;

/// LLC/SNAP prefix preceding the EtherType in an 802.11 data body
pub const LLC_SNAP_PREFIX: [u8; 6] = [0xAA, 0xAA, 0x03, 0x00, 0x00, 0x00];

/// LLC/SNAP header length including EtherType
pub const LLC_SNAP_LEN: usize = 8;

/// IEEE 802.1X authentication EtherType
pub const EAPOL_ETHERTYPE: u16 = 0x888E;

/// Version, type and body length
pub const EAPOL_HEADER_LEN: usize = 4;

/// Fixed part of an EAPOL-Key body up to and including the key data length
pub const EAPOL_KEY_FIXED_LEN: usize = 95;

/// Upper bound for key data kept in an artifact
pub const KEY_DATA_CAPACITY: usize = 256;

/// Reasons an EAPOL payload could not be viewed
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EapolError {
    #[error("need {need} bytes, have {have}")]
    TooShort { need: usize, have: usize },

    #[error("not an LLC/SNAP encapsulated payload")]
    NotSnap,

    #[error("declared length {declared} exceeds available {available}")]
    LengthMismatch { declared: usize, available: usize },

    #[error("key data of {len} bytes exceeds capacity {capacity}")]
    KeyDataTooLarge { len: usize, capacity: usize },
}

/// EAPOL packet types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EapolPacketType {
    EapPacket,
    Start,
    Logoff,
    Key,
    AsfAlert,
    Unknown(u8),
}

impl From<u8> for EapolPacketType {
    fn from(value: u8) -> Self {
        match value {
            0 => Self::EapPacket,
            1 => Self::Start,
            2 => Self::Logoff,
            3 => Self::Key,
            4 => Self::AsfAlert,
            other => Self::Unknown(other),
        }
    }
}

impl From<EapolPacketType> for u8 {
    fn from(packet_type: EapolPacketType) -> Self {
        match packet_type {
            EapolPacketType::EapPacket => 0,
            EapolPacketType::Start => 1,
            EapolPacketType::Logoff => 2,
            EapolPacketType::Key => 3,
            EapolPacketType::AsfAlert => 4,
            EapolPacketType::Unknown(val) => val,
        }
    }
}

/// Split an 802.11 data body into its EtherType and the payload after LLC/SNAP
pub fn split_llc_snap(body: &[u8]) -> Result<(u16, &[u8]), EapolError> {
    if body.len() < LLC_SNAP_LEN {
        return Err(EapolError::TooShort { need: LLC_SNAP_LEN, have: body.len() });
    }
    if body[..6] != LLC_SNAP_PREFIX {
        return Err(EapolError::NotSnap);
    }
    let ethertype = u16::from_be_bytes([body[6], body[7]]);
    Ok((ethertype, &body[LLC_SNAP_LEN..]))
}

/// EAPOL header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EapolHeader {
    pub version: u8,
    pub packet_type: EapolPacketType,
    pub body_length: u16,
}

impl EapolHeader {
    /// Parse the header and return it with the body it declares.
    ///
    /// Bytes past the declared body (padding, FCS) are cut off; a body longer
    /// than the capture is an error.
    pub fn parse(data: &[u8]) -> Result<(Self, &[u8]), EapolError> {
        if data.len() < EAPOL_HEADER_LEN {
            return Err(EapolError::TooShort { need: EAPOL_HEADER_LEN, have: data.len() });
        }

        let header = Self {
            version: data[0],
            packet_type: EapolPacketType::from(data[1]),
            body_length: u16::from_be_bytes([data[2], data[3]]),
        };

        let available = data.len() - EAPOL_HEADER_LEN;
        let declared = header.body_length as usize;
        if declared > available {
            return Err(EapolError::LengthMismatch { declared, available });
        }

        Ok((header, &data[EAPOL_HEADER_LEN..EAPOL_HEADER_LEN + declared]))
    }
}

/// Borrowed view of an EAPOL-Key body (16-byte MIC layout)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EapolKey<'a> {
    pub descriptor_type: u8,
    pub key_info: [u8; 2],
    pub key_length: u16,
    pub replay_counter: [u8; 8],
    pub nonce: [u8; 32],
    pub key_iv: [u8; 16],
    pub key_rsc: [u8; 8],
    pub key_id: [u8; 8],
    pub mic: [u8; 16],
    pub key_data: &'a [u8],
}

fn array<const N: usize>(body: &[u8], offset: usize) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&body[offset..offset + N]);
    out
}

impl<'a> EapolKey<'a> {
    pub fn parse(body: &'a [u8]) -> Result<Self, EapolError> {
        if body.len() < EAPOL_KEY_FIXED_LEN {
            return Err(EapolError::TooShort { need: EAPOL_KEY_FIXED_LEN, have: body.len() });
        }

        let key_data_len = u16::from_be_bytes([body[93], body[94]]) as usize;
        let available = body.len() - EAPOL_KEY_FIXED_LEN;
        if key_data_len > available {
            return Err(EapolError::LengthMismatch { declared: key_data_len, available });
        }

        Ok(Self {
            descriptor_type: body[0],
            key_info: [body[1], body[2]],
            key_length: u16::from_be_bytes([body[3], body[4]]),
            replay_counter: array(body, 5),
            nonce: array(body, 13),
            key_iv: array(body, 45),
            key_rsc: array(body, 61),
            key_id: array(body, 69),
            mic: array(body, 77),
            key_data: &body[EAPOL_KEY_FIXED_LEN..EAPOL_KEY_FIXED_LEN + key_data_len],
        })
    }

    pub fn key_information(&self) -> KeyInformation {
        KeyInformation::from_wire(self.key_info)
    }

    pub fn replay_counter_value(&self) -> u64 {
        u64::from_be_bytes(self.replay_counter)
    }
}

/// Fixed-capacity copy of key data; oversized input is refused, never truncated
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct KeyData {
    len: usize,
    bytes: [u8; KEY_DATA_CAPACITY],
}

impl KeyData {
    pub fn empty() -> Self {
        Self { len: 0, bytes: [0; KEY_DATA_CAPACITY] }
    }

    /// Copy `data`, refusing anything longer than `limit` (itself capped at capacity)
    pub fn copy_bounded(data: &[u8], limit: usize) -> Result<Self, EapolError> {
        let capacity = limit.min(KEY_DATA_CAPACITY);
        if data.len() > capacity {
            return Err(EapolError::KeyDataTooLarge { len: data.len(), capacity });
        }
        let mut key_data = Self::empty();
        key_data.bytes[..data.len()].copy_from_slice(data);
        key_data.len = data.len();
        Ok(key_data)
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes[..self.len]
    }
}

impl TryFrom<&[u8]> for KeyData {
    type Error = EapolError;

    fn try_from(data: &[u8]) -> Result<Self, Self::Error> {
        Self::copy_bounded(data, KEY_DATA_CAPACITY)
    }
}

impl Deref for KeyData {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl fmt::Debug for KeyData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyData({} bytes)", self.len)
    }
}

impl Serialize for KeyData {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&crate::artifact::hex_upper(self.as_slice()))
    }
}
