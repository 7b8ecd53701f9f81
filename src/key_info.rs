//! EAPOL-Key "Key Information" field decoding
//!
//! The field is two bytes, big-endian on the wire. Decoding is driven by
//! [`KEY_INFO_LAYOUT`] so the bit positions live in exactly one place.

use serde::{Deserialize, Serialize};

/// Named sub-fields of the Key Information word
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyInfoField {
    Reserved,
    SmkMessage,
    EncryptedKeyData,
    Request,
    Error,
    Secure,
    KeyMic,
    KeyAck,
    Install,
    KeyIndex,
    KeyType,
    KeyDescriptorVersion,
}

/// One entry of the bit layout: field, lowest bit, width in bits
#[derive(Debug, Clone, Copy)]
pub struct BitSpan {
    pub field: KeyInfoField,
    pub shift: u8,
    pub width: u8,
}

impl BitSpan {
    const fn new(field: KeyInfoField, shift: u8, width: u8) -> Self {
        Self { field, shift, width }
    }

    pub const fn extract(&self, raw: u16) -> u8 {
        ((raw >> self.shift) & ((1u16 << self.width) - 1)) as u8
    }
}

/// IEEE 802.11 Key Information layout, most significant field first
pub const KEY_INFO_LAYOUT: [BitSpan; 12] = [
    BitSpan::new(KeyInfoField::Reserved, 14, 2),
    BitSpan::new(KeyInfoField::SmkMessage, 13, 1),
    BitSpan::new(KeyInfoField::EncryptedKeyData, 12, 1),
    BitSpan::new(KeyInfoField::Request, 11, 1),
    BitSpan::new(KeyInfoField::Error, 10, 1),
    BitSpan::new(KeyInfoField::Secure, 9, 1),
    BitSpan::new(KeyInfoField::KeyMic, 8, 1),
    BitSpan::new(KeyInfoField::KeyAck, 7, 1),
    BitSpan::new(KeyInfoField::Install, 6, 1),
    BitSpan::new(KeyInfoField::KeyIndex, 4, 2),
    BitSpan::new(KeyInfoField::KeyType, 3, 1),
    BitSpan::new(KeyInfoField::KeyDescriptorVersion, 0, 3),
];

/// Decoded Key Information
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyInformation {
    pub reserved: u8,
    pub smk_message: u8,
    pub encrypted_key_data: u8,
    pub request: u8,
    pub error: u8,
    pub secure: u8,
    pub key_mic: u8,
    pub key_ack: u8,
    pub install: u8,
    pub key_index: u8,
    /// 1 = pairwise, 0 = group
    pub key_type: u8,
    /// 1 = HMAC-MD5/RC4, 2 = HMAC-SHA1/AES, 3 = AES-CMAC
    pub key_descriptor_version: u8,
}

impl KeyInformation {
    /// Decode a host-order value
    pub fn decode(raw: u16) -> Self {
        let mut info = Self::default();
        for span in KEY_INFO_LAYOUT.iter() {
            let value = span.extract(raw);
            let slot = match span.field {
                KeyInfoField::Reserved => &mut info.reserved,
                KeyInfoField::SmkMessage => &mut info.smk_message,
                KeyInfoField::EncryptedKeyData => &mut info.encrypted_key_data,
                KeyInfoField::Request => &mut info.request,
                KeyInfoField::Error => &mut info.error,
                KeyInfoField::Secure => &mut info.secure,
                KeyInfoField::KeyMic => &mut info.key_mic,
                KeyInfoField::KeyAck => &mut info.key_ack,
                KeyInfoField::Install => &mut info.install,
                KeyInfoField::KeyIndex => &mut info.key_index,
                KeyInfoField::KeyType => &mut info.key_type,
                KeyInfoField::KeyDescriptorVersion => &mut info.key_descriptor_version,
            };
            *slot = value;
        }
        info
    }

    /// Decode the two bytes exactly as they appear on the wire
    pub fn from_wire(bytes: [u8; 2]) -> Self {
        Self::decode(u16::from_be_bytes(bytes))
    }

    pub fn is_pairwise(&self) -> bool {
        self.key_type == 1
    }

    /// Message 1 of the 4-way handshake: pairwise, ACK set, install clear
    pub fn is_message1(&self) -> bool {
        self.is_pairwise() && self.key_ack == 1 && self.install == 0
    }

    /// Message 2 of the 4-way handshake: pairwise, MIC set, secure clear
    pub fn is_message2(&self) -> bool {
        self.is_pairwise() && self.key_mic == 1 && self.secure == 0
    }
}
