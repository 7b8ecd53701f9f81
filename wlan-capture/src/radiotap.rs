//! Radiotap header parsing
//!
//! Monitor interfaces prefix every frame with a radiotap header. Only the
//! fields that feed [`RxMetadata`] are decoded; everything after the signal
//! field is skipped by honouring the header's own length.

use bytes::{Buf, BufMut, BytesMut};

use crate::phy::RxMetadata;
use crate::CaptureError;

/// Radiotap header present flags
pub mod present_flags {
    pub const TSFT: u32 = 1 << 0;
    pub const FLAGS: u32 = 1 << 1;
    pub const RATE: u32 = 1 << 2;
    pub const CHANNEL: u32 = 1 << 3;
    pub const FHSS: u32 = 1 << 4;
    pub const DBM_ANTSIGNAL: u32 = 1 << 5;
    pub const EXT: u32 = 1 << 31;
}

/// Bits of the FLAGS field
pub mod flags {
    /// Frame includes FCS at the end
    pub const FCS: u8 = 0x10;
    /// Frame failed FCS check
    pub const BAD_FCS: u8 = 0x40;
}

/// Decoded subset of a radiotap header
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RadiotapHeader {
    pub version: u8,
    pub length: u16,
    pub present: u32,
    pub timestamp: Option<u64>,
    pub flags: Option<u8>,
    pub rate: Option<u8>,
    pub channel_frequency: Option<u16>,
    pub channel_flags: Option<u16>,
    pub antenna_signal: Option<i8>,
}

fn align(offset: usize, to: usize) -> usize {
    (offset + to - 1) & !(to - 1)
}

fn truncated(field: &str) -> CaptureError {
    CaptureError::Radiotap {
        message: format!("Missing {} field", field),
    }
}

impl RadiotapHeader {
    /// Parse a radiotap header, returning it with the number of bytes it spans
    pub fn from_bytes(data: &[u8]) -> Result<(Self, usize), CaptureError> {
        if data.len() < 8 {
            return Err(CaptureError::Radiotap {
                message: "Radiotap header too short".to_string(),
            });
        }

        let mut buf = data;
        let version = buf.get_u8();
        let _pad = buf.get_u8();
        let length = buf.get_u16_le() as usize;
        let present = buf.get_u32_le();

        if version != 0 {
            return Err(CaptureError::Radiotap {
                message: format!("Unsupported radiotap version {}", version),
            });
        }
        if length < 8 || data.len() < length {
            return Err(CaptureError::Radiotap {
                message: "Invalid radiotap header length".to_string(),
            });
        }

        let header_bytes = &data[..length];
        let mut header = Self {
            version,
            length: length as u16,
            present,
            ..Default::default()
        };

        // Skip any extended present bitmaps
        let mut offset = 8;
        let mut word = present;
        while word & present_flags::EXT != 0 {
            let ext = header_bytes
                .get(offset..offset + 4)
                .ok_or_else(|| truncated("extended present"))?;
            word = u32::from_le_bytes([ext[0], ext[1], ext[2], ext[3]]);
            offset += 4;
        }

        let field = |offset: usize, size: usize, name: &str| {
            header_bytes
                .get(offset..offset + size)
                .ok_or_else(|| truncated(name))
        };

        if present & present_flags::TSFT != 0 {
            offset = align(offset, 8);
            let mut b = field(offset, 8, "timestamp")?;
            header.timestamp = Some(b.get_u64_le());
            offset += 8;
        }
        if present & present_flags::FLAGS != 0 {
            header.flags = Some(field(offset, 1, "flags")?[0]);
            offset += 1;
        }
        if present & present_flags::RATE != 0 {
            header.rate = Some(field(offset, 1, "rate")?[0]);
            offset += 1;
        }
        if present & present_flags::CHANNEL != 0 {
            offset = align(offset, 2);
            let mut b = field(offset, 4, "channel")?;
            header.channel_frequency = Some(b.get_u16_le());
            header.channel_flags = Some(b.get_u16_le());
            offset += 4;
        }
        if present & present_flags::FHSS != 0 {
            offset += 2;
        }
        if present & present_flags::DBM_ANTSIGNAL != 0 {
            header.antenna_signal = Some(field(offset, 1, "antenna signal")?[0] as i8);
        }

        Ok((header, length))
    }

    pub fn has_fcs(&self) -> bool {
        self.flags.map_or(false, |f| f & flags::FCS != 0)
    }

    /// Fill receive metadata from the decoded fields
    pub fn apply_to(&self, mut metadata: RxMetadata) -> RxMetadata {
        if let Some(ts) = self.timestamp {
            metadata.timestamp_us = ts;
        }
        if let Some(freq) = self.channel_frequency {
            metadata.frequency = Some(freq);
            if let Some(channel) = frequency_to_channel(freq) {
                metadata.channel = channel;
            }
        }
        if self.antenna_signal.is_some() {
            metadata.signal_dbm = self.antenna_signal;
        }
        metadata
    }

    /// Minimal header carrying channel and signal, used to synthesise captures
    pub fn encode(frequency: u16, signal_dbm: i8) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(16);
        buf.put_u8(0);
        buf.put_u8(0);
        buf.put_u16_le(14);
        buf.put_u32_le(present_flags::CHANNEL | present_flags::DBM_ANTSIGNAL);
        buf.put_u16_le(frequency);
        buf.put_u16_le(0);
        buf.put_i8(signal_dbm);
        buf.put_u8(0);
        buf.to_vec()
    }
}

/// Map a 2.4 GHz / 5 GHz centre frequency to its channel number
pub fn frequency_to_channel(freq: u16) -> Option<u8> {
    match freq {
        2484 => Some(14),
        2412..=2472 => Some(((freq - 2407) / 5) as u8),
        5000..=5895 => Some(((freq - 5000) / 5) as u8),
        _ => None,
    }
}
