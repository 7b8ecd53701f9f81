//! IEEE 802.11 data frame views

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{CaptureError, HeaderError};
use crate::phy::RxMetadata;

/// 48-bit IEEE MAC address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct MacAddr(pub [u8; 6]);

impl MacAddr {
    pub const ZERO: MacAddr = MacAddr([0; 6]);
    pub const BROADCAST: MacAddr = MacAddr([0xff; 6]);
}

impl From<[u8; 6]> for MacAddr {
    fn from(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let a = &self.0;
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            a[0], a[1], a[2], a[3], a[4], a[5]
        )
    }
}

impl FromStr for MacAddr {
    type Err = CaptureError;

    /// Accepts `AA:BB:CC:DD:EE:FF`, `AA-BB-CC-DD-EE-FF` and `AABBCCDDEEFF`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex: String = s.chars().filter(|c| *c != ':' && *c != '-').collect();
        if hex.len() != 12 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(CaptureError::InvalidMac(s.to_string()));
        }

        let mut bytes = [0u8; 6];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16)
                .map_err(|_| CaptureError::InvalidMac(s.to_string()))?;
        }
        Ok(Self(bytes))
    }
}

/// IEEE 802.11 frame types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrameKind {
    Management = 0,
    Control = 1,
    Data = 2,
    Extension = 3,
}

/// Frame control field, already converted from its little-endian wire form
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameControl(pub u16);

impl FrameControl {
    pub fn from_bytes(b0: u8, b1: u8) -> Self {
        Self(u16::from_le_bytes([b0, b1]))
    }

    pub fn kind(&self) -> FrameKind {
        match (self.0 >> 2) & 0x3 {
            0 => FrameKind::Management,
            1 => FrameKind::Control,
            2 => FrameKind::Data,
            _ => FrameKind::Extension,
        }
    }

    pub fn subtype(&self) -> u8 {
        ((self.0 >> 4) & 0xF) as u8
    }

    pub fn to_ds(&self) -> bool {
        self.0 & 0x0100 != 0
    }

    pub fn from_ds(&self) -> bool {
        self.0 & 0x0200 != 0
    }

    pub fn protected(&self) -> bool {
        self.0 & 0x4000 != 0
    }

    /// Order bit; on QoS data frames it announces an HT control field
    pub fn order(&self) -> bool {
        self.0 & 0x8000 != 0
    }

    pub fn is_qos(&self) -> bool {
        self.kind() == FrameKind::Data && self.subtype() & 0x8 != 0
    }

    /// Data frame whose subtype carries an MSDU (Null / CF-only subtypes do not)
    pub fn carries_data(&self) -> bool {
        self.kind() == FrameKind::Data && self.subtype() & 0x4 == 0
    }
}

/// Bounds-checked view over an 802.11 data frame header and its body
#[derive(Debug, Clone, Copy)]
pub struct DataHeader<'a> {
    frame_control: FrameControl,
    addr1: MacAddr,
    addr2: MacAddr,
    addr3: MacAddr,
    header_len: usize,
    body: &'a [u8],
}

impl<'a> DataHeader<'a> {
    /// Minimum data frame header: FC, duration, three addresses, sequence control
    pub const BASE_LEN: usize = 24;

    pub fn parse(data: &'a [u8]) -> std::result::Result<Self, HeaderError> {
        if data.len() < 2 {
            return Err(HeaderError::TooShort { need: 2, have: data.len() });
        }

        let frame_control = FrameControl::from_bytes(data[0], data[1]);
        if frame_control.kind() != FrameKind::Data {
            return Err(HeaderError::NotData);
        }
        if !frame_control.carries_data() {
            return Err(HeaderError::NoPayload { subtype: frame_control.subtype() });
        }
        if frame_control.protected() {
            return Err(HeaderError::Protected);
        }

        let header_len = Self::header_length(frame_control);
        if data.len() < header_len {
            return Err(HeaderError::TooShort { need: header_len, have: data.len() });
        }

        let addr = |offset: usize| {
            let mut bytes = [0u8; 6];
            bytes.copy_from_slice(&data[offset..offset + 6]);
            MacAddr(bytes)
        };

        Ok(Self {
            frame_control,
            addr1: addr(4),
            addr2: addr(10),
            addr3: addr(16),
            header_len,
            body: &data[header_len..],
        })
    }

    fn header_length(fc: FrameControl) -> usize {
        let mut len = Self::BASE_LEN;
        if fc.to_ds() && fc.from_ds() {
            len += 6; // address 4
        }
        if fc.is_qos() {
            len += 2;
            if fc.order() {
                len += 4; // HT control
            }
        }
        len
    }

    pub fn frame_control(&self) -> FrameControl {
        self.frame_control
    }

    /// Address 1
    pub fn receiver(&self) -> MacAddr {
        self.addr1
    }

    /// Address 2
    pub fn transmitter(&self) -> MacAddr {
        self.addr2
    }

    /// BSSID according to the ToDS/FromDS bits; `None` for WDS frames
    pub fn bssid(&self) -> Option<MacAddr> {
        match (self.frame_control.to_ds(), self.frame_control.from_ds()) {
            (false, false) => Some(self.addr3),
            (false, true) => Some(self.addr2),
            (true, false) => Some(self.addr1),
            (true, true) => None,
        }
    }

    pub fn header_len(&self) -> usize {
        self.header_len
    }

    pub fn body(&self) -> &'a [u8] {
        self.body
    }
}

/// One captured frame as handed over by a frame source
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    /// Raw 802.11 frame, radiotap already stripped
    pub data: Bytes,
    /// Receive metadata
    pub metadata: RxMetadata,
}

impl CapturedFrame {
    pub fn new(data: Bytes, metadata: RxMetadata) -> Self {
        Self { data, metadata }
    }

    /// Build a frame from a radiotap-prefixed capture
    pub fn from_radiotap(raw: Bytes, metadata: RxMetadata) -> crate::Result<Self> {
        let (header, len) = crate::radiotap::RadiotapHeader::from_bytes(&raw)?;
        let mut end = raw.len();
        if header.has_fcs() {
            end = end.saturating_sub(4).max(len);
        }

        let mut metadata = header.apply_to(metadata);
        metadata.sig_len = metadata.sig_len.min(end - len);
        Ok(Self {
            data: raw.slice(len..end),
            metadata,
        })
    }

    /// Bytes readable for this frame: the capture, bounded by the declared length
    pub fn bytes(&self) -> &[u8] {
        let len = self.data.len().min(self.metadata.sig_len);
        &self.data[..len]
    }

    pub fn frame_control(&self) -> Option<FrameControl> {
        let bytes = self.bytes();
        (bytes.len() >= 2).then(|| FrameControl::from_bytes(bytes[0], bytes[1]))
    }

    pub fn kind(&self) -> Option<FrameKind> {
        self.frame_control().map(|fc| fc.kind())
    }

    pub fn data_header(&self) -> std::result::Result<DataHeader<'_>, HeaderError> {
        DataHeader::parse(self.bytes())
    }
}

impl fmt::Display for CapturedFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "802.11 {:?} frame, len={} (declared {}), channel={}",
            self.kind(),
            self.data.len(),
            self.metadata.sig_len,
            self.metadata.channel
        )
    }
}
