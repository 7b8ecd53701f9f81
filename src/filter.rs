//! Target selection and the per-frame eligibility gate
//!
//! [`classify`] runs the ordered, fail-closed checks a captured frame has to
//! pass before anything looks at its key material. Each failed check is a
//! [`DropReason`]; none of them is an error.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use wlan_capture::{CapturedFrame, DataHeader, HeaderError, MacAddr};

use crate::eapol::{split_llc_snap, EapolError, EapolHeader, EapolKey, EapolPacketType, EAPOL_ETHERTYPE};
use crate::key_info::KeyInformation;
use crate::pmkid::PmkidRejection;
use crate::SnifferError;

/// What a session extracts from the armed network
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureMode {
    /// PMKID from the key data of message 1
    Pmkid,
    /// anonce from message 1, snonce and MIC from message 2
    Mic,
}

impl CaptureMode {
    /// Wire value used by the serial command protocol
    pub fn code(&self) -> u8 {
        match self {
            CaptureMode::Mic => 0,
            CaptureMode::Pmkid => 1,
        }
    }
}

impl TryFrom<u8> for CaptureMode {
    type Error = SnifferError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(CaptureMode::Mic),
            1 => Ok(CaptureMode::Pmkid),
            other => Err(SnifferError::InvalidCaptureMode(other)),
        }
    }
}

impl FromStr for CaptureMode {
    type Err = SnifferError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pmkid" => Ok(CaptureMode::Pmkid),
            "mic" => Ok(CaptureMode::Mic),
            other => match other.parse::<u8>() {
                Ok(code) => CaptureMode::try_from(code),
                Err(_) => Err(SnifferError::Config(format!("Unknown capture mode: {}", s))),
            },
        }
    }
}

impl fmt::Display for CaptureMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureMode::Pmkid => write!(f, "PMKID"),
            CaptureMode::Mic => write!(f, "MIC"),
        }
    }
}

/// The network a session is armed against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetSelector {
    pub bssid: MacAddr,
    pub mode: CaptureMode,
}

impl TargetSelector {
    pub fn new(bssid: MacAddr, mode: CaptureMode) -> Self {
        Self { bssid, mode }
    }
}

/// Why a frame produced no artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// No target armed
    Disarmed,
    /// Session state was busy with a command; frame skipped
    Contended,
    NotData,
    NoPayload,
    Protected,
    /// A length check failed somewhere between the MAC header and key data
    Truncated,
    BssidMismatch,
    /// Not LLC/SNAP, or an EtherType other than 802.1X
    NotEapol,
    /// EAPOL packet type other than Key
    UnsupportedEapolType(u8),
    KeyDataTooLarge,
    /// Neither message 1 nor message 2 of the 4-way handshake
    NotHandshakeMessage,
    /// Message 1 again from the station already recorded
    Retransmission,
    /// Message 2 without a preceding message 1
    NoMessage1,
    /// Message 2 from a station other than the recorded one
    StationMismatch,
    /// A message 2 was already captured this session
    Message2AlreadyCaptured,
    PmkidRejected(PmkidRejection),
}

impl DropReason {
    pub const COUNT: usize = 16;

    /// Stable index for per-reason counters
    pub fn index(&self) -> usize {
        match self {
            DropReason::Disarmed => 0,
            DropReason::Contended => 1,
            DropReason::NotData => 2,
            DropReason::NoPayload => 3,
            DropReason::Protected => 4,
            DropReason::Truncated => 5,
            DropReason::BssidMismatch => 6,
            DropReason::NotEapol => 7,
            DropReason::UnsupportedEapolType(_) => 8,
            DropReason::KeyDataTooLarge => 9,
            DropReason::NotHandshakeMessage => 10,
            DropReason::Retransmission => 11,
            DropReason::NoMessage1 => 12,
            DropReason::StationMismatch => 13,
            DropReason::Message2AlreadyCaptured => 14,
            DropReason::PmkidRejected(_) => 15,
        }
    }

    /// Counter names, in [`DropReason::index`] order
    pub const NAMES: [&'static str; Self::COUNT] = [
        "disarmed",
        "contended",
        "not_data",
        "no_payload",
        "protected",
        "truncated",
        "bssid_mismatch",
        "not_eapol",
        "unsupported_eapol_type",
        "key_data_too_large",
        "not_handshake_message",
        "retransmission",
        "no_message1",
        "station_mismatch",
        "message2_already_captured",
        "pmkid_rejected",
    ];

    pub fn name(&self) -> &'static str {
        Self::NAMES[self.index()]
    }
}

impl From<HeaderError> for DropReason {
    fn from(err: HeaderError) -> Self {
        match err {
            HeaderError::TooShort { .. } => DropReason::Truncated,
            HeaderError::NotData => DropReason::NotData,
            HeaderError::NoPayload { .. } => DropReason::NoPayload,
            HeaderError::Protected => DropReason::Protected,
        }
    }
}

impl From<EapolError> for DropReason {
    fn from(err: EapolError) -> Self {
        match err {
            EapolError::NotSnap => DropReason::NotEapol,
            EapolError::KeyDataTooLarge { .. } => DropReason::KeyDataTooLarge,
            EapolError::TooShort { .. } | EapolError::LengthMismatch { .. } => DropReason::Truncated,
        }
    }
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DropReason::UnsupportedEapolType(t) => write!(f, "unsupported_eapol_type({})", t),
            DropReason::PmkidRejected(why) => write!(f, "pmkid_rejected({:?})", why),
            other => f.write_str(other.name()),
        }
    }
}

/// A frame that passed every gate, with the views later stages need
#[derive(Debug, Clone, Copy)]
pub struct EapolKeyFrame<'a> {
    pub header: DataHeader<'a>,
    pub eapol: EapolHeader,
    pub key: EapolKey<'a>,
    pub info: KeyInformation,
}

/// Run the eligibility gate against an armed target.
///
/// Order: data frame, BSSID, EtherType, EAPOL packet type, then the Key body
/// itself. Every read is bounded by the frame's declared capture length.
pub fn classify<'a>(frame: &'a CapturedFrame, target: &TargetSelector) -> Result<EapolKeyFrame<'a>, DropReason> {
    let header = frame.data_header()?;

    if header.bssid() != Some(target.bssid) {
        return Err(DropReason::BssidMismatch);
    }

    let (ethertype, payload) = split_llc_snap(header.body())?;
    if ethertype != EAPOL_ETHERTYPE {
        return Err(DropReason::NotEapol);
    }

    let (eapol, body) = EapolHeader::parse(payload)?;
    if eapol.packet_type != EapolPacketType::Key {
        return Err(DropReason::UnsupportedEapolType(eapol.packet_type.into()));
    }

    let key = EapolKey::parse(body)?;
    Ok(EapolKeyFrame {
        header,
        eapol,
        info: key.key_information(),
        key,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use wlan_capture::RxMetadata;

    const AP: [u8; 6] = [0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF];
    const STA: [u8; 6] = [0x11, 0x22, 0x33, 0x44, 0x55, 0x66];

    fn eapol_frame(fc1: u8, addr1: [u8; 6], addr2: [u8; 6], packet_type: u8) -> Vec<u8> {
        let mut frame = vec![0x08, fc1, 0x00, 0x00];
        frame.extend_from_slice(&addr1);
        frame.extend_from_slice(&addr2);
        frame.extend_from_slice(&AP);
        frame.extend_from_slice(&[0x00, 0x00]);
        frame.extend_from_slice(&[0xAA, 0xAA, 0x03, 0x00, 0x00, 0x00, 0x88, 0x8E]);

        let mut body = vec![0x02];
        body.extend_from_slice(&0x008Au16.to_be_bytes());
        body.extend_from_slice(&[0u8; 92]);
        frame.extend_from_slice(&[0x02, packet_type]);
        frame.extend_from_slice(&(body.len() as u16).to_be_bytes());
        frame.extend_from_slice(&body);
        frame
    }

    fn captured(raw: Vec<u8>) -> CapturedFrame {
        CapturedFrame::new(Bytes::from(raw), RxMetadata::default())
    }

    fn target() -> TargetSelector {
        TargetSelector::new(MacAddr(AP), CaptureMode::Mic)
    }

    #[test]
    fn test_capture_mode_conversions() {
        assert_eq!(CaptureMode::try_from(0).unwrap(), CaptureMode::Mic);
        assert_eq!(CaptureMode::try_from(1).unwrap(), CaptureMode::Pmkid);
        assert!(matches!(CaptureMode::try_from(2), Err(SnifferError::InvalidCaptureMode(2))));
        assert_eq!("PMKID".parse::<CaptureMode>().unwrap(), CaptureMode::Pmkid);
        assert_eq!("1".parse::<CaptureMode>().unwrap(), CaptureMode::Pmkid);
        assert!("none".parse::<CaptureMode>().is_err());
        assert_eq!(CaptureMode::Pmkid.code(), 1);
    }

    #[test]
    fn test_message1_passes_gate() {
        let frame = captured(eapol_frame(0x02, STA, AP, 3));
        let key_frame = classify(&frame, &target()).unwrap();
        assert!(key_frame.info.is_message1());
        assert_eq!(key_frame.header.receiver(), MacAddr(STA));
        assert_eq!(key_frame.eapol.body_length, 95);
    }

    #[test]
    fn test_other_bssid_dropped() {
        let frame = captured(eapol_frame(0x02, STA, AP, 3));
        let other = TargetSelector::new(MacAddr([0x02; 6]), CaptureMode::Mic);
        assert_eq!(classify(&frame, &other).unwrap_err(), DropReason::BssidMismatch);
    }

    #[test]
    fn test_non_key_eapol_dropped() {
        let frame = captured(eapol_frame(0x02, STA, AP, 0));
        assert_eq!(classify(&frame, &target()).unwrap_err(), DropReason::UnsupportedEapolType(0));
    }

    #[test]
    fn test_other_ethertype_dropped() {
        let mut raw = eapol_frame(0x02, STA, AP, 3);
        raw[30] = 0x08;
        raw[31] = 0x00;
        assert_eq!(classify(&captured(raw), &target()).unwrap_err(), DropReason::NotEapol);
    }

    #[test]
    fn test_management_frame_dropped() {
        let mut raw = eapol_frame(0x02, STA, AP, 3);
        raw[0] = 0x80;
        assert_eq!(classify(&captured(raw), &target()).unwrap_err(), DropReason::NotData);
    }

    #[test]
    fn test_declared_length_beyond_capture_dropped() {
        let mut raw = eapol_frame(0x02, STA, AP, 3);
        raw.truncate(raw.len() - 10);
        assert_eq!(classify(&captured(raw), &target()).unwrap_err(), DropReason::Truncated);

        let raw = eapol_frame(0x02, STA, AP, 3);
        let mut metadata = RxMetadata::default();
        metadata.sig_len = 40;
        let frame = CapturedFrame::new(Bytes::from(raw), metadata);
        assert_eq!(classify(&frame, &target()).unwrap_err(), DropReason::Truncated);
    }

    #[test]
    fn test_drop_reason_names_line_up() {
        assert_eq!(DropReason::Disarmed.name(), "disarmed");
        assert_eq!(DropReason::PmkidRejected(PmkidRejection::ZeroPmkid).name(), "pmkid_rejected");
        assert_eq!(DropReason::UnsupportedEapolType(1).to_string(), "unsupported_eapol_type(1)");
        assert_eq!(DropReason::Message2AlreadyCaptured.index(), DropReason::COUNT - 2);
    }
}
