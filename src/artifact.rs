//! Recovered key material and where it goes
//!
//! Records are plain values, moved into an [`ArtifactEmitter`] once the
//! session lock has been released. Rendering (serial lines, JSON, hashcat
//! 22000) happens on the consumer side.

use serde::{Serialize, Serializer};
use std::fmt;
use std::io::Write;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use log::warn;
use tokio::sync::mpsc;
use wlan_capture::MacAddr;

use crate::eapol::KeyData;
use crate::pmkid::PMKID_LEN;
use crate::{Result, SnifferError};

/// Uppercase hex without separators, as used on the serial line
pub fn hex_upper(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02X}", b)).collect()
}

/// Lowercase hex without separators, as used by hashcat
pub fn hex_lower(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

fn serialize_hex<S: Serializer, T: AsRef<[u8]>>(bytes: &T, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(&hex_upper(bytes.as_ref()))
}

fn serialize_mac<S: Serializer>(mac: &MacAddr, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.collect_str(mac)
}

/// PMKID advertised by the access point in message 1
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PmkidRecord {
    #[serde(serialize_with = "serialize_mac")]
    pub bssid: MacAddr,
    #[serde(serialize_with = "serialize_mac")]
    pub station: MacAddr,
    #[serde(serialize_with = "serialize_hex")]
    pub pmkid: [u8; PMKID_LEN],
}

impl PmkidRecord {
    /// `WPA*01*` line for hashcat mode 22000
    pub fn to_hashcat_22000(&self, essid: &[u8]) -> String {
        format!(
            "WPA*01*{}*{}*{}*{}***",
            hex_lower(&self.pmkid),
            hex_lower(&self.bssid.0),
            hex_lower(&self.station.0),
            hex_lower(essid)
        )
    }
}

/// anonce sent by the access point in message 1
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Message1Record {
    #[serde(serialize_with = "serialize_mac")]
    pub bssid: MacAddr,
    #[serde(serialize_with = "serialize_mac")]
    pub station: MacAddr,
    #[serde(serialize_with = "serialize_hex")]
    pub anonce: [u8; 32],
}

/// Message 2 as sent by the station, with every EAPOL-Key header field kept
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Message2Record {
    #[serde(serialize_with = "serialize_mac")]
    pub bssid: MacAddr,
    #[serde(serialize_with = "serialize_mac")]
    pub station: MacAddr,
    pub eapol_version: u8,
    pub eapol_type: u8,
    pub eapol_length: u16,
    pub descriptor_type: u8,
    #[serde(serialize_with = "serialize_hex")]
    pub key_info: [u8; 2],
    pub key_length: u16,
    #[serde(serialize_with = "serialize_hex")]
    pub replay_counter: [u8; 8],
    #[serde(serialize_with = "serialize_hex")]
    pub snonce: [u8; 32],
    #[serde(serialize_with = "serialize_hex")]
    pub key_iv: [u8; 16],
    #[serde(serialize_with = "serialize_hex")]
    pub key_rsc: [u8; 8],
    #[serde(serialize_with = "serialize_hex")]
    pub key_id: [u8; 8],
    #[serde(serialize_with = "serialize_hex")]
    pub mic: [u8; 16],
    pub key_data: KeyData,
}

impl Message2Record {
    /// The EAPOL frame with its MIC field zeroed: the input a MIC is computed over
    pub fn mic_input(&self) -> Vec<u8> {
        let mut frame = Vec::with_capacity(99 + self.key_data.len());
        frame.push(self.eapol_version);
        frame.push(self.eapol_type);
        frame.extend_from_slice(&self.eapol_length.to_be_bytes());
        frame.push(self.descriptor_type);
        frame.extend_from_slice(&self.key_info);
        frame.extend_from_slice(&self.key_length.to_be_bytes());
        frame.extend_from_slice(&self.replay_counter);
        frame.extend_from_slice(&self.snonce);
        frame.extend_from_slice(&self.key_iv);
        frame.extend_from_slice(&self.key_rsc);
        frame.extend_from_slice(&self.key_id);
        frame.extend_from_slice(&[0u8; 16]);
        frame.extend_from_slice(&(self.key_data.len() as u16).to_be_bytes());
        frame.extend_from_slice(&self.key_data);
        frame
    }

    /// `WPA*02*` line for hashcat mode 22000, paired with the message 1 it answers.
    ///
    /// Returns `None` when `message1` belongs to another network or station.
    pub fn to_hashcat_22000(&self, message1: &Message1Record, essid: &[u8]) -> Option<String> {
        if message1.bssid != self.bssid || message1.station != self.station {
            return None;
        }
        Some(format!(
            "WPA*02*{}*{}*{}*{}*{}*{}*00",
            hex_lower(&self.mic),
            hex_lower(&self.bssid.0),
            hex_lower(&self.station.0),
            hex_lower(essid),
            hex_lower(&message1.anonce),
            hex_lower(&self.mic_input())
        ))
    }
}

/// Kinds of artifact, for counting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ArtifactKind {
    Pmkid,
    Message1,
    Message2,
}

/// One piece of recovered key material
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind")]
pub enum Artifact {
    Pmkid(PmkidRecord),
    Message1(Message1Record),
    Message2(Message2Record),
}

impl Artifact {
    pub fn kind(&self) -> ArtifactKind {
        match self {
            Artifact::Pmkid(_) => ArtifactKind::Pmkid,
            Artifact::Message1(_) => ArtifactKind::Message1,
            Artifact::Message2(_) => ArtifactKind::Message2,
        }
    }

    pub fn bssid(&self) -> MacAddr {
        match self {
            Artifact::Pmkid(r) => r.bssid,
            Artifact::Message1(r) => r.bssid,
            Artifact::Message2(r) => r.bssid,
        }
    }

    pub fn station(&self) -> MacAddr {
        match self {
            Artifact::Pmkid(r) => r.station,
            Artifact::Message1(r) => r.station,
            Artifact::Message2(r) => r.station,
        }
    }

    /// Serial protocol line, see [`fmt::Display`]
    pub fn to_serial_line(&self) -> String {
        self.to_string()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Serial protocol rendering: `{TAG,EVENT,fields...,}` in uppercase hex
impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Artifact::Pmkid(r) => write!(
                f,
                "{{PMKID,MSG_1,{},{},{},}}",
                hex_upper(&r.bssid.0),
                hex_upper(&r.station.0),
                hex_upper(&r.pmkid)
            ),
            Artifact::Message1(r) => write!(
                f,
                "{{MIC,MSG_1,{},{},{},}}",
                hex_upper(&r.bssid.0),
                hex_upper(&r.station.0),
                hex_upper(&r.anonce)
            ),
            Artifact::Message2(r) => write!(
                f,
                "{{MIC,MSG_2,{},{},{:02X},{:02X},{:04X},{:02X},{},{:04X},{},{},{},{},{},{},{:04X},{},}}",
                hex_upper(&r.station.0),
                hex_upper(&r.bssid.0),
                r.eapol_version,
                r.eapol_type,
                r.eapol_length,
                r.descriptor_type,
                hex_upper(&r.key_info),
                r.key_length,
                hex_upper(&r.replay_counter),
                hex_upper(&r.snonce),
                hex_upper(&r.key_iv),
                hex_upper(&r.key_rsc),
                hex_upper(&r.key_id),
                hex_upper(&r.mic),
                r.key_data.len(),
                hex_upper(&r.key_data)
            ),
        }
    }
}

/// How artifacts are rendered for output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Serial,
    Json,
    Hashcat,
}

impl FromStr for OutputFormat {
    type Err = SnifferError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "serial" => Ok(OutputFormat::Serial),
            "json" => Ok(OutputFormat::Json),
            "hashcat" | "22000" => Ok(OutputFormat::Hashcat),
            _ => Err(SnifferError::Config(format!("Unknown output format: {}", s))),
        }
    }
}

/// Receives artifacts from the frame path. Implementations must not block.
pub trait ArtifactEmitter: Send + Sync {
    /// Returns false when the artifact was lost
    fn emit(&self, artifact: Artifact) -> bool;
}

/// Hands artifacts to an async consumer over a bounded channel.
///
/// When the consumer falls behind the artifact is dropped and counted.
#[derive(Debug)]
pub struct ChannelEmitter {
    tx: mpsc::Sender<Artifact>,
    overflow: AtomicU64,
}

impl ChannelEmitter {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<Artifact>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (
            Self {
                tx,
                overflow: AtomicU64::new(0),
            },
            rx,
        )
    }

    /// Artifacts lost to a full or closed channel
    pub fn overflow(&self) -> u64 {
        self.overflow.load(Ordering::Relaxed)
    }
}

impl ArtifactEmitter for ChannelEmitter {
    fn emit(&self, artifact: Artifact) -> bool {
        match self.tx.try_send(artifact) {
            Ok(()) => true,
            Err(e) => {
                self.overflow.fetch_add(1, Ordering::Relaxed);
                warn!("Artifact dropped: {}", e);
                false
            }
        }
    }
}

/// Writes serial lines to any writer
pub struct WriterEmitter<W: Write + Send> {
    writer: Mutex<W>,
}

impl<W: Write + Send> WriterEmitter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<W: Write + Send> ArtifactEmitter for WriterEmitter<W> {
    fn emit(&self, artifact: Artifact) -> bool {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        match writeln!(writer, "{}", artifact).and_then(|_| writer.flush()) {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to write artifact: {}", e);
                false
            }
        }
    }
}

/// Keeps every artifact in memory
#[derive(Debug, Default)]
pub struct CollectingEmitter {
    artifacts: Mutex<Vec<Artifact>>,
}

impl CollectingEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn artifacts(&self) -> Vec<Artifact> {
        self.artifacts.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn take(&self) -> Vec<Artifact> {
        std::mem::take(&mut *self.artifacts.lock().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn len(&self) -> usize {
        self.artifacts.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ArtifactEmitter for CollectingEmitter {
    fn emit(&self, artifact: Artifact) -> bool {
        self.artifacts.lock().unwrap_or_else(PoisonError::into_inner).push(artifact);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const AP: MacAddr = MacAddr([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);
    const STA: MacAddr = MacAddr([0x11, 0x22, 0x33, 0x44, 0x55, 0x66]);

    fn message2() -> Message2Record {
        Message2Record {
            bssid: AP,
            station: STA,
            eapol_version: 1,
            eapol_type: 3,
            eapol_length: 117,
            descriptor_type: 2,
            key_info: [0x01, 0x0A],
            key_length: 0,
            replay_counter: [0, 0, 0, 0, 0, 0, 0, 1],
            snonce: [0x5E; 32],
            key_iv: [0; 16],
            key_rsc: [0; 8],
            key_id: [0; 8],
            mic: [0x3C; 16],
            key_data: KeyData::try_from(&[0x30, 0x14][..]).unwrap(),
        }
    }

    #[test]
    fn test_pmkid_serial_line() {
        let artifact = Artifact::Pmkid(PmkidRecord {
            bssid: AP,
            station: STA,
            pmkid: [0xAB; 16],
        });
        assert_eq!(
            artifact.to_serial_line(),
            format!("{{PMKID,MSG_1,AABBCCDDEEFF,112233445566,{},}}", "AB".repeat(16))
        );
    }

    #[test]
    fn test_message2_serial_line_fields() {
        let line = Artifact::Message2(message2()).to_serial_line();
        let fields: Vec<&str> = line.trim_matches(|c| c == '{' || c == '}').split(',').collect();

        assert_eq!(fields[0], "MIC");
        assert_eq!(fields[1], "MSG_2");
        assert_eq!(fields[2], "112233445566");
        assert_eq!(fields[3], "AABBCCDDEEFF");
        assert_eq!(fields[4], "01");
        assert_eq!(fields[6], "0075");
        assert_eq!(fields[8], "010A");
        assert_eq!(fields[10], "0000000000000001");
        assert_eq!(fields[15], "3C".repeat(16));
        assert_eq!(fields[16], "0002");
        assert_eq!(fields[17], "3014");
    }

    #[test]
    fn test_mic_input_zeroes_mic() {
        let record = message2();
        let frame = record.mic_input();
        assert_eq!(frame.len(), 99 + 2);
        assert_eq!(&frame[..4], &[0x01, 0x03, 0x00, 0x75]);
        assert_eq!(&frame[17..49], &[0x5E; 32]);
        assert!(frame[81..97].iter().all(|b| *b == 0));
        assert_eq!(&frame[97..], &[0x00, 0x02, 0x30, 0x14]);
    }

    #[test]
    fn test_hashcat_lines() {
        let pmkid = PmkidRecord {
            bssid: AP,
            station: STA,
            pmkid: [0x01; 16],
        };
        assert_eq!(
            pmkid.to_hashcat_22000(b"lab"),
            format!("WPA*01*{}*aabbccddeeff*112233445566*6c6162***", "01".repeat(16))
        );

        let m1 = Message1Record {
            bssid: AP,
            station: STA,
            anonce: [0x0A; 32],
        };
        let line = message2().to_hashcat_22000(&m1, b"lab").unwrap();
        assert!(line.starts_with(&format!("WPA*02*{}*aabbccddeeff*112233445566*6c6162*", "3c".repeat(16))));
        assert!(line.ends_with("*00"));

        let other = Message1Record { station: MacAddr([0x02; 6]), ..m1 };
        assert!(message2().to_hashcat_22000(&other, b"lab").is_none());
    }

    #[test]
    fn test_json_uses_hex_strings() {
        let json = Artifact::Message1(Message1Record {
            bssid: AP,
            station: STA,
            anonce: [0xFF; 32],
        })
        .to_json()
        .unwrap();
        assert!(json.contains("\"kind\":\"Message1\""));
        assert!(json.contains("\"bssid\":\"AA:BB:CC:DD:EE:FF\""));
        assert!(json.contains(&"FF".repeat(32)));
    }

    #[test]
    fn test_channel_emitter_counts_overflow() {
        let (emitter, mut rx) = ChannelEmitter::new(1);
        let artifact = Artifact::Message1(Message1Record {
            bssid: AP,
            station: STA,
            anonce: [0; 32],
        });
        assert!(emitter.emit(artifact));
        assert!(!emitter.emit(artifact));
        assert_eq!(emitter.overflow(), 1);
        assert_eq!(rx.try_recv().unwrap(), artifact);
    }

    #[test]
    fn test_writer_emitter() {
        let emitter = WriterEmitter::new(Vec::new());
        emitter.emit(Artifact::Message1(Message1Record {
            bssid: AP,
            station: STA,
            anonce: [0x01; 32],
        }));
        let out = String::from_utf8(emitter.into_inner()).unwrap();
        assert!(out.starts_with("{MIC,MSG_1,AABBCCDDEEFF,112233445566,"));
        assert!(out.ends_with(",}\n"));
    }

    #[test]
    fn test_output_format_parse() {
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!("22000".parse::<OutputFormat>().unwrap(), OutputFormat::Hashcat);
        assert!("xml".parse::<OutputFormat>().is_err());
    }
}
