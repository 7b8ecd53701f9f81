//! Frame builders shared by the integration tests

#![allow(dead_code)]

use bytes::Bytes;
use eapol_sniffer::{CapturedFrame, MacAddr};
use wlan_capture::{RadiotapHeader, RxMetadata};

pub const AP: MacAddr = MacAddr([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);
pub const STA: MacAddr = MacAddr([0x11, 0x22, 0x33, 0x44, 0x55, 0x66]);
pub const OTHER_STA: MacAddr = MacAddr([0x66, 0x55, 0x44, 0x33, 0x22, 0x11]);
pub const OTHER_AP: MacAddr = MacAddr([0x02, 0x00, 0x00, 0x00, 0x00, 0x01]);

pub const ANONCE: [u8; 32] = [0xA0; 32];
pub const SNONCE: [u8; 32] = [0x5B; 32];
pub const MIC: [u8; 16] = [0x3C; 16];
pub const RSN_IE: [u8; 22] = [
    0x30, 0x14, 0x01, 0x00, 0x00, 0x0F, 0xAC, 0x04, 0x01, 0x00, 0x00, 0x0F, 0xAC, 0x04, 0x01, 0x00, 0x00, 0x0F, 0xAC,
    0x02, 0x00, 0x00,
];

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// PMKID KDE as an access point puts it in message 1 key data
pub fn pmkid_kde(pmkid: [u8; 16]) -> Vec<u8> {
    let mut kde = vec![0xDD, 0x14, 0x00, 0x0F, 0xAC, 0x04];
    kde.extend_from_slice(&pmkid);
    kde
}

/// EAPOL-Key data frame under construction
#[derive(Debug, Clone)]
pub struct KeyFrame {
    to_ds: bool,
    from_ds: bool,
    qos: bool,
    addr1: MacAddr,
    addr2: MacAddr,
    addr3: MacAddr,
    packet_type: u8,
    key_info: u16,
    replay_counter: u64,
    nonce: [u8; 32],
    mic: [u8; 16],
    key_data: Vec<u8>,
}

impl KeyFrame {
    /// Message 1: access point to station
    pub fn message1(ap: MacAddr, station: MacAddr) -> Self {
        Self {
            to_ds: false,
            from_ds: true,
            qos: false,
            addr1: station,
            addr2: ap,
            addr3: ap,
            packet_type: 3,
            key_info: 0x008A,
            replay_counter: 1,
            nonce: ANONCE,
            mic: [0; 16],
            key_data: Vec::new(),
        }
    }

    /// Message 2: station to access point
    pub fn message2(ap: MacAddr, station: MacAddr) -> Self {
        Self {
            to_ds: true,
            from_ds: false,
            qos: false,
            addr1: ap,
            addr2: station,
            addr3: ap,
            packet_type: 3,
            key_info: 0x010A,
            replay_counter: 1,
            nonce: SNONCE,
            mic: MIC,
            key_data: RSN_IE.to_vec(),
        }
    }

    /// Message 3: access point to station
    pub fn message3(ap: MacAddr, station: MacAddr) -> Self {
        Self {
            key_info: 0x13CA,
            replay_counter: 2,
            mic: MIC,
            ..Self::message1(ap, station)
        }
    }

    /// Message 4: station to access point
    pub fn message4(ap: MacAddr, station: MacAddr) -> Self {
        Self {
            key_info: 0x030A,
            replay_counter: 2,
            nonce: [0; 32],
            key_data: Vec::new(),
            ..Self::message2(ap, station)
        }
    }

    pub fn qos(mut self) -> Self {
        self.qos = true;
        self
    }

    pub fn key_info(mut self, key_info: u16) -> Self {
        self.key_info = key_info;
        self
    }

    pub fn packet_type(mut self, packet_type: u8) -> Self {
        self.packet_type = packet_type;
        self
    }

    pub fn nonce(mut self, nonce: [u8; 32]) -> Self {
        self.nonce = nonce;
        self
    }

    pub fn key_data(mut self, key_data: &[u8]) -> Self {
        self.key_data = key_data.to_vec();
        self
    }

    /// Raw 802.11 bytes
    pub fn to_bytes(&self) -> Vec<u8> {
        let fc0 = if self.qos { 0x88 } else { 0x08 };
        let fc1 = (self.to_ds as u8) | ((self.from_ds as u8) << 1);

        let mut frame = vec![fc0, fc1, 0x00, 0x00];
        frame.extend_from_slice(&self.addr1.0);
        frame.extend_from_slice(&self.addr2.0);
        frame.extend_from_slice(&self.addr3.0);
        frame.extend_from_slice(&[0x10, 0x00]);
        if self.qos {
            frame.extend_from_slice(&[0x06, 0x00]);
        }
        frame.extend_from_slice(&[0xAA, 0xAA, 0x03, 0x00, 0x00, 0x00, 0x88, 0x8E]);

        let mut body = vec![0x02];
        body.extend_from_slice(&self.key_info.to_be_bytes());
        body.extend_from_slice(&16u16.to_be_bytes());
        body.extend_from_slice(&self.replay_counter.to_be_bytes());
        body.extend_from_slice(&self.nonce);
        body.extend_from_slice(&[0u8; 16]); // key IV
        body.extend_from_slice(&[0u8; 8]); // key RSC
        body.extend_from_slice(&[0u8; 8]); // key ID
        body.extend_from_slice(&self.mic);
        body.extend_from_slice(&(self.key_data.len() as u16).to_be_bytes());
        body.extend_from_slice(&self.key_data);

        frame.push(0x01);
        frame.push(self.packet_type);
        frame.extend_from_slice(&(body.len() as u16).to_be_bytes());
        frame.extend_from_slice(&body);
        frame
    }

    pub fn build(&self) -> CapturedFrame {
        let bytes = self.to_bytes();
        let metadata = RxMetadata {
            channel: 6,
            sig_len: bytes.len(),
            ..RxMetadata::default()
        };
        CapturedFrame::new(Bytes::from(bytes), metadata)
    }

    /// Same frame with a radiotap header in front
    pub fn build_radiotap(&self) -> Vec<u8> {
        let mut raw = RadiotapHeader::encode(2437, -48);
        raw.extend_from_slice(&self.to_bytes());
        raw
    }
}

/// A beacon from `ap`
pub fn beacon(ap: MacAddr) -> CapturedFrame {
    let mut raw = vec![0x80, 0x00, 0x00, 0x00];
    raw.extend_from_slice(&MacAddr::BROADCAST.0);
    raw.extend_from_slice(&ap.0);
    raw.extend_from_slice(&ap.0);
    raw.extend_from_slice(&[0x00; 2]);
    raw.extend_from_slice(&[0x00; 12]);
    CapturedFrame::new(Bytes::from(raw), RxMetadata::default())
}

/// Legacy pcap file image with the given linktype
pub fn pcap_file(linktype: u32, packets: &[Vec<u8>]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&0xa1b2c3d4u32.to_le_bytes());
    out.extend_from_slice(&2u16.to_le_bytes());
    out.extend_from_slice(&4u16.to_le_bytes());
    out.extend_from_slice(&0i32.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(&65535u32.to_le_bytes());
    out.extend_from_slice(&linktype.to_le_bytes());
    for packet in packets {
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&(packet.len() as u32).to_le_bytes());
        out.extend_from_slice(&(packet.len() as u32).to_le_bytes());
        out.extend_from_slice(packet);
    }
    out
}
