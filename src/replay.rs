//! Feed legacy pcap captures through a [`FrameHub`]
//!
//! Supports raw 802.11 (linktype 105) and radiotap-prefixed (linktype 127)
//! captures, the two formats monitor-mode tools write.

use bytes::Bytes;
use log::{debug, info, warn};
use pcap_parser::traits::PcapReaderIterator;
use pcap_parser::{LegacyPcapReader, Linktype, PcapBlockOwned, PcapError};
use serde::Serialize;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use wlan_capture::{CapturedFrame, FrameHub, FrameSourceType, RxMetadata};

use crate::{Result, SnifferError};

const READER_CAPACITY: usize = 65536;

const LINKTYPE_IEEE802_11: Linktype = Linktype(105);
const LINKTYPE_IEEE802_11_RADIOTAP: Linktype = Linktype(127);

/// Counters for one replayed capture
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReplaySummary {
    pub linktype: i32,
    pub packets: u64,
    pub delivered: u64,
    /// Packets whose radiotap header could not be parsed
    pub skipped: u64,
    /// Stopped early by the cancel flag
    pub cancelled: bool,
}

/// Replay a capture file, stopping at the next packet once `cancel` is set
pub fn replay_pcap<P: AsRef<Path>>(path: P, hub: &FrameHub, cancel: &AtomicBool) -> Result<ReplaySummary> {
    let path = path.as_ref();
    let file = File::open(path)?;
    info!("Replaying {}", path.display());
    replay_reader_until(BufReader::new(file), hub, cancel)
}

/// Replay a capture from any reader
pub fn replay_reader<R: Read>(reader: R, hub: &FrameHub) -> Result<ReplaySummary> {
    replay_reader_until(reader, hub, &AtomicBool::new(false))
}

/// Replay a capture from any reader until it ends or `cancel` is set
pub fn replay_reader_until<R: Read>(reader: R, hub: &FrameHub, cancel: &AtomicBool) -> Result<ReplaySummary> {
    let mut reader = LegacyPcapReader::new(READER_CAPACITY, reader)
        .map_err(|e| SnifferError::Pcap(format!("Not a legacy pcap file: {:?}", e)))?;

    let mut summary = ReplaySummary::default();
    let mut linktype = None;
    let mut stalled = false;

    loop {
        if cancel.load(Ordering::Relaxed) {
            warn!("Replay cancelled after {} packets", summary.packets);
            summary.cancelled = true;
            break;
        }
        match reader.next() {
            Ok((offset, block)) => {
                stalled = false;
                match block {
                    PcapBlockOwned::LegacyHeader(header) => {
                        if header.network != LINKTYPE_IEEE802_11 && header.network != LINKTYPE_IEEE802_11_RADIOTAP {
                            return Err(SnifferError::Pcap(format!(
                                "Unsupported linktype {}",
                                header.network.0
                            )));
                        }
                        summary.linktype = header.network.0;
                        linktype = Some(header.network);
                    }
                    PcapBlockOwned::Legacy(packet) => {
                        summary.packets += 1;
                        let mut metadata =
                            RxMetadata::new(0, packet.caplen as usize, FrameSourceType::Replay);
                        metadata.timestamp_us = packet.ts_sec as u64 * 1_000_000 + packet.ts_usec as u64;

                        let data = Bytes::copy_from_slice(packet.data);
                        let frame = if linktype == Some(LINKTYPE_IEEE802_11_RADIOTAP) {
                            CapturedFrame::from_radiotap(data, metadata)
                        } else {
                            Ok(CapturedFrame::new(data, metadata))
                        };

                        match frame {
                            Ok(frame) => {
                                hub.deliver(&frame);
                                summary.delivered += 1;
                            }
                            Err(e) => {
                                debug!("Skipping packet {}: {}", summary.packets, e);
                                summary.skipped += 1;
                            }
                        }
                    }
                    PcapBlockOwned::NG(_) => {
                        warn!("pcapng block encountered, only legacy pcap is supported");
                    }
                }
                reader.consume(offset);
            }
            Err(PcapError::Eof) => break,
            Err(PcapError::Incomplete(_)) => {
                if stalled {
                    warn!("Capture ends with a truncated record");
                    break;
                }
                stalled = true;
                reader
                    .refill()
                    .map_err(|e| SnifferError::Pcap(format!("Refill error: {:?}", e)))?;
            }
            Err(e) => return Err(SnifferError::Pcap(format!("Parse error: {:?}", e))),
        }
    }

    info!(
        "Replay finished: {} packets, {} delivered, {} skipped",
        summary.packets, summary.delivered, summary.skipped
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::sync::{Arc, Mutex};
    use wlan_capture::{FrameHandler, FrameSource, RadiotapHeader};

    #[derive(Default)]
    struct Recorder {
        frames: Mutex<Vec<CapturedFrame>>,
    }

    impl FrameHandler for Recorder {
        fn deliver(&self, frame: &CapturedFrame) {
            self.frames.lock().unwrap().push(frame.clone());
        }
    }

    fn pcap(linktype: u32, packets: &[Vec<u8>]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&0xa1b2c3d4u32.to_le_bytes());
        out.extend_from_slice(&2u16.to_le_bytes());
        out.extend_from_slice(&4u16.to_le_bytes());
        out.extend_from_slice(&0i32.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&65535u32.to_le_bytes());
        out.extend_from_slice(&linktype.to_le_bytes());
        for (i, packet) in packets.iter().enumerate() {
            out.extend_from_slice(&(i as u32 + 1).to_le_bytes());
            out.extend_from_slice(&250u32.to_le_bytes());
            out.extend_from_slice(&(packet.len() as u32).to_le_bytes());
            out.extend_from_slice(&(packet.len() as u32).to_le_bytes());
            out.extend_from_slice(packet);
        }
        out
    }

    fn hub_with_recorder() -> (FrameHub, Arc<Recorder>) {
        let hub = FrameHub::new();
        let recorder = Arc::new(Recorder::default());
        let _handle = hub.subscribe(recorder.clone());
        (hub, recorder)
    }

    #[test]
    fn test_replay_raw_80211() {
        let (hub, recorder) = hub_with_recorder();
        let capture = pcap(105, &[vec![0x08, 0x02, 0x00, 0x00], vec![0x80, 0x00]]);

        let summary = replay_reader(Cursor::new(capture), &hub).unwrap();
        assert_eq!(summary.linktype, 105);
        assert_eq!(summary.packets, 2);
        assert_eq!(summary.delivered, 2);

        let frames = recorder.frames.lock().unwrap();
        assert_eq!(frames[0].bytes(), &[0x08, 0x02, 0x00, 0x00]);
        assert_eq!(frames[0].metadata.timestamp_us, 1_000_250);
        assert_eq!(frames[0].metadata.source_type, FrameSourceType::Replay);
    }

    #[test]
    fn test_replay_radiotap() {
        let (hub, recorder) = hub_with_recorder();
        let mut good = RadiotapHeader::encode(2437, -40);
        good.extend_from_slice(&[0x08, 0x01, 0x00, 0x00]);
        let bad = vec![0x05, 0x00, 0x08, 0x00, 0, 0, 0, 0];

        let summary = replay_reader(Cursor::new(pcap(127, &[good, bad])), &hub).unwrap();
        assert_eq!(summary.delivered, 1);
        assert_eq!(summary.skipped, 1);

        let frames = recorder.frames.lock().unwrap();
        assert_eq!(frames[0].bytes(), &[0x08, 0x01, 0x00, 0x00]);
        assert_eq!(frames[0].metadata.channel, 6);
    }

    #[test]
    fn test_unsupported_linktype() {
        let (hub, _) = hub_with_recorder();
        let err = replay_reader(Cursor::new(pcap(1, &[vec![0u8; 14]])), &hub).unwrap_err();
        assert!(matches!(err, SnifferError::Pcap(_)));
    }

    #[test]
    fn test_cancel_stops_replay() {
        let (hub, recorder) = hub_with_recorder();
        let capture = pcap(105, &[vec![0x08, 0x02, 0x00, 0x00], vec![0x80, 0x00]]);

        let summary = replay_reader_until(Cursor::new(capture), &hub, &AtomicBool::new(true)).unwrap();
        assert!(summary.cancelled);
        assert_eq!(summary.packets, 0);
        assert!(recorder.frames.lock().unwrap().is_empty());
    }

    #[test]
    fn test_linktype_constants() {
        assert_eq!(LINKTYPE_IEEE802_11.0, 105);
        assert_eq!(LINKTYPE_IEEE802_11_RADIOTAP.0, 127);
    }

    #[test]
    fn test_not_a_pcap() {
        let (hub, _) = hub_with_recorder();
        assert!(replay_reader(Cursor::new(vec![0u8; 64]), &hub).is_err());
    }
}
