//! 4-way handshake tracking
//!
//! Associates message 1 and message 2 of one in-flight handshake. The tracker
//! only decides; building and emitting artifacts is the caller's job.

use serde::Serialize;
use wlan_capture::MacAddr;

use crate::filter::DropReason;

/// Where the tracked handshake stands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum HandshakeStage {
    #[default]
    Idle,
    /// Message 1 seen, addressed to `station`
    GotMessage1 { station: MacAddr },
}

/// Outcome of feeding a message 1
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Message1Outcome {
    /// First message 1 of the session
    Captured,
    /// A different station took over the tracked handshake
    Displaced { previous: MacAddr },
}

/// Single-station handshake state machine
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HandshakeTracker {
    stage: HandshakeStage,
    message2_seen: bool,
}

impl HandshakeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Message 1 addressed to `receiver`
    pub fn on_message1(&mut self, receiver: MacAddr) -> Result<Message1Outcome, DropReason> {
        match self.stage {
            HandshakeStage::GotMessage1 { station } if station == receiver => Err(DropReason::Retransmission),
            HandshakeStage::GotMessage1 { station } => {
                self.stage = HandshakeStage::GotMessage1 { station: receiver };
                Ok(Message1Outcome::Displaced { previous: station })
            }
            HandshakeStage::Idle => {
                self.stage = HandshakeStage::GotMessage1 { station: receiver };
                Ok(Message1Outcome::Captured)
            }
        }
    }

    /// Message 2 sent by `transmitter`; `Ok` means it should be emitted
    pub fn on_message2(&mut self, transmitter: MacAddr) -> Result<(), DropReason> {
        let station = match self.stage {
            HandshakeStage::Idle => return Err(DropReason::NoMessage1),
            HandshakeStage::GotMessage1 { station } => station,
        };
        if self.message2_seen {
            return Err(DropReason::Message2AlreadyCaptured);
        }
        if station != transmitter {
            return Err(DropReason::StationMismatch);
        }
        self.message2_seen = true;
        Ok(())
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn stage(&self) -> HandshakeStage {
        self.stage
    }

    pub fn station(&self) -> Option<MacAddr> {
        match self.stage {
            HandshakeStage::Idle => None,
            HandshakeStage::GotMessage1 { station } => Some(station),
        }
    }

    pub fn message2_seen(&self) -> bool {
        self.message2_seen
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STA_A: MacAddr = MacAddr([0x11, 0x22, 0x33, 0x44, 0x55, 0x66]);
    const STA_B: MacAddr = MacAddr([0x66, 0x55, 0x44, 0x33, 0x22, 0x11]);

    #[test]
    fn test_message1_retransmission_ignored() {
        let mut tracker = HandshakeTracker::new();
        assert_eq!(tracker.on_message1(STA_A), Ok(Message1Outcome::Captured));
        assert_eq!(tracker.on_message1(STA_A), Err(DropReason::Retransmission));
        assert_eq!(tracker.on_message1(STA_A), Err(DropReason::Retransmission));
        assert_eq!(tracker.station(), Some(STA_A));
    }

    #[test]
    fn test_station_displacement() {
        let mut tracker = HandshakeTracker::new();
        tracker.on_message1(STA_A).unwrap();
        assert_eq!(tracker.on_message1(STA_B), Ok(Message1Outcome::Displaced { previous: STA_A }));
        assert_eq!(tracker.station(), Some(STA_B));

        assert_eq!(tracker.on_message2(STA_A), Err(DropReason::StationMismatch));
        assert_eq!(tracker.on_message2(STA_B), Ok(()));
    }

    #[test]
    fn test_message2_at_most_once() {
        let mut tracker = HandshakeTracker::new();
        assert_eq!(tracker.on_message2(STA_A), Err(DropReason::NoMessage1));

        tracker.on_message1(STA_A).unwrap();
        assert_eq!(tracker.on_message2(STA_A), Ok(()));
        assert!(tracker.message2_seen());
        assert_eq!(tracker.on_message2(STA_A), Err(DropReason::Message2AlreadyCaptured));
    }

    #[test]
    fn test_displacement_keeps_message2_latch() {
        let mut tracker = HandshakeTracker::new();
        tracker.on_message1(STA_A).unwrap();
        tracker.on_message2(STA_A).unwrap();

        tracker.on_message1(STA_B).unwrap();
        assert!(tracker.message2_seen());
        assert_eq!(tracker.on_message2(STA_B), Err(DropReason::Message2AlreadyCaptured));
    }

    #[test]
    fn test_reset() {
        let mut tracker = HandshakeTracker::new();
        tracker.on_message1(STA_A).unwrap();
        tracker.on_message2(STA_A).unwrap();

        tracker.reset();
        assert_eq!(tracker.stage(), HandshakeStage::Idle);
        assert_eq!(tracker.station(), None);
        assert!(!tracker.message2_seen());
        assert_eq!(tracker.on_message1(STA_A), Ok(Message1Outcome::Captured));
    }
}
