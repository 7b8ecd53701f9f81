//! Per-frame entry point
//!
//! Runs in the frame source's delivery context. It never blocks: if the
//! command path holds the session lock the frame is skipped and counted.
//! Artifacts are decided under the lock and emitted after it is released.

use log::{debug, info, trace};
use std::sync::TryLockError;

use wlan_capture::{CapturedFrame, FrameHandler};

use crate::artifact::{Artifact, ArtifactKind, Message1Record, Message2Record, PmkidRecord};
use crate::eapol::KeyData;
use crate::filter::{classify, CaptureMode, DropReason, EapolKeyFrame, TargetSelector};
use crate::pmkid::PmkidVerdict;
use crate::session::{Session, SessionState};
use crate::tracker::{HandshakeTracker, Message1Outcome};

/// What one frame amounted to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Dropped(DropReason),
    Emitted(ArtifactKind),
    /// Key information flagged the frame as both message 1 and message 2 and
    /// both were accepted
    EmittedMessage1And2,
}

/// At most one artifact per handshake message
type Decided = [Option<Artifact>; 2];

impl Session {
    /// Classify one frame and emit whatever key material it completes
    pub fn dispatch(&self, frame: &CapturedFrame) -> Dispatch {
        self.stats.record_frame();

        let decided = {
            let mut state = match self.state.try_lock() {
                Ok(state) => state,
                Err(TryLockError::WouldBlock) => return self.discard(DropReason::Contended),
                Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            };
            self.analyze(&mut state, frame)
        };

        let decided = match decided {
            Ok(decided) => decided,
            Err(reason) => return self.discard(reason),
        };

        let mut kinds = [None, None];
        for (slot, artifact) in kinds.iter_mut().zip(decided) {
            if let Some(artifact) = artifact {
                *slot = Some(artifact.kind());
                self.stats.record_artifact(artifact.kind());
                info!(
                    "Captured {:?}: bssid={} station={}",
                    artifact.kind(),
                    artifact.bssid(),
                    artifact.station()
                );
                if !self.emitter.emit(artifact) {
                    self.stats.record_emit_failure();
                }
            }
        }

        match kinds {
            [Some(_), Some(_)] => Dispatch::EmittedMessage1And2,
            [Some(kind), None] | [None, Some(kind)] => Dispatch::Emitted(kind),
            [None, None] => self.discard(DropReason::NotHandshakeMessage),
        }
    }

    fn discard(&self, reason: DropReason) -> Dispatch {
        match reason {
            DropReason::UnsupportedEapolType(_) | DropReason::PmkidRejected(_) => {
                debug!("Frame dropped: {}", reason)
            }
            _ => trace!("Frame dropped: {}", reason),
        }
        self.stats.record_drop(reason);
        Dispatch::Dropped(reason)
    }

    fn analyze(&self, state: &mut SessionState, frame: &CapturedFrame) -> Result<Decided, DropReason> {
        let target = state.target.ok_or(DropReason::Disarmed)?;
        let key_frame = classify(frame, &target)?;

        match target.mode {
            CaptureMode::Pmkid => self.analyze_pmkid(&target, &key_frame).map(|a| [Some(a), None]),
            CaptureMode::Mic => self.analyze_mic(&mut state.tracker, &target, &key_frame),
        }
    }

    fn analyze_pmkid(&self, target: &TargetSelector, key_frame: &EapolKeyFrame<'_>) -> Result<Artifact, DropReason> {
        if !key_frame.info.is_message1() {
            return Err(DropReason::NotHandshakeMessage);
        }

        match self.validator.validate(key_frame.key.key_data) {
            PmkidVerdict::WellFormed(pmkid) => Ok(Artifact::Pmkid(PmkidRecord {
                bssid: target.bssid,
                station: key_frame.header.receiver(),
                pmkid,
            })),
            PmkidVerdict::Rejected(why) => Err(DropReason::PmkidRejected(why)),
        }
    }

    /// Message 1 and message 2 checks are independent; a frame is judged
    /// against both
    fn analyze_mic(
        &self,
        tracker: &mut HandshakeTracker,
        target: &TargetSelector,
        key_frame: &EapolKeyFrame<'_>,
    ) -> Result<Decided, DropReason> {
        let mut decided: Decided = [None, None];
        let mut dropped = None;

        if key_frame.info.is_message1() {
            let receiver = key_frame.header.receiver();
            match tracker.on_message1(receiver) {
                Ok(outcome) => {
                    if let Message1Outcome::Displaced { previous } = outcome {
                        debug!("Station {} displaced by {}", previous, receiver);
                    }
                    decided[0] = Some(Artifact::Message1(Message1Record {
                        bssid: target.bssid,
                        station: receiver,
                        anonce: key_frame.key.nonce,
                    }));
                }
                Err(reason) => dropped = Some(reason),
            }
        }

        if key_frame.info.is_message2() {
            match self.message2_record(tracker, target, key_frame) {
                Ok(record) => decided[1] = Some(Artifact::Message2(record)),
                Err(reason) => dropped = dropped.or(Some(reason)),
            }
        }

        match (decided, dropped) {
            ([None, None], Some(reason)) => Err(reason),
            _ => Ok(decided),
        }
    }

    fn message2_record(
        &self,
        tracker: &mut HandshakeTracker,
        target: &TargetSelector,
        key_frame: &EapolKeyFrame<'_>,
    ) -> Result<Message2Record, DropReason> {
        let key = &key_frame.key;
        // Copy first so an oversized frame cannot latch message2_seen
        let key_data = KeyData::copy_bounded(key.key_data, self.max_key_data)?;

        let transmitter = key_frame.header.transmitter();
        tracker.on_message2(transmitter)?;

        Ok(Message2Record {
            bssid: target.bssid,
            station: transmitter,
            eapol_version: key_frame.eapol.version,
            eapol_type: key_frame.eapol.packet_type.into(),
            eapol_length: key_frame.eapol.body_length,
            descriptor_type: key.descriptor_type,
            key_info: key.key_info,
            key_length: key.key_length,
            replay_counter: key.replay_counter,
            snonce: key.nonce,
            key_iv: key.key_iv,
            key_rsc: key.key_rsc,
            key_id: key.key_id,
            mic: key.mic,
            key_data,
        })
    }
}

impl FrameHandler for Session {
    fn deliver(&self, frame: &CapturedFrame) {
        self.dispatch(frame);
    }
}
