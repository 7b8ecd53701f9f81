//! Capture session: armed target, handshake state and output wiring
//!
//! The target and the tracker are the only mutable state shared between the
//! frame path and the command path. Both sit behind one mutex; the frame path
//! only ever `try_lock`s it (see [`crate::dispatch`]), commands block on it.

use log::info;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use wlan_capture::MacAddr;

use crate::artifact::ArtifactEmitter;
use crate::eapol::KEY_DATA_CAPACITY;
use crate::filter::{CaptureMode, TargetSelector};
use crate::pmkid::{PmkidValidator, RsnPmkidValidator};
use crate::stats::SnifferStats;
use crate::tracker::HandshakeTracker;
use crate::Result;

/// State guarded by the session lock
#[derive(Debug, Default)]
pub(crate) struct SessionState {
    pub(crate) target: Option<TargetSelector>,
    pub(crate) tracker: HandshakeTracker,
}

/// One capture session, shared by the frame source and the command layer
pub struct Session {
    pub(crate) state: Mutex<SessionState>,
    pub(crate) emitter: Arc<dyn ArtifactEmitter>,
    pub(crate) validator: Box<dyn PmkidValidator>,
    pub(crate) stats: SnifferStats,
    pub(crate) max_key_data: usize,
}

impl Session {
    /// Disarmed session using the RSN PMKID validator
    pub fn new(emitter: Arc<dyn ArtifactEmitter>) -> Self {
        Self {
            state: Mutex::new(SessionState::default()),
            emitter,
            validator: Box::new(RsnPmkidValidator),
            stats: SnifferStats::new(),
            max_key_data: KEY_DATA_CAPACITY,
        }
    }

    pub fn with_validator(mut self, validator: impl PmkidValidator + 'static) -> Self {
        self.validator = Box::new(validator);
        self
    }

    /// Refuse message 2 key data longer than `limit` bytes (capped at capacity)
    pub fn with_max_key_data(mut self, limit: usize) -> Self {
        self.max_key_data = limit.min(KEY_DATA_CAPACITY);
        self
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Arm the session against `bssid`, replacing any earlier target and
    /// starting handshake tracking from scratch
    pub fn set_target(&self, bssid: MacAddr, mode: CaptureMode) {
        let mut state = self.lock();
        if let Some(previous) = state.target {
            info!("Replacing target {} ({})", previous.bssid, previous.mode);
        }
        state.target = Some(TargetSelector::new(bssid, mode));
        state.tracker.reset();
        info!("Armed: bssid={} mode={}", bssid, mode);
    }

    /// Arm from a raw mode code; anything other than MIC (0) or PMKID (1) is rejected
    pub fn set_target_code(&self, bssid: MacAddr, mode: u8) -> Result<()> {
        let mode = CaptureMode::try_from(mode)?;
        self.set_target(bssid, mode);
        Ok(())
    }

    /// Disarm; no frame is analysed until the next `set_target`
    pub fn clear_target(&self) {
        let mut state = self.lock();
        state.target = None;
        state.tracker.reset();
        info!("Disarmed");
    }

    pub fn target(&self) -> Option<TargetSelector> {
        self.lock().target
    }

    pub fn is_armed(&self) -> bool {
        self.target().is_some()
    }

    /// Copy of the current handshake state
    pub fn handshake(&self) -> HandshakeTracker {
        self.lock().tracker
    }

    pub fn stats(&self) -> &SnifferStats {
        &self.stats
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("target", &self.target())
            .field("max_key_data", &self.max_key_data)
            .finish()
    }
}
