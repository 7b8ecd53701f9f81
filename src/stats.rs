//! Session counters
//!
//! Updated from the frame path with relaxed atomics; read through
//! [`SnifferStats::snapshot`].

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::artifact::ArtifactKind;
use crate::filter::DropReason;

/// Counters for one session
#[derive(Debug)]
pub struct SnifferStats {
    frames_seen: AtomicU64,
    drops: [AtomicU64; DropReason::COUNT],
    pmkids: AtomicU64,
    message1s: AtomicU64,
    message2s: AtomicU64,
    emit_failures: AtomicU64,
    start_time: Instant,
}

impl Default for SnifferStats {
    fn default() -> Self {
        Self {
            frames_seen: AtomicU64::new(0),
            drops: std::array::from_fn(|_| AtomicU64::new(0)),
            pmkids: AtomicU64::new(0),
            message1s: AtomicU64::new(0),
            message2s: AtomicU64::new(0),
            emit_failures: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }
}

impl SnifferStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Record a frame handed to the session
    pub fn record_frame(&self) {
        self.frames_seen.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a frame that produced no artifact
    pub fn record_drop(&self, reason: DropReason) {
        self.drops[reason.index()].fetch_add(1, Ordering::Relaxed);
    }

    /// Record an emitted artifact
    pub fn record_artifact(&self, kind: ArtifactKind) {
        let counter = match kind {
            ArtifactKind::Pmkid => &self.pmkids,
            ArtifactKind::Message1 => &self.message1s,
            ArtifactKind::Message2 => &self.message2s,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an artifact the emitter refused
    pub fn record_emit_failure(&self) {
        self.emit_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn emit_failures(&self) -> u64 {
        self.emit_failures.load(Ordering::Relaxed)
    }

    pub fn frames_seen(&self) -> u64 {
        self.frames_seen.load(Ordering::Relaxed)
    }

    pub fn drops(&self, reason: DropReason) -> u64 {
        self.drops[reason.index()].load(Ordering::Relaxed)
    }

    pub fn artifacts(&self, kind: ArtifactKind) -> u64 {
        match kind {
            ArtifactKind::Pmkid => self.pmkids.load(Ordering::Relaxed),
            ArtifactKind::Message1 => self.message1s.load(Ordering::Relaxed),
            ArtifactKind::Message2 => self.message2s.load(Ordering::Relaxed),
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let drops = DropReason::NAMES
            .iter()
            .zip(self.drops.iter())
            .map(|(name, count)| (name.to_string(), count.load(Ordering::Relaxed)))
            .filter(|(_, count)| *count > 0)
            .collect();

        StatsSnapshot {
            uptime_secs: self.uptime().as_secs(),
            frames_seen: self.frames_seen(),
            pmkids: self.artifacts(ArtifactKind::Pmkid),
            message1s: self.artifacts(ArtifactKind::Message1),
            message2s: self.artifacts(ArtifactKind::Message2),
            emit_failures: self.emit_failures(),
            drops,
        }
    }
}

/// Point-in-time copy of [`SnifferStats`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub uptime_secs: u64,
    pub frames_seen: u64,
    pub pmkids: u64,
    pub message1s: u64,
    pub message2s: u64,
    /// Artifacts decided but lost by the emitter (full channel, failed write)
    pub emit_failures: u64,
    /// Non-zero drop counters by reason
    pub drops: BTreeMap<String, u64>,
}

impl StatsSnapshot {
    pub fn total_drops(&self) -> u64 {
        self.drops.values().sum()
    }
}
