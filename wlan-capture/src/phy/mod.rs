//! Physical layer abstraction for receiving 802.11 frames
//!
//! A driver hands frames to whoever registered a callback. Here that
//! registration is an explicit capability: a [`FrameSource`] accepts a
//! [`FrameHandler`] and returns a [`SubscriptionHandle`] that must be given
//! back to unsubscribe.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::frame::CapturedFrame;

pub mod hub;

pub use hub::FrameHub;

/// Metadata associated with a received frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RxMetadata {
    /// Timestamp when frame was received (microseconds)
    pub timestamp_us: u64,
    /// Channel number the radio was tuned to
    pub channel: u8,
    /// Channel frequency in MHz, when known
    pub frequency: Option<u16>,
    /// Signal strength in dBm
    pub signal_dbm: Option<i8>,
    /// Capture length declared by the driver; reads never go past it
    pub sig_len: usize,
    /// Source of the frame
    pub source_type: FrameSourceType,
}

impl RxMetadata {
    pub fn new(channel: u8, sig_len: usize, source_type: FrameSourceType) -> Self {
        Self {
            channel,
            sig_len,
            source_type,
            ..Self::default()
        }
    }
}

impl Default for RxMetadata {
    fn default() -> Self {
        Self {
            timestamp_us: 0,
            channel: 0,
            frequency: None,
            signal_dbm: None,
            sig_len: crate::MAX_FRAME_SIZE,
            source_type: FrameSourceType::Mock,
        }
    }
}

/// Type of frame source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrameSourceType {
    /// Live radio driver callback
    Driver = 1,
    /// Frames replayed from a capture file
    Replay = 2,
    /// Mock/test source
    Mock = 3,
}

/// Receiver side of a frame subscription.
///
/// `deliver` runs in the source's delivery context and must return promptly.
pub trait FrameHandler: Send + Sync {
    fn deliver(&self, frame: &CapturedFrame);
}

/// Proof of a live subscription; consumed by [`FrameSource::unsubscribe`]
#[derive(Debug, PartialEq, Eq, Hash)]
#[must_use = "dropping the handle makes the subscription impossible to cancel"]
pub struct SubscriptionHandle(u64);

impl SubscriptionHandle {
    pub(crate) fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

/// Anything that can push captured frames to subscribed handlers
pub trait FrameSource: Send + Sync {
    /// Register a handler for every delivered frame
    fn subscribe(&self, handler: Arc<dyn FrameHandler>) -> SubscriptionHandle;

    /// Remove a handler registered earlier
    fn unsubscribe(&self, handle: SubscriptionHandle) -> crate::Result<()>;
}
