//! # wlan-capture - IEEE 802.11 link layer for EAPOL capture
//!
//! The pieces of 802.11 needed to reach an EAPOL payload and nothing more:
//!
//! - `frame`: MAC addresses, frame control decoding and a bounds-checked view
//!   over the data-frame header
//! - `radiotap`: radiotap header parsing so captures from monitor interfaces
//!   can be fed in directly
//! - `phy`: receive metadata and the subscribe/unsubscribe frame source
//!   abstraction that stands in for a driver callback registration

pub mod error;
pub mod frame;
pub mod phy;
pub mod radiotap;

pub use error::{CaptureError, HeaderError, Result};
pub use frame::{CapturedFrame, DataHeader, FrameControl, FrameKind, MacAddr};
pub use phy::{FrameHandler, FrameHub, FrameSource, FrameSourceType, RxMetadata, SubscriptionHandle};
pub use radiotap::RadiotapHeader;

/// Current version of the crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Largest capture accepted from a source (including radiotap header)
pub const MAX_FRAME_SIZE: usize = 4096;
